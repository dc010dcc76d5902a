//! Remote HTTP API services.
//!
//! # Request Mapping
//! ```text
//! Read   → GET    base_url/operation?params
//! Create → POST   base_url/operation   (JSON body)
//! Update → PUT    base_url/operation   (JSON body)
//! Delete → DELETE base_url/operation?params
//! ```
//!
//! # Response Classification
//! - 2xx → payload (JSON when the body parses, else the raw text)
//! - 429, 5xx → transport failure (retryable)
//! - other 4xx → invalid request
//! - connect / timeout errors → transport failure
//! - unreadable body → unknown

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde_json::Value;
use url::Url;

use crate::error::ServiceError;
use crate::pool::PooledConnection;
use crate::services::{Operation, OperationKind, Params, Payload, Service};

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;
const USER_AGENT: &str = concat!("service-failover/", env!("CARGO_PKG_VERSION"));

/// Service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpService {
    name: String,
    base_url: Url,
    api_key: Option<String>,
    health_path: String,
    health_timeout: Duration,
    client: Client,
}

impl HttpService {
    /// Create a service whose requests time out after `request_timeout`.
    pub fn new(
        name: impl Into<String>,
        base_url: Url,
        request_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            name: name.into(),
            base_url,
            api_key: None,
            health_path: "/health".to_string(),
            health_timeout: Duration::from_secs(1),
            client,
        })
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{base}/{path}"))
            .map_err(|e| ServiceError::invalid_request(format!("invalid endpoint '{path}': {e}")))
    }

    async fn classify(&self, operation: &Operation, response: Response) -> Result<Payload, ServiceError> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            tracing::warn!(
                service = %self.name,
                operation = %operation,
                retry_after_secs = retry_after,
                "Upstream rate limited request"
            );
            return Err(ServiceError::transport(format!(
                "upstream rate limited (429), retry after {retry_after}s"
            )));
        }

        if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
            return Err(ServiceError::transport(format!("upstream returned {status}")));
        }

        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            let detail: String = body.chars().take(200).collect();
            return Err(ServiceError::invalid_request(format!(
                "upstream rejected request with {status}: {detail}"
            )));
        }

        if !status.is_success() {
            return Err(ServiceError::unknown(format!("unexpected upstream status {status}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::unknown(format!("failed to read response body: {e}")))?;

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

/// Query pairs with JSON strings unquoted.
fn query_pairs(params: &Params) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

fn transport_error(err: reqwest::Error) -> ServiceError {
    if err.is_builder() {
        ServiceError::invalid_request(format!("could not build request: {err}"))
    } else if err.is_decode() {
        ServiceError::unknown(format!("could not decode response: {err}"))
    } else if err.is_timeout() {
        ServiceError::transport(format!("request timed out: {err}"))
    } else {
        ServiceError::transport(format!("request failed: {err}"))
    }
}

#[async_trait]
impl Service for HttpService {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> Option<&str> {
        Some(self.base_url.as_str())
    }

    async fn invoke(
        &self,
        operation: &Operation,
        params: &Params,
        conn: &PooledConnection,
    ) -> Result<Payload, ServiceError> {
        let url = self.endpoint(&operation.name)?;

        let request = match operation.kind {
            OperationKind::Read => self.client.get(url).query(&query_pairs(params)),
            OperationKind::Create => self.client.post(url).json(params),
            OperationKind::Update => self.client.put(url).json(params),
            OperationKind::Delete => self.client.delete(url).query(&query_pairs(params)),
        };
        let request = match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };

        tracing::debug!(
            service = %self.name,
            operation = %operation,
            connection_id = %conn.id(),
            "Sending upstream request"
        );

        let response = request.send().await.map_err(transport_error)?;
        self.classify(operation, response).await
    }

    async fn health_check(&self) -> bool {
        let url = match self.endpoint(&self.health_path) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(service = %self.name, error = %e, "Failed to build health check URL");
                return false;
            }
        };

        let request = self.client.get(url).timeout(self.health_timeout);
        let request = match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };

        match request.send().await {
            Ok(response) => {
                let success = response.status().is_success();
                if !success {
                    tracing::warn!(service = %self.name, status = %response.status(), "Health check failed: non-success status");
                }
                success
            }
            Err(e) => {
                tracing::warn!(service = %self.name, error = %e, "Health check failed: connection error");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service(base: &str) -> HttpService {
        HttpService::new("api", Url::parse(base).unwrap(), Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_endpoint_joining() {
        let svc = service("http://example.com/v1/");
        assert_eq!(svc.endpoint("/users").unwrap().as_str(), "http://example.com/v1/users");

        let svc = service("http://example.com/v1");
        assert_eq!(svc.endpoint("users/1").unwrap().as_str(), "http://example.com/v1/users/1");
    }

    #[test]
    fn test_query_pairs_unquote_strings() {
        let mut params = Params::new();
        params.insert("q".into(), json!("rust"));
        params.insert("page".into(), json!(2));
        params.insert("exact".into(), json!(true));

        let pairs = query_pairs(&params);
        assert_eq!(
            pairs,
            vec![
                ("exact".to_string(), "true".to_string()),
                ("page".to_string(), "2".to_string()),
                ("q".to_string(), "rust".to_string()),
            ]
        );
    }
}
