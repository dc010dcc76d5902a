//! In-process services.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::error::ServiceError;
use crate::pool::PooledConnection;
use crate::services::{Operation, Params, Payload, Service};

/// Handler invoked for every call to an [`InternalService`].
pub type Handler = Arc<dyn Fn(&Operation, &Params) -> Result<Payload, ServiceError> + Send + Sync>;

/// Service backed by a closure running in this process.
///
/// Without a handler it echoes the call back. A discontinued service fails
/// every call with a transport failure and reports itself unhealthy.
pub struct InternalService {
    name: String,
    base_url: Option<String>,
    discontinued: AtomicBool,
    handler: Handler,
}

impl InternalService {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let echo_name = name.clone();
        Self {
            name,
            base_url: None,
            discontinued: AtomicBool::new(false),
            handler: Arc::new(move |operation: &Operation, params: &Params| {
                Ok(json!({
                    "service": echo_name,
                    "operation": operation.name,
                    "kind": operation.kind,
                    "params": params,
                }))
            }),
        }
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Operation, &Params) -> Result<Payload, ServiceError> + Send + Sync + 'static,
    {
        self.handler = Arc::new(handler);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn discontinued(self, discontinued: bool) -> Self {
        self.set_discontinued(discontinued);
        self
    }

    /// Toggle at runtime; takes effect on the next call.
    pub fn set_discontinued(&self, discontinued: bool) {
        self.discontinued.store(discontinued, Ordering::Relaxed);
    }

    pub fn is_discontinued(&self) -> bool {
        self.discontinued.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Service for InternalService {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    async fn invoke(
        &self,
        operation: &Operation,
        params: &Params,
        conn: &PooledConnection,
    ) -> Result<Payload, ServiceError> {
        if self.is_discontinued() {
            return Err(ServiceError::transport(format!(
                "service '{}' is discontinued",
                self.name
            )));
        }
        tracing::trace!(
            service = %self.name,
            operation = %operation,
            connection_id = %conn.id(),
            "Internal call"
        );
        (self.handler)(operation, params)
    }

    async fn health_check(&self) -> bool {
        !self.is_discontinued()
    }
}

impl fmt::Debug for InternalService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalService")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("discontinued", &self.is_discontinued())
            .finish_non_exhaustive()
    }
}
