//! HTTP transport against a mock upstream.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{manager_with_sink, test_policy, CapturingSink};
use service_failover::config::ServicePolicy;
use service_failover::services::HttpService;
use service_failover::{params, FailoverManager, FailureKind, Operation, Params};

fn fast_policy() -> ServicePolicy {
    let mut policy = test_policy();
    policy.retry.base_delay_ms = 10;
    policy.overall_deadline = Duration::from_secs(5);
    policy
}

async fn manager_for(server: &MockServer) -> (Arc<FailoverManager>, Arc<CapturingSink>) {
    let (manager, sink) = manager_with_sink(fast_policy());
    let service = HttpService::new(
        "upstream",
        Url::parse(&server.uri()).unwrap(),
        Duration::from_secs(2),
    )
    .unwrap()
    .with_api_key("test-key");
    manager.register_service(Arc::new(service)).unwrap();
    (manager, sink)
}

#[tokio::test]
async fn test_read_sends_get_with_query_and_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("id", "7"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 7, "name": "ada" })))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, _sink) = manager_for(&server).await;
    let payload = manager
        .execute("upstream", &Operation::read("users"), &params([("id", 7)]))
        .await
        .unwrap();

    assert_eq!(payload, json!({ "id": 7, "name": "ada" }));
}

#[tokio::test]
async fn test_create_posts_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(body_json(json!({ "sku": "A-1", "qty": 2 })))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, _sink) = manager_for(&server).await;
    let payload = manager
        .execute(
            "upstream",
            &Operation::create("orders"),
            &params([("sku", json!("A-1")), ("qty", json!(2))]),
        )
        .await
        .unwrap();

    assert_eq!(payload, json!("created"));
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, sink) = manager_for(&server).await;
    let payload = manager
        .execute("upstream", &Operation::update("profile"), &Params::new())
        .await
        .unwrap();

    assert_eq!(payload, json!({ "ok": true }));
    assert_eq!(sink.last().attempts, 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such session"))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, _sink) = manager_for(&server).await;
    let err = manager
        .execute("upstream", &Operation::delete("sessions"), &params([("id", "s1")]))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::InvalidRequest);
    assert_eq!(err.attempts_made, 1);
    assert!(err.message.contains("no such session"));
    assert_eq!(
        manager.status("upstream").unwrap().circuit.consecutive_failures,
        0
    );
}

#[tokio::test]
async fn test_upstream_rate_limit_is_a_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sms"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .expect(3)
        .mount(&server)
        .await;

    let (manager, _sink) = manager_for(&server).await;
    let err = manager
        .execute("upstream", &Operation::create("sms"), &Params::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::TransportFailure);
    assert_eq!(err.attempts_made, 3);
    assert!(err.message.contains("retry after 7s"));
}

#[tokio::test]
async fn test_unreachable_upstream_is_a_transport_failure() {
    let mut policy = fast_policy();
    policy.retry.max_attempts = 1;
    let (manager, _sink) = manager_with_sink(policy);
    let service = HttpService::new(
        "offline",
        Url::parse("http://127.0.0.1:1").unwrap(),
        Duration::from_secs(1),
    )
    .unwrap();
    manager.register_service(Arc::new(service)).unwrap();

    let err = manager
        .execute("offline", &Operation::read("anything"), &Params::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::TransportFailure);
}

#[tokio::test]
async fn test_health_check_uses_health_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let url = Url::parse(&server.uri()).unwrap();
    let healthy = HttpService::new("up", url.clone(), Duration::from_secs(1))
        .unwrap()
        .with_health_path("/status");
    let wrong_path = HttpService::new("down", url, Duration::from_secs(1)).unwrap();

    let (manager, _sink) = manager_with_sink(fast_policy());
    manager.register_service(Arc::new(healthy)).unwrap();
    manager.register_service(Arc::new(wrong_path)).unwrap();

    assert!(manager.check_health("up").await.unwrap().healthy);
    assert!(!manager.check_health("down").await.unwrap().healthy);
}

#[tokio::test]
async fn test_request_timeout_status_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(408))
        .expect(3)
        .mount(&server)
        .await;

    let (manager, _sink) = manager_for(&server).await;
    let err = manager
        .execute("upstream", &Operation::read("slow"), &Params::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::TransportFailure);
    assert_eq!(err.attempts_made, 3);
}
