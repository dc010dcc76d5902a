//! Read-only admin API.
//!
//! # Endpoints
//! - `GET /admin/status`: version, service count, cache totals
//! - `GET /admin/services`: status of every service
//! - `GET /admin/services/{name}`: one service, 404 if unknown
//! - `GET /admin/metrics`: collector aggregates and recent events
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::manager::FailoverManager;
use crate::observability::MetricsCollector;

#[derive(Clone)]
pub struct AdminState {
    pub manager: Arc<FailoverManager>,
    pub collector: Arc<MetricsCollector>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/services", get(get_services))
        .route("/admin/services/{name}", get(get_service))
        .route("/admin/metrics", get(get_metrics))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API until the shutdown signal fires.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(address = %addr, "Admin API listening");
    }
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InternalService;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn state() -> AdminState {
        let manager = FailoverManager::builder().build();
        manager
            .register_service(Arc::new(InternalService::new("inventory")))
            .unwrap();
        AdminState {
            manager: Arc::new(manager),
            collector: Arc::new(MetricsCollector::default()),
            api_key: Arc::from("secret"),
        }
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_requires_bearer_token() {
        let router = setup_admin_router(state());

        let missing = router.clone().oneshot(get("/admin/status", None)).await.unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = router.clone().oneshot(get("/admin/status", Some("nope"))).await.unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let ok = router.oneshot(get("/admin/status", Some("secret"))).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_service_lookup() {
        let router = setup_admin_router(state());

        let found = router
            .clone()
            .oneshot(get("/admin/services/inventory", Some("secret")))
            .await
            .unwrap();
        assert_eq!(found.status(), StatusCode::OK);
        let body = axum::body::to_bytes(found.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["name"], "inventory");
        assert_eq!(json["circuit_state"], "closed");

        let missing = router
            .oneshot(get("/admin/services/ghost", Some("secret")))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
