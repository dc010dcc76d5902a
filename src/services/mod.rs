//! Callable services.
//!
//! # Responsibilities
//! - Define the capability set every target exposes: invoke + health check
//! - Provide the in-process and HTTP variants
//!
//! # Design Decisions
//! - `Service` is a trait object; variants are chosen at registration time
//! - Transports classify their own errors into `ServiceError` kinds
//! - Services never retry or cache; the manager owns those concerns

mod external;
mod internal;
mod operation;

pub use external::HttpService;
pub use internal::{Handler, InternalService};
pub use operation::{params, Operation, OperationKind, Params, Payload};

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::pool::PooledConnection;

/// A callable target registered with the failover manager.
#[async_trait]
pub trait Service: Send + Sync {
    /// Unique name used as the selector.
    fn name(&self) -> &str;

    fn base_url(&self) -> Option<&str> {
        None
    }

    /// Perform one attempt of `operation` using a checked-out connection.
    async fn invoke(
        &self,
        operation: &Operation,
        params: &Params,
        conn: &PooledConnection,
    ) -> Result<Payload, ServiceError>;

    async fn health_check(&self) -> bool;
}
