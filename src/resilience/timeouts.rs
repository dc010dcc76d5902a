//! Deadline enforcement.
//!
//! # Responsibilities
//! - Bound a whole call sequence (pool wait, attempts, retry delays)
//! - Cancel the in-flight future cleanly when the deadline fires
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; dropping the future runs every guard it holds
//! - Deadline errors are distinct from transport errors

use std::future::Future;
use std::time::Duration;

use crate::error::{Failure, FailureKind};

/// Run `fut`, failing with `DeadlineExceeded` if it has not finished within `deadline`.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, Failure>
where
    F: Future<Output = Result<T, Failure>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(deadline = ?deadline, "Deadline exceeded, abandoning call");
            Err(Failure::new(
                FailureKind::DeadlineExceeded,
                format!("no result within {deadline:?}"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires_during_sleep() {
        let result: Result<(), _> = with_deadline(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

        assert_eq!(result.unwrap_err().kind, FailureKind::DeadlineExceeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inner_result_passes_through() {
        let ok = with_deadline(Duration::from_secs(1), async { Ok::<_, Failure>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err = with_deadline(Duration::from_secs(1), async {
            Err::<(), _>(Failure::new(FailureKind::InvalidRequest, "bad"))
        })
        .await;
        assert_eq!(err.unwrap_err().kind, FailureKind::InvalidRequest);
    }
}
