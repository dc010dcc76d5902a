//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered service
//! - Record results in each service's health history

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::manager::FailoverManager;

pub struct HealthMonitor {
    manager: Arc<FailoverManager>,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(manager: Arc<FailoverManager>, config: HealthCheckConfig) -> Self {
        Self { manager, config }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval_secs = self.config.interval_secs,
            services = self.manager.len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let results = self.manager.check_all_health().await;
                    let unhealthy = results.iter().filter(|(_, r)| !r.healthy).count();
                    tracing::debug!(checked = results.len(), unhealthy, "Health round complete");
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::services::InternalService;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_monitor_checks_until_shutdown() {
        let manager = Arc::new(FailoverManager::builder().build());
        manager
            .register_service(Arc::new(InternalService::new("a")))
            .unwrap();
        manager
            .register_service(Arc::new(InternalService::new("b").discontinued(true)))
            .unwrap();

        let config = HealthCheckConfig {
            interval_secs: 5,
            ..HealthCheckConfig::default()
        };
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(HealthMonitor::new(Arc::clone(&manager), config).run(shutdown.subscribe()));

        // First tick fires immediately, then every 5s.
        time::sleep(Duration::from_secs(11)).await;
        shutdown.trigger();
        handle.await.unwrap();

        let a = manager.status("a").unwrap();
        let b = manager.status("b").unwrap();
        assert_eq!(a.health.len(), 3);
        assert!(a.health.iter().all(|r| r.healthy));
        assert!(b.health.iter().all(|r| !r.healthy));
    }

    #[tokio::test]
    async fn test_disabled_monitor_returns() {
        let manager = Arc::new(FailoverManager::builder().build());
        let config = HealthCheckConfig {
            enabled: false,
            ..HealthCheckConfig::default()
        };
        let shutdown = Shutdown::new();
        HealthMonitor::new(manager, config).run(shutdown.subscribe()).await;
    }
}
