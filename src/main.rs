//! `failover` command line.
//!
//! # Architecture Overview
//!
//! ```text
//!     caller (CLI / library user)
//!         │
//!         ▼
//!   ┌───────────────────────────────────────────────────────────┐
//!   │                    FailoverManager                        │
//!   │                                                           │
//!   │  cache ─▶ rate limit ─▶ circuit ─▶ pool ─▶ retry ─▶ invoke│──▶ Service
//!   │                                                           │   (internal / HTTP)
//!   │  registry: per-service circuit, bucket, pool, health      │
//!   └───────────────────────────────────────────────────────────┘
//!         │ MetricEvent                       ▲ check_all_health
//!         ▼                                   │
//!   MetricsCollector ─▶ Prometheus       HealthMonitor
//!         │
//!         ▼
//!     admin API (axum)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use service_failover::admin::{self, AdminState};
use service_failover::config::{load_config, FailoverConfig};
use service_failover::health::HealthMonitor;
use service_failover::observability::{logging, metrics, MetricsCollector, MetricsSink};
use service_failover::{FailoverManager, Operation, Params, Shutdown};

#[derive(Parser)]
#[command(name = "failover")]
#[command(about = "Resilient calls to internal and HTTP services", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the health monitor, admin API and metrics exporter until Ctrl-C
    Serve,
    /// Make one call through the failover pipeline
    Call {
        service: String,
        operation: String,
        /// Send as a mutating (non-cacheable) operation
        #[arg(long)]
        write: bool,
        /// Parameter as key=value; values that parse as JSON are sent as JSON
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,
    },
    /// Print the status of every configured service
    Status {
        /// Probe every service before printing
        #[arg(long)]
        check: bool,
    },
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => FailoverConfig::default(),
    };

    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("failed to initialize logging: {e}");
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        services = config.services.len(),
        "failover starting"
    );

    let collector = Arc::new(MetricsCollector::new(config.observability.recent_events));
    let sink: Arc<dyn MetricsSink> = Arc::clone(&collector) as Arc<dyn MetricsSink>;
    let manager = Arc::new(FailoverManager::from_config(&config, sink)?);

    match cli.command {
        Commands::Serve => {
            serve(config, manager, collector).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Call {
            service,
            operation,
            write,
            params,
        } => {
            let operation = if write {
                Operation::create(operation)
            } else {
                Operation::read(operation)
            };
            let params: Params = params.into_iter().collect();

            match manager.execute(&service, &operation, &params).await {
                Ok(payload) => {
                    println!("{}", serde_json::to_string_pretty(&json!({ "ok": true, "payload": payload }))?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(failure) => {
                    println!("{}", serde_json::to_string_pretty(&json!({ "ok": false, "failure": failure }))?);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Status { check } => {
            if check {
                manager.check_all_health().await;
            }
            println!("{}", serde_json::to_string_pretty(&manager.statuses())?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn serve(
    config: FailoverConfig,
    manager: Arc<FailoverManager>,
    collector: Arc<MetricsCollector>,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let mut tasks = Vec::new();

    let monitor = HealthMonitor::new(Arc::clone(&manager), config.health_check.clone());
    tasks.push(tokio::spawn(monitor.run(shutdown.subscribe())));

    if config.admin.enabled {
        if config.admin.api_key == FailoverConfig::default().admin.api_key {
            tracing::warn!("Admin API is using the placeholder api_key; set admin.api_key");
        }
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState {
            manager: Arc::clone(&manager),
            collector,
            api_key: Arc::from(config.admin.api_key.as_str()),
        };
        let rx = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, state, rx).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        }));
    }

    shutdown.trigger_on_ctrl_c().await;
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Background task panicked");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
