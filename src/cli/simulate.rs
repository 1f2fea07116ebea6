//! Simulate command implementation

use crate::cli::output::{format_summary, format_summary_json};
use crate::cli::SimulateArgs;
use crate::config::{LogFormat, RelayConfig};
use crate::metrics::{setup_metrics, EventSink, MetricsSink};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(
    args: &SimulateArgs,
) -> Result<RelayConfig, Box<dyn std::error::Error>> {
    // Load from file if it exists, otherwise use defaults
    let mut config = if args.config.exists() {
        RelayConfig::load(Some(&args.config))?
    } else {
        tracing::debug!("Config file not found, using defaults");
        RelayConfig::default()
    };

    config = config.with_env_overrides();

    // CLI wins over file and environment
    if let Some(duration) = args.duration {
        config.simulation.duration_seconds = duration;
    }
    if let Some(kind) = args.transport {
        config.transport.kind = kind;
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }

    Ok(config)
}

/// Initialize tracing based on configuration
///
/// Logs go to stderr so the run summary on stdout stays machine-readable.
pub fn init_tracing(
    config: &crate::config::LoggingConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = crate::logging::build_filter_directives(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr),
                )
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .try_init()?;
        }
    }

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }

    cancel_token.cancel();
}

/// Main simulate command handler
pub async fn run_simulate(args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_with_overrides(&args)?;
    config.validate()?;

    init_tracing(&config.logging)?;
    tracing::debug!(?config, "Loaded configuration");

    let prometheus = if args.prometheus {
        Some(setup_metrics()?)
    } else {
        None
    };
    let extra_sink: Option<Arc<dyn EventSink>> = if prometheus.is_some() {
        Some(Arc::new(MetricsSink))
    } else {
        None
    };

    let shutdown = CancellationToken::new();
    let signal_handle = tokio::spawn(shutdown_signal(shutdown.clone()));

    let result = crate::sim::run(&config, extra_sink, shutdown).await;
    signal_handle.abort();
    let summary = result?;

    if args.json {
        println!("{}", format_summary_json(&summary)?);
    } else {
        println!("{}", format_summary(&summary));
    }

    if let Some(handle) = prometheus {
        println!("{}", handle.render());
    }

    Ok(())
}
