//! kafka-lite broker CLI
//!
//! Serves the ApiVersions and DescribeTopicPartitions operations of the Kafka
//! wire protocol on a TCP port.

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kafka_lite_core::{BrokerConfig, BrokerListener, BrokerMetrics, HandlerRegistry, LoggingConfig};

const DEFAULT_CONFIG_PATH: &str = "kafka-lite.yaml";

/// Minimal Kafka-compatible broker.
#[derive(Parser)]
#[command(name = "kafka-lite")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file. Built-in defaults are used when the
    /// default path does not exist.
    #[arg(short, long)]
    config: Option<String>,

    /// Override listen address.
    #[arg(long)]
    listen: Option<String>,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let (mut config, config_source) = load_config(args.config.as_deref())?;

    if let Some(listen) = args.listen {
        config.listen.address = listen;
        config.validate()?;
    }

    let log_config = match args.verbose {
        0 => config.logging.clone(),
        1 => LoggingConfig {
            level: "debug".to_string(),
            ..config.logging.clone()
        },
        _ => LoggingConfig {
            level: "trace".to_string(),
            ..config.logging.clone()
        },
    };

    setup_tracing(&log_config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_source,
        listen = %config.listen.address,
        max_connections = config.listen.max_connections,
        max_frame_size = config.codec.max_frame_size,
        "starting kafka-lite broker"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move { run_broker(config).await })
}

/// An explicitly given path must exist; the default path is optional.
fn load_config(path: Option<&str>) -> anyhow::Result<(BrokerConfig, String)> {
    match path {
        Some(path) => Ok((BrokerConfig::from_file(path)?, path.to_string())),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Ok((
            BrokerConfig::from_file(DEFAULT_CONFIG_PATH)?,
            DEFAULT_CONFIG_PATH.to_string(),
        )),
        None => Ok((BrokerConfig::default(), "defaults".to_string())),
    }
}

fn setup_tracing(config: &LoggingConfig) {
    let level = match config.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber.with(fmt::layer()).init();
    }
}

async fn run_broker(config: BrokerConfig) -> anyhow::Result<()> {
    let metrics = Arc::new(BrokerMetrics::new());
    let registry = HandlerRegistry::with_default_handlers();
    info!(api_keys = ?registry.api_keys(), "handlers registered");

    if config.metrics.enabled {
        let metrics_clone = Arc::clone(&metrics);
        let metrics_addr = config.metrics.address.clone();
        tokio::spawn(async move {
            if let Err(e) = start_metrics_server(&metrics_addr, metrics_clone).await {
                tracing::error!(error = %e, "metrics server error");
            }
        });
    }

    let listener = BrokerListener::bind(config, registry, metrics).await?;
    info!(address = %listener.local_addr(), "broker listening");

    let shutdown_handle = listener.shutdown_handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, stopping broker");
        let _ = shutdown_handle.send(true);
    });

    listener.run().await?;

    info!("broker shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

async fn start_metrics_server(
    addr: &str,
    metrics: Arc<BrokerMetrics>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response};
    use hyper_util::rt::TokioIo;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    let addr: SocketAddr = addr.parse()?;
    let listener = TcpListener::bind(addr).await?;

    info!(address = %addr, "metrics server listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = Arc::clone(&metrics);

        tokio::spawn(async move {
            let service = service_fn(move |_req: Request<hyper::body::Incoming>| {
                let metrics = Arc::clone(&metrics);
                async move {
                    let body = metrics.encode().unwrap_or_default();
                    Ok::<_, hyper::Error>(Response::new(Full::new(Bytes::from(body))))
                }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(error = %e, "metrics connection error");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_overrides() {
        let args = Args::parse_from(["kafka-lite", "--listen", "127.0.0.1:19092", "-vv"]);
        assert_eq!(args.listen.as_deref(), Some("127.0.0.1:19092"));
        assert_eq!(args.verbose, 2);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        assert!(load_config(Some("/nonexistent/kafka-lite.yaml")).is_err());
    }
}
