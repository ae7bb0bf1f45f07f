use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use agw::admin::{self, AdminState};
use agw::config::GatewayConfig;
use agw::metrics::Metrics;
use agw::proxy::Router;
use agw::upstream::UpstreamRegistry;

/// API gateway: routing, plugin chain, rate limiting, upstream proxying.
#[derive(Parser, Debug)]
#[command(name = "agw")]
struct Args {
    /// Path to the gateway's YAML config file.
    #[arg(long = "config")]
    config: Option<PathBuf>,
}

fn config_path(args: &Args) -> PathBuf {
    args.config
        .clone()
        .or_else(|| std::env::var("GO_AGW_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./deploy/config.yaml"))
}

/// Go-style `:PORT` addresses bind all interfaces; normalize to a form
/// `TcpListener::bind` accepts directly.
fn normalize_addr(addr: &str) -> String {
    if let Some(port) = addr.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        addr.to_string()
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let path = config_path(&args);

    let config = match GatewayConfig::load(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config from {path:?}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let log_level = if config.observability.log_level.is_empty() {
        "info".to_string()
    } else {
        config.observability.log_level.clone()
    };
    init_tracing(&log_level);

    tracing::info!(path = %path.display(), "config loaded");

    let upstreams = match UpstreamRegistry::build(&config.upstreams) {
        Ok(u) => u,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize upstream registry");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(count = config.upstreams.len(), "upstreams initialized");

    let metrics = Arc::new(Metrics::new());

    let router = match Router::new(config.routes.clone(), &config.plugins.available, upstreams, metrics.clone()) {
        Ok(r) => Arc::new(r),
        Err(e) => {
            tracing::error!(error = %e, "failed to build router");
            return ExitCode::FAILURE;
        }
    };

    let data_addr = normalize_addr(&config.server.http_addr);
    let admin_addr = normalize_addr(&config.server.admin_addr);

    let data_listener = match tokio::net::TcpListener::bind(&data_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %data_addr, error = %e, "failed to bind data-plane listener");
            return ExitCode::FAILURE;
        }
    };
    let admin_listener = match tokio::net::TcpListener::bind(&admin_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %admin_addr, error = %e, "failed to bind admin listener");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(data_addr, admin_addr, "listeners bound");

    let data_app = agw::proxy::into_axum_router(router);
    let admin_app = admin::router(AdminState {
        metrics,
        config: Arc::new(config),
    });

    let data_server = axum::serve(
        data_listener,
        data_app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());
    let admin_server = axum::serve(admin_listener, admin_app).with_graceful_shutdown(shutdown_signal());

    let (data_result, admin_result) = tokio::join!(data_server, admin_server);
    if let Err(e) = data_result {
        tracing::error!(error = %e, "data-plane server exited with error");
    }
    if let Err(e) = admin_result {
        tracing::error!(error = %e, "admin server exited with error");
    }

    ExitCode::SUCCESS
}

/// Waits for SIGINT or SIGTERM. `axum::serve`'s graceful shutdown then
/// allows in-flight requests up to the hyper/axum default grace window;
/// this gateway additionally bounds total shutdown to 10s (§5) by racing
/// the signal against a forced-exit timer started once it fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
    tokio::spawn(async {
        tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        tracing::warn!("graceful shutdown grace period elapsed, forcing exit");
        std::process::exit(1);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_addr_expands_bare_port() {
        assert_eq!(normalize_addr(":8080"), "0.0.0.0:8080");
    }

    #[test]
    fn normalize_addr_leaves_host_port_unchanged() {
        assert_eq!(normalize_addr("127.0.0.1:9000"), "127.0.0.1:9000");
    }

    #[test]
    fn config_path_prefers_flag_over_env_over_default() {
        let args = Args {
            config: Some(PathBuf::from("/tmp/explicit.yaml")),
        };
        assert_eq!(config_path(&args), PathBuf::from("/tmp/explicit.yaml"));
    }
}
