use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use graphrelay::build_info;
use graphrelay::checkpoint::Checkpointer;
use graphrelay::config::Config;
use graphrelay::graph::{AgentGraph, GraphError, LazyGraph, LlmGraph, LlmGraphConfig};
use graphrelay::handlers::rate_limit::build_limiter;
use graphrelay::server::{build_app, AppState};

/// Graphrelay - a thin HTTP relay in front of a conversational agent graph
#[derive(Parser, Debug)]
#[command(version = build_info::VERSION, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config))?;

    // CLI port overrides config
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let graph_config = LlmGraphConfig {
        api_key: std::env::var(&config.graph.api_key_env).ok(),
        base_url: config.graph.base_url.clone(),
        model: config.graph.model.clone(),
        temperature: config.graph.temperature,
        max_tokens: config.graph.max_tokens,
    };

    // Constructed on first request, not at startup. Startup stays fast and
    // the process comes up even when the provider is briefly unreachable.
    let graph = LazyGraph::new(Arc::new(move || {
        let graph: Arc<dyn AgentGraph> =
            Arc::new(LlmGraph::new(graph_config.clone(), Checkpointer::NoOp));
        Ok::<_, GraphError>(graph)
    }));

    let state = AppState {
        graph,
        rate_limiter: build_limiter(config.rate_limit.requests_per_minute),
        api_key: config.auth.api_key.clone(),
        keep_alive_interval_seconds: config.server.keep_alive_interval_seconds,
    };

    let app = build_app(state, config.server.request_timeout_seconds);

    let ip: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid listen host {}", config.server.host))?;
    let addr = SocketAddr::new(ip, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(version = %build_info::version_string(), %addr, "starting server");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    info!("server stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
