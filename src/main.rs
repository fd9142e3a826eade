use chat_fanout::{
    api::{build_router, AppState},
    config::Config,
    state::{cleanup_task, create_stores},
    websocket::ChatState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    init_tracing(&config);

    tracing::info!("Starting chat fanout v{}", env!("CARGO_PKG_VERSION"));

    if config.observability.prometheus_enabled {
        if let Err(e) = chat_fanout::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        } else {
            tracing::info!("Prometheus metrics initialized");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    tracing::info!("Storage backend: {:?}", config.state.backend);
    let stores = create_stores(&config.state).await?;

    let sweeper_stores = stores.clone();
    let sweep_every = Duration::from_secs(config.fanout.cleanup_interval_secs.max(1));
    tokio::spawn(async move {
        cleanup_task(sweeper_stores, sweep_every).await;
    });

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let chat = Arc::new(ChatState::new(config, stores));
    let app = build_router(AppState::new(chat));

    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("HTTP server listening on {}", http_addr);
    tracing::info!("   WebSocket: ws://{}/ws", http_addr);

    let http_handle = tokio::spawn(async move {
        let service = app.into_make_service_with_connect_info::<SocketAddr>();
        if let Err(e) = axum::serve(http_listener, service).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("Shutting down gracefully...");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("chat_fanout={},tower_http=info", config.observability.log_level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
