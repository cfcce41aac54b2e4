use std::sync::Arc;

mod config;
mod error;
mod gateway;
mod handler;
mod http;
mod logger;
mod server;

use gateway::{FallbackCatalog, Gateway, HttpUpstream};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Config path (without extension) may be given as the first argument
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::Config::load_from(&config_path)?;

    logger::init(&cfg.logging)?;

    // Build the Tokio runtime, sizing worker threads from config
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
        tracing::info!("[CONFIG] Using {workers} worker threads");
    } else {
        tracing::info!("[CONFIG] Using default worker threads (CPU cores)");
    }

    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;

    let catalog = FallbackCatalog::load_configured(cfg.fallback.path.as_deref())?;
    let upstream = HttpUpstream::new(&cfg.upstream.base_url, cfg.upstream.timeout_secs)?;
    let gateway = Gateway::new(
        gateway::routes::site_routes(),
        Arc::new(upstream),
        Arc::new(catalog),
    )?;
    for route in gateway.routes() {
        tracing::info!(
            "[ROUTE] {} {} -> /{} ({})",
            route.method(),
            route.name,
            route.upstream.join("/"),
            route.transform.policy()
        );
    }

    let listener = server::create_listener(addr, cfg.server.backlog)?;
    logger::log_server_start(&addr, &cfg);

    let state = Arc::new(config::AppState::new(cfg, Arc::new(gateway)));

    let signals = Arc::new(server::SignalHandler::new());
    server::start_signal_handler(Arc::clone(&signals));

    server::start_server_loop(listener, state, signals).await;
    Ok(())
}
