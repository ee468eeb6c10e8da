use std::sync::Arc;
use tokio::sync::Notify;

mod clock;
mod config;
mod handler;
mod http;
mod logger;
mod server;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::Config::load()?;
    logger::init(&cfg)?;

    // Build the Tokio runtime, sized by `server.workers` when set
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.socket_addr()?;
    let listener = server::create_reusable_listener(addr)?;

    match cfg.to_toml() {
        Ok(rendered) => logger::log_debug(&format!("Effective configuration:\n{rendered}")),
        Err(e) => logger::log_warning(&format!("Could not render configuration: {e}")),
    }
    logger::log_server_start(&addr, &cfg);

    let shutdown = Arc::new(Notify::new());
    server::start_signal_handler(Arc::clone(&shutdown))?;

    let state = Arc::new(config::AppState::new(&cfg));
    server::start_server_loop(listener, state, shutdown).await?;

    logger::log_info("Server stopped");
    Ok(())
}
