use std::path::PathBuf;
use std::sync::Arc;

use classic_server::config::ServerConfig;
use classic_server::level::Level;
use classic_server::server::Server;
use classic_server::{dashboard, persistence, tick};
use tokio_util::sync::CancellationToken;

fn arg(flag: &str) -> Option<String> {
    std::env::args().skip_while(|a| a != flag).nth(1)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path: PathBuf = arg("--config").unwrap_or_else(|| "server.json".into()).into();
    let mut config = match ServerConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load config: {:#}", e);
            return;
        }
    };
    if let Some(bind) = arg("--bind") {
        config.bind = bind;
    }
    if let Some(dir) = arg("--world") {
        config.level_dir = dir.into();
    }
    if let Some(port) = arg("--dashboard-port").and_then(|s| s.parse().ok()) {
        config.dashboard_port = Some(port);
    }
    if let Err(e) = config.validate() {
        tracing::error!("Invalid config: {}", e);
        return;
    }

    tracing::info!("{} -- classic protocol v7 + CPE", config.name);

    let server = Server::new(config);
    let level_dir = server.config.level_dir.clone();

    // ── Load the main level, or generate a flat one ─────────────────────
    let main_name = server.config.main_level.clone();
    let level = match persistence::load_level(&main_name, &level_dir) {
        Ok(Some(level)) => level,
        Ok(None) => {
            let [w, h, d] = server.config.default_level_size;
            tracing::info!("Generating flat level {} ({}x{}x{})...", main_name, w, h, d);
            let level = Level::flat(main_name.clone(), w, h, d);
            level.world().mark_dirty();
            level
        }
        Err(e) => {
            tracing::error!("Failed to load level {}: {:#}", main_name, e);
            return;
        }
    };
    server.set_main_level(Arc::new(level));

    let shutdown = CancellationToken::new();

    // Live dashboard (non-blocking, runs on its own tasks).
    if let Some(port) = server.config.dashboard_port {
        let dash = Arc::clone(&server);
        tokio::spawn(async move {
            dashboard::server::start(dash, port).await;
        });
    }

    tick::start_sync(Arc::clone(&server), shutdown.clone());
    tick::start_autosave(Arc::clone(&server), level_dir.clone(), shutdown.clone());

    // ── Start listener with graceful shutdown ────────────────────────────
    let bind_addr = server.config.bind.clone();
    tokio::select! {
        result = classic_server::net::listener::run(Arc::clone(&server), &bind_addr) => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, shutting down...");
        }
    }
    shutdown.cancel();

    for session in server.sessions() {
        session.kick("Server shutting down.");
    }

    // ── Save on shutdown ─────────────────────────────────────────────────
    tracing::info!("Saving levels before exit...");
    match persistence::save_dirty(&server.levels(), &level_dir) {
        Ok(n) => tracing::info!("Shutdown save complete: {} levels written", n),
        Err(e) => tracing::error!("Shutdown save failed: {:#}", e),
    }
}
