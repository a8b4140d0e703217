//! OTSrv - scripted module host
//!
//! Loads the recvbyte modules declared under the configured modules
//! directory and keeps them current until shutdown.

use anyhow::Context;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use otsrv_config::ServerConfig;
use otsrv_core::SystemClock;
use otsrv_game::PlayerManager;
use otsrv_scripting::{ModuleLoader, Modules, ModuleType};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Options are read before logging so the configured level applies
    let loaded = ServerConfig::load_default();
    let log_level = loaded
        .as_ref()
        .map(|config| config.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .init();

    info!("OTSrv starting up...");

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load {}: {}", otsrv_config::DEFAULT_OPTIONS_PATH, e);
            warn!("Using default configuration");
            ServerConfig::default()
        }
    };
    config.display();

    let players = Arc::new(PlayerManager::new());
    let mut modules =
        Modules::with_max_nested_calls(players.clone(), Arc::new(SystemClock::new()), config.max_nested_calls);

    let loader = ModuleLoader::new(&config.modules_dir);
    loader
        .load(&mut modules)
        .with_context(|| format!("Failed to load {}", loader.modules_file().display()))?;
    log_modules(&modules);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _watcher = if config.watch_modules {
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )
        .context("Failed to create module watcher")?;
        watcher
            .watch(loader.modules_dir(), RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", loader.modules_dir().display()))?;
        info!("Watching {} for changes", loader.modules_dir().display());
        Some(watcher)
    } else {
        drop(tx);
        None
    };

    info!("Server is ready ({} players online)", players.player_count());

    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("Module watcher error: {}", e);
                        continue;
                    }
                };
                if !matches!(event.kind, notify::EventKind::Modify(_) | notify::EventKind::Create(_)) {
                    continue;
                }

                // Editors emit several events per save
                while rx.try_recv().is_ok() {}

                debug!("Detected change in {:?}", event.paths);
                match loader.reload(&mut modules) {
                    Ok(_) => log_modules(&modules),
                    Err(e) => error!("Module reload failed: {}", e),
                }
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for shutdown signal")?;
                info!("Server shutting down gracefully");
                return Ok(());
            }
        }
    }
}

fn log_modules(modules: &Modules) {
    let mut bound: Vec<_> = modules
        .iter()
        .filter(|module| module.module_type() == ModuleType::RecvByte && module.is_loaded())
        .collect();
    bound.sort_by_key(|module| module.recvbyte());

    for module in bound {
        info!(
            "    recvbyte 0x{:02X} -> script {} (delay {}ms)",
            module.recvbyte(),
            module.script_id(),
            module.delay()
        );
    }
}
