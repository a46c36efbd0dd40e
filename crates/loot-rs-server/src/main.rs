mod commands;
mod config;
mod permissions;
mod persistence;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncBufReadExt;
use tracing::{error, info};

use config::ServerConfig;
use loot_rs_game::LootService;
use loot_rs_loot::LootTableRegistry;
use loot_rs_world::MemoryWorld;
use permissions::PermissionManager;
use persistence::DataStore;

#[tokio::main]
async fn main() {
    let config = match ServerConfig::load("server.toml") {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load server.toml: {e}");
            std::process::exit(1);
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("Loot-RS Server v{} starting", env!("CARGO_PKG_VERSION"));

    let tables = LootTableRegistry::load_dir(Path::new(&config.loot.tables_dir));
    if tables.is_empty() {
        info!("No loot tables found in {}", config.loot.tables_dir);
    }

    let data_dir = Path::new(&config.server.data_dir);
    let world = Arc::new(MemoryWorld::new());
    let service = Arc::new(LootService::new(
        tables,
        Duration::from_millis(config.loot.open_cooldown_ms),
        config.loot.refill_batch_size,
    ));
    let store = Arc::new(DataStore::new(data_dir));
    store.load(service.registry(), service.tables(), world.as_ref());
    let permissions = PermissionManager::load(data_dir);

    let mut handler = commands::CommandHandler::new(
        service.clone(),
        world.clone(),
        store.clone(),
        permissions,
    );

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);

    // Handle Ctrl+C
    let shutdown_tx_ctrlc = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        let _ = shutdown_tx_ctrlc.send(true);
    });

    // Console REPL: read lines from stdin
    let (console_tx, mut console_rx) = tokio::sync::mpsc::channel::<String>(32);
    tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    // Autosave runs on its own task so the tick loop never waits on file
    // I/O; the snapshot copy is the only moment it touches shared state.
    if config.persistence.auto_save_interval > 0 {
        let period = Duration::from_secs(config.persistence.auto_save_interval);
        let store = store.clone();
        let service = service.clone();
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut autosave =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = autosave.tick() => {
                        save_in_background(&store, &service).await;
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        });
    }

    let mut tick_interval = tokio::time::interval(Duration::from_millis(50));
    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                let report = service.tick(world.as_ref());
                if let Some(progress) = report.refill {
                    if progress.finished {
                        println!(
                            "Container refill complete. Processed {} containers.",
                            progress.refilled
                        );
                        if progress.skipped > 0 {
                            info!("Skipped {} container(s) during refill", progress.skipped);
                        }
                    }
                }
            }
            Some(line) = console_rx.recv() => {
                let result = handler.handle(&line);
                for message in &result.messages {
                    println!("{message}");
                }
                if result.should_stop {
                    let _ = shutdown_tx.send(true);
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    info!("Saving container state before shutdown...");
    save_in_background(&store, &service).await;
    info!("Server shut down.");
}

/// Snapshot the registry, then hand the file write to the blocking pool.
async fn save_in_background(store: &Arc<DataStore>, service: &Arc<LootService>) {
    let snapshot = service.registry().snapshot();
    let store = store.clone();
    match tokio::task::spawn_blocking(move || store.save(&snapshot)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Failed to save container state: {e}"),
        Err(e) => error!("Save task failed: {e}"),
    }
}
