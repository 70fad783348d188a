//! EmberKV Server Binary
//!
//! Starts the RESP server for EmberKV.

use std::sync::Arc;

use clap::Parser;
use emberkv::config::SyncStrategy;
use emberkv::network::{Server, ShutdownHandle};
use emberkv::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// EmberKV Server
#[derive(Parser, Debug)]
#[command(name = "emberkv-server")]
#[command(about = "Persistent key-value server speaking the Redis protocol")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./emberkv_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Connection worker threads
    #[arg(short, long, default_value = "4")]
    workers: usize,

    /// fsync after this many writes (0 = after every write)
    #[arg(short, long, default_value = "100")]
    sync_every: usize,

    /// Close idle connections after this many milliseconds (0 = never)
    #[arg(long, default_value = "0")]
    idle_timeout_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,emberkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("EmberKV Server v{}", emberkv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    let sync_strategy = match args.sync_every {
        0 => SyncStrategy::EveryWrite,
        count => SyncStrategy::EveryNEntries { count },
    };

    // Build config from args
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .worker_threads(args.workers)
        .sync_strategy(sync_strategy)
        .read_timeout_ms(args.idle_timeout_ms)
        .build();

    // Open engine (replays the index journals)
    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    for warning in &engine.recovery_report().warnings {
        tracing::warn!("Recovered with warning: {}", warning);
    }
    tracing::info!(
        "Engine initialized with {} keys",
        engine.recovery_report().restored_key_count
    );

    // Serve until SHUTDOWN, Ctrl+C or SIGTERM
    let mut server = Server::new(config, Arc::clone(&engine));
    install_signal_handler(server.shutdown_handle());
    let served = server.run();
    drop(server);

    let closed = match Arc::try_unwrap(engine) {
        Ok(engine) => engine.close(),
        Err(engine) => engine.sync(),
    };

    if let Err(e) = served {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = closed {
        tracing::error!("Failed to close engine: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}

/// Stop the server on Ctrl+C or SIGTERM so the engine is closed and synced
fn install_signal_handler(handle: ShutdownHandle) {
    let result = ctrlc::set_handler(move || {
        if !handle.is_shutdown() {
            tracing::info!("Received shutdown signal, stopping server...");
        }
        handle.shutdown();
    });
    if let Err(e) = result {
        tracing::warn!("Failed to install signal handler: {}", e);
    }
}
