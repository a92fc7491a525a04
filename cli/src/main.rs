//! chainwindow CLI — run the windowed ledger sync engine.
//!
//! Usage:
//! ```bash
//! # In-memory store, defaults (20-block window, 6s tick)
//! RPC_URL=https://cloudflare-eth.com chainwindow run
//!
//! # Durable store and custom window
//! chainwindow run --url https://cloudflare-eth.com --db ./window.db --window 50
//! ```

use std::env;
use std::process;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use chainwindow_core::{MemoryRepository, Repository, SyncConfig, SyncScheduler};
use chainwindow_evm::HttpLedgerClient;
use chainwindow_storage::SqliteRepository;

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let result = match args.get(1).map(String::as_str) {
        None | Some("run") => cmd_run(&args[args.len().min(2)..]).await,
        Some("info") => {
            cmd_info();
            Ok(())
        }
        Some("version") | Some("--version") | Some("-V") => {
            println!("chainwindow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some("help") | Some("--help") | Some("-h") => {
            print_usage();
            Ok(())
        }
        Some(other) => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("chainwindow {}", env!("CARGO_PKG_VERSION"));
    println!("Windowed blockchain transaction ingestion engine\n");
    println!("USAGE:");
    println!("    chainwindow [COMMAND]\n");
    println!("COMMANDS:");
    println!("    run      Run the sync loop (default)");
    println!("    info     Show configuration defaults");
    println!("    version  Print version");
    println!("    help     Print this help\n");
    println!("RUN FLAGS (flag wins over env var):");
    println!("    --url <URL>      RPC endpoint         [env: RPC_URL, required]");
    println!("    --db <PATH>      SQLite path          [env: DB_PATH, default: in-memory]");
    println!("    --window <N>     Trailing window size [env: WINDOW_SIZE, default: 20]");
    println!("    --tick-ms <MS>   Delay between cycles [env: TICK_INTERVAL_MS, default: 6000]");
}

fn cmd_info() {
    let defaults = SyncConfig::default();
    println!("ChainWindow v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default window size: {} blocks", defaults.window_size);
    println!("  Default tick interval: {} ms", defaults.tick_interval_ms);
    println!("  Default value precision: {} decimals", defaults.value_decimals);
    println!("  Storage backends: memory, SQLite (feature: sqlite)");
    println!("  Chains: EVM (Ethereum, Arbitrum, Base, Polygon, Optimism, ...)");
}

async fn cmd_run(args: &[String]) -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let url = setting(args, "--url", "RPC_URL").ok_or("--url or RPC_URL is required")?;
    let db = setting(args, "--db", "DB_PATH");

    let mut config = SyncConfig::default();
    if let Some(window) = setting(args, "--window", "WINDOW_SIZE") {
        config.window_size = window
            .parse()
            .map_err(|e| format!("invalid window size: {e}"))?;
        if config.window_size == 0 {
            return Err("window size must be positive".into());
        }
    }
    if let Some(tick) = setting(args, "--tick-ms", "TICK_INTERVAL_MS") {
        config.tick_interval_ms = tick
            .parse()
            .map_err(|e| format!("invalid tick interval: {e}"))?;
    }

    let client = Arc::new(HttpLedgerClient::default_for(&url).map_err(|e| e.to_string())?);

    let repo: Arc<dyn Repository> = match &db {
        Some(path) => Arc::new(
            SqliteRepository::open(path)
                .await
                .map_err(|e| e.to_string())?,
        ),
        None => Arc::new(MemoryRepository::new()),
    };

    tracing::info!(
        url = %url,
        db = db.as_deref().unwrap_or("memory"),
        window = config.window_size,
        tick_ms = config.tick_interval_ms,
        "starting sync loop"
    );

    let scheduler = SyncScheduler::new(repo, client, config);
    scheduler.run_forever().await;
    Ok(())
}

/// Resolve a setting from a `--flag value` pair, falling back to an env var.
fn setting(args: &[String], flag: &str, var: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1).cloned())
        .or_else(|| env::var(var).ok())
}
