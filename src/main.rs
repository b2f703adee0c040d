use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

mod config;
mod error;
mod handler;
mod http;
mod logger;
mod persist;
mod routing;
mod server;
mod store;

use persist::{FileBackend, Persistence, SharedBackend};
use store::Registry;

/// JSON CRUD service over configurable resource collections
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file path without extension (config.toml, config.json, ...)
    #[arg(short, long, env = "CRUD_CONFIG", default_value = config::DEFAULT_CONFIG_PATH)]
    config: String,

    /// Replace stored data with the collections in this JSON file before serving
    #[arg(long, value_name = "FILE")]
    import: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let cfg = match config::Config::load_from(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            logger::log_error(&format!("Failed to load configuration: {e}"));
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logger::init(&cfg) {
        logger::log_error(&format!("Failed to initialize logger: {e}"));
        return ExitCode::FAILURE;
    }

    // Single-threaded runtime: connections are served with spawn_local
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            logger::log_error(&format!("Failed to build runtime: {e}"));
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(async_main(cfg, cli.import)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logger::log_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

async fn async_main(
    cfg: config::Config,
    import: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;

    let backend = persist::open(&cfg)
        .await
        .map_err(|e| format!("Failed to open {:?} storage: {e}", cfg.storage.backend))?;

    let registry = match import {
        Some(path) => import_seed(&cfg, &backend, path).await?,
        None => {
            let snapshot = backend
                .load()
                .await
                .map_err(|e| format!("Failed to load stored data: {e}"))?;
            Registry::build(&cfg.resources, snapshot, &backend)
                .map_err(|e| format!("Stored data is invalid: {e}"))?
        }
    };

    let listener = server::create_listener(addr, cfg.server.backlog)
        .map_err(|e| format!("Failed to bind {addr}: {e}"))?;

    logger::log_server_start(&addr, &cfg, backend.name());

    let state = Arc::new(config::AppState::new(cfg, registry, backend));

    let local = tokio::task::LocalSet::new();
    local
        .run_until(server::start_server_loop(
            listener,
            state,
            server::shutdown_signal(),
        ))
        .await;

    logger::log_info("Server stopped");
    Ok(())
}

/// Validate a seed file against the configured resources and write it
/// through to the storage backend. Collections the seed does not name keep
/// their stored records.
async fn import_seed(
    cfg: &config::Config,
    backend: &SharedBackend,
    path: PathBuf,
) -> Result<Registry, Box<dyn std::error::Error>> {
    if !path.is_file() {
        return Err(format!("Seed file {} not found", path.display()).into());
    }
    let seed = FileBackend::new(path);
    let seeded = seed
        .load()
        .await
        .map_err(|e| format!("Failed to read {}: {e}", seed.path().display()))?;

    let mut merged = backend
        .load()
        .await
        .map_err(|e| format!("Failed to load stored data: {e}"))?;
    let seeded_names: Vec<String> = seeded.keys().cloned().collect();
    merged.extend(seeded);

    let registry = Registry::build(&cfg.resources, merged, backend)
        .map_err(|e| format!("Seed file {} is invalid: {e}", seed.path().display()))?;

    let mut written = registry.snapshot().await;
    written.retain(|name, _| seeded_names.contains(name));
    backend.save(&written).await?;
    logger::log_info(&format!(
        "Imported {} ({}) into {} storage",
        seed.path().display(),
        seeded_names.join(", "),
        backend.name()
    ));
    Ok(registry)
}
