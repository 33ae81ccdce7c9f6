//! Maintenance tool: loads the configured pet store and reports on it.
//!
//! `shelter`          log a status summary
//! `shelter list`     print the whole collection as JSON
//! `shelter history`  print adopted pets, newest adoption first, as JSON

use std::process::ExitCode;

use configs::{AppConfig, LogFormat};
use dotenvy::dotenv;
use tracing::{error, info, warn};
use uuid::Uuid;

async fn run(cfg: AppConfig, command: Option<String>) -> anyhow::Result<()> {
    let store = service::runtime::open_store(&cfg).await?;
    let status = store.persistence_status();
    if let Some(reason) = &status.load_error {
        warn!(event = "load_fallback", %reason, "stored collection unusable; store started empty");
    }

    match command.as_deref() {
        None => {
            let stats = store.stats();
            info!(
                event = "summary",
                key = store.key(),
                total = stats.total,
                available = stats.available,
                reserved = stats.reserved,
                adopted = stats.adopted,
                "pet store summary"
            );
        }
        Some("list") => println!("{}", serde_json::to_string_pretty(&store.list_all())?),
        Some("history") => println!("{}", serde_json::to_string_pretty(&store.adoption_history())?),
        Some(other) => anyhow::bail!("unknown command {other:?}; expected `list` or `history`"),
    }
    Ok(())
}

fn main() -> ExitCode {
    // load .env first so RUST_LOG and SHELTER_DATA_DIR take effect
    dotenv().ok();
    let (cfg, config_found) = match AppConfig::load_or_default() {
        Ok(loaded) => loaded,
        Err(e) => {
            common::utils::logging::init_logging_default();
            error!(
                service = "shelter",
                event = "config_invalid",
                path = %configs::config_path(),
                error = %format!("{e:#}"),
                "invalid configuration"
            );
            return ExitCode::FAILURE;
        }
    };
    common::utils::logging::init_logging(cfg.logging.format == LogFormat::Json);

    let run_id = Uuid::new_v4();
    let version = env!("CARGO_PKG_VERSION");
    info!(service = "shelter", event = "start", %run_id, version, "shelter starting");
    if !config_found {
        info!(event = "config_default", path = %configs::config_path(), "no config file; using defaults");
    }

    std::panic::set_hook(Box::new(move |info| {
        error!(service = "shelter", event = "panic", %run_id, message = %info, "unhandled panic occurred");
    }));

    // single-threaded: the store is a single-writer, cooperative component
    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "shelter", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let command = std::env::args().nth(1);
    match rt.block_on(run(cfg, command)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(service = "shelter", event = "run_failed", error = %e, "shelter failed");
            ExitCode::FAILURE
        }
    }
}
