//! Tavern engine binary.
//!
//! Wires a character service to an in-memory store and an event bus,
//! runs a YAML session script against it, and prints a JSON summary of
//! what the bus recorded.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `tavern-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the event bus from the history settings
//! 4. Subscribe the audit log
//! 5. Create the store and character service
//! 6. Load the session (first argument, or the bundled demo)
//! 7. Run the session
//! 8. Print the report

mod audit;
mod error;
mod session;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tavern_core::{CharacterService, InMemoryCharacterStore, TavernConfig};
use tavern_events::EventBus;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::audit::AuditLog;
use crate::error::EngineError;
use crate::session::{DEMO_SESSION, SessionRunner, SessionScript};

const CONFIG_FILE: &str = "tavern-config.yaml";

/// Application entry point for the Tavern engine.
///
/// # Errors
///
/// Returns an error if configuration, the session script, or report
/// serialization fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = Path::new(CONFIG_FILE);
    let config = load_config(config_path)?;

    // 2. Initialize structured logging. RUST_LOG wins over the config.
    init_tracing(&config);
    info!("tavern-engine starting");
    if config_path.exists() {
        info!(path = CONFIG_FILE, "Configuration loaded");
    } else {
        info!("Config file not found, using defaults");
    }
    info!(
        history_capacity = config.history.capacity,
        recent_events = config.history.recent_events,
        "History settings"
    );

    // 3. Create the event bus.
    let bus = EventBus::new(config.history.capacity)
        .map_err(EngineError::from)?
        .with_recent_events(config.history.recent_events);

    // 4. Subscribe the audit log.
    let audit = Arc::new(AuditLog::new());
    let audit_subscription = bus.subscribe(Arc::clone(&audit), None).await;
    info!(subscription = %audit_subscription.id(), "Audit log subscribed");

    // 5. Create the store and service.
    let store = Arc::new(InMemoryCharacterStore::new());
    let service = CharacterService::new(store.clone(), bus.clone());

    // 6. Load the session.
    let script = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => {
            info!(path = %path.display(), "Loading session script");
            SessionScript::from_file(&path)?
        }
        None => {
            info!("No session script given, running the demo session");
            SessionScript::parse(DEMO_SESSION)?
        }
    };
    info!(
        seed = script.seed,
        steps = script.steps.len(),
        "Session loaded"
    );

    // 7. Run it.
    let mut runner = SessionRunner::new(service);
    let report = runner.run(script).await?;

    // 8. Report.
    let summary = json!({
        "session": report,
        "characters": store.len().await,
        "delivered": audit.seen(),
        "can_undo": bus.can_undo().await,
        "can_redo": bus.can_redo().await,
        "history": bus.stats().await,
    });
    let rendered = serde_json::to_string_pretty(&summary)
        .map_err(EngineError::from)?;
    println!("{rendered}");

    info!("tavern-engine shutdown complete");
    Ok(())
}

/// Load configuration from `path`, falling back to defaults (with
/// environment overrides) when the file is absent.
fn load_config(path: &Path) -> Result<TavernConfig, EngineError> {
    if path.exists() {
        Ok(TavernConfig::from_file(path)?)
    } else {
        let mut config = TavernConfig::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }
}

fn init_tracing(config: &TavernConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
