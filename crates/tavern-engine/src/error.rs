//! Error types for the Tavern engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup and session execution.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: tavern_core::ConfigError,
    },

    /// The event bus could not be constructed.
    #[error("event bus error: {source}")]
    Bus {
        /// The underlying bus error.
        #[from]
        source: tavern_events::BusError,
    },

    /// The session script could not be read or parsed.
    #[error("session script error: {message}")]
    Script {
        /// Description of the script failure.
        message: String,
    },

    /// A step referred to a character the script never created.
    #[error("step {step}: unknown character reference `{name}`")]
    UnknownCharacter {
        /// One-based step number.
        step: usize,
        /// The unresolved reference.
        name: String,
    },

    /// Serializing the final report failed.
    #[error("serialization error: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}
