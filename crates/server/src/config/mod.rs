mod engine;
mod log;
mod sender;
mod store;
mod worker;


pub use engine::*;
pub use log::*;
pub use sender::*;
pub use store::*;
pub use worker::*;

use std::path::Path;

use serde::Deserialize;

use crate::error::ServerError;

/// Top-level configuration for the Hookwire worker, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct HookwireConfig {
    /// Delivery store backend configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Engine tuning and retry policy.
    #[serde(default)]
    pub engine: EngineSection,
    /// Queue worker loop configuration.
    #[serde(default)]
    pub worker: WorkerSection,
    /// Outbound HTTP client configuration.
    #[serde(default)]
    pub sender: SenderSection,
    /// Log output configuration.
    #[serde(default)]
    pub log: LogConfig,
}

impl HookwireConfig {
    /// Load configuration from `path`, or use defaults if the file does not
    /// exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ServerError> {
        Ok(toml::from_str(contents)?)
    }
}
