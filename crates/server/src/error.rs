use hookwire_engine::EngineError;
use hookwire_sender::SendError;
use hookwire_store::StoreError;
use thiserror::Error;

/// Errors that can occur when running the Hookwire worker binary.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The configuration file could not be parsed.
    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    /// An I/O error (e.g. reading the configuration file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// The HTTP sender could not be constructed.
    #[error("sender error: {0}")]
    Sender(#[from] SendError),
}
