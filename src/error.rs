use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to {operation} '{}': {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config '{}': {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config '{}': {message}", path.display())]
    InvalidConfig { path: PathBuf, message: String },

    #[error("failed to watch config file: {0}")]
    Watch(#[from] notify::Error),

    #[error("failed to {operation} policy: {message}")]
    Policy {
        operation: &'static str,
        message: String,
    },

    #[error("replay buffer holds {available} transitions but {requested} were requested")]
    InsufficientExperience { requested: usize, available: usize },

    #[error("round counter under '{key}' is not an integer")]
    CorruptRound { key: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
