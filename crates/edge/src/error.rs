use serve::Error as ServeError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EdgeError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serve error: {0}")]
    Serve(#[from] ServeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    Usage(String),

    #[error("{0}")]
    Rejected(String),
}
