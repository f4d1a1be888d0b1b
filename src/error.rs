/// Result type alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error types surfaced by the engine and its stores
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Session log error: {0}")]
    Csv(#[from] csv::Error),

    #[error("stimulus catalog has no pool with any items")]
    EmptyCatalog,
}
