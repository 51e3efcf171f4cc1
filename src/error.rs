use std::path::Path;

/// Every failure the crate can report.
///
/// `Data` and `Config` are raised before the first epoch runs, `Device` aborts
/// the run when the requested backend is unavailable, and `State` marks a
/// training run that cannot be finalised (no best snapshot was ever recorded).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Missing or corrupt input file, wrong field name, or shape mismatch.
    #[error("data error: {0}")]
    Data(String),

    /// Requested compute device is not available.
    #[error("device error: {0}")]
    Device(String),

    /// Training state invariant violated (e.g. finalize without a snapshot).
    #[error("state error: {0}")]
    State(String),

    /// Invalid configuration value (e.g. unknown backbone name).
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn data_at(path: &Path, reason: impl std::fmt::Display) -> Error {
        Error::Data(format!("{}: {}", path.display(), reason))
    }
}
