use thiserror::Error;

/// Error taxonomy surfaced by the cache.
///
/// `Clone` so the same value can be returned to the caller and published
/// through the `last_error` watch channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Required field '{0}' is blank")]
    Validation(String),

    #[error("Listing '{0}' not found")]
    NotFound(String),

    #[error("Image upload failed: {0}")]
    Upload(String),

    #[error("Remote write failed: {0}")]
    RemoteWrite(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
