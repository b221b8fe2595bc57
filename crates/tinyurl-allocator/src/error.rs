use thiserror::Error;
use tinyurl_core::{CoreError, StorageError};

pub type Result<T> = std::result::Result<T, AllocatorError>;

#[derive(Debug, Clone, Error)]
pub enum AllocatorError {
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// Every salt up to the collision limit produced a taken code.
    #[error("no free short code after {attempts} attempts")]
    Exhausted { attempts: u32 },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<CoreError> for AllocatorError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidShortCode(message) => Self::InvalidShortCode(message),
            CoreError::InvalidUrl(message) => Self::InvalidUrl(message),
        }
    }
}
