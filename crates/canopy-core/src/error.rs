//! Error types for the Canopy core.

use thiserror::Error;

/// Errors from core value parsing.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Not a valid `namespace:local` qualified name.
    #[error("invalid qualified name: {0:?}")]
    InvalidQName(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
