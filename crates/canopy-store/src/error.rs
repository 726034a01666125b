//! Error types for the store boundary.

use thiserror::Error;

use canopy_core::NodeRef;

/// Errors raised by hierarchy and access-control implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The node is not present in the hierarchy.
    #[error("node not found: {0}")]
    NodeNotFound(NodeRef),

    /// A backend-specific failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
