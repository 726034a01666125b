//! Error types for model compilation.

use thiserror::Error;

/// Errors raised while loading or compiling a permission model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A permission name was declared more than once.
    #[error("duplicate permission name: {0}")]
    DuplicatePermission(String),

    /// A declaration used a reserved wildcard name.
    #[error("permission name is reserved: {0}")]
    ReservedName(String),

    /// A grants/required/globals entry named an undeclared permission.
    #[error("unknown permission {name:?} referenced by {referenced_by:?}")]
    UnknownPermission { name: String, referenced_by: String },

    /// A set declaration with no members; it would have nothing to match
    /// and nothing to require, evaluating vacuously true.
    #[error("permission set {0:?} has no members")]
    EmptySet(String),

    /// The grants graph contains a cycle through the named permission.
    #[error("cycle in grants graph through permission {0:?}")]
    GrantCycle(String),

    /// The definition file could not be read.
    #[error("failed to read model definition: {0}")]
    Io(#[from] std::io::Error),

    /// The definition was not valid JSON for the expected shape.
    #[error("failed to parse model definition: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
