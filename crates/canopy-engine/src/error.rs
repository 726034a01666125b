//! Error types for the evaluator.
//!
//! A normal allow/deny outcome is never an error. Errors surface
//! configuration mistakes and store faults so they are visible during
//! development rather than folded into DENIED.

use thiserror::Error;

use canopy_store::StoreError;

/// Errors raised during permission evaluation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested permission name is not declared in the model.
    #[error("permission {0:?} is not declared in the permission model")]
    UndeclaredPermission(String),

    /// Evaluation exceeded the configured recursion limit. Either the
    /// hierarchy is pathologically deep or the model's required-permission
    /// relations form a parent/children cycle.
    #[error("evaluation exceeded the recursion limit of {0}")]
    RecursionLimit(usize),

    /// A hierarchy or ACL store fault.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for evaluator operations.
pub type Result<T> = std::result::Result<T, EngineError>;
