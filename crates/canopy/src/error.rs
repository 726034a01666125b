//! Error types for the service facade.

use thiserror::Error;

use canopy_core::NodeRef;
use canopy_core::PermissionReference;
use canopy_engine::EngineError;
use canopy_store::StoreError;

/// Errors raised by [`crate::PermissionService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A guard check failed; the current user does not hold the
    /// permission.
    #[error("access denied: {permission} on {node}")]
    AccessDenied {
        node: NodeRef,
        permission: String,
    },

    /// The named permission is not declared in the model.
    #[error("permission {0:?} is not declared in the permission model")]
    UndeclaredPermission(String),

    /// The permission is declared but not exposed on the node's type and
    /// aspects, so an entry for it would never evaluate.
    #[error("permission {permission} cannot be set on {node}")]
    NotSettable {
        node: NodeRef,
        permission: PermissionReference,
    },

    /// An evaluation failure.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// An ACL or hierarchy store fault.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
