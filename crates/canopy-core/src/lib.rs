//! # Canopy Core
//!
//! Core primitives for the Canopy permission engine: qualified names,
//! node references, and permission value types.
//!
//! ## Key Concepts
//!
//! - **PermissionReference**: a qualified permission name; the key into
//!   the permission model's closures.
//! - **AccessControlEntry**: one allow/deny row in a node's ACL.
//! - **NodePermissions**: a node's ACL plus its inherit-from-parent flag.
//! - **ALL_PERMISSIONS**: the wildcard reference, in both its current and
//!   legacy forms ([`PermissionReference::is_all`]).

pub mod error;
pub mod permission;
pub mod types;

pub use error::{CoreError, Result};
pub use permission::{
    AccessControlEntry, AccessPermission, AccessStatus, NodePermissions, PermissionReference,
    ALL_AUTHORITIES, GROUP_PREFIX, LEGACY_SYSTEM_NAMESPACE, ROLE_PREFIX, SECURITY_NAMESPACE,
};
pub use types::{NodeRef, QName};
