//! Boundary traits consumed by the permission evaluator.
//!
//! These keep the evaluator agnostic of where node structure, ACLs, and
//! principal information live. Implementations include the in-memory
//! versions in this crate; a repository-backed deployment supplies its
//! own.
//!
//! All traits are synchronous: the evaluator is a pure, read-mostly
//! computation expected to run inside one ambient transaction/snapshot,
//! with no suspension points mid-evaluation.

use std::collections::HashSet;

use canopy_core::{AccessControlEntry, NodePermissions, NodeRef, PermissionReference, QName};

use crate::error::Result;

/// Primary-parent/child traversal and per-node metadata.
///
/// # Design Notes
///
/// - **Missing nodes**: `exists` is the only query defined for an unknown
///   node; the others return [`crate::StoreError::NodeNotFound`].
/// - **Primary parent**: every node has at most one; the root has none.
pub trait NodeHierarchy: Send + Sync {
    /// Whether the node is present in the hierarchy.
    fn exists(&self, node: &NodeRef) -> bool;

    /// The node's primary parent, or `None` at the root.
    fn primary_parent(&self, node: &NodeRef) -> Result<Option<NodeRef>>;

    /// The node's direct children, in insertion order.
    fn children(&self, node: &NodeRef) -> Result<Vec<NodeRef>>;

    /// The node's type.
    fn node_type(&self, node: &NodeRef) -> Result<QName>;

    /// The aspects applied to the node.
    fn aspects(&self, node: &NodeRef) -> Result<HashSet<QName>>;
}

/// Per-node ACL storage.
///
/// # Design Notes
///
/// - **Lazy creation**: a node has no [`NodePermissions`] until the first
///   mutation touches it; `permissions` returns `None` for such nodes and
///   evaluation treats that as "inherit, no local entries".
/// - **Serialized mutations**: implementations must serialize mutations
///   per node (the in-memory store uses a write lock; a database-backed
///   store would rely on row locking). Concurrent evaluations of
///   unrelated nodes are not blocked.
pub trait AccessControlStore: Send + Sync {
    /// The node's ACL, or `None` if no permission was ever set on it.
    fn permissions(&self, node: &NodeRef) -> Result<Option<NodePermissions>>;

    /// Set or replace the entry for the entry's `(authority, permission)`
    /// pair, creating the node's ACL if absent.
    fn set_entry(&self, node: &NodeRef, entry: AccessControlEntry) -> Result<()>;

    /// Remove one `(authority, permission)` entry, if present.
    fn delete_entry(
        &self,
        node: &NodeRef,
        authority: &str,
        permission: &PermissionReference,
    ) -> Result<()>;

    /// Remove the node's ACL entirely.
    fn clear(&self, node: &NodeRef) -> Result<()>;

    /// Set the inherit-from-parent flag, creating the ACL if absent.
    fn set_inherits(&self, node: &NodeRef, inherits: bool) -> Result<()>;
}

/// The authenticated principal of the current evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// The principal's username.
    pub username: String,

    /// Roles held directly by the principal.
    pub roles: HashSet<String>,
}

impl Principal {
    /// A principal with no direct roles.
    pub fn named(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            roles: HashSet::new(),
        }
    }
}

/// Access to the authentication context and the authority directory.
pub trait AuthorityDirectory: Send + Sync {
    /// The currently authenticated principal, if any.
    fn current_principal(&self) -> Option<Principal>;

    /// Every group and role authority the user holds, transitively
    /// (groups containing groups, roles granted to groups).
    fn authorities(&self, username: &str) -> Result<HashSet<String>>;
}
