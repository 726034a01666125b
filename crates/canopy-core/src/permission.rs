//! Permission value types.
//!
//! A permission is identified by a [`PermissionReference`]; per-node ACLs
//! are sets of [`AccessControlEntry`] values wrapped in [`NodePermissions`].

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::QName;

/// The wildcard authority: every principal holds it.
pub const ALL_AUTHORITIES: &str = "ALL_AUTHORITIES";

/// Conventional prefix for role authorities.
pub const ROLE_PREFIX: &str = "ROLE_";

/// Conventional prefix for group authorities.
pub const GROUP_PREFIX: &str = "GROUP_";

/// Namespace of the current security model.
pub const SECURITY_NAMESPACE: &str = "canopy.security";

/// Namespace of the pre-versioned security model.
///
/// Kept so ACL entries written before the namespace split still evaluate;
/// see [`PermissionReference::is_all`]. This is a migration shim.
pub const LEGACY_SYSTEM_NAMESPACE: &str = "canopy.system";

const ALL_PERMISSION_NAME: &str = "All";
const LEGACY_ALL_PERMISSION_NAME: &str = "all";

/// Identifies a settable permission.
///
/// Two references are equal iff both the qualifier and the name match.
/// A `None` context means the permission applies to every node type.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionReference {
    context: Option<QName>,
    name: String,
}

impl PermissionReference {
    /// Create a reference scoped to a node type or aspect.
    pub fn scoped(context: QName, name: impl Into<String>) -> Self {
        Self {
            context: Some(context),
            name: name.into(),
        }
    }

    /// Create an unscoped reference, exposed on every node type.
    pub fn unscoped(name: impl Into<String>) -> Self {
        Self {
            context: None,
            name: name.into(),
        }
    }

    /// The wildcard reference that grants, and is granted by, every
    /// permission exposed on a node.
    pub fn all() -> Self {
        Self::scoped(
            QName::new(SECURITY_NAMESPACE, ALL_PERMISSION_NAME),
            ALL_PERMISSION_NAME,
        )
    }

    /// The pre-versioned wildcard reference. Migration shim only: never
    /// written by this code, but recognized wherever the wildcard is.
    pub fn legacy_all() -> Self {
        Self::scoped(
            QName::new(LEGACY_SYSTEM_NAMESPACE, LEGACY_ALL_PERMISSION_NAME),
            LEGACY_ALL_PERMISSION_NAME,
        )
    }

    /// Whether this reference is either form of the all-permissions
    /// wildcard. Every comparison site must use this rather than direct
    /// equality against [`PermissionReference::all`].
    pub fn is_all(&self) -> bool {
        *self == Self::all() || *self == Self::legacy_all()
    }

    /// The type or aspect qualifier, if any.
    pub fn context(&self) -> Option<&QName> {
        self.context.as_ref()
    }

    /// The permission name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for PermissionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(ctx) => write!(f, "{}.{}", ctx, self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl fmt::Debug for PermissionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PermissionReference({})", self)
    }
}

/// The outcome of a permission evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessStatus {
    /// Access is granted.
    Allowed,
    /// Access is refused.
    Denied,
}

impl AccessStatus {
    /// True for [`AccessStatus::Allowed`].
    pub fn is_allowed(self) -> bool {
        matches!(self, AccessStatus::Allowed)
    }

    /// Map a boolean evaluation result onto a status.
    pub fn from_allowed(allowed: bool) -> Self {
        if allowed {
            AccessStatus::Allowed
        } else {
            AccessStatus::Denied
        }
    }
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessStatus::Allowed => f.write_str("ALLOWED"),
            AccessStatus::Denied => f.write_str("DENIED"),
        }
    }
}

/// One allow or deny entry in a node's access-control list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessControlEntry {
    /// The user, group, role, or dynamic authority the entry applies to.
    pub authority: String,

    /// The permission the entry allows or denies.
    pub permission: PermissionReference,

    /// True for an allow entry, false for a deny entry.
    pub allowed: bool,
}

impl AccessControlEntry {
    /// Create an allow entry.
    pub fn allow(authority: impl Into<String>, permission: PermissionReference) -> Self {
        Self {
            authority: authority.into(),
            permission,
            allowed: true,
        }
    }

    /// Create a deny entry.
    pub fn deny(authority: impl Into<String>, permission: PermissionReference) -> Self {
        Self {
            authority: authority.into(),
            permission,
            allowed: false,
        }
    }
}

/// The access-control list stored for one node.
///
/// Exists only for nodes that have had a permission explicitly set;
/// absence means "inherit from the parent, or nothing at the root".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePermissions {
    /// Whether entries on the primary-parent chain apply here.
    pub inherits: bool,

    /// The explicit entries on this node.
    pub entries: HashSet<AccessControlEntry>,
}

impl NodePermissions {
    /// An empty list that inherits from the parent.
    pub fn new() -> Self {
        Self {
            inherits: true,
            entries: HashSet::new(),
        }
    }

    /// Set or replace the entry for `(authority, permission)`.
    pub fn set(&mut self, entry: AccessControlEntry) {
        self.entries
            .retain(|e| !(e.authority == entry.authority && e.permission == entry.permission));
        self.entries.insert(entry);
    }

    /// Remove the entry for `(authority, permission)`, if present.
    pub fn remove(&mut self, authority: &str, permission: &PermissionReference) {
        self.entries
            .retain(|e| !(e.authority == authority && e.permission == *permission));
    }

    /// Whether the list carries no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for NodePermissions {
    fn default() -> Self {
        Self::new()
    }
}

/// One row of the explain-style permission dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPermission {
    /// The permission the entry names.
    pub permission: PermissionReference,

    /// The authority the entry applies to.
    pub authority: String,

    /// Allow or deny.
    pub status: AccessStatus,

    /// Distance up the primary-parent chain from the queried node;
    /// 0 means the entry is set on the node itself.
    pub position: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_equality_is_fieldwise() {
        let a = PermissionReference::scoped(QName::new("canopy.content", "folder"), "Read");
        let b = PermissionReference::scoped(QName::new("canopy.content", "folder"), "Read");
        let c = PermissionReference::unscoped("Read");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_both_wildcard_forms_recognized() {
        assert!(PermissionReference::all().is_all());
        assert!(PermissionReference::legacy_all().is_all());
        assert!(!PermissionReference::unscoped("Read").is_all());
        assert_ne!(PermissionReference::all(), PermissionReference::legacy_all());
    }

    #[test]
    fn test_set_replaces_opposite_entry() {
        let mut acl = NodePermissions::new();
        let read = PermissionReference::unscoped("Read");

        acl.set(AccessControlEntry::allow("andy", read.clone()));
        acl.set(AccessControlEntry::deny("andy", read.clone()));

        assert_eq!(acl.entries.len(), 1);
        assert!(!acl.entries.iter().next().unwrap().allowed);
    }

    #[test]
    fn test_remove_targets_single_pair() {
        let mut acl = NodePermissions::new();
        let read = PermissionReference::unscoped("Read");
        let write = PermissionReference::unscoped("Write");

        acl.set(AccessControlEntry::allow("andy", read.clone()));
        acl.set(AccessControlEntry::allow("andy", write));
        acl.remove("andy", &read);

        assert_eq!(acl.entries.len(), 1);
        assert_eq!(acl.entries.iter().next().unwrap().permission.name(), "Write");
    }

    #[test]
    fn test_default_inherits() {
        assert!(NodePermissions::default().inherits);
    }
}
