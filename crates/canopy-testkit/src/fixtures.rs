//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a compiled default model, the
//! in-memory stores, and short-hand mutators for trees, ACLs, and users.

use std::collections::HashSet;
use std::sync::Arc;

use canopy_core::{AccessControlEntry, AccessStatus, NodeRef, PermissionReference, QName};
use canopy_engine::{LockOwnerAuthority, PermissionEngine};
use canopy_model::PermissionModel;
use canopy_store::{AccessControlStore, MemoryAclStore, MemoryDirectory, MemoryHierarchy};

/// The default permission model used across the test suite.
///
/// A trimmed content-repository model: recursive atomic permissions,
/// aggregating sets, role sets, a subtree-delete set, an aspect-scoped
/// unlock permission, and the administrator and lock-owner globals.
pub const DEFAULT_MODEL_JSON: &str = r#"{
    "permissions": [
        { "name": "ReadProperties",
          "required": [ { "name": "ReadProperties", "on": "parent" } ] },
        { "name": "ReadChildren",
          "required": [ { "name": "ReadChildren", "on": "parent" } ] },
        { "name": "ReadContent",
          "required": [ { "name": "ReadContent", "on": "parent" } ] },
        { "name": "WriteProperties",
          "required": [ { "name": "WriteProperties", "on": "parent" } ] },
        { "name": "WriteContent",
          "required": [ { "name": "WriteContent", "on": "parent" } ] },
        { "name": "AddChildren",
          "required": [ { "name": "AddChildren", "on": "parent" } ] },
        { "name": "DeleteNode",
          "required": [ { "name": "DeleteNode", "on": "parent" } ] },
        { "name": "CheckOut",
          "required": [ { "name": "CheckOut", "on": "parent" } ] },
        { "name": "CheckIn",
          "required": [ { "name": "CheckIn", "on": "parent" } ] },
        { "name": "Unlock", "context": "canopy.content:lockable",
          "required": [ { "name": "Unlock", "on": "parent" } ] },

        { "name": "Read", "kind": "set",
          "grants": ["ReadProperties", "ReadChildren", "ReadContent"] },
        { "name": "Write", "kind": "set",
          "grants": ["WriteProperties", "WriteContent"] },
        { "name": "Delete", "kind": "set",
          "grants": ["DeleteNode"],
          "required": [ { "name": "Delete", "on": "children" } ] },

        { "name": "Consumer", "kind": "set", "grants": ["Read"] },
        { "name": "Editor", "kind": "set",
          "grants": ["Read", "Write", "CheckOut", "CheckIn"] },
        { "name": "Collaborator", "kind": "set",
          "grants": ["Editor", "AddChildren", "Delete"] }
    ],
    "globals": [
        { "authority": "ROLE_ADMINISTRATOR", "permission": "All" },
        { "authority": "ROLE_LOCK_OWNER", "permission": "Unlock" }
    ]
}"#;

/// The folder node type used by fixture trees.
pub fn folder_type() -> QName {
    QName::new("canopy.content", "folder")
}

/// The document node type used by fixture trees.
pub fn document_type() -> QName {
    QName::new("canopy.content", "document")
}

/// The aspect that exposes the lock-related permissions.
pub fn lockable_aspect() -> QName {
    QName::new("canopy.content", "lockable")
}

/// A test fixture with the default model, in-memory stores, and an engine
/// wired over them.
pub struct TestFixture {
    pub model: Arc<PermissionModel>,
    pub hierarchy: Arc<MemoryHierarchy>,
    pub acl: Arc<MemoryAclStore>,
    pub directory: Arc<MemoryDirectory>,
    pub locks: Arc<LockOwnerAuthority>,
    pub engine: Arc<PermissionEngine>,
}

impl TestFixture {
    /// Create a fixture with [`DEFAULT_MODEL_JSON`].
    pub fn new() -> Self {
        Self::with_model(DEFAULT_MODEL_JSON)
    }

    /// Create a fixture with a custom model definition.
    pub fn with_model(json: &str) -> Self {
        let model = Arc::new(PermissionModel::from_json(json).expect("valid model"));
        let hierarchy = Arc::new(MemoryHierarchy::new());
        let acl = Arc::new(MemoryAclStore::new());
        let directory = Arc::new(MemoryDirectory::new());
        let locks = Arc::new(LockOwnerAuthority::new());
        let engine = Arc::new(
            PermissionEngine::new(
                model.clone(),
                hierarchy.clone(),
                acl.clone(),
                directory.clone(),
            )
            .with_dynamic_authority(locks.clone()),
        );
        Self {
            model,
            hierarchy,
            acl,
            directory,
            locks,
            engine,
        }
    }

    /// Add a root folder.
    pub fn add_root(&self, name: &str) -> NodeRef {
        let node = NodeRef::new(name);
        self.hierarchy.add_root(node.clone(), folder_type());
        node
    }

    /// Add a folder under `parent`.
    pub fn add_folder(&self, parent: &NodeRef, name: &str) -> NodeRef {
        let node = NodeRef::new(name);
        self.hierarchy
            .add_child(parent, node.clone(), folder_type())
            .expect("parent exists");
        node
    }

    /// Add a document under `parent`.
    pub fn add_document(&self, parent: &NodeRef, name: &str) -> NodeRef {
        let node = NodeRef::new(name);
        self.hierarchy
            .add_child(parent, node.clone(), document_type())
            .expect("parent exists");
        node
    }

    /// Apply the lockable aspect to a node.
    pub fn make_lockable(&self, node: &NodeRef) {
        self.hierarchy
            .add_aspect(node, lockable_aspect())
            .expect("node exists");
    }

    /// Authenticate as `username` for subsequent evaluations.
    pub fn login(&self, username: &str) {
        self.directory.set_current_user(username);
    }

    /// Clear the authenticated user.
    pub fn logout(&self) {
        self.directory.clear_current_user();
    }

    /// Record that `member` belongs to `container`.
    pub fn join(&self, member: &str, container: &str) {
        self.directory.add_membership(member, container);
    }

    /// Resolve a declared permission name.
    pub fn permission(&self, name: &str) -> PermissionReference {
        self.model.reference(name).expect("declared permission")
    }

    /// Set an allow entry.
    pub fn allow(&self, node: &NodeRef, authority: &str, permission: &str) {
        self.acl
            .set_entry(
                node,
                AccessControlEntry::allow(authority, self.permission(permission)),
            )
            .expect("set entry");
    }

    /// Set a deny entry.
    pub fn deny(&self, node: &NodeRef, authority: &str, permission: &str) {
        self.acl
            .set_entry(
                node,
                AccessControlEntry::deny(authority, self.permission(permission)),
            )
            .expect("set entry");
    }

    /// Stop the node inheriting entries from its parent.
    pub fn sever(&self, node: &NodeRef) {
        self.acl.set_inherits(node, false).expect("set inherits");
    }

    /// Record `owner` as holding the node's lock.
    pub fn lock(&self, node: &NodeRef, owner: &str) {
        self.locks.lock(node.clone(), owner);
    }

    /// Evaluate a permission for the current user.
    pub fn check(&self, node: &NodeRef, permission: &str) -> AccessStatus {
        self.engine
            .has_permission(node, permission)
            .expect("evaluation succeeds")
    }

    /// The names of every permission in the default model, atomics first.
    pub fn declared_names(&self) -> Vec<&'static str> {
        vec![
            "ReadProperties",
            "ReadChildren",
            "ReadContent",
            "WriteProperties",
            "WriteContent",
            "AddChildren",
            "DeleteNode",
            "CheckOut",
            "CheckIn",
            "Read",
            "Write",
            "Delete",
            "Consumer",
            "Editor",
            "Collaborator",
        ]
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a linear folder chain `names[0] -> names[1] -> ...` and return
/// the nodes in order.
pub fn folder_chain(fixture: &TestFixture, names: &[&str]) -> Vec<NodeRef> {
    let mut nodes = Vec::with_capacity(names.len());
    for name in names {
        let node = match nodes.last() {
            None => fixture.add_root(name),
            Some(parent) => fixture.add_folder(parent, name),
        };
        nodes.push(node);
    }
    nodes
}

/// The aspects applied to a node, for assertions.
pub fn aspects_of(fixture: &TestFixture, node: &NodeRef) -> HashSet<QName> {
    use canopy_store::NodeHierarchy;
    fixture.hierarchy.aspects(node).expect("node exists")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_compiles() {
        let fixture = TestFixture::new();
        for name in fixture.declared_names() {
            assert!(fixture.model.reference(name).is_some(), "{name} declared");
        }
    }

    #[test]
    fn test_acl_helpers_drive_evaluation() {
        let fixture = TestFixture::new();
        let nodes = folder_chain(&fixture, &["root", "doc"]);
        fixture.login("andy");

        fixture.allow(&nodes[0], "andy", "Consumer");
        assert!(fixture.check(&nodes[1], "ReadProperties").is_allowed());

        fixture.sever(&nodes[1]);
        assert!(!fixture.check(&nodes[1], "ReadProperties").is_allowed());

        fixture.deny(&nodes[0], "andy", "Read");
        assert!(!fixture.check(&nodes[0], "ReadProperties").is_allowed());
    }

    #[test]
    fn test_folder_chain_links_parents() {
        use canopy_store::NodeHierarchy;

        let fixture = TestFixture::new();
        let nodes = folder_chain(&fixture, &["a", "b", "c"]);

        assert_eq!(
            fixture.hierarchy.primary_parent(&nodes[2]).unwrap(),
            Some(nodes[1].clone())
        );
        assert_eq!(fixture.hierarchy.primary_parent(&nodes[0]).unwrap(), None);
    }
}
