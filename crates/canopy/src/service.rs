//! The permission service: unified API over the evaluator and ACL store.
//!
//! The service validates names and exposure before touching storage, and
//! turns evaluation outcomes into guard-style errors where callers want
//! them.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use canopy_core::{
    AccessControlEntry, AccessPermission, AccessStatus, NodeRef, PermissionReference,
};
use canopy_engine::PermissionEngine;

use crate::error::{Result, ServiceError};

/// The main service struct.
///
/// Provides a unified API for:
/// - Evaluating permissions for the current user
/// - Guarding operations with [`PermissionService::require`]
/// - Managing per-node ACL entries and the inheritance flag
/// - Inspecting the entries visible at a node
pub struct PermissionService {
    engine: Arc<PermissionEngine>,
}

impl PermissionService {
    /// Create a service over an engine.
    pub fn new(engine: Arc<PermissionEngine>) -> Self {
        Self { engine }
    }

    /// The underlying engine.
    pub fn engine(&self) -> &PermissionEngine {
        &self.engine
    }

    // ─────────────────────────────────────────────────────────────────────
    // Evaluation
    // ─────────────────────────────────────────────────────────────────────

    /// Whether the current user holds `permission` on `node`.
    pub fn has_permission(&self, node: &NodeRef, permission: &str) -> Result<AccessStatus> {
        Ok(self.engine.has_permission(node, permission)?)
    }

    /// Guard: error unless the current user holds `permission` on `node`.
    pub fn require(&self, node: &NodeRef, permission: &str) -> Result<()> {
        match self.engine.has_permission(node, permission)? {
            AccessStatus::Allowed => Ok(()),
            AccessStatus::Denied => Err(ServiceError::AccessDenied {
                node: node.clone(),
                permission: permission.to_string(),
            }),
        }
    }

    /// The permissions settable on `node`, wildcard included.
    pub fn exposed_permissions(&self, node: &NodeRef) -> Result<HashSet<PermissionReference>> {
        Ok(self.engine.exposed_permissions(node)?)
    }

    /// The entries visible at `node`: its own plus each inherited
    /// ancestor's, with their distance from `node`.
    pub fn permission_entries(&self, node: &NodeRef) -> Result<Vec<AccessPermission>> {
        Ok(self.engine.permission_entries(node)?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // ACL Management
    // ─────────────────────────────────────────────────────────────────────

    /// Set or replace the `(authority, permission)` entry on `node`.
    ///
    /// The permission must be declared and exposed on the node; an entry
    /// that could never evaluate is rejected rather than stored.
    pub fn set_permission(
        &self,
        node: &NodeRef,
        authority: &str,
        permission: &str,
        allowed: bool,
    ) -> Result<()> {
        let reference = self.resolve(permission)?;
        if !self.engine.exposed_permissions(node)?.contains(&reference) {
            return Err(ServiceError::NotSettable {
                node: node.clone(),
                permission: reference,
            });
        }

        let entry = if allowed {
            AccessControlEntry::allow(authority, reference)
        } else {
            AccessControlEntry::deny(authority, reference)
        };
        debug!(%node, authority, permission, allowed, "setting permission entry");
        self.engine.acl().set_entry(node, entry)?;
        Ok(())
    }

    /// Remove the `(authority, permission)` entry from `node`, if present.
    pub fn delete_permission(
        &self,
        node: &NodeRef,
        authority: &str,
        permission: &str,
    ) -> Result<()> {
        let reference = self.resolve(permission)?;
        debug!(%node, authority, permission, "deleting permission entry");
        self.engine.acl().delete_entry(node, authority, &reference)?;
        Ok(())
    }

    /// Remove the node's ACL entirely; the node reverts to inheriting
    /// with no local entries.
    pub fn clear_permissions(&self, node: &NodeRef) -> Result<()> {
        debug!(%node, "clearing permissions");
        self.engine.acl().clear(node)?;
        Ok(())
    }

    /// Set whether `node` inherits entries from its primary parent.
    pub fn set_inherit_parent_permissions(&self, node: &NodeRef, inherits: bool) -> Result<()> {
        debug!(%node, inherits, "setting inheritance flag");
        self.engine.acl().set_inherits(node, inherits)?;
        Ok(())
    }

    /// Whether `node` inherits entries from its primary parent. True for
    /// a node with no ACL.
    pub fn inherit_parent_permissions(&self, node: &NodeRef) -> Result<bool> {
        Ok(self
            .engine
            .acl()
            .permissions(node)?
            .map_or(true, |acl| acl.inherits))
    }

    fn resolve(&self, permission: &str) -> Result<PermissionReference> {
        self.engine
            .model()
            .reference(permission)
            .ok_or_else(|| ServiceError::UndeclaredPermission(permission.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use canopy_testkit::{folder_chain, TestFixture};

    fn service(fixture: &TestFixture) -> PermissionService {
        PermissionService::new(fixture.engine.clone())
    }

    #[test]
    fn test_require_allows_and_denies() {
        let fixture = TestFixture::new();
        let nodes = folder_chain(&fixture, &["root", "doc"]);
        fixture.login("andy");
        fixture.allow(&nodes[0], "andy", "Consumer");

        let service = service(&fixture);
        service.require(&nodes[1], "ReadProperties").unwrap();
        assert!(matches!(
            service.require(&nodes[1], "WriteProperties"),
            Err(ServiceError::AccessDenied { .. })
        ));
    }

    #[test]
    fn test_set_permission_round_trip() {
        let fixture = TestFixture::new();
        let nodes = folder_chain(&fixture, &["root"]);
        fixture.login("andy");

        let service = service(&fixture);
        service
            .set_permission(&nodes[0], "andy", "Read", true)
            .unwrap();
        assert!(service
            .has_permission(&nodes[0], "ReadProperties")
            .unwrap()
            .is_allowed());

        service
            .delete_permission(&nodes[0], "andy", "Read")
            .unwrap();
        assert!(!service
            .has_permission(&nodes[0], "ReadProperties")
            .unwrap()
            .is_allowed());
    }

    #[test]
    fn test_set_permission_rejects_undeclared_name() {
        let fixture = TestFixture::new();
        let nodes = folder_chain(&fixture, &["root"]);

        let service = service(&fixture);
        assert!(matches!(
            service.set_permission(&nodes[0], "andy", "NoSuchPermission", true),
            Err(ServiceError::UndeclaredPermission(_))
        ));
    }

    #[test]
    fn test_set_permission_rejects_unexposed_permission() {
        let fixture = TestFixture::new();
        let nodes = folder_chain(&fixture, &["root"]);

        // Unlock needs the lockable aspect.
        let service = service(&fixture);
        assert!(matches!(
            service.set_permission(&nodes[0], "andy", "Unlock", true),
            Err(ServiceError::NotSettable { .. })
        ));

        fixture.make_lockable(&nodes[0]);
        service
            .set_permission(&nodes[0], "andy", "Unlock", true)
            .unwrap();
    }

    #[test]
    fn test_wildcard_is_settable() {
        let fixture = TestFixture::new();
        let nodes = folder_chain(&fixture, &["root"]);
        fixture.login("andy");

        let service = service(&fixture);
        service.set_permission(&nodes[0], "andy", "All", true).unwrap();
        assert!(service
            .has_permission(&nodes[0], "WriteProperties")
            .unwrap()
            .is_allowed());
    }

    #[test]
    fn test_inheritance_flag_round_trip() {
        let fixture = TestFixture::new();
        let nodes = folder_chain(&fixture, &["root", "doc"]);

        let service = service(&fixture);
        assert!(service.inherit_parent_permissions(&nodes[1]).unwrap());

        service
            .set_inherit_parent_permissions(&nodes[1], false)
            .unwrap();
        assert!(!service.inherit_parent_permissions(&nodes[1]).unwrap());
    }

    #[test]
    fn test_clear_reverts_to_inheriting() {
        let fixture = TestFixture::new();
        let nodes = folder_chain(&fixture, &["root", "doc"]);
        fixture.login("andy");
        fixture.allow(&nodes[0], "andy", "Consumer");

        let service = service(&fixture);
        service
            .set_inherit_parent_permissions(&nodes[1], false)
            .unwrap();
        assert!(!service
            .has_permission(&nodes[1], "ReadProperties")
            .unwrap()
            .is_allowed());

        service.clear_permissions(&nodes[1]).unwrap();
        assert!(service
            .has_permission(&nodes[1], "ReadProperties")
            .unwrap()
            .is_allowed());
    }
}
