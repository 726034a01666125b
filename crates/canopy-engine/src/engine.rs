//! The permission engine: the public evaluation entry points.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use canopy_core::{
    AccessPermission, AccessStatus, NodeRef, PermissionReference, ALL_AUTHORITIES,
};
use canopy_model::PermissionModel;
use canopy_store::{AccessControlStore, AuthorityDirectory, NodeHierarchy};

use crate::dynamic::DynamicAuthority;
use crate::error::{EngineError, Result};
use crate::eval::{DeniedSet, EvalContext, NodeTest};

/// Evaluation limits.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum combined depth of hierarchy climbing and requirement
    /// recursion for one evaluation.
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_depth: 128 }
    }
}

/// The permission evaluator.
///
/// Holds the compiled model plus the storage and directory boundaries,
/// all shareable across threads. Evaluation is read-only; each call
/// resolves the authority set once and computes one [`AccessStatus`].
pub struct PermissionEngine {
    model: Arc<PermissionModel>,
    hierarchy: Arc<dyn NodeHierarchy>,
    acl: Arc<dyn AccessControlStore>,
    directory: Arc<dyn AuthorityDirectory>,
    dynamics: Vec<Arc<dyn DynamicAuthority>>,
    config: EngineConfig,
}

impl PermissionEngine {
    /// Create an engine with the default configuration and no dynamic
    /// authorities.
    pub fn new(
        model: Arc<PermissionModel>,
        hierarchy: Arc<dyn NodeHierarchy>,
        acl: Arc<dyn AccessControlStore>,
        directory: Arc<dyn AuthorityDirectory>,
    ) -> Self {
        Self {
            model,
            hierarchy,
            acl,
            directory,
            dynamics: Vec::new(),
            config: EngineConfig::default(),
        }
    }

    /// Replace the evaluation limits.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a dynamic authority provider.
    pub fn with_dynamic_authority(mut self, provider: Arc<dyn DynamicAuthority>) -> Self {
        self.dynamics.push(provider);
        self
    }

    /// The compiled permission model.
    pub fn model(&self) -> &PermissionModel {
        &self.model
    }

    /// The node hierarchy boundary.
    pub fn hierarchy(&self) -> &dyn NodeHierarchy {
        self.hierarchy.as_ref()
    }

    /// The ACL storage boundary.
    pub fn acl(&self) -> &dyn AccessControlStore {
        self.acl.as_ref()
    }

    /// The authority directory boundary.
    pub fn directory(&self) -> &dyn AuthorityDirectory {
        self.directory.as_ref()
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether the current user holds `permission` on `node`.
    ///
    /// The empty name is denied without evaluation. A name that is not
    /// declared in the model is a configuration error, not a denial.
    pub fn has_permission(&self, node: &NodeRef, permission: &str) -> Result<AccessStatus> {
        if permission.is_empty() {
            return Ok(AccessStatus::Denied);
        }
        let Some(reference) = self.model.reference(permission) else {
            return Err(EngineError::UndeclaredPermission(permission.to_string()));
        };
        self.evaluate(node, &reference, 0)
    }

    /// One full evaluation of `required` at `node`. Also the entry point
    /// for CHILDREN requirements, which re-enter here with a deeper
    /// starting depth and no inherited denial set.
    pub(crate) fn evaluate(
        &self,
        node: &NodeRef,
        required: &PermissionReference,
        depth: usize,
    ) -> Result<AccessStatus> {
        if depth > self.config.max_depth {
            return Err(EngineError::RecursionLimit(self.config.max_depth));
        }

        // Nothing to protect.
        if !self.hierarchy.exists(node) {
            return Ok(AccessStatus::Allowed);
        }

        let type_name = self.hierarchy.node_type(node)?;
        let aspects = self.hierarchy.aspects(node)?;
        if !required.is_all()
            && !self
                .model
                .exposed_permissions(&type_name, &aspects)
                .contains(required)
        {
            debug!(%node, %required, "permission not exposed on node");
            return Ok(AccessStatus::Denied);
        }

        let Some(authorities) = self.resolve_authorities(node)? else {
            debug!(%node, %required, "no authenticated principal");
            return Ok(AccessStatus::Denied);
        };

        // Global entries bypass the node walk entirely, denials included.
        let granters = self.model.granting_permissions(required);
        if self.global_match(&granters, &authorities) {
            debug!(%node, %required, "allowed by global entry");
            return Ok(AccessStatus::Allowed);
        }

        let mut ctx = EvalContext::new(self, authorities);
        let test = NodeTest::new(&self.model, required.clone(), type_name, aspects);
        let allowed = test.check(&mut ctx, node, &DeniedSet::default(), depth)?;

        let status = AccessStatus::from_allowed(allowed);
        debug!(%node, %required, %status, "evaluated");
        Ok(status)
    }

    /// The authority set for the current user at `node`, or `None` when
    /// nobody is authenticated. Includes the username, the pseudo
    /// authority granted to everyone, all transitive group and role
    /// memberships, and any dynamic authorities held for this node.
    pub fn resolve_authorities(&self, node: &NodeRef) -> Result<Option<HashSet<String>>> {
        let Some(principal) = self.directory.current_principal() else {
            return Ok(None);
        };

        let mut authorities = self.directory.authorities(&principal.username)?;
        authorities.extend(principal.roles.iter().cloned());
        authorities.insert(ALL_AUTHORITIES.to_string());
        for provider in &self.dynamics {
            if provider.has_authority(node, &principal.username) {
                authorities.insert(provider.authority().to_string());
            }
        }
        authorities.insert(principal.username);
        Ok(Some(authorities))
    }

    /// Whether any global entry grants one of `granters` to one of the
    /// held authorities.
    pub(crate) fn global_match(
        &self,
        granters: &HashSet<PermissionReference>,
        authorities: &HashSet<String>,
    ) -> bool {
        self.model.global_entries().iter().any(|entry| {
            entry.allowed
                && authorities.contains(&entry.authority)
                && granters.contains(&entry.permission)
        })
    }

    /// The entries visible at `node` for inspection: its own, then each
    /// inherited ancestor's while inheritance is unbroken. `position` is
    /// the distance from `node` to the entry's node.
    pub fn permission_entries(&self, node: &NodeRef) -> Result<Vec<AccessPermission>> {
        let mut out = Vec::new();
        let mut position = 0u32;
        let mut current = if self.hierarchy.exists(node) {
            Some(node.clone())
        } else {
            None
        };

        while let Some(n) = current {
            if position as usize > self.config.max_depth {
                return Err(EngineError::RecursionLimit(self.config.max_depth));
            }
            let acl = self.acl.permissions(&n)?;
            let inherits = acl.as_ref().map_or(true, |a| a.inherits);
            if let Some(acl) = acl {
                for entry in &acl.entries {
                    out.push(AccessPermission {
                        permission: entry.permission.clone(),
                        authority: entry.authority.clone(),
                        status: AccessStatus::from_allowed(entry.allowed),
                        position,
                    });
                }
            }
            if !inherits {
                break;
            }
            current = self.hierarchy.primary_parent(&n)?;
            position += 1;
        }
        Ok(out)
    }

    /// The permissions settable on `node` given its type and aspects,
    /// wildcard included.
    pub fn exposed_permissions(&self, node: &NodeRef) -> Result<HashSet<PermissionReference>> {
        let type_name = self.hierarchy.node_type(node)?;
        let aspects = self.hierarchy.aspects(node)?;
        let mut exposed = self.model.exposed_permissions(&type_name, &aspects);
        exposed.insert(PermissionReference::all());
        Ok(exposed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use canopy_core::{AccessControlEntry, QName};
    use canopy_store::{MemoryAclStore, MemoryDirectory, MemoryHierarchy};

    use crate::dynamic::LockOwnerAuthority;

    const MODEL_JSON: &str = r#"{
        "permissions": [
            { "name": "ReadProperties",
              "required": [ { "name": "ReadProperties", "on": "parent" } ] },
            { "name": "ReadContent",
              "required": [ { "name": "ReadContent", "on": "parent" } ] },
            { "name": "WriteProperties",
              "required": [ { "name": "WriteProperties", "on": "parent" } ] },
            { "name": "DeleteNode",
              "required": [ { "name": "DeleteNode", "on": "parent" } ] },
            { "name": "Read", "kind": "set",
              "grants": ["ReadProperties", "ReadContent"] },
            { "name": "Write", "kind": "set",
              "grants": ["WriteProperties"] },
            { "name": "Delete", "kind": "set",
              "grants": ["DeleteNode"],
              "required": [ { "name": "Delete", "on": "children" } ] },
            { "name": "Consumer", "kind": "set", "grants": ["Read"] },
            { "name": "Editor", "kind": "set", "grants": ["Read", "Write"] },
            { "name": "Unlock", "context": "canopy.content:lockable",
              "required": [ { "name": "Unlock", "on": "parent" } ] }
        ],
        "globals": [
            { "authority": "ROLE_ADMINISTRATOR", "permission": "All" },
            { "authority": "ROLE_LOCK_OWNER", "permission": "Unlock" }
        ]
    }"#;

    struct Harness {
        engine: PermissionEngine,
        hierarchy: Arc<MemoryHierarchy>,
        acl: Arc<MemoryAclStore>,
        directory: Arc<MemoryDirectory>,
        locks: Arc<LockOwnerAuthority>,
    }

    fn folder() -> QName {
        QName::new("canopy.content", "folder")
    }

    fn lockable() -> QName {
        QName::new("canopy.content", "lockable")
    }

    fn harness() -> Harness {
        let model = Arc::new(PermissionModel::from_json(MODEL_JSON).unwrap());
        let hierarchy = Arc::new(MemoryHierarchy::new());
        let acl = Arc::new(MemoryAclStore::new());
        let directory = Arc::new(MemoryDirectory::new());
        let locks = Arc::new(LockOwnerAuthority::new());
        let engine = PermissionEngine::new(
            model,
            hierarchy.clone(),
            acl.clone(),
            directory.clone(),
        )
        .with_dynamic_authority(locks.clone());
        Harness {
            engine,
            hierarchy,
            acl,
            directory,
            locks,
        }
    }

    /// root -> mid -> leaf, all plain folders, current user "andy".
    fn chain(h: &Harness) -> (NodeRef, NodeRef, NodeRef) {
        let root = NodeRef::new("root");
        let mid = NodeRef::new("mid");
        let leaf = NodeRef::new("leaf");
        h.hierarchy.add_root(root.clone(), folder());
        h.hierarchy.add_child(&root, mid.clone(), folder()).unwrap();
        h.hierarchy.add_child(&mid, leaf.clone(), folder()).unwrap();
        h.directory.set_current_user("andy");
        (root, mid, leaf)
    }

    fn unscoped(name: &str) -> PermissionReference {
        PermissionReference::unscoped(name)
    }

    fn check(h: &Harness, node: &NodeRef, permission: &str) -> AccessStatus {
        h.engine.has_permission(node, permission).unwrap()
    }

    #[test]
    fn test_allow_through_set_closure() {
        let h = harness();
        let (root, _, _) = chain(&h);
        h.acl
            .set_entry(&root, AccessControlEntry::allow("andy", unscoped("Consumer")))
            .unwrap();

        assert!(check(&h, &root, "ReadProperties").is_allowed());
        assert!(check(&h, &root, "Read").is_allowed());
        assert!(check(&h, &root, "Consumer").is_allowed());
        assert!(!check(&h, &root, "WriteProperties").is_allowed());
    }

    #[test]
    fn test_allow_inherited_down_the_chain() {
        let h = harness();
        let (root, _, leaf) = chain(&h);
        h.acl
            .set_entry(&root, AccessControlEntry::allow("andy", unscoped("Editor")))
            .unwrap();

        assert!(check(&h, &leaf, "Read").is_allowed());
        assert!(check(&h, &leaf, "Write").is_allowed());
    }

    #[test]
    fn test_deny_overrides_allow_on_same_node() {
        let h = harness();
        let (root, _, _) = chain(&h);
        h.acl
            .set_entry(&root, AccessControlEntry::allow("andy", unscoped("Read")))
            .unwrap();
        h.acl
            .set_entry(&root, AccessControlEntry::deny("andy", unscoped("Read")))
            .unwrap();

        assert!(!check(&h, &root, "ReadProperties").is_allowed());
    }

    #[test]
    fn test_deny_at_ancestor_vetoes_allow_at_node() {
        let h = harness();
        let (root, _, leaf) = chain(&h);
        h.acl
            .set_entry(&root, AccessControlEntry::deny("andy", unscoped("Read")))
            .unwrap();
        h.acl
            .set_entry(&leaf, AccessControlEntry::allow("andy", unscoped("Read")))
            .unwrap();

        assert!(!check(&h, &leaf, "ReadProperties").is_allowed());
    }

    #[test]
    fn test_deny_below_allow_on_chain() {
        let h = harness();
        let (root, mid, leaf) = chain(&h);
        h.acl
            .set_entry(&root, AccessControlEntry::allow("andy", unscoped("Read")))
            .unwrap();
        h.acl
            .set_entry(&leaf, AccessControlEntry::deny("andy", unscoped("Read")))
            .unwrap();

        // The leaf's own deny joins the chain union before the root allow
        // is matched; nodes above the deny are untouched.
        assert!(!check(&h, &leaf, "ReadProperties").is_allowed());
        assert!(check(&h, &mid, "ReadProperties").is_allowed());
    }

    #[test]
    fn test_legacy_wildcard_deny_vetoes() {
        let h = harness();
        let (root, _, leaf) = chain(&h);
        h.acl
            .set_entry(&leaf, AccessControlEntry::allow("andy", unscoped("Read")))
            .unwrap();
        h.acl
            .set_entry(
                &root,
                AccessControlEntry::deny("andy", PermissionReference::legacy_all()),
            )
            .unwrap();

        assert!(!check(&h, &leaf, "ReadProperties").is_allowed());
    }

    #[test]
    fn test_deny_of_set_vetoes_members_and_granters() {
        let h = harness();
        let (root, _, _) = chain(&h);
        h.acl
            .set_entry(&root, AccessControlEntry::allow("andy", unscoped("Consumer")))
            .unwrap();
        h.acl
            .set_entry(&root, AccessControlEntry::deny("andy", unscoped("Read")))
            .unwrap();

        // The deny covers Read's granters (Consumer) and grantees
        // (ReadProperties), so the Consumer entry no longer helps.
        assert!(!check(&h, &root, "ReadProperties").is_allowed());
    }

    #[test]
    fn test_deny_is_authority_exact() {
        let h = harness();
        let (root, _, _) = chain(&h);
        h.directory.add_membership("andy", "GROUP_staff");
        h.acl
            .set_entry(
                &root,
                AccessControlEntry::allow("GROUP_staff", unscoped("Read")),
            )
            .unwrap();
        h.acl
            .set_entry(&root, AccessControlEntry::deny("frog", unscoped("Read")))
            .unwrap();

        // The deny names a different authority; the group allow stands.
        assert!(check(&h, &root, "ReadProperties").is_allowed());
    }

    #[test]
    fn test_severed_inheritance_blocks_inherited_allow() {
        let h = harness();
        let (root, mid, leaf) = chain(&h);
        h.acl
            .set_entry(&root, AccessControlEntry::allow("andy", unscoped("Read")))
            .unwrap();
        h.acl.set_inherits(&mid, false).unwrap();

        assert!(!check(&h, &mid, "ReadProperties").is_allowed());
        assert!(!check(&h, &leaf, "ReadProperties").is_allowed());
    }

    #[test]
    fn test_severed_inheritance_blocks_ancestor_deny() {
        let h = harness();
        let (root, mid, leaf) = chain(&h);
        h.acl
            .set_entry(&root, AccessControlEntry::deny("andy", unscoped("Read")))
            .unwrap();
        h.acl.set_inherits(&mid, false).unwrap();
        h.acl
            .set_entry(&mid, AccessControlEntry::allow("andy", unscoped("Read")))
            .unwrap();

        assert!(check(&h, &mid, "ReadProperties").is_allowed());
        assert!(check(&h, &leaf, "ReadProperties").is_allowed());
    }

    #[test]
    fn test_all_authorities_entry_matches_any_user() {
        let h = harness();
        let (root, _, _) = chain(&h);
        h.acl
            .set_entry(
                &root,
                AccessControlEntry::allow(ALL_AUTHORITIES, unscoped("Read")),
            )
            .unwrap();

        assert!(check(&h, &root, "ReadProperties").is_allowed());

        h.directory.set_current_user("lemur");
        assert!(check(&h, &root, "ReadProperties").is_allowed());
    }

    #[test]
    fn test_wildcard_entry_grants_everything() {
        let h = harness();
        let (root, _, leaf) = chain(&h);
        h.acl
            .set_entry(
                &root,
                AccessControlEntry::allow("andy", PermissionReference::all()),
            )
            .unwrap();

        assert!(check(&h, &leaf, "ReadProperties").is_allowed());
        assert!(check(&h, &leaf, "WriteProperties").is_allowed());
        assert!(check(&h, &leaf, "All").is_allowed());
    }

    #[test]
    fn test_wildcard_deny_covers_exposed_permissions() {
        let h = harness();
        let (root, _, _) = chain(&h);
        h.acl
            .set_entry(&root, AccessControlEntry::allow("andy", unscoped("Editor")))
            .unwrap();
        h.acl
            .set_entry(
                &root,
                AccessControlEntry::deny("andy", PermissionReference::all()),
            )
            .unwrap();

        assert!(!check(&h, &root, "ReadProperties").is_allowed());
        assert!(!check(&h, &root, "WriteProperties").is_allowed());
    }

    #[test]
    fn test_global_entry_is_deny_immune() {
        let h = harness();
        let (root, _, leaf) = chain(&h);
        h.directory.add_membership("andy", "ROLE_ADMINISTRATOR");
        h.acl
            .set_entry(
                &root,
                AccessControlEntry::deny("andy", PermissionReference::all()),
            )
            .unwrap();

        assert!(check(&h, &leaf, "ReadProperties").is_allowed());
        assert!(check(&h, &leaf, "All").is_allowed());
    }

    #[test]
    fn test_exposure_gates_scoped_permission() {
        let h = harness();
        let (root, _, leaf) = chain(&h);
        let unlock = PermissionReference::scoped(lockable(), "Unlock");
        h.acl
            .set_entry(&root, AccessControlEntry::allow("andy", unlock))
            .unwrap();

        // Not lockable: denied regardless of the entry.
        assert!(!check(&h, &leaf, "Unlock").is_allowed());

        h.hierarchy.add_aspect(&leaf, lockable()).unwrap();
        assert!(check(&h, &leaf, "Unlock").is_allowed());
    }

    #[test]
    fn test_lock_owner_dynamic_authority() {
        let h = harness();
        let (_, _, leaf) = chain(&h);
        h.hierarchy.add_aspect(&leaf, lockable()).unwrap();
        h.locks.lock(leaf.clone(), "andy");

        assert!(check(&h, &leaf, "Unlock").is_allowed());

        h.directory.set_current_user("lemur");
        assert!(!check(&h, &leaf, "Unlock").is_allowed());
    }

    #[test]
    fn test_children_requirement_fans_out() {
        let h = harness();
        let (root, mid, leaf) = chain(&h);
        h.acl
            .set_entry(&root, AccessControlEntry::allow("andy", unscoped("Delete")))
            .unwrap();

        assert!(check(&h, &root, "Delete").is_allowed());

        // A deny on one descendant blocks the whole subtree delete.
        h.acl
            .set_entry(&leaf, AccessControlEntry::deny("andy", unscoped("DeleteNode")))
            .unwrap();
        assert!(!check(&h, &root, "Delete").is_allowed());
        assert!(!check(&h, &mid, "Delete").is_allowed());
        assert!(!check(&h, &leaf, "DeleteNode").is_allowed());
    }

    #[test]
    fn test_empty_permission_name_denied() {
        let h = harness();
        let (root, _, _) = chain(&h);
        assert!(!check(&h, &root, "").is_allowed());
    }

    #[test]
    fn test_undeclared_permission_is_error() {
        let h = harness();
        let (root, _, _) = chain(&h);
        let result = h.engine.has_permission(&root, "NoSuchPermission");
        assert!(matches!(result, Err(EngineError::UndeclaredPermission(_))));
    }

    #[test]
    fn test_missing_node_allowed() {
        let h = harness();
        chain(&h);
        let ghost = NodeRef::new("ghost");
        assert!(check(&h, &ghost, "ReadProperties").is_allowed());
    }

    #[test]
    fn test_no_principal_denied() {
        let h = harness();
        let (root, _, _) = chain(&h);
        h.acl
            .set_entry(
                &root,
                AccessControlEntry::allow(ALL_AUTHORITIES, unscoped("Read")),
            )
            .unwrap();
        h.directory.clear_current_user();

        assert!(!check(&h, &root, "ReadProperties").is_allowed());
    }

    #[test]
    fn test_recursion_limit_on_deep_chain() {
        let model = Arc::new(PermissionModel::from_json(MODEL_JSON).unwrap());
        let hierarchy = Arc::new(MemoryHierarchy::new());
        let acl = Arc::new(MemoryAclStore::new());
        let directory = Arc::new(MemoryDirectory::new());
        let engine = PermissionEngine::new(
            model,
            hierarchy.clone(),
            acl.clone(),
            directory.clone(),
        )
        .with_config(EngineConfig { max_depth: 4 });

        let mut parent = NodeRef::new("n0");
        hierarchy.add_root(parent.clone(), folder());
        for i in 1..8 {
            let node = NodeRef::new(format!("n{i}"));
            hierarchy.add_child(&parent, node.clone(), folder()).unwrap();
            parent = node;
        }
        directory.set_current_user("andy");

        let result = engine.has_permission(&parent, "ReadProperties");
        assert!(matches!(result, Err(EngineError::RecursionLimit(4))));
    }

    #[test]
    fn test_permission_entries_walk_inheritance() {
        let h = harness();
        let (root, mid, leaf) = chain(&h);
        h.acl
            .set_entry(&root, AccessControlEntry::allow("andy", unscoped("Read")))
            .unwrap();
        h.acl
            .set_entry(&mid, AccessControlEntry::deny("frog", unscoped("Write")))
            .unwrap();

        let entries = h.engine.permission_entries(&leaf).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries
            .iter()
            .any(|e| e.authority == "frog" && e.position == 1));
        assert!(entries
            .iter()
            .any(|e| e.authority == "andy" && e.position == 2));

        h.acl.set_inherits(&mid, false).unwrap();
        let entries = h.engine.permission_entries(&leaf).unwrap();
        assert!(entries.iter().all(|e| e.authority != "andy"));
    }

    #[test]
    fn test_exposed_permissions_include_wildcard() {
        let h = harness();
        let (root, _, _) = chain(&h);
        let exposed = h.engine.exposed_permissions(&root).unwrap();
        assert!(exposed.contains(&unscoped("Read")));
        assert!(exposed.contains(&PermissionReference::all()));
        assert!(!exposed.iter().any(|p| p.name() == "Unlock"));
    }
}
