//! In-memory implementations of the boundary traits.
//!
//! Primarily for tests and embedding. Semantics match what a
//! repository-backed implementation would provide, with everything held
//! in memory behind RwLocks.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use canopy_core::{
    AccessControlEntry, NodePermissions, NodeRef, PermissionReference, QName, ROLE_PREFIX,
};

use crate::error::{Result, StoreError};
use crate::traits::{AccessControlStore, AuthorityDirectory, NodeHierarchy, Principal};

/// In-memory node hierarchy.
pub struct MemoryHierarchy {
    inner: RwLock<HierarchyInner>,
}

#[derive(Default)]
struct HierarchyInner {
    nodes: HashMap<NodeRef, NodeInfo>,
}

struct NodeInfo {
    node_type: QName,
    aspects: HashSet<QName>,
    parent: Option<NodeRef>,
    children: Vec<NodeRef>,
}

impl MemoryHierarchy {
    /// Create an empty hierarchy.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HierarchyInner::default()),
        }
    }

    /// Add a root node (no parent).
    pub fn add_root(&self, node: NodeRef, node_type: QName) {
        let mut inner = self.inner.write().unwrap();
        inner.nodes.insert(
            node,
            NodeInfo {
                node_type,
                aspects: HashSet::new(),
                parent: None,
                children: Vec::new(),
            },
        );
    }

    /// Add a node under an existing primary parent.
    pub fn add_child(&self, parent: &NodeRef, node: NodeRef, node_type: QName) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if !inner.nodes.contains_key(parent) {
            return Err(StoreError::NodeNotFound(parent.clone()));
        }
        inner.nodes.insert(
            node.clone(),
            NodeInfo {
                node_type,
                aspects: HashSet::new(),
                parent: Some(parent.clone()),
                children: Vec::new(),
            },
        );
        inner
            .nodes
            .get_mut(parent)
            .expect("checked above")
            .children
            .push(node);
        Ok(())
    }

    /// Apply an aspect to a node.
    pub fn add_aspect(&self, node: &NodeRef, aspect: QName) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let info = inner
            .nodes
            .get_mut(node)
            .ok_or_else(|| StoreError::NodeNotFound(node.clone()))?;
        info.aspects.insert(aspect);
        Ok(())
    }

    /// Remove a node and detach it from its parent. Descendants become
    /// unreachable and are removed too.
    pub fn remove_node(&self, node: &NodeRef) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if !inner.nodes.contains_key(node) {
            return Err(StoreError::NodeNotFound(node.clone()));
        }

        let mut pending = vec![node.clone()];
        let mut removed = Vec::new();
        while let Some(n) = pending.pop() {
            if let Some(info) = inner.nodes.remove(&n) {
                pending.extend(info.children);
                removed.push((n, info.parent));
            }
        }
        for (n, parent) in removed {
            if let Some(parent) = parent {
                if let Some(pinfo) = inner.nodes.get_mut(&parent) {
                    pinfo.children.retain(|c| *c != n);
                }
            }
        }
        Ok(())
    }
}

impl Default for MemoryHierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeHierarchy for MemoryHierarchy {
    fn exists(&self, node: &NodeRef) -> bool {
        let inner = self.inner.read().unwrap();
        inner.nodes.contains_key(node)
    }

    fn primary_parent(&self, node: &NodeRef) -> Result<Option<NodeRef>> {
        let inner = self.inner.read().unwrap();
        inner
            .nodes
            .get(node)
            .map(|info| info.parent.clone())
            .ok_or_else(|| StoreError::NodeNotFound(node.clone()))
    }

    fn children(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
        let inner = self.inner.read().unwrap();
        inner
            .nodes
            .get(node)
            .map(|info| info.children.clone())
            .ok_or_else(|| StoreError::NodeNotFound(node.clone()))
    }

    fn node_type(&self, node: &NodeRef) -> Result<QName> {
        let inner = self.inner.read().unwrap();
        inner
            .nodes
            .get(node)
            .map(|info| info.node_type.clone())
            .ok_or_else(|| StoreError::NodeNotFound(node.clone()))
    }

    fn aspects(&self, node: &NodeRef) -> Result<HashSet<QName>> {
        let inner = self.inner.read().unwrap();
        inner
            .nodes
            .get(node)
            .map(|info| info.aspects.clone())
            .ok_or_else(|| StoreError::NodeNotFound(node.clone()))
    }
}

/// In-memory ACL store.
///
/// Mutations take the write lock, which serializes them; evaluations only
/// take the read lock.
pub struct MemoryAclStore {
    inner: RwLock<HashMap<NodeRef, NodePermissions>>,
}

impl MemoryAclStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryAclStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessControlStore for MemoryAclStore {
    fn permissions(&self, node: &NodeRef) -> Result<Option<NodePermissions>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.get(node).cloned())
    }

    fn set_entry(&self, node: &NodeRef, entry: AccessControlEntry) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.entry(node.clone()).or_default().set(entry);
        Ok(())
    }

    fn delete_entry(
        &self,
        node: &NodeRef,
        authority: &str,
        permission: &PermissionReference,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(acl) = inner.get_mut(node) {
            acl.remove(authority, permission);
        }
        Ok(())
    }

    fn clear(&self, node: &NodeRef) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.remove(node);
        Ok(())
    }

    fn set_inherits(&self, node: &NodeRef, inherits: bool) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.entry(node.clone()).or_default().inherits = inherits;
        Ok(())
    }
}

/// In-memory authority directory with an explicit current user.
pub struct MemoryDirectory {
    inner: RwLock<DirectoryInner>,
}

#[derive(Default)]
struct DirectoryInner {
    current: Option<String>,
    /// Direct memberships: authority -> containers it belongs to.
    memberships: HashMap<String, HashSet<String>>,
}

impl MemoryDirectory {
    /// Create an empty directory with no authenticated user.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(DirectoryInner::default()),
        }
    }

    /// Set the authenticated user for subsequent evaluations.
    pub fn set_current_user(&self, username: impl Into<String>) {
        let mut inner = self.inner.write().unwrap();
        inner.current = Some(username.into());
    }

    /// Clear the authenticated user.
    pub fn clear_current_user(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.current = None;
    }

    /// Record that `member` belongs to `container` (a group or role).
    pub fn add_membership(&self, member: impl Into<String>, container: impl Into<String>) {
        let mut inner = self.inner.write().unwrap();
        inner
            .memberships
            .entry(member.into())
            .or_default()
            .insert(container.into());
    }

    fn transitive(&self, start: &str) -> HashSet<String> {
        let inner = self.inner.read().unwrap();
        let mut seen = HashSet::new();
        let mut pending = vec![start.to_string()];
        while let Some(authority) = pending.pop() {
            if let Some(containers) = inner.memberships.get(&authority) {
                for container in containers {
                    if seen.insert(container.clone()) {
                        pending.push(container.clone());
                    }
                }
            }
        }
        seen
    }
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthorityDirectory for MemoryDirectory {
    fn current_principal(&self) -> Option<Principal> {
        let username = {
            let inner = self.inner.read().unwrap();
            inner.current.clone()?
        };
        let roles = self
            .transitive(&username)
            .into_iter()
            .filter(|a| a.starts_with(ROLE_PREFIX))
            .collect();
        Some(Principal { username, roles })
    }

    fn authorities(&self, username: &str) -> Result<HashSet<String>> {
        Ok(self.transitive(username))
    }
}
