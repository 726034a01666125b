//! Dynamic authorities: authorities computed at evaluation time rather
//! than stored in any ACL.
//!
//! A provider grants its named authority to the current user for a
//! specific node; lock owner and working-copy owner are the classic
//! cases. Providers are registered with the engine as an ordered list
//! and consulted once per top-level evaluation.

use std::collections::HashMap;
use std::sync::RwLock;

use canopy_core::NodeRef;

/// The authority granted to the holder of a node's lock.
pub const ROLE_LOCK_OWNER: &str = "ROLE_LOCK_OWNER";

/// A runtime-computed authority.
pub trait DynamicAuthority: Send + Sync {
    /// The authority name this provider can grant.
    fn authority(&self) -> &str;

    /// Whether the user holds the authority for this node.
    fn has_authority(&self, node: &NodeRef, username: &str) -> bool;
}

/// Grants [`ROLE_LOCK_OWNER`] to whoever holds a node's lock.
///
/// Backed by an in-process lock table; a real deployment adapts its lock
/// service behind the same trait.
pub struct LockOwnerAuthority {
    locks: RwLock<HashMap<NodeRef, String>>,
}

impl LockOwnerAuthority {
    /// Create a provider with no locks held.
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Record that `owner` holds the lock on `node`.
    pub fn lock(&self, node: NodeRef, owner: impl Into<String>) {
        let mut locks = self.locks.write().unwrap();
        locks.insert(node, owner.into());
    }

    /// Release the lock on `node`, if any.
    pub fn unlock(&self, node: &NodeRef) {
        let mut locks = self.locks.write().unwrap();
        locks.remove(node);
    }

    /// The current lock owner of `node`.
    pub fn owner(&self, node: &NodeRef) -> Option<String> {
        let locks = self.locks.read().unwrap();
        locks.get(node).cloned()
    }
}

impl Default for LockOwnerAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicAuthority for LockOwnerAuthority {
    fn authority(&self) -> &str {
        ROLE_LOCK_OWNER
    }

    fn has_authority(&self, node: &NodeRef, username: &str) -> bool {
        let locks = self.locks.read().unwrap();
        locks.get(node).map(String::as_str) == Some(username)
    }
}
