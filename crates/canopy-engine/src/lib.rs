//! # Canopy Engine
//!
//! The permission evaluator. Given a compiled
//! [`PermissionModel`](canopy_model::PermissionModel), a node hierarchy,
//! ACL storage, and an authority directory, the
//! [`PermissionEngine`] answers "does the current user hold this
//! permission on this node" by running a recursive node test over the
//! primary-parent chain.
//!
//! Key behaviors:
//!
//! - **Deny overrides allow**: a deny entry anywhere on the inheritance
//!   chain vetoes matching allow entries for its authority, regardless of
//!   where on the chain the allow sits.
//! - **Inheritance**: recursive permissions are satisfied by an entry
//!   anywhere up the chain, until a node that does not inherit.
//! - **Global entries**: model-level grants that bypass node ACLs and
//!   denial processing, for administrator-style roles.
//! - **Dynamic authorities**: per-node runtime authorities such as the
//!   lock owner, fed into the authority set before evaluation.

pub mod dynamic;
pub mod engine;
pub mod error;

mod eval;

pub use dynamic::{DynamicAuthority, LockOwnerAuthority, ROLE_LOCK_OWNER};
pub use engine::{EngineConfig, PermissionEngine};
pub use error::{EngineError, Result};
