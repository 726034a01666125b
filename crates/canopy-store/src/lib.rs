//! # Canopy Store
//!
//! The boundary the permission evaluator consumes: node hierarchy
//! traversal, per-node ACL storage, and the authority directory, all as
//! traits, with in-memory implementations for tests and embedding.
//!
//! A repository-backed deployment implements [`NodeHierarchy`],
//! [`AccessControlStore`], and [`AuthorityDirectory`] over its own
//! storage; the evaluator never sees the difference.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::{MemoryAclStore, MemoryDirectory, MemoryHierarchy};
pub use traits::{AccessControlStore, AuthorityDirectory, NodeHierarchy, Principal};
