//! # Canopy
//!
//! The unified API for Canopy permissions: a declarative permission
//! model evaluated over a node hierarchy with per-node ACLs.
//!
//! ## Overview
//!
//! Canopy provides a portable, storage-agnostic library for:
//!
//! - **Models**: permissions and permission sets declared in JSON, with
//!   granting relationships compiled into closures
//! - **Evaluation**: recursive node tests over the primary-parent chain,
//!   with deny-overrides-allow semantics
//! - **ACL management**: allow/deny entries per node, inheritance
//!   severing, and explain-style inspection
//!
//! ## Key Concepts
//!
//! - **Permission**: a named, optionally type-scoped right. Atomic
//!   permissions are matched against entries; sets aggregate others.
//! - **Inheritance**: recursive permissions are satisfied by an entry
//!   anywhere up the chain, until a node that does not inherit.
//! - **Deny overrides allow**: a deny anywhere on the chain vetoes
//!   matching allows for its authority, wherever they sit.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use canopy::{PermissionEngine, PermissionModel, PermissionService};
//! use canopy::core::{NodeRef, QName};
//! use canopy::store::{MemoryAclStore, MemoryDirectory, MemoryHierarchy};
//!
//! let model = Arc::new(
//!     PermissionModel::from_json(
//!         r#"{ "permissions": [
//!             { "name": "ReadProperties",
//!               "required": [ { "name": "ReadProperties", "on": "parent" } ] },
//!             { "name": "Read", "kind": "set", "grants": ["ReadProperties"] }
//!         ] }"#,
//!     )
//!     .unwrap(),
//! );
//!
//! let hierarchy = Arc::new(MemoryHierarchy::new());
//! let acl = Arc::new(MemoryAclStore::new());
//! let directory = Arc::new(MemoryDirectory::new());
//!
//! let root = NodeRef::new("root");
//! hierarchy.add_root(root.clone(), QName::new("canopy.content", "folder"));
//! directory.set_current_user("andy");
//!
//! let engine = Arc::new(PermissionEngine::new(model, hierarchy, acl, directory));
//! let service = PermissionService::new(engine);
//!
//! service.set_permission(&root, "andy", "Read", true).unwrap();
//! assert!(service.has_permission(&root, "ReadProperties").unwrap().is_allowed());
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `canopy::core` - Value types (NodeRef, PermissionReference, etc.)
//! - `canopy::model` - Model definitions and compilation
//! - `canopy::store` - Storage boundaries and in-memory implementations
//! - `canopy::engine` - The permission evaluator

pub mod error;
pub mod service;

pub use canopy_core as core;
pub use canopy_engine as engine;
pub use canopy_model as model;
pub use canopy_store as store;

pub use canopy_core::{AccessPermission, AccessStatus, NodeRef, PermissionReference};
pub use canopy_engine::{EngineConfig, PermissionEngine};
pub use canopy_model::PermissionModel;

pub use error::{Result, ServiceError};
pub use service::PermissionService;
