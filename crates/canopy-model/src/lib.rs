//! # Canopy Model
//!
//! The declarative permission model: which permissions exist, which
//! permissions grant which others, what else must be held (at the node,
//! its parent, or its children) to exercise one, and the global entries
//! that bypass node-level ACLs.
//!
//! ## Overview
//!
//! A model is authored as a JSON [`ModelDefinition`] and compiled into an
//! immutable [`PermissionModel`] at bootstrap. Compilation validates the
//! definition and precomputes the reflexive, transitive granting and
//! grantee closures so evaluation-time queries are set lookups.
//!
//! ## Key Concepts
//!
//! - **Atomic permission**: matched directly against ACL entries.
//! - **Permission set**: an alias over its members; holding the set
//!   implies holding every member, and the members are required at the
//!   node to exercise the set.
//! - **Recursive permission**: one whose PARENT requirement names itself;
//!   satisfied by holding it anywhere up the primary-parent chain. This
//!   is how ACL inheritance of allows is expressed.

pub mod definition;
pub mod error;
pub mod model;

pub use definition::{
    GlobalDefinition, ModelDefinition, PermissionDefinition, PermissionKind,
    RequiredDefinition, RequiredOn,
};
pub use error::{ModelError, Result};
pub use model::PermissionModel;
