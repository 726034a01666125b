//! # Canopy Testkit
//!
//! Testing utilities for Canopy.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a default permission model, in-memory stores, and an
//!   engine wired over them, with short-hand tree and ACL mutators
//! - **Generators**: proptest strategies for authorities, permissions,
//!   and ACL entries
//!
//! ## Test Fixtures
//!
//! Quickly set up test scenarios:
//!
//! ```rust
//! use canopy_testkit::fixtures::{folder_chain, TestFixture};
//!
//! let fixture = TestFixture::new();
//! let nodes = folder_chain(&fixture, &["root", "folder", "doc"]);
//! fixture.login("andy");
//! fixture.allow(&nodes[0], "andy", "Consumer");
//! assert!(fixture.check(&nodes[2], "ReadProperties").is_allowed());
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{folder_chain, TestFixture, DEFAULT_MODEL_JSON};
