//! Proptest generators for property-based testing.

use proptest::prelude::*;

use canopy_core::{AccessControlEntry, PermissionReference};

/// Atomic permission names from the default model.
pub const ATOMIC_NAMES: &[&str] = &[
    "ReadProperties",
    "ReadChildren",
    "ReadContent",
    "WriteProperties",
    "WriteContent",
    "AddChildren",
    "DeleteNode",
    "CheckOut",
    "CheckIn",
];

/// Set permission names from the default model.
pub const SET_NAMES: &[&str] = &[
    "Read",
    "Write",
    "Delete",
    "Consumer",
    "Editor",
    "Collaborator",
];

/// Generate a username.
pub fn username() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,11}".prop_map(String::from)
}

/// Generate a group authority.
pub fn group() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9]{0,11}".prop_map(|s| format!("GROUP_{s}"))
}

/// Generate a user or group authority.
pub fn authority() -> impl Strategy<Value = String> {
    prop_oneof![username(), group()]
}

/// Generate the name of an atomic permission.
pub fn atomic_name() -> impl Strategy<Value = &'static str> {
    prop::sample::select(ATOMIC_NAMES)
}

/// Generate the name of a set permission.
pub fn set_name() -> impl Strategy<Value = &'static str> {
    prop::sample::select(SET_NAMES)
}

/// Generate any declared permission name.
pub fn permission_name() -> impl Strategy<Value = &'static str> {
    prop_oneof![atomic_name(), set_name()]
}

/// Generate an unscoped permission reference from the default model.
pub fn permission() -> impl Strategy<Value = PermissionReference> {
    permission_name().prop_map(PermissionReference::unscoped)
}

/// Generate an allow or deny entry.
pub fn entry() -> impl Strategy<Value = AccessControlEntry> {
    (authority(), permission(), any::<bool>()).prop_map(|(authority, permission, allowed)| {
        if allowed {
            AccessControlEntry::allow(authority, permission)
        } else {
            AccessControlEntry::deny(authority, permission)
        }
    })
}

/// Generate a batch of entries for one node.
pub fn entries(max: usize) -> impl Strategy<Value = Vec<AccessControlEntry>> {
    prop::collection::vec(entry(), 0..=max)
}

/// Generate a chain depth small enough to evaluate quickly.
pub fn chain_depth() -> impl Strategy<Value = usize> {
    1usize..=6
}
