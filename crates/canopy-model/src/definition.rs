//! The declarative permission model definition format.
//!
//! A model is authored as JSON and deserialized into these structs before
//! being compiled into an immutable [`crate::PermissionModel`]. The format
//! carries permission declarations (atomic permissions and permission
//! sets), their granting and required-permission relationships, and the
//! global permission entries.

use serde::{Deserialize, Serialize};

use canopy_core::QName;

/// A complete model definition, as authored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Declared permissions and permission sets.
    #[serde(default)]
    pub permissions: Vec<PermissionDefinition>,

    /// ACL-independent entries that grant a permission to an authority
    /// on every node.
    #[serde(default)]
    pub globals: Vec<GlobalDefinition>,
}

impl ModelDefinition {
    /// Parse a definition from JSON text.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// One declared permission or permission set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionDefinition {
    /// The permission name; must be unique across the model.
    pub name: String,

    /// The node type or aspect the permission attaches to. Omitted means
    /// the permission applies to every node type.
    #[serde(default)]
    pub context: Option<QName>,

    /// Atomic permission or set alias.
    #[serde(default)]
    pub kind: PermissionKind,

    /// Whether the permission appears in the settable/exposed set.
    /// Internal permissions set this to false.
    #[serde(default = "default_true")]
    pub exposed: bool,

    /// Permissions implied by holding this one. For a set these are its
    /// members and double as NODE-relation requirements.
    #[serde(default)]
    pub grants: Vec<String>,

    /// Additional permissions required to exercise this one.
    #[serde(default)]
    pub required: Vec<RequiredDefinition>,
}

/// Whether a declaration is a concrete permission or a set alias.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionKind {
    /// An atomic permission, matched directly against ACL entries.
    #[default]
    Permission,
    /// An alias over its members; never matched directly.
    Set,
}

/// A required-permission declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredDefinition {
    /// The required permission's name.
    pub name: String,

    /// Where the requirement is tested.
    pub on: RequiredOn,
}

/// The relation a required permission is tested against.
///
/// A PARENT requirement naming the declaring permission itself marks it
/// recursive: satisfied by holding it anywhere up the primary-parent
/// chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequiredOn {
    /// Required at the node itself.
    Node,
    /// Required at the primary parent.
    Parent,
    /// Required at every direct child.
    Children,
}

/// A global permission entry declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalDefinition {
    /// The authority granted the permission everywhere.
    pub authority: String,

    /// The granted permission's name; `"All"` is accepted here.
    pub permission: String,
}

fn default_true() -> bool {
    true
}
