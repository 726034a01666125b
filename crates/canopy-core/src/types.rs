//! Strong type definitions for Canopy.
//!
//! Qualified names and node references are newtypes to prevent misuse
//! at compile time.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// A qualified name: a namespace plus a local name.
///
/// Used for node types, aspects, and permission qualifiers. The compact
/// form is `"namespace:local"`; local names never contain a colon.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    namespace: String,
    local: String,
}

impl QName {
    /// Create a qualified name from namespace and local parts.
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }

    /// The namespace part.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The local name part.
    pub fn local(&self) -> &str {
        &self.local
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.local)
    }
}

impl fmt::Debug for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QName({}:{})", self.namespace, self.local)
    }
}

impl FromStr for QName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once(':') {
            Some((ns, local)) if !ns.is_empty() && !local.is_empty() => {
                Ok(Self::new(ns, local))
            }
            _ => Err(CoreError::InvalidQName(s.to_string())),
        }
    }
}

impl Serialize for QName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for QName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// An opaque reference to a node in the content hierarchy.
///
/// The evaluator never interprets the identifier; it is a key into the
/// hierarchy and access-control stores.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeRef(String);

impl NodeRef {
    /// Create a node reference from an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({})", self.0)
    }
}

impl From<&str> for NodeRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodeRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}
