//! Store identity: package type, store type, and the composite `StoreKey`.
//!
//! Every interface that names a repository does so via a `StoreKey`. The
//! string form `packageType:storeType:name` (e.g. `maven:hosted:releases`)
//! is the canonical wire and path representation and must round-trip
//! losslessly.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Package ecosystem a store holds content for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PackageType {
    Maven,
    Npm,
    Generic,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Maven => "maven",
            Self::Npm => "npm",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageType {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "maven" => Ok(Self::Maven),
            "npm" => Ok(Self::Npm),
            "generic" => Ok(Self::Generic),
            other => Err(KeyParseError::UnknownPackageType(other.to_string())),
        }
    }
}

/// How a store obtains its content: proxied, uploaded, or aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreType {
    Remote,
    Hosted,
    Group,
}

impl StoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Hosted => "hosted",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreType {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote" => Ok(Self::Remote),
            "hosted" => Ok(Self::Hosted),
            "group" => Ok(Self::Group),
            other => Err(KeyParseError::UnknownStoreType(other.to_string())),
        }
    }
}

/// Errors from parsing a store key or one of its segments.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("unknown package type '{0}' (expected maven, npm, or generic)")]
    UnknownPackageType(String),

    #[error("unknown store type '{0}' (expected remote, hosted, or group)")]
    UnknownStoreType(String),

    #[error("store key '{0}' must have the form packageType:storeType:name")]
    MalformedKey(String),

    #[error("invalid store name '{0}': only [A-Za-z0-9._-] is allowed")]
    InvalidName(String),
}

/// Composite identity of a store: `(packageType, storeType, name)`.
///
/// Immutable; ordered and hashable so it can key maps and appear in sorted
/// listings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreKey {
    package_type: PackageType,
    store_type: StoreType,
    name: String,
}

impl StoreKey {
    /// Build a key, validating the name charset.
    pub fn new(
        package_type: PackageType,
        store_type: StoreType,
        name: impl Into<String>,
    ) -> Result<Self, KeyParseError> {
        let name = name.into();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(KeyParseError::InvalidName(name));
        }
        Ok(Self {
            package_type,
            store_type,
            name,
        })
    }

    pub fn package_type(&self) -> PackageType {
        self.package_type
    }

    pub fn store_type(&self) -> StoreType {
        self.store_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.package_type, self.store_type, self.name)
    }
}

impl FromStr for StoreKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(package), Some(store), Some(name)) if !name.is_empty() => {
                Self::new(package.parse()?, store.parse()?, name)
            }
            _ => Err(KeyParseError::MalformedKey(s.to_string())),
        }
    }
}

// Store keys travel as their canonical string form in JSON.
impl Serialize for StoreKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StoreKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
