//! Capability and descriptor types.
//!
//! A descriptor (`*.repository` file embedded in a unit) declares an
//! ordered list of capabilities. The registry owns the parsed form; the
//! deployer only reads the capability list back from it.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DeployError, DeployResult};

/// Descriptor schemas accepted by the artifact handler. Comparison is
/// case-insensitive; a document without a schema is accepted too.
pub const KNOWN_SCHEMAS: &[&str] = &[
    "urn:stevedore:features:0.0",
    "urn:stevedore:features:1.0",
    "urn:stevedore:features:1.1",
    "urn:stevedore:features:1.2",
];

/// How a capability gets installed when its descriptor becomes active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallMode {
    /// Installed automatically; managed by the deployer.
    Auto,
    /// Installed only on explicit request; ignored by the deployer.
    #[default]
    Manual,
}

/// A named, versioned installable feature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    /// Capability name.
    pub name: String,
    /// Capability version.
    pub version: String,
    /// Install mode.
    #[serde(default)]
    pub install: InstallMode,
}

impl Capability {
    /// Create a capability with the given install mode.
    pub fn new(name: impl Into<String>, version: impl Into<String>, install: InstallMode) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            install,
        }
    }

    /// Create an auto-activate capability.
    pub fn auto(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::new(name, version, InstallMode::Auto)
    }

    /// Whether the deployer manages this capability.
    #[must_use]
    pub fn is_auto_activate(&self) -> bool {
        self.install == InstallMode::Auto
    }

    /// Identity of this capability: `(name, version)`.
    #[must_use]
    pub fn id(&self) -> CapabilityId {
        CapabilityId {
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Capability identity, rendered as `name@version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CapabilityId {
    /// Capability name.
    pub name: String,
    /// Capability version.
    pub version: String,
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// A descriptor as registered with the capability registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// Registration name. Equal to the owning unit's id.
    pub name: String,
    /// Where the descriptor document lives.
    pub uri: Url,
    /// Declared capabilities, in declaration order.
    pub capabilities: Vec<Capability>,
}

impl Descriptor {
    /// Auto-activate capabilities in declaration order.
    pub fn auto_activate(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.iter().filter(|c| c.is_auto_activate())
    }
}

/// On-disk TOML form of a descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorDocument {
    /// Optional schema namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Registration name.
    pub name: String,
    /// Declared capabilities.
    #[serde(default, rename = "feature")]
    pub features: Vec<Capability>,
}

impl DescriptorDocument {
    /// Parse a descriptor document from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::DescriptorParse`] if the text is not a valid
    /// descriptor.
    pub fn parse(path: &Path, content: &str) -> DeployResult<Self> {
        toml::from_str(content).map_err(|e| DeployError::DescriptorParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load a descriptor document from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> DeployResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DeployError::DescriptorParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(path, &content)
    }

    /// Whether the document's schema, if any, is one of [`KNOWN_SCHEMAS`].
    #[must_use]
    pub fn has_known_schema(&self) -> bool {
        self.schema.as_deref().is_none_or(|schema| {
            KNOWN_SCHEMAS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(schema))
        })
    }

    /// Convert into a registered descriptor located at `uri`.
    #[must_use]
    pub fn into_descriptor(self, uri: Url) -> Descriptor {
        Descriptor {
            name: self.name,
            uri,
            capabilities: self.features,
        }
    }
}
