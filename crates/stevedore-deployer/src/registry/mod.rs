//! The external capability registry.
//!
//! The registry owns descriptor parsing and the actual install/uninstall
//! machinery. The deployer only drives it: it registers descriptors without
//! letting the registry auto-install anything, and decides itself when a
//! capability must be installed or removed.

mod local;

use async_trait::async_trait;
use url::Url;

pub use local::LocalRegistry;

use crate::descriptor::{Capability, Descriptor};

/// Errors reported by a capability registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A descriptor with this name or location is already registered.
    #[error("descriptor already registered: {0}")]
    DescriptorAlreadyRegistered(String),

    /// No descriptor is registered at this location.
    #[error("descriptor not registered: {0}")]
    DescriptorNotFound(String),

    /// The descriptor document could not be loaded.
    #[error("invalid descriptor at {uri}: {message}")]
    InvalidDescriptor {
        /// Location of the descriptor.
        uri: String,
        /// Failure reason.
        message: String,
    },

    /// No registered descriptor declares this capability.
    #[error("no capability named '{name}' with version '{version}' available")]
    CapabilityNotFound {
        /// Capability name.
        name: String,
        /// Capability version.
        version: String,
    },

    /// The capability is not installed.
    #[error("capability {name}@{version} is not installed")]
    CapabilityNotInstalled {
        /// Capability name.
        name: String,
        /// Capability version.
        version: String,
    },

    /// Any other backend failure.
    #[error("registry operation failed: {0}")]
    Operation(String),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Options passed along with every install request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallOptions {
    /// Log each unit the install touches.
    pub verbose: bool,
    /// Report units that need a refresh after the install.
    pub print_units_to_refresh: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            verbose: true,
            print_units_to_refresh: true,
        }
    }
}

/// Service that installs capabilities and tracks descriptors.
///
/// Calls are treated as blocking and may take arbitrarily long; the
/// deployer holds its serialization lock across them.
#[async_trait]
pub trait CapabilityRegistry: Send + Sync {
    /// Register the descriptor at `uri`. With `auto_activate_all` the
    /// registry installs every auto-activate capability itself.
    async fn add_descriptor(&self, uri: &Url, auto_activate_all: bool) -> RegistryResult<()>;

    /// Unregister the descriptor at `uri`. With `auto_activate_all` the
    /// registry uninstalls the descriptor's capabilities itself.
    async fn remove_descriptor(&self, uri: &Url, auto_activate_all: bool) -> RegistryResult<()>;

    /// Install a capability.
    async fn install_capability(
        &self,
        name: &str,
        version: &str,
        options: &InstallOptions,
    ) -> RegistryResult<()>;

    /// Uninstall a capability.
    async fn uninstall_capability(&self, name: &str, version: &str) -> RegistryResult<()>;

    /// Whether the capability is currently installed.
    async fn is_capability_installed(&self, capability: &Capability) -> bool;

    /// Every registered descriptor.
    async fn list_descriptors(&self) -> Vec<Descriptor>;
}
