//! In-process capability registry.
//!
//! Reads descriptor documents from `file://` URLs and keeps the set of
//! installed capabilities in memory. Suitable for embedding the deployer in
//! a process that has no registry of its own, and for exercising the
//! deployer end to end.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;

use super::{CapabilityRegistry, InstallOptions, RegistryError, RegistryResult};
use crate::descriptor::{Capability, CapabilityId, Descriptor, DescriptorDocument};

#[derive(Debug, Default)]
struct State {
    /// Registered descriptors keyed by name.
    descriptors: BTreeMap<String, Descriptor>,
    installed: BTreeSet<CapabilityId>,
    /// Descriptors flagged for refresh by installs since the last drain.
    refresh: BTreeSet<String>,
}

impl State {
    /// Names of the descriptors declaring `id`.
    fn declaring(&self, id: &CapabilityId) -> Vec<String> {
        self.descriptors
            .values()
            .filter(|d| d.capabilities.iter().any(|c| c.id() == *id))
            .map(|d| d.name.clone())
            .collect()
    }
}

/// Registry that lives entirely in this process.
#[derive(Debug, Default)]
pub struct LocalRegistry {
    state: Mutex<State>,
}

impl LocalRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of every installed capability.
    #[must_use]
    pub fn installed(&self) -> Vec<CapabilityId> {
        self.lock().installed.iter().cloned().collect()
    }

    /// Drain the descriptors flagged for refresh by installs made with
    /// [`InstallOptions::print_units_to_refresh`].
    pub fn take_units_to_refresh(&self) -> Vec<String> {
        std::mem::take(&mut self.lock().refresh).into_iter().collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(uri: &Url) -> RegistryResult<DescriptorDocument> {
        let invalid = |message: String| RegistryError::InvalidDescriptor {
            uri: uri.to_string(),
            message,
        };
        if uri.scheme() != "file" {
            return Err(invalid(format!("unsupported scheme '{}'", uri.scheme())));
        }
        let path = uri
            .to_file_path()
            .map_err(|()| invalid("not a local file path".into()))?;
        DescriptorDocument::load(&path).map_err(|e| invalid(e.to_string()))
    }
}

#[async_trait]
impl CapabilityRegistry for LocalRegistry {
    async fn add_descriptor(&self, uri: &Url, auto_activate_all: bool) -> RegistryResult<()> {
        let descriptor = Self::load(uri)?.into_descriptor(uri.clone());

        let mut state = self.lock();
        if state.descriptors.contains_key(&descriptor.name)
            || state.descriptors.values().any(|d| d.uri == *uri)
        {
            return Err(RegistryError::DescriptorAlreadyRegistered(
                descriptor.name.clone(),
            ));
        }

        if auto_activate_all {
            let ids: Vec<CapabilityId> = descriptor.auto_activate().map(Capability::id).collect();
            state.installed.extend(ids);
        }

        info!(name = %descriptor.name, uri = %uri, "Registered descriptor");
        state.descriptors.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    async fn remove_descriptor(&self, uri: &Url, auto_activate_all: bool) -> RegistryResult<()> {
        let mut state = self.lock();
        let name = state
            .descriptors
            .iter()
            .find(|(_, d)| d.uri == *uri)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| RegistryError::DescriptorNotFound(uri.to_string()))?;

        if let Some(descriptor) = state.descriptors.remove(&name) {
            if auto_activate_all {
                for capability in &descriptor.capabilities {
                    state.installed.remove(&capability.id());
                }
            }
        }

        info!(name = %name, uri = %uri, "Unregistered descriptor");
        Ok(())
    }

    async fn install_capability(
        &self,
        name: &str,
        version: &str,
        options: &InstallOptions,
    ) -> RegistryResult<()> {
        let id = CapabilityId {
            name: name.to_string(),
            version: version.to_string(),
        };

        let mut state = self.lock();
        let declaring = state.declaring(&id);
        if declaring.is_empty() {
            return Err(RegistryError::CapabilityNotFound {
                name: id.name,
                version: id.version,
            });
        }

        if state.installed.insert(id.clone()) {
            if options.verbose {
                info!(capability = %id, "Installed capability");
            }
            if options.print_units_to_refresh {
                info!(capability = %id, units = ?declaring, "Units to refresh");
                state.refresh.extend(declaring);
            }
        } else {
            debug!(capability = %id, "Capability already installed");
        }
        Ok(())
    }

    async fn uninstall_capability(&self, name: &str, version: &str) -> RegistryResult<()> {
        let id = CapabilityId {
            name: name.to_string(),
            version: version.to_string(),
        };

        if !self.lock().installed.remove(&id) {
            return Err(RegistryError::CapabilityNotInstalled {
                name: id.name,
                version: id.version,
            });
        }
        info!(capability = %id, "Uninstalled capability");
        Ok(())
    }

    async fn is_capability_installed(&self, capability: &Capability) -> bool {
        self.lock().installed.contains(&capability.id())
    }

    async fn list_descriptors(&self) -> Vec<Descriptor> {
        self.lock().descriptors.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_descriptor(dir: &TempDir, file: &str, body: &str) -> Url {
        let path = dir.path().join(file);
        std::fs::write(&path, body).unwrap();
        Url::from_file_path(&path).unwrap()
    }

    const WEB: &str = r#"
name = "web"

[[feature]]
name = "http"
version = "1.0.0"
install = "auto"

[[feature]]
name = "admin"
version = "1.0.0"
"#;

    #[tokio::test]
    async fn add_without_auto_activation_installs_nothing() {
        let dir = TempDir::new().unwrap();
        let uri = write_descriptor(&dir, "web.repository", WEB);
        let registry = LocalRegistry::new();

        registry.add_descriptor(&uri, false).await.unwrap();

        assert!(registry.installed().is_empty());
        let listed = registry.list_descriptors().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "web");
        assert_eq!(listed[0].uri, uri);
    }

    #[tokio::test]
    async fn add_with_auto_activation_installs_auto_capabilities() {
        let dir = TempDir::new().unwrap();
        let uri = write_descriptor(&dir, "web.repository", WEB);
        let registry = LocalRegistry::new();

        registry.add_descriptor(&uri, true).await.unwrap();
        assert_eq!(registry.installed(), vec![Capability::auto("http", "1.0.0").id()]);

        registry.remove_descriptor(&uri, true).await.unwrap();
        assert!(registry.installed().is_empty());
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let dir = TempDir::new().unwrap();
        let uri = write_descriptor(&dir, "web.repository", WEB);
        let registry = LocalRegistry::new();

        registry.add_descriptor(&uri, false).await.unwrap();
        let err = registry.add_descriptor(&uri, false).await.unwrap_err();
        assert!(matches!(err, RegistryError::DescriptorAlreadyRegistered(name) if name == "web"));
    }

    #[tokio::test]
    async fn install_requires_a_declaring_descriptor() {
        let registry = LocalRegistry::new();
        let err = registry
            .install_capability("http", "1.0.0", &InstallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::CapabilityNotFound { .. }));
    }

    #[tokio::test]
    async fn install_and_uninstall() {
        let dir = TempDir::new().unwrap();
        let uri = write_descriptor(&dir, "web.repository", WEB);
        let registry = LocalRegistry::new();
        registry.add_descriptor(&uri, false).await.unwrap();

        let http = Capability::auto("http", "1.0.0");
        registry
            .install_capability("http", "1.0.0", &InstallOptions::default())
            .await
            .unwrap();
        assert!(registry.is_capability_installed(&http).await);

        registry.uninstall_capability("http", "1.0.0").await.unwrap();
        assert!(!registry.is_capability_installed(&http).await);
        assert!(matches!(
            registry.uninstall_capability("http", "1.0.0").await,
            Err(RegistryError::CapabilityNotInstalled { .. })
        ));
    }

    #[tokio::test]
    async fn install_flags_declaring_descriptors_for_refresh() {
        let dir = TempDir::new().unwrap();
        let web = write_descriptor(&dir, "web.repository", WEB);
        let api = write_descriptor(
            &dir,
            "api.repository",
            "name = \"api\"\n\n[[feature]]\nname = \"http\"\nversion = \"1.0.0\"\n",
        );
        let registry = LocalRegistry::new();
        registry.add_descriptor(&web, false).await.unwrap();
        registry.add_descriptor(&api, false).await.unwrap();

        let quiet = InstallOptions {
            verbose: false,
            print_units_to_refresh: false,
        };
        registry.install_capability("admin", "1.0.0", &quiet).await.unwrap();
        assert!(registry.take_units_to_refresh().is_empty());

        registry
            .install_capability("http", "1.0.0", &InstallOptions::default())
            .await
            .unwrap();
        assert_eq!(registry.take_units_to_refresh(), vec!["api", "web"]);
        assert!(registry.take_units_to_refresh().is_empty());

        // Already installed: nothing new to refresh.
        registry
            .install_capability("http", "1.0.0", &InstallOptions::default())
            .await
            .unwrap();
        assert!(registry.take_units_to_refresh().is_empty());
    }

    #[tokio::test]
    async fn remote_descriptors_are_rejected() {
        let registry = LocalRegistry::new();
        let uri = Url::parse("https://example.com/web.repository").unwrap();
        assert!(matches!(
            registry.add_descriptor(&uri, false).await,
            Err(RegistryError::InvalidDescriptor { .. })
        ));
    }

    #[tokio::test]
    async fn removing_unknown_descriptor_fails() {
        let registry = LocalRegistry::new();
        let uri = Url::parse("file:///nowhere/x.repository").unwrap();
        assert!(matches!(
            registry.remove_descriptor(&uri, false).await,
            Err(RegistryError::DescriptorNotFound(_))
        ));
    }
}
