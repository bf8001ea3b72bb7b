//! Mock implementations for testing.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use globset::Glob;
use url::Url;

use stevedore_deployer::{
    Capability, CapabilityId, CapabilityRegistry, DeployableUnit, Descriptor, InstallOptions,
    RegistryError, RegistryResult, UnitId,
};

/// A call made against [`MockRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    /// `add_descriptor`.
    AddDescriptor {
        /// Descriptor location.
        uri: Url,
        /// Whether the registry was asked to auto-install.
        auto_activate_all: bool,
    },
    /// `remove_descriptor`.
    RemoveDescriptor {
        /// Descriptor location.
        uri: Url,
        /// Whether the registry was asked to auto-uninstall.
        auto_activate_all: bool,
    },
    /// `install_capability`.
    Install(CapabilityId),
    /// `uninstall_capability`.
    Uninstall(CapabilityId),
}

/// Mock implementation of [`CapabilityRegistry`].
///
/// Descriptors are served from an in-memory catalog keyed by URL, so no
/// descriptor file has to exist. Every mutating call is recorded.
#[derive(Debug, Clone, Default)]
pub struct MockRegistry {
    /// Descriptors that `add_descriptor` can resolve.
    catalog: Arc<Mutex<BTreeMap<Url, Descriptor>>>,
    /// Currently registered descriptors.
    registered: Arc<Mutex<BTreeMap<Url, Descriptor>>>,
    /// Currently installed capabilities.
    installed: Arc<Mutex<BTreeSet<CapabilityId>>>,
    /// Captured calls, in order.
    calls: Arc<Mutex<Vec<RegistryCall>>>,
    /// Capabilities whose install fails.
    failing_installs: Arc<Mutex<HashSet<CapabilityId>>>,
    /// Capabilities whose uninstall fails.
    failing_uninstalls: Arc<Mutex<HashSet<CapabilityId>>>,
    /// Registered descriptors are left out of `list_descriptors`.
    hide_registered: bool,
}

impl MockRegistry {
    /// Create an empty mock registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `descriptor` resolvable at its URL.
    #[must_use]
    pub fn with_descriptor(self, descriptor: Descriptor) -> Self {
        self.add_to_catalog(descriptor);
        self
    }

    /// Treat `capability` as installed from the start.
    #[must_use]
    pub fn with_installed(self, capability: &Capability) -> Self {
        if let Ok(mut guard) = self.installed.lock() {
            guard.insert(capability.id());
        }
        self
    }

    /// Make every install of `capability` fail.
    #[must_use]
    pub fn with_failing_install(self, capability: &Capability) -> Self {
        if let Ok(mut guard) = self.failing_installs.lock() {
            guard.insert(capability.id());
        }
        self
    }

    /// Make every uninstall of `capability` fail.
    #[must_use]
    pub fn with_failing_uninstall(self, capability: &Capability) -> Self {
        if let Ok(mut guard) = self.failing_uninstalls.lock() {
            guard.insert(capability.id());
        }
        self
    }

    /// Accept registrations but never list them.
    #[must_use]
    pub fn with_hidden_descriptors(mut self) -> Self {
        self.hide_registered = true;
        self
    }

    /// Make `descriptor` resolvable at its URL.
    pub fn add_to_catalog(&self, descriptor: Descriptor) {
        if let Ok(mut guard) = self.catalog.lock() {
            guard.insert(descriptor.uri.clone(), descriptor);
        }
    }

    /// Remove `capability` behind the deployer's back.
    pub fn drop_installed(&self, capability: &Capability) {
        if let Ok(mut guard) = self.installed.lock() {
            guard.remove(&capability.id());
        }
    }

    /// A registry sharing nothing but the catalog, as after a host restart.
    #[must_use]
    pub fn restarted(&self) -> Self {
        let catalog = self.catalog.lock().map(|g| g.clone()).unwrap_or_default();
        Self {
            catalog: Arc::new(Mutex::new(catalog)),
            ..Self::default()
        }
    }

    /// Get captured calls.
    #[must_use]
    pub fn calls(&self) -> Vec<RegistryCall> {
        self.calls.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Get captured installs, in order.
    #[must_use]
    pub fn installs(&self) -> Vec<CapabilityId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RegistryCall::Install(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Get captured uninstalls, in order.
    #[must_use]
    pub fn uninstalls(&self) -> Vec<CapabilityId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RegistryCall::Uninstall(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Get currently installed capabilities.
    #[must_use]
    pub fn installed(&self) -> Vec<CapabilityId> {
        self.installed
            .lock()
            .map(|g| g.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Get currently registered descriptor URLs.
    #[must_use]
    pub fn registered(&self) -> Vec<Url> {
        self.registered
            .lock()
            .map(|g| g.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Clear captured calls.
    pub fn clear_calls(&self) {
        if let Ok(mut guard) = self.calls.lock() {
            guard.clear();
        }
    }

    fn record(&self, call: RegistryCall) {
        if let Ok(mut guard) = self.calls.lock() {
            guard.push(call);
        }
    }

    fn fails(set: &Mutex<HashSet<CapabilityId>>, id: &CapabilityId) -> bool {
        set.lock().map(|g| g.contains(id)).unwrap_or(false)
    }

    fn lock_error() -> RegistryError {
        RegistryError::Operation("mock registry lock poisoned".to_string())
    }
}

#[async_trait]
impl CapabilityRegistry for MockRegistry {
    async fn add_descriptor(&self, uri: &Url, auto_activate_all: bool) -> RegistryResult<()> {
        self.record(RegistryCall::AddDescriptor {
            uri: uri.clone(),
            auto_activate_all,
        });

        let descriptor = self
            .catalog
            .lock()
            .map_err(|_| Self::lock_error())?
            .get(uri)
            .cloned()
            .ok_or_else(|| RegistryError::InvalidDescriptor {
                uri: uri.to_string(),
                message: "not in mock catalog".to_string(),
            })?;

        let mut registered = self.registered.lock().map_err(|_| Self::lock_error())?;
        if registered.contains_key(uri) {
            return Err(RegistryError::DescriptorAlreadyRegistered(descriptor.name));
        }
        registered.insert(uri.clone(), descriptor);
        Ok(())
    }

    async fn remove_descriptor(&self, uri: &Url, auto_activate_all: bool) -> RegistryResult<()> {
        self.record(RegistryCall::RemoveDescriptor {
            uri: uri.clone(),
            auto_activate_all,
        });

        self.registered
            .lock()
            .map_err(|_| Self::lock_error())?
            .remove(uri)
            .map(|_| ())
            .ok_or_else(|| RegistryError::DescriptorNotFound(uri.to_string()))
    }

    async fn install_capability(
        &self,
        name: &str,
        version: &str,
        _options: &InstallOptions,
    ) -> RegistryResult<()> {
        let id = CapabilityId {
            name: name.to_string(),
            version: version.to_string(),
        };
        self.record(RegistryCall::Install(id.clone()));

        if Self::fails(&self.failing_installs, &id) {
            return Err(RegistryError::Operation(format!("install of {id} failed")));
        }
        self.installed
            .lock()
            .map_err(|_| Self::lock_error())?
            .insert(id);
        Ok(())
    }

    async fn uninstall_capability(&self, name: &str, version: &str) -> RegistryResult<()> {
        let id = CapabilityId {
            name: name.to_string(),
            version: version.to_string(),
        };
        self.record(RegistryCall::Uninstall(id.clone()));

        if Self::fails(&self.failing_uninstalls, &id) {
            return Err(RegistryError::Operation(format!("uninstall of {id} failed")));
        }
        if !self
            .installed
            .lock()
            .map_err(|_| Self::lock_error())?
            .remove(&id)
        {
            return Err(RegistryError::CapabilityNotInstalled {
                name: id.name,
                version: id.version,
            });
        }
        Ok(())
    }

    async fn is_capability_installed(&self, capability: &Capability) -> bool {
        self.installed
            .lock()
            .map(|g| g.contains(&capability.id()))
            .unwrap_or(false)
    }

    async fn list_descriptors(&self) -> Vec<Descriptor> {
        if self.hide_registered {
            return Vec::new();
        }
        self.registered
            .lock()
            .map(|g| g.values().cloned().collect())
            .unwrap_or_default()
    }
}

/// Deployable unit whose content lives in memory.
///
/// Entries are addressed as `memory://<unit>/<path>`.
#[derive(Debug, Clone)]
pub struct MemoryUnit {
    id: UnitId,
    entries: Vec<String>,
    fail_enumeration: bool,
}

impl MemoryUnit {
    /// Create a unit with no entries.
    #[must_use]
    pub fn new(id: UnitId) -> Self {
        Self {
            id,
            entries: Vec::new(),
            fail_enumeration: false,
        }
    }

    /// Add an entry at `path` (relative to the unit root).
    #[must_use]
    pub fn with_entry(mut self, path: impl Into<String>) -> Self {
        self.entries.push(path.into());
        self
    }

    /// Make every enumeration fail.
    #[must_use]
    pub fn with_failing_enumeration(mut self) -> Self {
        self.fail_enumeration = true;
        self
    }

    /// URL of the entry at `path`.
    ///
    /// # Panics
    ///
    /// Panics if the unit id or path do not form a valid URL.
    #[must_use]
    pub fn entry_url(&self, path: &str) -> Url {
        self.url_for(path).expect("valid memory url")
    }

    fn url_for(&self, path: &str) -> Result<Url, url::ParseError> {
        Url::parse(&format!(
            "memory://{}/{}",
            self.id,
            path.trim_start_matches('/')
        ))
    }
}

impl DeployableUnit for MemoryUnit {
    fn id(&self) -> &UnitId {
        &self.id
    }

    fn find_entries(&self, dir: &str, pattern: &str) -> io::Result<Vec<Url>> {
        if self.fail_enumeration {
            return Err(io::Error::other("enumeration failed"));
        }

        let matcher = Glob::new(pattern)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
            .compile_matcher();
        let dir = dir.trim_matches('/');

        let mut urls = self
            .entries
            .iter()
            .filter_map(|entry| {
                let entry = entry.trim_start_matches('/');
                let (parent, file) = entry.rsplit_once('/').unwrap_or(("", entry));
                (parent == dir && matcher.is_match(file)).then(|| self.url_for(entry))
            })
            .collect::<Result<Vec<Url>, _>>()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        urls.sort();
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_unit_lists_matching_entries_only() {
        let unit = MemoryUnit::new(UnitId::from_static("web"))
            .with_entry("META-INF/stevedore.features/web.repository")
            .with_entry("META-INF/stevedore.features/readme.txt")
            .with_entry("META-INF/stevedore.features/nested/x.repository")
            .with_entry("other/y.repository");

        let found = unit
            .find_entries("/META-INF/stevedore.features/", "*.repository")
            .unwrap();
        assert_eq!(
            found,
            vec![unit.entry_url("META-INF/stevedore.features/web.repository")]
        );
    }

    #[tokio::test]
    async fn mock_registry_records_calls() {
        let uri = Url::parse("memory://web/META-INF/stevedore.features/web.repository").unwrap();
        let registry = MockRegistry::new().with_descriptor(Descriptor {
            name: "web".to_string(),
            uri: uri.clone(),
            capabilities: vec![Capability::auto("http", "1.0.0")],
        });

        registry.add_descriptor(&uri, false).await.unwrap();
        registry
            .install_capability("http", "1.0.0", &InstallOptions::default())
            .await
            .unwrap();

        assert_eq!(registry.registered(), vec![uri.clone()]);
        assert_eq!(registry.installs(), vec![Capability::auto("http", "1.0.0").id()]);
        assert!(matches!(
            registry.add_descriptor(&uri, false).await,
            Err(RegistryError::DescriptorAlreadyRegistered(_))
        ));
    }
}
