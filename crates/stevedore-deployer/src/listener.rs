//! Unit lifecycle listener.
//!
//! Turns host start/stop events into descriptor registration and
//! capability activation. Every add and remove workflow runs under one
//! process-wide lock, so ledger read-modify-write sequences never
//! interleave. Failures are logged here and never reach the host.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info};
use url::Url;

use crate::coordinator::CapabilityCoordinator;
use crate::descriptor::{Capability, Descriptor};
use crate::error::DeployError;
use crate::event::{UnitAction, UnitEvent, UnitEventKind};
use crate::inconsistency::Inconsistency;
use crate::ledger::ActivationLedger;
use crate::registry::{CapabilityRegistry, InstallOptions};
use crate::report::ActivationReport;
use crate::scanner::{DescriptorScanner, ScanResult};
use crate::settings::DeployerSettings;
use crate::unit::{DeployableUnit, UnitId};

/// What handling one lifecycle event amounted to.
#[derive(Debug)]
pub enum EventOutcome {
    /// Not a start/stop event, or the unit carries no descriptor.
    Ignored,
    /// A structural inconsistency stopped the workflow before it began.
    Inconsistent(Inconsistency),
    /// Every auto-activate capability was processed.
    Completed(ActivationReport),
    /// The workflow aborted on an error.
    Failed {
        /// Progress made before the failure.
        report: ActivationReport,
        /// The aborting error.
        error: DeployError,
    },
}

impl EventOutcome {
    /// The activation report, if the workflow got that far.
    #[must_use]
    pub fn report(&self) -> Option<&ActivationReport> {
        match self {
            Self::Completed(report) | Self::Failed { report, .. } => Some(report),
            Self::Ignored | Self::Inconsistent(_) => None,
        }
    }

    /// Whether the workflow ran to completion.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Reacts to unit start/stop events.
pub struct DeploymentListener {
    scanner: DescriptorScanner,
    coordinator: CapabilityCoordinator,
    registry: Arc<dyn CapabilityRegistry>,
    lock: Mutex<()>,
}

/// A workflow that stopped early, with the progress it made.
struct Aborted {
    report: ActivationReport,
    error: DeployError,
}

/// Either an inconsistency (no side effects) or a hard failure.
enum Rejection {
    Inconsistent(Inconsistency),
    Aborted(Aborted),
}

impl From<Aborted> for Rejection {
    fn from(aborted: Aborted) -> Self {
        Self::Aborted(aborted)
    }
}

impl DeploymentListener {
    /// Create a listener.
    pub fn new(
        scanner: DescriptorScanner,
        ledger: ActivationLedger,
        registry: Arc<dyn CapabilityRegistry>,
        options: InstallOptions,
    ) -> Self {
        let coordinator = CapabilityCoordinator::new(ledger, Arc::clone(&registry), options);
        Self {
            scanner,
            coordinator,
            registry,
            lock: Mutex::new(()),
        }
    }

    /// Create a listener from resolved settings.
    pub fn from_settings(settings: &DeployerSettings, registry: Arc<dyn CapabilityRegistry>) -> Self {
        Self::new(
            settings.scanner(),
            settings.ledger(),
            registry,
            settings.install,
        )
    }

    /// The ledger backing this listener.
    #[must_use]
    pub fn ledger(&self) -> &ActivationLedger {
        self.coordinator.ledger()
    }

    /// Handle one lifecycle event.
    ///
    /// Never fails: errors are logged with the unit and event kind and
    /// returned as [`EventOutcome::Failed`] for inspection.
    pub async fn on_unit_event(&self, unit: &dyn DeployableUnit, kind: UnitEventKind) -> EventOutcome {
        let Some(action) = kind.action() else {
            return EventOutcome::Ignored;
        };

        let uri = match self.scanner.find_descriptor(unit) {
            ScanResult::None => return EventOutcome::Ignored,
            ScanResult::One(uri) => uri,
            ScanResult::Ambiguous(candidates) => {
                let inconsistency = Inconsistency::AmbiguousDescriptor {
                    unit: unit.id().clone(),
                    candidates,
                };
                inconsistency.report();
                return EventOutcome::Inconsistent(inconsistency);
            },
        };

        let _guard = self.lock.lock().await;

        let result = match action {
            UnitAction::Add => self.unit_add(unit.id(), &uri).await,
            UnitAction::Remove => self.unit_remove(unit.id(), &uri).await,
        };

        match result {
            Ok(report) => {
                info!(unit = %unit.id(), event = %kind, "Success");
                EventOutcome::Completed(report)
            },
            Err(Rejection::Inconsistent(inconsistency)) => {
                inconsistency.report();
                EventOutcome::Inconsistent(inconsistency)
            },
            Err(Rejection::Aborted(Aborted { report, error })) => {
                error!(unit = %unit.id(), event = %kind, error = %error, "Failure");
                EventOutcome::Failed { report, error }
            },
        }
    }

    /// Consume events until every sender is dropped.
    pub async fn run(&self, mut receiver: mpsc::Receiver<UnitEvent>) {
        info!("Deployer activated");

        while let Some(event) = receiver.recv().await {
            let outcome = self.on_unit_event(event.unit.as_ref(), event.kind).await;
            debug!(unit = %event.unit.id(), event = %event.kind, outcome = ?outcome, "Event handled");
        }

        info!("Deployer deactivated");
    }

    async fn unit_add(&self, unit: &UnitId, uri: &Url) -> Result<ActivationReport, Rejection> {
        info!(unit = %unit, uri = %uri, "Add");
        let mut report = ActivationReport::new(unit.clone(), UnitAction::Add);

        if self.registered(unit).await.is_some() {
            return Err(Rejection::Inconsistent(Inconsistency::AlreadyRegistered {
                unit: unit.clone(),
            }));
        }

        // Register without letting the registry install anything itself.
        if let Err(e) = self.registry.add_descriptor(uri, false).await {
            return Err(Aborted {
                report,
                error: e.into(),
            }
            .into());
        }

        let Some(descriptor) = self.registered(unit).await else {
            return Err(Aborted {
                report,
                error: DeployError::DescriptorVanished { unit: unit.clone() },
            }
            .into());
        };

        let capabilities: Vec<Capability> = descriptor.auto_activate().cloned().collect();
        report.request(capabilities.iter().map(Capability::id));

        for capability in &capabilities {
            match self.coordinator.activate(unit, capability).await {
                Ok(outcome) => report.record(capability.id(), outcome.is_applied()),
                Err(error) => {
                    report.fail(capability.id(), &error);
                    return Err(Aborted { report, error }.into());
                },
            }
        }

        Ok(report)
    }

    async fn unit_remove(&self, unit: &UnitId, uri: &Url) -> Result<ActivationReport, Rejection> {
        info!(unit = %unit, uri = %uri, "Remove");
        let mut report = ActivationReport::new(unit.clone(), UnitAction::Remove);

        let Some(descriptor) = self.registered(unit).await else {
            return Err(Rejection::Inconsistent(Inconsistency::NotRegistered {
                unit: unit.clone(),
            }));
        };

        let capabilities: Vec<Capability> = descriptor.auto_activate().cloned().collect();
        report.request(capabilities.iter().map(Capability::id));

        for capability in &capabilities {
            match self.coordinator.deactivate(unit, capability).await {
                Ok(outcome) => report.record(capability.id(), outcome.is_applied()),
                Err(error) => {
                    report.fail(capability.id(), &error);
                    return Err(Aborted { report, error }.into());
                },
            }
        }

        // Unregister without letting the registry uninstall anything itself.
        if let Err(e) = self.registry.remove_descriptor(uri, false).await {
            return Err(Aborted {
                report,
                error: e.into(),
            }
            .into());
        }

        Ok(report)
    }

    /// The registered descriptor named after `unit`, if any.
    async fn registered(&self, unit: &UnitId) -> Option<Descriptor> {
        self.registry
            .list_descriptors()
            .await
            .into_iter()
            .find(|d| d.name == unit.as_str())
    }
}

impl std::fmt::Debug for DeploymentListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentListener")
            .field("scanner", &self.scanner)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::LocalRegistry;
    use crate::unit::DirectoryUnit;
    use tempfile::TempDir;

    fn unit_dir(root: &TempDir, name: &str, features: &[(&str, bool)]) -> DirectoryUnit {
        let unit_root = root.path().join(name);
        let meta = unit_root.join("META-INF/stevedore.features");
        std::fs::create_dir_all(&meta).unwrap();

        let mut doc = format!("name = \"{name}\"\n");
        for (feature, auto) in features {
            doc.push_str(&format!(
                "\n[[feature]]\nname = \"{feature}\"\nversion = \"1.0.0\"\ninstall = \"{}\"\n",
                if *auto { "auto" } else { "manual" }
            ));
        }
        std::fs::write(meta.join(format!("{name}.repository")), doc).unwrap();
        DirectoryUnit::new(UnitId::new(name).unwrap(), unit_root)
    }

    fn listener(root: &TempDir) -> (Arc<LocalRegistry>, DeploymentListener) {
        let registry = Arc::new(LocalRegistry::new());
        let listener = DeploymentListener::new(
            DescriptorScanner::default(),
            ActivationLedger::in_dir(&root.path().join("data")),
            Arc::clone(&registry) as Arc<dyn CapabilityRegistry>,
            InstallOptions::default(),
        );
        (registry, listener)
    }

    #[tokio::test]
    async fn start_then_stop() {
        let root = TempDir::new().unwrap();
        let (registry, listener) = listener(&root);
        let unit = unit_dir(&root, "web", &[("http", true), ("admin", false)]);

        let outcome = listener.on_unit_event(&unit, UnitEventKind::Started).await;
        let report = outcome.report().unwrap();
        assert!(outcome.is_completed());
        assert_eq!(report.applied.len(), 1);
        assert_eq!(registry.installed(), vec![Capability::auto("http", "1.0.0").id()]);

        let outcome = listener.on_unit_event(&unit, UnitEventKind::Stopped).await;
        assert!(outcome.is_completed());
        assert!(registry.installed().is_empty());
        assert!(registry.list_descriptors().await.is_empty());
    }

    #[tokio::test]
    async fn other_kinds_are_ignored() {
        let root = TempDir::new().unwrap();
        let (registry, listener) = listener(&root);
        let unit = unit_dir(&root, "web", &[("http", true)]);

        for kind in [
            UnitEventKind::Installed,
            UnitEventKind::Resolved,
            UnitEventKind::Starting,
            UnitEventKind::Unknown(4096),
        ] {
            assert!(matches!(
                listener.on_unit_event(&unit, kind).await,
                EventOutcome::Ignored
            ));
        }
        assert!(registry.list_descriptors().await.is_empty());
    }

    #[tokio::test]
    async fn unit_without_descriptor_is_ignored() {
        let root = TempDir::new().unwrap();
        let (_registry, listener) = listener(&root);
        let plain = root.path().join("plain");
        std::fs::create_dir_all(&plain).unwrap();
        let unit = DirectoryUnit::new(UnitId::from_static("plain"), plain);

        assert!(matches!(
            listener.on_unit_event(&unit, UnitEventKind::Started).await,
            EventOutcome::Ignored
        ));
    }

    #[tokio::test]
    async fn ambiguous_unit_is_rejected() {
        let root = TempDir::new().unwrap();
        let (registry, listener) = listener(&root);
        let unit = unit_dir(&root, "web", &[("http", true)]);
        std::fs::write(
            unit.root().join("META-INF/stevedore.features/extra.repository"),
            "name = \"extra\"",
        )
        .unwrap();

        let outcome = listener.on_unit_event(&unit, UnitEventKind::Started).await;
        assert!(matches!(
            outcome,
            EventOutcome::Inconsistent(Inconsistency::AmbiguousDescriptor { ref candidates, .. })
                if candidates.len() == 2
        ));
        assert!(registry.list_descriptors().await.is_empty());
    }

    #[tokio::test]
    async fn stop_of_unregistered_unit_is_rejected() {
        let root = TempDir::new().unwrap();
        let (_registry, listener) = listener(&root);
        let unit = unit_dir(&root, "web", &[("http", true)]);

        assert!(matches!(
            listener.on_unit_event(&unit, UnitEventKind::Stopped).await,
            EventOutcome::Inconsistent(Inconsistency::NotRegistered { .. })
        ));
        assert!(listener.ledger().snapshot().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_drains_the_channel() {
        let root = TempDir::new().unwrap();
        let (registry, listener) = listener(&root);
        let unit: Arc<dyn DeployableUnit> = Arc::new(unit_dir(&root, "web", &[("http", true)]));

        let (tx, rx) = mpsc::channel(4);
        tx.send(UnitEvent::from_code(Arc::clone(&unit), UnitEventKind::Started.code()))
            .await
            .unwrap();
        drop(tx);

        listener.run(rx).await;
        assert_eq!(registry.installed().len(), 1);
    }
}
