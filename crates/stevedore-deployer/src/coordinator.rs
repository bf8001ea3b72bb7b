//! Reconciles ledger transitions with the capability registry.
//!
//! Per `(unit, capability)` edge the ledger is a two-state machine
//! (`ABSENT`/`ACTIVE`). Per capability the installed state follows the
//! total: installed while at least one unit claims it, uninstalled when the
//! last claim goes away. When the ledger and the registry disagree the
//! coordinator logs the drift and still moves the registry toward demand.

use std::sync::Arc;

use tracing::{debug, info};

use crate::descriptor::Capability;
use crate::error::DeployResult;
use crate::inconsistency::Inconsistency;
use crate::ledger::{ActivationLedger, LedgerResult};
use crate::registry::{CapabilityRegistry, InstallOptions};
use crate::unit::UnitId;

/// Result of [`CapabilityCoordinator::activate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// First claim (or drift): the capability was installed.
    Installed,
    /// The capability was already installed; the claim was recorded.
    Recorded,
    /// The unit already held the capability; nothing changed.
    Duplicate,
}

impl Activation {
    /// Whether the ledger transition was applied.
    #[must_use]
    pub fn is_applied(self) -> bool {
        !matches!(self, Self::Duplicate)
    }
}

/// Result of [`CapabilityCoordinator::deactivate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deactivation {
    /// Last claim released: the capability was uninstalled.
    Uninstalled,
    /// Other units still claim the capability; it stays installed.
    Released,
    /// Last claim released, but the capability was already gone.
    AlreadyAbsent,
    /// The unit did not hold the capability; nothing changed.
    Duplicate,
}

impl Deactivation {
    /// Whether the ledger transition was applied.
    #[must_use]
    pub fn is_applied(self) -> bool {
        !matches!(self, Self::Duplicate)
    }
}

/// Decides, per capability, whether the registry must install or
/// uninstall it.
pub struct CapabilityCoordinator {
    ledger: ActivationLedger,
    registry: Arc<dyn CapabilityRegistry>,
    options: InstallOptions,
}

impl CapabilityCoordinator {
    /// Create a coordinator over `ledger` and `registry`.
    pub fn new(
        ledger: ActivationLedger,
        registry: Arc<dyn CapabilityRegistry>,
        options: InstallOptions,
    ) -> Self {
        Self {
            ledger,
            registry,
            options,
        }
    }

    /// The ledger this coordinator mutates.
    #[must_use]
    pub fn ledger(&self) -> &ActivationLedger {
        &self.ledger
    }

    /// Run a ledger operation on the blocking pool. Ledger calls take file
    /// locks and fsync, which must not stall the async workers.
    async fn with_ledger<T, F>(&self, op: F) -> DeployResult<T>
    where
        F: FnOnce(&ActivationLedger) -> LedgerResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let ledger = self.ledger.clone();
        Ok(tokio::task::spawn_blocking(move || op(&ledger)).await??)
    }

    /// Record `unit`'s claim on `capability`, installing it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be persisted or the registry
    /// fails to install the capability.
    pub async fn activate(
        &self,
        unit: &UnitId,
        capability: &Capability,
    ) -> DeployResult<Activation> {
        let id = capability.id();

        let (claimant, claimed) = (unit.clone(), id.clone());
        let applied = self
            .with_ledger(move |ledger| ledger.check_increment(&claimant, &claimed))
            .await?;
        if !applied {
            Inconsistency::DuplicateActivation {
                unit: unit.clone(),
                capability: id,
            }
            .report();
            return Ok(Activation::Duplicate);
        }

        if self.registry.is_capability_installed(capability).await {
            debug!(unit = %unit, capability = %id, "Capability already installed, claim recorded");
            return Ok(Activation::Recorded);
        }

        let claimed = id.clone();
        let total = self
            .with_ledger(move |ledger| ledger.total(&claimed))
            .await?;
        if total > 1 {
            Inconsistency::MissingWhileClaimed {
                unit: unit.clone(),
                capability: id.clone(),
                total,
            }
            .report();
        }

        self.registry
            .install_capability(&capability.name, &capability.version, &self.options)
            .await?;
        info!(unit = %unit, capability = %id, total, "Installed capability");
        Ok(Activation::Installed)
    }

    /// Release `unit`'s claim on `capability`, uninstalling it once no
    /// unit claims it any more.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be persisted or the registry
    /// fails to uninstall the capability.
    pub async fn deactivate(
        &self,
        unit: &UnitId,
        capability: &Capability,
    ) -> DeployResult<Deactivation> {
        let id = capability.id();

        let (claimant, claimed) = (unit.clone(), id.clone());
        let applied = self
            .with_ledger(move |ledger| ledger.check_decrement(&claimant, &claimed))
            .await?;
        if !applied {
            Inconsistency::DuplicateDeactivation {
                unit: unit.clone(),
                capability: id,
            }
            .report();
            return Ok(Deactivation::Duplicate);
        }

        let claimed = id.clone();
        let total = self
            .with_ledger(move |ledger| ledger.total(&claimed))
            .await?;
        if total > 0 {
            debug!(unit = %unit, capability = %id, total, "Claim released, capability still in use");
            return Ok(Deactivation::Released);
        }

        if !self.registry.is_capability_installed(capability).await {
            Inconsistency::AbsentOnRelease {
                unit: unit.clone(),
                capability: id,
            }
            .report();
            return Ok(Deactivation::AlreadyAbsent);
        }

        self.registry
            .uninstall_capability(&capability.name, &capability.version)
            .await?;
        info!(unit = %unit, capability = %id, "Uninstalled capability");
        Ok(Deactivation::Uninstalled)
    }
}

impl std::fmt::Debug for CapabilityCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityCoordinator")
            .field("ledger", &self.ledger.path())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
