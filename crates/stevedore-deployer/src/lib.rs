//! Reference-counted hot deployment of shared capabilities.
//!
//! Deployable units may embed a capability descriptor. When such a unit
//! starts, its descriptor is registered and every auto-activate capability
//! it declares is claimed; when it stops, the claims are released and the
//! descriptor is unregistered. Several units may claim the same capability:
//! it is installed on the first claim and uninstalled on the last release.
//!
//! - [`DeploymentListener`]: reacts to unit start/stop events
//! - [`CapabilityCoordinator`]: maps claims onto registry install/uninstall
//! - [`ActivationLedger`]: durable per-unit claims and per-capability totals
//! - [`DescriptorScanner`]: finds the single descriptor inside a unit
//! - [`CapabilityRegistry`]: the external install machinery, with
//!   [`LocalRegistry`] as an in-process implementation
//! - [`ArtifactHandler`]: recognizes bare descriptors dropped for hot deploy
//!
//! # Ledger format
//!
//! The ledger is a flat `key=value` file with two key families:
//!
//! ```text
//! web/http@1.0.0=1
//! total/http@1.0.0=2
//! ```
//!
//! Edges are always `0` or `1`, and each total equals the number of units
//! whose edge is `1`. `/` separates key segments, so neither unit ids nor
//! capability ids may contain it.
//!
//! # Failure model
//!
//! Structural inconsistencies (duplicate events, ledger/registry drift,
//! ambiguous units) are logged as [`Inconsistency`] values and never abort
//! more than the step that found them. Ledger and registry errors abort the
//! rest of the unit's workflow without rollback; redelivering the event is
//! safe because already-applied claims are skipped.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod artifact;
pub mod coordinator;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod inconsistency;
pub mod ledger;
pub mod listener;
pub mod registry;
pub mod report;
pub mod scanner;
pub mod settings;
pub mod unit;

pub use artifact::{ArtifactHandler, DEFAULT_WRAPPER_PROTOCOL};
pub use coordinator::{Activation, CapabilityCoordinator, Deactivation};
pub use descriptor::{
    Capability, CapabilityId, Descriptor, DescriptorDocument, InstallMode, KNOWN_SCHEMAS,
};
pub use error::{DeployError, DeployResult};
pub use event::{UnitAction, UnitEvent, UnitEventKind};
pub use inconsistency::Inconsistency;
pub use ledger::{
    ActivationLedger, LEDGER_FILE_NAME, LedgerError, LedgerResult, LedgerSnapshot, LedgerViolation,
};
pub use listener::{DeploymentListener, EventOutcome};
pub use registry::{
    CapabilityRegistry, InstallOptions, LocalRegistry, RegistryError, RegistryResult,
};
pub use report::ActivationReport;
pub use scanner::{DEFAULT_DESCRIPTOR_DIR, DEFAULT_EXTENSION, DescriptorScanner, ScanResult};
pub use settings::DeployerSettings;
pub use unit::{DeployableUnit, DirectoryUnit, UnitId};
