//! Structural inconsistencies.
//!
//! These are disagreements between what the deployer expects and what the
//! ledger, the registry or the unit actually present. They are logged with
//! full context and never abort anything beyond the step that found them.

use std::fmt;

use tracing::error;
use url::Url;

use crate::descriptor::CapabilityId;
use crate::unit::UnitId;

/// A detected state disagreement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    /// Activation requested for an edge the ledger already holds.
    DuplicateActivation {
        /// Claiming unit.
        unit: UnitId,
        /// Capability.
        capability: CapabilityId,
    },
    /// Deactivation requested for an edge the ledger does not hold.
    DuplicateDeactivation {
        /// Releasing unit.
        unit: UnitId,
        /// Capability.
        capability: CapabilityId,
    },
    /// Other units already claim the capability, yet the registry reports
    /// it as not installed.
    MissingWhileClaimed {
        /// Unit whose claim exposed the drift.
        unit: UnitId,
        /// Capability.
        capability: CapabilityId,
        /// Total after recording the new claim.
        total: u64,
    },
    /// The last claim was released but the registry reports the
    /// capability as already absent.
    AbsentOnRelease {
        /// Unit that released the last claim.
        unit: UnitId,
        /// Capability.
        capability: CapabilityId,
    },
    /// The unit embeds more than one descriptor.
    AmbiguousDescriptor {
        /// Offending unit.
        unit: UnitId,
        /// Every matching descriptor location.
        candidates: Vec<Url>,
    },
    /// The unit started while its descriptor is already registered.
    AlreadyRegistered {
        /// Offending unit.
        unit: UnitId,
    },
    /// The unit stopped while its descriptor is not registered.
    NotRegistered {
        /// Offending unit.
        unit: UnitId,
    },
}

impl Inconsistency {
    /// Short machine-readable label.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateActivation { .. } => "duplicate_activation",
            Self::DuplicateDeactivation { .. } => "duplicate_deactivation",
            Self::MissingWhileClaimed { .. } => "missing_while_claimed",
            Self::AbsentOnRelease { .. } => "absent_on_release",
            Self::AmbiguousDescriptor { .. } => "ambiguous_descriptor",
            Self::AlreadyRegistered { .. } => "already_registered",
            Self::NotRegistered { .. } => "not_registered",
        }
    }

    /// The unit involved.
    #[must_use]
    pub fn unit(&self) -> &UnitId {
        match self {
            Self::DuplicateActivation { unit, .. }
            | Self::DuplicateDeactivation { unit, .. }
            | Self::MissingWhileClaimed { unit, .. }
            | Self::AbsentOnRelease { unit, .. }
            | Self::AmbiguousDescriptor { unit, .. }
            | Self::AlreadyRegistered { unit }
            | Self::NotRegistered { unit } => unit,
        }
    }

    /// Log this inconsistency at `error` level.
    pub fn report(&self) {
        error!(kind = self.kind(), unit = %self.unit(), "Inconsistency: {self}");
    }
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateActivation { unit, capability } => write!(
                f,
                "unit {unit} already holds {capability}; activation ignored"
            ),
            Self::DuplicateDeactivation { unit, capability } => write!(
                f,
                "unit {unit} does not hold {capability}; deactivation ignored"
            ),
            Self::MissingWhileClaimed {
                unit,
                capability,
                total,
            } => write!(
                f,
                "{capability} is not installed although {total} unit(s) claim it \
                 (latest: {unit}); installing"
            ),
            Self::AbsentOnRelease { unit, capability } => write!(
                f,
                "{capability} should be installed when {unit} releases the last claim, \
                 but the registry reports it absent"
            ),
            Self::AmbiguousDescriptor { unit, candidates } => {
                write!(f, "unit {unit} embeds {} descriptors:", candidates.len())?;
                for url in candidates {
                    write!(f, " {url}")?;
                }
                Ok(())
            },
            Self::AlreadyRegistered { unit } => {
                write!(f, "descriptor for unit {unit} is already registered")
            },
            Self::NotRegistered { unit } => {
                write!(f, "descriptor for unit {unit} is not registered")
            },
        }
    }
}
