//! Host lifecycle events.
//!
//! The host reports unit transitions as numeric codes. Only two of them
//! matter to the deployer; everything else collapses to "no action", and
//! codes the host may add later land in [`UnitEventKind::Unknown`].

use std::fmt;
use std::sync::Arc;

use crate::unit::DeployableUnit;

/// Classification of a raw host lifecycle code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitEventKind {
    /// The unit was installed into the host.
    Installed,
    /// The unit was started.
    Started,
    /// The unit was stopped.
    Stopped,
    /// The unit was updated in place.
    Updated,
    /// The unit was removed from the host.
    Uninstalled,
    /// The unit's requirements were resolved.
    Resolved,
    /// The unit's requirements were unresolved.
    Unresolved,
    /// The unit is about to start.
    Starting,
    /// The unit is about to stop.
    Stopping,
    /// The unit is waiting for lazy activation.
    LazyActivation,
    /// A code this deployer does not know about.
    Unknown(u32),
}

/// What the deployer does in response to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitAction {
    /// Register the unit's descriptor and activate its capabilities.
    Add,
    /// Deactivate the unit's capabilities and unregister its descriptor.
    Remove,
}

const KNOWN: &[(u32, UnitEventKind)] = &[
    (1, UnitEventKind::Installed),
    (2, UnitEventKind::Started),
    (4, UnitEventKind::Stopped),
    (8, UnitEventKind::Updated),
    (16, UnitEventKind::Uninstalled),
    (32, UnitEventKind::Resolved),
    (64, UnitEventKind::Unresolved),
    (128, UnitEventKind::Starting),
    (256, UnitEventKind::Stopping),
    (512, UnitEventKind::LazyActivation),
];

impl UnitEventKind {
    /// Map a host lifecycle code to its kind.
    #[must_use]
    pub fn from_code(code: u32) -> Self {
        KNOWN
            .iter()
            .find(|(known, _)| *known == code)
            .map_or(Self::Unknown(code), |(_, kind)| *kind)
    }

    /// The host lifecycle code for this kind.
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            Self::Unknown(code) => code,
            known => KNOWN
                .iter()
                .find(|(_, kind)| *kind == known)
                .map_or(0, |(code, _)| *code),
        }
    }

    /// The deployer action for this kind, if any.
    #[must_use]
    pub fn action(self) -> Option<UnitAction> {
        match self {
            Self::Started => Some(UnitAction::Add),
            Self::Stopped => Some(UnitAction::Remove),
            _ => None,
        }
    }
}

impl From<u32> for UnitEventKind {
    fn from(code: u32) -> Self {
        Self::from_code(code)
    }
}

impl fmt::Display for UnitEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installed => f.write_str("INSTALLED"),
            Self::Started => f.write_str("STARTED"),
            Self::Stopped => f.write_str("STOPPED"),
            Self::Updated => f.write_str("UPDATED"),
            Self::Uninstalled => f.write_str("UNINSTALLED"),
            Self::Resolved => f.write_str("RESOLVED"),
            Self::Unresolved => f.write_str("UNRESOLVED"),
            Self::Starting => f.write_str("STARTING"),
            Self::Stopping => f.write_str("STOPPING"),
            Self::LazyActivation => f.write_str("LAZY_ACTIVATION"),
            Self::Unknown(code) => write!(f, "UNKNOWN({code})"),
        }
    }
}

/// A lifecycle event delivered by the host.
#[derive(Clone)]
pub struct UnitEvent {
    /// The unit that changed state.
    pub unit: Arc<dyn DeployableUnit>,
    /// What happened to it.
    pub kind: UnitEventKind,
}

impl UnitEvent {
    /// Build an event from a raw host code.
    #[must_use]
    pub fn from_code(unit: Arc<dyn DeployableUnit>, code: u32) -> Self {
        Self {
            unit,
            kind: UnitEventKind::from_code(code),
        }
    }
}

impl fmt::Debug for UnitEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitEvent")
            .field("unit", self.unit.id())
            .field("kind", &self.kind)
            .finish()
    }
}
