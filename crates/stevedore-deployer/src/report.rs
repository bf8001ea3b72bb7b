//! Per-workflow activation summary.

use crate::descriptor::CapabilityId;
use crate::event::UnitAction;
use crate::unit::UnitId;

/// What one add or remove workflow did to each auto-activate capability.
///
/// Capabilities after a failure are never attempted; they show up in
/// [`skipped`](Self::skipped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    /// The unit the workflow ran for.
    pub unit: UnitId,
    /// Add or remove.
    pub action: UnitAction,
    /// Auto-activate capabilities, in declaration order.
    pub requested: Vec<CapabilityId>,
    /// Capabilities whose ledger transition was applied.
    pub applied: Vec<CapabilityId>,
    /// Capabilities refused by the ledger's idempotency guard.
    pub duplicates: Vec<CapabilityId>,
    /// The capability that aborted the workflow, with the reason.
    pub failure: Option<(CapabilityId, String)>,
}

impl ActivationReport {
    /// Start an empty report.
    #[must_use]
    pub fn new(unit: UnitId, action: UnitAction) -> Self {
        Self {
            unit,
            action,
            requested: Vec::new(),
            applied: Vec::new(),
            duplicates: Vec::new(),
            failure: None,
        }
    }

    pub(crate) fn request(&mut self, ids: impl IntoIterator<Item = CapabilityId>) {
        self.requested.extend(ids);
    }

    pub(crate) fn record(&mut self, id: CapabilityId, applied: bool) {
        if applied {
            self.applied.push(id);
        } else {
            self.duplicates.push(id);
        }
    }

    pub(crate) fn fail(&mut self, id: CapabilityId, reason: &impl ToString) {
        self.failure = Some((id, reason.to_string()));
    }

    /// Requested capabilities that were never attempted.
    #[must_use]
    pub fn skipped(&self) -> Vec<&CapabilityId> {
        self.requested
            .iter()
            .filter(|id| {
                !self.applied.contains(id)
                    && !self.duplicates.contains(id)
                    && self.failure.as_ref().is_none_or(|(failed, _)| failed != *id)
            })
            .collect()
    }

    /// Whether every requested capability was processed without error.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.skipped().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Capability;

    #[test]
    fn skipped_excludes_processed_and_failed() {
        let a = Capability::auto("a", "1").id();
        let b = Capability::auto("b", "1").id();
        let c = Capability::auto("c", "1").id();
        let d = Capability::auto("d", "1").id();

        let mut report = ActivationReport::new(UnitId::from_static("u"), UnitAction::Add);
        report.request([a.clone(), b.clone(), c.clone(), d.clone()]);
        report.record(a, true);
        report.record(b, false);
        report.fail(c, &"boom");

        assert_eq!(report.skipped(), vec![&d]);
        assert!(!report.is_complete());
    }

    #[test]
    fn empty_report_is_complete() {
        let report = ActivationReport::new(UnitId::from_static("u"), UnitAction::Remove);
        assert!(report.is_complete());
    }
}
