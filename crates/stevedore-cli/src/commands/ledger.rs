//! CLI handlers for the `stevedore ledger` subcommand.

use std::fmt::Write as _;

use anyhow::{Context, Result, bail};
use stevedore_deployer::{ActivationLedger, DeployerSettings, LedgerSnapshot};
use tracing::debug;

/// Print every claim and total recorded in the ledger.
pub(crate) fn show_ledger(settings: &DeployerSettings) -> Result<()> {
    let ledger = settings.ledger();
    let snapshot = ledger
        .snapshot()
        .with_context(|| format!("failed to read ledger {}", ledger.path().display()))?;
    debug!(path = %ledger.path().display(), entries = snapshot.entries().len(), "Rendering ledger");

    print!("{}", render_snapshot(&ledger, &snapshot));
    Ok(())
}

/// Check the ledger's counters against each other.
pub(crate) fn verify_ledger(settings: &DeployerSettings) -> Result<()> {
    let ledger = settings.ledger();
    let violations = ledger
        .verify()
        .with_context(|| format!("failed to read ledger {}", ledger.path().display()))?;
    debug!(path = %ledger.path().display(), violations = violations.len(), "Verified ledger");

    if violations.is_empty() {
        println!("Ledger {} is consistent.", ledger.path().display());
        return Ok(());
    }

    for violation in &violations {
        eprintln!("  - {violation}");
    }
    bail!(
        "ledger {} has {} violation(s)",
        ledger.path().display(),
        violations.len()
    );
}

fn render_snapshot(ledger: &ActivationLedger, snapshot: &LedgerSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Ledger: {}", ledger.path().display());

    if snapshot.is_empty() {
        out.push_str("\nNo claims recorded.\n");
        return out;
    }

    out.push_str("\nCapabilities:\n");
    for (capability, total) in snapshot.totals() {
        let _ = writeln!(out, "  {capability}  (total {total})");
        for (unit, _, _) in snapshot
            .edges()
            .filter(|(_, claimed, value)| *claimed == capability && *value > 0)
        {
            let _ = writeln!(out, "    - {unit}");
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use stevedore_deployer::{CapabilityId, UnitId};

    fn cap(name: &str) -> CapabilityId {
        CapabilityId {
            name: name.to_owned(),
            version: "1.0.0".to_owned(),
        }
    }

    #[test]
    fn empty_ledger_renders_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ActivationLedger::in_dir(dir.path());
        let out = render_snapshot(&ledger, &ledger.snapshot().unwrap());
        assert!(out.contains("No claims recorded."));
    }

    #[test]
    fn claims_are_grouped_by_capability() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ActivationLedger::in_dir(dir.path());
        let web = UnitId::from_static("web");
        let api = UnitId::from_static("api");

        ledger.check_increment(&web, &cap("http")).unwrap();
        ledger.check_increment(&api, &cap("http")).unwrap();
        ledger.check_increment(&api, &cap("jdbc")).unwrap();
        ledger.check_decrement(&web, &cap("http")).unwrap();

        let out = render_snapshot(&ledger, &ledger.snapshot().unwrap());
        assert!(out.contains("http@1.0.0  (total 1)"));
        assert!(out.contains("jdbc@1.0.0  (total 1)"));
        assert!(out.contains("    - api"));
        assert!(!out.contains("    - web"));
    }

    #[test]
    fn verify_reports_tampered_totals() {
        let dir = tempfile::tempdir().unwrap();
        let settings = DeployerSettings::new(dir.path());
        std::fs::write(
            settings.ledger_path(),
            "web/http@1.0.0=1\ntotal/http@1.0.0=3\n",
        )
        .unwrap();

        assert!(verify_ledger(&settings).is_err());
    }

    #[test]
    fn show_reads_the_configured_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let settings = DeployerSettings::new(dir.path());
        settings
            .ledger()
            .check_increment(&UnitId::from_static("web"), &cap("http"))
            .unwrap();

        assert!(show_ledger(&settings).is_ok());
    }

    #[test]
    fn show_fails_on_unreadable_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let settings = DeployerSettings::new(dir.path());
        std::fs::create_dir_all(settings.ledger_path()).unwrap();

        let err = show_ledger(&settings).unwrap_err();
        assert!(err.to_string().contains("failed to read ledger"));
    }

    #[test]
    fn verify_accepts_missing_ledger() {
        let dir = tempfile::tempdir().unwrap();
        assert!(verify_ledger(&DeployerSettings::new(dir.path())).is_ok());
    }
}
