//! Persisted reference counts for capability activations.
//!
//! The ledger (`deployer.properties` in the deployer's data directory)
//! records which units currently claim which capabilities, and how many
//! units claim each capability in total. It survives host restarts.
//!
//! # Format
//!
//! A flat `key=value` text file with two key families:
//!
//! ```text
//! <unit>/<capability>=0|1
//! total/<capability>=<count>
//! ```
//!
//! `/` separates the key parts, so neither unit ids nor capability ids may
//! contain it. Keys are never removed: an edge that drops back to `0` stays
//! in the file.
//!
//! Every guarded operation re-reads the whole file, mutates it in memory
//! and rewrites it atomically under an advisory lock. Concurrent writers
//! are expected to be serialized by the caller.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;
use tracing::debug;

use crate::descriptor::CapabilityId;
use crate::unit::UnitId;

/// Standard ledger file name.
pub const LEDGER_FILE_NAME: &str = "deployer.properties";

/// Key prefix for per-capability totals.
const TOTAL_PREFIX: &str = "total";

/// Key part separator.
const SEPARATOR: char = '/';

/// The ledger could not be read, parsed or written.
#[derive(Debug, thiserror::Error)]
#[error("ledger error at {path}: {message}")]
pub struct LedgerError {
    /// Path to the ledger file.
    pub path: PathBuf,
    /// Error description.
    pub message: String,
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Reference-count store backed by a properties file.
#[derive(Debug, Clone)]
pub struct ActivationLedger {
    path: PathBuf,
}

impl ActivationLedger {
    /// Create a ledger backed by `path`. Nothing is read until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a ledger backed by [`LEDGER_FILE_NAME`] inside `data_dir`.
    #[must_use]
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(LEDGER_FILE_NAME))
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Claim `capability` for `unit`.
    ///
    /// If the unit does not hold the capability yet, records the claim,
    /// bumps the capability total, persists, and returns `true`. Otherwise
    /// returns `false` and leaves the ledger untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read or written.
    pub fn check_increment(&self, unit: &UnitId, capability: &CapabilityId) -> LedgerResult<bool> {
        self.update(|state| {
            let edge_key = edge_key(unit, capability);
            let total_key = total_key(capability);
            if state.get(&edge_key) != 0 {
                return false;
            }
            let total = state.get(&total_key);
            state.set(edge_key, 1);
            state.set(total_key, total.saturating_add(1));
            true
        })
    }

    /// Release `capability` for `unit`.
    ///
    /// If the unit holds the capability, clears the claim, lowers the
    /// capability total (never below zero), persists, and returns `true`.
    /// Otherwise returns `false` and leaves the ledger untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read or written.
    pub fn check_decrement(&self, unit: &UnitId, capability: &CapabilityId) -> LedgerResult<bool> {
        self.update(|state| {
            let edge_key = edge_key(unit, capability);
            let total_key = total_key(capability);
            if state.get(&edge_key) != 1 {
                return false;
            }
            let total = state.get(&total_key);
            state.set(edge_key, 0);
            state.set(total_key, total.saturating_sub(1));
            true
        })
    }

    /// Number of units currently claiming `capability`.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn total(&self, capability: &CapabilityId) -> LedgerResult<u64> {
        Ok(self.read()?.get(&total_key(capability)))
    }

    /// Whether `unit` claims `capability` (`0` or `1`).
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn edge(&self, unit: &UnitId, capability: &CapabilityId) -> LedgerResult<u64> {
        Ok(self.read()?.get(&edge_key(unit, capability)))
    }

    /// A copy of every entry currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn snapshot(&self) -> LedgerResult<LedgerSnapshot> {
        let state = self.read()?;
        Ok(LedgerSnapshot {
            entries: state.entries,
        })
    }

    /// Check the stored counters against each other.
    ///
    /// Reports every edge outside `{0, 1}` and every total that differs
    /// from the number of units claiming the capability.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn verify(&self) -> LedgerResult<Vec<LedgerViolation>> {
        Ok(self.snapshot()?.violations())
    }

    /// Load the current state under a shared lock.
    fn read(&self) -> LedgerResult<LedgerState> {
        let _lock_guard = acquire_lock_file(&self.path, LockMode::Shared)?;
        self.load()
    }

    /// Load, mutate and, if the closure reports a change, save the ledger
    /// under a single exclusive lock.
    fn update<F>(&self, f: F) -> LedgerResult<bool>
    where
        F: FnOnce(&mut LedgerState) -> bool,
    {
        let _lock_guard = acquire_lock_file(&self.path, LockMode::Exclusive)?;
        let mut state = self.load()?;
        let changed = f(&mut state);
        if changed {
            self.save(&state)?;
        }
        Ok(changed)
    }

    /// Read the backing file. A missing file is an empty ledger.
    fn load(&self) -> LedgerResult<LedgerState> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let state = LedgerState::parse(&content).map_err(|message| self.err(message))?;
                debug!(path = %self.path.display(), entries = state.entries.len(), "Loaded ledger");
                Ok(state)
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LedgerState::default()),
            Err(e) => Err(self.err(format!("failed to read ledger: {e}"))),
        }
    }

    /// Rewrite the backing file atomically (temp file, fsync, rename).
    fn save(&self, state: &LedgerState) -> LedgerResult<()> {
        let parent = self.path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)
            .map_err(|e| self.err(format!("failed to create parent directory: {e}")))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| self.err(format!("failed to create temp file for atomic write: {e}")))?;

        tmp.write_all(state.render().as_bytes())
            .map_err(|e| self.err(format!("failed to write temp ledger: {e}")))?;

        tmp.as_file()
            .sync_all()
            .map_err(|e| self.err(format!("failed to sync temp ledger to disk: {e}")))?;

        tmp.persist(&self.path)
            .map_err(|e| self.err(format!("failed to atomically replace ledger: {e}")))?;

        debug!(path = %self.path.display(), entries = state.entries.len(), "Saved ledger");
        Ok(())
    }

    fn err(&self, message: impl Into<String>) -> LedgerError {
        LedgerError {
            path: self.path.clone(),
            message: message.into(),
        }
    }
}

fn edge_key(unit: &UnitId, capability: &CapabilityId) -> String {
    format!("{unit}{SEPARATOR}{capability}")
}

fn total_key(capability: &CapabilityId) -> String {
    format!("{TOTAL_PREFIX}{SEPARATOR}{capability}")
}

/// In-memory copy of the ledger file.
#[derive(Debug, Default)]
struct LedgerState {
    entries: BTreeMap<String, u64>,
}

impl LedgerState {
    fn get(&self, key: &str) -> u64 {
        self.entries.get(key).copied().unwrap_or(0)
    }

    fn set(&mut self, key: String, value: u64) {
        self.entries.insert(key, value);
    }

    fn parse(content: &str) -> Result<Self, String> {
        let mut entries = BTreeMap::new();
        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let line_no = index.saturating_add(1);
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| format!("line {line_no}: expected key=value, got {line:?}"))?;
            let key = key.trim();
            let value = value.trim();
            let count: u64 = value
                .parse()
                .map_err(|e| format!("line {line_no}: invalid count {value:?} for {key}: {e}"))?;
            entries.insert(key.to_string(), count);
        }
        Ok(Self { entries })
    }

    fn render(&self) -> String {
        let mut out = String::from("# Auto-generated by stevedore. Do not edit manually.\n");
        out.push_str(&format!("# {}\n", Utc::now().to_rfc3339()));
        for (key, value) in &self.entries {
            out.push_str(&format!("{key}={value}\n"));
        }
        out
    }
}

/// Read-only view of every ledger entry.
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    entries: BTreeMap<String, u64>,
}

impl LedgerSnapshot {
    /// Raw `key → value` entries, sorted by key.
    #[must_use]
    pub fn entries(&self) -> &BTreeMap<String, u64> {
        &self.entries
    }

    /// Per-capability totals as `(capability, count)`.
    pub fn totals(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().filter_map(|(key, value)| {
            key.strip_prefix(TOTAL_PREFIX)
                .and_then(|rest| rest.strip_prefix(SEPARATOR))
                .map(|capability| (capability, *value))
        })
    }

    /// Per-unit claims as `(unit, capability, value)`.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, u64)> {
        self.entries.iter().filter_map(|(key, value)| {
            let (unit, capability) = key.split_once(SEPARATOR)?;
            (unit != TOTAL_PREFIX).then_some((unit, capability, *value))
        })
    }

    /// Whether the ledger holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn violations(&self) -> Vec<LedgerViolation> {
        let mut violations = Vec::new();
        let mut claimed: BTreeMap<&str, u64> = BTreeMap::new();

        for (unit, capability, value) in self.edges() {
            if value > 1 {
                violations.push(LedgerViolation::EdgeOutOfRange {
                    unit: unit.to_string(),
                    capability: capability.to_string(),
                    value,
                });
            }
            let count = claimed.entry(capability).or_insert(0);
            if value == 1 {
                *count = count.saturating_add(1);
            }
        }

        let totals: BTreeMap<&str, u64> = self.totals().collect();
        let capabilities: std::collections::BTreeSet<&str> =
            totals.keys().chain(claimed.keys()).copied().collect();

        for capability in capabilities {
            let total = totals.get(capability).copied().unwrap_or(0);
            let edges = claimed.get(capability).copied().unwrap_or(0);
            if total != edges {
                violations.push(LedgerViolation::TotalMismatch {
                    capability: capability.to_string(),
                    total,
                    edges,
                });
            }
        }

        violations
    }
}

/// A disagreement between stored counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerViolation {
    /// An edge holds a value other than `0` or `1`.
    EdgeOutOfRange {
        /// Unit id part of the key.
        unit: String,
        /// Capability id part of the key.
        capability: String,
        /// Stored value.
        value: u64,
    },
    /// A total differs from the number of claiming units.
    TotalMismatch {
        /// Capability id.
        capability: String,
        /// Stored total.
        total: u64,
        /// Number of edges set to `1`.
        edges: u64,
    },
}

impl fmt::Display for LedgerViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EdgeOutOfRange {
                unit,
                capability,
                value,
            } => write!(f, "edge {unit}/{capability} holds {value}, expected 0 or 1"),
            Self::TotalMismatch {
                capability,
                total,
                edges,
            } => write!(
                f,
                "capability {capability}: total is {total} but {edges} unit(s) claim it"
            ),
        }
    }
}

/// Whether to acquire a shared (read) or exclusive (write) lock.
#[derive(Clone, Copy)]
enum LockMode {
    Shared,
    Exclusive,
}

/// Acquire an advisory file lock on a `.lk` sibling of the ledger.
///
/// In shared mode a missing lock file means no writer has ever run, so no
/// lock is taken and nothing is created.
fn acquire_lock_file(ledger_path: &Path, mode: LockMode) -> LedgerResult<Option<std::fs::File>> {
    let lock_path = ledger_path.with_extension("lk");
    let err = |message: String| LedgerError {
        path: ledger_path.to_path_buf(),
        message,
    };

    match mode {
        LockMode::Shared => match std::fs::OpenOptions::new().read(true).open(&lock_path) {
            Ok(lock_file) => {
                lock_file
                    .lock_shared()
                    .map_err(|e| err(format!("failed to acquire shared file lock: {e}")))?;
                Ok(Some(lock_file))
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(err(format!("failed to open lock file: {e}"))),
        },
        LockMode::Exclusive => {
            if let Some(parent) = lock_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| err(format!("failed to create lock file directory: {e}")))?;
            }

            let lock_file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .read(true)
                .open(&lock_path)
                .map_err(|e| err(format!("failed to open lock file: {e}")))?;

            lock_file
                .lock_exclusive()
                .map_err(|e| err(format!("failed to acquire exclusive file lock: {e}")))?;

            Ok(Some(lock_file))
        },
    }
}
