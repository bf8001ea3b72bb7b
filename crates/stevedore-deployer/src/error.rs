//! Deployer error types.

use std::path::PathBuf;

use crate::ledger::LedgerError;
use crate::registry::RegistryError;
use crate::unit::UnitId;

/// Errors that abort a unit workflow.
///
/// Structural inconsistencies are *not* errors: they are reported through
/// [`Inconsistency`](crate::Inconsistency) and processing continues.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The activation ledger could not be read or written.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A blocking ledger task panicked or was cancelled.
    #[error("ledger task failed: {0}")]
    LedgerTask(#[from] tokio::task::JoinError),

    /// The capability registry rejected an operation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The registry accepted the descriptor but does not list it afterwards.
    #[error("descriptor for unit {unit} is not listed by the registry after registration")]
    DescriptorVanished {
        /// The unit whose descriptor went missing.
        unit: UnitId,
    },

    /// A descriptor document could not be parsed.
    #[error("descriptor parse error in {path}: {message}")]
    DescriptorParse {
        /// Path to the descriptor document.
        path: PathBuf,
        /// Parse error message.
        message: String,
    },

    /// The unit identity is invalid.
    #[error("invalid unit id: {0}")]
    InvalidUnitId(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for deployer operations.
pub type DeployResult<T> = Result<T, DeployError>;
