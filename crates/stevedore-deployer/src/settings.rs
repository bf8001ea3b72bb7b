//! Runtime settings for the deployer.

use std::path::PathBuf;

use crate::artifact::{ArtifactHandler, DEFAULT_WRAPPER_PROTOCOL};
use crate::ledger::{ActivationLedger, LEDGER_FILE_NAME};
use crate::registry::InstallOptions;
use crate::scanner::{DEFAULT_DESCRIPTOR_DIR, DEFAULT_EXTENSION, DescriptorScanner};

/// Everything needed to assemble a [`DeploymentListener`](crate::DeploymentListener).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployerSettings {
    /// Directory holding the ledger file.
    pub data_dir: PathBuf,
    /// Ledger file name inside `data_dir`.
    pub ledger_file: String,
    /// Descriptor folder searched inside each unit.
    pub descriptor_dir: String,
    /// Descriptor file extension (without the dot).
    pub extension: String,
    /// Protocol used to wrap hot-deployed descriptor artifacts.
    pub wrapper_protocol: String,
    /// Options passed to every install.
    pub install: InstallOptions,
}

impl DeployerSettings {
    /// Settings with defaults, storing the ledger under `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Full path of the ledger file.
    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(&self.ledger_file)
    }

    /// Scanner for the configured descriptor convention.
    #[must_use]
    pub fn scanner(&self) -> DescriptorScanner {
        DescriptorScanner::new(self.descriptor_dir.clone(), self.extension.clone())
    }

    /// Ledger at the configured location.
    #[must_use]
    pub fn ledger(&self) -> ActivationLedger {
        ActivationLedger::new(self.ledger_path())
    }

    /// Artifact handler for the configured extension and protocol.
    #[must_use]
    pub fn artifact_handler(&self) -> ArtifactHandler {
        ArtifactHandler::new(self.extension.clone(), self.wrapper_protocol.clone())
    }
}

impl Default for DeployerSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            ledger_file: LEDGER_FILE_NAME.to_string(),
            descriptor_dir: DEFAULT_DESCRIPTOR_DIR.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            wrapper_protocol: DEFAULT_WRAPPER_PROTOCOL.to_string(),
            install: InstallOptions::default(),
        }
    }
}
