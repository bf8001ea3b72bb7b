//! Configuration struct definitions.
//!
//! Every section derives `Default` with the same values as the embedded
//! `defaults.toml`, and uses `#[serde(default)]` so partial files work.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deployer settings.
    pub deployer: DeployerSection,
    /// Logging settings.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// DeployerSection
// ---------------------------------------------------------------------------

/// Where the ledger lives and how descriptors are found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployerSection {
    /// Directory holding the activation ledger.
    pub data_dir: String,
    /// Ledger file name inside `data_dir`.
    pub ledger_file: String,
    /// Descriptor folder searched inside each unit.
    pub descriptor_dir: String,
    /// Descriptor file extension, without the dot.
    pub extension: String,
    /// Protocol used to wrap hot-deployed descriptor artifacts.
    pub wrapper_protocol: String,
    /// Options passed along with every install.
    pub install: InstallSection,
}

impl Default for DeployerSection {
    fn default() -> Self {
        Self {
            data_dir: "/var/lib/stevedore".to_owned(),
            ledger_file: "deployer.properties".to_owned(),
            descriptor_dir: "/META-INF/stevedore.features/".to_owned(),
            extension: "repository".to_owned(),
            wrapper_protocol: "feature".to_owned(),
            install: InstallSection::default(),
        }
    }
}

/// Install options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallSection {
    /// Log each unit an install touches.
    pub verbose: bool,
    /// Report units that need a refresh after an install.
    pub print_units_to_refresh: bool,
}

impl Default for InstallSection {
    fn default() -> Self {
        Self {
            verbose: true,
            print_units_to_refresh: true,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["stevedore_deployer=debug"]`).
    pub directives: Vec<String>,
    /// Directory for daily-rotated log files. Logs go to stderr when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
            file: None,
        }
    }
}
