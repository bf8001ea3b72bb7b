//! Bridge from `stevedore_config::Config` to deployer and telemetry types.

use std::path::PathBuf;

use stevedore_config::Config;
use stevedore_deployer::{DeployerSettings, InstallOptions};
use stevedore_telemetry::{LogConfig, TelemetryResult};

/// Convert config to [`DeployerSettings`].
#[must_use]
pub fn to_deployer_settings(cfg: &Config) -> DeployerSettings {
    let d = &cfg.deployer;
    DeployerSettings {
        data_dir: PathBuf::from(&d.data_dir),
        ledger_file: d.ledger_file.clone(),
        descriptor_dir: d.descriptor_dir.clone(),
        extension: d.extension.clone(),
        wrapper_protocol: d.wrapper_protocol.clone(),
        install: InstallOptions {
            verbose: d.install.verbose,
            print_units_to_refresh: d.install.print_units_to_refresh,
        },
    }
}

/// Convert config to [`LogConfig`].
///
/// # Errors
///
/// Returns an error if the configured log format is unknown.
pub fn to_log_config(cfg: &Config) -> TelemetryResult<LogConfig> {
    LogConfig::try_from(&cfg.logging)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stevedore_telemetry::LogFormat;

    #[test]
    fn default_config_matches_default_settings() {
        let settings = to_deployer_settings(&Config::default());
        let expected = DeployerSettings::new("/var/lib/stevedore");
        assert_eq!(settings, expected);
    }

    #[test]
    fn deployer_section_is_carried_over() {
        let mut cfg = Config::default();
        cfg.deployer.data_dir = "/srv/stevedore".to_owned();
        cfg.deployer.extension = "features".to_owned();
        cfg.deployer.install.verbose = false;

        let settings = to_deployer_settings(&cfg);
        assert_eq!(
            settings.ledger_path(),
            PathBuf::from("/srv/stevedore/deployer.properties")
        );
        assert_eq!(settings.scanner().extension(), "features");
        assert!(!settings.install.verbose);
        assert!(settings.install.print_units_to_refresh);
    }

    #[test]
    fn logging_section_is_carried_over() {
        let mut cfg = Config::default();
        cfg.logging.format = "json".to_owned();
        cfg.logging.directives = vec!["stevedore_deployer=debug".to_owned()];

        let log = to_log_config(&cfg).unwrap();
        assert_eq!(log.level, "info");
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.directives, vec!["stevedore_deployer=debug"]);
    }
}
