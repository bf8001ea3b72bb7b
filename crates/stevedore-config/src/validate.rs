//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Log formats understood by the telemetry crate.
pub const LOG_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];

/// Log levels accepted in `logging.level`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_deployer(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_deployer(config: &Config) -> ConfigResult<()> {
    let d = &config.deployer;

    for (field, value) in [
        ("deployer.data_dir", &d.data_dir),
        ("deployer.ledger_file", &d.ledger_file),
        ("deployer.descriptor_dir", &d.descriptor_dir),
        ("deployer.extension", &d.extension),
        ("deployer.wrapper_protocol", &d.wrapper_protocol),
    ] {
        if value.trim().is_empty() {
            return Err(invalid(field, "must not be empty"));
        }
    }

    if d.ledger_file.contains(['/', '\\']) {
        return Err(invalid(
            "deployer.ledger_file",
            format!("'{}' must be a file name, not a path", d.ledger_file),
        ));
    }

    if d.extension.contains(['.', '/', '\\']) {
        return Err(invalid(
            "deployer.extension",
            format!(
                "'{}' must be a bare extension without '.' or path separators",
                d.extension
            ),
        ));
    }

    if !d
        .wrapper_protocol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        || !d
            .wrapper_protocol
            .starts_with(|c: char| c.is_ascii_alphabetic())
    {
        return Err(invalid(
            "deployer.wrapper_protocol",
            format!("'{}' is not a valid URL scheme", d.wrapper_protocol),
        ));
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;

    if !LOG_LEVELS.contains(&l.level.to_lowercase().as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported level '{}'; expected one of: {}",
                l.level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    if !LOG_FORMATS.contains(&l.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported format '{}'; expected one of: {}",
                l.format,
                LOG_FORMATS.join(", ")
            ),
        ));
    }

    if l.file.as_deref().is_some_and(|f| f.trim().is_empty()) {
        return Err(invalid("logging.file", "must not be empty when set"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(result: ConfigResult<()>) -> String {
        match result {
            Err(ConfigError::ValidationError { field, .. }) => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_empty_data_dir_rejected() {
        let mut config = Config::default();
        config.deployer.data_dir = "  ".to_owned();
        assert_eq!(field_of(validate(&config)), "deployer.data_dir");
    }

    #[test]
    fn test_dotted_extension_rejected() {
        let mut config = Config::default();
        config.deployer.extension = ".repository".to_owned();
        assert_eq!(field_of(validate(&config)), "deployer.extension");

        config.deployer.extension = "a/b".to_owned();
        assert_eq!(field_of(validate(&config)), "deployer.extension");
    }

    #[test]
    fn test_ledger_file_must_be_a_name() {
        let mut config = Config::default();
        config.deployer.ledger_file = "state/deployer.properties".to_owned();
        assert_eq!(field_of(validate(&config)), "deployer.ledger_file");
    }

    #[test]
    fn test_bad_protocol_rejected() {
        let mut config = Config::default();
        config.deployer.wrapper_protocol = "1feature".to_owned();
        assert_eq!(field_of(validate(&config)), "deployer.wrapper_protocol");

        config.deployer.wrapper_protocol = "fea ture".to_owned();
        assert_eq!(field_of(validate(&config)), "deployer.wrapper_protocol");
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut config = Config::default();
        config.logging.format = "xml".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.format");
    }

    #[test]
    fn test_log_level_case_insensitive() {
        let mut config = Config::default();
        config.logging.level = "DEBUG".to_owned();
        assert!(validate(&config).is_ok());

        config.logging.level = "loud".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.level");
    }
}
