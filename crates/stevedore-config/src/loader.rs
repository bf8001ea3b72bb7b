//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `/etc/stevedore/config.toml` (system)
//! 3. Merge `~/.stevedore/config.toml` (user)
//! 4. Merge the file passed with `--config`, if any
//! 5. Apply env var fallbacks for fields no file set
//! 6. Deserialize merged tree → `Config`
//! 7. Validate
//! 8. Return `ResolvedConfig`

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_all_leaves};
use crate::show::ResolvedConfig;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// System-wide config location.
const SYSTEM_CONFIG: &str = "/etc/stevedore/config.toml";

/// Load the unified configuration with layered file precedence.
///
/// `explicit` is a config file named on the command line; unlike the
/// system and user files it must exist.
///
/// `home_override` replaces the user's home directory for user-level
/// config discovery (`{home}/.stevedore/config.toml`).
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, if the
/// explicit file cannot be read, or if the final merged configuration
/// fails validation.
pub fn load(explicit: Option<&Path>, home_override: Option<&Path>) -> ConfigResult<ResolvedConfig> {
    let home_dir = match home_override {
        Some(h) => h.to_path_buf(),
        None => home_directory()?,
    };

    load_layers(
        Path::new(SYSTEM_CONFIG),
        Some(&home_dir.join(".stevedore").join("config.toml")),
        explicit,
        &collect_env_vars(),
    )
}

/// Layered load with every input made explicit.
fn load_layers(
    system_path: &Path,
    user_path: Option<&Path>,
    explicit: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();

    record_all_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    if let Some(overlay) = try_load_file(system_path)? {
        deep_merge_tracking(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::System,
            &mut field_sources,
        );
        loaded_files.push(system_path.display().to_string());
        info!(path = %system_path.display(), "loaded system config");
    }

    if let Some(user_path) = user_path
        && let Some(overlay) = try_load_file(user_path)?
    {
        deep_merge_tracking(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::User,
            &mut field_sources,
        );
        loaded_files.push(user_path.display().to_string());
        info!(path = %user_path.display(), "loaded user config");
    }

    if let Some(path) = explicit {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })?;
        let display_path = path.display().to_string();
        deep_merge_tracking(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::Explicit(display_path.clone()),
            &mut field_sources,
        );
        info!(path = %display_path, "loaded explicit config");
        loaded_files.push(display_path);
    }

    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a config from a specific file path (no layering).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed or validated.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let metadata = std::fs::metadata(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(too_large(path, metadata.len()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    validate::validate(&config)?;
    Ok(config)
}

fn too_large(path: &Path, len: u64) -> ConfigError {
    ConfigError::ValidationError {
        field: path.display().to_string(),
        message: format!(
            "config file is {len} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit"
        ),
    }
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    let len = u64::try_from(content.len()).unwrap_or(u64::MAX);
    if len > MAX_CONFIG_FILE_SIZE {
        return Err(too_large(path, len));
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

/// Determine the user's home directory.
fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults_deserialize_to_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_with_no_files_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let resolved =
            load_layers(&dir.path().join("system.toml"), None, None, &no_env()).unwrap();

        assert_eq!(resolved.config, Config::default());
        assert!(resolved.loaded_files.is_empty());
        assert_eq!(
            resolved.field_sources.get("deployer.extension"),
            Some(&ConfigLayer::Defaults)
        );
    }

    #[test]
    fn test_layers_apply_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let system = write(
            dir.path(),
            "system.toml",
            "[deployer]\ndata_dir = \"/srv/system\"\nextension = \"feat\"",
        );
        let user = write(dir.path(), "user.toml", "[deployer]\ndata_dir = \"/srv/user\"");
        let explicit = write(dir.path(), "explicit.toml", "[logging]\nlevel = \"debug\"");

        let resolved =
            load_layers(&system, Some(&user), Some(&explicit), &no_env()).unwrap();

        assert_eq!(resolved.config.deployer.data_dir, "/srv/user");
        assert_eq!(resolved.config.deployer.extension, "feat");
        assert_eq!(resolved.config.logging.level, "debug");
        assert_eq!(resolved.loaded_files.len(), 3);
        assert_eq!(
            resolved.field_sources.get("deployer.extension"),
            Some(&ConfigLayer::System)
        );
        assert_eq!(
            resolved.field_sources.get("logging.level"),
            Some(&ConfigLayer::Explicit(explicit.display().to_string()))
        );
    }

    #[test]
    fn test_env_fills_fields_no_file_set() {
        let dir = tempfile::tempdir().unwrap();
        let user = write(dir.path(), "user.toml", "[deployer]\ndata_dir = \"/srv/user\"");
        let env: HashMap<String, String> = [
            ("STEVEDORE_DATA_DIR", "/srv/env"),
            ("STEVEDORE_EXTENSION", "features"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();

        let resolved =
            load_layers(&dir.path().join("none.toml"), Some(&user), None, &env).unwrap();

        assert_eq!(resolved.config.deployer.data_dir, "/srv/user");
        assert_eq!(resolved.config.deployer.extension, "features");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_layers(
            &dir.path().join("none.toml"),
            None,
            Some(&dir.path().join("missing.toml")),
            &no_env(),
        );
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let system = write(dir.path(), "system.toml", "[deployer\n");
        let result = load_layers(&system, None, None, &no_env());
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_invalid_merged_config_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let user = write(dir.path(), "user.toml", "[deployer]\nextension = \".repository\"");
        let result = load_layers(&dir.path().join("none.toml"), Some(&user), None, &no_env());
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_load_honors_home_override() {
        let home = tempfile::tempdir().unwrap();
        let dot = home.path().join(".stevedore");
        fs::create_dir_all(&dot).unwrap();
        write(&dot, "config.toml", "[deployer]\nwrapper_protocol = \"wrap\"");

        let resolved = load(None, Some(home.path())).unwrap();
        assert_eq!(resolved.config.deployer.wrapper_protocol, "wrap");
    }

    #[test]
    fn test_load_file_nonexistent() {
        let result = load_file(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_load_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "c.toml", "[logging]\nformat = \"json\"");
        let config = load_file(&path).unwrap();
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.deployer.extension, "repository");
    }

    #[test]
    fn test_try_load_file_missing() {
        let result = try_load_file(Path::new("/nonexistent/config.toml")).unwrap();
        assert!(result.is_none());
    }
}
