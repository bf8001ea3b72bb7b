//! Environment variable fallbacks.
//!
//! Env vars are **fallback**, not override: they only apply to fields that
//! no config file set. Fields still at their embedded default are fair game.

use std::collections::HashMap;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources};

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
}

/// All supported `STEVEDORE_*` env var mappings.
const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "STEVEDORE_DATA_DIR",
        field_path: "deployer.data_dir",
    },
    EnvMapping {
        var_name: "STEVEDORE_LEDGER_FILE",
        field_path: "deployer.ledger_file",
    },
    EnvMapping {
        var_name: "STEVEDORE_DESCRIPTOR_DIR",
        field_path: "deployer.descriptor_dir",
    },
    EnvMapping {
        var_name: "STEVEDORE_EXTENSION",
        field_path: "deployer.extension",
    },
    EnvMapping {
        var_name: "STEVEDORE_WRAPPER_PROTOCOL",
        field_path: "deployer.wrapper_protocol",
    },
    EnvMapping {
        var_name: "STEVEDORE_INSTALL_VERBOSE",
        field_path: "deployer.install.verbose",
    },
    EnvMapping {
        var_name: "STEVEDORE_LOG_LEVEL",
        field_path: "logging.level",
    },
    EnvMapping {
        var_name: "STEVEDORE_LOG_FORMAT",
        field_path: "logging.format",
    },
    EnvMapping {
        var_name: "STEVEDORE_LOG_FILE",
        field_path: "logging.file",
    },
];

/// `(variable, field path)` pairs for every supported env var.
pub fn env_var_mappings() -> impl Iterator<Item = (&'static str, &'static str)> {
    ENV_MAPPINGS.iter().map(|m| (m.var_name, m.field_path))
}

/// Apply environment variable fallbacks to fields that were **not** set by
/// any config file layer.
///
/// Returns the number of env vars applied.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        if sources
            .get(mapping.field_path)
            .is_some_and(ConfigLayer::is_file)
        {
            continue;
        }

        if let Some(val) = env_vars.get(mapping.var_name) {
            debug!(
                var = mapping.var_name,
                field = mapping.field_path,
                "applying env var fallback"
            );

            set_field_from_string(merged, mapping.field_path, val);
            sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
            count = count.saturating_add(1);
        }
    }

    count
}

/// Set a field in the TOML tree from a string value, creating intermediate
/// tables as needed.
fn set_field_from_string(root: &mut toml::Value, path: &str, val: &str) {
    let toml_val = coerce_to_toml_value(path, val);

    let mut segments = path.split('.').peekable();
    let mut current = root;
    while let Some(segment) = segments.next() {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        if segments.peek().is_none() {
            table.insert(segment.to_owned(), toml_val);
            return;
        }
        current = table
            .entry(segment)
            .or_insert(toml::Value::Table(toml::map::Map::new()));
    }
}

/// Coerce a string env var value to the TOML type of the target field.
fn coerce_to_toml_value(path: &str, val: &str) -> toml::Value {
    if matches!(
        path,
        "deployer.install.verbose" | "deployer.install.print_units_to_refresh"
    ) && let Ok(b) = val.parse::<bool>()
    {
        return toml::Value::Boolean(b);
    }

    toml::Value::String(val.to_owned())
}

/// Collect all current environment variables into a map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_apply_env_fallbacks() {
        let mut merged: toml::Value = toml::from_str("[deployer]\nextension = \"repository\"").unwrap();
        let mut sources = FieldSources::new();
        let env = make_env(&[("STEVEDORE_LOG_LEVEL", "debug")]);

        let count = apply_env_fallbacks(&mut merged, &mut sources, &env);

        assert_eq!(count, 1);
        assert_eq!(merged["logging"]["level"].as_str().unwrap(), "debug");
        assert_eq!(
            sources.get("logging.level"),
            Some(&ConfigLayer::Environment)
        );
    }

    #[test]
    fn test_env_fallback_skips_file_values() {
        let mut merged: toml::Value = toml::from_str("[logging]\nlevel = \"warn\"").unwrap();
        let mut sources = FieldSources::new();
        sources.insert("logging.level".to_owned(), ConfigLayer::User);

        let env = make_env(&[("STEVEDORE_LOG_LEVEL", "debug")]);
        let count = apply_env_fallbacks(&mut merged, &mut sources, &env);

        assert_eq!(count, 0);
        assert_eq!(merged["logging"]["level"].as_str().unwrap(), "warn");
    }

    #[test]
    fn test_env_fallback_replaces_defaults() {
        let mut merged: toml::Value =
            toml::from_str("[deployer]\ndata_dir = \"/var/lib/stevedore\"").unwrap();
        let mut sources = FieldSources::new();
        sources.insert("deployer.data_dir".to_owned(), ConfigLayer::Defaults);

        let env = make_env(&[("STEVEDORE_DATA_DIR", "/srv/deployer")]);
        apply_env_fallbacks(&mut merged, &mut sources, &env);

        assert_eq!(
            merged["deployer"]["data_dir"].as_str().unwrap(),
            "/srv/deployer"
        );
    }

    #[test]
    fn test_nested_field_created() {
        let mut merged: toml::Value = toml::from_str("").unwrap();
        let mut sources = FieldSources::new();
        let env = make_env(&[("STEVEDORE_INSTALL_VERBOSE", "false")]);

        apply_env_fallbacks(&mut merged, &mut sources, &env);

        assert!(!merged["deployer"]["install"]["verbose"].as_bool().unwrap());
    }

    #[test]
    fn test_every_mapping_targets_a_config_field() {
        let defaults = toml::Value::try_from(crate::Config::default()).unwrap();
        for (var, field) in env_var_mappings() {
            assert!(var.starts_with("STEVEDORE_"));
            if field == "logging.file" {
                continue;
            }
            let mut node = &defaults;
            for segment in field.split('.') {
                node = node.get(segment).unwrap_or_else(|| panic!("{var} -> {field}"));
            }
        }
    }

    #[test]
    fn test_coerce_bool() {
        assert!(
            coerce_to_toml_value("deployer.install.verbose", "true")
                .as_bool()
                .unwrap()
        );
    }

    #[test]
    fn test_coerce_unparseable_bool_stays_string() {
        let v = coerce_to_toml_value("deployer.install.verbose", "yes");
        assert_eq!(v.as_str().unwrap(), "yes");
    }
}
