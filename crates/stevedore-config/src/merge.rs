//! Deep merge of TOML values with source tracking.
//!
//! The merge operates on raw [`toml::Value`] trees rather than deserialized
//! structs, so a key missing from an overlay never resets the base value.

use std::collections::HashMap;

/// Which configuration layer a value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLayer {
    /// Compiled-in defaults (`defaults.toml`).
    Defaults,
    /// System-wide configuration (`/etc/stevedore/config.toml`).
    System,
    /// User-level configuration (`~/.stevedore/config.toml`).
    User,
    /// A file named on the command line.
    Explicit(String),
    /// Environment variable fallback.
    Environment,
}

impl ConfigLayer {
    /// Whether the value came from a config file.
    #[must_use]
    pub fn is_file(&self) -> bool {
        matches!(self, Self::System | Self::User | Self::Explicit(_))
    }
}

impl std::fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Defaults => write!(f, "defaults"),
            Self::System => write!(f, "system (/etc/stevedore/config.toml)"),
            Self::User => write!(f, "user (~/.stevedore/config.toml)"),
            Self::Explicit(path) => write!(f, "file ({path})"),
            Self::Environment => write!(f, "environment variable"),
        }
    }
}

/// Tracks which layer set each field's value.
pub type FieldSources = HashMap<String, ConfigLayer>;

/// Deep-merge `overlay` into `base`, recording which layer set each leaf
/// field. `prefix` is the dotted path prefix (e.g. `"deployer"`).
///
/// - Tables merge recursively per-field.
/// - Scalars and arrays from the overlay **replace** the base value.
pub fn deep_merge_tracking(
    base: &mut toml::Value,
    overlay: &toml::Value,
    prefix: &str,
    layer: &ConfigLayer,
    sources: &mut FieldSources,
) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let path = join_path(prefix, key);

                if let Some(base_val) = base_table.get_mut(key) {
                    if overlay_val.is_table() {
                        deep_merge_tracking(base_val, overlay_val, &path, layer, sources);
                    } else {
                        *base_val = overlay_val.clone();
                        sources.insert(path, layer.clone());
                    }
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                    record_all_leaves(overlay_val, &path, layer, sources);
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
            sources.insert(prefix.to_owned(), layer.clone());
        },
    }
}

/// Walk a value tree and record all leaf paths with their source layer.
pub fn record_all_leaves(
    val: &toml::Value,
    prefix: &str,
    layer: &ConfigLayer,
    sources: &mut FieldSources,
) {
    if let toml::Value::Table(table) = val {
        for (key, child) in table {
            record_all_leaves(child, &join_path(prefix, key), layer, sources);
        }
    } else {
        sources.insert(prefix.to_owned(), layer.clone());
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    fn merge(base: &mut toml::Value, overlay: &str) -> FieldSources {
        let mut sources = FieldSources::new();
        deep_merge_tracking(base, &parse(overlay), "", &ConfigLayer::User, &mut sources);
        sources
    }

    #[test]
    fn test_merge_overrides_scalars_and_keeps_siblings() {
        let mut base = parse("[deployer]\ndata_dir = \"/a\"\nextension = \"repository\"");
        let sources = merge(&mut base, "[deployer]\ndata_dir = \"/b\"");

        assert_eq!(base["deployer"]["data_dir"].as_str().unwrap(), "/b");
        assert_eq!(base["deployer"]["extension"].as_str().unwrap(), "repository");
        assert!(!sources.contains_key("deployer.extension"));
    }

    #[test]
    fn test_merge_replaces_arrays() {
        let mut base = parse("[logging]\ndirectives = [\"a=debug\", \"b=warn\"]");
        let sources = merge(&mut base, "[logging]\ndirectives = [\"c=info\"]");

        let arr = base["logging"]["directives"].as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0].as_str().unwrap(), "c=info");
        assert_eq!(sources.get("logging.directives"), Some(&ConfigLayer::User));
    }

    #[test]
    fn test_tracking_records_layer_per_leaf() {
        let mut base = parse("[deployer]\ndata_dir = \"/a\"\n[deployer.install]\nverbose = true");
        let mut sources = FieldSources::new();
        record_all_leaves(&base.clone(), "", &ConfigLayer::Defaults, &mut sources);

        let overlay = parse(
            "[deployer]\ndata_dir = \"/b\"\n[deployer.install]\nverbose = false\n[logging]\nlevel = \"debug\"",
        );
        deep_merge_tracking(&mut base, &overlay, "", &ConfigLayer::User, &mut sources);

        assert_eq!(sources.get("deployer.data_dir"), Some(&ConfigLayer::User));
        assert_eq!(
            sources.get("deployer.install.verbose"),
            Some(&ConfigLayer::User)
        );
        assert_eq!(sources.get("logging.level"), Some(&ConfigLayer::User));
        assert!(!base["deployer"]["install"]["verbose"].as_bool().unwrap());
    }

    #[test]
    fn test_layer_display() {
        assert_eq!(ConfigLayer::Defaults.to_string(), "defaults");
        assert_eq!(
            ConfigLayer::Explicit("/tmp/x.toml".into()).to_string(),
            "file (/tmp/x.toml)"
        );
        assert!(ConfigLayer::System.is_file());
        assert!(!ConfigLayer::Environment.is_file());
    }
}
