//! Source-annotated display for `config show`.
//!
//! Prints the resolved configuration with annotations showing which layer
//! (defaults, system, user, explicit file, environment) set each value.

use std::fmt::{self, Write as _};

use crate::merge::FieldSources;
use crate::types::Config;

/// A resolved configuration together with source annotations.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final merged configuration.
    pub config: Config,
    /// Dotted field path → which layer set the value.
    pub field_sources: FieldSources,
    /// Config file paths that were loaded (in precedence order).
    pub loaded_files: Vec<String>,
}

/// Output format for `config show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowFormat {
    /// TOML with inline comments showing source.
    Toml,
    /// JSON (for programmatic consumption).
    Json,
}

impl ResolvedConfig {
    /// Format the resolved config, optionally limited to one section.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the section is unknown.
    pub fn show(&self, format: ShowFormat, section: Option<&str>) -> Result<String, fmt::Error> {
        match format {
            ShowFormat::Toml => self.show_toml(section),
            ShowFormat::Json => self.show_json(section),
        }
    }

    fn section_value(&self, section: &str) -> Result<toml::Value, fmt::Error> {
        let val = toml::Value::try_from(&self.config).map_err(|_| fmt::Error)?;
        val.as_table()
            .and_then(|table| table.get(section))
            .cloned()
            .ok_or(fmt::Error)
    }

    fn show_toml(&self, section: Option<&str>) -> Result<String, fmt::Error> {
        let toml_str = if let Some(section_name) = section {
            toml::to_string_pretty(&self.section_value(section_name)?).map_err(|_| fmt::Error)?
        } else {
            toml::to_string_pretty(&self.config).map_err(|_| fmt::Error)?
        };

        let mut output = String::new();

        output.push_str("# Resolved stevedore configuration\n");
        output.push_str("# Source annotations: [defaults] [system] [user] [file] [env]\n");

        if !self.loaded_files.is_empty() {
            output.push_str("#\n# Loaded files (in precedence order):\n");
            for (i, path) in self.loaded_files.iter().enumerate() {
                let _ = writeln!(output, "#   {}. {path}", i.saturating_add(1));
            }
        }

        output.push('\n');

        // Section headers change the dotted prefix for the lines below them.
        let mut prefix = section.unwrap_or("").to_owned();
        for line in toml_str.lines() {
            let trimmed = line.trim();
            if let Some(header) = trimmed.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
                prefix = match section {
                    Some(s) => format!("{s}.{header}"),
                    None => header.to_owned(),
                };
            }

            if let Some(annotation) = self.annotate_line(line, &prefix) {
                let _ = writeln!(output, "{line}  # {annotation}");
            } else {
                output.push_str(line);
                output.push('\n');
            }
        }

        Ok(output)
    }

    fn show_json(&self, section: Option<&str>) -> Result<String, fmt::Error> {
        if let Some(section_name) = section {
            serde_json::to_string_pretty(&self.section_value(section_name)?).map_err(|_| fmt::Error)
        } else {
            serde_json::to_string_pretty(&self.config).map_err(|_| fmt::Error)
        }
    }

    /// Try to extract a source annotation for a TOML line.
    fn annotate_line(&self, line: &str, prefix: &str) -> Option<String> {
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('[') {
            return None;
        }

        let key = trimmed.split('=').next()?.trim();
        let field_path = if prefix.is_empty() {
            key.to_owned()
        } else {
            format!("{prefix}.{key}")
        };

        self.field_sources
            .get(&field_path)
            .map(|layer| format!("[{layer}]"))
    }

    /// List all config file paths that are checked during loading.
    #[must_use]
    pub fn config_paths(home_dir: Option<&str>) -> Vec<String> {
        let user = match home_dir {
            Some(home) => format!("{home}/.stevedore/config.toml"),
            None => "~/.stevedore/config.toml".to_owned(),
        };
        vec!["/etc/stevedore/config.toml".to_owned(), user]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::ConfigLayer;

    fn resolved() -> ResolvedConfig {
        let mut field_sources = FieldSources::new();
        field_sources.insert("deployer.data_dir".to_owned(), ConfigLayer::User);
        field_sources.insert("deployer.install.verbose".to_owned(), ConfigLayer::Environment);
        ResolvedConfig {
            config: Config::default(),
            field_sources,
            loaded_files: vec!["/home/u/.stevedore/config.toml".to_owned()],
        }
    }

    #[test]
    fn test_show_toml_annotates_sources() {
        let output = resolved().show(ShowFormat::Toml, None).unwrap();
        assert!(output.contains("Resolved stevedore configuration"));
        assert!(output.contains("1. /home/u/.stevedore/config.toml"));
        assert!(output.contains("data_dir = \"/var/lib/stevedore\"  # [user"));
        assert!(output.contains("verbose = true  # [environment variable]"));
    }

    #[test]
    fn test_show_json_default() {
        let output = resolved().show(ShowFormat::Json, None).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["deployer"]["extension"], "repository");
    }

    #[test]
    fn test_show_section() {
        let output = resolved().show(ShowFormat::Toml, Some("logging")).unwrap();
        assert!(output.contains("compact"));
        assert!(!output.contains("data_dir"));
    }

    #[test]
    fn test_show_unknown_section_fails() {
        assert!(resolved().show(ShowFormat::Json, Some("nope")).is_err());
    }

    #[test]
    fn test_config_paths() {
        let paths = ResolvedConfig::config_paths(Some("/home/user"));
        assert_eq!(paths.len(), 2);
        assert!(paths[0].contains("/etc/stevedore"));
        assert!(paths[1].contains("/home/user/.stevedore"));
    }
}
