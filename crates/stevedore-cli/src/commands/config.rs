//! CLI handlers for the `stevedore config` subcommand.

use anyhow::Result;
use stevedore_config::env::env_var_mappings;
use stevedore_config::{ResolvedConfig, ShowFormat};

/// Show the resolved configuration with source annotations.
pub(crate) fn show_config(resolved: &ResolvedConfig, format: &str, section: Option<&str>) -> Result<()> {
    let show_format = match format {
        "json" => ShowFormat::Json,
        _ => ShowFormat::Toml,
    };

    let output = resolved
        .show(show_format, section)
        .map_err(|e| anyhow::anyhow!("failed to format config: {e}"))?;

    println!("{output}");
    Ok(())
}

/// Report that the configuration loaded and passed validation.
pub(crate) fn validate_config(resolved: &ResolvedConfig) {
    println!("Configuration is valid.");
    if !resolved.loaded_files.is_empty() {
        println!("\nLoaded files:");
        for path in &resolved.loaded_files {
            println!("  - {path}");
        }
    }
}

/// Show all config file paths that are checked.
pub(crate) fn show_paths() {
    let home = directories::BaseDirs::new().map(|d| d.home_dir().to_string_lossy().to_string());
    let paths = ResolvedConfig::config_paths(home.as_deref());

    println!("Configuration files checked (in precedence order):\n");
    for (i, path) in paths.iter().enumerate() {
        let status = if std::path::Path::new(path).exists() {
            "found"
        } else {
            "not found"
        };
        println!("  {}. {path}  [{status}]", i.saturating_add(1));
    }

    println!("\nEnvironment variable fallbacks:");
    for (var, field) in env_var_mappings() {
        println!("  {var:<28} -> {field}");
    }
}
