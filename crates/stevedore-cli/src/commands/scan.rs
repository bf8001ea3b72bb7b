//! CLI handler for `stevedore scan`.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use stevedore_deployer::{
    DeployableUnit, DeployerSettings, DescriptorDocument, DirectoryUnit, ScanResult, UnitId,
};
use tracing::debug;

/// Show which descriptor, if any, the deployer would pick up from an
/// exploded unit directory.
pub(crate) fn scan_unit(settings: &DeployerSettings, root: &Path, id: Option<&str>) -> Result<()> {
    let unit = directory_unit(root, id)?;
    print!("{}", describe_unit(settings, &unit)?);
    Ok(())
}

fn directory_unit(root: &Path, id: Option<&str>) -> Result<DirectoryUnit> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }

    let id = match id {
        Some(id) => id.to_owned(),
        None => root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("cannot derive a unit id from {}", root.display()))?,
    };

    Ok(DirectoryUnit::new(UnitId::new(id)?, root))
}

fn describe_unit(settings: &DeployerSettings, unit: &DirectoryUnit) -> Result<String> {
    let scanner = settings.scanner();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Unit {} ({}), searching {}*.{}",
        unit.id(),
        unit.root().display(),
        scanner.dir(),
        scanner.extension()
    );

    let url = match scanner.find_descriptor(unit) {
        ScanResult::None => {
            out.push_str("No descriptor found; the deployer ignores this unit.\n");
            return Ok(out);
        },
        ScanResult::Ambiguous(urls) => {
            let listed: Vec<String> = urls.iter().map(ToString::to_string).collect();
            bail!(
                "unit {} embeds {} descriptors and will be rejected: {}",
                unit.id(),
                urls.len(),
                listed.join(", ")
            );
        },
        ScanResult::One(url) => url,
    };

    let path = url
        .to_file_path()
        .map_err(|()| anyhow!("descriptor {url} is not a local file"))?;
    let document = DescriptorDocument::load(&path)
        .with_context(|| format!("failed to load descriptor {}", path.display()))?;
    debug!(
        unit = %unit.id(),
        uri = %url,
        capabilities = document.features.len(),
        "Loaded descriptor"
    );

    let _ = writeln!(out, "Descriptor: {url}");
    let _ = writeln!(out, "Name: {}", document.name);
    if let Some(schema) = &document.schema {
        let _ = writeln!(out, "Schema: {schema}");
    }
    if !document.has_known_schema() {
        out.push_str("warning: unknown schema\n");
    }
    if document.name != unit.id().as_str() {
        let _ = writeln!(
            out,
            "warning: descriptor name '{}' differs from unit id '{}'; it will not be matched on stop",
            document.name,
            unit.id()
        );
    }

    out.push_str("Capabilities:\n");
    for capability in &document.features {
        let mode = if capability.is_auto_activate() {
            "auto"
        } else {
            "manual"
        };
        let _ = writeln!(out, "  {capability}  [{mode}]");
    }

    Ok(out)
}
