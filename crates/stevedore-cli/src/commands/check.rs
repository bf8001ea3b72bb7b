//! CLI handler for `stevedore check`.

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use stevedore_deployer::DeployerSettings;
use tracing::debug;
use url::Url;

/// Decide whether a file dropped for hot deploy is a descriptor artifact
/// and print the wrapper URL the host would load it through.
pub(crate) fn check_artifact(settings: &DeployerSettings, path: &Path) -> Result<()> {
    println!("{}", wrapper_url(settings, path)?);
    Ok(())
}

fn wrapper_url(settings: &DeployerSettings, path: &Path) -> Result<Url> {
    let handler = settings.artifact_handler();
    if !handler.can_handle(path) {
        bail!("{} is not a deployable descriptor artifact", path.display());
    }

    let absolute = std::path::absolute(path)
        .with_context(|| format!("failed to resolve {}", path.display()))?;
    let artifact = Url::from_file_path(&absolute)
        .map_err(|()| anyhow!("cannot express {} as a file URL", absolute.display()))?;

    let wrapped = handler
        .transform(&artifact)
        .ok_or_else(|| anyhow!("cannot wrap {artifact} in the configured protocol"))?;
    debug!(artifact = %artifact, wrapped = %wrapped, "Wrapped descriptor artifact");
    Ok(wrapped)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn descriptor_is_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("web.repository");
        fs::write(
            &path,
            "name = \"web\"\n[[feature]]\nname = \"http\"\nversion = \"1.0.0\"\n",
        )
        .unwrap();

        let url = wrapper_url(&DeployerSettings::default(), &path).unwrap();
        assert_eq!(url.scheme(), "feature");
        assert!(url.as_str().ends_with("web.repository"));
    }

    #[test]
    fn other_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.repository");
        fs::write(&path, "title = \"not a descriptor\"\n").unwrap();

        assert!(wrapper_url(&DeployerSettings::default(), &path).is_err());
    }
}
