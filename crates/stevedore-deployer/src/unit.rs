//! Deployable units as seen by the deployer.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use globset::Glob;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DeployError, DeployResult};

/// Stable identity the host assigns to a unit.
///
/// The same string is used, verbatim, as the registration name of the
/// unit's descriptor. Nothing checks that the registry agrees.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UnitId(String);

impl<'de> Deserialize<'de> for UnitId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl UnitId {
    /// Create a unit id.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::InvalidUnitId`] if the id is empty or blank.
    pub fn new(id: impl Into<String>) -> DeployResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DeployError::InvalidUnitId(
                "unit id must not be empty".into(),
            ));
        }
        Ok(Self(id))
    }

    /// Create a unit id from a literal known to be valid.
    #[must_use]
    pub fn from_static(id: &str) -> Self {
        Self(id.to_string())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UnitId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A packaged artifact the host loads and unloads as a whole.
pub trait DeployableUnit: Send + Sync {
    /// The host-assigned identity of this unit.
    fn id(&self) -> &UnitId;

    /// List the unit's entries located directly inside `dir` whose file
    /// name matches the glob `pattern`. Subdirectories are not searched.
    ///
    /// A missing `dir` yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the unit's content cannot be enumerated.
    fn find_entries(&self, dir: &str, pattern: &str) -> io::Result<Vec<Url>>;
}

/// A unit exploded into a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct DirectoryUnit {
    id: UnitId,
    root: PathBuf,
}

impl DirectoryUnit {
    /// Create a unit rooted at `root`.
    pub fn new(id: UnitId, root: impl Into<PathBuf>) -> Self {
        Self {
            id,
            root: root.into(),
        }
    }

    /// The unit's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DeployableUnit for DirectoryUnit {
    fn id(&self) -> &UnitId {
        &self.id
    }

    fn find_entries(&self, dir: &str, pattern: &str) -> io::Result<Vec<Url>> {
        let matcher = Glob::new(pattern)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
            .compile_matcher();

        let folder = self.root.join(dir.trim_start_matches('/'));
        let entries = match std::fs::read_dir(&folder) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut urls = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if !matcher.is_match(entry.file_name()) {
                continue;
            }
            let path = std::path::absolute(entry.path())?;
            let url = Url::from_file_path(&path).map_err(|()| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("cannot express {} as a file URL", path.display()),
                )
            })?;
            urls.push(url);
        }
        urls.sort();
        Ok(urls)
    }
}
