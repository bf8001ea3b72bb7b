//! Descriptor discovery inside deployable units.
//!
//! A managed unit embeds exactly one descriptor under a fixed folder with a
//! fixed extension. Zero matches means the unit is not ours; more than one
//! is ambiguous and the unit is rejected rather than guessed at.

use tracing::{debug, warn};
use url::Url;

use crate::unit::DeployableUnit;

/// Default descriptor folder inside a unit.
pub const DEFAULT_DESCRIPTOR_DIR: &str = "/META-INF/stevedore.features/";

/// Default descriptor file extension (without the dot).
pub const DEFAULT_EXTENSION: &str = "repository";

/// Result of scanning a unit for its descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    /// The unit embeds no descriptor.
    None,
    /// The unit embeds exactly one descriptor.
    One(Url),
    /// The unit embeds several descriptors; none is chosen.
    Ambiguous(Vec<Url>),
}

/// Locates the descriptor embedded in a unit.
#[derive(Debug, Clone)]
pub struct DescriptorScanner {
    dir: String,
    extension: String,
}

impl DescriptorScanner {
    /// Create a scanner for the given folder and extension.
    pub fn new(dir: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    /// The folder searched inside each unit.
    #[must_use]
    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// The descriptor extension (without the dot).
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Find the descriptor embedded in `unit`.
    ///
    /// Enumeration failures are logged and treated as "no descriptor".
    pub fn find_descriptor(&self, unit: &dyn DeployableUnit) -> ScanResult {
        let pattern = format!("*.{}", self.extension);
        let mut entries = match unit.find_entries(&self.dir, &pattern) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    unit = %unit.id(),
                    dir = %self.dir,
                    error = %e,
                    "Failed to enumerate unit entries"
                );
                return ScanResult::None;
            },
        };

        match entries.len() {
            0 => ScanResult::None,
            1 => {
                let url = entries.remove(0);
                debug!(unit = %unit.id(), url = %url, "Found descriptor");
                ScanResult::One(url)
            },
            _ => ScanResult::Ambiguous(entries),
        }
    }
}

impl Default for DescriptorScanner {
    fn default() -> Self {
        Self::new(DEFAULT_DESCRIPTOR_DIR, DEFAULT_EXTENSION)
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::unit::{DirectoryUnit, UnitId};
    use tempfile::TempDir;

    fn unit_with(files: &[&str]) -> (TempDir, DirectoryUnit) {
        let dir = TempDir::new().unwrap();
        let meta = dir.path().join("META-INF/stevedore.features");
        std::fs::create_dir_all(&meta).unwrap();
        for f in files {
            std::fs::write(meta.join(f), "name = \"x\"").unwrap();
        }
        let unit = DirectoryUnit::new(UnitId::from_static("u1"), dir.path());
        (dir, unit)
    }

    #[test]
    fn no_descriptor() {
        let (_dir, unit) = unit_with(&["readme.txt"]);
        assert_eq!(
            DescriptorScanner::default().find_descriptor(&unit),
            ScanResult::None
        );
    }

    #[test]
    fn single_descriptor() {
        let (_dir, unit) = unit_with(&["web.repository"]);
        let result = DescriptorScanner::default().find_descriptor(&unit);
        assert!(matches!(result, ScanResult::One(url) if url.path().ends_with("web.repository")));
    }

    #[test]
    fn two_descriptors_are_ambiguous() {
        let (_dir, unit) = unit_with(&["a.repository", "b.repository"]);
        let result = DescriptorScanner::default().find_descriptor(&unit);
        assert!(matches!(result, ScanResult::Ambiguous(urls) if urls.len() == 2));
    }

    #[test]
    fn custom_convention() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("deploy")).unwrap();
        std::fs::write(dir.path().join("deploy/x.features"), "").unwrap();
        let unit = DirectoryUnit::new(UnitId::from_static("u2"), dir.path());

        let scanner = DescriptorScanner::new("deploy", "features");
        assert!(matches!(scanner.find_descriptor(&unit), ScanResult::One(_)));
        assert_eq!(
            DescriptorScanner::default().find_descriptor(&unit),
            ScanResult::None
        );
    }

    struct BrokenUnit(UnitId);

    impl DeployableUnit for BrokenUnit {
        fn id(&self) -> &UnitId {
            &self.0
        }

        fn find_entries(&self, _dir: &str, _pattern: &str) -> io::Result<Vec<Url>> {
            Err(io::Error::other("archive truncated"))
        }
    }

    #[test]
    fn enumeration_failure_is_treated_as_none() {
        let unit = BrokenUnit(UnitId::from_static("broken"));
        assert_eq!(
            DescriptorScanner::default().find_descriptor(&unit),
            ScanResult::None
        );
    }
}
