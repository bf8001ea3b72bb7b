//! Hot-deploy artifact recognition.
//!
//! A bare descriptor dropped into a deploy folder is recognized here and
//! rewritten into a wrapper URL. The host turns that URL into a unit that
//! embeds the descriptor, which the listener then picks up like any other.

use std::path::Path;

use tracing::{debug, error};
use url::Url;

use crate::descriptor::{DescriptorDocument, KNOWN_SCHEMAS};
use crate::scanner::DEFAULT_EXTENSION;

/// Default wrapper protocol.
pub const DEFAULT_WRAPPER_PROTOCOL: &str = "feature";

/// Top-level key every descriptor document carries.
const ROOT_KEY: &str = "feature";

/// Recognizes descriptor artifacts and wraps their URLs.
#[derive(Debug, Clone)]
pub struct ArtifactHandler {
    extension: String,
    protocol: String,
}

impl ArtifactHandler {
    /// Create a handler for the given extension and wrapper protocol.
    pub fn new(extension: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            protocol: protocol.into(),
        }
    }

    /// Whether `path` is a descriptor this deployer manages.
    ///
    /// The file must carry the configured extension, parse as a descriptor
    /// document with a top-level `feature` array, and declare a known
    /// schema (or none).
    #[must_use]
    pub fn can_handle(&self, path: &Path) -> bool {
        if !path.is_file() || path.extension().is_none_or(|ext| ext != self.extension.as_str()) {
            return false;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Unable to read deployed file");
                return false;
            },
        };

        let table: toml::Table = match toml::from_str(&content) {
            Ok(table) => table,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Unable to parse deployed file");
                return false;
            },
        };

        if !table.get(ROOT_KEY).is_some_and(toml::Value::is_array) {
            debug!(path = %path.display(), "Not a descriptor: no top-level feature array");
            return false;
        }

        let document = match DescriptorDocument::parse(path, &content) {
            Ok(document) => document,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Unable to parse deployed file");
                return false;
            },
        };

        if !document.has_known_schema() {
            error!(
                path = %path.display(),
                schema = document.schema.as_deref().unwrap_or_default(),
                known = ?KNOWN_SCHEMAS,
                "Unknown descriptor schema"
            );
            return false;
        }

        true
    }

    /// Wrap an artifact URL into `<protocol>:<artifact>`.
    ///
    /// Returns `None` (and logs) if the result is not a valid URL.
    #[must_use]
    pub fn transform(&self, artifact: &Url) -> Option<Url> {
        match Url::parse(&format!("{}:{artifact}", self.protocol)) {
            Ok(url) => Some(url),
            Err(e) => {
                error!(artifact = %artifact, protocol = %self.protocol, error = %e, "Unable to build wrapper URL");
                None
            },
        }
    }
}

impl Default for ArtifactHandler {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSION, DEFAULT_WRAPPER_PROTOCOL)
    }
}
