//! Test fixtures for common types.

use url::Url;

use stevedore_deployer::{Capability, Descriptor, InstallMode, UnitId};

use crate::mocks::MemoryUnit;

/// Path of a unit's descriptor under the default convention.
#[must_use]
pub fn descriptor_path(unit: &str) -> String {
    format!("META-INF/stevedore.features/{unit}.repository")
}

/// Create a unit id.
///
/// # Panics
///
/// Panics if `id` is blank.
#[must_use]
pub fn test_unit_id(id: &str) -> UnitId {
    UnitId::new(id).expect("valid unit id")
}

/// Create an auto-activate capability at version `1.0.0`.
#[must_use]
pub fn test_capability(name: &str) -> Capability {
    Capability::auto(name, "1.0.0")
}

/// Create a manual capability at version `1.0.0`.
#[must_use]
pub fn test_manual_capability(name: &str) -> Capability {
    Capability::new(name, "1.0.0", InstallMode::Manual)
}

/// Create an in-memory unit carrying one descriptor, and that descriptor.
///
/// The descriptor is named after the unit and declares `capabilities` in
/// order.
#[must_use]
pub fn test_managed_unit(id: &str, capabilities: &[Capability]) -> (MemoryUnit, Descriptor) {
    let path = descriptor_path(id);
    let unit = MemoryUnit::new(test_unit_id(id)).with_entry(path.clone());
    let descriptor = Descriptor {
        name: id.to_string(),
        uri: unit.entry_url(&path),
        capabilities: capabilities.to_vec(),
    };
    (unit, descriptor)
}

/// Render a descriptor document.
///
/// Each entry is `(name, version, auto)`.
#[must_use]
pub fn descriptor_toml(name: &str, features: &[(&str, &str, bool)]) -> String {
    let mut doc = format!("name = \"{name}\"\n");
    for (feature, version, auto) in features {
        let install = if *auto { "auto" } else { "manual" };
        doc.push_str("\n[[feature]]\n");
        doc.push_str(&format!("name = \"{feature}\"\n"));
        doc.push_str(&format!("version = \"{version}\"\n"));
        doc.push_str(&format!("install = \"{install}\"\n"));
    }
    doc
}

/// File URL for `path`.
///
/// # Panics
///
/// Panics if `path` is not absolute.
#[must_use]
pub fn file_url(path: &std::path::Path) -> Url {
    Url::from_file_path(path).expect("absolute path")
}

#[cfg(test)]
mod tests {
    use super::*;
    use stevedore_deployer::DescriptorDocument;

    #[test]
    fn rendered_document_parses() {
        let text = descriptor_toml("web", &[("http", "1.0.0", true), ("admin", "2.0.0", false)]);
        let doc = DescriptorDocument::parse(std::path::Path::new("web.repository"), &text).unwrap();
        assert_eq!(doc.name, "web");
        assert_eq!(doc.features.len(), 2);
        assert!(doc.features[0].is_auto_activate());
        assert!(!doc.features[1].is_auto_activate());
    }

    #[test]
    fn managed_unit_points_at_its_descriptor() {
        let (unit, descriptor) = test_managed_unit("web", &[test_capability("http")]);
        assert_eq!(descriptor.name, "web");
        assert_eq!(descriptor.uri, unit.entry_url(&descriptor_path("web")));
    }
}
