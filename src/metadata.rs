use crate::matcher::Support;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Per-path component metadata, keyed by file or directory prefix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentMetadata {
    pub default_support: Support,
    /// Labels that exist on the target repository
    pub labels: Vec<String>,
    pub files: BTreeMap<String, FileEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEntry {
    pub labels: Vec<String>,
    pub maintainers: Vec<String>,
    pub namespace_maintainers: Vec<String>,
    pub notify: Vec<String>,
    pub ignore: Vec<String>,
    pub support: Option<Support>,
}

impl ComponentMetadata {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read component metadata: {path}"))?;
        let metadata: ComponentMetadata = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse component metadata: {path}"))?;
        log::debug!(
            "Loaded {} component entries and {} labels from {path}",
            metadata.files.len(),
            metadata.labels.len()
        );
        Ok(metadata)
    }
}

/// Repository facts the reducer needs beyond the match records.
pub trait RepoMetadata {
    fn valid_labels(&self, repo: &str) -> BTreeSet<String>;
}

/// Fixed label set, typically read from the component metadata file.
#[derive(Debug, Clone, Default)]
pub struct LabelCatalog {
    labels: BTreeSet<String>,
}

impl LabelCatalog {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_metadata(metadata: &ComponentMetadata) -> Self {
        Self::new(metadata.labels.iter().cloned())
    }
}

impl RepoMetadata for LabelCatalog {
    fn valid_labels(&self, _repo: &str) -> BTreeSet<String> {
        self.labels.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"
default_support: core
labels: [module, networking]
files:
  lib/ansible/modules/:
    labels: [module]
  lib/ansible/modules/net_tools/nmcli.py:
    maintainers: [alice]
    ignore: [bob]
    support: community
"#;

    #[test]
    fn test_parse_metadata() {
        let metadata: ComponentMetadata = serde_yaml::from_str(METADATA).unwrap();
        assert_eq!(metadata.default_support, Support::Core);
        assert_eq!(metadata.files.len(), 2);

        let nmcli = &metadata.files["lib/ansible/modules/net_tools/nmcli.py"];
        assert_eq!(nmcli.maintainers, vec!["alice"]);
        assert_eq!(nmcli.support, Some(Support::Community));
        assert!(nmcli.notify.is_empty());
    }

    #[test]
    fn test_label_catalog() {
        let metadata: ComponentMetadata = serde_yaml::from_str(METADATA).unwrap();
        let catalog = LabelCatalog::from_metadata(&metadata);
        let labels = catalog.valid_labels("ansible/ansible");
        assert!(labels.contains("networking"));
        assert!(!labels.contains("bug"));
    }
}
