//! Component matching
//!
//! Maps an item's declared component text or changed files onto match
//! records. The pipeline only depends on the [`ComponentMatcher`] trait, so
//! strategies can be swapped without touching the reducer.

use crate::item::TriageItem;
use crate::metadata::{ComponentMetadata, FileEntry};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const COLLECTION_PREFIX: &str = "collection:";

lazy_static! {
    static ref FQCN: Regex = Regex::new(r"^([a-z0-9_]+\.[a-z0-9_]+)\.([a-z0-9_]+)$").unwrap();
}

/// Support tier. Variants are declared alphabetically so ordering matches
/// the ordering of their names.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Support {
    Certified,
    Community,
    #[default]
    Core,
    Network,
}

impl Support {
    pub fn as_str(&self) -> &'static str {
        match self {
            Support::Certified => "certified",
            Support::Community => "community",
            Support::Core => "core",
            Support::Network => "network",
        }
    }
}

/// Classification of one repository path against the component taxonomy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub repo_filename: String,
    pub labels: Vec<String>,
    pub maintainers: Vec<String>,
    pub namespace_maintainers: Vec<String>,
    pub notify: Vec<String>,
    pub ignore: Vec<String>,
    pub support: Support,
}

impl MatchRecord {
    pub fn new(repo_filename: impl Into<String>, support: Support) -> Self {
        Self {
            repo_filename: repo_filename.into(),
            labels: Vec::new(),
            maintainers: Vec::new(),
            namespace_maintainers: Vec::new(),
            notify: Vec::new(),
            ignore: Vec::new(),
            support,
        }
    }

    pub fn is_collection_ref(&self) -> bool {
        self.repo_filename.starts_with(COLLECTION_PREFIX)
    }

    /// The `<fqcn>` part of a `collection:<fqcn>[:...]` pseudo-path.
    pub fn collection_fqcn(&self) -> Option<&str> {
        self.repo_filename
            .strip_prefix(COLLECTION_PREFIX)
            .and_then(|rest| rest.split(':').next())
    }
}

pub trait ComponentMatcher {
    /// Match from the item itself: changed files for pull requests, the
    /// declared component text for issues.
    fn match_item(&self, item: &TriageItem) -> Vec<MatchRecord>;

    /// Match an explicit list of repository paths.
    fn match_files(&self, files: &[String]) -> Vec<MatchRecord>;

    fn strategies(&self) -> Vec<String>;
}

/// Matcher backed by a [`ComponentMetadata`] table.
pub struct MetadataMatcher {
    metadata: ComponentMetadata,
}

impl MetadataMatcher {
    pub fn new(metadata: ComponentMetadata) -> Self {
        Self { metadata }
    }

    /// Build the record for a path by folding every metadata entry whose key
    /// prefixes it, shortest key first.
    fn record_for(&self, filename: &str) -> MatchRecord {
        let mut entries: Vec<(&String, &FileEntry)> = self
            .metadata
            .files
            .iter()
            .filter(|(key, _)| filename.starts_with(key.as_str()))
            .collect();
        entries.sort_by_key(|(key, _)| key.len());

        let default_support = if filename.starts_with(COLLECTION_PREFIX) {
            Support::Community
        } else {
            self.metadata.default_support
        };
        let mut record = MatchRecord::new(filename, default_support);

        for (_, entry) in entries {
            extend_unique(&mut record.labels, &entry.labels);
            extend_unique(&mut record.maintainers, &entry.maintainers);
            extend_unique(&mut record.namespace_maintainers, &entry.namespace_maintainers);
            extend_unique(&mut record.notify, &entry.notify);
            extend_unique(&mut record.ignore, &entry.ignore);
            if let Some(support) = entry.support {
                record.support = support;
            }
        }
        record
    }

    /// Resolve one token of free-form component text to a repository path.
    fn resolve_token(&self, token: &str) -> Option<String> {
        if self.metadata.files.contains_key(token) || token.contains('/') {
            return Some(token.to_string());
        }
        if let Some(caps) = FQCN.captures(token) {
            return Some(format!("{COLLECTION_PREFIX}{}:{}", &caps[1], &caps[2]));
        }
        self.metadata
            .files
            .keys()
            .filter(|key| !key.ends_with('/'))
            .find(|key| file_stem(key) == token)
            .cloned()
    }

    pub fn match_text(&self, text: &str) -> Vec<MatchRecord> {
        let mut filenames: Vec<String> = Vec::new();
        for token in text.split(|c: char| c.is_whitespace() || c == ',') {
            let token = token.trim_matches('`').trim();
            if token.is_empty() {
                continue;
            }
            match self.resolve_token(token) {
                Some(filename) => {
                    if !filenames.contains(&filename) {
                        filenames.push(filename);
                    }
                }
                None => log::debug!("No component found for '{token}'"),
            }
        }
        self.match_files(&filenames)
    }
}

impl ComponentMatcher for MetadataMatcher {
    fn match_item(&self, item: &TriageItem) -> Vec<MatchRecord> {
        if item.is_pullrequest() {
            item.files
                .as_deref()
                .map(|files| self.match_files(files))
                .unwrap_or_default()
        } else {
            item.declared_component()
                .map(|text| self.match_text(&text))
                .unwrap_or_default()
        }
    }

    fn match_files(&self, files: &[String]) -> Vec<MatchRecord> {
        let mut seen: Vec<&str> = Vec::new();
        let mut records = Vec::new();
        for file in files {
            let file = file.trim();
            if file.is_empty() || seen.contains(&file) {
                continue;
            }
            seen.push(file);
            records.push(self.record_for(file));
        }
        records
    }

    fn strategies(&self) -> Vec<String> {
        vec!["file_path".to_string(), "component_name".to_string()]
    }
}

fn extend_unique(target: &mut Vec<String>, values: &[String]) {
    for value in values {
        if !target.contains(value) {
            target.push(value.clone());
        }
    }
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.split('.').next().unwrap_or(name)
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::cell::Cell;

    /// Matcher returning fixed text results and bare records for files,
    /// counting how often it is called.
    #[derive(Default)]
    pub struct MockMatcher {
        pub text_matches: Vec<MatchRecord>,
        pub calls: Cell<usize>,
    }

    impl MockMatcher {
        pub fn with_matches(text_matches: Vec<MatchRecord>) -> Self {
            Self {
                text_matches,
                calls: Cell::new(0),
            }
        }
    }

    impl ComponentMatcher for MockMatcher {
        fn match_item(&self, item: &TriageItem) -> Vec<MatchRecord> {
            self.calls.set(self.calls.get() + 1);
            match item.files.as_deref() {
                Some(files) if item.is_pullrequest() => self.match_files(files),
                _ => self.text_matches.clone(),
            }
        }

        fn match_files(&self, files: &[String]) -> Vec<MatchRecord> {
            self.calls.set(self.calls.get() + 1);
            files
                .iter()
                .map(|f| MatchRecord::new(f.clone(), Support::Community))
                .collect()
        }

        fn strategies(&self) -> Vec<String> {
            vec!["mock".to_string()]
        }
    }
}
