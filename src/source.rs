use crate::item::TriageItem;
use anyhow::Context;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Where items to triage come from.
pub trait ItemSource {
    /// All items for one run, newest first.
    fn items(&mut self) -> anyhow::Result<Vec<TriageItem>>;

    /// Fetch the current state of an item again, e.g. after an operator
    /// edited its description.
    fn refresh(&mut self, item: &TriageItem) -> anyhow::Result<TriageItem>;
}

/// A directory of JSON item snapshots.
pub struct SnapshotDirectory {
    dir: PathBuf,
    paths: HashMap<(String, u64), PathBuf>,
}

impl SnapshotDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            paths: HashMap::new(),
        }
    }

    fn load(path: &Path) -> anyhow::Result<TriageItem> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot: {}", path.display()))
    }
}

impl ItemSource for SnapshotDirectory {
    fn items(&mut self) -> anyhow::Result<Vec<TriageItem>> {
        let mut json_files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read items directory: {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false) {
                json_files.push(path);
            }
        }
        json_files.sort();

        let mut items = Vec::new();
        self.paths.clear();
        for path in json_files {
            match Self::load(&path) {
                Ok(item) => {
                    self.paths.insert((item.repo.clone(), item.number), path);
                    items.push(item);
                }
                Err(e) => log::warn!("Skipping snapshot: {e:#}"),
            }
        }

        items.sort_by(|a, b| b.number.cmp(&a.number));
        log::info!("Loaded {} items from {}", items.len(), self.dir.display());
        Ok(items)
    }

    fn refresh(&mut self, item: &TriageItem) -> anyhow::Result<TriageItem> {
        match self.paths.get(&(item.repo.clone(), item.number)) {
            Some(path) => Self::load(path),
            None => Ok(item.clone()),
        }
    }
}
