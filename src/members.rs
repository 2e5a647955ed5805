use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Source of organisation membership.
pub trait MemberDirectory {
    /// When the organisation's membership last changed.
    fn updated_at(&self, organization: &str) -> anyhow::Result<DateTime<Utc>>;
    fn members(&self, organization: &str) -> anyhow::Result<Vec<String>>;
}

/// Membership read from a YAML file: `{ updated_at, members: [...] }`.
pub struct FileMemberDirectory {
    path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MemberListing {
    updated_at: DateTime<Utc>,
    members: Vec<String>,
}

impl FileMemberDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> anyhow::Result<MemberListing> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read member list: {}", self.path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse member list: {}", self.path.display()))
    }
}

impl MemberDirectory for FileMemberDirectory {
    fn updated_at(&self, _organization: &str) -> anyhow::Result<DateTime<Utc>> {
        Ok(self.read()?.updated_at)
    }

    fn members(&self, _organization: &str) -> anyhow::Result<Vec<String>> {
        Ok(self.read()?.members)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedMembers {
    fetched_at: DateTime<Utc>,
    members: Vec<String>,
}

/// On-disk member cache, invalidated when the directory reports a change
/// newer than the cached fetch.
pub struct MembersCache {
    cache_dir: PathBuf,
}

impl MembersCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    fn cache_file(&self, organization: &str) -> PathBuf {
        self.cache_dir.join(format!("members-{organization}.json"))
    }

    fn load(path: &Path) -> Option<CachedMembers> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(cached) => Some(cached),
            Err(e) => {
                log::warn!("Discarding unreadable member cache {}: {e}", path.display());
                None
            }
        }
    }

    pub fn members(
        &self,
        organization: &str,
        directory: &dyn MemberDirectory,
        now: DateTime<Utc>,
    ) -> anyhow::Result<BTreeSet<String>> {
        let path = self.cache_file(organization);
        let cached = Self::load(&path);

        let stale = match (&cached, directory.updated_at(organization)) {
            (None, _) => true,
            (Some(cached), Ok(updated_at)) => cached.fetched_at < updated_at,
            (Some(_), Err(e)) => {
                log::warn!("Could not check {organization} membership, using cache: {e}");
                false
            }
        };

        if let (Some(cached), false) = (&cached, stale) {
            log::debug!("Using cached members for {organization}");
            return Ok(cached.members.iter().cloned().collect());
        }

        log::info!("Refreshing members of {organization}");
        let members = directory.members(organization)?;
        let entry = CachedMembers {
            fetched_at: now,
            members,
        };
        std::fs::create_dir_all(&self.cache_dir).with_context(|| {
            format!("Failed to create cache directory: {}", self.cache_dir.display())
        })?;
        std::fs::write(&path, serde_json::to_string_pretty(&entry)?)
            .with_context(|| format!("Failed to write member cache: {}", path.display()))?;
        Ok(entry.members.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::fixtures::at;
    use std::cell::Cell;

    struct CountingDirectory {
        updated_at: DateTime<Utc>,
        members: Vec<String>,
        fetches: Cell<usize>,
    }

    impl MemberDirectory for CountingDirectory {
        fn updated_at(&self, _organization: &str) -> anyhow::Result<DateTime<Utc>> {
            Ok(self.updated_at)
        }

        fn members(&self, _organization: &str) -> anyhow::Result<Vec<String>> {
            self.fetches.set(self.fetches.get() + 1);
            Ok(self.members.clone())
        }
    }

    #[test]
    fn test_cache_refreshes_only_when_directory_changes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MembersCache::new(dir.path());
        let mut directory = CountingDirectory {
            updated_at: at(0),
            members: vec!["alice".to_string()],
            fetches: Cell::new(0),
        };

        let members = cache.members("ansible", &directory, at(10)).unwrap();
        assert!(members.contains("alice"));
        assert_eq!(directory.fetches.get(), 1);

        cache.members("ansible", &directory, at(11)).unwrap();
        assert_eq!(directory.fetches.get(), 1);

        directory.updated_at = at(20);
        directory.members.push("bob".to_string());
        let members = cache.members("ansible", &directory, at(21)).unwrap();
        assert!(members.contains("bob"));
        assert_eq!(directory.fetches.get(), 2);
    }

    #[test]
    fn test_file_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("members.yaml");
        let listing = "updated_at: 2024-03-01T12:00:00Z\nmembers: [alice, carol]\n";
        std::fs::write(&path, listing).unwrap();

        let directory = FileMemberDirectory::new(&path);
        assert_eq!(directory.members("any").unwrap(), vec!["alice", "carol"]);
        assert_eq!(directory.updated_at("any").unwrap(), at(0));
    }
}
