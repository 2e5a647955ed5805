use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Last item processed, so an interrupted run can pick up where it stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeState {
    pub repo: String,
    pub number: u64,
}

pub struct ResumeFile {
    path: PathBuf,
}

impl ResumeFile {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: cache_dir.into().join("resume.json"),
        }
    }

    pub fn load(&self) -> Option<ResumeState> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(state) => Some(state),
            Err(e) => {
                log::warn!("Ignoring corrupt resume file {}: {e}", self.path.display());
                None
            }
        }
    }

    pub fn save(&self, state: &ResumeState) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(state)?)
            .with_context(|| format!("Failed to write resume file: {}", self.path.display()))
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove resume file: {}", self.path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let resume = ResumeFile::new(dir.path().join("nested"));
        assert_eq!(resume.load(), None);

        let state = ResumeState {
            repo: "ansible/ansible".to_string(),
            number: 42,
        };
        resume.save(&state).unwrap();
        assert_eq!(resume.load(), Some(state));

        resume.clear().unwrap();
        assert_eq!(resume.load(), None);
        resume.clear().unwrap();
    }
}
