use crate::config::QualityConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityFacts {
    pub is_bad_pr: bool,
    pub is_bad_pr_reason: Vec<String>,
    pub is_empty_pr: bool,
}

/// Arbitrary size limits that keep broken pull requests from causing
/// notification and label storms.
pub struct QualityGate {
    config: QualityConfig,
}

impl QualityGate {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    /// `None` for files or commits means the collaborator could not fetch
    /// them; the checks depending on that input are skipped.
    pub fn evaluate(
        &self,
        is_pull_request: bool,
        changed_files: Option<&[String]>,
        commit_count: Option<usize>,
    ) -> QualityFacts {
        let mut facts = QualityFacts::default();
        if !is_pull_request {
            return facts;
        }

        match changed_files {
            Some(files) => {
                if files.iter().any(|f| self.is_legacy_path(f)) {
                    log::debug!("Pull request touches a legacy module directory");
                    facts.is_bad_pr = true;
                }
                if files.is_empty() {
                    facts.is_bad_pr = true;
                    facts.is_empty_pr = true;
                }
                if files.len() > self.config.max_changed_files {
                    facts.is_bad_pr = true;
                    facts.is_bad_pr_reason.push(format!(
                        "More than {} changed files.",
                        self.config.max_changed_files
                    ));
                }
            }
            None => log::debug!("Changed files unavailable, skipping file checks"),
        }

        match commit_count {
            Some(count) if count > self.config.max_commits => {
                facts.is_bad_pr = true;
                facts
                    .is_bad_pr_reason
                    .push(format!("More than {} commits.", self.config.max_commits));
            }
            Some(_) => {}
            None => log::debug!("Commit count unavailable, skipping commit check"),
        }

        facts
    }

    fn is_legacy_path(&self, path: &str) -> bool {
        self.config
            .legacy_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new(QualityConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("lib/ansible/modules/m{i}.py")).collect()
    }

    #[test]
    fn test_issues_are_never_gated() {
        let gate = QualityGate::default();
        let facts = gate.evaluate(false, Some(&[]), Some(500));
        assert_eq!(facts, QualityFacts::default());
    }

    #[test]
    fn test_fifty_one_files() {
        let gate = QualityGate::default();
        let facts = gate.evaluate(true, Some(&files(51)), Some(0));
        assert!(facts.is_bad_pr);
        assert!(!facts.is_empty_pr);
        assert_eq!(facts.is_bad_pr_reason, vec!["More than 50 changed files."]);
    }

    #[test]
    fn test_fifty_files_is_fine() {
        let gate = QualityGate::default();
        let facts = gate.evaluate(true, Some(&files(50)), Some(50));
        assert!(!facts.is_bad_pr);
        assert!(facts.is_bad_pr_reason.is_empty());
    }

    #[test]
    fn test_empty_pr() {
        let gate = QualityGate::default();
        let facts = gate.evaluate(true, Some(&[]), Some(1));
        assert!(facts.is_bad_pr);
        assert!(facts.is_empty_pr);
        assert!(facts.is_bad_pr_reason.is_empty());
    }

    #[test]
    fn test_both_reasons_are_reported() {
        let gate = QualityGate::default();
        let facts = gate.evaluate(true, Some(&files(60)), Some(75));
        assert_eq!(
            facts.is_bad_pr_reason,
            vec!["More than 50 changed files.", "More than 50 commits."]
        );
    }

    #[test]
    fn test_legacy_prefix() {
        let gate = QualityGate::default();
        let changed = vec!["lib/ansible/modules/extras/cloud/foo.py".to_string()];
        let facts = gate.evaluate(true, Some(&changed), Some(1));
        assert!(facts.is_bad_pr);
        assert!(facts.is_bad_pr_reason.is_empty());
    }

    #[test]
    fn test_missing_inputs_skip_checks() {
        let gate = QualityGate::default();
        let facts = gate.evaluate(true, None, None);
        assert!(!facts.is_bad_pr);

        let facts = gate.evaluate(true, None, Some(51));
        assert_eq!(facts.is_bad_pr_reason, vec!["More than 50 commits."]);
    }
}
