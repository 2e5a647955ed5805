use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Repository the bot triages, as `owner/name`
    pub repo: String,
    /// Directory holding one JSON snapshot per issue or pull request
    pub items_dir: String,
    /// Component metadata (maintainers, labels, support tiers)
    pub metadata_path: String,
    pub cache_dir: String,
    /// Logins whose comments are bot output rather than operator input
    pub bot_names: Vec<String>,
    pub command_prefix: String,
    pub banner_kind: String,
    /// Component names that must never resolve to a match
    pub blacklist_components: Vec<String>,
    pub quality: QualityConfig,
    pub patterns: PatternConfig,
    pub actions: ActionsConfig,
    pub daemonize_interval_seconds: u64,
    pub members: Option<MembersConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub max_changed_files: usize,
    pub max_commits: usize,
    /// Historical monolithic module directories that must never receive changes
    pub legacy_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Directories plugin types live under, e.g. `lib/ansible` and `plugins`
    pub roots: Vec<String>,
    pub plugin_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    pub dry_run: bool,
    pub force: bool,
    pub safe_force: bool,
    pub always_pause: bool,
    pub dump_actions: bool,
    pub dump_dir: String,
    pub assign_maintainers: bool,
    /// JSON-lines file executed plans are appended to for the submitter
    pub outbox_path: Option<String>,
    pub resume: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembersConfig {
    pub organization: String,
    pub directory_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            repo: "ansible/ansible".to_string(),
            items_dir: "/var/lib/component-triage/items".to_string(),
            metadata_path: "/etc/component-triage/components.yaml".to_string(),
            cache_dir: "~/.cache/component-triage".to_string(),
            bot_names: vec!["ansibot".to_string()],
            command_prefix: "!component".to_string(),
            banner_kind: "components_banner".to_string(),
            blacklist_components: vec!["core".to_string(), "ansible".to_string()],
            quality: QualityConfig::default(),
            patterns: PatternConfig::default(),
            actions: ActionsConfig::default(),
            daemonize_interval_seconds: 3600,
            members: None,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        QualityConfig {
            max_changed_files: 50,
            max_commits: 50,
            legacy_prefixes: vec![
                "lib/ansible/modules/core".to_string(),
                "lib/ansible/modules/extras".to_string(),
            ],
        }
    }
}

impl Default for PatternConfig {
    fn default() -> Self {
        let plugin_types = [
            "action",
            "become",
            "cache",
            "callback",
            "cliconf",
            "connection",
            "doc_fragments",
            "filter",
            "httpapi",
            "inventory",
            "lookup",
            "modules",
            "module_utils",
            "netconf",
            "shell",
            "strategy",
            "terminal",
            "test",
            "vars",
        ];
        PatternConfig {
            roots: vec!["lib/ansible".to_string(), "plugins".to_string()],
            plugin_types: plugin_types.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl Default for ActionsConfig {
    fn default() -> Self {
        ActionsConfig {
            dry_run: false,
            force: false,
            safe_force: false,
            always_pause: false,
            dump_actions: false,
            dump_dir: "/tmp/actions".to_string(),
            assign_maintainers: false,
            outbox_path: None,
            resume: false,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML config: {path}"))?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {path}"))?;
        Ok(())
    }

    pub fn load_or_default(path: &str) -> anyhow::Result<Self> {
        if Path::new(path).exists() {
            let config = Self::from_file(path)?;
            log::info!("Loaded configuration from: {path}");
            Ok(config)
        } else {
            log::warn!("Configuration file '{path}' not found, using default configuration");
            Ok(Config::default())
        }
    }

    /// Cache directory with a leading `~` expanded from `$HOME`
    pub fn cache_dir(&self) -> std::path::PathBuf {
        expand_home(&self.cache_dir)
    }

    pub fn is_blacklisted_component(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.blacklist_components
            .iter()
            .any(|b| b.to_lowercase() == name)
    }
}

fn expand_home(path: &str) -> std::path::PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return Path::new(&home).join(rest);
        }
    }
    std::path::PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = Config::default();
        assert_eq!(config.quality.max_changed_files, 50);
        assert_eq!(config.quality.max_commits, 50);
        assert_eq!(config.command_prefix, "!component");
        assert!(config.patterns.plugin_types.contains(&"module_utils".to_string()));
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triage.yaml");
        let path = path.to_str().unwrap();

        let mut config = Config::default();
        config.repo = "example/widgets".to_string();
        config.actions.safe_force = true;
        config.to_file(path).unwrap();

        let loaded = Config::from_file(path).unwrap();
        assert_eq!(loaded.repo, "example/widgets");
        assert!(loaded.actions.safe_force);
        assert_eq!(loaded.blacklist_components, config.blacklist_components);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("repo: foo/bar\nquality:\n  max_commits: 10\n")
            .unwrap();
        assert_eq!(config.repo, "foo/bar");
        assert_eq!(config.quality.max_commits, 10);
        assert_eq!(config.quality.max_changed_files, 50);
        assert_eq!(config.banner_kind, "components_banner");
    }

    #[test]
    fn test_blacklist_is_case_insensitive() {
        let config = Config::default();
        assert!(config.is_blacklisted_component("Core"));
        assert!(config.is_blacklisted_component(" ANSIBLE "));
        assert!(!config.is_blacklisted_component("ping"));
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let config = Config::load_or_default("/nonexistent/component-triage.yaml").unwrap();
        assert_eq!(config.repo, Config::default().repo);
    }
}
