use crate::banner;
use crate::commands;
use crate::config::Config;
use crate::facts::{ComponentFacts, FactReducer, ReductionContext};
use crate::history::{CommandEvent, HistoryService};
use crate::item::TriageItem;
use crate::matcher::{ComponentMatcher, MatchRecord};
use crate::quality::QualityGate;
use std::collections::BTreeSet;

pub const COMMAND_STRATEGY: &str = "component_command";

/// Quality gate, matching, command reconciliation, reduction and the banner
/// check for a single item.
pub struct FactPipeline<'a> {
    config: &'a Config,
    gate: QualityGate,
    reducer: FactReducer,
    matcher: &'a dyn ComponentMatcher,
    history: &'a dyn HistoryService,
}

impl<'a> FactPipeline<'a> {
    pub fn new(
        config: &'a Config,
        matcher: &'a dyn ComponentMatcher,
        history: &'a dyn HistoryService,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            config,
            gate: QualityGate::new(config.quality.clone()),
            reducer: FactReducer::new(&config.patterns)?,
            matcher,
            history,
        })
    }

    pub fn get_component_match_facts(
        &self,
        item: &TriageItem,
        valid_labels: &BTreeSet<String>,
    ) -> ComponentFacts {
        let mut facts = ComponentFacts::default();

        let mut skip_matching = false;
        if item.is_issue() {
            let component = item.declared_component();
            match &component {
                None => {
                    log::debug!("#{}: component is None", item.number);
                    skip_matching = true;
                }
                Some(name) if self.config.is_blacklisted_component(name) => {
                    log::debug!("#{}: {name} is a blacklisted component", item.number);
                    skip_matching = true;
                }
                Some(_) => {}
            }
            facts.component_name = component;
        }

        facts.apply_quality(self.gate.evaluate(
            item.is_pullrequest(),
            item.files.as_deref(),
            item.commits,
        ));
        if facts.is_bad_pr {
            log::info!(
                "#{}: bad pull request, skipping component matching {:?}",
                item.number,
                facts.is_bad_pr_reason
            );
            return facts;
        }

        let mut strategy = Vec::new();
        let mut matches = if skip_matching {
            Vec::new()
        } else {
            strategy = self.matcher.strategies();
            self.matcher.match_item(item)
        };

        if item.is_issue() {
            let events = self.history.component_commands(item);
            if events.is_empty() && skip_matching {
                return facts;
            }
            if !events.is_empty() {
                let reconciled = self.reconcile_component_commands(&events, &matches);
                if reconciled != matches {
                    strategy = vec![COMMAND_STRATEGY.to_string()];
                }
                matches = reconciled;
            }
        }

        let ctx = ReductionContext {
            kind: item.kind(),
            new_modules: &item.new_modules,
            new_files: &item.new_files,
            valid_labels,
        };
        let mut reduced = self.reducer.reduce(matches, &ctx);
        reduced.component_name = facts.component_name;
        reduced.component_match_strategy = strategy;
        reduced.is_bad_pr = facts.is_bad_pr;
        reduced.is_bad_pr_reason = facts.is_bad_pr_reason;
        reduced.is_empty_pr = facts.is_empty_pr;

        if item.is_issue() {
            reduced.needs_component_message =
                self.needs_component_message(item, &reduced.component_filenames);
        }

        log::debug!(
            "#{}: matched {:?} via {:?}",
            item.number,
            reduced.component_filenames,
            reduced.component_match_strategy
        );
        reduced
    }

    /// Apply operator commands to the matched filenames and match the
    /// resulting file set again.
    pub fn reconcile_component_commands(
        &self,
        events: &[CommandEvent],
        matches: &[MatchRecord],
    ) -> Vec<MatchRecord> {
        let current: Vec<String> = matches.iter().map(|m| m.repo_filename.clone()).collect();
        let filenames = commands::reconcile(events, &current, &self.config.command_prefix);
        self.matcher.match_files(&filenames)
    }

    /// Announce when nothing was said yet or the last banner listed other files.
    fn needs_component_message(&self, item: &TriageItem, filenames: &[String]) -> bool {
        if item.comments.is_empty() {
            return true;
        }
        let boilerplate = self.history.boilerplate_comments(item);
        let prior = banner::latest_banner(&boilerplate, &self.config.banner_kind);
        banner::needs_announcement(prior, filenames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::CommentHistory;
    use crate::item::fixtures::{comment, issue, pull};
    use crate::matcher::mock::MockMatcher;
    use crate::matcher::{MetadataMatcher, Support};
    use crate::metadata::ComponentMetadata;

    fn history() -> CommentHistory {
        CommentHistory::new(vec!["ansibot".to_string()], "!component")
    }

    fn labels() -> BTreeSet<String> {
        BTreeSet::new()
    }

    #[test]
    fn test_blacklisted_issue_skips_matcher() {
        let config = Config::default();
        let matcher = MockMatcher::with_matches(vec![MatchRecord::new("lib/x.py", Support::Core)]);
        let history = history();
        let pipeline = FactPipeline::new(&config, &matcher, &history).unwrap();

        let facts = pipeline.get_component_match_facts(&issue(1, "core"), &labels());
        assert!(facts.component_matches.is_empty());
        assert!(!facts.is_core);
        assert!(!facts.is_bad_pr);
        assert!(facts.is_bad_pr_reason.is_empty());
        assert_eq!(facts.component_name, Some("core".to_string()));
        assert_eq!(matcher.calls.get(), 0);
    }

    #[test]
    fn test_blacklisted_issue_still_honours_commands() {
        let config = Config::default();
        let matcher = MockMatcher::default();
        let history = history();
        let pipeline = FactPipeline::new(&config, &matcher, &history).unwrap();

        let mut item = issue(2, "Ansible");
        item.comments = vec![comment("maintainer", 1, "!component +lib/ansible/modules/ping.py")];
        let facts = pipeline.get_component_match_facts(&item, &labels());
        assert_eq!(facts.component_filenames, vec!["lib/ansible/modules/ping.py"]);
        assert_eq!(facts.component_match_strategy, vec![COMMAND_STRATEGY]);
        assert!(facts.is_module);
        assert!(facts.needs_component_message);
    }

    #[test]
    fn test_pull_with_two_modules() {
        let config = Config::default();
        let matcher = MockMatcher::default();
        let history = history();
        let pipeline = FactPipeline::new(&config, &matcher, &history).unwrap();

        let pr = pull(3, &["plugins/modules/foo.py", "plugins/modules/bar.py"], 2);
        let facts = pipeline.get_component_match_facts(&pr, &labels());
        assert!(facts.is_module);
        assert!(facts.is_multi_module);
        let module_files: Vec<&str> = facts
            .module_match
            .as_ref()
            .unwrap()
            .iter()
            .map(|m| m.repo_filename.as_str())
            .collect();
        assert_eq!(module_files, vec!["plugins/modules/bar.py", "plugins/modules/foo.py"]);
        assert!(!facts.needs_component_message);
        assert_eq!(facts.component_match_strategy, vec!["mock"]);
    }

    #[test]
    fn test_bad_pull_short_circuits() {
        let config = Config::default();
        let matcher = MockMatcher::default();
        let history = history();
        let pipeline = FactPipeline::new(&config, &matcher, &history).unwrap();

        let facts = pipeline.get_component_match_facts(&pull(4, &[], 0), &labels());
        assert!(facts.is_bad_pr);
        assert!(facts.is_empty_pr);
        assert!(facts.component_matches.is_empty());
        assert!(!facts.is_core);
        assert_eq!(matcher.calls.get(), 0);
    }

    #[test]
    fn test_pull_ignores_component_commands() {
        let config = Config::default();
        let matcher = MockMatcher::default();
        let history = history();
        let pipeline = FactPipeline::new(&config, &matcher, &history).unwrap();

        let mut pr = pull(8, &["plugins/modules/foo.py"], 1);
        pr.comments = vec![comment("maintainer", 1, "!component =lib/ansible/modules/x.py")];
        let facts = pipeline.get_component_match_facts(&pr, &labels());
        assert_eq!(facts.component_filenames, vec!["plugins/modules/foo.py"]);
        assert_eq!(facts.component_match_strategy, vec!["mock"]);
    }

    #[test]
    fn test_commands_replace_text_matches() {
        let config = Config::default();
        let matcher =
            MockMatcher::with_matches(vec![MatchRecord::new("lib/old.py", Support::Core)]);
        let history = history();
        let pipeline = FactPipeline::new(&config, &matcher, &history).unwrap();

        let mut item = issue(5, "old");
        item.comments = vec![
            comment("maintainer", 1, "!component =lib/new.py\n!component =lib/other.py"),
            comment("maintainer", 2, "!component -lib/other.py"),
        ];
        let facts = pipeline.get_component_match_facts(&item, &labels());
        assert_eq!(facts.component_filenames, vec!["lib/new.py"]);
        assert_eq!(facts.component_match_strategy, vec![COMMAND_STRATEGY]);
    }

    #[test]
    fn test_banner_idempotence() {
        let config = Config::default();
        let matcher = MockMatcher::with_matches(vec![
            MatchRecord::new("lib/b.py", Support::Core),
            MatchRecord::new("lib/a.py", Support::Core),
        ]);
        let history = history();
        let pipeline = FactPipeline::new(&config, &matcher, &history).unwrap();

        let banner = banner::render_components_banner(
            "components_banner",
            "ansible/ansible",
            &["lib/a.py".to_string(), "lib/b.py".to_string()],
            &[],
        );
        let mut item = issue(6, "a b");
        item.comments = vec![comment("ansibot", 1, &banner)];
        let facts = pipeline.get_component_match_facts(&item, &labels());
        assert!(!facts.needs_component_message);
        assert_eq!(facts.component_match_strategy, vec!["mock"]);

        item.comments.push(comment("reporter", 2, "any news?"));
        let facts = pipeline.get_component_match_facts(&item, &labels());
        assert!(!facts.needs_component_message);

        item.comments = vec![comment("reporter", 2, "any news?")];
        let facts = pipeline.get_component_match_facts(&item, &labels());
        assert!(facts.needs_component_message);
    }

    #[test]
    fn test_metadata_matcher_end_to_end() {
        let metadata: ComponentMetadata = serde_yaml::from_str(
            r#"
labels: [module, networking]
files:
  lib/ansible/modules/:
    labels: [module]
  lib/ansible/modules/net_tools/nmcli.py:
    labels: [networking]
    maintainers: [alice, bob]
    ignore: [bob]
    support: community
"#,
        )
        .unwrap();
        let catalog: BTreeSet<String> = metadata.labels.iter().cloned().collect();
        let config = Config::default();
        let matcher = MetadataMatcher::new(metadata);
        let history = history();
        let pipeline = FactPipeline::new(&config, &matcher, &history).unwrap();

        let facts = pipeline.get_component_match_facts(&issue(7, "nmcli"), &catalog);
        assert_eq!(facts.component_filenames, vec!["lib/ansible/modules/net_tools/nmcli.py"]);
        assert_eq!(facts.component_labels, vec!["module", "networking"]);
        assert_eq!(facts.component_maintainers, vec!["alice"]);
        assert!(!facts.is_core);
        assert!(facts.is_module);
        assert!(facts.needs_component_message);
    }
}
