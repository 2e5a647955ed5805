use crate::config::PatternConfig;
use crate::item::ItemKind;
use crate::matcher::{MatchRecord, Support};
use crate::quality::QualityFacts;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Aggregate facts derived from the reconciled match set of one item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentFacts {
    pub is_collection: bool,
    pub is_module: bool,
    pub is_action_plugin: bool,
    pub is_new_module: bool,
    pub is_module_util: bool,
    pub is_plugin: bool,
    pub is_new_plugin: bool,
    pub is_core: bool,
    pub is_multi_module: bool,
    pub module_match: Option<Vec<MatchRecord>>,
    pub component_name: Option<String>,
    pub component_match_strategy: Vec<String>,
    pub component_matches: Vec<MatchRecord>,
    pub component_filenames: Vec<String>,
    pub component_labels: Vec<String>,
    pub component_maintainers: Vec<String>,
    pub component_namespace_maintainers: Vec<String>,
    pub component_notifiers: Vec<String>,
    pub component_support: Vec<Support>,
    pub component_collection: Option<Vec<String>>,
    pub needs_component_message: bool,
    pub is_bad_pr: bool,
    pub is_bad_pr_reason: Vec<String>,
    pub is_empty_pr: bool,
}

impl ComponentFacts {
    pub fn apply_quality(&mut self, quality: QualityFacts) {
        self.is_bad_pr = quality.is_bad_pr;
        self.is_bad_pr_reason = quality.is_bad_pr_reason;
        self.is_empty_pr = quality.is_empty_pr;
    }
}

/// Inputs to a reduction beyond the match records themselves.
pub struct ReductionContext<'a> {
    pub kind: ItemKind,
    pub new_modules: &'a [String],
    pub new_files: &'a [String],
    pub valid_labels: &'a BTreeSet<String>,
}

const MODULE: &str = "module";
const PLUGIN: &str = "plugin";
const ACTION_PLUGIN: &str = "action_plugin";
const MODULE_UTIL: &str = "module_util";

pub struct FactReducer {
    compiled_patterns: HashMap<&'static str, Regex>,
}

impl FactReducer {
    pub fn new(config: &PatternConfig) -> anyhow::Result<Self> {
        let mut reducer = FactReducer {
            compiled_patterns: HashMap::new(),
        };
        reducer.compile_patterns(config)?;
        Ok(reducer)
    }

    fn compile_patterns(&mut self, config: &PatternConfig) -> anyhow::Result<()> {
        let roots = alternation(&config.roots);
        let plugin_types = alternation(&config.plugin_types);

        let sources = [
            (MODULE, format!("^(?:{roots})/modules")),
            (PLUGIN, format!("^(?:{roots})/(?:{plugin_types})")),
            (ACTION_PLUGIN, format!("^(?:{roots})/action")),
            (MODULE_UTIL, format!("^(?:{roots})/module_utils")),
        ];
        for (name, source) in sources {
            let regex = Regex::new(&source)
                .map_err(|e| anyhow::anyhow!("Invalid {name} pattern '{source}': {e}"))?;
            log::debug!("Compiled {name} pattern: {source}");
            self.compiled_patterns.insert(name, regex);
        }
        Ok(())
    }

    fn matches(&self, pattern: &str, filename: &str) -> bool {
        self.compiled_patterns
            .get(pattern)
            .map(|regex| regex.is_match(filename))
            .unwrap_or(false)
    }

    /// Fold match records into facts. Records are sorted by filename first;
    /// every union is first-seen-wins in that order.
    pub fn reduce(&self, mut matches: Vec<MatchRecord>, ctx: &ReductionContext) -> ComponentFacts {
        matches.sort_by(|a, b| a.repo_filename.cmp(&b.repo_filename));

        let mut facts = ComponentFacts::default();

        let filenames: BTreeSet<&str> = matches.iter().map(|m| m.repo_filename.as_str()).collect();
        facts.component_filenames = filenames.into_iter().map(str::to_string).collect();

        for record in &matches {
            for label in &record.labels {
                if ctx.valid_labels.contains(label) && !facts.component_labels.contains(label) {
                    facts.component_labels.push(label.clone());
                }
            }
        }

        let support: BTreeSet<Support> = matches.iter().map(|m| m.support).collect();
        facts.component_support = support.into_iter().collect();
        facts.is_core = facts.component_support != [Support::Community];

        for record in &matches {
            push_unique(&mut facts.component_maintainers, &record.maintainers);
        }
        for record in &matches {
            push_unique(
                &mut facts.component_namespace_maintainers,
                &record.namespace_maintainers,
            );
        }
        for record in &matches {
            push_unique(&mut facts.component_notifiers, &record.notify);
        }

        // ignore wins over maintain/notify, whichever record contributed it
        let ignored: BTreeSet<&String> = matches.iter().flat_map(|m| m.ignore.iter()).collect();
        facts.component_maintainers.retain(|login| !ignored.contains(login));
        facts.component_notifiers.retain(|login| !ignored.contains(login));

        let module_matches: Vec<MatchRecord> = matches
            .iter()
            .filter(|m| self.matches(MODULE, &m.repo_filename))
            .cloned()
            .collect();
        if !module_matches.is_empty() {
            facts.is_module = true;
            facts.is_multi_module = module_matches.len() > 1;
            facts.module_match = Some(module_matches);
        }

        facts.is_plugin = matches.iter().any(|m| self.matches(PLUGIN, &m.repo_filename));
        facts.is_action_plugin = matches
            .iter()
            .any(|m| self.matches(ACTION_PLUGIN, &m.repo_filename));
        facts.is_module_util = matches
            .iter()
            .any(|m| self.matches(MODULE_UTIL, &m.repo_filename));

        if ctx.kind == ItemKind::PullRequest {
            if !ctx.new_modules.is_empty() {
                facts.is_new_module = true;
                facts.is_new_plugin = true;
            }
            if ctx.new_files.iter().any(|f| f.contains("/plugins/")) {
                facts.is_new_plugin = true;
            }
        }

        let collections: Vec<String> = matches
            .iter()
            .filter_map(|m| m.collection_fqcn())
            .map(str::to_string)
            .collect();
        if !collections.is_empty() {
            facts.is_collection = true;
            facts.component_collection = Some(collections);
        }

        facts.component_matches = matches;
        facts
    }
}

fn alternation(values: &[String]) -> String {
    values
        .iter()
        .map(|v| regex::escape(v))
        .collect::<Vec<_>>()
        .join("|")
}

fn push_unique(target: &mut Vec<String>, values: &[String]) {
    for value in values {
        if !target.contains(value) {
            target.push(value.clone());
        }
    }
}
