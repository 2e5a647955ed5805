use crate::banner::render_components_banner;
use crate::config::Config;
use crate::facts::ComponentFacts;
use crate::item::TriageItem;
use serde::{Deserialize, Serialize};

/// Corrective actions for one item in one decision cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub newlabel: Vec<String>,
    pub unlabel: Vec<String>,
    pub comments: Vec<String>,
    pub assign: Vec<String>,
    pub unassign: Vec<String>,
    pub close: bool,
    pub close_migrated: bool,
    pub open: bool,
    pub merge: bool,
}

impl ActionPlan {
    /// Flags count once when set, collections count their entries.
    pub fn action_count(&self) -> usize {
        let flags = [self.close, self.close_migrated, self.open, self.merge]
            .iter()
            .filter(|set| **set)
            .count();
        flags
            + self.newlabel.len()
            + self.unlabel.len()
            + self.comments.len()
            + self.assign.len()
            + self.unassign.len()
    }

    pub fn is_empty(&self) -> bool {
        self.action_count() == 0
    }
}

fn push_unique(target: &mut Vec<String>, value: &str) {
    if !target.iter().any(|v| v == value) {
        target.push(value.to_string());
    }
}

/// Translate component facts into the actions still missing on the item.
pub fn plan_actions(item: &TriageItem, facts: &ComponentFacts, config: &Config) -> ActionPlan {
    let mut plan = ActionPlan::default();

    if facts.is_bad_pr {
        log::info!(
            "#{} is a bad pull request (empty: {}), no component actions",
            item.number,
            facts.is_empty_pr
        );
        return plan;
    }

    for label in &facts.component_labels {
        if !item.has_label(label) {
            push_unique(&mut plan.newlabel, label);
        }
    }

    if facts.needs_component_message {
        let mut mentions = Vec::new();
        for login in facts
            .component_maintainers
            .iter()
            .chain(facts.component_notifiers.iter())
        {
            push_unique(&mut mentions, login);
        }
        plan.comments.push(render_components_banner(
            &config.banner_kind,
            &item.repo,
            &facts.component_filenames,
            &mentions,
        ));
    }

    if config.actions.assign_maintainers && item.is_issue() {
        for login in &facts.component_maintainers {
            if !item.is_assigned(login) {
                push_unique(&mut plan.assign, login);
            }
        }
    }

    plan
}

/// Whether a plan is harmless enough to apply without asking.
pub fn check_safe_match(plan: &ActionPlan, facts: &ComponentFacts, title: &str) -> bool {
    if plan.is_empty() {
        return true;
    }

    let only_additions = !plan.close && plan.unlabel.is_empty();

    let safe = if only_additions {
        plan.newlabel.len() == 1 && plan.newlabel[0].starts_with("affects_")
    } else {
        // closing or unlabelling is trusted when the title names the module
        match facts.module_match.as_deref() {
            Some([module]) => {
                let name = module_name(&module.repo_filename).to_lowercase();
                !name.is_empty() && title.to_lowercase().contains(&name)
            }
            _ => false,
        }
    };
    if safe {
        return true;
    }

    // re-notifications are harmless
    only_additions
        && plan.newlabel.is_empty()
        && plan.comments.len() == 1
        && plan.comments[0].contains("still waiting")
}

fn module_name(filename: &str) -> &str {
    let base = filename.rsplit('/').next().unwrap_or(filename);
    base.split('.').next().unwrap_or(base)
}
