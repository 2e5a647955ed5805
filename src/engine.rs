//! Action Engine
//!
//! Decides whether a planned set of actions is applied, skipped, redone or
//! aborts the run, and hands approved plans to an executor.

use crate::actions::{check_safe_match, ActionPlan};
use crate::config::ActionsConfig;
use crate::facts::ComponentFacts;
use crate::item::TriageItem;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Applied,
    Skipped,
    /// Re-fetch the item and compute its facts again.
    Redo,
    /// Stop processing further items.
    Abort,
}

/// Operator interaction for interactive runs.
pub trait Prompter {
    fn ask(&mut self, question: &str) -> String;
}

/// Reads answers from standard input.
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask(&mut self, question: &str) -> String {
        print!("{question} ");
        let _ = std::io::stdout().flush();
        let mut answer = String::new();
        if let Err(e) = std::io::stdin().lock().read_line(&mut answer) {
            log::warn!("Failed to read answer: {e}");
        }
        answer.trim().to_string()
    }
}

/// Turns an approved plan into side effects.
pub trait ActionExecutor {
    fn execute(&mut self, item: &TriageItem, plan: &ActionPlan) -> anyhow::Result<()>;
}

#[derive(Debug, Serialize)]
struct OutboxEntry<'a> {
    repo: &'a str,
    number: u64,
    html_url: &'a str,
    executed_at: DateTime<Utc>,
    plan: &'a ActionPlan,
}

/// Logs every action and optionally appends the plan to a JSON-lines outbox
/// for an external submitter.
pub struct LogExecutor {
    outbox: Option<PathBuf>,
}

impl LogExecutor {
    pub fn new(outbox: Option<PathBuf>) -> Self {
        Self { outbox }
    }

    fn append_outbox(&self, item: &TriageItem, plan: &ActionPlan) -> anyhow::Result<()> {
        let Some(path) = &self.outbox else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let entry = OutboxEntry {
            repo: &item.repo,
            number: item.number,
            html_url: &item.html_url,
            executed_at: Utc::now(),
            plan,
        };
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open outbox: {}", path.display()))?;
        writeln!(file, "{}", serde_json::to_string(&entry)?)
            .with_context(|| format!("Failed to write outbox: {}", path.display()))
    }
}

impl ActionExecutor for LogExecutor {
    fn execute(&mut self, item: &TriageItem, plan: &ActionPlan) -> anyhow::Result<()> {
        self.append_outbox(item, plan)?;

        for comment in &plan.comments {
            log::info!("action: comment - {}", comment.lines().next().unwrap_or(""));
        }
        if plan.close {
            log::info!("action: close #{}", item.number);
            return Ok(());
        }
        if plan.close_migrated {
            log::info!("action: close migrated #{}", item.number);
        }
        for label in &plan.unlabel {
            log::info!("action: unlabel - {label}");
        }
        for label in &plan.newlabel {
            log::info!("action: label - {label}");
        }
        for login in &plan.assign {
            log::info!("action: assign - {login}");
        }
        for login in &plan.unassign {
            log::info!("action: unassign - {login}");
        }
        if plan.merge {
            log::info!("action: merge #{}", item.number);
        }
        Ok(())
    }
}

pub struct ActionEngine<E: ActionExecutor, P: Prompter> {
    settings: ActionsConfig,
    executor: E,
    prompter: P,
}

impl<E: ActionExecutor, P: Prompter> ActionEngine<E, P> {
    pub fn new(settings: ActionsConfig, executor: E, prompter: P) -> Self {
        Self {
            settings,
            executor,
            prompter,
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn apply(
        &mut self,
        item: &TriageItem,
        facts: &ComponentFacts,
        plan: &ActionPlan,
    ) -> anyhow::Result<Decision> {
        let force = if self.settings.safe_force {
            let safe = check_safe_match(plan, facts, &item.title);
            log::debug!("#{}: safe match {safe}", item.number);
            safe
        } else {
            self.settings.force
        };

        let count = plan.action_count();
        if count > 0 {
            if self.settings.dump_actions {
                self.dump_action_dict(item, plan)?;
            }

            if self.settings.dry_run {
                log::info!("#{}: dry run, skipping {count} actions", item.number);
                return Ok(Decision::Skipped);
            }

            if force {
                self.executor.execute(item, plan)?;
                return Ok(Decision::Applied);
            }

            println!("{}", serde_json::to_string_pretty(plan)?);
            let answer = self.prompter.ask("Take recommended actions (y/N/a/R/DEBUG)?");
            return Ok(match answer.as_str() {
                "y" | "Y" => {
                    self.executor.execute(item, plan)?;
                    Decision::Applied
                }
                "a" | "A" => Decision::Abort,
                "r" | "R" => Decision::Redo,
                "DEBUG" => {
                    self.print_debug(plan, facts)?;
                    Decision::Redo
                }
                _ => Decision::Skipped,
            });
        }

        if self.settings.always_pause {
            let answer = self.prompter.ask("Continue (Y/n/a/R/DEBUG)?");
            return Ok(match answer.as_str() {
                "a" | "A" | "n" | "N" => Decision::Abort,
                "R" | "REDO" => Decision::Redo,
                "DEBUG" => {
                    self.print_debug(plan, facts)?;
                    Decision::Redo
                }
                _ => Decision::Skipped,
            });
        }

        log::debug!("#{}: nothing to do", item.number);
        Ok(Decision::Skipped)
    }

    fn print_debug(&self, plan: &ActionPlan, facts: &ComponentFacts) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(plan)?);
        println!("{}", serde_json::to_string_pretty(facts)?);
        Ok(())
    }

    /// Write the plan to `<dump_dir>/<repo>/<number>.json`.
    pub fn dump_action_dict(
        &self,
        item: &TriageItem,
        plan: &ActionPlan,
    ) -> anyhow::Result<PathBuf> {
        let dir = PathBuf::from(&self.settings.dump_dir).join(&item.repo);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create dump directory: {}", dir.display()))?;
        let path = dir.join(format!("{}.json", item.number));
        std::fs::write(&path, serde_json::to_string_pretty(plan)?)
            .with_context(|| format!("Failed to dump actions: {}", path.display()))?;
        log::debug!("Dumped actions to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;

    /// Replays canned answers and records every question asked.
    #[derive(Default)]
    pub struct ScriptedPrompter {
        pub answers: VecDeque<String>,
        pub questions: Vec<String>,
    }

    impl ScriptedPrompter {
        pub fn new(answers: &[&str]) -> Self {
            Self {
                answers: answers.iter().map(|a| a.to_string()).collect(),
                questions: Vec::new(),
            }
        }
    }

    impl Prompter for ScriptedPrompter {
        fn ask(&mut self, question: &str) -> String {
            self.questions.push(question.to_string());
            self.answers.pop_front().unwrap_or_default()
        }
    }

    #[derive(Default)]
    pub struct RecordingExecutor {
        pub executed: Vec<(u64, ActionPlan)>,
    }

    impl ActionExecutor for RecordingExecutor {
        fn execute(&mut self, item: &TriageItem, plan: &ActionPlan) -> anyhow::Result<()> {
            self.executed.push((item.number, plan.clone()));
            Ok(())
        }
    }
}
