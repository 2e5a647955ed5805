use crate::actions::plan_actions;
use crate::component_matching::FactPipeline;
use crate::config::Config;
use crate::engine::{ActionEngine, ActionExecutor, Decision, Prompter};
use crate::item::TriageItem;
use crate::metadata::RepoMetadata;
use crate::resume::{ResumeFile, ResumeState};
use crate::source::ItemSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub applied: usize,
    pub skipped: usize,
    pub redone: usize,
    /// Items whose triage failed and were left for the next run.
    pub failed: usize,
    pub aborted: bool,
    pub interrupted: bool,
}

/// Record an interrupt and report whether the process should exit now.
///
/// Interactive runs may be blocked on a prompt, so they exit on the first
/// signal. A daemon finishes its current item and only exits immediately on
/// a second signal.
pub fn request_shutdown(shutdown: &AtomicBool, daemon: bool) -> bool {
    let repeated = shutdown.swap(true, Ordering::SeqCst);
    !daemon || repeated
}

/// Drives items one at a time through fact gathering, planning and the
/// action engine.
pub struct Triager<'a, E: ActionExecutor, P: Prompter> {
    config: &'a Config,
    pipeline: FactPipeline<'a>,
    metadata: &'a dyn RepoMetadata,
    engine: ActionEngine<E, P>,
    resume: Option<ResumeFile>,
    only_number: Option<u64>,
    show_facts: bool,
}

impl<'a, E: ActionExecutor, P: Prompter> Triager<'a, E, P> {
    pub fn new(
        config: &'a Config,
        pipeline: FactPipeline<'a>,
        metadata: &'a dyn RepoMetadata,
        engine: ActionEngine<E, P>,
    ) -> Self {
        Self {
            config,
            pipeline,
            metadata,
            engine,
            resume: None,
            only_number: None,
            show_facts: false,
        }
    }

    pub fn with_resume(mut self, resume: ResumeFile) -> Self {
        self.resume = Some(resume);
        self
    }

    /// Restrict runs to a single item. Resuming is ignored in this mode.
    pub fn with_only_number(mut self, number: Option<u64>) -> Self {
        self.only_number = number;
        self
    }

    pub fn with_show_facts(mut self, show_facts: bool) -> Self {
        self.show_facts = show_facts;
        self
    }

    pub fn engine(&self) -> &ActionEngine<E, P> {
        &self.engine
    }

    fn resume_file(&self) -> Option<&ResumeFile> {
        match self.only_number {
            Some(_) => None,
            None => self.resume.as_ref(),
        }
    }

    /// Process one item until the engine settles on a final decision.
    /// Returns the decision and how many times the item was redone.
    pub fn triage(
        &mut self,
        source: &mut dyn ItemSource,
        item: TriageItem,
    ) -> anyhow::Result<(Decision, usize)> {
        let mut item = item;
        let mut redone = 0;
        loop {
            log::info!("Triaging {} #{}: {}", item.repo, item.number, item.title);
            let valid_labels = self.metadata.valid_labels(&item.repo);
            let facts = self.pipeline.get_component_match_facts(&item, &valid_labels);
            if self.show_facts {
                println!("{}", serde_json::to_string_pretty(&facts)?);
            }

            let plan = plan_actions(&item, &facts, self.config);
            let decision = self.engine.apply(&item, &facts, &plan)?;
            if decision != Decision::Redo {
                return Ok((decision, redone));
            }

            log::info!("Redoing #{}", item.number);
            redone += 1;
            item = source.refresh(&item)?;
        }
    }

    pub fn run(
        &mut self,
        source: &mut dyn ItemSource,
        shutdown: &AtomicBool,
    ) -> anyhow::Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut items = source.items()?;
        if let Some(number) = self.only_number {
            items.retain(|i| i.number == number);
            if items.is_empty() {
                log::warn!("Item #{number} not found");
            }
        }

        let resume_from = self.resume_file().and_then(|r| r.load());
        if let Some(state) = &resume_from {
            log::info!("Resuming {} at #{}", state.repo, state.number);
        }

        for item in items {
            if shutdown.load(Ordering::SeqCst) {
                log::info!("Shutdown requested, stopping run");
                summary.interrupted = true;
                break;
            }

            if let Some(state) = &resume_from {
                if state.repo == item.repo && item.number > state.number {
                    log::debug!("Skipping #{}, already processed", item.number);
                    continue;
                }
            }

            if let Some(resume) = self.resume_file() {
                resume.save(&ResumeState {
                    repo: item.repo.clone(),
                    number: item.number,
                })?;
            }

            let number = item.number;
            let (decision, redone) = match self.triage(source, item) {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!("Failed to triage #{number}: {e:#}");
                    summary.failed += 1;
                    continue;
                }
            };
            summary.processed += 1;
            summary.redone += redone;
            match decision {
                Decision::Applied => summary.applied += 1,
                Decision::Skipped => summary.skipped += 1,
                Decision::Abort => {
                    log::warn!("Run aborted by operator");
                    summary.aborted = true;
                    break;
                }
                Decision::Redo => {}
            }
        }

        if !summary.aborted && !summary.interrupted {
            if let Some(resume) = self.resume_file() {
                resume.clear()?;
            }
        }

        log::info!(
            "Run finished: {} processed, {} applied, {} skipped, {} failed",
            summary.processed,
            summary.applied,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }

    /// Repeat runs until shutdown or an operator abort. Failed runs are
    /// logged and retried on the next cycle.
    pub fn run_daemon(
        &mut self,
        source: &mut dyn ItemSource,
        interval: Duration,
        shutdown: &AtomicBool,
    ) -> anyhow::Result<()> {
        while !shutdown.load(Ordering::SeqCst) {
            match self.run(source, shutdown) {
                Ok(summary) if summary.aborted => return Ok(()),
                Ok(_) => {}
                Err(e) => log::error!("Triage run failed: {e:#}"),
            }

            log::info!("Sleeping for {}s", interval.as_secs());
            let step = Duration::from_millis(500);
            let mut slept = Duration::ZERO;
            while slept < interval && !shutdown.load(Ordering::SeqCst) {
                let nap = step.min(interval - slept);
                std::thread::sleep(nap);
                slept += nap;
            }
        }
        log::info!("Daemon stopped");
        Ok(())
    }
}
