pub mod actions;
pub mod banner;
pub mod commands;
pub mod component_matching;
pub mod config;
pub mod engine;
pub mod facts;
pub mod history;
pub mod item;
pub mod matcher;
pub mod members;
pub mod metadata;
pub mod quality;
pub mod resume;
pub mod source;
pub mod triager;

pub use actions::{check_safe_match, plan_actions, ActionPlan};
pub use component_matching::FactPipeline;
pub use config::Config;
pub use engine::{ActionEngine, ActionExecutor, Decision, LogExecutor, Prompter, StdinPrompter};
pub use facts::ComponentFacts;
pub use item::TriageItem;
pub use matcher::{ComponentMatcher, MatchRecord, MetadataMatcher, Support};
pub use triager::{RunSummary, Triager};
