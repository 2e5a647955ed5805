use crate::item::{Comment, TriageItem};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

lazy_static! {
    static ref BOILERPLATE_MARKER: Regex =
        Regex::new(r"<!-{2,3}\s*boilerplate:\s*([A-Za-z0-9_\-]+)\s*-{2,3}>").unwrap();
}

/// An operator comment containing one or more inline component directives.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEvent {
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub body: String,
}

/// A comment previously posted by the bot from a named template.
#[derive(Debug, Clone, PartialEq)]
pub struct BoilerplateComment {
    pub created_at: DateTime<Utc>,
    pub kind: String,
    pub body: String,
}

pub trait HistoryService {
    /// Component command comments, oldest first.
    fn component_commands(&self, item: &TriageItem) -> Vec<CommandEvent>;

    /// Bot boilerplate comments of every kind, oldest first.
    fn boilerplate_comments(&self, item: &TriageItem) -> Vec<BoilerplateComment>;
}

/// Derives history straight from the comments carried by the item snapshot.
pub struct CommentHistory {
    bot_names: Vec<String>,
    command_prefix: String,
    members: Option<BTreeSet<String>>,
}

impl CommentHistory {
    pub fn new(bot_names: Vec<String>, command_prefix: impl Into<String>) -> Self {
        Self {
            bot_names,
            command_prefix: command_prefix.into(),
            members: None,
        }
    }

    /// Only honour commands from these logins.
    pub fn with_members(mut self, members: BTreeSet<String>) -> Self {
        self.members = Some(members);
        self
    }

    fn is_bot(&self, login: &str) -> bool {
        self.bot_names.iter().any(|b| b == login)
    }

    fn chronological(item: &TriageItem) -> Vec<&Comment> {
        let mut comments: Vec<&Comment> = item.comments.iter().collect();
        comments.sort_by_key(|c| c.created_at);
        comments
    }
}

impl HistoryService for CommentHistory {
    fn component_commands(&self, item: &TriageItem) -> Vec<CommandEvent> {
        Self::chronological(item)
            .into_iter()
            .filter(|c| !self.is_bot(&c.author))
            .filter(|c| c.body.contains(&self.command_prefix))
            .filter(|c| match &self.members {
                Some(members) => {
                    let allowed = members.contains(&c.author);
                    if !allowed {
                        log::info!(
                            "Ignoring component command from non-member {} on #{}",
                            c.author,
                            item.number
                        );
                    }
                    allowed
                }
                None => true,
            })
            .map(|c| CommandEvent {
                author: c.author.clone(),
                created_at: c.created_at,
                body: c.body.clone(),
            })
            .collect()
    }

    fn boilerplate_comments(&self, item: &TriageItem) -> Vec<BoilerplateComment> {
        Self::chronological(item)
            .into_iter()
            .filter(|c| self.bot_names.is_empty() || self.is_bot(&c.author))
            .filter_map(|c| {
                BOILERPLATE_MARKER
                    .captures(&c.body)
                    .map(|caps| BoilerplateComment {
                        created_at: c.created_at,
                        kind: caps[1].to_string(),
                        body: c.body.clone(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::fixtures::{comment, issue};

    fn history() -> CommentHistory {
        CommentHistory::new(vec!["ansibot".to_string()], "!component")
    }

    #[test]
    fn test_commands_are_chronological_and_skip_bots() {
        let mut item = issue(1, "ping");
        item.comments = vec![
            comment("carol", 30, "!component =lib/b.py"),
            comment("ansibot", 10, "use !component to change files"),
            comment("dave", 5, "!component +lib/a.py"),
            comment("erin", 20, "thanks!"),
        ];
        let commands = history().component_commands(&item);
        let authors: Vec<&str> = commands.iter().map(|c| c.author.as_str()).collect();
        assert_eq!(authors, vec!["dave", "carol"]);
    }

    #[test]
    fn test_member_filter() {
        let mut item = issue(1, "ping");
        item.comments = vec![
            comment("outsider", 1, "!component =lib/x.py"),
            comment("member", 2, "!component +lib/y.py"),
        ];
        let members: BTreeSet<String> = ["member".to_string()].into_iter().collect();
        let commands = history().with_members(members).component_commands(&item);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].author, "member");
    }

    #[test]
    fn test_boilerplate_kinds() {
        let mut item = issue(1, "ping");
        item.comments = vec![
            comment("ansibot", 9, "<!--- boilerplate: components_banner --->\nsecond"),
            comment("ansibot", 1, "<!--- boilerplate: components_banner --->\nfirst"),
            comment("ansibot", 5, "<!-- boilerplate: needs_info -->"),
            comment("mallory", 7, "<!--- boilerplate: components_banner --->\nforged"),
        ];
        let comments = history().boilerplate_comments(&item);
        let kinds: Vec<&str> = comments.iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(kinds, vec!["components_banner", "needs_info", "components_banner"]);
        assert!(comments[2].body.ends_with("second"));
    }
}
