use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Issue,
    PullRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub body: String,
}

/// Snapshot of one issue or pull request as fetched by the transport layer.
///
/// `files` and `commits` are `None` when the collaborator failed to fetch
/// them; an empty list means the pull request really has no changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageItem {
    pub repo: String,
    pub number: u64,
    pub html_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub assignees: Vec<String>,
    #[serde(default)]
    pub component_name: Option<String>,
    #[serde(default)]
    pub files: Option<Vec<String>>,
    #[serde(default)]
    pub commits: Option<usize>,
    #[serde(default)]
    pub new_files: Vec<String>,
    #[serde(default)]
    pub new_modules: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl TriageItem {
    pub fn kind(&self) -> ItemKind {
        let is_pull = match Url::parse(&self.html_url) {
            Ok(url) => url
                .path_segments()
                .map(|mut segments| segments.any(|s| s == "pull"))
                .unwrap_or(false),
            Err(_) => self.html_url.contains("/pull/"),
        };
        if is_pull {
            ItemKind::PullRequest
        } else {
            ItemKind::Issue
        }
    }

    pub fn is_pullrequest(&self) -> bool {
        self.kind() == ItemKind::PullRequest
    }

    pub fn is_issue(&self) -> bool {
        !self.is_pullrequest()
    }

    /// Component text declared by the submitter, either given explicitly or
    /// read from the `COMPONENT NAME` section of the issue template.
    pub fn declared_component(&self) -> Option<String> {
        match &self.component_name {
            Some(name) if !name.trim().is_empty() => Some(name.trim().to_string()),
            Some(_) => None,
            None => template_section(&self.body, "component name"),
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn is_assigned(&self, login: &str) -> bool {
        self.assignees.iter().any(|a| a == login)
    }
}

/// Extract the text of a `#####`-style template section.
///
/// Headings are matched case-insensitively; code fences and HTML comments
/// inside the section are dropped. Returns `None` for a missing or empty
/// section.
pub fn template_section(body: &str, section: &str) -> Option<String> {
    let wanted = section.trim().to_lowercase();
    let mut in_section = false;
    let mut in_comment = false;
    let mut collected: Vec<&str> = Vec::new();

    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            if in_section {
                break;
            }
            let heading = trimmed.trim_start_matches('#').trim().to_lowercase();
            in_section = heading == wanted;
            continue;
        }
        if !in_section {
            continue;
        }
        if in_comment {
            if trimmed.contains("-->") {
                in_comment = false;
            }
            continue;
        }
        if trimmed.starts_with("<!--") {
            in_comment = !trimmed.contains("-->");
            continue;
        }
        if trimmed.starts_with("```") || trimmed.is_empty() {
            continue;
        }
        collected.push(trimmed);
    }

    if collected.is_empty() {
        None
    } else {
        Some(collected.join("\n"))
    }
}
