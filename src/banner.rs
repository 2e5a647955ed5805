//! Components banner
//!
//! The banner comment is the only durable record of which files the bot
//! announced, so idempotence is decided by parsing it back.

use crate::history::BoilerplateComment;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

lazy_static! {
    static ref BRACKETED: Regex = Regex::new(r"^\[(\S+)\]").unwrap();
}

/// Body of the most recent boilerplate comment of `kind`.
pub fn latest_banner<'a>(comments: &'a [BoilerplateComment], kind: &str) -> Option<&'a str> {
    comments
        .iter()
        .filter(|c| c.kind == kind)
        .max_by_key(|c| c.created_at)
        .map(|c| c.body.as_str())
}

/// Filenames listed as `* [file](link)` bullets in a banner.
///
/// Bare tokens are accepted too, except placeholder `None` entries.
pub fn parse_banner_filenames(body: &str) -> Vec<String> {
    let mut filenames = Vec::new();
    for line in body.lines() {
        if !line.starts_with('*') {
            continue;
        }
        let line = line.replace('`', "");
        let Some(token) = line.split_whitespace().nth(1) else {
            continue;
        };
        match BRACKETED.captures(token) {
            Some(caps) => filenames.push(caps[1].to_string()),
            None if !token.contains("None") => filenames.push(token.to_string()),
            None => {}
        }
    }
    filenames
}

pub fn needs_announcement(prior_banner: Option<&str>, current_filenames: &[String]) -> bool {
    let Some(body) = prior_banner else {
        return true;
    };
    let announced: BTreeSet<String> = parse_banner_filenames(body).into_iter().collect();
    let current: BTreeSet<String> = current_filenames.iter().cloned().collect();
    announced != current
}

/// Render a banner in the shape [`parse_banner_filenames`] reads back.
pub fn render_components_banner(
    kind: &str,
    repo: &str,
    filenames: &[String],
    mentions: &[String],
) -> String {
    let mut body = format!("<!--- boilerplate: {kind} --->\n");
    body.push_str("Files identified in the description:\n\n");
    if filenames.is_empty() {
        body.push_str("* None\n");
    }
    for filename in filenames {
        if filename.contains(':') {
            body.push_str(&format!("* [`{filename}`]({filename})\n"));
        } else {
            body.push_str(&format!(
                "* [`{filename}`](https://github.com/{repo}/blob/devel/{filename})\n"
            ));
        }
    }
    body.push_str(concat!(
        "\nIf these files are incorrect, please update the `component name` section ",
        "of the description or use the `!component` bot command.\n",
    ));
    if !mentions.is_empty() {
        let cc: Vec<String> = mentions.iter().map(|m| format!("@{m}")).collect();
        body.push_str(&format!("\ncc {}\n", cc.join(" ")));
    }
    body
}
