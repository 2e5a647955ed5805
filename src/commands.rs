use crate::history::CommandEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Add(String),
    Remove(String),
    Set(String),
}

/// Parse a single `!component [+-=]path` line.
///
/// Returns `None` for lines without the prefix, without an operand, with an
/// unknown sigil or an empty path.
pub fn parse_directive(line: &str, prefix: &str) -> Option<Directive> {
    let line = line.trim();
    if !line.starts_with(prefix) {
        return None;
    }

    let operand = match line.split_whitespace().nth(1) {
        Some(token) => token.to_string(),
        None => line.replacen(prefix, "", 1).trim().to_string(),
    };

    let mut chars = operand.chars();
    let sigil = chars.next()?;
    let path = chars.as_str().trim();
    if path.is_empty() {
        return None;
    }

    match sigil {
        '+' => Some(Directive::Add(path.to_string())),
        '-' => Some(Directive::Remove(path.to_string())),
        '=' => Some(Directive::Set(path.to_string())),
        _ => None,
    }
}

/// Replay component commands over the current file set.
///
/// The first `=` of a comment replaces the set; any further `=` in the same
/// comment appends instead.
pub fn reconcile(events: &[CommandEvent], current: &[String], prefix: &str) -> Vec<String> {
    let mut filenames: Vec<String> = current.to_vec();

    for event in events {
        let mut cleared = false;

        for line in event.body.lines() {
            let Some(directive) = parse_directive(line, prefix) else {
                continue;
            };
            log::debug!("Applying {:?} from {}", directive, event.author);

            match directive {
                Directive::Add(path) => {
                    if !filenames.contains(&path) {
                        filenames.push(path);
                    }
                }
                Directive::Remove(path) => {
                    filenames.retain(|f| f != &path);
                }
                Directive::Set(path) => {
                    if !cleared {
                        filenames = vec![path];
                        cleared = true;
                    } else if !filenames.contains(&path) {
                        filenames.push(path);
                    }
                }
            }
        }
    }

    filenames
}
