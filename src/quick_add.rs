//! Free-text quick-task parsing.
//!
//! Turns a line like `"Send draft to Pat for Acme 03/15"` into a
//! structured quick-add against the known client list. Matching is
//! lenient: the client name can appear anywhere in the line, the
//! assignee rides on a `to NAME` / `for NAME` phrase, and the due date
//! is an explicit `MM/DD` token or the words `today` / `tomorrow`.

use chrono::{Duration, Local};
use regex::Regex;
use std::sync::OnceLock;

use crate::types::ClientMap;

/// Result of parsing one quick-add line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickTask {
    pub client_id: String,
    pub client_name: String,
    pub task: String,
    pub assignees: Vec<String>,
    pub due: String,
}

fn assignee_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:to|for)\s+([A-Z][a-z]+)").expect("assignee regex"))
}

fn due_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})\b").expect("due regex"))
}

/// Parse one line against the known clients. `None` when no client name
/// appears in the input; ties between matching names go to the longest
/// name so "Acme Corp" beats "Acme".
pub fn parse(input: &str, clients: &ClientMap) -> Option<QuickTask> {
    let lower = input.to_lowercase();

    let (client_id, client_name) = clients
        .iter()
        .filter(|(_, c)| !c.name.trim().is_empty())
        .filter(|(_, c)| lower.contains(&c.name.to_lowercase()))
        .max_by_key(|(id, c)| (c.name.len(), std::cmp::Reverse(id.as_str())))
        .map(|(id, c)| (id.clone(), c.name.clone()))?;

    let mut residue = strip_client_phrase(input, &client_name);

    let assignee_hit = assignee_re()
        .captures(&residue)
        .map(|caps| (caps[0].to_string(), caps[1].to_string()));
    let assignee = assignee_hit.map(|(phrase, name)| {
        residue = residue.replacen(&phrase, "", 1);
        name
    });

    let due = extract_due(&mut residue);

    for word in ["due", "today", "tomorrow"] {
        residue = strip_word(&residue, word);
    }

    let task = residue.split_whitespace().collect::<Vec<_>>().join(" ");
    let task = if task.is_empty() {
        "Untitled Task".to_string()
    } else {
        task
    };

    Some(QuickTask {
        client_id,
        client_name,
        task,
        assignees: assignee.into_iter().collect(),
        due,
    })
}

/// Pull the due date out of the residue, removing the token that set it.
fn extract_due(residue: &mut String) -> String {
    let hit = due_token_re().captures(residue).and_then(|caps| {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        ((1..=12).contains(&month) && (1..=31).contains(&day))
            .then(|| (caps[0].to_string(), month, day))
    });
    if let Some((token, month, day)) = hit {
        *residue = residue.replacen(&token, "", 1);
        return format!("{month:02}/{day:02}");
    }

    let lower = residue.to_lowercase();
    if lower.contains("tomorrow") {
        return (Local::now().date_naive() + Duration::days(1))
            .format("%m/%d")
            .to_string();
    }
    if lower.contains("today") {
        return Local::now().date_naive().format("%m/%d").to_string();
    }
    String::new()
}

/// Remove the first case-insensitive occurrence of the client name, taking
/// a `to`/`for` connector immediately before it along for the ride.
fn strip_client_phrase(input: &str, name: &str) -> String {
    let escaped = regex::escape(name);
    let pattern = format!(r"(?i)\b(?:to|for)\s+{escaped}|{escaped}");
    match Regex::new(&pattern) {
        Ok(re) => re.replacen(input, 1, "").into_owned(),
        Err(_) => input.to_string(),
    }
}

/// Remove whole-word occurrences of `word`, case-insensitively.
fn strip_word(haystack: &str, word: &str) -> String {
    haystack
        .split_whitespace()
        .filter(|token| {
            !token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .eq_ignore_ascii_case(word)
        })
        .collect::<Vec<_>>()
        .join(" ")
}
