//! Entity tree: Client → Meeting → Deliverable → Task.
//!
//! All records are plain nested data serialized camelCase, matching the
//! shape the web client reads and writes. Loading is lenient: every field
//! that older saved data may lack carries a serde default.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::Local;
use serde::{Deserialize, Serialize};

/// Separator used in composite entity ids (`clientId::meetingId::...`).
pub const ID_SEP: &str = "::";

/// Fixed id of the ad-hoc sentinel meeting in `meetings`.
pub const AD_HOC_ID: &str = "adhoc";
/// Fixed id of the ad-hoc sentinel meeting in `pastMeetings`.
pub const AD_HOC_PAST_ID: &str = "adhoc_past";

/// Cycling option labels for the sector status badge.
pub const SECTOR_OPTIONS: [&str; 3] = ["Tech", "Life Sci", "Other"];
/// Cycling option labels for the activity status badge.
pub const STATUS_OPTIONS: [&str; 3] = ["Active", "On Hold", "Other"];
/// Cycling option labels for the company-type status badge.
pub const TYPE_OPTIONS: [&str; 2] = ["Public", "Private"];

pub type ClientMap = HashMap<String, Client>;

/// A tracked client/account. Owned by exactly one user; `shared` makes it
/// visible to everyone but write permission stays with the owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub base_color: String,
    #[serde(default)]
    pub header_color: String,
    #[serde(default)]
    pub sidebar_color: String,
    #[serde(default)]
    pub team: Vec<String>,
    #[serde(default)]
    pub status: ClientStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub meetings: Vec<Meeting>,
    #[serde(default)]
    pub past_meetings: Vec<Meeting>,
}

impl Client {
    /// A fresh client as created by the "add client" action: empty
    /// everything, one ad-hoc sentinel meeting in each list.
    pub fn new(id: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: "Unnamed Client".to_string(),
            logo: String::new(),
            base_color: "#4A5568".to_string(),
            header_color: "#F7FAFC".to_string(),
            sidebar_color: "#EDF2F7".to_string(),
            team: Vec::new(),
            status: ClientStatus::default(),
            notes: String::new(),
            shared: false,
            owner: owner.into(),
            meetings: vec![Meeting::ad_hoc(AD_HOC_ID)],
            past_meetings: vec![Meeting::ad_hoc(AD_HOC_PAST_ID)],
        }
    }

    /// Logo URL with the Clearbit-style fallback derived from the client
    /// name (lowercased, whitespace and non-word characters stripped).
    pub fn logo_url(&self) -> String {
        let trimmed = self.logo.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
        let domain: String = self
            .name
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        format!("https://logo.clearbit.com/{domain}.com")
    }

    /// Lazily repair the ad-hoc sentinel invariant: exactly one ad-hoc
    /// meeting at the front of each list. Idempotent; returns whether
    /// anything was inserted.
    pub fn ensure_ad_hoc_meetings(&mut self) -> bool {
        let mut changed = false;
        if !self.meetings.iter().any(|m| m.is_ad_hoc) {
            self.meetings.insert(0, Meeting::ad_hoc(AD_HOC_ID));
            changed = true;
        }
        if !self.past_meetings.iter().any(|m| m.is_ad_hoc) {
            self.past_meetings.insert(0, Meeting::ad_hoc(AD_HOC_PAST_ID));
            changed = true;
        }
        changed
    }

    /// Iterate `meetings` then `pastMeetings`, the order every projection
    /// and path lookup uses.
    pub fn all_meetings(&self) -> impl Iterator<Item = &Meeting> {
        self.meetings.iter().chain(self.past_meetings.iter())
    }
}

/// Status badge indices. Each cycles through its fixed option list.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStatus {
    #[serde(default)]
    pub sector: u32,
    #[serde(default)]
    pub status: u32,
    #[serde(rename = "type", default)]
    pub kind: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub is_ad_hoc: bool,
    #[serde(default)]
    pub deliverables: Vec<Deliverable>,
}

impl Meeting {
    pub fn ad_hoc(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: String::new(),
            date: String::new(),
            is_ad_hoc: true,
            deliverables: Vec::new(),
        }
    }

    /// A fresh non-ad-hoc meeting dated today (`MM/DD`).
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            date: today_due(),
            is_ad_hoc: false,
            deliverables: Vec::new(),
        }
    }

    /// Derived: a non-ad-hoc meeting is complete when every deliverable is
    /// derived-complete. Not stored.
    pub fn is_derived_complete(&self) -> bool {
        !self.is_ad_hoc && self.deliverables.iter().all(Deliverable::is_derived_complete)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deliverable {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bucket: Bucket,
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// One-way manual completion flag set from the bucket board. Distinct
    /// from the derived all-tasks-complete state.
    #[serde(default)]
    pub is_deliverable_complete: bool,
}

impl Deliverable {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            bucket: Bucket::Unassigned,
            tasks: Vec::new(),
            is_deliverable_complete: false,
        }
    }

    /// Derived: at least one task and all of them complete. Not stored.
    pub fn is_derived_complete(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.complete)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub assignees: Vec<String>,
    /// Legacy single-assignee field from old saved data; read as a fallback
    /// only, never written by new code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// `MM/DD` against the current year; empty means undated.
    #[serde(default)]
    pub due: String,
    #[serde(default)]
    pub complete: bool,
}

impl Task {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            assignees: Vec::new(),
            assignee: None,
            due: String::new(),
            complete: false,
        }
    }

    /// Assignee names with the legacy-field and "Unassigned" fallbacks the
    /// views rely on.
    pub fn effective_assignees(&self) -> Vec<String> {
        if !self.assignees.is_empty() {
            return self.assignees.clone();
        }
        match &self.assignee {
            Some(a) if !a.is_empty() => vec![a.clone()],
            _ => vec!["Unassigned".to_string()],
        }
    }
}

/// Workflow stage of a deliverable. Wire names are fixed; anything else
/// fails to parse, which is how invalid drop targets get rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Bucket {
    #[default]
    Unassigned,
    Downstream,
    #[serde(rename = "Active Work")]
    ActiveWork,
    Upstream,
    Internal,
    Complete,
}

impl Bucket {
    /// Every bucket in board display order.
    pub const ALL: [Bucket; 6] = [
        Bucket::Unassigned,
        Bucket::Downstream,
        Bucket::ActiveWork,
        Bucket::Upstream,
        Bucket::Internal,
        Bucket::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Unassigned => "Unassigned",
            Bucket::Downstream => "Downstream",
            Bucket::ActiveWork => "Active Work",
            Bucket::Upstream => "Upstream",
            Bucket::Internal => "Internal",
            Bucket::Complete => "Complete",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Bucket::ALL.into_iter().find(|b| b.as_str() == s).ok_or(())
    }
}

/// Composite identity of a task: (client, meeting, deliverable, task) ids
/// joined by `::`. The key used across the projections and drop handlers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskPath {
    pub client: String,
    pub meeting: String,
    pub deliverable: String,
    pub task: String,
}

impl TaskPath {
    pub fn new(
        client: impl Into<String>,
        meeting: impl Into<String>,
        deliverable: impl Into<String>,
        task: impl Into<String>,
    ) -> Self {
        Self {
            client: client.into(),
            meeting: meeting.into(),
            deliverable: deliverable.into(),
            task: task.into(),
        }
    }

    /// Parse a `clientId::meetingId::deliverableId::taskId` composite id.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split(ID_SEP).collect();
        match parts.as_slice() {
            [c, m, d, t] => Some(Self::new(*c, *m, *d, *t)),
            _ => None,
        }
    }
}

impl fmt::Display for TaskPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}",
            self.client,
            self.meeting,
            self.deliverable,
            self.task,
            sep = ID_SEP
        )
    }
}

/// Composite identity of a deliverable: (client, meeting, deliverable).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliverablePath {
    pub client: String,
    pub meeting: String,
    pub deliverable: String,
}

impl DeliverablePath {
    pub fn new(
        client: impl Into<String>,
        meeting: impl Into<String>,
        deliverable: impl Into<String>,
    ) -> Self {
        Self {
            client: client.into(),
            meeting: meeting.into(),
            deliverable: deliverable.into(),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split(ID_SEP).collect();
        match parts.as_slice() {
            [c, m, d] => Some(Self::new(*c, *m, *d)),
            _ => None,
        }
    }
}

impl fmt::Display for DeliverablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.client,
            self.meeting,
            self.deliverable,
            sep = ID_SEP
        )
    }
}

/// Today as an `MM/DD` due string.
pub fn today_due() -> String {
    Local::now().format("%m/%d").to_string()
}

/// Millisecond-timestamp id, the same scheme the web client uses for new
/// meetings, deliverables and tasks.
pub fn timestamp_id() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_client_has_one_ad_hoc_meeting_per_list() {
        let c = Client::new("c1", "alice");
        assert_eq!(c.meetings.len(), 1);
        assert!(c.meetings[0].is_ad_hoc);
        assert_eq!(c.past_meetings.len(), 1);
        assert!(c.past_meetings[0].is_ad_hoc);
    }

    #[test]
    fn ensure_ad_hoc_repairs_empty_client_idempotently() {
        let mut c = Client::new("c1", "alice");
        c.meetings.clear();
        c.past_meetings.clear();

        assert!(c.ensure_ad_hoc_meetings());
        assert_eq!(c.meetings.len(), 1);
        assert_eq!(c.past_meetings.len(), 1);

        // Second repair is a no-op.
        assert!(!c.ensure_ad_hoc_meetings());
        assert_eq!(c.meetings.len(), 1);
        assert_eq!(c.past_meetings.len(), 1);
    }

    #[test]
    fn logo_fallback_strips_non_word_characters() {
        let mut c = Client::new("c1", "alice");
        c.name = "Acme & Sons Co.".to_string();
        assert_eq!(c.logo_url(), "https://logo.clearbit.com/acmesonsco.com");

        c.logo = "  https://example.com/logo.png  ".to_string();
        assert_eq!(c.logo_url(), "https://example.com/logo.png");
    }

    #[test]
    fn derived_complete_needs_at_least_one_task() {
        let mut d = Deliverable::new("d1");
        assert!(!d.is_derived_complete());

        d.tasks.push(Task {
            complete: true,
            ..Task::new("t1", "done")
        });
        assert!(d.is_derived_complete());

        d.tasks.push(Task::new("t2", "open"));
        assert!(!d.is_derived_complete());
    }

    #[test]
    fn ad_hoc_meeting_is_never_derived_complete() {
        let m = Meeting::ad_hoc(AD_HOC_ID);
        assert!(!m.is_derived_complete());
    }

    #[test]
    fn effective_assignees_falls_back_to_legacy_then_unassigned() {
        let mut t = Task::new("t1", "x");
        assert_eq!(t.effective_assignees(), vec!["Unassigned"]);

        t.assignee = Some("Pat".to_string());
        assert_eq!(t.effective_assignees(), vec!["Pat"]);

        t.assignees = vec!["Ana".to_string(), "Lee".to_string()];
        assert_eq!(t.effective_assignees(), vec!["Ana", "Lee"]);
    }

    #[test]
    fn bucket_parses_wire_names_only() {
        assert_eq!("Active Work".parse::<Bucket>(), Ok(Bucket::ActiveWork));
        assert_eq!("Downstream".parse::<Bucket>(), Ok(Bucket::Downstream));
        assert!("active work".parse::<Bucket>().is_err());
        assert!("Trash".parse::<Bucket>().is_err());
    }

    #[test]
    fn task_path_round_trips() {
        let p = TaskPath::new("c", "m", "d", "t");
        assert_eq!(p.to_string(), "c::m::d::t");
        assert_eq!(TaskPath::parse("c::m::d::t"), Some(p));
        assert_eq!(TaskPath::parse("c::m::d"), None);
    }

    #[test]
    fn client_json_round_trips_camel_case() {
        let c = Client::new("c1", "alice");
        let json = serde_json::to_value(&c).unwrap();
        assert!(json.get("pastMeetings").is_some());
        assert!(json.get("baseColor").is_some());
        let back: Client = serde_json::from_value(json).unwrap();
        assert_eq!(back.owner, "alice");
        assert!(back.meetings[0].is_ad_hoc);
    }

    #[test]
    fn legacy_assignee_field_survives_deserialization() {
        let t: Task = serde_json::from_str(
            r#"{"id":"t1","name":"x","assignee":"Pat","due":"","complete":false}"#,
        )
        .unwrap();
        assert_eq!(t.effective_assignees(), vec!["Pat"]);
    }
}
