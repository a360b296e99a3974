//! Derived read-only projections of the entity tree.
//!
//! The calendar and weekly views consume the date-indexed `task_map`; the
//! bucket board consumes `deliverables_by_bucket`. Both are pure functions
//! of their inputs and never mutate the tree — callers recompute them
//! whenever the tree or a filter changes.

use std::collections::HashMap;

use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::Serialize;

use crate::types::{Bucket, ClientMap, Task, TaskPath};

/// Sort sentinel for unparseable due dates: they go last.
const FAR_FUTURE: (i32, u32, u32) = (3000, 1, 1);

/// Flattened task record as the calendar/weekly views display it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    /// Composite `clientId::meetingId::deliverableId::taskId`.
    pub id: String,
    pub client_id: String,
    pub client_name: String,
    pub logo: String,
    pub assignees: Vec<String>,
    pub task_name: String,
    pub deliverable_name: String,
    pub due: String,
    pub complete: bool,
}

/// Flattened deliverable record as the bucket board displays it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverableView {
    /// Composite `clientId::meetingId::deliverableId`.
    pub id: String,
    pub client_id: String,
    pub client_name: String,
    pub logo: String,
    pub deliverable_name: String,
    pub bucket: Bucket,
    /// Incomplete tasks only.
    pub tasks: Vec<Task>,
}

/// Parse an `MM/DD` due string against the given year.
///
/// Non-numeric input, a missing slash, or an out-of-range month/day (e.g.
/// `13/40`) all yield `None`; callers skip such tasks rather than erroring.
pub fn parse_due(due: &str, year: i32) -> Option<NaiveDate> {
    let (m, d) = due.split_once('/')?;
    let month: u32 = m.trim().parse().ok()?;
    let day: u32 = d.trim().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Format a calendar day back into the `MM/DD` due string a drop target
/// assigns to a task.
pub fn format_due(date: NaiveDate) -> String {
    format!("{:02}/{:02}", date.month(), date.day())
}

/// Date-indexed projection: calendar day → tasks due that day, against the
/// current year.
pub fn task_map(clients: &ClientMap) -> HashMap<NaiveDate, Vec<TaskView>> {
    task_map_for_year(clients, Local::now().year())
}

/// Date-indexed projection with an explicit year.
///
/// Walks every client (in id order, for deterministic output), every meeting
/// in `meetings ∪ pastMeetings`, every deliverable, every task with a
/// non-empty due. Within a day, records keep iteration order; no sort.
pub fn task_map_for_year(clients: &ClientMap, year: i32) -> HashMap<NaiveDate, Vec<TaskView>> {
    let mut map: HashMap<NaiveDate, Vec<TaskView>> = HashMap::new();

    let mut ids: Vec<&String> = clients.keys().collect();
    ids.sort();

    for client_id in ids {
        let client = &clients[client_id];
        let logo = client.logo_url();
        for meeting in client.all_meetings() {
            for deliverable in &meeting.deliverables {
                for task in &deliverable.tasks {
                    if task.due.is_empty() {
                        continue;
                    }
                    let Some(date) = parse_due(&task.due, year) else {
                        continue;
                    };
                    map.entry(date).or_default().push(TaskView {
                        id: TaskPath::new(client_id, &meeting.id, &deliverable.id, &task.id)
                            .to_string(),
                        client_id: client_id.clone(),
                        client_name: if client.name.is_empty() {
                            "Unnamed Client".to_string()
                        } else {
                            client.name.clone()
                        },
                        logo: logo.clone(),
                        assignees: task.effective_assignees(),
                        task_name: if task.name.is_empty() {
                            "Untitled Task".to_string()
                        } else {
                            task.name.clone()
                        },
                        deliverable_name: if deliverable.name.is_empty() {
                            "Untitled Deliverable".to_string()
                        } else {
                            deliverable.name.clone()
                        },
                        due: task.due.clone(),
                        complete: task.complete,
                    });
                }
            }
        }
    }

    map
}

/// Upcoming-tasks sidebar: flatten the date-indexed projection, drop
/// completed and undated tasks, optionally keep only tasks assigned to
/// `assignee` (case-insensitive exact match), sort ascending by due date.
/// Unparseable dues sort last.
pub fn upcoming_tasks(
    map: &HashMap<NaiveDate, Vec<TaskView>>,
    assignee: Option<&str>,
) -> Vec<TaskView> {
    let year = Local::now().year();
    let filter = assignee.map(str::trim).filter(|s| !s.is_empty());

    let mut all: Vec<TaskView> = map
        .values()
        .flatten()
        .filter(|t| !t.due.is_empty() && !t.complete)
        .filter(|t| match filter {
            Some(name) => t
                .assignees
                .iter()
                .any(|a| a.eq_ignore_ascii_case(name)),
            None => true,
        })
        .cloned()
        .collect();

    let far_future =
        NaiveDate::from_ymd_opt(FAR_FUTURE.0, FAR_FUTURE.1, FAR_FUTURE.2).unwrap_or(NaiveDate::MAX);
    all.sort_by_key(|t| parse_due(&t.due, year).unwrap_or(far_future));
    all
}

/// Bucket-indexed projection: every not-manually-completed deliverable,
/// grouped by bucket in fixed board order. `search` is a case-insensitive
/// substring match over deliverable and client names, applied before
/// grouping.
pub fn deliverables_by_bucket(
    clients: &ClientMap,
    search: Option<&str>,
) -> Vec<(Bucket, Vec<DeliverableView>)> {
    let needle = search.map(str::to_lowercase).filter(|s| !s.is_empty());

    let mut ids: Vec<&String> = clients.keys().collect();
    ids.sort();

    let mut flat: Vec<DeliverableView> = Vec::new();
    for client_id in ids {
        let client = &clients[client_id];
        let logo = client.logo_url();
        for meeting in client.all_meetings() {
            for d in &meeting.deliverables {
                if d.is_deliverable_complete {
                    continue;
                }
                flat.push(DeliverableView {
                    id: format!(
                        "{}{sep}{}{sep}{}",
                        client_id,
                        meeting.id,
                        d.id,
                        sep = crate::types::ID_SEP
                    ),
                    client_id: client_id.clone(),
                    client_name: client.name.clone(),
                    logo: logo.clone(),
                    deliverable_name: d.name.clone(),
                    bucket: d.bucket,
                    tasks: d.tasks.iter().filter(|t| !t.complete).cloned().collect(),
                });
            }
        }
    }

    if let Some(needle) = needle {
        flat.retain(|d| {
            d.deliverable_name.to_lowercase().contains(&needle)
                || d.client_name.to_lowercase().contains(&needle)
        });
    }

    Bucket::ALL
        .into_iter()
        .map(|bucket| {
            let group = flat.iter().filter(|d| d.bucket == bucket).cloned().collect();
            (bucket, group)
        })
        .collect()
}

/// Monday..Friday of the week containing `anchor` — the weekly view's grid.
pub fn week_dates(anchor: NaiveDate) -> [NaiveDate; 5] {
    let offset = anchor.weekday().num_days_from_monday() as i64;
    let monday = anchor - Duration::days(offset);
    [0, 1, 2, 3, 4].map(|i| monday + Duration::days(i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Client, Deliverable, Meeting, Task};

    fn client_with_task(due: &str, complete: bool) -> ClientMap {
        let mut task = Task::new("t1", "Draft");
        task.due = due.to_string();
        task.complete = complete;
        task.assignees = vec!["Pat".to_string()];

        let mut deliverable = Deliverable::new("d1");
        deliverable.name = "Spec".to_string();
        deliverable.tasks.push(task);

        let mut meeting = Meeting::new("m1");
        meeting.name = "Kickoff".to_string();
        meeting.deliverables.push(deliverable);

        let mut client = Client::new("c1", "alice");
        client.name = "Acme".to_string();
        client.meetings.push(meeting);

        let mut map = ClientMap::new();
        map.insert("c1".to_string(), client);
        map
    }

    #[test]
    fn task_appears_exactly_once_under_its_due_day() {
        let clients = client_with_task("03/15", false);
        let map = task_map_for_year(&clients, 2026);

        let day = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let records = map.get(&day).expect("day key present");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].task_name, "Draft");
        assert_eq!(records[0].assignees, vec!["Pat"]);
        assert_eq!(records[0].id, "c1::m1::d1::t1");

        let total: usize = map.values().map(Vec::len).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn invalid_due_is_skipped_without_error() {
        let clients = client_with_task("13/40", false);
        let map = task_map_for_year(&clients, 2026);
        assert!(map.is_empty());
    }

    #[test]
    fn non_numeric_and_slashless_dues_are_skipped() {
        for due in ["soon", "3-15", "aa/bb", "/"] {
            let clients = client_with_task(due, false);
            assert!(task_map_for_year(&clients, 2026).is_empty(), "due={due}");
        }
    }

    #[test]
    fn empty_due_excluded_from_date_projection() {
        let clients = client_with_task("", false);
        assert!(task_map_for_year(&clients, 2026).is_empty());
    }

    #[test]
    fn tasks_from_past_meetings_are_included() {
        let mut clients = client_with_task("03/15", false);
        let client = clients.get_mut("c1").unwrap();
        let meeting = client.meetings.pop().unwrap();
        client.past_meetings.push(meeting);

        let map = task_map_for_year(&clients, 2026);
        let day = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        assert_eq!(map.get(&day).map(Vec::len), Some(1));
    }

    #[test]
    fn upcoming_excludes_complete_and_sorts_by_due() {
        let mut clients = client_with_task("06/10", false);
        {
            let client = clients.get_mut("c1").unwrap();
            let deliverable = &mut client.meetings[1].deliverables[0];
            let mut early = Task::new("t2", "Earlier");
            early.due = "02/01".to_string();
            deliverable.tasks.push(early);
            let mut done = Task::new("t3", "Done");
            done.due = "01/01".to_string();
            done.complete = true;
            deliverable.tasks.push(done);
        }

        let map = task_map(&clients);
        let upcoming = upcoming_tasks(&map, None);
        assert_eq!(upcoming.len(), 2);
        assert_eq!(upcoming[0].task_name, "Earlier");
        assert_eq!(upcoming[1].task_name, "Draft");
    }

    #[test]
    fn upcoming_assignee_filter_is_case_insensitive_exact() {
        let clients = client_with_task("06/10", false);
        let map = task_map(&clients);

        assert_eq!(upcoming_tasks(&map, Some("pat")).len(), 1);
        assert_eq!(upcoming_tasks(&map, Some("PAT")).len(), 1);
        // Substring is not enough.
        assert_eq!(upcoming_tasks(&map, Some("pa")).len(), 0);
        // Blank filter means no filter.
        assert_eq!(upcoming_tasks(&map, Some("  ")).len(), 1);
    }

    #[test]
    fn buckets_group_in_fixed_order_and_default_unassigned() {
        let mut clients = client_with_task("03/15", false);
        {
            let client = clients.get_mut("c1").unwrap();
            let mut active = Deliverable::new("d2");
            active.name = "Rollout".to_string();
            active.bucket = Bucket::ActiveWork;
            active.tasks.push(Task::new("t9", "Ship"));
            client.meetings[1].deliverables.push(active);
        }

        let grouped = deliverables_by_bucket(&clients, None);
        assert_eq!(grouped.len(), Bucket::ALL.len());
        assert_eq!(grouped[0].0, Bucket::Unassigned);
        assert_eq!(grouped[0].1.len(), 1);
        let active = grouped
            .iter()
            .find(|(b, _)| *b == Bucket::ActiveWork)
            .unwrap();
        assert_eq!(active.1.len(), 1);
        assert_eq!(active.1[0].deliverable_name, "Rollout");
    }

    #[test]
    fn manually_completed_deliverables_are_hidden_from_board() {
        let mut clients = client_with_task("03/15", false);
        clients.get_mut("c1").unwrap().meetings[1].deliverables[0].is_deliverable_complete = true;

        let grouped = deliverables_by_bucket(&clients, None);
        let total: usize = grouped.iter().map(|(_, v)| v.len()).sum();
        assert_eq!(total, 0);
    }

    #[test]
    fn board_tasks_are_the_incomplete_subset() {
        let mut clients = client_with_task("03/15", false);
        {
            let deliverable =
                &mut clients.get_mut("c1").unwrap().meetings[1].deliverables[0];
            let mut done = Task::new("t2", "Done");
            done.complete = true;
            deliverable.tasks.push(done);
        }

        let grouped = deliverables_by_bucket(&clients, None);
        let unassigned = &grouped[0].1;
        assert_eq!(unassigned[0].tasks.len(), 1);
        assert_eq!(unassigned[0].tasks[0].name, "Draft");
    }

    #[test]
    fn board_search_matches_deliverable_or_client_name() {
        let clients = client_with_task("03/15", false);

        let by_deliverable = deliverables_by_bucket(&clients, Some("spe"));
        assert_eq!(by_deliverable[0].1.len(), 1);

        let by_client = deliverables_by_bucket(&clients, Some("ACME"));
        assert_eq!(by_client[0].1.len(), 1);

        let miss = deliverables_by_bucket(&clients, Some("nothing"));
        let total: usize = miss.iter().map(|(_, v)| v.len()).sum();
        assert_eq!(total, 0);
    }

    #[test]
    fn week_dates_spans_monday_to_friday() {
        // 2026-08-27 is a Thursday.
        let anchor = NaiveDate::from_ymd_opt(2026, 8, 27).unwrap();
        let week = week_dates(anchor);
        assert_eq!(week[0], NaiveDate::from_ymd_opt(2026, 8, 24).unwrap());
        assert_eq!(week[4], NaiveDate::from_ymd_opt(2026, 8, 28).unwrap());
    }

    #[test]
    fn format_due_round_trips_through_parse() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        assert_eq!(format_due(date), "03/05");
        assert_eq!(parse_due("03/05", 2026), Some(date));
    }
}
