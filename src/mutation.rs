//! Read-modify-write mutations over the entity tree.
//!
//! Every operation follows one contract: deep-copy the owning client (live
//! projections may still be reading the old tree), resolve the composite
//! path by linear id search through `meetings` then `pastMeetings`, mutate
//! the leaf on the copy, and return the whole new `Client` for
//! full-replacement persistence. A path that does not resolve is returned
//! as `MutationError::PathNotFound` — callers decide whether to ignore it.

use crate::error::MutationError;
use crate::types::{
    Bucket, Client, ClientMap, Deliverable, DeliverablePath, Meeting, Task, TaskPath,
    timestamp_id, SECTOR_OPTIONS, STATUS_OPTIONS, TYPE_OPTIONS,
};

/// Which status badge a cycle operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeKey {
    Sector,
    Status,
    Type,
}

fn client_copy(clients: &ClientMap, id: &str) -> Result<Client, MutationError> {
    clients
        .get(id)
        .cloned()
        .ok_or_else(|| MutationError::ClientNotFound(id.to_string()))
}

fn find_meeting_mut<'a>(client: &'a mut Client, id: &str) -> Option<&'a mut Meeting> {
    client
        .meetings
        .iter_mut()
        .chain(client.past_meetings.iter_mut())
        .find(|m| m.id == id)
}

fn find_deliverable_mut<'a>(
    client: &'a mut Client,
    path: &DeliverablePath,
) -> Option<&'a mut Deliverable> {
    find_meeting_mut(client, &path.meeting)?
        .deliverables
        .iter_mut()
        .find(|d| d.id == path.deliverable)
}

fn find_task_mut<'a>(client: &'a mut Client, path: &TaskPath) -> Option<&'a mut Task> {
    find_deliverable_mut(
        client,
        &DeliverablePath::new(&path.client, &path.meeting, &path.deliverable),
    )?
    .tasks
    .iter_mut()
    .find(|t| t.id == path.task)
}

fn with_task(
    clients: &ClientMap,
    path: &TaskPath,
    edit: impl FnOnce(&mut Task),
) -> Result<Client, MutationError> {
    let mut client = client_copy(clients, &path.client)?;
    let task = find_task_mut(&mut client, path)
        .ok_or_else(|| MutationError::PathNotFound(path.to_string()))?;
    edit(task);
    Ok(client)
}

fn with_deliverable(
    clients: &ClientMap,
    path: &DeliverablePath,
    edit: impl FnOnce(&mut Deliverable),
) -> Result<Client, MutationError> {
    let mut client = client_copy(clients, &path.client)?;
    let deliverable = find_deliverable_mut(&mut client, path)
        .ok_or_else(|| MutationError::PathNotFound(path.to_string()))?;
    edit(deliverable);
    Ok(client)
}

// ---------------------------------------------------------------------------
// Task operations
// ---------------------------------------------------------------------------

pub fn set_task_complete(
    clients: &ClientMap,
    path: &TaskPath,
    complete: bool,
) -> Result<Client, MutationError> {
    with_task(clients, path, |t| t.complete = complete)
}

/// Drag-to-reschedule: the drop target's day converted back to `MM/DD`.
pub fn set_task_due(
    clients: &ClientMap,
    path: &TaskPath,
    due: impl Into<String>,
) -> Result<Client, MutationError> {
    let due = due.into();
    with_task(clients, path, |t| t.due = due)
}

pub fn rename_task(
    clients: &ClientMap,
    path: &TaskPath,
    name: impl Into<String>,
) -> Result<Client, MutationError> {
    let name = name.into();
    with_task(clients, path, |t| t.name = name)
}

pub fn set_task_assignees(
    clients: &ClientMap,
    path: &TaskPath,
    assignees: Vec<String>,
) -> Result<Client, MutationError> {
    with_task(clients, path, |t| {
        t.assignees = assignees;
        t.assignee = None;
    })
}

pub fn delete_task(clients: &ClientMap, path: &TaskPath) -> Result<Client, MutationError> {
    let mut client = client_copy(clients, &path.client)?;
    let deliverable = find_deliverable_mut(
        &mut client,
        &DeliverablePath::new(&path.client, &path.meeting, &path.deliverable),
    )
    .ok_or_else(|| MutationError::PathNotFound(path.to_string()))?;

    let before = deliverable.tasks.len();
    deliverable.tasks.retain(|t| t.id != path.task);
    if deliverable.tasks.len() == before {
        return Err(MutationError::PathNotFound(path.to_string()));
    }
    Ok(client)
}

pub fn add_task(
    clients: &ClientMap,
    path: &DeliverablePath,
    task: Task,
) -> Result<Client, MutationError> {
    with_deliverable(clients, path, |d| d.tasks.push(task))
}

/// Quick-add: drop a task into the first deliverable of the ad-hoc meeting,
/// creating the ad-hoc meeting and a first deliverable when missing.
pub fn quick_add_task(
    clients: &ClientMap,
    client_id: &str,
    name: impl Into<String>,
    assignees: Vec<String>,
    due: impl Into<String>,
) -> Result<Client, MutationError> {
    let mut client = client_copy(clients, client_id)?;
    let ts = timestamp_id();

    if !client.meetings.iter().any(|m| m.is_ad_hoc) {
        client
            .meetings
            .insert(0, Meeting::ad_hoc(crate::types::AD_HOC_ID));
    }
    let ad_hoc = client
        .meetings
        .iter_mut()
        .find(|m| m.is_ad_hoc)
        .ok_or_else(|| MutationError::PathNotFound(format!("{client_id}::adhoc")))?;

    if ad_hoc.deliverables.is_empty() {
        ad_hoc.deliverables.push(Deliverable::new(format!("{ts}-d")));
    }

    let mut task = Task::new(format!("{ts}-t"), name);
    task.assignees = assignees;
    task.due = due.into();
    ad_hoc.deliverables[0].tasks.push(task);

    Ok(client)
}

// ---------------------------------------------------------------------------
// Deliverable operations
// ---------------------------------------------------------------------------

/// Drag-to-rebucket. The bucket arrives already parsed; unrecognized drop
/// target names fail `Bucket::from_str` upstream and never reach here, so
/// the deliverable is left untouched in that case.
pub fn set_deliverable_bucket(
    clients: &ClientMap,
    path: &DeliverablePath,
    bucket: Bucket,
) -> Result<Client, MutationError> {
    with_deliverable(clients, path, |d| d.bucket = bucket)
}

/// Double-click completion on the bucket board. One-way: nothing unsets it.
pub fn mark_deliverable_complete(
    clients: &ClientMap,
    path: &DeliverablePath,
) -> Result<Client, MutationError> {
    with_deliverable(clients, path, |d| d.is_deliverable_complete = true)
}

pub fn rename_deliverable(
    clients: &ClientMap,
    path: &DeliverablePath,
    name: impl Into<String>,
) -> Result<Client, MutationError> {
    let name = name.into();
    with_deliverable(clients, path, |d| d.name = name)
}

pub fn add_deliverable(
    clients: &ClientMap,
    client_id: &str,
    meeting_id: &str,
) -> Result<Client, MutationError> {
    let mut client = client_copy(clients, client_id)?;
    let meeting = find_meeting_mut(&mut client, meeting_id)
        .ok_or_else(|| MutationError::PathNotFound(format!("{client_id}::{meeting_id}")))?;
    meeting.deliverables.push(Deliverable::new(timestamp_id()));
    Ok(client)
}

pub fn delete_deliverable(
    clients: &ClientMap,
    path: &DeliverablePath,
) -> Result<Client, MutationError> {
    let mut client = client_copy(clients, &path.client)?;
    let meeting = find_meeting_mut(&mut client, &path.meeting)
        .ok_or_else(|| MutationError::PathNotFound(path.to_string()))?;

    let before = meeting.deliverables.len();
    meeting.deliverables.retain(|d| d.id != path.deliverable);
    if meeting.deliverables.len() == before {
        return Err(MutationError::PathNotFound(path.to_string()));
    }
    Ok(client)
}

/// Board drag: move a deliverable from one meeting card to another.
pub fn move_deliverable(
    clients: &ClientMap,
    path: &DeliverablePath,
    to_meeting: &str,
) -> Result<Client, MutationError> {
    let mut client = client_copy(clients, &path.client)?;

    let from = find_meeting_mut(&mut client, &path.meeting)
        .ok_or_else(|| MutationError::PathNotFound(path.to_string()))?;
    let idx = from
        .deliverables
        .iter()
        .position(|d| d.id == path.deliverable)
        .ok_or_else(|| MutationError::PathNotFound(path.to_string()))?;
    let deliverable = from.deliverables.remove(idx);

    let to = find_meeting_mut(&mut client, to_meeting)
        .ok_or_else(|| MutationError::PathNotFound(format!("{}::{to_meeting}", path.client)))?;
    to.deliverables.push(deliverable);
    Ok(client)
}

/// Move an ad-hoc deliverable between the current and past sentinel
/// meetings. `to_past` picks the direction.
pub fn move_ad_hoc_deliverable(
    clients: &ClientMap,
    client_id: &str,
    deliverable_id: &str,
    to_past: bool,
) -> Result<Client, MutationError> {
    let mut client = client_copy(clients, client_id)?;
    client.ensure_ad_hoc_meetings();

    let (source, target) = if to_past {
        (&mut client.meetings, &mut client.past_meetings)
    } else {
        (&mut client.past_meetings, &mut client.meetings)
    };

    let from = source
        .iter_mut()
        .find(|m| m.is_ad_hoc)
        .ok_or_else(|| MutationError::PathNotFound(format!("{client_id}::adhoc")))?;
    let idx = from
        .deliverables
        .iter()
        .position(|d| d.id == deliverable_id)
        .ok_or_else(|| {
            MutationError::PathNotFound(format!("{client_id}::adhoc::{deliverable_id}"))
        })?;
    let deliverable = from.deliverables.remove(idx);

    let to = target
        .iter_mut()
        .find(|m| m.is_ad_hoc)
        .ok_or_else(|| MutationError::PathNotFound(format!("{client_id}::adhoc")))?;
    to.deliverables.push(deliverable);
    Ok(client)
}

// ---------------------------------------------------------------------------
// Meeting operations
// ---------------------------------------------------------------------------

/// New non-ad-hoc meeting dated today, appended to `meetings`. Returns the
/// updated client and the generated meeting id.
pub fn add_meeting(clients: &ClientMap, client_id: &str) -> Result<(Client, String), MutationError> {
    let mut client = client_copy(clients, client_id)?;
    let meeting = Meeting::new(timestamp_id());
    let id = meeting.id.clone();
    client.meetings.push(meeting);
    Ok((client, id))
}

pub fn rename_meeting(
    clients: &ClientMap,
    client_id: &str,
    meeting_id: &str,
    name: impl Into<String>,
) -> Result<Client, MutationError> {
    let mut client = client_copy(clients, client_id)?;
    let meeting = find_meeting_mut(&mut client, meeting_id)
        .ok_or_else(|| MutationError::PathNotFound(format!("{client_id}::{meeting_id}")))?;
    meeting.name = name.into();
    Ok(client)
}

/// Remove a meeting from whichever list holds it.
pub fn delete_meeting(
    clients: &ClientMap,
    client_id: &str,
    meeting_id: &str,
) -> Result<Client, MutationError> {
    let mut client = client_copy(clients, client_id)?;
    let before = client.meetings.len() + client.past_meetings.len();
    client.meetings.retain(|m| m.id != meeting_id);
    client.past_meetings.retain(|m| m.id != meeting_id);
    if client.meetings.len() + client.past_meetings.len() == before {
        return Err(MutationError::PathNotFound(format!(
            "{client_id}::{meeting_id}"
        )));
    }
    Ok(client)
}

pub fn move_meeting_to_past(
    clients: &ClientMap,
    client_id: &str,
    meeting_id: &str,
) -> Result<Client, MutationError> {
    let mut client = client_copy(clients, client_id)?;
    let idx = client
        .meetings
        .iter()
        .position(|m| m.id == meeting_id)
        .ok_or_else(|| MutationError::PathNotFound(format!("{client_id}::{meeting_id}")))?;
    let meeting = client.meetings.remove(idx);
    client.past_meetings.push(meeting);
    Ok(client)
}

pub fn move_meeting_to_current(
    clients: &ClientMap,
    client_id: &str,
    meeting_id: &str,
) -> Result<Client, MutationError> {
    let mut client = client_copy(clients, client_id)?;
    let idx = client
        .past_meetings
        .iter()
        .position(|m| m.id == meeting_id)
        .ok_or_else(|| MutationError::PathNotFound(format!("{client_id}::{meeting_id}")))?;
    let meeting = client.past_meetings.remove(idx);
    client.meetings.push(meeting);
    Ok(client)
}

// ---------------------------------------------------------------------------
// Client-level operations
// ---------------------------------------------------------------------------

pub fn rename_client(
    clients: &ClientMap,
    client_id: &str,
    name: impl Into<String>,
) -> Result<Client, MutationError> {
    let mut client = client_copy(clients, client_id)?;
    client.name = name.into();
    Ok(client)
}

pub fn set_client_notes(
    clients: &ClientMap,
    client_id: &str,
    notes: impl Into<String>,
) -> Result<Client, MutationError> {
    let mut client = client_copy(clients, client_id)?;
    client.notes = notes.into();
    Ok(client)
}

pub fn set_client_colors(
    clients: &ClientMap,
    client_id: &str,
    base: impl Into<String>,
    header: impl Into<String>,
    sidebar: impl Into<String>,
) -> Result<Client, MutationError> {
    let mut client = client_copy(clients, client_id)?;
    client.base_color = base.into();
    client.header_color = header.into();
    client.sidebar_color = sidebar.into();
    Ok(client)
}

pub fn add_team_member(
    clients: &ClientMap,
    client_id: &str,
    name: impl Into<String>,
) -> Result<Client, MutationError> {
    let mut client = client_copy(clients, client_id)?;
    client.team.push(name.into());
    Ok(client)
}

pub fn update_team_member(
    clients: &ClientMap,
    client_id: &str,
    index: usize,
    name: impl Into<String>,
) -> Result<Client, MutationError> {
    let mut client = client_copy(clients, client_id)?;
    let slot = client
        .team
        .get_mut(index)
        .ok_or_else(|| MutationError::PathNotFound(format!("{client_id}::team[{index}]")))?;
    *slot = name.into();
    Ok(client)
}

pub fn remove_team_member(
    clients: &ClientMap,
    client_id: &str,
    index: usize,
) -> Result<Client, MutationError> {
    let mut client = client_copy(clients, client_id)?;
    if index >= client.team.len() {
        return Err(MutationError::PathNotFound(format!(
            "{client_id}::team[{index}]"
        )));
    }
    client.team.remove(index);
    Ok(client)
}

/// Advance one status badge, wrapping around its option list.
pub fn cycle_status_badge(
    clients: &ClientMap,
    client_id: &str,
    key: BadgeKey,
) -> Result<Client, MutationError> {
    let mut client = client_copy(clients, client_id)?;
    match key {
        BadgeKey::Sector => {
            client.status.sector = (client.status.sector + 1) % SECTOR_OPTIONS.len() as u32;
        }
        BadgeKey::Status => {
            client.status.status = (client.status.status + 1) % STATUS_OPTIONS.len() as u32;
        }
        BadgeKey::Type => {
            client.status.kind = (client.status.kind + 1) % TYPE_OPTIONS.len() as u32;
        }
    }
    Ok(client)
}
