//! Per-user working copy.
//!
//! One `Session` per open UI session owns the in-memory entity tree for a
//! user: the personal client map plus a view of the shared map. Mutations
//! run through the protocol in `mutation`, the whole modified client is
//! pushed to the store as a full replacement, and the in-memory entry is
//! replaced. There is no conflict detection between sessions — the second
//! writer's full replace wins.
//!
//! Persistence failures on save are logged and surfaced, but the in-memory
//! copy is not rolled back (reference behavior; see DESIGN.md).

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::error::{MutationError, StoreError};
use crate::mutation;
use crate::store::StateStore;
use crate::types::{Client, ClientMap, TaskPath};

/// Default undo window for staged task completion, matching the UI's
/// undo-toast duration.
pub const DEFAULT_UNDO_WINDOW: Duration = Duration::from_secs(4);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error("save failed: {0}")]
    Store(#[from] StoreError),
}

pub struct Session {
    username: String,
    store: Arc<dyn StateStore>,
    clients: Mutex<ClientMap>,
    shared: Mutex<ClientMap>,
    /// Composite task ids optimistically hidden while an undo window runs.
    hidden: Mutex<HashSet<String>>,
    undo_window: Duration,
}

impl Session {
    /// Log in and load the working copy. Clients missing their ad-hoc
    /// sentinel meetings are repaired on load; the repair is persisted so
    /// a second load finds nothing to do.
    pub fn open(
        store: Arc<dyn StateStore>,
        username: &str,
        password: Option<&str>,
    ) -> Result<Self, StoreError> {
        let mut clients = store.authenticate(username, password)?;
        let shared = store.get_shared_state()?;

        let mut repaired = false;
        for client in clients.values_mut() {
            repaired |= client.ensure_ad_hoc_meetings();
        }
        if repaired {
            store.put_user_state(username, &clients)?;
            tracing::info!(user = username, "repaired missing ad-hoc meetings");
        }

        Ok(Self {
            username: username.to_string(),
            store,
            clients: Mutex::new(clients),
            shared: Mutex::new(shared),
            hidden: Mutex::new(HashSet::new()),
            undo_window: DEFAULT_UNDO_WINDOW,
        })
    }

    /// Override the undo window (tests use a paused clock).
    pub fn with_undo_window(mut self, window: Duration) -> Self {
        self.undo_window = window;
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Everything this session can see: shared clients overlaid by the
    /// personal map (personal wins on id collision).
    pub fn combined_clients(&self) -> ClientMap {
        let mut all = self.shared.lock().expect("shared lock").clone();
        for (id, client) in self.clients.lock().expect("clients lock").iter() {
            all.insert(id.clone(), client.clone());
        }
        all
    }

    /// Composite task ids currently hidden by pending undo windows.
    pub fn hidden_tasks(&self) -> HashSet<String> {
        self.hidden.lock().expect("hidden lock").clone()
    }

    /// Run one mutation against the current snapshot and commit the
    /// resulting client.
    pub fn mutate<F>(&self, f: F) -> Result<(), SessionError>
    where
        F: FnOnce(&ClientMap) -> Result<Client, MutationError>,
    {
        let snapshot = self.combined_clients();
        let updated = f(&snapshot)?;
        self.commit(updated)?;
        Ok(())
    }

    /// Replace the in-memory entry for a client and push the full owning
    /// collection to the store. The in-memory copy is updated even when
    /// the save fails.
    pub fn commit(&self, client: Client) -> Result<(), StoreError> {
        let id = client.id.clone();
        let result = if client.shared {
            let snapshot = {
                let mut shared = self.shared.lock().expect("shared lock");
                shared.insert(id.clone(), client);
                shared.clone()
            };
            self.store.put_shared_state(&snapshot)
        } else {
            let snapshot = {
                let mut clients = self.clients.lock().expect("clients lock");
                clients.insert(id.clone(), client);
                clients.clone()
            };
            self.store.put_user_state(&self.username, &snapshot)
        };

        if let Err(ref err) = result {
            tracing::error!(client = %id, error = %err, "save failed; in-memory copy kept");
        }
        result
    }

    /// Create a fresh client owned by this user and persist it.
    pub fn add_client(&self) -> Result<String, StoreError> {
        let id = format!("client-{}", uuid::Uuid::new_v4().simple());
        let client = Client::new(&id, &self.username);
        self.commit(client)?;
        Ok(id)
    }

    /// Immediately and irrecoverably remove a client from the personal map.
    pub fn delete_client(&self, client_id: &str) -> Result<(), StoreError> {
        let snapshot = {
            let mut clients = self.clients.lock().expect("clients lock");
            clients.remove(client_id);
            clients.clone()
        };
        self.store.put_user_state(&self.username, &snapshot)
    }

    /// Copy shared clients into the personal working set.
    pub fn adopt_shared(&self, ids: &[String]) -> Result<(), StoreError> {
        let shared = self.shared.lock().expect("shared lock").clone();
        let snapshot = {
            let mut clients = self.clients.lock().expect("clients lock");
            for id in ids {
                if let Some(client) = shared.get(id) {
                    clients.entry(id.clone()).or_insert_with(|| client.clone());
                }
            }
            clients.clone()
        };
        self.store.put_user_state(&self.username, &snapshot)
    }

    /// Stage a task completion: hide the task from active lists now, arm
    /// the undo window, and only persist the mutation when the window
    /// elapses uncancelled. Cancelling restores the optimistic hide and
    /// issues no store write.
    pub fn stage_task_complete(self: &Arc<Self>, path: TaskPath) -> StagedCompletion {
        let id = path.to_string();
        self.hidden.lock().expect("hidden lock").insert(id.clone());

        let cancelled = Arc::new(AtomicBool::new(false));
        let session = Arc::clone(self);
        let flag = Arc::clone(&cancelled);
        let window = self.undo_window;

        let timer = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            session
                .hidden
                .lock()
                .expect("hidden lock")
                .remove(&path.to_string());
            if flag.load(Ordering::SeqCst) {
                return;
            }
            if let Err(err) =
                session.mutate(|clients| mutation::set_task_complete(clients, &path, true))
            {
                tracing::error!(task = %path, error = %err, "staged completion failed");
            }
        });

        StagedCompletion {
            task_id: id,
            cancelled,
            timer,
        }
    }

    fn unhide(&self, task_id: &str) {
        self.hidden.lock().expect("hidden lock").remove(task_id);
    }
}

/// Handle to a pending staged completion.
pub struct StagedCompletion {
    task_id: String,
    cancelled: Arc<AtomicBool>,
    timer: JoinHandle<()>,
}

impl StagedCompletion {
    /// Cancel within the window: the task reappears, nothing is persisted.
    pub fn undo(&self, session: &Session) {
        self.cancelled.store(true, Ordering::SeqCst);
        session.unhide(&self.task_id);
    }

    /// Wait for the window to resolve (test hook).
    pub async fn finished(self) {
        let _ = self.timer.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileStore, UserSummary};
    use crate::types::{Deliverable, Meeting, Task};
    use std::sync::atomic::AtomicUsize;

    /// Store wrapper that counts writes, so tests can assert "no
    /// persistence call happened".
    struct CountingStore {
        inner: FileStore,
        user_writes: AtomicUsize,
    }

    impl CountingStore {
        fn new(inner: FileStore) -> Self {
            Self {
                inner,
                user_writes: AtomicUsize::new(0),
            }
        }

        fn writes(&self) -> usize {
            self.user_writes.load(Ordering::SeqCst)
        }
    }

    impl StateStore for CountingStore {
        fn get_user_state(&self, u: &str) -> Result<ClientMap, StoreError> {
            self.inner.get_user_state(u)
        }
        fn put_user_state(&self, u: &str, c: &ClientMap) -> Result<(), StoreError> {
            self.user_writes.fetch_add(1, Ordering::SeqCst);
            self.inner.put_user_state(u, c)
        }
        fn get_shared_state(&self) -> Result<ClientMap, StoreError> {
            self.inner.get_shared_state()
        }
        fn put_shared_state(&self, c: &ClientMap) -> Result<(), StoreError> {
            self.inner.put_shared_state(c)
        }
        fn create_user(&self, u: &str, p: Option<&str>) -> Result<(), StoreError> {
            self.inner.create_user(u, p)
        }
        fn authenticate(&self, u: &str, p: Option<&str>) -> Result<ClientMap, StoreError> {
            self.inner.authenticate(u, p)
        }
        fn list_users(&self) -> Result<Vec<UserSummary>, StoreError> {
            self.inner.list_users()
        }
        fn delete_user(&self, u: &str) -> Result<(), StoreError> {
            self.inner.delete_user(u)
        }
        fn set_password(&self, u: &str, p: Option<&str>) -> Result<(), StoreError> {
            self.inner.set_password(u, p)
        }
    }

    fn seeded_store(dir: &tempfile::TempDir) -> Arc<CountingStore> {
        let store = FileStore::open(dir.path()).unwrap();
        store.create_user("alice", None).unwrap();

        let mut task = Task::new("t1", "Draft");
        task.due = "03/15".to_string();
        let mut deliverable = Deliverable::new("d1");
        deliverable.tasks.push(task);
        let mut meeting = Meeting::new("m1");
        meeting.deliverables.push(deliverable);
        let mut client = Client::new("c1", "alice");
        client.name = "Acme".to_string();
        client.meetings.push(meeting);

        let mut clients = ClientMap::new();
        clients.insert("c1".to_string(), client);
        store.put_user_state("alice", &clients).unwrap();

        Arc::new(CountingStore::new(store))
    }

    fn task_path() -> TaskPath {
        TaskPath::new("c1", "m1", "d1", "t1")
    }

    #[tokio::test]
    async fn open_repairs_missing_ad_hoc_meetings_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.create_user("alice", None).unwrap();

        let mut bare = Client::new("c1", "alice");
        bare.meetings.clear();
        bare.past_meetings.clear();
        let mut clients = ClientMap::new();
        clients.insert("c1".to_string(), bare);
        store.put_user_state("alice", &clients).unwrap();

        let store = Arc::new(CountingStore::new(store));
        let session = Session::open(store.clone() as Arc<dyn StateStore>, "alice", None).unwrap();
        let c = &session.combined_clients()["c1"];
        assert_eq!(c.meetings.iter().filter(|m| m.is_ad_hoc).count(), 1);
        assert_eq!(c.past_meetings.iter().filter(|m| m.is_ad_hoc).count(), 1);
        assert_eq!(store.writes(), 1);
        drop(session);

        // Second load finds the invariant already holding: no repair write.
        let session = Session::open(store.clone() as Arc<dyn StateStore>, "alice", None).unwrap();
        let c = &session.combined_clients()["c1"];
        assert_eq!(c.meetings.iter().filter(|m| m.is_ad_hoc).count(), 1);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn mutate_commits_and_replaces_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir);
        let session = Session::open(store.clone() as Arc<dyn StateStore>, "alice", None).unwrap();

        session
            .mutate(|clients| mutation::set_task_due(clients, &task_path(), "04/01"))
            .unwrap();

        // In-memory copy updated.
        let snapshot = session.combined_clients();
        assert_eq!(snapshot["c1"].meetings[1].deliverables[0].tasks[0].due, "04/01");
        // And persisted.
        let on_disk = store.get_user_state("alice").unwrap();
        assert_eq!(on_disk["c1"].meetings[1].deliverables[0].tasks[0].due, "04/01");
    }

    #[tokio::test]
    async fn mutate_surfaces_path_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir);
        let session = Session::open(store.clone() as Arc<dyn StateStore>, "alice", None).unwrap();
        let before = store.writes();

        let err = session
            .mutate(|clients| {
                mutation::set_task_complete(clients, &TaskPath::new("c1", "m1", "d1", "ghost"), true)
            })
            .unwrap_err();
        assert!(matches!(err, SessionError::Mutation(_)));
        assert_eq!(store.writes(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn undo_within_window_means_no_write_and_no_change() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir);
        let session = Arc::new(
            Session::open(store.clone() as Arc<dyn StateStore>, "alice", None)
                .unwrap()
                .with_undo_window(Duration::from_secs(4)),
        );
        let before = store.writes();

        let staged = session.stage_task_complete(task_path());
        assert!(session.hidden_tasks().contains("c1::m1::d1::t1"));

        staged.undo(&session);
        assert!(session.hidden_tasks().is_empty());

        // Let the window elapse; the cancelled timer must do nothing.
        tokio::time::advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;

        let snapshot = session.combined_clients();
        assert!(!snapshot["c1"].meetings[1].deliverables[0].tasks[0].complete);
        assert_eq!(store.writes(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn uncancelled_window_persists_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir);
        let session = Arc::new(
            Session::open(store.clone() as Arc<dyn StateStore>, "alice", None)
                .unwrap()
                .with_undo_window(Duration::from_secs(4)),
        );
        let before = store.writes();

        let staged = session.stage_task_complete(task_path());
        tokio::time::advance(Duration::from_secs(5)).await;
        staged.finished().await;

        assert!(session.hidden_tasks().is_empty());
        let snapshot = session.combined_clients();
        assert!(snapshot["c1"].meetings[1].deliverables[0].tasks[0].complete);
        assert_eq!(store.writes(), before + 1);
    }

    #[tokio::test]
    async fn shared_clients_commit_to_the_shared_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir);
        let session = Session::open(store.clone() as Arc<dyn StateStore>, "alice", None).unwrap();

        let mut client = session.combined_clients()["c1"].clone();
        client.shared = true;
        session.commit(client).unwrap();

        let shared = store.get_shared_state().unwrap();
        assert!(shared.contains_key("c1"));
    }

    #[tokio::test]
    async fn add_and_delete_client_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir);
        let session = Session::open(store.clone() as Arc<dyn StateStore>, "alice", None).unwrap();

        let id = session.add_client().unwrap();
        assert!(session.combined_clients().contains_key(&id));
        assert!(store.get_user_state("alice").unwrap().contains_key(&id));

        session.delete_client(&id).unwrap();
        assert!(!session.combined_clients().contains_key(&id));
        assert!(!store.get_user_state("alice").unwrap().contains_key(&id));
    }
}
