//! Persistence collaborator: one JSON record per user plus a shared record.
//!
//! The contract is deliberately blunt — every write is a full replacement
//! of the whole collection, last write wins, no transactions. `FileStore`
//! is the canonical implementation: `<data_dir>/<username>.json` holding
//! `{ password, clients }` and `<data_dir>/shared.json` holding the shared
//! client map.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::ClientMap;

const SHARED_FILE: &str = "shared.json";

/// One row of the login user list. Never carries the password itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub username: String,
    pub has_password: bool,
}

/// Storage contract the rest of the system depends on. No partial updates,
/// no optimistic-concurrency tokens.
pub trait StateStore: Send + Sync {
    /// Full client map for a user, or `UserNotFound`.
    fn get_user_state(&self, username: &str) -> Result<ClientMap, StoreError>;

    /// Replace a user's entire client map.
    fn put_user_state(&self, username: &str, clients: &ClientMap) -> Result<(), StoreError>;

    /// The shared client map; empty when nothing has been shared yet.
    fn get_shared_state(&self) -> Result<ClientMap, StoreError>;

    /// Replace the entire shared client map.
    fn put_shared_state(&self, clients: &ClientMap) -> Result<(), StoreError>;

    /// Create an account with an optional plaintext password.
    fn create_user(&self, username: &str, password: Option<&str>) -> Result<(), StoreError>;

    /// Plaintext-equality login; an empty/absent stored password matches
    /// only an empty/absent supplied one. Returns the user's client map.
    fn authenticate(&self, username: &str, password: Option<&str>) -> Result<ClientMap, StoreError>;

    fn list_users(&self) -> Result<Vec<UserSummary>, StoreError>;

    fn delete_user(&self, username: &str) -> Result<(), StoreError>;

    fn set_password(&self, username: &str, password: Option<&str>) -> Result<(), StoreError>;
}

/// On-disk record for one user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    clients: ClientMap,
}

/// Flat-file store, one JSON file per user.
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) the data directory.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    fn user_path(&self, username: &str) -> Result<PathBuf, StoreError> {
        validate_username(username)?;
        Ok(self.data_dir.join(format!("{username}.json")))
    }

    fn read_user(&self, username: &str) -> Result<UserRecord, StoreError> {
        let path = self.user_path(username)?;
        if !path.exists() {
            return Err(StoreError::UserNotFound(username.to_string()));
        }
        read_json(&path).map_err(|detail| StoreError::Corrupt {
            user: username.to_string(),
            detail,
        })
    }

    fn write_user(&self, username: &str, record: &UserRecord) -> Result<(), StoreError> {
        let path = self.user_path(username)?;
        write_json(&path, record)?;
        tracing::debug!(user = username, "wrote user state");
        Ok(())
    }
}

impl StateStore for FileStore {
    fn get_user_state(&self, username: &str) -> Result<ClientMap, StoreError> {
        Ok(self.read_user(username)?.clients)
    }

    fn put_user_state(&self, username: &str, clients: &ClientMap) -> Result<(), StoreError> {
        let mut record = self.read_user(username)?;
        record.clients = clients.clone();
        self.write_user(username, &record)
    }

    fn get_shared_state(&self) -> Result<ClientMap, StoreError> {
        let path = self.data_dir.join(SHARED_FILE);
        if !path.exists() {
            return Ok(ClientMap::new());
        }
        read_json(&path).map_err(|detail| StoreError::Corrupt {
            user: "shared".to_string(),
            detail,
        })
    }

    fn put_shared_state(&self, clients: &ClientMap) -> Result<(), StoreError> {
        let path = self.data_dir.join(SHARED_FILE);
        write_json(&path, clients)?;
        tracing::debug!(count = clients.len(), "wrote shared state");
        Ok(())
    }

    fn create_user(&self, username: &str, password: Option<&str>) -> Result<(), StoreError> {
        let path = self.user_path(username)?;
        if path.exists() {
            return Err(StoreError::Conflict(username.to_string()));
        }
        let record = UserRecord {
            password: password.filter(|p| !p.is_empty()).map(str::to_string),
            clients: ClientMap::new(),
        };
        self.write_user(username, &record)?;
        tracing::info!(user = username, "created user");
        Ok(())
    }

    fn authenticate(&self, username: &str, password: Option<&str>) -> Result<ClientMap, StoreError> {
        let record = self.read_user(username)?;

        let stored = record.password.as_deref().unwrap_or("");
        let supplied = password.unwrap_or("");
        let both_empty = stored.is_empty() && supplied.is_empty();
        if !both_empty && stored != supplied {
            return Err(StoreError::InvalidCredentials);
        }

        Ok(record.clients)
    }

    fn list_users(&self) -> Result<Vec<UserSummary>, StoreError> {
        let mut users = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem == "shared" {
                continue;
            }
            let record = self.read_user(stem)?;
            users.push(UserSummary {
                username: stem.to_string(),
                has_password: record.password.as_deref().is_some_and(|p| !p.is_empty()),
            });
        }
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    fn delete_user(&self, username: &str) -> Result<(), StoreError> {
        let path = self.user_path(username)?;
        if !path.exists() {
            return Err(StoreError::UserNotFound(username.to_string()));
        }
        fs::remove_file(&path)?;
        tracing::info!(user = username, "deleted user");
        Ok(())
    }

    fn set_password(&self, username: &str, password: Option<&str>) -> Result<(), StoreError> {
        let mut record = self.read_user(username)?;
        record.password = password.filter(|p| !p.is_empty()).map(str::to_string);
        self.write_user(username, &record)
    }
}

/// Usernames become filenames, so restrict them to a safe charset before
/// touching disk.
fn validate_username(username: &str) -> Result<(), StoreError> {
    let ok = !username.is_empty()
        && username.len() <= 64
        && !username.starts_with('.')
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidUsername(username.to_string()))
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&content).map_err(|e| e.to_string())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content = serde_json::to_string_pretty(value).map_err(|e| StoreError::Corrupt {
        user: path.display().to_string(),
        detail: e.to_string(),
    })?;
    fs::write(path, content)?;
    Ok(())
}
