//! Process-wide state shared across HTTP handlers.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::StoreError;
use crate::store::{FileStore, StateStore};

/// Startup configuration, read once from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
}

impl Config {
    /// `MONA_PORT` wins over `PORT`; `MONA_DATA_DIR` over the home-directory
    /// default. Unparseable values fall back rather than abort.
    pub fn from_env() -> Self {
        let port = env::var("MONA_PORT")
            .or_else(|_| env::var("PORT"))
            .ok()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(3001);

        let data_dir = env::var("MONA_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        Self { port, data_dir }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mona")
        .join("data")
}

/// Shared handler state. Cloning is cheap; the store is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StateStore>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, StoreError> {
        let store = FileStore::open(&config.data_dir)?;
        tracing::info!(dir = %config.data_dir.display(), "opened state store");
        Ok(Self {
            store: Arc::new(store),
            config,
        })
    }

    /// Build state around an existing store (tests inject a tempdir-backed one).
    pub fn with_store(store: Arc<dyn StateStore>, config: Config) -> Self {
        Self { store, config }
    }
}
