//! Ephemeral per-job metadata store.
//!
//! Holds everything the wrapup stage (and later feedback ingestion) needs
//! after the worktree is gone: revisions, patch contents, patch contexts and
//! rule → patch bindings. Entries live behind a TTL (12 h by default) and
//! are validated against the key grammar both on write and on read.

pub mod schema;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("task info is empty")]
    Empty,

    #[error("task info is missing required key `{0}`")]
    MissingKey(&'static str),

    #[error("invalid task info key `{0}`")]
    InvalidKey(String),

    #[error("rule binding `{rule}` references unknown patch `{patch}`")]
    UnknownPatch { rule: String, patch: String },
}

/// Default task-info lifetime.
pub const DEFAULT_TASK_INFO_TTL: Duration = Duration::from_secs(12 * 60 * 60);

struct Entry {
    deadline: Instant,
    fields: HashMap<String, String>,
}

/// Per-job field hash with expiry, keyed by the job (init task) id.
pub struct TaskInfoStore {
    entries: DashMap<String, Entry>,
    ttl: Duration,
}

impl TaskInfoStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Validates and writes a bundle atomically under its `task_id` key.
    pub fn set_task_info(&self, info: HashMap<String, String>) -> StoreResult<()> {
        schema::validate(&info)?;

        // validate() guarantees the key is present.
        let task_id = info[schema::TASK_ID_KEY].clone();
        debug!("[{task_id}] storing task info ({} fields)", info.len());

        self.entries.insert(
            task_id,
            Entry {
                deadline: Instant::now() + self.ttl,
                fields: info,
            },
        );
        Ok(())
    }

    /// Returns the bundle for `task_id`, or `None` when absent or expired.
    pub fn get_task_info(&self, task_id: &str) -> StoreResult<Option<HashMap<String, String>>> {
        self.entries
            .remove_if(task_id, |_, entry| entry.deadline <= Instant::now());

        let Some(entry) = self.entries.get(task_id) else {
            return Ok(None);
        };
        let fields = entry.fields.clone();
        drop(entry);

        schema::validate(&fields)?;
        Ok(Some(fields))
    }
}

/// Small TTL'd string map; the listener uses it to remember the job started
/// for a given payload so a re-run can revoke the previous one.
pub struct TtlMap {
    entries: DashMap<String, (Instant, String)>,
}

impl TtlMap {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        self.entries
            .insert(key.into(), (Instant::now() + ttl, value.into()));
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .remove_if(key, |_, (deadline, _)| *deadline <= Instant::now());
        self.entries.get(key).map(|entry| entry.1.clone())
    }
}

impl Default for TtlMap {
    fn default() -> Self {
        Self::new()
    }
}
