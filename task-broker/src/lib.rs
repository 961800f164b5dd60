//! Durable in-process task graph.
//!
//! Each logical review job is a *chord*: one init task, N parallel review
//! tasks and one wrapup task fired when every review task reaches a terminal
//! state. Task bodies are plain blocking closures executed on the tokio
//! blocking pool; results are `serde_json::Value`s kept in the task table
//! for `result_ttl` past completion so clients can poll them.
//!
//! States: `Pending → Started → {Success | Failure}`, or `Revoked` from any
//! non-terminal state. Revocation flips a cancel flag the task body is
//! expected to check between units of work and aborts the supervising
//! future; a revoked task keeps the `Revoked` state even if its body runs
//! to completion.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

pub type TaskId = String;
pub type BrokerResult<T> = Result<T, BrokerError>;

/// A task body: runs on a blocking thread, gets a cancel token, returns the
/// task result or a formatted failure message.
pub type TaskFn = Box<dyn FnOnce(CancelToken) -> Result<Value, String> + Send + 'static>;

/// Default retention of terminal task entries.
pub const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Debug, Error)]
pub enum BrokerError {
    /// Too many live tasks; the caller should retry later.
    #[error("broker is busy: {0} live tasks")]
    Busy(usize),

    #[error("task {0} is already registered")]
    Duplicate(TaskId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Started,
    Success,
    Failure,
    Revoked,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Success | TaskState::Failure | TaskState::Revoked
        )
    }
}

/// Cooperative cancellation flag handed to every task body.
#[derive(Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, unrevoked token — for running a stage body outside the broker.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn is_revoked(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of one task, in the shape status polling needs.
#[derive(Debug, Clone)]
pub struct AsyncResult {
    pub id: TaskId,
    pub state: TaskState,
    pub result: Option<Value>,
}

impl AsyncResult {
    pub fn ready(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn successful(&self) -> bool {
        self.state == TaskState::Success
    }

    pub fn failed(&self) -> bool {
        self.state == TaskState::Failure
    }

    pub fn revoked(&self) -> bool {
        self.state == TaskState::Revoked
    }
}

struct TaskEntry {
    state: TaskState,
    result: Option<Value>,
    cancel: Arc<AtomicBool>,
    done_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
    finished_at: Option<Instant>,
}

impl TaskEntry {
    fn new() -> Self {
        let (done_tx, _) = watch::channel(false);
        Self {
            state: TaskState::Pending,
            result: None,
            cancel: Arc::new(AtomicBool::new(false)),
            done_tx,
            handle: None,
            finished_at: None,
        }
    }
}

struct BrokerInner {
    tasks: DashMap<TaskId, TaskEntry>,
    runtime: tokio::runtime::Handle,
    result_ttl: Duration,
    capacity: usize,
}

/// Handle to the task table; cheap to clone, shared across the listener and
/// every stage closure.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

impl Broker {
    /// Must be called from within a tokio runtime.
    pub fn new(result_ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                tasks: DashMap::new(),
                runtime: tokio::runtime::Handle::current(),
                result_ttl,
                capacity,
            }),
        }
    }

    pub fn new_task_id() -> TaskId {
        Uuid::new_v4().to_string()
    }

    /// Registers and starts a single task.
    pub fn submit(
        &self,
        id: &TaskId,
        f: impl FnOnce(CancelToken) -> Result<Value, String> + Send + 'static,
    ) -> BrokerResult<()> {
        self.inner.purge_expired();
        self.inner.check_capacity(1)?;
        self.inner.register(id)?;
        self.inner.start(id.clone(), Box::new(f));
        Ok(())
    }

    /// Registers N parallel header tasks plus a tail task, starts the
    /// headers, and fires the tail once every header is terminal. The tail
    /// receives the results of the *successful* headers in header order;
    /// failed or revoked headers contribute nothing.
    pub fn chord(
        &self,
        headers: Vec<(TaskId, TaskFn)>,
        tail_id: &TaskId,
        tail: impl FnOnce(CancelToken, Vec<Value>) -> Result<Value, String> + Send + 'static,
    ) -> BrokerResult<()> {
        self.inner.purge_expired();
        self.inner.check_capacity(headers.len() + 1)?;

        let header_ids: Vec<TaskId> = headers.iter().map(|(id, _)| id.clone()).collect();
        for id in header_ids.iter().chain([tail_id]) {
            self.inner.register(id)?;
        }

        for (id, f) in headers {
            self.inner.start(id, f);
        }

        let inner = Arc::clone(&self.inner);
        let tail_id = tail_id.clone();
        self.inner.runtime.spawn(async move {
            let mut collected = Vec::new();
            for id in &header_ids {
                if let Some(mut rx) = inner.done_rx(id) {
                    while !*rx.borrow() {
                        if rx.changed().await.is_err() {
                            break;
                        }
                    }
                }
                if let Some(value) = inner.success_result(id) {
                    collected.push(value);
                }
            }
            debug!(
                "[{tail_id}] chord complete: {}/{} successful headers",
                collected.len(),
                header_ids.len()
            );
            inner.start(tail_id, Box::new(move |token| tail(token, collected)));
        });

        Ok(())
    }

    /// Snapshot of a task. Unknown (or already purged) ids read as Pending.
    pub fn result(&self, id: &str) -> AsyncResult {
        self.inner.purge_expired();
        match self.inner.tasks.get(id) {
            Some(entry) => AsyncResult {
                id: id.to_string(),
                state: entry.state,
                result: entry.result.clone(),
            },
            None => AsyncResult {
                id: id.to_string(),
                state: TaskState::Pending,
                result: None,
            },
        }
    }

    /// Marks a task revoked. No-op for terminal or unknown tasks.
    pub fn revoke(&self, id: &str, terminate: bool) {
        let Some(mut entry) = self.inner.tasks.get_mut(id) else {
            return;
        };
        if entry.state.is_terminal() {
            return;
        }

        warn!("[{id}] revoking task (terminate={terminate})");
        entry.state = TaskState::Revoked;
        entry.finished_at = Some(Instant::now());
        entry.cancel.store(true, Ordering::SeqCst);
        // send_replace stores the flag even when nobody subscribed yet.
        entry.done_tx.send_replace(true);
        if terminate {
            if let Some(handle) = entry.handle.take() {
                handle.abort();
            }
        }
    }
}

impl BrokerInner {
    fn register(&self, id: &TaskId) -> BrokerResult<()> {
        if self.tasks.contains_key(id) {
            return Err(BrokerError::Duplicate(id.clone()));
        }
        self.tasks.insert(id.clone(), TaskEntry::new());
        Ok(())
    }

    fn start(self: &Arc<Self>, id: TaskId, f: TaskFn) {
        let cancel = match self.tasks.get(&id) {
            Some(entry) => Arc::clone(&entry.cancel),
            None => return,
        };

        let inner = Arc::clone(self);
        let task_id = id.clone();
        let handle = self.runtime.spawn(async move {
            if !inner.transition_started(&task_id) {
                return;
            }
            let token = CancelToken(cancel);
            let joined = tokio::task::spawn_blocking(move || f(token)).await;
            match joined {
                Ok(Ok(value)) => inner.finish(&task_id, TaskState::Success, Some(value)),
                Ok(Err(message)) => {
                    inner.finish(&task_id, TaskState::Failure, Some(Value::String(message)))
                }
                Err(join_error) => inner.finish(
                    &task_id,
                    TaskState::Failure,
                    Some(Value::String(format!("task aborted: {join_error}"))),
                ),
            }
        });

        if let Some(mut entry) = self.tasks.get_mut(&id) {
            if entry.state.is_terminal() {
                handle.abort();
            } else {
                entry.handle = Some(handle);
            }
        }
    }

    fn transition_started(&self, id: &str) -> bool {
        match self.tasks.get_mut(id) {
            Some(mut entry) if entry.state == TaskState::Pending => {
                entry.state = TaskState::Started;
                true
            }
            _ => false,
        }
    }

    fn finish(&self, id: &str, state: TaskState, result: Option<Value>) {
        if let Some(mut entry) = self.tasks.get_mut(id) {
            // A revoked task stays revoked even if its body ran through.
            if entry.state != TaskState::Started {
                return;
            }
            entry.state = state;
            entry.result = result;
            entry.finished_at = Some(Instant::now());
            entry.done_tx.send_replace(true);
        }
    }

    fn done_rx(&self, id: &str) -> Option<watch::Receiver<bool>> {
        self.tasks.get(id).map(|entry| entry.done_tx.subscribe())
    }

    fn success_result(&self, id: &str) -> Option<Value> {
        self.tasks.get(id).and_then(|entry| {
            (entry.state == TaskState::Success)
                .then(|| entry.result.clone())
                .flatten()
        })
    }

    fn check_capacity(&self, incoming: usize) -> BrokerResult<()> {
        let live = self
            .tasks
            .iter()
            .filter(|entry| !entry.state.is_terminal())
            .count();
        if live + incoming > self.capacity {
            return Err(BrokerError::Busy(live));
        }
        Ok(())
    }

    fn purge_expired(&self) {
        let ttl = self.result_ttl;
        self.tasks.retain(|_, entry| {
            !entry
                .finished_at
                .is_some_and(|finished| finished.elapsed() > ttl)
        });
    }
}
