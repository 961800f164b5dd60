//! Distributed review-job engine.
//!
//! One job reviews one or more pull requests against the rules project, as a
//! three-stage chord on the task broker:
//!
//! 1) **init** — fetch-independent setup on a worker thread: materialise the
//!    worktree (rules project + every reviewed project at the PR base
//!    revision), load the rules manifest, plan one task per (project,
//!    combined-diff, rule), write the TaskInfo bundle and fan out the chord.
//! 2) **review** — N shards, each invoking the external review tool per
//!    task and filtering the findings by rule locality and `once` policy.
//! 3) **wrapup** — merge the shard results, persist residual errors with
//!    their TaskInfo context, destroy the worktree, return the final
//!    [`ProcessedReview`].
//!
//! Diff fetching happens listener-side in [`ReviewRuntime::launch_review`];
//! clients follow the job via [`ReviewRuntime::job_status`] using the init
//! task id alone.

pub mod config;
pub mod errors;
pub mod model;
pub mod paths;
pub mod planner;
pub mod revoke;
pub mod rules;
pub mod stages;
pub mod status;
pub mod worktree;

use std::sync::Arc;

use diff_provider::{Diff, DiffProviderRegistry};
use review_store::ReviewStore;
use task_broker::{Broker, TaskId};
use task_info_store::TaskInfoStore;
use tracing::info;

pub use config::ReviewConfig;
pub use errors::{Error, PipelineResult};
pub use model::{
    DevagentError, DevagentReview, DevagentTask, DevagentViolation, ProcessedReview,
    ReviewPatchResult,
};
pub use status::{JobReport, JobStatus};

/// Process-wide handles of the review engine, initialised once at startup.
pub struct ReviewRuntime {
    pub cfg: ReviewConfig,
    pub broker: Broker,
    pub task_info: TaskInfoStore,
    pub store: ReviewStore,
    pub providers: DiffProviderRegistry,
    handle: tokio::runtime::Handle,
}

impl ReviewRuntime {
    /// Must be called from within a tokio runtime.
    pub fn new(
        cfg: ReviewConfig,
        broker: Broker,
        task_info: TaskInfoStore,
        store: ReviewStore,
        providers: DiffProviderRegistry,
    ) -> Arc<Self> {
        Arc::new(Self {
            cfg,
            broker,
            task_info,
            store,
            providers,
            handle: tokio::runtime::Handle::current(),
        })
    }

    pub fn handle(&self) -> &tokio::runtime::Handle {
        &self.handle
    }

    /// Fetches the diffs for every URL, then starts the job. Returns the
    /// job id (== init task id).
    pub async fn launch_review(self: &Arc<Self>, urls: Vec<String>) -> PipelineResult<TaskId> {
        let diffs = self.providers.get_diffs(&urls).await?;
        self.launch_review_with_diffs(diffs)
    }

    /// Starts the job for already-fetched diffs.
    pub fn launch_review_with_diffs(self: &Arc<Self>, diffs: Vec<Diff>) -> PipelineResult<TaskId> {
        let job_id = Broker::new_task_id();
        info!("[{job_id}] launching review job for {} diffs", diffs.len());

        let runtime = Arc::clone(self);
        let id = job_id.clone();
        self.broker.submit(&job_id, move |token| {
            stages::init::run_init(runtime, id, diffs, token)
        })?;

        Ok(job_id)
    }

    /// Aggregated status of a job (see [`status::job_status`]).
    pub fn job_status(
        &self,
        job_id: &str,
        include_partial: bool,
    ) -> Result<JobReport, errors::StatusError> {
        status::job_status(&self.broker, job_id, include_partial)
    }

    /// Cancels a job across all three stages.
    pub fn revoke_job(&self, job_id: &str) {
        revoke::revoke_job(&self.broker, job_id);
    }
}
