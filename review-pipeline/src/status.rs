//! Status aggregation: walk the chord graph from the job id and synthesise
//! one `{task_status, task_result}` for clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use task_broker::{AsyncResult, Broker};
use tracing::debug;

use crate::errors::StatusError;
use crate::model::ReviewPatchResult;
use crate::stages::wrapup::process_review_result;

/// Ids reachable from the init task's stored result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChordIds {
    pub wrapup_id: String,
    pub review_ids: Vec<String>,
}

/// Client-visible job status with its wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Successful,
    Failed,
    Revoked,
    Pending,
}

impl JobStatus {
    pub fn code(self) -> u8 {
        match self {
            JobStatus::Successful => 1,
            JobStatus::Failed => 2,
            JobStatus::Revoked => 3,
            JobStatus::Pending => 4,
        }
    }
}

/// Aggregated answer for one job.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub task_id: String,
    pub task_status: JobStatus,
    pub task_result: Option<Value>,
}

fn task_view(task: &AsyncResult) -> (JobStatus, Option<Value>) {
    if !task.ready() {
        (JobStatus::Pending, None)
    } else if task.revoked() {
        (JobStatus::Revoked, None)
    } else if task.failed() {
        let message = task
            .result
            .clone()
            .unwrap_or_else(|| Value::String("unknown failure".to_string()));
        (JobStatus::Failed, Some(message))
    } else {
        (JobStatus::Successful, task.result.clone())
    }
}

/// Resolves the job status from the chord graph.
///
/// With `include_partial`, a job whose wrapup is still pending reports the
/// merge of the review shards that already succeeded.
pub fn job_status(
    broker: &Broker,
    job_id: &str,
    include_partial: bool,
) -> Result<JobReport, StatusError> {
    let init = broker.result(job_id);
    let (init_status, init_result) = task_view(&init);

    // Failed, revoked or still-pending init answers for the whole job.
    if init_status != JobStatus::Successful {
        return Ok(JobReport {
            task_id: job_id.to_string(),
            task_status: init_status,
            task_result: init_result,
        });
    }

    let ids: ChordIds = init_result
        .and_then(|v| serde_json::from_value(v).ok())
        .ok_or_else(|| StatusError::MalformedGraph(job_id.to_string()))?;

    let wrapup = broker.result(&ids.wrapup_id);
    let (wrapup_status, wrapup_result) = task_view(&wrapup);

    if wrapup_status != JobStatus::Pending {
        return Ok(JobReport {
            task_id: job_id.to_string(),
            task_status: wrapup_status,
            task_result: wrapup_result,
        });
    }

    if !include_partial {
        return Ok(JobReport {
            task_id: job_id.to_string(),
            task_status: JobStatus::Pending,
            task_result: None,
        });
    }

    // Alternate mode: merge whatever review shards have completed.
    let mut shards: Vec<Vec<ReviewPatchResult>> = Vec::new();
    for review_id in &ids.review_ids {
        let review = broker.result(review_id);
        if !review.successful() {
            continue;
        }
        let Some(value) = review.result else {
            continue;
        };
        let shard = serde_json::from_value(value)
            .map_err(|_| StatusError::MalformedGraph(review_id.clone()))?;
        shards.push(shard);
    }
    debug!(
        "[{job_id}] partial status from {}/{} shards",
        shards.len(),
        ids.review_ids.len()
    );

    let processed =
        process_review_result(shards).map_err(|_| StatusError::MalformedGraph(job_id.to_string()))?;

    Ok(JobReport {
        task_id: job_id.to_string(),
        task_status: JobStatus::Pending,
        task_result: Some(serde_json::json!(processed)),
    })
}
