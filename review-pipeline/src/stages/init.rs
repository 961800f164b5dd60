//! Init stage: materialise the worktree, select rules, plan tasks, record
//! TaskInfo and fan out the review chord.

use std::sync::Arc;

use diff_provider::Diff;
use serde_json::Value;
use task_broker::{Broker, CancelToken, TaskFn, TaskId};
use tracing::{debug, info};

use crate::ReviewRuntime;
use crate::errors::{PipelineResult, WorktreeError};
use crate::model::{ProjectInfo, ReviewPatchResult, extract_project_info};
use crate::planner::{build_task_info, prepare_tasks};
use crate::rules::load_rules;
use crate::stages::review::run_review_shard;
use crate::stages::stage_failure;
use crate::stages::wrapup::run_wrapup;
use crate::status::ChordIds;
use crate::worktree::{clean_workdir, populate_workdir};

/// Init task body. Returns the chord ids as the stored init result.
pub fn run_init(
    runtime: Arc<ReviewRuntime>,
    job_id: String,
    diffs: Vec<Diff>,
    token: CancelToken,
) -> Result<Value, String> {
    init_inner(&runtime, &job_id, diffs, &token)
        .map_err(|e| stage_failure(&job_id, "review_init", e))
}

fn init_inner(
    runtime: &Arc<ReviewRuntime>,
    job_id: &str,
    diffs: Vec<Diff>,
    token: &CancelToken,
) -> PipelineResult<Value> {
    let cfg = &runtime.cfg;

    let wd = tempfile::Builder::new()
        .prefix("devagent_")
        .tempdir()
        .map_err(WorktreeError::Io)?
        .keep();
    info!("[{job_id}] init: worktree at {}", wd.display());

    let result = (|| {
        let mut projects: Vec<ProjectInfo> = Vec::new();
        for diff in &diffs {
            let info = extract_project_info(diff);
            if !projects.iter().any(|p| p.project == info.project) {
                projects.push(info);
            }
        }

        let rules_info = ProjectInfo {
            remote: cfg.rules_remote.clone(),
            project: cfg.rules_project.clone(),
            revision: cfg.rules_revision.clone(),
        };

        populate_workdir(cfg, &wd, &rules_info, &projects)?;
        if token.is_revoked() {
            return Ok(Value::Null);
        }

        let rules = load_rules(&wd, &cfg.rules_project)?;
        let tasks = prepare_tasks(job_id, &wd, &rules, &diffs)?;
        info!("[{job_id}] init: {} rules, {} tasks", rules.len(), tasks.len());

        let task_info =
            build_task_info(job_id, &wd, &cfg.rules_project, &cfg.devagent_root, &tasks)?;
        runtime.task_info.set_task_info(task_info)?;

        if token.is_revoked() {
            return Ok(Value::Null);
        }

        let n_groups = cfg.max_workers;
        let review_ids: Vec<TaskId> = (0..n_groups).map(|_| Broker::new_task_id()).collect();
        let wrapup_id = Broker::new_task_id();

        let headers: Vec<(TaskId, TaskFn)> = review_ids
            .iter()
            .enumerate()
            .map(|(idx, id)| {
                let cfg = cfg.clone();
                let tasks = tasks.clone();
                let job = job_id.to_string();
                let body: TaskFn = Box::new(move |shard_token| {
                    run_review_shard(&cfg, &tasks, idx, n_groups, &shard_token)
                        .map_err(|e| stage_failure(&job, "review_patches", e))
                        .and_then(|results| {
                            serde_json::to_value(results)
                                .map_err(|e| stage_failure(&job, "review_patches", e))
                        })
                });
                (id.clone(), body)
            })
            .collect();

        let rt = Arc::clone(runtime);
        let job = job_id.to_string();
        let wrapup_wd = wd.clone();
        runtime.broker.chord(headers, &wrapup_id, move |_token, collected| {
            let shards: Vec<Vec<ReviewPatchResult>> = collected
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<_, _>>()
                .map_err(|e| stage_failure(&job, "review_wrapup", e))?;

            let processed = run_wrapup(
                rt.handle(),
                &rt.task_info,
                &rt.store,
                &job,
                shards,
                &wrapup_wd,
            )
            .map_err(|e| stage_failure(&job, "review_wrapup", e))?;

            serde_json::to_value(processed).map_err(|e| stage_failure(&job, "review_wrapup", e))
        })?;

        debug!("[{job_id}] init: chord emitted, wrapup {wrapup_id}");
        let ids = ChordIds {
            wrapup_id,
            review_ids,
        };
        Ok(serde_json::json!(ids))
    })();

    // The worktree is wrapup's to clean; if the chord was never emitted
    // nothing will, so clean it here on the failure path.
    if result.is_err() {
        clean_workdir(&wd);
    }
    result
}
