//! Wrapup stage: flatten shard results, split errors from violations,
//! persist residual errors with their TaskInfo context, destroy the
//! worktree.

use std::collections::BTreeMap;
use std::path::Path;

use review_store::{NewError, ReviewStore};
use task_info_store::{TaskInfoStore, schema};
use tracing::{debug, info};

use crate::errors::{PipelineResult, WrapupError};
use crate::model::{DevagentError, ProcessedReview, ReviewPatchResult};
use crate::worktree::clean_workdir;

/// Flattens the per-shard results and groups them by project. Every item
/// must carry exactly one of `error` / `result`.
pub fn process_review_result(
    review: Vec<Vec<ReviewPatchResult>>,
) -> Result<ProcessedReview, WrapupError> {
    let mut errors: BTreeMap<String, Vec<DevagentError>> = BTreeMap::new();
    let mut results = BTreeMap::new();

    for item in review.into_iter().flatten() {
        match (item.error, item.result) {
            (Some(error), None) => {
                errors.entry(item.project).or_default().push(error);
            }
            (None, Some(result)) => {
                results
                    .entry(item.project)
                    .or_insert_with(Vec::new)
                    .extend(result.violations);
            }
            _ => return Err(WrapupError::ResultExclusivity(item.project)),
        }
    }

    Ok(ProcessedReview { errors, results })
}

/// Persists every residual error, resolving revisions and patch
/// content/context from the job's TaskInfo. Patch rows are inserted once.
pub fn store_errors(
    handle: &tokio::runtime::Handle,
    task_info_store: &TaskInfoStore,
    store: &ReviewStore,
    job_id: &str,
    errors: &BTreeMap<String, Vec<DevagentError>>,
) -> PipelineResult<()> {
    if errors.is_empty() {
        return Ok(());
    }

    let task_info = task_info_store
        .get_task_info(job_id)?
        .ok_or_else(|| WrapupError::TaskInfoMissing(job_id.to_string()))?;

    let lookup = |key: &str| {
        task_info
            .get(key)
            .cloned()
            .ok_or_else(|| WrapupError::TaskInfoKeyMissing {
                task_id: job_id.to_string(),
                key: key.to_string(),
            })
    };

    let rules_rev = lookup(schema::RULES_REVISION_KEY)?;
    let devagent_rev = lookup(schema::DEVAGENT_REVISION_KEY)?;

    let mut rows = Vec::new();
    for (project, project_errors) in errors {
        let project_rev = lookup(&schema::project_revision_key(project))?;
        for error in project_errors {
            let patch_name = lookup(&error.rule)?;
            let content = lookup(&schema::patch_content_key(&patch_name))?;
            let context = task_info.get(&schema::patch_context_key(&patch_name));

            handle.block_on(store.insert_patch_if_absent(
                &patch_name,
                &content,
                context.map(String::as_str),
            ))?;

            rows.push(NewError {
                rules_rev: rules_rev.clone(),
                devagent_rev: devagent_rev.clone(),
                project: project.clone(),
                project_rev: project_rev.clone(),
                patch: patch_name,
                rule: error.rule.clone(),
                message: error.message.clone(),
            });
        }
    }

    info!("[{job_id}] persisting {} residual errors", rows.len());
    handle.block_on(store.insert_errors(rows))?;
    Ok(())
}

/// Full wrapup body. Worktree cleanup runs on the failure path too.
pub fn run_wrapup(
    handle: &tokio::runtime::Handle,
    task_info_store: &TaskInfoStore,
    store: &ReviewStore,
    job_id: &str,
    shards: Vec<Vec<ReviewPatchResult>>,
    wd: &Path,
) -> PipelineResult<ProcessedReview> {
    debug!("[{job_id}] wrapup: {} shards", shards.len());

    let outcome = process_review_result(shards)
        .map_err(Into::into)
        .and_then(|processed| {
            store_errors(handle, task_info_store, store, job_id, &processed.errors)?;
            Ok(processed)
        });

    clean_workdir(wd);
    outcome
}
