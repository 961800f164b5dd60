//! Task planner: changed files → applicable rules → combined diffs →
//! deduplicated patch/context files → `DevagentTask` list, plus the
//! task-info bundle the wrapup stage resolves context from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use diff_provider::Diff;
use patch_analyzer::PatchAnalyzer;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::PlanError;
use crate::model::DevagentTask;
use crate::paths::is_subpath;
use crate::rules::Rule;

pub const PATCHES_DIR: &str = ".patches.d";

/// Emits one task per (diff, applicable rule). Identical combined patch
/// texts within the job share one patch file and one context file.
pub fn prepare_tasks(
    job_id: &str,
    wd: &Path,
    rules: &[Rule],
    diffs: &[Diff],
) -> Result<Vec<DevagentTask>, PlanError> {
    let patches_dir = wd.join(PATCHES_DIR);
    std::fs::create_dir_all(&patches_dir)?;

    let mut emitted: HashMap<String, (PathBuf, PathBuf)> = HashMap::new();
    let mut tasks = Vec::new();

    for diff in diffs {
        let applicable: Vec<&Rule> = rules
            .iter()
            .filter(|rule| rule_applies(rule, diff))
            .collect();
        if applicable.is_empty() {
            debug!("[{job_id}] no rules apply to {}", diff.project);
            continue;
        }

        let combined = diff.combined_patch();
        let digest = sha256_hex(&combined);

        let (patch_path, context_path) = match emitted.get(&digest) {
            Some(pair) => pair.clone(),
            None => {
                let pair = emit_patch(job_id, &patches_dir, emitted.len(), &combined)?;
                emitted.insert(digest, pair.clone());
                pair
            }
        };

        for rule in applicable {
            tasks.push(DevagentTask {
                wd: wd.to_path_buf(),
                project: diff.project.clone(),
                patch_path: patch_path.clone(),
                context_path: context_path.clone(),
                rule_path: rule.path.clone(),
                rule_dirs: rule.dirs.clone(),
                rule_skip: rule.skip.clone(),
                rule_once: rule.once,
            });
        }
    }

    debug!("[{job_id}] planned {} tasks", tasks.len());
    Ok(tasks)
}

/// A rule applies to a diff iff some changed file, read as
/// `<project>/<path>`, lies under one of `rule.dirs` and under none of
/// `rule.skip`.
fn rule_applies(rule: &Rule, diff: &Diff) -> bool {
    diff.files.iter().any(|file| {
        let full = format!("{}/{}", diff.project, file.path);
        rule.skip.iter().all(|dir| !is_subpath(dir, &full))
            && rule.dirs.iter().any(|dir| is_subpath(dir, &full))
    })
}

/// Writes the patch and its analyzer context beside it.
fn emit_patch(
    job_id: &str,
    patches_dir: &Path,
    ordinal: usize,
    combined: &str,
) -> Result<(PathBuf, PathBuf), PlanError> {
    let patch_path = patches_dir.join(format!("patch_{job_id}_{ordinal}"));
    std::fs::write(&patch_path, combined)?;

    let context = PatchAnalyzer::parse(combined)?.review_context();
    let context_path = patches_dir.join(format!("patch_{job_id}_{ordinal}.context"));
    std::fs::write(&context_path, context)?;

    Ok((patch_path, context_path))
}

fn sha256_hex(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Assembles the task-info bundle: revisions of the rules project, the
/// review tool and every reviewed project, plus every unique patch's
/// content and context and the rule → patch bindings.
pub fn build_task_info(
    job_id: &str,
    wd: &Path,
    rules_project: &str,
    devagent_root: &str,
    tasks: &[DevagentTask],
) -> Result<HashMap<String, String>, PlanError> {
    use task_info_store::schema;

    let mut info = HashMap::new();
    info.insert(schema::TASK_ID_KEY.to_string(), job_id.to_string());

    info.insert(
        schema::RULES_REVISION_KEY.to_string(),
        services::git::head_revision(&wd.join(rules_project))?,
    );
    // The review tool may live on PATH without a git checkout; record an
    // empty revision then.
    info.insert(
        schema::DEVAGENT_REVISION_KEY.to_string(),
        services::git::head_revision(Path::new(devagent_root)).unwrap_or_default(),
    );

    let mut unique_patches: HashMap<String, &DevagentTask> = HashMap::new();
    let mut unique_projects: Vec<&str> = Vec::new();

    for task in tasks {
        if !unique_projects.contains(&task.project.as_str()) {
            unique_projects.push(&task.project);
        }
        unique_patches.entry(task.patch_name()).or_insert(task);
        info.insert(task.rule_stem(), task.patch_name());
    }

    for (patch_name, task) in &unique_patches {
        info.insert(
            schema::patch_content_key(patch_name),
            std::fs::read_to_string(&task.patch_path)?,
        );
        info.insert(
            schema::patch_context_key(patch_name),
            std::fs::read_to_string(&task.context_path)?,
        );
    }

    for project in unique_projects {
        info.insert(
            schema::project_revision_key(project),
            services::git::head_revision(&wd.join(project))?,
        );
    }

    Ok(info)
}
