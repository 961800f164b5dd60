//! Review stage: one shard claims its slice of the task list, invokes the
//! external review tool per task and filters the findings.

use std::process::Command;

use tracing::{debug, info};

use crate::config::ReviewConfig;
use crate::errors::ReviewError;
use crate::model::{DevagentError, DevagentReview, DevagentTask, ReviewPatchResult};
use crate::paths::is_subpath;
use task_broker::CancelToken;

/// Slice of `[0, n_tasks)` owned by shard `group_idx` of `group_size`.
/// The first `n mod k` shards take one extra task. Panics on an invalid
/// shard index — that is a caller bug, not an input error.
pub fn worker_get_range(n_tasks: usize, group_idx: usize, group_size: usize) -> (usize, usize) {
    assert!(group_size > 0, "Invalid group size");
    assert!(group_idx < group_size, "Invalid group index");

    let per_worker = n_tasks / group_size;
    let residue = n_tasks % group_size;

    let start = group_idx * per_worker + group_idx.min(residue);
    let end = start + per_worker + usize::from(group_idx < residue);

    (start, end)
}

/// Runs every task of the shard; stops early when the job is revoked.
pub fn run_review_shard(
    cfg: &ReviewConfig,
    tasks: &[DevagentTask],
    group_idx: usize,
    group_size: usize,
    token: &CancelToken,
) -> Result<Vec<ReviewPatchResult>, ReviewError> {
    let (start, end) = worker_get_range(tasks.len(), group_idx, group_size);
    debug!(
        "shard {group_idx}/{group_size} claims tasks [{start}, {end}) of {}",
        tasks.len()
    );

    let mut results = Vec::with_capacity(end - start);
    for task in &tasks[start..end] {
        if token.is_revoked() {
            break;
        }
        let reviewed = review_patch(cfg, task)?;
        results.push(filter_violations(reviewed, task));
    }
    Ok(results)
}

/// Invokes the external review tool for one task and normalises its output.
///
/// Tool contract: stderr containing `"Error"` means tool-level failure;
/// otherwise stdout is the JSON review. The canonical rule name and URL
/// overwrite whatever the tool emitted.
pub fn review_patch(
    cfg: &ReviewConfig,
    task: &DevagentTask,
) -> Result<ReviewPatchResult, ReviewError> {
    let project_root = task.wd.join(&task.project);
    let rule = task.rule_stem();

    info!(
        "running {} for rule {rule} in {}",
        cfg.devagent_bin,
        project_root.display()
    );

    let output = Command::new(&cfg.devagent_bin)
        .arg("--context")
        .arg(&task.context_path)
        .arg("review")
        .arg("--json")
        .arg("--rule")
        .arg(&task.rule_path)
        .arg(&task.patch_path)
        .current_dir(&project_root)
        .output()
        .map_err(ReviewError::Spawn)?;

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !stderr.is_empty() && stderr.contains("Error") {
        return Ok(ReviewPatchResult::from_error(
            task.project.clone(),
            DevagentError {
                message: stderr,
                patch: task.patch_name(),
                rule,
            },
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if stdout.is_empty() {
        return Err(ReviewError::EmptyStdout { stderr });
    }

    let mut review: DevagentReview = serde_json::from_str(&stdout)?;

    // The tool is known to hallucinate rule names; the canonical name wins.
    for violation in &mut review.violations {
        violation.rule = rule.clone();
        violation.rule_url = Some(cfg.rule_web_url(&rule));
    }

    Ok(ReviewPatchResult::from_review(task.project.clone(), review))
}

/// Drops violations outside the rule's locality and applies the `once`
/// policy.
pub fn filter_violations(res: ReviewPatchResult, task: &DevagentTask) -> ReviewPatchResult {
    let Some(review) = res.result else {
        return res;
    };

    let mut kept: Vec<_> = review
        .violations
        .into_iter()
        .filter(|v| violation_applies(v, task))
        .collect();

    if task.rule_once && kept.len() > 1 {
        kept.truncate(1);
    }

    ReviewPatchResult {
        project: res.project,
        error: res.error,
        result: Some(DevagentReview { violations: kept }),
    }
}

fn violation_applies(violation: &crate::model::DevagentViolation, task: &DevagentTask) -> bool {
    if !task
        .rule_path
        .to_string_lossy()
        .contains(violation.rule.as_str())
    {
        return false;
    }

    let full = format!("{}/{}", task.project, violation.file);
    if task.rule_skip.iter().any(|dir| is_subpath(dir, &full)) {
        return false;
    }
    task.rule_dirs.iter().any(|dir| is_subpath(dir, &full))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DevagentViolation;
    use std::path::{Path, PathBuf};

    #[test]
    fn ranges_partition_the_task_list() {
        for n in 0..25 {
            for k in 1..8 {
                let mut covered = Vec::new();
                let mut prev_end = 0;
                for idx in 0..k {
                    let (start, end) = worker_get_range(n, idx, k);
                    assert_eq!(start, prev_end);
                    assert!(end >= start);
                    covered.extend(start..end);
                    prev_end = end;
                }
                assert_eq!(covered, (0..n).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn residue_spreads_over_first_shards() {
        assert_eq!(worker_get_range(10, 0, 4), (0, 3));
        assert_eq!(worker_get_range(10, 1, 4), (3, 6));
        assert_eq!(worker_get_range(10, 2, 4), (6, 8));
        assert_eq!(worker_get_range(10, 3, 4), (8, 10));
    }

    #[test]
    #[should_panic(expected = "Invalid group index")]
    fn out_of_range_shard_index_panics() {
        worker_get_range(10, 4, 4);
    }

    #[test]
    #[should_panic(expected = "Invalid group size")]
    fn zero_group_size_panics() {
        worker_get_range(10, 0, 0);
    }

    fn task(dirs: &[&str], skip: &[&str], once: bool) -> DevagentTask {
        DevagentTask {
            wd: PathBuf::from("/wd"),
            project: "p2".to_string(),
            patch_path: PathBuf::from("/wd/.patches.d/patch_j_0"),
            context_path: PathBuf::from("/wd/.patches.d/patch_j_0.context"),
            rule_path: PathBuf::from("/wd/rules/REVIEW_RULES/rule1.md"),
            rule_dirs: dirs.iter().map(|s| s.to_string()).collect(),
            rule_skip: skip.iter().map(|s| s.to_string()).collect(),
            rule_once: once,
        }
    }

    fn violation(file: &str, rule: &str) -> DevagentViolation {
        DevagentViolation {
            file: file.to_string(),
            line: 1,
            severity: None,
            rule: rule.to_string(),
            rule_url: None,
            message: "m".to_string(),
            change_type: None,
            code_snippet: None,
            extra: serde_json::Map::new(),
        }
    }

    fn review_of(violations: Vec<DevagentViolation>) -> ReviewPatchResult {
        ReviewPatchResult::from_review("p2".to_string(), DevagentReview { violations })
    }

    #[test]
    fn skip_dirs_drop_violations() {
        let task = task(&["p2/dir3"], &["p2/dir3/dir"], false);
        let res = review_of(vec![
            violation("dir3/file1", "rule1"),
            violation("dir3/dir/file", "rule1"),
            violation("dir3/dir_file", "rule1"),
        ]);

        let filtered = filter_violations(res, &task);
        let files: Vec<_> = filtered
            .result
            .unwrap()
            .violations
            .into_iter()
            .map(|v| v.file)
            .collect();
        assert_eq!(files, vec!["dir3/file1", "dir3/dir_file"]);
    }

    #[test]
    fn once_policy_keeps_first_survivor() {
        let task = task(&["p2/dir1"], &[], true);
        let res = review_of(vec![
            violation("dir1/a", "rule1"),
            violation("dir1/b", "rule1"),
            violation("dir1/c", "rule1"),
        ]);

        let filtered = filter_violations(res, &task);
        let violations = filtered.result.unwrap().violations;
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].file, "dir1/a");
    }

    #[test]
    fn hallucinated_rule_name_is_dropped() {
        let task = task(&["p2/dir1"], &[], false);
        let res = review_of(vec![violation("dir1/a", "rule9")]);
        let filtered = filter_violations(res, &task);
        assert!(filtered.result.unwrap().violations.is_empty());
    }

    #[test]
    fn error_results_pass_through_untouched() {
        let task = task(&["p2/dir1"], &[], true);
        let res = ReviewPatchResult::from_error(
            "p2".to_string(),
            DevagentError {
                patch: "patch_j_0".to_string(),
                rule: "rule1".to_string(),
                message: "Error: tool exploded".to_string(),
            },
        );
        let filtered = filter_violations(res.clone(), &task);
        assert_eq!(filtered, res);
    }

    // Exercises the subprocess contract end to end with a stub tool.
    #[cfg(unix)]
    mod subprocess {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn write_stub(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("devagent");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            let mut perms = std::fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
            path
        }

        fn stub_task(wd: &Path) -> DevagentTask {
            let project_root = wd.join("p2");
            std::fs::create_dir_all(&project_root).unwrap();
            let patches = wd.join(".patches.d");
            std::fs::create_dir_all(&patches).unwrap();
            std::fs::write(patches.join("patch_j_0"), "patch").unwrap();
            std::fs::write(patches.join("patch_j_0.context"), "ctx").unwrap();
            let rules_dir = wd.join("rules/REVIEW_RULES");
            std::fs::create_dir_all(&rules_dir).unwrap();
            std::fs::write(rules_dir.join("rule1.md"), "# body").unwrap();

            DevagentTask {
                wd: wd.to_path_buf(),
                project: "p2".to_string(),
                patch_path: patches.join("patch_j_0"),
                context_path: patches.join("patch_j_0.context"),
                rule_path: rules_dir.join("rule1.md"),
                rule_dirs: vec!["p2/dir1".to_string()],
                rule_skip: vec![],
                rule_once: false,
            }
        }

        fn stub_config(bin: &Path) -> ReviewConfig {
            let mut cfg = ReviewConfig::from_env();
            cfg.devagent_bin = bin.to_string_lossy().into_owned();
            cfg
        }

        #[test]
        fn canonical_rule_name_overrides_tool_output() {
            let wd = tempfile::tempdir().unwrap();
            let stub = write_stub(
                wd.path(),
                r#"echo '{"violations":[{"rule":"rule7","file":"dir1/file1","line":1,"message":"m"}]}'"#,
            );
            let task = stub_task(wd.path());

            let res = review_patch(&stub_config(&stub), &task).unwrap();
            let review = res.result.unwrap();
            assert_eq!(review.violations.len(), 1);
            assert_eq!(review.violations[0].rule, "rule1");
            assert!(
                review.violations[0]
                    .rule_url
                    .as_deref()
                    .unwrap()
                    .contains("REVIEW_RULES/rule1.md")
            );
        }

        #[test]
        fn stderr_with_error_marker_becomes_error_result() {
            let wd = tempfile::tempdir().unwrap();
            let stub = write_stub(wd.path(), r#"echo "Error: no api key" >&2"#);
            let task = stub_task(wd.path());

            let res = review_patch(&stub_config(&stub), &task).unwrap();
            let error = res.error.unwrap();
            assert!(error.message.contains("Error: no api key"));
            assert_eq!(error.patch, "patch_j_0");
            assert_eq!(error.rule, "rule1");
            assert!(res.result.is_none());
        }

        #[test]
        fn empty_stdout_is_a_failure() {
            let wd = tempfile::tempdir().unwrap();
            let stub = write_stub(wd.path(), "true");
            let task = stub_task(wd.path());

            let res = review_patch(&stub_config(&stub), &task);
            assert!(matches!(res, Err(ReviewError::EmptyStdout { .. })));
        }

        #[test]
        fn garbage_stdout_is_a_parse_failure() {
            let wd = tempfile::tempdir().unwrap();
            let stub = write_stub(wd.path(), "echo not-json");
            let task = stub_task(wd.path());

            let res = review_patch(&stub_config(&stub), &task);
            assert!(matches!(res, Err(ReviewError::Parse(_))));
        }

        #[test]
        fn shard_runs_and_filters_its_slice() {
            let wd = tempfile::tempdir().unwrap();
            let stub = write_stub(
                wd.path(),
                r#"echo '{"violations":[{"rule":"x","file":"dir1/a","line":1,"message":"m"},{"rule":"x","file":"outside/b","line":2,"message":"m"}]}'"#,
            );
            let task = stub_task(wd.path());
            let tasks = vec![task.clone(), task];

            let token = CancelToken::new();
            let results = run_review_shard(&stub_config(&stub), &tasks, 0, 1, &token).unwrap();
            assert_eq!(results.len(), 2);
            for res in results {
                let violations = res.result.unwrap().violations;
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].file, "dir1/a");
            }
        }
    }
}
