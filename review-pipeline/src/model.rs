//! Data model of the three-stage engine.

use std::collections::BTreeMap;
use std::path::PathBuf;

use diff_provider::Diff;
use serde::{Deserialize, Serialize};

/// Where a reviewed project comes from and which revision to materialise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub remote: String,
    /// `owner/repo`.
    pub project: String,
    pub revision: String,
}

/// Projects are reviewed at the PR base revision.
pub fn extract_project_info(diff: &Diff) -> ProjectInfo {
    ProjectInfo {
        remote: diff.remote.clone(),
        project: diff.project.clone(),
        revision: diff.summary.base_sha.clone(),
    }
}

/// One external review-tool invocation. Created by the planner, consumed
/// exactly once by a review shard, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevagentTask {
    pub wd: PathBuf,
    /// `owner/repo` the tool runs against.
    pub project: String,
    pub patch_path: PathBuf,
    pub context_path: PathBuf,
    pub rule_path: PathBuf,
    pub rule_dirs: Vec<String>,
    pub rule_skip: Vec<String>,
    pub rule_once: bool,
}

impl DevagentTask {
    /// Canonical rule name: the rule file stem.
    pub fn rule_stem(&self) -> String {
        self.rule_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn patch_name(&self) -> String {
        self.patch_path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Review-tool failure for one (patch, rule) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevagentError {
    pub patch: String,
    pub rule: String,
    pub message: String,
}

/// One reviewer finding. Unknown fields emitted by the tool are preserved
/// in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevagentViolation {
    pub file: String,
    pub line: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    pub rule: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_url: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DevagentReview {
    pub violations: Vec<DevagentViolation>,
}

/// Outcome of one review task: exactly one of `error` / `result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewPatchResult {
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DevagentError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DevagentReview>,
}

impl ReviewPatchResult {
    pub fn from_error(project: String, error: DevagentError) -> Self {
        Self {
            project,
            error: Some(error),
            result: None,
        }
    }

    pub fn from_review(project: String, review: DevagentReview) -> Self {
        Self {
            project,
            error: None,
            result: Some(review),
        }
    }
}

/// Final job output: residual errors and surviving violations per project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedReview {
    pub errors: BTreeMap<String, Vec<DevagentError>>,
    pub results: BTreeMap<String, Vec<DevagentViolation>>,
}
