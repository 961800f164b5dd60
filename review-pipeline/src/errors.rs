//! Crate-wide error hierarchy for the review pipeline.
//!
//! Single root `Error` for the public surface; per-stage sub-enums with
//! `From` impls for `?` ergonomics. Stage bodies wrap the root error with
//! the stage name before handing it to the broker as the task failure.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, Error>;

/// Root error type for the review-pipeline crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Diff fetch failure (listener side).
    #[error(transparent)]
    Provider(#[from] diff_provider::ProviderError),

    /// Rules project or manifest problems.
    #[error(transparent)]
    Rules(#[from] RuleError),

    /// Worktree population / cleanup failure.
    #[error(transparent)]
    Worktree(#[from] WorktreeError),

    /// Task planning failure (patch emission, context derivation).
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// External review tool invocation failure.
    #[error(transparent)]
    Review(#[from] ReviewError),

    /// Result aggregation / persistence failure.
    #[error(transparent)]
    Wrapup(#[from] WrapupError),

    /// Task graph navigation failure.
    #[error(transparent)]
    Status(#[from] StatusError),

    /// Broker rejected an enqueue (busy, duplicate id).
    #[error(transparent)]
    Broker(#[from] task_broker::BrokerError),

    /// Task-info write or read failure.
    #[error(transparent)]
    TaskInfo(#[from] task_info_store::StoreError),

    /// Relational store failure.
    #[error(transparent)]
    Db(#[from] review_store::DbError),
}

/// Rules manifest validation errors.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("No project root {0} was found")]
    ProjectMissing(String),

    #[error("No config file {0} was found")]
    ConfigMissing(String),

    #[error("No rules folder {0} was found")]
    FolderMissing(String),

    #[error("Loaded rules have duplicates: {0}")]
    Duplicate(String),

    #[error("Rule does not exist: {0}")]
    RuleMissing(String),

    #[error("rule entry has an empty name")]
    EmptyName,

    #[error("rule {0} has no dirs")]
    NoDirs(String),

    #[error("rules manifest is not valid json: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("io error reading rules manifest: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum WorktreeError {
    #[error(transparent)]
    Git(#[from] services::GitError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to analyze patch: {0}")]
    Analyze(#[from] patch_analyzer::AnalyzerError),

    #[error(transparent)]
    Git(#[from] services::GitError),
}

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("failed to spawn review tool: {0}")]
    Spawn(std::io::Error),

    #[error("review tool returned empty stdout (stderr: {stderr:?})")]
    EmptyStdout { stderr: String },

    #[error("review tool output is not valid json: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum WrapupError {
    #[error("`error` and `result` are mutually exclusive; got both or neither for project {0}")]
    ResultExclusivity(String),

    #[error("task info for task {0} expired or never existed")]
    TaskInfoMissing(String),

    #[error("task info for task {task_id} is missing key `{key}`")]
    TaskInfoKeyMissing { task_id: String, key: String },
}

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("task {0} has an unexpected stored result shape")]
    MalformedGraph(String),
}
