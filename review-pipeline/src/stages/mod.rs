//! The three stage bodies executed on the broker: init, review fan-out,
//! wrapup. Each wraps its root error with the stage name before handing it
//! to the broker as the recorded task failure.

pub mod init;
pub mod review;
pub mod wrapup;

/// Formats a stage failure the way the broker records it.
pub(crate) fn stage_failure(job_id: &str, stage: &str, err: impl std::fmt::Display) -> String {
    format!("[{job_id}] {stage} failed with an exception: {err}")
}
