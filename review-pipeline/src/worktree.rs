//! Per-job worktree lifecycle.
//!
//! The worktree is owned by the job: init creates and populates it, wrapup
//! destroys it. Every materialised project gets the review tool's config
//! file so the tool resolves symbols against that checkout.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::ReviewConfig;
use crate::errors::WorktreeError;
use crate::model::ProjectInfo;

pub const TOOL_CONFIG_NAME: &str = ".devagent.toml";

/// Materialises the rules project plus every reviewed project under
/// `wd/<project>` at their requested revisions.
pub fn populate_workdir(
    cfg: &ReviewConfig,
    wd: &Path,
    rules_info: &ProjectInfo,
    projects_info: &[ProjectInfo],
) -> Result<(), WorktreeError> {
    for info in std::iter::once(rules_info).chain(projects_info) {
        let dir = wd.join(&info.project);
        let url = cfg.clone_url(&info.remote, &info.project);
        debug!("populating {} from {} at {}", dir.display(), url, info.revision);

        services::git::fetch_checkout(&dir, &url, &info.revision, cfg.git_depth())?;
        write_tool_config(cfg, &dir)?;
    }
    Ok(())
}

/// Writes the review tool's config into `dir`.
pub fn write_tool_config(cfg: &ReviewConfig, dir: &Path) -> Result<PathBuf, WorktreeError> {
    let path = dir.join(TOOL_CONFIG_NAME);
    let content = format!(
        "provider = \"{}\"\nmodel = \"{}\"\napi_key = \"{}\"\nauto_approve_code = false\n",
        cfg.devagent_provider, cfg.devagent_model, cfg.devagent_api_key
    );
    std::fs::write(&path, content)?;
    Ok(path)
}

/// Destroys the worktree; a missing tree is not an error.
pub fn clean_workdir(wd: &Path) {
    match std::fs::remove_dir_all(wd) {
        Ok(()) => debug!("removed workdir {}", wd.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("failed to remove workdir {}: {e}", wd.display()),
    }
}
