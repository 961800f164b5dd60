//! Key grammar of the per-job task-info hash.
//!
//! Recognised shapes:
//! - `task_id`
//! - `rev_rules` / `rev_devagent` (required revisions)
//! - `rev_<project>` per reviewed project
//! - `patch_content_<patch>` / `patch_context_<patch>`
//! - `<rule-stem>` → patch name; the patch must have a `patch_content_`
//!   entry in the same bundle
//!
//! Anything else is rejected on write and on read.

use std::collections::HashMap;

use crate::StoreError;

pub const TASK_ID_KEY: &str = "task_id";
pub const RULES_REVISION_KEY: &str = "rev_rules";
pub const DEVAGENT_REVISION_KEY: &str = "rev_devagent";

const PROJECT_REVISION_PREFIX: &str = "rev_";
const PATCH_CONTENT_PREFIX: &str = "patch_content_";
const PATCH_CONTEXT_PREFIX: &str = "patch_context_";

pub fn project_revision_key(project: &str) -> String {
    format!("{PROJECT_REVISION_PREFIX}{project}")
}

pub fn patch_content_key(patch: &str) -> String {
    format!("{PATCH_CONTENT_PREFIX}{patch}")
}

pub fn patch_context_key(patch: &str) -> String {
    format!("{PATCH_CONTEXT_PREFIX}{patch}")
}

/// Validates a full task-info bundle against the key grammar.
pub fn validate(info: &HashMap<String, String>) -> Result<(), StoreError> {
    if info.is_empty() {
        return Err(StoreError::Empty);
    }

    for required in [TASK_ID_KEY, RULES_REVISION_KEY, DEVAGENT_REVISION_KEY] {
        if !info.contains_key(required) {
            return Err(StoreError::MissingKey(required));
        }
    }

    for (key, value) in info {
        if key == TASK_ID_KEY {
            continue;
        }
        if has_suffix(key, PATCH_CONTENT_PREFIX) || has_suffix(key, PATCH_CONTEXT_PREFIX) {
            continue;
        }
        if has_suffix(key, PROJECT_REVISION_PREFIX) {
            continue;
        }

        // Remaining keys are rule → patch bindings. A rule stem never
        // contains separators or whitespace, and the referenced patch must
        // be stored alongside it.
        if key.is_empty() || key.contains('/') || key.contains(char::is_whitespace) {
            return Err(StoreError::InvalidKey(key.clone()));
        }
        if !info.contains_key(&patch_content_key(value)) {
            return Err(StoreError::UnknownPatch {
                rule: key.clone(),
                patch: value.clone(),
            });
        }
    }

    Ok(())
}

fn has_suffix(key: &str, prefix: &str) -> bool {
    key.strip_prefix(prefix).is_some_and(|rest| !rest.is_empty())
}
