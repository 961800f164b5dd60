//! Rules project manifest.
//!
//! `<rules-project>/.REVIEW_RULES.json` is a JSON array of
//! `{name, dirs[], skip[]?, once?, disable?}`; rule bodies live under
//! `<rules-project>/REVIEW_RULES/<name>`. Disabled entries are dropped at
//! load time; names must be unique and every rule file must exist.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::errors::RuleError;

pub const RULES_MANIFEST: &str = ".REVIEW_RULES.json";
pub const RULES_DIR: &str = "REVIEW_RULES";

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    name: String,
    dirs: Vec<String>,
    #[serde(default)]
    skip: Vec<String>,
    #[serde(default)]
    once: bool,
    #[serde(default, rename = "disable")]
    disabled: bool,
}

/// One enabled review rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Manifest name, with extension.
    pub name: String,
    /// Canonical name: the file stem.
    pub stem: String,
    /// On-disk rule body.
    pub path: PathBuf,
    /// Workdir-relative directories (`<project>/<dir>`) the rule applies to.
    pub dirs: Vec<String>,
    /// Workdir-relative directories excluded from the rule.
    pub skip: Vec<String>,
    /// At most one violation per job.
    pub once: bool,
}

/// Loads and validates the rules of `<wd>/<rules_project>`.
pub fn load_rules(wd: &Path, rules_project: &str) -> Result<Vec<Rule>, RuleError> {
    let root = wd.join(rules_project);
    if !root.exists() {
        return Err(RuleError::ProjectMissing(root.display().to_string()));
    }

    let manifest = root.join(RULES_MANIFEST);
    if !manifest.exists() {
        return Err(RuleError::ConfigMissing(manifest.display().to_string()));
    }

    let rules_dir = root.join(RULES_DIR);
    if !rules_dir.exists() {
        return Err(RuleError::FolderMissing(rules_dir.display().to_string()));
    }

    let entries: Vec<ManifestEntry> = serde_json::from_str(&std::fs::read_to_string(&manifest)?)?;

    let mut seen = HashSet::new();
    let mut rules = Vec::new();

    for entry in entries {
        if entry.disabled {
            debug!("rule {} is disabled, skipping", entry.name);
            continue;
        }
        if entry.name.is_empty() {
            return Err(RuleError::EmptyName);
        }
        if entry.dirs.is_empty() {
            return Err(RuleError::NoDirs(entry.name));
        }
        if !seen.insert(entry.name.clone()) {
            return Err(RuleError::Duplicate(entry.name));
        }

        let path = rules_dir.join(&entry.name);
        if !path.exists() {
            return Err(RuleError::RuleMissing(path.display().to_string()));
        }

        let stem = Path::new(&entry.name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| entry.name.clone());

        rules.push(Rule {
            name: entry.name,
            stem,
            path,
            dirs: entry.dirs,
            skip: entry.skip,
            once: entry.once,
        });
    }

    debug!("loaded {} rules from {}", rules.len(), root.display());
    Ok(rules)
}
