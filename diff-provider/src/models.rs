//! Normalised pull-request diff, provider-agnostic.

use serde::{Deserialize, Serialize};

/// Aggregate numbers and revision anchors of one pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub total_files: u64,
    pub added_lines: u64,
    pub removed_lines: u64,
    pub base_sha: String,
    pub head_sha: String,
}

/// One changed file with its unified-diff text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffFile {
    /// Repo-relative path of the changed file.
    pub path: String,
    pub diff: String,
    pub added_lines: u64,
    pub removed_lines: u64,
}

/// Immutable snapshot of one pull request's changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    /// Provider domain, e.g. `gitcode.com`.
    pub remote: String,
    /// `owner/repo`.
    pub project: String,
    pub summary: DiffSummary,
    pub files: Vec<DiffFile>,
}

impl Diff {
    /// Per-file patch texts joined by a blank line, in provider order. Every
    /// rule applicable to this diff reviews the same combined text.
    pub fn combined_patch(&self) -> String {
        self.files
            .iter()
            .map(|f| f.diff.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_patch_joins_in_order() {
        let diff = Diff {
            remote: "gitcode.com".to_string(),
            project: "o/p".to_string(),
            summary: DiffSummary {
                total_files: 2,
                added_lines: 0,
                removed_lines: 0,
                base_sha: "b".to_string(),
                head_sha: "h".to_string(),
            },
            files: vec![
                DiffFile {
                    path: "a".to_string(),
                    diff: "diff-a".to_string(),
                    added_lines: 0,
                    removed_lines: 0,
                },
                DiffFile {
                    path: "b".to_string(),
                    diff: "diff-b".to_string(),
                    added_lines: 0,
                    removed_lines: 0,
                },
            ],
        };
        assert_eq!(diff.combined_patch(), "diff-a\n\ndiff-b");
    }
}
