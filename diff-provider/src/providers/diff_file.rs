//! Local patch-file provider.
//!
//! Accepts an absolute path to a unified-diff file instead of a remote PR
//! URL; registered under the empty domain so plain paths resolve to it.
//! Useful for dry runs and fixtures — there is no remote, so the summary
//! carries no shas and the project is left empty.

use std::path::Path;

use tracing::debug;

use crate::errors::{ProviderError, ProviderResult};
use crate::models::{Diff, DiffFile, DiffSummary};

#[derive(Debug, Clone, Default)]
pub struct DiffFileClient;

impl DiffFileClient {
    pub fn new() -> Self {
        Self
    }

    pub fn domain(&self) -> &str {
        ""
    }

    pub async fn get_diff(&self, url: &str) -> ProviderResult<Diff> {
        if !Path::new(url).exists() {
            return Err(ProviderError::InvalidUrl(url.to_string()));
        }
        debug!("reading local patch {url}");

        let content = std::fs::read_to_string(url)
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let files = split_patch(&content);

        let added_lines = files.iter().map(|f| f.added_lines).sum();
        let removed_lines = files.iter().map(|f| f.removed_lines).sum();

        Ok(Diff {
            remote: String::new(),
            project: String::new(),
            summary: DiffSummary {
                total_files: files.len() as u64,
                added_lines,
                removed_lines,
                base_sha: String::new(),
                head_sha: String::new(),
            },
            files,
        })
    }
}

/// Splits a unified diff into per-file records on `--- ` headers.
fn split_patch(content: &str) -> Vec<DiffFile> {
    let mut files: Vec<DiffFile> = Vec::new();
    let mut current: Option<DiffFile> = None;

    for line in content.lines() {
        if let Some(old_name) = line.strip_prefix("--- ") {
            if let Some(done) = current.take() {
                files.push(done);
            }
            current = Some(DiffFile {
                path: strip_prefix_marker(old_name).to_string(),
                diff: line.to_string(),
                added_lines: 0,
                removed_lines: 0,
            });
            continue;
        }

        let Some(file) = current.as_mut() else {
            continue;
        };

        file.diff.push('\n');
        file.diff.push_str(line);

        if let Some(new_name) = line.strip_prefix("+++ ") {
            let name = strip_prefix_marker(new_name);
            if name != "/dev/null" {
                file.path = name.to_string();
            }
        } else if line.starts_with('+') {
            file.added_lines += 1;
        } else if line.starts_with('-') {
            file.removed_lines += 1;
        }
    }

    if let Some(done) = current.take() {
        files.push(done);
    }
    files
}

fn strip_prefix_marker(name: &str) -> &str {
    name.strip_prefix("a/")
        .or_else(|| name.strip_prefix("b/"))
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATCH: &str = "\
--- a/src/one.cpp
+++ b/src/one.cpp
@@ -1,2 +1,2 @@
 int x;
-int y;
+int z;
--- a/src/two.cpp
+++ b/src/two.cpp
@@ -1,1 +1,2 @@
 int a;
+int b;
";

    #[tokio::test]
    async fn reads_and_splits_a_local_patch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("change.patch");
        std::fs::write(&path, PATCH).unwrap();

        let diff = DiffFileClient::new()
            .get_diff(path.to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(diff.summary.total_files, 2);
        assert_eq!(diff.summary.added_lines, 2);
        assert_eq!(diff.summary.removed_lines, 1);
        assert_eq!(diff.files[0].path, "src/one.cpp");
        assert_eq!(diff.files[1].path, "src/two.cpp");
        assert!(diff.files[0].diff.starts_with("--- a/src/one.cpp"));
        assert!(diff.files[1].diff.contains("+int b;"));
    }

    #[tokio::test]
    async fn missing_file_is_invalid() {
        let res = DiffFileClient::new().get_diff("/no/such/file.patch").await;
        assert!(matches!(res, Err(ProviderError::InvalidUrl(_))));
    }
}
