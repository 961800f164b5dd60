//! Unified-diff analyzer producing human-readable review context.
//!
//! Parses a patch into per-file records (line/assertion/CTE-marker counts),
//! derives the change state and subsystem of every file, and renders verbose
//! summaries per subsystem. Deterministic on its input; no I/O.

mod file_info;

pub use file_info::{FileInfo, FileState, FileType, classify};

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref OLD_FILE_HEADER: Regex = Regex::new(r"^--- (?:a/)?(.+)$").unwrap();
    static ref NEW_FILE_HEADER: Regex = Regex::new(r"^\+\+\+ (?:b/)?(.+)$").unwrap();
}

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("patch contains no file headers")]
    Empty,

    #[error("malformed patch: {0}")]
    Malformed(String),
}

fn contains_assertion(line: &str) -> bool {
    line.contains("ES2PANDA_ASSERT(") || line.contains("arktest.assert") || line.contains("ASSERT(")
}

fn contains_cte_check(line: &str) -> bool {
    line.contains("/* @@")
}

/// Parsed patch with per-file facts and summary rendering.
#[derive(Debug, Clone)]
pub struct PatchAnalyzer {
    files: Vec<FileInfo>,
}

impl PatchAnalyzer {
    /// Parses a unified diff. Fails on content lines appearing before any
    /// file header and on files with an incomplete header pair.
    pub fn parse(patch: &str) -> Result<Self, AnalyzerError> {
        let mut files = Vec::new();
        let mut current: Option<FileInfo> = None;

        for line in patch.lines() {
            if let Some(m) = OLD_FILE_HEADER.captures(line) {
                if let Some(done) = current.take() {
                    files.push(Self::finish(done)?);
                }
                current = Some(FileInfo {
                    old_name: m[1].to_string(),
                    ..Default::default()
                });
                continue;
            }

            if let Some(m) = NEW_FILE_HEADER.captures(line) {
                let file = current
                    .as_mut()
                    .ok_or_else(|| AnalyzerError::Malformed(format!("stray header: {line}")))?;
                file.new_name = m[1].to_string();
                continue;
            }

            let Some(file) = current.as_mut() else {
                // Prelude before the first file header ("diff --git", index
                // lines, commit message) carries no facts.
                continue;
            };

            if line.starts_with('+') {
                file.added_lines += 1;
                if contains_assertion(line) {
                    file.added_assertions += 1;
                }
                if contains_cte_check(line) {
                    file.added_cte_checks += 1;
                }
            } else if line.starts_with('-') {
                file.removed_lines += 1;
                if contains_assertion(line) {
                    file.removed_assertions += 1;
                }
                if contains_cte_check(line) {
                    file.removed_cte_checks += 1;
                }
            } else if line.starts_with(' ') {
                if contains_assertion(line) {
                    file.context_assertions += 1;
                }
                if contains_cte_check(line) {
                    file.context_cte_checks += 1;
                }
            }
        }

        match current {
            Some(done) => files.push(Self::finish(done)?),
            None => return Err(AnalyzerError::Empty),
        }

        Ok(Self { files })
    }

    fn finish(mut file: FileInfo) -> Result<FileInfo, AnalyzerError> {
        if file.new_name.is_empty() {
            return Err(AnalyzerError::Malformed(format!(
                "file {} has no +++ header",
                file.old_name
            )));
        }
        file.enrich();
        Ok(file)
    }

    pub fn files(&self) -> &[FileInfo] {
        &self.files
    }

    /// All three verbose summaries concatenated; this is the review context
    /// handed to the external review tool alongside the patch.
    pub fn review_context(&self) -> String {
        let mut context = self.verbose_frontend_summary();
        context.push_str(&self.verbose_runtime_summary());
        context.push_str(&self.verbose_test_summary());
        context
    }

    /// Summarizes front-end contributions into a human-readable string.
    pub fn verbose_frontend_summary(&self) -> String {
        let (added, removed) = self.contribs(|f| f.file_type.is_frontend_code());
        if added + removed == 0 {
            return "This patch does not contribute to the front-end.\n\n".to_string();
        }

        let mut summary = String::from("This patch contributes to the front-end main code base.\n\n");
        summary.push_str(&format!(
            "Overall, {added} LoC are added, and {removed} LoC are removed.\n\n"
        ));

        for (file_type, subsystem) in [
            (FileType::FrontendParser, "the parser"),
            (FileType::FrontendChecker, "the type checker"),
            (FileType::FrontendAstVerifier, "the AST verifier"),
            (FileType::FrontendCodegen, "the code generator"),
        ] {
            let (a, r) = self.contribs(|f| f.file_type == file_type);
            if a + r > 0 {
                summary.push_str(&format!(
                    "In particular, {a} LoC are added to {subsystem}, {r} LoC are removed from {subsystem}.\n\n"
                ));
            }
        }

        summary
    }

    /// Summarizes runtime contributions into a human-readable string.
    pub fn verbose_runtime_summary(&self) -> String {
        let (added, removed) = self.contribs(|f| f.file_type.is_runtime_code());
        if added + removed == 0 {
            return "This patch does not contribute to the runtime.\n\n".to_string();
        }

        let mut summary = String::from("This patch contributes to the runtime main code base.\n\n");
        summary.push_str(&format!(
            "Overall, {added} LoC are added, and {removed} LoC are removed.\n\n"
        ));

        let (a, r) = self.contribs(|f| f.file_type == FileType::RuntimeStdlib);
        if a + r > 0 {
            summary.push_str(&format!(
                "In particular, {a} LoC are added to the ETS stdlib, {r} LoC are removed from the ETS stdlib.\n\n"
            ));
        }

        summary
    }

    /// Summarizes test contributions into a human-readable string.
    pub fn verbose_test_summary(&self) -> String {
        let added_tests = self.count_files(|f| f.file_type.is_test() && f.state == FileState::Added);
        let removed_tests =
            self.count_files(|f| f.file_type.is_test() && f.state == FileState::Removed);
        let modified_tests =
            self.count_files(|f| f.file_type.is_test() && f.state == FileState::Modified);

        if added_tests + removed_tests + modified_tests == 0 {
            return "The patch does not contribute to the tests.\n\n".to_string();
        }

        let mut summary = String::from("This patch contributes to the tests.\n\n");

        let (added, removed) = self.contribs(|f| f.file_type.is_test());
        summary.push_str(&format!(
            "Overall, {added} LoC are added to the tests, and {removed} LoC are removed from the tests.\n\n"
        ));

        summary.push_str("In particular, the patch ");
        summary.push_str(&if added_tests > 0 {
            format!("adds {added_tests} tests")
        } else {
            "does not add tests".to_string()
        });
        summary.push_str(", ");
        summary.push_str(&if removed_tests > 0 {
            format!("removes {removed_tests} tests")
        } else {
            "does not remove tests".to_string()
        });
        summary.push_str(", ");
        summary.push_str(&if modified_tests > 0 {
            format!("modifies {modified_tests} existing tests")
        } else {
            "does not modify existing tests".to_string()
        });
        summary.push_str(".\n\n");

        let weakened = self.count_files(|f| {
            f.file_type.is_positive_test()
                && match f.state {
                    FileState::Added => f.added_assertions == 0,
                    FileState::Removed => f.removed_assertions > 0,
                    FileState::Modified => f.removes_assertions(),
                    FileState::Renamed => false,
                }
        });
        if weakened > 0 {
            summary.push_str(&format!(
                "The patch has {weakened} positive tests which decrease assertion usage.\n\n"
            ));
        }

        summary
    }

    /// One short line per file of the patch.
    pub fn raw_summary(&self) -> Vec<String> {
        self.files
            .iter()
            .map(|f| {
                let name = match f.state {
                    FileState::Removed => &f.old_name,
                    _ => &f.new_name,
                };
                format!(
                    "{name}: {} file (contributes to: {}), {} lines added, {} lines removed, {} assertions added, {} assertions removed, {} CTE checks added, {} CTE checks removed",
                    f.state,
                    f.file_type,
                    f.added_lines,
                    f.removed_lines,
                    f.added_assertions,
                    f.removed_assertions,
                    f.added_cte_checks,
                    f.removed_cte_checks
                )
            })
            .collect()
    }

    fn contribs(&self, pred: impl Fn(&FileInfo) -> bool) -> (u32, u32) {
        self.files
            .iter()
            .filter(|f| pred(f))
            .fold((0, 0), |(a, r), f| {
                (a + f.added_lines, r + f.removed_lines)
            })
    }

    fn count_files(&self, pred: impl Fn(&FileInfo) -> bool) -> u32 {
        self.files.iter().filter(|f| pred(f)).count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRONTEND_PATCH: &str = "\
--- a/ets2panda/parser/ETSparser.cpp
+++ b/ets2panda/parser/ETSparser.cpp
@@ -1,4 +1,5 @@
 void Parse() {
-    old();
+    fresh();
+    ES2PANDA_ASSERT(ok);
 }
--- a/ets2panda/test/runtime/case.ets
+++ b/ets2panda/test/runtime/case.ets
@@ -1,2 +1,3 @@
 let x = 1;
+arktest.assertEQ(x, 1)
";

    #[test]
    fn parse_counts_lines_and_markers() {
        let analyzer = PatchAnalyzer::parse(FRONTEND_PATCH).unwrap();
        let files = analyzer.files();
        assert_eq!(files.len(), 2);

        assert_eq!(files[0].new_name, "ets2panda/parser/ETSparser.cpp");
        assert_eq!(files[0].added_lines, 2);
        assert_eq!(files[0].removed_lines, 1);
        assert_eq!(files[0].added_assertions, 1);
        assert_eq!(files[0].file_type, FileType::FrontendParser);
        assert_eq!(files[0].state, FileState::Modified);

        assert_eq!(files[1].file_type, FileType::PositiveFrontendTest);
        assert_eq!(files[1].added_assertions, 1);
    }

    #[test]
    fn parse_detects_added_and_removed_files() {
        let patch = "\
--- /dev/null
+++ b/static_core/runtime/new.cpp
@@ -0,0 +1,2 @@
+int x;
+int y;
--- a/static_core/runtime/old.cpp
+++ /dev/null
@@ -1,1 +0,0 @@
-int z;
";
        let analyzer = PatchAnalyzer::parse(patch).unwrap();
        assert_eq!(analyzer.files()[0].state, FileState::Added);
        assert_eq!(analyzer.files()[0].file_type, FileType::Runtime);
        assert_eq!(analyzer.files()[1].state, FileState::Removed);
        // Removed files classify on their `/dev/null` new name.
        assert_eq!(analyzer.files()[1].file_type, FileType::Other);
    }

    #[test]
    fn parse_rejects_empty_input() {
        assert!(matches!(
            PatchAnalyzer::parse(""),
            Err(AnalyzerError::Empty)
        ));
    }

    #[test]
    fn parse_rejects_missing_new_header() {
        let patch = "--- a/file.cpp\n@@ -1,1 +1,1 @@\n";
        assert!(matches!(
            PatchAnalyzer::parse(patch),
            Err(AnalyzerError::Malformed(_))
        ));
    }

    #[test]
    fn frontend_summary_mentions_subsystems() {
        let analyzer = PatchAnalyzer::parse(FRONTEND_PATCH).unwrap();
        let summary = analyzer.verbose_frontend_summary();
        assert!(summary.contains("contributes to the front-end"));
        assert!(summary.contains("2 LoC are added to the parser"));
    }

    #[test]
    fn runtime_summary_when_untouched() {
        let analyzer = PatchAnalyzer::parse(FRONTEND_PATCH).unwrap();
        assert_eq!(
            analyzer.verbose_runtime_summary(),
            "This patch does not contribute to the runtime.\n\n"
        );
    }

    #[test]
    fn test_summary_counts_tests() {
        let analyzer = PatchAnalyzer::parse(FRONTEND_PATCH).unwrap();
        let summary = analyzer.verbose_test_summary();
        assert!(summary.contains("contributes to the tests"));
        assert!(summary.contains("does not add tests"));
        assert!(summary.contains("modifies 1 existing tests"));
    }

    #[test]
    fn review_context_concatenates_summaries() {
        let analyzer = PatchAnalyzer::parse(FRONTEND_PATCH).unwrap();
        let context = analyzer.review_context();
        assert!(context.contains("front-end"));
        assert!(context.contains("runtime"));
        assert!(context.contains("tests"));
    }

    #[test]
    fn raw_summary_one_line_per_file() {
        let analyzer = PatchAnalyzer::parse(FRONTEND_PATCH).unwrap();
        let raw = analyzer.raw_summary();
        assert_eq!(raw.len(), 2);
        assert!(raw[0].starts_with("ets2panda/parser/ETSparser.cpp: modified file"));
    }
}
