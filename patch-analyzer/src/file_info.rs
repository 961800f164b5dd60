//! Per-file facts extracted from a unified diff plus the derived change
//! state and subsystem classification.

use std::fmt;

/// How the file changed within the patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileState {
    #[default]
    Modified,
    Added,
    Removed,
    Renamed,
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileState::Modified => "modified",
            FileState::Added => "added",
            FileState::Removed => "removed",
            FileState::Renamed => "renamed",
        };
        f.write_str(s)
    }
}

/// Subsystem a file contributes to, derived from its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileType {
    #[default]
    Other,
    Runtime,
    RuntimeStdlib,
    Frontend,
    FrontendParser,
    FrontendChecker,
    FrontendAstVerifier,
    FrontendCodegen,
    Test,
    UnitTest,
    FrontendTest,
    NegativeFrontendTest,
    PositiveFrontendTest,
    CtsTest,
    FunctionalTest,
}

impl FileType {
    pub fn is_test(self) -> bool {
        matches!(
            self,
            FileType::Test
                | FileType::UnitTest
                | FileType::FrontendTest
                | FileType::NegativeFrontendTest
                | FileType::PositiveFrontendTest
                | FileType::CtsTest
                | FileType::FunctionalTest
        )
    }

    pub fn is_frontend_code(self) -> bool {
        matches!(
            self,
            FileType::Frontend
                | FileType::FrontendParser
                | FileType::FrontendChecker
                | FileType::FrontendAstVerifier
                | FileType::FrontendCodegen
        )
    }

    pub fn is_runtime_code(self) -> bool {
        matches!(self, FileType::Runtime | FileType::RuntimeStdlib)
    }

    pub fn is_positive_test(self) -> bool {
        matches!(self, FileType::PositiveFrontendTest)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileType::Other => "other",
            FileType::Runtime => "runtime",
            FileType::RuntimeStdlib => "runtime ETS stdlib",
            FileType::Frontend => "front-end",
            FileType::FrontendParser => "front-end parser",
            FileType::FrontendChecker => "front-end checker",
            FileType::FrontendAstVerifier => "front-end AST verifier",
            FileType::FrontendCodegen => "front-end code generator",
            FileType::Test => "test",
            FileType::UnitTest => "unit test",
            FileType::FrontendTest => "front-end test",
            FileType::NegativeFrontendTest => "negative front-end test",
            FileType::PositiveFrontendTest => "positive front-end test",
            FileType::CtsTest => "CTS test",
            FileType::FunctionalTest => "functional test",
        };
        f.write_str(s)
    }
}

fn is_cpp_file(path: &str) -> bool {
    path.ends_with(".cpp") || path.ends_with(".h")
}

fn is_ets_file(path: &str) -> bool {
    path.ends_with(".ets") || path.ends_with(".sts")
}

/// Classifies a repo path into its subsystem by path heuristics.
pub fn classify(path: &str) -> FileType {
    if path.contains("/test") {
        if is_cpp_file(path) {
            return FileType::UnitTest;
        }
        if is_ets_file(path) {
            if path.contains("ets2panda/test") {
                if path.contains("ets2panda/test/ast") {
                    return FileType::NegativeFrontendTest;
                }
                if path.contains("ets2panda/test/runtime") {
                    return FileType::PositiveFrontendTest;
                }
                return FileType::FrontendTest;
            }
            if path.contains("tests/ets-templates") {
                return FileType::CtsTest;
            }
            if path.contains("ets_func_tests") {
                return FileType::FunctionalTest;
            }
        }
        return FileType::Test;
    }

    if path.contains("ets2panda/") {
        if is_cpp_file(path) {
            if path.contains("ets2panda/parser/") || path.contains("ets2panda/ir/") {
                return FileType::FrontendParser;
            }
            if path.contains("ets2panda/checker/") {
                return FileType::FrontendChecker;
            }
            if path.contains("ets2panda/ast_verifier") {
                return FileType::FrontendAstVerifier;
            }
            if path.contains("ETSGen.") || path.contains("ETSemitter.") {
                return FileType::FrontendCodegen;
            }
        }
        return FileType::Frontend;
    }

    if path.contains("static_core/") {
        if path.contains("stdlib/") {
            return FileType::RuntimeStdlib;
        }
        if is_cpp_file(path) {
            return FileType::Runtime;
        }
    }

    FileType::Other
}

/// Facts about one file of the patch.
#[derive(Debug, Clone, Default)]
pub struct FileInfo {
    pub old_name: String,
    pub new_name: String,
    pub added_lines: u32,
    pub removed_lines: u32,
    pub added_assertions: u32,
    pub removed_assertions: u32,
    pub context_assertions: u32,
    pub added_cte_checks: u32,
    pub removed_cte_checks: u32,
    pub context_cte_checks: u32,
    pub state: FileState,
    pub file_type: FileType,
}

const DEV_NULL: &str = "/dev/null";

impl FileInfo {
    /// Derives `state` and `file_type` once parsing of the file is done.
    pub(crate) fn enrich(&mut self) {
        if self.old_name == DEV_NULL {
            self.state = FileState::Added;
        } else if self.new_name == DEV_NULL {
            self.state = FileState::Removed;
        } else if self.old_name != self.new_name
            && self.added_lines == 0
            && self.removed_lines == 0
        {
            self.state = FileState::Renamed;
        }

        // Classification always looks at the new name; a removed file's new
        // name is `/dev/null`, so removals land in `Other`.
        self.file_type = classify(&self.new_name);
    }

    pub fn removes_assertions(&self) -> bool {
        self.removed_assertions > self.added_assertions
    }

    pub fn adds_assertions(&self) -> bool {
        self.added_assertions > self.removed_assertions
    }
}
