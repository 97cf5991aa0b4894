use std::path::PathBuf;

/// Failures that stop a run before any verdict can be produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StaticTestError {
    #[error("static test name {name:?} is not an identifier")]
    InvalidTestName { name: String },
    #[error("STATIC_TEST({name}) not found; {}", defined_tests(.available))]
    TestNotFound {
        name: String,
        /// Names of the blocks the file does define, in source order.
        available: Vec<String>,
    },
    #[error("STATIC_TEST({name}) has no balanced closing brace")]
    UnbalancedBlock { name: String },
    #[error("removing static test blocks made no progress at byte {offset}")]
    StripStalled { offset: usize },
    #[error("parse compilation database {path}: {reason}")]
    CompileDbParse { path: PathBuf, reason: String },
    #[error("no compilation database entry for {file} in {path}")]
    NoCompileDbEntry { file: String, path: PathBuf },
    #[error("build command does not reference {file}: {command}")]
    CommandMissingFile { file: String, command: String },
}

fn defined_tests(names: &[String]) -> String {
    if names.is_empty() {
        "the file defines no static tests".to_string()
    } else {
        format!("the file defines {}", names.join(", "))
    }
}

impl StaticTestError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTestName { .. } => "STATIC_TEST_INVALID_NAME",
            Self::TestNotFound { .. } => "STATIC_TEST_NOT_FOUND",
            Self::UnbalancedBlock { .. } => "STATIC_TEST_UNBALANCED",
            Self::StripStalled { .. } => "STATIC_TEST_STRIP_STALLED",
            Self::CompileDbParse { .. } => "COMPILE_DB_PARSE",
            Self::NoCompileDbEntry { .. } => "COMPILE_DB_NO_ENTRY",
            Self::CommandMissingFile { .. } => "COMPILE_DB_COMMAND_MISSING_FILE",
        }
    }
}
