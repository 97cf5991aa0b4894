use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::toolchain::CompileOutput;

/// Ways a directive can fail, in ascending severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureKind {
    /// Rejected, but without the expected diagnostic text.
    MessageMismatch,
    /// The code compiled.
    UnexpectedSuccess,
}

impl FailureKind {
    pub fn exit_code(self) -> u8 {
        match self {
            FailureKind::UnexpectedSuccess => 1,
            FailureKind::MessageMismatch => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(FailureKind),
}

/// Any non-zero exit counts as a rejection, including a compiler that
/// could not be spawned at all.
pub fn judge(out: &CompileOutput, expected_message: Option<&str>) -> Verdict {
    if out.ok {
        return Verdict::Fail(FailureKind::UnexpectedSuccess);
    }
    match expected_message {
        Some(msg) if !out.output.contains(msg) => Verdict::Fail(FailureKind::MessageMismatch),
        _ => Verdict::Pass,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResult {
    /// Working directory of the database entry that was built.
    pub directory: PathBuf,
    pub line: usize,
    pub fragment: String,
    pub expected_message: Option<String>,
    pub verdict: Verdict,
    /// The compiler could not be started, so `compiler_output` holds the
    /// launch error instead of diagnostics.
    pub spawn_failed: bool,
    pub compiler_output: String,
}

impl AssertionResult {
    /// The `ERROR:` line for a failure, `None` for a pass.
    pub fn error_line(&self, file: &str) -> Option<String> {
        let line = self.line;
        match self.verdict {
            Verdict::Pass => None,
            Verdict::Fail(FailureKind::UnexpectedSuccess) => Some(format!(
                "ERROR: {file}:{line}: must fail to compile but instead compiled without error."
            )),
            Verdict::Fail(FailureKind::MessageMismatch) => Some(format!(
                "ERROR: {file}:{line}: message '{}' not found in compilation error: \n{}",
                self.expected_message.as_deref().unwrap_or_default(),
                self.compiler_output
            )),
        }
    }
}

/// Everything one run of a named static test produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub name: String,
    pub file: String,
    pub results: Vec<AssertionResult>,
}

impl RunReport {
    pub fn failures(&self) -> BTreeSet<FailureKind> {
        self.results
            .iter()
            .filter_map(|r| match r.verdict {
                Verdict::Fail(kind) => Some(kind),
                Verdict::Pass => None,
            })
            .collect()
    }

    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.verdict != Verdict::Pass)
            .count()
    }

    pub fn ok(&self) -> bool {
        self.failed_count() == 0
    }

    /// 0 when every directive held, otherwise the code of the most severe
    /// failure kind seen.
    pub fn exit_code(&self) -> u8 {
        self.failures()
            .into_iter()
            .next_back()
            .map(FailureKind::exit_code)
            .unwrap_or(0)
    }

    pub fn error_lines(&self) -> Vec<String> {
        self.results
            .iter()
            .filter_map(|r| r.error_line(&self.file))
            .collect()
    }
}
