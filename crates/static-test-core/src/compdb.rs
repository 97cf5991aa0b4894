//! `compile_commands.json` loading and lookup.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::StaticTestError;

pub const COMPILE_DB_FILE_NAME: &str = "compile_commands.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompileDbEntry {
    pub directory: PathBuf,
    pub file: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub arguments: Option<Vec<String>>,
    #[serde(default)]
    pub output: Option<String>,
}

/// How an entry records its compiler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildCommand<'a> {
    /// A shell command line.
    Shell(&'a str),
    /// An argv vector, run without a shell.
    Argv(&'a [String]),
}

impl CompileDbEntry {
    /// `arguments` wins when both forms are present.
    pub fn build_command(&self) -> Option<BuildCommand<'_>> {
        if let Some(args) = self.arguments.as_deref().filter(|a| !a.is_empty()) {
            return Some(BuildCommand::Argv(args));
        }
        self.command.as_deref().map(BuildCommand::Shell)
    }
}

/// Drops a single `,` directly before the closing `]` of the top-level array.
///
/// Some database writers emit `[{...},{...},]`; nothing else is repaired.
pub fn repair_trailing_separator(contents: &str) -> Cow<'_, str> {
    let Some(before_close) = contents.trim_end().strip_suffix(']') else {
        return Cow::Borrowed(contents);
    };
    let before_close = before_close.trim_end();
    if !before_close.ends_with(',') {
        return Cow::Borrowed(contents);
    }
    let comma = before_close.len() - 1;
    let mut out = String::with_capacity(contents.len() - 1);
    out.push_str(&contents[..comma]);
    out.push_str(&contents[comma + 1..]);
    Cow::Owned(out)
}

pub fn parse(contents: &str, path: &Path) -> Result<Vec<CompileDbEntry>> {
    let repaired = repair_trailing_separator(contents);
    let entries: Vec<CompileDbEntry> =
        serde_json::from_str(&repaired).map_err(|err| StaticTestError::CompileDbParse {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    for (idx, entry) in entries.iter().enumerate() {
        if entry.build_command().is_none() {
            return Err(StaticTestError::CompileDbParse {
                path: path.to_path_buf(),
                reason: format!(
                    "entry[{idx}] for {} has neither \"command\" nor \"arguments\"",
                    entry.file
                ),
            }
            .into());
        }
    }
    Ok(entries)
}

pub fn load(path: &Path) -> Result<Vec<CompileDbEntry>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("read compilation database: {}", path.display()))?;
    parse(&contents, path)
}

/// `<dir of file>/../compile_commands.json`, after resolving `file`.
pub fn default_location(file: &Path) -> Result<PathBuf> {
    let abs = file
        .canonicalize()
        .with_context(|| format!("resolve test file: {}", file.display()))?;
    let project = abs
        .parent()
        .and_then(Path::parent)
        .with_context(|| format!("test file has no grandparent directory: {}", abs.display()))?;
    Ok(project.join(COMPILE_DB_FILE_NAME))
}

/// Entries tracking exactly `file`, in database order.
pub fn matching<'a>(entries: &'a [CompileDbEntry], file: &str) -> Vec<&'a CompileDbEntry> {
    entries.iter().filter(|e| e.file == file).collect()
}
