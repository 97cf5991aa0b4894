use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};

use crate::compdb::BuildCommand;

pub const EXECUTABLE_NOT_FOUND: &str = "Executable file not found executing: ";
pub const SPAWN_FAILED: &str = "Failed to execute: ";

/// Result of one compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutput {
    pub ok: bool,
    /// `None` when the process could not be spawned or died from a signal.
    pub exit_status: Option<i32>,
    /// The compiler never ran; `output` describes why. Judged as a rejection.
    pub spawn_failed: bool,
    /// stdout followed by stderr.
    pub output: String,
}

/// Name of the synthesized source written next to each build.
///
/// Keeps the extension of the file under test so the recorded command's
/// language detection still applies.
pub fn transient_file_name(file: &Path) -> String {
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or("cpp");
    format!("static_test_{}.{ext}", std::process::id())
}

/// A synthesized source file that is removed when dropped, unless kept.
#[derive(Debug)]
pub struct TransientSource {
    path: PathBuf,
    keep: bool,
}

impl TransientSource {
    pub fn write(dir: &Path, name: &str, contents: &str, keep: bool) -> Result<Self> {
        let path = dir.join(name);
        std::fs::write(&path, contents.as_bytes())
            .with_context(|| format!("write synthesized program: {}", path.display()))?;
        Ok(Self { path, keep })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TransientSource {
    fn drop(&mut self) {
        if !self.keep {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(not(windows))]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(line);
    cmd
}

#[cfg(windows)]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(line);
    cmd
}

/// Runs `build` in `cwd` and waits for it. There is no timeout.
///
/// A compiler that cannot be started is captured in the output rather than
/// returned as an error, so the remaining builds still run.
pub fn run_build(build: BuildCommand<'_>, cwd: &Path) -> Result<CompileOutput> {
    let (mut cmd, shown) = match build {
        BuildCommand::Shell(line) => (shell_command(line), line.to_string()),
        BuildCommand::Argv(args) => {
            let Some((program, rest)) = args.split_first() else {
                anyhow::bail!("empty argument vector for build in {}", cwd.display());
            };
            let mut cmd = Command::new(program);
            cmd.args(rest);
            (cmd, args.join(" "))
        }
    };
    cmd.current_dir(cwd);

    let out = match cmd.output() {
        Ok(out) => out,
        Err(err) => {
            tracing::warn!(command = %shown, error = %err, "could not start compiler");
            let output = match err.kind() {
                std::io::ErrorKind::NotFound => format!("{EXECUTABLE_NOT_FOUND}{shown}"),
                _ => format!("{SPAWN_FAILED}{shown}: {err}"),
            };
            return Ok(CompileOutput {
                ok: false,
                exit_status: None,
                spawn_failed: true,
                output,
            });
        }
    };

    let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
    output.push_str(&String::from_utf8_lossy(&out.stderr));
    Ok(CompileOutput {
        ok: out.status.success(),
        exit_status: out.status.code(),
        spawn_failed: false,
        output,
    })
}
