use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::command;
use crate::compdb::{self, BuildCommand, CompileDbEntry};
use crate::error::StaticTestError;
use crate::program::{self, SynthesizedProgram};
use crate::toolchain::{self, TransientSource};
use crate::verdict::{self, AssertionResult, RunReport};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Name inside `STATIC_TEST(...)`.
    pub name: String,
    /// Path of the file under test, exactly as the database records it.
    pub file: String,
    /// Overrides the database location derived from `file`.
    pub compile_commands: Option<PathBuf>,
    /// Leave the last synthesized program in each build directory.
    pub keep_program: bool,
}

enum Retargeted {
    Shell(String),
    Argv(Vec<String>),
}

impl Retargeted {
    fn as_build(&self) -> BuildCommand<'_> {
        match self {
            Retargeted::Shell(line) => BuildCommand::Shell(line),
            Retargeted::Argv(args) => BuildCommand::Argv(args),
        }
    }
}

fn retarget(entry: &CompileDbEntry, file: &str, transient: &str) -> Result<Retargeted> {
    match entry.build_command() {
        Some(BuildCommand::Shell(line)) => Ok(Retargeted::Shell(command::substitute_file(
            line, file, transient,
        )?)),
        Some(BuildCommand::Argv(args)) => Ok(Retargeted::Argv(command::substitute_argv(
            args, file, transient,
        )?)),
        None => anyhow::bail!("database entry for {file} has no build command"),
    }
}

/// Builds every program with one entry's command, in order.
pub fn compile_with_entry(
    entry: &CompileDbEntry,
    file: &str,
    programs: &[SynthesizedProgram],
    keep_program: bool,
) -> Result<Vec<AssertionResult>> {
    let transient = toolchain::transient_file_name(Path::new(file));
    let build = retarget(entry, file, &transient)
        .with_context(|| format!("retarget build command in {}", entry.directory.display()))?;
    if let BuildCommand::Shell(line) = build.as_build() {
        tracing::debug!(directory = %entry.directory.display(), command = line, "retargeted build");
    }

    let mut out = Vec::with_capacity(programs.len());
    for program in programs {
        let source = TransientSource::write(&entry.directory, &transient, &program.source, keep_program)?;
        let compiled = toolchain::run_build(build.as_build(), &entry.directory)?;
        drop(source);

        if compiled.spawn_failed {
            tracing::warn!(
                line = program.report_line(),
                directory = %entry.directory.display(),
                "compiler did not start; judging the assertion as rejected"
            );
        }
        let verdict = verdict::judge(&compiled, program.expected_message.as_deref());
        tracing::info!(
            line = program.report_line(),
            fragment = %program.fragment,
            exit_status = ?compiled.exit_status,
            ?verdict,
            "static assertion compiled"
        );
        out.push(AssertionResult {
            directory: entry.directory.clone(),
            line: program.report_line(),
            fragment: program.fragment.clone(),
            expected_message: program.expected_message.clone(),
            verdict,
            spawn_failed: compiled.spawn_failed,
            compiler_output: compiled.output,
        });
    }
    Ok(out)
}

/// Builds every program against every database entry tracking `file`.
pub fn compile_programs(
    programs: &[SynthesizedProgram],
    file: &str,
    db_path: &Path,
    keep_program: bool,
) -> Result<Vec<AssertionResult>> {
    let entries = compdb::load(db_path)?;
    let hits = compdb::matching(&entries, file);
    if hits.is_empty() {
        tracing::warn!(file, db = %db_path.display(), "no compilation database entry");
        return Err(StaticTestError::NoCompileDbEntry {
            file: file.to_string(),
            path: db_path.to_path_buf(),
        }
        .into());
    }

    let mut out = Vec::new();
    for entry in hits {
        out.extend(compile_with_entry(entry, file, programs, keep_program)?);
    }
    Ok(out)
}

/// Runs one named static test end to end.
///
/// Per-directive failures are collected in the report; only problems that
/// prevent running the test at all are returned as errors.
pub fn run_static_test(opts: &RunOptions) -> Result<RunReport> {
    let file_path = Path::new(&opts.file);
    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("read test file: {}", file_path.display()))?;
    let programs = program::generate(&content, &opts.name)
        .with_context(|| format!("extract static test from {}", file_path.display()))?;

    let mut report = RunReport {
        name: opts.name.clone(),
        file: opts.file.clone(),
        results: Vec::new(),
    };
    if programs.is_empty() {
        tracing::info!(name = %opts.name, "static test has no SHOULD_NOT_COMPILE directives");
        return Ok(report);
    }

    let db_path = match &opts.compile_commands {
        Some(path) => path.clone(),
        None => compdb::default_location(file_path)?,
    };
    report.results = compile_programs(&programs, &opts.file, &db_path, opts.keep_program)?;
    Ok(report)
}
