use std::path::PathBuf;
use std::sync::Once;

use anyhow::{Context, Result};
use clap::Parser;
use static_test_core::{program, run_static_test, RunOptions};

/// Structural failures: the test could not be run at all.
const EXIT_CANNOT_RUN: u8 = 3;

#[derive(Parser, Debug)]
#[command(name = "static-test")]
#[command(about = "Check that SHOULD_NOT_COMPILE directives in a STATIC_TEST block fail to compile.", long_about = None)]
struct Cli {
    /// Name of the static test within the test file.
    #[arg(long)]
    name: String,
    /// Path to the test file, as recorded in compile_commands.json.
    #[arg(long)]
    file: String,
    /// Compilation database to use instead of `<file>/../../compile_commands.json`.
    #[arg(long, value_name = "PATH")]
    compile_commands: Option<PathBuf>,
    /// Leave the last synthesized program in each build directory.
    #[arg(long, default_value_t = false)]
    keep_program: bool,
    /// Print the synthesized programs and exit without compiling.
    #[arg(long, default_value_t = false)]
    print_programs: bool,
    /// Do not print progress banners on stderr.
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

static TRACING_INIT: Once = Once::new();

/// Installs a stderr subscriber when `RUST_LOG` is set, e.g.
/// `RUST_LOG=static_test_core=debug`.
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true),
                )
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}

fn main() -> std::process::ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match try_main(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("could not run static test {}: {err:#}", cli.name);
            if !cli.quiet {
                eprintln!("[              FAILED ] {}", cli.name);
            }
            std::process::ExitCode::from(EXIT_CANNOT_RUN)
        }
    }
}

fn try_main(cli: &Cli) -> Result<std::process::ExitCode> {
    if cli.print_programs {
        return print_programs(cli);
    }

    if !cli.quiet {
        eprintln!("[ COMPILE STATIC TEST ] {}", cli.name);
    }
    let report = run_static_test(&RunOptions {
        name: cli.name.clone(),
        file: cli.file.clone(),
        compile_commands: cli.compile_commands.clone(),
        keep_program: cli.keep_program,
    })?;

    for line in report.error_lines() {
        println!("{line}");
    }
    if !cli.quiet {
        if report.ok() {
            eprintln!("[                  OK ] {}", cli.name);
        } else {
            eprintln!(
                "{} of {} static assertions failed",
                report.failed_count(),
                report.results.len()
            );
            eprintln!("[              FAILED ] {}", cli.name);
        }
    }
    Ok(std::process::ExitCode::from(report.exit_code()))
}

fn print_programs(cli: &Cli) -> Result<std::process::ExitCode> {
    let content = std::fs::read_to_string(&cli.file)
        .with_context(|| format!("read test file: {}", cli.file))?;
    let programs = program::generate(&content, &cli.name)?;
    for p in &programs {
        println!("// {}:{}: {}", cli.file, p.report_line(), p.fragment);
        if let Some(msg) = &p.expected_message {
            println!("// expects: {msg}");
        }
        println!("{}", p.source);
    }
    Ok(std::process::ExitCode::SUCCESS)
}
