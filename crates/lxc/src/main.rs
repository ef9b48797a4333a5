//! The Lx toolchain CLI.
//!
//! - `lxc check <file>` - load and type-check a module tree
//! - `lxc test <file>` - check, then run the entry module's tests and
//!   properties
//! - `lxc run <file> <function> [args…]` - check, then invoke a function
//!   (arguments are JSON values; bare words are taken as strings)
//!
//! Options: `--seed=<u32>`, `--scheduler=immediate|deterministic`,
//! `--input=source|ast`, `--format=text|json`, `--trace`, `--root=<dir>`
//! (repeatable). Exit code 0 on success, 1 on any diagnostic or runtime
//! failure.

mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use lx_common::Diagnostic;
use lx_interp::{Interp, OutputFormat, RuntimeOptions, SchedulerMode};
use lx_interp::value::Value;
use lx_loader::{JsonAstSource, Loader, Program};

use crate::report::{flush_runtime_output, report_diagnostics, report_outcomes, Format};

#[derive(Parser)]
#[command(name = "lxc", version, about = "The Lx toolchain")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Seed for property generation and deterministic scheduling.
    #[arg(long, global = true)]
    seed: Option<u32>,

    /// Actor delivery scheduling mode.
    #[arg(long, global = true, value_enum, default_value = "immediate")]
    scheduler: SchedulerArg,

    /// Input kind: `ast` decodes JSON-encoded module ASTs.
    #[arg(long, global = true, value_enum, default_value = "ast")]
    input: InputArg,

    /// Output format for diagnostics, logs, and outcomes.
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: FormatArg,

    /// Record a step for every user function call.
    #[arg(long, global = true)]
    trace: bool,

    /// Additional module search roots (repeatable).
    #[arg(long = "root", global = true)]
    roots: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and type-check a module tree.
    Check {
        /// Entry module file.
        file: PathBuf,
    },
    /// Type-check, then run the entry module's tests and properties.
    Test {
        /// Entry module file.
        file: PathBuf,
    },
    /// Type-check, then invoke a function with JSON-encoded arguments.
    Run {
        /// Entry module file.
        file: PathBuf,
        /// Function name, bare or qualified.
        function: String,
        /// Arguments as JSON values (bare words read as strings).
        args: Vec<String>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SchedulerArg {
    Immediate,
    Deterministic,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputArg {
    Source,
    Ast,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = match cli.format {
        FormatArg::Text => Format::Text,
        FormatArg::Json => Format::Json,
    };

    if cli.input == InputArg::Source {
        let diag = Diagnostic::new(
            "no source parser is linked into this build; re-run with --input=ast \
             and a JSON-encoded module AST",
        );
        report_diagnostics(&[diag], None, format);
        return ExitCode::FAILURE;
    }

    let entry = match &cli.command {
        Commands::Check { file } | Commands::Test { file } | Commands::Run { file, .. } => {
            file.clone()
        }
    };

    // Load: parse every module, link, build the symbol table.
    let parser = JsonAstSource;
    let loader = Loader::new(&parser, cli.roots.clone());
    let program = match loader.load(&entry) {
        Ok(program) => program,
        Err(diag) => {
            report_diagnostics(&[diag], None, format);
            return ExitCode::FAILURE;
        }
    };

    // Check: all diagnostics at once, then stop if any.
    let diagnostics = lx_typeck::check_program(&program);
    if report_diagnostics(&diagnostics, Some(&program), format) {
        return ExitCode::FAILURE;
    }

    let options = RuntimeOptions {
        scheduler: match cli.scheduler {
            SchedulerArg::Immediate => SchedulerMode::Immediate,
            SchedulerArg::Deterministic => SchedulerMode::Deterministic,
        },
        format: match cli.format {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        },
        seed: cli.seed,
        trace: cli.trace,
    };

    match &cli.command {
        Commands::Check { .. } => ExitCode::SUCCESS,
        Commands::Test { .. } => run_test_command(&program, options, format),
        Commands::Run { function, args, .. } => {
            run_run_command(&program, options, format, function, args)
        }
    }
}

fn run_test_command(program: &Program, options: RuntimeOptions, format: Format) -> ExitCode {
    let mut interp = Interp::new(program, options);
    let outcomes = lx_interp::run_tests(&mut interp);
    flush_runtime_output(&interp, format);
    if report_outcomes(&outcomes, format) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run_run_command(
    program: &Program,
    options: RuntimeOptions,
    format: Format,
    function: &str,
    raw_args: &[String],
) -> ExitCode {
    let mut values = Vec::with_capacity(raw_args.len());
    for raw in raw_args {
        match decode_argument(raw) {
            Ok(value) => values.push(value),
            Err(diag) => {
                report_diagnostics(&[diag], None, format);
                return ExitCode::FAILURE;
            }
        }
    }

    let mut interp = Interp::new(program, options);
    let result = interp.run_function(function, values);
    flush_runtime_output(&interp, format);
    match result {
        Ok(value) => {
            match format {
                Format::Json => {
                    let json = lx_interp::json::value_to_json(&value)
                        .unwrap_or_else(|_| serde_json::json!(value.to_string()));
                    println!("{}", serde_json::json!({"kind": "result", "value": json}));
                }
                Format::Text => println!("{}", value),
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            let file = program.entry().path.display().to_string();
            report_diagnostics(&[error.to_diagnostic(Some(&file))], Some(program), format);
            ExitCode::FAILURE
        }
    }
}

/// CLI arguments are JSON values; anything that does not parse as JSON is
/// taken as a bare string.
fn decode_argument(raw: &str) -> Result<Value, Diagnostic> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => lx_interp::json::json_to_value(&json)
            .map_err(|e| Diagnostic::new(format!("invalid argument `{}`: {}", raw, e))),
        Err(_) => Ok(Value::Str(raw.to_string())),
    }
}
