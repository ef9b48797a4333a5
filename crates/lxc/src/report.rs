//! Diagnostic and outcome reporting.
//!
//! Text mode renders labeled ariadne reports when the module AST embeds
//! its source text, and `file:line:col: message` lines otherwise. JSON
//! mode emits one record per line.

use std::ops::Range;

use ariadne::{Config, Label, Report, ReportKind, Source};

use lx_common::Diagnostic;
use lx_interp::TestOutcome;
use lx_loader::Program;

/// Whether output is plain text or line-delimited JSON records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

/// Print every diagnostic; returns whether any were printed.
pub fn report_diagnostics(diagnostics: &[Diagnostic], program: Option<&Program>, format: Format) -> bool {
    for diagnostic in diagnostics {
        match format {
            Format::Json => {
                println!(
                    "{}",
                    serde_json::to_string(diagnostic).expect("diagnostics serialize")
                );
            }
            Format::Text => report_text(diagnostic, program),
        }
    }
    !diagnostics.is_empty()
}

fn report_text(diagnostic: &Diagnostic, program: Option<&Program>) {
    // A labeled report needs the module's embedded source plus a span.
    if let (Some(program), Some(file), Some(span)) =
        (program, diagnostic.file.as_deref(), diagnostic.span())
    {
        let source = program
            .modules
            .iter()
            .find(|m| m.path.display().to_string() == file)
            .and_then(|m| m.module.source.as_deref());
        if let Some(source) = source {
            if let Some(offset) = span.offset_in(source) {
                let range: Range<usize> = offset..(offset + 1).min(source.len().max(offset + 1));
                let _ = Report::<Range<usize>>::build(ReportKind::Error, range.clone())
                    .with_config(Config::default())
                    .with_message(&diagnostic.message)
                    .with_label(Label::new(range).with_message(&diagnostic.message))
                    .finish()
                    .eprint(Source::from(source));
                return;
            }
        }
    }
    eprintln!("error: {}", diagnostic);
}

/// Print test outcomes; returns whether any failed.
pub fn report_outcomes(outcomes: &[TestOutcome], format: Format) -> bool {
    let mut failed = false;
    for outcome in outcomes {
        if !outcome.success {
            failed = true;
        }
        match format {
            Format::Json => {
                println!("{}", serde_json::to_string(outcome).expect("outcomes serialize"));
            }
            Format::Text => {
                let kind = match outcome.kind {
                    lx_interp::OutcomeKind::Test => "test",
                    lx_interp::OutcomeKind::Property => "property",
                };
                match &outcome.error {
                    None => println!("PASS {} {}", kind, outcome.name),
                    Some(error) => println!("FAIL {} {}: {}", kind, outcome.name, error),
                }
            }
        }
    }
    if format == Format::Text {
        let passed = outcomes.iter().filter(|o| o.success).count();
        println!("{} passed, {} failed", passed, outcomes.len() - passed);
    }
    failed
}

/// Flush collected structured logs and trace steps (JSON mode collects
/// them; text mode already printed logs as they happened).
pub fn flush_runtime_output(interp: &lx_interp::Interp<'_>, format: Format) {
    if format == Format::Json {
        for record in &interp.rt.logs {
            println!("{}", serde_json::to_string(record).expect("log records serialize"));
        }
        for step in &interp.rt.trace {
            println!("{}", serde_json::to_string(step).expect("trace steps serialize"));
        }
    } else if interp.rt.options.trace {
        for step in &interp.rt.trace {
            let indent = "  ".repeat(step.depth as usize);
            let args = step
                .bindings
                .iter()
                .map(|(name, value)| format!("{}: {}", name, value))
                .collect::<Vec<_>>()
                .join(", ");
            eprintln!("{}{}({}) -> {}", indent, step.call, args, step.result);
        }
    }
}
