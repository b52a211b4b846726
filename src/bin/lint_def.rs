//! Check MAVLink definition files for semantic problems.
//!
//! Usage:
//!   lint_def [OPTIONS] [FILE.mavdef ...]
//!   lint_def < file.mavdef
//!
//! Options:
//!   --human, -H  Human-readable output
//!
//! If no files are given, reads from stdin. Exits with status 1 when any error-level
//! finding (or a syntax error) is reported.

use mavdissect::lint::{lint, LintMessage, Severity};
use mavdissect::GeneratorConfig;
use std::io::{self, Read};
use std::path::Path;

#[derive(Clone, Copy)]
enum OutputStyle {
    Compact,
    Human,
}

fn print_message(path: &str, m: &LintMessage, style: OutputStyle) {
    let severity_str = match m.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };
    match style {
        OutputStyle::Compact => {
            println!(
                "{}:{}:{}: {}: {} [{}]",
                path,
                m.line,
                m.column,
                severity_str,
                m.message,
                m.rule.id()
            );
        }
        OutputStyle::Human => {
            println!("  {} {}:{}: {}", path, m.line, m.column, m.message);
            println!("    rule: {} ({})", m.rule.id(), severity_str);
        }
    }
}

#[derive(Default)]
struct Totals {
    errors: usize,
    warnings: usize,
}

/// Lint one source; returns true when it has errors.
fn lint_source(path: &str, src: &str, config: &GeneratorConfig, style: OutputStyle, totals: &mut Totals) -> bool {
    let messages = match lint(src, config) {
        Ok(m) => m,
        Err(e) => {
            println!("{}: error: {}", path, e);
            totals.errors += 1;
            return true;
        }
    };
    for m in &messages {
        match m.severity {
            Severity::Error => totals.errors += 1,
            Severity::Warning => totals.warnings += 1,
        }
        print_message(path, m, style);
    }
    messages.iter().any(|m| m.severity == Severity::Error)
}

fn main() -> anyhow::Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let style = if let Some(pos) = args.iter().position(|a| a == "--human" || a == "-H") {
        args.remove(pos);
        OutputStyle::Human
    } else {
        OutputStyle::Compact
    };
    let config = GeneratorConfig::default();
    let mut totals = Totals::default();
    let mut has_error = false;

    if args.is_empty() {
        let mut src = String::new();
        io::stdin().read_to_string(&mut src)?;
        has_error |= lint_source("<stdin>", &src, &config, style, &mut totals);
    } else {
        for path in &args {
            let path = Path::new(path);
            let src = match std::fs::read_to_string(path) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("{}: {}", path.display(), e);
                    has_error = true;
                    continue;
                }
            };
            has_error |= lint_source(&path.display().to_string(), &src, &config, style, &mut totals);
        }
    }

    if totals.errors > 0 || totals.warnings > 0 {
        eprintln!("lint: {} error(s), {} warning(s)", totals.errors, totals.warnings);
    }
    if has_error {
        std::process::exit(1);
    }
    Ok(())
}
