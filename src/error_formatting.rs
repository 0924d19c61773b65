use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
use crate::input;
use crate::lox::LoxError;

use colored::*;

fn format_input(input: &input::Input, line: usize, col: i64) {
    let source_line = match line.checked_sub(1).and_then(|idx| input.content.lines().nth(idx)) {
        Some(source_line) => source_line,
        None => return,
    };

    eprintln!("in {}, at line {}, column {}:", input.name(), line, col + 1);
    eprintln!("{}", source_line);
    eprint!("{:~<1$}", "".blue().bold(), col as usize);
    eprintln!("{}", "^".blue().bold());
}

fn format_diagnostic(diagnostic: &Diagnostic, input: &input::Input) {
    let label = match diagnostic.severity {
        Severity::Error => "error".red().bold(),
        Severity::Warning => "warning".yellow().bold(),
    };
    eprintln!("loxi: {}: {}", label, diagnostic.to_string().white().bold());

    if let Some(col) = diagnostic.col {
        format_input(input, diagnostic.line, col);
    }
}

/// Writes program output to stdout, then every error and warning to stderr
/// with the offending source line.
pub fn report(diagnostics: &Diagnostics, input: &input::Input) {
    print!("{}", diagnostics.stdout());
    for diagnostic in diagnostics.entries() {
        format_diagnostic(diagnostic, input);
    }
}

pub fn format_lox_error(err: &LoxError) {
    match err {
        LoxError::Io { .. } => eprintln!("loxi: {}: {}", "io error".red().bold(), err),
        LoxError::Static(_) | LoxError::Runtime => {
            eprintln!("loxi: {}", err.to_string().red().bold())
        }
        LoxError::Exit(_) => {}
    }
}
