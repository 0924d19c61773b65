use std::fmt;

use crate::scanner::{Token, TokenType};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "Error"),
            Severity::Warning => write!(f, "Warning"),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Location {
    Line,
    End,
    Lexeme(String),
}

/// One reported problem. `col` is known only for token-anchored reports.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: usize,
    pub col: Option<i64>,
    pub location: Location,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[line {}] {}", self.line, self.severity)?;
        match &self.location {
            Location::Line => {}
            Location::End => write!(f, " at end")?,
            Location::Lexeme(lexeme) => write!(f, " at '{}'", lexeme)?,
        }
        write!(f, ": {}", self.message)
    }
}

/// Collects everything a run produces: program output from `print` and
/// every error or warning from the four pipeline stages. Nothing here
/// touches the real console.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    stdout: String,
    print_count: usize,
    error_count: usize,
    warning_count: usize,
}

impl Diagnostics {
    pub fn error_at_line(&mut self, line: usize, message: &str) {
        self.push(Severity::Error, line, None, Location::Line, message)
    }

    pub fn error_at_token(&mut self, token: &Token, message: &str) {
        self.push_at_token(Severity::Error, token, message)
    }

    pub fn warning_at_token(&mut self, token: &Token, message: &str) {
        self.push_at_token(Severity::Warning, token, message)
    }

    pub fn print<T: fmt::Display>(&mut self, value: T) {
        self.print_count += 1;
        self.stdout.push_str(&value.to_string());
        self.stdout.push('\n');
    }

    pub fn has_error(&self) -> bool {
        self.error_count > 0
    }

    pub fn has_warning(&self) -> bool {
        self.warning_count > 0
    }

    pub fn has_print(&self) -> bool {
        !self.stdout.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn print_count(&self) -> usize {
        self.print_count
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> String {
        self.entries
            .iter()
            .map(|diagnostic| format!("{}\n", diagnostic))
            .collect()
    }

    pub fn reset(&mut self) {
        *self = Diagnostics::default();
    }

    fn push_at_token(&mut self, severity: Severity, token: &Token, message: &str) {
        let location = if token.ty == TokenType::Eof {
            Location::End
        } else {
            Location::Lexeme(token.lexeme.clone())
        };
        let col = if token.col >= 0 { Some(token.col) } else { None };
        self.push(severity, token.line, col, location, message)
    }

    fn push(
        &mut self,
        severity: Severity,
        line: usize,
        col: Option<i64>,
        location: Location,
        message: &str,
    ) {
        match severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
        }
        tracing::trace!(%severity, line, message, "diagnostic");
        self.entries.push(Diagnostic {
            severity,
            line,
            col,
            location,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_formats() {
        let mut diagnostics = Diagnostics::default();
        let ident = Token::new(TokenType::Identifier, "foo", None, 3, 4);
        let eof = Token::new(TokenType::Eof, "", None, 7, 0);

        diagnostics.error_at_line(1, "Unexpected character '@'.");
        diagnostics.error_at_token(&ident, "Undefined identifier 'foo'.");
        diagnostics.warning_at_token(&ident, "foo is unused.");
        diagnostics.error_at_token(&eof, "Expect expression.");

        assert_eq!(
            diagnostics.stderr(),
            "[line 1] Error: Unexpected character '@'.\n\
             [line 3] Error at 'foo': Undefined identifier 'foo'.\n\
             [line 3] Warning at 'foo': foo is unused.\n\
             [line 7] Error at end: Expect expression.\n"
        );
        assert_eq!(diagnostics.error_count(), 3);
        assert_eq!(diagnostics.warning_count(), 1);
    }

    #[test]
    fn test_print_and_reset() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.print(7);
        diagnostics.print("hi");
        assert_eq!(diagnostics.stdout(), "7\nhi\n");
        assert_eq!(diagnostics.print_count(), 2);
        assert!(!diagnostics.has_error());

        diagnostics.error_at_line(2, "oops");
        diagnostics.reset();
        assert!(!diagnostics.has_error());
        assert!(!diagnostics.has_print());
        assert_eq!(diagnostics.stderr(), "");
    }
}
