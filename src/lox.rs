use std::panic;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use crate::analyzer;
use crate::ast_printer::AstPrinter;
use crate::diagnostics::Diagnostics;
use crate::interpreter::{ErrorKind, Interpreter, OutputSink};
use crate::parser;
use crate::scanner;

/// Stack reserved for the thread that runs programs. Every Lox call nests
/// several evaluator frames, so `MAX_CALL_DEPTH` calls need far more than
/// the default thread stack.
pub const PROGRAM_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Runs `f` on a thread with `PROGRAM_STACK_SIZE` of stack and waits for it.
/// A panic in `f` is resumed on the caller.
pub fn with_program_stack<T, F>(f: F) -> std::io::Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let handle = thread::Builder::new()
        .name("lox-program".to_string())
        .stack_size(PROGRAM_STACK_SIZE)
        .spawn(f)?;
    match handle.join() {
        Ok(value) => Ok(value),
        Err(payload) => panic::resume_unwind(payload),
    }
}

/// How far a source text travels down the pipeline.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Mode {
    /// Print the token stream.
    Tokens,
    /// Print the parsed program.
    Ast,
    /// Scan, parse and analyze, but do not run.
    Analyze,
    Run,
}

#[derive(Debug, thiserror::Error)]
pub enum LoxError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} error(s) before running")]
    Static(usize),
    #[error("runtime error")]
    Runtime,
    #[error("exit({0})")]
    Exit(i32),
}

impl LoxError {
    /// Process exit status, sysexits style.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoxError::Io { .. } => 74,
            LoxError::Static(_) => 65,
            LoxError::Runtime => 70,
            LoxError::Exit(code) => *code,
        }
    }
}

/// A session: one interpreter whose globals outlive each `run_source`.
/// Output and diagnostics of the latest run are in `diagnostics()`.
pub struct Lox {
    interpreter: Interpreter,
    diagnostics: Diagnostics,
}

impl Default for Lox {
    fn default() -> Lox {
        Lox::new()
    }
}

impl Lox {
    pub fn new() -> Lox {
        Lox {
            interpreter: Interpreter::default(),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Set from another thread to stop the running program.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interpreter.interrupted)
    }

    /// Back to a fresh session.
    pub fn reset(&mut self) {
        self.interpreter.reset();
        self.diagnostics.reset();
    }

    /// Printed lines go straight to `sink` from now on; `diagnostics()`
    /// then only holds what the driver itself prints, such as tokens.
    pub fn stream_output(&mut self, sink: OutputSink) {
        self.interpreter.set_output(sink);
    }

    /// Runs the pipeline up to `mode`. Any lexical, syntax or static error
    /// stops before interpretation; a syntax error also skips analysis.
    pub fn run_source(&mut self, source: &str, mode: Mode) -> Result<(), LoxError> {
        let _span = tracing::debug_span!("run_source", ?mode).entered();
        self.diagnostics.reset();

        let tokens = scanner::scan_tokens(source, &mut self.diagnostics);
        tracing::debug!(tokens = tokens.len(), "scanned");
        if mode == Mode::Tokens {
            for token in tokens.iter() {
                self.diagnostics.print(format!("{:?}", token));
            }
            return self.static_result();
        }

        let stmts = parser::parse(tokens, &mut self.diagnostics);
        tracing::debug!(stmts = stmts.len(), "parsed");
        if mode == Mode::Ast {
            self.diagnostics
                .print(AstPrinter::multi_line().print_program(&stmts));
            return self.static_result();
        }
        self.static_result()?;

        let resolutions = analyzer::analyze(&stmts, self.interpreter.environment(), &mut self.diagnostics);
        self.static_result()?;
        if mode == Mode::Analyze {
            return Ok(());
        }

        match self
            .interpreter
            .interpret(&stmts, resolutions, &mut self.diagnostics)
        {
            Ok(()) => Ok(()),
            Err(ErrorKind::Exit(code)) => Err(LoxError::Exit(code)),
            Err(ErrorKind::Runtime) | Err(ErrorKind::Internal) => Err(LoxError::Runtime),
        }
    }

    fn static_result(&self) -> Result<(), LoxError> {
        if self.diagnostics.has_error() {
            return Err(LoxError::Static(self.diagnostics.error_count()));
        }
        Ok(())
    }
}
