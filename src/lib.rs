pub mod analyzer;
pub mod ast_printer;
pub mod builtins;
pub mod callable;
pub mod diagnostics;
pub mod environment;
pub mod error_formatting;
pub mod expr;
pub mod input;
pub mod interpreter;
pub mod line_reader;
pub mod lox;
pub mod parser;
pub mod repl;
pub mod scanner;
pub mod value;
pub mod walker;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Installs a stderr subscriber filtered by `RUST_LOG`. Without `RUST_LOG`
/// nothing is installed.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_level(true),
                )
                .with(filter)
                .init();
        }
    });
}
