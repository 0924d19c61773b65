use std::env;
use std::sync::atomic::Ordering;

use crate::error_formatting;
use crate::input;
use crate::line_reader::{LineReadStatus, LineReader};
use crate::lox::{Lox, LoxError, Mode};

static HISTORY_ENV: &str = "LOXI_HISTORY";

/// `$LOXI_HISTORY`, else `~/.loxi_history`.
pub fn history_file() -> String {
    if let Ok(path) = env::var(HISTORY_ENV) {
        return path;
    }
    match env::var("HOME") {
        Ok(home) => format!("{}/.loxi_history", home),
        Err(_) => ".loxi_history".to_string(),
    }
}

/// Ctrl-C stops the running program instead of killing the process.
pub fn install_interrupt_handler(lox: &Lox) {
    let interrupt_clone = lox.interrupt_flag();
    if let Err(err) = ctrlc::set_handler(move || {
        interrupt_clone.store(true, Ordering::Release);
    }) {
        tracing::warn!(%err, "Ctrl-C handler not installed");
    }
}

/// Writes each printed line to stdout as soon as the program prints it.
pub fn stream_to_stdout(lox: &mut Lox) {
    lox.stream_output(Box::new(|line: &str| println!("{}", line)));
}

/// Reads and runs lines in one session until end of input or `exit(n)`.
/// Returns the process exit status.
pub fn run(mode: Mode) -> i32 {
    let mut lox = Lox::new();
    println!(
        "============================================\n\
         Welcome to lox! using tree-walk interpreter.\n\
         ============================================\n"
    );

    install_interrupt_handler(&lox);
    stream_to_stdout(&mut lox);

    let mut line_reader = LineReader::new(&history_file(), ">>> ");
    loop {
        match line_reader.readline() {
            LineReadStatus::Line(line) => {
                if line.trim().is_empty() {
                    continue;
                }

                let res = lox.run_source(&line, mode);
                let input = input::Input {
                    source: input::Source::Repl,
                    content: line,
                };
                error_formatting::report(lox.diagnostics(), &input);

                if let Err(LoxError::Exit(code)) = res {
                    return code;
                }
            }
            LineReadStatus::Interrupted => continue,
            LineReadStatus::Done => return 0,
        }
    }
}
