extern crate clap;

use clap::{App, Arg};

use loxi::error_formatting;
use loxi::input;
use loxi::lox::{self, Lox, LoxError, Mode};
use loxi::repl;

static INPUT_STR: &str = "INPUT";
static SHOW_TOKENS_STR: &str = "tokens";
static SHOW_AST_STR: &str = "ast";
static ANALYZE_ONLY_STR: &str = "analyze-only";
static LITERAL_INPUT: &str = "c";

fn main() {
    loxi::init_tracing();

    let matches = App::new("loxi")
        .version("0.1.0")
        .about("lox language interpreter")
        .author("Thomas Peters")
        .arg(
            Arg::with_name(INPUT_STR)
                .help("sets input file to use; starts a REPL when absent")
                .required(false)
                .index(1),
        )
        .arg(
            Arg::with_name(SHOW_TOKENS_STR)
                .long("--show-tokens")
                .takes_value(false)
                .help("show the token stream"),
        )
        .arg(
            Arg::with_name(SHOW_AST_STR)
                .long("--show-ast")
                .takes_value(false)
                .help("show the AST"),
        )
        .arg(
            Arg::with_name(ANALYZE_ONLY_STR)
                .long("--analyze-only")
                .takes_value(false)
                .help("report static errors and warnings without running"),
        )
        .arg(
            Arg::with_name(LITERAL_INPUT)
                .short("-e")
                .takes_value(true)
                .conflicts_with(INPUT_STR)
                .help("run the given code instead of a file"),
        )
        .get_matches();

    let mode = if matches.is_present(SHOW_TOKENS_STR) {
        Mode::Tokens
    } else if matches.is_present(SHOW_AST_STR) {
        Mode::Ast
    } else if matches.is_present(ANALYZE_ONLY_STR) {
        Mode::Analyze
    } else {
        Mode::Run
    };

    let input = if let Some(code) = matches.value_of(LITERAL_INPUT) {
        Some(input::Input {
            source: input::Source::Literal,
            content: code.to_string(),
        })
    } else if let Some(input_file) = matches.value_of(INPUT_STR) {
        match std::fs::read_to_string(input_file) {
            Ok(content) => Some(input::Input {
                source: input::Source::File(input_file.to_string()),
                content,
            }),
            Err(source) => {
                let err = LoxError::Io {
                    path: input_file.to_string(),
                    source,
                };
                error_formatting::format_lox_error(&err);
                std::process::exit(err.exit_code());
            }
        }
    } else {
        None
    };

    let status = match input {
        Some(input) => lox::with_program_stack(move || run_input(&input, mode)),
        None => lox::with_program_stack(move || repl::run(mode)),
    };
    match status {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("loxi: could not start the interpreter thread: {}", err);
            std::process::exit(71);
        }
    }
}

fn run_input(input: &input::Input, mode: Mode) -> i32 {
    let mut lox = Lox::new();
    repl::install_interrupt_handler(&lox);
    repl::stream_to_stdout(&mut lox);

    let res = lox.run_source(&input.content, mode);
    error_formatting::report(lox.diagnostics(), input);

    match res {
        Ok(()) => 0,
        Err(err) => {
            error_formatting::format_lox_error(&err);
            err.exit_code()
        }
    }
}
