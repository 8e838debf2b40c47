//! Command-line driver for the toolchain: runs a source file (or an
//! interactive session) through the lexer, parser, checker and one of the
//! two interpretation backends.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use seen_checker::Checker;
use seen_common::{Diagnostics, SeenError};
use seen_ir::{generate, optimize};
use seen_parser::parse_program;

/// Seen Programming Language CLI
#[derive(Parser)]
#[command(name = "seen")]
#[command(about = "Run or inspect a Seen program", long_about = None)]
struct Cli {
    /// Source file to run. Omitted: read expressions from stdin instead.
    file: Option<PathBuf>,

    /// Sets the level of verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Run the tree-walking AST interpreter instead of the bytecode one.
    #[arg(long, conflicts_with = "bytecode")]
    ast: bool,

    /// Lower to IR, optimize, and run the bytecode interpreter (default).
    #[arg(long, conflicts_with = "ast")]
    bytecode: bool,

    /// Print the chosen representation instead of running it.
    #[arg(long)]
    dump: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match cli.verbose {
        0 => log::set_max_level(log::LevelFilter::Info),
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let outcome = match &cli.file {
        Some(path) => run_file(path, &cli),
        None => run_repl(&cli).map_err(anyhow::Error::msg),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error:?}");
            ExitCode::FAILURE
        }
    }
}

fn run_file(path: &PathBuf, cli: &Cli) -> Result<()> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to open '{}'", path.display()))?;
    run_source(&source, cli).map_err(anyhow::Error::from)
}

/// Reads expressions from stdin, one at a time, and runs each one in
/// isolation as soon as its braces balance. A diagnostic in one submission
/// does not poison the ones that follow.
fn run_repl(cli: &Cli) -> Result<(), String> {
    let stdin = io::stdin();
    let mut lock = stdin.lock();
    let mut had_error = false;

    loop {
        print!("seen> ");
        io::stdout().flush().map_err(|err| err.to_string())?;

        let submission = match read_submission(&mut lock)? {
            Some(source) => source,
            None => break,
        };
        if submission.trim().is_empty() {
            continue;
        }

        if let Err(err) = run_source(&submission, cli) {
            eprintln!("{err}");
            had_error = true;
        }
    }

    if had_error {
        Err("one or more submissions reported errors".to_string())
    } else {
        Ok(())
    }
}

/// Accumulates lines until the running count of `{` and `}` returns to zero,
/// so a multi-line `if`/`while`/`fn` body can be typed across several lines.
fn read_submission(lock: &mut impl BufRead) -> Result<Option<String>, String> {
    let mut source = String::new();
    let mut depth: i64 = 0;
    let mut seen_any_brace = false;

    loop {
        let mut line = String::new();
        let bytes_read = lock
            .read_line(&mut line)
            .map_err(|err| format!("failed to read from stdin: {err}"))?;
        if bytes_read == 0 {
            return Ok(if source.trim().is_empty() { None } else { Some(source) });
        }

        for ch in line.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    seen_any_brace = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        source.push_str(&line);

        if depth <= 0 && (seen_any_brace || line.trim_end().ends_with(';')) {
            return Ok(Some(source));
        }
    }
}

fn run_source(source: &str, cli: &Cli) -> Result<(), SeenError> {
    let lexed = seen_lexer::lex(source, 0);
    if !lexed.diagnostics.is_empty() {
        return Err(diagnostics_error(lexed.diagnostics));
    }

    let parsed = parse_program(lexed.tokens);
    if !parsed.diagnostics.is_empty() {
        return Err(diagnostics_error(parsed.diagnostics));
    }

    let mut checker = Checker::new();
    checker.check_program(&parsed.program)?;
    if !checker.diagnostics().is_empty() {
        return Err(diagnostics_error(checker.diagnostics().clone()));
    }

    if cli.ast {
        if cli.dump {
            println!("{:#?}", parsed.program);
        } else {
            let value = seen_interpreter::tree::interpret(&parsed.program)?;
            println!("{value}");
        }
        return Ok(());
    }

    let ir = optimize(generate(&parsed.program));
    if cli.dump {
        println!("{ir}");
        return Ok(());
    }
    let value = seen_interpreter::bytecode::interpret(&ir)?;
    println!("{value}");
    Ok(())
}

fn diagnostics_error(diagnostics: Diagnostics) -> SeenError {
    log::debug!("{} diagnostic(s) reported", diagnostics.len());
    SeenError::diagnostics(diagnostics)
}
