//! StreamLanguage CLI
//!
//! Runs programs given as serialized AST documents (JSON).

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use streamlang::config::TerminationCheck;
use streamlang::error::render_error;
use streamlang::{Error, Interpreter, InterpreterConfig, Outcome, Program};

#[derive(Parser)]
#[command(name = "streamlang", version, about = "StreamLanguage interpreter")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Type check and evaluate a program
    Run {
        /// AST document to run
        file: PathBuf,
        /// Recursion cap per function name
        #[arg(long, default_value_t = InterpreterConfig::DEFAULT_MAX_RECURSION_DEPTH)]
        max_depth: usize,
        /// Skip the static pass
        #[arg(long)]
        no_type_check: bool,
        /// Policy for self-recursive functions without a return path
        #[arg(long, value_enum, default_value_t = TerminationCheck::Warn)]
        termination: TerminationCheck,
    },
    /// Run only the static pass
    Check {
        /// AST document to check
        file: PathBuf,
    },
    /// Decode and pretty-print an AST document (debug)
    Dump {
        /// AST document to dump
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run { file, max_depth, no_type_check, termination } => {
            let config = InterpreterConfig::new()
                .max_recursion_depth(max_depth)
                .type_check(!no_type_check)
                .termination_check(termination);
            run_file(&file, config)
        }
        Command::Check { file } => check_file(&file),
        Command::Dump { file } => dump_file(&file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", render_error(&e));
            ExitCode::FAILURE
        }
    }
}

/// Install the fmt subscriber; `RUST_LOG` overrides the default `warn` level.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load(path: &Path) -> streamlang::Result<Program> {
    let source = std::fs::read_to_string(path)?;
    Ok(Program::from_json(&source)?)
}

fn run_file(path: &Path, config: InterpreterConfig) -> streamlang::Result<()> {
    let program = load(path)?;
    let mut interp = Interpreter::with_config(config);
    match interp.run(&program)? {
        Outcome::Completed(Some(value)) => {
            println!("{value}");
            Ok(())
        }
        Outcome::Completed(None) => Ok(()),
        Outcome::Uncaught(exc) => Err(Error::Uncaught(exc)),
    }
}

fn check_file(path: &Path) -> streamlang::Result<()> {
    let program = load(path)?;
    let ty = Interpreter::new().check(&program)?;

    println!("✓ {} type checks successfully ({ty})", path.display());
    Ok(())
}

fn dump_file(path: &Path) -> streamlang::Result<()> {
    let program = load(path)?;
    println!("{}", program.to_json()?);
    Ok(())
}
