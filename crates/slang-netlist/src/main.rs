//! The `slang` frontend command.
//!
//! The heavy lifting of parsing and type checking SystemVerilog is done by
//! the external driver, which hands over its checked AST as JSON. This
//! binary deserializes the compilation, optionally re-dumps the AST, runs
//! elaboration and writes the netlist IR text dump.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};

use slang_netlist::ast::Compilation;

#[derive(Parser, Debug)]
#[command(
    name = "slang",
    version,
    about = "read a checked SystemVerilog AST and emit netlist IR"
)]
struct Cli {
    /// Path to the checked-AST JSON file produced by the driver
    #[arg(value_name = "AST_FILE")]
    ast: PathBuf,

    /// Serialize the AST back to stdout before elaboration
    #[arg(long)]
    dump_ast: bool,

    /// Write the IR dump here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    #[command(flatten)]
    verbosity: Verbosity<WarnLevel>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(cli.verbosity.log_level_filter())
        .init();

    let text = match fs::read_to_string(&cli.ast) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("slang: cannot read {}: {}", cli.ast.display(), err);
            return ExitCode::FAILURE;
        }
    };

    // The external checker is the recovery boundary: a malformed or
    // diagnostic-bearing AST file skips elaboration entirely.
    let comp: Compilation = match serde_json::from_str(&text) {
        Ok(comp) => comp,
        Err(err) => {
            eprintln!("slang: malformed AST input: {}", err);
            return ExitCode::FAILURE;
        }
    };

    if cli.dump_ast {
        match serde_json::to_string_pretty(&comp) {
            Ok(json) => println!("{}", json),
            Err(err) => {
                eprintln!("slang: cannot serialize AST: {}", err);
                return ExitCode::FAILURE;
            }
        }
    }

    let design = match slang_netlist::lower(&comp) {
        Ok(design) => design,
        Err(err) => {
            eprintln!("slang: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let rendered = design.to_string();
    match &cli.output {
        Some(path) => {
            if let Err(err) = fs::write(path, rendered) {
                eprintln!("slang: cannot write {}: {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        }
        None => print!("{}", rendered),
    }
    ExitCode::SUCCESS
}
