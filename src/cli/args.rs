//! Defines the command-line arguments and subcommands for the Quasi CLI.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "quasi",
    version,
    about = "Expand macros, generate hygienic symbols and disassemble Quasi source."
)]
pub struct QuasiArgs {
    /// JSON file with expansion settings.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Abort expansion of a form after this many steps.
    #[arg(long, global = true)]
    pub step_limit: Option<usize>,

    /// Module name used for macro lookup and compilation.
    #[arg(long, global = true)]
    pub module: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the symbolic tree for a source file.
    Ast {
        #[arg(required = true)]
        file: PathBuf,
        /// Emit JSON instead of source text.
        #[arg(long)]
        json: bool,
    },
    /// Print every form fully macro-expanded.
    Expand {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Print every form after at most one expansion step.
    #[command(name = "expand-1")]
    ExpandOnce {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Show a stepwise macro expansion trace with diffs.
    Trace {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Compile a source file and print the host IR.
    Disassemble {
        #[arg(required = true)]
        file: PathBuf,
        /// Print host source text instead of the structural dump.
        #[arg(long)]
        codegen: bool,
    },
    /// Generate fresh hygienic symbols.
    Gensym {
        /// Readable fragment embedded in each name.
        #[arg(default_value = "")]
        hint: String,
        /// How many names to generate.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// List the macros visible to a source file, with their documentation.
    Macros {
        file: Option<PathBuf>,
    },
}
