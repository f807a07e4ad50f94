//! The Quasi Command-Line Interface.
//!
//! Every file-based command reads the whole file, loads its `defmacro` forms
//! into a fresh module table and works on the remaining forms.

use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::ast::AstNode;
use crate::cli::args::{Command, QuasiArgs};
use crate::compiler::{Disassembler, HostCompiler};
use crate::config::ExpansionConfig;
use crate::errors::{QuasiError, Result};
use crate::gensym::GensymGenerator;
use crate::macros::loader::load_macros;
use crate::macros::{ExpansionContext, MacroEnv, MacroExpander, MacroProvenance};
use crate::syntax::read_all_named;

pub mod args;
pub mod output;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "QUASI_LOG";

/// The main entry point for the CLI.
pub fn run() -> ExitCode {
    init_logging();
    let args = QuasiArgs::parse();

    match dispatch(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn dispatch(args: QuasiArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    match args.command {
        Command::Ast { file, json } => handle_ast(&file, json),
        Command::Expand { file } => handle_expand(&file, &config),
        Command::ExpandOnce { file } => handle_expand_once(&file, &config),
        Command::Trace { file } => handle_trace(&file, &config),
        Command::Disassemble { file, codegen } => handle_disassemble(&file, codegen, &config),
        Command::Gensym { hint, count } => {
            handle_gensym(&hint, count);
            Ok(())
        }
        Command::Macros { file } => handle_macros(file.as_deref(), &config),
    }
}

/// File settings first, then command-line overrides.
fn resolve_config(args: &QuasiArgs) -> Result<ExpansionConfig> {
    let mut config = match &args.config {
        Some(path) => ExpansionConfig::from_json_file(path)?,
        None => ExpansionConfig::default(),
    };
    if let Some(limit) = args.step_limit {
        config.step_limit = Some(limit);
    }
    if let Some(module) = &args.module {
        config.module = module.clone();
    }
    Ok(config)
}

// ============================================================================
// SESSION
// ============================================================================

/// A source file with its macros loaded.
struct Session {
    env: MacroEnv,
    forms: Vec<AstNode>,
}

impl Session {
    fn load(path: &Path, config: &ExpansionConfig) -> Result<Self> {
        let forms = read_file(path)?;
        let mut env = MacroEnv::new(config.module.clone());
        let forms = load_macros(forms, env.macros_mut())?;
        tracing::debug!(
            file = %path.display(),
            macros = env.macros().len(),
            forms = forms.len(),
            "loaded session"
        );
        Ok(Self { env, forms })
    }

    fn context(&self) -> ExpansionContext<'_> {
        ExpansionContext::new(self.env.module_name(), &self.env)
    }
}

fn read_file(path: &Path) -> Result<Vec<AstNode>> {
    let name = path.display().to_string();
    let source = std::fs::read_to_string(path).map_err(|e| QuasiError::io(name.clone(), e))?;
    Ok(read_all_named(&name, &source)?)
}

// ============================================================================
// COMMAND HANDLERS
// ============================================================================

fn handle_ast(path: &Path, json: bool) -> Result<()> {
    let forms = read_file(path)?;
    if json {
        let text = serde_json::to_string_pretty(&forms)?;
        println!("{text}");
        return Ok(());
    }
    for form in &forms {
        println!("{form}");
    }
    Ok(())
}

fn handle_expand(path: &Path, config: &ExpansionConfig) -> Result<()> {
    let session = Session::load(path, config)?;
    let expander = MacroExpander::from_config(config);
    let ctx = session.context();
    let mut trace = Vec::new();
    for form in &session.forms {
        let expanded = if config.record_trace {
            expander.expand_all_traced(form, &ctx, &mut trace)?
        } else {
            expander.expand_all(form, &ctx)?
        };
        println!("{expanded}");
    }
    if config.record_trace {
        output::print_trace(&trace).map_err(|e| QuasiError::io("<stdout>", e))?;
    }
    Ok(())
}

fn handle_expand_once(path: &Path, config: &ExpansionConfig) -> Result<()> {
    let session = Session::load(path, config)?;
    let expander = MacroExpander::from_config(config);
    let ctx = session.context();
    for form in &session.forms {
        println!("{}", expander.macroexpand_1(form, &ctx)?);
    }
    Ok(())
}

fn handle_trace(path: &Path, config: &ExpansionConfig) -> Result<()> {
    let session = Session::load(path, config)?;
    let expander = MacroExpander::from_config(config);
    let ctx = session.context();
    let mut trace = Vec::new();
    for form in &session.forms {
        expander.expand_all_traced(form, &ctx, &mut trace)?;
    }
    output::print_trace(&trace).map_err(|e| QuasiError::io("<stdout>", e))
}

fn handle_disassemble(path: &Path, codegen: bool, config: &ExpansionConfig) -> Result<()> {
    let session = Session::load(path, config)?;
    let compiler = HostCompiler::new()
        .with_macros(&session.env)
        .with_expander(MacroExpander::from_config(config));
    let disassembler = Disassembler::new(&compiler, session.env.module_name());
    let text = disassembler.disassemble_forms(&session.forms, codegen)?;
    print!("{text}");
    if !text.ends_with('\n') {
        println!();
    }
    Ok(())
}

fn handle_gensym(hint: &str, count: usize) {
    let generator = GensymGenerator::new();
    for _ in 0..count {
        println!("{}", generator.gensym_name(hint));
    }
}

fn handle_macros(path: Option<&Path>, config: &ExpansionConfig) -> Result<()> {
    let env = match path {
        Some(path) => Session::load(path, config)?.env,
        None => MacroEnv::new(config.module.clone()),
    };
    let module = env
        .macros()
        .names()
        .into_iter()
        .filter_map(|name| env.macros().get_mangled(name))
        .map(|binding| (MacroProvenance::Module, binding));
    let core = env
        .core()
        .names()
        .into_iter()
        .filter(|name| !env.macros().contains_mangled(name))
        .filter_map(|name| env.core().get_mangled(name))
        .map(|binding| (MacroProvenance::Core, binding));
    output::print_macros(module.chain(core)).map_err(|e| QuasiError::io("<stdout>", e))
}
