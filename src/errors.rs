//! Quasi Error Handling
//!
//! Every failure mode in the crate is one of a handful of per-concern error
//! types. Each derives `thiserror::Error` for its message and
//! `miette::Diagnostic` for codes, help text and labelled spans. `QuasiError`
//! unifies them for callers that do not care which stage failed.
//!
//! No lookup miss anywhere in the crate yields a sentinel value: a missing
//! module, attribute or macro name is always an `Err`.

use miette::{Diagnostic, NamedSource, SourceSpan};
use std::fmt;
use thiserror::Error;

use crate::ast::AstNode;

/// Boxed error produced by user code (macro bodies, native functions).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ============================================================================
// READER
// ============================================================================

#[derive(Debug, Error, Diagnostic)]
pub enum ReadError {
    /// The stream ran out before a complete form was available.
    #[error("unexpected end of input")]
    #[diagnostic(code(quasi::read::end_of_input))]
    EndOfInput,

    #[error("syntax error: {message}")]
    #[diagnostic(code(quasi::read::syntax))]
    Syntax {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },

    /// A reader macro rejected the form it was given.
    #[error("reader macro #{name} failed: {message}")]
    #[diagnostic(code(quasi::read::reader_macro))]
    ReaderMacro {
        name: String,
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("expanded here")]
        span: SourceSpan,
    },
}

impl ReadError {
    pub fn is_end_of_input(&self) -> bool {
        matches!(self, ReadError::EndOfInput)
    }
}

// ============================================================================
// MACRO EXPANSION
// ============================================================================

#[derive(Debug, Error, Diagnostic)]
pub enum ExpansionError {
    /// A macro expander raised while rewriting `form`.
    #[error("expanding macro {macro_name}: {message}")]
    #[diagnostic(code(quasi::macros::expansion))]
    MacroFailed {
        macro_name: String,
        form: AstNode,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The opt-in step ceiling was reached.
    #[error("macro expansion of {form} exceeded {limit} steps")]
    #[diagnostic(
        code(quasi::macros::step_limit),
        help("a macro keeps expanding into another macro call; raise `step_limit` or fix the macro")
    )]
    StepLimit { limit: usize, form: AstNode },
}

impl ExpansionError {
    /// The form that was being expanded when the error occurred.
    pub fn form(&self) -> &AstNode {
        match self {
            ExpansionError::MacroFailed { form, .. } => form,
            ExpansionError::StepLimit { form, .. } => form,
        }
    }
}

/// Error raised by a macro body itself.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(quasi::macros::macro_body))]
pub struct MacroBodyError {
    pub message: String,
}

impl MacroBodyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Boxed form, ready to return from an expander.
    pub fn boxed(message: impl Into<String>) -> BoxError {
        Box::new(Self::new(message))
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum RequireError {
    #[error("could not require name {name} from {module}")]
    #[diagnostic(code(quasi::macros::require))]
    MissingName { name: String, module: String },

    #[error("reader {name} is not defined")]
    #[diagnostic(code(quasi::macros::undefined_reader))]
    UndefinedReader { name: String },
}

#[derive(Debug, Error, Diagnostic)]
pub enum MacroDefinitionError {
    #[error("malformed macro definition: {message}")]
    #[diagnostic(code(quasi::macros::definition))]
    Malformed { message: String, form: AstNode },

    #[error("duplicate parameter name '{name}' in macro definition")]
    #[diagnostic(code(quasi::macros::duplicate_param))]
    DuplicateParam { name: String, form: AstNode },
}

// ============================================================================
// MODULE RESOLUTION
// ============================================================================

/// The path a failed resolution attempted, tagged with the policy that built it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptedPath {
    /// Attribute-chain form: every component was mangled.
    Mangled(String),
    /// Call form: the caller's string, untouched.
    Literal(String),
}

impl AttemptedPath {
    pub fn as_str(&self) -> &str {
        match self {
            AttemptedPath::Mangled(path) | AttemptedPath::Literal(path) => path,
        }
    }
}

impl fmt::Display for AttemptedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    #[error("no module named '{path}'")]
    #[diagnostic(code(quasi::resolve::module_not_found))]
    ModuleNotFound { path: AttemptedPath },
}

/// A provider-level lookup miss.
#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
#[error("'{name}' not found")]
#[diagnostic(code(quasi::runtime::not_found))]
pub struct NotFound {
    pub name: String,
}

impl NotFound {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum CallError {
    #[error("'{0}' object is not callable")]
    #[diagnostic(code(quasi::runtime::not_callable))]
    NotCallable(String),

    #[error("{function}: {message}")]
    #[diagnostic(code(quasi::runtime::bad_arguments))]
    BadArguments { function: String, message: String },
}

// ============================================================================
// COMPILATION
// ============================================================================

#[derive(Debug, Error, Diagnostic)]
pub enum CompileError {
    #[error("cannot compile {form}: {message}")]
    #[diagnostic(code(quasi::compile::unsupported))]
    Unsupported { form: AstNode, message: String },

    #[error("malformed `{head}` form {form}: {message}")]
    #[diagnostic(code(quasi::compile::malformed))]
    Malformed {
        head: String,
        form: AstNode,
        message: String,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Expansion(#[from] ExpansionError),
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    #[diagnostic(code(quasi::config::io))]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    #[diagnostic(code(quasi::config::json))]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// UNIFIED ERROR
// ============================================================================

#[derive(Debug, Error, Diagnostic)]
pub enum QuasiError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Expansion(#[from] ExpansionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    MacroDefinition(#[from] MacroDefinitionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Require(#[from] RequireError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Call(#[from] CallError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to serialize output: {0}")]
    #[diagnostic(code(quasi::serialize))]
    Serialize(#[from] serde_json::Error),

    #[error("failed to read {path}: {source}")]
    #[diagnostic(code(quasi::io), help("check that the file exists and is readable"))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl QuasiError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        QuasiError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = QuasiError> = std::result::Result<T, E>;
