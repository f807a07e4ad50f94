pub use crate::errors::{QuasiError, Result};

pub mod ast;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod errors;
pub mod gensym;
pub mod macros;
pub mod mangle;
pub mod runtime;
pub mod syntax;
