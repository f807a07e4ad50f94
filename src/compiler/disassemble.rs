//! Disassembly: compile a tree and render the result without running it.

use crate::ast::AstNode;
use crate::compiler::{Compiler, HostCompiler};
use crate::config::DEFAULT_MODULE;
use crate::errors::CompileError;
use crate::macros::MacroEnv;

/// Renders compiled trees for inspection.
///
/// Compilation always runs with standard-library import injection off, so
/// the output shows only what the tree itself compiles to.
pub struct Disassembler<'c> {
    compiler: &'c dyn Compiler,
    module: String,
}

impl<'c> Disassembler<'c> {
    pub fn new(compiler: &'c dyn Compiler, module: impl Into<String>) -> Self {
        Self {
            compiler,
            module: module.into(),
        }
    }

    /// The structural dump, or host source text when `codegen` is set.
    pub fn disassemble(&self, tree: &AstNode, codegen: bool) -> Result<String, CompileError> {
        self.disassemble_forms(std::slice::from_ref(tree), codegen)
    }

    pub fn disassemble_forms(&self, forms: &[AstNode], codegen: bool) -> Result<String, CompileError> {
        let module = self.compiler.compile_forms(forms, &self.module, false)?;
        Ok(if codegen { module.codegen() } else { module.dump() })
    }
}

/// Disassembles `tree` in the default module with the core macros available.
pub fn disassemble(tree: &AstNode, codegen: bool) -> Result<String, CompileError> {
    let env = MacroEnv::new(DEFAULT_MODULE);
    let compiler = HostCompiler::new().with_macros(&env);
    Disassembler::new(&compiler, DEFAULT_MODULE).disassemble(tree, codegen)
}
