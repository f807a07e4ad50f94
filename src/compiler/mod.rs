//! Compilation to the host IR.
//!
//! [`Compiler`] is the seam the disassembler and the CLI depend on.
//! [`HostCompiler`] is the bundled implementation: it expands macros (when it
//! holds a macro table) and lowers the result to [`ir::Module`].

use std::slice;

use crate::ast::AstNode;
use crate::errors::CompileError;

pub mod disassemble;
pub mod ir;
pub mod lower;

pub use disassemble::{disassemble, Disassembler};
pub use lower::HostCompiler;

pub trait Compiler {
    /// Compiles a sequence of top-level forms into one module.
    fn compile_forms(
        &self,
        forms: &[AstNode],
        module: &str,
        import_stdlib: bool,
    ) -> Result<ir::Module, CompileError>;

    /// Compiles a single tree.
    fn compile(
        &self,
        tree: &AstNode,
        module: &str,
        import_stdlib: bool,
    ) -> Result<ir::Module, CompileError> {
        self.compile_forms(slice::from_ref(tree), module, import_stdlib)
    }
}
