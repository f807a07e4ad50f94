//! # Quasi Macro System
//!
//! Macros are compile-time functions from a call-shaped node to a new node.
//! This module holds the data the expansion engine works with:
//!
//! - [`MacroBinding`]: a mangled name, the module the macro was defined in,
//!   and the expander callable.
//! - [`ModuleMacros`]: one module's macro table.
//! - [`MacroEnv`]: the lookup chain used while compiling a module. Local
//!   scopes are searched innermost first, then the module's own table, then
//!   the core macros.
//! - [`MacroTable`]: the lookup seam the engine depends on.
//!
//! A module table also carries the module's reader macros, which `require`
//! transfers separately (see [`require_reader`]).
//!
//! The engine itself lives in [`expander`]. Bindings are looked up, never
//! mutated, during expansion.

use ::std::fmt;
use ::std::sync::Arc;
use im::HashMap;

use crate::ast::AstNode;
use crate::errors::{BoxError, ExpansionError, RequireError};
use crate::gensym::GensymGenerator;
use crate::mangle::{mangle, MangleFn};
use crate::runtime::resolver::QualifiedResolver;
use crate::syntax::ReaderMacro;

pub mod expander;
pub mod loader;
pub mod require;
pub mod std;
pub mod template;

pub use expander::{ExpansionContext, MacroExpander};
pub use require::{enable_readers, require, require_reader, Assignments, ReaderAssignments};
pub use template::{MacroTemplate, ParamList};

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// What an expander hands back.
#[derive(Debug, Clone)]
pub enum MacroOutput {
    /// A replacement form. The engine keeps expanding it.
    Form(AstNode),
    /// A final value that must not be expanded again.
    Verbatim(AstNode),
}

/// An expander callable. Receives the expansion context and the call's
/// unevaluated arguments (the head is excluded).
pub type MacroFn =
    Arc<dyn Fn(&MacroContext<'_>, &[AstNode]) -> Result<MacroOutput, BoxError> + Send + Sync>;

/// A macro name bound to its expander.
#[derive(Clone)]
pub struct MacroBinding {
    /// Mangled name.
    pub name: String,
    /// Module the macro was defined in. Expanders run in this module's context
    /// even after being required elsewhere.
    pub module: String,
    pub expander: MacroFn,
    pub doc: Option<String>,
}

/// Where a lookup found its binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroProvenance {
    Local,
    Module,
    Core,
}

/// A single macro expansion step, for traceability.
#[derive(Debug, Clone)]
pub struct MacroExpansionStep {
    pub macro_name: String,
    pub provenance: MacroProvenance,
    pub input: AstNode,
    pub output: AstNode,
}

/// Lookup seam between the engine and whatever stores macros.
pub trait MacroTable {
    /// Finds the binding for an already-mangled head name.
    fn lookup(&self, mangled: &str) -> Option<(MacroProvenance, &MacroBinding)>;
}

/// One module's macro table. Names are stored mangled with the table's
/// mangler, which must match the one expansion looks heads up with.
#[derive(Debug, Clone)]
pub struct ModuleMacros {
    module: String,
    macros: HashMap<String, MacroBinding>,
    exports: Option<Vec<String>>,
    readers: HashMap<String, ReaderMacro>,
    mangle: MangleFn,
}

/// The lookup chain for a module being compiled.
#[derive(Debug, Clone)]
pub struct MacroEnv {
    module: ModuleMacros,
    core: ModuleMacros,
    locals: Vec<HashMap<String, MacroBinding>>,
}

/// What a running expander can see.
pub struct MacroContext<'a> {
    /// The macro's originating module.
    pub module: &'a str,
    /// The call being expanded, head included.
    pub form: &'a AstNode,
    pub gensym: &'a GensymGenerator,
    pub resolver: Option<&'a QualifiedResolver<'a>>,
    pub(crate) table: &'a dyn MacroTable,
    pub(crate) mangle: MangleFn,
    pub(crate) expander: &'a MacroExpander,
}

// ============================================================================
// PUBLIC API IMPLEMENTATION
// ============================================================================

impl MacroBinding {
    pub fn new(name: &str, module: impl Into<String>, expander: MacroFn) -> Self {
        Self::with_mangler(name, module, expander, mangle)
    }

    /// A binding whose name is normalized by `mangle` instead of the default.
    pub fn with_mangler(
        name: &str,
        module: impl Into<String>,
        expander: MacroFn,
        mangle: MangleFn,
    ) -> Self {
        Self {
            name: mangle(name),
            module: module.into(),
            expander,
            doc: None,
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

impl ModuleMacros {
    pub fn new(module: impl Into<String>) -> Self {
        Self::with_mangler(module, mangle)
    }

    /// A table that stores names normalized by `mangle`.
    pub fn with_mangler(module: impl Into<String>, mangle: MangleFn) -> Self {
        Self {
            module: module.into(),
            macros: HashMap::new(),
            exports: None,
            readers: HashMap::new(),
            mangle,
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// `name` as this table stores it.
    pub fn mangle_name(&self, name: &str) -> String {
        (self.mangle)(name)
    }

    pub fn mangler(&self) -> MangleFn {
        self.mangle
    }

    /// Installs `f` under the mangled `name`, returning any binding it replaced.
    pub fn install<F>(&mut self, name: &str, f: F) -> Option<MacroBinding>
    where
        F: Fn(&MacroContext<'_>, &[AstNode]) -> Result<MacroOutput, BoxError> + Send + Sync + 'static,
    {
        let binding = MacroBinding::with_mangler(name, self.module.clone(), Arc::new(f), self.mangle);
        self.install_binding(binding)
    }

    /// Installs a template macro defined in this module.
    pub fn install_template(&mut self, name: &str, template: MacroTemplate) -> Option<MacroBinding> {
        let doc = template.doc.clone();
        let mut binding =
            MacroBinding::with_mangler(name, self.module.clone(), template.into_macro_fn(), self.mangle);
        binding.doc = doc;
        self.install_binding(binding)
    }

    /// Installs a binding as is. Used by `require`, which keeps the
    /// binding's originating module.
    pub fn install_binding(&mut self, binding: MacroBinding) -> Option<MacroBinding> {
        self.macros.insert(binding.name.clone(), binding)
    }

    pub fn unregister(&mut self, name: &str) -> Option<MacroBinding> {
        self.macros.remove(&self.mangle_name(name))
    }

    pub fn get(&self, name: &str) -> Option<&MacroBinding> {
        self.macros.get(&self.mangle_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(&self.mangle_name(name))
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Mangled names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.macros.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Declares the names `Assignments::Exports` transfers.
    pub fn set_exports<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exports = Some(names.into_iter().map(|n| (self.mangle)(n.as_ref())).collect());
    }

    /// Declared exports, or every name not starting with `_`.
    pub fn exported_names(&self) -> Vec<String> {
        match &self.exports {
            Some(exports) => exports.clone(),
            None => self
                .names()
                .into_iter()
                .filter(|name| !name.starts_with('_'))
                .map(str::to_string)
                .collect(),
        }
    }

    /// Defines reader macro `#name` in this module. Tags are not mangled.
    pub fn install_reader<F>(&mut self, name: &str, f: F) -> Option<ReaderMacro>
    where
        F: Fn(&AstNode) -> Result<AstNode, BoxError> + Send + Sync + 'static,
    {
        self.install_reader_binding(ReaderMacro::new(name, self.module.clone(), f))
    }

    pub fn install_reader_binding(&mut self, reader_macro: ReaderMacro) -> Option<ReaderMacro> {
        self.readers.insert(reader_macro.name.clone(), reader_macro)
    }

    pub fn get_reader(&self, name: &str) -> Option<&ReaderMacro> {
        self.readers.get(name)
    }

    /// Reader macro tags, sorted.
    pub fn reader_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.readers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Lookup by an already-mangled name.
    pub fn get_mangled(&self, mangled: &str) -> Option<&MacroBinding> {
        self.macros.get(mangled)
    }

    pub fn contains_mangled(&self, mangled: &str) -> bool {
        self.macros.contains_key(mangled)
    }
}

impl MacroEnv {
    /// An environment for `module` with the core macros available.
    pub fn new(module: impl Into<String>) -> Self {
        Self::with_core(ModuleMacros::new(module), self::std::core_macros())
    }

    /// An environment with no core macros.
    pub fn bare(module: impl Into<String>) -> Self {
        Self::with_core(ModuleMacros::new(module), ModuleMacros::new(self::std::CORE_MODULE))
    }

    pub fn with_core(module: ModuleMacros, core: ModuleMacros) -> Self {
        Self {
            module,
            core,
            locals: Vec::new(),
        }
    }

    pub fn module_name(&self) -> &str {
        self.module.module()
    }

    pub fn macros(&self) -> &ModuleMacros {
        &self.module
    }

    pub fn macros_mut(&mut self) -> &mut ModuleMacros {
        &mut self.module
    }

    pub fn core(&self) -> &ModuleMacros {
        &self.core
    }

    /// Opens a local macro scope; lookups search it before the module table.
    pub fn push_scope(&mut self) {
        self.locals.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.locals.pop();
    }

    /// Installs into the innermost local scope, or the module table when no
    /// scope is open.
    pub fn install_local<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&MacroContext<'_>, &[AstNode]) -> Result<MacroOutput, BoxError> + Send + Sync + 'static,
    {
        let binding = MacroBinding::with_mangler(
            name,
            self.module.module().to_string(),
            Arc::new(f),
            self.module.mangler(),
        );
        match self.locals.last_mut() {
            Some(scope) => {
                scope.insert(binding.name.clone(), binding);
            }
            None => {
                self.module.install_binding(binding);
            }
        }
    }

    /// Transfers macros from `source` into this module, warning when an alias
    /// shadows a core macro.
    pub fn require(
        &mut self,
        source: &ModuleMacros,
        assignments: &Assignments,
        prefix: Option<&str>,
    ) -> Result<bool, RequireError> {
        let transferred = require(source, &mut self.module, assignments, prefix)?;
        let shadowing = self.module.names().into_iter().filter(|name| {
            self.core.get_mangled(name).is_some()
                && self.module.get_mangled(name).map(|b| b.module.as_str()) == Some(source.module())
        });
        for name in shadowing {
            tracing::warn!(
                macro_name = name,
                module = source.module(),
                "required macro shadows a core macro"
            );
        }
        Ok(transferred)
    }
}

impl MacroTable for MacroEnv {
    fn lookup(&self, mangled: &str) -> Option<(MacroProvenance, &MacroBinding)> {
        self.locals
            .iter()
            .rev()
            .find_map(|scope| scope.get(mangled))
            .map(|binding| (MacroProvenance::Local, binding))
            .or_else(|| {
                self.module
                    .get_mangled(mangled)
                    .map(|binding| (MacroProvenance::Module, binding))
            })
            .or_else(|| {
                self.core
                    .get_mangled(mangled)
                    .map(|binding| (MacroProvenance::Core, binding))
            })
    }
}

impl MacroTable for ModuleMacros {
    fn lookup(&self, mangled: &str) -> Option<(MacroProvenance, &MacroBinding)> {
        self.get_mangled(mangled).map(|binding| (MacroProvenance::Module, binding))
    }
}

impl<'a> MacroContext<'a> {
    /// A fresh hygienic symbol.
    pub fn gensym(&self, hint: &str) -> AstNode {
        self.gensym.gensym(hint)
    }

    /// The resolver, if the caller supplied one.
    pub fn resolver(&self) -> Result<&'a QualifiedResolver<'a>, BoxError> {
        self.resolver
            .ok_or_else(|| crate::errors::MacroBodyError::boxed("no module resolver available during expansion"))
    }

    /// Fully expands `form` with the same table and generator. Errors keep
    /// their identity when returned from the enclosing expander.
    pub fn macroexpand(&self, form: &AstNode) -> Result<AstNode, ExpansionError> {
        self.expander.macroexpand(form, &self.nested())
    }

    pub fn macroexpand_1(&self, form: &AstNode) -> Result<AstNode, ExpansionError> {
        self.expander.macroexpand_1(form, &self.nested())
    }

    fn nested(&self) -> ExpansionContext<'a> {
        ExpansionContext {
            module: self.module,
            table: self.table,
            gensym: self.gensym,
            resolver: self.resolver,
            mangle: self.mangle,
        }
    }
}

// ============================================================================
// TRAITS
// ============================================================================

impl fmt::Debug for MacroBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacroBinding")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("doc", &self.doc)
            .finish_non_exhaustive()
    }
}
