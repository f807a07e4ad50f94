//! Reader macros.
//!
//! `#name form` reads `form` and hands it to the reader macro called `name`,
//! whose result replaces the whole tagged form. Reader macros live in a
//! module's macro table and only take effect once enabled on a [`Reader`].
//!
//! [`Reader`]: crate::syntax::Reader

use std::fmt;
use std::sync::Arc;

use crate::ast::AstNode;
use crate::errors::BoxError;

/// Callable behind a reader macro: the form after the tag in, a form out.
pub type ReaderMacroFn = Arc<dyn Fn(&AstNode) -> Result<AstNode, BoxError> + Send + Sync>;

#[derive(Clone)]
pub struct ReaderMacro {
    /// Tag name, without the `#`. Not mangled.
    pub name: String,
    /// Module the reader macro was defined in.
    pub module: String,
    pub func: ReaderMacroFn,
}

impl ReaderMacro {
    pub fn new<F>(name: &str, module: impl Into<String>, func: F) -> Self
    where
        F: Fn(&AstNode) -> Result<AstNode, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            module: module.into(),
            func: Arc::new(func),
        }
    }

    pub fn apply(&self, form: &AstNode) -> Result<AstNode, BoxError> {
        (self.func)(form)
    }
}

impl fmt::Debug for ReaderMacro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderMacro")
            .field("name", &self.name)
            .field("module", &self.module)
            .finish_non_exhaustive()
    }
}
