//! Qualified module resolution.
//!
//! Two entry points reach a module-qualified value without binding anything in
//! the caller's namespace:
//!
//! - [`QualifiedResolver::resolve_attr`] walks an attribute chain such as
//!   `math.sqrt` or `os/path.join`. Every component is mangled first, and a
//!   failure reports the mangled dotted path it tried.
//! - [`QualifiedResolver::resolve_literal`] imports exactly the string it is
//!   given. A failure reports that string untouched.
//!
//! Both perform real imports through the provider, so initialization happens
//! at most once per provider.

use crate::errors::{AttemptedPath, NotFound, ResolveError};
use crate::mangle::{mangle, MangleFn};
use crate::runtime::provider::{ModuleHandle, ModuleProvider};
use crate::runtime::value::Value;

pub struct QualifiedResolver<'p> {
    provider: &'p dyn ModuleProvider,
    mangle: MangleFn,
}

impl<'p> QualifiedResolver<'p> {
    pub fn new(provider: &'p dyn ModuleProvider) -> Self {
        Self::with_mangler(provider, mangle)
    }

    pub fn with_mangler(provider: &'p dyn ModuleProvider, mangle: MangleFn) -> Self {
        Self { provider, mangle }
    }

    pub fn provider(&self) -> &'p dyn ModuleProvider {
        self.provider
    }

    /// Resolves an attribute chain.
    ///
    /// Segments may contain `/`, which splits them into further components:
    /// `["os/path", "join"]` is the chain `os`, `path`, `join`. Walking left to
    /// right, while the last value is a module (or nothing is resolved yet)
    /// the accumulated dotted path is imported; if that fails the component is
    /// read as an attribute of the last value instead.
    pub fn resolve_attr<S: AsRef<str>>(&self, segments: &[S]) -> Result<Value, ResolveError> {
        let components: Vec<String> = segments
            .iter()
            .flat_map(|segment| segment.as_ref().split('/').map(str::to_string).collect::<Vec<_>>())
            .map(|component| (self.mangle)(&component))
            .collect();

        let mut path = String::new();
        let mut current: Option<Value> = None;

        for component in &components {
            let attempted = if path.is_empty() {
                component.clone()
            } else {
                format!("{path}.{component}")
            };
            let not_found = || ResolveError::ModuleNotFound {
                path: AttemptedPath::Mangled(attempted.clone()),
            };

            let importable = current.as_ref().map_or(true, Value::is_module);
            if importable {
                tracing::debug!(path = %attempted, "resolver import attempt");
                if let Ok(handle) = self.provider.import(&attempted) {
                    current = Some(Value::Module(handle));
                    path = attempted;
                    continue;
                }
            }

            let Some(value) = &current else {
                return Err(not_found());
            };
            let next = self.getattr(value, component).map_err(|_| not_found())?;
            tracing::trace!(path = %attempted, "resolved attribute");
            current = Some(next);
            path = attempted;
        }

        current.ok_or(ResolveError::ModuleNotFound {
            path: AttemptedPath::Mangled(String::new()),
        })
    }

    /// Imports exactly `path`, without mangling.
    pub fn resolve_literal(&self, path: &str) -> Result<Value, ResolveError> {
        tracing::debug!(path, "resolver literal import");
        self.provider
            .import(path)
            .map(Value::Module)
            .map_err(|_| ResolveError::ModuleNotFound {
                path: AttemptedPath::Literal(path.to_string()),
            })
    }

    /// Reads attribute `name` of `value`. Only modules have attributes.
    pub fn getattr(&self, value: &Value, name: &str) -> Result<Value, NotFound> {
        let Some(handle) = value.as_module() else {
            return Err(NotFound::new(format!("{}.{name}", value.type_name())));
        };
        self.provider.get_attr(handle, name)
    }

    /// Imports `path` and returns its handle.
    pub fn import(&self, path: &str) -> Result<ModuleHandle, NotFound> {
        self.provider.import(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::provider::InMemoryProvider;

    #[test]
    fn slash_segments_fold_into_the_chain() {
        let provider = InMemoryProvider::with_std();
        let resolver = QualifiedResolver::new(&provider);
        let join = resolver.resolve_attr(&["os/path", "join"]).unwrap();
        let joined = join.call(&["a".into(), "b".into()]).unwrap();
        assert_eq!(joined, Value::Str("a/b".into()));
    }

    #[test]
    fn attributes_of_non_modules_fail_with_the_mangled_path() {
        let provider = InMemoryProvider::with_std();
        let resolver = QualifiedResolver::new(&provider);
        let err = resolver.resolve_attr(&["math", "pi", "real?"]).unwrap_err();
        let ResolveError::ModuleNotFound { path } = err;
        assert_eq!(path, AttemptedPath::Mangled("math.pi.hyx_realXquestion_markX".into()));
    }
}
