//! Module providers.
//!
//! A [`ModuleProvider`] imports modules by dotted path and reads their
//! attributes. Importing is idempotent: a module's initializer runs the first
//! time it is imported and never again for the same provider.
//!
//! [`InMemoryProvider`] keeps module definitions in memory. Importing `a.b`
//! imports `a` first, then binds `b` as an attribute of `a`, so both spellings
//! reach the same module afterwards.

use im::HashMap;
use std::collections::HashMap as StdHashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::errors::{CallError, NotFound};
use crate::runtime::value::{NativeFn, Value};

/// Attribute table of a loaded module.
pub type Namespace = HashMap<String, Value>;

/// Runs once when a module is first imported.
pub type Initializer = Arc<dyn Fn(&mut Namespace) + Send + Sync>;

// ============================================================================
// PROVIDER SEAM
// ============================================================================

pub trait ModuleProvider: Send + Sync {
    /// Imports the module at dotted `path`, initializing it on first use.
    fn import(&self, path: &str) -> Result<ModuleHandle, NotFound>;

    /// Reads attribute `name` of an imported module.
    fn get_attr(&self, module: &ModuleHandle, name: &str) -> Result<Value, NotFound>;
}

/// Identifies an imported module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleHandle {
    name: Arc<str>,
}

impl ModuleHandle {
    pub fn new(name: &str) -> Self {
        Self { name: name.into() }
    }

    /// Full dotted name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// IN-MEMORY PROVIDER
// ============================================================================

/// Static attributes plus an optional initializer.
#[derive(Clone, Default)]
pub struct ModuleDef {
    attributes: Namespace,
    initializer: Option<Initializer>,
}

impl ModuleDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn with_function<F>(self, name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        self.with_attr(name, Value::Native(NativeFn::new(name, func)))
    }

    pub fn with_initializer<F>(mut self, init: F) -> Self
    where
        F: Fn(&mut Namespace) + Send + Sync + 'static,
    {
        self.initializer = Some(Arc::new(init));
        self
    }
}

#[derive(Default)]
struct LoadState {
    loaded: StdHashMap<String, Namespace>,
    init_counts: StdHashMap<String, usize>,
}

/// A provider backed by registered [`ModuleDef`]s.
#[derive(Default)]
pub struct InMemoryProvider {
    definitions: StdHashMap<String, ModuleDef>,
    state: Mutex<LoadState>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider preloaded with `math`, `os` and `os.path`.
    pub fn with_std() -> Self {
        let mut provider = Self::new();
        provider.register("math", math_module());
        provider.register("os", ModuleDef::new().with_attr("sep", "/"));
        provider.register("os.path", os_path_module());
        provider
    }

    /// Registers (or replaces) the definition for `name`.
    pub fn register(&mut self, name: &str, def: ModuleDef) {
        self.definitions.insert(name.to_string(), def);
    }

    /// How many times `name` has been initialized.
    pub fn init_count(&self, name: &str) -> usize {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.init_counts.get(name).copied().unwrap_or(0)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.loaded.contains_key(name)
    }

    fn import_locked(&self, state: &mut LoadState, path: &str) -> Result<ModuleHandle, NotFound> {
        if state.loaded.contains_key(path) {
            tracing::trace!(module = path, "module cache hit");
            return Ok(ModuleHandle::new(path));
        }
        if path.is_empty() || path.split('.').any(str::is_empty) {
            return Err(NotFound::new(path));
        }

        let parent = path.rsplit_once('.');
        if let Some((parent, _)) = parent {
            self.import_locked(state, parent)?;
        }

        let Some(def) = self.definitions.get(path) else {
            return Err(NotFound::new(path));
        };

        tracing::debug!(module = path, "initializing module");
        let mut namespace = def.attributes.clone();
        if let Some(init) = &def.initializer {
            init(&mut namespace);
        }
        state.loaded.insert(path.to_string(), namespace);
        *state.init_counts.entry(path.to_string()).or_insert(0) += 1;

        let handle = ModuleHandle::new(path);
        if let Some((parent, child)) = parent {
            if let Some(parent_ns) = state.loaded.get_mut(parent) {
                parent_ns.insert(child.to_string(), Value::Module(handle.clone()));
            }
        }
        Ok(handle)
    }
}

impl ModuleProvider for InMemoryProvider {
    fn import(&self, path: &str) -> Result<ModuleHandle, NotFound> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.import_locked(&mut state, path)
    }

    fn get_attr(&self, module: &ModuleHandle, name: &str) -> Result<Value, NotFound> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .loaded
            .get(module.name())
            .and_then(|namespace| namespace.get(name))
            .cloned()
            .ok_or_else(|| NotFound::new(format!("{}.{name}", module.name())))
    }
}

// ============================================================================
// STANDARD MODULES
// ============================================================================

fn number_arg(function: &str, args: &[Value]) -> Result<f64, CallError> {
    let [arg] = args else {
        return Err(CallError::BadArguments {
            function: function.to_string(),
            message: format!("expected 1 argument, got {}", args.len()),
        });
    };
    arg.as_f64().ok_or_else(|| CallError::BadArguments {
        function: function.to_string(),
        message: format!("must be a real number, not {}", arg.type_name()),
    })
}

fn math_module() -> ModuleDef {
    ModuleDef::new()
        .with_attr("pi", std::f64::consts::PI)
        .with_function("sqrt", |args| {
            let x = number_arg("sqrt", args)?;
            if x < 0.0 {
                return Err(CallError::BadArguments {
                    function: "sqrt".to_string(),
                    message: "math domain error".to_string(),
                });
            }
            Ok(Value::Float(x.sqrt()))
        })
        .with_function("floor", |args| {
            let x = number_arg("floor", args)?;
            Ok(Value::Int(x.floor() as i64))
        })
}

fn os_path_module() -> ModuleDef {
    ModuleDef::new().with_attr("sep", "/").with_function("join", |args| {
        let mut joined = String::new();
        for arg in args {
            let Some(part) = arg.as_str() else {
                return Err(CallError::BadArguments {
                    function: "join".to_string(),
                    message: format!("expected str, not {}", arg.type_name()),
                });
            };
            if part.starts_with('/') {
                joined.clear();
            } else if !joined.is_empty() && !joined.ends_with('/') {
                joined.push('/');
            }
            joined.push_str(part);
        }
        Ok(Value::Str(joined))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importing_a_submodule_binds_it_on_the_parent() {
        let provider = InMemoryProvider::with_std();
        provider.import("os.path").unwrap();
        let os = ModuleHandle::new("os");
        let path = provider.get_attr(&os, "path").unwrap();
        assert_eq!(path.as_module().map(ModuleHandle::name), Some("os.path"));
    }

    #[test]
    fn initializers_run_once() {
        let mut provider = InMemoryProvider::new();
        provider.register(
            "counter",
            ModuleDef::new().with_initializer(|ns| {
                ns.insert("ready".to_string(), Value::Int(1));
            }),
        );
        provider.import("counter").unwrap();
        provider.import("counter").unwrap();
        assert_eq!(provider.init_count("counter"), 1);
    }

    #[test]
    fn path_join_follows_posix_rules() {
        let join = os_path_module().attributes.get("join").cloned().unwrap();
        let joined = join.call(&["a".into(), "b".into(), "/c".into(), "d".into()]).unwrap();
        assert_eq!(joined, Value::Str("/c/d".into()));
    }

    #[test]
    fn missing_modules_report_their_path() {
        let provider = InMemoryProvider::with_std();
        assert_eq!(provider.import("nope.x").unwrap_err(), NotFound::new("nope"));
    }
}
