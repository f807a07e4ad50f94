//! Runtime values handed out by module providers.

use std::{fmt, sync::Arc};

use crate::ast::format_float;
use crate::errors::CallError;
use crate::runtime::provider::ModuleHandle;

/// Signature of a host function.
pub type NativeCallable = dyn Fn(&[Value]) -> Result<Value, CallError> + Send + Sync;

/// A named host function.
#[derive(Clone)]
pub struct NativeFn {
    pub name: String,
    func: Arc<NativeCallable>,
}

/// A value reachable through a module provider.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    None,
    Int(i64),
    Float(f64),
    Str(String),
    Module(ModuleHandle),
    Native(NativeFn),
}

impl NativeFn {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, CallError> {
        (self.func)(args)
    }
}

impl Value {
    /// Name of the value's kind, for messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Module(_) => "module",
            Value::Native(_) => "builtin_function",
        }
    }

    pub fn is_module(&self) -> bool {
        matches!(self, Value::Module(_))
    }

    pub fn as_module(&self) -> Option<&ModuleHandle> {
        let Value::Module(handle) = self else { return None };
        Some(handle)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        let Value::Str(s) = self else { return None };
        Some(s)
    }

    /// Calls a native function value.
    pub fn call(&self, args: &[Value]) -> Result<Value, CallError> {
        let Value::Native(native) = self else {
            return Err(CallError::NotCallable(self.type_name().to_string()));
        };
        native.call(args)
    }
}

// ============================================================================
// TRAITS
// ============================================================================

/// Numbers compare by value across `Int` and `Float`; functions by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => a == b,
            (Value::Native(a), Value::Native(b)) => Arc::ptr_eq(&a.func, &b.func),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Module(handle) => write!(f, "<module '{}'>", handle.name()),
            Value::Native(native) => write!(f, "<built-in function {}>", native.name),
        }
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").field("name", &self.name).finish_non_exhaustive()
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}
