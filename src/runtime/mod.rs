//! Host-side runtime: the values modules expose, the providers that import
//! them, and the resolver macros use to reach qualified names.

pub mod provider;
pub mod resolver;
pub mod value;

pub use provider::{InMemoryProvider, ModuleDef, ModuleHandle, ModuleProvider, Namespace};
pub use resolver::QualifiedResolver;
pub use value::{NativeFn, Value};
