//! Qualified module resolution through both entry points.

use quasi::errors::{AttemptedPath, ResolveError};
use quasi::mangle::mangle;
use quasi::runtime::provider::{InMemoryProvider, ModuleDef, ModuleProvider};
use quasi::runtime::resolver::QualifiedResolver;
use quasi::runtime::value::Value;

fn attempted(err: ResolveError) -> AttemptedPath {
    match err {
        ResolveError::ModuleNotFound { path } => path,
    }
}

#[test]
fn attribute_chain_calls_math_sqrt() {
    let provider = InMemoryProvider::with_std();
    let resolver = QualifiedResolver::new(&provider);
    let sqrt = resolver.resolve_attr(&["math", "sqrt"]).unwrap();
    assert_eq!(sqrt.call(&[Value::Int(4)]).unwrap(), Value::Int(2));
}

#[test]
fn call_form_reaches_the_same_function() {
    let provider = InMemoryProvider::with_std();
    let resolver = QualifiedResolver::new(&provider);
    let math = resolver.resolve_literal("math").unwrap();
    let sqrt = resolver.getattr(&math, "sqrt").unwrap();
    assert_eq!(sqrt.call(&[Value::Int(4)]).unwrap(), Value::Int(2));
}

#[test]
fn dotted_literal_imports_parents_first() {
    let provider = InMemoryProvider::with_std();
    let resolver = QualifiedResolver::new(&provider);
    let module = resolver.resolve_literal("os.path").unwrap();
    assert_eq!(module.as_module().unwrap().name(), "os.path");
    assert!(provider.is_loaded("os"));

    let via_parent = resolver.resolve_attr(&["os", "path", "sep"]).unwrap();
    assert_eq!(via_parent, Value::Str("/".into()));
}

#[test]
fn failures_report_the_path_each_policy_tried() {
    let provider = InMemoryProvider::with_std();
    let resolver = QualifiedResolver::new(&provider);

    let mangled = attempted(resolver.resolve_attr(&["bad-mod?"]).unwrap_err());
    assert_eq!(mangled, AttemptedPath::Mangled(mangle("bad-mod?")));
    assert_ne!(mangled.as_str(), "bad-mod?");

    let literal = attempted(resolver.resolve_literal("bad-mod?").unwrap_err());
    assert_eq!(literal, AttemptedPath::Literal("bad-mod?".to_string()));
}

#[test]
fn missing_attribute_reports_the_full_dotted_path() {
    let provider = InMemoryProvider::with_std();
    let resolver = QualifiedResolver::new(&provider);
    let err = resolver.resolve_attr(&["math", "tau"]).unwrap_err();
    assert_eq!(attempted(err).as_str(), "math.tau");
}

#[test]
fn initialization_runs_once_per_provider() {
    let mut provider = InMemoryProvider::new();
    provider.register(
        "counter",
        ModuleDef::new().with_initializer(|ns| {
            ns.insert("value".to_string(), Value::Int(7));
        }),
    );
    let resolver = QualifiedResolver::new(&provider);

    assert_eq!(resolver.resolve_attr(&["counter", "value"]).unwrap(), Value::Int(7));
    resolver.resolve_literal("counter").unwrap();
    resolver.resolve_attr(&["counter", "value"]).unwrap();
    assert_eq!(provider.init_count("counter"), 1);
}

#[test]
fn resolution_binds_nothing_new_in_unrelated_modules() {
    let mut provider = InMemoryProvider::with_std();
    provider.register("app", ModuleDef::new().with_attr("x", 1i64));
    let resolver = QualifiedResolver::new(&provider);

    let app = provider.import("app").unwrap();
    resolver.resolve_attr(&["math", "sqrt"]).unwrap();
    resolver.resolve_literal("os").unwrap();

    assert!(provider.get_attr(&app, "math").is_err());
    assert!(provider.get_attr(&app, "os").is_err());
    assert_eq!(provider.get_attr(&app, "x").unwrap(), Value::Int(1));
}

#[test]
fn non_callables_refuse_to_be_called() {
    let provider = InMemoryProvider::with_std();
    let resolver = QualifiedResolver::new(&provider);
    let pi = resolver.resolve_attr(&["math", "pi"]).unwrap();
    assert!(pi.call(&[]).is_err());
}
