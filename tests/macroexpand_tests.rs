//! Macro expansion: one step, fixpoint, tracing and cross-module requires.

use quasi::ast::{make_float, make_string, make_symbol, AstNode, Span};
use quasi::errors::{ExpansionError, MacroBodyError};
use quasi::gensym::GensymGenerator;
use quasi::macros::loader::load_macros_from_source;
use quasi::macros::{Assignments, ExpansionContext, MacroEnv, MacroExpander, MacroOutput, ModuleMacros};
use quasi::runtime::{InMemoryProvider, QualifiedResolver};
use quasi::syntax::read;

const MAC: &str = "(defmacro mac [a b] `(~@b ~a))";

fn env_with(source: &str) -> MacroEnv {
    let mut env = MacroEnv::new("__main__");
    load_macros_from_source(source, env.macros_mut()).unwrap();
    env
}

fn expand(env: &MacroEnv, source: &str) -> AstNode {
    let ctx = ExpansionContext::new(env.module_name(), env);
    MacroExpander::new().macroexpand(&read(source).unwrap(), &ctx).unwrap()
}

fn expand_1(env: &MacroEnv, source: &str) -> AstNode {
    let ctx = ExpansionContext::new(env.module_name(), env);
    MacroExpander::new().macroexpand_1(&read(source).unwrap(), &ctx).unwrap()
}

#[test]
fn single_step_moves_the_first_argument_to_the_end() {
    let env = env_with(MAC);
    assert_eq!(expand_1(&env, "(mac (a b) (x y))").to_string(), "(x y (a b))");
}

#[test]
fn single_step_stops_after_one_rewrite() {
    let env = env_with(MAC);
    assert_eq!(expand_1(&env, "(mac (a b) (mac 5))").to_string(), "(mac 5 (a b))");
    assert_eq!(expand(&env, "(mac (a b) (mac 5))").to_string(), "(a b 5)");
}

#[test]
fn fixpoint_equals_iterated_single_steps() {
    let env = env_with(MAC);
    let ctx = ExpansionContext::new(env.module_name(), &env);
    let expander = MacroExpander::new();
    let form = read("(mac (a b) (mac 5))").unwrap();

    let mut current = form.clone();
    loop {
        let next = expander.macroexpand_1(&current, &ctx).unwrap();
        if next == current {
            break;
        }
        current = next;
    }
    assert_eq!(expander.macroexpand(&form, &ctx).unwrap(), current);
}

#[test]
fn non_call_nodes_come_back_unchanged() {
    let env = env_with(MAC);
    for source in ["mac", "42", "\"s\"", ":kw", "[mac 1 2]", "()", "(1 2)", "(undefined 1)"] {
        let form = read(source).unwrap();
        assert_eq!(expand(&env, source), form, "macroexpand changed {source}");
        assert_eq!(expand_1(&env, source), form, "macroexpand-1 changed {source}");
    }
}

#[test]
fn step_limit_stops_runaway_macros() {
    let env = env_with("(defmacro forever [] `(forever))");
    let ctx = ExpansionContext::new(env.module_name(), &env);
    let err = MacroExpander::with_step_limit(16)
        .macroexpand(&read("(forever)").unwrap(), &ctx)
        .unwrap_err();
    assert!(matches!(err, ExpansionError::StepLimit { limit: 16, .. }));
}

#[test]
fn verbatim_results_depend_on_result_ok() {
    let mut env = MacroEnv::new("__main__");
    env.macros_mut().install("done", |_, _| {
        Ok(MacroOutput::Verbatim(make_symbol("finished", Span::default())))
    });
    let ctx = ExpansionContext::new(env.module_name(), &env);
    let form = read("(done 1)").unwrap();
    let expander = MacroExpander::new();

    assert_eq!(expander.macroexpand(&form, &ctx).unwrap(), form);
    assert_eq!(
        expander.macroexpand_result_ok(&form, &ctx).unwrap().to_string(),
        "finished"
    );
}

#[test]
fn expander_errors_carry_the_macro_and_form() {
    let mut env = MacroEnv::new("__main__");
    env.macros_mut()
        .install("boom", |_, _| Err(MacroBodyError::boxed("kaboom")));
    let ctx = ExpansionContext::new(env.module_name(), &env);
    let err = MacroExpander::new()
        .macroexpand(&read("(boom 1)").unwrap(), &ctx)
        .unwrap_err();
    match err {
        ExpansionError::MacroFailed { macro_name, form, message, .. } => {
            assert_eq!(macro_name, "boom");
            assert_eq!(form.to_string(), "(boom 1)");
            assert_eq!(message, "kaboom");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn nested_expansion_errors_pass_through_unchanged() {
    let mut env = MacroEnv::new("__main__");
    env.macros_mut()
        .install("boom", |_, _| Err(MacroBodyError::boxed("kaboom")));
    env.macros_mut().install("outer", |ctx, _| {
        let inner = ctx.macroexpand(&read("(boom)")?)?;
        Ok(MacroOutput::Form(inner))
    });
    let ctx = ExpansionContext::new(env.module_name(), &env);
    let err = MacroExpander::new()
        .macroexpand(&read("(outer)").unwrap(), &ctx)
        .unwrap_err();
    assert!(matches!(err, ExpansionError::MacroFailed { ref macro_name, .. } if macro_name == "boom"));
}

#[test]
fn arity_mismatch_is_an_expansion_error() {
    let env = env_with(MAC);
    let ctx = ExpansionContext::new(env.module_name(), &env);
    let err = MacroExpander::new()
        .macroexpand(&read("(mac 1)").unwrap(), &ctx)
        .unwrap_err();
    assert_eq!(err.form().to_string(), "(mac 1)");
}

#[test]
fn required_macros_expand_under_their_prefix() {
    let mut lib = ModuleMacros::new("lib");
    load_macros_from_source(MAC, &mut lib).unwrap();

    let mut env = MacroEnv::new("app");
    assert!(env
        .require(&lib, &Assignments::names(["mac"]), Some("lib"))
        .unwrap());
    assert_eq!(expand(&env, "(lib.mac 1 (f))").to_string(), "(f 1)");
    assert_eq!(expand(&env, "(mac 1 (f))").to_string(), "(mac 1 (f))");
}

#[test]
fn expand_all_rewrites_nested_calls_and_records_each_step() {
    let env = env_with(MAC);
    let ctx = ExpansionContext::new(env.module_name(), &env);
    let mut trace = Vec::new();
    let out = MacroExpander::new()
        .expand_all_traced(&read("(print (mac 1 (f)) '(mac 2 (g)))").unwrap(), &ctx, &mut trace)
        .unwrap();
    assert_eq!(out.to_string(), "(print (f 1) (quote (mac 2 (g))))");
    assert_eq!(trace.len(), 1);
    assert_eq!(trace[0].macro_name, "mac");
}

#[test]
fn core_macros_are_available_by_default() {
    let env = MacroEnv::new("__main__");
    assert_eq!(expand(&env, "(when x 1 2)").to_string(), "(if x (do 1 2) None)");
    assert_eq!(expand(&env, "(-> x (f 1) g)").to_string(), "(g (f x 1))");
}

#[test]
fn module_macros_shadow_core_macros() {
    let env = env_with("(defmacro when [t body] body)");
    assert_eq!(expand(&env, "(when x 1)").to_string(), "1");
}

#[test]
fn splices_under_nested_quasiquotes_fill_inner_holes() {
    let env = env_with("(defmacro m [x] `(a `(b ~@~x)))");
    assert_eq!(
        expand(&env, "(m (1 2))").to_string(),
        "(a (quasiquote (b (unquote-splice (1 2)))))"
    );
}

#[test]
fn top_level_splice_in_a_template_fails() {
    let env = env_with("(defmacro m [x] `~@x)");
    let ctx = ExpansionContext::new(env.module_name(), &env);
    let err = MacroExpander::new()
        .macroexpand(&read("(m (1 2))").unwrap(), &ctx)
        .unwrap_err();
    assert!(matches!(err, ExpansionError::MacroFailed { .. }));
}

#[test]
fn expand_all_reaches_into_unquoted_holes() {
    let env = env_with(MAC);
    let ctx = ExpansionContext::new(env.module_name(), &env);
    let out = MacroExpander::new()
        .expand_all(&read("(print `(x ~(mac 1 (f)) ~@(mac 2 (g)) (mac 3 (h))))").unwrap(), &ctx)
        .unwrap();
    assert_eq!(
        out.to_string(),
        "(print (quasiquote (x (unquote (f 1)) (unquote-splice (g 2)) (mac 3 (h)))))"
    );
}

#[test]
fn expanders_can_resolve_modules_through_their_context() {
    let mut env = MacroEnv::new("__main__");
    env.macros_mut().install("pi-literal", |ctx, _| {
        let pi = ctx.resolver()?.resolve_attr(&["math", "pi"])?;
        let value = pi
            .as_f64()
            .ok_or_else(|| MacroBodyError::boxed("math.pi is not a number"))?;
        Ok(MacroOutput::Form(make_float(value, Span::default())))
    });
    let provider = InMemoryProvider::with_std();
    let resolver = QualifiedResolver::new(&provider);
    let ctx = ExpansionContext::new(env.module_name(), &env).with_resolver(&resolver);

    let out = MacroExpander::new()
        .macroexpand(&read("(pi-literal)").unwrap(), &ctx)
        .unwrap();
    assert_eq!(
        out.to_string(),
        make_float(std::f64::consts::PI, Span::default()).to_string()
    );
    assert!(provider.is_loaded("math"));
}

#[test]
fn resolver_is_an_error_when_not_supplied() {
    let mut env = MacroEnv::new("__main__");
    env.macros_mut().install("needs-resolver", |ctx, _| {
        ctx.resolver()?;
        Ok(MacroOutput::Form(ctx.form.clone()))
    });
    let ctx = ExpansionContext::new(env.module_name(), &env);
    let err = MacroExpander::new()
        .macroexpand(&read("(needs-resolver)").unwrap(), &ctx)
        .unwrap_err();
    assert!(matches!(err, ExpansionError::MacroFailed { .. }));
}

#[test]
fn required_macros_run_in_their_originating_module() {
    let mut lib = ModuleMacros::new("lib");
    lib.install("whoami", |ctx, _| {
        Ok(MacroOutput::Form(make_string(ctx.module, Span::default())))
    });
    let mut env = MacroEnv::new("app");
    env.require(&lib, &Assignments::All, None).unwrap();
    env.macros_mut().install("local-whoami", |ctx, _| {
        Ok(MacroOutput::Form(make_string(ctx.module, Span::default())))
    });

    assert_eq!(expand(&env, "(whoami)").to_string(), "\"lib\"");
    assert_eq!(expand(&env, "(local-whoami)").to_string(), "\"app\"");
}

#[test]
fn expanders_share_the_context_generator() {
    let mut env = MacroEnv::new("__main__");
    env.macros_mut()
        .install("fresh", |ctx, _| Ok(MacroOutput::Form(ctx.gensym("t"))));
    let generator = GensymGenerator::new();
    let ctx = ExpansionContext::new(env.module_name(), &env).with_gensym(&generator);
    let expander = MacroExpander::new();

    let first = expander.macroexpand(&read("(fresh)").unwrap(), &ctx).unwrap();
    let second = expander.macroexpand(&read("(fresh)").unwrap(), &ctx).unwrap();
    assert_eq!(first.to_string(), "_hy_gensym_t_1");
    assert_eq!(second.to_string(), "_hy_gensym_t_2");
    assert_eq!(generator.current(), 2);
}

#[test]
fn custom_manglers_apply_to_install_and_lookup() {
    fn shout(raw: &str) -> String {
        raw.to_uppercase()
    }
    let mut table = ModuleMacros::with_mangler("m", shout);
    table.install("mac", |_, args| Ok(MacroOutput::Form(args[0].clone())));
    assert!(table.contains_mangled("MAC"));

    let ctx = ExpansionContext::new("m", &table).with_mangler(shout);
    let out = MacroExpander::new()
        .macroexpand(&read("(mac x)").unwrap(), &ctx)
        .unwrap();
    assert_eq!(out.to_string(), "x");
}
