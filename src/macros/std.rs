//! # Core Macros
//!
//! Builtin macros available in every [`MacroEnv`](crate::macros::MacroEnv)
//! built with [`MacroEnv::new`](crate::macros::MacroEnv::new). They sit last in
//! the lookup chain, so module macros and required macros shadow them.

use crate::ast::{make_list, make_symbol, AstNode, Delimiter, Expr, Span, Spanned};
use crate::errors::{BoxError, MacroBodyError};
use crate::macros::{MacroContext, MacroOutput, ModuleMacros};

use ::std::collections::HashMap;
use ::std::sync::Arc;

/// Module name recorded on every core binding.
pub const CORE_MODULE: &str = "quasi.core";

// ===================================================================================================
// REGISTRY: Core Macro Registration
// ===================================================================================================

/// Builds the core macro table.
pub fn core_macros() -> ModuleMacros {
    let mut table = ModuleMacros::new(CORE_MODULE);

    // Conditionals
    table.install("when", expand_when);
    table.install("unless", expand_unless);

    // Threading
    table.install("->", expand_thread_first);
    table.install("->>", expand_thread_last);

    // Hygiene
    table.install("with-gensyms", expand_with_gensyms);

    table
}

// ===================================================================================================
// INTERNAL HELPERS
// ===================================================================================================

fn expect_at_least(name: &str, n: usize, args: &[AstNode]) -> Result<(), BoxError> {
    if args.len() >= n {
        return Ok(());
    }
    Err(MacroBodyError::boxed(format!(
        "{name} requires at least {n} argument(s), got {}",
        args.len()
    )))
}

/// `(do body...)`, or the single body form when there is exactly one.
fn wrap_in_do(body: &[AstNode], span: Span) -> AstNode {
    if let [single] = body {
        return single.clone();
    }
    let mut items = vec![make_symbol("do", span)];
    items.extend_from_slice(body);
    make_list(items, span)
}

fn none(span: Span) -> AstNode {
    make_symbol("None", span)
}

/// Inserts `value` into `step`: as the first argument when `first` is set,
/// otherwise as the last. A bare symbol step becomes a one-argument call.
fn thread_into(step: &AstNode, value: AstNode, first: bool) -> AstNode {
    let Some(items) = step.as_sequence(Delimiter::Paren).filter(|items| !items.is_empty()) else {
        return make_list(vec![step.clone(), value], step.span);
    };
    let mut new_items = Vec::with_capacity(items.len() + 1);
    new_items.push(items[0].clone());
    if first {
        new_items.push(value);
        new_items.extend_from_slice(&items[1..]);
    } else {
        new_items.extend_from_slice(&items[1..]);
        new_items.push(value);
    }
    make_list(new_items, step.span)
}

fn thread(ctx: &MacroContext<'_>, args: &[AstNode], first: bool) -> Result<MacroOutput, BoxError> {
    let name = if first { "->" } else { "->>" };
    expect_at_least(name, 1, args)?;
    let threaded = args[1..]
        .iter()
        .fold(args[0].clone(), |acc, step| thread_into(step, acc, first));
    tracing::trace!(macro_name = name, span = ?ctx.form.span, "threaded");
    Ok(MacroOutput::Form(threaded))
}

/// Replaces every symbol named in `renames`, except inside quoted data.
fn rename_symbols(node: &AstNode, renames: &HashMap<String, AstNode>) -> AstNode {
    if let Some(name) = node.as_symbol() {
        return renames.get(name).cloned().unwrap_or_else(|| node.clone());
    }
    if node.is_call_to("quote") {
        return node.clone();
    }
    let Expr::Sequence(delimiter, items) = &*node.value else {
        return node.clone();
    };
    let new_items = items.iter().map(|item| rename_symbols(item, renames)).collect();
    Spanned::new(Arc::new(Expr::Sequence(*delimiter, new_items)), node.span)
}

// ===================================================================================================
// PUBLIC API: Core Macro Implementations
// ===================================================================================================

/// `(when test body...)` expands to `(if test (do body...) None)`.
pub fn expand_when(ctx: &MacroContext<'_>, args: &[AstNode]) -> Result<MacroOutput, BoxError> {
    expect_at_least("when", 1, args)?;
    let span = ctx.form.span;
    Ok(MacroOutput::Form(make_list(
        vec![
            make_symbol("if", span),
            args[0].clone(),
            wrap_in_do(&args[1..], span),
            none(span),
        ],
        span,
    )))
}

/// `(unless test body...)` expands to `(if test None (do body...))`.
pub fn expand_unless(ctx: &MacroContext<'_>, args: &[AstNode]) -> Result<MacroOutput, BoxError> {
    expect_at_least("unless", 1, args)?;
    let span = ctx.form.span;
    Ok(MacroOutput::Form(make_list(
        vec![
            make_symbol("if", span),
            args[0].clone(),
            none(span),
            wrap_in_do(&args[1..], span),
        ],
        span,
    )))
}

/// `(-> x (f a) g)` expands to `(g (f x a))`.
pub fn expand_thread_first(ctx: &MacroContext<'_>, args: &[AstNode]) -> Result<MacroOutput, BoxError> {
    thread(ctx, args, true)
}

/// `(->> x (f a) g)` expands to `(g (f a x))`.
pub fn expand_thread_last(ctx: &MacroContext<'_>, args: &[AstNode]) -> Result<MacroOutput, BoxError> {
    thread(ctx, args, false)
}

/// `(with-gensyms [a b] body...)` renames `a` and `b` in the body to fresh
/// generated symbols.
pub fn expand_with_gensyms(ctx: &MacroContext<'_>, args: &[AstNode]) -> Result<MacroOutput, BoxError> {
    expect_at_least("with-gensyms", 1, args)?;
    let Some(names) = args[0].as_sequence(Delimiter::Bracket) else {
        return Err(MacroBodyError::boxed("with-gensyms needs a [names] list"));
    };

    let mut renames = HashMap::new();
    for name in names {
        let Some(name) = name.as_symbol() else {
            return Err(MacroBodyError::boxed(format!(
                "with-gensyms names must be symbols, got {name}"
            )));
        };
        renames.insert(name.to_string(), ctx.gensym(name));
    }

    let body: Vec<AstNode> = args[1..]
        .iter()
        .map(|form| rename_symbols(form, &renames))
        .collect();
    Ok(MacroOutput::Form(wrap_in_do(&body, ctx.form.span)))
}
