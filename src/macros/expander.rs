//! Macro expansion engine.
//!
//! [`MacroExpander::macroexpand`] rewrites a call-shaped form until its head no
//! longer names a macro; [`MacroExpander::macroexpand_1`] performs at most one
//! step. Both return non-call-shaped input untouched, so they can be applied
//! blindly while walking a tree. [`MacroExpander::expand_all`] is that walk.
//!
//! ## Termination
//!
//! There is no built-in depth guard. A macro that always expands into another
//! macro call loops forever unless the expander was built with a step limit.

use ::std::sync::Arc;

use crate::ast::{AstNode, Expr, Span, Spanned};
use crate::config::ExpansionConfig;
use crate::errors::{BoxError, ExpansionError};
use crate::gensym::{self, GensymGenerator};
use crate::macros::{MacroBinding, MacroContext, MacroExpansionStep, MacroOutput, MacroTable};
use crate::mangle::{mangle, MangleFn};
use crate::runtime::resolver::QualifiedResolver;

// =============================
// Public API for macro expansion
// =============================

/// Everything a lookup-and-expand step needs besides the form.
#[derive(Clone, Copy)]
pub struct ExpansionContext<'a> {
    /// Module whose code is being expanded.
    pub module: &'a str,
    pub table: &'a dyn MacroTable,
    pub gensym: &'a GensymGenerator,
    pub resolver: Option<&'a QualifiedResolver<'a>>,
    pub mangle: MangleFn,
}

impl<'a> ExpansionContext<'a> {
    /// A context using the process-wide gensym generator and default mangler.
    pub fn new(module: &'a str, table: &'a dyn MacroTable) -> Self {
        Self {
            module,
            table,
            gensym: gensym::global(),
            resolver: None,
            mangle,
        }
    }

    pub fn with_gensym(mut self, gensym: &'a GensymGenerator) -> Self {
        self.gensym = gensym;
        self
    }

    pub fn with_resolver(mut self, resolver: &'a QualifiedResolver<'a>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Looks heads up with `mangle`; tables must store names the same way.
    pub fn with_mangler(mut self, mangle: MangleFn) -> Self {
        self.mangle = mangle;
        self
    }
}

/// The expansion engine. Stateless apart from its configuration.
#[derive(Debug, Clone, Default)]
pub struct MacroExpander {
    step_limit: Option<usize>,
}

impl MacroExpander {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with `ExpansionError::StepLimit` after `limit` expansion steps on
    /// a single form.
    pub fn with_step_limit(limit: usize) -> Self {
        Self {
            step_limit: Some(limit),
        }
    }

    pub fn from_config(config: &ExpansionConfig) -> Self {
        Self {
            step_limit: config.step_limit,
        }
    }

    pub fn step_limit(&self) -> Option<usize> {
        self.step_limit
    }

    /// Expands `form` to a fixpoint.
    ///
    /// If an expander returns [`MacroOutput::Verbatim`], expansion stops and
    /// the call that produced it is returned unexpanded.
    pub fn macroexpand(
        &self,
        form: &AstNode,
        ctx: &ExpansionContext<'_>,
    ) -> Result<AstNode, ExpansionError> {
        self.expand_head(form, ctx, Mode::FIXPOINT, &mut None)
            .map(|expanded| expanded.node)
    }

    /// Like [`macroexpand`](Self::macroexpand), but a verbatim result is
    /// returned as the final value.
    pub fn macroexpand_result_ok(
        &self,
        form: &AstNode,
        ctx: &ExpansionContext<'_>,
    ) -> Result<AstNode, ExpansionError> {
        self.expand_head(form, ctx, Mode::RESULT_OK, &mut None)
            .map(|expanded| expanded.node)
    }

    /// Performs at most one expansion step.
    pub fn macroexpand_1(
        &self,
        form: &AstNode,
        ctx: &ExpansionContext<'_>,
    ) -> Result<AstNode, ExpansionError> {
        self.expand_head(form, ctx, Mode::ONCE, &mut None)
            .map(|expanded| expanded.node)
    }

    /// [`macroexpand`](Self::macroexpand), recording every step.
    pub fn macroexpand_traced(
        &self,
        form: &AstNode,
        ctx: &ExpansionContext<'_>,
        trace: &mut Vec<MacroExpansionStep>,
    ) -> Result<AstNode, ExpansionError> {
        self.expand_head(form, ctx, Mode::FIXPOINT, &mut Some(trace))
            .map(|expanded| expanded.node)
    }

    /// Expands every call-shaped node in `form`, outermost first. Quoted data
    /// is left alone, as is the payload of a verbatim result; inside a
    /// quasiquote only the unquoted holes are expanded.
    pub fn expand_all(
        &self,
        form: &AstNode,
        ctx: &ExpansionContext<'_>,
    ) -> Result<AstNode, ExpansionError> {
        self.expand_tree(form, ctx, &mut None)
    }

    /// [`expand_all`](Self::expand_all), recording every step.
    pub fn expand_all_traced(
        &self,
        form: &AstNode,
        ctx: &ExpansionContext<'_>,
        trace: &mut Vec<MacroExpansionStep>,
    ) -> Result<AstNode, ExpansionError> {
        self.expand_tree(form, ctx, &mut Some(trace))
    }
}

// =============================
// Internal expansion helpers
// =============================

#[derive(Debug, Clone, Copy)]
struct Mode {
    once: bool,
    result_ok: bool,
}

impl Mode {
    const FIXPOINT: Mode = Mode {
        once: false,
        result_ok: false,
    };
    const RESULT_OK: Mode = Mode {
        once: false,
        result_ok: true,
    };
    const ONCE: Mode = Mode {
        once: true,
        result_ok: false,
    };
}

pub(crate) struct Expanded {
    pub(crate) node: AstNode,
    /// The node is an expander's verbatim result.
    pub(crate) verbatim: bool,
}

type Trace<'t> = Option<&'t mut Vec<MacroExpansionStep>>;

impl MacroExpander {
    /// Fixpoint expansion that reports whether the result is verbatim.
    pub(crate) fn expand_for_compile(
        &self,
        form: &AstNode,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expanded, ExpansionError> {
        self.expand_head(form, ctx, Mode::RESULT_OK, &mut None)
    }

    /// The lookup-and-expand loop on the head of `form`.
    fn expand_head(
        &self,
        form: &AstNode,
        ctx: &ExpansionContext<'_>,
        mode: Mode,
        trace: &mut Trace<'_>,
    ) -> Result<Expanded, ExpansionError> {
        let mut tree = form.clone();
        let mut steps = 0usize;

        while let Some(head) = tree.call_head() {
            let name = (ctx.mangle)(head);
            let Some((provenance, binding)) = ctx.table.lookup(&name) else {
                break;
            };

            if let Some(limit) = self.step_limit {
                if steps >= limit {
                    return Err(ExpansionError::StepLimit { limit, form: tree });
                }
            }
            steps += 1;

            tracing::debug!(
                macro_name = %binding.name,
                module = ctx.module,
                origin = %binding.module,
                step = steps,
                "expanding macro"
            );

            match self.invoke(binding, &tree, ctx)? {
                MacroOutput::Form(output) => {
                    let output = inherit_span(output, tree.span);
                    if let Some(trace) = trace.as_deref_mut() {
                        trace.push(MacroExpansionStep {
                            macro_name: binding.name.clone(),
                            provenance,
                            input: tree.clone(),
                            output: output.clone(),
                        });
                    }
                    tree = output;
                }
                MacroOutput::Verbatim(value) if mode.result_ok => {
                    return Ok(Expanded {
                        node: value,
                        verbatim: true,
                    });
                }
                MacroOutput::Verbatim(_) => {
                    return Ok(Expanded {
                        node: tree,
                        verbatim: false,
                    });
                }
            }

            if mode.once {
                break;
            }
        }

        Ok(Expanded {
            node: tree,
            verbatim: false,
        })
    }

    /// Runs the expander in its originating module's context.
    fn invoke(
        &self,
        binding: &MacroBinding,
        form: &AstNode,
        ctx: &ExpansionContext<'_>,
    ) -> Result<MacroOutput, ExpansionError> {
        let args = form.as_form().map(|items| &items[1..]).unwrap_or(&[]);
        let macro_ctx = MacroContext {
            module: &binding.module,
            form,
            gensym: ctx.gensym,
            resolver: ctx.resolver,
            table: ctx.table,
            mangle: ctx.mangle,
            expander: self,
        };
        (binding.expander)(&macro_ctx, args).map_err(|e| expansion_failure(&binding.name, form, e))
    }

    fn expand_tree(
        &self,
        form: &AstNode,
        ctx: &ExpansionContext<'_>,
        trace: &mut Trace<'_>,
    ) -> Result<AstNode, ExpansionError> {
        let expanded = self.expand_head(form, ctx, Mode::RESULT_OK, trace)?;
        let node = expanded.node;
        if expanded.verbatim || node.is_call_to("quote") {
            return Ok(node);
        }
        if node.is_call_to("quasiquote") {
            return self.expand_template(&node, ctx, 0, trace);
        }

        let Expr::Sequence(delimiter, items) = &*node.value else {
            return Ok(node);
        };
        let mut new_items = Vec::with_capacity(items.len());
        for item in items {
            new_items.push(self.expand_tree(item, ctx, trace)?);
        }
        Ok(Spanned::new(
            Arc::new(Expr::Sequence(*delimiter, new_items)),
            node.span,
        ))
    }

    /// Walks quasiquoted data, expanding only the operands of depth-1
    /// `unquote` and `unquote-splice` holes.
    fn expand_template(
        &self,
        node: &AstNode,
        ctx: &ExpansionContext<'_>,
        depth: usize,
        trace: &mut Trace<'_>,
    ) -> Result<AstNode, ExpansionError> {
        let Expr::Sequence(delimiter, items) = &*node.value else {
            return Ok(node.clone());
        };

        let depth = match node.call_head() {
            Some("unquote" | "unquote-splice") if items.len() == 2 && depth == 1 => {
                let operand = self.expand_tree(&items[1], ctx, trace)?;
                return Ok(Spanned::new(
                    Arc::new(Expr::Sequence(*delimiter, vec![items[0].clone(), operand])),
                    node.span,
                ));
            }
            Some("unquote" | "unquote-splice") if items.len() == 2 && depth > 1 => depth - 1,
            Some("quasiquote") if items.len() == 2 => depth + 1,
            _ => depth,
        };

        let mut new_items = Vec::with_capacity(items.len());
        for item in items {
            new_items.push(self.expand_template(item, ctx, depth, trace)?);
        }
        Ok(Spanned::new(
            Arc::new(Expr::Sequence(*delimiter, new_items)),
            node.span,
        ))
    }
}

/// Expander errors become `ExpansionError`s carrying the offending form. An
/// `ExpansionError` raised by a nested expansion passes through unchanged.
fn expansion_failure(macro_name: &str, form: &AstNode, error: BoxError) -> ExpansionError {
    match error.downcast::<ExpansionError>() {
        Ok(inner) => *inner,
        Err(source) => ExpansionError::MacroFailed {
            macro_name: macro_name.to_string(),
            form: form.clone(),
            message: source.to_string(),
            source: Some(source),
        },
    }
}

/// Nodes built without a location take the location of the call they replace.
fn inherit_span(node: AstNode, span: Span) -> AstNode {
    if node.span == Span::default() {
        Spanned::new(node.value, span)
    } else {
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{make_list, make_symbol, make_int};
    use crate::macros::ModuleMacros;

    #[test]
    fn inherit_span_keeps_existing_locations() {
        let located = make_symbol("x", Span { start: 3, end: 4 });
        let kept = inherit_span(located, Span { start: 0, end: 10 });
        assert_eq!(kept.span, Span { start: 3, end: 4 });

        let floating = make_symbol("x", Span::default());
        let moved = inherit_span(floating, Span { start: 0, end: 10 });
        assert_eq!(moved.span, Span { start: 0, end: 10 });
    }

    #[test]
    fn nested_expansion_errors_keep_their_form() {
        let mut table = ModuleMacros::new("m");
        table.install("boom", |_, _| Err(crate::errors::MacroBodyError::boxed("boom")));
        table.install("outer", |ctx, args| {
            let inner = make_list(
                vec![make_symbol("boom", Span::default()), args[0].clone()],
                Span::default(),
            );
            Ok(MacroOutput::Form(ctx.macroexpand(&inner)?))
        });
        let ctx = ExpansionContext::new("m", &table);
        let form = make_list(
            vec![make_symbol("outer", Span::default()), make_int(1, Span::default())],
            Span::default(),
        );
        let err = MacroExpander::new().macroexpand(&form, &ctx).unwrap_err();
        let ExpansionError::MacroFailed { macro_name, .. } = &err else {
            panic!("expected a macro failure, got {err:?}");
        };
        assert_eq!(macro_name, "boom");
        assert_eq!(err.form().call_head(), Some("boom"));
    }
}
