//! Template macros.
//!
//! `(defmacro name [params] body)` defines a macro whose body is data rather
//! than host code. The body is interpreted at expansion time by a small
//! evaluator that understands exactly these forms:
//!
//! - a parameter name, which yields the bound argument
//! - a literal, which yields itself
//! - `'x`, which yields `x`
//! - `` `x ``, a quasiquote template with `~x` and `~@xs` holes
//! - `(with-gensyms [a b] body)`, which binds fresh symbols around `body`
//!
//! A variadic parameter (`#* rest`) binds a parenthesised sequence of the
//! remaining arguments, so `~@rest` splices them and `~rest` inserts them as
//! one form.

use ::std::collections::{HashMap, HashSet};
use ::std::sync::Arc;

use crate::ast::{make_list, AstNode, Expr, Span, Spanned};
use crate::errors::{BoxError, MacroBodyError, MacroDefinitionError};
use crate::macros::{MacroContext, MacroFn, MacroOutput};

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// Parameter list of a template macro.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamList {
    pub required: Vec<String>,
    pub rest: Option<String>,
}

/// A declarative macro defined by a template.
#[derive(Debug, Clone)]
pub struct MacroTemplate {
    pub params: ParamList,
    pub body: AstNode,
    pub doc: Option<String>,
}

type Bindings = HashMap<String, AstNode>;

// ============================================================================
// PUBLIC API
// ============================================================================

impl ParamList {
    /// Parses `[a b #* rest]`.
    pub fn parse(node: &AstNode) -> Result<Self, MacroDefinitionError> {
        let Expr::Sequence(_, items) = &*node.value else {
            return Err(malformed("parameter list must be a sequence", node));
        };

        let mut required = Vec::new();
        let mut rest = None;
        for item in items {
            if rest.is_some() {
                return Err(malformed("no parameters may follow `#*`", node));
            }
            if let Some(name) = item.as_symbol() {
                required.push(name.to_string());
                continue;
            }
            if item.is_call_to("unpack-iterable") {
                let Some(name) = item.as_form().and_then(|f| f.get(1)).and_then(|n| n.as_symbol()) else {
                    return Err(malformed("`#*` must be followed by a name", item));
                };
                rest = Some(name.to_string());
                continue;
            }
            return Err(malformed(format!("invalid parameter {item}"), item));
        }

        let params = ParamList { required, rest };
        params.check_no_duplicates(node)?;
        Ok(params)
    }

    fn check_no_duplicates(&self, node: &AstNode) -> Result<(), MacroDefinitionError> {
        let mut seen = HashSet::new();
        for name in self.required.iter().chain(self.rest.iter()) {
            if !seen.insert(name) {
                return Err(MacroDefinitionError::DuplicateParam {
                    name: name.clone(),
                    form: node.clone(),
                });
            }
        }
        Ok(())
    }

    /// Checks the arity of macro arguments against the parameter list.
    fn check_arity(&self, args_len: usize) -> Result<(), BoxError> {
        let required_len = self.required.len();
        let ok = match self.rest {
            Some(_) => args_len >= required_len,
            None => args_len == required_len,
        };
        if ok {
            return Ok(());
        }
        let expected = if self.rest.is_some() {
            format!("at least {required_len}")
        } else {
            format!("exactly {required_len}")
        };
        Err(MacroBodyError::boxed(format!(
            "expected {expected} argument{}, got {args_len}",
            if required_len == 1 { "" } else { "s" }
        )))
    }

    /// Binds macro parameters to arguments.
    fn bind(&self, args: &[AstNode], span: Span) -> Bindings {
        let mut bindings: Bindings = self
            .required
            .iter()
            .cloned()
            .zip(args.iter().cloned())
            .collect();

        let Some(variadic_name) = &self.rest else {
            return bindings;
        };
        let rest_args = args.get(self.required.len()..).unwrap_or(&[]).to_vec();
        bindings.insert(variadic_name.clone(), make_list(rest_args, span));
        bindings
    }
}

impl MacroTemplate {
    /// Validates the body shape up front so bad definitions fail at load time.
    pub fn new(params: ParamList, body: AstNode, doc: Option<String>) -> Result<Self, MacroDefinitionError> {
        check_body_shape(&body)?;
        Ok(Self { params, body, doc })
    }

    /// Expands a call's arguments through this template.
    pub fn expand(&self, ctx: &MacroContext<'_>, args: &[AstNode]) -> Result<AstNode, BoxError> {
        self.params.check_arity(args.len())?;
        let bindings = self.params.bind(args, ctx.form.span);
        eval_body(&self.body, &bindings, ctx)
    }

    pub fn into_macro_fn(self) -> MacroFn {
        Arc::new(move |ctx, args| self.expand(ctx, args).map(MacroOutput::Form))
    }
}

// ============================================================================
// BODY EVALUATION
// ============================================================================

fn eval_body(body: &AstNode, bindings: &Bindings, ctx: &MacroContext<'_>) -> Result<AstNode, BoxError> {
    if let Some(name) = body.as_symbol() {
        return bindings
            .get(name)
            .cloned()
            .ok_or_else(|| MacroBodyError::boxed(format!("name '{name}' is not bound in macro body")));
    }

    let Some(items) = body.as_form().filter(|items| !items.is_empty()) else {
        return Ok(body.clone());
    };

    match body.call_head() {
        Some("quote") if items.len() == 2 => Ok(items[1].clone()),
        Some("quasiquote") if items.len() == 2 => quasiquote(&items[1], bindings, ctx, 1),
        Some("with-gensyms") if items.len() == 3 => {
            let names = items[1]
                .as_sequence(crate::ast::Delimiter::Bracket)
                .ok_or_else(|| MacroBodyError::boxed("with-gensyms needs a [names] list"))?;
            let mut scoped = bindings.clone();
            for name in names {
                let name = name
                    .as_symbol()
                    .ok_or_else(|| MacroBodyError::boxed("with-gensyms names must be symbols"))?;
                scoped.insert(name.to_string(), ctx.gensym(name));
            }
            eval_body(&items[2], &scoped, ctx)
        }
        _ => Err(MacroBodyError::boxed(format!(
            "cannot evaluate {body} at expansion time"
        ))),
    }
}

/// Recursively fills a quasiquote template.
fn quasiquote(
    template: &AstNode,
    bindings: &Bindings,
    ctx: &MacroContext<'_>,
    depth: usize,
) -> Result<AstNode, BoxError> {
    let Expr::Sequence(delimiter, items) = &*template.value else {
        return Ok(template.clone());
    };

    match template.call_head() {
        Some("unquote") if items.len() == 2 => {
            if depth == 1 {
                return eval_body(&items[1], bindings, ctx);
            }
            return rebuild(template, items, |item| quasiquote(item, bindings, ctx, depth - 1));
        }
        Some("unquote-splice") if items.len() == 2 => {
            if depth == 1 {
                return Err(MacroBodyError::boxed("unquote-splice outside a sequence"));
            }
            return rebuild(template, items, |item| quasiquote(item, bindings, ctx, depth - 1));
        }
        Some("quasiquote") if items.len() == 2 => {
            return rebuild(template, items, |item| quasiquote(item, bindings, ctx, depth + 1));
        }
        _ => {}
    }

    let mut new_items = Vec::with_capacity(items.len());
    for item in items {
        if depth == 1 && item.is_call_to("unquote-splice") {
            let spliced = splice_source(item, bindings, ctx)?;
            new_items.extend(spliced);
            continue;
        }
        new_items.push(quasiquote(item, bindings, ctx, depth)?);
    }
    Ok(Spanned::new(
        Arc::new(Expr::Sequence(*delimiter, new_items)),
        template.span,
    ))
}

/// Evaluates the operand of `~@` and returns the items to splice.
fn splice_source(
    item: &AstNode,
    bindings: &Bindings,
    ctx: &MacroContext<'_>,
) -> Result<Vec<AstNode>, BoxError> {
    let operand = item
        .as_form()
        .and_then(|f| f.get(1))
        .ok_or_else(|| MacroBodyError::boxed("unquote-splice needs an operand"))?;
    let value = eval_body(operand, bindings, ctx)?;
    let Expr::Sequence(_, spliced) = &*value.value else {
        return Err(MacroBodyError::boxed(format!(
            "unquote-splice requires a sequence, got {value}"
        )));
    };
    Ok(spliced.clone())
}

fn rebuild(
    template: &AstNode,
    items: &[AstNode],
    mut f: impl FnMut(&AstNode) -> Result<AstNode, BoxError>,
) -> Result<AstNode, BoxError> {
    let Expr::Sequence(delimiter, _) = &*template.value else {
        return Ok(template.clone());
    };
    let mut new_items = Vec::with_capacity(items.len());
    new_items.push(items[0].clone());
    for item in &items[1..] {
        new_items.push(f(item)?);
    }
    Ok(Spanned::new(
        Arc::new(Expr::Sequence(*delimiter, new_items)),
        template.span,
    ))
}

// ============================================================================
// VALIDATION
// ============================================================================

fn check_body_shape(body: &AstNode) -> Result<(), MacroDefinitionError> {
    let Some(items) = body.as_form().filter(|items| !items.is_empty()) else {
        return Ok(());
    };
    match body.call_head() {
        Some("quote") | Some("quasiquote") if items.len() == 2 => Ok(()),
        Some("with-gensyms") if items.len() == 3 => check_body_shape(&items[2]),
        _ => Err(malformed(
            "macro body must be a parameter, a literal, a quoted form, a quasiquote template or with-gensyms",
            body,
        )),
    }
}

fn malformed(message: impl Into<String>, form: &AstNode) -> MacroDefinitionError {
    MacroDefinitionError::Malformed {
        message: message.into(),
        form: form.clone(),
    }
}
