//! AST module for the Quasi language
//!
//! This module provides the symbolic tree: the code-as-data representation that
//! the reader produces, macros rewrite, and the compiler lowers.
//!
//! ## Invariants
//!
//! - Nodes are immutable once built. Expansion constructs new nodes and shares
//!   untouched subtrees through `Arc`.
//! - Spans are provenance only. Two nodes with the same shape compare equal no
//!   matter where they were read from.
//! - `""`, `()` and `0` are three distinct nodes. Nothing in the tree collapses
//!   to a shared "empty" value.

// ============================================================================
// IMPORTS
// ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// Represents a span in the source code.
///
/// # Examples
///
/// ```rust
/// use quasi::ast::Span;
/// let span = Span { start: 0, end: 5 };
/// assert_eq!(span.len(), 5);
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Wrapper for carrying source span information with any value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Span,
}

/// Canonical AST node type with shared ownership for cheap rewriting.
pub type AstNode = Spanned<Arc<Expr>>;

/// Bracket style of a sequence.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Delimiter {
    /// `( ... )`: call-shaped forms.
    Paren,
    /// `[ ... ]`: literal lists.
    Bracket,
    /// `{ ... }`: literal dictionaries.
    Brace,
}

/// Self-evaluating leaf values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    String(String),
    Int(i64),
    Float(f64),
    /// `:name`, stored without the colon.
    Keyword(String),
}

/// The core tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Symbol(String),
    Sequence(Delimiter, Vec<AstNode>),
    Literal(Literal),
}

// ============================================================================
// PUBLIC API IMPLEMENTATION
// ============================================================================

impl Span {
    /// Smallest span covering both inputs.
    pub fn join(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Spanned<T> {
    pub fn new(value: T, span: Span) -> Self {
        Self { value, span }
    }
}

impl Spanned<Arc<Expr>> {
    /// Returns the symbol name if this node is a symbol.
    pub fn as_symbol(&self) -> Option<&str> {
        let Expr::Symbol(name) = &*self.value else {
            return None;
        };
        Some(name)
    }

    /// Returns the items of a sequence with the given delimiter.
    pub fn as_sequence(&self, delimiter: Delimiter) -> Option<&[AstNode]> {
        match &*self.value {
            Expr::Sequence(d, items) if *d == delimiter => Some(items),
            _ => None,
        }
    }

    /// Returns the items of a parenthesised form.
    pub fn as_form(&self) -> Option<&[AstNode]> {
        self.as_sequence(Delimiter::Paren)
    }

    /// Returns the head symbol of a call-shaped form.
    ///
    /// A form is call-shaped when it is a non-empty parenthesised sequence
    /// whose first element is a plain symbol.
    pub fn call_head(&self) -> Option<&str> {
        self.as_form()?.first()?.as_symbol()
    }

    /// True if this is a call-shaped form headed by `name`.
    pub fn is_call_to(&self, name: &str) -> bool {
        self.call_head() == Some(name)
    }
}

impl Expr {
    /// Pretty-prints the expression as source text.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use quasi::ast::{make_list, make_symbol, make_int, Span};
    /// let form = make_list(vec![make_symbol("+", Span::default()), make_int(1, Span::default())], Span::default());
    /// assert_eq!(form.value.pretty(), "(+ 1)");
    /// ```
    pub fn pretty(&self) -> String {
        match self {
            Expr::Symbol(name) => name.clone(),
            Expr::Sequence(delimiter, items) => Self::pretty_sequence(*delimiter, items),
            Expr::Literal(lit) => lit.pretty(),
        }
    }

    fn pretty_sequence(delimiter: Delimiter, items: &[AstNode]) -> String {
        let (open, close) = delimiter.pair();
        let inner = items
            .iter()
            .map(|item| item.value.pretty())
            .collect::<Vec<_>>()
            .join(" ");
        format!("{open}{inner}{close}")
    }
}

impl Literal {
    pub fn pretty(&self) -> String {
        match self {
            Literal::String(s) => format!("{s:?}"),
            Literal::Int(n) => n.to_string(),
            Literal::Float(x) => format_float(*x),
            Literal::Keyword(k) => format!(":{k}"),
        }
    }
}

impl Delimiter {
    pub fn pair(self) -> (char, char) {
        match self {
            Delimiter::Paren => ('(', ')'),
            Delimiter::Bracket => ('[', ']'),
            Delimiter::Brace => ('{', '}'),
        }
    }
}

// ============================================================================
// BUILDERS
// ============================================================================

pub fn make_symbol(name: impl Into<String>, span: Span) -> AstNode {
    Spanned::new(Arc::new(Expr::Symbol(name.into())), span)
}

pub fn make_list(items: Vec<AstNode>, span: Span) -> AstNode {
    make_sequence(Delimiter::Paren, items, span)
}

pub fn make_sequence(delimiter: Delimiter, items: Vec<AstNode>, span: Span) -> AstNode {
    Spanned::new(Arc::new(Expr::Sequence(delimiter, items)), span)
}

pub fn make_string(value: impl Into<String>, span: Span) -> AstNode {
    make_literal(Literal::String(value.into()), span)
}

pub fn make_int(value: i64, span: Span) -> AstNode {
    make_literal(Literal::Int(value), span)
}

pub fn make_float(value: f64, span: Span) -> AstNode {
    make_literal(Literal::Float(value), span)
}

pub fn make_keyword(name: impl Into<String>, span: Span) -> AstNode {
    make_literal(Literal::Keyword(name.into()), span)
}

pub fn make_literal(lit: Literal, span: Span) -> AstNode {
    Spanned::new(Arc::new(Expr::Literal(lit)), span)
}

/// Wraps `inner` as `(head inner)`, used for reader macros like `'x`.
pub fn make_wrapped(head: &str, inner: AstNode, span: Span) -> AstNode {
    make_list(vec![make_symbol(head, span), inner], span)
}

// ============================================================================
// TRAITS
// ============================================================================

/// Spans are provenance, not identity.
impl<T: PartialEq> PartialEq for Spanned<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty())
    }
}

impl fmt::Display for Spanned<Arc<Expr>> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value.pretty())
    }
}

/// Renders floats so they never read back as integers.
pub(crate) fn format_float(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 {
        format!("{x:.1}")
    } else {
        x.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_spans() {
        let a = make_symbol("x", Span { start: 0, end: 1 });
        let b = make_symbol("x", Span { start: 10, end: 11 });
        assert_eq!(a, b);
    }

    #[test]
    fn empty_values_stay_distinct() {
        let s = Span::default();
        let empty_string = make_string("", s);
        let empty_list = make_list(vec![], s);
        let zero = make_int(0, s);
        assert_ne!(empty_string, empty_list);
        assert_ne!(empty_list, zero);
        assert_ne!(empty_string, zero);
    }

    #[test]
    fn call_head_requires_plain_symbol() {
        let s = Span::default();
        let call = make_list(vec![make_symbol("f", s), make_int(1, s)], s);
        let nested = make_list(vec![call.clone(), make_int(1, s)], s);
        let vector = make_sequence(Delimiter::Bracket, vec![make_symbol("f", s)], s);
        assert_eq!(call.call_head(), Some("f"));
        assert_eq!(nested.call_head(), None);
        assert_eq!(vector.call_head(), None);
        assert_eq!(make_list(vec![], s).call_head(), None);
    }

    #[test]
    fn floats_print_with_fraction() {
        assert_eq!(make_float(2.0, Span::default()).to_string(), "2.0");
        assert_eq!(make_float(2.5, Span::default()).to_string(), "2.5");
    }
}
