//! Loading `defmacro` forms.
//!
//! A module's top level may define template macros:
//!
//! ```text
//! (defmacro name [a b #* rest] "optional doc" `(...))
//! ```
//!
//! The loader installs every definition into a [`ModuleMacros`] table and
//! hands back the remaining forms in their original order.

use ::std::{fs, path::Path};

use crate::ast::AstNode;
use crate::errors::{MacroDefinitionError, QuasiError};
use crate::macros::{MacroTemplate, ModuleMacros, ParamList};
use crate::syntax::{read_all, read_all_named};

// =============================
// Public API for macro loading
// =============================

/// Installs every `defmacro` in `forms` and returns the other forms.
///
/// A later definition of the same name replaces the earlier one.
pub fn load_macros(
    forms: Vec<AstNode>,
    table: &mut ModuleMacros,
) -> Result<Vec<AstNode>, MacroDefinitionError> {
    let mut remaining = Vec::with_capacity(forms.len());
    for form in forms {
        if !is_macro_definition(&form) {
            remaining.push(form);
            continue;
        }
        let (name, template) = parse_defmacro(&form)?;
        if table.install_template(&name, template).is_some() {
            tracing::debug!(macro_name = %name, module = table.module(), "macro redefined");
        }
    }
    Ok(remaining)
}

/// Reads `source` and loads its macro definitions into `table`.
pub fn load_macros_from_source(
    source: &str,
    table: &mut ModuleMacros,
) -> Result<Vec<AstNode>, QuasiError> {
    let forms = read_all(source)?;
    Ok(load_macros(forms, table)?)
}

/// Loads macro definitions from a file.
pub fn load_macros_from_file<P: AsRef<Path>>(
    path: P,
    table: &mut ModuleMacros,
) -> Result<Vec<AstNode>, QuasiError> {
    let path_str = path.as_ref().to_string_lossy().to_string();
    let source = fs::read_to_string(&path).map_err(|e| QuasiError::io(path_str.clone(), e))?;
    let forms = read_all_named(&path_str, &source)?;
    Ok(load_macros(forms, table)?)
}

// =============================
// Definition parsing
// =============================

/// True for `(defmacro ...)` forms.
pub fn is_macro_definition(expr: &AstNode) -> bool {
    expr.is_call_to("defmacro")
}

/// Parses `(defmacro name [params] [doc] body)`.
pub fn parse_defmacro(expr: &AstNode) -> Result<(String, MacroTemplate), MacroDefinitionError> {
    let Some(items) = expr.as_form().filter(|_| is_macro_definition(expr)) else {
        return Err(malformed("expected a (defmacro ...) form", expr));
    };

    let (name_node, params_node, doc, body) = match items {
        [_, name, params, body] => (name, params, None, body),
        [_, name, params, doc, body] => {
            let Some(doc) = doc_string(doc) else {
                return Err(malformed("a macro body must be a single form", expr));
            };
            (name, params, Some(doc), body)
        }
        _ => {
            return Err(malformed(
                "expected (defmacro name [params] body) with an optional docstring",
                expr,
            ))
        }
    };

    let Some(name) = name_node.as_symbol() else {
        return Err(malformed(format!("macro name must be a symbol, got {name_node}"), expr));
    };
    let params = ParamList::parse(params_node)?;
    let template = MacroTemplate::new(params, body.clone(), doc)?;
    Ok((name.to_string(), template))
}

fn doc_string(node: &AstNode) -> Option<String> {
    match &*node.value {
        crate::ast::Expr::Literal(crate::ast::Literal::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn malformed(message: impl Into<String>, form: &AstNode) -> MacroDefinitionError {
    MacroDefinitionError::Malformed {
        message: message.into(),
        form: form.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::read;

    #[test]
    fn parses_simple_macro() {
        let (name, template) = parse_defmacro(&read("(defmacro twice [x] `(do ~x ~x))").unwrap()).unwrap();
        assert_eq!(name, "twice");
        assert_eq!(template.params.required, vec!["x"]);
        assert!(template.doc.is_none());
    }

    #[test]
    fn parses_docstring() {
        let (_, template) = parse_defmacro(&read("(defmacro m [] \"Does nothing.\" 'None)").unwrap()).unwrap();
        assert_eq!(template.doc.as_deref(), Some("Does nothing."));
    }

    #[test]
    fn load_keeps_other_forms_in_order() {
        let mut table = ModuleMacros::new("m");
        let rest = load_macros_from_source("(print 1) (defmacro id [x] x) (print 2)", &mut table).unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[1].to_string(), "(print 2)");
        assert!(table.contains("id"));
    }

    #[test]
    fn later_definitions_win() {
        let mut table = ModuleMacros::new("m");
        load_macros_from_source("(defmacro m [x] x) (defmacro m [x y] y)", &mut table).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn non_symbol_names_are_rejected() {
        assert!(parse_defmacro(&read("(defmacro 1 [] 'x)").unwrap()).is_err());
    }
}
