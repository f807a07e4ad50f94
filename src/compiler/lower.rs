//! Lowering symbolic trees to the host IR.
//!
//! Every form is macro-expanded first (when the compiler holds a macro table),
//! then lowered by shape. Forms that only make sense as statements (`setv`,
//! `import`) produce no value; any statements a form needs are hoisted ahead of
//! the expression that uses its value.

use crate::ast::{AstNode, Delimiter, Expr as Node, Literal};
use crate::compiler::ir::{
    Alias, BinOp, BoolOp, CmpOp, Constant, Expr, ExprContext, Keyword, Module, Stmt, UnaryOp,
};
use crate::compiler::Compiler;
use crate::errors::CompileError;
use crate::gensym::{self, GensymGenerator};
use crate::macros::{ExpansionContext, MacroExpander, MacroTable};
use crate::mangle::mangle;
use crate::runtime::resolver::QualifiedResolver;

type LowerResult<T> = Result<T, CompileError>;

// ============================================================================
// COMPILER
// ============================================================================

/// Lowers trees to [`Module`]s, expanding macros from an optional table.
pub struct HostCompiler<'a> {
    macros: Option<&'a dyn MacroTable>,
    expander: MacroExpander,
    gensym: &'a GensymGenerator,
    resolver: Option<&'a QualifiedResolver<'a>>,
}

impl<'a> HostCompiler<'a> {
    /// A compiler that performs no macro expansion.
    pub fn new() -> Self {
        Self {
            macros: None,
            expander: MacroExpander::new(),
            gensym: gensym::global(),
            resolver: None,
        }
    }

    pub fn with_macros(mut self, table: &'a dyn MacroTable) -> Self {
        self.macros = Some(table);
        self
    }

    pub fn with_expander(mut self, expander: MacroExpander) -> Self {
        self.expander = expander;
        self
    }

    pub fn with_gensym(mut self, gensym: &'a GensymGenerator) -> Self {
        self.gensym = gensym;
        self
    }

    pub fn with_resolver(mut self, resolver: &'a QualifiedResolver<'a>) -> Self {
        self.resolver = Some(resolver);
        self
    }
}

impl Default for HostCompiler<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler for HostCompiler<'_> {
    fn compile_forms(
        &self,
        forms: &[AstNode],
        module: &str,
        import_stdlib: bool,
    ) -> LowerResult<Module> {
        let lowerer = Lowerer {
            compiler: self,
            module,
            expand: true,
        };

        let mut body = Vec::new();
        if import_stdlib {
            body.push(Stmt::Import {
                names: vec![Alias {
                    name: "hy".to_string(),
                    asname: None,
                }],
            });
        }
        for form in forms {
            if let Some(value) = lowerer.lower(form, &mut body)? {
                body.push(Stmt::Expr(value));
            }
        }
        tracing::debug!(module, statements = body.len(), "compiled module");
        Ok(Module { body })
    }
}

// ============================================================================
// LOWERING
// ============================================================================

#[derive(Clone, Copy)]
struct Lowerer<'c, 'a> {
    compiler: &'c HostCompiler<'a>,
    module: &'c str,
    /// Cleared inside verbatim macro results.
    expand: bool,
}

impl Lowerer<'_, '_> {
    /// Lowers `node`, pushing hoisted statements onto `out`. `None` means the
    /// form produced no value.
    fn lower(&self, node: &AstNode, out: &mut Vec<Stmt>) -> LowerResult<Option<Expr>> {
        let Some(table) = self.compiler.macros.filter(|_| self.expand) else {
            return self.lower_expanded(node, out);
        };

        let mut ctx = ExpansionContext::new(self.module, table).with_gensym(self.compiler.gensym);
        if let Some(resolver) = self.compiler.resolver {
            ctx = ctx.with_resolver(resolver);
        }
        let expanded = self.compiler.expander.expand_for_compile(node, &ctx)?;
        if expanded.verbatim {
            let verbatim = Lowerer {
                expand: false,
                ..*self
            };
            return verbatim.lower_expanded(&expanded.node, out);
        }
        self.lower_expanded(&expanded.node, out)
    }

    /// Lowers `node` where a value is required; valueless forms read as `None`.
    fn lower_value(&self, node: &AstNode, out: &mut Vec<Stmt>) -> LowerResult<Expr> {
        Ok(self.lower(node, out)?.unwrap_or_else(Expr::none))
    }

    fn lower_values(&self, nodes: &[AstNode], out: &mut Vec<Stmt>) -> LowerResult<Vec<Expr>> {
        nodes.iter().map(|node| self.lower_value(node, out)).collect()
    }

    fn lower_expanded(&self, node: &AstNode, out: &mut Vec<Stmt>) -> LowerResult<Option<Expr>> {
        match &*node.value {
            Node::Literal(lit) => Ok(Some(lower_literal(lit))),
            Node::Symbol(name) => lower_symbol(name, node).map(Some),
            Node::Sequence(Delimiter::Bracket, items) => {
                Ok(Some(Expr::List(self.lower_values(items, out)?)))
            }
            Node::Sequence(Delimiter::Brace, items) => self.lower_dict(items, node, out).map(Some),
            Node::Sequence(Delimiter::Paren, items) if items.is_empty() => {
                Ok(Some(Expr::Tuple(Vec::new())))
            }
            Node::Sequence(Delimiter::Paren, items) => match node.call_head() {
                Some(head) => self.lower_form(head, &items[1..], node, out),
                None => {
                    let func = self.lower_value(&items[0], out)?;
                    self.lower_call(func, &items[1..], out).map(Some)
                }
            },
        }
    }

    fn lower_form(
        &self,
        head: &str,
        args: &[AstNode],
        node: &AstNode,
        out: &mut Vec<Stmt>,
    ) -> LowerResult<Option<Expr>> {
        if let Some(op) = binop_for(head) {
            return self.lower_operator(head, op, args, node, out).map(Some);
        }
        if let Some(op) = cmpop_for(head) {
            return self.lower_compare(head, op, args, node, out).map(Some);
        }

        match head {
            "~" => {
                let [operand] = args else {
                    return Err(malformed(head, node, "expects exactly 1 argument"));
                };
                Ok(Some(Expr::UnaryOp {
                    op: UnaryOp::Invert,
                    operand: Box::new(self.lower_value(operand, out)?),
                }))
            }
            "and" | "or" => self.lower_bool(head, args, node, out).map(Some),
            "not" => {
                let [operand] = args else {
                    return Err(malformed(head, node, "expects exactly 1 argument"));
                };
                Ok(Some(Expr::UnaryOp {
                    op: UnaryOp::Not,
                    operand: Box::new(self.lower_value(operand, out)?),
                }))
            }
            "if" => self.lower_if(args, node, out).map(Some),
            "do" => self.lower_do(args, out),
            "setv" => self.lower_setv(args, node, out).map(|()| None),
            "import" => self.lower_import(args, node, out).map(|()| None),
            "." => self.lower_dot(args, node, out).map(Some),
            "quote" => {
                let [quoted] = args else {
                    return Err(malformed(head, node, "expects exactly 1 argument"));
                };
                self.quote(quoted, None, out).map(Some)
            }
            "quasiquote" => {
                let [quoted] = args else {
                    return Err(malformed(head, node, "expects exactly 1 argument"));
                };
                self.quote(quoted, Some(1), out).map(Some)
            }
            "unquote" | "unquote-splice" => Err(unsupported(node, format!("`{head}` outside a quasiquote"))),
            "unpack-iterable" | "unpack-mapping" => {
                Err(unsupported(node, "unpacking has no host IR equivalent"))
            }
            "defmacro" => Err(unsupported(
                node,
                "macro definitions are loaded before compilation",
            )),
            method if method.len() > 1 && method.starts_with('.') && !method[1..].contains('.') => {
                let Some((target, rest)) = args.split_first() else {
                    return Err(malformed(head, node, "method call needs an object"));
                };
                let object = self.lower_value(target, out)?;
                let func = Expr::attribute(object, mangle(&method[1..]));
                self.lower_call(func, rest, out).map(Some)
            }
            _ => {
                let func = lower_symbol(head, node)?;
                self.lower_call(func, args, out).map(Some)
            }
        }
    }

    // -----------------------------------------------
    // Operators
    // -----------------------------------------------

    fn lower_operator(
        &self,
        head: &str,
        op: BinOp,
        args: &[AstNode],
        node: &AstNode,
        out: &mut Vec<Stmt>,
    ) -> LowerResult<Expr> {
        let mut operands = self.lower_values(args, out)?;
        match (op, operands.len()) {
            (BinOp::Add, 0) => return Ok(Expr::Constant(Constant::Int(0))),
            (BinOp::Mult, 0) => return Ok(Expr::Constant(Constant::Int(1))),
            (_, 0) => return Err(malformed(head, node, "expects at least 1 argument")),
            (BinOp::Add | BinOp::Sub, 1) => {
                let op = if op == BinOp::Add { UnaryOp::UAdd } else { UnaryOp::USub };
                return Ok(Expr::UnaryOp {
                    op,
                    operand: Box::new(operands.remove(0)),
                });
            }
            (BinOp::Mult, 1) => return Ok(operands.remove(0)),
            (BinOp::Div, 1) => {
                return Ok(Expr::BinOp {
                    left: Box::new(Expr::Constant(Constant::Int(1))),
                    op,
                    right: Box::new(operands.remove(0)),
                })
            }
            (_, 1) => return Err(malformed(head, node, "expects at least 2 arguments")),
            _ => {}
        }

        let fold = |left: Expr, right: Expr| Expr::BinOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        };
        if op == BinOp::Pow {
            let last = operands.pop().unwrap_or_else(Expr::none);
            return Ok(operands.into_iter().rev().fold(last, |acc, base| fold(base, acc)));
        }
        let mut operands = operands.into_iter();
        let first = operands.next().unwrap_or_else(Expr::none);
        Ok(operands.fold(first, fold))
    }

    fn lower_compare(
        &self,
        head: &str,
        op: CmpOp,
        args: &[AstNode],
        node: &AstNode,
        out: &mut Vec<Stmt>,
    ) -> LowerResult<Expr> {
        let mut operands = self.lower_values(args, out)?;
        if operands.is_empty() {
            return Err(malformed(head, node, "expects at least 1 argument"));
        }
        let left = operands.remove(0);
        if operands.is_empty() {
            out.push(Stmt::Expr(left));
            return Ok(Expr::Constant(Constant::Bool(true)));
        }
        Ok(Expr::Compare {
            left: Box::new(left),
            ops: vec![op; operands.len()],
            comparators: operands,
        })
    }

    fn lower_bool(
        &self,
        head: &str,
        args: &[AstNode],
        node: &AstNode,
        out: &mut Vec<Stmt>,
    ) -> LowerResult<Expr> {
        let op = if head == "and" { BoolOp::And } else { BoolOp::Or };
        let Some((first, rest)) = args.split_first() else {
            return Ok(match op {
                BoolOp::And => Expr::Constant(Constant::Bool(true)),
                BoolOp::Or => Expr::none(),
            });
        };

        let mut values = vec![self.lower_value(first, out)?];
        for arg in rest {
            let mut hoisted = Vec::new();
            values.push(self.lower_value(arg, &mut hoisted)?);
            if !hoisted.is_empty() {
                return Err(unsupported(
                    node,
                    format!("`{head}` operands after the first must be expressions"),
                ));
            }
        }
        if values.len() == 1 {
            return Ok(values.remove(0));
        }
        Ok(Expr::BoolOp { op, values })
    }

    // -----------------------------------------------
    // Special forms
    // -----------------------------------------------

    fn lower_if(&self, args: &[AstNode], node: &AstNode, out: &mut Vec<Stmt>) -> LowerResult<Expr> {
        let (test, then, orelse) = match args {
            [test, then] => (test, then, None),
            [test, then, orelse] => (test, then, Some(orelse)),
            _ => return Err(malformed("if", node, "expects a test, a then-branch and an optional else-branch")),
        };

        let test = self.lower_value(test, out)?;
        let mut then_stmts = Vec::new();
        let then_value = self.lower_value(then, &mut then_stmts)?;
        let mut else_stmts = Vec::new();
        let else_value = match orelse {
            Some(orelse) => self.lower_value(orelse, &mut else_stmts)?,
            None => Expr::none(),
        };

        if then_stmts.is_empty() && else_stmts.is_empty() {
            return Ok(Expr::IfExp {
                test: Box::new(test),
                body: Box::new(then_value),
                orelse: Box::new(else_value),
            });
        }

        // Branches with statements assign their value to a fresh temporary.
        let temp = self.compiler.gensym.gensym_name("if");
        let assign = |value: Expr| Stmt::Assign {
            targets: vec![Expr::Name {
                id: temp.clone(),
                ctx: ExprContext::Store,
            }],
            value,
        };
        then_stmts.push(assign(then_value));
        else_stmts.push(assign(else_value));
        out.push(Stmt::If {
            test,
            body: then_stmts,
            orelse: else_stmts,
        });
        Ok(Expr::name(temp))
    }

    fn lower_do(&self, args: &[AstNode], out: &mut Vec<Stmt>) -> LowerResult<Option<Expr>> {
        let Some((last, init)) = args.split_last() else {
            return Ok(None);
        };
        for form in init {
            if let Some(value) = self.lower(form, out)? {
                out.push(Stmt::Expr(value));
            }
        }
        self.lower(last, out)
    }

    fn lower_setv(&self, args: &[AstNode], node: &AstNode, out: &mut Vec<Stmt>) -> LowerResult<()> {
        if args.len() % 2 != 0 {
            return Err(malformed("setv", node, "expects an even number of arguments"));
        }
        for pair in args.chunks(2) {
            let Some(target_name) = pair[0].as_symbol() else {
                return Err(malformed("setv", node, format!("cannot assign to {}", pair[0])));
            };
            let Some(target) = lower_symbol(target_name, &pair[0])?.into_store() else {
                return Err(malformed("setv", node, format!("cannot assign to {target_name}")));
            };
            let value = self.lower_value(&pair[1], out)?;
            out.push(Stmt::Assign {
                targets: vec![target],
                value,
            });
        }
        Ok(())
    }

    fn lower_import(&self, args: &[AstNode], node: &AstNode, out: &mut Vec<Stmt>) -> LowerResult<()> {
        let mut names = Vec::new();
        let mut rest = args;
        while let Some((first, tail)) = rest.split_first() {
            let Some(path) = first.as_symbol() else {
                return Err(unsupported(node, format!("cannot import {first}")));
            };
            let mut alias = Alias {
                name: mangle(path),
                asname: None,
            };
            rest = tail;
            if let [kw, asname, tail @ ..] = rest {
                if is_keyword(kw, "as") {
                    let Some(asname) = asname.as_symbol() else {
                        return Err(malformed("import", node, ":as needs a name"));
                    };
                    alias.asname = Some(mangle(asname));
                    rest = tail;
                }
            }
            names.push(alias);
        }
        if names.is_empty() {
            return Err(malformed("import", node, "expects at least one module"));
        }
        out.push(Stmt::Import { names });
        Ok(())
    }

    fn lower_dot(&self, args: &[AstNode], node: &AstNode, out: &mut Vec<Stmt>) -> LowerResult<Expr> {
        let Some((object, attrs)) = args.split_first() else {
            return Err(malformed(".", node, "expects an object"));
        };
        let mut value = self.lower_value(object, out)?;
        for attr in attrs {
            let Some(name) = attr.as_symbol() else {
                return Err(unsupported(node, format!("attribute {attr} must be a symbol")));
            };
            value = Expr::attribute(value, mangle(name));
        }
        Ok(value)
    }

    fn lower_dict(&self, items: &[AstNode], node: &AstNode, out: &mut Vec<Stmt>) -> LowerResult<Expr> {
        if items.len() % 2 != 0 {
            return Err(malformed("{}", node, "dictionary literal needs an even number of forms"));
        }
        let mut keys = Vec::with_capacity(items.len() / 2);
        let mut values = Vec::with_capacity(items.len() / 2);
        for pair in items.chunks(2) {
            keys.push(self.lower_value(&pair[0], out)?);
            values.push(self.lower_value(&pair[1], out)?);
        }
        Ok(Expr::Dict { keys, values })
    }

    fn lower_call(&self, func: Expr, args: &[AstNode], out: &mut Vec<Stmt>) -> LowerResult<Expr> {
        let mut positional = Vec::new();
        let mut keywords = Vec::new();
        let mut rest = args;
        while let Some((arg, tail)) = rest.split_first() {
            rest = tail;
            if arg.is_call_to("unpack-iterable") || arg.is_call_to("unpack-mapping") {
                return Err(unsupported(arg, "unpacking has no host IR equivalent"));
            }
            if let Node::Literal(Literal::Keyword(name)) = &*arg.value {
                let Some((value, tail)) = rest.split_first() else {
                    return Err(malformed(name, arg, "keyword argument needs a value"));
                };
                rest = tail;
                keywords.push(Keyword {
                    arg: mangle(name),
                    value: self.lower_value(value, out)?,
                });
                continue;
            }
            positional.push(self.lower_value(arg, out)?);
        }
        Ok(Expr::Call {
            func: Box::new(func),
            args: positional,
            keywords,
        })
    }

    // -----------------------------------------------
    // Quoting
    // -----------------------------------------------

    /// Builds the model-constructor expression for a quoted node. Inside a
    /// quasiquote, `depth` tracks nesting so only depth-1 holes are filled.
    fn quote(&self, node: &AstNode, depth: Option<usize>, out: &mut Vec<Stmt>) -> LowerResult<Expr> {
        let items = match &*node.value {
            Node::Symbol(name) => return Ok(model("Symbol", vec![str_constant(name)])),
            Node::Literal(lit) => return Ok(quote_literal(lit)),
            Node::Sequence(_, items) => items,
        };

        let mut depth = depth;
        if let Some(level) = depth {
            match node.call_head() {
                Some("unquote") if items.len() == 2 && level == 1 => {
                    return self.lower_value(&items[1], out);
                }
                Some("unquote-splice") if items.len() == 2 && level == 1 => {
                    return Err(unsupported(node, "`unquote-splice` outside a sequence"));
                }
                // `level` is at least 2 here, so it never drops below 1.
                Some("unquote" | "unquote-splice") if items.len() == 2 => depth = Some(level - 1),
                Some("quasiquote") if items.len() == 2 => depth = Some(level + 1),
                _ => {}
            }
        }

        // Runs of ordinary items become list literals; depth-1 splices are
        // concatenated in between.
        let mut chunks: Vec<Expr> = Vec::new();
        let mut run: Vec<Expr> = Vec::new();
        for item in items {
            let splices = depth == Some(1) && item.is_call_to("unquote-splice");
            let item_items = item.as_form().unwrap_or(&[]);
            if splices && item_items.len() == 2 {
                if !run.is_empty() {
                    chunks.push(Expr::List(std::mem::take(&mut run)));
                }
                let spliced = self.lower_value(&item_items[1], out)?;
                chunks.push(Expr::call(Expr::name("list"), vec![spliced]));
                continue;
            }
            run.push(self.quote(item, depth, out)?);
        }
        if !run.is_empty() || chunks.is_empty() {
            chunks.push(Expr::List(run));
        }

        let mut chunks = chunks.into_iter();
        let first = chunks.next().unwrap_or_else(|| Expr::List(Vec::new()));
        let elements = chunks.fold(first, |left, right| Expr::BinOp {
            left: Box::new(left),
            op: BinOp::Add,
            right: Box::new(right),
        });

        let constructor = match &*node.value {
            Node::Sequence(Delimiter::Bracket, _) => "List",
            Node::Sequence(Delimiter::Brace, _) => "Dict",
            _ => "Expression",
        };
        Ok(model(constructor, vec![elements]))
    }
}

// ============================================================================
// LEAVES
// ============================================================================

fn lower_literal(lit: &Literal) -> Expr {
    match lit {
        Literal::Int(n) => Expr::Constant(Constant::Int(*n)),
        Literal::Float(x) => Expr::Constant(Constant::Float(*x)),
        Literal::String(s) => str_constant(s),
        Literal::Keyword(k) => model("Keyword", vec![str_constant(k)]),
    }
}

fn quote_literal(lit: &Literal) -> Expr {
    match lit {
        Literal::Int(n) => model("Integer", vec![Expr::Constant(Constant::Int(*n))]),
        Literal::Float(x) => model("Float", vec![Expr::Constant(Constant::Float(*x))]),
        Literal::String(s) => model("String", vec![str_constant(s)]),
        Literal::Keyword(k) => model("Keyword", vec![str_constant(k)]),
    }
}

/// Symbols become names; dotted symbols become attribute chains. Every
/// component is mangled.
fn lower_symbol(name: &str, node: &AstNode) -> LowerResult<Expr> {
    match name {
        "None" => return Ok(Expr::none()),
        "True" => return Ok(Expr::Constant(Constant::Bool(true))),
        "False" => return Ok(Expr::Constant(Constant::Bool(false))),
        _ => {}
    }
    if !name.contains('.') || name.chars().all(|c| c == '.') {
        return Ok(Expr::name(mangle(name)));
    }

    let mut parts = name.split('.');
    let first = parts.next().unwrap_or_default();
    if first.is_empty() || name.ends_with('.') || name.contains("..") {
        return Err(unsupported(node, format!("cannot compile symbol `{name}`")));
    }
    Ok(parts.fold(Expr::name(mangle(first)), |value, attr| {
        Expr::attribute(value, mangle(attr))
    }))
}

fn binop_for(head: &str) -> Option<BinOp> {
    Some(match head {
        "+" => BinOp::Add,
        "-" => BinOp::Sub,
        "*" => BinOp::Mult,
        "@" => BinOp::MatMult,
        "/" => BinOp::Div,
        "//" => BinOp::FloorDiv,
        "%" => BinOp::Mod,
        "**" => BinOp::Pow,
        "<<" => BinOp::LShift,
        ">>" => BinOp::RShift,
        "|" => BinOp::BitOr,
        "^" => BinOp::BitXor,
        "&" => BinOp::BitAnd,
        _ => return None,
    })
}

fn cmpop_for(head: &str) -> Option<CmpOp> {
    Some(match head {
        "=" => CmpOp::Eq,
        "!=" => CmpOp::NotEq,
        "<" => CmpOp::Lt,
        "<=" => CmpOp::LtE,
        ">" => CmpOp::Gt,
        ">=" => CmpOp::GtE,
        "is" => CmpOp::Is,
        "is-not" => CmpOp::IsNot,
        "in" => CmpOp::In,
        "not-in" => CmpOp::NotIn,
        _ => return None,
    })
}

fn is_keyword(node: &AstNode, name: &str) -> bool {
    matches!(&*node.value, Node::Literal(Literal::Keyword(k)) if k == name)
}

fn str_constant(s: &str) -> Expr {
    Expr::Constant(Constant::Str(s.to_string()))
}

/// `hy.models.<name>(args...)`
fn model(name: &str, args: Vec<Expr>) -> Expr {
    let models = Expr::attribute(Expr::name("hy"), "models");
    Expr::call(Expr::attribute(models, name), args)
}

fn malformed(head: &str, form: &AstNode, message: impl Into<String>) -> CompileError {
    CompileError::Malformed {
        head: head.to_string(),
        form: form.clone(),
        message: message.into(),
    }
}

fn unsupported(form: &AstNode, message: impl Into<String>) -> CompileError {
    CompileError::Unsupported {
        form: form.clone(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{make_symbol, Span};
    use crate::macros::{MacroEnv, MacroOutput};
    use crate::syntax::{read, read_all};

    fn codegen(compiler: &HostCompiler<'_>, source: &str) -> LowerResult<String> {
        let forms = read_all(source).unwrap();
        Ok(compiler.compile_forms(&forms, "__main__", false)?.codegen())
    }

    fn plain(source: &str) -> String {
        codegen(&HostCompiler::new(), source).unwrap()
    }

    #[test]
    fn operator_identities() {
        assert_eq!(plain("(+)"), "0\n");
        assert_eq!(plain("(*)"), "1\n");
        assert_eq!(plain("(- x)"), "-x\n");
        assert_eq!(plain("(* x)"), "x\n");
        assert_eq!(plain("(/ x)"), "1 / x\n");
        assert_eq!(plain("(- a b c)"), "a - b - c\n");
    }

    #[test]
    fn single_operand_comparison_is_true() {
        assert_eq!(plain("(< (f))"), "f()\nTrue\n");
    }

    #[test]
    fn branches_with_statements_use_a_temporary() {
        let gensym = GensymGenerator::new();
        let compiler = HostCompiler::new().with_gensym(&gensym);
        let text = codegen(&compiler, "(if c (do (setv y 1) y) 2)").unwrap();
        assert_eq!(
            text,
            "if c:\n    y = 1\n    _hy_gensym_if_1 = y\nelse:\n    _hy_gensym_if_1 = 2\n_hy_gensym_if_1\n"
        );
    }

    #[test]
    fn later_boolean_operands_must_be_expressions() {
        let err = codegen(&HostCompiler::new(), "(and a (setv x 1))").unwrap_err();
        assert!(matches!(err, CompileError::Unsupported { .. }));
    }

    #[test]
    fn quoted_forms_build_models() {
        assert_eq!(
            plain("'(a 1)"),
            "hy.models.Expression([hy.models.Symbol('a'), hy.models.Integer(1)])\n"
        );
    }

    #[test]
    fn splices_concatenate_lists() {
        assert_eq!(
            plain("`(a ~@xs)"),
            "hy.models.Expression([hy.models.Symbol('a')] + list(xs))\n"
        );
    }

    #[test]
    fn methods_imports_and_dicts() {
        assert_eq!(plain("(.append xs 1)"), "xs.append(1)\n");
        assert_eq!(plain("(import os.path :as p)"), "import os.path as p\n");
        assert_eq!(plain("(. obj attr)"), "obj.attr\n");
    }

    #[test]
    fn verbatim_macro_results_are_not_expanded_again() {
        let mut env = MacroEnv::new("__main__");
        env.macros_mut().install("raw", |_, _| {
            let form = read("(when a b)")?;
            Ok(MacroOutput::Verbatim(form))
        });
        let compiler = HostCompiler::new().with_macros(&env);
        assert_eq!(codegen(&compiler, "(raw)").unwrap(), "when(a, b)\n");
        assert_eq!(codegen(&compiler, "(when a b)").unwrap(), "b if a else None\n");
    }

    #[test]
    fn top_level_splice_is_rejected() {
        for source in ["`~@x", "`~@~y"] {
            let err = HostCompiler::new()
                .compile(&read(source).unwrap(), "__main__", false)
                .unwrap_err();
            assert!(matches!(err, CompileError::Unsupported { .. }), "{source}");
        }
    }

    #[test]
    fn nested_quasiquote_only_fills_matching_depth() {
        assert_eq!(
            plain("`(a `(b ~@~x))"),
            "hy.models.Expression([hy.models.Symbol('a'), hy.models.Expression([hy.models.Symbol('quasiquote'), \
             hy.models.Expression([hy.models.Symbol('b'), hy.models.Expression([hy.models.Symbol('unquote-splice'), x])])])])\n"
        );
    }

    #[test]
    fn unquote_outside_quasiquote_is_rejected() {
        let tree = make_symbol("x", Span::default());
        let wrapped = crate::ast::make_wrapped("unquote", tree, Span::default());
        let err = HostCompiler::new().compile(&wrapped, "__main__", false).unwrap_err();
        assert!(matches!(err, CompileError::Unsupported { .. }));
    }
}
