//! Host IR.
//!
//! A small tree shaped after the host platform's own syntax tree. It has two
//! renderings: [`Module::dump`], a single-line structural dump in the style of
//! the host's `ast.dump`, and [`Module::codegen`], host source text with only
//! the parentheses precedence requires.

use crate::ast::format_float;

// ============================================================================
// NODES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Assign { targets: Vec<Expr>, value: Expr },
    Import { names: Vec<Alias> },
    If { test: Expr, body: Vec<Stmt>, orelse: Vec<Stmt> },
}

/// One `import` clause: `name` or `name as asname`.
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprContext {
    Load,
    Store,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub arg: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(Constant),
    Name { id: String, ctx: ExprContext },
    Attribute { value: Box<Expr>, attr: String, ctx: ExprContext },
    BinOp { left: Box<Expr>, op: BinOp, right: Box<Expr> },
    UnaryOp { op: UnaryOp, operand: Box<Expr> },
    BoolOp { op: BoolOp, values: Vec<Expr> },
    Compare { left: Box<Expr>, ops: Vec<CmpOp>, comparators: Vec<Expr> },
    IfExp { test: Box<Expr>, body: Box<Expr>, orelse: Box<Expr> },
    Call { func: Box<Expr>, args: Vec<Expr>, keywords: Vec<Keyword> },
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict { keys: Vec<Expr>, values: Vec<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mult,
    MatMult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Invert,
    Not,
    UAdd,
    USub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

// ============================================================================
// CONSTRUCTORS
// ============================================================================

impl Expr {
    pub fn name(id: impl Into<String>) -> Self {
        Expr::Name {
            id: id.into(),
            ctx: ExprContext::Load,
        }
    }

    pub fn attribute(value: Expr, attr: impl Into<String>) -> Self {
        Expr::Attribute {
            value: Box::new(value),
            attr: attr.into(),
            ctx: ExprContext::Load,
        }
    }

    pub fn call(func: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            func: Box::new(func),
            args,
            keywords: Vec::new(),
        }
    }

    pub fn none() -> Self {
        Expr::Constant(Constant::None)
    }

    /// The same target in store context, if it is assignable.
    pub fn into_store(self) -> Option<Self> {
        match self {
            Expr::Name { id, .. } => Some(Expr::Name {
                id,
                ctx: ExprContext::Store,
            }),
            Expr::Attribute { value, attr, .. } => Some(Expr::Attribute {
                value,
                attr,
                ctx: ExprContext::Store,
            }),
            _ => None,
        }
    }
}

impl BinOp {
    fn dump_name(self) -> &'static str {
        match self {
            BinOp::Add => "Add",
            BinOp::Sub => "Sub",
            BinOp::Mult => "Mult",
            BinOp::MatMult => "MatMult",
            BinOp::Div => "Div",
            BinOp::FloorDiv => "FloorDiv",
            BinOp::Mod => "Mod",
            BinOp::Pow => "Pow",
            BinOp::LShift => "LShift",
            BinOp::RShift => "RShift",
            BinOp::BitOr => "BitOr",
            BinOp::BitXor => "BitXor",
            BinOp::BitAnd => "BitAnd",
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mult => "*",
            BinOp::MatMult => "@",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::BitAnd => "&",
        }
    }

    fn precedence(self) -> Prec {
        match self {
            BinOp::BitOr => Prec::BitOr,
            BinOp::BitXor => Prec::BitXor,
            BinOp::BitAnd => Prec::BitAnd,
            BinOp::LShift | BinOp::RShift => Prec::Shift,
            BinOp::Add | BinOp::Sub => Prec::Arith,
            BinOp::Mult | BinOp::MatMult | BinOp::Div | BinOp::FloorDiv | BinOp::Mod => Prec::Term,
            BinOp::Pow => Prec::Power,
        }
    }
}

impl UnaryOp {
    fn dump_name(self) -> &'static str {
        match self {
            UnaryOp::Invert => "Invert",
            UnaryOp::Not => "Not",
            UnaryOp::UAdd => "UAdd",
            UnaryOp::USub => "USub",
        }
    }
}

impl CmpOp {
    fn dump_name(self) -> &'static str {
        match self {
            CmpOp::Eq => "Eq",
            CmpOp::NotEq => "NotEq",
            CmpOp::Lt => "Lt",
            CmpOp::LtE => "LtE",
            CmpOp::Gt => "Gt",
            CmpOp::GtE => "GtE",
            CmpOp::Is => "Is",
            CmpOp::IsNot => "IsNot",
            CmpOp::In => "In",
            CmpOp::NotIn => "NotIn",
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        }
    }
}

// ============================================================================
// STRUCTURAL DUMP
// ============================================================================

impl Module {
    /// Single-line structural dump.
    pub fn dump(&self) -> String {
        format!("Module(body={}, type_ignores=[])", dump_list(&self.body, Stmt::dump))
    }
}

impl Stmt {
    pub fn dump(&self) -> String {
        match self {
            Stmt::Expr(value) => format!("Expr(value={})", value.dump()),
            Stmt::Assign { targets, value } => format!(
                "Assign(targets={}, value={})",
                dump_list(targets, Expr::dump),
                value.dump()
            ),
            Stmt::Import { names } => format!("Import(names={})", dump_list(names, Alias::dump)),
            Stmt::If { test, body, orelse } => format!(
                "If(test={}, body={}, orelse={})",
                test.dump(),
                dump_list(body, Stmt::dump),
                dump_list(orelse, Stmt::dump)
            ),
        }
    }
}

impl Alias {
    fn dump(&self) -> String {
        match &self.asname {
            Some(asname) => format!("alias(name={}, asname={})", py_str(&self.name), py_str(asname)),
            None => format!("alias(name={})", py_str(&self.name)),
        }
    }
}

impl ExprContext {
    fn dump(self) -> &'static str {
        match self {
            ExprContext::Load => "Load()",
            ExprContext::Store => "Store()",
        }
    }
}

impl Constant {
    fn repr(&self) -> String {
        match self {
            Constant::None => "None".to_string(),
            Constant::Bool(true) => "True".to_string(),
            Constant::Bool(false) => "False".to_string(),
            Constant::Int(n) => n.to_string(),
            Constant::Float(x) => py_float(*x),
            Constant::Str(s) => py_str(s),
        }
    }

    fn is_negative(&self) -> bool {
        match self {
            Constant::Int(n) => *n < 0,
            Constant::Float(x) => x.is_sign_negative(),
            _ => false,
        }
    }
}

impl Expr {
    pub fn dump(&self) -> String {
        match self {
            Expr::Constant(c) => format!("Constant(value={})", c.repr()),
            Expr::Name { id, ctx } => format!("Name(id={}, ctx={})", py_str(id), ctx.dump()),
            Expr::Attribute { value, attr, ctx } => format!(
                "Attribute(value={}, attr={}, ctx={})",
                value.dump(),
                py_str(attr),
                ctx.dump()
            ),
            Expr::BinOp { left, op, right } => format!(
                "BinOp(left={}, op={}(), right={})",
                left.dump(),
                op.dump_name(),
                right.dump()
            ),
            Expr::UnaryOp { op, operand } => {
                format!("UnaryOp(op={}(), operand={})", op.dump_name(), operand.dump())
            }
            Expr::BoolOp { op, values } => {
                let op = match op {
                    BoolOp::And => "And",
                    BoolOp::Or => "Or",
                };
                format!("BoolOp(op={op}(), values={})", dump_list(values, Expr::dump))
            }
            Expr::Compare { left, ops, comparators } => format!(
                "Compare(left={}, ops=[{}], comparators={})",
                left.dump(),
                ops.iter().map(|op| format!("{}()", op.dump_name())).collect::<Vec<_>>().join(", "),
                dump_list(comparators, Expr::dump)
            ),
            Expr::IfExp { test, body, orelse } => format!(
                "IfExp(test={}, body={}, orelse={})",
                test.dump(),
                body.dump(),
                orelse.dump()
            ),
            Expr::Call { func, args, keywords } => format!(
                "Call(func={}, args={}, keywords={})",
                func.dump(),
                dump_list(args, Expr::dump),
                dump_list(keywords, |kw| format!("keyword(arg={}, value={})", py_str(&kw.arg), kw.value.dump()))
            ),
            Expr::List(elts) => format!("List(elts={}, ctx=Load())", dump_list(elts, Expr::dump)),
            Expr::Tuple(elts) => format!("Tuple(elts={}, ctx=Load())", dump_list(elts, Expr::dump)),
            Expr::Dict { keys, values } => format!(
                "Dict(keys={}, values={})",
                dump_list(keys, Expr::dump),
                dump_list(values, Expr::dump)
            ),
        }
    }
}

fn dump_list<T>(items: &[T], f: impl Fn(&T) -> String) -> String {
    format!("[{}]", items.iter().map(f).collect::<Vec<_>>().join(", "))
}

// ============================================================================
// SOURCE GENERATION
// ============================================================================

/// Binding strength, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    Test,
    Or,
    And,
    Not,
    Cmp,
    BitOr,
    BitXor,
    BitAnd,
    Shift,
    Arith,
    Term,
    Factor,
    Power,
    Atom,
}

impl Prec {
    fn next(self) -> Prec {
        match self {
            Prec::Test => Prec::Or,
            Prec::Or => Prec::And,
            Prec::And => Prec::Not,
            Prec::Not => Prec::Cmp,
            Prec::Cmp => Prec::BitOr,
            Prec::BitOr => Prec::BitXor,
            Prec::BitXor => Prec::BitAnd,
            Prec::BitAnd => Prec::Shift,
            Prec::Shift => Prec::Arith,
            Prec::Arith => Prec::Term,
            Prec::Term => Prec::Factor,
            Prec::Factor => Prec::Power,
            Prec::Power | Prec::Atom => Prec::Atom,
        }
    }
}

impl Module {
    /// Host source text, one statement per line.
    pub fn codegen(&self) -> String {
        let mut out = String::new();
        for stmt in &self.body {
            stmt.codegen_into(&mut out, 0);
        }
        out
    }
}

impl Stmt {
    fn codegen_into(&self, out: &mut String, indent: usize) {
        match self {
            Stmt::Expr(value) => push_line(out, indent, &value.codegen()),
            Stmt::Assign { targets, value } => {
                let targets: Vec<String> = targets.iter().map(Expr::codegen).collect();
                push_line(out, indent, &format!("{} = {}", targets.join(" = "), value.codegen()));
            }
            Stmt::Import { names } => {
                let names: Vec<String> = names
                    .iter()
                    .map(|alias| match &alias.asname {
                        Some(asname) => format!("{} as {asname}", alias.name),
                        None => alias.name.clone(),
                    })
                    .collect();
                push_line(out, indent, &format!("import {}", names.join(", ")));
            }
            Stmt::If { test, body, orelse } => {
                push_line(out, indent, &format!("if {}:", test.codegen()));
                codegen_block(out, body, indent + 1);
                if !orelse.is_empty() {
                    push_line(out, indent, "else:");
                    codegen_block(out, orelse, indent + 1);
                }
            }
        }
    }
}

fn codegen_block(out: &mut String, body: &[Stmt], indent: usize) {
    if body.is_empty() {
        push_line(out, indent, "pass");
        return;
    }
    for stmt in body {
        stmt.codegen_into(out, indent);
    }
}

fn push_line(out: &mut String, indent: usize, line: &str) {
    for _ in 0..indent {
        out.push_str("    ");
    }
    out.push_str(line);
    out.push('\n');
}

impl Expr {
    /// Host source for this expression.
    pub fn codegen(&self) -> String {
        self.render(Prec::Test)
    }

    fn precedence(&self) -> Prec {
        match self {
            Expr::Constant(c) if c.is_negative() => Prec::Factor,
            Expr::Constant(_)
            | Expr::Name { .. }
            | Expr::Attribute { .. }
            | Expr::Call { .. }
            | Expr::List(_)
            | Expr::Tuple(_)
            | Expr::Dict { .. } => Prec::Atom,
            Expr::BinOp { op, .. } => op.precedence(),
            Expr::UnaryOp { op: UnaryOp::Not, .. } => Prec::Not,
            Expr::UnaryOp { .. } => Prec::Factor,
            Expr::BoolOp { op: BoolOp::And, .. } => Prec::And,
            Expr::BoolOp { op: BoolOp::Or, .. } => Prec::Or,
            Expr::Compare { .. } => Prec::Cmp,
            Expr::IfExp { .. } => Prec::Test,
        }
    }

    /// Renders in a position that needs at least `min` binding strength.
    fn render(&self, min: Prec) -> String {
        let text = self.render_bare();
        if self.precedence() < min {
            format!("({text})")
        } else {
            text
        }
    }

    fn render_bare(&self) -> String {
        match self {
            Expr::Constant(c) => c.repr(),
            Expr::Name { id, .. } => id.clone(),
            Expr::Attribute { value, attr, .. } => {
                let base = value.render(Prec::Atom);
                // `1.real` would lex as a float.
                if matches!(**value, Expr::Constant(Constant::Int(_))) {
                    format!("({base}).{attr}")
                } else {
                    format!("{base}.{attr}")
                }
            }
            Expr::BinOp { left, op, right } => {
                let prec = op.precedence();
                let (left_min, right_min) = if *op == BinOp::Pow {
                    (prec.next(), Prec::Factor)
                } else {
                    (prec, prec.next())
                };
                format!("{} {} {}", left.render(left_min), op.symbol(), right.render(right_min))
            }
            Expr::UnaryOp { op, operand } => match op {
                UnaryOp::Not => format!("not {}", operand.render(Prec::Not)),
                UnaryOp::Invert => format!("~{}", operand.render(Prec::Factor)),
                UnaryOp::UAdd => format!("+{}", operand.render(Prec::Factor)),
                UnaryOp::USub => format!("-{}", operand.render(Prec::Factor)),
            },
            Expr::BoolOp { op, values } => {
                let (word, prec) = match op {
                    BoolOp::And => ("and", Prec::And),
                    BoolOp::Or => ("or", Prec::Or),
                };
                values
                    .iter()
                    .map(|v| v.render(prec.next()))
                    .collect::<Vec<_>>()
                    .join(&format!(" {word} "))
            }
            Expr::Compare { left, ops, comparators } => {
                let mut text = left.render(Prec::BitOr);
                for (op, comparator) in ops.iter().zip(comparators) {
                    text.push_str(&format!(" {} {}", op.symbol(), comparator.render(Prec::BitOr)));
                }
                text
            }
            Expr::IfExp { test, body, orelse } => format!(
                "{} if {} else {}",
                body.render(Prec::Or),
                test.render(Prec::Or),
                orelse.render(Prec::Test)
            ),
            Expr::Call { func, args, keywords } => {
                let mut parts: Vec<String> = args.iter().map(|a| a.render(Prec::Test)).collect();
                parts.extend(
                    keywords
                        .iter()
                        .map(|kw| format!("{}={}", kw.arg, kw.value.render(Prec::Test))),
                );
                format!("{}({})", func.render(Prec::Atom), parts.join(", "))
            }
            Expr::List(elts) => format!("[{}]", render_items(elts)),
            Expr::Tuple(elts) if elts.len() == 1 => format!("({},)", render_items(elts)),
            Expr::Tuple(elts) => format!("({})", render_items(elts)),
            Expr::Dict { keys, values } => {
                let entries: Vec<String> = keys
                    .iter()
                    .zip(values)
                    .map(|(k, v)| format!("{}: {}", k.render(Prec::Test), v.render(Prec::Test)))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
        }
    }
}

fn render_items(items: &[Expr]) -> String {
    items
        .iter()
        .map(|item| item.render(Prec::Test))
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// HOST LITERALS
// ============================================================================

/// Host string literal, single-quoted unless the text contains only `'`.
fn py_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn py_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    format_float(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> Expr {
        Expr::Constant(Constant::Int(n))
    }

    fn binop(left: Expr, op: BinOp, right: Expr) -> Expr {
        Expr::BinOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    #[test]
    fn parenthesizes_only_when_needed() {
        let sum = binop(int(1), BinOp::Add, int(2));
        assert_eq!(binop(sum.clone(), BinOp::Mult, int(3)).codegen(), "(1 + 2) * 3");
        assert_eq!(binop(int(3), BinOp::Mult, sum.clone()).codegen(), "3 * (1 + 2)");
        assert_eq!(binop(sum, BinOp::Add, int(3)).codegen(), "1 + 2 + 3");
        let right_nested = binop(int(1), BinOp::Sub, binop(int(2), BinOp::Sub, int(3)));
        assert_eq!(right_nested.codegen(), "1 - (2 - 3)");
    }

    #[test]
    fn power_is_right_associative() {
        let nested = binop(int(2), BinOp::Pow, binop(int(3), BinOp::Pow, int(4)));
        assert_eq!(nested.codegen(), "2 ** 3 ** 4");
        assert_eq!(binop(int(-1), BinOp::Pow, int(2)).codegen(), "(-1) ** 2");
    }

    #[test]
    fn strings_use_host_quoting() {
        assert_eq!(py_str("it's"), "\"it's\"");
        assert_eq!(py_str("a\nb"), "'a\\nb'");
    }

    #[test]
    fn if_statements_indent_their_bodies() {
        let module = Module {
            body: vec![Stmt::If {
                test: Expr::name("x"),
                body: vec![Stmt::Expr(int(1))],
                orelse: vec![],
            }],
        };
        assert_eq!(module.codegen(), "if x:\n    1\n");
    }

    #[test]
    fn nested_blocks_indent_per_level() {
        let inner = Stmt::If {
            test: Expr::name("y"),
            body: vec![],
            orelse: vec![Stmt::Import {
                names: vec![Alias {
                    name: "os".into(),
                    asname: Some("o".into()),
                }],
            }],
        };
        let module = Module {
            body: vec![Stmt::If {
                test: Expr::name("x"),
                body: vec![inner],
                orelse: vec![],
            }],
        };
        assert_eq!(
            module.codegen(),
            "if x:\n    if y:\n        pass\n    else:\n        import os as o\n"
        );
    }

    #[test]
    fn single_element_tuples_keep_their_comma() {
        assert_eq!(Expr::Tuple(vec![int(1)]).codegen(), "(1,)");
        assert_eq!(Expr::Tuple(vec![]).dump(), "Tuple(elts=[], ctx=Load())");
    }
}
