//! Quasi Reader
//!
//! Turns source text into symbolic tree nodes, one form at a time. The reader is
//! purely syntactic: no macro lookup, no name resolution.
//!
//! `Reader::read` is the streaming entry point. It returns
//! `ReadError::EndOfInput` once the remaining input holds only whitespace and
//! comments, and also when the input ends in the middle of a form, so a REPL
//! loop can stop or ask for more text.
//!
//! `#name form` is dispatched to a reader macro enabled with
//! [`Reader::enable`]; an unknown tag is a syntax error.

use im::HashMap;
use miette::NamedSource;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::ast::{
    make_float, make_int, make_keyword, make_sequence, make_string, make_symbol, make_wrapped,
    AstNode, Delimiter, Span,
};
use crate::errors::{BoxError, ReadError};
use crate::syntax::reader_macro::ReaderMacro;

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct QuasiParser;

// ============================================================================
// PUBLIC API
// ============================================================================

/// A cursor over a source string that yields one form per `read` call.
#[derive(Debug, Clone)]
pub struct Reader<'src> {
    name: String,
    source: &'src str,
    pos: usize,
    readers: HashMap<String, ReaderMacro>,
}

impl<'src> Reader<'src> {
    pub fn new(source: &'src str) -> Self {
        Self::named("<string>", source)
    }

    /// A reader whose diagnostics refer to `name` (usually a file path).
    pub fn named(name: impl Into<String>, source: &'src str) -> Self {
        Self {
            name: name.into(),
            source,
            pos: 0,
            readers: HashMap::new(),
        }
    }

    /// Makes `#name` dispatch to `reader_macro` for the rest of the stream.
    pub fn enable(&mut self, reader_macro: ReaderMacro) {
        self.readers.insert(reader_macro.name.clone(), reader_macro);
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.readers.contains_key(name)
    }

    /// Reads the next complete form.
    pub fn read(&mut self) -> Result<AstNode, ReadError> {
        let rest = &self.source[self.pos..];
        if QuasiParser::parse(Rule::trivia, rest).is_ok() {
            self.pos = self.source.len();
            return Err(ReadError::EndOfInput);
        }

        let mut pairs = QuasiParser::parse(Rule::next_form, rest)
            .map_err(|e| self.convert_parse_error(e, rest.len()))?;
        let outer = pairs.next().ok_or(ReadError::EndOfInput)?;
        let consumed = outer.as_span().end();
        let form = outer
            .into_inner()
            .next()
            .ok_or_else(|| self.syntax_error("expected a form", self.pos, self.pos))?;

        let node = self.build_node(form)?;
        self.pos += consumed;
        Ok(node)
    }

    /// True once every form has been consumed.
    pub fn is_exhausted(&self) -> bool {
        QuasiParser::parse(Rule::trivia, &self.source[self.pos..]).is_ok()
    }

    /// Byte offset of the next unread character.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Iterator for Reader<'_> {
    type Item = Result<AstNode, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read() {
            Err(ReadError::EndOfInput) => None,
            other => Some(other),
        }
    }
}

/// Reads the first form of `source`.
pub fn read(source: &str) -> Result<AstNode, ReadError> {
    Reader::new(source).read()
}

/// Reads every form of `source`.
///
/// A form cut off by the end of input is an error here: the whole text was
/// supposed to be complete.
pub fn read_all(source: &str) -> Result<Vec<AstNode>, ReadError> {
    read_all_named("<string>", source)
}

/// Reads every form of a named source, for file-backed diagnostics.
pub fn read_all_named(name: &str, source: &str) -> Result<Vec<AstNode>, ReadError> {
    let mut reader = Reader::named(name, source);
    let mut forms = Vec::new();
    loop {
        match reader.read() {
            Ok(form) => forms.push(form),
            Err(ReadError::EndOfInput) if reader.is_exhausted() => return Ok(forms),
            Err(e) => return Err(e),
        }
    }
}

// ============================================================================
// AST BUILDERS
// ============================================================================

impl Reader<'_> {
    fn build_node(&self, pair: Pair<Rule>) -> Result<AstNode, ReadError> {
        let span = self.span_of(&pair);

        match pair.as_rule() {
            Rule::paren => self.build_sequence(Delimiter::Paren, pair, span),
            Rule::bracket => self.build_sequence(Delimiter::Bracket, pair, span),
            Rule::brace => self.build_sequence(Delimiter::Brace, pair, span),

            Rule::prefixed => {
                let mut inner = pair.into_inner();
                let (Some(prefix), Some(body)) = (inner.next(), inner.next()) else {
                    return Err(self.syntax_error("reader macro needs a form", span.start, span.end));
                };
                let head = reader_macro_head(prefix.as_str());
                Ok(make_wrapped(head, self.build_node(body)?, span))
            }

            Rule::tagged => {
                let mut inner = pair.into_inner();
                let (Some(tag), Some(body)) = (inner.next(), inner.next()) else {
                    return Err(self.syntax_error("reader macro needs a form", span.start, span.end));
                };
                let name = &tag.as_str()[1..];
                let Some(reader_macro) = self.readers.get(name) else {
                    return Err(self.syntax_error(
                        format!("unknown reader macro #{name}"),
                        span.start,
                        span.end,
                    ));
                };
                let form = self.build_node(body)?;
                tracing::trace!(reader_macro = name, "dispatching reader macro");
                reader_macro
                    .apply(&form)
                    .map_err(|e| self.reader_macro_error(name, &e, span))
            }

            Rule::string => {
                let raw = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
                Ok(make_string(unescape_string(raw), span))
            }

            Rule::keyword => Ok(make_keyword(&pair.as_str()[1..], span)),

            Rule::integer => {
                let text = pair.as_str().trim_start_matches('+');
                let value = text.parse::<i64>().map_err(|_| {
                    self.syntax_error(format!("integer literal out of range: {text}"), span.start, span.end)
                })?;
                Ok(make_int(value, span))
            }

            Rule::float => {
                let text = pair.as_str();
                let value = text.parse::<f64>().map_err(|_| {
                    self.syntax_error(format!("invalid float literal: {text}"), span.start, span.end)
                })?;
                Ok(make_float(value, span))
            }

            Rule::symbol => Ok(make_symbol(pair.as_str(), span)),

            rule => Err(self.syntax_error(
                format!("unsupported rule: {rule:?}"),
                span.start,
                span.end,
            )),
        }
    }

    fn build_sequence(
        &self,
        delimiter: Delimiter,
        pair: Pair<Rule>,
        span: Span,
    ) -> Result<AstNode, ReadError> {
        let items = pair
            .into_inner()
            .map(|p| self.build_node(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(make_sequence(delimiter, items, span))
    }

    fn span_of(&self, pair: &Pair<Rule>) -> Span {
        Span {
            start: self.pos + pair.as_span().start(),
            end: self.pos + pair.as_span().end(),
        }
    }
}

fn reader_macro_head(prefix: &str) -> &'static str {
    match prefix {
        "'" => "quote",
        "`" => "quasiquote",
        "~" => "unquote",
        "~@" => "unquote-splice",
        "#*" => "unpack-iterable",
        _ => "unpack-mapping",
    }
}

fn unescape_string(inner: &str) -> String {
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

impl Reader<'_> {
    fn syntax_error(&self, message: impl Into<String>, start: usize, end: usize) -> ReadError {
        ReadError::Syntax {
            message: message.into(),
            src: NamedSource::new(self.name.clone(), self.source.to_string()),
            span: (start, end.saturating_sub(start).max(1)).into(),
        }
    }

    fn reader_macro_error(&self, name: &str, error: &BoxError, span: Span) -> ReadError {
        ReadError::ReaderMacro {
            name: name.to_string(),
            message: error.to_string(),
            src: NamedSource::new(self.name.clone(), self.source.to_string()),
            span: (span.start, span.len().max(1)).into(),
        }
    }

    /// Failures at the very end of the remaining input mean the form is
    /// incomplete, which the streaming contract reports as `EndOfInput`.
    fn convert_parse_error(&self, error: pest::error::Error<Rule>, remaining: usize) -> ReadError {
        let (start, end) = match error.location {
            pest::error::InputLocation::Pos(pos) => (pos, pos),
            pest::error::InputLocation::Span((start, end)) => (start, end),
        };
        if start >= remaining {
            return ReadError::EndOfInput;
        }
        self.syntax_error(
            error.variant.message().to_string(),
            self.pos + start,
            self.pos + end,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_nothing_from_blank_input() {
        let mut reader = Reader::new("  ; just a comment\n");
        assert!(matches!(reader.read(), Err(ReadError::EndOfInput)));
    }

    #[test]
    fn spans_are_absolute() {
        let mut reader = Reader::new("a  (b c)");
        reader.read().unwrap();
        let second = reader.read().unwrap();
        assert_eq!(second.span, Span { start: 3, end: 8 });
    }

    #[test]
    fn unclosed_form_is_end_of_input() {
        let mut reader = Reader::new("(+ 1");
        assert!(matches!(reader.read(), Err(ReadError::EndOfInput)));
    }

    #[test]
    fn stray_close_is_a_syntax_error() {
        let mut reader = Reader::new(")");
        assert!(matches!(reader.read(), Err(ReadError::Syntax { .. })));
    }

    #[test]
    fn enabled_reader_macros_replace_the_tagged_form() {
        let mut reader = Reader::new("#twice x");
        reader.enable(ReaderMacro::new("twice", "m", |form| {
            Ok(crate::ast::make_list(vec![form.clone(), form.clone()], form.span))
        }));
        assert_eq!(reader.read().unwrap().to_string(), "(x x)");
    }

    #[test]
    fn unknown_reader_macros_are_syntax_errors() {
        let mut reader = Reader::new("#nope x");
        assert!(matches!(reader.read(), Err(ReadError::Syntax { .. })));
    }

    #[test]
    fn unpacking_prefixes_are_not_reader_macros() {
        assert_eq!(read("#* xs").unwrap().to_string(), "(unpack-iterable xs)");
        assert_eq!(read("#** kw").unwrap().to_string(), "(unpack-mapping kw)");
    }

    #[test]
    fn escapes_are_decoded() {
        assert_eq!(unescape_string(r#"a\n\"b\""#), "a\n\"b\"");
    }
}
