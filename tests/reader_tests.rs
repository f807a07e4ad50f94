//! Reader behaviour as seen through the public API.

use quasi::ast::{Delimiter, Expr, Literal};
use quasi::errors::ReadError;
use quasi::syntax::{read, read_all, Reader};

#[test]
fn reads_one_form_per_call_then_reports_end_of_input() {
    let mut reader = Reader::new("(+ 2 2)\n(- 2 2)");
    assert_eq!(reader.read().unwrap().to_string(), "(+ 2 2)");
    assert_eq!(reader.read().unwrap().to_string(), "(- 2 2)");
    assert!(reader.read().unwrap_err().is_end_of_input());
    assert!(reader.is_exhausted());
}

#[test]
fn comments_and_whitespace_alone_are_end_of_input() {
    let mut reader = Reader::new("  ; nothing here\n\t");
    assert!(matches!(reader.read(), Err(ReadError::EndOfInput)));
}

#[test]
fn truncated_form_is_end_of_input_for_streaming_reads() {
    let mut reader = Reader::new("(+ 1");
    assert!(reader.read().unwrap_err().is_end_of_input());
}

#[test]
fn truncated_form_is_an_error_for_whole_text() {
    assert!(read_all("(+ 1 2) (+ 1").is_err());
}

#[test]
fn empty_string_empty_list_and_zero_stay_distinct() {
    let string = read("\"\"").unwrap();
    let list = read("()").unwrap();
    let zero = read("0").unwrap();

    assert_eq!(*string.value, Expr::Literal(Literal::String(String::new())));
    assert_eq!(*list.value, Expr::Sequence(Delimiter::Paren, vec![]));
    assert_eq!(*zero.value, Expr::Literal(Literal::Int(0)));
    assert_ne!(string, list);
    assert_ne!(list, zero);
    assert_ne!(string, zero);
}

#[test]
fn prefixes_read_as_wrapped_forms() {
    let form = read("`(a ~b ~@c 'd)").unwrap();
    assert_eq!(
        form.to_string(),
        "(quasiquote (a (unquote b) (unquote-splice c) (quote d)))"
    );
}

#[test]
fn equality_ignores_source_positions() {
    let a = read("(f   x)").unwrap();
    let b = read("\n\n(f x)").unwrap();
    assert_ne!(a.span, b.span);
    assert_eq!(a, b);
}
