//! Identifier mangling.
//!
//! `mangle` normalizes a human-authored name into the host platform's
//! identifier syntax. The rest of the crate treats it as an opaque pure
//! function (see [`MangleFn`]); this module supplies the default convention:
//!
//! 1. Dotted names are mangled one component at a time.
//! 2. Leading underscores are set aside and restored at the end.
//! 3. Hyphens after the first character become underscores.
//! 4. If the result is still not an identifier, it gets the escape prefix
//!    [`ESCAPE_PREFIX`] and every offending character is spelled out between
//!    two [`ESCAPE_DELIM`]s, by name for ASCII punctuation and as `U<hex>`
//!    otherwise.

/// Signature of a mangling function. Anything pure with this shape can stand
/// in for [`mangle`].
pub type MangleFn = fn(&str) -> String;

/// Prefix marking a name that needed escaping.
pub const ESCAPE_PREFIX: &str = "hyx_";

/// Brackets each escaped character.
pub const ESCAPE_DELIM: char = 'X';

pub fn mangle(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    if raw.contains('.') && !raw.trim_matches('.').is_empty() {
        return raw
            .split('.')
            .map(|part| if part.is_empty() { String::new() } else { mangle(part) })
            .collect::<Vec<_>>()
            .join(".");
    }

    let body = raw.trim_start_matches('_');
    let leading = &raw[..raw.len() - body.len()];

    let converted: String = body
        .chars()
        .enumerate()
        .map(|(i, c)| if i > 0 && c == '-' { '_' } else { c })
        .collect();

    if is_identifier(&format!("{leading}{converted}")) {
        return format!("{leading}{converted}");
    }

    let escaped: String = converted
        .chars()
        .map(|c| {
            if c != ESCAPE_DELIM && is_identifier_continue(c) {
                c.to_string()
            } else {
                format!("{ESCAPE_DELIM}{}{ESCAPE_DELIM}", char_name(c))
            }
        })
        .collect();
    format!("{leading}{ESCAPE_PREFIX}{escaped}")
}

/// True if `name` is a valid host identifier.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first == '_' || first.is_alphabetic()) && chars.all(is_identifier_continue)
}

fn is_identifier_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn char_name(c: char) -> String {
    let name = match c {
        ' ' => "space",
        '!' => "exclamation_mark",
        '"' => "quotation_mark",
        '#' => "number_sign",
        '$' => "dollar_sign",
        '%' => "percent_sign",
        '&' => "ampersand",
        '\'' => "apostrophe",
        '(' => "left_parenthesis",
        ')' => "right_parenthesis",
        '*' => "asterisk",
        '+' => "plus_sign",
        ',' => "comma",
        '-' => "hyphenHminus",
        '.' => "full_stop",
        '/' => "solidus",
        ':' => "colon",
        ';' => "semicolon",
        '<' => "lessHthan_sign",
        '=' => "equals_sign",
        '>' => "greaterHthan_sign",
        '?' => "question_mark",
        '@' => "commercial_at",
        '[' => "left_square_bracket",
        '\\' => "reverse_solidus",
        ']' => "right_square_bracket",
        '^' => "circumflex_accent",
        '`' => "grave_accent",
        '{' => "left_curly_bracket",
        '|' => "vertical_line",
        '}' => "right_curly_bracket",
        '~' => "tilde",
        'X' => "latin_capital_letter_x",
        other => return format!("U{:x}", other as u32),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_identifiers_pass_through() {
        assert_eq!(mangle("foo"), "foo");
        assert_eq!(mangle("_private"), "_private");
    }

    #[test]
    fn hyphens_become_underscores() {
        assert_eq!(mangle("foo-bar"), "foo_bar");
        assert_eq!(mangle("-"), "hyx_XhyphenHminusX");
    }

    #[test]
    fn punctuation_is_escaped() {
        assert_eq!(mangle("valid?"), "hyx_validXquestion_markX");
        assert_eq!(mangle("_x!"), "_hyx_xXexclamation_markX");
        assert_eq!(mangle("+"), "hyx_Xplus_signX");
    }

    #[test]
    fn escape_delimiter_is_escaped_inside_escaped_names() {
        assert_eq!(mangle("X?"), "hyx_Xlatin_capital_letter_xXXquestion_markX");
        assert_eq!(mangle("X"), "X");
    }

    #[test]
    fn dotted_names_mangle_per_component() {
        assert_eq!(mangle("foo-bar.baz?"), "foo_bar.hyx_bazXquestion_markX");
        assert_eq!(mangle("."), "hyx_Xfull_stopX");
    }

    #[test]
    fn non_ascii_letters_are_identifiers() {
        assert_eq!(mangle("λ"), "λ");
        assert_eq!(mangle("☃"), "hyx_XU2603X");
    }
}
