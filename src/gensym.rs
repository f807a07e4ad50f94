//! Hygienic symbol generation.
//!
//! A [`GensymGenerator`] owns one counter behind a mutex. Each call locks,
//! increments, reads and unlocks; that critical section is the only
//! synchronization the core needs. Names look like `_hy_gensym_<hint>_<n>` and
//! always start with [`GENSYM_PREFIX`] exactly once, whatever characters the
//! hint contains.
//!
//! Uniqueness holds per generator instance. The process-wide instance behind
//! [`gensym`] is what macros share by default; tests can build isolated ones.

use once_cell::sync::Lazy;
use std::sync::{Mutex, PoisonError};

use crate::ast::{make_symbol, AstNode, Span};
use crate::mangle::{mangle, MangleFn, ESCAPE_PREFIX};

/// Reserved prefix carried by every generated name.
pub const GENSYM_PREFIX: &str = "_hy_gensym_";

static GLOBAL: Lazy<GensymGenerator> = Lazy::new(GensymGenerator::new);

#[derive(Debug)]
pub struct GensymGenerator {
    counter: Mutex<u64>,
    mangle: MangleFn,
}

impl GensymGenerator {
    pub fn new() -> Self {
        Self::with_mangler(mangle)
    }

    /// A generator that normalizes names with `mangle` instead of the default.
    pub fn with_mangler(mangle: MangleFn) -> Self {
        Self {
            counter: Mutex::new(0),
            mangle,
        }
    }

    /// Returns a fresh symbol node.
    pub fn gensym(&self, hint: &str) -> AstNode {
        make_symbol(self.gensym_name(hint), Span::default())
    }

    /// Returns a fresh mangled name.
    pub fn gensym_name(&self, hint: &str) -> String {
        let n = self.next_count();
        // A hint cannot start with the prefix, `_` or `-` (which mangles to
        // `_`), so the prefix appears once.
        let hint = hint
            .strip_prefix(GENSYM_PREFIX)
            .unwrap_or(hint)
            .trim_start_matches(['_', '-']);
        let raw = if hint.is_empty() {
            format!("{GENSYM_PREFIX}{n}")
        } else {
            format!("{GENSYM_PREFIX}{hint}_{n}")
        };

        let mangled = (self.mangle)(&raw);
        let name = if let Some(rest) = mangled.strip_prefix(&escaped_prefix()) {
            format!("{GENSYM_PREFIX}{rest}")
        } else if mangled.starts_with(GENSYM_PREFIX) {
            mangled
        } else {
            format!("{GENSYM_PREFIX}{mangled}")
        };
        tracing::trace!(hint, %name, "gensym");
        name
    }

    /// Last value handed out; zero before the first call.
    pub fn current(&self) -> u64 {
        *self.counter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_count(&self) -> u64 {
        let mut counter = self.counter.lock().unwrap_or_else(PoisonError::into_inner);
        *counter += 1;
        *counter
    }
}

impl Default for GensymGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// What the default mangler turns [`GENSYM_PREFIX`] into when the hint forces
/// escaping: the leading underscore stays, the escape prefix follows.
fn escaped_prefix() -> String {
    format!("_{ESCAPE_PREFIX}{}", &GENSYM_PREFIX[1..])
}

/// The process-wide generator.
pub fn global() -> &'static GensymGenerator {
    &GLOBAL
}

/// Shorthand for `global().gensym(hint)`.
pub fn gensym(hint: &str) -> AstNode {
    GLOBAL.gensym(hint)
}

/// True if `name` was produced by a generator.
pub fn is_gensym(name: &str) -> bool {
    name.starts_with(GENSYM_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaped_hint_keeps_single_prefix() {
        let generator = GensymGenerator::new();
        let name = generator.gensym_name("valid?");
        assert_eq!(name, "_hy_gensym_validXquestion_markX_1");
    }

    #[test]
    fn empty_hint_has_no_separator() {
        let generator = GensymGenerator::new();
        assert_eq!(generator.gensym_name(""), "_hy_gensym_1");
        assert_eq!(generator.gensym_name("x"), "_hy_gensym_x_2");
    }

    #[test]
    fn nested_prefix_in_hint_is_not_doubled() {
        let generator = GensymGenerator::new();
        let inner = generator.gensym_name("");
        let outer = generator.gensym_name(&inner);
        assert!(outer.starts_with(GENSYM_PREFIX));
        assert!(!outer[GENSYM_PREFIX.len()..].starts_with(GENSYM_PREFIX));
    }

    #[test]
    fn custom_mangler_output_is_prefixed() {
        fn shout(raw: &str) -> String {
            raw.to_uppercase()
        }
        let generator = GensymGenerator::with_mangler(shout);
        assert!(generator.gensym_name("a").starts_with(GENSYM_PREFIX));
    }
}
