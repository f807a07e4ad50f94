//! Hygienic symbol generation.

use std::collections::HashSet;

use proptest::prelude::*;
use quasi::ast::Expr;
use quasi::gensym::{self, is_gensym, GensymGenerator, GENSYM_PREFIX};

proptest! {
    #[test]
    fn prefix_appears_exactly_once(hint in "[a-zA-Z0-9_?!*<>=-]{0,12}") {
        let generator = GensymGenerator::new();
        let name = generator.gensym_name(&hint);
        prop_assert!(name.starts_with(GENSYM_PREFIX));
        prop_assert!(!name[GENSYM_PREFIX.len()..].starts_with(GENSYM_PREFIX));
    }

    #[test]
    fn names_are_pairwise_distinct(hints in prop::collection::vec("[a-z?]{0,4}", 1..40)) {
        let generator = GensymGenerator::new();
        let names: Vec<String> = hints.iter().map(|h| generator.gensym_name(h)).collect();
        let unique: HashSet<&String> = names.iter().collect();
        prop_assert_eq!(unique.len(), names.len());
    }
}

#[test]
fn same_hint_never_repeats() {
    let generator = GensymGenerator::new();
    let a = generator.gensym_name("tmp");
    let b = generator.gensym_name("tmp");
    assert_ne!(a, b);
    assert_eq!(generator.current(), 2);
}

#[test]
fn concurrent_callers_never_collide() {
    let generator = GensymGenerator::new();
    let names: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| (0..250).map(|_| generator.gensym_name("t")).collect::<Vec<_>>()))
            .collect();
        handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
    });
    let unique: HashSet<&String> = names.iter().collect();
    assert_eq!(unique.len(), 2000);
    assert_eq!(generator.current(), 2000);
}

#[test]
fn global_generator_returns_symbol_nodes() {
    let node = gensym::gensym("x");
    let Expr::Symbol(name) = &*node.value else {
        panic!("expected a symbol, got {node}");
    };
    assert!(is_gensym(name));
}
