// tests/property_tests.rs

use std::sync::Arc;

use proptest::prelude::*;

use bindexpr::{BindingContext, BindingParser, ResourceRegistry, TokenKind, Tokenizer, Value};

fn eval(text: &str) -> Value {
    let registry = Arc::new(ResourceRegistry::new());
    let parser = BindingParser::new(registry.clone());
    parser
        .compile(text)
        .and_then(|source| source.evaluate_in(&BindingContext::new(), registry.as_ref()))
        .unwrap_or_else(|e| panic!("'{}' failed: {}", text, e))
}

/// Left-to-right with `*` binding tighter than `+` and `-`.
fn reference(first: i32, rest: &[(char, i32)]) -> i32 {
    let (mut total, mut term, mut sign) = (0, first, 1);
    for &(op, n) in rest {
        match op {
            '*' => term *= n,
            '+' | '-' => {
                total += sign * term;
                sign = if op == '+' { 1 } else { -1 };
                term = n;
            }
            _ => unreachable!(),
        }
    }
    total + sign * term
}

proptest! {
    #[test]
    fn arithmetic_respects_precedence(
        first in 0i32..10,
        rest in prop::collection::vec((prop::sample::select(vec!['+', '-', '*']), 0i32..10), 0..5),
    ) {
        let mut text = first.to_string();
        for (op, n) in &rest {
            text.push_str(&format!(" {} {}", op, n));
        }
        prop_assert_eq!(eval(&text), Value::Int32(reference(first, &rest)));
    }

    #[test]
    fn conditional_chain_picks_first_true_branch(
        branches in prop::collection::vec((any::<bool>(), 0i32..100), 1..5),
        otherwise in 0i32..100,
    ) {
        let mut text = String::new();
        for (condition, value) in &branches {
            text.push_str(&format!("{} ? {} : ", condition, value));
        }
        text.push_str(&otherwise.to_string());

        let expected = branches
            .iter()
            .find(|(condition, _)| *condition)
            .map_or(otherwise, |(_, value)| *value);
        prop_assert_eq!(eval(&text), Value::Int32(expected));
    }

    #[test]
    fn coalesce_chain_picks_first_non_null(
        items in prop::collection::vec(prop::option::of(0i32..100), 0..5),
        last in 0i32..100,
    ) {
        let mut parts: Vec<String> = items
            .iter()
            .map(|item| item.map_or("null".to_string(), |n| n.to_string()))
            .collect();
        parts.push(last.to_string());
        let text = parts.join(" ?? ");

        let expected = items.iter().flatten().copied().next().unwrap_or(last);
        prop_assert_eq!(eval(&text), Value::Int32(expected));
    }

    #[test]
    fn lenient_tokenizer_always_reaches_eof(source in "\\PC{1,40}") {
        let mut tokenizer = Tokenizer::with_source(&source, false).unwrap();
        let limit = source.chars().count() + 1;
        let mut reached_eof = false;
        for _ in 0..=limit {
            let token = tokenizer.next_token(true).unwrap();
            if token.is(TokenKind::Eof) {
                reached_eof = true;
                break;
            }
        }
        prop_assert!(reached_eof);
    }
}
