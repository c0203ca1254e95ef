// tests/parser_tests.rs

use std::sync::Arc;

use bindexpr::error::ParseErrorKind;
use bindexpr::{
    BinaryOp, BindingError, BindingParser, Expr, ParserOptions, ResourceRegistry, UnaryOp, Value,
};
use rust_decimal::Decimal;

fn parser() -> BindingParser {
    BindingParser::new(Arc::new(ResourceRegistry::new()))
}

fn parse(text: &str) -> String {
    parser().parse_expression(text).unwrap().to_string()
}

fn constant(text: &str) -> Value {
    match parser().parse_expression(text).unwrap() {
        Expr::Constant(value) => value,
        other => panic!("expected a constant, got {}", other),
    }
}

fn parse_error(text: &str) -> bindexpr::ParseError {
    match parser().parse_expression(text) {
        Err(BindingError::Parse(e)) => e,
        other => panic!("expected a parse error, got {:?}", other.map(|e| e.to_string())),
    }
}

// ============================================================================
// Precedence and association
// ============================================================================

#[test]
fn test_higher_priority_binds_tighter() {
    assert_eq!(parse("1 + 2 * 3"), "(1 + (2 * 3))");
    assert_eq!(parse("1 * 2 + 3"), "((1 * 2) + 3)");
    assert_eq!(parse("A < B == C > D"), "((A < B) == (C > D))");
    assert_eq!(parse("A | B & C"), "(A | (B & C))");
}

#[test]
fn test_equal_priority_is_left_associative() {
    assert_eq!(parse("1 - 2 + 3"), "((1 - 2) + 3)");
    assert_eq!(parse("8 / 4 / 2"), "((8 / 4) / 2)");
    assert_eq!(parse("A && B && C"), "((A && B) && C)");
}

#[test]
fn test_parentheses_override_priority() {
    assert_eq!(parse("(1 + 2) * 3"), "((1 + 2) * 3)");
}

#[test]
fn test_conditional_is_right_associative() {
    assert_eq!(parse("A ? 1 : B ? 2 : 3"), "(A ? 1 : (B ? 2 : 3))");
    assert_eq!(parse("A ?? B ?? C"), "(A ?? (B ?? C))");
    assert_eq!(parse("A || B ? C : D"), "((A || B) ? C : D)");
}

#[test]
fn test_coalesce_inside_conditional_branch() {
    assert_eq!(parse("A ? B ?? 1 : 2"), "(A ? (B ?? 1) : 2)");
}

#[test]
fn test_word_aliases() {
    assert_eq!(parse("A and B or C"), "((A && B) || C)");
    assert_eq!(parse("A lt B"), "(A < B)");
    assert_eq!(parse("A mod 2 eq 0"), "((A % 2) == 0)");
    assert_eq!(parse("not IsBusy"), "!IsBusy");
}

#[test]
fn test_alias_word_without_operand_is_a_member() {
    // `not` only acts as an operator when an operand follows
    assert_eq!(parse("not"), "not");
    assert_eq!(parse("A.not"), "A.not");
}

#[test]
fn test_custom_aliases() {
    let options = ParserOptions::default()
        .with_binary_alias("plus", BinaryOp::Add)
        .with_unary_alias("neg", UnaryOp::Minus);
    let parser = BindingParser::new(Arc::new(ResourceRegistry::new())).with_options(options);
    assert_eq!(parser.parse_expression("A plus neg B").unwrap().to_string(), "(A + -B)");
}

// ============================================================================
// Primary and postfix forms
// ============================================================================

#[test]
fn test_member_call_and_index_chains() {
    assert_eq!(parse("A.B.C"), "A.B.C");
    assert_eq!(parse("Items[0].Name"), "Items[0].Name");
    assert_eq!(parse("Name.Substring(1, 2)"), "Name.Substring(1, 2)");
    assert_eq!(parse("Name.Trim()"), "Name.Trim()");
    assert_eq!(parse("Map[\"a\", 2]"), "Map[\"a\", 2]");
}

#[test]
fn test_null_conditional_access() {
    assert_eq!(parse("A?.B"), "A?.B");
    assert_eq!(parse("A?[0]"), "A?[0]");
}

#[test]
fn test_at_prefix_is_stripped() {
    assert_eq!(parse("@class"), "class");
}

#[test]
fn test_lambdas() {
    assert_eq!(parse("Items.Where(x => x > 1)"), "Items.Where((x) => (x > 1))");
    assert_eq!(parse("Items.Select((x, i) => i)"), "Items.Select((x, i) => i)");
    assert_eq!(parse("Run(() => 1)"), "Run(() => 1)");
}

#[test]
fn test_lambda_parameter_shadows_member() {
    let expr = parser().parse_expression("Items.Any(x => x)").unwrap();
    let Expr::MethodCall { args, .. } = expr else {
        panic!("expected a call");
    };
    let Expr::Lambda { body, .. } = &args[0] else {
        panic!("expected a lambda");
    };
    assert_eq!(**body, Expr::Parameter("x".to_string()));
}

#[test]
fn test_resources() {
    assert_eq!(parse("$Settings.Theme"), "$Settings.Theme");
    assert_eq!(parse("$$Strings"), "$$Strings");
    assert_eq!(parse("$Format(Price)"), "$Format(Price)");
}

#[test]
fn test_brace_sources() {
    assert_eq!(parse("{RelativeSource Self}"), "$self");
    assert_eq!(parse("{Relative Window, Path=Title}"), "$Relative(Window, 1).Title");
    assert_eq!(parse("{Relative Grid, Level=2}"), "$Relative(Grid, 2)");
    assert_eq!(parse("{Element box, Path=Text.Length}"), "$Element(box).Text.Length");
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_integer_literals() {
    assert_eq!(constant("10"), Value::Int32(10));
    assert_eq!(constant("10u"), Value::UInt32(10));
    assert_eq!(constant("10UL"), Value::UInt64(10));
    assert_eq!(constant("10lu"), Value::UInt64(10));
    assert_eq!(constant("10L"), Value::Int64(10));
    assert_eq!(constant("3000000000"), Value::Int64(3_000_000_000));
    assert_eq!(constant("3000000000u"), Value::UInt64(3_000_000_000));
    assert_eq!(constant("10000000000000000000"), Value::UInt64(10_000_000_000_000_000_000));
}

#[test]
fn test_real_literals() {
    assert_eq!(constant("1.5f"), Value::Float32(1.5));
    assert_eq!(constant("1e3"), Value::Float64(1000.0));
    assert_eq!(constant("2.5"), Value::Float64(2.5));
    assert_eq!(constant("2.5d"), Value::Float64(2.5));
    assert_eq!(constant("2.50m"), Value::Decimal(Decimal::new(250, 2)));
}

#[test]
fn test_negative_literals_fold() {
    assert_eq!(constant("-5"), Value::Int32(-5));
    assert_eq!(constant("-1.5"), Value::Float64(-1.5));
}

#[test]
fn test_string_and_char_literals() {
    assert_eq!(constant("'a'"), Value::Char('a'));
    assert_eq!(constant("'ab'"), Value::from("ab"));
    assert_eq!(constant("\"a\""), Value::from("a"));
    assert_eq!(constant("'it''s'"), Value::from("it's"));
    assert_eq!(constant(r#""line\n""#), Value::from("line\n"));
}

#[test]
fn test_keyword_constants() {
    assert_eq!(constant("true"), Value::Bool(true));
    assert_eq!(constant("false"), Value::Bool(false));
    assert_eq!(constant("null"), Value::Null);
}

#[test]
fn test_integer_overflow_is_a_literal_error() {
    let err = parse_error("99999999999999999999");
    assert!(matches!(err.kind, ParseErrorKind::InvalidLiteral(_)));
}

// ============================================================================
// Target paths
// ============================================================================

#[test]
fn test_target_path_spaced_bracket_ends_path() {
    let parser = parser();
    assert_eq!(parser.parse_target_path("Text [0]").unwrap().to_string(), "Text");
    assert_eq!(parser.parse_target_path("Text[0]").unwrap().to_string(), "Text[0]");
}

#[test]
fn test_source_side_spaced_bracket_is_an_indexer() {
    assert_eq!(parse("Items [0]"), "Items[0]");
}

#[test]
fn test_binding_with_spaced_bracket_source() {
    let bindings = parser().parse_bindings("Text [0]").unwrap();
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].target.to_string(), "Text");
    let source = bindings[0].source.as_ref().unwrap();
    assert_eq!(source.members[0].key, "[0]");
}

#[test]
fn test_target_path_rejects_calls() {
    let err = parser().parse_target_path("Text.ToString()").unwrap_err();
    assert!(matches!(
        err,
        BindingError::Parse(bindexpr::ParseError {
            kind: ParseErrorKind::InvalidTargetPath,
            ..
        })
    ));
}

#[test]
fn test_parenthesised_source_reads_as_target_call() {
    // `Text (A + B)` is a call on the target, whatever follows
    let err = parser().parse("Text (A + B) * 2").err().expect("expected an error");
    assert!(matches!(
        err,
        BindingError::Parse(bindexpr::ParseError {
            kind: ParseErrorKind::InvalidTargetPath,
            position: 0,
            ..
        })
    ));

    let bindings = parser().parse_bindings("Text 2 * (A + B)").unwrap();
    assert_eq!(bindings[0].target.to_string(), "Text");
    assert_eq!(
        bindings[0].source.as_ref().unwrap().expression.to_string(),
        "(2 * ($member0 + $member1))"
    );
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_parse_error_carries_position_and_text() {
    let err = parse_error("A + * B");
    assert_eq!(err.position, 4);
    assert_eq!(err.expression, "A + * B");
    assert!(matches!(err.kind, ParseErrorKind::UnexpectedToken { .. }));
}

#[test]
fn test_trailing_tokens_are_rejected() {
    let err = parse_error("A B");
    assert_eq!(err.position, 2);
}

#[test]
fn test_missing_colon() {
    let err = parse_error("A ? 1");
    assert!(matches!(err.kind, ParseErrorKind::UnexpectedToken { .. }));
}

#[test]
fn test_duplicate_lambda_parameter() {
    let err = parse_error("Items.Select((x, x) => x)");
    assert_eq!(err.kind, ParseErrorKind::DuplicateLambdaParameter("x".to_string()));
}

#[test]
fn test_lexical_error_surfaces() {
    assert!(matches!(
        parser().parse_expression("A # B"),
        Err(BindingError::Lexical(_))
    ));
}
