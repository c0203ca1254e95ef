// tests/transform_tests.rs

use std::sync::Arc;

use bindexpr::ast::RelativeSourceKind;
use bindexpr::error::ParseErrorKind;
use bindexpr::{
    BindingError, BindingParser, MemberKind, ResourceRegistry, SourceShape, Transformed, Value,
};

fn parser() -> BindingParser {
    BindingParser::new(Arc::new(ResourceRegistry::new()))
}

fn transform(text: &str) -> Transformed {
    parser().transform(text).unwrap()
}

fn keys(transformed: &Transformed) -> Vec<&str> {
    transformed.members.iter().map(|m| m.key.as_str()).collect()
}

// ============================================================================
// Member extraction
// ============================================================================

#[test]
fn test_repeated_path_is_one_member() {
    let t = transform("A.B + A.B");
    assert_eq!(keys(&t), vec!["A.B"]);
    assert_eq!(t.expression.to_string(), "($member0 + $member0)");
}

#[test]
fn test_members_are_numbered_in_order_of_appearance() {
    let t = transform("A.C * 2 + A.B - A.C");
    assert_eq!(keys(&t), vec!["A.C", "A.B"]);
    assert_eq!(t.members[1].index, 1);
    assert_eq!(t.members[1].name, "$member1");
    assert_eq!(t.expression.to_string(), "((($member0 * 2) + $member1) - $member0)");
}

#[test]
fn test_constant_indexers_are_part_of_the_path() {
    let t = transform("Items[0].Name + Items[1].Name");
    assert_eq!(keys(&t), vec!["Items[0].Name", "Items[1].Name"]);
}

#[test]
fn test_computed_indexer_ends_the_path() {
    let t = transform("Items[Index]");
    assert_eq!(keys(&t), vec!["Items", "Index"]);
    assert_eq!(t.expression.to_string(), "$member0[$member1]");
}

#[test]
fn test_call_ends_the_path() {
    let t = transform("Name.Trim().Length");
    assert_eq!(keys(&t), vec!["Name"]);
    assert_eq!(t.expression.to_string(), "$member0.Trim().Length");
}

#[test]
fn test_lambda_parameters_are_not_members() {
    let t = transform("Items.Where(x => x.Active)");
    assert_eq!(keys(&t), vec!["Items"]);
}

#[test]
fn test_root_call_targets_the_data_context() {
    let t = transform("ToString()");
    assert_eq!(keys(&t), vec![""]);
    assert!(t.members[0].path.is_empty());
}

// ============================================================================
// Shapes
// ============================================================================

#[test]
fn test_single_member_shape() {
    assert_eq!(transform("Customer.Name").shape, SourceShape::Member(0));
}

#[test]
fn test_negated_member_shape() {
    assert_eq!(transform("!IsBusy").shape, SourceShape::InverseMember(0));
    assert_eq!(transform("not IsBusy").shape, SourceShape::InverseMember(0));
}

#[test]
fn test_resource_method_shapes() {
    assert_eq!(
        transform("$Format(Price)").shape,
        SourceShape::ResourceMethod {
            name: "Format".to_string(),
            member: Some(0)
        }
    );
    assert_eq!(
        transform("$Now()").shape,
        SourceShape::ResourceMethod {
            name: "Now".to_string(),
            member: None
        }
    );
    assert_eq!(transform("$Format(Price, 2)").shape, SourceShape::Expression);
}

#[test]
fn test_constant_shape() {
    assert_eq!(transform("'n/a'").shape, SourceShape::Constant(Value::from("n/a")));
    assert_eq!(transform("-1").shape, SourceShape::Constant(Value::Int32(-1)));
}

#[test]
fn test_constant_expression_is_context_free() {
    let t = transform("1 + 2");
    assert_eq!(t.shape, SourceShape::Expression);
    assert!(t.is_context_free());
}

// ============================================================================
// Null-conditional lowering
// ============================================================================

#[test]
fn test_null_conditional_becomes_guarded_call() {
    let t = transform("A?.B.C");
    assert_eq!(keys(&t), vec!["A"]);
    assert_eq!(t.expression.to_string(), "$member0.?.(($guard0) => $guard0.B.C)");
}

#[test]
fn test_nested_null_conditionals_get_distinct_guards() {
    let t = transform("A?.B?.C");
    assert_eq!(
        t.expression.to_string(),
        "$member0.?.(($guard1) => $guard1.B).?.(($guard0) => $guard0.C)"
    );
}

#[test]
fn test_null_conditional_indexer() {
    let t = transform("A?[0]");
    assert_eq!(t.expression.to_string(), "$member0.?.(($guard0) => $guard0[0])");
}

// ============================================================================
// Macros and sources
// ============================================================================

#[test]
fn test_self_macro() {
    let t = transform("$self.Tag");
    assert_eq!(t.members[0].kind, MemberKind::RelativeSource(RelativeSourceKind::SelfRef));
    assert_eq!(keys(&t), vec!["$self|Tag"]);
    assert_eq!(t.shape, SourceShape::Member(0));
}

#[test]
fn test_context_macro() {
    let t = transform("$context.Name");
    assert_eq!(keys(&t), vec!["$self|DataContext.Name"]);
}

#[test]
fn test_brace_and_call_forms_share_a_member() {
    let t = transform("{Element box, Path=Text}.Length + $Element(box).Text.Length");
    assert_eq!(keys(&t), vec!["$Element(box)|Text.Length"]);
}

#[test]
fn test_relative_call_with_level() {
    let t = transform("$Relative(Window, 2).Title");
    assert_eq!(
        t.members[0].kind,
        MemberKind::RelativeSource(RelativeSourceKind::Ancestor {
            type_name: "Window".to_string(),
            level: 2
        })
    );
    assert_eq!(t.members[0].path.to_string(), "Title");
}

#[test]
fn test_relative_call_rejects_zero_level() {
    let err = parser().transform("$Relative(Window, 0)").unwrap_err();
    assert!(matches!(
        err,
        BindingError::Parse(ref e) if matches!(e.kind, ParseErrorKind::InvalidRelativeSource(_))
    ));
}

#[test]
fn test_dynamic_resource_is_a_member() {
    let t = transform("$Settings.Theme");
    assert_eq!(t.members[0].kind, MemberKind::Resource("Settings".to_string()));
    assert_eq!(keys(&t), vec!["$Settings|Theme"]);
}

#[test]
fn test_static_resource_is_not_observed() {
    let t = transform("$$Settings.Theme");
    assert!(t.is_context_free());
    assert_eq!(t.expression.to_string(), "$$Settings.Theme");
}

#[test]
fn test_type_reference_is_not_a_member() {
    let t = transform("Math.Max(A, 2)");
    assert_eq!(keys(&t), vec!["A"]);
}

#[test]
fn test_one_time_ids_are_unique() {
    let parser = parser();
    let first = parser.transform("$OneTime(A)").unwrap();
    let second = parser.transform("$OneTime(A)").unwrap();
    assert_eq!(keys(&first), vec!["A"]);
    assert_ne!(first.expression.to_string(), second.expression.to_string());
}

#[test]
fn test_event_args_macro_reads_no_member() {
    let t = transform("$args");
    assert!(t.is_context_free());
    assert_eq!(t.shape, SourceShape::Expression);
}

// ============================================================================
// Preprocessing
// ============================================================================

#[test]
fn test_handlers_rewrite_text_in_order() {
    let parser = parser()
        .with_handler(|text: &str| text.strip_prefix('=').map(str::to_string))
        .with_handler(|text: &str| Some(text.replace("@@", "Customer.")));
    let t = parser.transform("=@@Name").unwrap();
    assert_eq!(keys(&t), vec!["Customer.Name"]);
}
