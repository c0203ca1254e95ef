// tests/compiler_tests.rs

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use bindexpr::error::ResolutionErrorKind;
use bindexpr::types::{HostObject, MethodInfo, ParameterInfo};
use bindexpr::{
    BindingContext, BindingError, BindingParser, BindingSource, PropertyBag, ResourceRegistry,
    SourceLocator, TypeInfo, Value, ValueType, builtins, keys, logging,
};

fn eval_with(registry: Arc<ResourceRegistry>, text: &str, context: &BindingContext) -> Result<Value, BindingError> {
    logging::init_test();
    let parser = BindingParser::new(registry.clone());
    let source = parser.compile(text)?;
    source.evaluate_in(context, registry.as_ref())
}

fn eval(text: &str, data: PropertyBag) -> Result<Value, BindingError> {
    let context = BindingContext::new().with(keys::DATA_CONTEXT, Value::object(data));
    eval_with(Arc::new(ResourceRegistry::new()), text, &context)
}

fn compiled(text: &str) -> Arc<bindexpr::CompiledExpression> {
    let parser = BindingParser::new(Arc::new(ResourceRegistry::new()));
    match parser.compile(text).unwrap() {
        BindingSource::Expression(expression) => expression,
        other => panic!("expected a compiled expression, got {:?}", other),
    }
}

/// Host object with static reflection over a field map.
#[derive(Debug)]
struct Record {
    info: Arc<TypeInfo>,
    fields: HashMap<String, Value>,
}

impl HostObject for Record {
    fn type_info(&self) -> Option<Arc<TypeInfo>> {
        Some(self.info.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn field(name: &'static str) -> impl Fn(&Value) -> Result<Value, BindingError> + Send + Sync {
    move |target| match target {
        Value::Object(object) => Ok(object
            .as_any()
            .downcast_ref::<Record>()
            .and_then(|record| record.fields.get(name).cloned())
            .unwrap_or(Value::Null)),
        _ => Ok(Value::Null),
    }
}

fn record(info: &Arc<TypeInfo>, fields: Vec<(&str, Value)>) -> Value {
    Value::object(Record {
        info: info.clone(),
        fields: fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
    })
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_precedence_evaluation() {
    assert_eq!(eval("1 + 2 * 3", PropertyBag::new()).unwrap(), Value::Int32(7));
    assert_eq!(eval("(1 + 2) * 3", PropertyBag::new()).unwrap(), Value::Int32(9));
    assert_eq!(eval("1 == 1 and 2 == 2", PropertyBag::new()).unwrap(), Value::Bool(true));
    assert_eq!(eval("1 == 1 && 2 == 3", PropertyBag::new()).unwrap(), Value::Bool(false));
}

#[test]
fn test_numeric_promotion() {
    let data = PropertyBag::new().with("Count", 3).with("Price", 2.5);
    assert_eq!(eval("Count * Price", data).unwrap(), Value::Float64(7.5));
    assert_eq!(eval("1 + 2L", PropertyBag::new()).unwrap(), Value::Int64(3));
}

#[test]
fn test_smallest_int_literal_stays_int() {
    assert_eq!(eval("-2147483648", PropertyBag::new()).unwrap(), Value::Int32(i32::MIN));
    assert_eq!(eval("-2147483649", PropertyBag::new()).unwrap(), Value::Int64(-2147483649));
}

#[test]
fn test_string_concatenation() {
    let data = PropertyBag::new().with("First", "Ada").with("Last", "Lovelace");
    assert_eq!(eval("First + ', ' + Last", data).unwrap(), Value::from("Ada, Lovelace"));
}

#[test]
fn test_conditional_and_coalesce() {
    let data = PropertyBag::new().with("Count", 0).with("Title", Value::Null);
    assert_eq!(
        eval("Count > 0 ? 'some' : 'none'", data).unwrap(),
        Value::from("none")
    );
    let data = PropertyBag::new().with("Title", Value::Null);
    assert_eq!(eval("Title ?? 'untitled'", data).unwrap(), Value::from("untitled"));
}

#[test]
fn test_integer_division_by_zero() {
    let data = PropertyBag::new().with("A", 1);
    assert!(matches!(eval("A / 0", data), Err(BindingError::DivisionByZero)));
}

#[test]
fn test_invalid_operator_is_a_resolution_error() {
    let data = PropertyBag::new().with("Flag", true);
    let err = eval("Flag * 2", data).unwrap_err();
    assert!(matches!(
        err,
        BindingError::Resolution(ref e) if matches!(e.kind, ResolutionErrorKind::InvalidOperator { .. })
    ));
}

// ============================================================================
// Members, deduplication and null guards
// ============================================================================

#[test]
fn test_repeated_member_counts_twice() {
    let data = PropertyBag::new().with("A", Value::object(PropertyBag::new().with("B", 21)));
    assert_eq!(eval("A.B + A.B", data).unwrap(), Value::Int32(42));
    assert_eq!(compiled("A.B + A.B").members().len(), 1);
}

#[test]
fn test_null_conditional_short_circuits() {
    let data = PropertyBag::new().with("A", Value::Null);
    assert_eq!(eval("A?.B.C", data).unwrap(), Value::Null);

    let inner = PropertyBag::new().with("C", 5);
    let data = PropertyBag::new().with("A", Value::object(PropertyBag::new().with("B", Value::object(inner))));
    assert_eq!(eval("A?.B.C", data).unwrap(), Value::Int32(5));
}

#[test]
fn test_call_on_null_without_guard_fails() {
    let compiled = compiled("A.ToUpper()");
    let context = BindingContext::new();
    let err = compiled.evaluate(&context, &[Value::Null]).unwrap_err();
    assert!(matches!(err, BindingError::NullReference(_)));
}

#[test]
fn test_value_typed_guard_yields_unset() {
    let person = TypeInfo::builder("Person")
        .property("Age", ValueType::Int32, field("Age"))
        .build();
    let order = TypeInfo::builder("Order")
        .property("Customer", ValueType::Class(person.clone()), field("Customer"))
        .build();

    let missing = record(&order, vec![("Customer", Value::Null)]);
    let data = PropertyBag::new().with("Order", missing);
    assert_eq!(eval("Order?.Customer?.Age", data).unwrap(), Value::Unset);

    let present = record(&order, vec![("Customer", record(&person, vec![("Age", Value::Int32(30))]))]);
    let data = PropertyBag::new().with("Order", present);
    assert_eq!(eval("Order?.Customer?.Age", data).unwrap(), Value::Int32(30));
}

// ============================================================================
// Methods and overloads
// ============================================================================

#[test]
fn test_static_type_reference() {
    let data = PropertyBag::new().with("A", 5);
    assert_eq!(eval("Math.Max(A, 2)", data).unwrap(), Value::Int32(5));
    assert_eq!(eval("Math.Max(1.5, 2)", PropertyBag::new()).unwrap(), Value::Float64(2.0));
}

#[test]
fn test_params_tail() {
    let data = PropertyBag::new().with("A", 1).with("B", "x");
    assert_eq!(
        eval("String.Format('{0}-{1}', A, B)", data).unwrap(),
        Value::from("1-x")
    );
}

#[test]
fn test_string_members() {
    let data = PropertyBag::new().with("Name", " Ann ");
    assert_eq!(eval("Name.Trim().ToUpper()", data).unwrap(), Value::from("ANN"));
    let data = PropertyBag::new().with("Name", "Ann");
    assert_eq!(eval("Name.Length", data).unwrap(), Value::Int32(3));
}

#[test]
fn test_extension_methods_with_lambdas() {
    let items = Value::List(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3), Value::Int32(4)]);
    let data = PropertyBag::new().with("Items", items);
    assert_eq!(
        eval("Items.Where(x => x > 2).Count()", data).unwrap(),
        Value::Int32(2)
    );
}

#[test]
fn test_method_alias() {
    let registry = Arc::new(ResourceRegistry::new());
    registry.register_method_alias("Max", ValueType::Class(builtins::math_type()), "Max");
    let context = BindingContext::new().with(keys::DATA_CONTEXT, Value::object(PropertyBag::new().with("A", 1)));
    assert_eq!(eval_with(registry, "Max(A, 3)", &context).unwrap(), Value::Int32(3));
}

fn describe_type(name: &str, exact_first: bool) -> Arc<TypeInfo> {
    let exact = MethodInfo::instance(
        "Describe",
        vec![ParameterInfo::new("value", ValueType::Int32)],
        ValueType::String,
        |_, _| Ok(Value::from("exact")),
    );
    let boxed = MethodInfo::instance(
        "Describe",
        vec![ParameterInfo::new("value", ValueType::Object)],
        ValueType::String,
        |_, _| Ok(Value::from("boxed")),
    );
    let (first, second) = if exact_first { (exact, boxed) } else { (boxed, exact) };
    TypeInfo::builder(name).method(first).method(second).build()
}

#[test]
fn test_exact_overload_wins_in_any_order() {
    for exact_first in [true, false] {
        let info = describe_type("Printer", exact_first);
        let data = PropertyBag::new().with("P", record(&info, vec![]));
        assert_eq!(eval("P.Describe(5)", data).unwrap(), Value::from("exact"));
    }
}

#[test]
fn test_boxing_overload_used_when_no_exact_match() {
    let info = describe_type("Printer", true);
    let data = PropertyBag::new().with("P", record(&info, vec![]));
    assert_eq!(eval("P.Describe('text')", data).unwrap(), Value::from("boxed"));
}

#[test]
fn test_host_errors_propagate_unchanged() {
    let info = TypeInfo::builder("Faulty")
        .method(MethodInfo::instance("Fail", vec![], ValueType::Int32, |_, _| {
            Err(BindingError::host("boom"))
        }))
        .build();
    let data = PropertyBag::new().with("F", record(&info, vec![]));
    let err = eval("F.Fail()", data).unwrap_err();
    assert!(matches!(err, BindingError::Host(_)));
    assert_eq!(err.to_string(), "boom");
}

// ============================================================================
// Evaluator cache
// ============================================================================

#[test]
fn test_one_evaluator_per_shape() {
    let expression = compiled("A + A");
    let context = BindingContext::new();

    assert_eq!(expression.evaluate(&context, &[Value::Int32(2)]).unwrap(), Value::Int32(4));
    assert_eq!(expression.evaluate(&context, &[Value::from("ab")]).unwrap(), Value::from("abab"));
    assert_eq!(expression.cached_shapes(), 2);

    assert_eq!(expression.evaluate(&context, &[Value::Int32(5)]).unwrap(), Value::Int32(10));
    assert_eq!(expression.cached_shapes(), 2);

    let int_evaluator = expression.evaluator(&[ValueType::Int32]).unwrap();
    let string_evaluator = expression.evaluator(&[ValueType::String]).unwrap();
    assert!(!Arc::ptr_eq(&int_evaluator, &string_evaluator));
    assert_eq!(*int_evaluator.return_type(), ValueType::Int32);
    assert_eq!(*string_evaluator.return_type(), ValueType::String);
}

#[test]
fn test_failed_shape_leaves_others_intact() {
    let expression = compiled("A.ToUpper()");
    let context = BindingContext::new();

    assert_eq!(expression.evaluate(&context, &[Value::from("abc")]).unwrap(), Value::from("ABC"));
    let err = expression.evaluate(&context, &[Value::Int32(5)]).unwrap_err();
    assert!(matches!(
        err,
        BindingError::Resolution(ref e) if matches!(e.kind, ResolutionErrorKind::MethodNotFound { .. })
    ));
    assert_eq!(expression.cached_shapes(), 1);
    assert_eq!(expression.evaluate(&context, &[Value::from("x")]).unwrap(), Value::from("X"));
}

#[test]
fn test_missing_source_value() {
    let expression = compiled("A + B");
    let err = expression
        .evaluate(&BindingContext::new(), &[Value::Int32(1)])
        .unwrap_err();
    assert!(matches!(
        err,
        BindingError::Resolution(ref e) if e.kind == ResolutionErrorKind::MissingSource(1)
    ));
}

// ============================================================================
// Macros at evaluation time
// ============================================================================

#[test]
fn test_one_time_memoizes_per_context() {
    let expression = compiled("$OneTime(A)");
    let context = BindingContext::new();
    assert_eq!(expression.evaluate(&context, &[Value::Int32(1)]).unwrap(), Value::Int32(1));
    assert_eq!(expression.evaluate(&context, &[Value::Int32(2)]).unwrap(), Value::Int32(1));

    let fresh = BindingContext::new();
    assert_eq!(expression.evaluate(&fresh, &[Value::Int32(2)]).unwrap(), Value::Int32(2));
}

#[test]
fn test_self_reads_the_target() {
    let target = PropertyBag::new().with("Tag", "button");
    let context = BindingContext::new().with(keys::TARGET, Value::object(target));
    let registry = Arc::new(ResourceRegistry::new());
    assert_eq!(eval_with(registry, "$self.Tag", &context).unwrap(), Value::from("button"));
}

#[test]
fn test_context_without_target_reads_data_context() {
    let data = PropertyBag::new().with("Name", "Ann");
    assert_eq!(eval("$context.Name", data).unwrap(), Value::from("Ann"));
}

#[test]
fn test_event_args() {
    let context = BindingContext::new().with(keys::EVENT_ARGS, Value::from("click"));
    let registry = Arc::new(ResourceRegistry::new());
    assert_eq!(eval_with(registry, "$args", &context).unwrap(), Value::from("click"));
}

#[test]
fn test_resources() {
    let registry = Arc::new(ResourceRegistry::new());
    registry.register_object("Settings", Value::object(PropertyBag::new().with("Theme", "dark")));
    let context = BindingContext::new();
    assert_eq!(
        eval_with(registry.clone(), "$Settings.Theme", &context).unwrap(),
        Value::from("dark")
    );
    assert_eq!(
        eval_with(registry.clone(), "$$Settings.Theme + '!!'", &context).unwrap(),
        Value::from("dark!!")
    );
    let err = eval_with(registry, "$Missing.Theme", &context).unwrap_err();
    assert!(matches!(
        err,
        BindingError::Resolution(ref e) if matches!(e.kind, ResolutionErrorKind::ResourceNotFound(_))
    ));
}

struct Tree;

impl SourceLocator for Tree {
    fn find_ancestor(&self, _target: &Value, type_name: &str, level: u32) -> Option<Value> {
        (type_name == "Window" && level == 1)
            .then(|| Value::object(PropertyBag::new().with("Title", "Main")))
    }

    fn find_element(&self, _target: &Value, name: &str) -> Option<Value> {
        (name == "box").then(|| Value::object(PropertyBag::new().with("Text", "hello")))
    }
}

#[test]
fn test_relative_and_element_sources() {
    let registry = Arc::new(ResourceRegistry::new());
    let context = BindingContext::new().with(keys::SOURCE_LOCATOR, Arc::new(Tree) as Arc<dyn SourceLocator>);
    assert_eq!(
        eval_with(registry.clone(), "{Relative Window, Path=Title}", &context).unwrap(),
        Value::from("Main")
    );
    assert_eq!(
        eval_with(registry.clone(), "$Element(box).Text.Length", &context).unwrap(),
        Value::Int32(5)
    );
    assert!(eval_with(registry, "$Relative(Window, 2).Title", &context).is_err());
}
