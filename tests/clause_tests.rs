// tests/clause_tests.rs

use std::sync::Arc;

use bindexpr::error::ParseErrorKind;
use bindexpr::value::Function;
use bindexpr::{
    BindingContext, BindingError, BindingMode, BindingParser, BindingSource, ConfigurationError,
    ParameterValue, PropertyBag, ResourceRegistry, Value, ValueConverter, keys,
};

#[derive(Debug)]
struct Currency;

impl ValueConverter for Currency {
    fn convert(&self, value: &Value, _parameter: &Value, _context: &BindingContext) -> Result<Value, BindingError> {
        Ok(Value::from(format!("${}", value)))
    }
}

fn registry() -> Arc<ResourceRegistry> {
    let registry = ResourceRegistry::new();
    registry.register_converter("Currency", Currency);
    registry.register_method(
        "Format",
        Function::new(1, |args| Ok(Value::from(format!("<{}>", args[0])))),
    );
    Arc::new(registry)
}

fn apply_with(registry: Arc<ResourceRegistry>, text: &str, context: &BindingContext) -> Result<(), BindingError> {
    let parser = BindingParser::new(registry);
    let bindings = parser.parse(text)?;
    for action in &bindings[0] {
        action(context)?;
    }
    Ok(())
}

fn apply(text: &str) -> BindingContext {
    let context = BindingContext::new();
    apply_with(registry(), text, &context).unwrap();
    context
}

fn source_value(context: &BindingContext, data: PropertyBag) -> Value {
    context.add(keys::DATA_CONTEXT, Value::object(data));
    let source = context.get(keys::SOURCE).unwrap();
    source.evaluate_in(context, registry().as_ref()).unwrap()
}

// ============================================================================
// Target and source
// ============================================================================

#[test]
fn test_target_and_source_are_set() {
    let context = apply("Text Name");
    assert_eq!(context.get(keys::TARGET_PATH).unwrap().to_string(), "Text");
    let source = context.get(keys::SOURCE).unwrap();
    assert!(matches!(source, BindingSource::Member(ref m) if m.key == "Name"));
    assert_eq!(context.keys(), vec!["Source", "TargetPath"]);
}

#[test]
fn test_missing_source_reads_data_context() {
    let context = apply("DataContext");
    let source = context.get(keys::SOURCE).unwrap();
    assert!(matches!(source, BindingSource::Member(ref m) if m.path.is_empty()));
}

#[test]
fn test_expression_source() {
    let context = apply("Text First + ', ' + Last");
    let data = PropertyBag::new().with("First", "Ada").with("Last", "Lovelace");
    assert_eq!(source_value(&context, data), Value::from("Ada, Lovelace"));
}

#[test]
fn test_resource_method_becomes_converter() {
    let context = apply("Text $Format(Price)");
    assert!(matches!(
        context.get(keys::SOURCE).unwrap(),
        BindingSource::Converted { member: Some(_), .. }
    ));
    let data = PropertyBag::new().with("Price", 3);
    assert_eq!(source_value(&context, data), Value::from("<3>"));
}

#[test]
fn test_missing_resource_method_fails_on_apply() {
    let context = BindingContext::new();
    let err = apply_with(registry(), "Text $Nope(Price)", &context).unwrap_err();
    assert!(matches!(err, BindingError::Resolution(_)));
}

#[test]
fn test_negated_member_inverts() {
    let context = apply("IsEnabled !IsBusy");
    assert!(matches!(
        context.get(keys::SOURCE).unwrap(),
        BindingSource::Converted { member: Some(_), .. }
    ));
    let data = PropertyBag::new().with("IsBusy", true);
    assert_eq!(source_value(&context, data), Value::Bool(false));
}

// ============================================================================
// Clauses
// ============================================================================

#[test]
fn test_mode_clause() {
    let context = apply("Text Name, Mode=OneWay");
    assert_eq!(context.get(keys::MODE), Some(BindingMode::OneWay));
    let context = apply("Text Name, m=twoway");
    assert_eq!(context.get(keys::MODE), Some(BindingMode::TwoWay));
}

#[test]
fn test_unknown_mode() {
    let parser = BindingParser::new(registry());
    let err = parser.parse("Text Name, Mode=Sideways").err().expect("expected an error");
    let BindingError::Configuration(ConfigurationError::UnknownMode { name, valid }) = err else {
        panic!("expected an unknown mode error");
    };
    assert_eq!(name, "Sideways");
    assert!(valid.contains(&"OneWay".to_string()));
}

#[test]
fn test_converter_clause() {
    let context = apply("Text Price, Converter=Currency");
    let converter = context.get(keys::CONVERTER).unwrap();
    let converted = converter
        .convert(&Value::Int32(5), &Value::Null, &context)
        .unwrap();
    assert_eq!(converted, Value::from("$5"));
}

#[test]
fn test_unknown_converter_fails_on_apply() {
    let context = BindingContext::new();
    let err = apply_with(registry(), "Text Price, Converter=Nope", &context).unwrap_err();
    assert!(matches!(err, BindingError::Resolution(_)));
}

#[test]
fn test_converter_from_member_path() {
    let settings = PropertyBag::new().with("PriceConverter", Value::converter(Currency));
    let context = BindingContext::new().with(
        keys::DATA_CONTEXT,
        Value::object(PropertyBag::new().with("Settings", Value::object(settings))),
    );
    apply_with(registry(), "Text Price, Converter=Settings.PriceConverter", &context).unwrap();
    let converter = context.get(keys::CONVERTER).unwrap();
    assert_eq!(
        converter.convert(&Value::Int32(7), &Value::Null, &context).unwrap(),
        Value::from("$7")
    );
}

#[test]
fn test_converter_from_static_resource() {
    let registry = registry();
    registry.register_object("Shared", Value::converter(Currency));
    let context = BindingContext::new();
    apply_with(registry, "Text Price, Converter=$$Shared, Mode=OneWay", &context).unwrap();
    let converter = context.get(keys::CONVERTER).unwrap();
    assert_eq!(
        converter.convert(&Value::Int32(2), &Value::Null, &context).unwrap(),
        Value::from("$2")
    );
    assert_eq!(context.get(keys::MODE), Some(BindingMode::OneWay));
}

#[test]
fn test_converter_expression_must_yield_converter() {
    let registry = registry();
    registry.register_object("Shared", Value::Int32(1));
    let context = BindingContext::new();
    let err = apply_with(registry, "Text Price, Converter=$$Shared", &context).unwrap_err();
    assert!(matches!(
        err,
        BindingError::Configuration(ConfigurationError::MalformedClause { ref clause, .. }) if clause == "Converter"
    ));
    assert!(!context.contains(keys::CONVERTER));
}

#[test]
fn test_constant_fallback() {
    let context = apply("Text Name, Fallback='n/a'");
    let fallback = context.get(keys::FALLBACK).unwrap();
    assert!(matches!(fallback, ParameterValue::Constant(Value::String(ref s)) if s == "n/a"));
}

#[test]
fn test_member_free_parameter_is_evaluated_once() {
    let context = apply("Text Name, TargetNullValue=1 + 2");
    let value = context.get(keys::TARGET_NULL_VALUE).unwrap();
    assert!(matches!(value, ParameterValue::Constant(Value::Int32(3))));
}

#[test]
fn test_parameter_with_member_is_per_context() {
    let context = apply("Text Price, Converter=Currency, ConverterParameter=Limit * 2");
    let parameter = context.get(keys::CONVERTER_PARAMETER).unwrap();
    assert!(matches!(parameter, ParameterValue::PerContext(_)));

    context.add(keys::DATA_CONTEXT, Value::object(PropertyBag::new().with("Limit", 4)));
    assert_eq!(
        parameter.value(&context, registry().as_ref()).unwrap(),
        Value::Int32(8)
    );
}

#[test]
fn test_delay_clauses() {
    let context = apply("Text Name, Delay=200, TargetDelay=50");
    assert_eq!(context.get(keys::DELAY), Some(200));
    assert_eq!(context.get(keys::TARGET_DELAY), Some(50));
}

#[test]
fn test_malformed_delay() {
    let parser = BindingParser::new(registry());
    let err = parser.parse("Text Name, Delay='soon'").err().expect("expected an error");
    assert!(matches!(
        err,
        BindingError::Configuration(ConfigurationError::MalformedClause { .. })
    ));
}

#[test]
fn test_unknown_clause_attaches_behavior() {
    let context = apply("Text Name, ValidatesOnErrors=true");
    let behaviors = context.get(keys::BEHAVIORS).unwrap();
    assert_eq!(behaviors.len(), 1);
    assert_eq!(behaviors[0].name(), "ValidatesOnErrors");
}

#[test]
fn test_behavior_requires_flag() {
    let parser = BindingParser::new(registry());
    for text in ["Text Name, Validates", "Text Name, Validates=maybe"] {
        let err = parser.parse(text).err().expect("expected an error");
        assert!(
            matches!(err, BindingError::Parse(ref e) if matches!(e.kind, ParseErrorKind::MissingBehaviorFlag(ref n) if n == "Validates")),
            "{}: {:?}",
            text,
            err
        );
    }
}

#[test]
fn test_strict_registry_rejects_unknown_behavior() {
    let registry = Arc::new(ResourceRegistry::new().strict_behaviors());
    let context = BindingContext::new();
    assert!(apply_with(registry, "Text Name, Validates=true", &context).is_err());
}

#[test]
fn test_multiple_bindings() {
    let parser = BindingParser::new(registry());
    let bindings = parser.parse("Text Name, Mode=OneWay; IsVisible !IsBusy").unwrap();
    assert_eq!(bindings.len(), 2);
    assert_eq!(bindings[0].len(), 3);
    assert_eq!(bindings[1].len(), 2);
}

// ============================================================================
// Parse cache
// ============================================================================

#[test]
fn test_parse_results_are_cached() {
    let text = "Text A + B, Mode=OneWay";
    let parser = BindingParser::new(registry());
    let first = parser.parse(text).unwrap();
    let second = parser.parse(text).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(parser.cached_expressions(), 1);

    parser.clear_cache();
    assert_eq!(parser.cached_expressions(), 0);
    let third = parser.parse(text).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));

    let run = |actions: &[bindexpr::ConfigAction]| {
        let context = BindingContext::new();
        for action in actions {
            action(&context).unwrap();
        }
        context
    };
    let before = run(&first[0]);
    let after = run(&third[0]);
    assert_eq!(before.keys(), after.keys());
    assert_eq!(before.get(keys::TARGET_PATH), after.get(keys::TARGET_PATH));
    assert_eq!(before.get(keys::MODE), after.get(keys::MODE));
    assert_eq!(
        source_value(&before, PropertyBag::new().with("A", 2).with("B", 3)),
        Value::Int32(5)
    );
    assert_eq!(
        source_value(&after, PropertyBag::new().with("A", 2).with("B", 3)),
        Value::Int32(5)
    );
}

#[test]
fn test_failed_parse_is_not_cached() {
    let parser = BindingParser::new(registry());
    assert!(parser.parse("Text Name +").is_err());
    assert_eq!(parser.cached_expressions(), 0);
}
