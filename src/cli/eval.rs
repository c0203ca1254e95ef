//! `bindexpr eval`: compile a source expression and evaluate it against JSON.

use std::sync::Arc;

use log::debug;

use super::{CliError, convert::json_to_value};
use crate::{BindingContext, BindingParser, ParserOptions, ResourceRegistry, Value, keys};

/// Options for the eval command
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    /// The source expression to evaluate
    pub expression: String,
    /// JSON data context; `null` when absent
    pub input: Option<String>,
    /// Recover from lexical errors instead of failing
    pub lenient: bool,
}

/// Compiles `options.expression` and evaluates it with the parsed input as
/// the data context.
pub fn execute_eval(options: &EvalOptions) -> Result<Value, CliError> {
    let data = match &options.input {
        Some(json) => json_to_value(serde_json::from_str(json)?),
        None => Value::Null,
    };

    let registry = Arc::new(ResourceRegistry::new());
    let mut parser_options = ParserOptions::default();
    if options.lenient {
        parser_options = parser_options.lenient();
    }
    let parser = BindingParser::new(registry.clone()).with_options(parser_options);

    let source = parser.compile(&options.expression)?;
    debug!("compiled '{}' to {:?}", options.expression, source);

    let context = BindingContext::new().with(keys::DATA_CONTEXT, data);
    Ok(source.evaluate_in(&context, registry.as_ref())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expression: &str, input: &str) -> Value {
        execute_eval(&EvalOptions {
            expression: expression.to_string(),
            input: Some(input.to_string()),
            lenient: false,
        })
        .unwrap()
    }

    #[test]
    fn test_eval_member_arithmetic() {
        assert_eq!(eval("A + B * 2", r#"{"A": 1, "B": 3}"#), Value::Int32(7));
    }

    #[test]
    fn test_eval_null_conditional_on_missing_object() {
        assert_eq!(eval("Customer?.Name ?? 'anonymous'", r#"{"Customer": null}"#), Value::from("anonymous"));
    }

    #[test]
    fn test_eval_invalid_json() {
        let result = execute_eval(&EvalOptions {
            expression: "A".to_string(),
            input: Some("{".to_string()),
            lenient: false,
        });
        assert!(matches!(result, Err(CliError::Json(_))));
    }
}
