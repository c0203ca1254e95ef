// tests/concurrency_tests.rs

use std::sync::Arc;
use std::thread;

use bindexpr::{BindingContext, BindingParser, BindingSource, ResourceRegistry, Value};

#[test]
fn test_concurrent_parses_share_one_result() {
    let parser = BindingParser::new(Arc::new(ResourceRegistry::new()));
    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| parser.parse("Text A + B, Mode=OneWay").unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    for result in &results[1..] {
        assert!(Arc::ptr_eq(&results[0], result));
    }
    assert_eq!(parser.cached_expressions(), 1);
}

#[test]
fn test_concurrent_evaluation_compiles_each_shape_once() {
    let parser = BindingParser::new(Arc::new(ResourceRegistry::new()));
    let BindingSource::Expression(expression) = parser.compile("A * 2 + 1").unwrap() else {
        panic!("expected a compiled expression");
    };
    thread::scope(|scope| {
        for i in 0..8 {
            let expression = &expression;
            scope.spawn(move || {
                let context = BindingContext::new();
                let value = expression.evaluate(&context, &[Value::Int32(i)]).unwrap();
                assert_eq!(value, Value::Int32(i * 2 + 1));
            });
        }
    });
    assert_eq!(expression.cached_shapes(), 1);
}
