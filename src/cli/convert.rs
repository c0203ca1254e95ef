//! JSON to engine value conversion

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::{Value, types::PropertyBag};

/// Convert a `serde_json::Value` into a [`Value`].
///
/// Objects become [`PropertyBag`]s so that member paths like `Order.Total`
/// resolve against them. Integers take the narrowest of Int32, Int64 and
/// UInt64; other numbers are Float64, or Decimal when they do not fit.
pub fn json_to_value(v: serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                match i32::try_from(i) {
                    Ok(small) => Value::Int32(small),
                    Err(_) => Value::Int64(i),
                }
            } else if let Some(u) = n.as_u64() {
                Value::UInt64(u)
            } else if let Some(f) = n.as_f64() {
                Value::Float64(f)
            } else {
                Decimal::from_str(&n.to_string())
                    .map(Value::Decimal)
                    .unwrap_or(Value::Null)
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => Value::List(arr.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(obj) => {
            let bag = PropertyBag::new();
            for (k, v) in obj {
                bag.set(k, json_to_value(v));
            }
            Value::object(bag)
        }
    }
}
