//! JSON output for evaluation results.
//!
//! Values print as JSON where JSON has a counterpart; the rest print as
//! strings:
//!
//! - **Null / Unset** - `null`
//! - **Numbers** - integers, reals and decimals as JSON numbers (non-finite
//!   reals as `null`)
//! - **Char, Enum, Type, Function** - strings
//! - **Lists** - arrays
//! - **Property bags** - objects with sorted keys; other host objects print
//!   their display string
//!
//! # Examples
//!
//! ```
//! use bindexpr::Value;
//! use bindexpr::output::{to_json, to_json_pretty};
//!
//! let value = Value::Int32(42);
//! assert_eq!(to_json(&value), "42");
//! assert_eq!(to_json_pretty(&value), "42");
//! ```

use crate::{types::PropertyBag, value::Value};

pub struct JsonPrinter {
    pretty: bool,
}

impl JsonPrinter {
    pub fn new(pretty: bool) -> Self {
        JsonPrinter { pretty }
    }

    pub fn print(&self, value: &Value) -> String {
        self.print_value(value, 0)
    }

    fn print_value(&self, value: &Value, indent: usize) -> String {
        match value {
            Value::Null | Value::Unset => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int32(n) => n.to_string(),
            Value::UInt32(n) => n.to_string(),
            Value::Int64(n) => n.to_string(),
            Value::UInt64(n) => n.to_string(),
            Value::Float32(n) if n.is_finite() => n.to_string(),
            Value::Float64(n) if n.is_finite() => n.to_string(),
            Value::Float32(_) | Value::Float64(_) => "null".to_string(),
            Value::Decimal(d) => d.normalize().to_string(),
            Value::String(s) => self.quote(s),
            Value::List(items) => self.print_array(items, indent),
            Value::Object(object) => match object.as_any().downcast_ref::<PropertyBag>() {
                Some(bag) => self.print_object(bag, indent),
                None => self.quote(&value.display_string()),
            },
            Value::Char(_) | Value::Enum(_) | Value::Type(_) | Value::Function(_) => {
                self.quote(&value.display_string())
            }
        }
    }

    fn print_array(&self, arr: &[Value], indent: usize) -> String {
        if arr.is_empty() {
            return "[]".to_string();
        }

        if self.pretty {
            let mut result = "[\n".to_string();
            let items: Vec<String> = arr
                .iter()
                .map(|v| format!("{}{}", self.indent(indent + 1), self.print_value(v, indent + 1)))
                .collect();
            result.push_str(&items.join(",\n"));
            result.push('\n');
            result.push_str(&self.indent(indent));
            result.push(']');
            result
        } else {
            let items: Vec<String> = arr.iter().map(|v| self.print_value(v, indent)).collect();
            format!("[{}]", items.join(","))
        }
    }

    fn print_object(&self, bag: &PropertyBag, indent: usize) -> String {
        // keys() is sorted
        let entries: Vec<(String, Value)> = bag
            .keys()
            .into_iter()
            .filter_map(|key| bag.get(&key).map(|value| (key, value)))
            .collect();
        if entries.is_empty() {
            return "{}".to_string();
        }

        if self.pretty {
            let items: Vec<String> = entries
                .iter()
                .map(|(k, v)| {
                    format!(
                        "{}{}: {}",
                        self.indent(indent + 1),
                        self.quote(k),
                        self.print_value(v, indent + 1)
                    )
                })
                .collect();
            format!("{{\n{}\n{}}}", items.join(",\n"), self.indent(indent))
        } else {
            let items: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}:{}", self.quote(k), self.print_value(v, indent)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
    }

    fn indent(&self, level: usize) -> String {
        "  ".repeat(level)
    }

    fn quote(&self, s: &str) -> String {
        let escaped: String = s
            .chars()
            .flat_map(|c| match c {
                '"' => vec!['\\', '"'],
                '\\' => vec!['\\', '\\'],
                '\n' => vec!['\\', 'n'],
                '\r' => vec!['\\', 'r'],
                '\t' => vec!['\\', 't'],
                c if c.is_control() => format!("\\u{:04x}", c as u32).chars().collect(),
                c => vec![c],
            })
            .collect();
        format!("\"{}\"", escaped)
    }
}

/// Compact JSON, no whitespace.
pub fn to_json(value: &Value) -> String {
    JsonPrinter::new(false).print(value)
}

/// JSON with 2-space indentation, one element or property per line.
pub fn to_json_pretty(value: &Value) -> String {
    JsonPrinter::new(true).print(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_bag_prints_sorted_object() {
        let bag = PropertyBag::new().with("b", 2).with("a", "x");
        assert_eq!(to_json(&Value::object(bag)), r#"{"a":"x","b":2}"#);
    }

    #[test]
    fn test_unset_and_nan_print_null() {
        assert_eq!(to_json(&Value::Unset), "null");
        assert_eq!(to_json(&Value::Float64(f64::NAN)), "null");
    }

    #[test]
    fn test_pretty_list() {
        let list = Value::List(vec![Value::Int32(1), Value::from("a")]);
        assert_eq!(to_json_pretty(&list), "[\n  1,\n  \"a\"\n]");
    }
}
