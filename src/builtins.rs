//! Built-in reflected types.
//!
//! Instance members of strings and lists, the static helper types `Math` and
//! `String`, and the extension types `Enumerable` and `RegexExtensions`. The
//! default resource registry registers the static and extension types.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::{
    ast::BinaryOp,
    compiler::operators,
    error::BindingError,
    types::{MethodInfo, ParameterInfo, TypeInfo, ValueType},
    value::{Function, Value},
};

fn invalid(value: &Value, expected: &str) -> BindingError {
    BindingError::InvalidCast {
        from: value.value_type().to_string(),
        to: expected.to_string(),
    }
}

fn string_arg<'a>(args: &'a [Value], index: usize) -> Result<&'a str, BindingError> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(invalid(other, "string")),
        None => Err(invalid(&Value::Unset, "string")),
    }
}

fn i32_arg(args: &[Value], index: usize) -> Result<i32, BindingError> {
    match args.get(index) {
        Some(Value::Int32(n)) => Ok(*n),
        Some(other) => Err(invalid(other, "int")),
        None => Err(invalid(&Value::Unset, "int")),
    }
}

fn list_arg<'a>(args: &'a [Value], index: usize) -> Result<&'a [Value], BindingError> {
    match args.get(index) {
        Some(Value::List(items)) => Ok(items),
        Some(other) => Err(invalid(other, "list")),
        None => Err(invalid(&Value::Unset, "list")),
    }
}

fn function_arg<'a>(args: &'a [Value], index: usize) -> Result<&'a Function, BindingError> {
    match args.get(index) {
        Some(Value::Function(f)) => Ok(f),
        Some(other) => Err(invalid(other, "function")),
        None => Err(invalid(&Value::Unset, "function")),
    }
}

fn predicate(function: &Function, item: &Value) -> Result<bool, BindingError> {
    let result = function.call(std::slice::from_ref(item))?;
    result.as_bool().ok_or_else(|| invalid(&result, "bool"))
}

fn char_slice(s: &str, start: i32, length: Option<i32>) -> Result<String, BindingError> {
    let count = s.chars().count() as i64;
    let start = start as i64;
    let length = length.map(|l| l as i64).unwrap_or(count - start);
    if start < 0 || length < 0 || start + length > count {
        return Err(BindingError::host(format!(
            "substring range {}..{} is outside a string of length {}",
            start,
            start + length,
            count
        )));
    }
    Ok(s.chars().skip(start as usize).take(length as usize).collect())
}

static STRING_TYPE: LazyLock<Arc<TypeInfo>> = LazyLock::new(|| {
    use ValueType::*;
    let p = ParameterInfo::new;
    TypeInfo::builder("string")
        .property("Length", Int32, |target| match target {
            Value::String(s) => Ok(Value::Int32(s.chars().count() as i32)),
            other => Err(invalid(other, "string")),
        })
        .method(MethodInfo::instance("ToUpper", vec![], String, |target, _| {
            Ok(Value::String(target.display_string().to_uppercase()))
        }))
        .method(MethodInfo::instance("ToLower", vec![], String, |target, _| {
            Ok(Value::String(target.display_string().to_lowercase()))
        }))
        .method(MethodInfo::instance("Trim", vec![], String, |target, _| {
            Ok(Value::String(target.display_string().trim().to_string()))
        }))
        .method(MethodInfo::instance("ToString", vec![], String, |target, _| {
            Ok(Value::String(target.display_string()))
        }))
        .method(MethodInfo::instance(
            "Contains",
            vec![p("value", String)],
            Bool,
            |target, args| Ok(Value::Bool(target.display_string().contains(string_arg(args, 0)?))),
        ))
        .method(MethodInfo::instance(
            "StartsWith",
            vec![p("value", String)],
            Bool,
            |target, args| {
                Ok(Value::Bool(target.display_string().starts_with(string_arg(args, 0)?)))
            },
        ))
        .method(MethodInfo::instance(
            "EndsWith",
            vec![p("value", String)],
            Bool,
            |target, args| Ok(Value::Bool(target.display_string().ends_with(string_arg(args, 0)?))),
        ))
        .method(MethodInfo::instance(
            "Substring",
            vec![p("startIndex", Int32)],
            String,
            |target, args| char_slice(&target.display_string(), i32_arg(args, 0)?, None).map(Value::String),
        ))
        .method(MethodInfo::instance(
            "Substring",
            vec![p("startIndex", Int32), p("length", Int32)],
            String,
            |target, args| {
                char_slice(&target.display_string(), i32_arg(args, 0)?, Some(i32_arg(args, 1)?))
                    .map(Value::String)
            },
        ))
        .indexer(vec![p("index", Int32)], Char, |target, args| {
            let index = i32_arg(args, 0)?;
            target
                .display_string()
                .chars()
                .nth(index.max(0) as usize)
                .filter(|_| index >= 0)
                .map(Value::Char)
                .ok_or_else(|| BindingError::host(format!("index {} is out of range", index)))
        })
        .build()
});

static LIST_TYPE: LazyLock<Arc<TypeInfo>> = LazyLock::new(|| {
    use ValueType::*;
    TypeInfo::builder("list")
        .property("Count", Int32, |target| match target {
            Value::List(items) => Ok(Value::Int32(items.len() as i32)),
            other => Err(invalid(other, "list")),
        })
        .method(MethodInfo::instance(
            "Contains",
            vec![ParameterInfo::new("item", Object)],
            Bool,
            |target, args| {
                let items = target.as_list().ok_or_else(|| invalid(target, "list"))?;
                Ok(Value::Bool(args.first().is_some_and(|item| items.contains(item))))
            },
        ))
        .indexer(vec![ParameterInfo::new("index", Int32)], Object, |target, args| {
            let items = target.as_list().ok_or_else(|| invalid(target, "list"))?;
            let index = i32_arg(args, 0)?;
            usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or_else(|| BindingError::host(format!("index {} is out of range", index)))
        })
        .build()
});

/// Members every value answers, whatever its type.
static OBJECT_TYPE: LazyLock<Arc<TypeInfo>> = LazyLock::new(|| {
    TypeInfo::builder("object")
        .method(MethodInfo::instance("ToString", vec![], ValueType::String, |target, _| {
            Ok(Value::String(target.display_string()))
        }))
        .build()
});

pub fn object_type() -> Arc<TypeInfo> {
    OBJECT_TYPE.clone()
}

pub fn string_type() -> Arc<TypeInfo> {
    STRING_TYPE.clone()
}

pub fn list_type() -> Arc<TypeInfo> {
    LIST_TYPE.clone()
}

macro_rules! binary_overload {
    ($name:expr, $variant:ident, $ty:expr, $op:expr) => {
        MethodInfo::static_method(
            $name,
            vec![ParameterInfo::new("a", $ty), ParameterInfo::new("b", $ty)],
            $ty,
            |args| match (&args[0], &args[1]) {
                (Value::$variant(a), Value::$variant(b)) => Ok(Value::$variant($op(*a, *b))),
                (a, _) => Err(invalid(a, stringify!($variant))),
            },
        )
    };
}

static MATH_TYPE: LazyLock<Arc<TypeInfo>> = LazyLock::new(|| {
    use ValueType::*;
    TypeInfo::builder("Math")
        .static_property("PI", Float64, || Ok(Value::Float64(std::f64::consts::PI)))
        .method(binary_overload!("Max", Int32, Int32, |a: i32, b: i32| a.max(b)))
        .method(binary_overload!("Max", Int64, Int64, |a: i64, b: i64| a.max(b)))
        .method(binary_overload!("Max", Float64, Float64, |a: f64, b: f64| a.max(b)))
        .method(binary_overload!("Max", Decimal, Decimal, |a: rust_decimal::Decimal, b: rust_decimal::Decimal| a.max(b)))
        .method(binary_overload!("Min", Int32, Int32, |a: i32, b: i32| a.min(b)))
        .method(binary_overload!("Min", Int64, Int64, |a: i64, b: i64| a.min(b)))
        .method(binary_overload!("Min", Float64, Float64, |a: f64, b: f64| a.min(b)))
        .method(binary_overload!("Min", Decimal, Decimal, |a: rust_decimal::Decimal, b: rust_decimal::Decimal| a.min(b)))
        .method(MethodInfo::static_method(
            "Abs",
            vec![ParameterInfo::new("value", Int32)],
            Int32,
            |args| Ok(Value::Int32(i32_arg(args, 0)?.wrapping_abs())),
        ))
        .method(MethodInfo::static_method(
            "Abs",
            vec![ParameterInfo::new("value", Float64)],
            Float64,
            |args| match &args[0] {
                Value::Float64(n) => Ok(Value::Float64(n.abs())),
                other => Err(invalid(other, "double")),
            },
        ))
        .method(MethodInfo::static_method(
            "Abs",
            vec![ParameterInfo::new("value", Decimal)],
            Decimal,
            |args| match &args[0] {
                Value::Decimal(d) => Ok(Value::Decimal(d.abs())),
                other => Err(invalid(other, "decimal")),
            },
        ))
        .method(MethodInfo::static_method(
            "Round",
            vec![ParameterInfo::new("value", Float64)],
            Float64,
            |args| match &args[0] {
                Value::Float64(n) => Ok(Value::Float64(n.round())),
                other => Err(invalid(other, "double")),
            },
        ))
        .method(MethodInfo::static_method(
            "Round",
            vec![
                ParameterInfo::new("value", Float64),
                ParameterInfo::new("digits", Int32),
            ],
            Float64,
            |args| match &args[0] {
                Value::Float64(n) => {
                    let factor = 10f64.powi(i32_arg(args, 1)?);
                    Ok(Value::Float64((n * factor).round() / factor))
                }
                other => Err(invalid(other, "double")),
            },
        ))
        .build()
});

/// `{0}`-style composite formatting.
pub fn format(template: &str, args: &[Value]) -> Result<String, BindingError> {
    let format_item = Regex::new(r"\{(\d+)(?::[^}]*)?\}").map_err(BindingError::host)?;
    let mut missing = None;
    let result = format_item.replace_all(template, |caps: &regex::Captures<'_>| {
        let index: usize = caps[1].parse().unwrap_or(usize::MAX);
        match args.get(index) {
            Some(value) => value.display_string(),
            None => {
                missing.get_or_insert(index);
                String::new()
            }
        }
    });
    match missing {
        Some(index) => Err(BindingError::host(format!(
            "format item {{{}}} has no matching argument",
            index
        ))),
        None => Ok(result.into_owned()),
    }
}

static STRING_STATIC_TYPE: LazyLock<Arc<TypeInfo>> = LazyLock::new(|| {
    use ValueType::*;
    TypeInfo::builder("String")
        .static_property("Empty", String, || Ok(Value::String(std::string::String::new())))
        .method(MethodInfo::static_method(
            "Format",
            vec![
                ParameterInfo::new("format", String),
                ParameterInfo::params("args", Object),
            ],
            String,
            |args| {
                let items = list_arg(args, 1)?;
                format(string_arg(args, 0)?, items).map(Value::String)
            },
        ))
        .method(MethodInfo::static_method(
            "Concat",
            vec![ParameterInfo::params("values", Object)],
            String,
            |args| {
                let items = list_arg(args, 0)?;
                Ok(Value::String(items.iter().map(Value::display_string).collect()))
            },
        ))
        .method(MethodInfo::static_method(
            "IsNullOrEmpty",
            vec![ParameterInfo::new("value", String)],
            Bool,
            |args| Ok(Value::Bool(args[0].display_string().is_empty())),
        ))
        .build()
});

static ENUMERABLE_TYPE: LazyLock<Arc<TypeInfo>> = LazyLock::new(|| {
    use ValueType::*;
    let source = || ParameterInfo::new("source", List);
    let selector = || ParameterInfo::new("selector", Function);
    TypeInfo::builder("Enumerable")
        .method(MethodInfo::extension("Count", vec![source()], Int32, |args| {
            Ok(Value::Int32(list_arg(args, 0)?.len() as i32))
        }))
        .method(MethodInfo::extension("Any", vec![source()], Bool, |args| {
            Ok(Value::Bool(!list_arg(args, 0)?.is_empty()))
        }))
        .method(MethodInfo::extension(
            "Any",
            vec![source(), selector()],
            Bool,
            |args| {
                let f = function_arg(args, 1)?;
                for item in list_arg(args, 0)? {
                    if predicate(f, item)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            },
        ))
        .method(MethodInfo::extension(
            "All",
            vec![source(), selector()],
            Bool,
            |args| {
                let f = function_arg(args, 1)?;
                for item in list_arg(args, 0)? {
                    if !predicate(f, item)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            },
        ))
        .method(MethodInfo::extension(
            "Where",
            vec![source(), selector()],
            List,
            |args| {
                let f = function_arg(args, 1)?;
                let mut result = vec![];
                for item in list_arg(args, 0)? {
                    if predicate(f, item)? {
                        result.push(item.clone());
                    }
                }
                Ok(Value::List(result))
            },
        ))
        .method(MethodInfo::extension(
            "Select",
            vec![source(), selector()],
            List,
            |args| {
                let f = function_arg(args, 1)?;
                list_arg(args, 0)?
                    .iter()
                    .map(|item| f.call(std::slice::from_ref(item)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List)
            },
        ))
        .method(MethodInfo::extension("Sum", vec![source()], Object, |args| {
            list_arg(args, 0)?
                .iter()
                .try_fold(Value::Int32(0), |total, item| {
                    operators::apply_binary(BinaryOp::Add, &total, item)
                })
        }))
        .method(MethodInfo::extension(
            "FirstOrDefault",
            vec![source()],
            Object,
            |args| Ok(list_arg(args, 0)?.first().cloned().unwrap_or(Value::Null)),
        ))
        .method(MethodInfo::extension(
            "FirstOrDefault",
            vec![source(), selector()],
            Object,
            |args| {
                let f = function_arg(args, 1)?;
                for item in list_arg(args, 0)? {
                    if predicate(f, item)? {
                        return Ok(item.clone());
                    }
                }
                Ok(Value::Null)
            },
        ))
        .build()
});

static REGEX_EXTENSIONS_TYPE: LazyLock<Arc<TypeInfo>> = LazyLock::new(|| {
    use ValueType::*;
    let p = ParameterInfo::new;
    TypeInfo::builder("RegexExtensions")
        .method(MethodInfo::extension(
            "IsMatch",
            vec![p("input", String), p("pattern", String)],
            Bool,
            |args| {
                let regex = Regex::new(string_arg(args, 1)?).map_err(BindingError::host)?;
                Ok(Value::Bool(regex.is_match(string_arg(args, 0)?)))
            },
        ))
        .method(MethodInfo::extension(
            "Replace",
            vec![
                p("input", String),
                p("pattern", String),
                p("replacement", String),
            ],
            String,
            |args| {
                let regex = Regex::new(string_arg(args, 1)?).map_err(BindingError::host)?;
                Ok(Value::String(
                    regex
                        .replace_all(string_arg(args, 0)?, string_arg(args, 2)?)
                        .into_owned(),
                ))
            },
        ))
        .build()
});

pub fn math_type() -> Arc<TypeInfo> {
    MATH_TYPE.clone()
}

pub fn string_static_type() -> Arc<TypeInfo> {
    STRING_STATIC_TYPE.clone()
}

pub fn enumerable_type() -> Arc<TypeInfo> {
    ENUMERABLE_TYPE.clone()
}

pub fn regex_extensions_type() -> Arc<TypeInfo> {
    REGEX_EXTENSIONS_TYPE.clone()
}
