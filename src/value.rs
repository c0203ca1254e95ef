use std::{fmt, sync::Arc};

use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};

use crate::{
    error::BindingError,
    types::{EnumInfo, HostObject, ValueType},
};

/// A value flowing through a binding expression.
///
/// Numeric values keep their width and signedness (`10` is `Int32`, `10u`
/// is `UInt32`, `1.5f` is `Float32`, `2m` is `Decimal`), because overload
/// resolution and the evaluator cache both key on the exact runtime type.
///
/// # Examples
///
/// ```
/// use bindexpr::Value;
///
/// let count = Value::from(42);
/// let name = Value::from("Ada");
/// assert_eq!(count, Value::Int32(42));
/// assert_eq!(name.display_string(), "Ada");
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    /// Null reference
    Null,
    /// "No value": what a short-circuited value-typed access yields
    Unset,
    Bool(bool),
    Char(char),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Decimal(Decimal),
    String(String),
    List(Vec<Value>),
    Enum(EnumValue),
    /// Host object; static members through reflection, the rest dynamically
    Object(Arc<dyn HostObject>),
    /// Static type reference, target of static member access
    Type(ValueType),
    /// Callable produced by a lambda, or supplied by the host
    Function(Function),
}

/// A member of an enum type.
#[derive(Debug, Clone)]
pub struct EnumValue {
    pub info: Arc<EnumInfo>,
    pub name: String,
    pub value: i64,
}

/// A callable value.
#[derive(Clone)]
pub struct Function {
    arity: usize,
    body: Arc<dyn Fn(&[Value]) -> Result<Value, BindingError> + Send + Sync>,
}

impl Function {
    pub fn new(
        arity: usize,
        body: impl Fn(&[Value]) -> Result<Value, BindingError> + Send + Sync + 'static,
    ) -> Self {
        Function {
            arity,
            body: Arc::new(body),
        }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, BindingError> {
        (self.body)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function(arity: {})", self.arity)
    }
}

impl Value {
    pub fn object(object: impl HostObject + 'static) -> Value {
        Value::Object(Arc::new(object))
    }

    pub fn value_type(&self) -> ValueType {
        ValueType::of(self)
    }

    /// True for both null and the "no value" marker.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::Unset)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Integral value (including `char` and enum members) widened to `i128`.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Char(c) => Some(*c as i128),
            Value::Int32(n) => Some(*n as i128),
            Value::UInt32(n) => Some(*n as i128),
            Value::Int64(n) => Some(*n as i128),
            Value::UInt64(n) => Some(*n as i128),
            Value::Enum(e) => Some(e.value as i128),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_i128().and_then(|n| i64::try_from(n).ok())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(n) => Some(*n as f64),
            Value::Float64(n) => Some(*n),
            Value::Decimal(d) => d.to_f64(),
            Value::Enum(_) => None,
            other => other.as_i128().map(|n| n as f64),
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(*d),
            Value::Float32(n) => Decimal::from_f32(*n),
            Value::Float64(n) => Decimal::from_f64(*n),
            Value::Enum(_) => None,
            other => other.as_i128().and_then(Decimal::from_i128),
        }
    }

    /// Converts a numeric (or `char`) value to the numeric type `to`.
    pub(crate) fn to_numeric(&self, to: &ValueType) -> Option<Value> {
        if matches!(self, Value::Enum(_) | Value::Bool(_)) {
            return None;
        }
        let integral = self.as_i128();
        match to {
            ValueType::Int32 => integral.and_then(|n| i32::try_from(n).ok()).map(Value::Int32),
            ValueType::UInt32 => integral.and_then(|n| u32::try_from(n).ok()).map(Value::UInt32),
            ValueType::Int64 => integral.and_then(|n| i64::try_from(n).ok()).map(Value::Int64),
            ValueType::UInt64 => integral.and_then(|n| u64::try_from(n).ok()).map(Value::UInt64),
            ValueType::Float32 => self.as_f64().map(|n| Value::Float32(n as f32)),
            ValueType::Float64 => self.as_f64().map(Value::Float64),
            ValueType::Decimal => self.as_decimal().map(Value::Decimal),
            _ => None,
        }
    }

    /// Converts to `to` at evaluation time: widening, boxing or a checked cast.
    pub fn convert(&self, to: &ValueType) -> Result<Value, BindingError> {
        let from = self.value_type();
        if *to == ValueType::Object || from == *to {
            return Ok(self.clone());
        }
        if to.is_assignable_from(&from) {
            if to.is_numeric() {
                if let Some(converted) = self.to_numeric(to) {
                    return Ok(converted);
                }
            } else {
                return Ok(self.clone());
            }
        }
        Err(BindingError::InvalidCast {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Text used for concatenation and display; null becomes empty.
    pub fn display_string(&self) -> String {
        match self {
            Value::Null | Value::Unset => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Char(c) => c.to_string(),
            Value::Int32(n) => n.to_string(),
            Value::UInt32(n) => n.to_string(),
            Value::Int64(n) => n.to_string(),
            Value::UInt64(n) => n.to_string(),
            Value::Float32(n) => n.to_string(),
            Value::Float64(n) => n.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::String(s) => s.clone(),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.display_string()).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Enum(e) => e.name.clone(),
            Value::Object(object) => format!("{:?}", object),
            Value::Type(ty) => ty.to_string(),
            Value::Function(function) => format!("{:?}", function),
        }
    }

    /// Source-text form of the value, as used in structural keys.
    pub fn literal(&self) -> Literal<'_> {
        Literal(self)
    }
}

/// Display adapter producing the literal syntax of a value.
pub struct Literal<'a>(&'a Value);

impl fmt::Display for Literal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::Null => f.write_str("null"),
            Value::Unset => f.write_str("unset"),
            Value::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            Value::Char(c) => write!(f, "'{}'", c),
            Value::UInt32(n) => write!(f, "{}u", n),
            Value::Int64(n) => write!(f, "{}L", n),
            Value::UInt64(n) => write!(f, "{}UL", n),
            Value::Float32(n) => write!(f, "{}f", n),
            Value::Decimal(d) => write!(f, "{}m", d),
            Value::Enum(e) => write!(f, "{}.{}", e.info.name, e.name),
            other => f.write_str(&other.display_string()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) | (Unset, Unset) => true,
            (Bool(a), Bool(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (Int32(a), Int32(b)) => a == b,
            (UInt32(a), UInt32(b)) => a == b,
            (Int64(a), Int64(b)) => a == b,
            (UInt64(a), UInt64(b)) => a == b,
            (Float32(a), Float32(b)) => a == b,
            (Float64(a), Float64(b)) => a == b,
            (Decimal(a), Decimal(b)) => a == b,
            (String(a), String(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Enum(a), Enum(b)) => a.info.name == b.info.name && a.value == b.value,
            (Object(a), Object(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Type(a), Type(b)) => a == b,
            (Function(a), Function(b)) => Arc::ptr_eq(&a.body, &b.body),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

value_from! {
    bool => Bool,
    char => Char,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    Decimal => Decimal,
    String => String,
    Vec<Value> => List,
    EnumValue => Enum,
    Function => Function,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Arc<dyn HostObject>> for Value {
    fn from(object: Arc<dyn HostObject>) -> Self {
        Value::Object(object)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
