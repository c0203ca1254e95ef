//! Operator typing and evaluation.
//!
//! The compiler types an operator node from the static operand types; the
//! evaluator applies it to the runtime values. Both use the same numeric
//! promotion, so the runtime result has the static type whenever the
//! operands had theirs.

use std::cmp::Ordering;

use rust_decimal::Decimal;

use crate::{
    ast::{BinaryOp, UnaryOp},
    error::{BindingError, ResolutionError, ResolutionErrorKind},
    types::ValueType,
    value::{EnumValue, Value},
};

fn numeric_operand(ty: &ValueType) -> Option<ValueType> {
    match ty {
        ValueType::Char => Some(ValueType::Int32),
        ty if ty.is_numeric() => Some(ty.clone()),
        _ => None,
    }
}

/// Common type of two numeric operands.
///
/// Mixing signed with unsigned widens to the next type able to hold both
/// ranges: `int` with `uint` gives `long`, any signed type with `ulong`
/// gives `decimal`.
pub fn promote(a: &ValueType, b: &ValueType) -> Option<ValueType> {
    let (a, b) = (numeric_operand(a)?, numeric_operand(b)?);
    let (high, low) = if a.numeric_rank() >= b.numeric_rank() {
        (a, b)
    } else {
        (b, a)
    };
    Some(match (&high, &low) {
        (ValueType::UInt32, ValueType::Int32) => ValueType::Int64,
        (ValueType::UInt64, ValueType::Int32 | ValueType::Int64) => ValueType::Decimal,
        _ => high,
    })
}

fn invalid(operator: &str, operands: &[&ValueType]) -> BindingError {
    ResolutionError::new(
        ResolutionErrorKind::InvalidOperator {
            operator: operator.to_string(),
            operands: operands.iter().map(|t| t.to_string()).collect(),
        },
        operator,
    )
    .into()
}

/// Static result type of `left op right`; `None` if the operator does not apply.
///
/// `??` is typed by the compiler itself, since it depends on nullability.
pub fn binary_type(op: BinaryOp, left: &ValueType, right: &ValueType) -> Option<ValueType> {
    use BinaryOp::*;
    let dynamic = left.is_dynamic() || right.is_dynamic();
    match op {
        Equal | NotEqual => Some(ValueType::Bool),
        And | Or => {
            let boolish = |t: &ValueType| *t == ValueType::Bool || t.is_dynamic();
            (boolish(left) && boolish(right)).then_some(ValueType::Bool)
        }
        Add if *left == ValueType::String || *right == ValueType::String => Some(ValueType::String),
        _ if dynamic => Some(if op.is_comparison() {
            ValueType::Bool
        } else {
            ValueType::Object
        }),
        Multiply | Divide | Remainder | Add | Subtract => promote(left, right),
        LessThan | GreaterThan | LessThanOrEqual | GreaterThanOrEqual => {
            let enums = matches!((left, right), (ValueType::Enum(_), ValueType::Enum(_))) && left == right;
            (enums || promote(left, right).is_some()).then_some(ValueType::Bool)
        }
        BitwiseAnd | ExclusiveOr | BitwiseOr => match (left, right) {
            (ValueType::Bool, ValueType::Bool) => Some(ValueType::Bool),
            (ValueType::Enum(_), ValueType::Enum(_)) if left == right => Some(left.clone()),
            _ => promote(left, right).filter(ValueType::is_integral),
        },
        Coalesce => None,
    }
}

pub fn unary_type(op: UnaryOp, operand: &ValueType) -> Option<ValueType> {
    if operand.is_dynamic() {
        return Some(match op {
            UnaryOp::Not => ValueType::Bool,
            _ => ValueType::Object,
        });
    }
    match op {
        UnaryOp::Not => (*operand == ValueType::Bool).then_some(ValueType::Bool),
        UnaryOp::Minus => match numeric_operand(operand)? {
            ValueType::UInt32 => Some(ValueType::Int64),
            ValueType::UInt64 => None,
            ty => Some(ty),
        },
        UnaryOp::Plus => numeric_operand(operand),
        UnaryOp::BitwiseNot => numeric_operand(operand).filter(ValueType::is_integral),
    }
}

fn is_numeric_value(value: &Value) -> bool {
    numeric_operand(&value.value_type()).is_some()
}

/// Equality used by `==` and `!=`: numbers compare by value across widths.
pub fn equals(left: &Value, right: &Value) -> bool {
    match (left.is_null(), right.is_null()) {
        (true, true) => return true,
        (true, false) | (false, true) => return false,
        _ => {}
    }
    if is_numeric_value(left) && is_numeric_value(right) {
        if let Some(ty) = promote(&left.value_type(), &right.value_type()) {
            return left.to_numeric(&ty) == right.to_numeric(&ty);
        }
    }
    left == right
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int32(a), Value::Int32(b)) => Some(a.cmp(b)),
        (Value::UInt32(a), Value::UInt32(b)) => Some(a.cmp(b)),
        (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
        (Value::UInt64(a), Value::UInt64(b)) => Some(a.cmp(b)),
        (Value::Float32(a), Value::Float32(b)) => a.partial_cmp(b),
        (Value::Float64(a), Value::Float64(b)) => a.partial_cmp(b),
        (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn ordering_holds(op: BinaryOp, ordering: Option<Ordering>) -> bool {
    match (op, ordering) {
        (_, None) => false,
        (BinaryOp::LessThan, Some(o)) => o == Ordering::Less,
        (BinaryOp::GreaterThan, Some(o)) => o == Ordering::Greater,
        (BinaryOp::LessThanOrEqual, Some(o)) => o != Ordering::Greater,
        (BinaryOp::GreaterThanOrEqual, Some(o)) => o != Ordering::Less,
        _ => false,
    }
}

macro_rules! integral {
    ($variant:ident, $op:expr, $a:expr, $b:expr) => {{
        let (a, b) = ($a, $b);
        Some(Value::$variant(match $op {
            BinaryOp::Multiply => a.wrapping_mul(b),
            BinaryOp::Divide if b == 0 => return Err(BindingError::DivisionByZero),
            BinaryOp::Divide => a.wrapping_div(b),
            BinaryOp::Remainder if b == 0 => return Err(BindingError::DivisionByZero),
            BinaryOp::Remainder => a.wrapping_rem(b),
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Subtract => a.wrapping_sub(b),
            BinaryOp::BitwiseAnd => a & b,
            BinaryOp::BitwiseOr => a | b,
            BinaryOp::ExclusiveOr => a ^ b,
            _ => return Ok(None),
        }))
    }};
}

macro_rules! real {
    ($variant:ident, $op:expr, $a:expr, $b:expr) => {{
        let (a, b) = ($a, $b);
        Some(Value::$variant(match $op {
            BinaryOp::Multiply => a * b,
            BinaryOp::Divide => a / b,
            BinaryOp::Remainder => a % b,
            BinaryOp::Add => a + b,
            BinaryOp::Subtract => a - b,
            _ => return Ok(None),
        }))
    }};
}

fn decimal(op: BinaryOp, a: Decimal, b: Decimal) -> Result<Option<Value>, BindingError> {
    if matches!(op, BinaryOp::Divide | BinaryOp::Remainder) && b.is_zero() {
        return Err(BindingError::DivisionByZero);
    }
    let result = match op {
        BinaryOp::Multiply => a.checked_mul(b),
        BinaryOp::Divide => a.checked_div(b),
        BinaryOp::Remainder => a.checked_rem(b),
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Subtract => a.checked_sub(b),
        _ => return Ok(None),
    };
    result
        .map(|d| Some(Value::Decimal(d)))
        .ok_or_else(|| BindingError::host(format!("decimal overflow in {} {} {}", a, op, b)))
}

/// Arithmetic or bitwise operation on two values already promoted to one type.
fn arithmetic(op: BinaryOp, left: Value, right: Value) -> Result<Option<Value>, BindingError> {
    Ok(match (left, right) {
        (Value::Int32(a), Value::Int32(b)) => integral!(Int32, op, a, b),
        (Value::UInt32(a), Value::UInt32(b)) => integral!(UInt32, op, a, b),
        (Value::Int64(a), Value::Int64(b)) => integral!(Int64, op, a, b),
        (Value::UInt64(a), Value::UInt64(b)) => integral!(UInt64, op, a, b),
        (Value::Float32(a), Value::Float32(b)) => real!(Float32, op, a, b),
        (Value::Float64(a), Value::Float64(b)) => real!(Float64, op, a, b),
        (Value::Decimal(a), Value::Decimal(b)) => return decimal(op, a, b),
        _ => None,
    })
}

fn enum_operation(op: BinaryOp, a: &EnumValue, b: &EnumValue) -> Option<Value> {
    let value = match op {
        BinaryOp::BitwiseAnd => a.value & b.value,
        BinaryOp::BitwiseOr => a.value | b.value,
        BinaryOp::ExclusiveOr => a.value ^ b.value,
        op if op.is_comparison() => return Some(Value::Bool(ordering_holds(op, Some(a.value.cmp(&b.value))))),
        _ => return None,
    };
    let name = a
        .info
        .members()
        .find(|(_, v)| *v == value)
        .map(|(n, _)| n.to_string())
        .unwrap_or_else(|| value.to_string());
    Some(Value::Enum(EnumValue {
        info: a.info.clone(),
        name,
        value,
    }))
}

/// Applies a binary operator to runtime values.
///
/// `&&`, `||` and `??` are evaluated eagerly here; the evaluator
/// short-circuits them before reaching this point.
pub fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, BindingError> {
    let fail = || invalid(op.symbol(), &[&left.value_type(), &right.value_type()]);
    match op {
        BinaryOp::Equal => return Ok(Value::Bool(equals(left, right))),
        BinaryOp::NotEqual => return Ok(Value::Bool(!equals(left, right))),
        BinaryOp::Coalesce => {
            return Ok(if left.is_null() {
                right.clone()
            } else {
                left.clone()
            });
        }
        BinaryOp::And | BinaryOp::Or => {
            return match (left.as_bool(), right.as_bool()) {
                (Some(a), Some(b)) if op == BinaryOp::And => Ok(Value::Bool(a && b)),
                (Some(a), Some(b)) => Ok(Value::Bool(a || b)),
                _ => Err(fail()),
            };
        }
        BinaryOp::Add if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) => {
            let mut text = left.display_string();
            text.push_str(&right.display_string());
            return Ok(Value::String(text));
        }
        _ => {}
    }

    if left.is_null() || right.is_null() {
        return Ok(if op.is_comparison() {
            Value::Bool(false)
        } else {
            Value::Null
        });
    }

    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => {
            return match op {
                BinaryOp::BitwiseAnd => Ok(Value::Bool(a & b)),
                BinaryOp::BitwiseOr => Ok(Value::Bool(a | b)),
                BinaryOp::ExclusiveOr => Ok(Value::Bool(a ^ b)),
                _ => Err(fail()),
            };
        }
        (Value::Enum(a), Value::Enum(b)) if a.info.name == b.info.name => {
            return enum_operation(op, a, b).ok_or_else(fail);
        }
        _ => {}
    }

    let ty = promote(&left.value_type(), &right.value_type()).ok_or_else(fail)?;
    let (Some(a), Some(b)) = (left.to_numeric(&ty), right.to_numeric(&ty)) else {
        return Err(fail());
    };
    if op.is_comparison() {
        return Ok(Value::Bool(ordering_holds(op, compare(&a, &b))));
    }
    arithmetic(op, a, b)?.ok_or_else(fail)
}

pub fn apply_unary(op: UnaryOp, operand: &Value) -> Result<Value, BindingError> {
    let fail = || invalid(op.symbol(), &[&operand.value_type()]);
    if operand.is_null() {
        return Ok(Value::Null);
    }
    let operand = match operand {
        Value::Char(c) => Value::Int32(*c as i32),
        other => other.clone(),
    };
    match (op, operand) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Plus, value) if is_numeric_value(&value) => Ok(value),
        (UnaryOp::Minus, Value::Int32(n)) => Ok(Value::Int32(n.wrapping_neg())),
        (UnaryOp::Minus, Value::UInt32(n)) => Ok(Value::Int64(-(n as i64))),
        (UnaryOp::Minus, Value::Int64(n)) => Ok(Value::Int64(n.wrapping_neg())),
        (UnaryOp::Minus, Value::Float32(n)) => Ok(Value::Float32(-n)),
        (UnaryOp::Minus, Value::Float64(n)) => Ok(Value::Float64(-n)),
        (UnaryOp::Minus, Value::Decimal(d)) => Ok(Value::Decimal(-d)),
        (UnaryOp::BitwiseNot, Value::Int32(n)) => Ok(Value::Int32(!n)),
        (UnaryOp::BitwiseNot, Value::UInt32(n)) => Ok(Value::UInt32(!n)),
        (UnaryOp::BitwiseNot, Value::Int64(n)) => Ok(Value::Int64(!n)),
        (UnaryOp::BitwiseNot, Value::UInt64(n)) => Ok(Value::UInt64(!n)),
        _ => Err(fail()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_table() {
        use ValueType::*;
        assert_eq!(promote(&Int32, &Int32), Some(Int32));
        assert_eq!(promote(&Int32, &UInt32), Some(Int64));
        assert_eq!(promote(&Int64, &UInt64), Some(Decimal));
        assert_eq!(promote(&Float32, &Int64), Some(Float32));
        assert_eq!(promote(&Char, &Char), Some(Int32));
        assert_eq!(promote(&Bool, &Int32), None);
    }

    #[test]
    fn test_integer_division_by_zero() {
        assert!(matches!(
            apply_binary(BinaryOp::Divide, &Value::Int32(1), &Value::Int32(0)),
            Err(BindingError::DivisionByZero)
        ));
        assert_eq!(
            apply_binary(BinaryOp::Divide, &Value::Float64(1.0), &Value::Float64(0.0)).unwrap(),
            Value::Float64(f64::INFINITY)
        );
    }

    #[test]
    fn test_mixed_width_equality() {
        assert!(equals(&Value::Int32(3), &Value::Int64(3)));
        assert!(equals(&Value::Float64(2.0), &Value::Int32(2)));
        assert!(!equals(&Value::Null, &Value::Int32(0)));
        assert!(equals(&Value::Null, &Value::Unset));
    }

    #[test]
    fn test_string_concatenation_with_null() {
        assert_eq!(
            apply_binary(BinaryOp::Add, &Value::from("a"), &Value::Null).unwrap(),
            Value::from("a")
        );
        assert_eq!(
            apply_binary(BinaryOp::Add, &Value::Int32(1), &Value::from("b")).unwrap(),
            Value::from("1b")
        );
    }
}
