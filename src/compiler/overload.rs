//! Overload resolution.
//!
//! A candidate is applicable if every argument converts to its parameter,
//! either in normal form or, for a `params` method, with the trailing
//! arguments packed into the tail list. Among applicable candidates the
//! best is the one no other candidate beats on, in order:
//!
//! 1. the worst conversion it needs (exact < implicit < cast),
//! 2. the number of exact matches,
//! 3. normal form over packed form,
//! 4. more specific parameter types.
//!
//! The choice never depends on the order candidates were declared in; if no
//! single best candidate exists the call is ambiguous.

use std::{cmp::Ordering, sync::Arc};

use log::trace;

use crate::{
    error::{BindingError, ResolutionError, ResolutionErrorKind},
    types::{Conversion, MethodInfo, ValueType},
    value::Value,
};

/// A candidate together with how each argument reaches it.
#[derive(Debug, Clone)]
pub struct Applicable {
    pub method: Arc<MethodInfo>,
    pub conversions: Vec<Conversion>,
    /// Trailing arguments are packed into the `params` list
    pub expanded: bool,
}

impl Applicable {
    fn worst(&self) -> Conversion {
        self.conversions
            .iter()
            .copied()
            .max()
            .unwrap_or(Conversion::Exact)
    }

    fn exact_count(&self) -> usize {
        self.conversions
            .iter()
            .filter(|c| **c == Conversion::Exact)
            .count()
    }

    /// Number of arguments passed positionally; the rest are packed.
    pub fn fixed_count(&self) -> usize {
        if self.expanded {
            self.method.parameters.len() - 1
        } else {
            self.method.parameters.len()
        }
    }

    /// Type the `index`-th argument is converted to.
    pub fn parameter_type(&self, index: usize) -> ValueType {
        let params = &self.method.parameters;
        match params.get(index.min(params.len().saturating_sub(1))) {
            Some(p) if self.expanded && index >= params.len() - 1 => p.ty.clone(),
            Some(p) if p.variadic => ValueType::List,
            Some(p) => p.ty.clone(),
            None => ValueType::Object,
        }
    }

    /// Converts runtime arguments and packs the `params` tail.
    pub fn prepare(&self, args: Vec<Value>) -> Result<Vec<Value>, BindingError> {
        let mut converted = Vec::with_capacity(args.len());
        for (index, (arg, conversion)) in args.into_iter().zip(&self.conversions).enumerate() {
            if *conversion == Conversion::Exact {
                converted.push(arg);
            } else {
                converted.push(arg.convert(&self.parameter_type(index))?);
            }
        }
        if self.expanded {
            let tail = converted.split_off(self.fixed_count());
            converted.push(Value::List(tail));
        }
        Ok(converted)
    }
}

fn conversion_to(parameter: &ValueType, argument: &ValueType) -> Option<Conversion> {
    parameter.conversion_from(argument)
}

/// Checks `method` against the argument types.
pub fn applicable(method: &Arc<MethodInfo>, args: &[ValueType]) -> Option<Applicable> {
    let params = &method.parameters;
    if params.len() == args.len() {
        let normal: Option<Vec<Conversion>> = params
            .iter()
            .zip(args)
            .map(|(p, a)| {
                if p.variadic {
                    conversion_to(&ValueType::List, a)
                } else {
                    conversion_to(&p.ty, a)
                }
            })
            .collect();
        if let Some(conversions) = normal {
            return Some(Applicable {
                method: method.clone(),
                conversions,
                expanded: false,
            });
        }
    }

    if !method.is_variadic() || args.len() + 1 < params.len() {
        return None;
    }
    let fixed = params.len() - 1;
    let element = &params[fixed].ty;
    let conversions: Option<Vec<Conversion>> = params[..fixed]
        .iter()
        .zip(args)
        .map(|(p, a)| conversion_to(&p.ty, a))
        .chain(args[fixed..].iter().map(|a| conversion_to(element, a)))
        .collect();
    conversions.map(|conversions| Applicable {
        method: method.clone(),
        conversions,
        expanded: true,
    })
}

/// `Less` if `a`'s parameter types are strictly more specific than `b`'s.
fn specificity(a: &Applicable, b: &Applicable) -> Ordering {
    let count = a.conversions.len();
    let a_to_b = (0..count).all(|i| b.parameter_type(i).is_assignable_from(&a.parameter_type(i)));
    let b_to_a = (0..count).all(|i| a.parameter_type(i).is_assignable_from(&b.parameter_type(i)));
    match (a_to_b, b_to_a) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn compare(a: &Applicable, b: &Applicable) -> Ordering {
    a.worst()
        .cmp(&b.worst())
        .then_with(|| b.exact_count().cmp(&a.exact_count()))
        .then_with(|| a.expanded.cmp(&b.expanded))
        .then_with(|| specificity(a, b))
}

/// Picks the best applicable method; `Ok(None)` if none applies.
pub fn select(
    methods: &[Arc<MethodInfo>],
    args: &[ValueType],
    type_name: &str,
    method_name: &str,
) -> Result<Option<Applicable>, ResolutionError> {
    let candidates: Vec<Applicable> = methods.iter().filter_map(|m| applicable(m, args)).collect();
    let mut best: Vec<&Applicable> = candidates
        .iter()
        .filter(|c| {
            !candidates
                .iter()
                .any(|other| compare(other, c) == Ordering::Less)
        })
        .collect();

    match best.len() {
        0 if candidates.is_empty() => Ok(None),
        1 => {
            let chosen = best.remove(0);
            trace!(
                "{}.{}({:?}) resolved to {:?}",
                type_name, method_name, args, chosen.method
            );
            Ok(Some(chosen.clone()))
        }
        _ => Err(ResolutionError::new(
            ResolutionErrorKind::AmbiguousOverload {
                type_name: type_name.to_string(),
                method: method_name.to_string(),
            },
            format!("{}.{}", type_name, method_name),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParameterInfo;

    fn method(params: Vec<ParameterInfo>) -> Arc<MethodInfo> {
        MethodInfo::static_method("M", params, ValueType::Object, |_| Ok(Value::Null))
    }

    #[test]
    fn test_params_tail_is_packed() {
        let m = method(vec![
            ParameterInfo::new("format", ValueType::String),
            ParameterInfo::params("args", ValueType::Object),
        ]);
        let chosen = applicable(&m, &[ValueType::String, ValueType::Int32, ValueType::Bool]).unwrap();
        assert!(chosen.expanded);
        let args = chosen
            .prepare(vec![Value::from("{0}{1}"), Value::Int32(1), Value::Bool(true)])
            .unwrap();
        assert_eq!(
            args,
            vec![
                Value::from("{0}{1}"),
                Value::List(vec![Value::Int32(1), Value::Bool(true)])
            ]
        );
    }

    #[test]
    fn test_empty_params_tail() {
        let m = method(vec![ParameterInfo::params("args", ValueType::Object)]);
        let chosen = applicable(&m, &[]).unwrap();
        assert_eq!(chosen.prepare(vec![]).unwrap(), vec![Value::List(vec![])]);
    }

    #[test]
    fn test_value_type_cast_rejected() {
        let m = method(vec![ParameterInfo::new("n", ValueType::Int32)]);
        assert!(applicable(&m, &[ValueType::Object]).is_none());
    }

    #[test]
    fn test_more_specific_widening_wins() {
        let long = method(vec![ParameterInfo::new("n", ValueType::Int64)]);
        let double = method(vec![ParameterInfo::new("n", ValueType::Float64)]);
        for methods in [vec![long.clone(), double.clone()], vec![double, long]] {
            let chosen = select(&methods, &[ValueType::UInt32], "T", "M").unwrap().unwrap();
            assert_eq!(chosen.method.parameters[0].ty, ValueType::Int64);
        }
    }
}
