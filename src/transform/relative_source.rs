//! Folds member and constant-index chains into relative sources and resources.
//!
//! `{Relative Window}.Title.Length` becomes a single relative source with
//! the path `Title.Length`; `$Settings["theme"]` becomes a resource with
//! the path `["theme"]`. A call or non-constant indexer ends the merge.

use crate::{
    ast::{Expr, PathSegment},
    error::BindingError,
    transform::map_children,
    value::Value,
};

/// Values of an argument list made only of constants.
pub(crate) fn constant_args(args: &[Expr]) -> Option<Vec<Value>> {
    args.iter()
        .map(|arg| match arg {
            Expr::Constant(value) if !matches!(value, Value::Type(_)) => Some(value.clone()),
            _ => None,
        })
        .collect()
}

fn merge(target: Box<Expr>, segment: PathSegment, rebuild: impl FnOnce(Box<Expr>) -> Expr) -> Expr {
    match *target {
        Expr::RelativeSource(mut source) => {
            source.path.push(segment);
            Expr::RelativeSource(source)
        }
        Expr::Resource(mut resource) => {
            resource.path.push(segment);
            Expr::Resource(resource)
        }
        other => rebuild(Box::new(other)),
    }
}

pub fn merge_paths(expr: Expr) -> Result<Expr, BindingError> {
    let expr = map_children(expr, &mut merge_paths)?;
    Ok(match expr {
        Expr::Member {
            target: Some(target),
            name,
        } => merge(target, PathSegment::Member(name.clone()), |target| Expr::Member {
            target: Some(target),
            name,
        }),
        Expr::Index {
            target: Some(target),
            args,
        } => match constant_args(&args) {
            Some(values) => merge(target, PathSegment::Index(values), |target| Expr::Index {
                target: Some(target),
                args,
            }),
            None => Expr::Index {
                target: Some(target),
                args,
            },
        },
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{RelativeSource, RelativeSourceKind};

    #[test]
    fn test_member_chain_merges_into_element_source() {
        let element = Expr::RelativeSource(RelativeSource::new(RelativeSourceKind::Element {
            name: "box".to_string(),
        }));
        let expr = Expr::member_of(Expr::member_of(element, "Text"), "Length");
        let Expr::RelativeSource(source) = merge_paths(expr).unwrap() else {
            panic!("expected a merged relative source");
        };
        assert_eq!(source.path.to_string(), "Text.Length");
    }

    #[test]
    fn test_call_stops_merging() {
        let expr = Expr::MethodCall {
            target: Some(Box::new(Expr::RelativeSource(RelativeSource::new(
                RelativeSourceKind::SelfRef,
            )))),
            method: "ToString".to_string(),
            args: vec![],
        };
        let merged = merge_paths(expr).unwrap();
        assert!(matches!(merged, Expr::MethodCall { .. }));
    }
}
