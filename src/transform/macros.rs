//! Macro expansion.
//!
//! | Written              | Expands to                                   |
//! |----------------------|----------------------------------------------|
//! | `$self`              | self relative source                         |
//! | `$context`           | `$self.DataContext`                          |
//! | `$args`, `$arg`      | `$context.GetEventArgs()`                    |
//! | `$binding`           | `$context.GetBinding()`                      |
//! | `$OneTime(e)`        | `$context.OneTime("<ulid>", () => e)`        |
//! | `$Relative(T, n)`    | ancestor relative source                     |
//! | `$Element(name)`     | element relative source                      |
//! | `Math.Max(..)`       | static call on the resolved type             |
//! | `Alias(..)`          | static call through the method alias table   |

use log::trace;
use ulid::Ulid;

use crate::{
    ast::{CONTEXT_PARAMETER, Expr, PathSegment, RelativeSource, RelativeSourceKind, ResourceKind},
    context::BindingContext,
    error::{BindingError, ParseError, ParseErrorKind},
    parser::ParserOptions,
    resources::ResourceResolver,
    transform::map_children,
    value::Value,
};

fn context_call(method: &str, args: Vec<Expr>) -> Expr {
    Expr::MethodCall {
        target: Some(Box::new(Expr::Parameter(CONTEXT_PARAMETER.to_string()))),
        method: method.to_string(),
        args,
    }
}

fn invalid_relative_source(message: &str, expr: &Expr) -> BindingError {
    ParseError {
        kind: ParseErrorKind::InvalidRelativeSource(message.to_string()),
        position: 0,
        expression: expr.to_string(),
    }
    .into()
}

/// Name written either as a bare identifier or a string literal.
fn name_argument(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Member { target: None, name } => Some(name.clone()),
        Expr::Constant(Value::String(name)) => Some(name.clone()),
        _ => None,
    }
}

pub struct MacroExpander<'a> {
    options: &'a ParserOptions,
    resolver: &'a dyn ResourceResolver,
    context: &'a BindingContext,
}

impl<'a> MacroExpander<'a> {
    pub fn new(
        options: &'a ParserOptions,
        resolver: &'a dyn ResourceResolver,
        context: &'a BindingContext,
    ) -> Self {
        MacroExpander {
            options,
            resolver,
            context,
        }
    }

    pub fn expand(&self, expr: Expr) -> Result<Expr, BindingError> {
        let expr = map_children(expr, &mut |child| self.expand(child))?;
        self.rewrite(expr)
    }

    fn rewrite(&self, expr: Expr) -> Result<Expr, BindingError> {
        match expr {
            Expr::Resource(resource) if resource.kind == ResourceKind::Dynamic && resource.path.is_empty() => {
                Ok(match resource.name.as_str() {
                    "self" => Expr::RelativeSource(RelativeSource::new(RelativeSourceKind::SelfRef)),
                    "context" => {
                        let mut source = RelativeSource::new(RelativeSourceKind::SelfRef);
                        source.path.push(PathSegment::Member("DataContext".to_string()));
                        Expr::RelativeSource(source)
                    }
                    "args" | "arg" => context_call("GetEventArgs", vec![]),
                    "binding" => context_call("GetBinding", vec![]),
                    _ => Expr::Resource(resource),
                })
            }
            Expr::ResourceMethod { name, args } => self.resource_method(name, args),
            Expr::Member {
                target: Some(target),
                name,
            } => Ok(Expr::Member {
                target: Some(self.type_reference(target)?),
                name,
            }),
            Expr::MethodCall {
                target: Some(target),
                method,
                args,
            } => Ok(Expr::MethodCall {
                target: Some(self.type_reference(target)?),
                method,
                args,
            }),
            Expr::MethodCall {
                target: None,
                method,
                args,
            } => match self.resolver.try_get_method_alias(&method) {
                Some((ty, name)) => {
                    trace!("method alias '{}' -> {}.{}", method, ty, name);
                    Ok(Expr::MethodCall {
                        target: Some(Box::new(Expr::Constant(Value::Type(ty)))),
                        method: name,
                        args,
                    })
                }
                None => Ok(Expr::MethodCall {
                    target: None,
                    method,
                    args,
                }),
            },
            other => Ok(other),
        }
    }

    fn resource_method(&self, name: String, mut args: Vec<Expr>) -> Result<Expr, BindingError> {
        if name == "OneTime" && args.len() == 1 {
            let body = args.remove(0);
            let id = Ulid::new().to_string();
            return Ok(context_call(
                "OneTime",
                vec![
                    Expr::Constant(Value::String(id)),
                    Expr::Lambda {
                        parameters: vec![],
                        body: Box::new(body),
                    },
                ],
            ));
        }

        if self.options.is_relative_source_alias(&name) {
            let (type_name, level) = match args.as_slice() {
                [ty] => (name_argument(ty), Some(1)),
                [ty, Expr::Constant(level)] => (
                    name_argument(ty),
                    level.as_i64().and_then(|l| u32::try_from(l).ok()),
                ),
                _ => (None, None),
            };
            return match (type_name, level) {
                (Some(type_name), Some(level)) if level > 0 => Ok(Expr::RelativeSource(RelativeSource::new(
                    RelativeSourceKind::Ancestor { type_name, level },
                ))),
                _ => Err(invalid_relative_source(
                    "expected a type name and an optional positive level",
                    &Expr::ResourceMethod { name, args },
                )),
            };
        }

        if self.options.is_element_source_alias(&name) {
            if let [element] = args.as_slice() {
                if let Some(name) = name_argument(element) {
                    return Ok(Expr::RelativeSource(RelativeSource::new(
                        RelativeSourceKind::Element { name },
                    )));
                }
            }
            return Err(invalid_relative_source(
                "expected an element name",
                &Expr::ResourceMethod { name, args },
            ));
        }

        Ok(Expr::ResourceMethod { name, args })
    }

    /// Replaces a root identifier that names a type by a type constant.
    fn type_reference(&self, target: Box<Expr>) -> Result<Box<Expr>, BindingError> {
        if let Expr::Member { target: None, name } = target.as_ref() {
            if let Some(ty) = self.resolver.resolve_type(name, self.context, false)? {
                trace!("'{}' resolved as type {}", name, ty);
                return Ok(Box::new(Expr::Constant(Value::Type(ty))));
            }
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourceRegistry;

    fn expand(expr: Expr) -> Result<Expr, BindingError> {
        let options = ParserOptions::default();
        let registry = ResourceRegistry::new();
        let context = BindingContext::new();
        MacroExpander::new(&options, &registry, &context).expand(expr)
    }

    #[test]
    fn test_one_time_wraps_body_in_lambda() {
        let expr = Expr::ResourceMethod {
            name: "OneTime".to_string(),
            args: vec![Expr::member("Total")],
        };
        let Expr::MethodCall { method, args, .. } = expand(expr).unwrap() else {
            panic!("expected a context call");
        };
        assert_eq!(method, "OneTime");
        assert!(matches!(&args[0], Expr::Constant(Value::String(id)) if id.len() == 26));
        assert!(matches!(&args[1], Expr::Lambda { parameters, .. } if parameters.is_empty()));
    }

    #[test]
    fn test_relative_level_must_be_positive() {
        let expr = Expr::ResourceMethod {
            name: "Relative".to_string(),
            args: vec![Expr::member("Window"), Expr::constant(0)],
        };
        assert!(matches!(expand(expr), Err(BindingError::Parse(_))));
    }
}
