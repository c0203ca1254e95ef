//! Member access on runtime values.
//!
//! Used by the dynamic nodes of compiled evaluators and to walk the paths of
//! binding members. Static reflection is tried first, then the dynamic
//! member protocol.

use std::sync::Arc;

use log::trace;

use crate::{
    ast::{BindingMemberDescriptor, MemberKind, MemberPath, PathSegment, RelativeSourceKind},
    builtins,
    compiler::overload,
    context::{BindingContext, keys},
    error::{BindingError, ResolutionError, ResolutionErrorKind},
    resources::ResourceResolver,
    types::{MethodInfo, MethodKind, ValueType},
    value::Value,
};

fn not_found(kind: ResolutionErrorKind, node: impl Into<String>) -> BindingError {
    ResolutionError::new(kind, node).into()
}

/// Reads `target.name`.
pub fn get_member(target: &Value, name: &str) -> Result<Value, BindingError> {
    if target.is_null() {
        return Err(BindingError::NullReference(name.to_string()));
    }
    match target {
        Value::Type(ValueType::Enum(info)) => {
            return info.parse(name).ok_or_else(|| {
                not_found(
                    ResolutionErrorKind::InvalidEnumMember {
                        type_name: info.name.clone(),
                        member: name.to_string(),
                    },
                    name,
                )
            });
        }
        Value::Type(ValueType::Class(info)) => {
            return match info.property(name).filter(|p| p.is_static) {
                Some(property) => property.get(target),
                None => Err(not_found(
                    ResolutionErrorKind::MemberNotFound {
                        type_name: info.name.clone(),
                        member: name.to_string(),
                    },
                    name,
                )),
            };
        }
        _ => {}
    }

    let ty = target.value_type();
    if let Some(property) = ty.reflect().and_then(|info| info.property(name)) {
        return property.get(target);
    }
    if let Value::Object(object) = target {
        if let Some(dynamic) = object.as_dynamic() {
            return dynamic.get_member(name, &[]);
        }
    }
    Err(not_found(
        ResolutionErrorKind::MemberNotFound {
            type_name: ty.to_string(),
            member: name.to_string(),
        },
        name,
    ))
}

/// Reads `target[args]`.
pub fn get_index(target: &Value, args: Vec<Value>) -> Result<Value, BindingError> {
    if target.is_null() {
        return Err(BindingError::NullReference("[]".to_string()));
    }
    let ty = target.value_type();
    if let Some(info) = ty.reflect() {
        let arg_types: Vec<ValueType> = args.iter().map(Value::value_type).collect();
        if let Some(chosen) = overload::select(&info.indexers(), &arg_types, &info.name, "Item")? {
            let args = chosen.prepare(args)?;
            return chosen.method.invoke(target, &args);
        }
    }
    if let Value::Object(object) = target {
        if let Some(dynamic) = object.as_dynamic() {
            return dynamic.get_index(&args);
        }
    }
    Err(not_found(
        ResolutionErrorKind::IndexerNotFound {
            type_name: ty.to_string(),
        },
        "[]",
    ))
}

/// Instance and extension candidates for `name` on values of type `ty`.
pub(crate) fn instance_candidates(
    ty: &ValueType,
    name: &str,
    resolver: &dyn ResourceResolver,
) -> (Vec<Arc<MethodInfo>>, Vec<Arc<MethodInfo>>) {
    let instance: Vec<Arc<MethodInfo>> = match ty.reflect() {
        Some(info) => info
            .methods(name)
            .into_iter()
            .filter(|m| m.kind == MethodKind::Instance)
            .collect(),
        None => vec![],
    };
    let instance = if instance.is_empty() {
        builtins::object_type().methods(name)
    } else {
        instance
    };
    let extensions = resolver
        .known_types()
        .iter()
        .flat_map(|info| info.extensions(name).cloned().collect::<Vec<_>>())
        .collect();
    (instance, extensions)
}

/// Calls `target.name(args)`, resolving the overload on the runtime types.
pub fn invoke_member(
    target: &Value,
    name: &str,
    args: Vec<Value>,
    resolver: &dyn ResourceResolver,
) -> Result<Value, BindingError> {
    if target.is_null() {
        return Err(BindingError::NullReference(name.to_string()));
    }
    let ty = target.value_type();
    let arg_types: Vec<ValueType> = args.iter().map(Value::value_type).collect();

    if let Value::Type(ValueType::Class(info)) = target {
        let statics: Vec<Arc<MethodInfo>> = info
            .methods(name)
            .into_iter()
            .filter(|m| m.kind != MethodKind::Instance)
            .collect();
        if let Some(chosen) = overload::select(&statics, &arg_types, &info.name, name)? {
            let args = chosen.prepare(args)?;
            return chosen.method.invoke(target, &args);
        }
    } else {
        let (instance, extensions) = instance_candidates(&ty, name, resolver);
        if let Some(chosen) = overload::select(&instance, &arg_types, ty.name(), name)? {
            trace!("dynamic call {}.{} bound to an instance method", ty, name);
            let args = chosen.prepare(args)?;
            return chosen.method.invoke(target, &args);
        }
        let mut receiver_types = vec![ty.clone()];
        receiver_types.extend(arg_types.iter().cloned());
        if let Some(chosen) = overload::select(&extensions, &receiver_types, ty.name(), name)? {
            trace!("dynamic call {}.{} bound to an extension method", ty, name);
            let mut all = vec![target.clone()];
            all.extend(args);
            let all = chosen.prepare(all)?;
            return chosen.method.invoke(&Value::Null, &all);
        }
        if let Value::Object(object) = target {
            if let Some(dynamic) = object.as_dynamic() {
                return dynamic.invoke_member(name, &args, &[]);
            }
        }
    }
    Err(not_found(
        ResolutionErrorKind::MethodNotFound {
            type_name: ty.to_string(),
            method: name.to_string(),
        },
        name,
    ))
}

/// Walks `path` from `root`; a null link yields [`Value::Unset`].
pub fn walk(root: Value, path: &MemberPath) -> Result<Value, BindingError> {
    let mut current = root;
    for segment in path.segments() {
        if current.is_null() {
            return Ok(Value::Unset);
        }
        current = match segment {
            PathSegment::Member(name) => get_member(&current, name)?,
            PathSegment::Index(args) => get_index(&current, args.clone())?,
        };
    }
    Ok(current)
}

impl BindingMemberDescriptor {
    /// Current value of this member in `context`.
    ///
    /// Plain paths start at the data context, `$self` paths at the target,
    /// resources at the resolved object; ancestors and named elements are
    /// found through the context's [`SourceLocator`](crate::context::SourceLocator).
    pub fn resolve(
        &self,
        context: &BindingContext,
        resolver: &dyn ResourceResolver,
    ) -> Result<Value, BindingError> {
        let data_context = || context.get(keys::DATA_CONTEXT).unwrap_or(Value::Null);
        let root = match &self.kind {
            MemberKind::Path => data_context(),
            MemberKind::Resource(name) => resolver
                .resolve_object(name, context, true)?
                .unwrap_or(Value::Null),
            MemberKind::RelativeSource(RelativeSourceKind::SelfRef) => {
                match context.get(keys::TARGET) {
                    Some(target) => target,
                    // Without a target, `$context` still reaches the data context.
                    None if matches!(
                        self.path.segments().first(),
                        Some(PathSegment::Member(name)) if name == "DataContext"
                    ) =>
                    {
                        let rest = MemberPath::from_segments(self.path.segments()[1..].to_vec());
                        return walk(data_context(), &rest);
                    }
                    None => Value::Null,
                }
            }
            MemberKind::RelativeSource(kind) => {
                let target = context.get(keys::TARGET).unwrap_or(Value::Null);
                let locator = context.get(keys::SOURCE_LOCATOR);
                let found = locator.and_then(|locator| match kind {
                    RelativeSourceKind::Ancestor { type_name, level } => {
                        locator.find_ancestor(&target, type_name, *level)
                    }
                    RelativeSourceKind::Element { name } => locator.find_element(&target, name),
                    RelativeSourceKind::SelfRef => None,
                });
                found.ok_or_else(|| {
                    not_found(
                        ResolutionErrorKind::ResourceNotFound(kind.to_string()),
                        self.key.clone(),
                    )
                })?
            }
        };
        walk(root, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PropertyBag;

    #[test]
    fn test_walk_stops_at_null() {
        let bag = PropertyBag::new().with("User", Value::Null);
        let path = MemberPath::from_segments(vec![
            PathSegment::Member("User".into()),
            PathSegment::Member("Name".into()),
        ]);
        assert_eq!(walk(Value::object(bag), &path).unwrap(), Value::Unset);
    }

    #[test]
    fn test_string_members() {
        assert_eq!(get_member(&Value::from("abc"), "Length").unwrap(), Value::Int32(3));
        assert_eq!(
            get_index(&Value::from("abc"), vec![Value::Int32(1)]).unwrap(),
            Value::Char('b')
        );
        assert!(get_member(&Value::Int32(1), "Length").is_err());
    }
}
