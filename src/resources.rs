//! Resource resolution.
//!
//! Everything the grammar names but does not define - types, named objects,
//! resource methods, converters, behaviors and method aliases - is looked up
//! through a [`ResourceResolver`]. [`ResourceRegistry`] is the in-memory
//! implementation, pre-populated with the built-in types.

use std::{collections::HashMap, fmt, sync::Arc};

use log::debug;
use parking_lot::RwLock;

use crate::{
    builtins,
    context::{BindingBehavior, BindingContext, FlagBehavior, ValueConverter},
    error::{BindingError, ResolutionError, ResolutionErrorKind},
    types::{EnumInfo, TypeInfo, ValueType},
    value::{Function, Value},
};

/// A method invoked by name through `$name(args)`.
pub trait DynamicMethod: Send + Sync {
    fn invoke(&self, args: &[Value], context: &BindingContext) -> Result<Value, BindingError>;
}

impl DynamicMethod for Function {
    fn invoke(&self, args: &[Value], _context: &BindingContext) -> Result<Value, BindingError> {
        self.call(args)
    }
}

/// Converter backed by a resource method; used for `$Method(Path)` bindings.
pub struct MethodConverter {
    name: String,
    method: Arc<dyn DynamicMethod>,
    /// Whether the source value is passed as the single argument
    takes_value: bool,
}

impl MethodConverter {
    pub fn new(name: impl Into<String>, method: Arc<dyn DynamicMethod>, takes_value: bool) -> Self {
        MethodConverter {
            name: name.into(),
            method,
            takes_value,
        }
    }
}

impl fmt::Debug for MethodConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodConverter(${})", self.name)
    }
}

impl ValueConverter for MethodConverter {
    fn convert(
        &self,
        value: &Value,
        _parameter: &Value,
        context: &BindingContext,
    ) -> Result<Value, BindingError> {
        if self.takes_value {
            self.method.invoke(std::slice::from_ref(value), context)
        } else {
            self.method.invoke(&[], context)
        }
    }
}

/// Lookup of named things referenced by binding expressions.
///
/// With `throw_on_missing` set, a missing name is reported as a
/// [`ResolutionError`]; otherwise as `Ok(None)`.
pub trait ResourceResolver: Send + Sync {
    fn resolve_type(
        &self,
        name: &str,
        context: &BindingContext,
        throw_on_missing: bool,
    ) -> Result<Option<ValueType>, BindingError>;

    fn resolve_object(
        &self,
        name: &str,
        context: &BindingContext,
        throw_on_missing: bool,
    ) -> Result<Option<Value>, BindingError>;

    fn resolve_method(
        &self,
        name: &str,
        context: &BindingContext,
        throw_on_missing: bool,
    ) -> Result<Option<Arc<dyn DynamicMethod>>, BindingError>;

    fn resolve_converter(
        &self,
        name: &str,
        context: &BindingContext,
        throw_on_missing: bool,
    ) -> Result<Option<Arc<dyn ValueConverter>>, BindingError>;

    fn resolve_behavior(
        &self,
        name: &str,
        context: &BindingContext,
        args: &[Value],
        throw_on_missing: bool,
    ) -> Result<Option<Arc<dyn BindingBehavior>>, BindingError>;

    /// Types whose extension methods are candidates for every call.
    fn known_types(&self) -> Vec<Arc<TypeInfo>>;

    /// Static method a bare root call `Name(...)` stands for.
    fn try_get_method_alias(&self, name: &str) -> Option<(ValueType, String)>;
}

fn missing<T>(
    throw_on_missing: bool,
    kind: impl FnOnce() -> ResolutionErrorKind,
    name: &str,
) -> Result<Option<T>, BindingError> {
    if throw_on_missing {
        Err(ResolutionError::new(kind(), name).into())
    } else {
        Ok(None)
    }
}

type BehaviorFactory =
    Arc<dyn Fn(&[Value]) -> Result<Arc<dyn BindingBehavior>, BindingError> + Send + Sync>;

/// In-memory [`ResourceResolver`].
///
/// Behaviors without a registered factory resolve to a [`FlagBehavior`]
/// unless the registry was made strict.
pub struct ResourceRegistry {
    types: RwLock<HashMap<String, ValueType>>,
    objects: RwLock<HashMap<String, Value>>,
    methods: RwLock<HashMap<String, Arc<dyn DynamicMethod>>>,
    converters: RwLock<HashMap<String, Arc<dyn ValueConverter>>>,
    behaviors: RwLock<HashMap<String, BehaviorFactory>>,
    known_types: RwLock<Vec<Arc<TypeInfo>>>,
    method_aliases: RwLock<HashMap<String, (ValueType, String)>>,
    strict_behaviors: bool,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRegistry {
    /// Registry with the built-in types registered.
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register_type("Math", ValueType::Class(builtins::math_type()));
        registry.register_type("String", ValueType::Class(builtins::string_static_type()));
        registry.register_type("Enumerable", ValueType::Class(builtins::enumerable_type()));
        registry.register_type(
            "RegexExtensions",
            ValueType::Class(builtins::regex_extensions_type()),
        );
        registry.register_known_type(builtins::enumerable_type());
        registry.register_known_type(builtins::regex_extensions_type());
        registry
    }

    pub fn empty() -> Self {
        ResourceRegistry {
            types: RwLock::new(HashMap::new()),
            objects: RwLock::new(HashMap::new()),
            methods: RwLock::new(HashMap::new()),
            converters: RwLock::new(HashMap::new()),
            behaviors: RwLock::new(HashMap::new()),
            known_types: RwLock::new(vec![]),
            method_aliases: RwLock::new(HashMap::new()),
            strict_behaviors: false,
        }
    }

    /// Unregistered behaviors become resolution errors.
    pub fn strict_behaviors(mut self) -> Self {
        self.strict_behaviors = true;
        self
    }

    pub fn register_type(&self, name: impl Into<String>, ty: ValueType) {
        self.types.write().insert(name.into(), ty);
    }

    pub fn register_class(&self, info: Arc<TypeInfo>) {
        self.register_type(info.name.clone(), ValueType::Class(info));
    }

    pub fn register_enum(&self, info: Arc<EnumInfo>) {
        self.register_type(info.name.clone(), ValueType::Enum(info));
    }

    pub fn register_object(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.objects.write().insert(name.into(), value.into());
    }

    pub fn register_method(&self, name: impl Into<String>, method: impl DynamicMethod + 'static) {
        self.methods.write().insert(name.into(), Arc::new(method));
    }

    pub fn register_converter(&self, name: impl Into<String>, converter: impl ValueConverter + 'static) {
        self.converters.write().insert(name.into(), Arc::new(converter));
    }

    pub fn register_behavior(
        &self,
        name: impl Into<String>,
        factory: impl Fn(&[Value]) -> Result<Arc<dyn BindingBehavior>, BindingError> + Send + Sync + 'static,
    ) {
        self.behaviors.write().insert(name.into(), Arc::new(factory));
    }

    /// Adds a type whose extension methods apply to every call.
    pub fn register_known_type(&self, info: Arc<TypeInfo>) {
        let mut known = self.known_types.write();
        if !known.iter().any(|k| k.name == info.name) {
            known.push(info);
        }
    }

    pub fn register_method_alias(
        &self,
        alias: impl Into<String>,
        ty: ValueType,
        method: impl Into<String>,
    ) {
        self.method_aliases
            .write()
            .insert(alias.into(), (ty, method.into()));
    }
}

impl ResourceResolver for ResourceRegistry {
    fn resolve_type(
        &self,
        name: &str,
        _context: &BindingContext,
        throw_on_missing: bool,
    ) -> Result<Option<ValueType>, BindingError> {
        match self.types.read().get(name) {
            Some(ty) => Ok(Some(ty.clone())),
            None => missing(
                throw_on_missing,
                || ResolutionErrorKind::TypeNotFound(name.to_string()),
                name,
            ),
        }
    }

    fn resolve_object(
        &self,
        name: &str,
        _context: &BindingContext,
        throw_on_missing: bool,
    ) -> Result<Option<Value>, BindingError> {
        match self.objects.read().get(name) {
            Some(value) => Ok(Some(value.clone())),
            None => missing(
                throw_on_missing,
                || ResolutionErrorKind::ResourceNotFound(name.to_string()),
                name,
            ),
        }
    }

    fn resolve_method(
        &self,
        name: &str,
        _context: &BindingContext,
        throw_on_missing: bool,
    ) -> Result<Option<Arc<dyn DynamicMethod>>, BindingError> {
        match self.methods.read().get(name) {
            Some(method) => Ok(Some(method.clone())),
            None => missing(
                throw_on_missing,
                || ResolutionErrorKind::ResourceNotFound(name.to_string()),
                name,
            ),
        }
    }

    fn resolve_converter(
        &self,
        name: &str,
        _context: &BindingContext,
        throw_on_missing: bool,
    ) -> Result<Option<Arc<dyn ValueConverter>>, BindingError> {
        match self.converters.read().get(name) {
            Some(converter) => Ok(Some(converter.clone())),
            None => missing(
                throw_on_missing,
                || ResolutionErrorKind::ConverterNotFound(name.to_string()),
                name,
            ),
        }
    }

    fn resolve_behavior(
        &self,
        name: &str,
        _context: &BindingContext,
        args: &[Value],
        throw_on_missing: bool,
    ) -> Result<Option<Arc<dyn BindingBehavior>>, BindingError> {
        let factory = self.behaviors.read().get(name).cloned();
        if let Some(factory) = factory {
            return factory(args).map(Some);
        }
        if self.strict_behaviors {
            return missing(
                throw_on_missing,
                || ResolutionErrorKind::BehaviorNotFound(name.to_string()),
                name,
            );
        }
        debug!("behavior '{}' has no factory, recording it as a flag", name);
        let enabled = args.first().and_then(Value::as_bool).unwrap_or(true);
        Ok(Some(Arc::new(FlagBehavior {
            name: name.to_string(),
            enabled,
        })))
    }

    fn known_types(&self) -> Vec<Arc<TypeInfo>> {
        self.known_types.read().clone()
    }

    fn try_get_method_alias(&self, name: &str) -> Option<(ValueType, String)> {
        self.method_aliases.read().get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = ResourceRegistry::new();
        let context = BindingContext::new();
        assert!(registry.resolve_type("Math", &context, false).unwrap().is_some());
        assert_eq!(registry.known_types().len(), 2);
    }

    #[test]
    fn test_missing_names() {
        let registry = ResourceRegistry::new().strict_behaviors();
        let context = BindingContext::new();
        assert!(registry.resolve_object("Nope", &context, false).unwrap().is_none());
        assert!(matches!(
            registry.resolve_converter("Nope", &context, true),
            Err(BindingError::Resolution(ResolutionError {
                kind: ResolutionErrorKind::ConverterNotFound(_),
                ..
            }))
        ));
        assert!(registry
            .resolve_behavior("Validate", &context, &[Value::Bool(true)], true)
            .is_err());
    }
}
