//! Runtime type model.
//!
//! [`ValueType`] identifies the runtime type of a [`Value`]; it is the
//! element of the shape that keys the evaluator cache, and the static type
//! the compiler reasons with. [`TypeInfo`] is the reflection descriptor a
//! host supplies for its objects: properties, methods, indexers, and whether
//! the type also answers the [`DynamicMember`] protocol.

use std::{
    any::Any,
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use parking_lot::RwLock;

use crate::{
    builtins,
    error::{BindingError, ResolutionError, ResolutionErrorKind},
    value::{EnumValue, Value},
};

/// Runtime / static type of a value.
#[derive(Clone)]
pub enum ValueType {
    /// Type of the null value; also the shape marker for null sources
    Null,
    /// Type of the "no value" marker
    Unset,
    /// Unknown static type; any value may flow here
    Object,
    Bool,
    Char,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Decimal,
    String,
    List,
    Function,
    /// A static type reference (`Math`, an enum type, ...)
    Type,
    Enum(Arc<EnumInfo>),
    Class(Arc<TypeInfo>),
}

/// How an argument reaches a parameter, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Conversion {
    Exact,
    /// Boxing, widening or up-casting; always succeeds
    Implicit,
    /// Down-cast of a reference type, checked at evaluation time
    Cast,
}

impl ValueType {
    pub fn of(value: &Value) -> ValueType {
        match value {
            Value::Null => ValueType::Null,
            Value::Unset => ValueType::Unset,
            Value::Bool(_) => ValueType::Bool,
            Value::Char(_) => ValueType::Char,
            Value::Int32(_) => ValueType::Int32,
            Value::UInt32(_) => ValueType::UInt32,
            Value::Int64(_) => ValueType::Int64,
            Value::UInt64(_) => ValueType::UInt64,
            Value::Float32(_) => ValueType::Float32,
            Value::Float64(_) => ValueType::Float64,
            Value::Decimal(_) => ValueType::Decimal,
            Value::String(_) => ValueType::String,
            Value::List(_) => ValueType::List,
            Value::Function(_) => ValueType::Function,
            Value::Type(_) => ValueType::Type,
            Value::Enum(e) => ValueType::Enum(e.info.clone()),
            Value::Object(object) => match object.type_info() {
                Some(info) => ValueType::Class(info),
                None => ValueType::Object,
            },
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ValueType::Null => "null",
            ValueType::Unset => "unset",
            ValueType::Object => "object",
            ValueType::Bool => "bool",
            ValueType::Char => "char",
            ValueType::Int32 => "int",
            ValueType::UInt32 => "uint",
            ValueType::Int64 => "long",
            ValueType::UInt64 => "ulong",
            ValueType::Float32 => "float",
            ValueType::Float64 => "double",
            ValueType::Decimal => "decimal",
            ValueType::String => "string",
            ValueType::List => "list",
            ValueType::Function => "function",
            ValueType::Type => "type",
            ValueType::Enum(info) => &info.name,
            ValueType::Class(info) => &info.name,
        }
    }

    /// Value types are never null and can only be converted by widening.
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            ValueType::Bool
                | ValueType::Char
                | ValueType::Int32
                | ValueType::UInt32
                | ValueType::Int64
                | ValueType::UInt64
                | ValueType::Float32
                | ValueType::Float64
                | ValueType::Decimal
                | ValueType::Enum(_)
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric_rank().is_some()
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            ValueType::Int32 | ValueType::UInt32 | ValueType::Int64 | ValueType::UInt64
        )
    }

    /// Static types whose members can only be known at evaluation time.
    pub fn is_dynamic(&self) -> bool {
        match self {
            ValueType::Object | ValueType::Null | ValueType::Unset => true,
            ValueType::Class(info) => info.dynamic,
            _ => false,
        }
    }

    pub(crate) fn numeric_rank(&self) -> Option<u8> {
        match self {
            ValueType::Int32 => Some(0),
            ValueType::UInt32 => Some(1),
            ValueType::Int64 => Some(2),
            ValueType::UInt64 => Some(3),
            ValueType::Float32 => Some(4),
            ValueType::Float64 => Some(5),
            ValueType::Decimal => Some(6),
            _ => None,
        }
    }

    /// Reflection descriptor for instance members of this type.
    pub fn reflect(&self) -> Option<Arc<TypeInfo>> {
        match self {
            ValueType::Class(info) => Some(info.clone()),
            ValueType::String => Some(builtins::string_type()),
            ValueType::List => Some(builtins::list_type()),
            _ => None,
        }
    }

    fn implicit_numeric(from: &ValueType, to: &ValueType) -> bool {
        use ValueType::*;
        matches!(
            (from, to),
            (Int32, Int64 | Float32 | Float64 | Decimal)
                | (UInt32, Int64 | UInt64 | Float32 | Float64 | Decimal)
                | (Int64 | UInt64, Float32 | Float64 | Decimal)
                | (Float32, Float64)
                | (Char, Int32 | UInt32 | Int64 | UInt64 | Float32 | Float64 | Decimal)
        )
    }

    /// Classifies how a value of static type `from` converts to `self`.
    pub fn conversion_from(&self, from: &ValueType) -> Option<Conversion> {
        if self == from {
            return Some(Conversion::Exact);
        }
        match (from, self) {
            (_, ValueType::Object) => Some(Conversion::Implicit),
            (ValueType::Null | ValueType::Unset, to) if !to.is_value_type() => {
                Some(Conversion::Implicit)
            }
            (from, to) if Self::implicit_numeric(from, to) => Some(Conversion::Implicit),
            (ValueType::Class(from), ValueType::Class(to)) if from.derives_from(to) => {
                Some(Conversion::Implicit)
            }
            (ValueType::Class(from), ValueType::Class(to)) if to.derives_from(from) => {
                Some(Conversion::Cast)
            }
            // Unboxing an unknown value is a value-type cast and never allowed.
            (ValueType::Object, to) if !to.is_value_type() => Some(Conversion::Cast),
            _ => None,
        }
    }

    pub fn is_assignable_from(&self, from: &ValueType) -> bool {
        matches!(
            self.conversion_from(from),
            Some(Conversion::Exact | Conversion::Implicit)
        )
    }
}

impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ValueType::Enum(a), ValueType::Enum(b)) => a.name == b.name,
            (ValueType::Class(a), ValueType::Class(b)) => a.name == b.name,
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}

impl Eq for ValueType {}

impl Hash for ValueType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ValueType::Enum(info) => info.name.hash(state),
            ValueType::Class(info) => info.name.hash(state),
            _ => {}
        }
    }
}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Enum descriptor: a named set of integral constants.
#[derive(Debug)]
pub struct EnumInfo {
    pub name: String,
    members: Vec<(String, i64)>,
}

impl EnumInfo {
    pub fn new(name: impl Into<String>, members: &[(&str, i64)]) -> Arc<EnumInfo> {
        Arc::new(EnumInfo {
            name: name.into(),
            members: members.iter().map(|(n, v)| (n.to_string(), *v)).collect(),
        })
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, i64)> {
        self.members.iter().map(|(n, v)| (n.as_str(), *v))
    }

    /// Looks up a member by name (case-sensitive).
    pub fn parse(self: &Arc<Self>, name: &str) -> Option<Value> {
        self.members
            .iter()
            .find(|(n, _)| n == name)
            .map(|(n, v)| {
                Value::Enum(EnumValue {
                    info: self.clone(),
                    name: n.clone(),
                    value: *v,
                })
            })
    }
}

pub type Getter = Arc<dyn Fn(&Value) -> Result<Value, BindingError> + Send + Sync>;
pub type Invoker = Arc<dyn Fn(&Value, &[Value]) -> Result<Value, BindingError> + Send + Sync>;

pub struct PropertyInfo {
    pub name: String,
    pub ty: ValueType,
    pub is_static: bool,
    getter: Getter,
}

impl PropertyInfo {
    /// Reads the property; `target` is ignored for static properties.
    pub fn get(&self, target: &Value) -> Result<Value, BindingError> {
        (self.getter)(target)
    }
}

impl fmt::Debug for PropertyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)
    }
}

#[derive(Debug, Clone)]
pub struct ParameterInfo {
    pub name: String,
    /// Parameter type; for a `params` tail, the element type
    pub ty: ValueType,
    pub variadic: bool,
}

impl ParameterInfo {
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        ParameterInfo {
            name: name.into(),
            ty,
            variadic: false,
        }
    }

    /// A `params` tail collecting trailing arguments into a list.
    pub fn params(name: impl Into<String>, element: ValueType) -> Self {
        ParameterInfo {
            name: name.into(),
            ty: element,
            variadic: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Instance,
    Static,
    /// Static method whose first parameter is the receiver
    Extension,
}

pub struct MethodInfo {
    pub name: String,
    pub parameters: Vec<ParameterInfo>,
    pub return_type: ValueType,
    pub kind: MethodKind,
    invoker: Invoker,
}

impl MethodInfo {
    fn with_kind(
        kind: MethodKind,
        name: impl Into<String>,
        parameters: Vec<ParameterInfo>,
        return_type: ValueType,
        invoker: impl Fn(&Value, &[Value]) -> Result<Value, BindingError> + Send + Sync + 'static,
    ) -> Arc<MethodInfo> {
        Arc::new(MethodInfo {
            name: name.into(),
            parameters,
            return_type,
            kind,
            invoker: Arc::new(invoker),
        })
    }

    pub fn instance(
        name: impl Into<String>,
        parameters: Vec<ParameterInfo>,
        return_type: ValueType,
        invoker: impl Fn(&Value, &[Value]) -> Result<Value, BindingError> + Send + Sync + 'static,
    ) -> Arc<MethodInfo> {
        Self::with_kind(MethodKind::Instance, name, parameters, return_type, invoker)
    }

    pub fn static_method(
        name: impl Into<String>,
        parameters: Vec<ParameterInfo>,
        return_type: ValueType,
        invoker: impl Fn(&[Value]) -> Result<Value, BindingError> + Send + Sync + 'static,
    ) -> Arc<MethodInfo> {
        Self::with_kind(
            MethodKind::Static,
            name,
            parameters,
            return_type,
            move |_, args| invoker(args),
        )
    }

    pub fn extension(
        name: impl Into<String>,
        parameters: Vec<ParameterInfo>,
        return_type: ValueType,
        invoker: impl Fn(&[Value]) -> Result<Value, BindingError> + Send + Sync + 'static,
    ) -> Arc<MethodInfo> {
        Self::with_kind(
            MethodKind::Extension,
            name,
            parameters,
            return_type,
            move |_, args| invoker(args),
        )
    }

    pub fn invoke(&self, target: &Value, args: &[Value]) -> Result<Value, BindingError> {
        (self.invoker)(target, args)
    }

    pub fn is_variadic(&self) -> bool {
        self.parameters.last().is_some_and(|p| p.variadic)
    }
}

impl fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| {
                if p.variadic {
                    format!("params {}[]", p.ty)
                } else {
                    p.ty.to_string()
                }
            })
            .collect();
        write!(f, "{}({}) -> {}", self.name, params.join(", "), self.return_type)
    }
}

/// Reflection descriptor of a host type.
#[derive(Debug)]
pub struct TypeInfo {
    pub name: String,
    pub base: Option<Arc<TypeInfo>>,
    /// The type's instances also answer [`DynamicMember`]
    pub dynamic: bool,
    properties: Vec<Arc<PropertyInfo>>,
    methods: Vec<Arc<MethodInfo>>,
    indexers: Vec<Arc<MethodInfo>>,
}

impl TypeInfo {
    pub fn builder(name: impl Into<String>) -> TypeInfoBuilder {
        TypeInfoBuilder {
            info: TypeInfo {
                name: name.into(),
                base: None,
                dynamic: false,
                properties: vec![],
                methods: vec![],
                indexers: vec![],
            },
        }
    }

    /// True if `self` is `other` or inherits from it.
    pub fn derives_from(&self, other: &TypeInfo) -> bool {
        let mut current = Some(self);
        while let Some(info) = current {
            if info.name == other.name {
                return true;
            }
            current = info.base.as_deref();
        }
        false
    }

    fn hierarchy(&self) -> impl Iterator<Item = &TypeInfo> {
        std::iter::successors(Some(self), |info| info.base.as_deref())
    }

    pub fn property(&self, name: &str) -> Option<Arc<PropertyInfo>> {
        self.hierarchy()
            .find_map(|info| info.properties.iter().find(|p| p.name == name))
            .cloned()
    }

    /// Methods named `name` across the hierarchy; a derived overload with the
    /// same signature hides the base one.
    pub fn methods(&self, name: &str) -> Vec<Arc<MethodInfo>> {
        let mut result: Vec<Arc<MethodInfo>> = vec![];
        for info in self.hierarchy() {
            for method in info.methods.iter().filter(|m| m.name == name) {
                let hidden = result.iter().any(|m| {
                    m.parameters.len() == method.parameters.len()
                        && m
                            .parameters
                            .iter()
                            .zip(&method.parameters)
                            .all(|(a, b)| a.ty == b.ty && a.variadic == b.variadic)
                });
                if !hidden {
                    result.push(method.clone());
                }
            }
        }
        result
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.hierarchy()
            .any(|info| info.methods.iter().any(|m| m.name == name))
    }

    /// Extension methods declared by this type.
    pub fn extensions(&self, name: &str) -> impl Iterator<Item = &Arc<MethodInfo>> {
        self.methods
            .iter()
            .filter(move |m| m.kind == MethodKind::Extension && m.name == name)
    }

    /// `Item` indexers across the hierarchy.
    pub fn indexers(&self) -> Vec<Arc<MethodInfo>> {
        self.hierarchy()
            .flat_map(|info| info.indexers.iter().cloned())
            .collect()
    }
}

pub struct TypeInfoBuilder {
    info: TypeInfo,
}

impl TypeInfoBuilder {
    pub fn base(mut self, base: Arc<TypeInfo>) -> Self {
        self.info.base = Some(base);
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.info.dynamic = true;
        self
    }

    pub fn property(
        mut self,
        name: impl Into<String>,
        ty: ValueType,
        getter: impl Fn(&Value) -> Result<Value, BindingError> + Send + Sync + 'static,
    ) -> Self {
        self.info.properties.push(Arc::new(PropertyInfo {
            name: name.into(),
            ty,
            is_static: false,
            getter: Arc::new(getter),
        }));
        self
    }

    pub fn static_property(
        mut self,
        name: impl Into<String>,
        ty: ValueType,
        getter: impl Fn() -> Result<Value, BindingError> + Send + Sync + 'static,
    ) -> Self {
        self.info.properties.push(Arc::new(PropertyInfo {
            name: name.into(),
            ty,
            is_static: true,
            getter: Arc::new(move |_| getter()),
        }));
        self
    }

    pub fn method(mut self, method: Arc<MethodInfo>) -> Self {
        self.info.methods.push(method);
        self
    }

    /// Adds an `Item` indexer; the invoker receives the target and the index arguments.
    pub fn indexer(
        mut self,
        parameters: Vec<ParameterInfo>,
        return_type: ValueType,
        invoker: impl Fn(&Value, &[Value]) -> Result<Value, BindingError> + Send + Sync + 'static,
    ) -> Self {
        self.info
            .indexers
            .push(MethodInfo::instance("Item", parameters, return_type, invoker));
        self
    }

    pub fn build(self) -> Arc<TypeInfo> {
        Arc::new(self.info)
    }
}

/// Dynamic member protocol for objects without (complete) static reflection.
pub trait DynamicMember {
    fn get_member(&self, name: &str, args: &[Value]) -> Result<Value, BindingError>;

    fn get_index(&self, args: &[Value]) -> Result<Value, BindingError>;

    fn invoke_member(
        &self,
        name: &str,
        args: &[Value],
        type_args: &[ValueType],
    ) -> Result<Value, BindingError>;
}

/// A host object flowing through expressions.
pub trait HostObject: Send + Sync + fmt::Debug {
    /// Static reflection; `None` for purely dynamic objects.
    fn type_info(&self) -> Option<Arc<TypeInfo>> {
        None
    }

    fn as_dynamic(&self) -> Option<&dyn DynamicMember> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// Map-backed dynamic object; members are whatever keys were set.
#[derive(Debug, Default)]
pub struct PropertyBag {
    values: RwLock<HashMap<String, Value>>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.write().insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.read().get(name).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn missing(&self, member: &str) -> BindingError {
        ResolutionError::new(
            ResolutionErrorKind::MemberNotFound {
                type_name: "object".to_string(),
                member: member.to_string(),
            },
            member,
        )
        .into()
    }
}

impl DynamicMember for PropertyBag {
    fn get_member(&self, name: &str, _args: &[Value]) -> Result<Value, BindingError> {
        self.get(name).ok_or_else(|| self.missing(name))
    }

    fn get_index(&self, args: &[Value]) -> Result<Value, BindingError> {
        match args {
            [key] => {
                let key = key.display_string();
                Ok(self.get(&key).unwrap_or(Value::Null))
            }
            _ => Err(self.missing("[]")),
        }
    }

    fn invoke_member(
        &self,
        name: &str,
        args: &[Value],
        _type_args: &[ValueType],
    ) -> Result<Value, BindingError> {
        match self.get(name) {
            Some(Value::Function(function)) => function.call(args),
            _ => Err(self.missing(name)),
        }
    }
}

impl HostObject for PropertyBag {
    fn as_dynamic(&self) -> Option<&dyn DynamicMember> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_ranks() {
        assert_eq!(
            ValueType::Int32.conversion_from(&ValueType::Int32),
            Some(Conversion::Exact)
        );
        assert_eq!(
            ValueType::Int64.conversion_from(&ValueType::Int32),
            Some(Conversion::Implicit)
        );
        assert_eq!(
            ValueType::Object.conversion_from(&ValueType::Int32),
            Some(Conversion::Implicit)
        );
        assert_eq!(ValueType::Int32.conversion_from(&ValueType::Float64), None);
        assert_eq!(ValueType::Int32.conversion_from(&ValueType::Object), None);
        assert_eq!(
            ValueType::String.conversion_from(&ValueType::Object),
            Some(Conversion::Cast)
        );
        assert_eq!(ValueType::Int32.conversion_from(&ValueType::Null), None);
    }

    #[test]
    fn test_class_hierarchy() {
        let animal = TypeInfo::builder("Animal").build();
        let dog = TypeInfo::builder("Dog").base(animal.clone()).build();
        let animal_ty = ValueType::Class(animal);
        let dog_ty = ValueType::Class(dog);
        assert_eq!(animal_ty.conversion_from(&dog_ty), Some(Conversion::Implicit));
        assert_eq!(dog_ty.conversion_from(&animal_ty), Some(Conversion::Cast));
    }
}
