//! Binding configuration context.
//!
//! Configuration actions produced by the parser write into a
//! [`BindingContext`]; the host reads the assembled binding back out of it
//! through the well-known [`keys`].

use std::{
    any::Any,
    collections::HashMap,
    fmt,
    marker::PhantomData,
    sync::Arc,
};

use log::trace;
use parking_lot::{Mutex, RwLock};

use crate::{
    ast::BindingMemberDescriptor,
    compiler::CompiledExpression,
    error::{BindingError, ResolutionError, ResolutionErrorKind},
    resources::ResourceResolver,
    types::HostObject,
    value::Value,
};

/// Deferred write into a binding context.
pub type ConfigAction = Arc<dyn Fn(&BindingContext) -> Result<(), BindingError> + Send + Sync>;

/// Typed key into a [`BindingContext`].
pub struct ContextKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ContextKey<T> {
    pub const fn new(name: &'static str) -> Self {
        ContextKey {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for ContextKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ContextKey<T> {}

impl<T> fmt::Debug for ContextKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextKey({})", self.name)
    }
}

/// Keys written by configuration actions or read by the engine.
pub mod keys {
    use std::sync::Arc;

    use super::{BindingBehavior, BindingMode, BindingSource, ContextKey, ParameterValue, SourceLocator, ValueConverter};
    use crate::{ast::MemberPath, value::Value};

    pub const TARGET_PATH: ContextKey<MemberPath> = ContextKey::new("TargetPath");
    /// The object owning the target property; root of `$self`
    pub const TARGET: ContextKey<Value> = ContextKey::new("Target");
    /// Root of plain source paths
    pub const DATA_CONTEXT: ContextKey<Value> = ContextKey::new("DataContext");
    /// The binding currently being built, exposed through `$binding`
    pub const BINDING: ContextKey<Value> = ContextKey::new("Binding");
    /// Arguments of the event being handled, exposed through `$args`
    pub const EVENT_ARGS: ContextKey<Value> = ContextKey::new("EventArgs");
    pub const SOURCE_LOCATOR: ContextKey<Arc<dyn SourceLocator>> = ContextKey::new("SourceLocator");

    pub const SOURCE: ContextKey<BindingSource> = ContextKey::new("Source");
    pub const MODE: ContextKey<BindingMode> = ContextKey::new("Mode");
    pub const CONVERTER: ContextKey<Arc<dyn ValueConverter>> = ContextKey::new("Converter");
    pub const CONVERTER_PARAMETER: ContextKey<ParameterValue> = ContextKey::new("ConverterParameter");
    pub const CONVERTER_CULTURE: ContextKey<ParameterValue> = ContextKey::new("ConverterCulture");
    pub const FALLBACK: ContextKey<ParameterValue> = ContextKey::new("Fallback");
    pub const TARGET_NULL_VALUE: ContextKey<ParameterValue> = ContextKey::new("TargetNullValue");
    pub const COMMAND_PARAMETER: ContextKey<ParameterValue> = ContextKey::new("CommandParameter");
    /// Milliseconds
    pub const DELAY: ContextKey<u32> = ContextKey::new("Delay");
    /// Milliseconds
    pub const TARGET_DELAY: ContextKey<u32> = ContextKey::new("TargetDelay");
    pub const BEHAVIORS: ContextKey<Vec<Arc<dyn BindingBehavior>>> = ContextKey::new("Behaviors");
}

#[derive(Default)]
struct ContextState {
    values: RwLock<HashMap<&'static str, Arc<dyn Any + Send + Sync>>>,
    one_time: Mutex<HashMap<String, Value>>,
}

/// Associative store that configuration actions write into.
///
/// Cloning is cheap; clones share the same store. Lambdas created during
/// evaluation keep a clone so they can still reach the context when invoked
/// later.
#[derive(Clone, Default)]
pub struct BindingContext {
    state: Arc<ContextState>,
}

impl BindingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<T: Send + Sync + 'static>(&self, key: ContextKey<T>, value: T) {
        trace!("context: set {}", key.name);
        self.state.values.write().insert(key.name, Arc::new(value));
    }

    /// Builder form of [`BindingContext::add`].
    pub fn with<T: Send + Sync + 'static>(self, key: ContextKey<T>, value: T) -> Self {
        self.add(key, value);
        self
    }

    pub fn get<T: Clone + 'static>(&self, key: ContextKey<T>) -> Option<T> {
        self.state
            .values
            .read()
            .get(key.name)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    pub fn contains<T>(&self, key: ContextKey<T>) -> bool {
        self.state.values.read().contains_key(key.name)
    }

    pub fn remove<T>(&self, key: ContextKey<T>) -> bool {
        self.state.values.write().remove(key.name).is_some()
    }

    /// Appends to a list-valued entry, creating it if absent.
    pub fn push<T: Clone + Send + Sync + 'static>(&self, key: ContextKey<Vec<T>>, item: T) {
        let mut values = self.state.values.write();
        let mut list = values
            .get(key.name)
            .and_then(|value| value.downcast_ref::<Vec<T>>())
            .cloned()
            .unwrap_or_default();
        list.push(item);
        values.insert(key.name, Arc::new(list));
    }

    /// Names of the keys currently set, sorted.
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<&'static str> = self.state.values.read().keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Value memoized under `id`, computing it on first use.
    ///
    /// The store is not locked while `compute` runs, so nested memoized
    /// expressions are allowed; the first stored value wins.
    pub fn one_time(
        &self,
        id: &str,
        compute: impl FnOnce() -> Result<Value, BindingError>,
    ) -> Result<Value, BindingError> {
        if let Some(value) = self.state.one_time.lock().get(id) {
            return Ok(value.clone());
        }
        let value = compute()?;
        Ok(self
            .state
            .one_time
            .lock()
            .entry(id.to_string())
            .or_insert(value)
            .clone())
    }
}

impl fmt::Debug for BindingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingContext")
            .field("keys", &self.keys())
            .finish()
    }
}

/// Direction of data flow of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingMode {
    Default,
    TwoWay,
    OneWay,
    OneTime,
    OneWayToSource,
}

/// Converts source values before they reach the target.
pub trait ValueConverter: Send + Sync + fmt::Debug {
    fn convert(
        &self,
        value: &Value,
        parameter: &Value,
        context: &BindingContext,
    ) -> Result<Value, BindingError>;

    fn convert_back(
        &self,
        value: &Value,
        _parameter: &Value,
        _context: &BindingContext,
    ) -> Result<Value, BindingError> {
        Ok(value.clone())
    }
}

/// Negates booleans both ways; null passes through.
#[derive(Debug, Default, Clone, Copy)]
pub struct InverseBooleanConverter;

impl InverseBooleanConverter {
    fn invert(value: &Value) -> Result<Value, BindingError> {
        match value {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            Value::Null | Value::Unset => Ok(value.clone()),
            other => Err(BindingError::InvalidCast {
                from: other.value_type().to_string(),
                to: "bool".to_string(),
            }),
        }
    }
}

impl ValueConverter for InverseBooleanConverter {
    fn convert(&self, value: &Value, _: &Value, _: &BindingContext) -> Result<Value, BindingError> {
        Self::invert(value)
    }

    fn convert_back(&self, value: &Value, _: &Value, _: &BindingContext) -> Result<Value, BindingError> {
        Self::invert(value)
    }
}

/// A converter carried as a value, so that `Converter=` can take any
/// source expression (`Converter=$$Shared`, `Converter=Settings.Price`).
#[derive(Debug, Clone)]
pub struct ConverterObject(pub Arc<dyn ValueConverter>);

impl ConverterObject {
    /// The converter held by `value`, if it holds one.
    pub fn from_value(value: &Value) -> Option<Arc<dyn ValueConverter>> {
        match value {
            Value::Object(object) => object
                .as_any()
                .downcast_ref::<ConverterObject>()
                .map(|converter| converter.0.clone()),
            _ => None,
        }
    }
}

impl HostObject for ConverterObject {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Value {
    pub fn converter(converter: impl ValueConverter + 'static) -> Value {
        Value::object(ConverterObject(Arc::new(converter)))
    }
}

/// A named behavior attached to a binding through an unknown clause
/// (`ValidatesOnErrors=true`).
pub trait BindingBehavior: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;
}

/// Behavior that only records its name and flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagBehavior {
    pub name: String,
    pub enabled: bool,
}

impl BindingBehavior for FlagBehavior {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Finds the roots of relative and element sources in the host's element tree.
pub trait SourceLocator: Send + Sync {
    fn find_ancestor(&self, target: &Value, type_name: &str, level: u32) -> Option<Value>;

    fn find_element(&self, target: &Value, name: &str) -> Option<Value>;
}

/// Where the value of a binding comes from.
#[derive(Clone)]
pub enum BindingSource {
    /// A single source path, used as is
    Member(BindingMemberDescriptor),
    /// A single source path (or none) passed through a converter
    Converted {
        member: Option<BindingMemberDescriptor>,
        converter: Arc<dyn ValueConverter>,
    },
    /// General expression over its extracted members
    Expression(Arc<CompiledExpression>),
    Constant(Value),
}

impl BindingSource {
    /// Binding members whose values [`BindingSource::evaluate`] expects, in order.
    pub fn members(&self) -> &[BindingMemberDescriptor] {
        match self {
            BindingSource::Member(member) => std::slice::from_ref(member),
            BindingSource::Converted {
                member: Some(member),
                ..
            } => std::slice::from_ref(member),
            BindingSource::Converted { member: None, .. } | BindingSource::Constant(_) => &[],
            BindingSource::Expression(expression) => expression.members(),
        }
    }

    pub fn evaluate(&self, context: &BindingContext, values: &[Value]) -> Result<Value, BindingError> {
        let first = || {
            values.first().cloned().ok_or_else(|| {
                BindingError::from(ResolutionError::new(
                    ResolutionErrorKind::MissingSource(0),
                    "$member0",
                ))
            })
        };
        match self {
            BindingSource::Member(_) => first(),
            BindingSource::Converted { member, converter } => {
                let input = match member {
                    Some(_) => first()?,
                    None => Value::Null,
                };
                converter.convert(&input, &Value::Null, context)
            }
            BindingSource::Expression(expression) => expression.evaluate(context, values),
            BindingSource::Constant(value) => Ok(value.clone()),
        }
    }

    /// Resolves every member against `context` and evaluates.
    pub fn evaluate_in(
        &self,
        context: &BindingContext,
        resolver: &dyn ResourceResolver,
    ) -> Result<Value, BindingError> {
        let values = self
            .members()
            .iter()
            .map(|member| member.resolve(context, resolver))
            .collect::<Result<Vec<_>, _>>()?;
        self.evaluate(context, &values)
    }
}

impl fmt::Debug for BindingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingSource::Member(member) => write!(f, "Member({})", member.key),
            BindingSource::Converted { member, converter } => match member {
                Some(member) => write!(f, "Converted({}, {:?})", member.key, converter),
                None => write!(f, "Converted({:?})", converter),
            },
            BindingSource::Expression(expression) => {
                write!(f, "Expression({})", expression.expression())
            }
            BindingSource::Constant(value) => write!(f, "Constant({})", value.literal()),
        }
    }
}

/// Value of a parameter-like clause (`Fallback`, `ConverterParameter`, ...).
#[derive(Debug, Clone)]
pub enum ParameterValue {
    /// Literal, or an expression without members evaluated at bind time
    Constant(Value),
    /// Expression over source members, produced per context
    PerContext(BindingSource),
}

impl ParameterValue {
    pub fn value(
        &self,
        context: &BindingContext,
        resolver: &dyn ResourceResolver,
    ) -> Result<Value, BindingError> {
        match self {
            ParameterValue::Constant(value) => Ok(value.clone()),
            ParameterValue::PerContext(source) => source.evaluate_in(context, resolver),
        }
    }
}

