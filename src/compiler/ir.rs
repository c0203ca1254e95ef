//! Typed intermediate representation and its evaluation.
//!
//! Every [`Node`] carries the static type the compiler inferred for it. Calls
//! resolved at compile time are [`NodeKind::Call`]; calls, members and
//! indexers whose receiver is only known at evaluation time are the
//! `Dynamic*` variants and go through [`super::members`].

use std::sync::Arc;

use crate::{
    ast::{BinaryOp, MemberPath, UnaryOp},
    compiler::{members, operators},
    context::{BindingContext, keys},
    error::{BindingError, ResolutionError, ResolutionErrorKind},
    resources::ResourceResolver,
    types::{MethodInfo, PropertyInfo, TypeInfo, ValueType},
    value::{Function, Value},
};

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub ty: ValueType,
}

/// Receiver of a call dispatched at evaluation time.
#[derive(Debug, Clone)]
pub enum Receiver {
    Instance(Box<Node>),
    Static(Arc<TypeInfo>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextValue {
    EventArgs,
    Binding,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Constant(Value),
    /// Value of the `n`-th binding member
    Source(usize),
    /// Lambda parameter or null-guarded value in slot `n`
    Local(usize),
    /// Packs its items into a list (`params` tails)
    List(Vec<Node>),
    Property {
        target: Box<Node>,
        property: Arc<PropertyInfo>,
    },
    StaticProperty(Arc<PropertyInfo>),
    Call {
        method: Arc<MethodInfo>,
        /// Receiver of an instance method; extension receivers are the first argument
        target: Option<Box<Node>>,
        args: Vec<Node>,
    },
    DynamicMember {
        target: Box<Node>,
        name: String,
    },
    DynamicCall {
        receiver: Receiver,
        name: String,
        args: Vec<Node>,
    },
    DynamicIndex {
        target: Box<Node>,
        args: Vec<Node>,
    },
    /// Evaluation-time conversion (widening or checked cast)
    Convert(Box<Node>),
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Conditional {
        condition: Box<Node>,
        if_true: Box<Node>,
        if_false: Box<Node>,
    },
    Lambda {
        arity: usize,
        /// First local slot of the parameters
        base: usize,
        body: Arc<Node>,
    },
    /// Evaluates `body` with the subject in `slot` unless the subject is null
    NullGuard {
        subject: Box<Node>,
        slot: usize,
        body: Box<Node>,
        default: Value,
    },
    Context(ContextValue),
    OneTime {
        id: String,
        body: Box<Node>,
    },
    ResourceMethod {
        name: String,
        args: Vec<Node>,
    },
    StaticResource {
        name: String,
        path: MemberPath,
    },
}

impl Node {
    pub fn new(kind: NodeKind, ty: ValueType) -> Self {
        Node { kind, ty }
    }

    pub fn constant(value: Value) -> Self {
        let ty = value.value_type();
        Node::new(NodeKind::Constant(value), ty)
    }

    /// Wraps the node so its value is converted to `ty` at evaluation time.
    pub fn convert(self, ty: ValueType) -> Self {
        if self.ty == ty {
            return self;
        }
        Node::new(NodeKind::Convert(Box::new(self)), ty)
    }
}

/// State of one evaluation.
pub struct Env {
    pub context: BindingContext,
    pub values: Arc<[Value]>,
    pub locals: Vec<Value>,
    pub resolver: Arc<dyn ResourceResolver>,
}

fn eval_all(nodes: &[Node], env: &mut Env) -> Result<Vec<Value>, BindingError> {
    nodes.iter().map(|node| node.evaluate(env)).collect()
}

fn condition(value: Value) -> Result<bool, BindingError> {
    value.as_bool().ok_or_else(|| BindingError::InvalidCast {
        from: value.value_type().to_string(),
        to: "bool".to_string(),
    })
}

impl Node {
    pub fn evaluate(&self, env: &mut Env) -> Result<Value, BindingError> {
        match &self.kind {
            NodeKind::Constant(value) => Ok(value.clone()),
            NodeKind::Source(index) => env.values.get(*index).cloned().ok_or_else(|| {
                ResolutionError::new(
                    ResolutionErrorKind::MissingSource(*index),
                    format!("$member{}", index),
                )
                .into()
            }),
            NodeKind::Local(slot) => Ok(env.locals.get(*slot).cloned().unwrap_or(Value::Null)),
            NodeKind::List(items) => eval_all(items, env).map(Value::List),
            NodeKind::Property { target, property } => {
                let target = target.evaluate(env)?;
                if target.is_null() {
                    return Err(BindingError::NullReference(property.name.clone()));
                }
                property.get(&target)
            }
            NodeKind::StaticProperty(property) => property.get(&Value::Null),
            NodeKind::Call {
                method,
                target,
                args,
            } => {
                let target = match target {
                    Some(target) => {
                        let value = target.evaluate(env)?;
                        if value.is_null() {
                            return Err(BindingError::NullReference(method.name.clone()));
                        }
                        value
                    }
                    None => Value::Null,
                };
                let args = eval_all(args, env)?;
                method.invoke(&target, &args)
            }
            NodeKind::DynamicMember { target, name } => {
                let target = target.evaluate(env)?;
                members::get_member(&target, name)
            }
            NodeKind::DynamicCall {
                receiver,
                name,
                args,
            } => {
                let target = match receiver {
                    Receiver::Instance(target) => target.evaluate(env)?,
                    Receiver::Static(info) => Value::Type(ValueType::Class(info.clone())),
                };
                let args = eval_all(args, env)?;
                members::invoke_member(&target, name, args, env.resolver.as_ref())
            }
            NodeKind::DynamicIndex { target, args } => {
                let target = target.evaluate(env)?;
                let args = eval_all(args, env)?;
                members::get_index(&target, args)
            }
            NodeKind::Convert(operand) => operand.evaluate(env)?.convert(&self.ty),
            NodeKind::Unary { op, operand } => operators::apply_unary(*op, &operand.evaluate(env)?),
            NodeKind::Binary { op, left, right } => {
                let left = left.evaluate(env)?;
                match op {
                    BinaryOp::And if !condition(left.clone())? => Ok(Value::Bool(false)),
                    BinaryOp::Or if condition(left.clone())? => Ok(Value::Bool(true)),
                    BinaryOp::Coalesce if !left.is_null() => Ok(left),
                    BinaryOp::Coalesce => right.evaluate(env),
                    op => operators::apply_binary(*op, &left, &right.evaluate(env)?),
                }
            }
            NodeKind::Conditional {
                condition: test,
                if_true,
                if_false,
            } => {
                if condition(test.evaluate(env)?)? {
                    if_true.evaluate(env)
                } else {
                    if_false.evaluate(env)
                }
            }
            NodeKind::Lambda { arity, base, body } => Ok(Value::Function(self.closure(
                *arity,
                *base,
                body.clone(),
                env,
            ))),
            NodeKind::NullGuard {
                subject,
                slot,
                body,
                default,
            } => {
                let subject = subject.evaluate(env)?;
                if subject.is_null() {
                    return Ok(default.clone());
                }
                env.locals.truncate(*slot);
                env.locals.push(subject);
                let result = body.evaluate(env);
                env.locals.truncate(*slot);
                result
            }
            NodeKind::Context(ContextValue::EventArgs) => {
                Ok(env.context.get(keys::EVENT_ARGS).unwrap_or(Value::Null))
            }
            NodeKind::Context(ContextValue::Binding) => {
                Ok(env.context.get(keys::BINDING).unwrap_or(Value::Null))
            }
            NodeKind::OneTime { id, body } => {
                let context = env.context.clone();
                context.one_time(id, || body.evaluate(env))
            }
            NodeKind::ResourceMethod { name, args } => {
                let args = eval_all(args, env)?;
                let method = env
                    .resolver
                    .resolve_method(name, &env.context, true)?
                    .ok_or_else(|| {
                        BindingError::from(ResolutionError::new(
                            ResolutionErrorKind::ResourceNotFound(name.clone()),
                            format!("${}", name),
                        ))
                    })?;
                method.invoke(&args, &env.context)
            }
            NodeKind::StaticResource { name, path } => {
                let root = env
                    .resolver
                    .resolve_object(name, &env.context, true)?
                    .unwrap_or(Value::Null);
                members::walk(root, path)
            }
        }
    }

    /// Closure over the current evaluation, invoked later by host code.
    fn closure(&self, arity: usize, base: usize, body: Arc<Node>, env: &Env) -> Function {
        let captured: Vec<Value> = env.locals.iter().take(base).cloned().collect();
        let context = env.context.clone();
        let values = env.values.clone();
        let resolver = env.resolver.clone();
        Function::new(arity, move |args| {
            if args.len() != arity {
                return Err(BindingError::host(format!(
                    "lambda expects {} argument(s), got {}",
                    arity,
                    args.len()
                )));
            }
            let mut locals = captured.clone();
            locals.extend(args.iter().cloned());
            let mut env = Env {
                context: context.clone(),
                values: values.clone(),
                locals,
                resolver: resolver.clone(),
            };
            body.evaluate(&mut env)
        })
    }
}
