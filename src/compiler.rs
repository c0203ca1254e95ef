//! # Compiler
//!
//! Turns a rewritten expression tree into evaluators over the values of its
//! binding members.
//!
//! Compilation is deferred and shape-specific: the static types the compiler
//! resolves members and overloads against are the runtime types of the
//! supplied source values. [`CompiledExpression`] keeps one [`Evaluator`] per
//! shape it has seen:
//!
//! ```text
//! evaluate(ctx, [Int32(1)])     -> shape [int]    -> compile, cache, run
//! evaluate(ctx, [Int32(2)])     -> shape [int]    -> cached, run
//! evaluate(ctx, [String("a")])  -> shape [string] -> compile, cache, run
//! ```
//!
//! A shape that fails to compile is not cached and leaves the other entries
//! untouched.

pub mod ir;
pub mod lower;
pub mod members;
pub mod operators;
pub mod overload;

use std::{collections::HashMap, fmt, sync::Arc};

use log::debug;
use parking_lot::Mutex;

use crate::{
    ast::{BindingMemberDescriptor, Expr},
    context::BindingContext,
    error::{BindingError, ResolutionError, ResolutionErrorKind},
    resources::ResourceResolver,
    types::ValueType,
    value::Value,
};

use ir::{Env, Node};
use lower::Lowering;

/// Executable form of an expression for one shape.
#[derive(Debug)]
pub struct Evaluator {
    shape: Vec<ValueType>,
    root: Node,
}

impl Evaluator {
    pub fn shape(&self) -> &[ValueType] {
        &self.shape
    }

    /// Static result type inferred for this shape.
    pub fn return_type(&self) -> &ValueType {
        &self.root.ty
    }

    pub fn root(&self) -> &Node {
        &self.root
    }
}

/// A rewritten expression with its binding members and evaluator cache.
pub struct CompiledExpression {
    expression: Expr,
    members: Vec<BindingMemberDescriptor>,
    resolver: Arc<dyn ResourceResolver>,
    evaluators: Mutex<HashMap<Vec<ValueType>, Arc<Evaluator>>>,
}

impl CompiledExpression {
    pub fn new(
        expression: Expr,
        members: Vec<BindingMemberDescriptor>,
        resolver: Arc<dyn ResourceResolver>,
    ) -> Self {
        CompiledExpression {
            expression,
            members,
            resolver,
            evaluators: Mutex::new(HashMap::new()),
        }
    }

    pub fn expression(&self) -> &Expr {
        &self.expression
    }

    pub fn members(&self) -> &[BindingMemberDescriptor] {
        &self.members
    }

    /// Number of shapes compiled so far.
    pub fn cached_shapes(&self) -> usize {
        self.evaluators.lock().len()
    }

    /// Evaluator for `shape`, compiling it on first use.
    ///
    /// The cache lock is held while compiling, so concurrent first uses of a
    /// shape compile it once.
    pub fn evaluator(&self, shape: &[ValueType]) -> Result<Arc<Evaluator>, BindingError> {
        let mut evaluators = self.evaluators.lock();
        if let Some(evaluator) = evaluators.get(shape) {
            return Ok(evaluator.clone());
        }
        debug!("compiling '{}' for shape {:?}", self.expression, shape);
        let root = Lowering::new(shape, self.resolver.as_ref()).lower(&self.expression)?;
        let evaluator = Arc::new(Evaluator {
            shape: shape.to_vec(),
            root,
        });
        evaluators.insert(shape.to_vec(), evaluator.clone());
        Ok(evaluator)
    }

    /// Evaluates with one value per binding member, in member order.
    pub fn evaluate(&self, context: &BindingContext, values: &[Value]) -> Result<Value, BindingError> {
        if values.len() < self.members.len() {
            return Err(ResolutionError::new(
                ResolutionErrorKind::MissingSource(values.len()),
                BindingMemberDescriptor::parameter_name(values.len()),
            )
            .into());
        }
        let shape: Vec<ValueType> = values.iter().map(Value::value_type).collect();
        let evaluator = self.evaluator(&shape)?;
        let mut env = Env {
            context: context.clone(),
            values: Arc::from(values),
            locals: vec![],
            resolver: self.resolver.clone(),
        };
        evaluator.root.evaluate(&mut env)
    }
}

impl fmt::Debug for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpression")
            .field("expression", &self.expression.to_string())
            .field("members", &self.members.len())
            .field("cached_shapes", &self.cached_shapes())
            .finish()
    }
}
