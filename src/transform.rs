//! # Rewrite pipeline
//!
//! The parser's raw tree goes through four passes, always in this order:
//!
//! 1. [`macros`] - `$self`, `$context`, `$args`, `$binding`, `$OneTime(..)`,
//!    `$Relative(..)` / `$Element(..)`, static type references and method
//!    aliases
//! 2. [`null_conditional`] - `A?.B` chains become guarded calls
//! 3. [`relative_source`] - member and constant-index chains after a
//!    relative source or resource merge into its path
//! 4. [`members`] - every distinct source path becomes one binding member
//!
//! The result is classified so that pass-through bindings skip the
//! compiler:
//!
//! ```text
//! Name            -> SourceShape::Member(0)
//! !IsBusy         -> SourceShape::InverseMember(0)
//! $Format(Price)  -> SourceShape::ResourceMethod { member: Some(0) }
//! A + B           -> SourceShape::Expression
//! ```

pub mod macros;
pub mod members;
pub mod null_conditional;
pub mod relative_source;

use log::trace;

use crate::{
    ast::{BindingMemberDescriptor, Expr, UnaryOp},
    context::BindingContext,
    error::BindingError,
    parser::ParserOptions,
    resources::ResourceResolver,
    value::Value,
};

/// Fixed shapes that do not need a compiled evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceShape {
    Constant(Value),
    Member(usize),
    /// `!member`
    InverseMember(usize),
    /// `$name()` or `$name(member)`
    ResourceMethod {
        name: String,
        member: Option<usize>,
    },
    Expression,
}

/// A fully rewritten source expression.
#[derive(Debug, Clone)]
pub struct Transformed {
    pub expression: Expr,
    pub members: Vec<BindingMemberDescriptor>,
    pub shape: SourceShape,
}

impl Transformed {
    /// True if the expression reads no binding member.
    pub fn is_context_free(&self) -> bool {
        self.members.is_empty()
    }
}

/// Rebuilds `expr` with `f` applied to each direct child.
pub(crate) fn map_children<F>(expr: Expr, f: &mut F) -> Result<Expr, BindingError>
where
    F: FnMut(Expr) -> Result<Expr, BindingError>,
{
    fn boxed<F>(expr: Box<Expr>, f: &mut F) -> Result<Box<Expr>, BindingError>
    where
        F: FnMut(Expr) -> Result<Expr, BindingError>,
    {
        f(*expr).map(Box::new)
    }

    fn optional<F>(expr: Option<Box<Expr>>, f: &mut F) -> Result<Option<Box<Expr>>, BindingError>
    where
        F: FnMut(Expr) -> Result<Expr, BindingError>,
    {
        expr.map(|e| boxed(e, f)).transpose()
    }

    fn all<F>(exprs: Vec<Expr>, f: &mut F) -> Result<Vec<Expr>, BindingError>
    where
        F: FnMut(Expr) -> Result<Expr, BindingError>,
    {
        exprs.into_iter().map(|e| f(e)).collect()
    }

    Ok(match expr {
        leaf @ (Expr::Constant(_)
        | Expr::Parameter(_)
        | Expr::RelativeSource(_)
        | Expr::Resource(_)
        | Expr::BindingMember(_)) => leaf,
        Expr::Member { target, name } => Expr::Member {
            target: optional(target, f)?,
            name,
        },
        Expr::MethodCall {
            target,
            method,
            args,
        } => Expr::MethodCall {
            target: optional(target, f)?,
            method,
            args: all(args, f)?,
        },
        Expr::Index { target, args } => Expr::Index {
            target: optional(target, f)?,
            args: all(args, f)?,
        },
        Expr::Unary { op, operand } => Expr::Unary {
            op,
            operand: boxed(operand, f)?,
        },
        Expr::Binary { op, left, right } => Expr::Binary {
            op,
            left: boxed(left, f)?,
            right: boxed(right, f)?,
        },
        Expr::Conditional {
            condition,
            if_true,
            if_false,
        } => Expr::Conditional {
            condition: boxed(condition, f)?,
            if_true: boxed(if_true, f)?,
            if_false: boxed(if_false, f)?,
        },
        Expr::Lambda { parameters, body } => Expr::Lambda {
            parameters,
            body: boxed(body, f)?,
        },
        Expr::NullConditional(inner) => Expr::NullConditional(boxed(inner, f)?),
        Expr::ResourceMethod { name, args } => Expr::ResourceMethod {
            name,
            args: all(args, f)?,
        },
    })
}

fn classify(expr: &Expr) -> SourceShape {
    match expr {
        Expr::Constant(value) => SourceShape::Constant(value.clone()),
        Expr::BindingMember(index) => SourceShape::Member(*index),
        Expr::Unary {
            op: UnaryOp::Not,
            operand,
        } => match operand.as_ref() {
            Expr::BindingMember(index) => SourceShape::InverseMember(*index),
            _ => SourceShape::Expression,
        },
        Expr::ResourceMethod { name, args } => match args.as_slice() {
            [] => SourceShape::ResourceMethod {
                name: name.clone(),
                member: None,
            },
            [Expr::BindingMember(index)] => SourceShape::ResourceMethod {
                name: name.clone(),
                member: Some(*index),
            },
            _ => SourceShape::Expression,
        },
        _ => SourceShape::Expression,
    }
}

/// Runs the rewrite passes over parsed expressions.
pub struct Pipeline<'a> {
    options: &'a ParserOptions,
    resolver: &'a dyn ResourceResolver,
    context: &'a BindingContext,
}

impl<'a> Pipeline<'a> {
    /// `context` is the context handed to the resolver for parse-time lookups.
    pub fn new(
        options: &'a ParserOptions,
        resolver: &'a dyn ResourceResolver,
        context: &'a BindingContext,
    ) -> Self {
        Pipeline {
            options,
            resolver,
            context,
        }
    }

    pub fn run(&self, expr: Expr) -> Result<Transformed, BindingError> {
        let expr = macros::MacroExpander::new(self.options, self.resolver, self.context).expand(expr)?;
        trace!("after macro expansion: {}", expr);
        let expr = null_conditional::NullConditionalLowering::new().desugar(expr)?;
        trace!("after null-conditional lowering: {}", expr);
        let expr = relative_source::merge_paths(expr)?;
        trace!("after path merging: {}", expr);
        let mut extractor = members::MemberExtractor::new();
        let expr = extractor.extract(expr)?;
        let members = extractor.into_members();
        trace!("after member extraction: {} with {} member(s)", expr, members.len());
        let shape = classify(&expr);
        Ok(Transformed {
            expression: expr,
            members,
            shape,
        })
    }
}
