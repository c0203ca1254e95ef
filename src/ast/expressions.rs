use std::fmt;

use crate::{
    ast::{BinaryOp, RelativeSource, Resource, UnaryOp},
    value::Value,
};

/// Name of the synthetic call emitted for a null-conditional link.
///
/// `A?.B` becomes `A.?.(p => p.B)`; the compiler treats the call as a guard.
pub const NULL_GUARD_METHOD: &str = "?.";

/// Reserved parameter naming the binding context inside an expression.
///
/// Macros such as `$binding` expand to calls on this parameter.
pub const CONTEXT_PARAMETER: &str = "$context";

/// Abstract Syntax Tree node of a binding expression.
///
/// Each node owns its children. Rewrite passes build new trees; only the
/// merged path of relative-source and resource nodes grows in place.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value, or a static type reference (`Value::Type`)
    ///
    /// # Example
    /// ```text
    /// 42
    /// "text"
    /// Math
    /// ```
    Constant(Value),

    /// Lambda-bound identifier, or the reserved context parameter
    Parameter(String),

    /// Member access; `target: None` reads from the binding source
    ///
    /// # Example
    /// ```text
    /// Name
    /// User.Name
    /// ```
    Member {
        target: Option<Box<Expr>>,
        name: String,
    },

    /// Method call; `target: None` calls a method on the binding source
    ///
    /// # Example
    /// ```text
    /// Items.Contains(x)
    /// Math.Max(A, B)
    /// ```
    MethodCall {
        target: Option<Box<Expr>>,
        method: String,
        args: Vec<Expr>,
    },

    /// Indexer; `target: None` indexes the binding source
    ///
    /// # Example
    /// ```text
    /// Items[0]
    /// Map["key"]
    /// ```
    Index {
        target: Option<Box<Expr>>,
        args: Vec<Expr>,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// `condition ? if_true : if_false`
    Conditional {
        condition: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },

    /// `x => body`, `(x, y) => body`, `() => body`
    Lambda {
        parameters: Vec<String>,
        body: Box<Expr>,
    },

    /// Subject of a `?.` / `?[` link; removed by null-conditional desugaring
    NullConditional(Box<Expr>),

    /// `{Relative Type}`, `{Element name}`, `$self` with their merged path
    RelativeSource(RelativeSource),

    /// `$name` / `$$name` with its merged path
    Resource(Resource),

    /// `$name(args)`: method resolved through the resource resolver
    ResourceMethod { name: String, args: Vec<Expr> },

    /// Placeholder for the `n`-th extracted binding member
    BindingMember(usize),
}

impl Expr {
    pub fn constant(value: impl Into<Value>) -> Expr {
        Expr::Constant(value.into())
    }

    /// Root-level member `name`.
    pub fn member(name: impl Into<String>) -> Expr {
        Expr::Member {
            target: None,
            name: name.into(),
        }
    }

    pub fn member_of(target: Expr, name: impl Into<String>) -> Expr {
        Expr::Member {
            target: Some(Box::new(target)),
            name: name.into(),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Expr::Constant(_))
    }

    /// Visits the direct children of this node.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Constant(_)
            | Expr::Parameter(_)
            | Expr::RelativeSource(_)
            | Expr::Resource(_)
            | Expr::BindingMember(_) => vec![],
            Expr::Member { target, .. } => target.iter().map(|t| t.as_ref()).collect(),
            Expr::MethodCall { target, args, .. } | Expr::Index { target, args } => target
                .iter()
                .map(|t| t.as_ref())
                .chain(args.iter())
                .collect(),
            Expr::Unary { operand, .. } => vec![operand.as_ref()],
            Expr::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expr::Conditional {
                condition,
                if_true,
                if_false,
            } => vec![condition.as_ref(), if_true.as_ref(), if_false.as_ref()],
            Expr::Lambda { body, .. } => vec![body.as_ref()],
            Expr::NullConditional(inner) => vec![inner.as_ref()],
            Expr::ResourceMethod { args, .. } => args.iter().collect(),
        }
    }

    /// True if any node of the tree satisfies `predicate`.
    pub fn any(&self, predicate: &impl Fn(&Expr) -> bool) -> bool {
        predicate(self) || self.children().into_iter().any(|child| child.any(predicate))
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Constant(value)
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Expr]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", arg)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant(value) => write!(f, "{}", value.literal()),
            Expr::Parameter(name) => f.write_str(name),
            Expr::Member { target: None, name } => f.write_str(name),
            Expr::Member {
                target: Some(target),
                name,
            } => match target.as_ref() {
                Expr::NullConditional(inner) => write!(f, "{}?.{}", inner, name),
                target => write!(f, "{}.{}", target, name),
            },
            Expr::MethodCall {
                target,
                method,
                args,
            } => {
                if let Some(target) = target {
                    write!(f, "{}.", target)?;
                }
                write!(f, "{}(", method)?;
                write_args(f, args)?;
                f.write_str(")")
            }
            Expr::Index { target, args } => {
                match target.as_deref() {
                    Some(Expr::NullConditional(inner)) => write!(f, "{}?", inner)?,
                    Some(target) => write!(f, "{}", target)?,
                    None => {}
                }
                f.write_str("[")?;
                write_args(f, args)?;
                f.write_str("]")
            }
            Expr::Unary { op, operand } => match operand.as_ref() {
                Expr::Binary { .. } | Expr::Conditional { .. } => write!(f, "{}({})", op, operand),
                operand => write!(f, "{}{}", op, operand),
            },
            Expr::Binary { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Expr::Conditional {
                condition,
                if_true,
                if_false,
            } => write!(f, "({} ? {} : {})", condition, if_true, if_false),
            Expr::Lambda { parameters, body } => {
                write!(f, "({}) => {}", parameters.join(", "), body)
            }
            Expr::NullConditional(inner) => write!(f, "{}?", inner),
            Expr::RelativeSource(source) => write!(f, "{}", source),
            Expr::Resource(resource) => write!(f, "{}", resource),
            Expr::ResourceMethod { name, args } => {
                write!(f, "${}(", name)?;
                write_args(f, args)?;
                f.write_str(")")
            }
            Expr::BindingMember(index) => write!(f, "$member{}", index),
        }
    }
}
