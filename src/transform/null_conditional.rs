//! Null-conditional lowering.
//!
//! ```text
//! A?.B.C     ->  A.?.($guard0 => $guard0.B.C)
//! A?.B?.C    ->  (A.?.($guard1 => $guard1.B)).?.($guard0 => $guard0.C)
//! Items?[0]  ->  Items.?.($guard0 => $guard0[0])
//! ```
//!
//! The guard evaluates its subject once and short-circuits the whole rest of
//! the access chain when it is null.

use crate::{
    ast::{Expr, NULL_GUARD_METHOD},
    error::BindingError,
    transform::map_children,
};

/// Replaces the first null-conditional link along the access chain of
/// `expr` by `param`, returning the rewritten chain and the link's subject.
fn take_guard(expr: Expr, param: &str) -> (Expr, Option<Expr>) {
    fn take_target(target: Box<Expr>, param: &str) -> (Box<Expr>, Option<Expr>) {
        match *target {
            Expr::NullConditional(subject) => (Box::new(Expr::Parameter(param.to_string())), Some(*subject)),
            other => {
                let (target, subject) = take_guard(other, param);
                (Box::new(target), subject)
            }
        }
    }

    match expr {
        Expr::Member {
            target: Some(target),
            name,
        } => {
            let (target, subject) = take_target(target, param);
            (
                Expr::Member {
                    target: Some(target),
                    name,
                },
                subject,
            )
        }
        Expr::MethodCall {
            target: Some(target),
            method,
            args,
        } if method != NULL_GUARD_METHOD => {
            let (target, subject) = take_target(target, param);
            (
                Expr::MethodCall {
                    target: Some(target),
                    method,
                    args,
                },
                subject,
            )
        }
        Expr::Index {
            target: Some(target),
            args,
        } => {
            let (target, subject) = take_target(target, param);
            (
                Expr::Index {
                    target: Some(target),
                    args,
                },
                subject,
            )
        }
        other => (other, None),
    }
}

#[derive(Debug, Default)]
pub struct NullConditionalLowering {
    next_guard: usize,
}

impl NullConditionalLowering {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn desugar(&mut self, expr: Expr) -> Result<Expr, BindingError> {
        let param = format!("$guard{}", self.next_guard);
        match take_guard(expr, &param) {
            (body, Some(subject)) => {
                self.next_guard += 1;
                let body = self.desugar(body)?;
                let subject = self.desugar(subject)?;
                Ok(Expr::MethodCall {
                    target: Some(Box::new(subject)),
                    method: NULL_GUARD_METHOD.to_string(),
                    args: vec![Expr::Lambda {
                        parameters: vec![param],
                        body: Box::new(body),
                    }],
                })
            }
            (expr, None) => map_children(expr, &mut |child| self.desugar(child)),
        }
    }
}
