//! Lowering of a rewritten expression tree to typed IR for one shape.

use std::sync::Arc;

use log::trace;

use crate::{
    ast::{BinaryOp, CONTEXT_PARAMETER, Expr, NULL_GUARD_METHOD},
    compiler::{
        ir::{ContextValue, Node, NodeKind, Receiver},
        members, operators,
        overload::{self, Applicable},
    },
    error::{BindingError, ResolutionError, ResolutionErrorKind},
    resources::ResourceResolver,
    types::{MethodKind, TypeInfo, ValueType},
    value::Value,
};

fn unexpected(expr: &Expr) -> BindingError {
    ResolutionError::new(ResolutionErrorKind::UnexpectedExpression, expr.to_string()).into()
}

fn invalid_operator(operator: &str, operands: &[&ValueType], expr: &Expr) -> BindingError {
    ResolutionError::new(
        ResolutionErrorKind::InvalidOperator {
            operator: operator.to_string(),
            operands: operands.iter().map(|t| t.to_string()).collect(),
        },
        expr.to_string(),
    )
    .into()
}

fn method_not_found(type_name: &str, method: &str, expr: &Expr) -> BindingError {
    ResolutionError::new(
        ResolutionErrorKind::MethodNotFound {
            type_name: type_name.to_string(),
            method: method.to_string(),
        },
        expr.to_string(),
    )
    .into()
}

/// Type both branches of `?:` / `??` convert to.
fn common_type(a: &ValueType, b: &ValueType) -> ValueType {
    if a == b || *b == ValueType::Null {
        a.clone()
    } else if *a == ValueType::Null {
        b.clone()
    } else if a.is_assignable_from(b) {
        a.clone()
    } else if b.is_assignable_from(a) {
        b.clone()
    } else {
        ValueType::Object
    }
}

/// Inserts conversions and packs the `params` tail for a chosen overload.
fn bind_arguments(chosen: &Applicable, args: Vec<Node>) -> Vec<Node> {
    let mut bound: Vec<Node> = args
        .into_iter()
        .enumerate()
        .map(|(index, arg)| arg.convert(chosen.parameter_type(index)))
        .collect();
    if chosen.expanded {
        let tail = bound.split_off(chosen.fixed_count());
        bound.push(Node::new(NodeKind::List(tail), ValueType::List));
    }
    bound
}

/// Parses a string constant compared against an enum operand.
fn enum_literal(enum_side: &Node, other: Node, expr: &Expr) -> Result<Node, BindingError> {
    let (ValueType::Enum(info), NodeKind::Constant(Value::String(name))) = (&enum_side.ty, &other.kind)
    else {
        return Ok(other);
    };
    info.parse(name).map(Node::constant).ok_or_else(|| {
        ResolutionError::new(
            ResolutionErrorKind::InvalidEnumMember {
                type_name: info.name.clone(),
                member: name.clone(),
            },
            expr.to_string(),
        )
        .into()
    })
}

pub struct Lowering<'a> {
    shape: &'a [ValueType],
    resolver: &'a dyn ResourceResolver,
    /// Local slots: lambda parameters and null-guarded values
    scope: Vec<(String, ValueType)>,
}

impl<'a> Lowering<'a> {
    pub fn new(shape: &'a [ValueType], resolver: &'a dyn ResourceResolver) -> Self {
        Lowering {
            shape,
            resolver,
            scope: vec![],
        }
    }

    fn lower_all(&mut self, exprs: &[Expr]) -> Result<Vec<Node>, BindingError> {
        exprs.iter().map(|expr| self.lower(expr)).collect()
    }

    pub fn lower(&mut self, expr: &Expr) -> Result<Node, BindingError> {
        match expr {
            Expr::Constant(value) => Ok(Node::constant(value.clone())),
            Expr::Parameter(name) => {
                let slot = self
                    .scope
                    .iter()
                    .rposition(|(local, _)| local == name)
                    .ok_or_else(|| unexpected(expr))?;
                Ok(Node::new(NodeKind::Local(slot), self.scope[slot].1.clone()))
            }
            Expr::BindingMember(index) => match self.shape.get(*index) {
                Some(ty) => Ok(Node::new(NodeKind::Source(*index), ty.clone())),
                None => Err(ResolutionError::new(
                    ResolutionErrorKind::MissingSource(*index),
                    expr.to_string(),
                )
                .into()),
            },
            Expr::Member {
                target: Some(target),
                name,
            } => self.lower_member(target, name, expr),
            Expr::Index {
                target: Some(target),
                args,
            } => self.lower_index(target, args, expr),
            Expr::MethodCall {
                target: Some(target),
                method,
                args,
            } => self.lower_call(target, method, args, expr),
            Expr::Unary { op, operand } => {
                let operand = self.lower(operand)?;
                let ty = operators::unary_type(*op, &operand.ty)
                    .ok_or_else(|| invalid_operator(op.symbol(), &[&operand.ty], expr))?;
                Ok(Node::new(
                    NodeKind::Unary {
                        op: *op,
                        operand: Box::new(operand),
                    },
                    ty,
                ))
            }
            Expr::Binary { op, left, right } => self.lower_binary(*op, left, right, expr),
            Expr::Conditional {
                condition,
                if_true,
                if_false,
            } => {
                let condition = self.lower(condition)?;
                if condition.ty != ValueType::Bool && !condition.ty.is_dynamic() {
                    return Err(invalid_operator("?:", &[&condition.ty], expr));
                }
                let if_true = self.lower(if_true)?;
                let if_false = self.lower(if_false)?;
                let ty = common_type(&if_true.ty, &if_false.ty);
                Ok(Node::new(
                    NodeKind::Conditional {
                        condition: Box::new(condition),
                        if_true: Box::new(if_true),
                        if_false: Box::new(if_false),
                    },
                    ty,
                ))
            }
            Expr::Lambda { parameters, body } => {
                let base = self.scope.len();
                self.scope
                    .extend(parameters.iter().map(|p| (p.clone(), ValueType::Object)));
                let body = self.lower(body);
                self.scope.truncate(base);
                Ok(Node::new(
                    NodeKind::Lambda {
                        arity: parameters.len(),
                        base,
                        body: Arc::new(body?),
                    },
                    ValueType::Function,
                ))
            }
            Expr::Resource(resource) if resource.kind == crate::ast::ResourceKind::Static => {
                Ok(Node::new(
                    NodeKind::StaticResource {
                        name: resource.name.clone(),
                        path: resource.path.clone(),
                    },
                    ValueType::Object,
                ))
            }
            Expr::ResourceMethod { name, args } => {
                let args = self.lower_all(args)?;
                Ok(Node::new(
                    NodeKind::ResourceMethod {
                        name: name.clone(),
                        args,
                    },
                    ValueType::Object,
                ))
            }
            // Root members, relative sources and dynamic resources are
            // extracted into binding members before compilation.
            Expr::Member { target: None, .. }
            | Expr::Index { target: None, .. }
            | Expr::MethodCall { target: None, .. }
            | Expr::NullConditional(_)
            | Expr::RelativeSource(_)
            | Expr::Resource(_) => Err(unexpected(expr)),
        }
    }

    fn lower_member(&mut self, target: &Expr, name: &str, expr: &Expr) -> Result<Node, BindingError> {
        if let Expr::Constant(Value::Type(ty)) = target {
            return match ty {
                ValueType::Enum(info) => info.parse(name).map(Node::constant).ok_or_else(|| {
                    ResolutionError::new(
                        ResolutionErrorKind::InvalidEnumMember {
                            type_name: info.name.clone(),
                            member: name.to_string(),
                        },
                        expr.to_string(),
                    )
                    .into()
                }),
                ValueType::Class(info) => match info.property(name).filter(|p| p.is_static) {
                    Some(property) => {
                        let ty = property.ty.clone();
                        Ok(Node::new(NodeKind::StaticProperty(property), ty))
                    }
                    None => Err(ResolutionError::new(
                        ResolutionErrorKind::MemberNotFound {
                            type_name: info.name.clone(),
                            member: name.to_string(),
                        },
                        expr.to_string(),
                    )
                    .into()),
                },
                _ => Err(unexpected(expr)),
            };
        }

        let target = self.lower(target)?;
        let property = target
            .ty
            .reflect()
            .and_then(|info| info.property(name))
            .filter(|p| !p.is_static);
        if let Some(property) = property {
            let ty = property.ty.clone();
            return Ok(Node::new(
                NodeKind::Property {
                    target: Box::new(target),
                    property,
                },
                ty,
            ));
        }
        if target.ty.is_dynamic() || matches!(target.ty, ValueType::Class(_)) {
            trace!("member '{}' on {} bound dynamically", name, target.ty);
            return Ok(Node::new(
                NodeKind::DynamicMember {
                    target: Box::new(target),
                    name: name.to_string(),
                },
                ValueType::Object,
            ));
        }
        Err(ResolutionError::new(
            ResolutionErrorKind::MemberNotFound {
                type_name: target.ty.to_string(),
                member: name.to_string(),
            },
            expr.to_string(),
        )
        .into())
    }

    fn lower_index(&mut self, target: &Expr, args: &[Expr], expr: &Expr) -> Result<Node, BindingError> {
        let target = self.lower(target)?;
        let args = self.lower_all(args)?;
        let any_dynamic = args.iter().any(|a| a.ty.is_dynamic());

        if !target.ty.is_dynamic() {
            if let Some(info) = target.ty.reflect() {
                let arg_types: Vec<ValueType> = args.iter().map(|a| a.ty.clone()).collect();
                if let Some(chosen) = overload::select(&info.indexers(), &arg_types, &info.name, "Item")? {
                    let ty = chosen.method.return_type.clone();
                    let args = bind_arguments(&chosen, args);
                    return Ok(Node::new(
                        NodeKind::Call {
                            method: chosen.method,
                            target: Some(Box::new(target)),
                            args,
                        },
                        ty,
                    ));
                }
            }
        }
        if target.ty.is_dynamic() || any_dynamic || matches!(target.ty, ValueType::Class(_)) {
            return Ok(Node::new(
                NodeKind::DynamicIndex {
                    target: Box::new(target),
                    args,
                },
                ValueType::Object,
            ));
        }
        Err(ResolutionError::new(
            ResolutionErrorKind::IndexerNotFound {
                type_name: target.ty.to_string(),
            },
            expr.to_string(),
        )
        .into())
    }

    fn lower_context_call(&mut self, method: &str, args: &[Expr], expr: &Expr) -> Result<Node, BindingError> {
        match (method, args) {
            ("GetEventArgs", []) => Ok(Node::new(
                NodeKind::Context(ContextValue::EventArgs),
                ValueType::Object,
            )),
            ("GetBinding", []) => Ok(Node::new(
                NodeKind::Context(ContextValue::Binding),
                ValueType::Object,
            )),
            ("OneTime", [Expr::Constant(Value::String(id)), Expr::Lambda { parameters, body }])
                if parameters.is_empty() =>
            {
                let body = self.lower(body)?;
                let ty = body.ty.clone();
                Ok(Node::new(
                    NodeKind::OneTime {
                        id: id.clone(),
                        body: Box::new(body),
                    },
                    ty,
                ))
            }
            _ => Err(unexpected(expr)),
        }
    }

    fn lower_null_guard(&mut self, target: &Expr, args: &[Expr], expr: &Expr) -> Result<Node, BindingError> {
        let [Expr::Lambda { parameters, body }] = args else {
            return Err(unexpected(expr));
        };
        let [parameter] = parameters.as_slice() else {
            return Err(unexpected(expr));
        };
        let subject = self.lower(target)?;
        let slot = self.scope.len();
        self.scope.push((parameter.clone(), subject.ty.clone()));
        let body = self.lower(body);
        self.scope.truncate(slot);
        let body = body?;
        let default = if body.ty.is_value_type() {
            Value::Unset
        } else {
            Value::Null
        };
        let ty = body.ty.clone();
        Ok(Node::new(
            NodeKind::NullGuard {
                subject: Box::new(subject),
                slot,
                body: Box::new(body),
                default,
            },
            ty,
        ))
    }

    fn lower_static_call(
        &mut self,
        info: &Arc<TypeInfo>,
        method: &str,
        args: &[Expr],
        expr: &Expr,
    ) -> Result<Node, BindingError> {
        let args = self.lower_all(args)?;
        let arg_types: Vec<ValueType> = args.iter().map(|a| a.ty.clone()).collect();
        let candidates: Vec<_> = info
            .methods(method)
            .into_iter()
            .filter(|m| m.kind != MethodKind::Instance)
            .collect();
        if let Some(chosen) = overload::select(&candidates, &arg_types, &info.name, method)? {
            let ty = chosen.method.return_type.clone();
            let args = bind_arguments(&chosen, args);
            return Ok(Node::new(
                NodeKind::Call {
                    method: chosen.method,
                    target: None,
                    args,
                },
                ty,
            ));
        }
        if !candidates.is_empty() && arg_types.iter().any(ValueType::is_dynamic) {
            return Ok(Node::new(
                NodeKind::DynamicCall {
                    receiver: Receiver::Static(info.clone()),
                    name: method.to_string(),
                    args,
                },
                ValueType::Object,
            ));
        }
        Err(method_not_found(&info.name, method, expr))
    }

    fn lower_call(&mut self, target: &Expr, method: &str, args: &[Expr], expr: &Expr) -> Result<Node, BindingError> {
        if matches!(target, Expr::Parameter(name) if name == CONTEXT_PARAMETER) {
            return self.lower_context_call(method, args, expr);
        }
        if method == NULL_GUARD_METHOD {
            return self.lower_null_guard(target, args, expr);
        }
        if let Expr::Constant(Value::Type(ValueType::Class(info))) = target {
            return self.lower_static_call(info, method, args, expr);
        }

        let target = self.lower(target)?;
        let args = self.lower_all(args)?;
        let ty = target.ty.clone();
        let dynamic_call = |target: Node, args: Vec<Node>| {
            trace!("call '{}' on {} bound dynamically", method, ty);
            Node::new(
                NodeKind::DynamicCall {
                    receiver: Receiver::Instance(Box::new(target)),
                    name: method.to_string(),
                    args,
                },
                ValueType::Object,
            )
        };
        if ty.is_dynamic() && !matches!(ty, ValueType::Class(_)) {
            return Ok(dynamic_call(target, args));
        }

        let arg_types: Vec<ValueType> = args.iter().map(|a| a.ty.clone()).collect();
        let (instance, extensions) = members::instance_candidates(&ty, method, self.resolver);
        if let Some(chosen) = overload::select(&instance, &arg_types, ty.name(), method)? {
            let return_type = chosen.method.return_type.clone();
            let args = bind_arguments(&chosen, args);
            return Ok(Node::new(
                NodeKind::Call {
                    method: chosen.method,
                    target: Some(Box::new(target)),
                    args,
                },
                return_type,
            ));
        }

        let mut receiver_types = vec![ty.clone()];
        receiver_types.extend(arg_types.iter().cloned());
        if let Some(chosen) = overload::select(&extensions, &receiver_types, ty.name(), method)? {
            let return_type = chosen.method.return_type.clone();
            let mut all = vec![target];
            all.extend(args);
            let args = bind_arguments(&chosen, all);
            return Ok(Node::new(
                NodeKind::Call {
                    method: chosen.method,
                    target: None,
                    args,
                },
                return_type,
            ));
        }

        if matches!(ty, ValueType::Class(_)) || arg_types.iter().any(ValueType::is_dynamic) {
            return Ok(dynamic_call(target, args));
        }
        Err(method_not_found(ty.name(), method, expr))
    }

    fn lower_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, expr: &Expr) -> Result<Node, BindingError> {
        let left = self.lower(left)?;
        let right = self.lower(right)?;
        let right = enum_literal(&left, right, expr)?;
        let left = enum_literal(&right, left, expr)?;

        let ty = if op == BinaryOp::Coalesce {
            common_type(&left.ty, &right.ty)
        } else {
            operators::binary_type(op, &left.ty, &right.ty)
                .ok_or_else(|| invalid_operator(op.symbol(), &[&left.ty, &right.ty], expr))?
        };
        Ok(Node::new(
            NodeKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
        ))
    }
}
