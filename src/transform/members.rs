//! Binding-member extraction.
//!
//! Every maximal member chain rooted at the data context, a relative source
//! or a dynamic resource is replaced by a [`Expr::BindingMember`]
//! placeholder. Descriptors live in an arena indexed by position; a side
//! table maps the structural key to that index, so `A.B + A.B` yields one
//! descriptor referenced twice.

use std::collections::HashMap;

use crate::{
    ast::{BindingMemberDescriptor, Expr, MemberKind, MemberPath, PathSegment, ResourceKind},
    error::BindingError,
    transform::{map_children, relative_source::constant_args},
};

fn member_chain(expr: &Expr) -> Option<(MemberKind, MemberPath)> {
    match expr {
        Expr::Member { target: None, name } => Some((
            MemberKind::Path,
            MemberPath::from_segments(vec![PathSegment::Member(name.clone())]),
        )),
        Expr::Member {
            target: Some(target),
            name,
        } => {
            let (kind, mut path) = member_chain(target)?;
            path.push(PathSegment::Member(name.clone()));
            Some((kind, path))
        }
        Expr::Index { target, args } => {
            let values = constant_args(args)?;
            let (kind, mut path) = match target {
                None => (MemberKind::Path, MemberPath::new()),
                Some(target) => member_chain(target)?,
            };
            path.push(PathSegment::Index(values));
            Some((kind, path))
        }
        Expr::RelativeSource(source) => Some((MemberKind::RelativeSource(source.kind.clone()), source.path.clone())),
        Expr::Resource(resource) if resource.kind == ResourceKind::Dynamic => {
            Some((MemberKind::Resource(resource.name.clone()), resource.path.clone()))
        }
        _ => None,
    }
}

fn structural_key(kind: &MemberKind, path: &MemberPath) -> String {
    match kind {
        MemberKind::Path => path.to_string(),
        MemberKind::RelativeSource(kind) => format!("{}|{}", kind, path),
        MemberKind::Resource(name) => format!("${}|{}", name, path),
    }
}

#[derive(Debug, Default)]
pub struct MemberExtractor {
    members: Vec<BindingMemberDescriptor>,
    by_key: HashMap<String, usize>,
}

impl MemberExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, kind: MemberKind, path: MemberPath) -> usize {
        let key = structural_key(&kind, &path);
        if let Some(index) = self.by_key.get(&key) {
            return *index;
        }
        let index = self.members.len();
        self.by_key.insert(key.clone(), index);
        self.members.push(BindingMemberDescriptor {
            name: BindingMemberDescriptor::parameter_name(index),
            key,
            index,
            kind,
            path,
        });
        index
    }

    /// Placeholder for the data context itself.
    fn data_context(&mut self) -> Box<Expr> {
        Box::new(Expr::BindingMember(self.intern(MemberKind::Path, MemberPath::new())))
    }

    pub fn extract(&mut self, expr: Expr) -> Result<Expr, BindingError> {
        if let Some((kind, path)) = member_chain(&expr) {
            return Ok(Expr::BindingMember(self.intern(kind, path)));
        }
        let expr = match expr {
            Expr::MethodCall {
                target: None,
                method,
                args,
            } => Expr::MethodCall {
                target: Some(self.data_context()),
                method,
                args,
            },
            Expr::Index { target: None, args } => Expr::Index {
                target: Some(self.data_context()),
                args,
            },
            other => other,
        };
        map_children(expr, &mut |child| self.extract(child))
    }

    pub fn members(&self) -> &[BindingMemberDescriptor] {
        &self.members
    }

    pub fn into_members(self) -> Vec<BindingMemberDescriptor> {
        self.members
    }
}
