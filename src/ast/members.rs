use std::fmt;

use crate::value::Value;

/// One step of a member path.
///
/// # Examples
/// - `Items` → `Member("Items")`
/// - `[0]` → `Index([Int32(0)])`
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Member(String),
    Index(Vec<Value>),
}

/// A chain of member and constant-indexer steps, e.g. `User.Items[0].Name`.
///
/// Its textual form is the structural key used to deduplicate binding members.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MemberPath {
    segments: Vec<PathSegment>,
}

impl MemberPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        MemberPath { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }

    /// Appends `other` after this path.
    pub fn extend(&mut self, other: MemberPath) {
        self.segments.extend(other.segments);
    }
}

impl fmt::Display for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Member(name) if i == 0 => write!(f, "{}", name)?,
                PathSegment::Member(name) => write!(f, ".{}", name)?,
                PathSegment::Index(args) => {
                    f.write_str("[")?;
                    for (n, arg) in args.iter().enumerate() {
                        if n > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}", arg.literal())?;
                    }
                    f.write_str("]")?;
                }
            }
        }
        Ok(())
    }
}

/// Where a relative-source reference starts its lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelativeSourceKind {
    /// The binding target itself (`{RelativeSource Self}`, `$self`)
    SelfRef,
    /// The `level`-th logical ancestor of type `type_name`
    Ancestor { type_name: String, level: u32 },
    /// A named element (`{Element name}`)
    Element { name: String },
}

/// Relative or element source with the member path merged onto it.
#[derive(Debug, Clone, PartialEq)]
pub struct RelativeSource {
    pub kind: RelativeSourceKind,
    pub path: MemberPath,
}

impl RelativeSource {
    pub fn new(kind: RelativeSourceKind) -> Self {
        RelativeSource {
            kind,
            path: MemberPath::new(),
        }
    }
}

impl fmt::Display for RelativeSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelativeSourceKind::SelfRef => f.write_str("$self"),
            RelativeSourceKind::Ancestor { type_name, level } => {
                write!(f, "$Relative({}, {})", type_name, level)
            }
            RelativeSourceKind::Element { name } => write!(f, "$Element({})", name),
        }
    }
}

impl fmt::Display for RelativeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        write_path_suffix(f, &self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// `$name`: observed, becomes a binding member
    Dynamic,
    /// `$$name`: looked up on every evaluation, never observed
    Static,
}

/// A named resource with the member path merged onto it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub kind: ResourceKind,
    pub path: MemberPath,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ResourceKind::Dynamic => write!(f, "${}", self.name)?,
            ResourceKind::Static => write!(f, "$${}", self.name)?,
        }
        write_path_suffix(f, &self.path)
    }
}

fn write_path_suffix(f: &mut fmt::Formatter<'_>, path: &MemberPath) -> fmt::Result {
    match path.segments().first() {
        None => Ok(()),
        Some(PathSegment::Member(_)) => write!(f, ".{}", path),
        Some(PathSegment::Index(_)) => write!(f, "{}", path),
    }
}

/// Kind of source a binding member observes.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberKind {
    /// A path on the data context
    Path,
    RelativeSource(RelativeSourceKind),
    /// A dynamic resource by name
    Resource(String),
}

/// One distinct source path of an expression, hoisted into a numbered
/// evaluation parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingMemberDescriptor {
    /// Synthetic parameter name (`$member0`, `$member1`, ...)
    pub name: String,
    /// Structural key; equal keys always share a descriptor
    pub key: String,
    /// Position of the value in the source vector
    pub index: usize,
    pub kind: MemberKind,
    /// Path walked from the member's root
    pub path: MemberPath,
}

impl BindingMemberDescriptor {
    pub fn parameter_name(index: usize) -> String {
        format!("$member{}", index)
    }
}
