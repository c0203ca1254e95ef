//! # Binding Expression Language - Abstract Syntax Tree
//!
//! This module defines the tokens and the AST of the binding-expression
//! language: a property-path syntax extended with method calls, indexers,
//! operators, conditionals, lambdas, relative/element sources and resources.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the tokenizer
//! - **[expressions]** - Expression nodes produced by the parser and rewritten by the passes
//! - **[operators]** - Unary and binary operators with their reduction priorities
//! - **[members]** - Member paths, relative sources, resources and binding-member descriptors
//!
//! ## Quick Start
//!
//! ```text
//! Text FirstName + " " + LastName, Mode=OneWay; IsEnabled !IsBusy
//! ```
//!
//! Two bindings: the target `Text` computed from two source paths, and the
//! target `IsEnabled` bound to the negation of `IsBusy`.
//!
//! ## Core Concepts
//!
//! ### Target and source
//!
//! Each binding starts with a target path (read up to the first whitespace),
//! followed by a source expression and comma-separated clauses:
//!
//! ```text
//! Target Source, Clause=Value, Clause=Value
//! ```
//!
//! ### Binding members
//!
//! Every distinct source path becomes one binding member. `A.B + A.B`
//! references a single member twice.
//!
//! ### Relative sources and resources
//!
//! ```text
//! {Relative Window, Path=Title}
//! {Element nameBox}.Text
//! $self.Width
//! $Formatter(Value)
//! ```
pub mod expressions;
pub mod members;
pub mod operators;
pub mod tokens;

pub use expressions::{CONTEXT_PARAMETER, Expr, NULL_GUARD_METHOD};
pub use members::{
    BindingMemberDescriptor, MemberKind, MemberPath, PathSegment, RelativeSource,
    RelativeSourceKind, Resource, ResourceKind,
};
pub use operators::{BinaryOp, UnaryOp};
pub use tokens::{Token, TokenKind};
