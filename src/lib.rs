//! A binding-expression engine for UI data bindings.
//!
//! Text such as `Text Customer?.Name ?? 'n/a', Mode=OneWay` goes through
//! four stages:
//!
//! 1. [`tokenizer`] splits it into tokens
//! 2. [`parser`] builds an [`Expr`] tree and the binding clauses
//! 3. [`transform`] expands macros, lowers `?.`, merges relative-source
//!    paths and extracts binding members
//! 4. [`compiler`] specialises the tree per runtime shape of the members
//!    and caches one evaluator per shape
//!
//! [`BindingParser`] ties the stages together and caches the configuration
//! actions of every expression string it has seen.

pub mod ast;
pub mod builtins;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compiler;
pub mod context;
pub mod error;
pub mod logging;
pub mod output;
pub mod parser;
pub mod resources;
pub mod tokenizer;
pub mod transform;
pub mod types;
pub mod value;

pub use ast::{BinaryOp, BindingMemberDescriptor, Expr, MemberKind, MemberPath, Token, TokenKind, UnaryOp};
pub use compiler::CompiledExpression;
pub use context::{
    BindingBehavior, BindingContext, BindingMode, BindingSource, ConfigAction, ContextKey, ConverterObject,
    ParameterValue, SourceLocator, ValueConverter, keys,
};
pub use error::{BindingError, ConfigurationError, LexicalError, ParseError, ResolutionError};
pub use output::{to_json, to_json_pretty};
pub use parser::{BindingActions, BindingParser, ExpressionHandler, ExpressionParser, ParsedBinding, ParserOptions};
pub use resources::{DynamicMethod, ResourceRegistry, ResourceResolver};
pub use tokenizer::Tokenizer;
pub use transform::{SourceShape, Transformed};
pub use types::{PropertyBag, TypeInfo, ValueType};
pub use value::Value;
