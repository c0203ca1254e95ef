//! Error taxonomy for the binding-expression engine.
//!
//! Four structured categories cover the front end and the compiler:
//!
//! - [`LexicalError`] - bad character, unterminated literal, empty input
//! - [`ParseError`] - unexpected token, invalid member, bad literal, ...
//! - [`ResolutionError`] - member, method, overload or source that cannot be bound
//! - [`ConfigurationError`] - unknown binding mode, malformed clause arguments
//!
//! Everything is wrapped by [`BindingError`], which additionally carries the
//! runtime-only failures of evaluation. Errors raised by host code travel
//! through [`BindingError::Host`] untouched.

use std::fmt;

use thiserror::Error;

use crate::ast::TokenKind;

/// Crate-wide result alias.
pub type Result<T, E = BindingError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BindingError {
    #[error(transparent)]
    Lexical(#[from] LexicalError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A member was read from a null value.
    #[error("Null reference: cannot access '{0}' on a null value")]
    NullReference(String),

    /// A runtime cast emitted by the compiler did not hold.
    #[error("Invalid cast from {from} to {to}")]
    InvalidCast { from: String, to: String },

    #[error("Division by zero")]
    DivisionByZero,

    /// Failure raised by host code (members, methods, converters).
    #[error(transparent)]
    Host(Box<dyn std::error::Error + Send + Sync>),
}

impl BindingError {
    /// Wraps an error raised by host code.
    pub fn host<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        BindingError::Host(error.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexicalErrorKind {
    EmptyInput,
    UnexpectedCharacter,
    UnterminatedString,
}

/// Error produced by the tokenizer when running in throwing mode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct LexicalError {
    pub kind: LexicalErrorKind,
    pub position: usize,
    pub character: Option<char>,
}

impl fmt::Display for LexicalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.character) {
            (LexicalErrorKind::EmptyInput, _) => write!(f, "Lexical error: input is empty"),
            (LexicalErrorKind::UnexpectedCharacter, Some(ch)) => write!(
                f,
                "Lexical error: unexpected character '{}' at position {}",
                ch, self.position
            ),
            (LexicalErrorKind::UnexpectedCharacter, None) => write!(
                f,
                "Lexical error: unexpected character at position {}",
                self.position
            ),
            (LexicalErrorKind::UnterminatedString, _) => write!(
                f,
                "Lexical error: unterminated string literal starting at position {}",
                self.position
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedToken {
        found: TokenKind,
        expected: Vec<TokenKind>,
    },
    InvalidMemberName(String),
    DuplicateLambdaParameter(String),
    InvalidLiteral(String),
    /// Unknown clause name that is not followed by a boolean flag.
    MissingBehaviorFlag(String),
    InvalidTargetPath,
    InvalidRelativeSource(String),
}

/// Structured parse failure; always carries the position and the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub position: usize,
    pub expression: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error at position {}: ", self.position)?;
        match &self.kind {
            ParseErrorKind::UnexpectedToken { found, expected } if expected.is_empty() => {
                write!(f, "unexpected token {:?}", found)?
            }
            ParseErrorKind::UnexpectedToken { found, expected } => {
                write!(f, "unexpected token {:?}, expected one of {:?}", found, expected)?
            }
            ParseErrorKind::InvalidMemberName(name) => write!(f, "invalid member name '{}'", name)?,
            ParseErrorKind::DuplicateLambdaParameter(name) => {
                write!(f, "duplicate lambda parameter '{}'", name)?
            }
            ParseErrorKind::InvalidLiteral(text) => write!(f, "invalid literal '{}'", text)?,
            ParseErrorKind::MissingBehaviorFlag(name) => {
                write!(f, "clause '{}' must be followed by '=true' or '=false'", name)?
            }
            ParseErrorKind::InvalidTargetPath => write!(f, "invalid target path")?,
            ParseErrorKind::InvalidRelativeSource(msg) => write!(f, "invalid relative source: {}", msg)?,
        }
        write!(f, " in expression \"{}\"", self.expression)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionErrorKind {
    MemberNotFound { type_name: String, member: String },
    MethodNotFound { type_name: String, method: String },
    AmbiguousOverload { type_name: String, method: String },
    IndexerNotFound { type_name: String },
    InvalidOperator { operator: String, operands: Vec<String> },
    MissingSource(usize),
    TypeNotFound(String),
    ResourceNotFound(String),
    ConverterNotFound(String),
    BehaviorNotFound(String),
    InvalidEnumMember { type_name: String, member: String },
    UnexpectedExpression,
}

/// Failure to bind a node of the rewritten tree.
///
/// `node` is the textual form of the offending expression node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ResolutionError {
    pub kind: ResolutionErrorKind,
    pub node: String,
}

impl ResolutionError {
    pub fn new(kind: ResolutionErrorKind, node: impl Into<String>) -> Self {
        ResolutionError {
            kind,
            node: node.into(),
        }
    }
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resolution error: ")?;
        match &self.kind {
            ResolutionErrorKind::MemberNotFound { type_name, member } => {
                write!(f, "member '{}' not found on {}", member, type_name)?
            }
            ResolutionErrorKind::MethodNotFound { type_name, method } => {
                write!(f, "no applicable method '{}' on {}", method, type_name)?
            }
            ResolutionErrorKind::AmbiguousOverload { type_name, method } => {
                write!(f, "ambiguous call to '{}' on {}", method, type_name)?
            }
            ResolutionErrorKind::IndexerNotFound { type_name } => {
                write!(f, "no applicable indexer on {}", type_name)?
            }
            ResolutionErrorKind::InvalidOperator { operator, operands } => write!(
                f,
                "operator '{}' cannot be applied to {}",
                operator,
                operands.join(" and ")
            )?,
            ResolutionErrorKind::MissingSource(index) => {
                write!(f, "no binding source supplied at index {}", index)?
            }
            ResolutionErrorKind::TypeNotFound(name) => write!(f, "type '{}' not found", name)?,
            ResolutionErrorKind::ResourceNotFound(name) => write!(f, "resource '{}' not found", name)?,
            ResolutionErrorKind::ConverterNotFound(name) => write!(f, "converter '{}' not found", name)?,
            ResolutionErrorKind::BehaviorNotFound(name) => write!(f, "behavior '{}' not found", name)?,
            ResolutionErrorKind::InvalidEnumMember { type_name, member } => {
                write!(f, "'{}' is not a member of enum {}", member, type_name)?
            }
            ResolutionErrorKind::UnexpectedExpression => write!(f, "unexpected expression node")?,
        }
        write!(f, " (at '{}')", self.node)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Unknown binding mode '{name}'; valid modes are: {}", valid.join(", "))]
    UnknownMode { name: String, valid: Vec<String> },

    #[error("Malformed '{clause}' clause: {message}")]
    MalformedClause { clause: String, message: String },
}
