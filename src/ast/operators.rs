use std::fmt;

use crate::ast::TokenKind;

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Negation (`-`)
    Minus,
    /// Identity (`+`)
    Plus,
    /// Logical not (`!`, `not`)
    Not,
    /// Bitwise complement (`~`)
    BitwiseNot,
}

impl UnaryOp {
    pub fn from_token(kind: TokenKind) -> Option<UnaryOp> {
        match kind {
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Exclamation => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitwiseNot),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Minus => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitwiseNot => "~",
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Arithmetic
    /// Multiplication (`*`)
    Multiply,
    /// Division (`/`)
    Divide,
    /// Remainder (`%`, `mod`)
    Remainder,
    /// Addition or string concatenation (`+`)
    Add,
    /// Subtraction (`-`)
    Subtract,

    // Comparison
    /// Less than (`<`, `lt`)
    LessThan,
    /// Greater than (`>`, `gt`)
    GreaterThan,
    /// Less than or equal (`<=`, `le`)
    LessThanOrEqual,
    /// Greater than or equal (`>=`, `ge`)
    GreaterThanOrEqual,
    /// Equal (`==`, `eq`)
    Equal,
    /// Not equal (`!=`, `<>`, `ne`)
    NotEqual,

    // Bitwise / logical
    /// Bitwise or non-short-circuit logical and (`&`)
    BitwiseAnd,
    /// Exclusive or (`^`)
    ExclusiveOr,
    /// Bitwise or non-short-circuit logical or (`|`)
    BitwiseOr,
    /// Short-circuit and (`&&`, `and`)
    And,
    /// Short-circuit or (`||`, `or`)
    Or,

    /// Null-coalescing (`??`); lowest priority, never part of a reduction chain
    Coalesce,
}

impl BinaryOp {
    pub fn from_token(kind: TokenKind) -> Option<BinaryOp> {
        match kind {
            TokenKind::Asterisk => Some(BinaryOp::Multiply),
            TokenKind::Slash => Some(BinaryOp::Divide),
            TokenKind::Percent => Some(BinaryOp::Remainder),
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Subtract),
            TokenKind::LessThan => Some(BinaryOp::LessThan),
            TokenKind::GreaterThan => Some(BinaryOp::GreaterThan),
            TokenKind::LessThanEqual => Some(BinaryOp::LessThanOrEqual),
            TokenKind::GreaterThanEqual => Some(BinaryOp::GreaterThanOrEqual),
            TokenKind::DoubleEqual => Some(BinaryOp::Equal),
            TokenKind::NotEqual => Some(BinaryOp::NotEqual),
            TokenKind::Ampersand => Some(BinaryOp::BitwiseAnd),
            TokenKind::Caret => Some(BinaryOp::ExclusiveOr),
            TokenKind::Bar => Some(BinaryOp::BitwiseOr),
            TokenKind::DoubleAmpersand => Some(BinaryOp::And),
            TokenKind::DoubleBar => Some(BinaryOp::Or),
            _ => None,
        }
    }

    /// Reduction priority; higher binds tighter.
    pub fn priority(self) -> u8 {
        match self {
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Remainder => 10,
            BinaryOp::Add | BinaryOp::Subtract => 9,
            BinaryOp::LessThan
            | BinaryOp::GreaterThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThanOrEqual => 7,
            BinaryOp::Equal | BinaryOp::NotEqual => 6,
            BinaryOp::BitwiseAnd => 5,
            BinaryOp::ExclusiveOr => 4,
            BinaryOp::BitwiseOr => 3,
            BinaryOp::And => 2,
            BinaryOp::Or => 1,
            BinaryOp::Coalesce => 0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::LessThan => "<",
            BinaryOp::GreaterThan => ">",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::BitwiseAnd => "&",
            BinaryOp::ExclusiveOr => "^",
            BinaryOp::BitwiseOr => "|",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Coalesce => "??",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::LessThan
                | BinaryOp::GreaterThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThanOrEqual
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Equal | BinaryOp::NotEqual)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
