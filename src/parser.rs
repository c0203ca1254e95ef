//! # Parser
//!
//! Two grammars share one token stream:
//!
//! - the **expression grammar** (`parse_expression`): conditionals and
//!   `??`, a flat chain of binary operators reduced by priority, unary
//!   operators, postfix member/call/indexer chains and primaries;
//! - the **binding grammar** (`parse_bindings`): `Target Source, Clause=Value`
//!   bindings separated by `;`, each turned into deferred configuration
//!   actions.
//!
//! [`BindingParser::parse`] caches the actions per raw expression string.

pub mod clauses;

use std::{
    collections::{HashMap, HashSet},
    fmt,
    str::FromStr,
    sync::Arc,
};

use log::debug;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::{
    ast::{
        BinaryOp, BindingMemberDescriptor, Expr, MemberKind, MemberPath, PathSegment, RelativeSource,
        RelativeSourceKind, Resource, ResourceKind, Token, TokenKind, UnaryOp,
    },
    compiler::{CompiledExpression, operators},
    context::{BindingContext, BindingMode, BindingSource, ConfigAction, InverseBooleanConverter, keys},
    error::{BindingError, ParseError, ParseErrorKind, ResolutionError, ResolutionErrorKind},
    resources::{MethodConverter, ResourceResolver},
    tokenizer::Tokenizer,
    transform::{Pipeline, SourceShape, Transformed},
    value::Value,
};

/// Keyword surface of the grammar.
///
/// Every word the grammar treats specially (relative-source kinds, word
/// operators, binding modes) comes from here.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    relative_source_aliases: HashSet<String>,
    element_source_aliases: HashSet<String>,
    unary_aliases: HashMap<String, UnaryOp>,
    binary_aliases: HashMap<String, BinaryOp>,
    /// Keyed by lowercase name
    binding_modes: HashMap<String, (String, BindingMode)>,
    pub throw_on_lexical_error: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        let words = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        let mut options = ParserOptions {
            relative_source_aliases: words(&["Relative", "RelativeSource", "Rel"]),
            element_source_aliases: words(&["Element", "ElementSource", "El"]),
            unary_aliases: HashMap::from([("not".to_string(), UnaryOp::Not)]),
            binary_aliases: [
                ("and", BinaryOp::And),
                ("or", BinaryOp::Or),
                ("mod", BinaryOp::Remainder),
                ("lt", BinaryOp::LessThan),
                ("gt", BinaryOp::GreaterThan),
                ("le", BinaryOp::LessThanOrEqual),
                ("ge", BinaryOp::GreaterThanOrEqual),
                ("eq", BinaryOp::Equal),
                ("ne", BinaryOp::NotEqual),
            ]
            .into_iter()
            .map(|(word, op)| (word.to_string(), op))
            .collect(),
            binding_modes: HashMap::new(),
            throw_on_lexical_error: true,
        };
        for (name, mode) in [
            ("TwoWay", BindingMode::TwoWay),
            ("OneWay", BindingMode::OneWay),
            ("OneTime", BindingMode::OneTime),
            ("OneWayToSource", BindingMode::OneWayToSource),
            ("Default", BindingMode::Default),
        ] {
            options = options.with_binding_mode(name, mode);
        }
        options
    }
}

impl ParserOptions {
    pub fn with_relative_source_alias(mut self, alias: impl Into<String>) -> Self {
        self.relative_source_aliases.insert(alias.into());
        self
    }

    pub fn with_element_source_alias(mut self, alias: impl Into<String>) -> Self {
        self.element_source_aliases.insert(alias.into());
        self
    }

    pub fn with_unary_alias(mut self, word: impl Into<String>, op: UnaryOp) -> Self {
        self.unary_aliases.insert(word.into(), op);
        self
    }

    pub fn with_binary_alias(mut self, word: impl Into<String>, op: BinaryOp) -> Self {
        self.binary_aliases.insert(word.into(), op);
        self
    }

    pub fn with_binding_mode(mut self, name: impl Into<String>, mode: BindingMode) -> Self {
        let name = name.into();
        self.binding_modes.insert(name.to_ascii_lowercase(), (name, mode));
        self
    }

    /// Recover from bad input with `Unknown` tokens instead of failing.
    pub fn lenient(mut self) -> Self {
        self.throw_on_lexical_error = false;
        self
    }

    pub fn is_relative_source_alias(&self, word: &str) -> bool {
        self.relative_source_aliases.contains(word)
    }

    pub fn is_element_source_alias(&self, word: &str) -> bool {
        self.element_source_aliases.contains(word)
    }

    pub fn unary_alias(&self, word: &str) -> Option<UnaryOp> {
        self.unary_aliases.get(word).copied()
    }

    pub fn binary_alias(&self, word: &str) -> Option<BinaryOp> {
        self.binary_aliases.get(word).copied()
    }

    /// Case-insensitive.
    pub fn binding_mode(&self, name: &str) -> Option<BindingMode> {
        self.binding_modes
            .get(&name.to_ascii_lowercase())
            .map(|(_, mode)| *mode)
    }

    pub fn binding_mode_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.binding_modes.values().map(|(name, _)| name.clone()).collect();
        names.sort();
        names
    }
}

/// Rewrites raw binding text before tokenization.
///
/// Returning `None` leaves the text unchanged.
pub trait ExpressionHandler: Send + Sync {
    fn handle(&self, expression: &str) -> Option<String>;
}

impl<F> ExpressionHandler for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn handle(&self, expression: &str) -> Option<String> {
        self(expression)
    }
}

/// Flat operand/operator list of a binary expression.
///
/// Reduction repeatedly combines around the highest-priority operator,
/// leftmost first, which makes equal priorities left-associative.
struct BinaryChain {
    operands: Vec<Expr>,
    operators: Vec<BinaryOp>,
}

impl BinaryChain {
    fn new(first: Expr) -> Self {
        BinaryChain {
            operands: vec![first],
            operators: vec![],
        }
    }

    fn push(&mut self, op: BinaryOp, operand: Expr) {
        self.operators.push(op);
        self.operands.push(operand);
    }

    fn highest(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, op) in self.operators.iter().enumerate() {
            if best.is_none_or(|b| op.priority() > self.operators[b].priority()) {
                best = Some(i);
            }
        }
        best
    }

    fn reduce(mut self) -> Option<Expr> {
        while let Some(best) = self.highest() {
            let op = self.operators.remove(best);
            let left = self.operands.remove(best);
            let right = self.operands.remove(best);
            self.operands.insert(best, Expr::binary(op, left, right));
        }
        self.operands.pop()
    }
}

/// Member path of a chain of members and constant indexers.
fn path_of(expr: &Expr) -> Option<MemberPath> {
    match expr {
        Expr::Member { target, name } => {
            let mut path = match target {
                None => MemberPath::new(),
                Some(target) => path_of(target)?,
            };
            path.push(PathSegment::Member(name.clone()));
            Some(path)
        }
        Expr::Index { target, args } => {
            let mut path = match target {
                None => MemberPath::new(),
                Some(target) => path_of(target)?,
            };
            let values = args
                .iter()
                .map(|arg| match arg {
                    Expr::Constant(value) => Some(value.clone()),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()?;
            path.push(PathSegment::Index(values));
            Some(path)
        }
        _ => None,
    }
}

/// Unescapes a string token; `'x'` with exactly one character is a char.
fn parse_string(text: &str) -> Value {
    let mut chars: Vec<char> = text.chars().collect();
    let Some(&quote) = chars.first() else {
        return Value::String(String::new());
    };
    chars.remove(0);
    chars.pop();

    let mut result = String::with_capacity(chars.len());
    let mut iter = chars.into_iter().peekable();
    while let Some(ch) = iter.next() {
        match ch {
            c if c == quote && iter.peek() == Some(&quote) => {
                iter.next();
                result.push(quote);
            }
            '\\' => match iter.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('0') => result.push('\0'),
                Some(other) => result.push(other),
                None => result.push('\\'),
            },
            c => result.push(c),
        }
    }

    let mut single = result.chars();
    match (quote, single.next(), single.next()) {
        ('\'', Some(ch), None) => Value::Char(ch),
        _ => Value::String(result),
    }
}

fn starts_operand(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Identifier
            | TokenKind::IntegerLiteral
            | TokenKind::RealLiteral
            | TokenKind::StringLiteral
            | TokenKind::OpenParen
            | TokenKind::Dollar
            | TokenKind::DoubleDollar
            | TokenKind::OpenBrace
            | TokenKind::OpenBracket
            | TokenKind::Exclamation
            | TokenKind::Minus
            | TokenKind::Tilde
    )
}

/// `-literal` folds into a negative constant.
fn fold_unary(op: UnaryOp, operand: Expr) -> Expr {
    if let (UnaryOp::Minus, Expr::Constant(value)) = (op, &operand) {
        if matches!(
            value,
            Value::Int32(_) | Value::Int64(_) | Value::Float32(_) | Value::Float64(_) | Value::Decimal(_)
        ) {
            if let Ok(negated) = operators::apply_unary(op, value) {
                return Expr::Constant(negated);
            }
        }
    }
    Expr::unary(op, operand)
}

/// Recursive-descent parser over the tokens of one text.
pub struct ExpressionParser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    /// `spaced[i]`: token `i` was preceded by whitespace
    spaced: Vec<bool>,
    index: usize,
    options: &'a ParserOptions,
    lambda_scope: Vec<String>,
    target_mode: bool,
}

impl<'a> ExpressionParser<'a> {
    pub fn new(text: &'a str, options: &'a ParserOptions) -> Result<Self, BindingError> {
        let mut tokenizer = Tokenizer::with_source(text, options.throw_on_lexical_error)?;
        let mut tokens = vec![];
        let mut spaced = vec![];
        let mut whitespace = false;
        loop {
            let token = tokenizer.next_token(false)?;
            match token.kind {
                TokenKind::Whitespace => whitespace = true,
                kind => {
                    tokens.push(token);
                    spaced.push(whitespace);
                    whitespace = false;
                    if kind == TokenKind::Eof {
                        break;
                    }
                }
            }
        }
        Ok(ExpressionParser {
            text,
            tokens,
            spaced,
            index: 0,
            options,
            lambda_scope: vec![],
            target_mode: false,
        })
    }

    pub(crate) fn current_token(&self) -> &Token {
        &self.tokens[self.index]
    }

    pub(crate) fn peek_kind(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.index + offset)
            .map_or(TokenKind::Eof, |token| token.kind)
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.tokens[self.index].clone();
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
        token
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.current_token().kind == kind
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> Result<Token, BindingError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&[kind]))
        }
    }

    pub(crate) fn error_at(&self, token: &Token, kind: ParseErrorKind) -> BindingError {
        ParseError {
            kind,
            position: token.position,
            expression: self.text.to_string(),
        }
        .into()
    }

    pub(crate) fn error(&self, kind: ParseErrorKind) -> BindingError {
        self.error_at(self.current_token(), kind)
    }

    pub(crate) fn unexpected(&self, expected: &[TokenKind]) -> BindingError {
        self.error(ParseErrorKind::UnexpectedToken {
            found: self.current_token().kind,
            expected: expected.to_vec(),
        })
    }

    /// Parses the whole text as one expression.
    pub fn parse_complete(&mut self) -> Result<Expr, BindingError> {
        let expr = self.parse_expression()?;
        self.expect(TokenKind::Eof)?;
        Ok(expr)
    }

    /// conditional := binary [ "?" conditional ":" conditional | "??" conditional ]
    pub fn parse_expression(&mut self) -> Result<Expr, BindingError> {
        let condition = self.parse_binary()?;
        match self.current_token().kind {
            TokenKind::Question => {
                self.advance();
                let if_true = self.parse_expression()?;
                self.expect(TokenKind::Colon)?;
                let if_false = self.parse_expression()?;
                Ok(Expr::Conditional {
                    condition: Box::new(condition),
                    if_true: Box::new(if_true),
                    if_false: Box::new(if_false),
                })
            }
            TokenKind::DoubleQuestion => {
                self.advance();
                let right = self.parse_expression()?;
                Ok(Expr::binary(BinaryOp::Coalesce, condition, right))
            }
            _ => Ok(condition),
        }
    }

    fn binary_operator(&self) -> Option<BinaryOp> {
        let token = self.current_token();
        match token.kind {
            TokenKind::Identifier => self.options.binary_alias(&token.text),
            kind => BinaryOp::from_token(kind),
        }
    }

    fn parse_binary(&mut self) -> Result<Expr, BindingError> {
        let mut chain = BinaryChain::new(self.parse_unary()?);
        while let Some(op) = self.binary_operator() {
            self.advance();
            chain.push(op, self.parse_unary()?);
        }
        chain.reduce().ok_or_else(|| self.unexpected(&[]))
    }

    fn parse_unary(&mut self) -> Result<Expr, BindingError> {
        let token = self.current_token();
        let op = match token.kind {
            TokenKind::Identifier if starts_operand(self.peek_kind(1)) => self.options.unary_alias(&token.text),
            kind => UnaryOp::from_token(kind),
        };
        let Some(op) = op else {
            return self.parse_postfix();
        };
        self.advance();
        let unsuffixed = matches!(op, UnaryOp::Minus)
            && self.check(TokenKind::IntegerLiteral)
            && self.current_token().text.bytes().all(|b| b.is_ascii_digit());
        let operand = self.parse_unary()?;
        Ok(match fold_unary(op, operand) {
            // `-2147483648` only fits an int once negated
            Expr::Constant(Value::Int64(v)) if unsuffixed => {
                Expr::Constant(i32::try_from(v).map_or(Value::Int64(v), Value::Int32))
            }
            expr => expr,
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, BindingError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current_token().kind {
                TokenKind::Dot => {
                    self.advance();
                    expr = self.parse_member_access(expr)?;
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    expr = self.parse_member_access(Expr::NullConditional(Box::new(expr)))?;
                }
                // `Text [0]` on the target side leaves `[0]` to the source
                TokenKind::OpenBracket if !(self.target_mode && self.spaced[self.index]) => {
                    self.advance();
                    let args = self.parse_index_arguments()?;
                    expr = Expr::Index {
                        target: Some(Box::new(expr)),
                        args,
                    };
                }
                TokenKind::QuestionBracket => {
                    self.advance();
                    let args = self.parse_index_arguments()?;
                    expr = Expr::Index {
                        target: Some(Box::new(Expr::NullConditional(Box::new(expr)))),
                        args,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_index_arguments(&mut self) -> Result<Vec<Expr>, BindingError> {
        let target_mode = std::mem::replace(&mut self.target_mode, false);
        let args = self.parse_arguments(TokenKind::CloseBracket)?;
        self.target_mode = target_mode;
        Ok(args)
    }

    fn parse_member_name(&mut self) -> Result<String, BindingError> {
        let token = self.expect(TokenKind::Identifier)?;
        let name = token.text.strip_prefix('@').unwrap_or(&token.text);
        if name.is_empty() {
            return Err(self.error_at(&token, ParseErrorKind::InvalidMemberName(token.text.clone())));
        }
        Ok(name.to_string())
    }

    fn parse_member_access(&mut self, target: Expr) -> Result<Expr, BindingError> {
        let name = self.parse_member_name()?;
        Ok(match self.parse_call_arguments()? {
            Some(args) => Expr::MethodCall {
                target: Some(Box::new(target)),
                method: name,
                args,
            },
            None => Expr::Member {
                target: Some(Box::new(target)),
                name,
            },
        })
    }

    /// `()` or `(a, b)` if present.
    fn parse_call_arguments(&mut self) -> Result<Option<Vec<Expr>>, BindingError> {
        match self.current_token().kind {
            TokenKind::EmptyParen => {
                self.advance();
                Ok(Some(vec![]))
            }
            TokenKind::OpenParen => {
                self.advance();
                self.parse_arguments(TokenKind::CloseParen).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Comma-separated expressions after an opening token, through `close`.
    fn parse_arguments(&mut self, close: TokenKind) -> Result<Vec<Expr>, BindingError> {
        let mut args = vec![];
        if self.check(close) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            match self.current_token().kind {
                TokenKind::Comma => {
                    self.advance();
                }
                kind if kind == close => {
                    self.advance();
                    return Ok(args);
                }
                _ => return Err(self.unexpected(&[TokenKind::Comma, close])),
            }
        }
    }

    /// Parse primary expressions: literals, names, calls, `(...)`, lambdas,
    /// resources and brace sources.
    fn parse_primary(&mut self) -> Result<Expr, BindingError> {
        let token = self.current_token().clone();
        match token.kind {
            TokenKind::IntegerLiteral => {
                self.advance();
                self.parse_integer(&token).map(Expr::Constant)
            }
            TokenKind::RealLiteral => {
                self.advance();
                self.parse_real(&token).map(Expr::Constant)
            }
            TokenKind::StringLiteral => {
                self.advance();
                Ok(Expr::Constant(parse_string(&token.text)))
            }
            TokenKind::Identifier => self.parse_identifier(&token),
            TokenKind::OpenParen => match self.lambda_parameters()? {
                Some(parameters) => self.parse_lambda_body(parameters),
                None => {
                    self.advance();
                    let expr = self.parse_expression()?;
                    self.expect(TokenKind::CloseParen)?;
                    Ok(expr)
                }
            },
            TokenKind::EmptyParen if self.peek_kind(1) == TokenKind::Lambda => {
                self.advance();
                self.advance();
                self.parse_lambda_body(vec![])
            }
            TokenKind::Dollar => {
                self.advance();
                let name = self.parse_member_name()?;
                Ok(match self.parse_call_arguments()? {
                    Some(args) => Expr::ResourceMethod { name, args },
                    None => Expr::Resource(Resource {
                        name,
                        kind: ResourceKind::Dynamic,
                        path: MemberPath::new(),
                    }),
                })
            }
            TokenKind::DoubleDollar => {
                self.advance();
                let name = self.parse_member_name()?;
                Ok(Expr::Resource(Resource {
                    name,
                    kind: ResourceKind::Static,
                    path: MemberPath::new(),
                }))
            }
            TokenKind::OpenBrace => self.parse_brace_source(),
            // `[0]` alone indexes the data context
            TokenKind::OpenBracket => {
                self.advance();
                let args = self.parse_index_arguments()?;
                Ok(Expr::Index { target: None, args })
            }
            _ => Err(self.unexpected(&[
                TokenKind::Identifier,
                TokenKind::IntegerLiteral,
                TokenKind::RealLiteral,
                TokenKind::StringLiteral,
                TokenKind::OpenParen,
                TokenKind::Dollar,
                TokenKind::OpenBrace,
            ])),
        }
    }

    fn parse_identifier(&mut self, token: &Token) -> Result<Expr, BindingError> {
        match token.text.as_str() {
            "true" | "false" | "null" => {
                self.advance();
                Ok(Expr::Constant(match token.text.as_str() {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    _ => Value::Null,
                }))
            }
            name if self.peek_kind(1) == TokenKind::Lambda => {
                let name = name.to_string();
                self.advance();
                self.advance();
                self.parse_lambda_body(vec![name])
            }
            name if self.lambda_scope.iter().any(|p| p == name) => {
                self.advance();
                Ok(Expr::Parameter(name.to_string()))
            }
            _ => {
                let name = self.parse_member_name()?;
                Ok(match self.parse_call_arguments()? {
                    Some(args) => Expr::MethodCall {
                        target: None,
                        method: name,
                        args,
                    },
                    None => Expr::Member { target: None, name },
                })
            }
        }
    }

    /// Consumes `(a, b) =>` when the tokens at `(` form a lambda head.
    fn lambda_parameters(&mut self) -> Result<Option<Vec<String>>, BindingError> {
        let mut offset = 1;
        let mut parameters = vec![];
        loop {
            if self.peek_kind(offset) != TokenKind::Identifier {
                return Ok(None);
            }
            parameters.push(self.tokens[self.index + offset].text.clone());
            match self.peek_kind(offset + 1) {
                TokenKind::Comma => offset += 2,
                TokenKind::CloseParen if self.peek_kind(offset + 2) == TokenKind::Lambda => break,
                _ => return Ok(None),
            }
        }
        for _ in 0..offset + 3 {
            self.advance();
        }
        Ok(Some(parameters))
    }

    fn parse_lambda_body(&mut self, parameters: Vec<String>) -> Result<Expr, BindingError> {
        for (i, parameter) in parameters.iter().enumerate() {
            if parameters[..i].contains(parameter) {
                return Err(self.error(ParseErrorKind::DuplicateLambdaParameter(parameter.clone())));
            }
        }
        let base = self.lambda_scope.len();
        self.lambda_scope.extend(parameters.iter().cloned());
        let body = self.parse_expression();
        self.lambda_scope.truncate(base);
        Ok(Expr::Lambda {
            parameters,
            body: Box::new(body?),
        })
    }

    fn parse_integer(&self, token: &Token) -> Result<Value, BindingError> {
        let lower = token.text.to_ascii_lowercase();
        let digits = lower.trim_end_matches(['u', 'l']);
        let invalid = || self.error_at(token, ParseErrorKind::InvalidLiteral(token.text.clone()));
        let n: u64 = digits.parse().map_err(|_| invalid())?;
        Ok(match &lower[digits.len()..] {
            "" => match (i32::try_from(n), i64::try_from(n)) {
                (Ok(v), _) => Value::Int32(v),
                (_, Ok(v)) => Value::Int64(v),
                _ => Value::UInt64(n),
            },
            "u" => u32::try_from(n).map(Value::UInt32).unwrap_or(Value::UInt64(n)),
            "l" => i64::try_from(n).map(Value::Int64).unwrap_or(Value::UInt64(n)),
            "ul" | "lu" => Value::UInt64(n),
            _ => return Err(invalid()),
        })
    }

    fn parse_real(&self, token: &Token) -> Result<Value, BindingError> {
        let invalid = || self.error_at(token, ParseErrorKind::InvalidLiteral(token.text.clone()));
        let text = token.text.as_str();
        let (body, suffix) = match text.chars().last().map(|c| c.to_ascii_lowercase()) {
            Some(c @ ('f' | 'd' | 'm')) => (&text[..text.len() - 1], Some(c)),
            _ => (text, None),
        };
        match suffix {
            Some('f') => body.parse::<f32>().map(Value::Float32).map_err(|_| invalid()),
            Some('m') => {
                let body = if body.starts_with('.') {
                    format!("0{}", body)
                } else {
                    body.to_string()
                };
                if body.contains(['e', 'E']) {
                    Decimal::from_scientific(&body).map(Value::Decimal).map_err(|_| invalid())
                } else {
                    Decimal::from_str(&body).map(Value::Decimal).map_err(|_| invalid())
                }
            }
            _ => body.parse::<f64>().map(Value::Float64).map_err(|_| invalid()),
        }
    }

    /// `{Relative Type, Path=p, Level=n}`, `{Element name, Path=p}`,
    /// `{RelativeSource Self}`
    fn parse_brace_source(&mut self) -> Result<Expr, BindingError> {
        self.expect(TokenKind::OpenBrace)?;
        let alias = self.expect(TokenKind::Identifier)?;
        let mut kind = if self.options.is_relative_source_alias(&alias.text) {
            let target = self.expect(TokenKind::Identifier)?;
            if target.text == "Self" {
                RelativeSourceKind::SelfRef
            } else {
                RelativeSourceKind::Ancestor {
                    type_name: target.text,
                    level: 1,
                }
            }
        } else if self.options.is_element_source_alias(&alias.text) {
            RelativeSourceKind::Element {
                name: self.parse_member_name()?,
            }
        } else {
            return Err(self.error_at(
                &alias,
                ParseErrorKind::InvalidRelativeSource(format!("unknown source kind '{}'", alias.text)),
            ));
        };

        let mut path = MemberPath::new();
        while self.check(TokenKind::Comma) {
            self.advance();
            let setting = self.expect(TokenKind::Identifier)?;
            self.expect(TokenKind::Equal)?;
            match setting.text.to_ascii_lowercase().as_str() {
                "path" => path = self.parse_member_path()?,
                "level" | "ancestorlevel" => {
                    let token = self.expect(TokenKind::IntegerLiteral)?;
                    let value = token.text.parse::<u32>().ok().filter(|level| *level > 0);
                    match (&mut kind, value) {
                        (RelativeSourceKind::Ancestor { level, .. }, Some(value)) => *level = value,
                        _ => {
                            return Err(self.error_at(
                                &token,
                                ParseErrorKind::InvalidRelativeSource(format!("invalid level '{}'", token.text)),
                            ));
                        }
                    }
                }
                _ => {
                    return Err(self.error_at(
                        &setting,
                        ParseErrorKind::InvalidRelativeSource(format!("unknown setting '{}'", setting.text)),
                    ));
                }
            }
        }
        self.expect(TokenKind::CloseBrace)?;
        Ok(Expr::RelativeSource(RelativeSource { kind, path }))
    }

    fn parse_member_path(&mut self) -> Result<MemberPath, BindingError> {
        let start = self.current_token().clone();
        let expr = self.parse_postfix()?;
        path_of(&expr).ok_or_else(|| self.error_at(&start, ParseErrorKind::InvalidTargetPath))
    }

    /// Target path of a binding. A `[` preceded by whitespace ends it.
    pub fn parse_target_path(&mut self) -> Result<MemberPath, BindingError> {
        self.target_mode = true;
        let path = self.parse_member_path();
        self.target_mode = false;
        path
    }

    pub(crate) fn parse_bindings(&mut self, session: &Session<'_>) -> Result<Vec<ParsedBinding>, BindingError> {
        let mut bindings = vec![];
        while !self.check(TokenKind::Eof) {
            bindings.push(self.parse_binding(session)?);
            if !self.check(TokenKind::Semicolon) {
                break;
            }
            self.advance();
        }
        self.expect(TokenKind::Eof)?;
        Ok(bindings)
    }

    fn parse_binding(&mut self, session: &Session<'_>) -> Result<ParsedBinding, BindingError> {
        let target = self.parse_target_path()?;
        let source = match self.current_token().kind {
            TokenKind::Comma | TokenKind::Semicolon | TokenKind::Eof => None,
            _ => {
                let expr = self.parse_expression()?;
                Some(session.transform(expr)?)
            }
        };

        let target_path = target.clone();
        let mut actions: Vec<ConfigAction> = vec![Arc::new(move |context: &BindingContext| {
            context.add(keys::TARGET_PATH, target_path.clone());
            Ok(())
        })];
        let prepared = match &source {
            Some(transformed) => PreparedSource::new(transformed, session.resolver),
            None => PreparedSource::Ready(BindingSource::Member(data_context_member())),
        };
        let resolver = session.resolver.clone();
        actions.push(Arc::new(move |context: &BindingContext| {
            let source = prepared.build(context, resolver.as_ref())?;
            context.add(keys::SOURCE, source);
            Ok(())
        }));

        while self.check(TokenKind::Comma) {
            self.advance();
            actions.push(clauses::parse_clause(self, session)?);
        }
        if !matches!(self.current_token().kind, TokenKind::Semicolon | TokenKind::Eof) {
            return Err(self.unexpected(&[TokenKind::Comma, TokenKind::Semicolon, TokenKind::Eof]));
        }
        Ok(ParsedBinding {
            target,
            source,
            actions,
        })
    }
}

fn data_context_member() -> BindingMemberDescriptor {
    BindingMemberDescriptor {
        name: BindingMemberDescriptor::parameter_name(0),
        key: String::new(),
        index: 0,
        kind: MemberKind::Path,
        path: MemberPath::new(),
    }
}

/// Source built at parse time, except for resource methods, which are
/// resolved against the context the action is applied to.
#[derive(Clone)]
pub(crate) enum PreparedSource {
    Ready(BindingSource),
    ResourceMethod {
        name: String,
        member: Option<BindingMemberDescriptor>,
    },
}

impl PreparedSource {
    pub(crate) fn new(transformed: &Transformed, resolver: &Arc<dyn ResourceResolver>) -> Self {
        let member = |index: usize| transformed.members.get(index).cloned();
        let source = match &transformed.shape {
            SourceShape::Constant(value) => BindingSource::Constant(value.clone()),
            SourceShape::Member(index) if *index < transformed.members.len() => {
                BindingSource::Member(transformed.members[*index].clone())
            }
            SourceShape::InverseMember(index) if *index < transformed.members.len() => BindingSource::Converted {
                member: member(*index),
                converter: Arc::new(InverseBooleanConverter),
            },
            SourceShape::ResourceMethod { name, member: index } => {
                return PreparedSource::ResourceMethod {
                    name: name.clone(),
                    member: index.and_then(member),
                };
            }
            _ => BindingSource::Expression(Arc::new(CompiledExpression::new(
                transformed.expression.clone(),
                transformed.members.clone(),
                resolver.clone(),
            ))),
        };
        PreparedSource::Ready(source)
    }

    pub(crate) fn build(
        &self,
        context: &BindingContext,
        resolver: &dyn ResourceResolver,
    ) -> Result<BindingSource, BindingError> {
        match self {
            PreparedSource::Ready(source) => Ok(source.clone()),
            PreparedSource::ResourceMethod { name, member } => {
                let method = resolver.resolve_method(name, context, true)?.ok_or_else(|| {
                    BindingError::from(ResolutionError::new(
                        ResolutionErrorKind::ResourceNotFound(name.clone()),
                        format!("${}", name),
                    ))
                })?;
                Ok(BindingSource::Converted {
                    member: member.clone(),
                    converter: Arc::new(MethodConverter::new(name.clone(), method, member.is_some())),
                })
            }
        }
    }
}

/// Parse state shared with the clause handlers.
pub(crate) struct Session<'a> {
    pub(crate) options: &'a ParserOptions,
    pub(crate) resolver: &'a Arc<dyn ResourceResolver>,
    pub(crate) context: &'a BindingContext,
}

impl Session<'_> {
    pub(crate) fn transform(&self, expr: Expr) -> Result<Transformed, BindingError> {
        Pipeline::new(self.options, self.resolver.as_ref(), self.context).run(expr)
    }
}

/// One `Target Source, Clauses` binding.
pub struct ParsedBinding {
    pub target: MemberPath,
    /// `None` when the binding reads the data context itself
    pub source: Option<Transformed>,
    pub actions: Vec<ConfigAction>,
}

impl fmt::Debug for ParsedBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedBinding")
            .field("target", &self.target.to_string())
            .field("source", &self.source.as_ref().map(|s| s.expression.to_string()))
            .field("actions", &self.actions.len())
            .finish()
    }
}

/// Actions of each `;`-separated binding of one expression string.
pub type BindingActions = Arc<Vec<Vec<ConfigAction>>>;

/// Parses binding expressions into configuration actions, caching the
/// result per expression string.
///
/// # Example
/// ```
/// use bindexpr::{BindingContext, BindingParser, ResourceRegistry, keys};
/// use std::sync::Arc;
///
/// let parser = BindingParser::new(Arc::new(ResourceRegistry::new()));
/// let bindings = parser.parse("Text Name, Mode=OneWay").unwrap();
/// let context = BindingContext::new();
/// for action in &bindings[0] {
///     action(&context).unwrap();
/// }
/// assert!(context.contains(keys::SOURCE));
/// ```
pub struct BindingParser {
    options: ParserOptions,
    resolver: Arc<dyn ResourceResolver>,
    handlers: Vec<Arc<dyn ExpressionHandler>>,
    context: BindingContext,
    cache: Mutex<HashMap<String, BindingActions>>,
}

impl BindingParser {
    pub fn new(resolver: Arc<dyn ResourceResolver>) -> Self {
        BindingParser {
            options: ParserOptions::default(),
            resolver,
            handlers: vec![],
            context: BindingContext::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_options(mut self, options: ParserOptions) -> Self {
        self.options = options;
        self
    }

    /// Handlers run in registration order.
    pub fn with_handler(mut self, handler: impl ExpressionHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Context the resolver sees for lookups made while parsing.
    pub fn with_context(mut self, context: BindingContext) -> Self {
        self.context = context;
        self
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn resolver(&self) -> &Arc<dyn ResourceResolver> {
        &self.resolver
    }

    fn preprocess(&self, text: &str) -> String {
        self.handlers
            .iter()
            .fold(text.to_string(), |text, handler| handler.handle(&text).unwrap_or(text))
    }

    fn session(&self) -> Session<'_> {
        Session {
            options: &self.options,
            resolver: &self.resolver,
            context: &self.context,
        }
    }

    /// Actions for `text`, parsed on first use.
    ///
    /// The cache lock is held while parsing; a failed parse caches nothing.
    pub fn parse(&self, text: &str) -> Result<BindingActions, BindingError> {
        let mut cache = self.cache.lock();
        if let Some(actions) = cache.get(text) {
            return Ok(actions.clone());
        }
        debug!("parsing binding expression '{}'", text);
        let actions: BindingActions = Arc::new(
            self.parse_bindings(text)?
                .into_iter()
                .map(|binding| binding.actions)
                .collect(),
        );
        cache.insert(text.to_string(), actions.clone());
        Ok(actions)
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn cached_expressions(&self) -> usize {
        self.cache.lock().len()
    }

    /// Parses every binding of `text` without caching.
    pub fn parse_bindings(&self, text: &str) -> Result<Vec<ParsedBinding>, BindingError> {
        let text = self.preprocess(text);
        ExpressionParser::new(&text, &self.options)?.parse_bindings(&self.session())
    }

    /// Raw expression tree of `text`, before any rewrite pass.
    pub fn parse_expression(&self, text: &str) -> Result<Expr, BindingError> {
        let text = self.preprocess(text);
        ExpressionParser::new(&text, &self.options)?.parse_complete()
    }

    pub fn parse_target_path(&self, text: &str) -> Result<MemberPath, BindingError> {
        ExpressionParser::new(text, &self.options)?.parse_target_path()
    }

    /// Parses and rewrites a source expression.
    pub fn transform(&self, text: &str) -> Result<Transformed, BindingError> {
        let expr = self.parse_expression(text)?;
        self.session().transform(expr)
    }

    /// Binding source of a standalone source expression.
    pub fn compile(&self, text: &str) -> Result<BindingSource, BindingError> {
        let transformed = self.transform(text)?;
        PreparedSource::new(&transformed, &self.resolver).build(&self.context, self.resolver.as_ref())
    }
}

impl fmt::Debug for BindingParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingParser")
            .field("options", &self.options)
            .field("handlers", &self.handlers.len())
            .field("cached_expressions", &self.cached_expressions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Expr {
        let options = ParserOptions::default();
        ExpressionParser::new(text, &options)
            .unwrap()
            .parse_complete()
            .unwrap()
    }

    #[test]
    fn test_priority_reduction() {
        assert_eq!(parse("1 + 2 * 3").to_string(), "(1 + (2 * 3))");
        assert_eq!(parse("1 - 2 - 3").to_string(), "((1 - 2) - 3)");
        assert_eq!(parse("A || B && C").to_string(), "(A || (B && C))");
    }

    #[test]
    fn test_word_aliases() {
        assert_eq!(parse("not A and B").to_string(), "(!A && B)");
        assert_eq!(parse("A mod 2 eq 0").to_string(), "((A % 2) == 0)");
    }

    #[test]
    fn test_minus_folds_into_literal() {
        assert_eq!(parse("-5"), Expr::Constant(Value::Int32(-5)));
        assert_eq!(parse("-2147483648"), Expr::Constant(Value::Int32(i32::MIN)));
        assert_eq!(parse("-2147483649"), Expr::Constant(Value::Int64(-2147483649)));
        assert_eq!(parse("-5L"), Expr::Constant(Value::Int64(-5)));
    }

    #[test]
    fn test_char_and_string_literals() {
        assert_eq!(parse("'x'"), Expr::Constant(Value::Char('x')));
        assert_eq!(parse("'xy'"), Expr::Constant(Value::from("xy")));
        assert_eq!(parse("\"a\"\"b\""), Expr::Constant(Value::from("a\"b")));
        assert_eq!(parse(r#""a\nb""#), Expr::Constant(Value::from("a\nb")));
    }

    #[test]
    fn test_lambda_parameters_bind_in_body() {
        let expr = parse("Items.Where((x, i) => x > i)");
        let Expr::MethodCall { args, .. } = expr else {
            panic!("expected a call");
        };
        assert_eq!(args[0].to_string(), "(x, i) => (x > i)");
        assert!(matches!(&args[0], Expr::Lambda { body, .. }
            if matches!(body.as_ref(), Expr::Binary { left, .. } if matches!(left.as_ref(), Expr::Parameter(_)))));
    }

    #[test]
    fn test_duplicate_lambda_parameter() {
        let options = ParserOptions::default();
        let err = ExpressionParser::new("Items.Any((x, x) => x)", &options)
            .unwrap()
            .parse_complete()
            .unwrap_err();
        assert!(matches!(
            err,
            BindingError::Parse(ParseError {
                kind: ParseErrorKind::DuplicateLambdaParameter(_),
                ..
            })
        ));
    }

    #[test]
    fn test_binding_mode_names_are_case_insensitive() {
        let options = ParserOptions::default();
        assert_eq!(options.binding_mode("oneway"), Some(BindingMode::OneWay));
        assert_eq!(options.binding_mode("Sideways"), None);
    }
}
