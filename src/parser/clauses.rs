//! Binding clauses: the `Name=Value` pairs after the source expression.
//!
//! ```text
//! Text Price, Mode=OneWay, Converter=Currency, Fallback='n/a', Delay=200
//! ```
//!
//! Names are matched case-insensitively against a fixed table. A name not
//! in the table must be followed by `=true` or `=false` and attaches a
//! behavior resolved through the resource resolver.

use std::{collections::HashMap, sync::Arc, sync::LazyLock};

use crate::{
    ast::{Token, TokenKind},
    context::{BindingContext, ConfigAction, ContextKey, ConverterObject, ParameterValue, keys},
    error::{BindingError, ConfigurationError, ParseErrorKind},
    parser::{ExpressionParser, PreparedSource, Session},
    transform::SourceShape,
    value::Value,
};

type ClauseHandler = fn(&mut ExpressionParser<'_>, &Session<'_>, &Token) -> Result<ConfigAction, BindingError>;

static CLAUSES: LazyLock<HashMap<&'static str, ClauseHandler>> = LazyLock::new(|| {
    let mut table: HashMap<&'static str, ClauseHandler> = HashMap::new();
    for name in ["mode", "m"] {
        table.insert(name, parse_mode);
    }
    for name in ["converter", "conv"] {
        table.insert(name, parse_converter);
    }
    for name in ["converterparameter", "converterparam", "parameter"] {
        table.insert(name, |p, s, t| parse_parameter(p, s, t, keys::CONVERTER_PARAMETER));
    }
    for name in ["converterculture", "culture"] {
        table.insert(name, |p, s, t| parse_parameter(p, s, t, keys::CONVERTER_CULTURE));
    }
    table.insert("fallback", |p, s, t| parse_parameter(p, s, t, keys::FALLBACK));
    for name in ["targetnullvalue", "nullvalue"] {
        table.insert(name, |p, s, t| parse_parameter(p, s, t, keys::TARGET_NULL_VALUE));
    }
    for name in ["commandparameter", "commandparam", "cmdparam"] {
        table.insert(name, |p, s, t| parse_parameter(p, s, t, keys::COMMAND_PARAMETER));
    }
    table.insert("delay", |p, _, t| parse_delay(p, t, keys::DELAY));
    table.insert("targetdelay", |p, _, t| parse_delay(p, t, keys::TARGET_DELAY));
    table
});

fn malformed(name: &Token, message: impl Into<String>) -> BindingError {
    ConfigurationError::MalformedClause {
        clause: name.text.clone(),
        message: message.into(),
    }
    .into()
}

/// Parses one clause after its leading comma.
pub(crate) fn parse_clause(
    parser: &mut ExpressionParser<'_>,
    session: &Session<'_>,
) -> Result<ConfigAction, BindingError> {
    let name = parser.expect(TokenKind::Identifier)?;
    match CLAUSES.get(name.text.to_ascii_lowercase().as_str()) {
        Some(handler) => {
            parser.expect(TokenKind::Equal)?;
            handler(parser, session, &name)
        }
        None => parse_behavior(parser, session, &name),
    }
}

fn parse_mode(
    parser: &mut ExpressionParser<'_>,
    session: &Session<'_>,
    _name: &Token,
) -> Result<ConfigAction, BindingError> {
    let value = parser.expect(TokenKind::Identifier)?;
    let mode = session.options.binding_mode(&value.text).ok_or_else(|| {
        BindingError::from(ConfigurationError::UnknownMode {
            name: value.text.clone(),
            valid: session.options.binding_mode_names(),
        })
    })?;
    Ok(Arc::new(move |context: &BindingContext| {
        context.add(keys::MODE, mode);
        Ok(())
    }))
}

/// `Converter=Name` or `Converter=$Name` names a registered converter; any
/// other expression must evaluate to a converter value when the action runs.
fn parse_converter(
    parser: &mut ExpressionParser<'_>,
    session: &Session<'_>,
    name: &Token,
) -> Result<ConfigAction, BindingError> {
    let offset = usize::from(parser.check(TokenKind::Dollar));
    let named = parser.peek_kind(offset) == TokenKind::Identifier
        && matches!(
            parser.peek_kind(offset + 1),
            TokenKind::Comma | TokenKind::Semicolon | TokenKind::Eof
        );
    let resolver = session.resolver.clone();
    if named {
        if offset == 1 {
            parser.advance();
        }
        let converter = parser.advance().text;
        return Ok(Arc::new(move |context: &BindingContext| {
            if let Some(resolved) = resolver.resolve_converter(&converter, context, true)? {
                context.add(keys::CONVERTER, resolved);
            }
            Ok(())
        }));
    }

    let expr = parser.parse_expression()?;
    let transformed = session.transform(expr)?;
    let prepared = PreparedSource::new(&transformed, session.resolver);
    let clause = name.clone();
    Ok(Arc::new(move |context: &BindingContext| {
        let value = prepared
            .build(context, resolver.as_ref())?
            .evaluate_in(context, resolver.as_ref())?;
        let converter = ConverterObject::from_value(&value).ok_or_else(|| {
            malformed(
                &clause,
                format!("a {} value is not a converter", value.value_type()),
            )
        })?;
        context.add(keys::CONVERTER, converter);
        Ok(())
    }))
}

/// A literal or any source expression. Expressions without members are
/// evaluated once when the action runs; the others per context.
fn parse_parameter(
    parser: &mut ExpressionParser<'_>,
    session: &Session<'_>,
    _name: &Token,
    key: ContextKey<ParameterValue>,
) -> Result<ConfigAction, BindingError> {
    let expr = parser.parse_expression()?;
    let transformed = session.transform(expr)?;
    if let SourceShape::Constant(value) = &transformed.shape {
        let value = ParameterValue::Constant(value.clone());
        return Ok(Arc::new(move |context: &BindingContext| {
            context.add(key, value.clone());
            Ok(())
        }));
    }

    let per_context = !transformed.is_context_free();
    let prepared = PreparedSource::new(&transformed, session.resolver);
    let resolver = session.resolver.clone();
    Ok(Arc::new(move |context: &BindingContext| {
        let source = prepared.build(context, resolver.as_ref())?;
        let value = if per_context {
            ParameterValue::PerContext(source)
        } else {
            ParameterValue::Constant(source.evaluate(context, &[])?)
        };
        context.add(key, value);
        Ok(())
    }))
}

/// Milliseconds as an integer literal.
fn parse_delay(
    parser: &mut ExpressionParser<'_>,
    name: &Token,
    key: ContextKey<u32>,
) -> Result<ConfigAction, BindingError> {
    if !parser.check(TokenKind::IntegerLiteral) {
        return Err(malformed(name, "expected a delay in milliseconds"));
    }
    let token = parser.advance();
    let delay: u32 = token
        .text
        .parse()
        .map_err(|_| malformed(name, format!("'{}' is not a valid delay", token.text)))?;
    Ok(Arc::new(move |context: &BindingContext| {
        context.add(key, delay);
        Ok(())
    }))
}

/// `Name=true|false` for any name outside the clause table.
fn parse_behavior(
    parser: &mut ExpressionParser<'_>,
    session: &Session<'_>,
    name: &Token,
) -> Result<ConfigAction, BindingError> {
    let missing_flag =
        |parser: &ExpressionParser<'_>| parser.error(ParseErrorKind::MissingBehaviorFlag(name.text.clone()));
    if !parser.check(TokenKind::Equal) {
        return Err(missing_flag(parser));
    }
    parser.advance();
    let enabled = match parser.current_token().text.as_str() {
        "true" if parser.check(TokenKind::Identifier) => true,
        "false" if parser.check(TokenKind::Identifier) => false,
        _ => return Err(missing_flag(parser)),
    };
    parser.advance();

    let behavior = name.text.clone();
    let resolver = session.resolver.clone();
    Ok(Arc::new(move |context: &BindingContext| {
        if let Some(resolved) = resolver.resolve_behavior(&behavior, context, &[Value::Bool(enabled)], true)? {
            context.push(keys::BEHAVIORS, resolved);
        }
        Ok(())
    }))
}
