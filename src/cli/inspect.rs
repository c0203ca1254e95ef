//! `bindexpr tokens` and `bindexpr parse`: look inside the front end.

use std::sync::Arc;

use super::CliError;
use crate::{BindingParser, ParserOptions, ResourceRegistry, Token, TokenKind, Tokenizer};

/// Every token of `text`, whitespace skipped, ending with `Eof`.
pub fn execute_tokens(text: &str, lenient: bool) -> Result<Vec<Token>, CliError> {
    let mut tokenizer = Tokenizer::with_source(text, !lenient)?;
    let mut tokens = vec![];
    loop {
        let token = tokenizer.next_token(true)?;
        let done = token.is(TokenKind::Eof);
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

/// One line per binding: target path, rewritten source and member keys.
pub fn describe_bindings(text: &str, lenient: bool) -> Result<Vec<String>, CliError> {
    let options = if lenient {
        ParserOptions::default().lenient()
    } else {
        ParserOptions::default()
    };
    let parser = BindingParser::new(Arc::new(ResourceRegistry::new())).with_options(options);
    let lines = parser
        .parse_bindings(text)?
        .into_iter()
        .map(|binding| {
            let source = match &binding.source {
                Some(source) => {
                    let keys: Vec<&str> = source.members.iter().map(|m| m.key.as_str()).collect();
                    format!("{} [{}]", source.expression, keys.join(", "))
                }
                None => "$context".to_string(),
            };
            format!(
                "{} <- {} ({} actions)",
                binding.target,
                source,
                binding.actions.len()
            )
        })
        .collect();
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_end_with_eof() {
        let tokens = execute_tokens("A.B + 1", false).unwrap();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::Plus,
                TokenKind::IntegerLiteral,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_describe_two_bindings() {
        let lines = describe_bindings("Text Name; Visible IsActive, Mode=OneWay", false).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Text <- "));
        assert!(lines[1].contains("IsActive"));
    }
}
