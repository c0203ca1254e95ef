use log::warn;

use crate::{
    ast::{Token, TokenKind},
    error::{LexicalError, LexicalErrorKind},
};

/// Single-pass tokenizer for binding expressions.
///
/// The tokenizer is re-seedable: [`Tokenizer::set_source`] resets it to the
/// start of a new text. With `throw_on_error` cleared it never fails on bad
/// input and emits [`TokenKind::Unknown`] tokens instead.
pub struct Tokenizer {
    input: Vec<char>,
    position: usize,
    throw_on_error: bool,
}

impl Tokenizer {
    pub fn new(throw_on_error: bool) -> Self {
        Tokenizer {
            input: Vec::new(),
            position: 0,
            throw_on_error,
        }
    }

    /// Creates a tokenizer already seeded with `source`.
    pub fn with_source(source: &str, throw_on_error: bool) -> Result<Self, LexicalError> {
        let mut tokenizer = Tokenizer::new(throw_on_error);
        tokenizer.set_source(source)?;
        Ok(tokenizer)
    }

    pub fn set_source(&mut self, source: &str) -> Result<(), LexicalError> {
        if source.is_empty() {
            return Err(LexicalError {
                kind: LexicalErrorKind::EmptyInput,
                position: 0,
                character: None,
            });
        }
        self.input = source.chars().collect();
        self.position = 0;
        Ok(())
    }

    pub fn throw_on_error(&self) -> bool {
        self.throw_on_error
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Consumes the current char and, if the next one is `second`, that one too.
    fn one_or_two(&mut self, second: char, double: TokenKind, single: TokenKind) -> TokenKind {
        self.advance();
        if self.current_char() == Some(second) {
            self.advance();
            double
        } else {
            single
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn read_identifier(&mut self) -> TokenKind {
        self.advance();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        TokenKind::Identifier
    }

    fn read_string(&mut self, quote: char, start: usize) -> Result<TokenKind, LexicalError> {
        loop {
            self.advance(); // opening quote, or second half of a doubled quote
            while let Some(ch) = self.current_char() {
                if ch == quote {
                    break;
                }
                if ch == '\\' && self.peek_char(1).is_some() {
                    self.advance();
                }
                self.advance();
            }

            if self.current_char().is_none() {
                if self.throw_on_error {
                    return Err(LexicalError {
                        kind: LexicalErrorKind::UnterminatedString,
                        position: start,
                        character: Some(quote),
                    });
                }
                warn!("unterminated string literal at position {}", start);
                return Ok(TokenKind::Unknown);
            }

            self.advance(); // closing quote
            if self.current_char() != Some(quote) {
                return Ok(TokenKind::StringLiteral);
            }
        }
    }

    fn read_digits(&mut self) {
        while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn read_number(&mut self) -> TokenKind {
        let mut is_real = false;
        self.read_digits();

        if self.current_char() == Some('.') {
            self.advance();
            if self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                is_real = true;
                self.read_digits();
            } else {
                // Not a fraction: the dot belongs to the next token.
                self.position -= 1;
            }
        }

        self.finish_number(is_real)
    }

    /// Exponent and type suffix shared by `12.5e3f` and `.5f`.
    fn finish_number(&mut self, mut is_real: bool) -> TokenKind {
        if matches!(self.current_char(), Some('e' | 'E')) {
            let digit_at = if matches!(self.peek_char(1), Some('+' | '-')) { 2 } else { 1 };
            if self.peek_char(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_real = true;
                self.position += digit_at;
                self.read_digits();
            }
        }

        match self.current_char().map(|c| c.to_ascii_lowercase()) {
            Some('f' | 'd' | 'm') => {
                self.advance();
                is_real = true;
            }
            Some('u') if !is_real => {
                self.advance();
                if matches!(self.current_char(), Some('l' | 'L')) {
                    self.advance();
                }
            }
            Some('l') if !is_real => {
                self.advance();
                if matches!(self.current_char(), Some('u' | 'U')) {
                    self.advance();
                }
            }
            _ => {}
        }

        if is_real {
            TokenKind::RealLiteral
        } else {
            TokenKind::IntegerLiteral
        }
    }

    fn unexpected(&mut self, ch: char) -> Result<TokenKind, LexicalError> {
        if self.throw_on_error {
            return Err(LexicalError {
                kind: LexicalErrorKind::UnexpectedCharacter,
                position: self.position,
                character: Some(ch),
            });
        }
        warn!("unexpected character '{}' at position {}", ch, self.position);
        self.advance();
        Ok(TokenKind::Unknown)
    }

    /// Scans the next token.
    ///
    /// With `skip_whitespace` cleared, a run of whitespace is returned as a
    /// single [`TokenKind::Whitespace`] token.
    pub fn next_token(&mut self, skip_whitespace: bool) -> Result<Token, LexicalError> {
        if skip_whitespace {
            self.skip_whitespace();
        }

        let start = self.position;
        let Some(ch) = self.current_char() else {
            return Ok(Token::new(TokenKind::Eof, "", start));
        };

        let kind = match ch {
            c if c.is_whitespace() => {
                self.skip_whitespace();
                TokenKind::Whitespace
            }
            '!' => self.one_or_two('=', TokenKind::NotEqual, TokenKind::Exclamation),
            '%' => self.single(TokenKind::Percent),
            '&' => self.one_or_two('&', TokenKind::DoubleAmpersand, TokenKind::Ampersand),
            '(' => {
                if self.peek_char(1) == Some(')') {
                    self.position += 2;
                    TokenKind::EmptyParen
                } else {
                    self.single(TokenKind::OpenParen)
                }
            }
            ')' => self.single(TokenKind::CloseParen),
            '*' => self.single(TokenKind::Asterisk),
            '+' => self.single(TokenKind::Plus),
            ',' => self.single(TokenKind::Comma),
            '-' => self.single(TokenKind::Minus),
            '.' if self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.advance();
                self.read_digits();
                self.finish_number(true)
            }
            '.' => self.single(TokenKind::Dot),
            '/' => self.single(TokenKind::Slash),
            ':' => self.single(TokenKind::Colon),
            ';' => self.single(TokenKind::Semicolon),
            '<' => {
                self.advance();
                match self.current_char() {
                    Some('=') => self.single(TokenKind::LessThanEqual),
                    Some('>') => self.single(TokenKind::NotEqual),
                    _ => TokenKind::LessThan,
                }
            }
            '=' => {
                self.advance();
                match self.current_char() {
                    Some('=') => self.single(TokenKind::DoubleEqual),
                    Some('>') => self.single(TokenKind::Lambda),
                    _ => TokenKind::Equal,
                }
            }
            '>' => self.one_or_two('=', TokenKind::GreaterThanEqual, TokenKind::GreaterThan),
            '?' => {
                self.advance();
                match self.current_char() {
                    Some('?') => self.single(TokenKind::DoubleQuestion),
                    Some('[') => self.single(TokenKind::QuestionBracket),
                    // `a ?.5 : 1` is a conditional, not a null-conditional access
                    Some('.') if !self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) => {
                        self.single(TokenKind::QuestionDot)
                    }
                    _ => TokenKind::Question,
                }
            }
            '[' => self.single(TokenKind::OpenBracket),
            ']' => self.single(TokenKind::CloseBracket),
            '{' => self.single(TokenKind::OpenBrace),
            '}' => self.single(TokenKind::CloseBrace),
            '|' => self.one_or_two('|', TokenKind::DoubleBar, TokenKind::Bar),
            '^' => self.single(TokenKind::Caret),
            '~' => self.single(TokenKind::Tilde),
            '$' => self.one_or_two('$', TokenKind::DoubleDollar, TokenKind::Dollar),
            '"' | '\'' => self.read_string(ch, start)?,
            c if c.is_alphabetic() || c == '_' || c == '@' => self.read_identifier(),
            c if c.is_ascii_digit() => self.read_number(),
            c => self.unexpected(c)?,
        };

        let text: String = self.input[start..self.position].iter().collect();
        Ok(Token::new(kind, text, start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut tokenizer = Tokenizer::with_source(source, true).unwrap();
        let mut result = vec![];
        loop {
            let token = tokenizer.next_token(true).unwrap();
            if token.kind == TokenKind::Eof {
                return result;
            }
            result.push(token.kind);
        }
    }

    #[test]
    fn test_dot_after_digits_is_pushed_back() {
        assert_eq!(
            kinds("1.ToString()"),
            vec![
                TokenKind::IntegerLiteral,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::EmptyParen
            ]
        );
    }

    #[test]
    fn test_question_dot_before_digit() {
        assert_eq!(
            kinds("a ?.5 : 1"),
            vec![
                TokenKind::Identifier,
                TokenKind::Question,
                TokenKind::RealLiteral,
                TokenKind::Colon,
                TokenKind::IntegerLiteral
            ]
        );
    }
}
