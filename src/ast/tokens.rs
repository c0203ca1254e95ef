/// Kind of a lexical token.
///
/// The set is closed: every character sequence the tokenizer accepts maps
/// to exactly one of these kinds, and anything else becomes [`TokenKind::Unknown`]
/// (lenient mode) or a lexical error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Unrecognised input, produced only in lenient mode
    Unknown,
    /// End of input
    Eof,
    /// A run of whitespace (only when the caller asks not to skip it)
    Whitespace,

    // Literals and names
    /// Name such as `Text`, `_value` or `@class`
    Identifier,
    /// Integer literal with an optional `u`, `l`, `ul` or `lu` suffix
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 10u
    /// 10UL
    /// ```
    IntegerLiteral,
    /// Real literal: fraction, exponent or an `f`/`d`/`m` suffix
    ///
    /// # Examples
    /// ```text
    /// 1.5
    /// 1e3
    /// 1.5f
    /// 2m
    /// ```
    RealLiteral,
    /// `"text"` or `'c'` with doubled-quote escapes
    StringLiteral,

    // Operators
    /// `!`
    Exclamation,
    /// `!=` or `<>`
    NotEqual,
    /// `%`
    Percent,
    /// `&`
    Ampersand,
    /// `&&`
    DoubleAmpersand,
    /// `*`
    Asterisk,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `/`
    Slash,
    /// `<`
    LessThan,
    /// `<=`
    LessThanEqual,
    /// `=`
    Equal,
    /// `==`
    DoubleEqual,
    /// `=>`
    Lambda,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanEqual,
    /// `?`
    Question,
    /// `??`
    DoubleQuestion,
    /// `?.`
    QuestionDot,
    /// `?[`
    QuestionBracket,
    /// `|`
    Bar,
    /// `||`
    DoubleBar,
    /// `^`
    Caret,
    /// `~`
    Tilde,
    /// `$`
    Dollar,
    /// `$$`
    DoubleDollar,

    // Punctuation
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
    /// `()` scanned as a single token
    EmptyParen,
    /// `[`
    OpenBracket,
    /// `]`
    CloseBracket,
    /// `{`
    OpenBrace,
    /// `}`
    CloseBrace,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `:`
    Colon,
    /// `.`
    Dot,
}

/// A token with its raw text and start position (in characters).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            position,
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// True when the token is the identifier `word` (case-sensitive).
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text == word
    }
}
