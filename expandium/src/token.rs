use std::fmt;

/// Check if a character can start an identifier (letter or underscore)
pub const fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Check if a character can continue an identifier (letter, digit, or underscore)
pub const fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Line and column of a token's first character, both 1-based
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    /// Line number
    pub line: usize,
    /// Column number, counted in characters
    pub column: usize,
}

impl Position {
    /// Create a position from a line and column
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Lexical category of a token
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `[A-Za-z_][A-Za-z0-9_]*`
    Identifier,
    /// Digits with an optional fractional part
    Number,
    /// A double-quoted literal, quotes included
    StringLiteral,
    /// A single-quoted literal, quotes included
    CharLiteral,
    /// Any other single character
    Punct,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
}

/// How a token relates to the token before it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Spacing {
    /// Directly adjacent in the text it came from
    Joint,
    /// Separated by whitespace or a comment in the text it came from
    Spaced,
    /// Put next to its predecessor by substitution, so no adjacency was recorded
    Unrecorded,
}

impl Spacing {
    /// Combine two spacings; recorded whitespace wins over everything else.
    #[must_use]
    pub const fn merge(self, other: Spacing) -> Spacing {
        match (self, other) {
            (Spacing::Spaced, _) | (_, Spacing::Spaced) => Spacing::Spaced,
            (Spacing::Unrecorded, _) | (_, Spacing::Unrecorded) => Spacing::Unrecorded,
            (Spacing::Joint, Spacing::Joint) => Spacing::Joint,
        }
    }

    /// Drop a recorded adjacency, keeping recorded whitespace.
    #[must_use]
    pub const fn loosened(self) -> Spacing {
        match self {
            Spacing::Joint => Spacing::Unrecorded,
            other => other,
        }
    }
}

/// A lexical token
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    /// Lexical category
    pub kind: TokenKind,
    /// Literal source text
    pub text: String,
    /// Relation to the previous token
    pub spacing: Spacing,
    /// Where the token starts
    pub position: Position,
}

impl Token {
    /// Create a token
    pub fn new<S: Into<String>>(
        kind: TokenKind,
        text: S,
        spacing: Spacing,
        position: Position,
    ) -> Self {
        Self {
            kind,
            text: text.into(),
            spacing,
            position,
        }
    }

    /// Compare by kind and text only, ignoring spacing and position
    #[must_use]
    pub fn same_lexeme(&self, other: &Token) -> bool {
        self.kind == other.kind && self.text == other.text
    }

    /// The identifier text, if this token is one
    #[must_use]
    pub fn as_identifier(&self) -> Option<&str> {
        match self.kind {
            TokenKind::Identifier => Some(&self.text),
            _ => None,
        }
    }

    pub(crate) fn with_spacing(mut self, spacing: Spacing) -> Self {
        self.spacing = spacing;
        self
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
