use std::iter::{FusedIterator, Peekable};
use std::str::Chars;

use crate::error::{ErrorKind, ExpandError};
use crate::token::{
    Position, Spacing, Token, TokenKind, is_identifier_continue, is_identifier_start,
};

/// Lazy tokenizer over a borrowed source string.
///
/// Whitespace and comments are skipped; their presence is recorded as
/// [`Spacing::Spaced`] on the token that follows them.
pub struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
    first: bool,
}

impl<'a> Tokenizer<'a> {
    /// Tokenize `src` with positions starting at line 1
    #[must_use]
    pub fn new(src: &'a str) -> Self {
        Self::starting_at(src, 1)
    }

    /// Tokenize `src` with positions starting at `line`
    #[must_use]
    pub fn starting_at(src: &'a str, line: usize) -> Self {
        Self {
            chars: src.chars().peekable(),
            line,
            column: 1,
            first: true,
        }
    }

    fn current_position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next()
    }

    /// Skip whitespace and comments, returning whether anything was skipped
    fn skip_trivia(&mut self) -> bool {
        let mut skipped = false;
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '/' && self.peek_second() == Some('/') {
                while let Some(&c2) = self.chars.peek() {
                    if c2 == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else if c == '/' && self.peek_second() == Some('*') {
                self.bump();
                self.bump();
                let mut prev = '\0';
                while let Some(c2) = self.bump() {
                    if prev == '*' && c2 == '/' {
                        break;
                    }
                    prev = c2;
                }
            } else {
                break;
            }
            skipped = true;
        }
        skipped
    }

    fn take_while<F: Fn(char) -> bool>(&mut self, s: &mut String, pred: F) {
        while let Some(&c) = self.chars.peek() {
            if !pred(c) {
                break;
            }
            s.push(c);
            self.bump();
        }
    }

    fn number(&mut self) -> String {
        let mut s = String::new();
        self.take_while(&mut s, |c| c.is_ascii_digit());
        if self.chars.peek() == Some(&'.') {
            s.push('.');
            self.bump();
            self.take_while(&mut s, |c| c.is_ascii_digit());
        }
        s
    }

    fn quoted(&mut self, quote: char) -> String {
        let mut s = String::new();
        if let Some(open) = self.bump() {
            s.push(open);
        }
        // An unterminated literal ends at the end of its line
        while let Some(&c) = self.chars.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
            s.push(c);
            if c == '\\' {
                if let Some(&escaped) = self.chars.peek()
                    && escaped != '\n'
                {
                    self.bump();
                    s.push(escaped);
                }
            } else if c == quote {
                break;
            }
        }
        s
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let skipped = self.skip_trivia();
        let spacing = if skipped && !self.first {
            Spacing::Spaced
        } else {
            Spacing::Joint
        };
        let position = self.current_position();
        let &c = self.chars.peek()?;
        self.first = false;

        let (kind, text) = if is_identifier_start(c) {
            let mut s = String::new();
            self.take_while(&mut s, is_identifier_continue);
            (TokenKind::Identifier, s)
        } else if c.is_ascii_digit() {
            (TokenKind::Number, self.number())
        } else if c == '"' {
            (TokenKind::StringLiteral, self.quoted('"'))
        } else if c == '\'' {
            (TokenKind::CharLiteral, self.quoted('\''))
        } else {
            self.bump();
            let kind = match c {
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                ',' => TokenKind::Comma,
                _ => TokenKind::Punct,
            };
            (kind, c.to_string())
        };

        Some(Token::new(kind, text, spacing, position))
    }
}

impl FusedIterator for Tokenizer<'_> {}

/// Tokenize a whole string
pub fn tokenize(src: &str) -> Vec<Token> {
    Tokenizer::new(src).collect()
}

/// Validate `bytes` as UTF-8, then tokenize.
///
/// # Errors
/// Returns [`ErrorKind::EncodingError`] located at the first invalid byte.
pub fn tokenize_bytes(bytes: &[u8]) -> Result<Vec<Token>, ExpandError> {
    Ok(tokenize(decode(bytes)?))
}

/// Decode `bytes` as UTF-8, locating the first invalid byte on failure.
pub(crate) fn decode(bytes: &[u8]) -> Result<&str, ExpandError> {
    std::str::from_utf8(bytes).map_err(|e| {
        let valid = &bytes[..e.valid_up_to()];
        let line = 1 + valid.iter().filter(|&&b| b == b'\n').count();
        let line_start = valid
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |p| p + 1);
        // Column counts characters, and the prefix is known to be valid.
        let column = 1 + String::from_utf8_lossy(&valid[line_start..]).chars().count();
        ExpandError::at(ErrorKind::EncodingError, Position::new(line, column))
    })
}

/// Join lines ending with a backslash with the following line
pub fn splice_lines(input: &str) -> String {
    if !input.contains('\\') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.peek() {
                Some(&'\n') => {
                    chars.next();
                }
                Some(&'\r') => {
                    chars.next();
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                }
                _ => out.push(ch),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Physical line number on which each line of [`splice_lines`] output starts
pub(crate) fn logical_line_starts(input: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut continued = false;
    for (idx, line) in input.split('\n').enumerate() {
        if !continued {
            starts.push(idx + 1);
        }
        continued = line.ends_with('\\') || line.ends_with("\\\r");
    }
    starts
}

/// Replace comments with a space, keeping newlines from block comments so
/// line numbers stay put. Quoted literals are left alone.
pub fn strip_comments(input: &str) -> String {
    if !input.contains('/') {
        return input.to_string();
    }

    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        match quote {
            Some(q) => {
                result.push(ch);
                if ch == '\\' {
                    if let Some(escaped) = chars.next() {
                        result.push(escaped);
                    }
                } else if ch == q || ch == '\n' {
                    quote = None;
                }
            }
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                result.push(ch);
            }
            None if ch == '/' && chars.peek() == Some(&'/') => {
                result.push(' ');
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            None if ch == '/' && chars.peek() == Some(&'*') => {
                chars.next();
                result.push(' ');
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    if c == '\n' {
                        result.push('\n');
                    }
                    prev = c;
                }
            }
            None => result.push(ch),
        }
    }
    result
}
