use crate::token::{Spacing, Token, TokenKind, is_identifier_continue};

/// Punctuator pairs that would read back as a single operator
const MULTI_CHAR_OPERATORS: &[&str] = &[
    "++", "--", "->", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=", "-=", "*=", "/=",
    "%=", "&=", "|=", "^=", "##", "::", "//", "/*", "..",
];

/// Convert tokens back to a string.
///
/// Recorded whitespace becomes a single space. Where no adjacency was
/// recorded, a space is only inserted if the two tokens would otherwise
/// read back as something else.
pub fn render(tokens: &[Token]) -> String {
    let total_len: usize = tokens.iter().map(|t| t.text.len() + 1).sum();
    let mut out = String::with_capacity(total_len);
    let mut prev: Option<&Token> = None;
    for token in tokens {
        if let Some(prev) = prev {
            let separate = match token.spacing {
                Spacing::Joint => false,
                Spacing::Spaced => true,
                Spacing::Unrecorded => would_merge(prev, token),
            };
            if separate {
                out.push(' ');
            }
        }
        out.push_str(&token.text);
        prev = Some(token);
    }
    out
}

/// Whether writing `left` directly followed by `right` changes how they lex
fn would_merge(left: &Token, right: &Token) -> bool {
    let (Some(l), Some(r)) = (left.text.chars().last(), right.text.chars().next()) else {
        return false;
    };

    if is_identifier_continue(l) && (is_identifier_continue(r) || r == '"' || r == '\'') {
        return true;
    }
    if (left.kind == TokenKind::Number && r == '.')
        || (l == '.' && right.kind == TokenKind::Number)
    {
        return true;
    }
    if left.kind == TokenKind::Punct && right.kind == TokenKind::Punct {
        let mut pair = String::with_capacity(2);
        pair.push(l);
        pair.push(r);
        return MULTI_CHAR_OPERATORS.contains(&pair.as_str());
    }
    false
}
