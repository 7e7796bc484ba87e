use std::collections::HashSet;

use crate::error::ExpandError;
use crate::macro_def::MacroDefinition;
use crate::token::{
    Position, Spacing, Token, TokenKind, is_identifier_continue, is_identifier_start,
};

/// A recognized `#` line
#[derive(Debug)]
pub(crate) enum Directive {
    Define(MacroDefinition),
    Undef(String),
    /// Any other directive; passed through untouched
    Other,
}

/// Recognize a directive line from its tokens.
///
/// Returns `Ok(None)` for ordinary lines.
pub(crate) fn parse_directive(tokens: &[Token]) -> Result<Option<Directive>, ExpandError> {
    let Some(hash) = tokens
        .first()
        .filter(|t| t.kind == TokenKind::Punct && t.text == "#")
    else {
        return Ok(None);
    };

    let rest = &tokens[1..];
    let directive = match rest.first().and_then(Token::as_identifier) {
        Some("define") => {
            Directive::Define(parse_define(&rest[1..], hash.position)?.defined_at(hash.position))
        }
        Some("undef") => Directive::Undef(parse_undef(&rest[1..], hash.position)?),
        _ => Directive::Other,
    };
    Ok(Some(directive))
}

/// Parse what follows `#define`: a name, an optional parameter list touching
/// the name, then the body.
pub(crate) fn parse_define(tokens: &[Token], at: Position) -> Result<MacroDefinition, ExpandError> {
    let name_token = tokens
        .first()
        .ok_or_else(|| ExpandError::malformed("#define without a macro name", at))?;
    let name = name_token.as_identifier().ok_or_else(|| {
        ExpandError::malformed(
            format!("`{}` is not a valid macro name", name_token.text),
            name_token.position,
        )
    })?;

    let mut rest = &tokens[1..];
    let params = match rest.first() {
        // `#define F (x)` is object-like; only `F(` starts a parameter list
        Some(open) if open.kind == TokenKind::LParen && open.spacing == Spacing::Joint => {
            let (params, consumed) = parse_params(&rest[1..], name, open.position)?;
            rest = &rest[1 + consumed..];
            Some(params)
        }
        _ => None,
    };

    let body = rest.to_vec();
    let definition = match params {
        Some(params) => MacroDefinition::function(name, params, body),
        None => MacroDefinition::object(name, body),
    };
    Ok(definition)
}

/// Parse `a, b, c)`, returning the names and how many tokens were consumed
fn parse_params(
    tokens: &[Token],
    name: &str,
    open: Position,
) -> Result<(Vec<String>, usize), ExpandError> {
    let unterminated =
        || ExpandError::malformed(format!("unterminated parameter list for `{name}`"), open);

    let mut params: Vec<String> = Vec::new();
    let mut i = 0;
    if tokens.first().is_some_and(|t| t.kind == TokenKind::RParen) {
        return Ok((params, 1));
    }
    loop {
        let param = tokens.get(i).ok_or_else(unterminated)?;
        let id = param.as_identifier().ok_or_else(|| {
            ExpandError::malformed(
                format!("expected parameter name in `{name}`, found `{}`", param.text),
                param.position,
            )
        })?;
        params.push(id.to_string());
        i += 1;

        let sep = tokens.get(i).ok_or_else(unterminated)?;
        i += 1;
        match sep.kind {
            TokenKind::Comma => {}
            TokenKind::RParen => break,
            _ => {
                return Err(ExpandError::malformed(
                    format!("expected `,` or `)` in `{name}`, found `{}`", sep.text),
                    sep.position,
                ));
            }
        }
    }

    validate_params(name, &params, open)?;
    Ok((params, i))
}

fn parse_undef(tokens: &[Token], at: Position) -> Result<String, ExpandError> {
    tokens
        .first()
        .and_then(Token::as_identifier)
        .map(str::to_string)
        .ok_or_else(|| ExpandError::malformed("#undef without a macro name", at))
}

/// Check that `name` is a well-formed identifier
pub(crate) fn validate_name(name: &str, at: Position) -> Result<(), ExpandError> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(is_identifier_start) && chars.all(is_identifier_continue);
    if valid {
        Ok(())
    } else {
        Err(ExpandError::malformed(
            format!("`{name}` is not a valid macro name"),
            at,
        ))
    }
}

/// Check that parameters are identifiers and unique within the definition
pub(crate) fn validate_params<S: AsRef<str>>(
    name: &str,
    params: &[S],
    at: Position,
) -> Result<(), ExpandError> {
    let mut seen = HashSet::with_capacity(params.len());
    for param in params {
        let param = param.as_ref();
        validate_name(param, at).map_err(|_| {
            ExpandError::malformed(
                format!("`{param}` is not a valid parameter name in `{name}`"),
                at,
            )
        })?;
        if !seen.insert(param) {
            return Err(ExpandError::malformed(
                format!("duplicate parameter `{param}` in `{name}`"),
                at,
            ));
        }
    }
    Ok(())
}
