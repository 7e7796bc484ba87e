use crate::error::{ErrorKind, ExpandError};
use crate::macro_def::MacroDefinition;
use crate::table::MacroTable;
use crate::token::{Token, TokenKind};

type MacroArguments = Vec<Vec<Token>>;
type MacroParseResult = (MacroArguments, usize);

/// A located macro invocation
#[derive(Clone, Debug)]
pub struct Invocation<'t> {
    /// The definition being invoked
    pub definition: &'t MacroDefinition,
    /// Index of the macro name token
    pub start: usize,
    /// Index just past the invocation (past `)` for function-like macros)
    pub end: usize,
    /// Raw, unexpanded argument tokens, one list per parameter
    pub args: MacroArguments,
}

impl Invocation<'_> {
    /// Number of tokens covered by the invocation
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Always false: an invocation covers at least its name
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Detect a macro invocation starting at `pos`.
///
/// A function-like macro name not followed by `(` is not an invocation.
///
/// # Errors
/// Returns [`ErrorKind::UnterminatedInvocation`] if the argument list never
/// closes, and [`ErrorKind::ArgumentCountMismatch`] if the number of
/// arguments differs from the number of parameters.
pub fn scan_invocation<'t>(
    tokens: &[Token],
    pos: usize,
    table: &'t MacroTable,
) -> Result<Option<Invocation<'t>>, ExpandError> {
    let Some(name_token) = tokens.get(pos) else {
        return Ok(None);
    };
    let Some(definition) = name_token.as_identifier().and_then(|n| table.lookup(n)) else {
        return Ok(None);
    };

    let Some(params) = definition.params() else {
        return Ok(Some(Invocation {
            definition,
            start: pos,
            end: pos + 1,
            args: Vec::new(),
        }));
    };

    let opens_call = tokens
        .get(pos + 1)
        .is_some_and(|t| t.kind == TokenKind::LParen);
    if !opens_call {
        return Ok(None);
    }

    let (mut args, end) = parse_macro_arguments(tokens, pos + 1).ok_or_else(|| {
        ExpandError::for_macro(
            ErrorKind::UnterminatedInvocation,
            definition.name(),
            name_token.position,
        )
    })?;

    // `F()` passes no arguments to a zero-parameter macro, one empty argument otherwise
    if params.is_empty() && args.len() == 1 && args[0].is_empty() {
        args.clear();
    }

    if args.len() != params.len() {
        return Err(ExpandError::for_macro(
            ErrorKind::ArgumentCountMismatch {
                expected: params.len(),
                actual: args.len(),
            },
            definition.name(),
            name_token.position,
        ));
    }

    Ok(Some(Invocation {
        definition,
        start: pos,
        end,
        args,
    }))
}

/// Split the tokens after the `(` at `open` into top-level arguments.
///
/// Returns the arguments and the index just past the matching `)`, or
/// `None` if the input ends first.
fn parse_macro_arguments(tokens: &[Token], open: usize) -> Option<MacroParseResult> {
    let mut args: MacroArguments = Vec::with_capacity(4);
    let mut current_arg: Vec<Token> = Vec::with_capacity(8);
    let mut paren_balance = 1usize;

    for (k, t) in tokens.iter().enumerate().skip(open + 1) {
        match t.kind {
            TokenKind::LParen => paren_balance += 1,
            TokenKind::RParen => {
                paren_balance -= 1;
                if paren_balance == 0 {
                    args.push(current_arg);
                    return Some((args, k + 1));
                }
            }
            TokenKind::Comma if paren_balance == 1 => {
                args.push(std::mem::take(&mut current_arg));
                continue;
            }
            _ => {}
        }
        current_arg.push(t.clone());
    }
    None
}
