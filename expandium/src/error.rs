use std::fmt;

use thiserror::Error;

use crate::token::Position;

/// What went wrong during definition or expansion
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// Input ended before the closing parenthesis of an invocation
    #[error("unterminated invocation")]
    UnterminatedInvocation,
    /// Wrong number of arguments for a function-like macro
    #[error("argument count mismatch: expected {expected}, got {actual}")]
    ArgumentCountMismatch {
        /// Number of declared parameters
        expected: usize,
        /// Number of arguments found at the call site
        actual: usize,
    },
    /// Expansion nested deeper than the configured limit
    #[error("macro recursion limit of {limit} exceeded")]
    RecursionLimitExceeded {
        /// The configured limit
        limit: usize,
    },
    /// Input bytes were not valid UTF-8
    #[error("invalid UTF-8 in input")]
    EncodingError,
    /// A macro definition or directive could not be accepted
    #[error("malformed definition: {0}")]
    MalformedDefinition(String),
}

/// Structured error returned by the engine
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind}{} at {position}", describe_macro(.macro_name))]
pub struct ExpandError {
    /// The failure category
    pub kind: ErrorKind,
    /// The macro involved, if any
    pub macro_name: Option<String>,
    /// Approximate location in the input
    pub position: Position,
}

fn describe_macro(name: &Option<String>) -> String {
    name.as_ref()
        .map(|n| format!(" in macro `{n}`"))
        .unwrap_or_default()
}

impl ExpandError {
    /// Create an error tied to a macro
    pub fn for_macro<S: Into<String>>(kind: ErrorKind, name: S, position: Position) -> Self {
        Self {
            kind,
            macro_name: Some(name.into()),
            position,
        }
    }

    /// Create an error with no macro attached
    #[must_use]
    pub const fn at(kind: ErrorKind, position: Position) -> Self {
        Self {
            kind,
            macro_name: None,
            position,
        }
    }

    pub(crate) fn malformed<S: Into<String>>(message: S, position: Position) -> Self {
        Self::at(ErrorKind::MalformedDefinition(message.into()), position)
    }
}

/// Advisory, non-fatal findings reported alongside a successful definition
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// A macro was redefined with a different parameter list or body
    MacroRedefined {
        /// Name of the macro
        name: String,
        /// Where the replaced definition came from, if it came from source text
        previous: Option<Position>,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MacroRedefined { name, previous } => {
                write!(f, "macro `{name}` redefined with a different body")?;
                match previous {
                    Some(at) => write!(f, " (previous definition at {at})"),
                    None => Ok(()),
                }
            }
        }
    }
}
