use crate::token::{Position, Token};

/// A macro definition
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroDefinition {
    pub(crate) name: String,
    pub(crate) params: Option<Vec<String>>,
    pub(crate) body: Vec<Token>,
    pub(crate) location: Option<Position>,
}

impl MacroDefinition {
    /// An object-like macro: `name` always expands to `body`
    pub fn object<S: Into<String>>(name: S, body: Vec<Token>) -> Self {
        Self {
            name: name.into(),
            params: None,
            body,
            location: None,
        }
    }

    /// A function-like macro with ordered parameter names
    pub fn function<S: Into<String>>(name: S, params: Vec<String>, body: Vec<Token>) -> Self {
        Self {
            name: name.into(),
            params: Some(params),
            body,
            location: None,
        }
    }

    /// Record where the definition came from
    #[must_use]
    pub fn defined_at(mut self, location: Position) -> Self {
        self.location = Some(location);
        self
    }

    /// Macro name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter names, `None` for object-like macros
    #[must_use]
    pub fn params(&self) -> Option<&[String]> {
        self.params.as_deref()
    }

    /// Replacement tokens
    #[must_use]
    pub fn body(&self) -> &[Token] {
        &self.body
    }

    /// Where the definition came from; `None` when defined through the API
    #[must_use]
    pub fn location(&self) -> Option<Position> {
        self.location
    }

    /// Whether the macro takes a parenthesized argument list
    #[must_use]
    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }

    /// Index of `name` among the parameters
    pub(crate) fn param_index(&self, name: &str) -> Option<usize> {
        self.params.as_ref()?.iter().position(|p| p == name)
    }

    /// Whether `other` would replace this definition without changing anything.
    ///
    /// Bodies must match token for token, including whether whitespace
    /// separates them; leading whitespace is ignored.
    #[must_use]
    pub fn is_equivalent(&self, other: &MacroDefinition) -> bool {
        self.params == other.params
            && self.body.len() == other.body.len()
            && self
                .body
                .iter()
                .zip(&other.body)
                .enumerate()
                .all(|(i, (a, b))| a.same_lexeme(b) && (i == 0 || a.spacing == b.spacing))
    }
}
