use std::collections::HashSet;
use std::rc::Rc;

use tracing::trace;

use crate::error::{ErrorKind, ExpandError};
use crate::scanner::{Invocation, scan_invocation};
use crate::table::MacroTable;
use crate::token::{Position, Spacing, Token};

/// Names a token may not be expanded as
type GuardSet = Rc<HashSet<String>>;

/// State for one expansion session.
///
/// Borrows the macro table read-only and tracks the macros currently being
/// expanded. Every token carries a guard set: tokens copied from a macro body
/// are guarded against that macro and everything the invocation itself was
/// guarded against, so a macro is never re-entered from inside its own
/// expansion, directly or through other macros. Tokens substituted from
/// arguments keep the guards of the call site, which lets `SQR(SQR(x))`
/// expand both calls.
pub struct ExpansionContext<'t> {
    table: &'t MacroTable,
    active: Vec<String>,
    recursion_limit: usize,
}

impl<'t> ExpansionContext<'t> {
    /// Start a session over `table`
    #[must_use]
    pub fn new(table: &'t MacroTable, recursion_limit: usize) -> Self {
        Self {
            table,
            active: Vec::new(),
            recursion_limit,
        }
    }

    /// The table this session reads from
    #[must_use]
    pub fn table(&self) -> &'t MacroTable {
        self.table
    }

    /// Whether `name` is being expanded right now
    #[must_use]
    pub fn is_expanding(&self, name: &str) -> bool {
        self.active.iter().any(|active| active == name)
    }

    /// Expand every macro invocation in `tokens`.
    ///
    /// # Errors
    /// Fails on the first unterminated invocation, argument count mismatch,
    /// or when nesting exceeds the recursion limit.
    pub fn expand(&mut self, tokens: &[Token]) -> Result<Vec<Token>, ExpandError> {
        let guards = vec![GuardSet::default(); tokens.len()];
        self.expand_tokens(tokens, &guards, 0)
    }

    fn expand_tokens(
        &mut self,
        tokens: &[Token],
        guards: &[GuardSet],
        depth: usize,
    ) -> Result<Vec<Token>, ExpandError> {
        let mut out = Splice::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            let guarded = token
                .as_identifier()
                .is_some_and(|name| guards[i].contains(name));
            let invocation = if guarded {
                None
            } else {
                scan_invocation(tokens, i, self.table)?
            };

            match invocation {
                Some(inv) => {
                    let expanded = self.expand_invocation(&inv, guards, token.position, depth)?;
                    out.replace(token.spacing, expanded);
                    i = inv.end;
                }
                None => {
                    out.push(token.clone());
                    i += 1;
                }
            }
        }
        Ok(out.finish())
    }

    fn expand_invocation(
        &mut self,
        inv: &Invocation<'t>,
        guards: &[GuardSet],
        site: Position,
        depth: usize,
    ) -> Result<Vec<Token>, ExpandError> {
        let name = inv.definition.name();
        if depth >= self.recursion_limit {
            return Err(ExpandError::for_macro(
                ErrorKind::RecursionLimitExceeded {
                    limit: self.recursion_limit,
                },
                name,
                site,
            ));
        }
        trace!(name, depth, "expanding macro");

        let mut body_guard = (*guards[inv.start]).clone();
        body_guard.insert(name.to_string());
        let (substituted, substituted_guards) = substitute(inv, guards, &Rc::new(body_guard), site);

        self.active.push(name.to_string());
        let result = self.expand_tokens(&substituted, &substituted_guards, depth + 1);
        self.active.pop();
        result
    }
}

/// Replace parameters in the body with raw argument tokens.
///
/// Arguments are copied once per occurrence of their parameter and are not
/// expanded first, so `SQR(++x)` with body `((a) * (a))` carries `++x` twice.
/// Returns the tokens together with the guard set of each one.
fn substitute(
    inv: &Invocation<'_>,
    guards: &[GuardSet],
    body_guard: &GuardSet,
    site: Position,
) -> (Vec<Token>, Vec<GuardSet>) {
    let definition = inv.definition;
    let arg_guards = argument_guards(inv, guards);
    let mut out = Splice::with_capacity(definition.body().len());
    let mut out_guards = Vec::with_capacity(definition.body().len());
    for body_token in definition.body() {
        let arg = body_token
            .as_identifier()
            .and_then(|id| definition.param_index(id))
            .and_then(|idx| Some((inv.args.get(idx)?, *arg_guards.get(idx)?)));
        match arg {
            Some((arg, arg_guard)) => {
                out.replace(body_token.spacing, arg.clone());
                out_guards.extend_from_slice(arg_guard);
            }
            None => {
                out.push(body_token.clone());
                out_guards.push(Rc::clone(body_guard));
            }
        }
    }

    let mut tokens = out.finish();
    for t in &mut tokens {
        t.position = site;
    }
    (tokens, out_guards)
}

/// Guard sets of each argument's tokens.
///
/// Arguments sit contiguously after the `(` following the name, separated by
/// one top-level comma each.
fn argument_guards<'g>(inv: &Invocation<'_>, guards: &'g [GuardSet]) -> Vec<&'g [GuardSet]> {
    let mut next = inv.start + 2;
    inv.args
        .iter()
        .map(|arg| {
            let span = &guards[next..next + arg.len()];
            next += arg.len() + 1;
            span
        })
        .collect()
}

/// Output buffer that keeps spacing honest across replaced spans
struct Splice {
    out: Vec<Token>,
    pending: Spacing,
}

impl Splice {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            out: Vec::with_capacity(capacity),
            pending: Spacing::Joint,
        }
    }

    fn push(&mut self, token: Token) {
        let spacing = token.spacing.merge(self.pending);
        self.pending = Spacing::Joint;
        self.out.push(token.with_spacing(spacing));
    }

    /// Emit `replacement` where a token with spacing `site` used to be.
    ///
    /// Recorded whitespace around the replaced span is kept; recorded
    /// adjacency no longer holds, so it becomes unrecorded.
    fn replace(&mut self, site: Spacing, replacement: Vec<Token>) {
        let lead = site.merge(self.pending).loosened();
        let mut tokens = replacement.into_iter();
        match tokens.next() {
            Some(first) => {
                self.out.push(first.with_spacing(lead));
                self.out.extend(tokens);
                self.pending = Spacing::Unrecorded;
            }
            None => self.pending = lead,
        }
    }

    fn finish(self) -> Vec<Token> {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::macro_def::MacroDefinition;
    use crate::render::render;
    use pretty_assertions::assert_eq;

    fn object(table: &mut MacroTable, name: &str, body: &str) {
        table.define(MacroDefinition::object(name, tokenize(body)));
    }

    fn function(table: &mut MacroTable, name: &str, params: &[&str], body: &str) {
        let params = params.iter().map(|p| (*p).to_string()).collect();
        table.define(MacroDefinition::function(name, params, tokenize(body)));
    }

    fn expand(table: &MacroTable, src: &str) -> Result<String, ExpandError> {
        let mut ctx = ExpansionContext::new(table, 16);
        ctx.expand(&tokenize(src)).map(|t| render(&t))
    }

    #[test]
    fn object_like_body_is_rescanned() {
        let mut table = MacroTable::new();
        object(&mut table, "ONE", "1");
        object(&mut table, "TWO", "ONE + ONE");
        assert_eq!(expand(&table, "TWO").unwrap(), "1 + 1");
    }

    #[test]
    fn arguments_are_duplicated_unevaluated() {
        let mut table = MacroTable::new();
        function(&mut table, "F", &["p"], "((p) * (p))");
        assert_eq!(expand(&table, "F(++x)").unwrap(), "((++x) * (++x))");
    }

    #[test]
    fn unparenthesized_body_keeps_precedence_hazard() {
        let mut table = MacroTable::new();
        function(&mut table, "DOUBLE", &["x"], "x + x");
        assert_eq!(expand(&table, "3 * DOUBLE(1 + 2)").unwrap(), "3 * 1 + 2 + 1 + 2");
    }

    #[test]
    fn direct_self_reference_is_left_literal() {
        let mut table = MacroTable::new();
        object(&mut table, "A", "A + 1");
        assert_eq!(expand(&table, "A").unwrap(), "A + 1");
    }

    #[test]
    fn function_like_self_reference_is_left_literal() {
        let mut table = MacroTable::new();
        function(&mut table, "F", &["x"], "F(x, x)");
        assert_eq!(expand(&table, "F(1)").unwrap(), "F(1, 1)");
    }

    #[test]
    fn mutual_recursion_is_blocked() {
        let mut table = MacroTable::new();
        object(&mut table, "A", "B");
        object(&mut table, "B", "A");
        assert_eq!(expand(&table, "A").unwrap(), "A");
        assert_eq!(expand(&table, "B").unwrap(), "B");
    }

    #[test]
    fn body_tokens_stay_guarded_inside_arguments() {
        let mut table = MacroTable::new();
        function(&mut table, "F", &["x"], "[x]");
        object(&mut table, "A", "F(A)");
        assert_eq!(expand(&table, "A").unwrap(), "[A]");
    }

    #[test]
    fn nested_calls_to_the_same_macro_expand() {
        let mut table = MacroTable::new();
        function(&mut table, "SQR", &["a"], "((a) * (a))");
        assert_eq!(
            expand(&table, "SQR(SQR(x))").unwrap(),
            "((((x) * (x))) * (((x) * (x))))"
        );
        assert_eq!(
            expand(&table, "SQR(SQR(++x))").unwrap(),
            "((((++x) * (++x))) * (((++x) * (++x))))"
        );
    }

    #[test]
    fn guard_is_released_after_expansion() {
        let mut table = MacroTable::new();
        object(&mut table, "X", "x");
        object(&mut table, "PAIR", "X X");
        assert_eq!(expand(&table, "PAIR X").unwrap(), "x x x");
    }

    #[test]
    fn recursion_limit_is_enforced() {
        let mut table = MacroTable::new();
        for i in 0..20 {
            object(&mut table, &format!("M{i}"), &format!("M{}", i + 1));
        }
        let mut ctx = ExpansionContext::new(&table, 8);
        let err = ctx.expand(&tokenize("M0")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RecursionLimitExceeded { limit: 8 });
        assert_eq!(err.macro_name.as_deref(), Some("M8"));
        assert!(!ctx.is_expanding("M0"));
    }

    #[test]
    fn chain_within_limit_expands() {
        let mut table = MacroTable::new();
        for i in 0..4 {
            object(&mut table, &format!("M{i}"), &format!("M{}", i + 1));
        }
        let mut ctx = ExpansionContext::new(&table, 4);
        let out = ctx.expand(&tokenize("M0")).unwrap();
        assert_eq!(render(&out), "M4");
    }

    #[test]
    fn macros_in_arguments_expand_after_substitution() {
        let mut table = MacroTable::new();
        object(&mut table, "PIE", "3.14");
        function(&mut table, "ID", &["x"], "x");
        assert_eq!(expand(&table, "ID(PIE)").unwrap(), "3.14");
    }

    #[test]
    fn rescan_does_not_reach_past_the_replacement() {
        let mut table = MacroTable::new();
        function(&mut table, "F", &["x"], "[x]");
        object(&mut table, "G", "F");
        assert_eq!(expand(&table, "G(1)").unwrap(), "F(1)");
    }

    #[test]
    fn empty_expansion_keeps_surrounding_whitespace() {
        let mut table = MacroTable::new();
        object(&mut table, "NOTHING", "");
        assert_eq!(expand(&table, "a NOTHING+b").unwrap(), "a +b");
    }

    #[test]
    fn spliced_tokens_take_the_invocation_position() {
        let mut table = MacroTable::new();
        object(&mut table, "PIE", "3.14");
        let mut ctx = ExpansionContext::new(&table, 4);
        let out = ctx.expand(&tokenize("x =\n  PIE")).unwrap();
        assert_eq!(out[2].position, Position::new(2, 3));
    }

    #[test]
    fn errors_inside_expansions_are_reported() {
        let mut table = MacroTable::new();
        function(&mut table, "F", &["x"], "x");
        object(&mut table, "BAD", "F(1, 2)");
        let err = expand(&table, "y BAD").unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::ArgumentCountMismatch {
                expected: 1,
                actual: 2
            }
        );
        assert_eq!(err.macro_name.as_deref(), Some("F"));
        assert_eq!(err.position, Position::new(1, 3));
    }
}
