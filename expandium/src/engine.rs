use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::directive::{Directive, parse_define, parse_directive, validate_name, validate_params};
use crate::error::{Diagnostic, ExpandError};
use crate::expander::ExpansionContext;
use crate::lexer::{Tokenizer, decode, logical_line_starts, splice_lines, strip_comments, tokenize};
use crate::macro_def::MacroDefinition;
use crate::render::render;
use crate::table::MacroTable;
use crate::token::{Position, Token};

/// The macro expansion engine.
///
/// Owns a [`MacroTable`] that persists across calls; every call to
/// [`Engine::expand`] runs a fresh expansion session over it.
#[derive(Debug, Default)]
pub struct Engine {
    table: MacroTable,
    config: EngineConfig,
    diagnostics: Vec<Diagnostic>,
}

impl Engine {
    /// Create an engine with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with the given configuration
    #[must_use]
    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            config: config.clone(),
            ..Self::default()
        }
    }

    /// Set the maximum recursion depth for macro expansion
    pub fn set_recursion_limit(&mut self, limit: usize) {
        self.config.recursion_limit = limit;
    }

    /// The active configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read access to the defined macros
    #[must_use]
    pub fn table(&self) -> &MacroTable {
        &self.table
    }

    /// Check if a macro is defined
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.table.is_defined(name)
    }

    /// Define a macro; `params` is `None` for object-like macros.
    ///
    /// The body is tokenized before storage. Replacing a different
    /// definition succeeds and returns an advisory diagnostic.
    ///
    /// # Errors
    /// Returns [`ErrorKind::MalformedDefinition`](crate::ErrorKind::MalformedDefinition)
    /// if the name or a parameter is not an identifier, or parameters repeat.
    pub fn define_macro(
        &mut self,
        name: &str,
        params: Option<&[&str]>,
        body: &str,
    ) -> Result<Option<Diagnostic>, ExpandError> {
        // Errors point at the start of the supplied name
        let at = Position::new(1, 1);
        validate_name(name, at)?;
        let body = tokenize(body);
        let definition = match params {
            Some(params) => {
                validate_params(name, params, at)?;
                let params = params.iter().map(|p| (*p).to_string()).collect();
                MacroDefinition::function(name, params, body)
            }
            None => MacroDefinition::object(name, body),
        };
        Ok(self.register(definition))
    }

    /// Define a macro from the text that would follow `#define`,
    /// e.g. `SQR(a) ((a) * (a))`.
    ///
    /// # Errors
    /// Returns [`ErrorKind::MalformedDefinition`](crate::ErrorKind::MalformedDefinition)
    /// if the text is not a valid definition.
    pub fn define_directive(&mut self, text: &str) -> Result<Option<Diagnostic>, ExpandError> {
        let tokens = tokenize(text);
        let definition = parse_define(&tokens, Position::new(1, 1))?;
        Ok(self.register(definition))
    }

    /// Remove a macro definition; unknown names are ignored
    pub fn undefine_macro(&mut self, name: &str) {
        self.table.undefine(name);
    }

    /// Diagnostics collected since the last call.
    ///
    /// Every redefinition is kept until drained here, so long-lived engines
    /// should call this periodically.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn register(&mut self, definition: MacroDefinition) -> Option<Diagnostic> {
        let diagnostic = self.table.define(definition)?;
        warn!(%diagnostic, "macro redefined");
        if let Some(handler) = &self.config.diagnostic_handler {
            handler(&diagnostic);
        }
        self.diagnostics.push(diagnostic.clone());
        Some(diagnostic)
    }

    /// Expand every macro invocation in `source` and render the result
    ///
    /// # Errors
    /// Returns the first unterminated invocation, argument count mismatch or
    /// recursion limit violation; the whole expansion is abandoned.
    pub fn expand(&self, source: &str) -> Result<String, ExpandError> {
        debug!(len = source.len(), "expanding text");
        let tokens = tokenize(source);
        let expanded = self.expand_tokens(&tokens)?;
        Ok(render(&expanded))
    }

    /// Like [`Engine::expand`], for input that still has to be decoded
    ///
    /// # Errors
    /// Additionally returns [`ErrorKind::EncodingError`](crate::ErrorKind::EncodingError)
    /// for malformed UTF-8.
    pub fn expand_bytes(&self, source: &[u8]) -> Result<String, ExpandError> {
        self.expand(decode(source)?)
    }

    /// Expand an already tokenized sequence
    ///
    /// # Errors
    /// See [`Engine::expand`].
    pub fn expand_tokens(&self, tokens: &[Token]) -> Result<Vec<Token>, ExpandError> {
        ExpansionContext::new(&self.table, self.config.recursion_limit).expand(tokens)
    }

    /// Process source text containing `#define` and `#undef` lines.
    ///
    /// Definition lines update the table and produce no output. Other
    /// directive lines are copied through untouched. Every remaining line is
    /// expanded with the definitions seen so far, keeping its indentation.
    /// Lines joined by a trailing backslash report the line they start on.
    ///
    /// # Errors
    /// Returns malformed definition errors and any expansion error.
    pub fn process(&mut self, input: &str) -> Result<String, ExpandError> {
        let spliced = splice_lines(input);
        let stripped = strip_comments(&spliced);
        let line_starts = logical_line_starts(input);
        let mut out_lines: Vec<String> = Vec::new();

        for (idx, line) in stripped.lines().enumerate() {
            let line_no = line_starts.get(idx).copied().unwrap_or(idx + 1);
            let tokens: Vec<Token> = Tokenizer::starting_at(line, line_no).collect();
            match parse_directive(&tokens)? {
                Some(Directive::Define(definition)) => {
                    self.register(definition);
                }
                Some(Directive::Undef(name)) => self.undefine_macro(&name),
                Some(Directive::Other) => out_lines.push(line.trim_end().to_string()),
                None if tokens.is_empty() => out_lines.push(String::new()),
                None => {
                    let expanded = self.expand_tokens(&tokens)?;
                    let indent_len = line.len() - line.trim_start().len();
                    out_lines.push(format!("{}{}", &line[..indent_len], render(&expanded)));
                }
            }
        }

        Ok(out_lines.join("\n"))
    }

    /// Like [`Engine::process`], for input that still has to be decoded
    ///
    /// # Errors
    /// Additionally returns [`ErrorKind::EncodingError`](crate::ErrorKind::EncodingError)
    /// for malformed UTF-8.
    pub fn process_bytes(&mut self, input: &[u8]) -> Result<String, ExpandError> {
        self.process(decode(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    #[test]
    fn define_validates_names_and_params() {
        let mut engine = Engine::new();
        assert!(engine.define_macro("9lives", None, "x").is_err());
        assert!(engine.define_macro("F", Some(&["a", "a"]), "a").is_err());
        assert!(engine.define_macro("F", Some(&["a", "b c"]), "a").is_err());
        assert!(engine.define_macro("F", Some(&["a", "b"]), "a").is_ok());
        assert!(engine.is_defined("F"));
    }

    #[test]
    fn redefinition_reaches_handler_and_log() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let config = EngineConfig::new().with_diagnostic_handler(Arc::new(move |d: &Diagnostic| {
            sink.lock().unwrap().push(d.to_string());
        }));
        let mut engine = Engine::with_config(&config);
        assert_eq!(engine.define_macro("N", None, "1").unwrap(), None);
        assert_eq!(engine.define_macro("N", None, "1").unwrap(), None);
        let diag = engine.define_macro("N", None, "2").unwrap();
        assert!(matches!(diag, Some(Diagnostic::MacroRedefined { ref name, .. }) if name == "N"));
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(engine.take_diagnostics().len(), 1);
        assert!(engine.take_diagnostics().is_empty());
        assert_eq!(engine.expand("N").unwrap(), "2");
    }

    #[test]
    fn undefine_restores_literal_text() {
        let mut engine = Engine::new();
        engine.define_macro("FOO", None, "1").unwrap();
        assert_eq!(engine.expand("FOO").unwrap(), "1");
        engine.undefine_macro("FOO");
        engine.undefine_macro("FOO");
        assert_eq!(engine.expand("FOO").unwrap(), "FOO");
    }

    #[test]
    fn define_directive_text() {
        let mut engine = Engine::new();
        engine.define_directive("SQR(a) ((a) * (a))").unwrap();
        engine.define_directive("PIE 3.14").unwrap();
        assert_eq!(engine.expand("SQR(PIE)").unwrap(), "((3.14) * (3.14))");
        assert!(engine.define_directive("").is_err());
    }

    #[test]
    fn recursion_limit_from_config() {
        let mut engine = Engine::with_config(&EngineConfig::new().with_recursion_limit(1));
        engine.define_macro("A", None, "B").unwrap();
        engine.define_macro("B", None, "1").unwrap();
        let err = engine.expand("A").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RecursionLimitExceeded { limit: 1 });
        engine.set_recursion_limit(2);
        assert_eq!(engine.expand("A").unwrap(), "1");
    }

    #[test]
    fn expand_bytes_rejects_bad_encoding() {
        let engine = Engine::new();
        let err = engine.expand_bytes(b"PIE \xc3\x28").unwrap_err();
        assert_eq!(err.kind, ErrorKind::EncodingError);
        assert_eq!(engine.expand_bytes(b"ok").unwrap(), "ok");
    }

    #[test]
    fn process_handles_directives_and_indentation() {
        let src = "#define TWO 2\n\nint main() {\n    return TWO;\n}\n#undef TWO\nTWO";
        let mut engine = Engine::new();
        let out = engine.process(src).unwrap();
        assert_eq!(out, "\nint main() {\n    return 2;\n}\nTWO");
    }

    #[test]
    fn process_continuation_lines() {
        let src = "#define ADD(a, b) \\\n    ((a) + (b))\nADD(1, 2)";
        let mut engine = Engine::new();
        assert_eq!(engine.process(src).unwrap(), "((1) + (2))");
    }

    #[test]
    fn process_reports_line_of_error() {
        let src = "#define F(x) x\nok\n  F(1, 2)";
        let mut engine = Engine::new();
        let err = engine.process(src).unwrap_err();
        assert_eq!(err.position, Position::new(3, 3));
        assert_eq!(err.macro_name.as_deref(), Some("F"));
    }

    #[test]
    fn error_lines_count_continuations() {
        let src = "#define ADD(a, b) \\\n    ((a) + (b))\n\nADD(1)";
        let mut engine = Engine::new();
        let err = engine.process(src).unwrap_err();
        assert_eq!(err.position, Position::new(4, 1));
    }

    #[test]
    fn redefinition_reports_source_location_only() {
        let mut engine = Engine::new();
        engine.define_macro("N", None, "1").unwrap();
        let diag = engine.define_macro("N", None, "2").unwrap();
        assert_eq!(
            diag,
            Some(Diagnostic::MacroRedefined {
                name: "N".to_string(),
                previous: None,
            })
        );

        engine.process("\n#define M 1\n#define M 2").unwrap();
        let diags = engine.take_diagnostics();
        assert_eq!(
            diags.last(),
            Some(&Diagnostic::MacroRedefined {
                name: "M".to_string(),
                previous: Some(Position::new(2, 1)),
            })
        );
    }

    #[test]
    fn process_rejects_malformed_define() {
        let mut engine = Engine::new();
        let err = engine.process("#define F(a, a) a").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MalformedDefinition(_)));
    }
}
