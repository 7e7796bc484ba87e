#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # Macro Expansion Library
//!
//! This library provides a textual macro-expansion engine with the semantics
//! of a classic C preprocessor, hazards included. Arguments of function-like
//! macros are substituted as raw tokens, never evaluated, so an argument with
//! a side effect is repeated wherever its parameter appears in the body.
//!
//! ## Features
//!
//! - Object-like and function-like macros
//! - Rescanning of substituted text with a self-reference guard
//! - Configurable recursion limit
//! - Structured errors carrying the macro name and position
//! - A line-oriented front end understanding `#define` and `#undef`
//!
//! ## Example
//!
//! ```rust
//! use expandium::Engine;
//!
//! let mut engine = Engine::new();
//! engine.define_macro("PIE", None, "3.14").unwrap();
//! engine.define_macro("SQR", Some(&["a"]), "((a) * (a))").unwrap();
//!
//! let out = engine.expand("PIE * SQR(++radius)").unwrap();
//! assert_eq!(out, "3.14 * ((++radius) * (++radius))");
//! ```

mod config;
mod directive;
mod engine;
mod error;
mod expander;
mod lexer;
mod macro_def;
mod render;
mod scanner;
mod table;
mod token;

pub use config::{DEFAULT_RECURSION_LIMIT, DiagnosticHandler, EngineConfig};
pub use engine::Engine;
pub use error::{Diagnostic, ErrorKind, ExpandError};
pub use expander::ExpansionContext;
pub use lexer::{Tokenizer, splice_lines, strip_comments, tokenize, tokenize_bytes};
pub use macro_def::MacroDefinition;
pub use render::render;
pub use scanner::{Invocation, scan_invocation};
pub use table::MacroTable;
pub use token::{Position, Spacing, Token, TokenKind};

/// Expand `input` with a fresh engine that has no macros defined.
///
/// # Errors
/// Returns `ExpandError` if an invocation is malformed or the recursion
/// limit is exceeded.
pub fn expand_text<S: AsRef<str>>(input: S, config: &EngineConfig) -> Result<String, ExpandError> {
    Engine::with_config(config).expand(input.as_ref())
}

/// Process text containing `#define`/`#undef` lines with a fresh engine
///
/// # Errors
/// Returns `ExpandError` for malformed definitions or failed expansions.
pub fn process_text<S: AsRef<str>>(input: S, config: &EngineConfig) -> Result<String, ExpandError> {
    Engine::with_config(config).process(input.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn circle_engine() -> Engine {
        let mut engine = Engine::new();
        engine.define_macro("PIE", None, "3.14").unwrap();
        engine
            .define_macro("SQR", Some(&["a"]), "((a) * (a))")
            .unwrap();
        engine
    }

    #[test]
    fn object_macro_expands_to_body() {
        let mut engine = Engine::new();
        engine.define_macro("BODY", None, "x  +  (y)*2").unwrap();
        assert_eq!(engine.expand("BODY").unwrap(), "x + (y)*2");
    }

    #[test]
    fn side_effect_argument_is_duplicated() {
        let mut engine = Engine::new();
        engine.define_macro("F", Some(&["p"]), "((p) * (p))").unwrap();
        assert_eq!(engine.expand("F(++x)").unwrap(), "((++x) * (++x))");
    }

    #[test]
    fn arity_mismatch() {
        let mut engine = Engine::new();
        engine.define_macro("F", Some(&["p"]), "(p)").unwrap();
        let err = engine.expand("F(1,2)").unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::ArgumentCountMismatch {
                expected: 1,
                actual: 2
            }
        );
        assert_eq!(err.macro_name.as_deref(), Some("F"));
        assert_eq!(err.position, Position::new(1, 1));
    }

    #[test]
    fn unterminated_invocation() {
        let mut engine = Engine::new();
        engine.define_macro("F", Some(&["p"]), "(p)").unwrap();
        let err = engine.expand("F(1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnterminatedInvocation);
        assert_eq!(err.macro_name.as_deref(), Some("F"));
    }

    #[test]
    fn self_reference_terminates() {
        let mut engine = Engine::new();
        engine.define_macro("A", None, "A + 1").unwrap();
        assert_eq!(engine.expand("A").unwrap(), "A + 1");
    }

    #[test]
    fn two_macro_cycle_terminates() {
        let mut engine = Engine::new();
        engine.define_macro("A", None, "B + 1").unwrap();
        engine.define_macro("B", None, "A * 2").unwrap();
        assert_eq!(engine.expand("A").unwrap(), "A * 2 + 1");
        assert_eq!(engine.expand("B").unwrap(), "B * 2 + 1");
    }

    #[test]
    fn nested_parentheses_form_one_argument() {
        let mut engine = Engine::new();
        engine.define_macro("F", Some(&["p"]), "(p)").unwrap();
        assert_eq!(engine.expand("F((1,2))").unwrap(), "((1,2))");
    }

    #[test]
    fn circle_area_hazard() {
        let engine = circle_engine();
        assert_eq!(
            engine.expand("PIE * SQR(++radius)").unwrap(),
            "3.14 * ((++radius) * (++radius))"
        );
    }

    #[test]
    fn function_macro_without_parens_is_literal() {
        let engine = circle_engine();
        assert_eq!(engine.expand("SQR + PIE").unwrap(), "SQR + 3.14");
    }

    #[test]
    fn nested_macros() {
        let mut engine = Engine::new();
        engine
            .define_macro("ADD", Some(&["a", "b"]), "((a)+(b))")
            .unwrap();
        engine
            .define_macro("MUL", Some(&["a", "b"]), "((a)*(b))")
            .unwrap();
        assert_eq!(
            engine.expand("int x = ADD(ADD(1, 2), MUL(3, 4));").unwrap(),
            "int x = ((((1)+(2)))+(((3)*(4))));"
        );
    }

    #[test]
    fn string_literals_are_not_expanded() {
        let engine = circle_engine();
        assert_eq!(
            engine.expand(r#"puts("PIE is PIE"); PIE"#).unwrap(),
            r#"puts("PIE is PIE"); 3.14"#
        );
    }

    #[test]
    fn nested_calls_to_one_macro() {
        let engine = circle_engine();
        assert_eq!(
            engine.expand("SQR(SQR(PIE))").unwrap(),
            "((((3.14) * (3.14))) * (((3.14) * (3.14))))"
        );
    }

    #[test]
    fn stray_apostrophe_does_not_hide_later_lines() {
        let engine = circle_engine();
        assert_eq!(engine.expand("don't\nPIE").unwrap(), "don't 3.14");
    }

    #[test]
    fn substituted_identifiers_do_not_merge() {
        let mut engine = Engine::new();
        engine.define_macro("ID", Some(&["x"]), "x").unwrap();
        engine.define_macro("NEG", Some(&["x"]), "-x").unwrap();
        assert_eq!(engine.expand("ID(int)x").unwrap(), "int x");
        assert_eq!(engine.expand("NEG(-1)").unwrap(), "- -1");
    }

    #[test]
    fn table_is_reused_across_expansions() {
        let engine = circle_engine();
        for _ in 0..3 {
            assert_eq!(engine.expand("PIE").unwrap(), "3.14");
        }
    }

    #[test]
    fn shared_table_across_threads() {
        let engine = circle_engine();
        let table = engine.table();
        let inputs = ["SQR(1)", "PIE", "SQR(PIE)", "x"];
        let outputs: Vec<String> = std::thread::scope(|s| {
            let handles: Vec<_> = inputs
                .iter()
                .map(|input| {
                    s.spawn(move || {
                        let mut ctx = ExpansionContext::new(table, DEFAULT_RECURSION_LIMIT);
                        render(&ctx.expand(&tokenize(input)).unwrap())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(
            outputs,
            vec!["((1) * (1))", "3.14", "((3.14) * (3.14))", "x"]
        );
    }

    #[test]
    fn expand_text_helper() {
        assert_eq!(
            expand_text("nothing to do", &EngineConfig::default()).unwrap(),
            "nothing to do"
        );
    }

    #[test]
    fn motivating_program() {
        let src = r#"#include <iostream>

#define PIE     3.14                    // You can now use PIE in place of 3.14 wherever the definition applies

#define SQR(a)  ((a) * (a))             // You can now use SQR to find the square of a number a

int main() {
	int radius = 3;
	double buggy_area = PIE * SQR(++radius);

	std::cout << "The area of a circle with radius " << radius
	          << " is " << buggy_area;

	return 0;
}
"#;
        let out = process_text(src, &EngineConfig::default()).unwrap();
        let expected = r#"#include <iostream>



int main() {
	int radius = 3;
	double buggy_area = 3.14 * ((++radius) * (++radius));

	std::cout << "The area of a circle with radius " << radius
	          << " is " << buggy_area;

	return 0;
}"#;
        assert_eq!(out, expected);
    }
}
