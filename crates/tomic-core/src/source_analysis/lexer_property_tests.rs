// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Property-based tests for the preprocessing and lexing layers.
//!
//! These pin down the round-trip laws the pipeline relies on:
//! - the preprocessor never changes the number of lines,
//! - joining token lexemes with a space re-tokenizes to the same stream,
//! - checkpoint/rollback restores the exact token state.

use proptest::prelude::*;

use super::{lex, Preprocessor, TokenStream};
use crate::diagnostics::ErrorLog;

fn newline_count(s: &str) -> usize {
    s.chars().filter(|&c| c == '\n').count()
}

/// A single valid token lexeme.
fn token_lexeme() -> impl Strategy<Value = String> {
    prop_oneof![
        // Identifiers and keywords.
        "[a-zA-Z_][a-zA-Z0-9_]{0,7}",
        // Integer literals.
        "(0|[1-9][0-9]{0,5})",
        // Operators and delimiters.
        prop::sample::select(vec![
            "+", "-", "*", "/", "%", "=", "==", "!=", "<", "<=", ">", ">=", "&&", "||", "!", ",",
            ";", "(", ")", "[", "]", "{", "}",
        ])
        .prop_map(str::to_string),
        // Simple format strings.
        "\"[a-z ]{0,6}(%d)?[a-z ]{0,4}\"",
    ]
}

proptest! {
    /// Preprocessor output always has the same number of newlines as the
    /// input, whatever the input is.
    #[test]
    fn preprocessor_preserves_line_count(source in "[ -~\n]*") {
        let out = Preprocessor::new().process(&source);
        prop_assert_eq!(newline_count(&out), newline_count(&source));
    }

    /// Same law on inputs biased towards comment and string fragments.
    #[test]
    fn preprocessor_preserves_line_count_with_comments(
        parts in prop::collection::vec(
            prop_oneof![
                "[a-z;= ]{0,8}",
                Just("// line comment".to_string()),
                Just("/* block\ncomment */".to_string()),
                Just("\"str // not comment\"".to_string()),
                Just("\n".to_string()),
            ],
            0..12,
        )
    ) {
        let source = parts.concat();
        let out = Preprocessor::new().process(&source);
        prop_assert_eq!(newline_count(&out), newline_count(&source));
    }

    /// Concatenating token lexemes with one space yields a string that
    /// re-tokenizes to the same token sequence.
    #[test]
    fn token_boundary_closure(lexemes in prop::collection::vec(token_lexeme(), 0..16)) {
        let mut expected = Vec::new();
        for lexeme in &lexemes {
            let tokens = lex(lexeme);
            prop_assert_eq!(tokens.len(), 1, "atom {:?} must lex to one token", lexeme);
            expected.push(tokens.into_iter().next().unwrap());
        }

        let joined = lexemes.join(" ");
        let relexed = lex(&joined);

        prop_assert_eq!(relexed.len(), expected.len());
        for (a, b) in relexed.iter().zip(expected.iter()) {
            prop_assert_eq!(a.kind, b.kind);
            prop_assert_eq!(&a.lexeme, &b.lexeme);
        }
    }

    /// `checkpoint(); next × n; rollback()` restores the exact prior
    /// token state for any lookahead depth.
    #[test]
    fn checkpoint_rollback_restores_state(
        lexemes in prop::collection::vec(token_lexeme(), 0..12),
        skip in 0usize..4,
        n in 0usize..16,
    ) {
        let source = lexemes.join(" ");
        let errors = ErrorLog::new();
        let mut stream = TokenStream::new(&source, &errors);

        for _ in 0..skip {
            stream.next();
        }

        let checkpoint = stream.checkpoint();
        let reference: Vec<_> = (0..8).map(|_| stream.next()).collect();
        stream.rollback(checkpoint);

        for _ in 0..n {
            stream.next();
        }
        stream.rollback(checkpoint);

        let replay: Vec<_> = (0..8).map(|_| stream.next()).collect();
        prop_assert_eq!(reference, replay);
    }
}
