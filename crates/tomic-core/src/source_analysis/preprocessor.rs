// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Comment stripping for ToMiC source.
//!
//! The preprocessor runs before lexical analysis and removes comments
//! while preserving line numbers:
//!
//! - A line comment `// ...` is dropped; its terminating newline stays.
//! - A block comment `/* ... */` is replaced with a single space, and
//!   every newline inside it is emitted verbatim.
//! - String literals pass through untouched; `\"` inside a string does
//!   not terminate it.
//!
//! The output of a comment-free input is the input itself, so the pass
//! is idempotent.

/// The comment-stripping preprocessor.
///
/// # Examples
///
/// ```
/// use tomic_core::source_analysis::Preprocessor;
///
/// let out = Preprocessor::new().process("int a; // count\nint b;\n");
/// assert_eq!(out, "int a; \nint b;\n");
/// ```
#[derive(Debug, Default)]
pub struct Preprocessor;

impl Preprocessor {
    /// Creates a new preprocessor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Strips comments from `source`, preserving the newline count.
    #[must_use]
    pub fn process(&self, source: &str) -> String {
        let mut out = String::with_capacity(source.len());
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    // Skip to end of line; the newline itself is emitted
                    // by the outer loop.
                    while let Some(&next) = chars.peek() {
                        if next == '\n' {
                            break;
                        }
                        chars.next();
                    }
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push(' ');
                    loop {
                        match chars.next() {
                            None => break, // unterminated comment, recover
                            Some('*') if chars.peek() == Some(&'/') => {
                                chars.next();
                                break;
                            }
                            Some('\n') => out.push('\n'),
                            Some(_) => {}
                        }
                    }
                }
                '"' => {
                    out.push('"');
                    while let Some(sc) = chars.next() {
                        out.push(sc);
                        if sc == '\\' {
                            // Escaped character, never terminates the string.
                            if let Some(escaped) = chars.next() {
                                out.push(escaped);
                            }
                        } else if sc == '"' {
                            break;
                        }
                    }
                }
                _ => out.push(c),
            }
        }

        out
    }
}
