// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Compile-error records and the error log.
//!
//! Compile errors are data, not Rust errors: every pass pushes typed
//! records into a shared [`ErrorLog`] and keeps going, so one run reports
//! as much as possible. The log is dumped after the full pipeline, sorted
//! by `(line, column, kind)`, in the fixed format:
//!
//! ```text
//! Line 3, Column 7: Missing Semicolon
//!     Missing ';' after 'b'
//! ```
//!
//! The debug/diagnostic channel is separate: passes emit `tracing` events
//! for humans, never into this log.

use std::cell::RefCell;
use std::fmt;

use ecow::EcoString;

use crate::source_analysis::SourceLocation;

/// The category of a compile error.
///
/// The discriminant order is the tie-breaking sort order for records at
/// the same source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CompileErrorKind {
    /// `;` expected but absent; a pseudo-token was inserted.
    MissingSemicolon,
    /// `)` expected but absent; a pseudo-token was inserted.
    MissingRightParen,
    /// `]` expected but absent; a pseudo-token was inserted.
    MissingRightBracket,
    /// `}` expected but absent; a pseudo-token was inserted.
    MissingRightBrace,
    /// The lexer produced an unrecognizable token.
    IllegalCharacter,
    /// A name was declared twice in the same scope.
    DuplicateIdentifier,
    /// A name was used but never declared.
    UndefinedIdentifier,
    /// A call passed the wrong number of arguments.
    ArgumentCountMismatch,
    /// A call passed an argument of the wrong shape.
    ArgumentTypeMismatch,
    /// `break` outside of any loop.
    IllegalBreak,
    /// `continue` outside of any loop.
    IllegalContinue,
    /// Return/value mismatch against the function signature.
    IllegalReturn,
    /// Assignment target resolves to a constant.
    AssignToConstant,
    /// `printf` format specifiers disagree with the argument list.
    FormatMismatch,
    /// Anything without a more specific category.
    Unknown,
}

impl CompileErrorKind {
    /// Human-readable description used in the error-log dump.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::MissingSemicolon => "Missing Semicolon",
            Self::MissingRightParen => "Missing Right Parenthesis",
            Self::MissingRightBracket => "Missing Right Bracket",
            Self::MissingRightBrace => "Missing Right Brace",
            Self::IllegalCharacter => "Illegal Character",
            Self::DuplicateIdentifier => "Duplicate Identifier",
            Self::UndefinedIdentifier => "Undefined Identifier",
            Self::ArgumentCountMismatch => "Argument Count Mismatch",
            Self::ArgumentTypeMismatch => "Argument Type Mismatch",
            Self::IllegalBreak => "Illegal Break",
            Self::IllegalContinue => "Illegal Continue",
            Self::IllegalReturn => "Illegal Return",
            Self::AssignToConstant => "Assign To Constant",
            Self::FormatMismatch => "Format Mismatch",
            Self::Unknown => "Unknown Error",
        }
    }
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single compile-error record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// Where the error was detected.
    pub loc: SourceLocation,
    /// The error category.
    pub kind: CompileErrorKind,
    /// Free-form detail message.
    pub message: EcoString,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Line {}, Column {}: {}",
            self.loc.line, self.loc.column, self.kind
        )
    }
}

impl std::error::Error for CompileError {}

impl CompileError {
    /// Creates a new record.
    #[must_use]
    pub fn new(
        loc: SourceLocation,
        kind: CompileErrorKind,
        message: impl Into<EcoString>,
    ) -> Self {
        Self {
            loc,
            kind,
            message: message.into(),
        }
    }

    fn sort_key(&self) -> (u32, u32, CompileErrorKind) {
        (self.loc.line, self.loc.column, self.kind)
    }
}

/// The shared compile-error log.
///
/// Interior mutability keeps reporting ergonomic across the pipeline: the
/// lexer, parser, analyzer and generator all hold `&ErrorLog`. The
/// compiler is single-threaded, so a [`RefCell`] suffices.
///
/// # Examples
///
/// ```
/// use tomic_core::diagnostics::{CompileErrorKind, ErrorLog};
/// use tomic_core::source_analysis::SourceLocation;
///
/// let log = ErrorLog::new();
/// log.report(SourceLocation::new(2, 8), CompileErrorKind::MissingSemicolon, "Missing ';'");
/// assert_eq!(log.count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: RefCell<Vec<CompileError>>,
}

impl ErrorLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record.
    pub fn report(
        &self,
        loc: SourceLocation,
        kind: CompileErrorKind,
        message: impl Into<EcoString>,
    ) {
        self.entries
            .borrow_mut()
            .push(CompileError::new(loc, kind, message));
    }

    /// The number of records so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns `true` if nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// All records, sorted ascending by `(line, column, kind)`.
    #[must_use]
    pub fn sorted_entries(&self) -> Vec<CompileError> {
        let mut entries = self.entries.borrow().clone();
        entries.sort_by_key(CompileError::sort_key);
        entries
    }

    /// Renders the sorted log in the fixed dump format.
    #[must_use]
    pub fn dump(&self) -> String {
        use fmt::Write as _;

        let mut out = String::new();
        for entry in self.sorted_entries() {
            let _ = writeln!(
                out,
                "Line {}, Column {}: {}",
                entry.loc.line, entry.loc.column, entry.kind
            );
            let _ = writeln!(out, "    {}", entry.message);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(line: u32, column: u32) -> SourceLocation {
        SourceLocation::new(line, column)
    }

    #[test]
    fn count_and_empty() {
        let log = ErrorLog::new();
        assert!(log.is_empty());
        log.report(at(1, 1), CompileErrorKind::Unknown, "x");
        assert_eq!(log.count(), 1);
        assert!(!log.is_empty());
    }

    #[test]
    fn entries_sort_by_line_column_kind() {
        let log = ErrorLog::new();
        log.report(at(3, 1), CompileErrorKind::MissingSemicolon, "a");
        log.report(at(1, 9), CompileErrorKind::UndefinedIdentifier, "b");
        log.report(at(1, 2), CompileErrorKind::MissingRightParen, "c");
        log.report(at(1, 2), CompileErrorKind::MissingSemicolon, "d");

        let sorted = log.sorted_entries();
        let keys: Vec<_> = sorted.iter().map(|e| (e.loc.line, e.loc.column)).collect();
        assert_eq!(keys, vec![(1, 2), (1, 2), (1, 9), (3, 1)]);
        // Same position: semicolon sorts before right-paren by kind order.
        assert_eq!(sorted[0].kind, CompileErrorKind::MissingSemicolon);
        assert_eq!(sorted[1].kind, CompileErrorKind::MissingRightParen);
    }

    #[test]
    fn dump_format() {
        let log = ErrorLog::new();
        log.report(
            at(2, 5),
            CompileErrorKind::MissingSemicolon,
            "Missing ';' after 'b'",
        );
        assert_eq!(
            log.dump(),
            "Line 2, Column 5: Missing Semicolon\n    Missing ';' after 'b'\n"
        );
    }

    #[test]
    fn compile_error_display() {
        let err = CompileError::new(at(4, 2), CompileErrorKind::IllegalBreak, "msg");
        assert_eq!(err.to_string(), "Line 4, Column 2: Illegal Break");
    }
}
