// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Source analysis for ToMiC programs.
//!
//! **DDD Context:** Source Analysis
//!
//! This module contains everything between raw source text and the
//! decorated syntax tree:
//!
//! - [`Preprocessor`] strips comments while preserving line numbers.
//! - [`Lexer`] converts the preprocessed text into a stream of [`Token`]s,
//!   each carrying its 1-based [`SourceLocation`].
//! - [`TokenStream`] buffers lexed tokens and supports checkpoint/rollback,
//!   which the parser relies on for speculative parsing.
//! - [`parser`] builds a [`SyntaxTree`] by resilient recursive descent:
//!   missing right-delimiters are recovered by inserting pseudo-terminals,
//!   everything else rolls back to the nearest checkpoint.
//! - [`transform`] rewrites the parser's right-recursive expression chains
//!   into left-associated binary trees.
//!
//! # Error Handling
//!
//! The lexer never fails: unrecognizable input becomes
//! [`TokenKind::Unknown`] tokens, reported as illegal characters through
//! the shared [`ErrorLog`](crate::diagnostics::ErrorLog). The parser
//! recovers locally where the grammar allows it and otherwise propagates
//! `None` up to the nearest speculation point.

mod lexer;
mod location;
pub mod parser;
mod preprocessor;
mod syntax_tree;
mod token;
mod token_stream;
pub mod transform;

#[cfg(test)]
mod lexer_property_tests;

pub use lexer::{lex, Lexer};
pub use location::SourceLocation;
pub use parser::parse;
pub use preprocessor::Preprocessor;
pub use syntax_tree::{NodeAttrs, NodeId, NodeVariant, SyntaxKind, SyntaxTree};
pub use token::{Token, TokenKind};
pub use token_stream::{Checkpoint, TokenStream};
