// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! ToMiC compiler core.
//!
//! This crate contains the core compiler functionality for the ToMiC
//! teaching language (a small C dialect):
//! - Preprocessing (comment stripping)
//! - Lexical analysis (tokenization)
//! - Resilient recursive-descent parsing (syntax tree construction)
//! - Semantic analysis (symbol table, constant folding, error checks)
//! - Lowering to an LLVM-style textual intermediate representation
//!
//! The compiler is a strict, single-threaded pipeline: each pass runs to
//! completion and hands an owned result to the next. Compile errors never
//! abort a pass; they accumulate in an [`ErrorLog`](diagnostics::ErrorLog)
//! so a single run reports as much as possible.

pub mod ast_printer;
pub mod codegen;
pub mod compiler;
pub mod diagnostics;
pub mod ir;
pub mod semantic_analysis;
pub mod source_analysis;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::compiler::{compile, CompileResult, CompilerOptions, OutputKind};
    pub use crate::diagnostics::{CompileError, CompileErrorKind, ErrorLog};
    pub use crate::source_analysis::{
        Lexer, SourceLocation, SyntaxKind, SyntaxTree, Token, TokenKind,
    };
}
