// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Resilient recursive descent parser for ToMiC source code.
//!
//! # Design Philosophy
//!
//! - **Checkpoint everything** - every `parse_x` saves the token cursor
//!   before it starts; a structural failure rolls the stream back,
//!   deletes the partial node, and propagates `None` upward.
//! - **Recover missing delimiters** - an absent `;` `)` `]` `}` is
//!   reported to the [`ErrorLog`] and replaced by a pseudo-terminal so
//!   downstream passes always see a well-formed tree.
//! - **Speculate where the grammar is ambiguous** - statements starting
//!   with an identifier are tried as input statement, assignment, then
//!   expression statement; a try-parse counter silences the diagnostic
//!   channel while speculation is in flight.
//!
//! Binary expressions are parsed through right-recursive auxiliary
//! productions to stay LL(1); the
//! [`transform`](crate::source_analysis::transform) pass reshapes those
//! chains into left-associated trees afterwards.
//!
//! # Usage
//!
//! ```
//! use tomic_core::diagnostics::ErrorLog;
//! use tomic_core::source_analysis::parse;
//!
//! let errors = ErrorLog::new();
//! let tree = parse("int main() { return 0; }", &errors).expect("parse");
//! assert!(errors.is_empty());
//! assert!(tree.root().is_some());
//! ```

mod expressions;
mod statements;

use ecow::EcoString;
use tracing::{debug, error};

use crate::diagnostics::{CompileErrorKind, ErrorLog};

use super::{
    Checkpoint, NodeId, SourceLocation, SyntaxKind, SyntaxTree, Token, TokenKind, TokenStream,
};

/// Parses a complete compilation unit.
///
/// Returns `None` only on a fatal failure at the top level; all
/// recoverable problems are reported through `errors` and parsing
/// continues. The returned tree still contains the right-recursive
/// expression chains; run the transformer to normalize them.
#[must_use]
pub fn parse(source: &str, errors: &ErrorLog) -> Option<SyntaxTree> {
    let mut parser = Parser::new(source, errors);
    match parser.parse_comp_unit() {
        Some(root) => {
            parser.tree.set_root(root);
            Some(parser.tree)
        }
        None => {
            error!("Failed to parse the source code.");
            None
        }
    }
}

/// The parser state.
pub(super) struct Parser<'src, 'log> {
    pub(super) stream: TokenStream<'src, 'log>,
    pub(super) tree: SyntaxTree,
    pub(super) errors: &'log ErrorLog,
    /// Depth of speculative parsing; diagnostics are muted while > 0.
    pub(super) try_parse: u32,
}

impl<'src, 'log> Parser<'src, 'log> {
    fn new(source: &'src str, errors: &'log ErrorLog) -> Self {
        Self {
            stream: TokenStream::new(source, errors),
            tree: SyntaxTree::new(),
            errors,
            try_parse: 0,
        }
    }

    // ========================================================================
    // Token Management
    // ========================================================================

    /// Peeks one token ahead.
    pub(super) fn lookahead(&mut self) -> Token {
        self.stream.lookahead(1)
    }

    /// Peeks `n` tokens ahead (1-based).
    pub(super) fn lookahead_n(&mut self, n: usize) -> Token {
        self.stream.lookahead(n)
    }

    /// Checks the kind of the next token.
    pub(super) fn check(&mut self, kind: TokenKind) -> bool {
        self.lookahead().kind == kind
    }

    /// Checks the kind of the `n`-th next token (1-based).
    pub(super) fn check_n(&mut self, n: usize, kind: TokenKind) -> bool {
        self.lookahead_n(n).kind == kind
    }

    /// Checks the next token against a set of kinds.
    pub(super) fn check_any(&mut self, kinds: &[TokenKind]) -> bool {
        let next = self.lookahead().kind;
        kinds.contains(&next)
    }

    /// Consumes the next token and appends it to `parent` as a terminal.
    pub(super) fn consume_into(&mut self, parent: NodeId) {
        let token = self.stream.next();
        let node = self.tree.new_terminal(token);
        self.tree.insert_end_child(parent, node);
    }

    // ========================================================================
    // Error Handling & Recovery
    // ========================================================================

    pub(super) fn in_try_parse(&self) -> bool {
        self.try_parse > 0
    }

    pub(super) fn set_try_parse(&mut self, on: bool) {
        if on {
            self.try_parse += 1;
        } else {
            self.try_parse = self.try_parse.saturating_sub(1);
        }
    }

    /// Rolls the stream back and deletes the partial node. Returns `None`
    /// so productions can `return self.bail(checkpoint, node)`.
    pub(super) fn bail(&mut self, checkpoint: Checkpoint, node: NodeId) -> Option<NodeId> {
        self.stream.rollback(checkpoint);
        self.tree.delete_node(node);
        None
    }

    /// Diagnostic-channel note that a sub-production failed.
    pub(super) fn log_failed_to_parse(&self, kind: SyntaxKind) {
        if !self.in_try_parse() {
            debug!("Failed to parse <{}>", kind.description());
        }
    }

    /// Diagnostic-channel note that a required token is absent.
    pub(super) fn log_expect(&mut self, expected: TokenKind) {
        if self.in_try_parse() {
            return;
        }
        let actual = self.lookahead();
        let wanted = expected.lexeme().unwrap_or_else(|| expected.description());
        if actual.kind.is_terminator() {
            error!("({}) Expect {wanted}, but got EOF", actual.loc);
        } else {
            error!("({}) Expect {wanted}, but got {}", actual.loc, actual.lexeme);
        }
    }

    /// Diagnostic-channel note listing an expected token set.
    pub(super) fn log_expect_any(&mut self, expected: &[TokenKind]) {
        if self.in_try_parse() {
            return;
        }
        let actual = self.lookahead();
        let wanted: Vec<&str> = expected
            .iter()
            .map(|k| k.lexeme().unwrap_or_else(|| k.description()))
            .collect();
        error!(
            "({}) Expect one of {}, but got {}",
            actual.loc,
            wanted.join(" "),
            actual.lexeme
        );
    }

    /// The position and lexeme of the last consumed token, used to anchor
    /// missing-token reports.
    fn recovery_anchor(&self) -> (SourceLocation, EcoString) {
        match self.stream.current() {
            Some(token) => (token.loc, token.lexeme.clone()),
            None => (SourceLocation::start(), EcoString::new()),
        }
    }

    /// Logs a missing right-delimiter (or semicolon) to the error log and
    /// inserts a pseudo-terminal so the tree stays well-formed. The input
    /// is not consumed.
    pub(super) fn recover_missing_token(&mut self, node: NodeId, expected: TokenKind) {
        let kind = match expected {
            TokenKind::Semicolon => CompileErrorKind::MissingSemicolon,
            TokenKind::RightParen => CompileErrorKind::MissingRightParen,
            TokenKind::RightBracket => CompileErrorKind::MissingRightBracket,
            TokenKind::RightBrace => CompileErrorKind::MissingRightBrace,
            _ => CompileErrorKind::Unknown,
        };
        let wanted = expected.lexeme().unwrap_or("");
        let (loc, after) = self.recovery_anchor();
        if after.is_empty() {
            self.errors.report(
                loc,
                kind,
                format!("Missing '{wanted}' at the beginning of file"),
            );
        } else {
            self.errors
                .report(loc, kind, format!("Missing '{wanted}' after '{after}'"));
        }

        let pseudo = self.tree.new_terminal(Token::pseudo(expected, loc));
        self.tree.insert_end_child(node, pseudo);
    }

    /// Consumes an expected right-delimiter, recovering if absent.
    pub(super) fn expect_or_recover(&mut self, node: NodeId, expected: TokenKind) {
        if self.check(expected) {
            self.consume_into(node);
        } else {
            self.recover_missing_token(node, expected);
        }
    }

    /// Marks a node whose subtree lost content to error recovery.
    pub(super) fn mark_corrupted(&mut self, node: NodeId) {
        self.tree.attrs_mut(node).corrupted = true;
    }

    // ========================================================================
    // CompUnit
    // ========================================================================

    /// `CompUnit → Decl* FuncDef* MainFuncDef`
    fn parse_comp_unit(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::CompUnit);

        while self.match_decl() {
            let Some(decl) = self.parse_decl() else {
                self.log_failed_to_parse(SyntaxKind::Decl);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, decl);
        }

        while self.match_func_def() {
            let Some(func_def) = self.parse_func_def() else {
                self.log_failed_to_parse(SyntaxKind::FuncDef);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, func_def);
        }

        let Some(main_func_def) = self.parse_main_func_def() else {
            self.log_failed_to_parse(SyntaxKind::MainFuncDef);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, main_func_def);

        Some(root)
    }

    /// A declaration begins with `const`, or with `int ident` not
    /// followed by `(`.
    fn match_decl(&mut self) -> bool {
        if self.check(TokenKind::Const) {
            return true;
        }
        if self.check(TokenKind::Int) && self.check_n(2, TokenKind::Identifier) {
            return !self.check_n(3, TokenKind::LeftParen);
        }
        false
    }

    const FUNC_TYPE_FIRST: [TokenKind; 2] = [TokenKind::Int, TokenKind::Void];

    /// A function definition begins with `int`/`void`, an identifier,
    /// then `(`.
    fn match_func_def(&mut self) -> bool {
        if !self.check_any(&Self::FUNC_TYPE_FIRST) {
            return false;
        }
        self.check_n(2, TokenKind::Identifier) && self.check_n(3, TokenKind::LeftParen)
    }

    // ========================================================================
    // Decl
    // ========================================================================

    /// `Decl → ConstDecl | VarDecl`
    fn parse_decl(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::Decl);

        if self.check(TokenKind::Const) {
            let Some(const_decl) = self.parse_const_decl() else {
                self.log_failed_to_parse(SyntaxKind::ConstDecl);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, const_decl);
        } else {
            let Some(var_decl) = self.parse_var_decl() else {
                self.log_failed_to_parse(SyntaxKind::VarDecl);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, var_decl);
        }

        Some(root)
    }

    /// `BType → 'int'`
    pub(super) fn parse_btype(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::BType);

        if self.check(TokenKind::Int) {
            self.consume_into(root);
        } else {
            self.log_expect(TokenKind::Int);
            return self.bail(checkpoint, root);
        }

        Some(root)
    }

    /// `ConstDecl → 'const' BType ConstDef (',' ConstDef)* ';'`
    pub(super) fn parse_const_decl(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::ConstDecl);

        if !self.check(TokenKind::Const) {
            self.log_expect(TokenKind::Const);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        let Some(btype) = self.parse_btype() else {
            self.log_failed_to_parse(SyntaxKind::BType);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, btype);

        let Some(const_def) = self.parse_const_def() else {
            self.log_failed_to_parse(SyntaxKind::ConstDef);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, const_def);

        while self.check(TokenKind::Comma) {
            self.consume_into(root);
            let Some(const_def) = self.parse_const_def() else {
                self.log_failed_to_parse(SyntaxKind::ConstDef);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, const_def);
        }

        self.expect_or_recover(root, TokenKind::Semicolon);

        Some(root)
    }

    /// `ConstDef → Ident ('[' ConstExp ']')* '=' ConstInitVal`
    fn parse_const_def(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::ConstDef);

        if !self.check(TokenKind::Identifier) {
            self.log_expect(TokenKind::Identifier);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        while self.check(TokenKind::LeftBracket) {
            self.consume_into(root);

            let Some(const_exp) = self.parse_const_exp() else {
                self.log_failed_to_parse(SyntaxKind::ConstExp);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, const_exp);

            self.expect_or_recover(root, TokenKind::RightBracket);
        }

        if !self.check(TokenKind::Assign) {
            self.log_expect(TokenKind::Assign);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        let Some(const_init_val) = self.parse_const_init_val() else {
            self.log_failed_to_parse(SyntaxKind::ConstInitVal);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, const_init_val);

        Some(root)
    }

    /// `ConstInitVal → ConstExp | '{' (ConstInitVal (',' ConstInitVal)*)? '}'`
    fn parse_const_init_val(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::ConstInitVal);

        if self.check(TokenKind::LeftBrace) {
            self.consume_into(root);

            if self.check(TokenKind::RightBrace) {
                debug!("Empty initialization list in <ConstInitVal>");
                self.consume_into(root);
                return Some(root);
            }

            let Some(init) = self.parse_const_init_val() else {
                self.log_failed_to_parse(SyntaxKind::ConstInitVal);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, init);

            while self.check(TokenKind::Comma) {
                self.consume_into(root);
                let Some(init) = self.parse_const_init_val() else {
                    self.log_failed_to_parse(SyntaxKind::ConstInitVal);
                    return self.bail(checkpoint, root);
                };
                self.tree.insert_end_child(root, init);
            }

            self.expect_or_recover(root, TokenKind::RightBrace);
            return Some(root);
        }

        let Some(const_exp) = self.parse_const_exp() else {
            self.log_failed_to_parse(SyntaxKind::ConstExp);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, const_exp);

        Some(root)
    }

    /// `VarDecl → BType VarDef (',' VarDef)* ';'`
    pub(super) fn parse_var_decl(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::VarDecl);

        let Some(btype) = self.parse_btype() else {
            self.log_failed_to_parse(SyntaxKind::BType);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, btype);

        let Some(var_def) = self.parse_var_def() else {
            self.log_failed_to_parse(SyntaxKind::VarDef);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, var_def);

        while self.check(TokenKind::Comma) {
            self.consume_into(root);
            let Some(var_def) = self.parse_var_def() else {
                self.log_failed_to_parse(SyntaxKind::VarDef);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, var_def);
        }

        self.expect_or_recover(root, TokenKind::Semicolon);

        Some(root)
    }

    /// `VarDef → Ident ('[' ConstExp ']')* ('=' InitVal)?`
    fn parse_var_def(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::VarDef);

        if !self.check(TokenKind::Identifier) {
            self.log_expect(TokenKind::Identifier);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        while self.check(TokenKind::LeftBracket) {
            self.consume_into(root);

            let Some(const_exp) = self.parse_const_exp() else {
                self.log_failed_to_parse(SyntaxKind::ConstExp);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, const_exp);

            self.expect_or_recover(root, TokenKind::RightBracket);
        }

        if self.check(TokenKind::Assign) {
            self.consume_into(root);
            let Some(init_val) = self.parse_init_val() else {
                self.log_failed_to_parse(SyntaxKind::InitVal);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, init_val);
        }

        Some(root)
    }

    /// `InitVal → Exp | '{' (InitVal (',' InitVal)*)? '}'`
    fn parse_init_val(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::InitVal);

        if self.check(TokenKind::LeftBrace) {
            self.consume_into(root);

            if self.check(TokenKind::RightBrace) {
                debug!("Empty initialization list in <InitVal>");
                self.consume_into(root);
                return Some(root);
            }

            let Some(init) = self.parse_init_val() else {
                self.log_failed_to_parse(SyntaxKind::InitVal);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, init);

            while self.check(TokenKind::Comma) {
                self.consume_into(root);
                let Some(init) = self.parse_init_val() else {
                    self.log_failed_to_parse(SyntaxKind::InitVal);
                    return self.bail(checkpoint, root);
                };
                self.tree.insert_end_child(root, init);
            }

            self.expect_or_recover(root, TokenKind::RightBrace);
            return Some(root);
        }

        let Some(exp) = self.parse_exp() else {
            self.log_failed_to_parse(SyntaxKind::Exp);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, exp);

        Some(root)
    }

    // ========================================================================
    // FuncDef
    // ========================================================================

    /// `FuncDef → FuncDecl Block`
    fn parse_func_def(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::FuncDef);

        let Some(func_decl) = self.parse_func_decl() else {
            self.log_failed_to_parse(SyntaxKind::FuncDecl);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, func_decl);

        let Some(block) = self.parse_block() else {
            self.log_failed_to_parse(SyntaxKind::Block);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, block);

        Some(root)
    }

    /// `FuncDecl → FuncType Ident '(' FuncFParams? ')'`
    fn parse_func_decl(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::FuncDecl);

        let Some(func_type) = self.parse_func_type() else {
            self.log_failed_to_parse(SyntaxKind::FuncType);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, func_type);

        if !self.check(TokenKind::Identifier) {
            self.log_expect(TokenKind::Identifier);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        if !self.check(TokenKind::LeftParen) {
            self.log_expect(TokenKind::LeftParen);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        if !self.check(TokenKind::RightParen) {
            if let Some(params) = self.parse_func_fparams() {
                self.tree.insert_end_child(root, params);
            } else {
                // Accepted with a warning; recovery continues at ')'.
                self.log_failed_to_parse(SyntaxKind::FuncFParams);
            }
        }

        self.expect_or_recover(root, TokenKind::RightParen);

        Some(root)
    }

    /// `FuncType → 'int' | 'void'`
    fn parse_func_type(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::FuncType);

        if self.check_any(&Self::FUNC_TYPE_FIRST) {
            self.consume_into(root);
        } else {
            self.log_expect_any(&Self::FUNC_TYPE_FIRST);
            return self.bail(checkpoint, root);
        }

        Some(root)
    }

    /// `FuncFParams → FuncFParam (',' FuncFParam)*`
    fn parse_func_fparams(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::FuncFParams);

        let Some(param) = self.parse_func_fparam() else {
            self.log_failed_to_parse(SyntaxKind::FuncFParam);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, param);

        while self.check(TokenKind::Comma) {
            self.consume_into(root);
            let Some(param) = self.parse_func_fparam() else {
                self.log_failed_to_parse(SyntaxKind::FuncFParam);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, param);
        }

        Some(root)
    }

    /// `FuncFParam → BType Ident ('[' ']' ('[' ConstExp ']')?)?`
    fn parse_func_fparam(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::FuncFParam);

        let Some(btype) = self.parse_btype() else {
            self.log_failed_to_parse(SyntaxKind::BType);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, btype);

        if !self.check(TokenKind::Identifier) {
            self.log_expect(TokenKind::Identifier);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        if self.check(TokenKind::LeftBracket) {
            self.consume_into(root);
            self.expect_or_recover(root, TokenKind::RightBracket);

            if self.check(TokenKind::LeftBracket) {
                self.consume_into(root);

                let Some(const_exp) = self.parse_const_exp() else {
                    self.log_failed_to_parse(SyntaxKind::ConstExp);
                    return self.bail(checkpoint, root);
                };
                self.tree.insert_end_child(root, const_exp);

                self.expect_or_recover(root, TokenKind::RightBracket);
            }
        }

        Some(root)
    }

    /// `FuncAParams → FuncAParam (',' FuncAParam)*`
    pub(super) fn parse_func_aparams(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::FuncAParams);

        let Some(param) = self.parse_func_aparam() else {
            self.log_failed_to_parse(SyntaxKind::FuncAParam);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, param);

        while self.check(TokenKind::Comma) {
            self.consume_into(root);
            let Some(param) = self.parse_func_aparam() else {
                self.log_failed_to_parse(SyntaxKind::FuncAParam);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, param);
        }

        Some(root)
    }

    /// `FuncAParam → Exp`
    fn parse_func_aparam(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::FuncAParam);

        let Some(exp) = self.parse_exp() else {
            self.log_failed_to_parse(SyntaxKind::Exp);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, exp);

        Some(root)
    }

    // ========================================================================
    // Block
    // ========================================================================

    /// `Block → '{' BlockItem* '}'`
    pub(super) fn parse_block(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::Block);

        if !self.check(TokenKind::LeftBrace) {
            self.log_expect(TokenKind::LeftBrace);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        while !self.check(TokenKind::RightBrace) {
            if self.check(TokenKind::Terminator) {
                break;
            }
            let Some(item) = self.parse_block_item() else {
                self.log_failed_to_parse(SyntaxKind::BlockItem);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, item);
        }

        self.expect_or_recover(root, TokenKind::RightBrace);

        Some(root)
    }

    /// `BlockItem → ConstDecl | VarDecl | Stmt`
    fn parse_block_item(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::BlockItem);

        if self.check(TokenKind::Const) {
            let Some(const_decl) = self.parse_const_decl() else {
                self.log_failed_to_parse(SyntaxKind::ConstDecl);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, const_decl);
        } else if self.check(TokenKind::Int) {
            let Some(var_decl) = self.parse_var_decl() else {
                self.log_failed_to_parse(SyntaxKind::VarDecl);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, var_decl);
        } else {
            let Some(stmt) = self.parse_stmt() else {
                self.log_failed_to_parse(SyntaxKind::Stmt);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, stmt);
        }

        Some(root)
    }

    /// `MainFuncDef → 'int' 'main' '(' ')' Block`
    fn parse_main_func_def(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::MainFuncDef);

        if !self.check(TokenKind::Int) {
            self.log_expect(TokenKind::Int);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        if !self.check(TokenKind::Main) {
            self.log_expect(TokenKind::Main);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        if !self.check(TokenKind::LeftParen) {
            self.log_expect(TokenKind::LeftParen);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        self.expect_or_recover(root, TokenKind::RightParen);

        let Some(block) = self.parse_block() else {
            self.log_failed_to_parse(SyntaxKind::Block);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, block);

        Some(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> SyntaxTree {
        let errors = ErrorLog::new();
        let tree = parse(source, &errors).expect("expected a parse tree");
        assert!(errors.is_empty(), "unexpected errors: {}", errors.dump());
        tree
    }

    fn kind_of(tree: &SyntaxTree, id: NodeId) -> SyntaxKind {
        tree.kind(id).expect("expected a non-terminal")
    }

    #[test]
    fn parse_minimal_main() {
        let tree = parse_ok("int main() { return 0; }");
        let root = tree.root().unwrap();
        assert_eq!(kind_of(&tree, root), SyntaxKind::CompUnit);

        let children = tree.children(root);
        assert_eq!(children.len(), 1);
        assert_eq!(kind_of(&tree, children[0]), SyntaxKind::MainFuncDef);
    }

    #[test]
    fn parse_decls_before_functions() {
        let tree = parse_ok(
            "const int N = 3;\nint g = 2;\nint f(int a) { return a; }\nint main() { return f(g); }",
        );
        let root = tree.root().unwrap();
        let kinds: Vec<_> = tree
            .children(root)
            .into_iter()
            .map(|c| kind_of(&tree, c))
            .collect();
        assert_eq!(
            kinds,
            vec![
                SyntaxKind::Decl,
                SyntaxKind::Decl,
                SyntaxKind::FuncDef,
                SyntaxKind::MainFuncDef,
            ]
        );
    }

    #[test]
    fn missing_semicolon_is_recovered() {
        let errors = ErrorLog::new();
        let tree = parse("int main() { int a = 1\n return a; }", &errors).expect("tree");

        let entries = errors.sorted_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, CompileErrorKind::MissingSemicolon);
        // Anchored at the last token of the declaration.
        assert_eq!(entries[0].loc.line, 1);

        // The tree contains a synthetic semicolon terminal.
        let root = tree.root().unwrap();
        let var_decl = tree.find_descendant(root, SyntaxKind::VarDecl).unwrap();
        let last = tree.last_child(var_decl).unwrap();
        assert_eq!(tree.token_kind(last), Some(TokenKind::Semicolon));
        assert_eq!(tree.token(last).unwrap().lexeme, ";");
    }

    #[test]
    fn missing_right_paren_in_main_is_recovered() {
        let errors = ErrorLog::new();
        let tree = parse("int main( { return 0; }", &errors).expect("tree");
        assert_eq!(
            errors.sorted_entries()[0].kind,
            CompileErrorKind::MissingRightParen
        );
        assert!(tree.root().is_some());
    }

    #[test]
    fn fatal_failure_returns_none() {
        let errors = ErrorLog::new();
        assert!(parse("void oops", &errors).is_none());
    }

    #[test]
    fn array_defs_parse() {
        let tree = parse_ok("const int a[2][2] = {{1, 2}, {3, 4}};\nint b[4];\nint main() { return a[1][1] + b[0]; }");
        let root = tree.root().unwrap();
        assert_eq!(tree.children(root).len(), 3);
    }

    #[test]
    fn function_params_parse() {
        let tree = parse_ok("int f(int a, int b[], int c[][3]) { return a; }\nint main() { return 0; }");
        let root = tree.root().unwrap();
        let func = tree.find_descendant(root, SyntaxKind::FuncFParams).unwrap();
        let params: Vec<_> = tree
            .children(func)
            .into_iter()
            .filter(|&c| tree.kind(c) == Some(SyntaxKind::FuncFParam))
            .collect();
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn parser_is_deterministic() {
        let source = "int g = 1;\nint f() { return g; }\nint main() { return f() + 2 * 3; }";
        let errors_a = ErrorLog::new();
        let errors_b = ErrorLog::new();
        let tree_a = parse(source, &errors_a).unwrap();
        let tree_b = parse(source, &errors_b).unwrap();

        fn dump(tree: &SyntaxTree, id: NodeId, out: &mut String) {
            match tree.variant(id) {
                crate::source_analysis::NodeVariant::NonTerminal(kind) => {
                    out.push_str(kind.description());
                    out.push('(');
                    for child in tree.children(id) {
                        dump(tree, child, out);
                    }
                    out.push(')');
                }
                crate::source_analysis::NodeVariant::Terminal(token) => {
                    out.push_str(&token.lexeme);
                    out.push(' ');
                }
                crate::source_analysis::NodeVariant::Epsilon => out.push('e'),
            }
        }

        let mut a = String::new();
        let mut b = String::new();
        dump(&tree_a, tree_a.root().unwrap(), &mut a);
        dump(&tree_b, tree_b.root().unwrap(), &mut b);
        assert_eq!(a, b);
    }
}
