// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Statement parsing.
//!
//! Statement parsing is a little tricky: an input statement, an
//! assignment, and an expression statement can all start with an
//! identifier. [`Parser::parse_stmt_aux`] disambiguates by speculative
//! parsing, attempting the simplest form first.

use tracing::debug;

use super::{NodeId, Parser, SyntaxKind, TokenKind};

impl Parser<'_, '_> {
    /// `Stmt → AssignmentStmt | ExpStmt | InStmt | IfStmt | ForStmt
    ///        | BreakStmt | ContinueStmt | ReturnStmt | OutStmt | Block`
    pub(super) fn parse_stmt(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::Stmt);

        // ExpStmt, AssignmentStmt and InStmt can all start with an
        // identifier, so those are tried speculatively. No other statement
        // starts with an identifier.
        if self.check(TokenKind::Identifier) {
            self.set_try_parse(true);
            let stmt = self.parse_stmt_aux();
            self.set_try_parse(false);

            let Some(stmt) = stmt else {
                self.log_failed_to_parse(SyntaxKind::Stmt);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, stmt);
            return Some(root);
        }

        let child = if self.check(TokenKind::If) {
            let child = self.parse_if_stmt();
            if child.is_none() {
                self.log_failed_to_parse(SyntaxKind::IfStmt);
            }
            child
        } else if self.check(TokenKind::For) {
            let child = self.parse_for_stmt();
            if child.is_none() {
                self.log_failed_to_parse(SyntaxKind::ForStmt);
            }
            child
        } else if self.check(TokenKind::Break) {
            let child = self.parse_break_stmt();
            if child.is_none() {
                self.log_failed_to_parse(SyntaxKind::BreakStmt);
            }
            child
        } else if self.check(TokenKind::Continue) {
            let child = self.parse_continue_stmt();
            if child.is_none() {
                self.log_failed_to_parse(SyntaxKind::ContinueStmt);
            }
            child
        } else if self.check(TokenKind::Return) {
            let child = self.parse_return_stmt();
            if child.is_none() {
                self.log_failed_to_parse(SyntaxKind::ReturnStmt);
            }
            child
        } else if self.check(TokenKind::Printf) {
            let child = self.parse_out_stmt();
            if child.is_none() {
                self.log_failed_to_parse(SyntaxKind::OutStmt);
            }
            child
        } else if self.check(TokenKind::LeftBrace) {
            let child = self.parse_block();
            if child.is_none() {
                self.log_failed_to_parse(SyntaxKind::Block);
            }
            child
        } else {
            // Anything else must be an expression statement.
            let child = self.parse_exp_stmt();
            if child.is_none() {
                self.log_failed_to_parse(SyntaxKind::ExpStmt);
            }
            child
        };

        let Some(child) = child else {
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, child);

        Some(root)
    }

    /// Disambiguates the identifier-initial statements by attempting
    /// InStmt, AssignmentStmt, then ExpStmt in that order.
    fn parse_stmt_aux(&mut self) -> Option<NodeId> {
        if let Some(in_stmt) = self.parse_in_stmt() {
            return Some(in_stmt);
        }
        if let Some(assignment) = self.parse_assignment_stmt() {
            return Some(assignment);
        }
        if let Some(exp_stmt) = self.parse_exp_stmt() {
            return Some(exp_stmt);
        }

        debug!("StmtAux didn't match any Stmt");
        None
    }

    /// `AssignmentStmt → LVal '=' Exp ';'`
    fn parse_assignment_stmt(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::AssignmentStmt);

        let Some(lval) = self.parse_lval() else {
            self.log_failed_to_parse(SyntaxKind::LVal);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, lval);

        if !self.check(TokenKind::Assign) {
            self.log_expect(TokenKind::Assign);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        let Some(exp) = self.parse_exp() else {
            self.log_failed_to_parse(SyntaxKind::Exp);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, exp);

        self.expect_or_recover(root, TokenKind::Semicolon);

        Some(root)
    }

    /// `LVal → Ident ('[' Exp ']')*`
    pub(super) fn parse_lval(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::LVal);

        if !self.check(TokenKind::Identifier) {
            self.log_expect(TokenKind::Identifier);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        while self.check(TokenKind::LeftBracket) {
            self.consume_into(root);

            let Some(exp) = self.parse_exp() else {
                self.log_failed_to_parse(SyntaxKind::Exp);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, exp);

            self.expect_or_recover(root, TokenKind::RightBracket);
        }

        Some(root)
    }

    /// `Cond → OrExp`
    fn parse_cond(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::Cond);

        let Some(or_exp) = self.parse_or_exp() else {
            self.log_failed_to_parse(SyntaxKind::OrExp);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, or_exp);

        Some(root)
    }

    /// `IfStmt → 'if' '(' Cond ')' Stmt ('else' Stmt)?`
    fn parse_if_stmt(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::IfStmt);

        if !self.check(TokenKind::If) {
            self.log_expect(TokenKind::If);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        if !self.check(TokenKind::LeftParen) {
            self.log_expect(TokenKind::LeftParen);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        let Some(cond) = self.parse_cond() else {
            self.log_failed_to_parse(SyntaxKind::Cond);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, cond);

        self.expect_or_recover(root, TokenKind::RightParen);

        let Some(stmt) = self.parse_stmt() else {
            self.log_failed_to_parse(SyntaxKind::Stmt);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, stmt);

        if self.check(TokenKind::Else) {
            self.consume_into(root);

            let Some(stmt) = self.parse_stmt() else {
                self.log_failed_to_parse(SyntaxKind::Stmt);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, stmt);
        }

        Some(root)
    }

    /// `ForStmt → 'for' '(' ForInitStmt? ';' Cond? ';' ForStepStmt? ')' Stmt`
    fn parse_for_stmt(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::ForStmt);

        if !self.check(TokenKind::For) {
            self.log_expect(TokenKind::For);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        if !self.check(TokenKind::LeftParen) {
            self.log_expect(TokenKind::LeftParen);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        if !self.check(TokenKind::Semicolon) {
            let Some(init) = self.parse_for_init_stmt() else {
                self.log_failed_to_parse(SyntaxKind::ForInitStmt);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, init);
        }
        self.expect_or_recover(root, TokenKind::Semicolon);

        if !self.check(TokenKind::Semicolon) {
            let Some(cond) = self.parse_cond() else {
                self.log_failed_to_parse(SyntaxKind::Cond);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, cond);
        }
        self.expect_or_recover(root, TokenKind::Semicolon);

        if !self.check(TokenKind::RightParen) {
            let Some(step) = self.parse_for_step_stmt() else {
                self.log_failed_to_parse(SyntaxKind::ForStepStmt);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, step);
        }
        self.expect_or_recover(root, TokenKind::RightParen);

        let Some(stmt) = self.parse_stmt() else {
            self.log_failed_to_parse(SyntaxKind::Stmt);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, stmt);

        Some(root)
    }

    /// `ForInitStmt → LVal '=' Exp`
    fn parse_for_init_stmt(&mut self) -> Option<NodeId> {
        self.parse_for_clause(SyntaxKind::ForInitStmt)
    }

    /// `ForStepStmt → LVal '=' Exp`
    fn parse_for_step_stmt(&mut self) -> Option<NodeId> {
        self.parse_for_clause(SyntaxKind::ForStepStmt)
    }

    fn parse_for_clause(&mut self, kind: SyntaxKind) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(kind);

        let Some(lval) = self.parse_lval() else {
            self.log_failed_to_parse(SyntaxKind::LVal);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, lval);

        if !self.check(TokenKind::Assign) {
            self.log_expect(TokenKind::Assign);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        let Some(exp) = self.parse_exp() else {
            self.log_failed_to_parse(SyntaxKind::Exp);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, exp);

        Some(root)
    }

    /// `ExpStmt → Exp? ';'`
    fn parse_exp_stmt(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::ExpStmt);

        if !self.check(TokenKind::Semicolon) {
            let exp = self.parse_exp();
            match exp {
                Some(exp) => self.tree.insert_end_child(root, exp),
                None => {
                    // Without this, a token that starts no expression
                    // would never be consumed and block parsing would
                    // spin forever. Swallow one junk token; it is not a
                    // ';', so the error below still fires.
                    self.stream.rollback(checkpoint);
                    self.stream.next();
                }
            }
        }

        self.expect_or_recover(root, TokenKind::Semicolon);

        Some(root)
    }

    /// `BreakStmt → 'break' ';'`
    fn parse_break_stmt(&mut self) -> Option<NodeId> {
        self.parse_keyword_stmt(SyntaxKind::BreakStmt, TokenKind::Break)
    }

    /// `ContinueStmt → 'continue' ';'`
    fn parse_continue_stmt(&mut self) -> Option<NodeId> {
        self.parse_keyword_stmt(SyntaxKind::ContinueStmt, TokenKind::Continue)
    }

    fn parse_keyword_stmt(&mut self, kind: SyntaxKind, keyword: TokenKind) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(kind);

        if !self.check(keyword) {
            self.log_expect(keyword);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        self.expect_or_recover(root, TokenKind::Semicolon);

        Some(root)
    }

    /// `ReturnStmt → 'return' Exp? ';'`
    fn parse_return_stmt(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::ReturnStmt);

        if !self.check(TokenKind::Return) {
            self.log_expect(TokenKind::Return);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        if !self.check(TokenKind::Semicolon) {
            let Some(exp) = self.parse_exp() else {
                self.log_failed_to_parse(SyntaxKind::Exp);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, exp);
        }

        self.expect_or_recover(root, TokenKind::Semicolon);

        Some(root)
    }

    /// `InStmt → LVal '=' 'getint' '(' ')' ';'`
    fn parse_in_stmt(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::InStmt);

        let Some(lval) = self.parse_lval() else {
            self.log_failed_to_parse(SyntaxKind::LVal);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, lval);

        if !self.check(TokenKind::Assign) {
            self.log_expect(TokenKind::Assign);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        if !self.check(TokenKind::Getint) {
            self.log_expect(TokenKind::Getint);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        if !self.check(TokenKind::LeftParen) {
            self.log_expect(TokenKind::LeftParen);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        self.expect_or_recover(root, TokenKind::RightParen);
        self.expect_or_recover(root, TokenKind::Semicolon);

        Some(root)
    }

    /// `OutStmt → 'printf' '(' FormatString (',' Exp)* ')' ';'`
    fn parse_out_stmt(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::OutStmt);

        if !self.check(TokenKind::Printf) {
            self.log_expect(TokenKind::Printf);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        if !self.check(TokenKind::LeftParen) {
            self.log_expect(TokenKind::LeftParen);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        if self.check(TokenKind::FormatString) {
            self.consume_into(root);
        } else {
            self.log_expect(TokenKind::FormatString);
        }

        while self.check(TokenKind::Comma) {
            self.consume_into(root);

            let Some(exp) = self.parse_exp() else {
                self.log_failed_to_parse(SyntaxKind::Exp);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, exp);
        }

        self.expect_or_recover(root, TokenKind::RightParen);
        self.expect_or_recover(root, TokenKind::Semicolon);

        Some(root)
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;
    use crate::diagnostics::ErrorLog;
    use crate::source_analysis::SyntaxTree;

    fn parse_main_body(body: &str) -> (SyntaxTree, ErrorLog) {
        let errors = ErrorLog::new();
        let source = format!("int main() {{ {body} }}");
        let tree = parse(&source, &errors).expect("expected a parse tree");
        (tree, errors)
    }

    fn stmt_kind(tree: &SyntaxTree, index: usize) -> SyntaxKind {
        let root = tree.root().unwrap();
        let block = tree.find_descendant(root, SyntaxKind::Block).unwrap();
        let items: Vec<_> = tree
            .children(block)
            .into_iter()
            .filter(|&c| tree.kind(c) == Some(SyntaxKind::BlockItem))
            .collect();
        let stmt = tree.first_child(items[index]).unwrap();
        match tree.kind(stmt) {
            Some(SyntaxKind::Stmt) => tree.kind(tree.first_child(stmt).unwrap()).unwrap(),
            Some(other) => other,
            None => panic!("expected a non-terminal"),
        }
    }

    #[test]
    fn identifier_statements_disambiguate() {
        let (tree, errors) = parse_main_body("int a; a = getint(); a = 1; f(); return 0;");
        assert!(errors.is_empty(), "{}", errors.dump());
        assert_eq!(stmt_kind(&tree, 1), SyntaxKind::InStmt);
        assert_eq!(stmt_kind(&tree, 2), SyntaxKind::AssignmentStmt);
        assert_eq!(stmt_kind(&tree, 3), SyntaxKind::ExpStmt);
    }

    #[test]
    fn if_else_parses() {
        let (tree, errors) = parse_main_body("if (1 < 2) return 1; else return 2;");
        assert!(errors.is_empty());
        assert_eq!(stmt_kind(&tree, 0), SyntaxKind::IfStmt);
    }

    #[test]
    fn for_with_all_clauses_parses() {
        let (tree, errors) =
            parse_main_body("int i; int s; for (i = 0; i < 10; i = i + 1) s = s + i; return s;");
        assert!(errors.is_empty(), "{}", errors.dump());
        assert_eq!(stmt_kind(&tree, 2), SyntaxKind::ForStmt);
    }

    #[test]
    fn for_clauses_are_optional() {
        let (tree, errors) = parse_main_body("for (;;) break; return 0;");
        assert!(errors.is_empty(), "{}", errors.dump());
        assert_eq!(stmt_kind(&tree, 0), SyntaxKind::ForStmt);
        let root = tree.root().unwrap();
        let for_stmt = tree.find_descendant(root, SyntaxKind::ForStmt).unwrap();
        assert!(tree.find_child(for_stmt, SyntaxKind::ForInitStmt).is_none());
        assert!(tree.find_child(for_stmt, SyntaxKind::Cond).is_none());
        assert!(tree.find_child(for_stmt, SyntaxKind::ForStepStmt).is_none());
    }

    #[test]
    fn break_and_continue_parse() {
        let (tree, errors) = parse_main_body("for (;;) { break; continue; } return 0;");
        assert!(errors.is_empty());
        let root = tree.root().unwrap();
        assert!(tree.find_descendant(root, SyntaxKind::BreakStmt).is_some());
        assert!(tree.find_descendant(root, SyntaxKind::ContinueStmt).is_some());
    }

    #[test]
    fn printf_with_arguments_parses() {
        let (tree, errors) = parse_main_body("int x; x = 1; printf(\"x=%d\\n\", x); return 0;");
        assert!(errors.is_empty(), "{}", errors.dump());
        let root = tree.root().unwrap();
        let out = tree.find_descendant(root, SyntaxKind::OutStmt).unwrap();
        assert_eq!(tree.children(out).len(), 7); // printf ( fmt , exp ) ;
    }

    #[test]
    fn missing_paren_in_getint_recovers() {
        let (_tree, errors) = parse_main_body("int a; a = getint(; return a;");
        assert!(errors
            .sorted_entries()
            .iter()
            .any(|e| e.kind == crate::diagnostics::CompileErrorKind::MissingRightParen));
    }

    #[test]
    fn empty_statement_parses() {
        let (tree, errors) = parse_main_body("; return 0;");
        assert!(errors.is_empty());
        assert_eq!(stmt_kind(&tree, 0), SyntaxKind::ExpStmt);
    }
}
