// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Expression parsing.
//!
//! Binary chains are parsed through right-recursive auxiliary
//! productions (`AddExpAux`, `MulExpAux`, ...) so the grammar stays
//! LL(1). The auxiliary nodes reuse the kind of their parent expression;
//! the post-parse transformer dissolves them into left-associated
//! binary trees.

use super::{NodeId, Parser, SyntaxKind, TokenKind};

const ADD_OPS: [TokenKind; 2] = [TokenKind::Plus, TokenKind::Minus];
const MUL_OPS: [TokenKind; 3] = [TokenKind::Star, TokenKind::Slash, TokenKind::Percent];
const OR_OPS: [TokenKind; 1] = [TokenKind::OrOr];
const AND_OPS: [TokenKind; 1] = [TokenKind::AndAnd];
const EQ_OPS: [TokenKind; 2] = [TokenKind::Equal, TokenKind::NotEqual];
const REL_OPS: [TokenKind; 4] = [
    TokenKind::Less,
    TokenKind::LessEqual,
    TokenKind::Greater,
    TokenKind::GreaterEqual,
];

impl Parser<'_, '_> {
    /// `Exp → AddExp`
    pub(super) fn parse_exp(&mut self) -> Option<NodeId> {
        self.parse_exp_wrapper(SyntaxKind::Exp)
    }

    /// `ConstExp → AddExp`
    pub(super) fn parse_const_exp(&mut self) -> Option<NodeId> {
        self.parse_exp_wrapper(SyntaxKind::ConstExp)
    }

    fn parse_exp_wrapper(&mut self, kind: SyntaxKind) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(kind);

        let Some(add_exp) = self.parse_add_exp() else {
            self.log_failed_to_parse(SyntaxKind::AddExp);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, add_exp);

        Some(root)
    }

    /// `AddExp → MulExp AddExpAux` where
    /// `AddExpAux → ('+'|'-') MulExp AddExpAux | ε`
    fn parse_add_exp(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::AddExp);

        let Some(mul_exp) = self.parse_mul_exp() else {
            self.log_failed_to_parse(SyntaxKind::MulExp);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, mul_exp);

        let Some(aux) = self.parse_add_exp_aux() else {
            self.log_failed_to_parse(SyntaxKind::AddExp);
            return self.bail(checkpoint, root);
        };
        if !self.tree.is_epsilon(aux) {
            self.tree.insert_end_child(root, aux);
        }

        Some(root)
    }

    fn parse_add_exp_aux(&mut self) -> Option<NodeId> {
        if !self.check_any(&ADD_OPS) {
            return Some(self.tree.new_epsilon());
        }

        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::AddExp);

        // Operator already matched above.
        self.consume_into(root);

        let Some(mul_exp) = self.parse_mul_exp() else {
            self.log_failed_to_parse(SyntaxKind::MulExp);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, mul_exp);

        let Some(aux) = self.parse_add_exp_aux() else {
            self.log_failed_to_parse(SyntaxKind::AddExp);
            return self.bail(checkpoint, root);
        };
        if !self.tree.is_epsilon(aux) {
            self.tree.insert_end_child(root, aux);
        }

        Some(root)
    }

    /// `MulExp → UnaryExp MulExpAux` where
    /// `MulExpAux → ('*'|'/'|'%') UnaryExp MulExpAux | ε`
    fn parse_mul_exp(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::MulExp);

        let Some(unary_exp) = self.parse_unary_exp() else {
            self.log_failed_to_parse(SyntaxKind::UnaryExp);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, unary_exp);

        let Some(aux) = self.parse_mul_exp_aux() else {
            self.log_failed_to_parse(SyntaxKind::MulExp);
            return self.bail(checkpoint, root);
        };
        if !self.tree.is_epsilon(aux) {
            self.tree.insert_end_child(root, aux);
        }

        Some(root)
    }

    fn parse_mul_exp_aux(&mut self) -> Option<NodeId> {
        if !self.check_any(&MUL_OPS) {
            return Some(self.tree.new_epsilon());
        }

        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::MulExp);

        self.consume_into(root);

        let Some(unary_exp) = self.parse_unary_exp() else {
            self.log_failed_to_parse(SyntaxKind::UnaryExp);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, unary_exp);

        let Some(aux) = self.parse_mul_exp_aux() else {
            self.log_failed_to_parse(SyntaxKind::MulExp);
            return self.bail(checkpoint, root);
        };
        if !self.tree.is_epsilon(aux) {
            self.tree.insert_end_child(root, aux);
        }

        Some(root)
    }

    /// `UnaryExp → UnaryOp UnaryExp | FuncCall | PrimaryExp`
    fn parse_unary_exp(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::UnaryExp);

        if let Some(unary_op) = self.parse_unary_op() {
            self.tree.insert_end_child(root, unary_op);

            let Some(unary_exp) = self.parse_unary_exp() else {
                self.log_failed_to_parse(SyntaxKind::UnaryExp);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, unary_exp);
            return Some(root);
        }

        if self.check(TokenKind::Identifier) && self.check_n(2, TokenKind::LeftParen) {
            let Some(func_call) = self.parse_func_call() else {
                self.log_failed_to_parse(SyntaxKind::FuncCall);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, func_call);
            return Some(root);
        }

        let Some(primary_exp) = self.parse_primary_exp() else {
            self.log_failed_to_parse(SyntaxKind::PrimaryExp);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, primary_exp);

        Some(root)
    }

    /// `UnaryOp → '+' | '-' | '!'`
    ///
    /// It's fine for UnaryOp not to match; the caller falls through to
    /// the other UnaryExp alternatives.
    fn parse_unary_op(&mut self) -> Option<NodeId> {
        if !self.check_any(&[TokenKind::Plus, TokenKind::Minus, TokenKind::Not]) {
            return None;
        }

        let root = self.tree.new_non_terminal(SyntaxKind::UnaryOp);
        self.consume_into(root);
        Some(root)
    }

    /// `PrimaryExp → Number | '(' Exp ')' | LVal`
    fn parse_primary_exp(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::PrimaryExp);

        if self.check(TokenKind::Integer) {
            let Some(number) = self.parse_number() else {
                self.log_failed_to_parse(SyntaxKind::Number);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, number);
            return Some(root);
        }

        if self.check(TokenKind::LeftParen) {
            self.consume_into(root);

            let Some(exp) = self.parse_exp() else {
                self.log_failed_to_parse(SyntaxKind::Exp);
                return self.bail(checkpoint, root);
            };
            self.tree.insert_end_child(root, exp);

            self.expect_or_recover(root, TokenKind::RightParen);
            return Some(root);
        }

        if let Some(lval) = self.parse_lval() {
            self.tree.insert_end_child(root, lval);
            return Some(root);
        }

        self.log_failed_to_parse(SyntaxKind::PrimaryExp);
        self.bail(checkpoint, root)
    }

    /// `FuncCall → Ident '(' FuncAParams? ')'`
    fn parse_func_call(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::FuncCall);

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
            if let Some(params) = self.parse_func_aparams() {
                self.tree.insert_end_child(root, params);
            } else {
                // Keep the call node; the argument list is lost.
                self.mark_corrupted(root);
                self.log_failed_to_parse(SyntaxKind::FuncAParams);
            }
        }

        self.expect_or_recover(root, TokenKind::RightParen);

        Some(root)
    }

    /// `Number → Integer`
    fn parse_number(&mut self) -> Option<NodeId> {
        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(SyntaxKind::Number);

        if !self.check(TokenKind::Integer) {
            self.log_expect(TokenKind::Integer);
            return self.bail(checkpoint, root);
        }
        self.consume_into(root);

        Some(root)
    }

    /// `OrExp → AndExp OrExpAux` where `OrExpAux → '||' AndExp OrExpAux | ε`
    pub(super) fn parse_or_exp(&mut self) -> Option<NodeId> {
        self.parse_logic_exp(SyntaxKind::OrExp)
    }

    fn parse_logic_exp(&mut self, kind: SyntaxKind) -> Option<NodeId> {
        let (ops, sub_kind): (&[TokenKind], SyntaxKind) = match kind {
            SyntaxKind::OrExp => (&OR_OPS, SyntaxKind::AndExp),
            SyntaxKind::AndExp => (&AND_OPS, SyntaxKind::EqExp),
            SyntaxKind::EqExp => (&EQ_OPS, SyntaxKind::RelExp),
            _ => (&REL_OPS, SyntaxKind::AddExp),
        };

        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(kind);

        let Some(sub) = self.parse_logic_sub(sub_kind) else {
            self.log_failed_to_parse(sub_kind);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, sub);

        let Some(aux) = self.parse_logic_exp_aux(kind, ops, sub_kind) else {
            self.log_failed_to_parse(kind);
            return self.bail(checkpoint, root);
        };
        if !self.tree.is_epsilon(aux) {
            self.tree.insert_end_child(root, aux);
        }

        Some(root)
    }

    fn parse_logic_sub(&mut self, kind: SyntaxKind) -> Option<NodeId> {
        match kind {
            SyntaxKind::AddExp => self.parse_add_exp(),
            _ => self.parse_logic_exp(kind),
        }
    }

    fn parse_logic_exp_aux(
        &mut self,
        kind: SyntaxKind,
        ops: &[TokenKind],
        sub_kind: SyntaxKind,
    ) -> Option<NodeId> {
        if !self.check_any(ops) {
            return Some(self.tree.new_epsilon());
        }

        let checkpoint = self.stream.checkpoint();
        let root = self.tree.new_non_terminal(kind);

        self.consume_into(root);

        let Some(sub) = self.parse_logic_sub(sub_kind) else {
            self.log_failed_to_parse(sub_kind);
            return self.bail(checkpoint, root);
        };
        self.tree.insert_end_child(root, sub);

        let Some(aux) = self.parse_logic_exp_aux(kind, ops, sub_kind) else {
            self.log_failed_to_parse(kind);
            return self.bail(checkpoint, root);
        };
        if !self.tree.is_epsilon(aux) {
            self.tree.insert_end_child(root, aux);
        }

        Some(root)
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;
    use crate::diagnostics::ErrorLog;
    use crate::source_analysis::SyntaxTree;

    fn parse_exp_tree(exp: &str) -> SyntaxTree {
        let errors = ErrorLog::new();
        let source = format!("int main() {{ return {exp}; }}");
        let tree = parse(&source, &errors).expect("expected a parse tree");
        assert!(errors.is_empty(), "{}", errors.dump());
        tree
    }

    #[test]
    fn right_recursive_add_chain_shape() {
        let tree = parse_exp_tree("1 + 2 + 3");
        let root = tree.root().unwrap();
        let add = tree.find_descendant(root, SyntaxKind::AddExp).unwrap();

        // Pre-transform shape: AddExp[MulExp, AddExp[+, MulExp, AddExp[+, MulExp]]]
        let children = tree.children(add);
        assert_eq!(children.len(), 2);
        assert_eq!(tree.kind(children[0]), Some(SyntaxKind::MulExp));
        assert_eq!(tree.kind(children[1]), Some(SyntaxKind::AddExp));

        let aux = tree.children(children[1]);
        assert_eq!(tree.token_kind(aux[0]), Some(TokenKind::Plus));
        assert_eq!(tree.kind(aux[1]), Some(SyntaxKind::MulExp));
        assert_eq!(tree.kind(aux[2]), Some(SyntaxKind::AddExp));
    }

    #[test]
    fn unary_chain_parses() {
        let tree = parse_exp_tree("--+5");
        let root = tree.root().unwrap();
        let unary = tree.find_descendant(root, SyntaxKind::UnaryExp).unwrap();
        let children = tree.children(unary);
        assert_eq!(tree.kind(children[0]), Some(SyntaxKind::UnaryOp));
        assert_eq!(tree.kind(children[1]), Some(SyntaxKind::UnaryExp));
    }

    #[test]
    fn call_with_expression_arguments() {
        let tree = parse_exp_tree("f(1, g(), a + b)");
        let root = tree.root().unwrap();
        let call = tree.find_descendant(root, SyntaxKind::FuncCall).unwrap();
        let params = tree.find_child(call, SyntaxKind::FuncAParams).unwrap();
        let args: Vec<_> = tree
            .children(params)
            .into_iter()
            .filter(|&c| tree.kind(c) == Some(SyntaxKind::FuncAParam))
            .collect();
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn parenthesized_expression() {
        let tree = parse_exp_tree("(1 + 2) * 3");
        let root = tree.root().unwrap();
        let primary = tree.find_descendant(root, SyntaxKind::PrimaryExp).unwrap();
        let children = tree.children(primary);
        assert_eq!(tree.token_kind(children[0]), Some(TokenKind::LeftParen));
        assert_eq!(tree.kind(children[1]), Some(SyntaxKind::Exp));
        assert_eq!(tree.token_kind(children[2]), Some(TokenKind::RightParen));
    }

    #[test]
    fn condition_hierarchy_parses() {
        let errors = ErrorLog::new();
        let tree = parse(
            "int main() { if (1 < 2 && 2 == 2 || !0) return 1; return 0; }",
            &errors,
        )
        .unwrap();
        assert!(errors.is_empty(), "{}", errors.dump());
        let root = tree.root().unwrap();
        for kind in [
            SyntaxKind::Cond,
            SyntaxKind::OrExp,
            SyntaxKind::AndExp,
            SyntaxKind::EqExp,
            SyntaxKind::RelExp,
        ] {
            assert!(tree.find_descendant(root, kind).is_some(), "{kind:?}");
        }
    }

    #[test]
    fn indexed_lval_expression() {
        let tree = parse_exp_tree("a[1][2]");
        let root = tree.root().unwrap();
        let lval = tree.find_descendant(root, SyntaxKind::LVal).unwrap();
        assert_eq!(tree.children(lval).len(), 7); // a [ 1 ] [ 2 ]
    }
}
