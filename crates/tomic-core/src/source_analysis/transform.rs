// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Right-recursion rewriting.
//!
//! The parser keeps binary expressions LL(1) by parsing them through
//! right-recursive auxiliary productions, leaving shapes like
//!
//! ```text
//! AddExp
//! ├── MulExp (1)
//! └── AddExp            <- auxiliary: first child is an operator
//!     ├── '-'
//!     ├── MulExp (2)
//!     └── AddExp
//!         ├── '-'
//!         └── MulExp (3)
//! ```
//!
//! This pass dissolves the auxiliary chains into left-associated binary
//! trees, so `1 - 2 - 3` becomes `(1 - 2) - 3`:
//!
//! ```text
//! AddExp
//! ├── AddExp
//! │   ├── AddExp ── MulExp (1)
//! │   ├── '-'
//! │   └── MulExp (2)
//! ├── '-'
//! └── MulExp (3)
//! ```
//!
//! After the pass, every expression node of these kinds has either a
//! single operand child or exactly `[lhs, operator, rhs]` - the shape
//! the semantic analyzer and the generator consume.

use super::{NodeId, SyntaxKind, SyntaxTree};

/// The expression kinds parsed through auxiliary right recursion.
const FOLDABLE: [SyntaxKind; 6] = [
    SyntaxKind::AddExp,
    SyntaxKind::MulExp,
    SyntaxKind::OrExp,
    SyntaxKind::AndExp,
    SyntaxKind::EqExp,
    SyntaxKind::RelExp,
];

/// Rewrites right-recursive auxiliary chains into left-associated trees.
#[derive(Debug, Default)]
pub struct RightRecursiveTransformer;

impl RightRecursiveTransformer {
    /// Creates a new transformer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Transforms the whole tree in place.
    pub fn transform(&self, tree: &mut SyntaxTree) {
        if let Some(root) = tree.root() {
            Self::transform_node(tree, root);
        }
    }

    fn transform_node(tree: &mut SyntaxTree, node: NodeId) {
        if let Some(kind) = tree.kind(node) {
            if FOLDABLE.contains(&kind) {
                Self::fold(tree, node, kind);
            }
        }
        for child in tree.children(node) {
            Self::transform_node(tree, child);
        }
    }

    /// An auxiliary node has the kind of its parent expression and leads
    /// with an operator terminal.
    fn is_aux(tree: &SyntaxTree, node: NodeId, kind: SyntaxKind) -> bool {
        tree.kind(node) == Some(kind)
            && tree
                .first_child(node)
                .is_some_and(|first| tree.is_terminal(first))
    }

    fn fold(tree: &mut SyntaxTree, node: NodeId, kind: SyntaxKind) {
        let children = tree.children(node);
        if children.len() != 2 || !Self::is_aux(tree, children[1], kind) {
            return;
        }

        // Unzip the chain into operands and operators.
        let first = children[0];
        let mut aux = children[1];
        tree.unlink(first);
        tree.unlink(aux);

        let mut operands = vec![first];
        let mut operators = Vec::new();
        loop {
            let parts = tree.children(aux);
            debug_assert!(parts.len() == 2 || parts.len() == 3);
            let op = parts[0];
            let rhs = parts[1];
            tree.unlink(op);
            tree.unlink(rhs);
            operators.push(op);
            operands.push(rhs);

            match parts.get(2).copied() {
                Some(next) => {
                    tree.unlink(next);
                    aux = next;
                }
                None => break,
            }
        }

        // Rebuild left-associated: all but the last operator get fresh
        // interior nodes; the original node takes the outermost triple.
        let mut left = operands[0];
        for (index, &op) in operators.iter().enumerate().take(operators.len() - 1) {
            let interior = tree.new_non_terminal(kind);
            tree.insert_end_child(interior, left);
            tree.insert_end_child(interior, op);
            tree.insert_end_child(interior, operands[index + 1]);
            left = interior;
        }

        tree.insert_end_child(node, left);
        tree.insert_end_child(node, operators[operators.len() - 1]);
        tree.insert_end_child(node, operands[operands.len() - 1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ErrorLog;
    use crate::source_analysis::{parse, TokenKind};

    fn parse_and_transform(exp: &str) -> SyntaxTree {
        let errors = ErrorLog::new();
        let source = format!("int main() {{ return {exp}; }}");
        let mut tree = parse(&source, &errors).expect("expected a parse tree");
        assert!(errors.is_empty(), "{}", errors.dump());
        RightRecursiveTransformer::new().transform(&mut tree);
        tree
    }

    /// Renders an expression subtree as a parenthesized string, keeping
    /// only operators and leaves.
    fn shape(tree: &SyntaxTree, node: NodeId) -> String {
        if let Some(token) = tree.token(node) {
            return token.lexeme.to_string();
        }
        let children = tree.children(node);
        match children.len() {
            0 => String::new(),
            1 => shape(tree, children[0]),
            _ => {
                let parts: Vec<String> = children.iter().map(|&c| shape(tree, c)).collect();
                format!("({})", parts.join(" "))
            }
        }
    }

    fn top_exp_shape(tree: &SyntaxTree) -> String {
        let root = tree.root().unwrap();
        let exp = tree.find_descendant(root, SyntaxKind::Exp).unwrap();
        shape(tree, exp)
    }

    #[test]
    fn subtraction_is_left_associated() {
        let tree = parse_and_transform("1 - 2 - 3");
        assert_eq!(top_exp_shape(&tree), "((1 - 2) - 3)");
    }

    #[test]
    fn single_operand_is_untouched() {
        let tree = parse_and_transform("42");
        assert_eq!(top_exp_shape(&tree), "42");
    }

    #[test]
    fn mixed_precedence_folds_each_level() {
        let tree = parse_and_transform("1 + 2 * 3 - 4");
        assert_eq!(top_exp_shape(&tree), "((1 + (2 * 3)) - 4)");
    }

    #[test]
    fn division_chain_is_left_associated() {
        let tree = parse_and_transform("8 / 4 / 2");
        assert_eq!(top_exp_shape(&tree), "((8 / 4) / 2)");
    }

    #[test]
    fn folded_nodes_have_binary_shape() {
        let tree = parse_and_transform("1 + 2 + 3 + 4");
        let root = tree.root().unwrap();
        let add = tree.find_descendant(root, SyntaxKind::AddExp).unwrap();

        let children = tree.children(add);
        assert_eq!(children.len(), 3);
        assert_eq!(tree.kind(children[0]), Some(SyntaxKind::AddExp));
        assert_eq!(tree.token_kind(children[1]), Some(TokenKind::Plus));
        assert_eq!(tree.kind(children[2]), Some(SyntaxKind::MulExp));
    }

    #[test]
    fn condition_chains_fold() {
        let errors = ErrorLog::new();
        let mut tree = parse(
            "int main() { if (1 < 2 && 3 < 4 && 5 < 6) return 1; return 0; }",
            &errors,
        )
        .unwrap();
        RightRecursiveTransformer::new().transform(&mut tree);

        let root = tree.root().unwrap();
        let and = tree.find_descendant(root, SyntaxKind::AndExp).unwrap();
        let children = tree.children(and);
        assert_eq!(children.len(), 3);
        assert_eq!(tree.token_kind(children[1]), Some(TokenKind::AndAnd));
        assert_eq!(tree.kind(children[0]), Some(SyntaxKind::AndExp));
    }
}
