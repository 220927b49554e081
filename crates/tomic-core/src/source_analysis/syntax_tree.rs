// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The concrete syntax tree produced by the parser.
//!
//! **DDD Context:** Source Analysis
//!
//! A [`SyntaxTree`] owns all of its nodes in an index arena; a [`NodeId`]
//! is a stable handle into that arena. Nodes form a classic first-child /
//! last-child / sibling structure so productions can append children in
//! parse order and later passes can walk or restructure the tree cheaply.
//!
//! Each node is one of three variants:
//! - [`NodeVariant::NonTerminal`] - a grammar production, tagged with its
//!   [`SyntaxKind`],
//! - [`NodeVariant::Terminal`] - a leaf carrying a [`Token`] (possibly a
//!   pseudo-token inserted by error recovery),
//! - [`NodeVariant::Epsilon`] - an empty production.
//!
//! Every node carries a small typed attribute record ([`NodeAttrs`])
//! filled in by semantic analysis: the set of attribute keys is finite
//! and known, so a dynamic map is not needed.
//!
//! [`SyntaxTree::delete_node`] unlinks a subtree from the tree; the
//! arena keeps the storage until the tree itself is dropped, which is
//! what makes node handles stable for the lifetime of the tree.

use crate::semantic_analysis::symbol_table::BlockId;

use super::{Token, TokenKind};

/// The kind of a non-terminal node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    CompUnit,
    Decl,
    BType,
    ConstDecl,
    ConstDef,
    ConstInitVal,
    VarDecl,
    VarDef,
    InitVal,
    FuncDef,
    FuncDecl,
    FuncType,
    FuncFParams,
    FuncFParam,
    FuncAParams,
    FuncAParam,
    FuncCall,
    Block,
    BlockItem,
    MainFuncDef,
    Stmt,
    AssignmentStmt,
    LVal,
    Cond,
    IfStmt,
    ForStmt,
    ForInitStmt,
    ForStepStmt,
    ExpStmt,
    BreakStmt,
    ContinueStmt,
    ReturnStmt,
    InStmt,
    OutStmt,
    Exp,
    ConstExp,
    AddExp,
    MulExp,
    UnaryExp,
    UnaryOp,
    PrimaryExp,
    Number,
    OrExp,
    AndExp,
    EqExp,
    RelExp,
}

impl SyntaxKind {
    /// The display name used by the AST printers.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::CompUnit => "CompUnit",
            Self::Decl => "Decl",
            Self::BType => "BType",
            Self::ConstDecl => "ConstDecl",
            Self::ConstDef => "ConstDef",
            Self::ConstInitVal => "ConstInitVal",
            Self::VarDecl => "VarDecl",
            Self::VarDef => "VarDef",
            Self::InitVal => "InitVal",
            Self::FuncDef => "FuncDef",
            Self::FuncDecl => "FuncDecl",
            Self::FuncType => "FuncType",
            Self::FuncFParams => "FuncFParams",
            Self::FuncFParam => "FuncFParam",
            Self::FuncAParams => "FuncAParams",
            Self::FuncAParam => "FuncAParam",
            Self::FuncCall => "FuncCall",
            Self::Block => "Block",
            Self::BlockItem => "BlockItem",
            Self::MainFuncDef => "MainFuncDef",
            Self::Stmt => "Stmt",
            Self::AssignmentStmt => "AssignmentStmt",
            Self::LVal => "LVal",
            Self::Cond => "Cond",
            Self::IfStmt => "IfStmt",
            Self::ForStmt => "ForStmt",
            Self::ForInitStmt => "ForInitStmt",
            Self::ForStepStmt => "ForStepStmt",
            Self::ExpStmt => "ExpStmt",
            Self::BreakStmt => "BreakStmt",
            Self::ContinueStmt => "ContinueStmt",
            Self::ReturnStmt => "ReturnStmt",
            Self::InStmt => "InStmt",
            Self::OutStmt => "OutStmt",
            Self::Exp => "Exp",
            Self::ConstExp => "ConstExp",
            Self::AddExp => "AddExp",
            Self::MulExp => "MulExp",
            Self::UnaryExp => "UnaryExp",
            Self::UnaryOp => "UnaryOp",
            Self::PrimaryExp => "PrimaryExp",
            Self::Number => "Number",
            Self::OrExp => "OrExp",
            Self::AndExp => "AndExp",
            Self::EqExp => "EqExp",
            Self::RelExp => "RelExp",
        }
    }
}

/// A stable handle to a node in a [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One of the three node shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeVariant {
    /// A grammar production.
    NonTerminal(SyntaxKind),
    /// A token-bearing leaf.
    Terminal(Token),
    /// An empty production.
    Epsilon,
}

/// Typed semantic attributes annotated onto a node.
///
/// `value` is only meaningful while `det` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeAttrs {
    /// The expression is compile-time determined.
    pub det: bool,
    /// The folded value, valid when `det` holds.
    pub value: i32,
    /// Array dimension of the expression (0 = scalar).
    pub dim: i32,
    /// The symbol-table scope introduced by or enclosing this node.
    pub block_id: Option<BlockId>,
    /// Error recovery left this subtree structurally incomplete.
    pub corrupted: bool,
}

#[derive(Debug, Clone)]
struct NodeData {
    variant: NodeVariant,
    attrs: NodeAttrs,
    parent: Option<NodeId>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
}

/// An arena-owned syntax tree.
#[derive(Debug, Default)]
pub struct SyntaxTree {
    nodes: Vec<NodeData>,
    root: Option<NodeId>,
}

impl SyntaxTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, variant: NodeVariant) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("syntax tree node limit"));
        self.nodes.push(NodeData {
            variant,
            attrs: NodeAttrs::default(),
            parent: None,
            prev: None,
            next: None,
            first_child: None,
            last_child: None,
        });
        id
    }

    /// Creates a detached non-terminal node.
    pub fn new_non_terminal(&mut self, kind: SyntaxKind) -> NodeId {
        self.alloc(NodeVariant::NonTerminal(kind))
    }

    /// Creates a detached terminal node.
    pub fn new_terminal(&mut self, token: Token) -> NodeId {
        self.alloc(NodeVariant::Terminal(token))
    }

    /// Creates a detached epsilon node.
    pub fn new_epsilon(&mut self) -> NodeId {
        self.alloc(NodeVariant::Epsilon)
    }

    /// The root node, once set.
    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Declares `id` the root of the tree.
    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    // ========================================================================
    // Structure
    // ========================================================================

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.index()]
    }

    /// The node's variant.
    #[must_use]
    pub fn variant(&self, id: NodeId) -> &NodeVariant {
        &self.data(id).variant
    }

    /// The syntax kind, for non-terminal nodes.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> Option<SyntaxKind> {
        match self.data(id).variant {
            NodeVariant::NonTerminal(kind) => Some(kind),
            _ => None,
        }
    }

    /// The token, for terminal nodes.
    #[must_use]
    pub fn token(&self, id: NodeId) -> Option<&Token> {
        match &self.data(id).variant {
            NodeVariant::Terminal(token) => Some(token),
            _ => None,
        }
    }

    /// The token kind, for terminal nodes.
    #[must_use]
    pub fn token_kind(&self, id: NodeId) -> Option<TokenKind> {
        self.token(id).map(|t| t.kind)
    }

    /// Returns `true` for non-terminal nodes.
    #[must_use]
    pub fn is_non_terminal(&self, id: NodeId) -> bool {
        matches!(self.data(id).variant, NodeVariant::NonTerminal(_))
    }

    /// Returns `true` for terminal nodes.
    #[must_use]
    pub fn is_terminal(&self, id: NodeId) -> bool {
        matches!(self.data(id).variant, NodeVariant::Terminal(_))
    }

    /// Returns `true` for epsilon nodes.
    #[must_use]
    pub fn is_epsilon(&self, id: NodeId) -> bool {
        matches!(self.data(id).variant, NodeVariant::Epsilon)
    }

    /// The node's parent, if attached.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).parent
    }

    /// The first child, if any.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).first_child
    }

    /// The last child, if any.
    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).last_child
    }

    /// The next sibling, if any.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).next
    }

    /// The previous sibling, if any.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).prev
    }

    /// Returns `true` if the node has at least one child.
    #[must_use]
    pub fn has_children(&self, id: NodeId) -> bool {
        self.data(id).first_child.is_some()
    }

    /// Returns `true` if the node has two or more children.
    #[must_use]
    pub fn has_many_children(&self, id: NodeId) -> bool {
        self.data(id)
            .first_child
            .is_some_and(|first| self.data(first).next.is_some())
    }

    /// The node's children, in order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.first_child(id);
        while let Some(child) = cur {
            out.push(child);
            cur = self.next_sibling(child);
        }
        out
    }

    /// The number of children.
    #[must_use]
    pub fn child_count(&self, id: NodeId) -> usize {
        let mut count = 0;
        let mut cur = self.first_child(id);
        while let Some(child) = cur {
            count += 1;
            cur = self.next_sibling(child);
        }
        count
    }

    /// The `index`-th child (0-based), if present.
    #[must_use]
    pub fn child_at(&self, id: NodeId, index: usize) -> Option<NodeId> {
        let mut cur = self.first_child(id);
        for _ in 0..index {
            cur = cur.and_then(|c| self.next_sibling(c));
        }
        cur
    }

    /// The first direct child of the given syntax kind.
    #[must_use]
    pub fn find_child(&self, id: NodeId, kind: SyntaxKind) -> Option<NodeId> {
        self.children(id)
            .into_iter()
            .find(|&c| self.kind(c) == Some(kind))
    }

    /// The first node of the given kind anywhere in the subtree.
    #[must_use]
    pub fn find_descendant(&self, id: NodeId, kind: SyntaxKind) -> Option<NodeId> {
        if self.kind(id) == Some(kind) {
            return Some(id);
        }
        let mut cur = self.first_child(id);
        while let Some(child) = cur {
            if let Some(found) = self.find_descendant(child, kind) {
                return Some(found);
            }
            cur = self.next_sibling(child);
        }
        None
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Appends `child` as the last child of `parent`.
    ///
    /// # Panics
    /// Panics if `child` is already attached to a parent: a node belongs
    /// to at most one position in the tree.
    pub fn insert_end_child(&mut self, parent: NodeId, child: NodeId) {
        assert!(
            self.data(child).parent.is_none(),
            "node is already attached"
        );

        let old_last = self.data(parent).last_child;
        {
            let child_data = self.data_mut(child);
            child_data.parent = Some(parent);
            child_data.prev = old_last;
            child_data.next = None;
        }
        match old_last {
            Some(last) => self.data_mut(last).next = Some(child),
            None => self.data_mut(parent).first_child = Some(child),
        }
        self.data_mut(parent).last_child = Some(child);
    }

    /// Prepends `child` as the first child of `parent`.
    ///
    /// # Panics
    /// Panics if `child` is already attached to a parent.
    pub fn insert_first_child(&mut self, parent: NodeId, child: NodeId) {
        assert!(
            self.data(child).parent.is_none(),
            "node is already attached"
        );

        let old_first = self.data(parent).first_child;
        {
            let child_data = self.data_mut(child);
            child_data.parent = Some(parent);
            child_data.prev = None;
            child_data.next = old_first;
        }
        match old_first {
            Some(first) => self.data_mut(first).prev = Some(child),
            None => self.data_mut(parent).last_child = Some(child),
        }
        self.data_mut(parent).first_child = Some(child);
    }

    /// Inserts `child` directly after the existing child `after`.
    ///
    /// # Panics
    /// Panics if `child` is attached, or `after` is not a child of `parent`.
    pub fn insert_after_child(&mut self, parent: NodeId, child: NodeId, after: NodeId) {
        assert!(
            self.data(child).parent.is_none(),
            "node is already attached"
        );
        assert_eq!(
            self.data(after).parent,
            Some(parent),
            "'after' is not a child of 'parent'"
        );

        let following = self.data(after).next;
        {
            let child_data = self.data_mut(child);
            child_data.parent = Some(parent);
            child_data.prev = Some(after);
            child_data.next = following;
        }
        self.data_mut(after).next = Some(child);
        match following {
            Some(next) => self.data_mut(next).prev = Some(child),
            None => self.data_mut(parent).last_child = Some(child),
        }
    }

    /// Detaches `id` from its parent, keeping its own subtree intact.
    pub fn unlink(&mut self, id: NodeId) {
        let (parent, prev, next) = {
            let data = self.data(id);
            (data.parent, data.prev, data.next)
        };
        let Some(parent) = parent else { return };

        match prev {
            Some(prev) => self.data_mut(prev).next = next,
            None => self.data_mut(parent).first_child = next,
        }
        match next {
            Some(next) => self.data_mut(next).prev = prev,
            None => self.data_mut(parent).last_child = prev,
        }

        let data = self.data_mut(id);
        data.parent = None;
        data.prev = None;
        data.next = None;
    }

    /// Removes the subtree rooted at `id` from the tree.
    ///
    /// The arena retains the storage until the tree is dropped; the
    /// subtree simply becomes unreachable from the root.
    pub fn delete_node(&mut self, id: NodeId) {
        self.unlink(id);
        if self.root == Some(id) {
            self.root = None;
        }
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    /// The node's attribute record.
    #[must_use]
    pub fn attrs(&self, id: NodeId) -> &NodeAttrs {
        &self.data(id).attrs
    }

    /// Mutable access to the node's attribute record.
    pub fn attrs_mut(&mut self, id: NodeId) -> &mut NodeAttrs {
        &mut self.data_mut(id).attrs
    }

    /// Walks up from `id` looking for the nearest `block_id` annotation,
    /// including `id` itself.
    #[must_use]
    pub fn enclosing_block(&self, id: NodeId) -> Option<BlockId> {
        let mut cur = Some(id);
        while let Some(node) = cur {
            if let Some(block) = self.attrs(node).block_id {
                return Some(block);
            }
            cur = self.parent(node);
        }
        None
    }

    /// Returns `true` if `id` has an ancestor of the given kind.
    #[must_use]
    pub fn has_ancestor(&self, id: NodeId, kind: SyntaxKind) -> bool {
        let mut cur = self.parent(id);
        while let Some(node) = cur {
            if self.kind(node) == Some(kind) {
                return true;
            }
            cur = self.parent(node);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_analysis::SourceLocation;

    fn terminal(tree: &mut SyntaxTree, lexeme: &str) -> NodeId {
        tree.new_terminal(Token::new(
            TokenKind::Identifier,
            lexeme,
            SourceLocation::start(),
        ))
    }

    #[test]
    fn insert_end_child_builds_sibling_chain() {
        let mut tree = SyntaxTree::new();
        let root = tree.new_non_terminal(SyntaxKind::CompUnit);
        let a = terminal(&mut tree, "a");
        let b = terminal(&mut tree, "b");
        let c = terminal(&mut tree, "c");
        tree.insert_end_child(root, a);
        tree.insert_end_child(root, b);
        tree.insert_end_child(root, c);

        assert_eq!(tree.first_child(root), Some(a));
        assert_eq!(tree.last_child(root), Some(c));
        assert_eq!(tree.next_sibling(a), Some(b));
        assert_eq!(tree.prev_sibling(c), Some(b));
        assert_eq!(tree.children(root), vec![a, b, c]);
        assert_eq!(tree.child_count(root), 3);
        assert!(tree.has_many_children(root));
    }

    #[test]
    fn insert_first_and_after() {
        let mut tree = SyntaxTree::new();
        let root = tree.new_non_terminal(SyntaxKind::Block);
        let b = terminal(&mut tree, "b");
        tree.insert_end_child(root, b);

        let a = terminal(&mut tree, "a");
        tree.insert_first_child(root, a);

        let mid = terminal(&mut tree, "mid");
        tree.insert_after_child(root, mid, a);

        assert_eq!(tree.children(root), vec![a, mid, b]);
    }

    #[test]
    fn unlink_keeps_subtree() {
        let mut tree = SyntaxTree::new();
        let root = tree.new_non_terminal(SyntaxKind::CompUnit);
        let decl = tree.new_non_terminal(SyntaxKind::Decl);
        let leaf = terminal(&mut tree, "x");
        tree.insert_end_child(root, decl);
        tree.insert_end_child(decl, leaf);

        tree.unlink(decl);
        assert_eq!(tree.children(root), Vec::<NodeId>::new());
        assert_eq!(tree.parent(decl), None);
        // Subtree below the unlinked node is intact.
        assert_eq!(tree.children(decl), vec![leaf]);
    }

    #[test]
    fn delete_node_detaches_from_middle() {
        let mut tree = SyntaxTree::new();
        let root = tree.new_non_terminal(SyntaxKind::Block);
        let a = terminal(&mut tree, "a");
        let b = terminal(&mut tree, "b");
        let c = terminal(&mut tree, "c");
        tree.insert_end_child(root, a);
        tree.insert_end_child(root, b);
        tree.insert_end_child(root, c);

        tree.delete_node(b);
        assert_eq!(tree.children(root), vec![a, c]);
        assert_eq!(tree.next_sibling(a), Some(c));
        assert_eq!(tree.prev_sibling(c), Some(a));
    }

    #[test]
    fn first_child_none_iff_last_child_none() {
        let mut tree = SyntaxTree::new();
        let root = tree.new_non_terminal(SyntaxKind::Block);
        assert!(tree.first_child(root).is_none() && tree.last_child(root).is_none());

        let a = terminal(&mut tree, "a");
        tree.insert_end_child(root, a);
        assert!(tree.first_child(root).is_some() && tree.last_child(root).is_some());

        tree.unlink(a);
        assert!(tree.first_child(root).is_none() && tree.last_child(root).is_none());
    }

    #[test]
    #[should_panic(expected = "already attached")]
    fn double_attach_panics() {
        let mut tree = SyntaxTree::new();
        let root = tree.new_non_terminal(SyntaxKind::Block);
        let other = tree.new_non_terminal(SyntaxKind::Block);
        let a = terminal(&mut tree, "a");
        tree.insert_end_child(root, a);
        tree.insert_end_child(other, a);
    }

    #[test]
    fn attrs_default_and_mutate() {
        let mut tree = SyntaxTree::new();
        let node = tree.new_non_terminal(SyntaxKind::Exp);
        assert!(!tree.attrs(node).det);

        tree.attrs_mut(node).det = true;
        tree.attrs_mut(node).value = -7;
        assert!(tree.attrs(node).det);
        assert_eq!(tree.attrs(node).value, -7);
    }

    #[test]
    fn find_child_and_descendant() {
        let mut tree = SyntaxTree::new();
        let root = tree.new_non_terminal(SyntaxKind::Stmt);
        let exp = tree.new_non_terminal(SyntaxKind::Exp);
        let add = tree.new_non_terminal(SyntaxKind::AddExp);
        tree.insert_end_child(root, exp);
        tree.insert_end_child(exp, add);

        assert_eq!(tree.find_child(root, SyntaxKind::Exp), Some(exp));
        assert_eq!(tree.find_child(root, SyntaxKind::AddExp), None);
        assert_eq!(tree.find_descendant(root, SyntaxKind::AddExp), Some(add));
    }
}
