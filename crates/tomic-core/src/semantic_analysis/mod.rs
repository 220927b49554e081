// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Semantic analysis for ToMiC.
//!
//! Two passes over the (transformed) syntax tree:
//!
//! **Pass 1 - table building and attribute synthesis.** Scopes open on
//! `CompUnit`, `FuncDef`, `MainFuncDef`, `Block` and `ForStmt` nodes and
//! each such node is annotated with its [`BlockId`]. Definitions register
//! [`SymbolEntry`] values; expression nodes get `det` / `value` / `dim`
//! attributes synthesized bottom-up with wrapping 32-bit arithmetic.
//!
//! **Pass 2 - control-flow and call-site checks.** `break` / `continue`
//! placement, return/value agreement with the function signature, call
//! arity and per-argument dimension compatibility, and `printf` format
//! arity.
//!
//! The analyzer never aborts: every problem is recorded in the shared
//! [`ErrorLog`](crate::diagnostics::ErrorLog) and analysis continues, to
//! maximize diagnostic coverage per run.

pub mod symbol_table;

use ecow::EcoString;

use crate::diagnostics::{CompileErrorKind, ErrorLog};
use crate::source_analysis::{NodeId, SourceLocation, SyntaxKind, SyntaxTree, TokenKind};

pub use symbol_table::{
    BlockId, ConstantEntry, DuplicateSymbol, FunctionEntry, FunctionParam, SymbolEntry,
    SymbolTable, ValueType, VariableEntry, MAX_ARRAY_DIMENSION,
};

/// Runs both analysis passes, returning the populated symbol table.
///
/// Errors are reported through `errors`; the tree is decorated in place.
pub fn analyze(tree: &mut SyntaxTree, errors: &ErrorLog) -> SymbolTable {
    let mut analyzer = SemanticAnalyzer::new(errors);
    analyzer.build(tree);
    analyzer.check(tree);
    analyzer.table
}

/// Wrapping 32-bit parse of an integer lexeme.
fn parse_int(lexeme: &str) -> i32 {
    lexeme
        .bytes()
        .filter(u8::is_ascii_digit)
        .fold(0i32, |acc, b| {
            acc.wrapping_mul(10).wrapping_add(i32::from(b - b'0'))
        })
}

/// Folds a binary arithmetic operator with C semantics. `None` signals
/// division by zero.
fn evaluate_binary(op: TokenKind, lhs: i32, rhs: i32) -> Option<i32> {
    match op {
        TokenKind::Plus => Some(lhs.wrapping_add(rhs)),
        TokenKind::Minus => Some(lhs.wrapping_sub(rhs)),
        TokenKind::Star => Some(lhs.wrapping_mul(rhs)),
        TokenKind::Slash => (rhs != 0).then(|| lhs.wrapping_div(rhs)),
        TokenKind::Percent => (rhs != 0).then(|| lhs.wrapping_rem(rhs)),
        _ => None,
    }
}

/// Folds a logical or relational operator, 1/0 valued.
fn evaluate_logic(op: TokenKind, lhs: i32, rhs: i32) -> i32 {
    let result = match op {
        TokenKind::OrOr => lhs != 0 || rhs != 0,
        TokenKind::AndAnd => lhs != 0 && rhs != 0,
        TokenKind::Equal => lhs == rhs,
        TokenKind::NotEqual => lhs != rhs,
        TokenKind::Less => lhs < rhs,
        TokenKind::LessEqual => lhs <= rhs,
        TokenKind::Greater => lhs > rhs,
        TokenKind::GreaterEqual => lhs >= rhs,
        _ => false,
    };
    i32::from(result)
}

/// The number of `%d` specifiers in a format-string lexeme.
#[must_use]
pub fn format_arg_count(lexeme: &str) -> usize {
    lexeme.matches("%d").count()
}

struct SemanticAnalyzer<'log> {
    errors: &'log ErrorLog,
    table: SymbolTable,
    current: BlockId,
}

impl<'log> SemanticAnalyzer<'log> {
    fn new(errors: &'log ErrorLog) -> Self {
        let table = SymbolTable::new();
        let current = table.root();
        Self {
            errors,
            table,
            current,
        }
    }

    fn report(&self, loc: SourceLocation, kind: CompileErrorKind, message: impl Into<EcoString>) {
        self.errors.report(loc, kind, message);
    }

    /// The identifier token of a definition-like node (its first
    /// identifier terminal).
    fn ident_of(tree: &SyntaxTree, node: NodeId) -> Option<(EcoString, SourceLocation)> {
        tree.children(node).into_iter().find_map(|child| {
            tree.token(child)
                .filter(|t| t.kind == TokenKind::Identifier)
                .map(|t| (t.lexeme.clone(), t.loc))
        })
    }

    // ========================================================================
    // Pass 1 - scopes, definitions, attribute synthesis
    // ========================================================================

    fn build(&mut self, tree: &mut SyntaxTree) {
        let Some(root) = tree.root() else { return };
        self.current = self.table.root();
        tree.attrs_mut(root).block_id = Some(self.current);

        for child in tree.children(root) {
            match tree.kind(child) {
                Some(SyntaxKind::Decl) => self.visit_decl(tree, child),
                Some(SyntaxKind::FuncDef) => self.visit_func_def(tree, child),
                Some(SyntaxKind::MainFuncDef) => self.visit_main_func_def(tree, child),
                _ => {}
            }
        }
    }

    fn visit_decl(&mut self, tree: &mut SyntaxTree, node: NodeId) {
        let Some(decl) = tree.first_child(node) else {
            return;
        };
        for def in tree.children(decl) {
            match tree.kind(def) {
                Some(SyntaxKind::ConstDef) => self.visit_const_def(tree, def),
                Some(SyntaxKind::VarDef) => self.visit_var_def(tree, def),
                _ => {}
            }
        }
    }

    /// Evaluates the `[ConstExp]` chain of a definition into extents.
    fn visit_dimensions(&mut self, tree: &mut SyntaxTree, node: NodeId) -> Vec<i32> {
        let mut sizes = Vec::new();
        for child in tree.children(node) {
            if tree.kind(child) == Some(SyntaxKind::ConstExp) {
                self.visit_expr(tree, child);
                let attrs = tree.attrs(child);
                if attrs.det {
                    sizes.push(attrs.value);
                } else {
                    if let Some((name, loc)) = Self::ident_of(tree, node) {
                        self.report(
                            loc,
                            CompileErrorKind::Unknown,
                            format!("Array size of '{name}' must be a constant expression"),
                        );
                    }
                    sizes.push(0);
                }
            }
        }
        if sizes.len() > MAX_ARRAY_DIMENSION {
            if let Some((name, loc)) = Self::ident_of(tree, node) {
                self.report(
                    loc,
                    CompileErrorKind::Unknown,
                    format!("Too many dimensions on '{name}'"),
                );
            }
            sizes.truncate(MAX_ARRAY_DIMENSION);
        }
        sizes
    }

    fn size_pair(sizes: &[i32]) -> [i32; MAX_ARRAY_DIMENSION] {
        [
            sizes.first().copied().unwrap_or(0),
            sizes.get(1).copied().unwrap_or(0),
        ]
    }

    fn visit_const_def(&mut self, tree: &mut SyntaxTree, node: NodeId) {
        let Some((name, loc)) = Self::ident_of(tree, node) else {
            return;
        };
        let sizes = self.visit_dimensions(tree, node);
        let dim = i32::try_from(sizes.len()).unwrap_or(0);
        tree.attrs_mut(node).dim = dim;

        let init = tree.find_child(node, SyntaxKind::ConstInitVal);
        if let Some(init) = init {
            self.visit_init_val(tree, init);
        }

        let mut entry = ConstantEntry {
            name: name.clone(),
            value_type: ValueType::Int,
            dim,
            size: Self::size_pair(&sizes),
            value: 0,
            values: Vec::new(),
        };

        if let Some(init) = init {
            match dim {
                0 => entry.value = tree.attrs(init).value,
                1 => {
                    let mut row = self.init_row(tree, init);
                    row.resize(usize::try_from(entry.size[0]).unwrap_or(0), 0);
                    entry.values.push(row);
                }
                _ => {
                    let cols = usize::try_from(entry.size[1]).unwrap_or(0);
                    for sub in self.init_items(tree, init) {
                        let mut row = self.init_row(tree, sub);
                        row.resize(cols, 0);
                        entry.values.push(row);
                    }
                    entry
                        .values
                        .resize(usize::try_from(entry.size[0]).unwrap_or(0), vec![0; cols]);
                }
            }
        }

        if self
            .table
            .insert(self.current, SymbolEntry::Constant(entry))
            .is_err()
        {
            self.report(
                loc,
                CompileErrorKind::DuplicateIdentifier,
                format!("Duplicate identifier '{name}'"),
            );
        }
    }

    fn visit_var_def(&mut self, tree: &mut SyntaxTree, node: NodeId) {
        let Some((name, loc)) = Self::ident_of(tree, node) else {
            return;
        };
        let sizes = self.visit_dimensions(tree, node);
        let dim = i32::try_from(sizes.len()).unwrap_or(0);
        tree.attrs_mut(node).dim = dim;

        if let Some(init) = tree.find_child(node, SyntaxKind::InitVal) {
            self.visit_init_val(tree, init);
        }

        let entry = VariableEntry {
            name: name.clone(),
            value_type: ValueType::Int,
            dim,
            size: Self::size_pair(&sizes),
        };
        if self
            .table
            .insert(self.current, SymbolEntry::Variable(entry))
            .is_err()
        {
            self.report(
                loc,
                CompileErrorKind::DuplicateIdentifier,
                format!("Duplicate identifier '{name}'"),
            );
        }
    }

    /// Synthesizes `det` / `value` / `dim` on an `InitVal` or
    /// `ConstInitVal` node. Scalar initializers mirror their expression;
    /// brace lists get `dim = 1 + max(child dim)` and are `det` when all
    /// elements are.
    fn visit_init_val(&mut self, tree: &mut SyntaxTree, node: NodeId) {
        let items = self.init_items(tree, node);
        if items.is_empty() {
            // Scalar initializer: Exp or ConstExp child.
            if let Some(exp) = tree
                .find_child(node, SyntaxKind::Exp)
                .or_else(|| tree.find_child(node, SyntaxKind::ConstExp))
            {
                self.visit_expr(tree, exp);
                let (det, value) = {
                    let attrs = tree.attrs(exp);
                    (attrs.det, attrs.value)
                };
                let attrs = tree.attrs_mut(node);
                attrs.det = det;
                attrs.value = value;
                attrs.dim = 0;
            }
            return;
        }

        let mut det = true;
        let mut dim = 0;
        for item in &items {
            self.visit_init_val(tree, *item);
            let attrs = tree.attrs(*item);
            det &= attrs.det;
            dim = dim.max(attrs.dim);
        }
        let attrs = tree.attrs_mut(node);
        attrs.det = det;
        attrs.dim = dim + 1;
    }

    /// The nested initializer items of a brace list (empty for scalars).
    fn init_items(&self, tree: &SyntaxTree, node: NodeId) -> Vec<NodeId> {
        tree.children(node)
            .into_iter()
            .filter(|&c| {
                matches!(
                    tree.kind(c),
                    Some(SyntaxKind::InitVal | SyntaxKind::ConstInitVal)
                )
            })
            .collect()
    }

    /// The folded scalar values of a one-dimensional initializer list.
    fn init_row(&self, tree: &SyntaxTree, node: NodeId) -> Vec<i32> {
        self.init_items(tree, node)
            .into_iter()
            .map(|item| tree.attrs(item).value)
            .collect()
    }

    fn visit_func_def(&mut self, tree: &mut SyntaxTree, node: NodeId) {
        let Some(func_decl) = tree.first_child(node) else {
            return;
        };

        let return_type = match tree
            .first_child(func_decl)
            .and_then(|t| tree.first_child(t))
            .and_then(|t| tree.token_kind(t))
        {
            Some(TokenKind::Void) => ValueType::Void,
            _ => ValueType::Int,
        };
        let Some((name, loc)) = Self::ident_of(tree, func_decl) else {
            return;
        };

        // Parameter shapes are needed both for the signature (registered
        // in the enclosing scope) and as variables in the function scope.
        let mut params = Vec::new();
        if let Some(fparams) = tree.find_child(func_decl, SyntaxKind::FuncFParams) {
            for fparam in tree.children(fparams) {
                if tree.kind(fparam) != Some(SyntaxKind::FuncFParam) {
                    continue;
                }
                let Some((param_name, _)) = Self::ident_of(tree, fparam) else {
                    continue;
                };
                let brackets = tree
                    .children(fparam)
                    .into_iter()
                    .filter(|&c| tree.token_kind(c) == Some(TokenKind::LeftBracket))
                    .count();
                let mut size = [0, 0];
                if let Some(extent) = tree.find_child(fparam, SyntaxKind::ConstExp) {
                    self.visit_expr(tree, extent);
                    size[1] = tree.attrs(extent).value;
                }
                params.push(FunctionParam {
                    value_type: ValueType::Int,
                    name: param_name,
                    dim: i32::try_from(brackets).unwrap_or(0),
                    size,
                });
                tree.attrs_mut(fparam).dim = i32::try_from(brackets).unwrap_or(0);
            }
        }

        let entry = FunctionEntry {
            name: name.clone(),
            return_type,
            params: params.clone(),
        };
        if self
            .table
            .insert(self.current, SymbolEntry::Function(entry))
            .is_err()
        {
            self.report(
                loc,
                CompileErrorKind::DuplicateIdentifier,
                format!("Duplicate identifier '{name}'"),
            );
        }

        // Function scope holds the parameters; the body block nests.
        let outer = self.current;
        self.current = self.table.new_block(outer);
        tree.attrs_mut(node).block_id = Some(self.current);

        for param in params {
            let param_name = param.name.clone();
            if self
                .table
                .insert(
                    self.current,
                    SymbolEntry::Variable(VariableEntry {
                        name: param.name,
                        value_type: param.value_type,
                        dim: param.dim,
                        size: param.size,
                    }),
                )
                .is_err()
            {
                self.report(
                    loc,
                    CompileErrorKind::DuplicateIdentifier,
                    format!("Duplicate parameter '{param_name}'"),
                );
            }
        }

        if let Some(block) = tree.find_child(node, SyntaxKind::Block) {
            self.visit_block(tree, block);
        }
        self.current = outer;
    }

    fn visit_main_func_def(&mut self, tree: &mut SyntaxTree, node: NodeId) {
        let outer = self.current;
        self.current = self.table.new_block(outer);
        tree.attrs_mut(node).block_id = Some(self.current);

        if let Some(block) = tree.find_child(node, SyntaxKind::Block) {
            self.visit_block(tree, block);
        }
        self.current = outer;
    }

    fn visit_block(&mut self, tree: &mut SyntaxTree, node: NodeId) {
        let outer = self.current;
        self.current = self.table.new_block(outer);
        tree.attrs_mut(node).block_id = Some(self.current);

        for item in tree.children(node) {
            if tree.kind(item) != Some(SyntaxKind::BlockItem) {
                continue;
            }
            let Some(child) = tree.first_child(item) else {
                continue;
            };
            match tree.kind(child) {
                Some(SyntaxKind::ConstDecl | SyntaxKind::VarDecl) => {
                    for def in tree.children(child) {
                        match tree.kind(def) {
                            Some(SyntaxKind::ConstDef) => self.visit_const_def(tree, def),
                            Some(SyntaxKind::VarDef) => self.visit_var_def(tree, def),
                            _ => {}
                        }
                    }
                }
                Some(SyntaxKind::Stmt) => self.visit_stmt(tree, child),
                _ => {}
            }
        }

        self.current = outer;
    }

    fn visit_stmt(&mut self, tree: &mut SyntaxTree, node: NodeId) {
        let Some(child) = tree.first_child(node) else {
            return;
        };
        match tree.kind(child) {
            Some(SyntaxKind::AssignmentStmt) => self.visit_assignment(tree, child),
            Some(SyntaxKind::InStmt) => {
                if let Some(lval) = tree.find_child(child, SyntaxKind::LVal) {
                    self.visit_lval(tree, lval, true);
                }
            }
            Some(SyntaxKind::ExpStmt) => {
                if let Some(exp) = tree.find_child(child, SyntaxKind::Exp) {
                    self.visit_expr(tree, exp);
                }
            }
            Some(SyntaxKind::Block) => self.visit_block(tree, child),
            Some(SyntaxKind::IfStmt) => {
                if let Some(cond) = tree.find_child(child, SyntaxKind::Cond) {
                    self.visit_cond(tree, cond);
                }
                for stmt in tree.children(child) {
                    if tree.kind(stmt) == Some(SyntaxKind::Stmt) {
                        self.visit_stmt(tree, stmt);
                    }
                }
            }
            Some(SyntaxKind::ForStmt) => self.visit_for(tree, child),
            Some(SyntaxKind::ReturnStmt) => {
                if let Some(exp) = tree.find_child(child, SyntaxKind::Exp) {
                    self.visit_expr(tree, exp);
                }
            }
            Some(SyntaxKind::OutStmt) => {
                for exp in tree.children(child) {
                    if tree.kind(exp) == Some(SyntaxKind::Exp) {
                        self.visit_expr(tree, exp);
                    }
                }
            }
            // break / continue are placement-checked in pass 2.
            _ => {}
        }
    }

    fn visit_assignment(&mut self, tree: &mut SyntaxTree, node: NodeId) {
        if let Some(lval) = tree.find_child(node, SyntaxKind::LVal) {
            self.visit_lval(tree, lval, true);
        }
        if let Some(exp) = tree.find_child(node, SyntaxKind::Exp) {
            self.visit_expr(tree, exp);
        }
    }

    fn visit_for(&mut self, tree: &mut SyntaxTree, node: NodeId) {
        let outer = self.current;
        self.current = self.table.new_block(outer);
        tree.attrs_mut(node).block_id = Some(self.current);

        for clause in tree.children(node) {
            match tree.kind(clause) {
                Some(SyntaxKind::ForInitStmt | SyntaxKind::ForStepStmt) => {
                    self.visit_assignment(tree, clause);
                }
                Some(SyntaxKind::Cond) => self.visit_cond(tree, clause),
                Some(SyntaxKind::Stmt) => self.visit_stmt(tree, clause),
                _ => {}
            }
        }

        self.current = outer;
    }

    fn visit_cond(&mut self, tree: &mut SyntaxTree, node: NodeId) {
        if let Some(or_exp) = tree.first_child(node) {
            self.visit_logic(tree, or_exp);
            let (det, value) = {
                let attrs = tree.attrs(or_exp);
                (attrs.det, attrs.value)
            };
            let attrs = tree.attrs_mut(node);
            attrs.det = det;
            attrs.value = value;
        }
    }

    /// Bottom-up folding over the condition hierarchy
    /// (`OrExp`/`AndExp`/`EqExp`/`RelExp`), falling through to the
    /// arithmetic hierarchy at `AddExp`.
    fn visit_logic(&mut self, tree: &mut SyntaxTree, node: NodeId) {
        match tree.kind(node) {
            Some(
                SyntaxKind::OrExp | SyntaxKind::AndExp | SyntaxKind::EqExp | SyntaxKind::RelExp,
            ) => {}
            _ => {
                self.visit_expr(tree, node);
                return;
            }
        }

        let children = tree.children(node);
        if children.len() == 1 {
            self.visit_logic(tree, children[0]);
            let (det, value) = {
                let attrs = tree.attrs(children[0]);
                (attrs.det, attrs.value)
            };
            let attrs = tree.attrs_mut(node);
            attrs.det = det;
            attrs.value = value;
            return;
        }

        if children.len() == 3 {
            self.visit_logic(tree, children[0]);
            self.visit_logic(tree, children[2]);
            let op = tree.token_kind(children[1]).unwrap_or(TokenKind::Unknown);
            let (l_det, l_val) = {
                let a = tree.attrs(children[0]);
                (a.det, a.value)
            };
            let (r_det, r_val) = {
                let a = tree.attrs(children[2]);
                (a.det, a.value)
            };
            let attrs = tree.attrs_mut(node);
            if l_det && r_det {
                attrs.det = true;
                attrs.value = evaluate_logic(op, l_val, r_val);
            }
        }
    }

    /// Bottom-up `det`/`value`/`dim` synthesis for the expression
    /// hierarchy.
    fn visit_expr(&mut self, tree: &mut SyntaxTree, node: NodeId) {
        match tree.kind(node) {
            Some(SyntaxKind::Exp | SyntaxKind::ConstExp) => {
                if let Some(child) = tree.first_child(node) {
                    self.visit_expr(tree, child);
                    self.copy_attrs(tree, child, node);
                }
            }
            Some(SyntaxKind::AddExp | SyntaxKind::MulExp) => self.visit_arith(tree, node),
            Some(SyntaxKind::UnaryExp) => self.visit_unary(tree, node),
            Some(SyntaxKind::PrimaryExp) => self.visit_primary(tree, node),
            Some(SyntaxKind::Number) => {
                let value = tree
                    .first_child(node)
                    .and_then(|c| tree.token(c))
                    .map(|t| parse_int(&t.lexeme))
                    .unwrap_or_default();
                let attrs = tree.attrs_mut(node);
                attrs.det = true;
                attrs.value = value;
                attrs.dim = 0;
            }
            Some(SyntaxKind::LVal) => self.visit_lval(tree, node, false),
            Some(SyntaxKind::FuncCall) => self.visit_func_call(tree, node),
            _ => {}
        }
    }

    fn copy_attrs(&self, tree: &mut SyntaxTree, from: NodeId, to: NodeId) {
        let (det, value, dim) = {
            let attrs = tree.attrs(from);
            (attrs.det, attrs.value, attrs.dim)
        };
        let attrs = tree.attrs_mut(to);
        attrs.det = det;
        attrs.value = value;
        attrs.dim = dim;
    }

    fn visit_arith(&mut self, tree: &mut SyntaxTree, node: NodeId) {
        let children = tree.children(node);
        if children.len() == 1 {
            self.visit_expr(tree, children[0]);
            self.copy_attrs(tree, children[0], node);
            return;
        }
        if children.len() != 3 {
            return;
        }

        self.visit_expr(tree, children[0]);
        self.visit_expr(tree, children[2]);

        let op_token = tree.token(children[1]).cloned();
        let (l_det, l_val) = {
            let a = tree.attrs(children[0]);
            (a.det, a.value)
        };
        let (r_det, r_val) = {
            let a = tree.attrs(children[2]);
            (a.det, a.value)
        };

        let Some(op_token) = op_token else { return };

        if r_det
            && r_val == 0
            && matches!(op_token.kind, TokenKind::Slash | TokenKind::Percent)
        {
            self.report(
                op_token.loc,
                CompileErrorKind::Unknown,
                format!("Division by zero in '{}' expression", op_token.lexeme),
            );
            return;
        }

        if l_det && r_det {
            if let Some(value) = evaluate_binary(op_token.kind, l_val, r_val) {
                let attrs = tree.attrs_mut(node);
                attrs.det = true;
                attrs.value = value;
                attrs.dim = 0;
            }
        }
    }

    fn visit_unary(&mut self, tree: &mut SyntaxTree, node: NodeId) {
        let children = tree.children(node);
        match children.len() {
            1 => {
                self.visit_expr(tree, children[0]);
                self.copy_attrs(tree, children[0], node);
            }
            2 => {
                // UnaryOp UnaryExp
                self.visit_expr(tree, children[1]);
                let op = tree
                    .first_child(children[0])
                    .and_then(|c| tree.token_kind(c));
                let (det, value, dim) = {
                    let attrs = tree.attrs(children[1]);
                    (attrs.det, attrs.value, attrs.dim)
                };
                let attrs = tree.attrs_mut(node);
                attrs.dim = dim;
                if det {
                    attrs.det = true;
                    attrs.value = match op {
                        Some(TokenKind::Minus) => value.wrapping_neg(),
                        Some(TokenKind::Not) => i32::from(value == 0),
                        _ => value,
                    };
                }
            }
            _ => {}
        }
    }

    fn visit_primary(&mut self, tree: &mut SyntaxTree, node: NodeId) {
        let children = tree.children(node);
        if children.len() >= 3 {
            // '(' Exp ')'
            self.visit_expr(tree, children[1]);
            self.copy_attrs(tree, children[1], node);
            return;
        }
        if let Some(&child) = children.first() {
            self.visit_expr(tree, child);
            self.copy_attrs(tree, child, node);
        }
    }

    fn visit_func_call(&mut self, tree: &mut SyntaxTree, node: NodeId) {
        if let Some(aparams) = tree.find_child(node, SyntaxKind::FuncAParams) {
            for aparam in tree.children(aparams) {
                if tree.kind(aparam) == Some(SyntaxKind::FuncAParam) {
                    if let Some(exp) = tree.first_child(aparam) {
                        self.visit_expr(tree, exp);
                        self.copy_attrs(tree, exp, aparam);
                    }
                }
            }
        }
        // Calls are never compile-time determined.
        let attrs = tree.attrs_mut(node);
        attrs.det = false;
        attrs.dim = 0;
    }

    fn visit_lval(&mut self, tree: &mut SyntaxTree, node: NodeId, is_assign: bool) {
        let Some((name, loc)) = Self::ident_of(tree, node) else {
            return;
        };

        let indices: Vec<NodeId> = tree
            .children(node)
            .into_iter()
            .filter(|&c| tree.kind(c) == Some(SyntaxKind::Exp))
            .collect();
        for &index in &indices {
            self.visit_expr(tree, index);
        }

        struct Resolved {
            entry_dim: i32,
            is_const: bool,
            element: Option<i32>,
        }

        let resolved = {
            match self.table.find(self.current, &name) {
                None => None,
                Some(SymbolEntry::Function(_)) => Some(Resolved {
                    entry_dim: 0,
                    is_const: false,
                    element: None,
                }),
                Some(SymbolEntry::Variable(v)) => Some(Resolved {
                    entry_dim: v.dim,
                    is_const: false,
                    element: None,
                }),
                Some(SymbolEntry::Constant(c)) => {
                    let index_values: Option<Vec<i32>> = indices
                        .iter()
                        .map(|&i| {
                            let attrs = tree.attrs(i);
                            attrs.det.then_some(attrs.value)
                        })
                        .collect();
                    let element = index_values.and_then(|values| c.element(&values));
                    Some(Resolved {
                        entry_dim: c.dim,
                        is_const: true,
                        element,
                    })
                }
            }
        };

        let Some(resolved) = resolved else {
            self.report(
                loc,
                CompileErrorKind::UndefinedIdentifier,
                format!("Undefined identifier '{name}'"),
            );
            tree.attrs_mut(node).corrupted = true;
            return;
        };

        if is_assign && resolved.is_const {
            self.report(
                loc,
                CompileErrorKind::AssignToConstant,
                format!("Cannot assign to constant '{name}'"),
            );
        }

        let mut dim = resolved.entry_dim - i32::try_from(indices.len()).unwrap_or(0);
        if dim < 0 {
            self.report(
                loc,
                CompileErrorKind::Unknown,
                format!("Too many subscripts on '{name}'"),
            );
            dim = 0;
        }

        let attrs = tree.attrs_mut(node);
        attrs.dim = dim;
        if !is_assign {
            if let Some(value) = resolved.element {
                attrs.det = true;
                attrs.value = value;
            }
        }
    }

    // ========================================================================
    // Pass 2 - control flow and call sites
    // ========================================================================

    fn check(&mut self, tree: &mut SyntaxTree) {
        let Some(root) = tree.root() else { return };
        let mut ctx = CheckContext {
            return_type: None,
            loop_depth: 0,
        };
        self.check_node(tree, root, &mut ctx);
    }

    fn check_node(&mut self, tree: &SyntaxTree, node: NodeId, ctx: &mut CheckContext) {
        match tree.kind(node) {
            Some(SyntaxKind::FuncDef) => {
                let return_type = tree
                    .first_child(node)
                    .and_then(|decl| tree.first_child(decl))
                    .and_then(|ft| tree.first_child(ft))
                    .and_then(|t| tree.token_kind(t));
                let return_type = match return_type {
                    Some(TokenKind::Void) => ValueType::Void,
                    _ => ValueType::Int,
                };
                let mut inner = CheckContext {
                    return_type: Some(return_type),
                    loop_depth: 0,
                };
                for child in tree.children(node) {
                    self.check_node(tree, child, &mut inner);
                }
                return;
            }
            Some(SyntaxKind::MainFuncDef) => {
                let mut inner = CheckContext {
                    return_type: Some(ValueType::Int),
                    loop_depth: 0,
                };
                for child in tree.children(node) {
                    self.check_node(tree, child, &mut inner);
                }
                return;
            }
            Some(SyntaxKind::ForStmt) => {
                ctx.loop_depth += 1;
                for child in tree.children(node) {
                    self.check_node(tree, child, ctx);
                }
                ctx.loop_depth -= 1;
                return;
            }
            Some(SyntaxKind::BreakStmt) => {
                if ctx.loop_depth == 0 {
                    if let Some(loc) = self.keyword_loc(tree, node) {
                        self.report(
                            loc,
                            CompileErrorKind::IllegalBreak,
                            "'break' outside of a loop",
                        );
                    }
                }
            }
            Some(SyntaxKind::ContinueStmt) => {
                if ctx.loop_depth == 0 {
                    if let Some(loc) = self.keyword_loc(tree, node) {
                        self.report(
                            loc,
                            CompileErrorKind::IllegalContinue,
                            "'continue' outside of a loop",
                        );
                    }
                }
            }
            Some(SyntaxKind::ReturnStmt) => self.check_return(tree, node, ctx),
            Some(SyntaxKind::FuncCall) => self.check_call(tree, node),
            Some(SyntaxKind::OutStmt) => self.check_printf(tree, node),
            _ => {}
        }

        for child in tree.children(node) {
            self.check_node(tree, child, ctx);
        }
    }

    fn keyword_loc(&self, tree: &SyntaxTree, node: NodeId) -> Option<SourceLocation> {
        tree.first_child(node)
            .and_then(|c| tree.token(c))
            .map(|t| t.loc)
    }

    fn check_return(&mut self, tree: &SyntaxTree, node: NodeId, ctx: &CheckContext) {
        let has_value = tree.find_child(node, SyntaxKind::Exp).is_some();
        let Some(loc) = self.keyword_loc(tree, node) else {
            return;
        };
        match ctx.return_type {
            Some(ValueType::Void) if has_value => {
                self.report(
                    loc,
                    CompileErrorKind::IllegalReturn,
                    "Void function cannot return a value",
                );
            }
            Some(ValueType::Int) if !has_value => {
                self.report(
                    loc,
                    CompileErrorKind::IllegalReturn,
                    "Missing return value in non-void function",
                );
            }
            _ => {}
        }
    }

    fn check_call(&mut self, tree: &SyntaxTree, node: NodeId) {
        let Some((name, loc)) = Self::ident_of(tree, node) else {
            return;
        };
        let block = tree.enclosing_block(node).unwrap_or_else(|| self.table.root());

        let param_dims: Option<Vec<i32>> = match self.table.find(block, &name) {
            None => {
                self.report(
                    loc,
                    CompileErrorKind::UndefinedIdentifier,
                    format!("Undefined identifier '{name}'"),
                );
                None
            }
            Some(SymbolEntry::Function(f)) => Some(f.params.iter().map(|p| p.dim).collect()),
            Some(_) => {
                self.report(
                    loc,
                    CompileErrorKind::Unknown,
                    format!("'{name}' is not a function"),
                );
                None
            }
        };
        let Some(param_dims) = param_dims else { return };

        // A corrupted call lost its argument list to error recovery;
        // arity cannot be judged.
        if tree.attrs(node).corrupted {
            return;
        }

        let args: Vec<NodeId> = tree
            .find_child(node, SyntaxKind::FuncAParams)
            .map(|p| {
                tree.children(p)
                    .into_iter()
                    .filter(|&c| tree.kind(c) == Some(SyntaxKind::FuncAParam))
                    .collect()
            })
            .unwrap_or_default();

        if args.len() != param_dims.len() {
            self.report(
                loc,
                CompileErrorKind::ArgumentCountMismatch,
                format!(
                    "'{name}' expects {} argument(s), got {}",
                    param_dims.len(),
                    args.len()
                ),
            );
            return;
        }

        for (arg, expected_dim) in args.iter().zip(param_dims) {
            let actual_dim = tree.attrs(*arg).dim;
            if actual_dim != expected_dim {
                self.report(
                    loc,
                    CompileErrorKind::ArgumentTypeMismatch,
                    format!(
                        "'{name}' expects a {expected_dim}-dimension argument, got {actual_dim}"
                    ),
                );
            }
        }
    }

    fn check_printf(&mut self, tree: &SyntaxTree, node: NodeId) {
        let Some(printf_loc) = self.keyword_loc(tree, node) else {
            return;
        };
        let Some(format) = tree
            .children(node)
            .into_iter()
            .find_map(|c| tree.token(c).filter(|t| t.kind == TokenKind::FormatString))
        else {
            return;
        };

        let expected = format_arg_count(&format.lexeme);
        let actual = tree
            .children(node)
            .into_iter()
            .filter(|&c| tree.kind(c) == Some(SyntaxKind::Exp))
            .count();

        if expected != actual {
            self.report(
                printf_loc,
                CompileErrorKind::FormatMismatch,
                format!("Format string expects {expected} argument(s), got {actual}"),
            );
        }
    }
}

struct CheckContext {
    return_type: Option<ValueType>,
    loop_depth: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_analysis::transform::RightRecursiveTransformer;
    use crate::source_analysis::parse;

    fn analyze_source(source: &str) -> (SyntaxTree, SymbolTable, ErrorLog) {
        let errors = ErrorLog::new();
        let mut tree = parse(source, &errors).expect("expected a parse tree");
        RightRecursiveTransformer::new().transform(&mut tree);
        let table = analyze(&mut tree, &errors);
        (tree, table, errors)
    }

    fn error_kinds(errors: &ErrorLog) -> Vec<CompileErrorKind> {
        errors.sorted_entries().into_iter().map(|e| e.kind).collect()
    }

    #[test]
    fn clean_program_has_no_errors() {
        let (_, _, errors) = analyze_source(
            "const int N = 3;\nint f(int a) { return a + N; }\nint main() { return f(1); }",
        );
        assert!(errors.is_empty(), "{}", errors.dump());
    }

    #[test]
    fn global_constants_are_registered_with_values() {
        let (_, table, errors) =
            analyze_source("const int N = 3;\nconst int A[2] = {10, 20};\nint main() { return 0; }");
        assert!(errors.is_empty(), "{}", errors.dump());

        let Some(SymbolEntry::Constant(n)) = table.find(table.root(), "N") else {
            panic!("expected constant N");
        };
        assert_eq!(n.value, 3);

        let Some(SymbolEntry::Constant(a)) = table.find(table.root(), "A") else {
            panic!("expected constant A");
        };
        assert_eq!(a.dim, 1);
        assert_eq!(a.values[0], vec![10, 20]);
    }

    #[test]
    fn two_dimensional_constant_values() {
        let (_, table, errors) = analyze_source(
            "const int A[2][3] = {{1, 2, 3}, {4, 5}};\nint main() { return 0; }",
        );
        assert!(errors.is_empty(), "{}", errors.dump());
        let Some(SymbolEntry::Constant(a)) = table.find(table.root(), "A") else {
            panic!("expected constant A");
        };
        assert_eq!(a.values, vec![vec![1, 2, 3], vec![4, 5, 0]]);
    }

    #[test]
    fn constant_folding_through_expressions() {
        let (tree, _, errors) = analyze_source(
            "const int N = 3;\nint main() { return (N + 1) * 2 - 6 / 3; }",
        );
        assert!(errors.is_empty(), "{}", errors.dump());

        let root = tree.root().unwrap();
        let exp = tree.find_descendant(root, SyntaxKind::Exp).unwrap();
        assert!(tree.attrs(exp).det);
        assert_eq!(tree.attrs(exp).value, 6);
    }

    #[test]
    fn folding_wraps_like_32_bit() {
        let (tree, _, errors) =
            analyze_source("int main() { return 2147483647 + 1; }");
        assert!(errors.is_empty(), "{}", errors.dump());
        let root = tree.root().unwrap();
        let exp = tree.find_descendant(root, SyntaxKind::Exp).unwrap();
        assert!(tree.attrs(exp).det);
        assert_eq!(tree.attrs(exp).value, i32::MIN);
    }

    #[test]
    fn constant_array_element_folds() {
        let (tree, _, errors) = analyze_source(
            "const int A[4] = {1, 2, 3, 4};\nconst int N = 3;\nint main() { return A[N - 1]; }",
        );
        assert!(errors.is_empty(), "{}", errors.dump());
        let root = tree.root().unwrap();
        let exp = tree.find_descendant(root, SyntaxKind::Exp).unwrap();
        assert!(tree.attrs(exp).det);
        assert_eq!(tree.attrs(exp).value, 3);
    }

    #[test]
    fn lval_nodes_resolve_from_their_scope() {
        let (tree, table, errors) = analyze_source(
            "int g;\nint main() { int x; x = g; { int y; y = x; } return 0; }",
        );
        assert!(errors.is_empty(), "{}", errors.dump());

        let root = tree.root().unwrap();
        let mut stack = vec![root];
        let mut checked = 0;
        while let Some(node) = stack.pop() {
            if tree.kind(node) == Some(SyntaxKind::LVal) {
                let name = tree.token(tree.first_child(node).unwrap()).unwrap().lexeme.clone();
                let block = tree.enclosing_block(node).unwrap();
                assert!(
                    table.find(block, &name).is_some(),
                    "LVal '{name}' must resolve"
                );
                checked += 1;
            }
            stack.extend(tree.children(node));
        }
        assert!(checked >= 4);
    }

    #[test]
    fn duplicate_identifier_reported() {
        let (_, _, errors) = analyze_source("int main() { int a; int a; return 0; }");
        assert_eq!(error_kinds(&errors), vec![CompileErrorKind::DuplicateIdentifier]);
    }

    #[test]
    fn shadowing_across_blocks_is_fine() {
        let (_, _, errors) =
            analyze_source("int a;\nint main() { int a; { int a; } return 0; }");
        assert!(errors.is_empty(), "{}", errors.dump());
    }

    #[test]
    fn undefined_identifier_reported() {
        let (_, _, errors) = analyze_source("int main() { return ghost; }");
        assert_eq!(error_kinds(&errors), vec![CompileErrorKind::UndefinedIdentifier]);
    }

    #[test]
    fn assign_to_constant_reported() {
        let (_, _, errors) =
            analyze_source("const int N = 1;\nint main() { N = 2; return 0; }");
        assert_eq!(error_kinds(&errors), vec![CompileErrorKind::AssignToConstant]);
    }

    #[test]
    fn break_outside_loop_reported() {
        let (_, _, errors) = analyze_source("int main() { break; return 0; }");
        let entries = errors.sorted_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, CompileErrorKind::IllegalBreak);
        // Anchored at the `break` keyword.
        assert_eq!(entries[0].loc.column, 14);
    }

    #[test]
    fn continue_inside_loop_is_fine() {
        let (_, _, errors) =
            analyze_source("int main() { for (;;) { continue; } return 0; }");
        assert!(errors.is_empty(), "{}", errors.dump());
    }

    #[test]
    fn return_value_in_void_function_reported() {
        let (_, _, errors) =
            analyze_source("void f() { return 1; }\nint main() { f(); return 0; }");
        assert_eq!(error_kinds(&errors), vec![CompileErrorKind::IllegalReturn]);
    }

    #[test]
    fn bare_return_in_main_reported() {
        let (_, _, errors) = analyze_source("int main() { return; }");
        assert_eq!(error_kinds(&errors), vec![CompileErrorKind::IllegalReturn]);
    }

    #[test]
    fn call_arity_mismatch_reported() {
        let (_, _, errors) = analyze_source(
            "int f(int a, int b) { return a + b; }\nint main() { return f(1); }",
        );
        assert_eq!(error_kinds(&errors), vec![CompileErrorKind::ArgumentCountMismatch]);
    }

    #[test]
    fn call_dimension_mismatch_reported() {
        let (_, _, errors) = analyze_source(
            "int f(int a[]) { return a[0]; }\nint x;\nint main() { return f(x); }",
        );
        assert_eq!(error_kinds(&errors), vec![CompileErrorKind::ArgumentTypeMismatch]);
    }

    #[test]
    fn array_argument_dimensions_match() {
        let (_, _, errors) = analyze_source(
            "int f(int a[]) { return a[0]; }\nint x[3];\nint main() { return f(x); }",
        );
        assert!(errors.is_empty(), "{}", errors.dump());
    }

    #[test]
    fn printf_format_mismatch_reported() {
        let (_, _, errors) = analyze_source(
            "int main() { printf(\"%d and %d\\n\", 1); return 0; }",
        );
        assert_eq!(error_kinds(&errors), vec![CompileErrorKind::FormatMismatch]);
    }

    #[test]
    fn printf_matching_format_is_fine() {
        let (_, _, errors) = analyze_source(
            "int main() { printf(\"%d and %d\\n\", 1, 2); return 0; }",
        );
        assert!(errors.is_empty(), "{}", errors.dump());
    }

    #[test]
    fn division_by_constant_zero_reported() {
        let (_, _, errors) = analyze_source("int main() { return 1 / 0; }");
        assert_eq!(error_kinds(&errors), vec![CompileErrorKind::Unknown]);
    }

    #[test]
    fn lval_dimension_attributes() {
        let (tree, _, errors) = analyze_source(
            "int a[2][3];\nint main() { return a[1][2]; }",
        );
        assert!(errors.is_empty(), "{}", errors.dump());
        let root = tree.root().unwrap();
        let lval = tree.find_descendant(root, SyntaxKind::LVal).unwrap();
        assert_eq!(tree.attrs(lval).dim, 0);
    }

    #[test]
    fn scope_annotations_are_attached() {
        let (tree, _, errors) =
            analyze_source("int f() { return 0; }\nint main() { { } for (;;) break; return 0; }");
        // break inside for is fine; expect no *scope* errors
        assert!(errors.is_empty(), "{}", errors.dump());
        let root = tree.root().unwrap();
        assert!(tree.attrs(root).block_id.is_some());
        for kind in [
            SyntaxKind::FuncDef,
            SyntaxKind::MainFuncDef,
            SyntaxKind::Block,
            SyntaxKind::ForStmt,
        ] {
            let node = tree.find_descendant(root, kind).unwrap();
            assert!(tree.attrs(node).block_id.is_some(), "{kind:?}");
        }
    }
}
