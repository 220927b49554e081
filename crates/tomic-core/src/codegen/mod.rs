// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Lowering from the decorated syntax tree to the IR module.
//!
//! The generator consumes the analyzer's output: `det`/`value` attributes
//! short-circuit expression lowering into literal constants, `dim`
//! attributes drive array decay at call sites, and `block_id`
//! annotations recover the defining scope of every name.
//!
//! Control flow lowers to basic blocks the standard way: conditions
//! branch with `icmp` + `br`, `&&`/`||` short-circuit through
//! intermediate blocks, `for` builds a cond/body/step/end diamond, and
//! `break`/`continue` jump to the innermost loop's exits. Array element
//! access goes through `getelementptr inbounds`.

pub mod emit;

use std::collections::HashMap;

use ecow::EcoString;
use tracing::warn;

use crate::ir::{BinaryOp, ComparePredicate, ConstantValue, Module, TypeId, UnaryOp, ValueId, ValueKind};
use crate::semantic_analysis::{BlockId, SymbolEntry, SymbolTable};
use crate::source_analysis::{NodeId, SyntaxKind, SyntaxTree, TokenKind};

pub use emit::print_module;

/// One piece of a `printf` format string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatChunk<'a> {
    /// Literal text to print verbatim.
    Literal(&'a str),
    /// A `%d` slot consuming the next integer argument.
    Int,
}

/// Splits a format string into literal chunks and `%d` slots, in source
/// order.
///
/// # Examples
///
/// ```
/// use tomic_core::codegen::{FormatChunk, FormatSplitter};
///
/// let chunks: Vec<_> = FormatSplitter::new("x=%d\n").collect();
/// assert_eq!(
///     chunks,
///     vec![
///         FormatChunk::Literal("x="),
///         FormatChunk::Int,
///         FormatChunk::Literal("\n"),
///     ]
/// );
/// ```
#[derive(Debug)]
pub struct FormatSplitter<'a> {
    rest: &'a str,
}

impl<'a> FormatSplitter<'a> {
    /// Creates a splitter over the format text (without quotes).
    #[must_use]
    pub fn new(format: &'a str) -> Self {
        Self { rest: format }
    }
}

impl<'a> Iterator for FormatSplitter<'a> {
    type Item = FormatChunk<'a>;

    fn next(&mut self) -> Option<FormatChunk<'a>> {
        if self.rest.is_empty() {
            return None;
        }
        if let Some(rest) = self.rest.strip_prefix("%d") {
            self.rest = rest;
            return Some(FormatChunk::Int);
        }
        let end = self.rest.find("%d").unwrap_or(self.rest.len());
        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(FormatChunk::Literal(chunk))
    }
}

/// Lowers a decorated tree and its symbol table to an IR module.
#[must_use]
pub fn generate(tree: &SyntaxTree, table: &SymbolTable, name: &str) -> Module {
    let mut generator = AsmGenerator::new(tree, table, name);
    generator.run();
    generator.module
}

struct LoopTargets {
    break_to: ValueId,
    continue_to: ValueId,
}

struct AsmGenerator<'a> {
    tree: &'a SyntaxTree,
    table: &'a SymbolTable,
    module: Module,
    /// Function values by source name.
    functions: HashMap<EcoString, ValueId>,
    /// Storage addresses keyed by defining scope and name.
    addresses: HashMap<(BlockId, EcoString), ValueId>,
    current_function: Option<ValueId>,
    current_block: Option<ValueId>,
    current_returns_void: bool,
    loops: Vec<LoopTargets>,
}

impl<'a> AsmGenerator<'a> {
    fn new(tree: &'a SyntaxTree, table: &'a SymbolTable, name: &str) -> Self {
        Self {
            tree,
            table,
            module: Module::new(name),
            functions: HashMap::new(),
            addresses: HashMap::new(),
            current_function: None,
            current_block: None,
            current_returns_void: false,
            loops: Vec::new(),
        }
    }

    fn run(&mut self) {
        let Some(root) = self.tree.root() else { return };
        for child in self.tree.children(root) {
            match self.tree.kind(child) {
                Some(SyntaxKind::Decl) => self.gen_global_decl(child),
                Some(SyntaxKind::FuncDef) => self.gen_function(child, false),
                Some(SyntaxKind::MainFuncDef) => self.gen_function(child, true),
                _ => {}
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn ident_of(&self, node: NodeId) -> Option<EcoString> {
        self.tree.children(node).into_iter().find_map(|child| {
            self.tree
                .token(child)
                .filter(|t| t.kind == TokenKind::Identifier)
                .map(|t| t.lexeme.clone())
        })
    }

    /// The IR element type of a data entry: `i32`, `[n x i32]`, or
    /// `[n x [m x i32]]`.
    fn element_type(&mut self, dim: i32, size: [i32; 2]) -> TypeId {
        let ctx = self.module.context_mut();
        let i32_ty = ctx.int32_type();
        match dim {
            1 => ctx.array_type(i32_ty, usize::try_from(size[0]).unwrap_or(0)),
            2 => {
                let row = ctx.array_type(i32_ty, usize::try_from(size[1]).unwrap_or(0));
                ctx.array_type(row, usize::try_from(size[0]).unwrap_or(0))
            }
            _ => i32_ty,
        }
    }

    fn block_is_terminated(&self, block: ValueId) -> bool {
        let ValueKind::BasicBlock { instructions, .. } = &self.module.context().value(block).kind
        else {
            return false;
        };
        instructions
            .last()
            .is_some_and(|&inst| self.module.context().value(inst).kind.is_terminator())
    }

    fn current_terminated(&self) -> bool {
        self.current_block
            .is_some_and(|block| self.block_is_terminated(block))
    }

    /// Appends `inst` to the current block. Emitting past a terminator
    /// opens a fresh (unreachable) block so the output stays well-formed.
    fn append(&mut self, inst: ValueId) {
        let Some(function) = self.current_function else {
            return;
        };
        let block = match self.current_block {
            Some(block) if !self.block_is_terminated(block) => block,
            _ => {
                let fresh = self.module.context_mut().create_basic_block(function);
                self.current_block = Some(fresh);
                fresh
            }
        };
        self.module.context_mut().append_instruction(block, inst);
    }

    fn new_block(&mut self) -> ValueId {
        let function = self.current_function.expect("block outside of a function");
        self.module.context_mut().create_basic_block(function)
    }

    fn constant(&mut self, value: i32) -> ValueId {
        self.module.context_mut().create_constant_int(value)
    }

    // ========================================================================
    // Globals
    // ========================================================================

    fn gen_global_decl(&mut self, node: NodeId) {
        let Some(decl) = self.tree.first_child(node) else {
            return;
        };
        let is_constant = self.tree.kind(decl) == Some(SyntaxKind::ConstDecl);
        for def in self.tree.children(decl) {
            if matches!(
                self.tree.kind(def),
                Some(SyntaxKind::ConstDef | SyntaxKind::VarDef)
            ) {
                self.gen_global_def(def, is_constant);
            }
        }
    }

    fn gen_global_def(&mut self, def: NodeId, is_constant: bool) {
        let Some(name) = self.ident_of(def) else {
            return;
        };
        let root_block = self.table.root();
        let Some(entry) = self.table.find_local(root_block, &name) else {
            return;
        };

        let (dim, size) = match entry {
            SymbolEntry::Variable(v) => (v.dim, v.size),
            SymbolEntry::Constant(c) => (c.dim, c.size),
            SymbolEntry::Function(_) => return,
        };

        let initializer = match entry {
            SymbolEntry::Constant(c) => Some(match c.dim {
                0 => ConstantValue::Int(c.value),
                1 => ConstantValue::Array(
                    c.values
                        .first()
                        .map(|row| row.iter().map(|&v| ConstantValue::Int(v)).collect())
                        .unwrap_or_default(),
                ),
                _ => ConstantValue::Array(
                    c.values
                        .iter()
                        .map(|row| {
                            ConstantValue::Array(
                                row.iter().map(|&v| ConstantValue::Int(v)).collect(),
                            )
                        })
                        .collect(),
                ),
            }),
            SymbolEntry::Variable(_) => self
                .tree
                .find_child(def, SyntaxKind::InitVal)
                .map(|init| self.build_init_constant(init, dim, size)),
            SymbolEntry::Function(_) => None,
        };

        let element = self.element_type(dim, size);
        let value = self.module.context_mut().create_global_variable(
            name.clone(),
            element,
            is_constant,
            initializer,
        );
        self.addresses.insert((root_block, name), value);
        self.module.add_global_variable(value);
    }

    /// Builds a folded initializer from a decorated `InitVal` subtree,
    /// zero-padding to the declared extents.
    fn build_init_constant(&self, init: NodeId, dim: i32, size: [i32; 2]) -> ConstantValue {
        if dim == 0 {
            return ConstantValue::Int(self.tree.attrs(init).value);
        }

        let items = self.init_items(init);
        if dim == 1 {
            let n = usize::try_from(size[0]).unwrap_or(0);
            let mut elements: Vec<ConstantValue> = items
                .iter()
                .map(|&item| ConstantValue::Int(self.tree.attrs(item).value))
                .collect();
            elements.resize(n, ConstantValue::Int(0));
            return ConstantValue::Array(elements);
        }

        let n = usize::try_from(size[0]).unwrap_or(0);
        let mut rows: Vec<ConstantValue> = items
            .iter()
            .map(|&row| self.build_init_constant(row, 1, [size[1], 0]))
            .collect();
        let m = usize::try_from(size[1]).unwrap_or(0);
        rows.resize(n, ConstantValue::Array(vec![ConstantValue::Int(0); m]));
        ConstantValue::Array(rows)
    }

    fn init_items(&self, init: NodeId) -> Vec<NodeId> {
        self.tree
            .children(init)
            .into_iter()
            .filter(|&c| {
                matches!(
                    self.tree.kind(c),
                    Some(SyntaxKind::InitVal | SyntaxKind::ConstInitVal)
                )
            })
            .collect()
    }

    // ========================================================================
    // Functions
    // ========================================================================

    fn gen_function(&mut self, node: NodeId, is_main: bool) {
        let ctx_i32 = self.module.context().int32_type();
        let ctx_void = self.module.context().void_type();

        let (name, returns_void, param_info) = if is_main {
            (EcoString::from("main"), false, Vec::new())
        } else {
            let Some(func_decl) = self.tree.first_child(node) else {
                return;
            };
            let returns_void = self
                .tree
                .first_child(func_decl)
                .and_then(|ft| self.tree.first_child(ft))
                .and_then(|t| self.tree.token_kind(t))
                == Some(TokenKind::Void);
            let Some(name) = self.ident_of(func_decl) else {
                return;
            };

            let func_scope = self.tree.attrs(node).block_id;
            let mut params = Vec::new();
            if let Some(fparams) = self.tree.find_child(func_decl, SyntaxKind::FuncFParams) {
                for fparam in self.tree.children(fparams) {
                    if self.tree.kind(fparam) != Some(SyntaxKind::FuncFParam) {
                        continue;
                    }
                    let Some(param_name) = self.ident_of(fparam) else {
                        continue;
                    };
                    let (dim, size) = func_scope
                        .and_then(|scope| self.table.find_local(scope, &param_name))
                        .map_or((0, [0, 0]), |entry| match entry {
                            SymbolEntry::Variable(v) => (v.dim, v.size),
                            _ => (0, [0, 0]),
                        });
                    params.push((param_name, dim, size));
                }
            }
            (name, returns_void, params)
        };

        // Array parameters arrive as pointers.
        let param_types: Vec<TypeId> = param_info
            .iter()
            .map(|&(_, dim, size)| {
                let ctx = self.module.context_mut();
                let i32_ty = ctx.int32_type();
                match dim {
                    1 => ctx.pointer_type(i32_ty),
                    2 => {
                        let row = ctx.array_type(i32_ty, usize::try_from(size[1]).unwrap_or(0));
                        ctx.pointer_type(row)
                    }
                    _ => i32_ty,
                }
            })
            .collect();

        let return_type = if returns_void { ctx_void } else { ctx_i32 };
        let fn_ty = self
            .module
            .context_mut()
            .function_type(return_type, param_types.clone());
        let function = self.module.context_mut().create_function(name.clone(), fn_ty);
        self.module.add_function(function);
        if is_main {
            self.module.set_main_function(function);
        } else {
            self.functions.insert(name, function);
        }

        self.current_function = Some(function);
        self.current_returns_void = returns_void;
        let entry = self.module.context_mut().create_basic_block(function);
        self.current_block = Some(entry);

        // Spill each parameter into a stack slot and register its
        // address under the function scope.
        let func_scope = self.tree.attrs(node).block_id;
        for (index, ((param_name, _, _), &param_ty)) in
            param_info.iter().zip(&param_types).enumerate()
        {
            let arg = self
                .module
                .context_mut()
                .create_argument(function, param_ty, index);
            let slot = self.module.context_mut().create_alloca(param_ty);
            self.append(slot);
            let store = self.module.context_mut().create_store(arg, slot);
            self.append(store);
            if let Some(scope) = func_scope {
                self.addresses.insert((scope, param_name.clone()), slot);
            }
        }

        if let Some(block) = self.tree.find_child(node, SyntaxKind::Block) {
            self.lower_block(block);
        }

        // A fall-off function end still needs a terminator.
        if !self.current_terminated() {
            let ret = if returns_void {
                self.module.context_mut().create_return(None)
            } else {
                let zero = self.constant(0);
                self.module.context_mut().create_return(Some(zero))
            };
            self.append(ret);
        }

        self.current_function = None;
        self.current_block = None;
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn lower_block(&mut self, node: NodeId) {
        let scope = self.tree.attrs(node).block_id;
        for item in self.tree.children(node) {
            if self.tree.kind(item) != Some(SyntaxKind::BlockItem) {
                continue;
            }
            let Some(child) = self.tree.first_child(item) else {
                continue;
            };
            match self.tree.kind(child) {
                Some(SyntaxKind::ConstDecl | SyntaxKind::VarDecl) => {
                    self.lower_local_decl(child, scope);
                }
                Some(SyntaxKind::Stmt) => self.lower_stmt(child),
                _ => {}
            }
        }
    }

    fn lower_local_decl(&mut self, node: NodeId, scope: Option<BlockId>) {
        let Some(scope) = scope else { return };
        for def in self.tree.children(node) {
            if !matches!(
                self.tree.kind(def),
                Some(SyntaxKind::ConstDef | SyntaxKind::VarDef)
            ) {
                continue;
            }
            let Some(name) = self.ident_of(def) else {
                continue;
            };
            let Some(entry) = self.table.find_local(scope, &name) else {
                continue;
            };
            let (dim, size) = match entry {
                SymbolEntry::Variable(v) => (v.dim, v.size),
                SymbolEntry::Constant(c) => (c.dim, c.size),
                SymbolEntry::Function(_) => continue,
            };

            let element = self.element_type(dim, size);
            let slot = self.module.context_mut().create_alloca(element);
            self.append(slot);
            self.addresses.insert((scope, name), slot);

            let init = self
                .tree
                .find_child(def, SyntaxKind::InitVal)
                .or_else(|| self.tree.find_child(def, SyntaxKind::ConstInitVal));
            let Some(init) = init else { continue };

            match dim {
                0 => {
                    let value = self.lower_init_scalar(init);
                    let store = self.module.context_mut().create_store(value, slot);
                    self.append(store);
                }
                1 => {
                    let items = self.init_items(init);
                    for i in 0..usize::try_from(size[0]).unwrap_or(0) {
                        let value = match items.get(i) {
                            Some(&item) => self.lower_init_scalar(item),
                            None => self.constant(0),
                        };
                        let address = self.gep_constant(slot, &[0, i32_index(i)]);
                        let store = self.module.context_mut().create_store(value, address);
                        self.append(store);
                    }
                }
                _ => {
                    let rows = self.init_items(init);
                    for i in 0..usize::try_from(size[0]).unwrap_or(0) {
                        let row_items = rows
                            .get(i)
                            .map(|&row| self.init_items(row))
                            .unwrap_or_default();
                        for j in 0..usize::try_from(size[1]).unwrap_or(0) {
                            let value = match row_items.get(j) {
                                Some(&item) => self.lower_init_scalar(item),
                                None => self.constant(0),
                            };
                            let address =
                                self.gep_constant(slot, &[0, i32_index(i), i32_index(j)]);
                            let store = self.module.context_mut().create_store(value, address);
                            self.append(store);
                        }
                    }
                }
            }
        }
    }

    /// The value of a scalar initializer: its folded constant when
    /// determined, otherwise the lowered expression.
    fn lower_init_scalar(&mut self, init: NodeId) -> ValueId {
        let attrs = self.tree.attrs(init);
        if attrs.det {
            let value = attrs.value;
            return self.constant(value);
        }
        let exp = self
            .tree
            .find_child(init, SyntaxKind::Exp)
            .or_else(|| self.tree.find_child(init, SyntaxKind::ConstExp));
        match exp {
            Some(exp) => self.lower_exp(exp),
            None => self.constant(0),
        }
    }

    fn gep_constant(&mut self, base: ValueId, indices: &[i32]) -> ValueId {
        let index_values: Vec<ValueId> = indices.iter().map(|&i| self.constant(i)).collect();
        let gep = self.module.context_mut().create_gep(base, index_values);
        self.append(gep);
        gep
    }

    fn lower_stmt(&mut self, node: NodeId) {
        let Some(child) = self.tree.first_child(node) else {
            return;
        };
        match self.tree.kind(child) {
            Some(SyntaxKind::AssignmentStmt) => self.lower_assignment(child),
            Some(SyntaxKind::InStmt) => {
                let input = self.module.context_mut().create_input();
                self.append(input);
                if let Some(lval) = self.tree.find_child(child, SyntaxKind::LVal) {
                    let address = self.lower_lval_address(lval);
                    let store = self.module.context_mut().create_store(input, address);
                    self.append(store);
                }
            }
            Some(SyntaxKind::OutStmt) => self.lower_output(child),
            Some(SyntaxKind::ExpStmt) => {
                if let Some(exp) = self.tree.find_child(child, SyntaxKind::Exp) {
                    self.lower_exp(exp);
                }
            }
            Some(SyntaxKind::Block) => self.lower_block(child),
            Some(SyntaxKind::IfStmt) => self.lower_if(child),
            Some(SyntaxKind::ForStmt) => self.lower_for(child),
            Some(SyntaxKind::BreakStmt) => {
                if let Some(targets) = self.loops.last() {
                    let target = targets.break_to;
                    let jump = self.module.context_mut().create_jump(target);
                    self.append(jump);
                }
                // break outside a loop was already reported; emit nothing.
            }
            Some(SyntaxKind::ContinueStmt) => {
                if let Some(targets) = self.loops.last() {
                    let target = targets.continue_to;
                    let jump = self.module.context_mut().create_jump(target);
                    self.append(jump);
                }
            }
            Some(SyntaxKind::ReturnStmt) => {
                let value = self
                    .tree
                    .find_child(child, SyntaxKind::Exp)
                    .map(|exp| self.lower_exp(exp));
                // A value in a void function was reported by the
                // analyzer; keep the output well-formed regardless.
                let value = if self.current_returns_void { None } else { value };
                let ret = self.module.context_mut().create_return(value);
                self.append(ret);
            }
            _ => {}
        }
    }

    fn lower_assignment(&mut self, node: NodeId) {
        let Some(lval) = self.tree.find_child(node, SyntaxKind::LVal) else {
            return;
        };
        let address = self.lower_lval_address(lval);
        let Some(exp) = self.tree.find_child(node, SyntaxKind::Exp) else {
            return;
        };
        let value = self.lower_exp(exp);
        let store = self.module.context_mut().create_store(value, address);
        self.append(store);
    }

    fn lower_output(&mut self, node: NodeId) {
        let Some(format) = self.tree.children(node).into_iter().find_map(|c| {
            self.tree
                .token(c)
                .filter(|t| t.kind == TokenKind::FormatString)
                .map(|t| t.lexeme.clone())
        }) else {
            return;
        };
        let inner = format
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(&format)
            .to_string();

        let exps: Vec<NodeId> = self
            .tree
            .children(node)
            .into_iter()
            .filter(|&c| self.tree.kind(c) == Some(SyntaxKind::Exp))
            .collect();
        let mut next_exp = 0usize;

        for chunk in FormatSplitter::new(&inner) {
            match chunk {
                FormatChunk::Literal(text) => {
                    let string = self.module.add_global_string(text);
                    let output = self.module.context_mut().create_output(string);
                    self.append(output);
                }
                FormatChunk::Int => {
                    let Some(&exp) = exps.get(next_exp) else {
                        warn!("printf has more %d specifiers than arguments");
                        continue;
                    };
                    next_exp += 1;
                    let value = self.lower_exp(exp);
                    let output = self.module.context_mut().create_output(value);
                    self.append(output);
                }
            }
        }
    }

    fn lower_if(&mut self, node: NodeId) {
        let cond = self.tree.find_child(node, SyntaxKind::Cond);
        let stmts: Vec<NodeId> = self
            .tree
            .children(node)
            .into_iter()
            .filter(|&c| self.tree.kind(c) == Some(SyntaxKind::Stmt))
            .collect();

        let then_block = self.new_block();
        let else_block = (stmts.len() > 1).then(|| self.new_block());
        let merge_block = self.new_block();

        match cond {
            Some(cond) => {
                self.lower_cond(cond, then_block, else_block.unwrap_or(merge_block));
            }
            None => {
                let jump = self.module.context_mut().create_jump(then_block);
                self.append(jump);
            }
        }

        self.current_block = Some(then_block);
        if let Some(&then_stmt) = stmts.first() {
            self.lower_stmt(then_stmt);
        }
        if !self.current_terminated() {
            let jump = self.module.context_mut().create_jump(merge_block);
            self.append(jump);
        }

        if let Some(else_block) = else_block {
            self.current_block = Some(else_block);
            if let Some(&else_stmt) = stmts.get(1) {
                self.lower_stmt(else_stmt);
            }
            if !self.current_terminated() {
                let jump = self.module.context_mut().create_jump(merge_block);
                self.append(jump);
            }
        }

        self.current_block = Some(merge_block);
    }

    fn lower_for(&mut self, node: NodeId) {
        if let Some(init) = self.tree.find_child(node, SyntaxKind::ForInitStmt) {
            self.lower_assignment(init);
        }

        let cond = self.tree.find_child(node, SyntaxKind::Cond);
        let step = self.tree.find_child(node, SyntaxKind::ForStepStmt);
        let body = self.tree.find_child(node, SyntaxKind::Stmt);

        let cond_block = self.new_block();
        let body_block = self.new_block();
        let step_block = step.map(|_| self.new_block());
        let end_block = self.new_block();
        let continue_to = step_block.unwrap_or(cond_block);

        let jump = self.module.context_mut().create_jump(cond_block);
        self.append(jump);

        self.current_block = Some(cond_block);
        match cond {
            Some(cond) => self.lower_cond(cond, body_block, end_block),
            None => {
                let jump = self.module.context_mut().create_jump(body_block);
                self.append(jump);
            }
        }

        self.current_block = Some(body_block);
        self.loops.push(LoopTargets {
            break_to: end_block,
            continue_to,
        });
        if let Some(body) = body {
            self.lower_stmt(body);
        }
        self.loops.pop();
        if !self.current_terminated() {
            let jump = self.module.context_mut().create_jump(continue_to);
            self.append(jump);
        }

        if let Some(step_block) = step_block {
            self.current_block = Some(step_block);
            if let Some(step) = step {
                self.lower_assignment(step);
            }
            let jump = self.module.context_mut().create_jump(cond_block);
            self.append(jump);
        }

        self.current_block = Some(end_block);
    }

    // ========================================================================
    // Conditions
    // ========================================================================

    /// Lowers a condition subtree into branches to `true_block` /
    /// `false_block`, short-circuiting `||` and `&&`.
    fn lower_cond(&mut self, node: NodeId, true_block: ValueId, false_block: ValueId) {
        // Folded conditions branch unconditionally.
        let attrs = self.tree.attrs(node);
        if attrs.det {
            let target = if attrs.value != 0 { true_block } else { false_block };
            let jump = self.module.context_mut().create_jump(target);
            self.append(jump);
            return;
        }

        match self.tree.kind(node) {
            Some(SyntaxKind::Cond) => {
                if let Some(child) = self.tree.first_child(node) {
                    self.lower_cond(child, true_block, false_block);
                }
                return;
            }
            Some(SyntaxKind::OrExp) => {
                let children = self.tree.children(node);
                if children.len() == 3 {
                    let rhs_block = self.new_block();
                    self.lower_cond(children[0], true_block, rhs_block);
                    self.current_block = Some(rhs_block);
                    self.lower_cond(children[2], true_block, false_block);
                    return;
                }
                if let Some(&child) = children.first() {
                    self.lower_cond(child, true_block, false_block);
                }
                return;
            }
            Some(SyntaxKind::AndExp) => {
                let children = self.tree.children(node);
                if children.len() == 3 {
                    let rhs_block = self.new_block();
                    self.lower_cond(children[0], rhs_block, false_block);
                    self.current_block = Some(rhs_block);
                    self.lower_cond(children[2], true_block, false_block);
                    return;
                }
                if let Some(&child) = children.first() {
                    self.lower_cond(child, true_block, false_block);
                }
                return;
            }
            Some(SyntaxKind::EqExp | SyntaxKind::RelExp) => {
                let children = self.tree.children(node);
                if children.len() == 3 {
                    let predicate = match self.tree.token_kind(children[1]) {
                        Some(TokenKind::Equal) => ComparePredicate::Equal,
                        Some(TokenKind::NotEqual) => ComparePredicate::NotEqual,
                        Some(TokenKind::Less) => ComparePredicate::SignedLess,
                        Some(TokenKind::LessEqual) => ComparePredicate::SignedLessEqual,
                        Some(TokenKind::Greater) => ComparePredicate::SignedGreater,
                        _ => ComparePredicate::SignedGreaterEqual,
                    };
                    let lhs = self.lower_exp(children[0]);
                    let rhs = self.lower_exp(children[2]);
                    let compare = self
                        .module
                        .context_mut()
                        .create_compare(predicate, lhs, rhs);
                    self.append(compare);
                    let branch = self
                        .module
                        .context_mut()
                        .create_branch(compare, true_block, false_block);
                    self.append(branch);
                    return;
                }
                if let Some(&child) = children.first() {
                    self.lower_cond(child, true_block, false_block);
                }
                return;
            }
            Some(SyntaxKind::UnaryExp) => {
                let children = self.tree.children(node);
                if children.len() == 2 {
                    let op = self
                        .tree
                        .first_child(children[0])
                        .and_then(|c| self.tree.token_kind(c));
                    if op == Some(TokenKind::Not) {
                        // `!c` swaps the branch targets.
                        self.lower_cond(children[1], false_block, true_block);
                        return;
                    }
                }
            }
            Some(
                SyntaxKind::Exp
                | SyntaxKind::AddExp
                | SyntaxKind::MulExp
                | SyntaxKind::PrimaryExp,
            ) => {
                // Single-child wrappers descend; real arithmetic falls
                // through to the value comparison below.
                let children = self.tree.children(node);
                if children.len() == 1 {
                    self.lower_cond(children[0], true_block, false_block);
                    return;
                }
            }
            _ => {}
        }

        // Value position: compare against zero.
        let value = self.lower_exp(node);
        let zero = self.constant(0);
        let compare =
            self.module
                .context_mut()
                .create_compare(ComparePredicate::NotEqual, value, zero);
        self.append(compare);
        let branch = self
            .module
            .context_mut()
            .create_branch(compare, true_block, false_block);
        self.append(branch);
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn lower_exp(&mut self, node: NodeId) -> ValueId {
        // Determined expressions lower to their folded constant.
        let attrs = self.tree.attrs(node);
        if attrs.det {
            let value = attrs.value;
            return self.constant(value);
        }

        match self.tree.kind(node) {
            Some(SyntaxKind::Exp | SyntaxKind::ConstExp) => match self.tree.first_child(node) {
                Some(child) => self.lower_exp(child),
                None => self.constant(0),
            },
            Some(SyntaxKind::AddExp | SyntaxKind::MulExp) => {
                let children = self.tree.children(node);
                if children.len() == 3 {
                    let lhs = self.lower_exp(children[0]);
                    let rhs = self.lower_exp(children[2]);
                    let op = match self.tree.token_kind(children[1]) {
                        Some(TokenKind::Plus) => BinaryOp::Add,
                        Some(TokenKind::Minus) => BinaryOp::Sub,
                        Some(TokenKind::Star) => BinaryOp::Mul,
                        Some(TokenKind::Slash) => BinaryOp::Div,
                        _ => BinaryOp::Mod,
                    };
                    let inst = self.module.context_mut().create_binary(op, lhs, rhs);
                    self.append(inst);
                    inst
                } else {
                    match children.first() {
                        Some(&child) => self.lower_exp(child),
                        None => self.constant(0),
                    }
                }
            }
            Some(SyntaxKind::UnaryExp) => {
                let children = self.tree.children(node);
                if children.len() == 2 {
                    let op = self
                        .tree
                        .first_child(children[0])
                        .and_then(|c| self.tree.token_kind(c));
                    match op {
                        Some(TokenKind::Minus) => {
                            let operand = self.lower_exp(children[1]);
                            let inst = self
                                .module
                                .context_mut()
                                .create_unary(UnaryOp::Neg, operand);
                            self.append(inst);
                            inst
                        }
                        Some(TokenKind::Not) => {
                            // `!x` in value position: compare to zero and
                            // widen back to i32.
                            let operand = self.lower_exp(children[1]);
                            let zero = self.constant(0);
                            let compare = self.module.context_mut().create_compare(
                                ComparePredicate::Equal,
                                operand,
                                zero,
                            );
                            self.append(compare);
                            let i32_ty = self.module.context().int32_type();
                            let widened =
                                self.module.context_mut().create_zext(compare, i32_ty);
                            self.append(widened);
                            widened
                        }
                        _ => self.lower_exp(children[1]),
                    }
                } else {
                    match children.first() {
                        Some(&child) => self.lower_exp(child),
                        None => self.constant(0),
                    }
                }
            }
            Some(SyntaxKind::PrimaryExp) => {
                let children = self.tree.children(node);
                if children.len() >= 3 {
                    self.lower_exp(children[1])
                } else {
                    match children.first() {
                        Some(&child) => self.lower_exp(child),
                        None => self.constant(0),
                    }
                }
            }
            Some(SyntaxKind::Number) => {
                let value = self.tree.attrs(node).value;
                self.constant(value)
            }
            Some(SyntaxKind::LVal) => self.lower_lval_value(node),
            Some(SyntaxKind::FuncCall) => self.lower_call(node),
            _ => self.constant(0),
        }
    }

    fn lower_call(&mut self, node: NodeId) -> ValueId {
        let Some(name) = self.ident_of(node) else {
            return self.constant(0);
        };
        let Some(&function) = self.functions.get(&name) else {
            // Undefined callee was reported by the analyzer.
            return self.constant(0);
        };

        let mut args = Vec::new();
        if let Some(aparams) = self.tree.find_child(node, SyntaxKind::FuncAParams) {
            for aparam in self.tree.children(aparams) {
                if self.tree.kind(aparam) != Some(SyntaxKind::FuncAParam) {
                    continue;
                }
                if let Some(exp) = self.tree.first_child(aparam) {
                    args.push(self.lower_exp(exp));
                }
            }
        }

        let call = self.module.context_mut().create_call(function, args);
        self.append(call);
        call
    }

    /// The address denoted by an `LVal`, fully applying its index chain.
    fn lower_lval_address(&mut self, node: NodeId) -> ValueId {
        let Some(name) = self.ident_of(node) else {
            return self.undefined_slot();
        };
        let scope = self
            .tree
            .enclosing_block(node)
            .unwrap_or_else(|| self.table.root());
        let base = self
            .table
            .find_with_block(scope, &name)
            .and_then(|(block, _)| self.addresses.get(&(block, name.clone())).copied());
        let Some(base) = base else {
            return self.undefined_slot();
        };

        let index_exps: Vec<NodeId> = self
            .tree
            .children(node)
            .into_iter()
            .filter(|&c| self.tree.kind(c) == Some(SyntaxKind::Exp))
            .collect();
        let indices: Vec<ValueId> = index_exps.iter().map(|&e| self.lower_exp(e)).collect();

        let pointee = self
            .module
            .context()
            .pointee(self.module.context().value(base).ty)
            .unwrap_or_else(|| self.module.context().int32_type());
        let is_array = self.module.context().type_kind(pointee).is_array();
        let is_pointer = self.module.context().type_kind(pointee).is_pointer();

        if is_array {
            if indices.is_empty() {
                return base;
            }
            let zero = self.constant(0);
            let mut full = vec![zero];
            full.extend(indices);
            let gep = self.module.context_mut().create_gep(base, full);
            self.append(gep);
            return gep;
        }

        if is_pointer {
            // Array parameter: the slot holds the incoming pointer.
            let pointer = self.module.context_mut().create_load(base);
            self.append(pointer);
            if indices.is_empty() {
                return pointer;
            }
            let gep = self.module.context_mut().create_gep(pointer, indices);
            self.append(gep);
            return gep;
        }

        base
    }

    /// The value of an `LVal` in expression position: a load for
    /// scalars, a decayed pointer for whole or partially-indexed arrays.
    fn lower_lval_value(&mut self, node: NodeId) -> ValueId {
        let dim = self.tree.attrs(node).dim;
        let mut address = self.lower_lval_address(node);

        if dim == 0 {
            let load = self.module.context_mut().create_load(address);
            self.append(load);
            return load;
        }

        // Array-typed use: decay to the parameter pointer shape
        // (`i32*` for dim 1, `[m x i32]*` for dim 2).
        loop {
            let pointee = self
                .module
                .context()
                .pointee(self.module.context().value(address).ty);
            let Some(pointee) = pointee else { break };
            let depth = self.module.context().array_depth(pointee);
            if i64::from(depth) > i64::from(dim) - 1 {
                address = self.gep_constant(address, &[0, 0]);
            } else {
                break;
            }
        }
        address
    }

    /// A stand-in stack slot for names that never got storage (only
    /// reachable after semantic errors); keeps the output well-formed.
    fn undefined_slot(&mut self) -> ValueId {
        let i32_ty = self.module.context().int32_type();
        let slot = self.module.context_mut().create_alloca(i32_ty);
        self.append(slot);
        slot
    }
}

fn i32_index(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ErrorLog;
    use crate::semantic_analysis::analyze;
    use crate::source_analysis::transform::RightRecursiveTransformer;
    use crate::source_analysis::parse;

    fn lower(source: &str) -> Module {
        let errors = ErrorLog::new();
        let mut tree = parse(source, &errors).expect("expected a parse tree");
        RightRecursiveTransformer::new().transform(&mut tree);
        let table = analyze(&mut tree, &errors);
        generate(&tree, &table, "test")
    }

    fn function_instruction_kinds(module: &Module, function: ValueId) -> Vec<&'static str> {
        let ValueKind::Function { blocks, .. } = &module.context().value(function).kind else {
            panic!("expected a function");
        };
        let mut kinds = Vec::new();
        for &block in blocks {
            let ValueKind::BasicBlock { instructions, .. } = &module.context().value(block).kind
            else {
                continue;
            };
            for &inst in instructions {
                kinds.push(match module.context().value(inst).kind {
                    ValueKind::Alloca { .. } => "alloca",
                    ValueKind::Load => "load",
                    ValueKind::Store => "store",
                    ValueKind::Binary { .. } => "binary",
                    ValueKind::Unary { .. } => "unary",
                    ValueKind::Compare { .. } => "icmp",
                    ValueKind::ZExt => "zext",
                    ValueKind::GetElementPtr => "gep",
                    ValueKind::Branch => "br",
                    ValueKind::Jump => "jump",
                    ValueKind::Return => "ret",
                    ValueKind::Call { .. } => "call",
                    ValueKind::Input => "input",
                    ValueKind::Output => "output",
                    _ => "other",
                });
            }
        }
        kinds
    }

    #[test]
    fn format_splitter_alternates() {
        let chunks: Vec<_> = FormatSplitter::new("a%db%dc").collect();
        assert_eq!(
            chunks,
            vec![
                FormatChunk::Literal("a"),
                FormatChunk::Int,
                FormatChunk::Literal("b"),
                FormatChunk::Int,
                FormatChunk::Literal("c"),
            ]
        );
        assert_eq!(FormatSplitter::new("").count(), 0);
        assert_eq!(
            FormatSplitter::new("%d%d").collect::<Vec<_>>(),
            vec![FormatChunk::Int, FormatChunk::Int]
        );
    }

    #[test]
    fn minimal_main_lowered() {
        let module = lower("int main() { return 0; }");
        assert_eq!(module.functions().len(), 1);
        let main = module.main_function().expect("main");
        assert_eq!(function_instruction_kinds(&module, main), vec!["ret"]);
    }

    #[test]
    fn globals_with_initializers() {
        let module = lower("const int N = 3;\nint a[4] = {1, 2, 3, 4};\nint z;\nint main() { return 0; }");
        assert_eq!(module.global_variables().len(), 3);

        let n = module.global_variables()[0];
        let ValueKind::GlobalVariable {
            is_constant,
            initializer,
        } = &module.context().value(n).kind
        else {
            panic!("expected a global variable");
        };
        assert!(*is_constant);
        assert_eq!(initializer, &Some(ConstantValue::Int(3)));

        let z = module.global_variables()[2];
        let ValueKind::GlobalVariable { initializer, .. } = &module.context().value(z).kind else {
            panic!("expected a global variable");
        };
        assert!(initializer.is_none());
    }

    #[test]
    fn parameters_are_spilled() {
        let module = lower("int f(int a, int b) { return a + b; }\nint main() { return f(1, 2); }");
        let f = module.functions()[0];
        let kinds = function_instruction_kinds(&module, f);
        assert_eq!(
            kinds,
            vec!["alloca", "store", "alloca", "store", "load", "load", "binary", "ret"]
        );
    }

    #[test]
    fn call_passes_arguments() {
        let module = lower("int f(int a) { return a; }\nint main() { return f(41); }");
        let main = module.main_function().unwrap();
        let kinds = function_instruction_kinds(&module, main);
        assert_eq!(kinds, vec!["call", "ret"]);
    }

    #[test]
    fn input_and_output_lowered() {
        let module = lower(
            "int main() { int x; x = getint(); printf(\"x=%d\\n\", x); return 0; }",
        );
        let main = module.main_function().unwrap();
        let kinds = function_instruction_kinds(&module, main);
        assert_eq!(
            kinds,
            vec!["alloca", "input", "store", "output", "load", "output", "output", "ret"]
        );
        assert_eq!(module.global_strings().len(), 2);
    }

    #[test]
    fn if_else_creates_branches() {
        let module = lower(
            "int main() { int x; x = getint(); if (x < 0) x = 0; else x = 1; return x; }",
        );
        let main = module.main_function().unwrap();
        let kinds = function_instruction_kinds(&module, main);
        assert!(kinds.contains(&"icmp"));
        assert!(kinds.contains(&"br"));
        assert!(kinds.iter().filter(|&&k| k == "jump").count() >= 2);
    }

    #[test]
    fn for_loop_with_break_lowered() {
        let module = lower(
            "int main() { int i; int s; s = 0; for (i = 0; i < 10; i = i + 1) { if (i == 5) break; s = s + i; } return s; }",
        );
        let main = module.main_function().unwrap();
        let kinds = function_instruction_kinds(&module, main);
        assert!(kinds.contains(&"br"));
        assert!(kinds.contains(&"jump"));
    }

    #[test]
    fn break_outside_loop_still_yields_wellformed_function() {
        let module = lower("int main() { break; return 0; }");
        let main = module.main_function().unwrap();
        let kinds = function_instruction_kinds(&module, main);
        assert_eq!(kinds, vec!["ret"]);
    }

    #[test]
    fn void_function_gets_auto_return() {
        let module = lower("void f() { }\nint main() { f(); return 0; }");
        let f = module.functions()[0];
        let kinds = function_instruction_kinds(&module, f);
        assert_eq!(kinds, vec!["ret"]);
    }

    #[test]
    fn global_array_element_load_uses_gep() {
        let module = lower(
            "const int N = 3;\nint a[4] = {1, 2, 3, 4};\nint main() { return a[N - 1]; }",
        );
        let main = module.main_function().unwrap();
        let kinds = function_instruction_kinds(&module, main);
        assert_eq!(kinds, vec!["gep", "load", "ret"]);
    }

    #[test]
    fn array_argument_decays_to_pointer() {
        let module = lower(
            "int f(int a[]) { return a[0]; }\nint g[4];\nint main() { return f(g); }",
        );
        let main = module.main_function().unwrap();
        let kinds = function_instruction_kinds(&module, main);
        // g decays via gep [0, 0] before the call.
        assert_eq!(kinds, vec!["gep", "call", "ret"]);

        let f = module.functions()[0];
        let f_kinds = function_instruction_kinds(&module, f);
        // Param spill, pointer reload, index, load, ret.
        assert_eq!(
            f_kinds,
            vec!["alloca", "store", "load", "gep", "load", "ret"]
        );
    }

    #[test]
    fn local_array_initializer_stores_elements() {
        let module = lower("int main() { int a[3] = {7, 8, 9}; return a[1]; }");
        let main = module.main_function().unwrap();
        let kinds = function_instruction_kinds(&module, main);
        let stores = kinds.iter().filter(|&&k| k == "store").count();
        assert_eq!(stores, 3);
    }
}
