// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The scoped symbol table.
//!
//! **DDD Context:** Semantic Analysis
//!
//! Scopes form a tree of blocks rooted at the global scope. Each block
//! holds an ordered list of [`SymbolEntry`] values; lookup walks the
//! block chain to the root, insertion always lands in the requested
//! block. A duplicate name within one block is an error surfaced to the
//! caller.
//!
//! The analyzer attaches the [`BlockId`] of every scope-introducing
//! syntax node to that node's attributes, which is how the generator
//! later recovers the right scope for a name use.

use ecow::EcoString;

/// Maximum supported array dimension.
pub const MAX_ARRAY_DIMENSION: usize = 2;

/// A handle to a scope block inside a [`SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(u32);

impl BlockId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// The category of a value in the source language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Any,
    Void,
    Int,
    Char,
    Bool,
    Array,
}

/// A mutable variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableEntry {
    pub name: EcoString,
    pub value_type: ValueType,
    /// 0 for scalars, 1 or 2 for arrays.
    pub dim: i32,
    /// Array extents; `size[1]` is meaningful only when `dim == 2`.
    pub size: [i32; MAX_ARRAY_DIMENSION],
}

/// A compile-time constant, with its folded value(s).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantEntry {
    pub name: EcoString,
    pub value_type: ValueType,
    pub dim: i32,
    pub size: [i32; MAX_ARRAY_DIMENSION],
    /// Scalar value, meaningful when `dim == 0`.
    pub value: i32,
    /// Array values: one row when `dim == 1`, `size[0]` rows when
    /// `dim == 2`.
    pub values: Vec<Vec<i32>>,
}

impl ConstantEntry {
    /// The element value at a literal index chain, if in range.
    #[must_use]
    pub fn element(&self, indices: &[i32]) -> Option<i32> {
        match (self.dim, indices) {
            (0, []) => Some(self.value),
            (1, [i]) => self.values.first()?.get(usize::try_from(*i).ok()?).copied(),
            (2, [i, j]) => self
                .values
                .get(usize::try_from(*i).ok()?)?
                .get(usize::try_from(*j).ok()?)
                .copied(),
            _ => None,
        }
    }
}

/// One formal parameter of a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionParam {
    pub value_type: ValueType,
    pub name: EcoString,
    pub dim: i32,
    pub size: [i32; MAX_ARRAY_DIMENSION],
}

/// A function signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionEntry {
    pub name: EcoString,
    pub return_type: ValueType,
    pub params: Vec<FunctionParam>,
}

/// One named entity in a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolEntry {
    Variable(VariableEntry),
    Constant(ConstantEntry),
    Function(FunctionEntry),
}

impl SymbolEntry {
    /// The entry's name.
    #[must_use]
    pub fn name(&self) -> &EcoString {
        match self {
            Self::Variable(v) => &v.name,
            Self::Constant(c) => &c.name,
            Self::Function(f) => &f.name,
        }
    }

    /// The array dimension for data entries; 0 for functions.
    #[must_use]
    pub fn dim(&self) -> i32 {
        match self {
            Self::Variable(v) => v.dim,
            Self::Constant(c) => c.dim,
            Self::Function(_) => 0,
        }
    }

    /// Returns `true` for constants.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        matches!(self, Self::Constant(_))
    }
}

/// Raised when an insertion collides with an existing name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("duplicate identifier '{name}' in the same scope")]
pub struct DuplicateSymbol {
    /// The colliding name.
    pub name: EcoString,
}

#[derive(Debug, Default)]
struct BlockData {
    parent: Option<BlockId>,
    children: Vec<BlockId>,
    entries: Vec<SymbolEntry>,
}

/// The scope tree. The root (global) block exists from construction.
#[derive(Debug)]
pub struct SymbolTable {
    blocks: Vec<BlockData>,
}

impl SymbolTable {
    /// Creates a table holding only the global scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocks: vec![BlockData::default()],
        }
    }

    /// The global scope.
    #[must_use]
    pub fn root(&self) -> BlockId {
        BlockId(0)
    }

    /// Opens a child scope under `parent`.
    pub fn new_block(&mut self, parent: BlockId) -> BlockId {
        let id = BlockId(u32::try_from(self.blocks.len()).expect("symbol table block limit"));
        self.blocks.push(BlockData {
            parent: Some(parent),
            children: Vec::new(),
            entries: Vec::new(),
        });
        self.blocks[parent.index()].children.push(id);
        id
    }

    /// The parent scope, if `block` is not the root.
    #[must_use]
    pub fn parent(&self, block: BlockId) -> Option<BlockId> {
        self.blocks[block.index()].parent
    }

    /// The child scopes of `block`, in creation order.
    #[must_use]
    pub fn children(&self, block: BlockId) -> &[BlockId] {
        &self.blocks[block.index()].children
    }

    /// Inserts an entry into `block`, rejecting duplicates in that block.
    pub fn insert(&mut self, block: BlockId, entry: SymbolEntry) -> Result<(), DuplicateSymbol> {
        if self.find_local(block, entry.name()).is_some() {
            return Err(DuplicateSymbol {
                name: entry.name().clone(),
            });
        }
        self.blocks[block.index()].entries.push(entry);
        Ok(())
    }

    /// Finds an entry in `block` only.
    #[must_use]
    pub fn find_local(&self, block: BlockId, name: &str) -> Option<&SymbolEntry> {
        self.blocks[block.index()]
            .entries
            .iter()
            .find(|e| e.name() == name)
    }

    /// Finds an entry in `block` or any enclosing scope.
    #[must_use]
    pub fn find(&self, block: BlockId, name: &str) -> Option<&SymbolEntry> {
        self.find_with_block(block, name).map(|(_, entry)| entry)
    }

    /// Like [`SymbolTable::find`], also naming the defining scope.
    #[must_use]
    pub fn find_with_block(&self, block: BlockId, name: &str) -> Option<(BlockId, &SymbolEntry)> {
        let mut cur = Some(block);
        while let Some(id) = cur {
            if let Some(entry) = self.find_local(id, name) {
                return Some((id, entry));
            }
            cur = self.parent(id);
        }
        None
    }

    /// The entries of `block`, in insertion order.
    #[must_use]
    pub fn entries(&self, block: BlockId) -> &[SymbolEntry] {
        &self.blocks[block.index()].entries
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
