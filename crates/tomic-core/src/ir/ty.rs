// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! IR types.
//!
//! Types are immutable once created and always obtained through the
//! [`Context`](super::Context) interner, never constructed directly.

/// A handle to an interned type.
///
/// Because types are interned, `TypeId` equality is structural equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub(super) u32);

impl TypeId {
    pub(super) fn index(self) -> usize {
        self.0 as usize
    }
}

/// The shape of an IR type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    /// `void`
    Void,
    /// `label`, the type of basic blocks.
    Label,
    /// `iN`; the context interns the 1, 8 and 32 bit widths.
    Integer {
        /// Bit width.
        bits: u32,
    },
    /// `T*`
    Pointer {
        /// The pointed-to type.
        pointee: TypeId,
    },
    /// `[N x T]`
    Array {
        /// Element type.
        element: TypeId,
        /// Element count.
        count: usize,
    },
    /// `R (P0, P1, ...)`
    Function {
        /// Return type.
        return_type: TypeId,
        /// Parameter types, in order.
        params: Vec<TypeId>,
    },
}

impl TypeKind {
    /// Returns `true` for the void type.
    #[must_use]
    pub const fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    /// Returns `true` for array types.
    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array { .. })
    }

    /// Returns `true` for pointer types.
    #[must_use]
    pub const fn is_pointer(&self) -> bool {
        matches!(self, Self::Pointer { .. })
    }
}
