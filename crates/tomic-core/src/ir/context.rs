// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The IR arena and type interner.

use std::collections::HashMap;

use ecow::EcoString;

use super::{
    BinaryOp, ComparePredicate, ConstantValue, TypeId, TypeKind, UnaryOp, UseData, UseId,
    ValueData, ValueId, ValueKind,
};

/// Owns every type, value, and use of one module.
///
/// All creation goes through the factory methods here, which install the
/// object in the arena and wire up def-use edges. Handles returned are
/// valid for the context's lifetime.
#[derive(Debug)]
pub struct Context {
    types: Vec<TypeKind>,
    void_ty: TypeId,
    label_ty: TypeId,
    int1_ty: TypeId,
    int8_ty: TypeId,
    int32_ty: TypeId,
    array_types: HashMap<(TypeId, usize), TypeId>,
    pointer_types: HashMap<TypeId, TypeId>,
    /// Function types are few; equality is checked linearly.
    function_types: Vec<TypeId>,

    values: Vec<ValueData>,
    uses: Vec<UseData>,
}

impl Context {
    /// Creates a context with the singleton types interned.
    #[must_use]
    pub fn new() -> Self {
        let mut context = Self {
            types: Vec::new(),
            void_ty: TypeId(0),
            label_ty: TypeId(0),
            int1_ty: TypeId(0),
            int8_ty: TypeId(0),
            int32_ty: TypeId(0),
            array_types: HashMap::new(),
            pointer_types: HashMap::new(),
            function_types: Vec::new(),
            values: Vec::new(),
            uses: Vec::new(),
        };
        context.void_ty = context.push_type(TypeKind::Void);
        context.label_ty = context.push_type(TypeKind::Label);
        context.int1_ty = context.push_type(TypeKind::Integer { bits: 1 });
        context.int8_ty = context.push_type(TypeKind::Integer { bits: 8 });
        context.int32_ty = context.push_type(TypeKind::Integer { bits: 32 });
        context
    }

    // ========================================================================
    // Types
    // ========================================================================

    fn push_type(&mut self, kind: TypeKind) -> TypeId {
        let id = TypeId(u32::try_from(self.types.len()).expect("type arena limit"));
        self.types.push(kind);
        id
    }

    /// The shape of a type.
    #[must_use]
    pub fn type_kind(&self, ty: TypeId) -> &TypeKind {
        &self.types[ty.index()]
    }

    /// The `void` singleton.
    #[must_use]
    pub fn void_type(&self) -> TypeId {
        self.void_ty
    }

    /// The `label` singleton.
    #[must_use]
    pub fn label_type(&self) -> TypeId {
        self.label_ty
    }

    /// The `i1` singleton.
    #[must_use]
    pub fn int1_type(&self) -> TypeId {
        self.int1_ty
    }

    /// The `i8` singleton.
    #[must_use]
    pub fn int8_type(&self) -> TypeId {
        self.int8_ty
    }

    /// The `i32` singleton.
    #[must_use]
    pub fn int32_type(&self) -> TypeId {
        self.int32_ty
    }

    /// Interns `[count x element]`.
    pub fn array_type(&mut self, element: TypeId, count: usize) -> TypeId {
        if let Some(&existing) = self.array_types.get(&(element, count)) {
            return existing;
        }
        let id = self.push_type(TypeKind::Array { element, count });
        self.array_types.insert((element, count), id);
        id
    }

    /// Interns `pointee*`.
    pub fn pointer_type(&mut self, pointee: TypeId) -> TypeId {
        if let Some(&existing) = self.pointer_types.get(&pointee) {
            return existing;
        }
        let id = self.push_type(TypeKind::Pointer { pointee });
        self.pointer_types.insert(pointee, id);
        id
    }

    /// Interns `return_type (params...)`.
    pub fn function_type(&mut self, return_type: TypeId, params: Vec<TypeId>) -> TypeId {
        for &existing in &self.function_types {
            if let TypeKind::Function {
                return_type: ret,
                params: existing_params,
            } = self.type_kind(existing)
            {
                if *ret == return_type && *existing_params == params {
                    return existing;
                }
            }
        }
        let id = self.push_type(TypeKind::Function {
            return_type,
            params,
        });
        self.function_types.push(id);
        id
    }

    /// The pointed-to type of a pointer type.
    #[must_use]
    pub fn pointee(&self, ty: TypeId) -> Option<TypeId> {
        match self.type_kind(ty) {
            TypeKind::Pointer { pointee } => Some(*pointee),
            _ => None,
        }
    }

    /// Nesting depth of array types: `i32` is 0, `[n x i32]` is 1,
    /// `[n x [m x i32]]` is 2.
    #[must_use]
    pub fn array_depth(&self, ty: TypeId) -> u32 {
        match self.type_kind(ty) {
            TypeKind::Array { element, .. } => 1 + self.array_depth(*element),
            _ => 0,
        }
    }

    // ========================================================================
    // Values & uses
    // ========================================================================

    fn push_value(&mut self, ty: TypeId, name: Option<EcoString>, kind: ValueKind) -> ValueId {
        let id = ValueId(u32::try_from(self.values.len()).expect("value arena limit"));
        self.values.push(ValueData {
            ty,
            name,
            kind,
            operands: Vec::new(),
            users: Vec::new(),
        });
        id
    }

    /// The value record behind a handle.
    #[must_use]
    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.index()]
    }

    /// Mutable access to a value record.
    pub fn value_mut(&mut self, id: ValueId) -> &mut ValueData {
        &mut self.values[id.index()]
    }

    /// The use record behind a handle.
    #[must_use]
    pub fn use_data(&self, id: UseId) -> UseData {
        self.uses[id.index()]
    }

    /// Creates a use edge appending `usee` to `user`'s operand list.
    pub fn add_operand(&mut self, user: ValueId, usee: ValueId) {
        let operand_index = self.values[user.index()].operands.len();
        let id = UseId(u32::try_from(self.uses.len()).expect("use arena limit"));
        self.uses.push(UseData {
            user,
            usee,
            operand_index,
        });
        self.values[user.index()].operands.push(id);
        self.values[usee.index()].users.push(id);
    }

    /// Detaches a use from both endpoints. The record stays in the arena.
    pub fn remove_use(&mut self, id: UseId) {
        let UseData { user, usee, .. } = self.uses[id.index()];
        self.values[user.index()].operands.retain(|&u| u != id);
        self.values[usee.index()].users.retain(|&u| u != id);
    }

    /// The `index`-th operand of `value`.
    #[must_use]
    pub fn operand(&self, value: ValueId, index: usize) -> Option<ValueId> {
        let use_id = self.values[value.index()].operands.get(index)?;
        Some(self.uses[use_id.index()].usee)
    }

    /// All operands of `value`, in order.
    #[must_use]
    pub fn operands(&self, value: ValueId) -> Vec<ValueId> {
        self.values[value.index()]
            .operands
            .iter()
            .map(|u| self.uses[u.index()].usee)
            .collect()
    }

    // ========================================================================
    // Factories
    // ========================================================================

    /// Creates a function with no arguments or blocks yet.
    pub fn create_function(&mut self, name: impl Into<EcoString>, fn_ty: TypeId) -> ValueId {
        self.push_value(
            fn_ty,
            Some(name.into()),
            ValueKind::Function {
                args: Vec::new(),
                blocks: Vec::new(),
            },
        )
    }

    /// Creates a formal argument and registers it on `function`.
    pub fn create_argument(&mut self, function: ValueId, ty: TypeId, index: usize) -> ValueId {
        let arg = self.push_value(ty, None, ValueKind::Argument { index });
        if let ValueKind::Function { args, .. } = &mut self.values[function.index()].kind {
            args.push(arg);
        }
        arg
    }

    /// Creates a basic block and appends it to `function`.
    pub fn create_basic_block(&mut self, function: ValueId) -> ValueId {
        let ty = self.label_ty;
        let block = self.push_value(
            ty,
            None,
            ValueKind::BasicBlock {
                parent: function,
                instructions: Vec::new(),
            },
        );
        if let ValueKind::Function { blocks, .. } = &mut self.values[function.index()].kind {
            blocks.push(block);
        }
        block
    }

    /// Appends an instruction to a basic block.
    pub fn append_instruction(&mut self, block: ValueId, instruction: ValueId) {
        if let ValueKind::BasicBlock { instructions, .. } = &mut self.values[block.index()].kind {
            instructions.push(instruction);
        }
    }

    /// Creates a global variable of type pointer-to-`element`.
    pub fn create_global_variable(
        &mut self,
        name: impl Into<EcoString>,
        element: TypeId,
        is_constant: bool,
        initializer: Option<ConstantValue>,
    ) -> ValueId {
        let ty = self.pointer_type(element);
        self.push_value(
            ty,
            Some(name.into()),
            ValueKind::GlobalVariable {
                is_constant,
                initializer,
            },
        )
    }

    /// Creates a global string of type pointer-to-`[len+1 x i8]`.
    pub fn create_global_string(
        &mut self,
        name: impl Into<EcoString>,
        value: impl Into<EcoString>,
    ) -> ValueId {
        let value = value.into();
        let array = self.array_type(self.int8_ty, value.len() + 1);
        let ty = self.pointer_type(array);
        self.push_value(ty, Some(name.into()), ValueKind::GlobalString { value })
    }

    /// Creates an `i32` scalar constant.
    pub fn create_constant_int(&mut self, value: i32) -> ValueId {
        self.push_value(
            self.int32_ty,
            None,
            ValueKind::ConstantData {
                value: ConstantValue::Int(value),
            },
        )
    }

    /// Creates an `alloca` yielding pointer-to-`allocated`.
    pub fn create_alloca(&mut self, allocated: TypeId) -> ValueId {
        let ty = self.pointer_type(allocated);
        self.push_value(ty, None, ValueKind::Alloca { allocated })
    }

    /// Creates a `load` through `address`.
    pub fn create_load(&mut self, address: ValueId) -> ValueId {
        let ty = self
            .pointee(self.values[address.index()].ty)
            .unwrap_or(self.int32_ty);
        let load = self.push_value(ty, None, ValueKind::Load);
        self.add_operand(load, address);
        load
    }

    /// Creates a `store` of `value` through `address`.
    pub fn create_store(&mut self, value: ValueId, address: ValueId) -> ValueId {
        let store = self.push_value(self.void_ty, None, ValueKind::Store);
        self.add_operand(store, value);
        self.add_operand(store, address);
        store
    }

    /// Creates a binary arithmetic instruction.
    pub fn create_binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let inst = self.push_value(self.int32_ty, None, ValueKind::Binary { op });
        self.add_operand(inst, lhs);
        self.add_operand(inst, rhs);
        inst
    }

    /// Creates a unary arithmetic instruction.
    pub fn create_unary(&mut self, op: UnaryOp, operand: ValueId) -> ValueId {
        let inst = self.push_value(self.int32_ty, None, ValueKind::Unary { op });
        self.add_operand(inst, operand);
        inst
    }

    /// Creates an `icmp` yielding `i1`.
    pub fn create_compare(
        &mut self,
        predicate: ComparePredicate,
        lhs: ValueId,
        rhs: ValueId,
    ) -> ValueId {
        let inst = self.push_value(self.int1_ty, None, ValueKind::Compare { predicate });
        self.add_operand(inst, lhs);
        self.add_operand(inst, rhs);
        inst
    }

    /// Creates a `zext` of `operand` to `to`.
    pub fn create_zext(&mut self, operand: ValueId, to: TypeId) -> ValueId {
        let inst = self.push_value(to, None, ValueKind::ZExt);
        self.add_operand(inst, operand);
        inst
    }

    /// Creates a `getelementptr inbounds` over `address` and `indices`.
    ///
    /// The first index steps the pointer itself; each further index
    /// steps into the pointee's array nesting, as in LLVM.
    pub fn create_gep(&mut self, address: ValueId, indices: Vec<ValueId>) -> ValueId {
        let mut element = self
            .pointee(self.values[address.index()].ty)
            .unwrap_or(self.int32_ty);
        for _ in indices.iter().skip(1) {
            element = match self.type_kind(element) {
                TypeKind::Array { element, .. } => *element,
                _ => element,
            };
        }
        let ty = self.pointer_type(element);
        let inst = self.push_value(ty, None, ValueKind::GetElementPtr);
        self.add_operand(inst, address);
        for index in indices {
            self.add_operand(inst, index);
        }
        inst
    }

    /// Creates a conditional branch.
    pub fn create_branch(
        &mut self,
        condition: ValueId,
        then_block: ValueId,
        else_block: ValueId,
    ) -> ValueId {
        let inst = self.push_value(self.void_ty, None, ValueKind::Branch);
        self.add_operand(inst, condition);
        self.add_operand(inst, then_block);
        self.add_operand(inst, else_block);
        inst
    }

    /// Creates an unconditional branch.
    pub fn create_jump(&mut self, target: ValueId) -> ValueId {
        let inst = self.push_value(self.void_ty, None, ValueKind::Jump);
        self.add_operand(inst, target);
        inst
    }

    /// Creates a `ret` with an optional value.
    pub fn create_return(&mut self, value: Option<ValueId>) -> ValueId {
        let inst = self.push_value(self.void_ty, None, ValueKind::Return);
        if let Some(value) = value {
            self.add_operand(inst, value);
        }
        inst
    }

    /// Creates a call. The value's type is the callee's return type.
    pub fn create_call(&mut self, callee: ValueId, args: Vec<ValueId>) -> ValueId {
        let ty = match self.type_kind(self.values[callee.index()].ty) {
            TypeKind::Function { return_type, .. } => *return_type,
            _ => self.void_ty,
        };
        let inst = self.push_value(ty, None, ValueKind::Call { callee });
        for arg in args {
            self.add_operand(inst, arg);
        }
        inst
    }

    /// Creates the `getint` input call.
    pub fn create_input(&mut self) -> ValueId {
        self.push_value(self.int32_ty, Some("getint".into()), ValueKind::Input)
    }

    /// Creates a `putint`/`putstr` output call for `value`.
    pub fn create_output(&mut self, value: ValueId) -> ValueId {
        let symbol = if matches!(
            self.values[value.index()].kind,
            ValueKind::GlobalString { .. }
        ) {
            "putstr"
        } else {
            "putint"
        };
        let inst = self.push_value(self.void_ty, Some(symbol.into()), ValueKind::Output);
        self.add_operand(inst, value);
        inst
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singleton_types_are_interned() {
        let ctx = Context::new();
        assert_eq!(ctx.type_kind(ctx.int32_type()), &TypeKind::Integer { bits: 32 });
        assert_eq!(ctx.type_kind(ctx.int8_type()), &TypeKind::Integer { bits: 8 });
        assert!(ctx.type_kind(ctx.void_type()).is_void());
    }

    #[test]
    fn structurally_equal_types_are_identical() {
        let mut ctx = Context::new();
        let i32_ty = ctx.int32_type();

        let a = ctx.array_type(i32_ty, 4);
        let b = ctx.array_type(i32_ty, 4);
        assert_eq!(a, b);

        let pa = ctx.pointer_type(a);
        let pb = ctx.pointer_type(b);
        assert_eq!(pa, pb);

        let fa = ctx.function_type(i32_ty, vec![i32_ty, pa]);
        let fb = ctx.function_type(i32_ty, vec![i32_ty, pb]);
        assert_eq!(fa, fb);

        let different = ctx.array_type(i32_ty, 5);
        assert_ne!(a, different);
    }

    #[test]
    fn nested_type_construction() {
        let mut ctx = Context::new();
        let i32_ty = ctx.int32_type();
        let row = ctx.array_type(i32_ty, 3);
        let grid = ctx.array_type(row, 2);

        assert_eq!(ctx.array_depth(grid), 2);
        assert_eq!(ctx.array_depth(row), 1);
        assert_eq!(ctx.array_depth(i32_ty), 0);

        let ptr = ctx.pointer_type(grid);
        assert_eq!(ctx.pointee(ptr), Some(grid));
    }

    #[test]
    fn use_edges_link_both_endpoints() {
        let mut ctx = Context::new();
        let i32_ty = ctx.int32_type();
        let slot = ctx.create_alloca(i32_ty);
        let value = ctx.create_constant_int(7);
        let store = ctx.create_store(value, slot);

        assert_eq!(ctx.operand(store, 0), Some(value));
        assert_eq!(ctx.operand(store, 1), Some(slot));
        assert_eq!(ctx.value(slot).users.len(), 1);
        assert_eq!(ctx.value(value).users.len(), 1);

        let use_id = ctx.value(store).operands[0];
        let edge = ctx.use_data(use_id);
        assert_eq!(edge.user, store);
        assert_eq!(edge.usee, value);
        assert_eq!(edge.operand_index, 0);
    }

    #[test]
    fn remove_use_detaches_both_endpoints() {
        let mut ctx = Context::new();
        let i32_ty = ctx.int32_type();
        let slot = ctx.create_alloca(i32_ty);
        let load = ctx.create_load(slot);

        let use_id = ctx.value(load).operands[0];
        ctx.remove_use(use_id);
        assert!(ctx.value(load).operands.is_empty());
        assert!(ctx.value(slot).users.is_empty());
    }

    #[test]
    fn load_resolves_pointee_type() {
        let mut ctx = Context::new();
        let i32_ty = ctx.int32_type();
        let slot = ctx.create_alloca(i32_ty);
        let load = ctx.create_load(slot);
        assert_eq!(ctx.value(load).ty, i32_ty);
    }

    #[test]
    fn gep_peels_array_nesting() {
        let mut ctx = Context::new();
        let i32_ty = ctx.int32_type();
        let row = ctx.array_type(i32_ty, 4);
        let base = ctx.create_alloca(row);

        let zero = ctx.create_constant_int(0);
        let two = ctx.create_constant_int(2);
        let element = ctx.create_gep(base, vec![zero, two]);

        let expected = ctx.pointer_type(i32_ty);
        assert_eq!(ctx.value(element).ty, expected);
    }

    #[test]
    fn call_takes_return_type() {
        let mut ctx = Context::new();
        let i32_ty = ctx.int32_type();
        let fn_ty = ctx.function_type(i32_ty, vec![i32_ty]);
        let callee = ctx.create_function("f", fn_ty);
        let arg = ctx.create_constant_int(1);
        let call = ctx.create_call(callee, vec![arg]);
        assert_eq!(ctx.value(call).ty, i32_ty);
    }

    #[test]
    fn output_symbol_depends_on_operand() {
        let mut ctx = Context::new();
        let s = ctx.create_global_string(".str", "hi");
        let out_str = ctx.create_output(s);
        assert_eq!(ctx.value(out_str).name.as_deref(), Some("putstr"));

        let n = ctx.create_constant_int(1);
        let out_int = ctx.create_output(n);
        assert_eq!(ctx.value(out_int).name.as_deref(), Some("putint"));
    }
}
