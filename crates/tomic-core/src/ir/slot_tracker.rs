// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Per-function value numbering for printing.
//!
//! Unnamed values get sequential integers in program order, the LLVM
//! way: arguments first, then each basic block (the entry block takes a
//! number but its label is never printed) interleaved with the non-void
//! instructions it contains. Numbers are contiguous within a function
//! and independent of other functions.

use std::collections::HashMap;

use super::{Context, ValueId, ValueKind};

/// The slot assignment of one function.
///
/// Populated by a single pre-print walk ([`SlotTracker::trace`]); read
/// only afterwards.
#[derive(Debug, Default)]
pub struct SlotTracker {
    slots: HashMap<ValueId, usize>,
}

impl SlotTracker {
    /// Numbers every slot-taking value of `function`.
    #[must_use]
    pub fn trace(context: &Context, function: ValueId) -> Self {
        let mut tracker = Self::default();
        let mut next = 0usize;

        let ValueKind::Function { args, blocks } = &context.value(function).kind else {
            return tracker;
        };

        for &arg in args {
            tracker.slots.insert(arg, next);
            next += 1;
        }

        for &block in blocks {
            tracker.slots.insert(block, next);
            next += 1;

            let ValueKind::BasicBlock { instructions, .. } = &context.value(block).kind else {
                continue;
            };
            for &inst in instructions {
                if !context.type_kind(context.value(inst).ty).is_void() {
                    tracker.slots.insert(inst, next);
                    next += 1;
                }
            }
        }

        tracker
    }

    /// The slot of a value, if it takes one.
    #[must_use]
    pub fn slot(&self, value: ValueId) -> Option<usize> {
        self.slots.get(&value).copied()
    }

    /// The number of slots assigned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if nothing was assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_follow_program_order() {
        let mut ctx = Context::new();
        let i32_ty = ctx.int32_type();
        let fn_ty = ctx.function_type(i32_ty, vec![i32_ty, i32_ty]);
        let function = ctx.create_function("f", fn_ty);
        let a = ctx.create_argument(function, i32_ty, 0);
        let b = ctx.create_argument(function, i32_ty, 1);
        let entry = ctx.create_basic_block(function);

        let slot_a = ctx.create_alloca(i32_ty);
        let slot_b = ctx.create_alloca(i32_ty);
        let store_a = ctx.create_store(a, slot_a);
        let store_b = ctx.create_store(b, slot_b);
        let load_a = ctx.create_load(slot_a);
        for inst in [slot_a, slot_b, store_a, store_b, load_a] {
            ctx.append_instruction(entry, inst);
        }

        let tracker = SlotTracker::trace(&ctx, function);
        assert_eq!(tracker.slot(a), Some(0));
        assert_eq!(tracker.slot(b), Some(1));
        assert_eq!(tracker.slot(entry), Some(2)); // never printed
        assert_eq!(tracker.slot(slot_a), Some(3));
        assert_eq!(tracker.slot(slot_b), Some(4));
        assert_eq!(tracker.slot(load_a), Some(5));
        // Void instructions take no slot.
        assert_eq!(tracker.slot(store_a), None);
        assert_eq!(tracker.slot(store_b), None);
    }

    /// Slot numbers form a contiguous `0..N` prefix and are stable
    /// across re-traces.
    #[test]
    fn slots_are_contiguous_and_stable() {
        let mut ctx = Context::new();
        let i32_ty = ctx.int32_type();
        let fn_ty = ctx.function_type(i32_ty, Vec::new());
        let function = ctx.create_function("main", fn_ty);
        let entry = ctx.create_basic_block(function);

        let slot = ctx.create_alloca(i32_ty);
        let input = ctx.create_input();
        let store = ctx.create_store(input, slot);
        let load = ctx.create_load(slot);
        let ret = ctx.create_return(Some(load));
        for inst in [slot, input, store, load, ret] {
            ctx.append_instruction(entry, inst);
        }

        let first = SlotTracker::trace(&ctx, function);
        let mut seen: Vec<usize> = [entry, slot, input, load]
            .iter()
            .map(|&v| first.slot(v).unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);

        let second = SlotTracker::trace(&ctx, function);
        for value in [entry, slot, input, load] {
            assert_eq!(first.slot(value), second.slot(value));
        }
    }
}
