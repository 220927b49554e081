// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Textual IR emission.
//!
//! Renders a [`Module`] as LLVM-compatible text. Printing never mutates
//! the module: each function's [`SlotTracker`] is populated in a single
//! pre-print walk and read-only afterwards.
//!
//! Naming rules: globals print as `@name`, slot-numbered locals as `%N`.
//! Operand uses print as `type name`; bare operand positions (binary
//! arithmetic) print just the name, with scalar constants appearing as
//! their literal value.

use std::fmt::{self, Write};

use crate::ir::{
    BinaryOp, ConstantValue, Context, Module, SlotTracker, TypeId, TypeKind, UnaryOp, ValueId,
    ValueKind,
};

/// Renders the whole module to a string.
#[must_use]
pub fn print_module(module: &Module) -> String {
    let mut out = String::new();
    write_module(module, &mut out).expect("string formatting cannot fail");
    out
}

/// Writes the whole module: global variables, string constants, then
/// functions in definition order.
pub fn write_module(module: &Module, w: &mut impl Write) -> fmt::Result {
    let ctx = module.context();

    for &global in module.global_variables() {
        write_global_variable(ctx, global, w)?;
    }
    for &string in module.global_strings() {
        write_global_string(ctx, string, w)?;
    }
    for &function in module.functions() {
        write_function(ctx, function, w)?;
    }
    Ok(())
}

/// The textual form of a type.
fn type_string(ctx: &Context, ty: TypeId) -> String {
    match ctx.type_kind(ty) {
        TypeKind::Void => "void".to_string(),
        TypeKind::Label => "label".to_string(),
        TypeKind::Integer { bits } => format!("i{bits}"),
        TypeKind::Pointer { pointee } => format!("{}*", type_string(ctx, *pointee)),
        TypeKind::Array { element, count } => {
            format!("[{count} x {}]", type_string(ctx, *element))
        }
        TypeKind::Function {
            return_type,
            params,
        } => {
            let params: Vec<String> = params.iter().map(|&p| type_string(ctx, p)).collect();
            format!("{} ({})", type_string(ctx, *return_type), params.join(", "))
        }
    }
}

/// The bare name of a value: `@global`, `%N`, or a literal constant.
fn name_string(ctx: &Context, tracker: &SlotTracker, value: ValueId) -> String {
    let data = ctx.value(value);
    match &data.kind {
        ValueKind::ConstantData {
            value: ConstantValue::Int(v),
        } => v.to_string(),
        ValueKind::GlobalVariable { .. }
        | ValueKind::GlobalString { .. }
        | ValueKind::Function { .. } => {
            format!("@{}", data.name.as_deref().unwrap_or(""))
        }
        _ => match tracker.slot(value) {
            Some(slot) => format!("%{slot}"),
            None => data
                .name
                .as_deref()
                .map_or_else(|| "%?".to_string(), |n| format!("%{n}")),
        },
    }
}

/// A full operand use: `type name`.
fn use_string(ctx: &Context, tracker: &SlotTracker, value: ValueId) -> String {
    format!(
        "{} {}",
        type_string(ctx, ctx.value(value).ty),
        name_string(ctx, tracker, value)
    )
}

/// `TYPE VALUE` for a folded constant, with all-zero arrays collapsing
/// to `zeroinitializer`.
fn constant_string(ctx: &Context, ty: TypeId, value: &ConstantValue) -> String {
    match value {
        ConstantValue::Int(v) => format!("{} {v}", type_string(ctx, ty)),
        ConstantValue::Array(items) => {
            if value.is_all_zero() {
                return format!("{} zeroinitializer", type_string(ctx, ty));
            }
            let element = match ctx.type_kind(ty) {
                TypeKind::Array { element, .. } => *element,
                _ => ty,
            };
            let rendered: Vec<String> = items
                .iter()
                .map(|item| constant_string(ctx, element, item))
                .collect();
            format!("{} [{}]", type_string(ctx, ty), rendered.join(", "))
        }
    }
}

fn write_global_variable(ctx: &Context, global: ValueId, w: &mut impl Write) -> fmt::Result {
    let data = ctx.value(global);
    let ValueKind::GlobalVariable {
        is_constant,
        initializer,
    } = &data.kind
    else {
        return Ok(());
    };
    let element = ctx.pointee(data.ty).unwrap_or(data.ty);
    let linkage = if *is_constant { "constant" } else { "global" };
    let name = data.name.as_deref().unwrap_or("");

    match initializer {
        Some(value) => writeln!(
            w,
            "@{name} = dso_local {linkage} {}",
            constant_string(ctx, element, value)
        ),
        None if ctx.type_kind(element).is_array() => writeln!(
            w,
            "@{name} = dso_local {linkage} {} zeroinitializer",
            type_string(ctx, element)
        ),
        None => writeln!(
            w,
            "@{name} = dso_local {linkage} {} 0",
            type_string(ctx, element)
        ),
    }
}

// @.str.1 = private unnamed_addr constant [3 x i8] c".\0A\00", align 1
fn write_global_string(ctx: &Context, string: ValueId, w: &mut impl Write) -> fmt::Result {
    let data = ctx.value(string);
    let ValueKind::GlobalString { value } = &data.kind else {
        return Ok(());
    };
    let element = ctx.pointee(data.ty).unwrap_or(data.ty);
    let name = data.name.as_deref().unwrap_or("");

    write!(
        w,
        "@{name} = private unnamed_addr constant {} c\"",
        type_string(ctx, element)
    )?;
    for c in value.chars() {
        if c == '\n' {
            w.write_str("\\0A")?;
        } else {
            w.write_char(c)?;
        }
    }
    writeln!(w, "\\00\", align 1")
}

fn write_function(ctx: &Context, function: ValueId, w: &mut impl Write) -> fmt::Result {
    let data = ctx.value(function);
    let ValueKind::Function { args, blocks } = &data.kind else {
        return Ok(());
    };
    let tracker = SlotTracker::trace(ctx, function);

    let TypeKind::Function { return_type, .. } = ctx.type_kind(data.ty) else {
        return Ok(());
    };

    writeln!(w)?;
    writeln!(w, "; Function type: {}", type_string(ctx, data.ty))?;
    write!(
        w,
        "define dso_local {} @{}(",
        type_string(ctx, *return_type),
        data.name.as_deref().unwrap_or("")
    )?;
    for (index, &arg) in args.iter().enumerate() {
        if index > 0 {
            w.write_str(", ")?;
        }
        write!(w, "{}", use_string(ctx, &tracker, arg))?;
    }
    writeln!(w, ") {{")?;

    for (index, &block) in blocks.iter().enumerate() {
        if index > 0 {
            let slot = tracker.slot(block).unwrap_or(0);
            writeln!(w, "{slot}:")?;
        }
        let ValueKind::BasicBlock { instructions, .. } = &ctx.value(block).kind else {
            continue;
        };
        for &inst in instructions {
            w.write_str("    ")?;
            write_instruction(ctx, &tracker, inst, w)?;
        }
    }

    writeln!(w, "}}")
}

fn write_instruction(
    ctx: &Context,
    tracker: &SlotTracker,
    inst: ValueId,
    w: &mut impl Write,
) -> fmt::Result {
    let data = ctx.value(inst);
    let name = |v: ValueId| name_string(ctx, tracker, v);
    let uses = |v: ValueId| use_string(ctx, tracker, v);

    match &data.kind {
        // %1 = alloca i32
        ValueKind::Alloca { allocated } => {
            writeln!(w, "{} = alloca {}", name(inst), type_string(ctx, *allocated))
        }
        // %3 = load i32, i32* %1
        ValueKind::Load => {
            let address = ctx.operand(inst, 0).expect("load address");
            writeln!(
                w,
                "{} = load {}, {}",
                name(inst),
                type_string(ctx, data.ty),
                uses(address)
            )
        }
        // store i32 1, i32* %3
        ValueKind::Store => {
            let value = ctx.operand(inst, 0).expect("store value");
            let address = ctx.operand(inst, 1).expect("store address");
            writeln!(w, "store {}, {}", uses(value), uses(address))
        }
        // %11 = add nsw i32 %9, %10
        ValueKind::Binary { op } => {
            let mnemonic = match op {
                BinaryOp::Add => "add nsw",
                BinaryOp::Sub => "sub nsw",
                BinaryOp::Mul => "mul nsw",
                BinaryOp::Div => "sdiv",
                BinaryOp::Mod => "srem",
            };
            let lhs = ctx.operand(inst, 0).expect("binary lhs");
            let rhs = ctx.operand(inst, 1).expect("binary rhs");
            writeln!(
                w,
                "{} = {mnemonic} {} {}, {}",
                name(inst),
                type_string(ctx, data.ty),
                name(lhs),
                name(rhs)
            )
        }
        // %2 = sub nsw i32 0, %1
        ValueKind::Unary { op } => {
            let mnemonic = match op {
                UnaryOp::Neg => "sub nsw",
                _ => "add nsw",
            };
            let operand = ctx.operand(inst, 0).expect("unary operand");
            writeln!(
                w,
                "{} = {mnemonic} {} 0, {}",
                name(inst),
                type_string(ctx, data.ty),
                name(operand)
            )
        }
        // %5 = icmp slt i32 %3, %4
        ValueKind::Compare { predicate } => {
            let lhs = ctx.operand(inst, 0).expect("compare lhs");
            let rhs = ctx.operand(inst, 1).expect("compare rhs");
            writeln!(
                w,
                "{} = icmp {} {} {}, {}",
                name(inst),
                predicate.mnemonic(),
                type_string(ctx, ctx.value(lhs).ty),
                name(lhs),
                name(rhs)
            )
        }
        // %6 = zext i1 %5 to i32
        ValueKind::ZExt => {
            let operand = ctx.operand(inst, 0).expect("zext operand");
            writeln!(
                w,
                "{} = zext {} to {}",
                name(inst),
                uses(operand),
                type_string(ctx, data.ty)
            )
        }
        // %4 = getelementptr inbounds [4 x i32], [4 x i32]* @a, i64 0, i64 2
        ValueKind::GetElementPtr => {
            let operands = ctx.operands(inst);
            let address = operands[0];
            let pointee = ctx.pointee(ctx.value(address).ty).unwrap_or(data.ty);
            write!(
                w,
                "{} = getelementptr inbounds {}, {}",
                name(inst),
                type_string(ctx, pointee),
                uses(address)
            )?;
            for &index in &operands[1..] {
                if matches!(ctx.value(index).kind, ValueKind::ConstantData { .. }) {
                    write!(w, ", i64 {}", name(index))?;
                } else {
                    write!(w, ", {}", uses(index))?;
                }
            }
            writeln!(w)
        }
        // br i1 %5, label %6, label %7
        ValueKind::Branch => {
            let condition = ctx.operand(inst, 0).expect("branch condition");
            let then_block = ctx.operand(inst, 1).expect("branch target");
            let else_block = ctx.operand(inst, 2).expect("branch target");
            writeln!(
                w,
                "br {}, label {}, label {}",
                uses(condition),
                name(then_block),
                name(else_block)
            )
        }
        // br label %6
        ValueKind::Jump => {
            let target = ctx.operand(inst, 0).expect("jump target");
            writeln!(w, "br label {}", name(target))
        }
        // ret i32 0 | ret void
        ValueKind::Return => match ctx.operand(inst, 0) {
            Some(value) => writeln!(w, "ret {}", uses(value)),
            None => writeln!(w, "ret void"),
        },
        // %6 = call i32 @f(i32 %4, i32 %5)
        ValueKind::Call { callee } => {
            if !ctx.type_kind(data.ty).is_void() {
                write!(w, "{} = ", name(inst))?;
            }
            write!(
                w,
                "call {} @{}(",
                type_string(ctx, data.ty),
                ctx.value(*callee).name.as_deref().unwrap_or("")
            )?;
            for (index, arg) in ctx.operands(inst).into_iter().enumerate() {
                if index > 0 {
                    w.write_str(", ")?;
                }
                write!(w, "{}", uses(arg))?;
            }
            writeln!(w, ")")
        }
        // %2 = call i32 @getint()
        ValueKind::Input => {
            writeln!(
                w,
                "{} = call {} @{}()",
                name(inst),
                type_string(ctx, data.ty),
                data.name.as_deref().unwrap_or("getint")
            )
        }
        // call void @putint(i32 %3)
        // call void @putstr(i8* getelementptr inbounds ([3 x i8], [3 x i8]* @.str, i64 0, i64 0))
        ValueKind::Output => {
            let value = ctx.operand(inst, 0).expect("output value");
            write!(
                w,
                "call void @{}(",
                data.name.as_deref().unwrap_or("putint")
            )?;
            if matches!(ctx.value(value).kind, ValueKind::GlobalString { .. }) {
                let element = ctx
                    .pointee(ctx.value(value).ty)
                    .unwrap_or(ctx.value(value).ty);
                write!(
                    w,
                    "i8* getelementptr inbounds ({}, {}, i64 0, i64 0)",
                    type_string(ctx, element),
                    uses(value)
                )?;
            } else {
                write!(w, "{}", uses(value))?;
            }
            writeln!(w, ")")
        }
        // Non-instruction kinds never appear inside a block.
        _ => Ok(()),
    }
}
