// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The IR module: globals, strings, and functions over one [`Context`].

use ecow::{eco_format, EcoString};

use super::{Context, ValueId};

/// A compiled module. Owns its [`Context`] and the top-level value lists.
#[derive(Debug)]
pub struct Module {
    name: EcoString,
    context: Context,
    global_variables: Vec<ValueId>,
    global_strings: Vec<ValueId>,
    functions: Vec<ValueId>,
    main_function: Option<ValueId>,
}

impl Module {
    /// Creates an empty module.
    #[must_use]
    pub fn new(name: impl Into<EcoString>) -> Self {
        Self {
            name: name.into(),
            context: Context::new(),
            global_variables: Vec::new(),
            global_strings: Vec::new(),
            functions: Vec::new(),
            main_function: None,
        }
    }

    /// The module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning context.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Mutable access to the owning context.
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Registers a global variable.
    pub fn add_global_variable(&mut self, value: ValueId) {
        self.global_variables.push(value);
    }

    /// Creates and registers a private string constant, assigning the
    /// next `.str` / `.str.N` name.
    pub fn add_global_string(&mut self, value: impl Into<EcoString>) -> ValueId {
        let name = if self.global_strings.is_empty() {
            EcoString::from(".str")
        } else {
            eco_format!(".str.{}", self.global_strings.len())
        };
        let string = self.context.create_global_string(name, value);
        self.global_strings.push(string);
        string
    }

    /// Registers a function.
    pub fn add_function(&mut self, function: ValueId) {
        self.functions.push(function);
    }

    /// Registers the designated `main` function (also listed in
    /// [`Module::functions`]).
    pub fn set_main_function(&mut self, function: ValueId) {
        self.main_function = Some(function);
    }

    /// Global variables, in definition order.
    #[must_use]
    pub fn global_variables(&self) -> &[ValueId] {
        &self.global_variables
    }

    /// String constants, in creation order.
    #[must_use]
    pub fn global_strings(&self) -> &[ValueId] {
        &self.global_strings
    }

    /// Functions, in definition order (`main` last).
    #[must_use]
    pub fn functions(&self) -> &[ValueId] {
        &self.functions
    }

    /// The designated entry function, if generation produced one.
    #[must_use]
    pub fn main_function(&self) -> Option<ValueId> {
        self.main_function
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ValueKind;

    #[test]
    fn string_names_are_sequential() {
        let mut module = Module::new("test");
        let a = module.add_global_string("x=");
        let b = module.add_global_string("\n");
        let c = module.add_global_string("done");

        let name = |v: ValueId| module.context().value(v).name.clone().unwrap();
        assert_eq!(name(a), ".str");
        assert_eq!(name(b), ".str.1");
        assert_eq!(name(c), ".str.2");
    }

    #[test]
    fn string_type_counts_nul_terminator() {
        let mut module = Module::new("test");
        let s = module.add_global_string("x=");
        let ty = module.context().value(s).ty;
        let pointee = module.context().pointee(ty).unwrap();
        match module.context().type_kind(pointee) {
            crate::ir::TypeKind::Array { count, .. } => assert_eq!(*count, 3),
            other => panic!("expected array type, got {other:?}"),
        }
    }

    #[test]
    fn module_lists_functions_in_order() {
        let mut module = Module::new("test");
        let i32_ty = module.context().int32_type();
        let fn_ty = module.context_mut().function_type(i32_ty, Vec::new());
        let f = module.context_mut().create_function("f", fn_ty);
        let main = module.context_mut().create_function("main", fn_ty);
        module.add_function(f);
        module.add_function(main);
        module.set_main_function(main);

        assert_eq!(module.functions(), &[f, main]);
        assert_eq!(module.main_function(), Some(main));
        assert!(matches!(
            module.context().value(f).kind,
            ValueKind::Function { .. }
        ));
    }
}
