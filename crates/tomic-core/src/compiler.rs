// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The compile pipeline.
//!
//! A strict sequence over one source program: preprocess → lex/parse →
//! fold right recursion → analyze → render (tree or IR). Each pass
//! consumes the previous pass's output; compile errors accumulate in one
//! [`ErrorLog`] that is dumped after the full pipeline.

use tracing::{debug, error};

use crate::ast_printer::{self, AstFormat};
use crate::codegen;
use crate::diagnostics::{CompileError, ErrorLog};
use crate::semantic_analysis;
use crate::source_analysis::transform::RightRecursiveTransformer;
use crate::source_analysis::{parse, Preprocessor};

/// What the compiler should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    /// The syntax tree in the standard line format (`.ast`).
    Ast,
    /// The syntax tree as XML (`.xml`).
    Xml,
    /// The syntax tree as JSON (`.json`).
    Json,
    /// Textual LLVM-style IR (anything else).
    #[default]
    Ir,
}

impl OutputKind {
    /// Selects the output kind from a file extension (without the dot).
    #[must_use]
    pub fn from_extension(extension: &str) -> Self {
        match extension {
            "ast" => Self::Ast,
            "xml" => Self::Xml,
            "json" => Self::Json,
            _ => Self::Ir,
        }
    }
}

/// Pipeline configuration, passed explicitly to [`compile`].
#[derive(Debug, Clone, Default)]
pub struct CompilerOptions {
    /// The requested rendering.
    pub output: OutputKind,
}

/// The outcome of one pipeline run.
#[derive(Debug)]
pub struct CompileResult {
    /// The rendered output; `None` when parsing failed fatally.
    pub output: Option<String>,
    /// All compile errors, sorted by `(line, column, kind)`.
    pub errors: Vec<CompileError>,
    /// The formatted error log.
    pub error_report: String,
}

impl CompileResult {
    /// Returns `true` if the run produced no compile errors.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Compiles one source program.
#[must_use]
pub fn compile(source: &str, module_name: &str, options: &CompilerOptions) -> CompileResult {
    let errors = ErrorLog::new();

    let preprocessed = Preprocessor::new().process(source);
    debug!(bytes = preprocessed.len(), "preprocessed source");

    let Some(mut tree) = parse(&preprocessed, &errors) else {
        error!("syntactic parse failed");
        return CompileResult {
            output: None,
            errors: errors.sorted_entries(),
            error_report: errors.dump(),
        };
    };

    RightRecursiveTransformer::new().transform(&mut tree);
    let table = semantic_analysis::analyze(&mut tree, &errors);

    let output = match options.output {
        OutputKind::Ast => ast_printer::print_tree(&tree, AstFormat::Standard),
        OutputKind::Xml => ast_printer::print_tree(&tree, AstFormat::Xml),
        OutputKind::Json => ast_printer::print_tree(&tree, AstFormat::Json),
        OutputKind::Ir => {
            let module = codegen::generate(&tree, &table, module_name);
            codegen::print_module(&module)
        }
    };

    CompileResult {
        output: Some(output),
        errors: errors.sorted_entries(),
        error_report: errors.dump(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CompileErrorKind;

    fn ir_options() -> CompilerOptions {
        CompilerOptions {
            output: OutputKind::Ir,
        }
    }

    #[test]
    fn output_kind_from_extension() {
        assert_eq!(OutputKind::from_extension("ast"), OutputKind::Ast);
        assert_eq!(OutputKind::from_extension("xml"), OutputKind::Xml);
        assert_eq!(OutputKind::from_extension("json"), OutputKind::Json);
        assert_eq!(OutputKind::from_extension("ll"), OutputKind::Ir);
        assert_eq!(OutputKind::from_extension(""), OutputKind::Ir);
    }

    #[test]
    fn clean_compile_to_ir() {
        let result = compile("int main() { return 0; }", "test", &ir_options());
        assert!(result.is_clean());
        let output = result.output.expect("output");
        assert!(output.contains("define dso_local i32 @main()"));
    }

    #[test]
    fn comments_are_stripped_before_lexing() {
        let result = compile(
            "// entry\nint main() { /* answer */ return 42; }",
            "test",
            &ir_options(),
        );
        assert!(result.is_clean(), "{}", result.error_report);
        assert!(result.output.unwrap().contains("ret i32 42"));
    }

    #[test]
    fn missing_semicolon_still_produces_output() {
        let result = compile(
            "int main() { int a = 1\n return a; }",
            "test",
            &ir_options(),
        );
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, CompileErrorKind::MissingSemicolon);
        assert!(result.output.is_some());
        assert!(result
            .error_report
            .starts_with(&format!(
                "Line {}, Column {}: Missing Semicolon",
                result.errors[0].loc.line, result.errors[0].loc.column
            )));
    }

    #[test]
    fn illegal_break_still_emits_wellformed_function() {
        let result = compile("int main() { break; return 0; }", "test", &ir_options());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, CompileErrorKind::IllegalBreak);
        let output = result.output.expect("output");
        assert!(output.contains("define dso_local i32 @main() {"));
        assert!(output.contains("ret i32 0"));
    }

    #[test]
    fn fatal_parse_failure_yields_no_output() {
        let result = compile("void oops", "test", &ir_options());
        assert!(result.output.is_none());
    }

    #[test]
    fn ast_output_renders_tree() {
        let options = CompilerOptions {
            output: OutputKind::Ast,
        };
        let result = compile("int main() { return 0; }", "test", &options);
        assert!(result.output.unwrap().starts_with("<CompUnit>"));
    }
}
