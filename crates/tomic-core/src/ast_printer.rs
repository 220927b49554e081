// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Diagnostic rendering of the syntax tree.
//!
//! Three interchangeable renderers over the same tree walk:
//!
//! - [`AstFormat::Standard`] - the course output format: one
//!   `<NonTerminal>` line per non-terminal on entry, terminals as
//!   `KIND lexeme`.
//! - [`AstFormat::Xml`] - nested tags with two-space indentation,
//!   terminals self-closing with `token=` / `lexeme=` attributes.
//! - [`AstFormat::Json`] - the structurally equivalent object tree.
//!
//! The driver selects the format from the requested output extension.

use std::fmt::Write;

use crate::source_analysis::{NodeId, NodeVariant, SyntaxTree};

/// The tree rendering format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AstFormat {
    /// `<NonTerminal>` lines and `KIND lexeme` terminals.
    #[default]
    Standard,
    /// Indented XML tags.
    Xml,
    /// A JSON object tree.
    Json,
}

/// Renders the tree in the requested format.
#[must_use]
pub fn print_tree(tree: &SyntaxTree, format: AstFormat) -> String {
    let mut out = String::new();
    if let Some(root) = tree.root() {
        match format {
            AstFormat::Standard => print_standard(tree, root, &mut out),
            AstFormat::Xml => print_xml(tree, root, 0, &mut out),
            AstFormat::Json => {
                print_json(tree, root, &mut out);
                out.push('\n');
            }
        }
    }
    out
}

fn print_standard(tree: &SyntaxTree, node: NodeId, out: &mut String) {
    match tree.variant(node) {
        NodeVariant::NonTerminal(kind) => {
            let _ = writeln!(out, "<{}>", kind.description());
            for child in tree.children(node) {
                print_standard(tree, child, out);
            }
        }
        NodeVariant::Terminal(token) => {
            let _ = writeln!(out, "{} {}", token.kind.description(), token.lexeme);
        }
        NodeVariant::Epsilon => {}
    }
}

fn print_xml(tree: &SyntaxTree, node: NodeId, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match tree.variant(node) {
        NodeVariant::NonTerminal(kind) => {
            if tree.has_children(node) {
                let _ = writeln!(out, "{indent}<{}>", kind.description());
                for child in tree.children(node) {
                    print_xml(tree, child, depth + 1, out);
                }
                let _ = writeln!(out, "{indent}</{}>", kind.description());
            } else {
                let _ = writeln!(out, "{indent}<{} />", kind.description());
            }
        }
        NodeVariant::Terminal(token) => {
            let _ = writeln!(
                out,
                "{indent}<Terminal token='{}' lexeme='{}' />",
                token.kind.description(),
                escape(&token.lexeme)
            );
        }
        NodeVariant::Epsilon => {
            let _ = writeln!(out, "{indent}<Epsilon />");
        }
    }
}

fn print_json(tree: &SyntaxTree, node: NodeId, out: &mut String) {
    match tree.variant(node) {
        NodeVariant::NonTerminal(kind) => {
            let _ = write!(out, "{{\"name\": \"{}\", \"children\": [", kind.description());
            let children = tree.children(node);
            for (index, child) in children.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                print_json(tree, *child, out);
            }
            out.push_str("]}");
        }
        NodeVariant::Terminal(token) => {
            let _ = write!(
                out,
                "{{\"token\": \"{}\", \"lexeme\": \"{}\"}}",
                token.kind.description(),
                escape(&token.lexeme)
            );
        }
        NodeVariant::Epsilon => {
            out.push_str("{\"name\": \"Epsilon\"}");
        }
    }
}

/// Escapes quotes, backslashes, and newlines for attribute/string
/// positions.
fn escape(lexeme: &str) -> String {
    let mut out = String::with_capacity(lexeme.len());
    for c in lexeme.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ErrorLog;
    use crate::source_analysis::parse;

    fn tree_for(source: &str) -> SyntaxTree {
        let errors = ErrorLog::new();
        let tree = parse(source, &errors).expect("expected a parse tree");
        assert!(errors.is_empty(), "{}", errors.dump());
        tree
    }

    #[test]
    fn standard_format_lists_nodes_in_order() {
        let tree = tree_for("int main() { return 0; }");
        let out = print_tree(&tree, AstFormat::Standard);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "<CompUnit>");
        assert_eq!(lines[1], "<MainFuncDef>");
        assert_eq!(lines[2], "INTTK int");
        assert_eq!(lines[3], "MAINTK main");
        assert!(out.contains("INTCON 0"));
        assert!(out.contains("SEMICN ;"));
    }

    #[test]
    fn xml_format_nests_and_closes_tags() {
        let tree = tree_for("int main() { return 0; }");
        let out = print_tree(&tree, AstFormat::Xml);
        assert!(out.starts_with("<CompUnit>\n  <MainFuncDef>\n"));
        assert!(out.contains("<Terminal token='MAINTK' lexeme='main' />"));
        assert!(out.trim_end().ends_with("</CompUnit>"));
        // Tags balance.
        assert_eq!(out.matches("<CompUnit>").count(), 1);
        assert_eq!(out.matches("</CompUnit>").count(), 1);
        assert_eq!(out.matches("<Block>").count(), out.matches("</Block>").count());
    }

    #[test]
    fn json_format_is_structurally_equivalent() {
        let tree = tree_for("int main() { return 0; }");
        let out = print_tree(&tree, AstFormat::Json);
        assert!(out.starts_with("{\"name\": \"CompUnit\", \"children\": ["));
        assert!(out.contains("{\"token\": \"MAINTK\", \"lexeme\": \"main\"}"));
        // Balanced braces and brackets.
        assert_eq!(out.matches('{').count(), out.matches('}').count());
        assert_eq!(out.matches('[').count(), out.matches(']').count());
    }

    #[test]
    fn format_string_lexemes_are_escaped() {
        let tree = tree_for("int main() { printf(\"ok\\n\"); return 0; }");
        let xml = print_tree(&tree, AstFormat::Xml);
        assert!(xml.contains("lexeme='\\\"ok\\n\\\"'"), "{xml}");
        let json = print_tree(&tree, AstFormat::Json);
        assert!(json.contains("\\\"ok\\n\\\""), "{json}");
    }
}
