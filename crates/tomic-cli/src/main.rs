// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! ToMiC compiler command-line interface.
//!
//! This is the main entry point for the `tomic` command:
//!
//! ```text
//! tomic <input> -o <output> [--emit ast|xml|json|ir]
//! ```
//!
//! Without `--emit`, the rendering is chosen from the output file's
//! extension (`.ast`, `.xml`, `.json`; anything else emits IR). The
//! error log prints to stderr after the full pipeline; the exit code is
//! non-zero when it is non-empty.

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use tomic_core::compiler::{compile, CompilerOptions, OutputKind};
use tracing::info;

/// ToMiC: a compiler for a small C-like teaching language
#[derive(Debug, Parser)]
#[command(name = "tomic")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Source file to compile
    input: Utf8PathBuf,

    /// Output file
    #[arg(short, long)]
    output: Utf8PathBuf,

    /// Output format (default: derived from the output extension)
    #[arg(long, value_enum)]
    emit: Option<Emit>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Emit {
    /// Syntax tree, standard line format
    Ast,
    /// Syntax tree as XML
    Xml,
    /// Syntax tree as JSON
    Json,
    /// Textual LLVM-style IR
    Ir,
}

impl From<Emit> for OutputKind {
    fn from(emit: Emit) -> Self {
        match emit {
            Emit::Ast => Self::Ast,
            Emit::Xml => Self::Xml,
            Emit::Json => Self::Json,
            Emit::Ir => Self::Ir,
        }
    }
}

fn main() -> Result<()> {
    // Initialize tracing subscriber only if RUST_LOG is explicitly set,
    // so normal runs keep stderr for the error log alone.
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .try_init();
    }

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let error_count = run(&cli)?;
    if error_count > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Runs the pipeline; returns the number of compile errors.
fn run(cli: &Cli) -> Result<usize> {
    let source = std::fs::read_to_string(&cli.input)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read '{}'", cli.input))?;

    let output_kind = cli.emit.map_or_else(
        || OutputKind::from_extension(cli.output.extension().unwrap_or("")),
        OutputKind::from,
    );
    let options = CompilerOptions {
        output: output_kind,
    };

    let module_name = cli.input.file_stem().unwrap_or("main");
    info!(input = %cli.input, ?output_kind, "compiling");

    let result = compile(&source, module_name, &options);

    if let Some(output) = &result.output {
        std::fs::write(&cli.output, output)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to write '{}'", cli.output))?;
    }

    if !result.errors.is_empty() {
        eprint!("{}", result.error_report);
    }
    if result.output.is_none() {
        miette::bail!("Failed to parse '{}'", cli.input);
    }

    Ok(result.errors.len())
}
