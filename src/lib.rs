//! Front-end compiler core for the Tessel language.
//!
//! Tessel is a statically-typed, C-like language with classes, interfaces,
//! generics, smart pointers, namespaces, unions, and inline assembly. The
//! pipeline is a single forward walk:
//!
//!   source
//!     -> lexer      (tokens)
//!     -> parser     (AST, with recovery)
//!     -> typecheck  (scopes + resolved types + diagnostics)
//!     -> lower      (textual IR via the builder)
//!
//! Each phase reports through the shared [`diag::Reporter`] and keeps
//! going on errors; the caller decides what gates what.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------
// Source model: locations, tokens, token stream
// ---------------------------------------------------------------------

pub mod location;
pub mod stream;
pub mod token;

// ---------------------------------------------------------------------
// Front end: lexing and parsing
// ---------------------------------------------------------------------

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod printer;

// ---------------------------------------------------------------------
// Semantic analysis: types, scopes, checking
// ---------------------------------------------------------------------

pub mod scope;
pub mod typecheck;
pub mod types;

// ---------------------------------------------------------------------
// Lowering: IR model, builder, lowering pass, options
// ---------------------------------------------------------------------

pub mod builder;
pub mod ir;
pub mod lower;
pub mod options;

// ---------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------

pub mod diag;

pub use diag::Reporter;
pub use lower::lower;
pub use options::Options;
pub use parser::parse;
pub use typecheck::check;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("compilation failed with {0} error(s)")]
    SourceErrors(usize),
    #[error("failed to write output: {0}")]
    OutputIo(#[from] io::Error),
}

/// Serialize a module to the filename derived from the options.
pub fn write_ir(module: &ir::Module, options: &Options) -> Result<PathBuf, CompileError> {
    let path = options.output_path();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(&path, module.to_string())?;
    Ok(path)
}

/// Convenience pipeline: lex, parse, check, lower.
///
/// Diagnostics accumulate in `reporter` either way. Lowering is only
/// attempted on a program that parsed and checked cleanly; otherwise the
/// error count is handed back.
pub fn compile(
    source: &str,
    file: &str,
    options: &Options,
    reporter: &mut Reporter,
) -> Result<ir::Module, CompileError> {
    let tokens = lexer::lex(source, file, reporter);
    let program = parser::parse(tokens, reporter);
    let checked = typecheck::check(&program, reporter);
    if reporter.has_errors() || !checked {
        return Err(CompileError::SourceErrors(reporter.error_count()));
    }
    let module = lower::lower(&program, options, reporter);
    if reporter.has_errors() {
        return Err(CompileError::SourceErrors(reporter.error_count()));
    }
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_produces_a_module() {
        let mut reporter = Reporter::new();
        let module = compile(
            "function f(a: int, b: int): int { return a + b; }",
            "demo.tsl",
            &Options::default(),
            &mut reporter,
        )
        .expect("clean compile");
        assert!(module.function("f").is_some());
    }

    #[test]
    fn compile_stops_before_lowering_on_check_errors() {
        let mut reporter = Reporter::new();
        let result = compile(
            r#"let x: int = "hi";"#,
            "demo.tsl",
            &Options::default(),
            &mut reporter,
        );
        assert!(matches!(result, Err(CompileError::SourceErrors(n)) if n > 0));
    }

    #[test]
    fn diagnostics_come_out_in_phase_order() {
        let mut reporter = Reporter::new();
        let _ = compile(
            "let bad: = 1;\nlet x: int = \"hi\";",
            "demo.tsl",
            &Options::default(),
            &mut reporter,
        );
        let codes: Vec<String> = reporter
            .diagnostics()
            .iter()
            .filter_map(|d| d.code.map(|c| c.to_string()))
            .collect();
        // Parse diagnostics precede check diagnostics.
        let first_parse = codes.iter().position(|c| c.starts_with("PS"));
        let first_check = codes.iter().position(|c| c.starts_with("TC"));
        match (first_parse, first_check) {
            (Some(p), Some(t)) => assert!(p < t),
            _ => panic!("expected both parse and check diagnostics, got {codes:?}"),
        }
    }
}
