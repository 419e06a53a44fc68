//! Compiler for a restricted Pascal dialect, targeting a textual
//! stack-VM instruction set.
//!
//! Pipeline: [`lexer`] -> [`parser`] -> [`semantic`] -> [`codegen`].
//! Each phase returns `Result<_, error::CompileError>` and halts
//! compilation on its first error; nothing is recovered.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod semantic;
pub mod symbol;
pub mod types;

pub use config::CompilerOptions;
pub use error::{CompileError, CompileResult};

use std::fs;
use std::path::Path;

/// Compile `source` with default options, returning the textual VM
/// instruction listing as a single newline-joined string.
pub fn compile_source(source: &str) -> CompileResult<String> {
    compile_source_with_options(source, &CompilerOptions::default())
}

pub fn compile_source_with_options(source: &str, options: &CompilerOptions) -> CompileResult<String> {
    let tokens = lexer::tokenize(source)?;
    let program = parser::parse(tokens)?;
    semantic::analyze(&program)?;
    let instructions = codegen::generate(&program, options)?;

    let mut listing = instructions.join("\n");
    if options.emit_trailing_newline {
        listing.push('\n');
    }
    Ok(listing)
}

/// Compile the file at `path` with default options.
pub fn compile_file(path: &Path) -> CompileResult<String> {
    compile_file_with_options(path, &CompilerOptions::default())
}

pub fn compile_file_with_options(path: &Path, options: &CompilerOptions) -> CompileResult<String> {
    let source = fs::read_to_string(path)
        .map_err(|e| CompileError::syntax(0, format!("could not read '{}': {}", path.display(), e)))?;
    compile_source_with_options(&source, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_arithmetic_precedence() {
        let out = compile_source("program p; var x: integer; begin x := 2 + 3 * 4; writeln(x); end.").unwrap();
        assert!(out.contains("PUSHI 2"));
        assert!(out.contains("MUL"));
        assert!(out.contains("WRITEI"));
    }

    #[test]
    fn scenario_division_is_real() {
        let out = compile_source("program p; var r: real; begin r := 5 / 2; writeln(r); end.").unwrap();
        assert!(out.contains("FDIV"));
        assert!(out.contains("WRITEF"));
    }

    #[test]
    fn scenario_array_loop() {
        let out = compile_source(
            "program p; var a: array[1..3] of integer; i: integer; begin for i := 1 to 3 do a[i] := i*i; writeln(a[1], a[2], a[3]); end.",
        )
        .unwrap();
        assert!(out.contains("ALLOCN"));
        assert!(out.contains("STOREN"));
        assert_eq!(out.matches("WRITEI").count(), 3);
    }

    #[test]
    fn scenario_function_call() {
        let out = compile_source(
            "program p; function sq(n: integer): integer; begin sq := n*n; end; var x: integer; begin x := sq(7); writeln(x); end.",
        )
        .unwrap();
        assert!(out.contains("FNsq:"));
        assert!(out.contains("CALL"));
    }

    #[test]
    fn scenario_string_length() {
        let out = compile_source("program p; var s: string; begin s := 'abc'; writeln(length(s)); end.").unwrap();
        assert!(out.contains("STRLEN"));
    }

    #[test]
    fn scenario_undeclared_identifier_is_rejected() {
        let err = compile_source("program p; begin x := 1; end.").unwrap_err();
        match err {
            CompileError::Semantic { message } => assert_eq!(message, "Undeclared identifier 'x'"),
            other => panic!("expected semantic error, got {:?}", other),
        }
    }

    #[test]
    fn determinism_same_input_same_output() {
        let src = "program p; var x: integer; begin x := 1 + 2; writeln(x); end.";
        assert_eq!(compile_source(src).unwrap(), compile_source(src).unwrap());
    }

    #[test]
    fn trailing_newline_is_configurable() {
        let opts = CompilerOptions::default().with_emit_trailing_newline(false);
        let out = compile_source_with_options("program p; begin end.", &opts).unwrap();
        assert!(!out.ends_with('\n'));
    }
}
