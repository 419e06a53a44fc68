//! Compiler error types
//!
//! Four disjoint kinds, one per phase, each fatal on first occurrence.
//! No `thiserror`/`anyhow` here, matching the rest of this compiler's
//! dependency-free error style — just a plain enum with a hand-written
//! `Display` impl.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Bad character, unterminated string/comment.
    Lexical { line: usize, message: String },
    /// Grammar violation, unexpected EOF.
    Syntax { line: usize, message: String },
    /// Undeclared/redeclared name, type mismatch, non-boolean condition, invalid lvalue.
    Semantic { message: String },
    /// Internal impossibility given a validated AST.
    CodeGen { message: String },
}

impl CompileError {
    pub fn lexical(line: usize, message: impl Into<String>) -> Self {
        CompileError::Lexical { line, message: message.into() }
    }

    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        CompileError::Syntax { line, message: message.into() }
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        CompileError::Semantic { message: message.into() }
    }

    pub fn codegen(message: impl Into<String>) -> Self {
        CompileError::CodeGen { message: message.into() }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Lexical { line, message } => {
                write!(f, "lexical error at line {}: {}", line, message)
            }
            CompileError::Syntax { line, message } => {
                write!(f, "syntax error at line {}: {}", line, message)
            }
            CompileError::Semantic { message } => write!(f, "semantic error: {}", message),
            CompileError::CodeGen { message } => write!(f, "code generation error: {}", message),
        }
    }
}

impl std::error::Error for CompileError {}

pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_line_number_for_lexical_and_syntax() {
        let e = CompileError::lexical(3, "bad character '@'");
        assert_eq!(e.to_string(), "lexical error at line 3: bad character '@'");
        let e = CompileError::syntax(7, "unexpected token");
        assert_eq!(e.to_string(), "syntax error at line 7: unexpected token");
    }

    #[test]
    fn displays_without_line_for_semantic_and_codegen() {
        let e = CompileError::semantic("Undeclared identifier 'x'");
        assert_eq!(e.to_string(), "semantic error: Undeclared identifier 'x'");
        let e = CompileError::codegen("unknown identifier");
        assert_eq!(e.to_string(), "code generation error: unknown identifier");
    }
}
