//! Compile-phase and runtime diagnostics.
//!
//! Compile errors are collected per phase and formatted
//! `[line N] ['lexeme'] <Phase> Error\n<detail>`; phases short-circuit
//! at their boundaries. Runtime errors are fatal: the VM unwinds with
//! one and the CLI exits non-zero.

use std::fmt;

use midori_parser::token::Token;

/// Which compile phase rejected the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilePhase {
    Lexer,
    Parser,
    TypeChecker,
    CodeGenerator,
}

impl fmt::Display for CompilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompilePhase::Lexer => write!(f, "Lexer"),
            CompilePhase::Parser => write!(f, "Parser"),
            CompilePhase::TypeChecker => write!(f, "Type Checker"),
            CompilePhase::CodeGenerator => write!(f, "Code Generator"),
        }
    }
}

/// All diagnostics produced by one failed compile phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub phase: CompilePhase,
    pub messages: Vec<String>,
}

impl CompileError {
    pub fn new(phase: CompilePhase, messages: Vec<String>) -> Self {
        Self { phase, messages }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, message) in self.messages.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// `[line N] 'lexeme' Type Checker Error\n<detail>[\nExpected …, but got …]`
pub fn type_checker_error(
    detail: &str,
    token: &Token,
    expected: &[String],
    actual: Option<&str>,
) -> String {
    let mut message = format!(
        "[line {}] '{}' Type Checker Error\n{}",
        token.line, token.lexeme, detail
    );
    if let (false, Some(actual)) = (expected.is_empty(), actual) {
        message.push_str("\nExpected ");
        message.push_str(&expected.join(" or "));
        message.push_str(", but got ");
        message.push_str(actual);
    }
    message
}

/// `[line N] Code Generator Error\n<detail>`
pub fn code_generator_error(detail: &str, line: u32) -> String {
    format!("[line {}] Code Generator Error\n{}", line, detail)
}

/// A fatal runtime error. Execution does not resume; the heap is torn
/// down when the VM is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub message: String,
    pub line: u32,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, line: u32) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] Runtime Error\n{}", self.line, self.message)
    }
}

impl std::error::Error for RuntimeError {}
