//! Rust API for compiling and running Midori source.

use std::fmt;

use midori_parser::{Lexer, Parser, ProgramTree};

use crate::codegen;
use crate::error::{CompileError, CompilePhase, RuntimeError};
use crate::executable::Executable;
use crate::prelude::PRELUDE_SOURCE;
use crate::typecheck;
use crate::types::TypeTable;
use crate::vm::Vm;

/// Any failure along the pipeline, compile-time or runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidoriError {
    Compile(CompileError),
    Runtime(RuntimeError),
}

impl fmt::Display for MidoriError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MidoriError::Compile(e) => write!(f, "{}", e),
            MidoriError::Runtime(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for MidoriError {}

/// Parse prelude plus user source into one program tree.
pub fn parse(source: &str, file_name: &str) -> Result<ProgramTree, CompileError> {
    let mut tokens = Lexer::new(PRELUDE_SOURCE).lex().map_err(lexer_error)?;
    // Drop the prelude's Eof so the streams splice cleanly.
    tokens.pop();

    let user_tokens = Lexer::new(source).lex().map_err(lexer_error)?;
    tokens.extend(user_tokens);

    Parser::new(tokens, file_name)
        .parse()
        .map_err(|messages| CompileError::new(CompilePhase::Parser, messages))
}

/// Compile source to an executable: lex, parse, check, generate.
/// Phases short-circuit; each returns every diagnostic it found.
pub fn compile(source: &str, file_name: &str) -> Result<Executable, CompileError> {
    let mut program = parse(source, file_name)?;

    let mut types = TypeTable::new();
    typecheck::check_program(&mut program, &mut types)
        .map_err(|messages| CompileError::new(CompilePhase::TypeChecker, messages))?;

    codegen::generate(program)
        .map_err(|messages| CompileError::new(CompilePhase::CodeGenerator, messages))
}

/// Compile and run, returning everything the program printed.
pub fn compile_and_run(source: &str, file_name: &str) -> Result<String, MidoriError> {
    compile_and_run_with_gc_threshold(source, file_name, crate::vm::GC_THRESHOLD)
}

/// As [`compile_and_run`], with an explicit collection trigger;
/// `0` collects at every allocation point.
pub fn compile_and_run_with_gc_threshold(
    source: &str,
    file_name: &str,
    gc_threshold: usize,
) -> Result<String, MidoriError> {
    let executable = compile(source, file_name).map_err(MidoriError::Compile)?;
    let mut vm = Vm::new(executable);
    vm.set_gc_threshold(gc_threshold);
    vm.run().map_err(MidoriError::Runtime)?;
    Ok(vm.output().to_string())
}

fn lexer_error(errors: Vec<midori_parser::ParseError>) -> CompileError {
    CompileError::new(
        CompilePhase::Lexer,
        errors.into_iter().map(|e| e.message).collect(),
    )
}
