//! Shared helpers for integration tests.
// Consumed selectively by the test files; not every helper is used in
// every target.
#![allow(dead_code)]

use midori_vm::error::{CompileError, RuntimeError};
use midori_vm::{api, MidoriError, Vm};

/// Compile and run, panicking on any failure; returns printed output.
pub fn run(source: &str) -> String {
    api::compile_and_run(source, "test.mdr")
        .unwrap_or_else(|e| panic!("program failed: {}\nsource:\n{}", e, source))
}

/// Compile and run with an aggressive collector (threshold 0).
pub fn run_with_aggressive_gc(source: &str) -> String {
    api::compile_and_run_with_gc_threshold(source, "test.mdr", 0)
        .unwrap_or_else(|e| panic!("program failed: {}\nsource:\n{}", e, source))
}

/// Compile successfully, run, and expect a runtime error.
pub fn run_expecting_runtime_error(source: &str) -> RuntimeError {
    match api::compile_and_run(source, "test.mdr") {
        Err(MidoriError::Runtime(e)) => e,
        Err(MidoriError::Compile(e)) => panic!("expected a runtime error, compile failed: {}", e),
        Ok(output) => panic!("expected a runtime error, program printed: {:?}", output),
    }
}

/// Expect compilation to fail; returns the phase's diagnostics.
pub fn compile_expecting_error(source: &str) -> CompileError {
    match api::compile(source, "test.mdr") {
        Err(e) => e,
        Ok(_) => panic!("expected a compile error\nsource:\n{}", source),
    }
}

/// Run a compiled executable and return its output.
pub fn run_executable(executable: midori_vm::Executable) -> String {
    let mut vm = Vm::new(executable);
    vm.run().unwrap_or_else(|e| panic!("runtime error: {}", e));
    vm.output().to_string()
}
