//! Bytecode-shape properties: fused branches, short-circuit layout,
//! pool behavior, generator limits.

mod common;
use common::*;

use midori_vm::disassembler::decode;
use midori_vm::{api, CompilePhase, OpCode};
use pretty_assertions::assert_eq;

fn opcodes_of_main(source: &str) -> Vec<OpCode> {
    let executable = api::compile(source, "test.mdr").expect("compiles");
    decode(executable.procedure(0))
        .into_iter()
        .map(|(_, op)| op)
        .collect()
}

fn count(ops: &[OpCode], needle: OpCode) -> usize {
    ops.iter().filter(|op| **op == needle).count()
}

// ==================== Fused branches ====================

#[test]
fn test_integer_if_condition_fuses() {
    let ops = opcodes_of_main("var a = 1;\nvar b = 2;\nif (a < b) { PrintLine(1); }");
    assert_eq!(count(&ops, OpCode::IfIntegerLess), 1);
    assert_eq!(count(&ops, OpCode::LessInteger), 0);
    assert_eq!(count(&ops, OpCode::JumpIfFalse), 0);
}

#[test]
fn test_fraction_while_condition_fuses() {
    let ops = opcodes_of_main("var x = 0.0;\nwhile (x > 1.0) { x = x - 1.0; }");
    assert_eq!(count(&ops, OpCode::IfFractionGreater), 1);
    assert_eq!(count(&ops, OpCode::GreaterFraction), 0);
}

#[test]
fn test_integer_for_condition_fuses() {
    let ops = opcodes_of_main("for (var i = 0; i < 3; i = i + 1) { PrintLine(i); }");
    assert_eq!(count(&ops, OpCode::IfIntegerLess), 1);
    assert_eq!(count(&ops, OpCode::LessInteger), 0);
}

#[test]
fn test_equality_condition_fuses() {
    let ops = opcodes_of_main("var a = 1;\nif (a == 1) { PrintLine(1); }");
    assert_eq!(count(&ops, OpCode::IfIntegerEqual), 1);
    assert_eq!(count(&ops, OpCode::EqualInteger), 0);
}

#[test]
fn test_comparison_outside_condition_does_not_fuse() {
    let ops = opcodes_of_main("var a = 1;\nvar flag = a < 2;\nPrintLine(flag ? 1 : 0);");
    assert_eq!(count(&ops, OpCode::LessInteger), 1);
    assert_eq!(count(&ops, OpCode::IfIntegerLess), 0);
}

#[test]
fn test_bool_condition_uses_peeking_jump() {
    let ops = opcodes_of_main("var flag = true;\nif (flag) { PrintLine(1); }");
    assert_eq!(count(&ops, OpCode::JumpIfFalse), 1);
}

// ==================== Short-circuit shape ====================

#[test]
fn test_logical_and_emits_peeking_jump() {
    let ops = opcodes_of_main("var a = true;\nvar b = false;\nvar c = a && b;\nPrintLine(0);");
    assert_eq!(count(&ops, OpCode::JumpIfFalse), 1);
    assert_eq!(count(&ops, OpCode::JumpIfTrue), 0);
}

#[test]
fn test_logical_or_emits_peeking_jump() {
    let ops = opcodes_of_main("var a = true;\nvar b = false;\nvar c = a || b;\nPrintLine(0);");
    assert_eq!(count(&ops, OpCode::JumpIfTrue), 1);
}

// ==================== Operator specialization ====================

#[test]
fn test_arithmetic_specializes_by_operand_type() {
    let ops = opcodes_of_main("var a = 1 + 2;\nvar b = 1.0 + 2.0;\nPrintLine(a);");
    assert_eq!(count(&ops, OpCode::AddInteger), 1);
    assert_eq!(count(&ops, OpCode::AddFraction), 1);
}

#[test]
fn test_text_equality_uses_equal_text() {
    let ops = opcodes_of_main("var e = \"a\" == \"b\";\nPrintLine(0);");
    assert_eq!(count(&ops, OpCode::EqualText), 1);
}

#[test]
fn test_text_inequality_is_equal_text_plus_not() {
    let ops = opcodes_of_main("var e = \"a\" != \"b\";\nPrintLine(0);");
    assert_eq!(count(&ops, OpCode::EqualText), 1);
    assert!(count(&ops, OpCode::Not) >= 1);
}

#[test]
fn test_concat_picks_text_or_array() {
    let ops = opcodes_of_main("var t = \"a\" ++ \"b\";\nvar xs = [1] ++ [2];\nPrintLine(0);");
    assert_eq!(count(&ops, OpCode::ConcatText), 1);
    assert_eq!(count(&ops, OpCode::ConcatArray), 1);
}

#[test]
fn test_array_repeat_uses_dup_array() {
    let ops = opcodes_of_main("var xs = [0] * 3;\nPrintLine(0);");
    assert_eq!(count(&ops, OpCode::DupArray), 1);
    assert_eq!(count(&ops, OpCode::MultiplyInteger), 0);
}

// ==================== Closures & procedures ====================

#[test]
fn test_each_closure_compiles_to_its_own_procedure() {
    let executable = api::compile(
        "fixed f = \\(): Int { return 1; };\nfixed g = \\(): Int { return 2; };\nPrintLine(f() + g());",
        "test.mdr",
    )
    .expect("compiles");
    // Top level, two prelude closures, and f and g.
    assert_eq!(executable.procedure_count(), 5);
}

#[test]
fn test_closure_emits_allocate_then_construct() {
    let ops = opcodes_of_main("fixed f = \\(): Int { return 1; };\nPrintLine(f());");
    assert!(count(&ops, OpCode::AllocateClosure) >= 1);
    assert!(count(&ops, OpCode::ConstructClosure) >= 1);
}

#[test]
fn test_main_procedure_ends_with_halt() {
    let executable = api::compile("PrintLine(1);", "test.mdr").expect("compiles");
    let ops: Vec<OpCode> = decode(executable.procedure(0))
        .into_iter()
        .map(|(_, op)| op)
        .collect();
    assert_eq!(ops.last(), Some(&OpCode::Halt));
}

// ==================== Constant pool ====================

#[test]
fn test_text_constants_deduplicated() {
    let executable = api::compile(
        "var a = \"same\";\nvar b = \"same\";\nvar c = \"other\";\nPrintLine(0);",
        "test.mdr",
    )
    .expect("compiles");
    let baseline = api::compile("PrintLine(0);", "test.mdr")
        .expect("compiles")
        .constant_count();
    assert_eq!(executable.constant_count(), baseline + 2);
}

#[test]
fn test_numeric_literals_inline_not_pooled() {
    let with_numbers = api::compile("var a = 123456;\nvar b = 2.75;\nPrintLine(0);", "test.mdr")
        .expect("compiles");
    let baseline = api::compile("PrintLine(0);", "test.mdr").expect("compiles");
    assert_eq!(with_numbers.constant_count(), baseline.constant_count());
}

// ==================== Limits ====================

#[test]
fn test_too_many_globals_is_a_generator_error() {
    let mut source = String::new();
    for i in 0..300 {
        source.push_str(&format!("var g{} = {};\n", i, i));
    }
    let error = compile_expecting_error(&source);
    assert_eq!(error.phase, CompilePhase::CodeGenerator);
    assert!(error
        .messages
        .iter()
        .any(|m| m.contains("Too many global variables")));
}

// ==================== Line info ====================

#[test]
fn test_line_info_tracks_source_lines() {
    let executable = api::compile("PrintLine(1);\nPrintLine(2);", "test.mdr").expect("compiles");
    let stream = executable.procedure(0);
    // Last emitted user instruction sits on line 2.
    assert_eq!(stream.line_at(stream.len() - 2), 2);
}
