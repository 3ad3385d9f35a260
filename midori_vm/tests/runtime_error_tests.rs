//! Fatal runtime errors: overflows, bounds, casts, foreign symbols.

mod common;
use common::*;

#[test]
fn test_division_by_zero_traps() {
    let error = run_expecting_runtime_error("var z = 0;\nPrintLine(1 / z);");
    assert!(error.message.contains("Division by zero"));
}

#[test]
fn test_modulo_by_zero_traps() {
    let error = run_expecting_runtime_error("var z = 0;\nPrintLine(1 % z);");
    assert!(error.message.contains("Division by zero"));
}

#[test]
fn test_fraction_division_by_zero_is_infinite() {
    // Fractions follow IEEE-754: no trap, an infinity.
    let output = run("PrintTextLine((1.0 / 0.0) as Text);");
    assert_eq!(output, "inf\n");
}

#[test]
fn test_call_stack_overflow() {
    let error = run_expecting_runtime_error(
        "fixed boom = \\(): Int { return boom(); };\nPrintLine(boom());",
    );
    assert!(error.message.contains("Call stack overflow"));
}

#[test]
fn test_value_stack_overflow() {
    // Each recursive frame parks ~60 locals on the value stack; the
    // 512-slot stack fills long before the call stack does.
    let mut body = String::new();
    for i in 0..60 {
        body.push_str(&format!("var x{} = {};\n", i, i));
    }
    let source = format!(
        "fixed deep = \\(var n: Int): Int {{\n{}if (n == 0) {{ return 0; }}\nreturn deep(n - 1);\n}};\nPrintLine(deep(100));",
        body
    );
    let error = run_expecting_runtime_error(&source);
    assert!(error.message.contains("Value stack overflow"));
}

#[test]
fn test_unknown_foreign_symbol_is_fatal() {
    let error = run_expecting_runtime_error(
        "foreign DefinitelyMissingSymbol : () -> Unit;\nDefinitelyMissingSymbol();",
    );
    assert!(error
        .message
        .contains("Failed to load foreign function 'DefinitelyMissingSymbol'"));
}

#[test]
fn test_oversized_array_request_is_fatal() {
    let error = run_expecting_runtime_error("var xs = [0] * 99999999;\nPrintLine(xs[0]);");
    assert!(error.message.contains("maximum array size"));
}

#[test]
fn test_negative_array_repeat_is_fatal() {
    let error = run_expecting_runtime_error("var xs = [0] * (0 - 2);\nPrintLine(0);");
    assert!(error.message.contains("negative"));
}

#[test]
fn test_runtime_error_carries_line_number() {
    let error = run_expecting_runtime_error("var xs = [1];\n\n\nPrintLine(xs[9]);");
    assert_eq!(error.line, 4);
}
