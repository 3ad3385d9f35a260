//! End-to-end language behavior through the full pipeline.

mod common;
use common::*;

use pretty_assertions::assert_eq;

// ==================== Functions & arithmetic ====================

#[test]
fn test_defined_call_returns_sum() {
    let output = run(
        "fixed add = \\(var a: Int, var b: Int): Int { return a + b; };\n\
         PrintLine(add(2, 3));",
    );
    assert_eq!(output, "5\n");
}

#[test]
fn test_integer_arithmetic() {
    assert_eq!(run("PrintLine(7 / 2);"), "3\n");
    assert_eq!(run("PrintLine(7 % 3);"), "1\n");
    assert_eq!(run("PrintLine(2 * 3 + 4);"), "10\n");
    assert_eq!(run("PrintLine(-5);"), "-5\n");
}

#[test]
fn test_fraction_arithmetic_via_text() {
    assert_eq!(run("PrintTextLine((1.5 + 2.25) as Text);"), "3.75\n");
    assert_eq!(run("PrintTextLine((5.0 / 2.0) as Text);"), "2.5\n");
}

#[test]
fn test_bitwise_and_shift_operators() {
    assert_eq!(run("PrintLine(1 << 4);"), "16\n");
    assert_eq!(run("PrintLine(255 >> 4);"), "15\n");
    assert_eq!(run("PrintLine(12 & 10);"), "8\n");
    assert_eq!(run("PrintLine(12 | 10);"), "14\n");
    assert_eq!(run("PrintLine(12 ^ 10);"), "6\n");
    assert_eq!(run("PrintLine(~0);"), "-1\n");
}

#[test]
fn test_recursive_function() {
    let output = run(
        "fixed fib = \\(var n: Int): Int {\n\
             if (n < 2) { return n; }\n\
             return fib(n - 1) + fib(n - 2);\n\
         };\n\
         PrintLine(fib(10));",
    );
    assert_eq!(output, "55\n");
}

// ==================== Arrays ====================

#[test]
fn test_array_indexing() {
    let output = run("var xs = [1, 2, 3];\nPrintLine(xs[2]);");
    assert_eq!(output, "3\n");
}

#[test]
fn test_array_out_of_bounds_reports_index() {
    let error = run_expecting_runtime_error("var xs = [1, 2, 3];\nPrintLine(xs[3]);");
    assert!(error.message.contains("Index out of bounds"));
    assert!(error.message.contains('3'));
}

#[test]
fn test_negative_index_is_out_of_bounds() {
    let error = run_expecting_runtime_error("var xs = [1];\nPrintLine(xs[0 - 1]);");
    assert!(error.message.contains("-1"));
}

#[test]
fn test_nested_array_access() {
    let output = run("var grid = [[1, 2], [3, 4]];\nPrintLine(grid[1][0]);");
    assert_eq!(output, "3\n");
}

#[test]
fn test_nested_array_inner_bounds_checked() {
    let error = run_expecting_runtime_error("var grid = [[1, 2], [3]];\nPrintLine(grid[1][1]);");
    assert!(error.message.contains("Index out of bounds"));
}

#[test]
fn test_array_set_and_read_back() {
    let output = run("var xs = [1, 2, 3];\nxs[1] = 9;\nPrintLine(xs[1]);");
    assert_eq!(output, "9\n");
}

#[test]
fn test_nested_array_set() {
    let output = run("var grid = [[1, 2], [3, 4]];\ngrid[0][1] = 7;\nPrintLine(grid[0][1]);");
    assert_eq!(output, "7\n");
}

#[test]
fn test_array_concat_repeat_append_prepend() {
    assert_eq!(run("var xs = [1, 2] ++ [3];\nPrintLine(xs[2]);"), "3\n");
    assert_eq!(
        run("var xs = [0] * 3;\nPrintLine(xs[0] + xs[1] + xs[2]);"),
        "0\n"
    );
    assert_eq!(run("var xs = [7] * 3;\nPrintLine(xs[2]);"), "7\n");
    assert_eq!(run("var xs = [1, 2] :+ 3;\nPrintLine(xs[2]);"), "3\n");
    assert_eq!(run("var xs = 0 +: [1, 2];\nPrintLine(xs[0]);"), "0\n");
}

#[test]
fn test_array_repeat_preserves_source() {
    let output = run("var xs = [5];\nvar ys = xs * 4;\nPrintLine(xs[0]);\nPrintLine(ys[3]);");
    assert_eq!(output, "5\n5\n");
}

#[test]
fn test_empty_array_with_annotation() {
    let output = run("var xs: Array[Int] = [];\nvar ys = xs :+ 1;\nPrintLine(ys[0]);");
    assert_eq!(output, "1\n");
}

#[test]
fn test_array_rendered_as_text() {
    assert_eq!(run("PrintTextLine([1, 2, 3] as Text);"), "[1,2,3]\n");
}

// ==================== Text ====================

#[test]
fn test_text_concatenation() {
    let output = run("PrintTextLine(\"foo\" ++ \"bar\");");
    assert_eq!(output, "foobar\n");
}

#[test]
fn test_text_equality() {
    assert_eq!(run("PrintLine(\"a\" ++ \"b\" == \"ab\" ? 1 : 0);"), "1\n");
    assert_eq!(run("PrintLine(\"a\" != \"b\" ? 1 : 0);"), "1\n");
}

#[test]
fn test_text_escapes_round_trip() {
    assert_eq!(run("PrintTextLine(\"a\\tb\");"), "a\tb\n");
}

// ==================== Casts ====================

#[test]
fn test_casts_between_atomics() {
    assert_eq!(run("PrintLine(2.9 as Int);"), "2\n");
    assert_eq!(run("PrintTextLine((2 as Frac) as Text);"), "2.0\n");
    assert_eq!(run("PrintLine((\"41\" as Int) + 1);"), "42\n");
    assert_eq!(run("PrintTextLine(true as Text);"), "true\n");
}

#[test]
fn test_uncastable_text_is_fatal() {
    let error = run_expecting_runtime_error("PrintLine(\"nope\" as Int);");
    assert!(error.message.contains("Unable to cast to Integer"));
}

#[test]
fn test_struct_cast_between_identical_layouts() {
    let output = run(
        "struct Meters { value: Int };\n\
         struct Feet { value: Int };\n\
         var m = new Meters(3);\n\
         var f = m as Feet;\n\
         PrintLine(f.value);",
    );
    assert_eq!(output, "3\n");
}

// ==================== Control flow ====================

#[test]
fn test_if_else_branches() {
    assert_eq!(run("if (1 < 2) { PrintLine(1); } else { PrintLine(2); }"), "1\n");
    assert_eq!(run("if (2 < 1) { PrintLine(1); } else { PrintLine(2); }"), "2\n");
}

#[test]
fn test_while_loop_counts() {
    let output = run("var n = 0;\nwhile (n < 5) { n = n + 1; }\nPrintLine(n);");
    assert_eq!(output, "5\n");
}

#[test]
fn test_for_loop_with_break_and_continue() {
    let output = run(
        "var total = 0;\n\
         for (var i = 0; i < 10; i = i + 1) {\n\
             if (i == 3) { continue; }\n\
             if (i == 6) { break; }\n\
             total = total + i;\n\
         }\n\
         PrintLine(total);",
    );
    assert_eq!(output, "12\n");
}

#[test]
fn test_ternary_expression() {
    assert_eq!(run("PrintLine(3 > 2 ? 10 : 20);"), "10\n");
    assert_eq!(run("PrintLine(3.5 > 4.5 ? 10 : 20);"), "20\n");
}

#[test]
fn test_logical_operators_short_circuit() {
    // The right operand would trap; short-circuiting must skip it.
    let output = run(
        "fixed boom = \\(): Bool { PrintLine(99); return true; };\n\
         PrintLine(false && boom() ? 1 : 0);\n\
         PrintLine(true || boom() ? 1 : 0);",
    );
    assert_eq!(output, "0\n1\n");
}

#[test]
fn test_fraction_comparison_condition() {
    let output = run("var x = 1.5;\nif (x >= 1.0) { PrintLine(1); } else { PrintLine(0); }");
    assert_eq!(output, "1\n");
}

#[test]
fn test_block_scoped_shadowing() {
    let output = run(
        "var x = 1;\n\
         {\n\
             var x = 2;\n\
             PrintLine(x);\n\
         }\n\
         PrintLine(x);",
    );
    assert_eq!(output, "2\n1\n");
}

// ==================== Structs & unions ====================

#[test]
fn test_struct_member_access() {
    let output = run(
        "struct Point { x: Int, y: Int };\n\
         var p = new Point(4, 7);\n\
         PrintLine(p.y);",
    );
    assert_eq!(output, "7\n");
}

#[test]
fn test_struct_member_assignment() {
    let output = run(
        "struct Point { x: Int, y: Int };\n\
         var p = new Point(4, 7);\n\
         p.x = 40;\n\
         PrintLine(p.x + p.y);",
    );
    assert_eq!(output, "47\n");
}

#[test]
fn test_struct_member_aliasing() {
    let output = run(
        "struct Box { value: Int };\n\
         var a = new Box(1);\n\
         var b = a;\n\
         b.value = 5;\n\
         PrintLine(a.value);",
    );
    assert_eq!(output, "5\n");
}

#[test]
fn test_union_switch_binds_payload() {
    let output = run(
        "union Opt { None, Some(Int) };\n\
         var o = new Some(42);\n\
         switch (o) {\n\
             case Some(var n): PrintLine(n);\n\
             case None: PrintLine(0);\n\
         }",
    );
    assert_eq!(output, "42\n");
}

#[test]
fn test_union_switch_zero_field_variant() {
    let output = run(
        "union Opt { None, Some(Int) };\n\
         var o = new None();\n\
         switch (o) {\n\
             case Some(var n): PrintLine(n);\n\
             case None: PrintLine(0);\n\
         }",
    );
    assert_eq!(output, "0\n");
}

#[test]
fn test_union_switch_default_arm() {
    let output = run(
        "union Shape { Circle(Int), Square(Int), Dot };\n\
         var s = new Square(5);\n\
         switch (s) {\n\
             case Circle(var r): PrintLine(r);\n\
             default: PrintLine(0);\n\
         }",
    );
    assert_eq!(output, "0\n");
}

#[test]
fn test_union_switch_multi_field_variant() {
    let output = run(
        "union Msg { Move(Int, Int), Quit };\n\
         var m = new Move(3, 4);\n\
         switch (m) {\n\
             case Move(var x, var y): PrintLine(x + y);\n\
             case Quit: PrintLine(0);\n\
         }",
    );
    assert_eq!(output, "7\n");
}

#[test]
fn test_struct_passed_to_function() {
    let output = run(
        "struct Point { x: Int, y: Int };\n\
         fixed sum = \\(var p: Point): Int { return p.x + p.y; };\n\
         PrintLine(sum(new Point(2, 9)));",
    );
    assert_eq!(output, "11\n");
}

// ==================== Includes ====================

#[test]
fn test_include_splices_declarations() {
    use std::io::Write;
    let dir = tempfile::tempdir().expect("temp dir");
    let included = dir.path().join("lib.mdr");
    let mut file = std::fs::File::create(&included).expect("create include");
    writeln!(file, "fixed triple = \\(var n: Int): Int {{ return n * 3; }};")
        .expect("write include");

    let source = format!(
        "#include \"{}\"\nPrintLine(triple(4));",
        included.display()
    );
    assert_eq!(run(&source), "12\n");
}
