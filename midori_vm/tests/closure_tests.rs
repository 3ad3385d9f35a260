//! Closure capture, cells, and promotion behavior.

mod common;
use common::*;

use pretty_assertions::assert_eq;

#[test]
fn test_counter_closure_increments_across_calls() {
    let output = run(
        "var c = \\(): () -> Int {\n\
             var n = 0;\n\
             return \\(): Int { n = n + 1; return n; };\n\
         }();\n\
         PrintLine(c());\n\
         PrintLine(c());\n\
         PrintLine(c());",
    );
    assert_eq!(output, "1\n2\n3\n");
}

#[test]
fn test_each_factory_call_gets_its_own_cell() {
    let output = run(
        "fixed make_counter = \\(): () -> Int {\n\
             var count = 0;\n\
             return \\(): Int { count = count + 1; return count; };\n\
         };\n\
         var c1 = make_counter();\n\
         var c2 = make_counter();\n\
         PrintLine(c1());\n\
         PrintLine(c1());\n\
         PrintLine(c2());",
    );
    assert_eq!(output, "1\n2\n1\n");
}

#[test]
fn test_promotion_preserves_value_at_frame_exit() {
    // The captured variable is mutated before the frame returns; the
    // promoted cell must hold the value from the moment of return.
    let output = run(
        "fixed capture = \\(): () -> Int {\n\
             var x = 1;\n\
             x = 41;\n\
             return \\(): Int { return x; };\n\
         };\n\
         var f = capture();\n\
         PrintLine(f());",
    );
    assert_eq!(output, "41\n");
}

#[test]
fn test_closure_reads_capture_before_frame_exit() {
    let output = run(
        "fixed run_now = \\(): Int {\n\
             var x = 7;\n\
             fixed get = \\(): Int { return x; };\n\
             return get();\n\
         };\n\
         PrintLine(run_now());",
    );
    assert_eq!(output, "7\n");
}

#[test]
fn test_parameters_are_captured() {
    let output = run(
        "fixed adder = \\(var base: Int): (Int) -> Int {\n\
             return \\(var n: Int): Int { return base + n; };\n\
         };\n\
         var add10 = adder(10);\n\
         PrintLine(add10(5));\n\
         PrintLine(add10(90));",
    );
    assert_eq!(output, "15\n100\n");
}

#[test]
fn test_nested_closures_share_the_outer_cell() {
    // The level-two closure inherits the cell for `x` through the
    // level-one closure's environment.
    let output = run(
        "fixed outer = \\(): () -> Int {\n\
             var x = 5;\n\
             fixed middle = \\(): () -> Int {\n\
                 return \\(): Int { return x; };\n\
             };\n\
             return middle();\n\
         };\n\
         var f = outer();\n\
         PrintLine(f());",
    );
    assert_eq!(output, "5\n");
}

#[test]
fn test_closure_as_argument() {
    let output = run(
        "fixed twice = \\(var f: (Int) -> Int, var x: Int): Int {\n\
             return f(f(x));\n\
         };\n\
         PrintLine(twice(\\(var n: Int): Int { return n * 2; }, 3));",
    );
    assert_eq!(output, "12\n");
}

#[test]
fn test_counter_survives_intervening_allocation_and_collection() {
    let output = run_with_aggressive_gc(
        "var c = \\(): () -> Int {\n\
             var n = 0;\n\
             return \\(): Int { n = n + 1; return n; };\n\
         }();\n\
         PrintLine(c());\n\
         var junk = [1, 2, 3] ++ [4, 5, 6];\n\
         PrintLine(c());\n\
         var more = (junk ++ junk) ++ (junk ++ junk);\n\
         PrintLine(c());",
    );
    assert_eq!(output, "1\n2\n3\n");
}
