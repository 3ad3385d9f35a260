//! Garbage collection: reachability preservation and accounting.

mod common;
use common::*;

use midori_vm::{api, Vm};
use pretty_assertions::assert_eq;

const ALLOCATION_HEAVY: &str = "var xs = [1, 2, 3];\n\
     for (var i = 0; i < 40; i = i + 1) {\n\
         var t = xs ++ [i];\n\
         PrintLine(t[3]);\n\
     }\n\
     PrintLine(xs[0]);";

#[test]
fn test_aggressive_collection_is_observably_identical() {
    let normal = run(ALLOCATION_HEAVY);
    let aggressive = run_with_aggressive_gc(ALLOCATION_HEAVY);
    assert_eq!(normal, aggressive);
}

#[test]
fn test_collection_reclaims_garbage_bytes() {
    let executable = api::compile(ALLOCATION_HEAVY, "test.mdr").expect("compiles");
    let mut vm = Vm::new(executable);
    vm.set_gc_threshold(0);
    vm.run().expect("runs");

    let executable = api::compile(ALLOCATION_HEAVY, "test.mdr").expect("compiles");
    let mut hoarder = Vm::new(executable);
    hoarder.set_gc_threshold(usize::MAX);
    hoarder.run().expect("runs");

    let (collected_bytes, _) = vm.heap_stats();
    let (hoarded_bytes, _) = hoarder.heap_stats();
    assert!(
        collected_bytes < hoarded_bytes,
        "collector should drop dead arrays: {} vs {}",
        collected_bytes,
        hoarded_bytes
    );
}

#[test]
fn test_text_allocation_churn_with_aggressive_gc() {
    let source = "var t = \"\";\n\
         for (var i = 0; i < 30; i = i + 1) {\n\
             t = t ++ \"x\";\n\
         }\n\
         PrintTextLine(t);";
    let expected = format!("{}\n", "x".repeat(30));
    assert_eq!(run_with_aggressive_gc(source), expected);
}

#[test]
fn test_struct_graph_survives_collection() {
    let source = "struct Node { value: Int };\n\
         union Link { Empty, Next(Int) };\n\
         var nodes = [new Node(1), new Node(2)];\n\
         var junk = [0] * 100;\n\
         junk = [0];\n\
         PrintLine(nodes[1].value);";
    assert_eq!(run_with_aggressive_gc(source), "2\n");
}

#[test]
fn test_constant_pool_roots_survive_collection() {
    // The same text constant is printed after heavy churn; the pool
    // object must never be swept.
    let source = "for (var i = 0; i < 10; i = i + 1) {\n\
             var t = [i] ++ [i];\n\
             t = t;\n\
         }\n\
         PrintTextLine(\"still here\");";
    assert_eq!(run_with_aggressive_gc(source), "still here\n");
}
