//! Garbage-collector reachability properties driven end-to-end through the
//! interpreter, not just the heap unit tests in `l3-core`.

mod support;

use l3_core::ast::*;
use support::*;

#[test]
fn a_forced_sweep_does_not_collect_a_live_variable() {
    // let x = 1; __trigger_gc(); println(x)
    let program = block(vec![
        let_stmt("x", int(1)),
        expr_stmt(call(id("__trigger_gc"), vec![])),
        expr_stmt(call(id("println"), vec![id("x")])),
    ]);
    let (result, output) = run(program);
    result.unwrap();
    assert_eq!(output, "1\n");
}

#[test]
fn a_sweep_does_not_collect_a_variable_captured_by_a_live_closure() {
    // fn make() { let captured = [1,2,3]; return fn() { return captured } }
    // let getter = make(); __trigger_gc(); println(getter())
    let closure = anon_fn(vec![], block_last(vec![], ret(id("captured"))));
    let make_body = block_last(vec![let_stmt("captured", array(vec![int(1), int(2), int(3)]))], ret(closure));
    let program = block(vec![
        named_fn("make", vec![], make_body),
        let_stmt("getter", call(id("make"), vec![])),
        expr_stmt(call(id("__trigger_gc"), vec![])),
        expr_stmt(call(id("println"), vec![call(id("getter"), vec![])])),
    ]);
    let (result, output) = run(program);
    result.unwrap();
    assert_eq!(output, "[1, 2, 3]\n");
}

#[test]
fn iterating_a_vector_starting_with_nil_does_not_corrupt_the_nil_singleton() {
    // for x in [nil, 1, 2] { } ; println(nil)
    let program = block(vec![
        Statement::ForLoop {
            var: "x".to_string(),
            mutability: l3_core::Mutability::Immutable,
            collection: array(vec![nil(), int(1), int(2)]),
            body: block(vec![]),
        },
        expr_stmt(call(id("println"), vec![nil()])),
    ]);
    let (result, output) = run(program);
    result.unwrap();
    assert_eq!(output, "nil\n");
}

#[test]
fn range_for_loop_keeps_advancing_when_the_body_reassigns_the_loop_variable() {
    // let mut count = 0
    // for i in 0..5 { count += 1; i = 999 }
    // println(count)
    let program = block(vec![
        let_mut("count", int(0)),
        Statement::RangeForLoop {
            var: "i".to_string(),
            mutability: l3_core::Mutability::Mutable,
            start: int(0),
            end: int(5),
            step: None,
            inclusive: false,
            body: block(vec![op_assign("count", AssignOp::AddAssign, int(1)), assign("i", int(999))]),
        },
        expr_stmt(call(id("println"), vec![id("count")])),
    ]);
    let (result, output) = run(program);
    result.unwrap();
    assert_eq!(output, "5\n");
}

#[test]
fn repeated_allocation_past_the_trigger_threshold_still_preserves_live_values() {
    // let mut total = 0
    // for i in range(0, 12000) { total += 1 }
    // println(total)
    let program = block(vec![
        let_mut("total", int(0)),
        Statement::ForLoop {
            var: "i".to_string(),
            mutability: l3_core::Mutability::Immutable,
            collection: call(id("range"), vec![int(0), int(12_000)]),
            body: block(vec![op_assign("total", AssignOp::AddAssign, int(1))]),
        },
        expr_stmt(call(id("println"), vec![id("total")])),
    ]);
    let (result, output) = run(program);
    result.unwrap();
    assert_eq!(output, "12000\n");
}
