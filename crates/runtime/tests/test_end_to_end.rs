//! End-to-end scenarios exercising arithmetic, recursion, loops and
//! built-ins together, hand-assembled into ASTs since this workspace has
//! no parser.

mod support;

use l3_core::ast::*;
use support::*;

#[test]
fn arithmetic_precedes_println() {
    // let x = 2 + 3 * 4; println(x)
    let program = block(vec![
        let_stmt("x", binary(BinaryOp::Add, int(2), binary(BinaryOp::Mul, int(3), int(4)))),
        expr_stmt(call(id("println"), vec![id("x")])),
    ]);
    let (result, output) = run(program);
    result.unwrap();
    assert_eq!(output, "14\n");
}

#[test]
fn recursive_fibonacci() {
    // fn fib(n) { if n < 2 { return n } return fib(n-1) + fib(n-2) }
    // println(fib(10))
    let if_branch = IfBranch {
        condition: compare(id("n"), CompareOp::Lt, int(2)),
        block: block_last(vec![], ret(id("n"))),
    };
    let fib_body = block_last(
        vec![],
        ret(binary(
            BinaryOp::Add,
            call(id("fib"), vec![binary(BinaryOp::Sub, id("n"), int(1))]),
            call(id("fib"), vec![binary(BinaryOp::Sub, id("n"), int(2))]),
        )),
    );
    let mut fib_statements = vec![Statement::If(IfStatement { base: if_branch, elseifs: vec![], else_block: None })];
    fib_statements.extend(fib_body.statements);
    let fib_block = Block { statements: fib_statements, last: fib_body.last };

    let program = block(vec![
        named_fn("fib", vec!["n"], fib_block),
        expr_stmt(call(id("println"), vec![call(id("fib"), vec![int(10)])])),
    ]);
    let (result, output) = run(program);
    result.unwrap();
    assert_eq!(output, "55\n");
}

#[test]
fn partial_application_of_add() {
    // fn add(a, b) { return a + b } let add5 = add(5); println(add5(7))
    let program = block(vec![
        named_fn("add", vec!["a", "b"], block_last(vec![], ret(binary(BinaryOp::Add, id("a"), id("b"))))),
        let_stmt("add5", call(id("add"), vec![int(5)])),
        expr_stmt(call(id("println"), vec![call(id("add5"), vec![int(7)])])),
    ]);
    let (result, output) = run(program);
    result.unwrap();
    assert_eq!(output, "12\n");
}

#[test]
fn range_for_loop_sums_to_5050() {
    // let mut s = 0; for i in range(1, 101) { s += i }; println(s)
    let program = block(vec![
        let_mut("s", int(0)),
        Statement::ForLoop {
            var: "i".to_string(),
            mutability: l3_core::Mutability::Immutable,
            collection: call(id("range"), vec![int(1), int(101)]),
            body: block(vec![op_assign("s", AssignOp::AddAssign, id("i"))]),
        },
        expr_stmt(call(id("println"), vec![id("s")])),
    ]);
    let (result, output) = run(program);
    result.unwrap();
    assert_eq!(output, "5050\n");
}

#[test]
fn map_over_a_vector_literal() {
    // let xs = [1,2,3]; let ys = map(fn(x) { return x*x }, xs); println(ys)
    let square = anon_fn(vec!["x"], block_last(vec![], ret(binary(BinaryOp::Mul, id("x"), id("x")))));
    let program = block(vec![
        let_stmt("xs", array(vec![int(1), int(2), int(3)])),
        let_stmt("ys", call(id("map"), vec![square, id("xs")])),
        expr_stmt(call(id("println"), vec![id("ys")])),
    ]);
    let (result, output) = run(program);
    result.unwrap();
    assert_eq!(output, "[1, 4, 9]\n");
}

#[test]
fn while_loop_breaks_and_leaves_no_leftover_frames() {
    // let mut n = 0; while true { n += 1; if n == 10 { break } }; println(n)
    let body = block(vec![
        op_assign("n", AssignOp::AddAssign, int(1)),
        Statement::If(IfStatement {
            base: IfBranch {
                condition: compare(id("n"), CompareOp::Eq, int(10)),
                block: block_last(vec![], LastStatement::Break),
            },
            elseifs: vec![],
            else_block: None,
        }),
    ]);
    let program = block(vec![
        let_mut("n", int(0)),
        Statement::While { condition: Expression::Literal(Literal::Bool(true)), body },
        expr_stmt(call(id("println"), vec![id("n")])),
    ]);
    let (result, output) = run(program);
    result.unwrap();
    assert_eq!(output, "10\n");
}
