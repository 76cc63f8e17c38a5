//! Shared helpers for hand-building ASTs and capturing interpreter output.
//! There is no parser in this workspace, so every test constructs the tree
//! it wants to run directly.

#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, BufReader, Write};
use std::rc::Rc;

use l3_core::ast::*;
use l3_core::Mutability;
use l3_runtime::Interpreter;

#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("interpreter output must be valid utf-8")
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `block` as a program and return everything written to stdout.
pub fn run(block: Block) -> (l3_core::L3Result<()>, String) {
    let out = SharedBuffer::default();
    let input = BufReader::new(io::empty());
    let mut interp = Interpreter::with_io(Box::new(out.clone()), Box::new(input));
    let program = Program { block };
    let result = interp.try_run(&program);
    (result, out.contents())
}

pub fn block(statements: Vec<Statement>) -> Block {
    Block { statements, last: None }
}

pub fn block_last(statements: Vec<Statement>, last: LastStatement) -> Block {
    Block { statements, last: Some(last) }
}

pub fn let_stmt(name: &str, expr: Expression) -> Statement {
    Statement::Declaration { names: vec![name.to_string()], mutability: Mutability::Immutable, expr: Some(expr) }
}

pub fn let_mut(name: &str, expr: Expression) -> Statement {
    Statement::Declaration { names: vec![name.to_string()], mutability: Mutability::Mutable, expr: Some(expr) }
}

pub fn assign(name: &str, expr: Expression) -> Statement {
    Statement::NameAssignment { names: vec![name.to_string()], expr }
}

pub fn op_assign(name: &str, op: AssignOp, expr: Expression) -> Statement {
    Statement::OperatorAssignment { target: AssignTarget::Identifier(name.to_string()), op, expr }
}

pub fn expr_stmt(expr: Expression) -> Statement {
    Statement::Expr(expr)
}

pub fn named_fn(name: &str, params: Vec<&str>, body: Block) -> Statement {
    let body = FunctionBody { params: params.into_iter().map(str::to_string).collect(), block: body };
    Statement::NamedFunction { name: name.to_string(), body: Rc::new(body) }
}

pub fn anon_fn(params: Vec<&str>, body: Block) -> Expression {
    let body = FunctionBody { params: params.into_iter().map(str::to_string).collect(), block: body };
    Expression::AnonymousFunction { body: Rc::new(body) }
}

pub fn nil() -> Expression {
    Expression::Literal(Literal::Nil)
}

pub fn int(i: i64) -> Expression {
    Expression::Literal(Literal::Int(i))
}

pub fn string(s: &str) -> Expression {
    Expression::Literal(Literal::Str(s.to_string()))
}

pub fn id(name: &str) -> Expression {
    Expression::Identifier(name.to_string())
}

pub fn array(items: Vec<Expression>) -> Expression {
    Expression::Literal(Literal::Array(items))
}

pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression) -> Expression {
    Expression::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }
}

pub fn compare(first: Expression, op: CompareOp, rhs: Expression) -> Expression {
    Expression::Comparison { first: Box::new(first), chain: vec![(op, rhs)] }
}

pub fn call(callee: Expression, args: Vec<Expression>) -> Expression {
    Expression::Call { callee: Box::new(callee), args }
}

pub fn ret(expr: Expression) -> LastStatement {
    LastStatement::Return(Some(expr))
}

pub fn if_stmt(condition: Expression, then: Block, else_block: Option<Block>) -> Statement {
    Statement::If(IfStatement { base: IfBranch { condition, block: then }, elseifs: Vec::new(), else_block })
}
