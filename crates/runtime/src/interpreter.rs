//! The tree-walking dispatcher: `evaluate` turns an `Expression` into a
//! `ReferenceHandle`, `execute` runs a `Statement` for its side effects.
//!
//! Function calls never unwind via Rust panics or exceptions — `return`,
//! `break` and `continue` are represented by [`FlowControl`], a plain state
//! word checked after every nested block/statement executes. This mirrors
//! the state-word strategy the original VM settled on over an
//! exception-based one: a stray `break` outside a loop is a normal error
//! return, not a caught panic.

use std::cell::RefCell;
use std::io::{self, BufRead, BufReader, Write};
use std::rc::Rc;

use l3_core::ast::{
    AssignOp, AssignTarget, Block, CompareOp, Expression, FunctionBody, Identifier, IfBranch,
    IfExpression, IfStatement, LastStatement, Literal, Program, Statement, UnaryOp,
};
use l3_core::{
    Engine, EvalFrameGuard, EvalStack, Function, GcConfig, Heap, L3Error, L3Result, Mutability,
    Primitive, ReferenceHandle, Scope, ScopeFrameGuard, ScopeStack, ScopeStackOverlay, UserFunction,
    Value,
};

use crate::intrinsics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlowControl {
    Normal,
    Return,
    Break,
    Continue,
}

/// A call's argument scope can target either a plain variable or a vector
/// element; both paths end up here so `OperatorAssignment` has one place to
/// read-then-rebind through.
enum LValue {
    Variable(ScopeStack, Identifier),
    VectorSlot(l3_core::VectorSlot),
}

impl LValue {
    fn read(&self) -> L3Result<ReferenceHandle> {
        match self {
            LValue::Variable(scopes, name) => scopes
                .read(name)
                .ok_or_else(|| L3Error::name(format!("undefined variable '{name}'"))),
            LValue::VectorSlot(slot) => Ok(slot.read()),
        }
    }

    fn write(&self, handle: ReferenceHandle) -> L3Result<()> {
        match self {
            LValue::Variable(scopes, name) => {
                if !scopes.assign(name, handle)? {
                    return Err(L3Error::name(format!("undefined variable '{name}'")));
                }
                Ok(())
            }
            LValue::VectorSlot(slot) => {
                slot.write(handle);
                Ok(())
            }
        }
    }
}

pub struct Interpreter {
    heap: Heap,
    scopes: RefCell<ScopeStack>,
    eval_stack: EvalStack,
    builtins: Vec<(&'static str, ReferenceHandle)>,
    flow_control: FlowControl,
    return_value: Option<ReferenceHandle>,
    output: Box<dyn Write>,
    input: Box<dyn BufRead>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_io(Box::new(io::stdout()), Box::new(BufReader::new(io::stdin())))
    }

    pub fn with_io(output: Box<dyn Write>, input: Box<dyn BufRead>) -> Self {
        Self::with_config_and_io(GcConfig::default(), output, input)
    }

    pub fn with_gc_config(gc_config: GcConfig) -> Self {
        Self::with_config_and_io(gc_config, Box::new(io::stdout()), Box::new(BufReader::new(io::stdin())))
    }

    pub fn with_config_and_io(gc_config: GcConfig, output: Box<dyn Write>, input: Box<dyn BufRead>) -> Self {
        let mut heap = Heap::with_config(gc_config);
        let builtins = intrinsics::install(&mut heap);
        Self {
            heap,
            scopes: RefCell::new(ScopeStack::new()),
            eval_stack: EvalStack::new(),
            builtins,
            flow_control: FlowControl::Normal,
            return_value: None,
            output,
            input,
        }
    }

    fn current_scopes(&self) -> ScopeStack {
        self.scopes.borrow().clone()
    }

    fn lookup_builtin(&self, name: &str) -> Option<ReferenceHandle> {
        self.builtins.iter().find(|(n, _)| *n == name).map(|(_, h)| h.clone())
    }

    /// Run `program`, printing any uncaught error to stderr. This is the
    /// entry point a driver calls; see [`Interpreter::try_run`] for the
    /// `Result`-returning form tests use.
    pub fn run(&mut self, program: &Program) {
        if let Err(err) = self.try_run(program) {
            eprintln!("{err}");
        }
    }

    pub fn try_run(&mut self, program: &Program) -> L3Result<()> {
        self.execute_block(&program.block)?;
        if self.flow_control != FlowControl::Normal {
            return Err(L3Error::runtime("return, break or continue from top-level code is not allowed"));
        }
        Ok(())
    }

    // ---- expressions ----------------------------------------------------

    pub fn evaluate(&mut self, expr: &Expression) -> L3Result<ReferenceHandle> {
        let handle = self.evaluate_inner(expr)?;
        self.eval_stack.pin(handle.clone());
        Ok(handle)
    }

    fn evaluate_inner(&mut self, expr: &Expression) -> L3Result<ReferenceHandle> {
        match expr {
            Expression::Literal(lit) => self.evaluate_literal(lit),
            Expression::Identifier(name) => self.read_variable(name),
            Expression::Unary { op, expr } => {
                let value = self.evaluate(expr)?.clone_value();
                let result = match op {
                    UnaryOp::Neg => value.negative()?,
                    UnaryOp::Pos => value.positive()?,
                    UnaryOp::Not => value.not_op()?,
                };
                Ok(self.heap.store(result))
            }
            Expression::Binary { op, lhs, rhs } => {
                let l = self.evaluate(lhs)?.clone_value();
                let r = self.evaluate(rhs)?.clone_value();
                let result = match op {
                    l3_core::ast::BinaryOp::Add => l.add(&r)?,
                    l3_core::ast::BinaryOp::Sub => l.sub(&r)?,
                    l3_core::ast::BinaryOp::Mul => l.mul(&r)?,
                    l3_core::ast::BinaryOp::Div => l.div(&r)?,
                    l3_core::ast::BinaryOp::Mod => l.rem(&r)?,
                };
                Ok(self.heap.store(result))
            }
            Expression::Logical { op, lhs, rhs } => {
                let lhs_handle = self.evaluate(lhs)?;
                let truthy = lhs_handle.clone_value().is_truthy()?;
                match (op, truthy) {
                    (l3_core::ast::LogicalOp::And, false) => Ok(lhs_handle),
                    (l3_core::ast::LogicalOp::And, true) => self.evaluate(rhs),
                    (l3_core::ast::LogicalOp::Or, true) => Ok(lhs_handle),
                    (l3_core::ast::LogicalOp::Or, false) => self.evaluate(rhs),
                }
            }
            Expression::Comparison { first, chain } => self.evaluate_comparison(first, chain),
            Expression::Call { callee, args } => self.evaluate_call(callee, args),
            Expression::Index { base, index } => {
                let base_value = self.evaluate(base)?.clone_value();
                let idx = expect_int(&self.evaluate(index)?.clone_value())?;
                Ok(self.heap.store(base_value.index(idx)?))
            }
            Expression::AnonymousFunction { body } => {
                let captures = self.current_scopes().snapshot();
                let function = UserFunction::new(captures, Rc::clone(body), None);
                Ok(self.heap.store(Value::Function(Function::User(Rc::new(function)))))
            }
            Expression::If(if_expr) => self.evaluate_if_expression(if_expr),
        }
    }

    fn evaluate_literal(&mut self, lit: &Literal) -> L3Result<ReferenceHandle> {
        match lit {
            Literal::Nil => Ok(self.heap.nil()),
            Literal::Bool(b) => Ok(self.heap.bool_handle(*b)),
            Literal::Int(i) => Ok(self.heap.store(Value::Primitive(Primitive::Int(*i)))),
            Literal::Float(x) => Ok(self.heap.store(Value::Primitive(Primitive::Float(*x)))),
            Literal::Str(s) => Ok(self.heap.store(Value::Primitive(Primitive::Str(s.clone())))),
            Literal::Array(items) => {
                let mut handles = Vec::with_capacity(items.len());
                for item in items {
                    handles.push(self.evaluate(item)?);
                }
                Ok(self.heap.store(Value::Vector(Rc::new(RefCell::new(handles)))))
            }
        }
    }

    fn evaluate_comparison(
        &mut self,
        first: &Expression,
        chain: &[(CompareOp, Expression)],
    ) -> L3Result<ReferenceHandle> {
        let mut current = self.evaluate(first)?.clone_value();
        for (op, rhs_expr) in chain {
            let rhs = self.evaluate(rhs_expr)?.clone_value();
            let ord = current.compare(&rhs);
            let passes = match op {
                CompareOp::Eq => ord == Some(std::cmp::Ordering::Equal),
                CompareOp::Ne => ord != Some(std::cmp::Ordering::Equal),
                CompareOp::Lt => ord == Some(std::cmp::Ordering::Less),
                CompareOp::Le => matches!(ord, Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)),
                CompareOp::Gt => ord == Some(std::cmp::Ordering::Greater),
                CompareOp::Ge => matches!(ord, Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)),
            };
            if !passes {
                return Ok(self.heap.bool_handle(false));
            }
            current = rhs;
        }
        Ok(self.heap.bool_handle(true))
    }

    fn evaluate_call(&mut self, callee: &Expression, args: &[Expression]) -> L3Result<ReferenceHandle> {
        let callee_value = self.evaluate(callee)?.clone_value();
        let Value::Function(function) = callee_value else {
            return Err(L3Error::type_error(format!("'{}' is not a function", callee_value.type_name())));
        };
        let mut arg_handles = Vec::with_capacity(args.len());
        for arg in args {
            arg_handles.push(self.evaluate(arg)?);
        }
        let result = function.call(self, &arg_handles)?;
        if self.flow_control != FlowControl::Normal {
            let leaked = self.flow_control;
            self.flow_control = FlowControl::Normal;
            return Err(L3Error::runtime(format!("unexpected {leaked:?} outside a loop")));
        }
        Ok(result)
    }

    fn evaluate_if_expression(&mut self, if_expr: &IfExpression) -> L3Result<ReferenceHandle> {
        for branch in std::iter::once(&if_expr.base).chain(if_expr.elseifs.iter()) {
            if self.evaluate_branch_condition(branch)? {
                self.execute_block(&branch.block)?;
                return self.take_return_value_or_error();
            }
        }
        self.execute_block(&if_expr.else_block)?;
        self.take_return_value_or_error()
    }

    fn evaluate_branch_condition(&mut self, branch: &IfBranch) -> L3Result<bool> {
        self.evaluate(&branch.condition)?.clone_value().is_truthy()
    }

    fn take_return_value_or_error(&mut self) -> L3Result<ReferenceHandle> {
        if self.flow_control == FlowControl::Return {
            self.flow_control = FlowControl::Normal;
            Ok(self.return_value.take().unwrap_or_else(|| self.heap.nil()))
        } else {
            Err(L3Error::runtime("if expression did not return a value"))
        }
    }

    fn read_variable(&self, name: &str) -> L3Result<ReferenceHandle> {
        self.current_scopes()
            .read(name)
            .or_else(|| self.lookup_builtin(name))
            .ok_or_else(|| L3Error::name(format!("undefined variable '{name}'")))
    }

    fn resolve_lvalue(&mut self, target: &AssignTarget) -> L3Result<LValue> {
        match target {
            AssignTarget::Identifier(name) => {
                let scopes = self.current_scopes();
                if scopes.read(name).is_none() {
                    if self.lookup_builtin(name).is_some() {
                        return Err(L3Error::runtime(format!("cannot modify builtin function '{name}'")));
                    }
                    return Err(L3Error::name(format!("undefined variable '{name}'")));
                }
                Ok(LValue::Variable(scopes, name.clone()))
            }
            AssignTarget::Index { base, index } => {
                let base_value = self.evaluate(base)?.clone_value();
                let idx = expect_int(&self.evaluate(index)?.clone_value())?;
                Ok(LValue::VectorSlot(base_value.index_mut(idx)?))
            }
        }
    }

    // ---- statements -------------------------------------------------------

    pub fn execute_block(&mut self, block: &Block) -> L3Result<()> {
        let _scope_guard = ScopeFrameGuard::new(&self.current_scopes());
        let _eval_guard = EvalFrameGuard::new(&self.eval_stack);
        for stmt in &block.statements {
            self.execute_statement(stmt)?;
            if self.flow_control != FlowControl::Normal {
                return Ok(());
            }
        }
        if let Some(last) = &block.last {
            self.execute_last_statement(last)?;
        }
        Ok(())
    }

    fn execute_statement(&mut self, stmt: &Statement) -> L3Result<()> {
        self.dispatch_statement(stmt)?;
        if self.heap.should_sweep() {
            self.force_gc();
        }
        Ok(())
    }

    fn dispatch_statement(&mut self, stmt: &Statement) -> L3Result<()> {
        match stmt {
            Statement::Block(block) => self.execute_block(block),
            Statement::Declaration { names, mutability, expr } => {
                self.execute_declaration(names, *mutability, expr.as_ref())
            }
            Statement::NameAssignment { names, expr } => self.execute_name_assignment(names, expr),
            Statement::OperatorAssignment { target, op, expr } => {
                self.execute_operator_assignment(target, *op, expr)
            }
            Statement::If(if_stmt) => self.execute_if_statement(if_stmt),
            Statement::While { condition, body } => self.execute_while(condition, body),
            Statement::ForLoop { var, mutability, collection, body } => {
                self.execute_for_loop(var, *mutability, collection, body)
            }
            Statement::RangeForLoop { var, mutability, start, end, step, inclusive, body } => {
                self.execute_range_for_loop(var, *mutability, start, end, step.as_ref(), *inclusive, body)
            }
            Statement::NamedFunction { name, body } => self.execute_named_function(name, body),
            Statement::Expr(expr) => {
                self.evaluate(expr)?;
                Ok(())
            }
        }
    }

    fn execute_last_statement(&mut self, last: &LastStatement) -> L3Result<()> {
        match last {
            LastStatement::Return(expr) => {
                let handle = match expr {
                    Some(e) => self.evaluate(e)?,
                    None => self.heap.nil(),
                };
                self.return_value = Some(handle);
                self.flow_control = FlowControl::Return;
            }
            LastStatement::Break => self.flow_control = FlowControl::Break,
            LastStatement::Continue => self.flow_control = FlowControl::Continue,
        }
        Ok(())
    }

    fn execute_declaration(
        &mut self,
        names: &[Identifier],
        mutability: Mutability,
        expr: Option<&Expression>,
    ) -> L3Result<()> {
        match expr {
            None => {
                for name in names {
                    let handle = self.heap.nil();
                    self.current_scopes().declare_top(name, handle, mutability)?;
                }
                Ok(())
            }
            Some(e) if names.len() == 1 => {
                let handle = self.evaluate(e)?;
                self.current_scopes().declare_top(&names[0], handle, mutability)?;
                Ok(())
            }
            Some(e) => {
                let items = self.evaluate_destructured(e, names.len())?;
                for (name, item) in names.iter().zip(items) {
                    self.current_scopes().declare_top(name, item, mutability)?;
                }
                Ok(())
            }
        }
    }

    fn execute_name_assignment(&mut self, names: &[Identifier], expr: &Expression) -> L3Result<()> {
        if names.len() == 1 {
            let handle = self.evaluate(expr)?;
            if !self.current_scopes().assign(&names[0], handle)? {
                return Err(L3Error::name(format!("undefined variable '{}'", names[0])));
            }
            return Ok(());
        }
        let items = self.evaluate_destructured(expr, names.len())?;
        for (name, item) in names.iter().zip(items) {
            if !self.current_scopes().assign(name, item)? {
                return Err(L3Error::name(format!("undefined variable '{name}'")));
            }
        }
        Ok(())
    }

    fn evaluate_destructured(&mut self, expr: &Expression, expected: usize) -> L3Result<Vec<ReferenceHandle>> {
        let value = self.evaluate(expr)?.clone_value();
        let Value::Vector(items) = value else {
            return Err(L3Error::type_error("destructuring requires a vector value"));
        };
        let items = items.borrow();
        if items.len() != expected {
            return Err(L3Error::value(format!(
                "destructuring expected {} values, got {}",
                expected,
                items.len()
            )));
        }
        Ok(items.clone())
    }

    fn execute_operator_assignment(
        &mut self,
        target: &AssignTarget,
        op: AssignOp,
        expr: &Expression,
    ) -> L3Result<()> {
        let lvalue = self.resolve_lvalue(target)?;
        let rhs = self.evaluate(expr)?.clone_value();

        match op {
            AssignOp::Assign => {
                let handle = self.heap.store(rhs);
                lvalue.write(handle)
            }
            AssignOp::AddAssign => {
                let current_handle = lvalue.read()?;
                let is_container = matches!(&*current_handle.get(), Value::Vector(_));
                if is_container {
                    current_handle.get().add_assign(&rhs)
                } else {
                    let new_value = current_handle.clone_value().add(&rhs)?;
                    lvalue.write(self.heap.store(new_value))
                }
            }
            AssignOp::SubAssign => {
                let current = lvalue.read()?.clone_value();
                let new_value = current.sub(&rhs)?;
                lvalue.write(self.heap.store(new_value))
            }
            AssignOp::MulAssign => {
                let current_handle = lvalue.read()?;
                let is_container = matches!(&*current_handle.get(), Value::Vector(_));
                if is_container {
                    let n = expect_int(&rhs)?;
                    current_handle.get().mul_assign(n)
                } else {
                    let new_value = current_handle.clone_value().mul(&rhs)?;
                    lvalue.write(self.heap.store(new_value))
                }
            }
            AssignOp::DivAssign => {
                let current = lvalue.read()?.clone_value();
                let new_value = current.div(&rhs)?;
                lvalue.write(self.heap.store(new_value))
            }
            AssignOp::ModAssign => {
                let current = lvalue.read()?.clone_value();
                let new_value = current.rem(&rhs)?;
                lvalue.write(self.heap.store(new_value))
            }
        }
    }

    fn execute_if_statement(&mut self, stmt: &IfStatement) -> L3Result<()> {
        for branch in std::iter::once(&stmt.base).chain(stmt.elseifs.iter()) {
            if self.evaluate_branch_condition(branch)? {
                return self.execute_block(&branch.block);
            }
        }
        if let Some(else_block) = &stmt.else_block {
            self.execute_block(else_block)?;
        }
        Ok(())
    }

    fn execute_while(&mut self, condition: &Expression, body: &Block) -> L3Result<()> {
        while self.evaluate(condition)?.clone_value().is_truthy()? {
            self.execute_block(body)?;
            match self.flow_control {
                FlowControl::Break => {
                    self.flow_control = FlowControl::Normal;
                    break;
                }
                FlowControl::Continue => self.flow_control = FlowControl::Normal,
                FlowControl::Return => return Ok(()),
                FlowControl::Normal => {}
            }
        }
        Ok(())
    }

    fn execute_for_loop(
        &mut self,
        var: &str,
        mutability: Mutability,
        collection: &Expression,
        body: &Block,
    ) -> L3Result<()> {
        let collection_value = self.evaluate(collection)?.clone_value();
        let items: Vec<ReferenceHandle> = match &collection_value {
            Value::Vector(v) => v.borrow().clone(),
            Value::Primitive(Primitive::Str(s)) => s
                .chars()
                .map(|c| self.heap.store(Value::Primitive(Primitive::Str(c.to_string()))))
                .collect(),
            _ => {
                return Err(L3Error::type_error(format!(
                    "cannot iterate over value of type '{}'",
                    collection_value.type_name()
                )));
            }
        };

        let _scope_guard = ScopeFrameGuard::new(&self.current_scopes());
        self.current_scopes().declare_top(var, self.heap.nil(), mutability)?;

        for item in items {
            self.current_scopes().rebind_top(var, item);
            self.execute_block(body)?;
            match self.flow_control {
                FlowControl::Break => {
                    self.flow_control = FlowControl::Normal;
                    break;
                }
                FlowControl::Continue => self.flow_control = FlowControl::Normal,
                FlowControl::Return => break,
                FlowControl::Normal => {}
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_range_for_loop(
        &mut self,
        var: &str,
        mutability: Mutability,
        start: &Expression,
        end: &Expression,
        step: Option<&Expression>,
        inclusive: bool,
        body: &Block,
    ) -> L3Result<()> {
        let start_v = expect_int(&self.evaluate(start)?.clone_value())?;
        let mut end_v = expect_int(&self.evaluate(end)?.clone_value())?;
        let step_v = match step {
            Some(e) => expect_int(&self.evaluate(e)?.clone_value())?,
            None => 1,
        };
        if step_v == 0 {
            return Err(L3Error::runtime("range step cannot be zero"));
        }
        if inclusive {
            end_v += if step_v > 0 { 1 } else { -1 };
        }

        let _scope_guard = ScopeFrameGuard::new(&self.current_scopes());
        self.current_scopes().declare_top(var, self.heap.nil(), mutability)?;

        let mut i = start_v;
        while (step_v > 0 && i < end_v) || (step_v < 0 && i > end_v) {
            let handle = self.heap.store(Value::Primitive(Primitive::Int(i)));
            self.current_scopes().rebind_top(var, handle);
            self.execute_block(body)?;
            match self.flow_control {
                FlowControl::Break => {
                    self.flow_control = FlowControl::Normal;
                    break;
                }
                FlowControl::Continue => self.flow_control = FlowControl::Normal,
                FlowControl::Return => break,
                FlowControl::Normal => {}
            }
            i += step_v;
        }
        Ok(())
    }

    fn execute_named_function(&mut self, name: &str, body: &Rc<FunctionBody>) -> L3Result<()> {
        let captures = self.current_scopes().snapshot();
        let function = UserFunction::new(captures, Rc::clone(body), Some(name.to_string()));
        let handle = self.heap.store(Value::Function(Function::User(Rc::new(function))));
        self.current_scopes().declare_top(name, handle, Mutability::Immutable)
    }
}

fn expect_int(value: &Value) -> L3Result<i64> {
    match value {
        Value::Primitive(Primitive::Int(i)) => Ok(*i),
        other => Err(L3Error::type_error(format!("expected an int, got '{}'", other.type_name()))),
    }
}

impl Engine for Interpreter {
    fn store(&mut self, value: Value) -> ReferenceHandle {
        self.heap.store(value)
    }

    fn call_user_body(
        &mut self,
        captures: &ScopeStack,
        arguments: Scope,
        body: &Rc<FunctionBody>,
    ) -> L3Result<ReferenceHandle> {
        let overlay = ScopeStackOverlay::new(&self.scopes, captures.clone());
        let result = (|| {
            let _frame = ScopeFrameGuard::with_scope(&self.current_scopes(), arguments);
            self.execute_block(&body.block)?;
            if self.flow_control == FlowControl::Return {
                self.flow_control = FlowControl::Normal;
                Ok(self.return_value.take().unwrap_or_else(|| self.heap.nil()))
            } else {
                Ok(self.heap.nil())
            }
        })();
        drop(overlay);
        result
    }

    fn call_function(&mut self, function: &Function, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
        function.call(self, args)
    }

    fn force_gc(&mut self) -> usize {
        self.current_scopes().mark();
        self.eval_stack.mark();
        if let Some(rv) = &self.return_value {
            rv.mark();
        }
        for (_, handle) in &self.builtins {
            handle.mark();
        }
        self.heap.sweep()
    }

    fn print(&mut self, text: &str) {
        let _ = self.output.write_all(text.as_bytes());
        let _ = self.output.flush();
    }

    fn read_line(&mut self) -> L3Result<Option<String>> {
        let mut line = String::new();
        let read = self.input.read_line(&mut line).map_err(|e| L3Error::runtime(e.to_string()))?;
        if read == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}
