//! Lexical scopes and the scope stack.
//!
//! A `Scope` is a flat, linearly-scanned list of bindings (small enough per
//! frame that a `HashMap` would only add overhead). A `ScopeStack` is a
//! shared, clonable handle to an ordered list of scopes — cloning it (done
//! when an anonymous function captures its defining environment) shares the
//! same underlying scopes, so writes through one handle are visible through
//! the other, which is what makes closures close over mutable variables
//! rather than a snapshot of them.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{L3Error, L3Result};
use crate::heap::ReferenceHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    Mutable,
    Immutable,
}

#[derive(Clone)]
pub struct Variable {
    pub reference: ReferenceHandle,
    pub mutability: Mutability,
}

/// One lexical frame. Declarations are pushed to the front, so a linear
/// scan from the front finds the most recently declared binding of a given
/// name first — not that a well-formed scope should ever have two, since
/// [`Scope::declare`] rejects redeclaration.
#[derive(Default)]
pub struct Scope {
    variables: Vec<(String, Variable)>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: &str, reference: ReferenceHandle, mutability: Mutability) -> L3Result<()> {
        if self.get(name).is_some() {
            return Err(L3Error::name(format!("variable '{name}' already declared")));
        }
        self.variables.insert(0, (name.to_string(), Variable { reference, mutability }));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.iter_mut().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub(crate) fn mark(&self) {
        for (_, var) in &self.variables {
            var.reference.mark();
        }
    }

    /// Clone every binding's *current value* into a fresh heap cell. Used
    /// when building a curried function's argument scope, so that a partial
    /// application can be reapplied repeatedly without the reapplications
    /// aliasing each other's arguments.
    pub fn clone_with_fresh_cells(&self, mut store: impl FnMut(crate::value::Value) -> ReferenceHandle) -> Scope {
        let mut cloned = Scope::new();
        // iterate oldest-declared-first (reverse of our front-insert order)
        // and re-declare the same way, so relative order is preserved.
        for (name, var) in self.variables.iter().rev() {
            let value = var.reference.clone_value();
            let new_ref = store(value);
            cloned
                .declare(name, new_ref, var.mutability)
                .expect("a scope being cloned cannot contain duplicate names");
        }
        cloned
    }
}

/// A shared handle to an ordered list of lexical scopes. Cheap to clone:
/// the clone shares the same underlying `Scope`s (see module docs).
#[derive(Clone, Default)]
pub struct ScopeStack(Rc<RefCell<Vec<Rc<RefCell<Scope>>>>>);

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, scope: Scope) {
        self.0.borrow_mut().push(Rc::new(RefCell::new(scope)));
    }

    pub fn pop(&self) {
        self.0.borrow_mut().pop();
    }

    pub fn depth(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn read(&self, name: &str) -> Option<ReferenceHandle> {
        for scope in self.0.borrow().iter().rev() {
            if let Some(var) = scope.borrow().get(name) {
                return Some(var.reference.clone());
            }
        }
        None
    }

    /// Rebind `name` (found in the nearest enclosing scope) to point at a
    /// new reference handle. Returns `Ok(false)` if no such variable is
    /// declared anywhere on the stack.
    pub fn assign(&self, name: &str, reference: ReferenceHandle) -> L3Result<bool> {
        for scope in self.0.borrow().iter().rev() {
            let mut scope = scope.borrow_mut();
            if let Some(var) = scope.get_mut(name) {
                if var.mutability == Mutability::Immutable {
                    return Err(L3Error::runtime(format!("cannot modify immutable variable '{name}'")));
                }
                var.reference = reference;
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn declare_top(&self, name: &str, reference: ReferenceHandle, mutability: Mutability) -> L3Result<()> {
        let scopes = self.0.borrow();
        let top = scopes.last().expect("scope stack must have at least one frame to declare into");
        top.borrow_mut().declare(name, reference, mutability)
    }

    /// Rebind `name` in the innermost scope to a new reference handle,
    /// bypassing the immutability check `assign` enforces. Used by `for`
    /// loops to bind their control variable to each element in turn, which
    /// is the loop's own bookkeeping rather than a user-level assignment.
    pub fn rebind_top(&self, name: &str, reference: ReferenceHandle) {
        let scopes = self.0.borrow();
        let top = scopes.last().expect("scope stack must have at least one frame to rebind into");
        let mut top = top.borrow_mut();
        if let Some(var) = top.get_mut(name) {
            var.reference = reference;
        }
    }

    /// A shallow copy sharing the same underlying scopes — this is how a
    /// closure captures "the current scope stack at definition time" while
    /// still observing later mutations made through the original handle.
    pub fn snapshot(&self) -> ScopeStack {
        Self(Rc::new(RefCell::new(self.0.borrow().clone())))
    }

    pub(crate) fn mark(&self) {
        for scope in self.0.borrow().iter() {
            scope.borrow().mark();
        }
    }
}

/// RAII guard that pushes a fresh [`Scope`] on construction and pops it on
/// drop — including when dropped during early return via `?`, which is how
/// this crate implements the "released on every exit path" guarantee
/// without resorting to exceptions.
pub struct ScopeFrameGuard(ScopeStack);

impl ScopeFrameGuard {
    pub fn new(stack: &ScopeStack) -> Self {
        stack.push(Scope::new());
        Self(stack.clone())
    }

    /// Push an already-built scope (e.g. a function call's bound arguments)
    /// instead of an empty one.
    pub fn with_scope(stack: &ScopeStack, scope: Scope) -> Self {
        stack.push(scope);
        Self(stack.clone())
    }
}

impl Drop for ScopeFrameGuard {
    fn drop(&mut self) {
        self.0.pop();
    }
}

/// RAII guard that swaps in a different active [`ScopeStack`] (a function's
/// captured environment) for its lifetime, restoring the previous one on
/// drop. Used when entering a function call: the call executes against its
/// closure's captured stack, not the caller's.
pub struct ScopeStackOverlay<'a> {
    cell: &'a RefCell<ScopeStack>,
    previous: ScopeStack,
}

impl<'a> ScopeStackOverlay<'a> {
    pub fn new(cell: &'a RefCell<ScopeStack>, new_stack: ScopeStack) -> Self {
        let previous = cell.replace(new_stack);
        Self { cell, previous }
    }
}

impl Drop for ScopeStackOverlay<'_> {
    fn drop(&mut self) {
        self.cell.replace(self.previous.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;
    use crate::value::{Primitive, Value};

    #[test]
    fn redeclaration_is_a_name_error() {
        let heap = Heap::new();
        let mut scope = Scope::new();
        scope.declare("x", heap.nil(), Mutability::Mutable).unwrap();
        let err = scope.declare("x", heap.nil(), Mutability::Mutable).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Name);
    }

    #[test]
    fn stack_lookup_favors_the_innermost_scope() {
        let mut heap = Heap::new();
        let stack = ScopeStack::new();
        stack.push(Scope::new());
        stack
            .declare_top("x", heap.store(Value::Primitive(Primitive::Int(1))), Mutability::Mutable)
            .unwrap();
        stack.push(Scope::new());
        stack
            .declare_top("x", heap.store(Value::Primitive(Primitive::Int(2))), Mutability::Mutable)
            .unwrap();
        let found = stack.read("x").unwrap();
        assert_eq!(found.clone_value().to_string(), "2");
    }

    #[test]
    fn assigning_an_immutable_variable_errors() {
        let heap = Heap::new();
        let stack = ScopeStack::new();
        stack.push(Scope::new());
        stack.declare_top("x", heap.nil(), Mutability::Immutable).unwrap();
        let err = stack.assign("x", heap.nil()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Runtime);
    }

    #[test]
    fn snapshot_shares_scopes_with_the_original() {
        let mut heap = Heap::new();
        let stack = ScopeStack::new();
        stack.push(Scope::new());
        stack
            .declare_top("x", heap.store(Value::Primitive(Primitive::Int(1))), Mutability::Mutable)
            .unwrap();
        let captured = stack.snapshot();
        stack.assign("x", heap.store(Value::Primitive(Primitive::Int(2)))).unwrap();
        assert_eq!(captured.read("x").unwrap().clone_value().to_string(), "2");
    }

    #[test]
    fn cloned_currying_scope_gets_independent_cells() {
        let mut heap = Heap::new();
        let mut scope = Scope::new();
        let original = heap.store(Value::Primitive(Primitive::Int(1)));
        scope.declare("x", original.clone(), Mutability::Mutable).unwrap();
        let cloned = scope.clone_with_fresh_cells(|v| heap.store(v));
        assert!(!cloned.get("x").unwrap().reference.ptr_eq(&original));
        assert_eq!(cloned.get("x").unwrap().reference.clone_value().to_string(), "1");
    }
}
