//! The capability seam a function value needs from the dispatcher.
//!
//! `l3-core` owns function *objects* (arity/currying bookkeeping) but not
//! the dispatcher itself — calling a user function means executing a
//! `Block` against a captured scope stack, and only `l3-runtime`'s
//! `Interpreter` knows how to do that. `Engine` is the port; `Interpreter`
//! is the adapter, the same shape as `tower_lsp::LanguageServer` in the
//! pack: the low-level crate defines the trait, the high-level crate
//! implements it, and nothing here depends on `l3-runtime`.

use std::rc::Rc;

use crate::ast::FunctionBody;
use crate::error::L3Result;
use crate::function::Function;
use crate::heap::ReferenceHandle;
use crate::scope::{Scope, ScopeStack};
use crate::value::Value;

pub trait Engine {
    /// Allocate `value` on the heap (or return a singleton handle for
    /// `nil`/bool), per [`crate::heap::Heap::store`].
    fn store(&mut self, value: Value) -> ReferenceHandle;

    /// Run a user function's body: push `arguments` as a new scope on top
    /// of `captures`, execute the block, and return its produced value
    /// (`nil` if the body fell off the end without an explicit `return`).
    fn call_user_body(
        &mut self,
        captures: &ScopeStack,
        arguments: Scope,
        body: &Rc<FunctionBody>,
    ) -> L3Result<ReferenceHandle>;

    /// Invoke any function value (user or builtin) with already-evaluated
    /// argument handles.
    fn call_function(&mut self, function: &Function, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle>;

    /// Force a collection regardless of the trigger threshold.
    fn force_gc(&mut self) -> usize;

    fn print(&mut self, text: &str);

    fn read_line(&mut self) -> L3Result<Option<String>>;
}
