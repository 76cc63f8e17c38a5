//! L3 Core: the value model, managed heap, scopes and AST types for the
//! L3 tree-walking interpreter.
//!
//! This crate is deliberately dispatcher-agnostic — it knows how a
//! function's arity and currying work, how a vector is sliced, how the
//! heap is swept, but not how an `if` statement is executed. That lives in
//! `l3-runtime`, which depends on this crate and implements the [`Engine`]
//! trait this crate's function objects call back into.
//!
//! # Modules
//!
//! - `ast`: the AST node types a driver builds and hands to the interpreter
//! - `value`: `Primitive` and `Value`, same-type arithmetic and comparison
//! - `heap`: the managed heap, reference handles, mark-and-sweep GC
//! - `scope`: lexical scopes, the scope stack, and their RAII guards
//! - `eval_stack`: GC roots for in-flight expression results
//! - `function`: function objects and the currying call protocol
//! - `engine`: the trait boundary `l3-runtime`'s `Interpreter` implements
//! - `error`: the runtime error taxonomy

pub mod ast;
pub mod engine;
pub mod error;
pub mod eval_stack;
pub mod format;
pub mod function;
pub mod heap;
pub mod scope;
pub mod value;

pub use engine::Engine;
pub use error::{ErrorKind, L3Error, L3Result};
pub use eval_stack::{EvalFrameGuard, EvalStack};
pub use format::render;
pub use function::{BuiltinFunction, Function, UserFunction};
pub use heap::{GC_TRIGGER_THRESHOLD, GcConfig, Heap, ReferenceHandle};
pub use scope::{Mutability, Scope, ScopeFrameGuard, ScopeStack, ScopeStackOverlay, Variable};
pub use value::{Primitive, Value, VectorData, VectorSlot};
