//! Function objects: the runtime representation `Value::Function` wraps.
//!
//! A user function pairs its body with the scope stack captured at
//! definition time (so it closes over enclosing variables) and, once
//! partially applied, a scope of already-bound arguments. Calling with
//! fewer arguments than the function needs returns a *new* function object
//! sharing the same body and captures but with an extended argument scope
//! — currying never mutates the function being called.

use std::rc::Rc;

use crate::ast::{FunctionBody, Identifier};
use crate::engine::Engine;
use crate::error::{L3Error, L3Result};
use crate::heap::ReferenceHandle;
use crate::scope::{Mutability, Scope, ScopeStack};
use crate::value::Value;

pub const ANONYMOUS_FUNCTION_NAME: &str = "<anonymous>";

pub struct UserFunction {
    pub captures: ScopeStack,
    pub body: Rc<FunctionBody>,
    pub name: Option<Identifier>,
    /// Arguments already bound by a previous partial application, if any.
    pub curried: Option<Scope>,
}

impl UserFunction {
    pub fn new(captures: ScopeStack, body: Rc<FunctionBody>, name: Option<Identifier>) -> Self {
        Self { captures, body, name, curried: None }
    }

    fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(ANONYMOUS_FUNCTION_NAME)
    }

    /// Bind as many of `args` as the function still needs. If that's fewer
    /// than the remaining parameter count, returns a new, more-curried
    /// function value instead of calling the body.
    pub fn call(self: &Rc<Self>, engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
        let params = &self.body.params;
        let already_bound = self.curried.as_ref().map_or(0, Scope::len);
        let needed = params.len().saturating_sub(already_bound);

        if args.len() > needed {
            return Err(L3Error::runtime(format!(
                "function '{}' expected at most {} arguments, got {}",
                self.display_name(),
                params.len(),
                args.len()
            )));
        }

        let mut arguments = match &self.curried {
            Some(scope) => scope.clone_with_fresh_cells(|v| engine.store(v)),
            None => Scope::new(),
        };
        for (param, arg) in params.iter().skip(already_bound).zip(args) {
            arguments.declare(param, arg.clone(), Mutability::Mutable)?;
        }

        if args.len() < needed {
            let partial = UserFunction {
                captures: self.captures.clone(),
                body: Rc::clone(&self.body),
                name: self.name.clone(),
                curried: Some(arguments),
            };
            return Ok(engine.store(Value::Function(Function::User(Rc::new(partial)))));
        }

        engine.call_user_body(&self.captures, arguments, &self.body)
    }
}

pub type BuiltinBody = Rc<dyn Fn(&mut dyn Engine, &[ReferenceHandle]) -> L3Result<ReferenceHandle>>;

pub struct BuiltinFunction {
    pub name: &'static str,
    pub body: BuiltinBody,
}

impl BuiltinFunction {
    pub fn new(
        name: &'static str,
        body: impl Fn(&mut dyn Engine, &[ReferenceHandle]) -> L3Result<ReferenceHandle> + 'static,
    ) -> Self {
        Self { name, body: Rc::new(body) }
    }
}

#[derive(Clone)]
pub enum Function {
    User(Rc<UserFunction>),
    Builtin(Rc<BuiltinFunction>),
}

impl Function {
    pub fn call(&self, engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
        match self {
            Function::User(f) => f.call(engine, args),
            Function::Builtin(f) => (f.body)(engine, args),
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Function::User(f) => f.display_name(),
            Function::Builtin(f) => f.name,
        }
    }

    pub(crate) fn mark_captures(&self) {
        if let Function::User(f) = self {
            f.captures.mark();
            if let Some(curried) = &f.curried {
                curried.mark();
            }
        }
    }
}
