//! Human-readable rendering of values.
//!
//! A string renders bare at the top level (what `print`/`str` produce) but
//! quoted when nested inside a vector's `[...]` rendering — `print(["a"])`
//! shows `["a"]`, not `[a]`. [`Value`]'s `Display` impl always uses the
//! top-level (bare) form; [`render`] is what to reach for when the nesting
//! matters.

use std::fmt;

use crate::function::Function;
use crate::value::{Primitive, Value};

pub fn render(value: &Value, top_level: bool) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Primitive(Primitive::Str(s)) if top_level => s.clone(),
        Value::Primitive(Primitive::Str(s)) => format!("\"{s}\""),
        Value::Primitive(p) => p.to_string(),
        Value::Function(f) => format!("function <{}>", f.display_name()),
        Value::Vector(v) => {
            let items: Vec<String> = v.borrow().iter().map(|h| render(&h.clone_value(), false)).collect();
            format!("[{}]", items.join(", "))
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self, true))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function <{}>", self.display_name())
    }
}
