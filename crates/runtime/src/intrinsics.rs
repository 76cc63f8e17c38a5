//! The fixed set of built-in functions installed into the process-wide
//! builtins table before any program code runs.
//!
//! Every builtin is a plain `Fn(&mut dyn Engine, &[ReferenceHandle]) ->
//! L3Result<ReferenceHandle>` closure wrapped in a [`BuiltinFunction`] — the
//! same calling convention a user function's body uses, so `map`/`filter`/
//! `count` can take either a user function or another builtin as their
//! callback with no special-casing.

use std::rc::Rc;
use std::time::Duration;

use l3_core::{BuiltinFunction, Engine, Function, Heap, L3Error, L3Result, Primitive, ReferenceHandle, Value};
use rand::Rng;

pub fn install(heap: &mut Heap) -> Vec<(&'static str, ReferenceHandle)> {
    let mut builtins = Vec::new();
    macro_rules! register {
        ($name:expr, $body:expr) => {
            let function = Function::Builtin(Rc::new(BuiltinFunction::new($name, $body)));
            builtins.push(($name, heap.store(Value::Function(function))));
        };
    }

    register!("print", print_impl);
    register!("println", println_impl);
    register!("assert", assert_impl);
    register!("error", error_impl);
    register!("input", input_impl);
    register!("int", int_impl);
    register!("str", str_impl);
    register!("head", head_impl);
    register!("tail", tail_impl);
    register!("len", len_impl);
    register!("drop", drop_impl);
    register!("take", take_impl);
    register!("slice", slice_impl);
    register!("random", random_impl);
    register!("sleep", sleep_impl);
    register!("map", map_impl);
    register!("filter", filter_impl);
    register!("sum", sum_impl);
    register!("all", all_impl);
    register!("any", any_impl);
    register!("count", count_impl);
    register!("id", id_impl);
    register!("range", range_impl);
    register!("__trigger_gc", trigger_gc_impl);

    builtins
}

fn arity_error(name: &str, expected: &str, got: usize) -> L3Error {
    L3Error::runtime(format!("{name}() expects {expected}, got {got} argument(s)"))
}

fn rendered(args: &[ReferenceHandle]) -> String {
    args.iter()
        .map(|h| l3_core::render(&h.clone_value(), true))
        .collect::<Vec<_>>()
        .join(" ")
}

fn expect_int(value: &Value, who: &str) -> L3Result<i64> {
    match value {
        Value::Primitive(Primitive::Int(i)) => Ok(*i),
        other => Err(L3Error::type_error(format!("{who} expects an int, got '{}'", other.type_name()))),
    }
}

fn expect_function<'a>(value: &'a Value, who: &str) -> L3Result<&'a Function> {
    match value {
        Value::Function(f) => Ok(f),
        other => Err(L3Error::type_error(format!("{who} expects a function, got '{}'", other.type_name()))),
    }
}

fn vector_elements(value: &Value, who: &str) -> L3Result<Vec<ReferenceHandle>> {
    match value {
        Value::Vector(v) => Ok(v.borrow().clone()),
        other => Err(L3Error::type_error(format!("{who} expects a vector, got '{}'", other.type_name()))),
    }
}

fn print_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    engine.print(&rendered(args));
    Ok(engine.store(Value::Nil))
}

fn println_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    engine.print(&rendered(args));
    engine.print("\n");
    Ok(engine.store(Value::Nil))
}

fn assert_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    let Some((cond, rest)) = args.split_first() else {
        return Err(arity_error("assert", "at least 1 argument", 0));
    };
    if cond.clone_value().is_truthy()? {
        return Ok(engine.store(Value::Nil));
    }
    let message = if rest.is_empty() { "assertion failed".to_string() } else { rendered(rest) };
    Err(L3Error::runtime(message))
}

fn error_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    let _ = engine;
    Err(L3Error::runtime(rendered(args)))
}

fn input_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    if !args.is_empty() {
        engine.print(&rendered(args));
    }
    match engine.read_line()? {
        Some(line) => Ok(engine.store(Value::Primitive(Primitive::Str(line)))),
        None => Ok(engine.store(Value::Nil)),
    }
}

fn int_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    if args.is_empty() || args.len() > 2 {
        return Err(arity_error("int", "1 or 2 arguments", args.len()));
    }
    let value = args[0].clone_value();
    let base = match args.get(1) {
        Some(h) => {
            let b = expect_int(&h.clone_value(), "int")?;
            if !(2..=36).contains(&b) {
                return Err(L3Error::value("int() base must be between 2 and 36"));
            }
            Some(b as u32)
        }
        None => None,
    };
    let result = match (&value, base) {
        (Value::Primitive(Primitive::Int(i)), None) => *i,
        (Value::Primitive(Primitive::Float(f)), None) => *f as i64,
        (Value::Primitive(Primitive::Bool(b)), None) => i64::from(*b),
        (Value::Primitive(Primitive::Str(s)), base) => i64::from_str_radix(s.trim(), base.unwrap_or(10))
            .map_err(|_| L3Error::value(format!("'{s}' is not a valid integer")))?,
        (other, _) => {
            return Err(L3Error::type_error(format!("cannot convert '{}' to int", other.type_name())));
        }
    };
    Ok(engine.store(Value::Primitive(Primitive::Int(result))))
}

fn str_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    if args.len() != 1 {
        return Err(arity_error("str", "1 argument", args.len()));
    }
    let rendered = l3_core::render(&args[0].clone_value(), true);
    Ok(engine.store(Value::Primitive(Primitive::Str(rendered))))
}

fn head_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    if args.len() != 1 {
        return Err(arity_error("head", "1 argument", args.len()));
    }
    match args[0].clone_value() {
        Value::Vector(v) => {
            let items = v.borrow();
            let Some((first, rest)) = items.split_first() else {
                return Err(L3Error::value("head() of an empty vector"));
            };
            let pair = vec![first.clone(), engine.store(Value::Vector(Rc::new(std::cell::RefCell::new(rest.to_vec()))))];
            Ok(engine.store(Value::Vector(Rc::new(std::cell::RefCell::new(pair)))))
        }
        Value::Primitive(Primitive::Str(s)) => {
            let mut chars = s.chars();
            let Some(first) = chars.next() else {
                return Err(L3Error::value("head() of an empty string"));
            };
            let first_h = engine.store(Value::Primitive(Primitive::Str(first.to_string())));
            let rest_h = engine.store(Value::Primitive(Primitive::Str(chars.collect())));
            Ok(engine.store(Value::Vector(Rc::new(std::cell::RefCell::new(vec![first_h, rest_h])))))
        }
        other => Err(L3Error::type_error(format!("head() expects a vector or string, got '{}'", other.type_name()))),
    }
}

fn tail_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    if args.len() != 1 {
        return Err(arity_error("tail", "1 argument", args.len()));
    }
    match args[0].clone_value() {
        Value::Vector(v) => {
            let items = v.borrow();
            let Some((last, init)) = items.split_last() else {
                return Err(L3Error::value("tail() of an empty vector"));
            };
            let pair = vec![engine.store(Value::Vector(Rc::new(std::cell::RefCell::new(init.to_vec())))), last.clone()];
            Ok(engine.store(Value::Vector(Rc::new(std::cell::RefCell::new(pair)))))
        }
        Value::Primitive(Primitive::Str(s)) => {
            let mut chars: Vec<char> = s.chars().collect();
            let Some(last) = chars.pop() else {
                return Err(L3Error::value("tail() of an empty string"));
            };
            let init_h = engine.store(Value::Primitive(Primitive::Str(chars.into_iter().collect())));
            let last_h = engine.store(Value::Primitive(Primitive::Str(last.to_string())));
            Ok(engine.store(Value::Vector(Rc::new(std::cell::RefCell::new(vec![init_h, last_h])))))
        }
        other => Err(L3Error::type_error(format!("tail() expects a vector or string, got '{}'", other.type_name()))),
    }
}

fn len_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    if args.len() != 1 {
        return Err(arity_error("len", "1 argument", args.len()));
    }
    let length = match args[0].clone_value() {
        Value::Vector(v) => v.borrow().len(),
        Value::Primitive(Primitive::Str(s)) => s.chars().count(),
        other => return Err(L3Error::type_error(format!("len() expects a vector or string, got '{}'", other.type_name()))),
    };
    Ok(engine.store(Value::Primitive(Primitive::Int(length as i64))))
}

fn drop_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    if args.len() != 2 {
        return Err(arity_error("drop", "2 arguments", args.len()));
    }
    let value = args[0].clone_value();
    let n = expect_int(&args[1].clone_value(), "drop")?;
    let result = value.slice(Some(n), None)?;
    Ok(engine.store(result))
}

fn take_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    if args.len() != 2 {
        return Err(arity_error("take", "2 arguments", args.len()));
    }
    let value = args[0].clone_value();
    let n = expect_int(&args[1].clone_value(), "take")?;
    let result = value.slice(None, Some(n))?;
    Ok(engine.store(result))
}

fn slice_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    if args.len() != 3 {
        return Err(arity_error("slice", "3 arguments", args.len()));
    }
    let value = args[0].clone_value();
    let start = expect_int(&args[1].clone_value(), "slice")?;
    let end = expect_int(&args[2].clone_value(), "slice")?;
    let result = value.slice(Some(start), Some(end))?;
    Ok(engine.store(result))
}

fn random_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    let (low, high) = match args.len() {
        1 => (0, expect_int(&args[0].clone_value(), "random")?),
        2 => (expect_int(&args[0].clone_value(), "random")?, expect_int(&args[1].clone_value(), "random")?),
        n => return Err(arity_error("random", "1 or 2 arguments", n)),
    };
    if low > high {
        return Err(L3Error::value("random() range is empty"));
    }
    let picked = rand::thread_rng().gen_range(low..=high);
    Ok(engine.store(Value::Primitive(Primitive::Int(picked))))
}

fn sleep_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    if args.len() != 1 {
        return Err(arity_error("sleep", "1 argument", args.len()));
    }
    let millis = expect_int(&args[0].clone_value(), "sleep")?;
    if millis < 0 {
        return Err(L3Error::value("sleep() duration must not be negative"));
    }
    std::thread::sleep(Duration::from_millis(millis as u64));
    Ok(engine.store(Value::Nil))
}

fn map_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    if args.len() != 2 {
        return Err(arity_error("map", "2 arguments", args.len()));
    }
    let function = expect_function(&args[0].clone_value(), "map")?.clone();
    let elements = vector_elements(&args[1].clone_value(), "map")?;
    let mut out = Vec::with_capacity(elements.len());
    for element in elements {
        out.push(engine.call_function(&function, &[element])?);
    }
    Ok(engine.store(Value::Vector(Rc::new(std::cell::RefCell::new(out)))))
}

fn filter_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    if args.len() != 2 {
        return Err(arity_error("filter", "2 arguments", args.len()));
    }
    let function = expect_function(&args[0].clone_value(), "filter")?.clone();
    let elements = vector_elements(&args[1].clone_value(), "filter")?;
    let mut out = Vec::new();
    for element in elements {
        let kept = engine.call_function(&function, &[element.clone()])?.clone_value().is_truthy()?;
        if kept {
            out.push(element);
        }
    }
    Ok(engine.store(Value::Vector(Rc::new(std::cell::RefCell::new(out)))))
}

fn sum_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    if args.len() != 1 {
        return Err(arity_error("sum", "1 argument", args.len()));
    }
    let elements = vector_elements(&args[0].clone_value(), "sum")?;
    let Some((first, rest)) = elements.split_first() else {
        return Err(L3Error::value("sum() of an empty vector"));
    };
    let mut total = first.clone_value();
    for element in rest {
        total = total.add(&element.clone_value())?;
    }
    Ok(engine.store(total))
}

fn all_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    if args.len() != 1 {
        return Err(arity_error("all", "1 argument", args.len()));
    }
    let elements = vector_elements(&args[0].clone_value(), "all")?;
    for element in &elements {
        if !element.clone_value().is_truthy()? {
            return Ok(engine.store(Value::from_bool(false)));
        }
    }
    Ok(engine.store(Value::from_bool(true)))
}

fn any_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    if args.len() != 1 {
        return Err(arity_error("any", "1 argument", args.len()));
    }
    let elements = vector_elements(&args[0].clone_value(), "any")?;
    for element in &elements {
        if element.clone_value().is_truthy()? {
            return Ok(engine.store(Value::from_bool(true)));
        }
    }
    Ok(engine.store(Value::from_bool(false)))
}

fn count_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    if args.len() != 2 {
        return Err(arity_error("count", "2 arguments", args.len()));
    }
    let function = expect_function(&args[0].clone_value(), "count")?.clone();
    let elements = vector_elements(&args[1].clone_value(), "count")?;
    let mut total = 0i64;
    for element in elements {
        if engine.call_function(&function, &[element])?.clone_value().is_truthy()? {
            total += 1;
        }
    }
    Ok(engine.store(Value::Primitive(Primitive::Int(total))))
}

fn id_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    if args.len() != 1 {
        return Err(arity_error("id", "1 argument", args.len()));
    }
    let _ = engine;
    Ok(args[0].clone())
}

fn range_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    let (start, end, step) = match args.len() {
        1 => (0, expect_int(&args[0].clone_value(), "range")?, 1),
        2 => (
            expect_int(&args[0].clone_value(), "range")?,
            expect_int(&args[1].clone_value(), "range")?,
            1,
        ),
        3 => (
            expect_int(&args[0].clone_value(), "range")?,
            expect_int(&args[1].clone_value(), "range")?,
            expect_int(&args[2].clone_value(), "range")?,
        ),
        n => return Err(arity_error("range", "1, 2 or 3 arguments", n)),
    };
    if step == 0 {
        return Err(L3Error::value("range() step cannot be zero"));
    }
    let mut out = Vec::new();
    let mut i = start;
    while (step > 0 && i < end) || (step < 0 && i > end) {
        out.push(engine.store(Value::Primitive(Primitive::Int(i))));
        i += step;
    }
    Ok(engine.store(Value::Vector(Rc::new(std::cell::RefCell::new(out)))))
}

fn trigger_gc_impl(engine: &mut dyn Engine, args: &[ReferenceHandle]) -> L3Result<ReferenceHandle> {
    if !args.is_empty() {
        return Err(arity_error("__trigger_gc", "no arguments", args.len()));
    }
    engine.force_gc();
    Ok(engine.store(Value::Nil))
}
