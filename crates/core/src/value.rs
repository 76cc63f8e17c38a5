//! The value model: [`Primitive`] and [`Value`].
//!
//! `Value` is what a `ReferenceHandle` points at in the heap. Primitives
//! (bool, int, float, string) are compared and combined same-type-only;
//! mixing types is a [`TypeError`](crate::error::ErrorKind::Type) for
//! arithmetic and "unordered" (not an error) for comparison. Containers
//! (`Vector`) hold `ReferenceHandle`s, not `Value`s directly, so elements
//! are independently reachable for the collector.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::error::{L3Error, L3Result};
use crate::function::Function;
use crate::heap::ReferenceHandle;

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Primitive {
    pub fn type_name(&self) -> &'static str {
        match self {
            Primitive::Bool(_) => "bool",
            Primitive::Int(_) => "int",
            Primitive::Float(_) => "float",
            Primitive::Str(_) => "string",
        }
    }

    /// Same-type `+`. Ints and floats add; strings concatenate; bools are
    /// rejected, matching the rest of the arithmetic table.
    pub fn add(&self, other: &Primitive) -> L3Result<Primitive> {
        match (self, other) {
            (Primitive::Int(a), Primitive::Int(b)) => Ok(Primitive::Int(a.wrapping_add(*b))),
            (Primitive::Float(a), Primitive::Float(b)) => Ok(Primitive::Float(a + b)),
            (Primitive::Str(a), Primitive::Str(b)) => Ok(Primitive::Str(format!("{a}{b}"))),
            _ => Err(unsupported_binop("+", self, other)),
        }
    }

    pub fn sub(&self, other: &Primitive) -> L3Result<Primitive> {
        match (self, other) {
            (Primitive::Int(a), Primitive::Int(b)) => Ok(Primitive::Int(a.wrapping_sub(*b))),
            (Primitive::Float(a), Primitive::Float(b)) => Ok(Primitive::Float(a - b)),
            _ => Err(unsupported_binop("-", self, other)),
        }
    }

    pub fn mul(&self, other: &Primitive) -> L3Result<Primitive> {
        match (self, other) {
            (Primitive::Int(a), Primitive::Int(b)) => Ok(Primitive::Int(a.wrapping_mul(*b))),
            (Primitive::Float(a), Primitive::Float(b)) => Ok(Primitive::Float(a * b)),
            _ => Err(unsupported_binop("*", self, other)),
        }
    }

    pub fn div(&self, other: &Primitive) -> L3Result<Primitive> {
        match (self, other) {
            (Primitive::Int(_), Primitive::Int(0)) => Err(L3Error::unsupported("division by zero")),
            (Primitive::Int(a), Primitive::Int(b)) => Ok(Primitive::Int(a / b)),
            (Primitive::Float(_), Primitive::Float(b)) if *b == 0.0 => {
                Err(L3Error::unsupported("division by zero"))
            }
            (Primitive::Float(a), Primitive::Float(b)) => Ok(Primitive::Float(a / b)),
            _ => Err(unsupported_binop("/", self, other)),
        }
    }

    pub fn rem(&self, other: &Primitive) -> L3Result<Primitive> {
        match (self, other) {
            (Primitive::Int(_), Primitive::Int(0)) => Err(L3Error::unsupported("division by zero")),
            (Primitive::Int(a), Primitive::Int(b)) => Ok(Primitive::Int(a % b)),
            (Primitive::Float(_), Primitive::Float(b)) if *b == 0.0 => {
                Err(L3Error::unsupported("division by zero"))
            }
            (Primitive::Float(a), Primitive::Float(b)) => Ok(Primitive::Float(a % b)),
            _ => Err(unsupported_binop("%", self, other)),
        }
    }

    pub fn negative(&self) -> L3Result<Primitive> {
        match self {
            Primitive::Int(a) => Ok(Primitive::Int(-a)),
            Primitive::Float(a) => Ok(Primitive::Float(-a)),
            _ => Err(L3Error::unsupported(format!(
                "cannot negate a value of type '{}'",
                self.type_name()
            ))),
        }
    }

    pub fn positive(&self) -> L3Result<Primitive> {
        match self {
            Primitive::Int(_) | Primitive::Float(_) => Ok(self.clone()),
            _ => Err(L3Error::unsupported(format!(
                "unary '+' is not supported for type '{}'",
                self.type_name()
            ))),
        }
    }

    /// `None` means "unordered" (mismatched types), not an error.
    pub fn compare(&self, other: &Primitive) -> Option<Ordering> {
        match (self, other) {
            (Primitive::Bool(a), Primitive::Bool(b)) => a.partial_cmp(b),
            (Primitive::Int(a), Primitive::Int(b)) => a.partial_cmp(b),
            (Primitive::Float(a), Primitive::Float(b)) => a.partial_cmp(b),
            (Primitive::Str(a), Primitive::Str(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

fn unsupported_binop(op: &str, lhs: &Primitive, rhs: &Primitive) -> L3Error {
    L3Error::unsupported(format!(
        "'{}' is not supported between '{}' and '{}'",
        op,
        lhs.type_name(),
        rhs.type_name()
    ))
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Bool(b) => write!(f, "{b}"),
            Primitive::Int(i) => write!(f, "{i}"),
            Primitive::Float(x) => write!(f, "{x}"),
            Primitive::Str(s) => f.write_str(s),
        }
    }
}

/// A vector's backing storage: a shared, growable list of reference
/// handles. Shared so that aliases (`let b = a`) see each other's mutations.
pub type VectorData = Rc<RefCell<Vec<ReferenceHandle>>>;

#[derive(Clone)]
pub enum Value {
    Nil,
    Primitive(Primitive),
    Function(Function),
    Vector(VectorData),
}

impl Value {
    pub fn from_bool(b: bool) -> Value {
        Value::Primitive(Primitive::Bool(b))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Primitive(p) => p.type_name(),
            Value::Function(_) => "function",
            Value::Vector(_) => "vector",
        }
    }

    /// `nil` and function values are falsy/error respectively; zero-valued
    /// bool/int are falsy; empty vectors/strings are falsy; converting a
    /// float is an error (there is no implicit float-to-bool coercion).
    pub fn is_truthy(&self) -> L3Result<bool> {
        match self {
            Value::Nil => Ok(false),
            Value::Primitive(Primitive::Bool(b)) => Ok(*b),
            Value::Primitive(Primitive::Int(i)) => Ok(*i != 0),
            Value::Primitive(Primitive::Float(_)) => {
                Err(L3Error::type_error("cannot convert a floating point number to bool"))
            }
            Value::Primitive(Primitive::Str(s)) => Ok(!s.is_empty()),
            Value::Function(_) => Err(L3Error::type_error(
                "cannot convert a function to bool, did you mean to call the function?",
            )),
            Value::Vector(v) => Ok(!v.borrow().is_empty()),
        }
    }

    pub fn not_op(&self) -> L3Result<Value> {
        Ok(Value::from_bool(!self.is_truthy()?))
    }

    pub fn negative(&self) -> L3Result<Value> {
        match self {
            Value::Primitive(p) => Ok(Value::Primitive(p.negative()?)),
            _ => Err(L3Error::unsupported(format!(
                "cannot negate a value of type '{}'",
                self.type_name()
            ))),
        }
    }

    pub fn positive(&self) -> L3Result<Value> {
        match self {
            Value::Primitive(p) => Ok(Value::Primitive(p.positive()?)),
            _ => Err(L3Error::unsupported(format!(
                "unary '+' is not supported for type '{}'",
                self.type_name()
            ))),
        }
    }

    /// `+`: primitives delegate to [`Primitive::add`] (strings concatenate
    /// there); two vectors concatenate as a fresh vector sharing the same
    /// element handles.
    pub fn add(&self, other: &Value) -> L3Result<Value> {
        match (self, other) {
            (Value::Primitive(a), Value::Primitive(b)) => Ok(Value::Primitive(a.add(b)?)),
            (Value::Vector(a), Value::Vector(b)) => {
                let mut out = a.borrow().clone();
                out.extend(b.borrow().iter().cloned());
                Ok(Value::Vector(Rc::new(RefCell::new(out))))
            }
            _ => Err(unsupported_value_binop("+", self, other)),
        }
    }

    /// In-place `+=` on a container: appends `other`'s elements to `self`.
    pub fn add_assign(&self, other: &Value) -> L3Result<()> {
        match (self, other) {
            (Value::Vector(a), Value::Vector(b)) => {
                a.borrow_mut().extend(b.borrow().iter().cloned());
                Ok(())
            }
            _ => Err(unsupported_value_binop("+=", self, other)),
        }
    }

    pub fn sub(&self, other: &Value) -> L3Result<Value> {
        match (self, other) {
            (Value::Primitive(a), Value::Primitive(b)) => Ok(Value::Primitive(a.sub(b)?)),
            _ => Err(unsupported_value_binop("-", self, other)),
        }
    }

    /// `*`: primitive-times-primitive delegates to [`Primitive::mul`];
    /// vector-times-int repeats the vector's elements `n` times (`n` must be
    /// a positive integer).
    pub fn mul(&self, other: &Value) -> L3Result<Value> {
        match (self, other) {
            (Value::Primitive(a), Value::Primitive(b)) => Ok(Value::Primitive(a.mul(b)?)),
            (Value::Vector(v), Value::Primitive(Primitive::Int(n)))
            | (Value::Primitive(Primitive::Int(n)), Value::Vector(v)) => {
                Ok(Value::Vector(Rc::new(RefCell::new(repeat_vector(&v.borrow(), *n)?))))
            }
            _ => Err(unsupported_value_binop("*", self, other)),
        }
    }

    /// In-place `*=` on a container: repeats `self`'s elements `n` times.
    pub fn mul_assign(&self, n: i64) -> L3Result<()> {
        match self {
            Value::Vector(v) => {
                let repeated = repeat_vector(&v.borrow(), n)?;
                *v.borrow_mut() = repeated;
                Ok(())
            }
            _ => Err(L3Error::unsupported(format!(
                "'*=' is not supported for type '{}'",
                self.type_name()
            ))),
        }
    }

    pub fn div(&self, other: &Value) -> L3Result<Value> {
        match (self, other) {
            (Value::Primitive(a), Value::Primitive(b)) => Ok(Value::Primitive(a.div(b)?)),
            _ => Err(unsupported_value_binop("/", self, other)),
        }
    }

    pub fn rem(&self, other: &Value) -> L3Result<Value> {
        match (self, other) {
            (Value::Primitive(a), Value::Primitive(b)) => Ok(Value::Primitive(a.rem(b)?)),
            _ => Err(unsupported_value_binop("%", self, other)),
        }
    }

    /// `None` means "unordered": either a mismatched-type primitive pair, or
    /// any pairing involving a non-primitive. Not an error.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Nil, Value::Nil) => Some(Ordering::Equal),
            (Value::Primitive(a), Value::Primitive(b)) => a.compare(b),
            _ => None,
        }
    }

    pub fn type_error_not_indexable(&self) -> L3Error {
        L3Error::type_error(format!("cannot index a value of type '{}'", self.type_name()))
    }

    /// Read-only indexing by a (non-negative) integer. Vectors return a copy
    /// of the element's current value; strings return a one-character
    /// substring. Negative indices are out of bounds here — only
    /// [`Value::slice`] supports negative wraparound.
    pub fn index(&self, i: i64) -> L3Result<Value> {
        match self {
            Value::Vector(v) => {
                let v = v.borrow();
                let idx = non_negative_index(i, v.len())?;
                Ok(v[idx].clone_value())
            }
            Value::Primitive(Primitive::Str(s)) => {
                let chars: Vec<char> = s.chars().collect();
                let idx = non_negative_index(i, chars.len())?;
                Ok(Value::Primitive(Primitive::Str(chars[idx].to_string())))
            }
            _ => Err(self.type_error_not_indexable()),
        }
    }

    /// A mutable slot for vector element assignment (`xs[0] = ...`). Strings
    /// are not mutably indexable.
    pub fn index_mut(&self, i: i64) -> L3Result<VectorSlot> {
        match self {
            Value::Vector(v) => {
                let idx = non_negative_index(i, v.borrow().len())?;
                Ok(VectorSlot { vector: Rc::clone(v), index: idx })
            }
            Value::Primitive(Primitive::Str(_)) => {
                Err(L3Error::type_error("cannot assign into a string index"))
            }
            _ => Err(self.type_error_not_indexable()),
        }
    }

    /// `v[start..end]`. Defaults are `0`/`len`; negative bounds wrap from the
    /// end; `start > end` or an out-of-range bound is a [`ValueError`].
    pub fn slice(&self, start: Option<i64>, end: Option<i64>) -> L3Result<Value> {
        match self {
            Value::Vector(v) => {
                let v = v.borrow();
                let (s, e) = resolve_slice_bounds(start, end, v.len())?;
                Ok(Value::Vector(Rc::new(RefCell::new(v[s..e].to_vec()))))
            }
            Value::Primitive(Primitive::Str(text)) => {
                let chars: Vec<char> = text.chars().collect();
                let (s, e) = resolve_slice_bounds(start, end, chars.len())?;
                Ok(Value::Primitive(Primitive::Str(chars[s..e].iter().collect())))
            }
            _ => Err(self.type_error_not_indexable()),
        }
    }

    pub(crate) fn mark_children(&self) {
        match self {
            Value::Vector(v) => {
                for handle in v.borrow().iter() {
                    handle.mark();
                }
            }
            Value::Function(f) => f.mark_captures(),
            _ => {}
        }
    }
}

/// A mutable element slot inside a vector, returned by [`Value::index_mut`].
pub struct VectorSlot {
    vector: VectorData,
    index: usize,
}

impl VectorSlot {
    pub fn read(&self) -> ReferenceHandle {
        self.vector.borrow()[self.index].clone()
    }

    pub fn write(&self, handle: ReferenceHandle) {
        self.vector.borrow_mut()[self.index] = handle;
    }
}

fn unsupported_value_binop(op: &str, lhs: &Value, rhs: &Value) -> L3Error {
    L3Error::unsupported(format!(
        "'{}' is not supported between '{}' and '{}'",
        op,
        lhs.type_name(),
        rhs.type_name()
    ))
}

fn repeat_vector(v: &[ReferenceHandle], n: i64) -> L3Result<Vec<ReferenceHandle>> {
    if n <= 0 {
        return Err(L3Error::unsupported("vector repetition count must be a positive integer"));
    }
    let mut out = Vec::with_capacity(v.len() * n as usize);
    for _ in 0..n {
        out.extend(v.iter().cloned());
    }
    Ok(out)
}

fn non_negative_index(i: i64, len: usize) -> L3Result<usize> {
    if i < 0 || i as usize >= len {
        return Err(L3Error::value(format!("index {i} out of bounds")));
    }
    Ok(i as usize)
}

fn resolve_slice_bounds(start: Option<i64>, end: Option<i64>, len: usize) -> L3Result<(usize, usize)> {
    let len_i = len as i64;
    let wrap = |x: i64| if x < 0 { x + len_i } else { x };
    let s = wrap(start.unwrap_or(0));
    let e = wrap(end.unwrap_or(len_i));
    if s < 0 || e < 0 || s > len_i || e > len_i {
        return Err(L3Error::value("slice index out of bounds"));
    }
    if s > e {
        return Err(L3Error::value("slice start must not be greater than end"));
    }
    Ok((s as usize, e as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;

    fn int(i: i64) -> Value {
        Value::Primitive(Primitive::Int(i))
    }

    fn string(s: &str) -> Value {
        Value::Primitive(Primitive::Str(s.to_string()))
    }

    #[test]
    fn string_plus_concatenates() {
        let result = string("foo").add(&string("bar")).unwrap();
        assert_eq!(result.to_string(), "foobar");
    }

    #[test]
    fn mixed_int_float_arithmetic_is_unsupported() {
        let err = int(1)
            .add(&Value::Primitive(Primitive::Float(1.0)))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnsupportedOperation);
    }

    #[test]
    fn division_by_zero_is_unsupported() {
        let err = int(1).div(&int(0)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnsupportedOperation);
    }

    #[test]
    fn mismatched_type_comparison_is_unordered() {
        assert_eq!(int(1).compare(&string("1")), None);
    }

    #[test]
    fn float_is_not_truthy_coercible() {
        let err = Value::Primitive(Primitive::Float(0.0)).is_truthy().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Type);
    }

    #[test]
    fn empty_string_is_falsy() {
        assert!(!string("").is_truthy().unwrap());
    }

    #[test]
    fn slice_wraps_negative_bounds() {
        let vector: Value = Value::Vector(Rc::new(RefCell::new(Vec::new())));
        // empty vector, start=-1 wraps to -1, still negative -> out of bounds
        assert!(vector.slice(Some(-1), None).is_err());
    }

    #[test]
    fn negative_index_is_out_of_bounds_not_wrapped() {
        assert!(string("abc").index(-1).is_err());
    }

    #[test]
    fn vector_times_zero_or_negative_is_unsupported() {
        let mut heap = Heap::new();
        let v = Value::Vector(Rc::new(RefCell::new(vec![heap.store(int(1))])));
        let err = v.mul(&int(0)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnsupportedOperation);
        let err = v.mul(&int(-1)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnsupportedOperation);
    }

    #[test]
    fn vector_mul_assign_by_zero_is_unsupported() {
        let mut heap = Heap::new();
        let v = Value::Vector(Rc::new(RefCell::new(vec![heap.store(int(1))])));
        let err = v.mul_assign(0).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnsupportedOperation);
    }
}
