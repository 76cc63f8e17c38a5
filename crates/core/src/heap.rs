//! The managed heap: an append-only list of cells, swept by a
//! stop-the-world mark phase the interpreter drives at statement
//! boundaries.
//!
//! `nil` and the two booleans are statically-allocated singletons living
//! outside the sweepable cell list — [`Heap::store`] routes any `nil` or
//! bool value to one of them instead of allocating, so boolean-heavy code
//! (loop counters, comparisons) never pressures the collector.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::value::{Primitive, Value};

/// Cells are swept once this many have been allocated since the last sweep.
pub const GC_TRIGGER_THRESHOLD: usize = 10_000;

struct HeapCell {
    value: Value,
    marked: bool,
}

/// A non-owning handle into a heap cell. Cheap to clone; cloning does not
/// allocate a new cell, it shares the existing one (this is how aliasing —
/// `let b = a` — is represented).
#[derive(Clone)]
pub struct ReferenceHandle(Rc<RefCell<HeapCell>>);

impl ReferenceHandle {
    fn new(value: Value) -> Self {
        Self(Rc::new(RefCell::new(HeapCell { value, marked: false })))
    }

    pub fn get(&self) -> Ref<'_, Value> {
        Ref::map(self.0.borrow(), |c| &c.value)
    }

    pub fn get_mut(&self) -> RefMut<'_, Value> {
        RefMut::map(self.0.borrow_mut(), |c| &mut c.value)
    }

    pub fn set(&self, value: Value) {
        self.0.borrow_mut().value = value;
    }

    pub fn clone_value(&self) -> Value {
        self.0.borrow().value.clone()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Mark this cell and, transitively, anything it reaches. Idempotent —
    /// cycles terminate because an already-marked cell is not re-visited.
    pub fn mark(&self) {
        {
            let mut cell = self.0.borrow_mut();
            if cell.marked {
                return;
            }
            cell.marked = true;
        }
        let value = self.0.borrow().value.clone();
        value.mark_children();
    }
}

/// The one knob the spec calls out as implementation-tunable: how many
/// cells may be allocated between sweeps before one is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcConfig {
    pub trigger_threshold: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self { trigger_threshold: GC_TRIGGER_THRESHOLD }
    }
}

/// The append-only cell list plus the three singletons.
pub struct Heap {
    cells: Vec<Rc<RefCell<HeapCell>>>,
    added_since_sweep: usize,
    trigger_threshold: usize,
    nil: ReferenceHandle,
    truthy: ReferenceHandle,
    falsy: ReferenceHandle,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self::with_config(GcConfig::default())
    }

    pub fn with_config(config: GcConfig) -> Self {
        Self {
            cells: Vec::new(),
            added_since_sweep: 0,
            trigger_threshold: config.trigger_threshold,
            nil: ReferenceHandle::new(Value::Nil),
            truthy: ReferenceHandle::new(Value::Primitive(Primitive::Bool(true))),
            falsy: ReferenceHandle::new(Value::Primitive(Primitive::Bool(false))),
        }
    }

    pub fn nil(&self) -> ReferenceHandle {
        self.nil.clone()
    }

    pub fn bool_handle(&self, b: bool) -> ReferenceHandle {
        if b { self.truthy.clone() } else { self.falsy.clone() }
    }

    /// Allocate a cell for `value`, unless it is `nil` or a bool, in which
    /// case the corresponding singleton is returned instead.
    pub fn store(&mut self, value: Value) -> ReferenceHandle {
        match &value {
            Value::Nil => return self.nil(),
            Value::Primitive(Primitive::Bool(b)) => return self.bool_handle(*b),
            _ => {}
        }
        let cell = Rc::new(RefCell::new(HeapCell { value, marked: false }));
        self.cells.push(Rc::clone(&cell));
        self.added_since_sweep += 1;
        ReferenceHandle(cell)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn should_sweep(&self) -> bool {
        self.added_since_sweep >= self.trigger_threshold
    }

    /// Sweep every unmarked cell, assuming the caller has already marked all
    /// roots reachable from live scopes, the eval stack, and any in-flight
    /// return value. Returns the number of cells collected.
    ///
    /// An unmarked cell's value is cleared to `Nil` before it is dropped,
    /// which breaks any reference cycle it participated in — `Rc` alone
    /// cannot collect cycles, so this step is load-bearing, not cosmetic.
    pub fn sweep(&mut self) -> usize {
        let before = self.cells.len();
        let mut kept = Vec::with_capacity(before);
        for cell in self.cells.drain(..) {
            let marked = cell.borrow().marked;
            if marked {
                cell.borrow_mut().marked = false;
                kept.push(cell);
            } else {
                cell.borrow_mut().value = Value::Nil;
            }
        }
        self.cells = kept;
        self.added_since_sweep = 0;
        let collected = before - self.cells.len();
        tracing::debug!(collected, kept = self.cells.len(), "heap swept");
        collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bools_reuse_the_two_singletons() {
        let mut heap = Heap::new();
        let a = heap.store(Value::Primitive(Primitive::Bool(true)));
        let b = heap.store(Value::Primitive(Primitive::Bool(true)));
        assert!(a.ptr_eq(&b));
        assert_eq!(heap.len(), 0, "singletons must not land in the sweepable cell list");
    }

    #[test]
    fn nil_reuses_the_singleton() {
        let mut heap = Heap::new();
        let a = heap.store(Value::Nil);
        let b = heap.nil();
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn unreachable_cell_is_collected() {
        let mut heap = Heap::new();
        let handle = heap.store(Value::Primitive(Primitive::Int(1)));
        drop(handle);
        assert_eq!(heap.len(), 1);
        let collected = heap.sweep();
        assert_eq!(collected, 1);
        assert_eq!(heap.len(), 0);
    }

    #[test]
    fn marked_cell_survives_sweep() {
        let mut heap = Heap::new();
        let handle = heap.store(Value::Primitive(Primitive::Int(1)));
        handle.mark();
        let collected = heap.sweep();
        assert_eq!(collected, 0);
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn custom_trigger_threshold_is_honored() {
        let mut heap = Heap::with_config(GcConfig { trigger_threshold: 2 });
        assert!(!heap.should_sweep());
        heap.store(Value::Primitive(Primitive::Int(1)));
        assert!(!heap.should_sweep());
        heap.store(Value::Primitive(Primitive::Int(2)));
        assert!(heap.should_sweep());
    }

    #[test]
    fn cycle_is_collected_and_broken() {
        let mut heap = Heap::new();
        let a = heap.store(Value::Vector(Rc::new(RefCell::new(Vec::new()))));
        let b = heap.store(Value::Vector(Rc::new(RefCell::new(Vec::new()))));
        if let Value::Vector(v) = &*a.get() {
            v.borrow_mut().push(b.clone());
        }
        if let Value::Vector(v) = &*b.get() {
            v.borrow_mut().push(a.clone());
        }
        drop(a);
        drop(b);
        // Nothing marks either cell as a root, so both are swept even
        // though each still (cyclically) refers to the other via Rc.
        let collected = heap.sweep();
        assert_eq!(collected, 2);
        assert_eq!(heap.len(), 0);
    }
}
