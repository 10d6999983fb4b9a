//! Per-context root stack.
//!
//! Values pushed here are collector roots until the stack is reset to an
//! earlier save point. Every boundary crossing marks on entry and resets on
//! exit, so the depth seen by the caller never changes across a call.

use crate::heap::ObjectHandle;
use crate::value::Value;

/// A position in the root stack to return to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SavePoint(usize);

/// Index of a value pushed onto the root stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootHandle(usize);

/// Stack of values registered as collector roots.
#[derive(Debug, Default)]
pub struct SaveVec {
    entries: Vec<Value>,
}

impl SaveVec {
    /// An empty root stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty root stack with room for `capacity` roots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Mark the current depth.
    pub fn mark(&self) -> SavePoint {
        SavePoint(self.entries.len())
    }

    /// Push a value as a root.
    pub fn push(&mut self, value: Value) -> RootHandle {
        self.entries.push(value);
        RootHandle(self.entries.len() - 1)
    }

    /// Read a pushed root. None once the root has been released.
    pub fn get(&self, handle: RootHandle) -> Option<&Value> {
        self.entries.get(handle.0)
    }

    /// Release every root pushed since `point`.
    pub fn reset(&mut self, point: SavePoint) {
        debug_assert!(
            point.0 <= self.entries.len(),
            "save vector reset past its top ({} > {})",
            point.0,
            self.entries.len()
        );
        self.entries.truncate(point.0);
    }

    /// Current number of roots.
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Present every object reference held by a root to the collector.
    pub fn scan_roots(&mut self, visitor: &mut dyn FnMut(&mut ObjectHandle)) {
        for value in &mut self.entries {
            value.visit_objects(visitor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_push_reset() {
        let mut sv = SaveVec::new();
        sv.push(Value::Int(1));
        let mark = sv.mark();
        let h = sv.push(Value::Int(2));
        sv.push(Value::Int(3));
        assert_eq!(sv.depth(), 3);
        assert_eq!(sv.get(h), Some(&Value::Int(2)));

        sv.reset(mark);
        assert_eq!(sv.depth(), 1);
        assert!(sv.get(h).is_none());
    }

    #[test]
    fn nested_marks_unwind_in_order() {
        let mut sv = SaveVec::with_capacity(8);
        let outer = sv.mark();
        sv.push(Value::Unit);
        let inner = sv.mark();
        sv.push(Value::Unit);
        sv.push(Value::Unit);
        sv.reset(inner);
        assert_eq!(sv.depth(), 1);
        sv.reset(outer);
        assert_eq!(sv.depth(), 0);
    }

    #[test]
    fn scan_roots_relocates() {
        let mut sv = SaveVec::new();
        sv.push(Value::Object(ObjectHandle::new(1, 0)));
        sv.push(Value::Int(5));
        sv.scan_roots(&mut |h| h.index = 9);
        assert_eq!(
            sv.get(RootHandle(0)),
            Some(&Value::Object(ObjectHandle::new(9, 0)))
        );
    }
}
