//! Per-thread execution context.

use std::fmt;

use crate::boundary::BoundaryState;
use crate::heap::{HeapObject, ManagedHeap, ObjectFlags, ObjectHandle};
use crate::roots::{RootHandle, SaveVec};
use crate::value::Value;

/// Identity of a hosted execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u32);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// State owned by one hosted worker thread.
///
/// Every entry point receives the context of the thread that called it.
/// Contexts are never shared, so the root stack and the boundary state need
/// no locking.
#[derive(Debug)]
pub struct TaskContext {
    id: TaskId,
    pub heap: ManagedHeap,
    pub(crate) save_vec: SaveVec,
    pub(crate) state: BoundaryState,
    pub(crate) crossings: u32,
}

impl TaskContext {
    /// A fresh context with an empty heap and root stack.
    pub fn new(id: u32) -> Self {
        Self::with_root_capacity(id, 0)
    }

    /// Create a context whose root stack is preallocated to `capacity` slots.
    pub fn with_root_capacity(id: u32, capacity: usize) -> Self {
        Self {
            id: TaskId(id),
            heap: ManagedHeap::new(),
            save_vec: SaveVec::with_capacity(capacity),
            state: BoundaryState::Idle,
            crossings: 0,
        }
    }

    /// Identifier used in log lines.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The root stack.
    pub fn save_vec(&self) -> &SaveVec {
        &self.save_vec
    }

    /// Current depth of the root stack.
    pub fn root_depth(&self) -> usize {
        self.save_vec.depth()
    }

    /// State of the innermost boundary crossing.
    pub fn boundary_state(&self) -> BoundaryState {
        self.state
    }

    /// Number of crossings currently in progress on this context.
    pub fn crossing_depth(&self) -> u32 {
        self.crossings
    }

    /// Push a value as a root for the current crossing.
    pub fn save(&mut self, value: Value) -> RootHandle {
        self.save_vec.push(value)
    }

    /// Allocate an object and register it as a root for the current crossing.
    pub fn alloc_and_save(&mut self, object: HeapObject, flags: ObjectFlags) -> ObjectHandle {
        let handle = self.heap.allocate(object, flags);
        self.save_vec.push(Value::Object(handle));
        handle
    }

    /// Present every root and every heap reference to the collector.
    pub fn scan(&mut self, visitor: &mut dyn FnMut(&mut ObjectHandle)) {
        self.save_vec.scan_roots(visitor);
        self.heap.scan(visitor);
    }
}
