//! Generational arena of collector-visible objects.
//!
//! The real collector is an external collaborator. This heap models what the
//! boundary needs from it: allocation of flagged objects, typed access, and
//! the scan/relocate callback contract over traceable slots.

use std::fmt;

use bitflags::bitflags;
use log::{debug, warn};

use crate::entry::{EntryPoint, EntryPointTable};
use crate::value::Value;

bitflags! {
    /// Object header flags consulted by the collector and sharing passes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObjectFlags: u8 {
        /// Payload is raw bytes, not traceable words.
        const BYTE = 0x01;
        /// Collector must not treat the first slot as a strong reference.
        const WEAK = 0x02;
        /// Contents may change after allocation.
        const MUTABLE = 0x04;
        /// Never merged or overwritten by structural sharing.
        const NO_OVERWRITE = 0x08;
    }
}

impl ObjectFlags {
    /// Whether a structural deduplication pass may merge this object with an equal one.
    pub fn is_shareable(self) -> bool {
        !self.intersects(ObjectFlags::MUTABLE | ObjectFlags::NO_OVERWRITE)
    }
}

/// Handle to a heap-allocated object.
///
/// The generation detects use of a handle after its slot has been reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    pub index: u32,
    pub generation: u32,
}

impl ObjectHandle {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// Payload of a heap object.
#[derive(Debug, Clone, PartialEq)]
pub enum HeapObject {
    /// Mutable machine-word cell.
    Word(usize),
    /// Record of traceable values.
    Tuple(Vec<Value>),
    /// Name-addressable, reload-safe function reference.
    EntryPoint(EntryPoint),
}

impl HeapObject {
    fn kind_name(&self) -> &'static str {
        match self {
            HeapObject::Word(_) => "word cell",
            HeapObject::Tuple(_) => "tuple",
            HeapObject::EntryPoint(_) => "entry point",
        }
    }
}

/// Outcome of re-resolving every entry point after an image reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    pub resolved: usize,
    pub unresolved: Vec<String>,
}

struct HeapSlot {
    generation: u32,
    flags: ObjectFlags,
    value: Option<HeapObject>,
}

/// Heap storage with generational indices.
pub struct ManagedHeap {
    slots: Vec<HeapSlot>,
    free_list: Vec<u32>,
}

impl ManagedHeap {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Allocate a new object.
    pub fn allocate(&mut self, object: HeapObject, flags: ObjectFlags) -> ObjectHandle {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(object);
            slot.flags = flags;
            ObjectHandle::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(HeapSlot {
                generation: 0,
                flags,
                value: Some(object),
            });
            ObjectHandle::new(index, 0)
        }
    }

    fn slot(&self, handle: ObjectHandle) -> Option<&HeapSlot> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.value.is_some())
    }

    /// Get an object. Returns None for stale handles.
    pub fn get(&self, handle: ObjectHandle) -> Option<&HeapObject> {
        self.slot(handle)?.value.as_ref()
    }

    /// Get an object mutably. Returns None for stale handles.
    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut HeapObject> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Header flags of a live object.
    pub fn flags(&self, handle: ObjectHandle) -> Option<ObjectFlags> {
        Some(self.slot(handle)?.flags)
    }

    /// Read a word cell.
    pub fn word(&self, handle: ObjectHandle) -> Option<usize> {
        match self.get(handle)? {
            HeapObject::Word(w) => Some(*w),
            _ => None,
        }
    }

    /// Overwrite a word cell. Returns false if the handle is not a live word cell.
    pub fn set_word(&mut self, handle: ObjectHandle, value: usize) -> bool {
        match self.get_mut(handle) {
            Some(HeapObject::Word(w)) => {
                *w = value;
                true
            }
            _ => false,
        }
    }

    /// Borrow an entry-point record.
    pub fn entry_point(&self, handle: ObjectHandle) -> Option<&EntryPoint> {
        match self.get(handle)? {
            HeapObject::EntryPoint(ep) => Some(ep),
            _ => None,
        }
    }

    /// Borrow an entry-point record mutably.
    pub fn entry_point_mut(&mut self, handle: ObjectHandle) -> Option<&mut EntryPoint> {
        match self.get_mut(handle)? {
            HeapObject::EntryPoint(ep) => Some(ep),
            _ => None,
        }
    }

    /// Free an object immediately; the collector's job in a full runtime.
    pub fn free(&mut self, handle: ObjectHandle) {
        if let Some(slot) = self.slots.get_mut(handle.index as usize)
            && slot.generation == handle.generation
            && slot.value.is_some()
        {
            slot.value = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free_list.push(handle.index);
        }
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every traceable reference held in heap objects.
    ///
    /// Entry-point address slots are raw code addresses and are never
    /// presented to the visitor; only tuple contents are traced.
    pub fn scan(&mut self, visitor: &mut dyn FnMut(&mut ObjectHandle)) {
        for slot in &mut self.slots {
            if let Some(HeapObject::Tuple(items)) = &mut slot.value {
                for item in items {
                    item.visit_objects(visitor);
                }
            }
        }
    }

    /// Drop the transient address of every entry point, leaving only names.
    ///
    /// This is what an image writer sees: addresses are process-specific.
    pub fn clear_entry_points(&mut self) -> usize {
        let mut cleared = 0;
        for slot in &mut self.slots {
            if let Some(HeapObject::EntryPoint(ep)) = &mut slot.value {
                ep.clear();
                cleared += 1;
            }
        }
        cleared
    }

    /// Re-resolve every entry point against `table` after an image reload.
    ///
    /// Names missing from the table stay unresolved; using them later is a
    /// fatal error at call time, not here.
    pub fn resolve_entry_points(&mut self, table: &EntryPointTable) -> ReloadReport {
        let mut report = ReloadReport::default();
        for slot in &mut self.slots {
            if let Some(HeapObject::EntryPoint(ep)) = &mut slot.value {
                if ep.resolve(table) {
                    report.resolved += 1;
                } else if let Some(name) = ep.name() {
                    warn!("entry point <{name}> left unresolved after reload");
                    report.unresolved.push(name.to_string());
                }
            }
        }
        debug!(
            "reload resolved {} entry points, {} unresolved",
            report.resolved,
            report.unresolved.len()
        );
        report
    }
}

impl Default for ManagedHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ManagedHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<&str> = self
            .slots
            .iter()
            .filter_map(|s| s.value.as_ref().map(HeapObject::kind_name))
            .collect();
        f.debug_struct("ManagedHeap")
            .field("slot_count", &self.slots.len())
            .field("free_count", &self.free_list.len())
            .field("live", &kinds)
            .finish()
    }
}
