//! Process-lifetime storage for compound descriptors.
//!
//! Compound descriptors are referenced from compiled code for as long as
//! the process runs, so there is no way to free one. The arena also records
//! every address it has handed out, which lets hosted words be checked
//! before they are dereferenced.

use std::alloc::Layout;
use std::ptr;
use std::sync::Mutex;

use bumpalo::Bump;
use lazy_static::lazy_static;
use log::debug;
use rtsffi_core::FfiError;
use rustc_hash::FxHashSet;

use super::descriptor::{PRIMITIVE_TYPES, TypeDescriptor, TypeKind};

lazy_static! {
    static ref DESCRIPTOR_ARENA: DescriptorArena = DescriptorArena::new();
}

/// The arena shared by every context in the process.
pub fn descriptor_arena() -> &'static DescriptorArena {
    &DESCRIPTOR_ARENA
}

/// Primitive descriptor at `index` in the fixed table.
pub fn lookup_primitive(index: i64) -> Result<&'static TypeDescriptor, FfiError> {
    usize::try_from(index)
        .ok()
        .and_then(|i| PRIMITIVE_TYPES.get(i))
        .copied()
        .ok_or(FfiError::IndexOutOfRange {
            what: "primitive type",
            index,
            len: PRIMITIVE_TYPES.len(),
        })
}

fn primitive_at(address: usize) -> Option<&'static TypeDescriptor> {
    PRIMITIVE_TYPES
        .iter()
        .copied()
        .find(|ty| ty.address() == address)
}

struct ArenaInner {
    bump: Bump,
    built: FxHashSet<usize>,
}

/// Bump arena owning compound descriptors.
pub struct DescriptorArena {
    inner: Mutex<ArenaInner>,
}

impl DescriptorArena {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ArenaInner {
                bump: Bump::new(),
                built: FxHashSet::default(),
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ArenaInner>, FfiError> {
        self.inner
            .lock()
            .map_err(|_| FfiError::unrecoverable("descriptor arena lock poisoned"))
    }

    /// Build a compound descriptor.
    ///
    /// Header and element list are one allocation; the list holds
    /// `elements.len()` entries plus a null terminator. Only structs carry a
    /// list: any other kind must be given no elements and gets a null list.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn build<'a>(
        &'a self,
        size: usize,
        alignment: u16,
        kind: u16,
        elements: &[&'a TypeDescriptor],
    ) -> Result<&'a TypeDescriptor, FfiError> {
        if TypeKind::try_from(kind).is_err() {
            return Err(FfiError::IndexOutOfRange {
                what: "type kind",
                index: i64::from(kind),
                len: TypeKind::Pointer.code() as usize + 1,
            });
        }
        let is_struct = kind == TypeKind::Struct.code();
        if !is_struct && !elements.is_empty() {
            return Err(FfiError::Foreign {
                message: format!(
                    "type kind {kind} takes no elements, got {}",
                    elements.len()
                ),
            });
        }
        if !alignment.is_power_of_two() {
            return Err(FfiError::Foreign {
                message: format!("alignment {alignment} is not a power of two"),
            });
        }

        let oom = || FfiError::OutOfMemory {
            what: "compound type descriptor",
        };
        let slot_count = if is_struct { elements.len() + 1 } else { 0 };
        let slots = Layout::array::<*const TypeDescriptor>(slot_count).map_err(|_| oom())?;
        let (layout, offset) = Layout::new::<TypeDescriptor>()
            .extend(slots)
            .map_err(|_| oom())?;

        let mut inner = self.lock()?;
        let base = inner.bump.try_alloc_layout(layout).map_err(|_| oom())?;

        // SAFETY: `base` is a fresh allocation of `layout`, so the header fits
        // at offset 0 and the pointer array fits at `offset`. The memory lives
        // as long as the arena and is never handed out twice.
        let descriptor = unsafe {
            let list = if is_struct {
                let list = base.as_ptr().add(offset) as *mut *const TypeDescriptor;
                for (i, element) in elements.iter().enumerate() {
                    list.add(i).write(*element as *const TypeDescriptor);
                }
                list.add(elements.len()).write(ptr::null());
                list
            } else {
                ptr::null_mut()
            };

            let header = base.as_ptr() as *mut TypeDescriptor;
            header.write(TypeDescriptor::compound(size, alignment, kind, list));
            &*header
        };
        inner.built.insert(descriptor.address());
        debug!(
            "built compound descriptor size={size} align={alignment} kind={kind} elements={}",
            elements.len()
        );
        Ok(descriptor)
    }

    /// Map a hosted word back to a descriptor, refusing unknown addresses.
    pub fn resolve(&self, address: usize) -> Result<&TypeDescriptor, FfiError> {
        if let Some(primitive) = primitive_at(address) {
            return Ok(primitive);
        }
        if self.lock()?.built.contains(&address) {
            // SAFETY: the address was produced by `build` on this arena and
            // the arena never frees.
            return Ok(unsafe { &*(address as *const TypeDescriptor) });
        }
        Err(FfiError::InvalidHandle {
            what: "type descriptor",
        })
    }

    /// Number of compound descriptors built so far.
    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.built.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DescriptorArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::descriptor::{TYPE_DOUBLE, TYPE_SINT32, TYPE_UINT8};

    #[test]
    fn primitive_lookup_is_stable() {
        for index in 0..PRIMITIVE_TYPES.len() as i64 {
            let a = lookup_primitive(index).unwrap();
            let b = lookup_primitive(index).unwrap();
            assert!(ptr::eq(a, b));
        }
    }

    #[test]
    fn primitive_lookup_out_of_range() {
        let err = lookup_primitive(PRIMITIVE_TYPES.len() as i64).unwrap_err();
        assert!(matches!(err, FfiError::IndexOutOfRange { index: 20, .. }));
        let err = lookup_primitive(-1).unwrap_err();
        assert!(matches!(err, FfiError::IndexOutOfRange { index: -1, .. }));
    }

    #[test]
    fn build_struct_with_elements() {
        let arena = DescriptorArena::new();
        let fields = [&TYPE_SINT32, &TYPE_DOUBLE];
        let ty = arena
            .build(16, 8, TypeKind::Struct.code(), &fields)
            .unwrap();
        assert_eq!(ty.size(), 16);
        assert_eq!(ty.alignment(), 8);
        assert_eq!(ty.kind(), Some(TypeKind::Struct));

        let elements: Vec<_> = ty.elements().collect();
        assert_eq!(elements.len(), 2);
        assert!(ptr::eq(elements[0], &TYPE_SINT32));
        assert!(ptr::eq(elements[1], &TYPE_DOUBLE));

        // Terminator directly after the last element.
        let list = ty.elements_address() as *const *const TypeDescriptor;
        assert!(unsafe { *list.add(2) }.is_null());
    }

    #[test]
    fn empty_struct_still_has_terminator() {
        let arena = DescriptorArena::new();
        let ty = arena.build(0, 1, TypeKind::Struct.code(), &[]).unwrap();
        assert_ne!(ty.elements_address(), 0);
        assert_eq!(ty.elements().count(), 0);
    }

    #[test]
    fn nested_structs() {
        let arena = DescriptorArena::new();
        let inner = arena
            .build(2, 1, TypeKind::Struct.code(), &[&TYPE_UINT8, &TYPE_UINT8])
            .unwrap();
        let outer = arena
            .build(4, 1, TypeKind::Struct.code(), &[inner, inner])
            .unwrap();
        assert_eq!(outer.elements().count(), 2);
        assert!(outer.elements().all(|e| ptr::eq(e, inner)));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn rebuild_from_introspection() {
        let arena = DescriptorArena::new();
        let layout = [&TYPE_DOUBLE, &TYPE_SINT32];
        let first = arena
            .build(24, 8, TypeKind::Struct.code(), &layout)
            .unwrap();
        let fields: Vec<&TypeDescriptor> = first.elements().collect();
        let copy = arena
            .build(first.size(), first.alignment(), first.kind_code(), &fields)
            .unwrap();

        assert!(!ptr::eq(first, copy));
        assert_eq!(copy.size(), first.size());
        assert_eq!(copy.alignment(), first.alignment());
        assert_eq!(copy.kind_code(), first.kind_code());
        assert!(
            copy.elements()
                .zip(first.elements())
                .all(|(a, b)| ptr::eq(a, b))
        );
    }

    #[test]
    fn rejects_bad_alignment_and_kind() {
        let arena = DescriptorArena::new();
        assert!(matches!(
            arena.build(4, 3, TypeKind::Struct.code(), &[]),
            Err(FfiError::Foreign { .. })
        ));
        assert!(matches!(
            arena.build(4, 4, 99, &[]),
            Err(FfiError::IndexOutOfRange { .. })
        ));
        assert!(arena.is_empty());
    }

    #[test]
    fn only_structs_take_elements() {
        let arena = DescriptorArena::new();
        let err = arena
            .build(4, 4, TypeKind::SInt32.code(), &[&TYPE_DOUBLE])
            .unwrap_err();
        assert_eq!(err.kind(), rtsffi_core::ErrorKind::Foreign);
        assert!(arena.is_empty());

        let scalar = arena.build(4, 4, TypeKind::SInt32.code(), &[]).unwrap();
        assert_eq!(scalar.kind(), Some(TypeKind::SInt32));
        assert_eq!(scalar.elements_address(), 0);
        assert_eq!(scalar.elements().count(), 0);
    }

    #[test]
    fn resolve_known_and_unknown_addresses() {
        let arena = DescriptorArena::new();
        let built = arena
            .build(8, 8, TypeKind::Struct.code(), &[&TYPE_DOUBLE])
            .unwrap();
        assert!(ptr::eq(arena.resolve(built.address()).unwrap(), built));
        let double = arena.resolve(TYPE_DOUBLE.address()).unwrap();
        assert!(ptr::eq(double, &TYPE_DOUBLE));
        assert_eq!(
            arena.resolve(0x10).unwrap_err(),
            FfiError::InvalidHandle {
                what: "type descriptor"
            }
        );
    }
}
