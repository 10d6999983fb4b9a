//! Native type descriptors.
//!
//! [`TypeDescriptor`] has the same layout the call engine expects: size,
//! alignment, a kind code and a null-terminated element list for structs.
//! Primitive descriptors are statics; compound ones come from
//! [`DescriptorArena`](super::DescriptorArena).

use std::ffi::{c_long, c_ulong};
use std::fmt;
use std::mem::{align_of, size_of};
use std::ptr;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Kind codes understood by the call engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum TypeKind {
    Void = 0,
    Int = 1,
    Float = 2,
    Double = 3,
    LongDouble = 4,
    UInt8 = 5,
    SInt8 = 6,
    UInt16 = 7,
    SInt16 = 8,
    UInt32 = 9,
    SInt32 = 10,
    UInt64 = 11,
    SInt64 = 12,
    Struct = 13,
    Pointer = 14,
}

impl TypeKind {
    pub const fn code(self) -> u16 {
        self as u16
    }

    pub const fn name(self) -> &'static str {
        match self {
            TypeKind::Void => "void",
            TypeKind::Int => "int",
            TypeKind::Float => "float",
            TypeKind::Double => "double",
            TypeKind::LongDouble => "long double",
            TypeKind::UInt8 => "uint8",
            TypeKind::SInt8 => "sint8",
            TypeKind::UInt16 => "uint16",
            TypeKind::SInt16 => "sint16",
            TypeKind::UInt32 => "uint32",
            TypeKind::SInt32 => "sint32",
            TypeKind::UInt64 => "uint64",
            TypeKind::SInt64 => "sint64",
            TypeKind::Struct => "struct",
            TypeKind::Pointer => "pointer",
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Layout description of a native value.
///
/// `elements` is null for everything except structs, whose list ends with a
/// null pointer. Neither the header nor the list is ever mutated once
/// published.
#[repr(C)]
pub struct TypeDescriptor {
    size: usize,
    alignment: u16,
    kind: u16,
    elements: *const *const TypeDescriptor,
}

// SAFETY: descriptors are immutable after construction and the element
// pointers only reference other immutable, process-lifetime descriptors.
unsafe impl Sync for TypeDescriptor {}
unsafe impl Send for TypeDescriptor {}

impl TypeDescriptor {
    const fn primitive(size: usize, alignment: usize, kind: TypeKind) -> Self {
        Self {
            size,
            alignment: alignment as u16,
            kind: kind as u16,
            elements: ptr::null(),
        }
    }

    /// Header of a compound descriptor whose element list lives at `elements`.
    pub(crate) fn compound(
        size: usize,
        alignment: u16,
        kind: u16,
        elements: *const *const TypeDescriptor,
    ) -> Self {
        Self {
            size,
            alignment,
            kind,
            elements,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn alignment(&self) -> u16 {
        self.alignment
    }

    /// Raw kind code.
    pub fn kind_code(&self) -> u16 {
        self.kind
    }

    /// Decoded kind; None if the code is not one the engine knows.
    pub fn kind(&self) -> Option<TypeKind> {
        TypeKind::try_from(self.kind).ok()
    }

    /// Address of the element list, or 0 when there is none.
    pub fn elements_address(&self) -> usize {
        self.elements as usize
    }

    /// Address of this descriptor as handed to hosted code.
    pub fn address(&self) -> usize {
        self as *const TypeDescriptor as usize
    }

    /// Walk the element list up to its terminator.
    pub fn elements(&self) -> Elements<'_> {
        Elements {
            cursor: self.elements,
            _owner: self,
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("size", &self.size)
            .field("alignment", &self.alignment)
            .field("kind", &self.kind().map(TypeKind::name).unwrap_or("?"))
            .field("elements", &self.elements().count())
            .finish()
    }
}

/// Iterator over a descriptor's element list.
pub struct Elements<'a> {
    cursor: *const *const TypeDescriptor,
    _owner: &'a TypeDescriptor,
}

impl<'a> Iterator for Elements<'a> {
    type Item = &'a TypeDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.is_null() {
            return None;
        }
        // SAFETY: a non-null list is null-terminated and every entry points
        // at a descriptor that outlives its owner.
        let entry = unsafe { *self.cursor };
        if entry.is_null() {
            self.cursor = ptr::null();
            return None;
        }
        self.cursor = unsafe { self.cursor.add(1) };
        Some(unsafe { &*entry })
    }
}

pub static TYPE_VOID: TypeDescriptor = TypeDescriptor::primitive(1, 1, TypeKind::Void);
pub static TYPE_UINT8: TypeDescriptor =
    TypeDescriptor::primitive(size_of::<u8>(), align_of::<u8>(), TypeKind::UInt8);
pub static TYPE_SINT8: TypeDescriptor =
    TypeDescriptor::primitive(size_of::<i8>(), align_of::<i8>(), TypeKind::SInt8);
pub static TYPE_UINT16: TypeDescriptor =
    TypeDescriptor::primitive(size_of::<u16>(), align_of::<u16>(), TypeKind::UInt16);
pub static TYPE_SINT16: TypeDescriptor =
    TypeDescriptor::primitive(size_of::<i16>(), align_of::<i16>(), TypeKind::SInt16);
pub static TYPE_UINT32: TypeDescriptor =
    TypeDescriptor::primitive(size_of::<u32>(), align_of::<u32>(), TypeKind::UInt32);
pub static TYPE_SINT32: TypeDescriptor =
    TypeDescriptor::primitive(size_of::<i32>(), align_of::<i32>(), TypeKind::SInt32);
pub static TYPE_UINT64: TypeDescriptor =
    TypeDescriptor::primitive(size_of::<u64>(), align_of::<u64>(), TypeKind::UInt64);
pub static TYPE_SINT64: TypeDescriptor =
    TypeDescriptor::primitive(size_of::<i64>(), align_of::<i64>(), TypeKind::SInt64);
pub static TYPE_FLOAT: TypeDescriptor =
    TypeDescriptor::primitive(size_of::<f32>(), align_of::<f32>(), TypeKind::Float);
pub static TYPE_DOUBLE: TypeDescriptor =
    TypeDescriptor::primitive(size_of::<f64>(), align_of::<f64>(), TypeKind::Double);
pub static TYPE_POINTER: TypeDescriptor = TypeDescriptor::primitive(
    size_of::<*const ()>(),
    align_of::<*const ()>(),
    TypeKind::Pointer,
);

/// The fixed primitive table, indexed by hosted code.
///
/// The trailing entries are C-name aliases and refer to the same
/// descriptors as the sized entries before them.
pub static PRIMITIVE_TYPES: [&TypeDescriptor; 20] = [
    &TYPE_VOID,
    &TYPE_UINT8,
    &TYPE_SINT8,
    &TYPE_UINT16,
    &TYPE_SINT16,
    &TYPE_UINT32,
    &TYPE_SINT32,
    &TYPE_UINT64,
    &TYPE_SINT64,
    &TYPE_FLOAT,
    &TYPE_DOUBLE,
    &TYPE_POINTER,
    // unsigned char, signed char
    &TYPE_UINT8,
    &TYPE_SINT8,
    // unsigned short, short
    &TYPE_UINT16,
    &TYPE_SINT16,
    // unsigned int, int
    &TYPE_UINT32,
    &TYPE_SINT32,
    // unsigned long, long
    if size_of::<c_ulong>() == 8 {
        &TYPE_UINT64
    } else {
        &TYPE_UINT32
    },
    if size_of::<c_long>() == 8 {
        &TYPE_SINT64
    } else {
        &TYPE_SINT32
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_codes() {
        for code in 0u16..=14 {
            let kind = TypeKind::try_from(code).unwrap();
            assert_eq!(kind.code(), code);
        }
        assert!(TypeKind::try_from(15u16).is_err());
    }

    #[test]
    fn primitives_match_native_sizes() {
        assert_eq!(TYPE_DOUBLE.size(), size_of::<f64>());
        assert_eq!(TYPE_FLOAT.size(), size_of::<f32>());
        assert_eq!(TYPE_POINTER.size(), size_of::<usize>());
        assert_eq!(TYPE_SINT64.alignment() as usize, align_of::<i64>());
        assert_eq!(TYPE_DOUBLE.kind(), Some(TypeKind::Double));
    }

    #[test]
    fn primitives_have_no_elements() {
        for ty in PRIMITIVE_TYPES {
            assert_eq!(ty.elements_address(), 0);
            assert_eq!(ty.elements().count(), 0);
        }
    }

    #[test]
    fn aliases_share_descriptors() {
        assert!(ptr::eq(PRIMITIVE_TYPES[12], &TYPE_UINT8));
        assert!(ptr::eq(PRIMITIVE_TYPES[17], &TYPE_SINT32));
        assert_eq!(PRIMITIVE_TYPES[19].size(), size_of::<c_long>());
    }

    #[test]
    fn header_layout_matches_engine() {
        assert_eq!(size_of::<TypeDescriptor>(), 3 * size_of::<usize>());
    }
}
