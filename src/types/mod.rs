//! Native type descriptors, calling conventions and the constant table.

mod abi;
mod arena;
mod constants;
mod descriptor;

pub use abi::{ABI_TABLE, DEFAULT_ABI, PlatformAbi, enumerate_abis, is_known_abi};
pub use arena::{DescriptorArena, descriptor_arena, lookup_primitive};
pub use constants::{CONSTANTS, MIN_RESULT_SIZE, constant_at};
pub use descriptor::{
    Elements, PRIMITIVE_TYPES, TYPE_DOUBLE, TYPE_FLOAT, TYPE_POINTER, TYPE_SINT8, TYPE_SINT16,
    TYPE_SINT32, TYPE_SINT64, TYPE_UINT8, TYPE_UINT16, TYPE_UINT32, TYPE_UINT64, TYPE_VOID,
    TypeDescriptor, TypeKind,
};
