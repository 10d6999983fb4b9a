//! Integer constants hosted code reads by index.

use std::mem::size_of;

use rtsffi_core::FfiError;

use super::abi::DEFAULT_ABI;
use super::descriptor::TypeKind;

/// Smallest result buffer the call engine will write into.
pub const MIN_RESULT_SIZE: usize = size_of::<usize>();

/// Default ABI, the type codes, then the minimum result size.
pub static CONSTANTS: [i64; 16] = [
    DEFAULT_ABI as i64,
    TypeKind::Void as i64,
    TypeKind::Int as i64,
    TypeKind::Float as i64,
    TypeKind::Double as i64,
    TypeKind::UInt8 as i64,
    TypeKind::SInt8 as i64,
    TypeKind::UInt16 as i64,
    TypeKind::SInt16 as i64,
    TypeKind::UInt32 as i64,
    TypeKind::SInt32 as i64,
    TypeKind::UInt64 as i64,
    TypeKind::SInt64 as i64,
    TypeKind::Struct as i64,
    TypeKind::Pointer as i64,
    MIN_RESULT_SIZE as i64,
];

/// Constant at `index`. Negative indices are out of range like any other.
pub fn constant_at(index: i64) -> Result<i64, FfiError> {
    usize::try_from(index)
        .ok()
        .and_then(|i| CONSTANTS.get(i))
        .copied()
        .ok_or(FfiError::IndexOutOfRange {
            what: "constant",
            index,
            len: CONSTANTS.len(),
        })
}
