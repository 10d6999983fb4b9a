//! The numeric-opcode entry point used by hosted code.
//!
//! | code | operation                                   |
//! |------|---------------------------------------------|
//! | 50   | list of `(name, code)` ABI pairs            |
//! | 51   | constant at an index                        |
//! | 52   | primitive descriptor at an index            |
//! | 53   | `(size, alignment, kind, elements)` of a descriptor |
//! | 54   | build a descriptor from `(size, alignment, kind, elements)` |
//!
//! Descriptors travel as machine words. Any other code fails with
//! `Unknown ffi function: <code>`.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use rtsffi_core::{
    ConversionError, FfiError, FromValue, HeapObject, IntoValue, ObjectFlags, TaskContext, Value,
};

use crate::types::{TypeDescriptor, constant_at, descriptor_arena, enumerate_abis, lookup_primitive};

/// Stable dispatcher opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum FfiOpcode {
    Abis = 50,
    Constant = 51,
    PrimitiveType = 52,
    DescribeType = 53,
    BuildType = 54,
}

impl FfiOpcode {
    /// Decode an opcode; negative and unassigned codes are unknown.
    pub fn from_code(code: i64) -> Result<Self, FfiError> {
        u32::try_from(code)
            .ok()
            .and_then(|c| FfiOpcode::try_from(c).ok())
            .ok_or(FfiError::UnknownOperation { code })
    }
}

/// Run one dispatcher operation.
///
/// Tuples produced here are allocated on the context's heap and rooted for
/// the current crossing.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn dispatch(ctx: &mut TaskContext, code: i64, arg: &Value) -> Result<Value, FfiError> {
    match FfiOpcode::from_code(code)? {
        FfiOpcode::Abis => {
            let entries = enumerate_abis()
                .iter()
                .map(|abi| {
                    let pair = vec![abi.name.into_value(), abi.code.into_value()];
                    let tuple = HeapObject::Tuple(pair);
                    Value::Object(ctx.alloc_and_save(tuple, ObjectFlags::empty()))
                })
                .collect();
            Ok(Value::List(entries))
        }
        FfiOpcode::Constant => Ok(constant_at(i64::from_value(arg)?)?.into_value()),
        FfiOpcode::PrimitiveType => {
            let ty = lookup_primitive(i64::from_value(arg)?)?;
            Ok(Value::Word(ty.address()))
        }
        FfiOpcode::DescribeType => {
            let ty = descriptor(ctx, arg)?;
            let fields = vec![
                ty.size().into_value(),
                ty.alignment().into_value(),
                ty.kind_code().into_value(),
                Value::Word(ty.elements_address()),
            ];
            let tuple = HeapObject::Tuple(fields);
            Ok(Value::Object(ctx.alloc_and_save(tuple, ObjectFlags::empty())))
        }
        FfiOpcode::BuildType => {
            let fields = tuple_fields(ctx, arg)?;
            let [size, alignment, kind, elements] = fields.as_slice() else {
                return Err(FfiError::ArgumentIndexOutOfBounds {
                    index: 3,
                    count: fields.len(),
                });
            };
            let size = usize::from_value(size)?;
            let alignment = u16::from_value(alignment)?;
            let kind = u16::from_value(kind)?;
            let elements = Vec::<Value>::from_value(elements)?
                .iter()
                .map(|element| descriptor(ctx, element))
                .collect::<Result<Vec<_>, _>>()?;
            let built = descriptor_arena().build(size, alignment, kind, &elements)?;
            Ok(Value::Word(built.address()))
        }
    }
}

/// A machine word passed directly or as a word cell holding it.
pub(crate) fn sys_word(ctx: &TaskContext, value: &Value) -> Result<usize, FfiError> {
    match value {
        Value::Object(handle) => ctx
            .heap
            .word(*handle)
            .ok_or(FfiError::InvalidHandle { what: "word cell" }),
        other => Ok(usize::from_value(other)?),
    }
}

fn descriptor(ctx: &TaskContext, value: &Value) -> Result<&'static TypeDescriptor, FfiError> {
    descriptor_arena().resolve(sys_word(ctx, value)?)
}

/// The fields of a tuple value or of a heap tuple it refers to.
fn tuple_fields(ctx: &TaskContext, value: &Value) -> Result<Vec<Value>, FfiError> {
    match value {
        Value::Tuple(fields) => Ok(fields.clone()),
        Value::Object(handle) => match ctx.heap.get(*handle) {
            Some(HeapObject::Tuple(fields)) => Ok(fields.clone()),
            _ => Err(FfiError::InvalidHandle { what: "tuple" }),
        },
        other => Err(ConversionError::TypeMismatch {
            expected: "tuple",
            actual: other.type_name(),
        }
        .into()),
    }
}
