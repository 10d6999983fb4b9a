//! Runtime entry points callable by name from hosted code.
//!
//! Every function here has the [`RtsFunction`](rtsffi_core::RtsFunction)
//! shape and runs as one boundary crossing on the caller's context. The
//! names in [`FFI_ENTRY_POINTS`] are part of the saved-image format and must
//! not change.

use std::mem::size_of;
use std::sync::OnceLock;

use log::debug;
use rtsffi_core::{
    EntryKind, EntryPoint, EntryPointDef, EntryPointTable, FfiError, HeapObject, ObjectHandle,
    ReloadReport, TaskContext, Value, arg,
};

use crate::config::FfiConfig;
use crate::dispatch::{dispatch, sys_word};
use crate::last_error::{apply_last_error, capture_last_error};
use crate::library::{LibraryHandle, load_library, load_self, resolve_symbol, unload};
use crate::memory;

const CALLBACK_EXCEPTION: &str =
    "A managed function called from foreign code raised an exception. Unable to continue.";

pub const FFI_ENTRY_POINTS: &[EntryPointDef] = &[
    EntryPointDef::new("FfiGeneral", ffi_general),
    EntryPointDef::new("FfiSizeFloat", ffi_size_float),
    EntryPointDef::new("FfiSizeDouble", ffi_size_double),
    EntryPointDef::new("FfiGetError", ffi_get_error),
    EntryPointDef::new("FfiSetError", ffi_set_error),
    EntryPointDef::new("FfiCreateExtFn", ffi_create_ext_fn),
    EntryPointDef::new("FfiCreateExtData", ffi_create_ext_data),
    EntryPointDef::new("FfiCallbackException", ffi_callback_exception),
    EntryPointDef::new("FfiMalloc", ffi_malloc),
    EntryPointDef::new("FfiFree", ffi_free),
    EntryPointDef::new("FfiLoadLibrary", ffi_load_library),
    EntryPointDef::new("FfiLoadExecutable", ffi_load_executable),
    EntryPointDef::new("FfiUnloadLibrary", ffi_unload_library),
    EntryPointDef::new("FfiGetSymbolAddress", ffi_get_symbol_address),
];

static ENTRY_POINTS: OnceLock<EntryPointTable> = OnceLock::new();

/// Build the process-wide table from this crate's entries followed by
/// `extra`.
///
/// Must run before anything reads the table. The FFI's own names take
/// precedence over duplicates in `extra`.
pub fn init_entry_points(
    extra: &'static [EntryPointDef],
) -> Result<&'static EntryPointTable, FfiError> {
    let mut installed = false;
    let table = ENTRY_POINTS.get_or_init(|| {
        installed = true;
        EntryPointTable::new(&[FFI_ENTRY_POINTS, extra])
    });
    if !installed {
        return Err(FfiError::Foreign {
            message: "entry point table already initialised".into(),
        });
    }
    debug!("entry point table initialised with {} entries", table.len());
    Ok(table)
}

/// The process-wide entry-point table.
pub fn entry_points() -> &'static EntryPointTable {
    ENTRY_POINTS.get_or_init(|| EntryPointTable::new(&[FFI_ENTRY_POINTS]))
}

/// A context sized by the installed configuration.
pub fn new_task_context(id: u32) -> TaskContext {
    TaskContext::with_root_capacity(id, FfiConfig::current().initial_root_capacity())
}

/// Drop every entry point's address before the heap is written out.
pub fn prepare_image_save(ctx: &mut TaskContext) -> usize {
    ctx.heap.clear_entry_points()
}

/// Rebind every entry point in a freshly loaded heap.
pub fn reload_entry_points(ctx: &mut TaskContext) -> ReloadReport {
    ctx.heap.resolve_entry_points(entry_points())
}

/// Allocate an entry-point record for `name`, rooted for the current crossing.
pub fn create_entry_point(
    ctx: &mut TaskContext,
    name: &str,
    kind: EntryKind,
) -> Result<ObjectHandle, FfiError> {
    let entry = EntryPoint::from_name(name, kind, entry_points())?;
    Ok(ctx.alloc_and_save(HeapObject::EntryPoint(entry), EntryPoint::FLAGS))
}

fn raw_arg(args: &[Value], index: usize) -> Result<&Value, FfiError> {
    args.get(index).ok_or(FfiError::ArgumentIndexOutOfBounds {
        index,
        count: args.len(),
    })
}

fn word_arg(ctx: &TaskContext, args: &[Value], index: usize) -> Result<usize, FfiError> {
    sys_word(ctx, raw_arg(args, index)?)
}

/// `(code, argument)`: run a dispatcher operation.
pub fn ffi_general(ctx: &mut TaskContext, args: &[Value]) -> Result<Value, FfiError> {
    ctx.boundary_call(args, |ctx, _| {
        let code: i64 = arg(args, 0)?;
        dispatch(ctx, code, raw_arg(args, 1)?)
    })
}

/// Size in bytes of a native `float`.
pub fn ffi_size_float(ctx: &mut TaskContext, _: &[Value]) -> Result<Value, FfiError> {
    ctx.boundary_call(&[], |_, _| Ok(Value::Int(size_of::<f32>() as i64)))
}

/// Size in bytes of a native `double`.
pub fn ffi_size_double(ctx: &mut TaskContext, _: &[Value]) -> Result<Value, FfiError> {
    ctx.boundary_call(&[], |_, _| Ok(Value::Int(size_of::<f64>() as i64)))
}

/// `(cell)`: store the last-error code into a word cell.
pub fn ffi_get_error(ctx: &mut TaskContext, args: &[Value]) -> Result<Value, FfiError> {
    ctx.boundary_call(args, |ctx, _| {
        capture_last_error(ctx, arg(args, 0)?)?;
        Ok(Value::Unit)
    })
}

/// `(cell)`: load the last-error code from a word cell.
pub fn ffi_set_error(ctx: &mut TaskContext, args: &[Value]) -> Result<Value, FfiError> {
    ctx.boundary_call(args, |ctx, _| {
        apply_last_error(ctx, arg(args, 0)?)?;
        Ok(Value::Unit)
    })
}

/// `(name)`: entry point for a function.
pub fn ffi_create_ext_fn(ctx: &mut TaskContext, args: &[Value]) -> Result<Value, FfiError> {
    ctx.boundary_call(args, |ctx, _| {
        let name: String = arg(args, 0)?;
        Ok(Value::Object(create_entry_point(ctx, &name, EntryKind::Function)?))
    })
}

/// `(name)`: entry point for data, which some platforms relocate differently.
pub fn ffi_create_ext_data(ctx: &mut TaskContext, args: &[Value]) -> Result<Value, FfiError> {
    ctx.boundary_call(args, |ctx, _| {
        let name: String = arg(args, 0)?;
        Ok(Value::Object(create_entry_point(ctx, &name, EntryKind::Data)?))
    })
}

/// Called when a callback's managed code raised. Never returns.
pub fn ffi_callback_exception(ctx: &mut TaskContext, _: &[Value]) -> Result<Value, FfiError> {
    ctx.boundary_call(&[], |_, _| Err(FfiError::unrecoverable(CALLBACK_EXCEPTION)))
}

/// `(size)`: raw memory from the C allocator.
pub fn ffi_malloc(ctx: &mut TaskContext, args: &[Value]) -> Result<Value, FfiError> {
    ctx.boundary_call(args, |_, _| {
        let size: usize = arg(args, 0)?;
        Ok(Value::Word(memory::allocate(size)?))
    })
}

/// `(address)`: release memory from `FfiMalloc`.
pub fn ffi_free(ctx: &mut TaskContext, args: &[Value]) -> Result<Value, FfiError> {
    ctx.boundary_call(args, |ctx, _| {
        memory::release(word_arg(ctx, args, 0)?);
        Ok(Value::Unit)
    })
}

/// `(path)`: load a library.
pub fn ffi_load_library(ctx: &mut TaskContext, args: &[Value]) -> Result<Value, FfiError> {
    ctx.boundary_call(args, |_, _| {
        let path: String = arg(args, 0)?;
        Ok(Value::Word(load_library(&path)?.as_word()))
    })
}

/// Handle for the running executable's own symbols.
pub fn ffi_load_executable(ctx: &mut TaskContext, _: &[Value]) -> Result<Value, FfiError> {
    ctx.boundary_call(&[], |_, _| Ok(Value::Word(load_self()?.as_word())))
}

/// `(handle)`: unload a library.
pub fn ffi_unload_library(ctx: &mut TaskContext, args: &[Value]) -> Result<Value, FfiError> {
    ctx.boundary_call(args, |ctx, _| {
        let handle = LibraryHandle::from_word(word_arg(ctx, args, 0)?)?;
        unload(handle)?;
        Ok(Value::Unit)
    })
}

/// `(handle, name)`: address of a symbol.
pub fn ffi_get_symbol_address(ctx: &mut TaskContext, args: &[Value]) -> Result<Value, FfiError> {
    ctx.boundary_call(args, |ctx, _| {
        let handle = LibraryHandle::from_word(word_arg(ctx, args, 0)?)?;
        let name: String = arg(args, 1)?;
        Ok(Value::Word(resolve_symbol(handle, &name)?.get()))
    })
}
