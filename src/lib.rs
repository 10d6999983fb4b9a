//! Foreign-function boundary for a garbage-collected runtime.
//!
//! Hosted programs use this crate to describe native data layouts, bind to
//! dynamic libraries, hold reload-safe references to runtime functions and
//! move the platform's last-error code in and out of managed cells. Every
//! operation reachable from hosted code runs as a boundary crossing on the
//! caller's [`TaskContext`](rtsffi_core::TaskContext).

pub mod call;
pub mod config;
pub mod dispatch;
pub mod last_error;
pub mod library;
pub mod memory;
pub mod rts;
pub mod types;

pub mod prelude {
    pub use crate::call::{CallEngine, CallSignature};
    pub use crate::config::{FfiConfig, FfiProperty};
    pub use crate::dispatch::{FfiOpcode, dispatch};
    pub use crate::last_error::{apply_last_error, capture_last_error, last_error, set_last_error};
    pub use crate::library::{LibraryHandle, load_library, load_self, resolve_symbol, unload};
    pub use crate::rts::{
        FFI_ENTRY_POINTS, create_entry_point, entry_points, init_entry_points, new_task_context,
        prepare_image_save, reload_entry_points,
    };
    pub use crate::types::*;
    pub use rtsffi_core::{
        BoundaryResult, BoundaryState, EntryKind, EntryPoint, EntryPointDef, EntryPointTable,
        ErrorKind, FfiError, HeapObject, ObjectFlags, ObjectHandle, TaskContext, Value,
    };
}
