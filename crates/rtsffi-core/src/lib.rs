//! Core runtime pieces shared by the rtsffi foreign-function layer.
//!
//! - [`Value`]: the boundary's view of a managed value
//! - [`ManagedHeap`]: collector-visible objects with header flags
//! - [`SaveVec`]: the per-context root stack
//! - [`TaskContext`]: one hosted execution context and its boundary protocol
//! - [`EntryPoint`] / [`EntryPointTable`]: reload-safe function references

pub mod boundary;
pub mod context;
pub mod convert;
pub mod entry;
pub mod error;
pub mod heap;
pub mod roots;
pub mod value;

pub use boundary::{BoundaryResult, BoundaryState, crash};
pub use context::{TaskContext, TaskId};
pub use convert::{FromValue, IntoValue, arg};
pub use entry::{
    EntryAddress, EntryKind, EntryPoint, EntryPointDef, EntryPointTable, EntrySlot,
    PersistedEntryPoint, RtsFunction,
};
pub use error::{ConversionError, DEFAULT_MESSAGE_LIMIT, ErrorKind, FfiError, bounded_message};
pub use heap::{HeapObject, ManagedHeap, ObjectFlags, ObjectHandle, ReloadReport};
pub use roots::{RootHandle, SavePoint, SaveVec};
pub use value::Value;
