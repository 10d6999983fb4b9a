//! The seam to the machine-level call engine.
//!
//! Marshalling arguments into a call frame is the engine's job. This module
//! only checks that a call is well formed before handing it over.

use std::num::NonZeroUsize;

use rtsffi_core::{EntryPoint, FfiError};

use crate::types::{ABI_TABLE, MIN_RESULT_SIZE, TypeDescriptor, is_known_abi};

/// Performs a native call described by type descriptors.
pub trait CallEngine {
    /// Call `code` using `abi`.
    ///
    /// `args` holds the address of each argument's storage, in the order of
    /// `arg_types`. The result is written into `result`, which is at least
    /// [`MIN_RESULT_SIZE`] bytes and at least the result type's size.
    fn call(
        &self,
        abi: u32,
        result_type: &TypeDescriptor,
        arg_types: &[&TypeDescriptor],
        code: NonZeroUsize,
        args: &[usize],
        result: &mut [u8],
    ) -> Result<(), FfiError>;
}

/// A checked native call signature.
#[derive(Debug, Clone)]
pub struct CallSignature<'a> {
    abi: u32,
    result_type: &'a TypeDescriptor,
    arg_types: Vec<&'a TypeDescriptor>,
}

impl<'a> CallSignature<'a> {
    pub fn new(
        abi: u32,
        result_type: &'a TypeDescriptor,
        arg_types: Vec<&'a TypeDescriptor>,
    ) -> Result<Self, FfiError> {
        if !is_known_abi(abi) {
            let names: Vec<_> = ABI_TABLE.iter().map(|a| a.name).collect();
            let known = names.join(", ");
            return Err(FfiError::Foreign {
                message: format!("unknown abi code {abi} (platform has {known})"),
            });
        }
        Ok(Self {
            abi,
            result_type,
            arg_types,
        })
    }

    pub fn abi(&self) -> u32 {
        self.abi
    }

    pub fn result_type(&self) -> &'a TypeDescriptor {
        self.result_type
    }

    pub fn arg_types(&self) -> &[&'a TypeDescriptor] {
        &self.arg_types
    }

    /// Bytes the result buffer must provide.
    pub fn result_space(&self) -> usize {
        self.result_type.size().max(MIN_RESULT_SIZE)
    }

    /// Call the function `entry` refers to.
    ///
    /// An unresolved entry point here means the image and the running
    /// runtime disagree, which is unrecoverable.
    pub fn call(
        &self,
        engine: &dyn CallEngine,
        entry: &EntryPoint,
        args: &[usize],
        result: &mut [u8],
    ) -> Result<(), FfiError> {
        let Some(code) = entry.address().and_then(NonZeroUsize::new) else {
            return Err(entry.unresolved_error());
        };
        self.call_address(engine, code, args, result)
    }

    /// Call a raw code address.
    pub fn call_address(
        &self,
        engine: &dyn CallEngine,
        code: NonZeroUsize,
        args: &[usize],
        result: &mut [u8],
    ) -> Result<(), FfiError> {
        if args.len() != self.arg_types.len() {
            return Err(FfiError::ArgumentIndexOutOfBounds {
                index: args.len(),
                count: self.arg_types.len(),
            });
        }
        let needed = self.result_space();
        if result.len() < needed {
            return Err(FfiError::IndexOutOfRange {
                what: "result buffer",
                index: result.len() as i64,
                len: needed,
            });
        }
        engine.call(
            self.abi,
            self.result_type,
            &self.arg_types,
            code,
            args,
            result,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use rtsffi_core::{
        EntryKind, EntryPointDef, EntryPointTable, PersistedEntryPoint, TaskContext, Value,
    };

    use crate::types::{DEFAULT_ABI, TYPE_DOUBLE, TYPE_SINT32, TYPE_UINT8};

    #[derive(Default)]
    struct RecordingEngine {
        calls: RefCell<Vec<(u32, usize, usize)>>,
    }

    impl CallEngine for RecordingEngine {
        fn call(
            &self,
            abi: u32,
            _result_type: &TypeDescriptor,
            _arg_types: &[&TypeDescriptor],
            code: NonZeroUsize,
            args: &[usize],
            result: &mut [u8],
        ) -> Result<(), FfiError> {
            self.calls.borrow_mut().push((abi, code.get(), args.len()));
            result[0] = 0x5A;
            Ok(())
        }
    }

    fn nop(_: &mut TaskContext, _: &[Value]) -> Result<Value, FfiError> {
        Ok(Value::Unit)
    }

    const TABLE: &[EntryPointDef] = &[EntryPointDef::new("Nop", nop)];

    #[test]
    fn rejects_unknown_abi() {
        assert!(CallSignature::new(0, &TYPE_SINT32, vec![]).is_err());
    }

    #[test]
    fn result_space_never_below_minimum() {
        let sig = CallSignature::new(DEFAULT_ABI, &TYPE_UINT8, vec![]).unwrap();
        assert_eq!(sig.result_space(), MIN_RESULT_SIZE);
        let sig = CallSignature::new(DEFAULT_ABI, &TYPE_DOUBLE, vec![]).unwrap();
        assert_eq!(sig.result_space(), 8.max(MIN_RESULT_SIZE));
    }

    #[test]
    fn forwards_to_engine() {
        let table = EntryPointTable::new(&[TABLE]);
        let entry = EntryPoint::from_name("Nop", EntryKind::Function, &table).unwrap();
        let sig = CallSignature::new(DEFAULT_ABI, &TYPE_SINT32, vec![&TYPE_DOUBLE]).unwrap();
        let engine = RecordingEngine::default();
        let arg = 1.5f64;
        let mut result = [0u8; 16];

        sig.call(&engine, &entry, &[&arg as *const f64 as usize], &mut result)
            .unwrap();

        assert_eq!(result[0], 0x5A);
        let calls = engine.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (DEFAULT_ABI, entry.address().unwrap(), 1));
    }

    #[test]
    fn small_result_buffer_is_a_range_error() {
        let sig = CallSignature::new(DEFAULT_ABI, &TYPE_DOUBLE, vec![]).unwrap();
        let engine = RecordingEngine::default();
        let mut result = [0u8; 2];
        let code = NonZeroUsize::new(0x1000).unwrap();
        assert!(matches!(
            sig.call_address(&engine, code, &[], &mut result),
            Err(FfiError::IndexOutOfRange { .. })
        ));
        assert!(engine.calls.borrow().is_empty());
    }

    #[test]
    fn argument_count_must_match() {
        let sig = CallSignature::new(DEFAULT_ABI, &TYPE_SINT32, vec![&TYPE_SINT32]).unwrap();
        let engine = RecordingEngine::default();
        let mut result = [0u8; 16];
        let code = NonZeroUsize::new(0x1000).unwrap();
        assert!(sig.call_address(&engine, code, &[], &mut result).is_err());
    }

    #[test]
    fn unresolved_entry_is_unrecoverable() {
        let entry = EntryPoint::from_persisted(PersistedEntryPoint {
            name: "Gone".into(),
            kind: EntryKind::Function,
        });
        let sig = CallSignature::new(DEFAULT_ABI, &TYPE_SINT32, vec![]).unwrap();
        let engine = RecordingEngine::default();
        let mut result = [0u8; 16];
        let err = sig.call(&engine, &entry, &[], &mut result).unwrap_err();
        assert!(err.is_unrecoverable());
        assert!(engine.calls.borrow().is_empty());
    }
}
