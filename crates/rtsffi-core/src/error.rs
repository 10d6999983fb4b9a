//! Error types for the foreign-function boundary.
//!
//! Every operation reachable from hosted code reports failure through
//! [`FfiError`]. The boundary protocol turns all recoverable kinds into an
//! ordinary failure result; [`ErrorKind::Unrecoverable`] is the only kind
//! that terminates the process instead.
//!
//! ```text
//! FfiError
//! ├── Range         - index or opcode outside a fixed table
//! ├── Foreign       - loader, symbol, entry-point and descriptor failures
//! ├── OutOfMemory   - descriptor construction or string duplication
//! ├── System        - platform error code with POSIX-style semantics
//! ├── Conversion    - hosted argument of the wrong shape
//! └── Unrecoverable - no channel left to report the failure
//! ```

use thiserror::Error;

/// Size of the diagnostic buffer used for platform messages, terminator included.
pub const DEFAULT_MESSAGE_LIMIT: usize = 256;

/// Coarse classification of an [`FfiError`], as observed by hosted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Range,
    Foreign,
    OutOfMemory,
    System,
    Conversion,
    Unrecoverable,
}

/// Errors raised when a hosted value cannot be converted to the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// Type mismatch during conversion
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Integer does not fit in the target type
    #[error("integer overflow: value {value} does not fit in {target_type}")]
    IntegerOverflow {
        value: i128,
        target_type: &'static str,
    },

    /// String contains an interior NUL and cannot be passed to C
    #[error("string contains an interior NUL byte at offset {offset}")]
    InteriorNul { offset: usize },
}

/// Errors produced by the foreign-function layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FfiError {
    /// Index outside a fixed table.
    #[error("{what} index {index} out of range (table has {len} entries)")]
    IndexOutOfRange {
        what: &'static str,
        index: i64,
        len: usize,
    },

    /// Dispatcher opcode with no assigned operation.
    #[error("Unknown ffi function: {code}")]
    UnknownOperation { code: i64 },

    /// Native loader, symbol or descriptor failure.
    #[error("{message}")]
    Foreign { message: String },

    /// Hosted code asked for an entry point the runtime does not provide.
    #[error("entry point not found: {name}")]
    EntryPointNotFound { name: String },

    /// Allocation failed.
    #[error("Insufficient memory: {what}")]
    OutOfMemory { what: &'static str },

    /// Wrapped platform error code.
    #[error("{message} (error {code})")]
    System { message: String, code: i32 },

    /// Hosted argument had the wrong shape.
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Argument index outside the supplied argument list.
    #[error("argument index {index} out of bounds (operation has {count} arguments)")]
    ArgumentIndexOutOfBounds { index: usize, count: usize },

    /// A handle or address that does not name a live object of the expected type.
    #[error("invalid {what} handle")]
    InvalidHandle { what: &'static str },

    /// A delegate panicked while executing inside the boundary.
    #[error("native operation panicked: {message}")]
    Panic { message: String },

    /// Nothing on either side of the boundary can continue.
    #[error("{message}")]
    Unrecoverable { message: String },
}

impl FfiError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FfiError::IndexOutOfRange { .. } | FfiError::UnknownOperation { .. } => {
                ErrorKind::Range
            }
            FfiError::Foreign { .. }
            | FfiError::EntryPointNotFound { .. }
            | FfiError::InvalidHandle { .. }
            | FfiError::Panic { .. } => ErrorKind::Foreign,
            FfiError::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            FfiError::System { .. } => ErrorKind::System,
            FfiError::Conversion(_) | FfiError::ArgumentIndexOutOfBounds { .. } => {
                ErrorKind::Conversion
            }
            FfiError::Unrecoverable { .. } => ErrorKind::Unrecoverable,
        }
    }

    /// True if this error must terminate the process rather than be returned.
    pub fn is_unrecoverable(&self) -> bool {
        self.kind() == ErrorKind::Unrecoverable
    }

    /// Create a foreign error whose message is cut to `limit` bytes, terminator included.
    pub fn foreign(message: impl Into<String>, limit: usize) -> Self {
        FfiError::Foreign {
            message: bounded_message(message.into(), limit),
        }
    }

    /// Create an unrecoverable error.
    pub fn unrecoverable(message: impl Into<String>) -> Self {
        FfiError::Unrecoverable {
            message: message.into(),
        }
    }
}

/// Truncate a diagnostic to fit a C-style buffer of `limit` bytes.
///
/// One byte is reserved for the terminator, and the cut never splits a
/// UTF-8 sequence.
pub fn bounded_message(mut message: String, limit: usize) -> String {
    let max = limit.saturating_sub(1);
    if message.len() > max {
        let mut cut = max;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_errors_classify_as_range() {
        let err = FfiError::IndexOutOfRange {
            what: "constant",
            index: 99,
            len: 16,
        };
        assert_eq!(err.kind(), ErrorKind::Range);
        assert!(err.to_string().contains("99"));
        assert_eq!(
            FfiError::UnknownOperation { code: 7 }.kind(),
            ErrorKind::Range
        );
    }

    #[test]
    fn unknown_operation_carries_code() {
        let err = FfiError::UnknownOperation { code: 4242 };
        assert_eq!(err.to_string(), "Unknown ffi function: 4242");
        let err = FfiError::UnknownOperation { code: -3 };
        assert_eq!(err.to_string(), "Unknown ffi function: -3");
    }

    #[test]
    fn entry_point_not_found_is_foreign() {
        let err = FfiError::EntryPointNotFound {
            name: "NoSuchEntry".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Foreign);
        assert!(err.to_string().contains("entry point not found"));
    }

    #[test]
    fn only_unrecoverable_is_fatal() {
        assert!(FfiError::unrecoverable("boom").is_unrecoverable());
        let oom = FfiError::OutOfMemory { what: "descriptor" };
        assert!(!oom.is_unrecoverable());
        assert!(
            !FfiError::Panic {
                message: "x".into()
            }
            .is_unrecoverable()
        );
    }

    #[test]
    fn conversion_error_converts() {
        let err: FfiError = ConversionError::TypeMismatch {
            expected: "int",
            actual: "string",
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Conversion);
        assert!(err.to_string().contains("expected int"));
    }

    #[test]
    fn bounded_message_keeps_short_text() {
        assert_eq!(bounded_message("short".into(), 256), "short");
    }

    #[test]
    fn bounded_message_reserves_terminator() {
        let long = "x".repeat(400);
        assert_eq!(bounded_message(long, 256).len(), 255);
    }

    #[test]
    fn bounded_message_respects_char_boundaries() {
        // 'é' is two bytes; a cut at byte 4 would split the third one.
        let text = "éééé".to_string();
        let cut = bounded_message(text, 5);
        assert_eq!(cut, "éé");
    }

    #[test]
    fn foreign_constructor_truncates() {
        let err = FfiError::foreign("y".repeat(1000), 64);
        match err {
            FfiError::Foreign { message } => assert_eq!(message.len(), 63),
            other => panic!("unexpected {other:?}"),
        }
    }
}
