//! Conversion traits for argument extraction and result construction.
//!
//! - [`FromValue`]: extract a Rust value from a hosted [`Value`]
//! - [`IntoValue`]: build a hosted [`Value`] from a Rust value
//!
//! Native addresses travel as [`Value::Word`]; integers may arrive either as
//! `Int` or as `Word` and are range-checked on the way in.

use crate::error::{ConversionError, FfiError};
use crate::heap::ObjectHandle;
use crate::value::Value;

/// Extract a value from a hosted value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, ConversionError>;
}

/// Convert a value into a hosted value.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Get a typed argument from an argument list.
///
/// ```ignore
/// let size: usize = arg(args, 0)?;
/// let name: String = arg(args, 1)?;
/// ```
pub fn arg<T: FromValue>(args: &[Value], index: usize) -> Result<T, FfiError> {
    let value = args.get(index).ok_or(FfiError::ArgumentIndexOutOfBounds {
        index,
        count: args.len(),
    })?;
    Ok(T::from_value(value)?)
}

macro_rules! impl_integer {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self, ConversionError> {
                    let wide: i128 = match value {
                        Value::Int(v) => *v as i128,
                        Value::Word(w) => *w as i128,
                        other => {
                            return Err(ConversionError::TypeMismatch {
                                expected: "int",
                                actual: other.type_name(),
                            })
                        }
                    };
                    <$ty>::try_from(wide).map_err(|_| ConversionError::IntegerOverflow {
                        value: wide,
                        target_type: stringify!($ty),
                    })
                }
            }
        )*
    };
}

impl_integer!(i32, i64, u16, u32, u64, usize);

macro_rules! impl_into_int {
    ($($ty:ty),*) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::Int(self as i64)
                }
            }
        )*
    };
}

impl_into_int!(i32, i64, u16, u32);

impl IntoValue for usize {
    fn into_value(self) -> Value {
        Value::Int(self as i64)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(ConversionError::TypeMismatch {
                expected: "string",
                actual: other.type_name(),
            }),
        }
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl FromValue for ObjectHandle {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Object(h) => Ok(*h),
            other => Err(ConversionError::TypeMismatch {
                expected: "object",
                actual: other.type_name(),
            }),
        }
    }
}

impl IntoValue for ObjectHandle {
    fn into_value(self) -> Value {
        Value::Object(self)
    }
}

impl FromValue for Vec<Value> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::List(items) | Value::Tuple(items) => Ok(items.clone()),
            other => Err(ConversionError::TypeMismatch {
                expected: "list",
                actual: other.type_name(),
            }),
        }
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Unit
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_and_word_both_extract() {
        assert_eq!(usize::from_value(&Value::Int(12)), Ok(12));
        assert_eq!(usize::from_value(&Value::Word(12)), Ok(12));
        assert_eq!(u16::from_value(&Value::Int(8)), Ok(8));
    }

    #[test]
    fn negative_to_unsigned_overflows() {
        let err = usize::from_value(&Value::Int(-1)).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::IntegerOverflow { value: -1, .. }
        ));
    }

    #[test]
    fn narrowing_checks_bounds() {
        assert!(u16::from_value(&Value::Int(70_000)).is_err());
        assert!(i32::from_value(&Value::Int(i64::MAX)).is_err());
    }

    #[test]
    fn string_mismatch_reports_actual() {
        let err = String::from_value(&Value::Int(1)).unwrap_err();
        assert_eq!(
            err,
            ConversionError::TypeMismatch {
                expected: "string",
                actual: "int"
            }
        );
    }

    #[test]
    fn arg_out_of_bounds() {
        let args = vec![Value::Int(1)];
        let err = arg::<i64>(&args, 3).unwrap_err();
        assert_eq!(
            err,
            FfiError::ArgumentIndexOutOfBounds { index: 3, count: 1 }
        );
    }

    #[test]
    fn arg_extracts_typed() {
        let args = vec![Value::Int(1), Value::String("libm.so".into())];
        assert_eq!(arg::<i64>(&args, 0).unwrap(), 1);
        assert_eq!(arg::<String>(&args, 1).unwrap(), "libm.so");
    }

    #[test]
    fn lists_and_tuples_extract_as_vec() {
        let list = Value::List(vec![Value::Word(1), Value::Word(2)]);
        assert_eq!(Vec::<Value>::from_value(&list).unwrap().len(), 2);
        assert!(Vec::<Value>::from_value(&Value::Unit).is_err());
    }
}
