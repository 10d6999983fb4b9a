//! Managed value representation seen at the boundary.

use std::fmt;

use crate::heap::ObjectHandle;

/// A value exchanged between hosted code and the foreign-function layer.
///
/// This is the boundary's view of a managed value: arguments arrive in this
/// form and results leave in it. `Unit` doubles as the neutral "no result"
/// sentinel returned when an operation fails.
#[derive(Clone, PartialEq, Default)]
pub enum Value {
    /// Unit / no result
    #[default]
    Unit,
    /// Arbitrary-precision integer as far as the boundary needs it
    Int(i64),
    /// Machine word holding a native address or handle
    Word(usize),
    /// Immutable byte string
    String(String),
    /// Fixed-size record
    Tuple(Vec<Value>),
    /// Linked list, flattened
    List(Vec<Value>),
    /// Reference to a collector-visible heap object
    Object(ObjectHandle),
}

impl Value {
    /// Get a human-readable name for this value's shape.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Int(_) => "int",
            Value::Word(_) => "word",
            Value::String(_) => "string",
            Value::Tuple(_) => "tuple",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    /// Check if this is the unit value.
    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }

    /// Visit every object reference directly held by this value, recursively.
    pub fn visit_objects(&mut self, visitor: &mut dyn FnMut(&mut ObjectHandle)) {
        match self {
            Value::Object(handle) => visitor(handle),
            Value::Tuple(items) | Value::List(items) => {
                for item in items {
                    item.visit_objects(visitor);
                }
            }
            Value::Unit | Value::Int(_) | Value::Word(_) | Value::String(_) => {}
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "Unit"),
            Value::Int(v) => write!(f, "Int({})", v),
            Value::Word(w) => write!(f, "Word({:#x})", w),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Tuple(items) => f.debug_tuple("Tuple").field(items).finish(),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Object(h) => write!(f, "Object({:?})", h),
        }
    }
}
