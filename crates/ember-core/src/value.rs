//! Value representation
//!
//! A `Value` is either an inline scalar (nil, boolean, number) or a handle to
//! an object living on the managed heap. Only object-valued values take part
//! in tracing.

use crate::gc::ObjId;
use std::fmt;

/// A VM value
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Value {
    /// The nil value
    #[default]
    Nil,
    /// A boolean
    Bool(bool),
    /// A double-precision number
    Number(f64),
    /// A reference to a heap object
    Obj(ObjId),
}

impl Value {
    /// Create a nil value
    #[inline]
    pub const fn nil() -> Self {
        Value::Nil
    }

    /// Create a boolean value
    #[inline]
    pub const fn bool(b: bool) -> Self {
        Value::Bool(b)
    }

    /// Create a number value
    #[inline]
    pub const fn number(n: f64) -> Self {
        Value::Number(n)
    }

    /// Create an object value
    #[inline]
    pub const fn obj(id: ObjId) -> Self {
        Value::Obj(id)
    }

    /// Check if this value references a heap object
    #[inline]
    pub const fn is_obj(&self) -> bool {
        matches!(self, Value::Obj(_))
    }

    /// Get the object handle, if this value references one
    #[inline]
    pub const fn as_obj(&self) -> Option<ObjId> {
        match self {
            Value::Obj(id) => Some(*id),
            _ => None,
        }
    }

}

impl From<ObjId> for Value {
    fn from(id: ObjId) -> Self {
        Value::Obj(id)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

// Objects need the heap to render their contents; see `Heap::display_value`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Obj(id) => write!(f, "{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_values_are_not_objects() {
        assert!(!Value::nil().is_obj());
        assert!(!Value::bool(true).is_obj());
        assert!(!Value::number(1.5).is_obj());
        assert_eq!(Value::number(1.5).as_obj(), None);
    }

    #[test]
    fn test_display_scalars() {
        assert_eq!(Value::nil().to_string(), "nil");
        assert_eq!(Value::bool(true).to_string(), "true");
        assert_eq!(Value::number(2.5).to_string(), "2.5");
    }

    #[test]
    fn test_value_size() {
        // Tag + 8-byte payload
        assert_eq!(std::mem::size_of::<Value>(), 16);
    }
}
