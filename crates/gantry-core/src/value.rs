//! Value representation crossing the runtime boundary
//!
//! A [`Value`] is what flows through the bridge: method arguments, method
//! results, and field contents. Primitives are stored inline; everything
//! heap-allocated travels as an opaque [`ObjRef`] handle.

use crate::refs::ObjRef;
use std::fmt;

/// A managed-runtime value as seen at the bridge boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Null / absent value (also the result of void methods)
    Null,

    /// Boolean value
    Bool(bool),

    /// 32-bit signed integer
    I32(i32),

    /// 64-bit signed integer
    I64(i64),

    /// 64-bit floating point number
    F64(f64),

    /// Reference to a heap object (instance, string, array, map, or class)
    Obj(ObjRef),
}

impl Value {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as boolean if this is a bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i32 if this is an i32
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as i64 if this is an i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is an f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as an object reference if this is a reference
    pub fn as_obj(&self) -> Option<ObjRef> {
        match self {
            Value::Obj(r) => Some(*r),
            _ => None,
        }
    }

    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F64(_) => "f64",
            Value::Obj(_) => "object",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::I32(i) => write!(f, "{}", i),
            Value::I64(i) => write!(f, "{}", i),
            Value::F64(fl) => write!(f, "{}", fl),
            Value::Obj(r) => write!(f, "{}", r),
        }
    }
}
