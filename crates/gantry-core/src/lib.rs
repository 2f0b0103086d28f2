//! Gantry managed-runtime facade
//!
//! This crate provides the managed-runtime half of the Gantry bridge:
//! - Value model crossing the runtime boundary
//! - Object/class model with vtable dispatch
//! - Reference table (local frames, global references, leak accounting)
//! - Exception values with cause chains
//! - The [`Runtime`] entry points the bridge resolves and dispatches against
//!
//! It is deliberately small: just enough of a runtime that virtual dispatch,
//! overrides, and reference discipline are observable, which is what the
//! bridge's contracts are written against.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod exception;
pub mod object;
pub mod refs;
pub mod runtime;
pub mod value;

pub use exception::{well_known, VmException};
pub use object::{Class, ClassId, MethodBody, MethodId, Object, VTable};
pub use refs::{LocalFrame, ObjRef, ScopedRef};
pub use runtime::{BuildError, ClassBuilder, HeapKind, Runtime, RuntimeBuilder, CONSTRUCTOR_NAME};
pub use value::Value;
