//! Object model and class system
//!
//! Classes carry a vtable of instance methods (shared slot layout with their
//! parent, so an override occupies the slot it overrides) and a separate
//! table of static methods. Method bodies are host closures registered at
//! build time; the bridge never sees them, only opaque [`MethodId`]s.

use crate::exception::VmException;
use crate::refs::ObjRef;
use crate::runtime::Runtime;
use crate::value::Value;
use std::sync::Arc;

/// Index of a class in the runtime's class registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub(crate) usize);

impl ClassId {
    /// Raw registry index, mainly for diagnostics.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A method implementation: receives the runtime, the receiver (None for
/// statics), and the argument list. Argument arity and types are the
/// caller's contract; bodies are expected to validate what they use and
/// raise a [`VmException`] rather than panic on a mismatch.
pub type MethodBody =
    Arc<dyn Fn(&Runtime, Option<ObjRef>, &[Value]) -> Result<Value, VmException> + Send + Sync>;

/// Opaque identity of a resolved method.
///
/// Valid for the class it was resolved on and, for instance methods, for any
/// subclass sharing the vtable slot. Resolved once, reused for every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodId {
    pub(crate) class: ClassId,
    pub(crate) index: usize,
    pub(crate) table: MethodTable,
}

/// Which table a method identity points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MethodTable {
    Instance,
    Static,
}

/// A named method entry: selector plus body.
#[derive(Clone)]
pub(crate) struct MethodEntry {
    pub(crate) name: String,
    pub(crate) signature: String,
    pub(crate) body: MethodBody,
}

impl MethodEntry {
    pub(crate) fn matches(&self, name: &str, signature: &str) -> bool {
        self.name == name && self.signature == signature
    }
}

impl std::fmt::Debug for MethodEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.name, self.signature)
    }
}

/// Virtual method table for dynamic dispatch.
///
/// A subclass starts from a copy of its parent's slots; declaring a method
/// with a selector already present replaces that slot (an override), any
/// other declaration appends a new slot. Slot indices are therefore stable
/// across a class hierarchy.
#[derive(Debug, Clone, Default)]
pub struct VTable {
    pub(crate) slots: Vec<MethodEntry>,
}

impl VTable {
    /// Find the slot index for a selector.
    pub(crate) fn slot_of(&self, name: &str, signature: &str) -> Option<usize> {
        self.slots.iter().position(|m| m.matches(name, signature))
    }

    /// Add or override a method, returning its slot index.
    pub(crate) fn declare(&mut self, entry: MethodEntry) -> usize {
        match self.slot_of(&entry.name, &entry.signature) {
            Some(slot) => {
                self.slots[slot] = entry;
                slot
            }
            None => {
                self.slots.push(entry);
                self.slots.len() - 1
            }
        }
    }

    /// Number of slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

/// Class definition metadata.
#[derive(Debug, Clone)]
pub struct Class {
    /// Class ID (registry index)
    pub(crate) id: ClassId,
    /// Interop-format class name
    pub(crate) name: String,
    /// Parent class, if any
    pub(crate) parent: Option<ClassId>,
    /// Field names, inherited fields first
    pub(crate) fields: Vec<String>,
    /// Virtual method table
    pub(crate) vtable: VTable,
    /// Static methods (not inherited)
    pub(crate) statics: Vec<MethodEntry>,
}

impl Class {
    /// Interop-format class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent class id, if any.
    pub fn parent(&self) -> Option<ClassId> {
        self.parent
    }

    /// Number of fields, including inherited ones.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Index of a field by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }
}

/// Object instance (heap-allocated).
#[derive(Debug, Clone)]
pub struct Object {
    /// Class ID (index into the runtime's class registry)
    pub class: ClassId,
    /// Field values, inherited fields first
    pub fields: Vec<Value>,
}

impl Object {
    /// Create a new object with null-initialized fields.
    pub fn new(class: ClassId, field_count: usize) -> Self {
        Self {
            class,
            fields: vec![Value::Null; field_count],
        }
    }
}
