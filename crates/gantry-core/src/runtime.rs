//! The managed-runtime facade
//!
//! [`Runtime`] is the set of entry points the bridge calls into: class
//! lookup, method-identity resolution, the four invocation shapes, and the
//! heap/reference helpers. Every fallible entry point returns
//! `Result<_, VmException>`; there is no ambient pending-exception state.
//!
//! The class registry is immutable after [`RuntimeBuilder::build`], which is
//! what makes resolved method identities safe to share across threads.

use crate::exception::VmException;
use crate::object::{Class, ClassId, MethodBody, MethodEntry, MethodId, MethodTable, Object, VTable};
use crate::refs::{LocalFrame, ObjRef, RefError, RefTable};
use crate::value::Value;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// The constructor marker: resolving a Constructor-kind method forces the
/// method name to this, regardless of what the caller supplied.
pub const CONSTRUCTOR_NAME: &str = "<init>";

const DEFAULT_MAX_GLOBAL_REFS: usize = 4096;

/// A heap cell. Objects live for the lifetime of the runtime; reclamation
/// is the collector's concern and out of scope here.
#[derive(Debug, Clone)]
enum HeapValue {
    Class(ClassId),
    Instance(Object),
    Str(String),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

/// The kind of heap object behind a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapKind {
    /// A class object (as returned by [`Runtime::find_class`])
    Class,
    /// An object instance
    Instance,
    /// A string
    Str,
    /// An array
    Array,
    /// An ordered map
    Map,
}

/// Errors raised while building a runtime's class registry.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Two classes declared with the same name
    #[error("duplicate class {0}")]
    DuplicateClass(String),

    /// Parent class not declared before its subclass
    #[error("class {class} extends unknown class {parent}")]
    UnknownParent {
        /// The subclass being declared
        class: String,
        /// The missing parent name
        parent: String,
    },

    /// Field name collides with an own or inherited field
    #[error("class {class} declares duplicate field {field}")]
    DuplicateField {
        /// The class being declared
        class: String,
        /// The colliding field name
        field: String,
    },

    /// Two methods declared with the same selector on one class
    #[error("class {class} declares duplicate method {method}{signature}")]
    DuplicateMethod {
        /// The class being declared
        class: String,
        /// The colliding method name
        method: String,
        /// The colliding signature
        signature: String,
    },
}

struct ClassDecl {
    name: String,
    parent: Option<String>,
    fields: Vec<String>,
    instance_methods: Vec<(String, String, MethodBody)>,
    static_methods: Vec<(String, String, MethodBody)>,
}

/// Per-class configuration handle used inside [`RuntimeBuilder::class`].
pub struct ClassBuilder {
    decl: ClassDecl,
}

impl ClassBuilder {
    /// Declare the parent class (must be declared before this class).
    pub fn parent(&mut self, name: &str) -> &mut Self {
        self.decl.parent = Some(name.to_string());
        self
    }

    /// Declare a field. Inherited fields come first in the slot layout.
    pub fn field(&mut self, name: &str) -> &mut Self {
        self.decl.fields.push(name.to_string());
        self
    }

    /// Declare a constructor under the runtime's constructor marker.
    pub fn constructor<F>(&mut self, signature: &str, body: F) -> &mut Self
    where
        F: Fn(&Runtime, Option<ObjRef>, &[Value]) -> Result<Value, VmException>
            + Send
            + Sync
            + 'static,
    {
        self.instance_method(CONSTRUCTOR_NAME, signature, body)
    }

    /// Declare an instance method. Re-declaring a selector inherited from
    /// the parent overrides it in place.
    pub fn instance_method<F>(&mut self, name: &str, signature: &str, body: F) -> &mut Self
    where
        F: Fn(&Runtime, Option<ObjRef>, &[Value]) -> Result<Value, VmException>
            + Send
            + Sync
            + 'static,
    {
        self.decl.instance_methods.push((
            name.to_string(),
            signature.to_string(),
            std::sync::Arc::new(body),
        ));
        self
    }

    /// Declare a static method. Statics are not inherited.
    pub fn static_method<F>(&mut self, name: &str, signature: &str, body: F) -> &mut Self
    where
        F: Fn(&Runtime, Option<ObjRef>, &[Value]) -> Result<Value, VmException>
            + Send
            + Sync
            + 'static,
    {
        self.decl.static_methods.push((
            name.to_string(),
            signature.to_string(),
            std::sync::Arc::new(body),
        ));
        self
    }
}

/// Builder for [`Runtime`].
pub struct RuntimeBuilder {
    max_global_refs: usize,
    classes: Vec<ClassDecl>,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            max_global_refs: DEFAULT_MAX_GLOBAL_REFS,
            classes: Vec::new(),
        }
    }

    /// Cap the global reference table (promotion fails beyond this).
    pub fn max_global_refs(mut self, limit: usize) -> Self {
        self.max_global_refs = limit;
        self
    }

    /// Declare a class. Parents must be declared before their subclasses.
    pub fn class(mut self, name: &str, configure: impl FnOnce(&mut ClassBuilder)) -> Self {
        let mut builder = ClassBuilder {
            decl: ClassDecl {
                name: name.to_string(),
                parent: None,
                fields: Vec::new(),
                instance_methods: Vec::new(),
                static_methods: Vec::new(),
            },
        };
        configure(&mut builder);
        self.classes.push(builder.decl);
        self
    }

    /// Build the runtime. The class registry is immutable afterwards.
    pub fn build(self) -> Result<Runtime, BuildError> {
        let mut classes: Vec<Class> = Vec::with_capacity(self.classes.len());
        let mut class_by_name: FxHashMap<String, ClassId> = FxHashMap::default();

        for decl in self.classes {
            if class_by_name.contains_key(&decl.name) {
                return Err(BuildError::DuplicateClass(decl.name));
            }
            let id = ClassId(classes.len());

            let parent = match &decl.parent {
                Some(parent_name) => Some(*class_by_name.get(parent_name).ok_or_else(|| {
                    BuildError::UnknownParent {
                        class: decl.name.clone(),
                        parent: parent_name.clone(),
                    }
                })?),
                None => None,
            };

            let mut fields = match parent {
                Some(pid) => classes[pid.0].fields.clone(),
                None => Vec::new(),
            };
            for field in &decl.fields {
                if fields.iter().any(|f| f == field) {
                    return Err(BuildError::DuplicateField {
                        class: decl.name,
                        field: field.clone(),
                    });
                }
                fields.push(field.clone());
            }

            let mut vtable = match parent {
                Some(pid) => classes[pid.0].vtable.clone(),
                None => VTable::default(),
            };
            let mut own_selectors: Vec<(String, String)> = Vec::new();
            for (name, signature, body) in decl.instance_methods {
                if own_selectors.iter().any(|(n, s)| *n == name && *s == signature) {
                    return Err(BuildError::DuplicateMethod {
                        class: decl.name,
                        method: name,
                        signature,
                    });
                }
                own_selectors.push((name.clone(), signature.clone()));
                vtable.declare(MethodEntry {
                    name,
                    signature,
                    body,
                });
            }

            let mut statics: Vec<MethodEntry> = Vec::new();
            for (name, signature, body) in decl.static_methods {
                if statics.iter().any(|m| m.matches(&name, &signature)) {
                    return Err(BuildError::DuplicateMethod {
                        class: decl.name,
                        method: name,
                        signature,
                    });
                }
                statics.push(MethodEntry {
                    name,
                    signature,
                    body,
                });
            }

            class_by_name.insert(decl.name.clone(), id);
            classes.push(Class {
                id,
                name: decl.name,
                parent,
                fields,
                vtable,
                statics,
            });
        }

        // One canonical heap object per class, so class lookups hand out
        // references to a stable identity.
        let mut heap = Vec::with_capacity(classes.len());
        let mut class_objects = Vec::with_capacity(classes.len());
        for class in &classes {
            class_objects.push(heap.len() as u64);
            heap.push(HeapValue::Class(class.id));
        }

        Ok(Runtime {
            classes,
            class_by_name,
            class_objects,
            heap: RwLock::new(heap),
            refs: RefTable::new(self.max_global_refs),
        })
    }
}

/// The managed runtime the bridge calls into.
#[derive(Debug)]
pub struct Runtime {
    classes: Vec<Class>,
    class_by_name: FxHashMap<String, ClassId>,
    class_objects: Vec<u64>,
    heap: RwLock<Vec<HeapValue>>,
    refs: RefTable,
}

impl Runtime {
    /// Start building a runtime.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub(crate) fn refs(&self) -> &RefTable {
        &self.refs
    }

    fn ref_exception(e: RefError) -> VmException {
        match e {
            RefError::Exhausted { limit } => VmException::reference_overflow(limit),
            RefError::Stale => VmException::stale_reference(),
            RefError::WrongScope => {
                VmException::state("reference has the wrong scope for this operation")
            }
        }
    }

    fn alloc_heap(&self, value: HeapValue) -> u64 {
        let mut heap = self.heap.write();
        let id = heap.len() as u64;
        heap.push(value);
        id
    }

    fn with_heap<T>(
        &self,
        id: u64,
        f: impl FnOnce(&HeapValue) -> Result<T, VmException>,
    ) -> Result<T, VmException> {
        let heap = self.heap.read();
        match heap.get(id as usize) {
            Some(value) => f(value),
            None => Err(VmException::stale_reference()),
        }
    }

    fn class(&self, id: ClassId) -> Result<&Class, VmException> {
        self.classes
            .get(id.0)
            .ok_or_else(|| VmException::state("unknown class identity"))
    }

    // ------------------------------------------------------------------
    // Reference scope management
    // ------------------------------------------------------------------

    /// Open a local reference scope; dropping the returned guard releases
    /// every local reference created while it was the current scope.
    pub fn push_local_frame(&self) -> LocalFrame<'_> {
        LocalFrame::new(self)
    }

    /// Promote a reference to a long-lived global one.
    pub fn new_global_ref(&self, r: ObjRef) -> Result<ObjRef, VmException> {
        self.refs.alloc_global(r).map_err(Self::ref_exception)
    }

    /// Release a global reference. Exactly one release per promotion.
    pub fn delete_global_ref(&self, r: ObjRef) -> Result<(), VmException> {
        self.refs.delete_global(r).map_err(Self::ref_exception)
    }

    /// Release a local reference before its scope closes.
    pub fn delete_local_ref(&self, r: ObjRef) -> Result<(), VmException> {
        self.refs.delete_local(r).map_err(Self::ref_exception)
    }

    /// Number of live local references (all threads).
    pub fn local_ref_count(&self) -> usize {
        self.refs.local_count()
    }

    /// Number of live global references.
    pub fn global_ref_count(&self) -> usize {
        self.refs.global_count()
    }

    // ------------------------------------------------------------------
    // Class and method lookup
    // ------------------------------------------------------------------

    /// Look up a class by interop-format name, returning a local reference.
    pub fn find_class(&self, name: &str) -> Result<ObjRef, VmException> {
        let id = self
            .class_by_name
            .get(name)
            .copied()
            .ok_or_else(|| VmException::class_not_found(name))?;
        Ok(self.refs.alloc_local(self.class_objects[id.0]))
    }

    fn class_of_ref(&self, r: ObjRef) -> Result<ClassId, VmException> {
        let id = self.refs.resolve(r).map_err(Self::ref_exception)?;
        self.with_heap(id, |value| match value {
            HeapValue::Class(class) => Ok(*class),
            _ => Err(VmException::state("reference is not a class")),
        })
    }

    /// Resolve an instance (or constructor) method identity on a class.
    pub fn get_method_id(
        &self,
        class: ObjRef,
        name: &str,
        signature: &str,
    ) -> Result<MethodId, VmException> {
        let cid = self.class_of_ref(class)?;
        let class = self.class(cid)?;
        match class.vtable.slot_of(name, signature) {
            Some(index) => Ok(MethodId {
                class: cid,
                index,
                table: MethodTable::Instance,
            }),
            None => Err(VmException::no_such_method(&class.name, name, signature)),
        }
    }

    /// Resolve a static method identity on a class.
    pub fn get_static_method_id(
        &self,
        class: ObjRef,
        name: &str,
        signature: &str,
    ) -> Result<MethodId, VmException> {
        let cid = self.class_of_ref(class)?;
        let class = self.class(cid)?;
        match class
            .statics
            .iter()
            .position(|m| m.matches(name, signature))
        {
            Some(index) => Ok(MethodId {
                class: cid,
                index,
                table: MethodTable::Static,
            }),
            None => Err(VmException::no_such_method(&class.name, name, signature)),
        }
    }

    // ------------------------------------------------------------------
    // Invocation
    // ------------------------------------------------------------------

    fn vtable_body(
        &self,
        dispatch_class: ClassId,
        method: MethodId,
    ) -> Result<(MethodBody, String), VmException> {
        let declared = self.class(method.class)?;
        let expected = declared
            .vtable
            .slots
            .get(method.index)
            .ok_or_else(|| VmException::state("invalid method identity"))?;
        let target = self.class(dispatch_class)?;
        match target.vtable.slots.get(method.index) {
            Some(entry) if entry.matches(&expected.name, &expected.signature) => {
                Ok((entry.body.clone(), expected.name.clone()))
            }
            _ => Err(VmException::state(format!(
                "method {}{} does not apply to class {}",
                expected.name, expected.signature, target.name
            ))),
        }
    }

    fn instance_of_ref(&self, r: ObjRef) -> Result<ClassId, VmException> {
        let id = self.refs.resolve(r).map_err(Self::ref_exception)?;
        self.with_heap(id, |value| match value {
            HeapValue::Instance(obj) => Ok(obj.class),
            _ => Err(VmException::state("receiver is not an object instance")),
        })
    }

    /// Allocate a new instance of `class` and run the given constructor.
    ///
    /// The returned reference is local to the caller's current scope. If the
    /// constructor raises, the instance reference is released before the
    /// error propagates.
    pub fn new_object(
        &self,
        class: ObjRef,
        constructor: MethodId,
        args: &[Value],
    ) -> Result<ObjRef, VmException> {
        if constructor.table != MethodTable::Instance {
            return Err(VmException::state("method identity is not a constructor"));
        }
        let cid = self.class_of_ref(class)?;
        let (body, name) = self.vtable_body(cid, constructor)?;
        if name != CONSTRUCTOR_NAME {
            return Err(VmException::state("method identity is not a constructor"));
        }

        let field_count = self.class(cid)?.field_count();
        let heap_id = self.alloc_heap(HeapValue::Instance(Object::new(cid, field_count)));
        let this = self.refs.alloc_local(heap_id);
        match body(self, Some(this), args) {
            Ok(_) => Ok(this),
            Err(e) => {
                let _ = self.delete_local_ref(this);
                Err(e)
            }
        }
    }

    /// Invoke a static method through its declaring class.
    pub fn call_static(
        &self,
        class: ObjRef,
        method: MethodId,
        args: &[Value],
    ) -> Result<Value, VmException> {
        if method.table != MethodTable::Static {
            return Err(VmException::state("method identity is not a static method"));
        }
        let cid = self.class_of_ref(class)?;
        if cid != method.class {
            return Err(VmException::state(
                "static method identity does not belong to this class",
            ));
        }
        let body = self
            .class(cid)?
            .statics
            .get(method.index)
            .map(|m| m.body.clone())
            .ok_or_else(|| VmException::state("invalid method identity"))?;
        body(self, None, args)
    }

    /// Invoke a method resolved dynamically on the receiver's runtime class.
    pub fn call_virtual(
        &self,
        receiver: ObjRef,
        method: MethodId,
        args: &[Value],
    ) -> Result<Value, VmException> {
        if method.table != MethodTable::Instance {
            return Err(VmException::state("method identity is not an instance method"));
        }
        let recv_class = self.instance_of_ref(receiver)?;
        let (body, _) = self.vtable_body(recv_class, method)?;
        body(self, Some(receiver), args)
    }

    /// Invoke a method resolved on `class`, bypassing the receiver's
    /// dynamic type.
    pub fn call_nonvirtual(
        &self,
        receiver: ObjRef,
        class: ObjRef,
        method: MethodId,
        args: &[Value],
    ) -> Result<Value, VmException> {
        if method.table != MethodTable::Instance {
            return Err(VmException::state("method identity is not an instance method"));
        }
        self.instance_of_ref(receiver)?;
        let cid = self.class_of_ref(class)?;
        let (body, _) = self.vtable_body(cid, method)?;
        body(self, Some(receiver), args)
    }

    // ------------------------------------------------------------------
    // Heap helpers
    // ------------------------------------------------------------------

    /// Allocate a managed string, returning a local reference.
    pub fn new_string(&self, value: &str) -> ObjRef {
        let id = self.alloc_heap(HeapValue::Str(value.to_string()));
        self.refs.alloc_local(id)
    }

    /// Allocate a managed array, returning a local reference.
    pub fn new_array(&self, values: Vec<Value>) -> ObjRef {
        let id = self.alloc_heap(HeapValue::Array(values));
        self.refs.alloc_local(id)
    }

    /// Allocate a managed ordered map, returning a local reference.
    pub fn new_map(&self, entries: Vec<(Value, Value)>) -> ObjRef {
        let id = self.alloc_heap(HeapValue::Map(entries));
        self.refs.alloc_local(id)
    }

    /// Read a managed string's contents.
    pub fn string_value(&self, r: ObjRef) -> Result<String, VmException> {
        let id = self.refs.resolve(r).map_err(Self::ref_exception)?;
        self.with_heap(id, |value| match value {
            HeapValue::Str(s) => Ok(s.clone()),
            _ => Err(VmException::state("reference is not a string")),
        })
    }

    /// Read a managed array's elements. Each object element is registered
    /// as a fresh local reference in the caller's scope.
    pub fn array_values(&self, r: ObjRef) -> Result<Vec<Value>, VmException> {
        let id = self.refs.resolve(r).map_err(Self::ref_exception)?;
        let values = self.with_heap(id, |value| match value {
            HeapValue::Array(values) => Ok(values.clone()),
            _ => Err(VmException::state("reference is not an array")),
        })?;
        for value in &values {
            if let Value::Obj(obj) = value {
                self.refs.alloc_local(obj.0);
            }
        }
        Ok(values)
    }

    /// Read a managed map's entries. Each object key or value is registered
    /// as a fresh local reference in the caller's scope.
    pub fn map_entries(&self, r: ObjRef) -> Result<Vec<(Value, Value)>, VmException> {
        let id = self.refs.resolve(r).map_err(Self::ref_exception)?;
        let entries = self.with_heap(id, |value| match value {
            HeapValue::Map(entries) => Ok(entries.clone()),
            _ => Err(VmException::state("reference is not a map")),
        })?;
        for (key, value) in &entries {
            if let Value::Obj(obj) = key {
                self.refs.alloc_local(obj.0);
            }
            if let Value::Obj(obj) = value {
                self.refs.alloc_local(obj.0);
            }
        }
        Ok(entries)
    }

    /// The runtime class of an object instance.
    pub fn instance_class(&self, r: ObjRef) -> Result<ClassId, VmException> {
        self.instance_of_ref(r)
    }

    /// What kind of heap object a reference points at.
    pub fn heap_kind(&self, r: ObjRef) -> Result<HeapKind, VmException> {
        let id = self.refs.resolve(r).map_err(Self::ref_exception)?;
        self.with_heap(id, |value| {
            Ok(match value {
                HeapValue::Class(_) => HeapKind::Class,
                HeapValue::Instance(_) => HeapKind::Instance,
                HeapValue::Str(_) => HeapKind::Str,
                HeapValue::Array(_) => HeapKind::Array,
                HeapValue::Map(_) => HeapKind::Map,
            })
        })
    }

    /// Name of a class by id.
    pub fn class_name(&self, id: ClassId) -> Option<&str> {
        self.classes.get(id.0).map(|c| c.name.as_str())
    }

    /// Index of a field by name on a class.
    pub fn field_index(&self, class: ClassId, name: &str) -> Option<usize> {
        self.classes.get(class.0).and_then(|c| c.field_index(name))
    }

    /// Read a field by index. An object value is registered as a fresh
    /// local reference in the caller's scope.
    pub fn get_field(&self, obj: ObjRef, index: usize) -> Result<Value, VmException> {
        let id = self.refs.resolve(obj).map_err(Self::ref_exception)?;
        let value = self.with_heap(id, |value| match value {
            HeapValue::Instance(instance) => instance
                .fields
                .get(index)
                .copied()
                .ok_or_else(|| VmException::state(format!("field index {} out of bounds", index))),
            _ => Err(VmException::state("reference is not an object instance")),
        })?;
        if let Value::Obj(obj) = value {
            self.refs.alloc_local(obj.0);
        }
        Ok(value)
    }

    /// Write a field by index.
    pub fn set_field(&self, obj: ObjRef, index: usize, value: Value) -> Result<(), VmException> {
        let id = self.refs.resolve(obj).map_err(Self::ref_exception)?;
        let mut heap = self.heap.write();
        match heap.get_mut(id as usize) {
            Some(HeapValue::Instance(instance)) => {
                if index < instance.fields.len() {
                    instance.fields[index] = value;
                    Ok(())
                } else {
                    Err(VmException::state(format!(
                        "field index {} out of bounds",
                        index
                    )))
                }
            }
            Some(_) => Err(VmException::state("reference is not an object instance")),
            None => Err(VmException::stale_reference()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::well_known;

    fn test_runtime() -> Runtime {
        Runtime::builder()
            .class("demo/Point", |c| {
                c.field("x");
                c.field("y");
                c.constructor("(II)V", |rt, this, args| {
                    let this = this.ok_or_else(|| VmException::state("missing receiver"))?;
                    rt.set_field(this, 0, args.first().copied().unwrap_or(Value::Null))?;
                    rt.set_field(this, 1, args.get(1).copied().unwrap_or(Value::Null))?;
                    Ok(Value::Null)
                });
                c.instance_method("norm1", "()I", |rt, this, _args| {
                    let this = this.ok_or_else(|| VmException::state("missing receiver"))?;
                    let x = rt.get_field(this, 0)?.as_i32().unwrap_or(0);
                    let y = rt.get_field(this, 1)?.as_i32().unwrap_or(0);
                    Ok(Value::I32(x.abs() + y.abs()))
                });
                c.static_method("origin", "()I", |_rt, _recv, _args| Ok(Value::I32(0)));
            })
            .class("demo/Point3", |c| {
                c.parent("demo/Point");
                c.field("z");
                c.instance_method("norm1", "()I", |rt, this, _args| {
                    let this = this.ok_or_else(|| VmException::state("missing receiver"))?;
                    let x = rt.get_field(this, 0)?.as_i32().unwrap_or(0);
                    let y = rt.get_field(this, 1)?.as_i32().unwrap_or(0);
                    let z = rt.get_field(this, 2)?.as_i32().unwrap_or(0);
                    Ok(Value::I32(x.abs() + y.abs() + z.abs()))
                });
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_find_class_and_missing_class() {
        let rt = test_runtime();
        assert!(rt.find_class("demo/Point").is_ok());

        let err = rt.find_class("demo/Nope").unwrap_err();
        assert_eq!(err.class_name(), well_known::CLASS_NOT_FOUND);
    }

    #[test]
    fn test_constructor_and_field_access() {
        let rt = test_runtime();
        let class = rt.find_class("demo/Point").unwrap();
        let ctor = rt.get_method_id(class, CONSTRUCTOR_NAME, "(II)V").unwrap();
        let point = rt
            .new_object(class, ctor, &[Value::I32(3), Value::I32(-4)])
            .unwrap();

        assert_eq!(rt.get_field(point, 0).unwrap(), Value::I32(3));
        assert_eq!(rt.get_field(point, 1).unwrap(), Value::I32(-4));
    }

    #[test]
    fn test_virtual_dispatch_selects_override() {
        let rt = test_runtime();
        let base = rt.find_class("demo/Point").unwrap();
        let derived = rt.find_class("demo/Point3").unwrap();

        // Method identity resolved on the base class
        let norm = rt.get_method_id(base, "norm1", "()I").unwrap();
        let ctor3 = rt.get_method_id(derived, CONSTRUCTOR_NAME, "(II)V").unwrap();

        let p3 = rt
            .new_object(derived, ctor3, &[Value::I32(1), Value::I32(2)])
            .unwrap();
        rt.set_field(p3, 2, Value::I32(4)).unwrap();

        // Virtual call picks the derived override
        assert_eq!(rt.call_virtual(p3, norm, &[]).unwrap(), Value::I32(7));
        // Non-virtual call through the base class picks the base body
        assert_eq!(
            rt.call_nonvirtual(p3, base, norm, &[]).unwrap(),
            Value::I32(3)
        );
    }

    #[test]
    fn test_static_dispatch() {
        let rt = test_runtime();
        let class = rt.find_class("demo/Point").unwrap();
        let origin = rt.get_static_method_id(class, "origin", "()I").unwrap();
        assert_eq!(rt.call_static(class, origin, &[]).unwrap(), Value::I32(0));
    }

    #[test]
    fn test_method_lookup_failure() {
        let rt = test_runtime();
        let class = rt.find_class("demo/Point").unwrap();

        let err = rt.get_method_id(class, "norm1", "(X)I").unwrap_err();
        assert_eq!(err.class_name(), well_known::NO_SUCH_METHOD);
        assert!(err.message().contains("demo/Point.norm1(X)I"));
    }

    #[test]
    fn test_local_frame_releases_references() {
        let rt = test_runtime();
        let before = rt.local_ref_count();
        {
            let _frame = rt.push_local_frame();
            rt.find_class("demo/Point").unwrap();
            rt.new_string("transient");
            assert_eq!(rt.local_ref_count(), before + 2);
        }
        assert_eq!(rt.local_ref_count(), before);
    }

    #[test]
    fn test_global_promotion_survives_frame_exit() {
        let rt = test_runtime();
        let global = {
            let _frame = rt.push_local_frame();
            let class = rt.find_class("demo/Point").unwrap();
            rt.new_global_ref(class).unwrap()
        };
        // The local reference is gone, the global one still resolves
        assert_eq!(rt.global_ref_count(), 1);
        assert!(rt.get_method_id(global, "norm1", "()I").is_ok());
        rt.delete_global_ref(global).unwrap();
        assert_eq!(rt.global_ref_count(), 0);
    }

    #[test]
    fn test_builder_rejects_unknown_parent() {
        let err = Runtime::builder()
            .class("demo/Orphan", |c| {
                c.parent("demo/Missing");
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::UnknownParent { .. }));
    }

    #[test]
    fn test_failed_constructor_releases_instance_ref() {
        let rt = Runtime::builder()
            .class("demo/Faulty", |c| {
                c.constructor("()V", |_rt, _this, _args| {
                    Err(VmException::state("refused"))
                });
            })
            .build()
            .unwrap();

        let class = rt.find_class("demo/Faulty").unwrap();
        let ctor = rt.get_method_id(class, CONSTRUCTOR_NAME, "()V").unwrap();
        let before = rt.local_ref_count();
        assert!(rt.new_object(class, ctor, &[]).is_err());
        assert_eq!(rt.local_ref_count(), before);
    }
}
