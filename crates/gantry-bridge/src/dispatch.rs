//! Invocation dispatch
//!
//! Given a resolved descriptor, a receiver, and an argument list, perform
//! the correctly-shaped call. The kind decides the calling convention; the
//! receiver's type never does.

use crate::descriptor::{MethodDescriptor, MethodKind};
use crate::error::{BridgeError, BridgeResult};
use gantry_core::{ObjRef, Runtime, Value};

impl MethodDescriptor {
    /// Invoke the resolved method.
    ///
    /// The receiver is ignored for `Constructor` and `Static` kinds and
    /// required for `Virtual` and `NonVirtual`. The argument list must
    /// match the resolved signature in arity and types; the dispatcher does
    /// not validate it against the signature (this mirrors the target
    /// runtime's unchecked call convention and is the caller's obligation;
    /// a mismatch surfaces as whatever the target method raises).
    ///
    /// On success the result is owned by the caller's current local scope;
    /// promote it with [`Runtime::new_global_ref`] to keep it longer. An
    /// exception raised by the invoked method propagates unchanged as
    /// [`BridgeError::Runtime`].
    pub fn call(
        &self,
        rt: &Runtime,
        receiver: Option<ObjRef>,
        args: &[Value],
    ) -> BridgeResult<Value> {
        let kind = self.kind();
        if kind == MethodKind::Uninitialized {
            return Err(BridgeError::Misuse("descriptor is unresolved".to_string()));
        }
        // A resolved descriptor always carries a method identity, and a
        // class reference exactly when the kind dispatches through it.
        let method = self
            .method()
            .ok_or_else(|| BridgeError::Misuse("descriptor is unresolved".to_string()))?;

        match kind {
            MethodKind::Constructor => {
                let class = self.owned_class_ref()?;
                let obj = rt.new_object(class, method, args)?;
                Ok(Value::Obj(obj))
            }
            MethodKind::Static => {
                let class = self.owned_class_ref()?;
                Ok(rt.call_static(class, method, args)?)
            }
            MethodKind::NonVirtual => {
                let class = self.owned_class_ref()?;
                let receiver = receiver.ok_or_else(|| {
                    BridgeError::Misuse("non-virtual call requires a receiver".to_string())
                })?;
                Ok(rt.call_nonvirtual(receiver, class, method, args)?)
            }
            MethodKind::Virtual => {
                let receiver = receiver.ok_or_else(|| {
                    BridgeError::Misuse("virtual call requires a receiver".to_string())
                })?;
                Ok(rt.call_virtual(receiver, method, args)?)
            }
            MethodKind::Uninitialized => {
                Err(BridgeError::Misuse("descriptor is unresolved".to_string()))
            }
        }
    }

    fn owned_class_ref(&self) -> BridgeResult<ObjRef> {
        self.class_ref().ok_or_else(|| {
            BridgeError::Misuse("descriptor does not own a class reference".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::{VmException, CONSTRUCTOR_NAME};

    fn test_runtime() -> Runtime {
        Runtime::builder()
            .class("demo/Shape", |c| {
                c.field("sides");
                c.constructor("(I)V", |rt, this, args| {
                    if let (Some(this), Some(v)) = (this, args.first()) {
                        rt.set_field(this, 0, *v)?;
                    }
                    Ok(Value::Null)
                });
                c.instance_method("sides", "()I", |rt, this, _| match this {
                    Some(this) => rt.get_field(this, 0),
                    None => Ok(Value::Null),
                });
                c.instance_method("kindName", "()S", |rt, _, _| {
                    Ok(Value::Obj(rt.new_string("shape")))
                });
                c.static_method("unit", "()I", |_, _, _| Ok(Value::I32(1)));
            })
            .class("demo/Square", |c| {
                c.parent("demo/Shape");
                c.instance_method("kindName", "()S", |rt, _, _| {
                    Ok(Value::Obj(rt.new_string("square")))
                });
            })
            .build()
            .unwrap()
    }

    fn resolve(rt: &Runtime, class: &str, name: &str, sig: &str, kind: MethodKind) -> MethodDescriptor {
        MethodDescriptor::resolve(rt, class, name, sig, kind).unwrap()
    }

    #[test]
    fn test_uninitialized_call_is_misuse() {
        let rt = test_runtime();
        let desc = MethodDescriptor::unresolved();
        let before = rt.local_ref_count();

        let err = desc.call(&rt, None, &[]).unwrap_err();
        assert!(matches!(err, BridgeError::Misuse(_)));
        // The failure happens before anything reaches the runtime
        assert_eq!(rt.local_ref_count(), before);
    }

    #[test]
    fn test_constructor_call_returns_new_instance() {
        let rt = test_runtime();
        let ctor = resolve(&rt, "demo/Shape", "", "(I)V", MethodKind::Constructor);

        let result = ctor.call(&rt, None, &[Value::I32(4)]).unwrap();
        let obj = result.as_obj().unwrap();
        assert_eq!(rt.get_field(obj, 0).unwrap(), Value::I32(4));

        ctor.release(&rt).unwrap();
    }

    #[test]
    fn test_receiver_is_ignored_for_static() {
        let rt = test_runtime();
        let unit = resolve(&rt, "demo/Shape", "unit", "()I", MethodKind::Static);
        let ctor = resolve(&rt, "demo/Shape", "", "(I)V", MethodKind::Constructor);
        let obj = ctor.call(&rt, None, &[Value::I32(3)]).unwrap().as_obj();

        assert_eq!(unit.call(&rt, obj, &[]).unwrap(), Value::I32(1));
        assert_eq!(unit.call(&rt, None, &[]).unwrap(), Value::I32(1));

        unit.release(&rt).unwrap();
        ctor.release(&rt).unwrap();
    }

    #[test]
    fn test_virtual_vs_nonvirtual_dispatch() {
        let rt = test_runtime();
        let virt = resolve(&rt, "demo/Shape", "kindName", "()S", MethodKind::Virtual);
        let nonvirt = resolve(&rt, "demo/Shape", "kindName", "()S", MethodKind::NonVirtual);
        let ctor = resolve(&rt, "demo/Square", "", "(I)V", MethodKind::Constructor);

        let square = ctor
            .call(&rt, None, &[Value::I32(4)])
            .unwrap()
            .as_obj()
            .unwrap();

        // Same descriptor class, same receiver: virtual picks the override,
        // non-virtual pins the base implementation.
        let via_virtual = virt.call(&rt, Some(square), &[]).unwrap().as_obj().unwrap();
        assert_eq!(rt.string_value(via_virtual).unwrap(), "square");

        let via_nonvirtual = nonvirt
            .call(&rt, Some(square), &[])
            .unwrap()
            .as_obj()
            .unwrap();
        assert_eq!(rt.string_value(via_nonvirtual).unwrap(), "shape");

        virt.release(&rt).unwrap();
        nonvirt.release(&rt).unwrap();
        ctor.release(&rt).unwrap();
    }

    #[test]
    fn test_missing_receiver_is_misuse() {
        let rt = test_runtime();
        let virt = resolve(&rt, "demo/Shape", "sides", "()I", MethodKind::Virtual);
        assert!(matches!(
            virt.call(&rt, None, &[]).unwrap_err(),
            BridgeError::Misuse(_)
        ));
        virt.release(&rt).unwrap();
    }

    #[test]
    fn test_target_exception_propagates_unchanged() {
        let rt = Runtime::builder()
            .class("demo/Thrower", |c| {
                c.constructor("()V", |_, _, _| Ok(Value::Null));
                c.instance_method("explode", "()V", |_, _, _| {
                    Err(VmException::new("demo/Boom", "kaboom"))
                });
            })
            .build()
            .unwrap();

        let ctor = resolve(&rt, "demo/Thrower", CONSTRUCTOR_NAME, "()V", MethodKind::Constructor);
        let explode = resolve(&rt, "demo/Thrower", "explode", "()V", MethodKind::Virtual);
        let obj = ctor.call(&rt, None, &[]).unwrap().as_obj();

        match explode.call(&rt, obj, &[]).unwrap_err() {
            BridgeError::Runtime(exc) => {
                assert_eq!(exc.class_name(), "demo/Boom");
                assert_eq!(exc.message(), "kaboom");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        ctor.release(&rt).unwrap();
        explode.release(&rt).unwrap();
    }

    #[test]
    fn test_call_balances_local_references() {
        let rt = test_runtime();
        let ctor = resolve(&rt, "demo/Shape", "", "(I)V", MethodKind::Constructor);
        let sides = resolve(&rt, "demo/Shape", "sides", "()I", MethodKind::Virtual);

        let obj = ctor
            .call(&rt, None, &[Value::I32(6)])
            .unwrap()
            .as_obj()
            .unwrap();

        // A call whose result is a primitive leaves the count untouched
        let before = rt.local_ref_count();
        assert_eq!(sides.call(&rt, Some(obj), &[]).unwrap(), Value::I32(6));
        assert_eq!(rt.local_ref_count(), before);

        // A failed call leaves the count untouched as well
        let _ = sides.call(&rt, None, &[]);
        assert_eq!(rt.local_ref_count(), before);

        ctor.release(&rt).unwrap();
        sides.release(&rt).unwrap();
    }
}
