//! Integration tests for the runtime facade
//!
//! Exercises the object model, dispatch, and reference discipline together
//! the way the bridge drives them: lookups and calls interleaved with
//! frame-scoped reference management.

use gantry_core::{well_known, Runtime, Value, VmException, CONSTRUCTOR_NAME};

fn accounts_runtime() -> Runtime {
    Runtime::builder()
        .class("bank/Account", |c| {
            c.field("owner");
            c.field("balance");
            c.constructor("(SI)V", |rt, this, args| {
                let this = this
                    .ok_or_else(|| VmException::new(well_known::STATE_ERROR, "missing receiver"))?;
                rt.set_field(this, 0, args.first().copied().unwrap_or(Value::Null))?;
                rt.set_field(this, 1, args.get(1).copied().unwrap_or(Value::I32(0)))?;
                Ok(Value::Null)
            });
            c.instance_method("deposit", "(I)I", |rt, this, args| {
                let this = this
                    .ok_or_else(|| VmException::new(well_known::STATE_ERROR, "missing receiver"))?;
                let amount = args.first().and_then(Value::as_i32).unwrap_or(0);
                if amount < 0 {
                    return Err(VmException::new(
                        "bank/IllegalAmount",
                        format!("cannot deposit {}", amount),
                    ));
                }
                let balance = rt.get_field(this, 1)?.as_i32().unwrap_or(0) + amount;
                rt.set_field(this, 1, Value::I32(balance))?;
                Ok(Value::I32(balance))
            });
            c.instance_method("kind", "()S", |rt, _, _| {
                Ok(Value::Obj(rt.new_string("account")))
            });
        })
        .class("bank/SavingsAccount", |c| {
            c.parent("bank/Account");
            c.field("rate");
            c.instance_method("kind", "()S", |rt, _, _| {
                Ok(Value::Obj(rt.new_string("savings")))
            });
        })
        .build()
        .expect("runtime builds")
}

#[test]
fn test_stateful_objects_across_calls() {
    let rt = accounts_runtime();
    let class = rt.find_class("bank/Account").unwrap();
    let ctor = rt.get_method_id(class, CONSTRUCTOR_NAME, "(SI)V").unwrap();
    let deposit = rt.get_method_id(class, "deposit", "(I)I").unwrap();

    let owner = rt.new_string("ada");
    let account = rt
        .new_object(class, ctor, &[Value::Obj(owner), Value::I32(10)])
        .unwrap();

    assert_eq!(
        rt.call_virtual(account, deposit, &[Value::I32(5)]).unwrap(),
        Value::I32(15)
    );
    assert_eq!(
        rt.call_virtual(account, deposit, &[Value::I32(7)]).unwrap(),
        Value::I32(22)
    );

    // The method's own exception surfaces as the error value, and the
    // object's state is untouched by the failed call
    let err = rt
        .call_virtual(account, deposit, &[Value::I32(-1)])
        .unwrap_err();
    assert_eq!(err.class_name(), "bank/IllegalAmount");
    assert_eq!(rt.get_field(account, 1).unwrap(), Value::I32(22));
}

#[test]
fn test_inherited_fields_and_override() {
    let rt = accounts_runtime();
    let base = rt.find_class("bank/Account").unwrap();
    let derived = rt.find_class("bank/SavingsAccount").unwrap();

    // The inherited constructor initializes the inherited field prefix
    let ctor = rt.get_method_id(derived, CONSTRUCTOR_NAME, "(SI)V").unwrap();
    let owner = rt.new_string("grace");
    let savings = rt
        .new_object(derived, ctor, &[Value::Obj(owner), Value::I32(100)])
        .unwrap();
    rt.set_field(savings, 2, Value::F64(0.02)).unwrap();

    assert_eq!(rt.get_field(savings, 1).unwrap(), Value::I32(100));

    // Identity resolved on the base class dispatches to the override
    let kind = rt.get_method_id(base, "kind", "()S").unwrap();
    let name = rt.call_virtual(savings, kind, &[]).unwrap().as_obj().unwrap();
    assert_eq!(rt.string_value(name).unwrap(), "savings");

    // Non-virtual through the base class reaches the base body
    let name = rt
        .call_nonvirtual(savings, base, kind, &[])
        .unwrap()
        .as_obj()
        .unwrap();
    assert_eq!(rt.string_value(name).unwrap(), "account");
}

#[test]
fn test_nested_frames_restore_counts() {
    let rt = accounts_runtime();
    let base = rt.local_ref_count();

    let _outer_ref = rt.new_string("outer");
    assert_eq!(rt.local_ref_count(), base + 1);

    {
        let _frame = rt.push_local_frame();
        rt.new_string("inner-1");
        {
            let _inner = rt.push_local_frame();
            rt.new_string("inner-2");
            rt.find_class("bank/Account").unwrap();
            assert_eq!(rt.local_ref_count(), base + 4);
        }
        assert_eq!(rt.local_ref_count(), base + 2);
    }
    assert_eq!(rt.local_ref_count(), base + 1);
}

#[test]
fn test_stale_reference_is_detected_not_dereferenced() {
    let rt = accounts_runtime();
    let s = rt.new_string("ephemeral");
    rt.delete_local_ref(s).unwrap();

    let err = rt.string_value(s).unwrap_err();
    assert_eq!(err.class_name(), well_known::STALE_REFERENCE);

    // Deleting again is an error as well, not a silent no-op
    assert!(rt.delete_local_ref(s).is_err());
}

#[test]
fn test_heap_reads_mint_fresh_local_refs() {
    let rt = accounts_runtime();
    let class = rt.find_class("bank/Account").unwrap();
    let ctor = rt.get_method_id(class, CONSTRUCTOR_NAME, "(SI)V").unwrap();

    let account = {
        let _frame = rt.push_local_frame();
        let owner = rt.new_string("lin");
        let account = rt
            .new_object(class, ctor, &[Value::Obj(owner), Value::I32(1)])
            .unwrap();
        // Promote before the frame closes; the locals die with the frame
        rt.new_global_ref(account).unwrap()
    };

    // Reading the field registers a fresh local reference for the caller,
    // even though the constructor's argument reference is long gone
    let owner = rt.get_field(account, 0).unwrap().as_obj().unwrap();
    assert_eq!(rt.string_value(owner).unwrap(), "lin");

    rt.delete_global_ref(account).unwrap();
}

#[test]
fn test_map_and_array_helpers() {
    let rt = accounts_runtime();
    let k1 = rt.new_string("path");
    let v1 = rt.new_string("/login");
    let arr = rt.new_array(vec![Value::I32(1), Value::I32(2)]);
    let map = rt.new_map(vec![
        (Value::Obj(k1), Value::Obj(v1)),
        (Value::I64(7), Value::Obj(arr)),
    ]);

    let entries = rt.map_entries(map).unwrap();
    assert_eq!(entries.len(), 2);
    let key = entries[0].0.as_obj().unwrap();
    assert_eq!(rt.string_value(key).unwrap(), "path");

    let nested = entries[1].1.as_obj().unwrap();
    assert_eq!(
        rt.array_values(nested).unwrap(),
        vec![Value::I32(1), Value::I32(2)]
    );
}
