//! Managed result classes and the resolve-once outcome binding
//!
//! Engine outcomes travel back to the managed side as instances of the
//! managed `gantry/RunResult` class. The descriptors needed to build them
//! are resolved once, when the binding is created, and reused for every
//! subsequent run.

use crate::descriptor::{MethodDescriptor, MethodKind};
use crate::engine::RunOutcome;
use crate::error::{BridgeError, BridgeResult};
use gantry_core::{well_known, ObjRef, Runtime, RuntimeBuilder, ScopedRef, Value, VmException};

/// Interop-format name of the managed result class.
pub const RESULT_CLASS: &str = "gantry/RunResult";

/// Signature of the result constructor: (code, data, actions).
pub const RESULT_CTOR_SIGNATURE: &str = "(ILgantry/String;[Lgantry/String;)V";

/// Name and signature of the shared no-match factory.
pub const RESULT_OK_METHOD: &str = "ok";
/// Signature of [`RESULT_OK_METHOD`].
pub const RESULT_OK_SIGNATURE: &str = "()Lgantry/RunResult;";

/// Result codes stored in the managed object's `code` field.
pub const RESULT_CODE_OK: i32 = 0;
/// A match was found.
pub const RESULT_CODE_MATCH: i32 = 1;
/// The budget was exhausted without a match.
pub const RESULT_CODE_TIMEOUT: i32 = 2;

const FIELD_CODE: usize = 0;
const FIELD_DATA: usize = 1;
const FIELD_ACTIONS: usize = 2;

/// Register the managed result class on a runtime under construction.
///
/// Embedders hosting their own runtime call this before `build` so the
/// binding has something to resolve against.
pub fn register_result_classes(builder: RuntimeBuilder) -> RuntimeBuilder {
    builder.class(RESULT_CLASS, |c| {
        c.field("code");
        c.field("data");
        c.field("actions");
        c.constructor(RESULT_CTOR_SIGNATURE, |rt, this, args| {
            let this =
                this.ok_or_else(|| VmException::new(well_known::STATE_ERROR, "missing receiver"))?;
            rt.set_field(this, FIELD_CODE, args.first().copied().unwrap_or(Value::Null))?;
            rt.set_field(this, FIELD_DATA, args.get(1).copied().unwrap_or(Value::Null))?;
            rt.set_field(this, FIELD_ACTIONS, args.get(2).copied().unwrap_or(Value::Null))?;
            Ok(Value::Null)
        });
        c.static_method(RESULT_OK_METHOD, RESULT_OK_SIGNATURE, |rt, _recv, _args| {
            let class = ScopedRef::new(rt, rt.find_class(RESULT_CLASS)?);
            let ctor = rt.get_method_id(
                class.get(),
                gantry_core::CONSTRUCTOR_NAME,
                RESULT_CTOR_SIGNATURE,
            )?;
            let result = rt.new_object(
                class.get(),
                ctor,
                &[Value::I32(RESULT_CODE_OK), Value::Null, Value::Null],
            )?;
            Ok(Value::Obj(result))
        });
    })
}

/// Pre-resolved descriptors for marshaling outcomes into managed objects.
///
/// Resolved once per runtime; safe to share for any number of calls. Must
/// be released so the descriptors' class references are dropped.
#[derive(Debug)]
pub struct OutcomeBinding {
    ctor: MethodDescriptor,
    ok: MethodDescriptor,
}

impl OutcomeBinding {
    /// Resolve the binding against a runtime carrying the result classes.
    pub fn resolve(rt: &Runtime) -> BridgeResult<Self> {
        let ctor = MethodDescriptor::resolve(
            rt,
            RESULT_CLASS,
            "",
            RESULT_CTOR_SIGNATURE,
            MethodKind::Constructor,
        )?;
        let ok = match MethodDescriptor::resolve(
            rt,
            RESULT_CLASS,
            RESULT_OK_METHOD,
            RESULT_OK_SIGNATURE,
            MethodKind::Static,
        ) {
            Ok(ok) => ok,
            Err(e) => {
                let _ = ctor.release(rt);
                return Err(e);
            }
        };
        Ok(Self { ctor, ok })
    }

    /// Build the managed result object for an outcome.
    ///
    /// The returned reference is local to the caller's current scope; all
    /// intermediate references are released before returning.
    pub fn to_managed(&self, rt: &Runtime, outcome: &RunOutcome) -> BridgeResult<ObjRef> {
        let result = match outcome {
            RunOutcome::NoMatch => self.ok.call(rt, None, &[])?,
            RunOutcome::Match(data) => {
                let data_ref = ScopedRef::new(rt, rt.new_string(&data.data));
                let action_refs: Vec<ScopedRef<'_>> = data
                    .actions
                    .iter()
                    .map(|a| ScopedRef::new(rt, rt.new_string(a)))
                    .collect();
                let actions = ScopedRef::new(
                    rt,
                    rt.new_array(action_refs.iter().map(|r| Value::Obj(r.get())).collect()),
                );
                self.ctor.call(
                    rt,
                    None,
                    &[
                        Value::I32(RESULT_CODE_MATCH),
                        Value::Obj(data_ref.get()),
                        Value::Obj(actions.get()),
                    ],
                )?
            }
            RunOutcome::Timeout => self.ctor.call(
                rt,
                None,
                &[Value::I32(RESULT_CODE_TIMEOUT), Value::Null, Value::Null],
            )?,
        };
        result.as_obj().ok_or_else(|| {
            BridgeError::Runtime(VmException::new(
                well_known::STATE_ERROR,
                "result factory returned a non-object",
            ))
        })
    }

    /// Release both descriptors' class references.
    pub fn release(self, rt: &Runtime) -> BridgeResult<()> {
        self.ctor.release(rt)?;
        self.ok.release(rt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MatchData;

    fn test_runtime() -> Runtime {
        register_result_classes(Runtime::builder()).build().unwrap()
    }

    #[test]
    fn test_binding_resolves_once_and_releases() {
        let rt = test_runtime();
        let binding = OutcomeBinding::resolve(&rt).unwrap();
        // Constructor and static descriptors each own a class reference
        assert_eq!(rt.global_ref_count(), 2);
        binding.release(&rt).unwrap();
        assert_eq!(rt.global_ref_count(), 0);
    }

    #[test]
    fn test_no_match_marshals_through_static_factory() {
        let rt = test_runtime();
        let binding = OutcomeBinding::resolve(&rt).unwrap();

        let result = binding.to_managed(&rt, &RunOutcome::NoMatch).unwrap();
        assert_eq!(
            rt.get_field(result, 0).unwrap(),
            Value::I32(RESULT_CODE_OK)
        );
        assert!(rt.get_field(result, 1).unwrap().is_null());

        binding.release(&rt).unwrap();
    }

    #[test]
    fn test_match_marshals_data_and_actions() {
        let rt = test_runtime();
        let binding = OutcomeBinding::resolve(&rt).unwrap();

        let outcome = RunOutcome::Match(MatchData {
            data: "[{\"rule\":\"crs-001\"}]".to_string(),
            actions: vec!["block".to_string(), "log".to_string()],
        });
        let result = binding.to_managed(&rt, &outcome).unwrap();

        assert_eq!(
            rt.get_field(result, 0).unwrap(),
            Value::I32(RESULT_CODE_MATCH)
        );
        let data = rt.get_field(result, 1).unwrap().as_obj().unwrap();
        assert_eq!(rt.string_value(data).unwrap(), "[{\"rule\":\"crs-001\"}]");

        let actions = rt.get_field(result, 2).unwrap().as_obj().unwrap();
        let values = rt.array_values(actions).unwrap();
        assert_eq!(values.len(), 2);
        let first = values[0].as_obj().unwrap();
        assert_eq!(rt.string_value(first).unwrap(), "block");

        binding.release(&rt).unwrap();
    }

    #[test]
    fn test_timeout_marshals_with_timeout_code() {
        let rt = test_runtime();
        let binding = OutcomeBinding::resolve(&rt).unwrap();

        let result = binding.to_managed(&rt, &RunOutcome::Timeout).unwrap();
        assert_eq!(
            rt.get_field(result, 0).unwrap(),
            Value::I32(RESULT_CODE_TIMEOUT)
        );
        assert!(rt.get_field(result, 1).unwrap().is_null());

        binding.release(&rt).unwrap();
    }

    #[test]
    fn test_marshaling_balances_transient_references() {
        let rt = test_runtime();
        let binding = OutcomeBinding::resolve(&rt).unwrap();

        let outcome = RunOutcome::Match(MatchData {
            data: "hit".to_string(),
            actions: vec!["block".to_string()],
        });

        let before = rt.local_ref_count();
        let result = binding.to_managed(&rt, &outcome).unwrap();
        // Only the result reference itself remains owned by this scope
        assert_eq!(rt.local_ref_count(), before + 1);
        rt.delete_local_ref(result).unwrap();
        assert_eq!(rt.local_ref_count(), before);

        binding.release(&rt).unwrap();
    }

    #[test]
    fn test_binding_resolution_requires_result_class() {
        let bare = Runtime::builder().build().unwrap();
        let err = OutcomeBinding::resolve(&bare).unwrap_err();
        assert!(matches!(err, BridgeError::ClassNotFound { .. }));
        assert_eq!(bare.global_ref_count(), 0);
    }
}
