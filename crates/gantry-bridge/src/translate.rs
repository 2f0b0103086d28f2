//! Exception translation
//!
//! Context enrichment for failures crossing the runtime boundary: a new
//! exception is raised with a descriptive message and the original chained
//! as its cause. This is never a first-detection step; callers invoke it
//! only with a runtime failure value already in hand.

use gantry_core::{well_known, VmException};

/// Wrap a runtime exception with additional context.
///
/// The returned exception carries `message` and chains `cause` as its
/// origin; the original diagnostic remains reachable through the cause
/// chain and is never discarded.
pub fn wrap_exception(cause: VmException, message: impl Into<String>) -> VmException {
    VmException::with_cause(well_known::RUNTIME_ERROR, message, cause)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_preserves_cause() {
        let original = VmException::new(well_known::CLASS_NOT_FOUND, "no class named a/B");
        let wrapped = wrap_exception(original.clone(), "could not find class a/B");

        assert_eq!(wrapped.class_name(), well_known::RUNTIME_ERROR);
        assert_eq!(wrapped.message(), "could not find class a/B");
        assert_eq!(
            wrapped.cause().map(|c| c.to_string()),
            Some(original.to_string())
        );
    }

    #[test]
    fn test_wrap_is_chainable() {
        let original = VmException::new(well_known::NO_SUCH_METHOD, "no method a/B.run()V");
        let once = wrap_exception(original, "could not find method a/B.run()V");
        let twice = wrap_exception(once, "while resolving bindings");

        assert_eq!(twice.root_cause().class_name(), well_known::NO_SUCH_METHOD);
    }
}
