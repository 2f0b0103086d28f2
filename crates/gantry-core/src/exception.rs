//! Exception values raised inside the managed runtime
//!
//! The runtime reports every failure as a [`VmException`] returned through
//! `Result`, never as ambient state the caller has to remember to poll.
//! Exceptions carry the managed class that raised them, a human-readable
//! message, and an optional chained cause that is preserved across
//! translation layers.

/// Well-known managed exception class names.
pub mod well_known {
    /// Raised when a class lookup by name fails
    pub const CLASS_NOT_FOUND: &str = "gantry/ClassNotFoundError";

    /// Raised when a method lookup by name and signature fails
    pub const NO_SUCH_METHOD: &str = "gantry/NoSuchMethodError";

    /// Raised when the global reference table is exhausted
    pub const REFERENCE_OVERFLOW: &str = "gantry/ReferenceOverflowError";

    /// Raised when a deleted or never-issued reference is used
    pub const STALE_REFERENCE: &str = "gantry/StaleReferenceError";

    /// Raised on contract violations inside the runtime (wrong receiver
    /// type, method identity applied to an unrelated class, and so on)
    pub const STATE_ERROR: &str = "gantry/StateError";

    /// Generic runtime error, used by the bridge's exception translator
    /// when it re-raises an enriched exception
    pub const RUNTIME_ERROR: &str = "gantry/RuntimeError";
}

/// An exception value produced by the managed runtime.
///
/// Equivalent to a thrown exception object: the runtime hands it back as the
/// `Err` arm of every fallible entry point instead of setting a pending flag.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{class_name}: {message}")]
pub struct VmException {
    class_name: String,
    message: String,
    #[source]
    cause: Option<Box<VmException>>,
}

impl VmException {
    /// Create a new exception with no cause.
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// Create a new exception chaining `cause` as its origin.
    ///
    /// The cause is never discarded by later translation layers; it remains
    /// reachable through [`VmException::cause`] and `Error::source`.
    pub fn with_cause(
        class_name: impl Into<String>,
        message: impl Into<String>,
        cause: VmException,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// The managed class of this exception (interop-format name).
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The exception message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The chained cause, if any.
    pub fn cause(&self) -> Option<&VmException> {
        self.cause.as_deref()
    }

    /// Walk the cause chain and return the innermost exception.
    pub fn root_cause(&self) -> &VmException {
        let mut current = self;
        while let Some(cause) = current.cause() {
            current = cause;
        }
        current
    }

    // Convenience constructors for the runtime's own failure classes.

    pub(crate) fn class_not_found(name: &str) -> Self {
        Self::new(well_known::CLASS_NOT_FOUND, format!("no class named {}", name))
    }

    pub(crate) fn no_such_method(class: &str, name: &str, signature: &str) -> Self {
        Self::new(
            well_known::NO_SUCH_METHOD,
            format!("no method {}.{}{}", class, name, signature),
        )
    }

    pub(crate) fn stale_reference() -> Self {
        Self::new(well_known::STALE_REFERENCE, "reference is stale or was deleted")
    }

    pub(crate) fn reference_overflow(limit: usize) -> Self {
        Self::new(
            well_known::REFERENCE_OVERFLOW,
            format!("global reference table exhausted ({} entries)", limit),
        )
    }

    pub(crate) fn state(message: impl Into<String>) -> Self {
        Self::new(well_known::STATE_ERROR, message)
    }
}
