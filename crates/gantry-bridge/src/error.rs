//! Bridge error taxonomy
//!
//! Every failure the bridge can produce, as one enum. Failures originating
//! in the managed runtime keep their original exception attached as the
//! error source, so no diagnostic context is ever discarded at the
//! boundary.

use crate::engine::EngineError;
use gantry_core::VmException;

/// Result alias used throughout the bridge.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Failures produced by the bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Resolution-time failure: the named class does not exist in the
    /// target runtime. Non-retryable.
    #[error("class not found: {class}")]
    ClassNotFound {
        /// The interop-format class name that failed to resolve
        class: String,
        /// The runtime's own exception, enriched by the translator
        #[source]
        source: VmException,
    },

    /// Resolution-time failure: the class exists but the method does not.
    /// Non-retryable.
    #[error("method not found: {class}.{method}{signature}")]
    MethodNotFound {
        /// The class the lookup ran against
        class: String,
        /// The method name
        method: String,
        /// The interop-format signature
        signature: String,
        /// The runtime's own exception, enriched by the translator
        #[source]
        source: VmException,
    },

    /// Reference-table or allocation exhaustion. Not retryable within the
    /// current call; the caller may retry later.
    #[error("resource exhausted: {message}")]
    ResourceExhausted {
        /// What was exhausted
        message: String,
        /// The runtime's own exception
        #[source]
        source: VmException,
    },

    /// A programming error on the caller's side: an unresolved descriptor
    /// used for dispatch, a missing receiver, malformed resolve input.
    /// Surfaced loudly, never defaulted.
    #[error("bridge misuse: {0}")]
    Misuse(String),

    /// An evaluation-context operation against an identity that is not
    /// active (never issued, or already disposed).
    #[error("invalid handle state: {0}")]
    InvalidHandleState(String),

    /// A failure reported by the native engine.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// An exception raised by the invoked method itself, propagated
    /// unchanged.
    #[error(transparent)]
    Runtime(#[from] VmException),
}
