//! Gantry cross-runtime call bridge
//!
//! The native half of a managed-runtime binding for an inspection engine:
//! - [`MethodDescriptor`]: resolve a target-runtime method once, call it
//!   many times, release it exactly once
//! - Kind-tagged invocation dispatch (constructor / static / virtual /
//!   non-virtual), with the reference-lifetime discipline enforced on every
//!   path
//! - Exception translation that enriches context without ever discarding
//!   the original diagnostic
//! - The evaluation-context lifecycle (init → run ×N → dispose) behind
//!   opaque, never-reused integer identities
//!
//! The inspection engine itself stays behind the [`Engine`] trait; the
//! managed runtime's entry points come from `gantry-core`.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod binding;
pub mod context;
pub mod convert;
pub mod descriptor;
mod dispatch;
pub mod engine;
pub mod error;
pub mod input;
pub mod limits;
pub mod session;
pub mod translate;

pub use binding::{register_result_classes, OutcomeBinding};
pub use context::{ContextId, ContextTable};
pub use descriptor::{MethodDescriptor, MethodKind};
pub use engine::{Engine, EngineError, MatchData, RunOutcome};
pub use error::{BridgeError, BridgeResult};
pub use input::InputValue;
pub use limits::Limits;
pub use session::BridgeSession;
pub use translate::wrap_exception;
