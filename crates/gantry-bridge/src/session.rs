//! Bridge session: the assembled native half of the binding
//!
//! A [`BridgeSession`] owns what the three inbound entry points need (the
//! context table, the engine handle, and the resolve-once outcome binding)
//! and wires the conversion layers in between: managed input map in, engine
//! run, managed result object out.

use crate::binding::OutcomeBinding;
use crate::context::{ContextId, ContextTable};
use crate::convert::to_engine_input;
use crate::engine::Engine;
use crate::error::BridgeResult;
use crate::limits::Limits;
use gantry_core::{ObjRef, Runtime, Value};
use std::sync::Arc;

/// The assembled bridge for embedders hosting the managed runtime
/// in-process.
pub struct BridgeSession<E: Engine> {
    runtime: Arc<Runtime>,
    engine: Arc<E>,
    contexts: ContextTable<E>,
    binding: OutcomeBinding,
}

impl<E: Engine> BridgeSession<E> {
    /// Assemble a session, resolving the outcome binding once.
    ///
    /// The runtime must carry the managed result classes (see
    /// [`crate::binding::register_result_classes`]).
    pub fn new(runtime: Arc<Runtime>, engine: Arc<E>) -> BridgeResult<Self> {
        let binding = OutcomeBinding::resolve(&runtime)?;
        Ok(Self {
            runtime,
            engine,
            contexts: ContextTable::new(),
            binding,
        })
    }

    /// The hosted runtime.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Create a new evaluation context, returning its opaque identity.
    pub fn init(&self) -> BridgeResult<ContextId> {
        self.contexts.init(&self.engine)
    }

    /// Advance a context with a managed input map under the given budget.
    ///
    /// Returns a local reference to the managed result object. Conversion
    /// of the input happens under the same limits that are passed through
    /// to the engine.
    pub fn run(&self, id: ContextId, input: Value, limits: &Limits) -> BridgeResult<ObjRef> {
        let engine_input = to_engine_input(&self.runtime, input, limits)?;
        let outcome = self.contexts.run(id, &engine_input, limits)?;
        self.binding.to_managed(&self.runtime, &outcome)
    }

    /// Dispose a context. Its identity is invalid afterwards.
    pub fn clear(&self, id: ContextId) -> BridgeResult<()> {
        self.contexts.dispose(id)
    }

    /// Number of active evaluation contexts.
    pub fn active_contexts(&self) -> usize {
        self.contexts.active_count()
    }

    /// Tear the session down, releasing the binding's descriptors.
    ///
    /// Remaining active contexts are dropped with the table.
    pub fn close(self) -> BridgeResult<()> {
        self.binding.release(&self.runtime)
    }
}
