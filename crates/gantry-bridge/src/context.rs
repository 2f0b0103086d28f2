//! Evaluation-context lifecycle
//!
//! The managed side sees an evaluation context only as an opaque integer
//! identity; the real engine state lives in an internally-owned table. A
//! slot goes through exactly one life: init → run (×N) → dispose. Disposal
//! removes the slot, identities are never reused, and any later use of the
//! identity is detected as a usage error instead of touching freed state.

use crate::engine::{Engine, RunOutcome};
use crate::error::{BridgeError, BridgeResult};
use crate::input::InputValue;
use crate::limits::Limits;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Opaque identity of an active evaluation context.
///
/// Non-zero, monotonically assigned, never reused. The managed side passes
/// it back verbatim and never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Raw identity, for handing to a caller that can only carry integers.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Rebuild an identity received back from such a caller.
    ///
    /// Identities are assumed non-forged; an identity that was never issued
    /// is still rejected by the table, it is just reported as unknown
    /// rather than as a specific lifecycle violation.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "context#{}", self.0)
    }
}

struct Slot<E: Engine> {
    engine: Arc<E>,
    ctx: Arc<Mutex<E::Context>>,
}

/// Table of live evaluation contexts.
pub struct ContextTable<E: Engine> {
    slots: DashMap<u64, Slot<E>>,
    next_id: AtomicU64,
}

impl<E: Engine> Default for ContextTable<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Engine> ContextTable<E> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a new evaluation context backed by `engine`.
    pub fn init(&self, engine: &Arc<E>) -> BridgeResult<ContextId> {
        let ctx = engine.open_context()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.slots.insert(
            id,
            Slot {
                engine: Arc::clone(engine),
                ctx: Arc::new(Mutex::new(ctx)),
            },
        );
        Ok(ContextId(id))
    }

    /// Advance a context with one batch of input under the given budget.
    ///
    /// An exhausted general budget short-circuits to
    /// [`RunOutcome::Timeout`] without reaching the engine; the context
    /// stays active either way.
    pub fn run(
        &self,
        id: ContextId,
        input: &InputValue,
        limits: &Limits,
    ) -> BridgeResult<RunOutcome> {
        let (engine, ctx) = match self.slots.get(&id.0) {
            Some(slot) => (Arc::clone(&slot.engine), Arc::clone(&slot.ctx)),
            None => return Err(self.invalid_handle(id, "run")),
        };
        if limits.is_exhausted() {
            return Ok(RunOutcome::Timeout);
        }
        let mut guard = ctx.lock();
        Ok(engine.run(&mut guard, input, limits)?)
    }

    /// Dispose a context, dropping its engine state. The identity is
    /// invalid for all future use.
    pub fn dispose(&self, id: ContextId) -> BridgeResult<()> {
        match self.slots.remove(&id.0) {
            Some(_) => Ok(()),
            None => Err(self.invalid_handle(id, "dispose")),
        }
    }

    /// Number of active contexts.
    pub fn active_count(&self) -> usize {
        self.slots.len()
    }

    fn invalid_handle(&self, id: ContextId, operation: &str) -> BridgeError {
        let next = self.next_id.load(Ordering::Relaxed);
        if id.0 == 0 || id.0 >= next {
            BridgeError::InvalidHandleState(format!(
                "{} on unknown evaluation {}",
                operation, id
            ))
        } else {
            BridgeError::InvalidHandleState(format!(
                "{} on disposed evaluation {}",
                operation, id
            ))
        }
    }
}
