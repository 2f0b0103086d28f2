//! Reference table: local and global reference discipline
//!
//! Every heap object handed across the bridge boundary travels as an
//! [`ObjRef`] registered in this table. Local references belong to the call
//! scope (a per-thread frame stack) and must be released before the call
//! returns; global references are explicit promotions, bounded by a
//! configurable capacity, and owned until explicitly deleted. The table
//! tracks reference counts so leak properties are directly observable.
//!
//! Local references must be created and deleted on the same thread; the
//! frame stack is per-thread and the table does not defend against
//! cross-thread deletion.

use crate::runtime::Runtime;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fmt;
use std::thread::{self, ThreadId};

/// Opaque reference to a managed heap object.
///
/// A non-forgeable token: the runtime only honors values it issued itself,
/// and a reference whose last local and global registrations were deleted
/// is detected as stale instead of reaching freed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(pub(crate) u64);

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref#{}", self.0)
    }
}

/// Reference-table failures, mapped to managed exceptions by the runtime.
#[derive(Debug, thiserror::Error)]
pub(crate) enum RefError {
    #[error("global reference table exhausted ({limit} entries)")]
    Exhausted { limit: usize },

    #[error("stale or deleted reference")]
    Stale,

    #[error("reference has the wrong scope for this operation")]
    WrongScope,
}

#[derive(Debug, Default)]
struct RefCounts {
    local: u32,
    global: u32,
}

#[derive(Debug, Default)]
struct RefState {
    counts: FxHashMap<u64, RefCounts>,
    local_total: usize,
    global_total: usize,
}

/// The reference table. One per runtime.
#[derive(Debug)]
pub(crate) struct RefTable {
    state: Mutex<RefState>,
    /// Per-thread stacks of local frames; each frame lists the references
    /// registered while it was the top frame.
    frames: Mutex<FxHashMap<ThreadId, Vec<Vec<u64>>>>,
    max_globals: usize,
}

impl RefTable {
    pub(crate) fn new(max_globals: usize) -> Self {
        Self {
            state: Mutex::new(RefState::default()),
            frames: Mutex::new(FxHashMap::default()),
            max_globals,
        }
    }

    /// Register a local reference to `target` in the current thread's top
    /// frame (an implicit root frame is created on first use).
    pub(crate) fn alloc_local(&self, target: u64) -> ObjRef {
        {
            let mut state = self.state.lock();
            state.counts.entry(target).or_default().local += 1;
            state.local_total += 1;
        }
        let mut frames = self.frames.lock();
        let stack = frames.entry(thread::current().id()).or_default();
        if stack.is_empty() {
            stack.push(Vec::new());
        }
        if let Some(frame) = stack.last_mut() {
            frame.push(target);
        }
        ObjRef(target)
    }

    /// Promote: register a global reference to the same target.
    pub(crate) fn alloc_global(&self, r: ObjRef) -> Result<ObjRef, RefError> {
        let mut state = self.state.lock();
        if !state.counts.contains_key(&r.0) {
            return Err(RefError::Stale);
        }
        if state.global_total >= self.max_globals {
            return Err(RefError::Exhausted {
                limit: self.max_globals,
            });
        }
        state.counts.entry(r.0).or_default().global += 1;
        state.global_total += 1;
        Ok(r)
    }

    /// Resolve a reference to its heap identity, failing if no live
    /// registration exists.
    pub(crate) fn resolve(&self, r: ObjRef) -> Result<u64, RefError> {
        let state = self.state.lock();
        if state.counts.contains_key(&r.0) {
            Ok(r.0)
        } else {
            Err(RefError::Stale)
        }
    }

    /// Delete one local registration of `r` from the current thread's scope.
    pub(crate) fn delete_local(&self, r: ObjRef) -> Result<(), RefError> {
        {
            let mut state = self.state.lock();
            let counts = state.counts.get_mut(&r.0).ok_or(RefError::Stale)?;
            if counts.local == 0 {
                return Err(RefError::WrongScope);
            }
            counts.local -= 1;
            if counts.local == 0 && counts.global == 0 {
                state.counts.remove(&r.0);
            }
            state.local_total -= 1;
        }
        // Scrub one occurrence from this thread's frame lists so the later
        // frame pop does not double-release it.
        let mut frames = self.frames.lock();
        if let Some(stack) = frames.get_mut(&thread::current().id()) {
            for frame in stack.iter_mut().rev() {
                if let Some(pos) = frame.iter().rposition(|&id| id == r.0) {
                    frame.remove(pos);
                    break;
                }
            }
        }
        Ok(())
    }

    /// Delete one global registration of `r`. Deleting twice is an error.
    pub(crate) fn delete_global(&self, r: ObjRef) -> Result<(), RefError> {
        let mut state = self.state.lock();
        let counts = state.counts.get_mut(&r.0).ok_or(RefError::Stale)?;
        if counts.global == 0 {
            return Err(RefError::WrongScope);
        }
        counts.global -= 1;
        if counts.local == 0 && counts.global == 0 {
            state.counts.remove(&r.0);
        }
        state.global_total -= 1;
        Ok(())
    }

    /// Open a new local frame on the current thread.
    pub(crate) fn push_frame(&self) {
        let mut frames = self.frames.lock();
        frames
            .entry(thread::current().id())
            .or_default()
            .push(Vec::new());
    }

    /// Close the current thread's top frame, releasing every local
    /// reference still registered in it.
    pub(crate) fn pop_frame(&self) {
        let popped = {
            let mut frames = self.frames.lock();
            frames
                .get_mut(&thread::current().id())
                .and_then(|stack| stack.pop())
        };
        let Some(ids) = popped else { return };
        let mut state = self.state.lock();
        for id in ids {
            if let Some(counts) = state.counts.get_mut(&id) {
                if counts.local > 0 {
                    counts.local -= 1;
                    if counts.local == 0 && counts.global == 0 {
                        state.counts.remove(&id);
                    }
                    state.local_total -= 1;
                }
            }
        }
    }

    /// Number of live local references, across all threads.
    pub(crate) fn local_count(&self) -> usize {
        self.state.lock().local_total
    }

    /// Number of live global references.
    pub(crate) fn global_count(&self) -> usize {
        self.state.lock().global_total
    }
}

/// RAII guard for a local reference scope.
///
/// Dropping the guard closes the frame and releases every local reference
/// created while it was open, on every exit path.
pub struct LocalFrame<'rt> {
    rt: &'rt Runtime,
}

impl<'rt> LocalFrame<'rt> {
    pub(crate) fn new(rt: &'rt Runtime) -> Self {
        rt.refs().push_frame();
        Self { rt }
    }
}

impl Drop for LocalFrame<'_> {
    fn drop(&mut self) {
        self.rt.refs().pop_frame();
    }
}

/// RAII guard for a single transient local reference.
///
/// Used where a call acquires one bounded local reference and must release
/// it on both the success and the failure path.
pub struct ScopedRef<'rt> {
    rt: &'rt Runtime,
    r: ObjRef,
}

impl<'rt> ScopedRef<'rt> {
    /// Take ownership of a local reference for the current scope.
    pub fn new(rt: &'rt Runtime, r: ObjRef) -> Self {
        Self { rt, r }
    }

    /// The guarded reference.
    pub fn get(&self) -> ObjRef {
        self.r
    }
}

impl Drop for ScopedRef<'_> {
    fn drop(&mut self) {
        // The reference may already be gone if the surrounding frame was
        // popped first; release is best-effort by construction.
        let _ = self.rt.delete_local_ref(self.r);
    }
}
