//! The engine seam
//!
//! The underlying inspection engine is an external collaborator: an opaque
//! native library that owns pointer-sized evaluation state and reports a
//! pass/fail-with-data result. The bridge only needs the three capabilities
//! captured by [`Engine`]; everything else about the engine (its rules, its
//! algorithm) stays behind this trait.

use crate::input::InputValue;
use crate::limits::Limits;

/// A native evaluation engine.
///
/// `Context` is the engine's accumulating evaluation state: created by
/// [`Engine::open_context`], advanced by every [`Engine::run`], and
/// destroyed by drop. A context is not assumed to be thread-safe; the
/// bridge never runs one concurrently on behalf of a single caller, and
/// concurrent misuse by multiple callers is the callers' contract
/// violation.
pub trait Engine: Send + Sync {
    /// Accumulating evaluation state owned by one context slot.
    type Context: Send;

    /// Allocate fresh evaluation state.
    fn open_context(&self) -> Result<Self::Context, EngineError>;

    /// Advance the context with one batch of input under the given budget.
    ///
    /// The limits arrive exactly as the caller supplied them; budget
    /// enforcement is the engine's job, and exhaustion without a match is
    /// reported as [`RunOutcome::Timeout`], not as an error.
    fn run(
        &self,
        ctx: &mut Self::Context,
        input: &InputValue,
        limits: &Limits,
    ) -> Result<RunOutcome, EngineError>;
}

/// Classified outcome of a single run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The accumulated state matched nothing
    NoMatch,

    /// The engine matched; details attached
    Match(MatchData),

    /// The budget was exhausted before a match was found. A distinct,
    /// non-exceptional outcome: the context stays active.
    Timeout,
}

/// Details of a match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchData {
    /// Engine-formatted match report
    pub data: String,
    /// Actions the engine requests from the caller
    pub actions: Vec<String>,
}

/// Failures reported by the engine itself.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The engine rejected an argument of the call
    #[error("engine rejected argument: {0}")]
    InvalidArgument(String),

    /// The engine rejected the input object
    #[error("engine rejected input: {0}")]
    InvalidObject(String),

    /// Internal engine failure
    #[error("internal engine failure: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        let hit = RunOutcome::Match(MatchData {
            data: "[{\"rule\":\"r1\"}]".to_string(),
            actions: vec!["block".to_string()],
        });
        assert_ne!(hit, RunOutcome::NoMatch);
        assert_ne!(RunOutcome::Timeout, RunOutcome::NoMatch);
    }
}
