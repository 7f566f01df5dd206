//! Circuit breaking ("degrade").
//!
//! The statistics (sliding windows, state transitions) belong to an external
//! [`DegradeEngine`]. This module owns the contract with it:
//!
//! - [`resource_name`] derives a stable resource name per operation
//! - [`degrade`] turns descriptor declarations into [`DegradeRule`]s and
//!   guards every call with an engine entry
//!
//! An admitted call holds a [`BreakerEntry`]. Dropping the guard releases the
//! entry exactly once, so success, error, early return and cancellation of
//! the calling future all end with a single `exit`.
//!
//! ```rust
//! use retrofit_rust::resilience::{BreakerEntry, CallOutcome, EngineEntry};
//!
//! struct Entry;
//! impl EngineEntry for Entry {
//!     fn exit(self: Box<Self>, outcome: CallOutcome) {
//!         assert_eq!(outcome, CallOutcome::Success);
//!     }
//! }
//!
//! let mut guard = BreakerEntry::new(Box::new(Entry));
//! guard.record(CallOutcome::Success);
//! drop(guard);
//! ```

pub mod degrade;
pub mod resource_name;

pub use degrade::{DegradeInterceptor, DegradeRuleRegistrar};
pub use resource_name::{
    CachedResourceNameResolver, DefaultResourceNameResolver, ResourceNameResolver,
};

use crate::descriptor::DegradeStrategy;
use crate::Result;
use serde::{Deserialize, Serialize};

/// One circuit-breaking rule, keyed by resource name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradeRule {
    pub resource: String,
    /// Threshold. Milliseconds for `AverageRt`, a ratio in `[0, 1]` for
    /// `ExceptionRatio`, a count for `ExceptionCount`.
    pub count: f64,
    /// Seconds the breaker stays open.
    pub time_window: u32,
    pub strategy: DegradeStrategy,
}

/// How a guarded call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
    /// The calling future was dropped before completion.
    Cancelled,
}

impl CallOutcome {
    pub fn is_failure(self) -> bool {
        !matches!(self, CallOutcome::Success)
    }
}

/// Refusal from the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("resource '{resource}' blocked: {reason}")]
pub struct BlockSignal {
    pub resource: String,
    pub reason: String,
}

impl BlockSignal {
    pub fn new(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            reason: reason.into(),
        }
    }
}

/// Admission ticket handed out by [`DegradeEngine::enter`].
pub trait EngineEntry: Send {
    fn exit(self: Box<Self>, outcome: CallOutcome);
}

/// External breaker engine. `enter`/`exit` are on the hot path and must be
/// safe under arbitrary concurrency.
pub trait DegradeEngine: Send + Sync {
    /// Called once per built client with that client's rules only.
    /// Implementations must merge them into the rules already loaded.
    fn load_rules(&self, rules: Vec<DegradeRule>) -> Result<()>;

    fn enter(&self, resource: &str) -> std::result::Result<Box<dyn EngineEntry>, BlockSignal>;
}

/// Scoped engine entry. Exits on drop with the last recorded outcome.
pub struct BreakerEntry {
    entry: Option<Box<dyn EngineEntry>>,
    outcome: CallOutcome,
}

impl BreakerEntry {
    pub fn new(entry: Box<dyn EngineEntry>) -> Self {
        Self {
            entry: Some(entry),
            outcome: CallOutcome::Cancelled,
        }
    }

    pub fn record(&mut self, outcome: CallOutcome) {
        self.outcome = outcome;
    }

    pub fn outcome(&self) -> CallOutcome {
        self.outcome
    }
}

impl Drop for BreakerEntry {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            entry.exit(self.outcome);
        }
    }
}

impl std::fmt::Debug for BreakerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerEntry")
            .field("released", &self.entry.is_none())
            .field("outcome", &self.outcome)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recording(Arc<Mutex<Vec<CallOutcome>>>);

    impl EngineEntry for Recording {
        fn exit(self: Box<Self>, outcome: CallOutcome) {
            self.0.lock().unwrap().push(outcome);
        }
    }

    #[test]
    fn test_guard_exits_once_with_recorded_outcome() {
        let exits = Arc::new(Mutex::new(Vec::new()));
        let mut guard = BreakerEntry::new(Box::new(Recording(Arc::clone(&exits))));
        guard.record(CallOutcome::Failure);
        guard.record(CallOutcome::Success);
        drop(guard);
        assert_eq!(*exits.lock().unwrap(), vec![CallOutcome::Success]);
    }

    #[test]
    fn test_unrecorded_guard_counts_as_cancelled() {
        let exits = Arc::new(Mutex::new(Vec::new()));
        {
            let _guard = BreakerEntry::new(Box::new(Recording(Arc::clone(&exits))));
        }
        assert_eq!(*exits.lock().unwrap(), vec![CallOutcome::Cancelled]);
        assert!(CallOutcome::Cancelled.is_failure());
    }
}
