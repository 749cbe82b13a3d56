//! Cleanup results as first-class values.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{CallbackId, EffectId};
use crate::error::{DestroyError, ManagerRole};
use crate::timers::TimerCounts;

/// Which boundary a cleanup ran at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CleanupScope {
    /// Between waves.
    Wave,
    /// Full game restart.
    Game,
}

/// Snapshot of everything the orchestrator tracks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleState {
    /// Registered persistent effects.
    pub persistent_effects: usize,
    /// Registered cleanup callbacks.
    pub cleanup_callbacks: usize,
    /// Registered timers.
    pub timers: TimerCounts,
}

impl LifecycleState {
    /// Whether nothing is tracked.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.persistent_effects == 0 && self.cleanup_callbacks == 0 && self.timers.total() == 0
    }

    /// Non-zero categories as `(name, count)` pairs.
    #[must_use]
    pub fn residual(&self) -> Vec<(&'static str, usize)> {
        [
            ("persistent_effects", self.persistent_effects),
            ("cleanup_callbacks", self.cleanup_callbacks),
            ("intervals", self.timers.intervals),
            ("timeouts", self.timers.timeouts),
        ]
        .into_iter()
        .filter(|&(_, count)| count > 0)
        .collect()
    }
}

/// Which leak watch thresholds a [`LifecycleState`] exceeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LeakWatch {
    /// More persistent effects than `effect_watch_threshold`.
    pub effects_over: bool,
    /// More timers than `timer_watch_threshold`.
    pub timers_over: bool,
}

impl LeakWatch {
    /// Whether any threshold is exceeded.
    #[must_use]
    pub const fn any(&self) -> bool {
        self.effects_over || self.timers_over
    }
}

/// Outcome of destroying the registered persistent effects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EffectCleanupSummary {
    /// Records removed from the registry, including already-destroyed ones.
    pub cleaned: usize,
    /// Records whose handle was already destroyed by its owner.
    pub already_destroyed: usize,
    /// Records where a cleanup step reported an error.
    pub failed: usize,
    /// Records removed, grouped by effect kind.
    pub by_kind: BTreeMap<String, usize>,
}

/// What a teardown failure belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupTarget {
    /// A persistent effect.
    Effect {
        /// Registry id.
        id: EffectId,
        /// Effect kind.
        kind: String,
    },
    /// A manager collaborator.
    Manager(ManagerRole),
    /// A registered cleanup callback.
    Callback(CallbackId),
}

/// One failed teardown step. The batch continued past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    /// Failing item.
    pub target: CleanupTarget,
    /// Reported error.
    pub error: DestroyError,
}

/// What the forced fallback pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ForcedCleanup {
    /// Persistent effects dropped.
    pub effects_dropped: usize,
    /// Cleanup callbacks dropped without running.
    pub callbacks_dropped: usize,
    /// Timer handles dropped.
    pub timers_dropped: TimerCounts,
}

/// Final state check after a cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verification {
    /// The normal pass reached an empty state.
    Clean,
    /// The normal pass left `residual` behind; the forced pass cleared it.
    RecoveredByForce {
        /// State left by the normal pass.
        residual: LifecycleState,
    },
    /// Resources remain even after the forced pass.
    Failed {
        /// State left after the forced pass.
        residual: LifecycleState,
    },
}

impl Verification {
    /// Whether the orchestrator ended empty.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Full account of one cleanup call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    /// Wave or game boundary.
    pub scope: CleanupScope,
    /// State before any step ran.
    pub before: LifecycleState,
    /// State after the normal pass, before any forced pass.
    pub after: LifecycleState,
    /// Timers cancelled in step one.
    pub timers_cancelled: TimerCounts,
    /// Persistent effect results.
    pub effects: EffectCleanupSummary,
    /// Managers whose clear/reset succeeded, in call order.
    pub managers_cleared: Vec<ManagerRole>,
    /// Cleanup callbacks that ran successfully.
    pub callbacks_run: usize,
    /// Every per-item failure, in the order encountered.
    pub failures: Vec<CleanupFailure>,
    /// Set when verification had to fall back to the forced pass.
    pub forced: Option<ForcedCleanup>,
    /// Final verification outcome.
    pub verification: Verification,
}

impl CleanupReport {
    /// Whether the call ended in an empty state with no per-item failures.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.verification == Verification::Clean
    }
}
