//! Run results, serialized as JSON.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use td_core::error::ManagerRole;
use td_core::lifecycle::{CleanupReport, CleanupScope, ForcedCleanup, Verification};
use td_core::pool::PoolStats;
use td_core::spatial::GridStats;
use td_core::spawning::QueueOrder;
use td_core::timers::TimerCounts;

use crate::error::HeadlessError;

/// Serializable digest of a [`CleanupReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    /// Wave or game boundary.
    pub scope: CleanupScope,
    /// Timers cancelled before anything was destroyed.
    pub timers_cancelled: TimerCounts,
    /// Persistent effects removed.
    pub effects_cleaned: usize,
    /// Persistent effects whose owner had already destroyed them.
    pub effects_already_destroyed: usize,
    /// Managers cleared successfully, in call order.
    pub managers_cleared: Vec<ManagerRole>,
    /// Cleanup callbacks run.
    pub callbacks_run: usize,
    /// One line per failed teardown step.
    pub failures: Vec<String>,
    /// Forced-pass results, if one was needed.
    pub forced: Option<ForcedCleanup>,
    /// Final verification outcome.
    pub verification: Verification,
}

impl From<&CleanupReport> for CleanupSummary {
    fn from(report: &CleanupReport) -> Self {
        Self {
            scope: report.scope,
            timers_cancelled: report.timers_cancelled,
            effects_cleaned: report.effects.cleaned,
            effects_already_destroyed: report.effects.already_destroyed,
            managers_cleared: report.managers_cleared.clone(),
            callbacks_run: report.callbacks_run,
            failures: report
                .failures
                .iter()
                .map(|f| format!("{:?}: {}", f.target, f.error))
                .collect(),
            forced: report.forced,
            verification: report.verification,
        }
    }
}

/// Outcome of one wave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaveReport {
    /// 1-based wave number.
    pub wave: u32,
    /// Entries queued at wave start.
    pub queued: usize,
    /// Entities the factory created.
    pub spawned: usize,
    /// Zombies killed by towers.
    pub killed: usize,
    /// Zombies that reached the far edge.
    pub leaked: usize,
    /// Zombies still alive when the wave ended.
    pub remaining: usize,
    /// Tower shots fired.
    pub shots: usize,
    /// Auras that expired on their own before cleanup.
    pub auras_expired: usize,
    /// Wave clock at the end of the wave.
    pub duration_ms: u64,
    /// Whether the wave was released and cleared before the time limit.
    pub complete: bool,
    /// Between-wave teardown.
    pub cleanup: CleanupSummary,
}

/// Complete headless run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Queue shuffle seed.
    pub seed: u64,
    /// Fixed tick length.
    pub tick_ms: u64,
    /// Queue ordering policy.
    pub queue_order: QueueOrder,
    /// Per-wave results.
    pub waves: Vec<WaveReport>,
    /// Final teardown.
    pub game_cleanup: CleanupSummary,
    /// Muzzle-flash pool accounting after the run.
    pub flash_pool: PoolStats,
    /// Spatial index state after the run.
    pub grid: GridStats,
}

impl RunReport {
    /// Whether every cleanup ended with an empty orchestrator.
    #[must_use]
    pub fn all_cleanups_verified(&self) -> bool {
        self.waves
            .iter()
            .map(|w| &w.cleanup)
            .chain(std::iter::once(&self.game_cleanup))
            .all(|c| c.verification.is_success())
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, HeadlessError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write JSON to `path`, or to stdout when `path` is `None`.
    pub fn write_json(&self, path: Option<&Path>) -> Result<(), HeadlessError> {
        let json = self.to_json()?;
        match path {
            Some(path) => std::fs::write(path, json).map_err(|source| HeadlessError::Write {
                path: path.display().to_string(),
                source,
            }),
            None => {
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{json}").map_err(|source| HeadlessError::Write {
                    path: "<stdout>".into(),
                    source,
                })
            }
        }
    }
}
