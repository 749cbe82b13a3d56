//! Timer handle tracking with bulk cancellation.
//!
//! Systems that schedule deferred or periodic work register the resulting
//! [`TimerHandle`] with the shared [`TimerRegistry`]. At wave and game
//! boundaries the lifecycle orchestrator cancels everything still
//! registered *before* destroying any object a pending timer might touch.
//!
//! The platform clock sits behind the [`TimerBackend`] trait. [`SimTimers`]
//! is the deterministic backend used by the simulation: it runs on a
//! millisecond clock that the host advances each tick.
//!
//! # Invariants
//!
//! - Every handle still running on the backend is registered. A handle whose
//!   cancellation the backend rejects therefore stays registered.
//! - Cancelling an unknown or already-cancelled handle is a no-op.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::error::TimerError;

/// Opaque timer identifier issued by a [`TimerBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TimerHandle(pub u64);

/// Whether a timer repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TimerKind {
    /// Fires every period until cancelled.
    Interval,
    /// Fires once.
    Timeout,
}

/// Cancellation seam over the platform clock.
pub trait TimerBackend {
    /// Stop a timer. Unknown handles must be accepted as a no-op.
    fn cancel(&mut self, handle: TimerHandle, kind: TimerKind) -> Result<(), TimerError>;
}

/// Registered handle counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimerCounts {
    /// Registered interval handles.
    pub intervals: usize,
    /// Registered timeout handles.
    pub timeouts: usize,
}

impl TimerCounts {
    /// Sum of both kinds.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.intervals + self.timeouts
    }
}

/// A timer that fired during [`SimTimers::advance_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    /// Handle of the timer.
    pub handle: TimerHandle,
    /// Kind of the timer.
    pub kind: TimerKind,
    /// Scheduled firing time.
    pub at_ms: u64,
}

#[derive(Debug, Clone, Copy)]
struct ScheduledTimer {
    kind: TimerKind,
    due_at_ms: u64,
    period_ms: u64,
}

/// Deterministic simulated clock.
///
/// Timers fire in `(due time, handle)` order, so two timers due on the
/// same millisecond fire in creation order.
#[derive(Debug, Clone, Default)]
pub struct SimTimers {
    now_ms: u64,
    next_id: u64,
    timers: HashMap<TimerHandle, ScheduledTimer>,
    queue: BTreeSet<(u64, TimerHandle)>,
}

impl SimTimers {
    /// Create a clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current clock time.
    #[must_use]
    pub const fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Schedule a one-shot timer `delay_ms` from now.
    pub fn set_timeout(&mut self, delay_ms: u64) -> TimerHandle {
        self.schedule(TimerKind::Timeout, delay_ms, 0)
    }

    /// Schedule a repeating timer. Periods below 1 ms are raised to 1 ms.
    pub fn set_interval(&mut self, period_ms: u64) -> TimerHandle {
        let period_ms = period_ms.max(1);
        self.schedule(TimerKind::Interval, period_ms, period_ms)
    }

    fn schedule(&mut self, kind: TimerKind, delay_ms: u64, period_ms: u64) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        let due_at_ms = self.now_ms.saturating_add(delay_ms);
        self.timers.insert(
            handle,
            ScheduledTimer {
                kind,
                due_at_ms,
                period_ms,
            },
        );
        self.queue.insert((due_at_ms, handle));
        handle
    }

    /// Advance the clock and collect every firing up to `now_ms`.
    ///
    /// Intervals may fire several times in one call. Timeouts are retired
    /// after firing. Moving the clock backwards is ignored.
    pub fn advance_to(&mut self, now_ms: u64) -> Vec<TimerFired> {
        let mut fired = Vec::new();
        while let Some(&(due_at_ms, handle)) = self.queue.first() {
            if due_at_ms > now_ms {
                break;
            }
            self.queue.pop_first();
            let Some(timer) = self.timers.get_mut(&handle) else {
                continue;
            };
            fired.push(TimerFired {
                handle,
                kind: timer.kind,
                at_ms: due_at_ms,
            });
            match timer.kind {
                TimerKind::Timeout => {
                    self.timers.remove(&handle);
                }
                TimerKind::Interval => {
                    timer.due_at_ms = due_at_ms.saturating_add(timer.period_ms);
                    self.queue.insert((timer.due_at_ms, handle));
                }
            }
        }
        self.now_ms = self.now_ms.max(now_ms);
        fired
    }

    /// Whether a timer is still scheduled.
    #[must_use]
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.timers.contains_key(&handle)
    }

    /// Number of scheduled timers.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.timers.len()
    }
}

impl TimerBackend for SimTimers {
    fn cancel(&mut self, handle: TimerHandle, _kind: TimerKind) -> Result<(), TimerError> {
        if let Some(timer) = self.timers.remove(&handle) {
            self.queue.remove(&(timer.due_at_ms, handle));
        }
        Ok(())
    }
}

/// Registry of outstanding timer handles.
#[derive(Debug, Clone, Default)]
pub struct TimerRegistry<B = SimTimers> {
    backend: B,
    intervals: BTreeSet<TimerHandle>,
    timeouts: BTreeSet<TimerHandle>,
}

impl<B: TimerBackend> TimerRegistry<B> {
    /// Create an empty registry over `backend`.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            intervals: BTreeSet::new(),
            timeouts: BTreeSet::new(),
        }
    }

    /// The platform clock.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the platform clock.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Track an interval handle. Returns it unchanged.
    ///
    /// A handle already tracked as a timeout is left there and not added.
    pub fn register_interval(&mut self, handle: TimerHandle) -> TimerHandle {
        if self.timeouts.contains(&handle) {
            tracing::warn!(?handle, "Handle already registered as a timeout, not adding as interval");
        } else {
            self.intervals.insert(handle);
        }
        handle
    }

    /// Track a timeout handle. Returns it unchanged.
    ///
    /// A handle already tracked as an interval is left there and not added.
    pub fn register_timeout(&mut self, handle: TimerHandle) -> TimerHandle {
        if self.intervals.contains(&handle) {
            tracing::warn!(?handle, "Handle already registered as an interval, not adding as timeout");
        } else {
            self.timeouts.insert(handle);
        }
        handle
    }

    /// Stop tracking an interval without cancelling it.
    pub fn unregister_interval(&mut self, handle: TimerHandle) -> bool {
        let removed = self.intervals.remove(&handle);
        if !removed {
            tracing::debug!(?handle, "Unregistering unknown interval");
        }
        removed
    }

    /// Stop tracking a timeout without cancelling it, typically after it fired.
    pub fn unregister_timeout(&mut self, handle: TimerHandle) -> bool {
        let removed = self.timeouts.remove(&handle);
        if !removed {
            tracing::debug!(?handle, "Unregistering unknown timeout");
        }
        removed
    }

    /// Cancel an interval and stop tracking it.
    ///
    /// Returns whether the handle was registered. If the backend rejects the
    /// cancellation the handle stays registered and the error is returned.
    pub fn clear_interval(&mut self, handle: TimerHandle) -> Result<bool, TimerError> {
        self.backend.cancel(handle, TimerKind::Interval)?;
        Ok(self.intervals.remove(&handle))
    }

    /// Cancel a timeout and stop tracking it.
    pub fn clear_timeout(&mut self, handle: TimerHandle) -> Result<bool, TimerError> {
        self.backend.cancel(handle, TimerKind::Timeout)?;
        Ok(self.timeouts.remove(&handle))
    }

    /// Cancel every registered interval. Returns how many were cancelled.
    pub fn clear_all_intervals(&mut self) -> usize {
        let cancelled = Self::cancel_set(&mut self.backend, &mut self.intervals, TimerKind::Interval);
        if cancelled > 0 {
            tracing::debug!(cancelled, "Cleared intervals");
        }
        cancelled
    }

    /// Cancel every registered timeout. Returns how many were cancelled.
    pub fn clear_all_timeouts(&mut self) -> usize {
        let cancelled = Self::cancel_set(&mut self.backend, &mut self.timeouts, TimerKind::Timeout);
        if cancelled > 0 {
            tracing::debug!(cancelled, "Cleared timeouts");
        }
        cancelled
    }

    /// Cancel everything registered.
    pub fn clear_all(&mut self) -> TimerCounts {
        let cancelled = TimerCounts {
            intervals: self.clear_all_intervals(),
            timeouts: self.clear_all_timeouts(),
        };
        tracing::info!(
            intervals = cancelled.intervals,
            timeouts = cancelled.timeouts,
            "Cancelled registered timers"
        );
        cancelled
    }

    fn cancel_set(backend: &mut B, set: &mut BTreeSet<TimerHandle>, kind: TimerKind) -> usize {
        let mut cancelled = 0;
        set.retain(|&handle| match backend.cancel(handle, kind) {
            Ok(()) => {
                cancelled += 1;
                false
            }
            Err(err) => {
                tracing::warn!(?handle, error = %err, "Timer cancellation rejected, keeping handle");
                true
            }
        });
        cancelled
    }

    /// Best-effort cancel of every handle, then empty both sets regardless.
    ///
    /// Returns how many handles were dropped. Handles the backend refused to
    /// cancel may keep running untracked; each one is logged.
    pub fn force_clear(&mut self) -> TimerCounts {
        let dropped = self.counts();
        for (set, kind) in [
            (&self.intervals, TimerKind::Interval),
            (&self.timeouts, TimerKind::Timeout),
        ] {
            for &handle in set {
                if let Err(err) = self.backend.cancel(handle, kind) {
                    tracing::error!(?handle, error = %err, "Dropping timer the backend could not cancel");
                }
            }
        }
        self.intervals.clear();
        self.timeouts.clear();
        dropped
    }

    /// Current registered counts.
    #[must_use]
    pub fn counts(&self) -> TimerCounts {
        TimerCounts {
            intervals: self.intervals.len(),
            timeouts: self.timeouts.len(),
        }
    }

    /// Whether `handle` is registered as either kind.
    #[must_use]
    pub fn is_registered(&self, handle: TimerHandle) -> bool {
        self.intervals.contains(&handle) || self.timeouts.contains(&handle)
    }
}

impl TimerRegistry<SimTimers> {
    /// Schedule and register a timeout in one step.
    pub fn schedule_timeout(&mut self, delay_ms: u64) -> TimerHandle {
        let handle = self.backend.set_timeout(delay_ms);
        self.register_timeout(handle)
    }

    /// Schedule and register an interval in one step.
    pub fn schedule_interval(&mut self, period_ms: u64) -> TimerHandle {
        let handle = self.backend.set_interval(period_ms);
        self.register_interval(handle)
    }

    /// Advance the clock, unregistering timeouts as they complete.
    pub fn advance_to(&mut self, now_ms: u64) -> Vec<TimerFired> {
        let fired = self.backend.advance_to(now_ms);
        for event in &fired {
            if event.kind == TimerKind::Timeout {
                self.timeouts.remove(&event.handle);
            }
        }
        fired
    }
}
