//! Resource lifecycle tracking and verified teardown.
//!
//! The [`LifecycleOrchestrator`] is the single owner of the teardown order
//! at wave and game boundaries. One instance lives in the host context and
//! is handed by `&mut` to every subsystem that creates long-lived resources,
//! so a cleanup sees everything regardless of who registered it.
//!
//! # Cleanup order
//!
//! 1. Cancel every registered timer. A pending timer may reference an
//!    object destroyed in a later step, so nothing is destroyed first.
//! 2. Destroy persistent effects, skipping handles already destroyed.
//! 3. Clear the manager collaborators.
//! 4. Run and drain registered cleanup callbacks.
//! 5. Verify the orchestrator is empty, falling back to
//!    [`LifecycleOrchestrator::force_cleanup`] if it is not.
//!
//! Every step records failures into the returned [`CleanupReport`] and
//! keeps going; cleanup never panics and never returns an error.

mod collaborators;
mod report;

use std::collections::BTreeMap;

use serde::Serialize;

pub use collaborators::{
    CombatSink, EffectSink, Managers, ParticleSink, PlacementSink, ProjectileSink, VisualHandle,
    WaveSink, ZombieSink,
};
pub use report::{
    CleanupFailure, CleanupReport, CleanupScope, CleanupTarget, EffectCleanupSummary,
    ForcedCleanup, LeakWatch, LifecycleState, Verification,
};

use crate::config::LifecycleConfig;
use crate::error::{DestroyError, ManagerRole};
use crate::timers::{SimTimers, TimerBackend, TimerRegistry};

/// Deferred teardown action.
pub type CleanupCallback = Box<dyn FnOnce() -> Result<(), DestroyError>>;

/// Registry id of a persistent effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EffectId(u64);

/// Registry id of a cleanup callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CallbackId(u64);

/// Descriptive data attached to a persistent effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectMetadata {
    /// Effect category, used to group cleanup summaries.
    pub kind: String,
    /// Orchestrator clock at registration.
    pub created_at_ms: u64,
    /// Expected lifetime, if the effect expires on its own.
    pub duration_ms: Option<u64>,
}

/// Registration options for a persistent effect.
pub struct EffectOptions {
    kind: String,
    duration_ms: Option<u64>,
    on_cleanup: Option<CleanupCallback>,
}

impl EffectOptions {
    /// Options for an effect of the given kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            duration_ms: None,
            on_cleanup: None,
        }
    }

    /// Expected lifetime in milliseconds.
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Action run before the handle is destroyed during cleanup.
    pub fn with_cleanup(
        mut self,
        on_cleanup: impl FnOnce() -> Result<(), DestroyError> + 'static,
    ) -> Self {
        self.on_cleanup = Some(Box::new(on_cleanup));
        self
    }
}

impl std::fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectOptions")
            .field("kind", &self.kind)
            .field("duration_ms", &self.duration_ms)
            .field("on_cleanup", &self.on_cleanup.is_some())
            .finish()
    }
}

struct EffectRecord {
    handle: Box<dyn VisualHandle>,
    metadata: EffectMetadata,
    on_cleanup: Option<CleanupCallback>,
}

/// Tracks persistent effects, cleanup callbacks and timers, and tears them
/// down in a fixed, verified order.
pub struct LifecycleOrchestrator<B: TimerBackend = SimTimers> {
    config: LifecycleConfig,
    timers: TimerRegistry<B>,
    effects: BTreeMap<EffectId, EffectRecord>,
    callbacks: BTreeMap<CallbackId, CleanupCallback>,
    next_id: u64,
    clock_ms: u64,
}

impl<B: TimerBackend> std::fmt::Debug for LifecycleOrchestrator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleOrchestrator")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("clock_ms", &self.clock_ms)
            .finish_non_exhaustive()
    }
}

impl Default for LifecycleOrchestrator<SimTimers> {
    fn default() -> Self {
        Self::new(LifecycleConfig::default(), TimerRegistry::new(SimTimers::new()))
    }
}

impl<B: TimerBackend> LifecycleOrchestrator<B> {
    /// Create an orchestrator that owns `timers`.
    pub fn new(config: LifecycleConfig, timers: TimerRegistry<B>) -> Self {
        Self {
            config,
            timers,
            effects: BTreeMap::new(),
            callbacks: BTreeMap::new(),
            next_id: 0,
            clock_ms: 0,
        }
    }

    /// The shared timer registry.
    pub const fn timers(&self) -> &TimerRegistry<B> {
        &self.timers
    }

    /// Mutable access to the shared timer registry.
    pub fn timers_mut(&mut self) -> &mut TimerRegistry<B> {
        &mut self.timers
    }

    /// Set the clock used to stamp new effects.
    pub fn set_clock_ms(&mut self, now_ms: u64) {
        self.clock_ms = now_ms;
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Take ownership of a persistent effect until cleanup or unregistration.
    pub fn register_persistent_effect(
        &mut self,
        handle: Box<dyn VisualHandle>,
        options: EffectOptions,
    ) -> EffectId {
        let id = EffectId(self.next_id());
        tracing::debug!(?id, kind = %options.kind, "Registered persistent effect");
        self.effects.insert(
            id,
            EffectRecord {
                handle,
                metadata: EffectMetadata {
                    kind: options.kind,
                    created_at_ms: self.clock_ms,
                    duration_ms: options.duration_ms,
                },
                on_cleanup: options.on_cleanup,
            },
        );
        id
    }

    /// Release an effect that expired and cleaned itself up.
    ///
    /// Returns the handle to the caller; its `on_cleanup` action is dropped
    /// without running.
    pub fn unregister_persistent_effect(&mut self, id: EffectId) -> Option<Box<dyn VisualHandle>> {
        let record = self.effects.remove(&id);
        if record.is_none() {
            tracing::debug!(?id, "Unregistering unknown persistent effect");
        }
        record.map(|record| record.handle)
    }

    /// Metadata of a registered effect.
    #[must_use]
    pub fn effect_metadata(&self, id: EffectId) -> Option<&EffectMetadata> {
        self.effects.get(&id).map(|record| &record.metadata)
    }

    /// Effects whose declared duration has elapsed at `now_ms`.
    #[must_use]
    pub fn expired_effects(&self, now_ms: u64) -> Vec<EffectId> {
        self.effects
            .iter()
            .filter(|(_, record)| {
                record
                    .metadata
                    .duration_ms
                    .is_some_and(|d| record.metadata.created_at_ms.saturating_add(d) <= now_ms)
            })
            .map(|(&id, _)| id)
            .collect()
    }

    /// Register a deferred action run once during the next cleanup.
    pub fn register_cleanup_callback(
        &mut self,
        callback: impl FnOnce() -> Result<(), DestroyError> + 'static,
    ) -> CallbackId {
        let id = CallbackId(self.next_id());
        self.callbacks.insert(id, Box::new(callback));
        id
    }

    /// Drop a registered callback without running it.
    pub fn unregister_cleanup_callback(&mut self, id: CallbackId) -> bool {
        self.callbacks.remove(&id).is_some()
    }

    /// Between-wave teardown.
    pub fn cleanup_wave_resources(&mut self, managers: &mut Managers<'_>) -> CleanupReport {
        self.run_cleanup(CleanupScope::Wave, managers)
    }

    /// Full teardown for a game restart.
    pub fn cleanup_game_resources(&mut self, managers: &mut Managers<'_>) -> CleanupReport {
        self.run_cleanup(CleanupScope::Game, managers)
    }

    fn run_cleanup(&mut self, scope: CleanupScope, managers: &mut Managers<'_>) -> CleanupReport {
        let before = self.log_state();
        let mut failures = Vec::new();

        let timers_cancelled = self.timers.clear_all();
        let effects = self.cleanup_persistent_effects(&mut failures);
        let managers_cleared = Self::clear_managers(scope, managers, &mut failures);
        let callbacks_run = self.run_callbacks(&mut failures);

        let after = self.state();
        let (verification, forced) = self.verify(before, after);

        tracing::info!(
            ?scope,
            timers = timers_cancelled.total(),
            effects = effects.cleaned,
            managers = managers_cleared.len(),
            callbacks = callbacks_run,
            failures = failures.len(),
            ?verification,
            "Cleanup finished"
        );

        CleanupReport {
            scope,
            before,
            after,
            timers_cancelled,
            effects,
            managers_cleared,
            callbacks_run,
            failures,
            forced,
            verification,
        }
    }

    fn cleanup_persistent_effects(
        &mut self,
        failures: &mut Vec<CleanupFailure>,
    ) -> EffectCleanupSummary {
        let mut summary = EffectCleanupSummary::default();

        for (id, record) in std::mem::take(&mut self.effects) {
            let EffectRecord {
                mut handle,
                metadata,
                on_cleanup,
            } = record;
            *summary.by_kind.entry(metadata.kind.clone()).or_default() += 1;
            summary.cleaned += 1;

            if handle.is_destroyed() {
                summary.already_destroyed += 1;
                continue;
            }

            let mut record_failure = |error: DestroyError| {
                tracing::warn!(?id, kind = %metadata.kind, error = %error, "Persistent effect cleanup step failed");
                failures.push(CleanupFailure {
                    target: CleanupTarget::Effect {
                        id,
                        kind: metadata.kind.clone(),
                    },
                    error,
                });
            };

            let mut failed = false;
            if let Some(on_cleanup) = on_cleanup {
                if let Err(error) = on_cleanup() {
                    record_failure(error);
                    failed = true;
                }
            }
            if handle.has_parent() {
                if let Err(error) = handle.detach() {
                    record_failure(error);
                    failed = true;
                }
            }
            if let Err(error) = handle.destroy() {
                record_failure(error);
                failed = true;
            }
            if failed {
                summary.failed += 1;
            }
        }

        if summary.cleaned > 0 {
            tracing::info!(
                cleaned = summary.cleaned,
                already_destroyed = summary.already_destroyed,
                failed = summary.failed,
                by_kind = ?summary.by_kind,
                "Persistent effects cleaned up"
            );
        }
        summary
    }

    fn clear_managers(
        scope: CleanupScope,
        managers: &mut Managers<'_>,
        failures: &mut Vec<CleanupFailure>,
    ) -> Vec<ManagerRole> {
        let mut cleared = Vec::new();
        let mut record = |role: ManagerRole, result: Result<(), DestroyError>| match result {
            Ok(()) => cleared.push(role),
            Err(error) => {
                tracing::warn!(%role, error = %error, "Manager cleanup failed");
                failures.push(CleanupFailure {
                    target: CleanupTarget::Manager(role),
                    error,
                });
            }
        };

        if let Some(projectiles) = managers.projectiles.as_deref_mut() {
            record(ManagerRole::Projectiles, projectiles.clear());
        }
        if let Some(effects) = managers.effects.as_deref_mut() {
            record(ManagerRole::Effects, effects.clear());
        }
        if let Some(zombies) = managers.zombies.as_deref_mut() {
            if let Some(blood) = zombies.blood_particles() {
                record(ManagerRole::BloodParticles, blood.clear());
            }
        }

        if scope == CleanupScope::Game {
            if let Some(zombies) = managers.zombies.as_deref_mut() {
                record(ManagerRole::Zombies, zombies.clear());
            }
            if let Some(placement) = managers.placement.as_deref_mut() {
                record(ManagerRole::Placement, placement.clear());
            }
            if let Some(combat) = managers.combat.as_deref_mut() {
                let result = combat
                    .set_towers(Vec::new())
                    .and_then(|()| combat.set_zombies(Vec::new()));
                record(ManagerRole::Combat, result);
            }
            if let Some(waves) = managers.waves.as_deref_mut() {
                record(ManagerRole::Waves, waves.reset());
            }
        }

        cleared
    }

    fn run_callbacks(&mut self, failures: &mut Vec<CleanupFailure>) -> usize {
        let mut run = 0;
        for (id, callback) in std::mem::take(&mut self.callbacks) {
            match callback() {
                Ok(()) => run += 1,
                Err(error) => {
                    tracing::warn!(?id, error = %error, "Cleanup callback failed");
                    failures.push(CleanupFailure {
                        target: CleanupTarget::Callback(id),
                        error,
                    });
                }
            }
        }
        run
    }

    fn verify(
        &mut self,
        before: LifecycleState,
        after: LifecycleState,
    ) -> (Verification, Option<ForcedCleanup>) {
        if after.is_empty() {
            return (Verification::Clean, None);
        }

        for (category, remaining) in after.residual() {
            tracing::warn!(category, remaining, ?before, "Cleanup left resources behind");
        }

        let forced = self.force_cleanup();
        let residual = self.state();
        if residual.is_empty() {
            tracing::info!(?forced, "Forced cleanup recovered");
            (Verification::RecoveredByForce { residual: after }, Some(forced))
        } else {
            tracing::error!(?residual, "Cleanup failed even after forced pass");
            (Verification::Failed { residual }, Some(forced))
        }
    }

    /// Unconditional second pass: destroy what is left, ignore failures,
    /// drop callbacks unrun and empty every registry.
    pub fn force_cleanup(&mut self) -> ForcedCleanup {
        let effects = std::mem::take(&mut self.effects);
        let effects_dropped = effects.len();
        for (id, mut record) in effects {
            if record.handle.is_destroyed() {
                continue;
            }
            if record.handle.has_parent() {
                if let Err(error) = record.handle.detach() {
                    tracing::debug!(?id, error = %error, "Forced detach failed, destroying anyway");
                }
            }
            if let Err(error) = record.handle.destroy() {
                tracing::debug!(?id, error = %error, "Forced destroy failed, dropping handle");
            }
        }

        let callbacks_dropped = std::mem::take(&mut self.callbacks).len();
        let timers_dropped = self.timers.force_clear();

        ForcedCleanup {
            effects_dropped,
            callbacks_dropped,
            timers_dropped,
        }
    }

    /// Current counts.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        LifecycleState {
            persistent_effects: self.effects.len(),
            cleanup_callbacks: self.callbacks.len(),
            timers: self.timers.counts(),
        }
    }

    /// Compare current counts against the leak watch thresholds.
    #[must_use]
    pub fn leak_watch(&self) -> LeakWatch {
        let state = self.state();
        LeakWatch {
            effects_over: state.persistent_effects > self.config.effect_watch_threshold,
            timers_over: state.timers.total() > self.config.timer_watch_threshold,
        }
    }

    /// Log current counts, warning past the leak watch thresholds.
    pub fn log_state(&self) -> LifecycleState {
        let state = self.state();
        tracing::debug!(
            effects = state.persistent_effects,
            callbacks = state.cleanup_callbacks,
            intervals = state.timers.intervals,
            timeouts = state.timers.timeouts,
            "Lifecycle state"
        );
        let watch = self.leak_watch();
        if watch.effects_over {
            tracing::warn!(
                effects = state.persistent_effects,
                threshold = self.config.effect_watch_threshold,
                "Persistent effect count above watch threshold, possible leak"
            );
        }
        if watch.timers_over {
            tracing::warn!(
                timers = state.timers.total(),
                threshold = self.config.timer_watch_threshold,
                "Timer count above watch threshold, possible leak"
            );
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::error::TimerError;
    use crate::timers::{TimerHandle, TimerKind};

    #[derive(Default)]
    struct Sprite {
        destroyed: Rc<Cell<bool>>,
        destroy_calls: Rc<Cell<u32>>,
        parent: bool,
        fail_detach: bool,
        fail_destroy: bool,
    }

    impl VisualHandle for Sprite {
        fn is_destroyed(&self) -> bool {
            self.destroyed.get()
        }

        fn has_parent(&self) -> bool {
            self.parent
        }

        fn detach(&mut self) -> Result<(), DestroyError> {
            if self.fail_detach {
                return Err(DestroyError::DetachFailed("parent locked".into()));
            }
            self.parent = false;
            Ok(())
        }

        fn destroy(&mut self) -> Result<(), DestroyError> {
            self.destroy_calls.set(self.destroy_calls.get() + 1);
            if self.fail_destroy {
                return Err(DestroyError::DestroyFailed("texture busy".into()));
            }
            self.destroyed.set(true);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Counter {
        calls: u32,
    }

    impl ProjectileSink for Counter {
        fn clear(&mut self) -> Result<(), DestroyError> {
            self.calls += 1;
            Ok(())
        }
    }

    #[test]
    fn test_wave_cleanup_empties_everything() {
        let mut orchestrator = LifecycleOrchestrator::default();
        let calls = Rc::new(Cell::new(0));
        for _ in 0..3 {
            let sprite = Sprite {
                destroy_calls: Rc::clone(&calls),
                parent: true,
                ..Sprite::default()
            };
            orchestrator.register_persistent_effect(Box::new(sprite), EffectOptions::new("aura"));
        }
        orchestrator.timers_mut().schedule_interval(100);
        orchestrator.timers_mut().schedule_timeout(500);
        orchestrator.register_cleanup_callback(|| Ok(()));

        let mut projectiles = Counter::default();
        let mut managers = Managers::new().with_projectiles(&mut projectiles);
        let report = orchestrator.cleanup_wave_resources(&mut managers);

        assert!(report.is_clean());
        assert_eq!(report.before.persistent_effects, 3);
        assert_eq!(report.timers_cancelled.total(), 2);
        assert_eq!(report.effects.cleaned, 3);
        assert_eq!(report.effects.by_kind.get("aura"), Some(&3));
        assert_eq!(report.callbacks_run, 1);
        assert_eq!(report.managers_cleared, vec![ManagerRole::Projectiles]);
        assert!(orchestrator.state().is_empty());
        assert_eq!(calls.get(), 3);
        assert_eq!(projectiles.calls, 1);
    }

    #[test]
    fn test_already_destroyed_effect_is_counted_not_destroyed() {
        let mut orchestrator = LifecycleOrchestrator::default();
        let calls = Rc::new(Cell::new(0));
        let sprite = Sprite {
            destroyed: Rc::new(Cell::new(true)),
            destroy_calls: Rc::clone(&calls),
            ..Sprite::default()
        };
        orchestrator.register_persistent_effect(Box::new(sprite), EffectOptions::new("burn"));

        let report = orchestrator.cleanup_wave_resources(&mut Managers::new());

        assert_eq!(calls.get(), 0);
        assert_eq!(report.effects.cleaned, 1);
        assert_eq!(report.effects.already_destroyed, 1);
        assert_eq!(report.verification, Verification::Clean);
    }

    #[test]
    fn test_failing_items_do_not_block_the_batch() {
        let mut orchestrator = LifecycleOrchestrator::default();
        let healthy_destroyed = Rc::new(Cell::new(false));

        orchestrator.register_persistent_effect(
            Box::new(Sprite {
                fail_destroy: true,
                ..Sprite::default()
            }),
            EffectOptions::new("glow").with_cleanup(|| Err(DestroyError::CallbackFailed("boom".into()))),
        );
        orchestrator.register_persistent_effect(
            Box::new(Sprite {
                destroyed: Rc::clone(&healthy_destroyed),
                ..Sprite::default()
            }),
            EffectOptions::new("glow"),
        );

        let report = orchestrator.cleanup_wave_resources(&mut Managers::new());

        assert!(healthy_destroyed.get());
        assert_eq!(report.effects.cleaned, 2);
        assert_eq!(report.effects.failed, 1);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(orchestrator.state().persistent_effects, 0);
        assert!(report.verification.is_success());
    }

    #[test]
    fn test_timers_cancelled_before_effects_destroyed() {
        let order = Rc::new(RefCell::new(Vec::new()));

        struct Probe {
            order: Rc<RefCell<Vec<&'static str>>>,
        }

        impl TimerBackend for Probe {
            fn cancel(&mut self, _: TimerHandle, _: TimerKind) -> Result<(), TimerError> {
                self.order.borrow_mut().push("cancel");
                Ok(())
            }
        }

        let mut orchestrator = LifecycleOrchestrator::new(
            LifecycleConfig::default(),
            TimerRegistry::new(Probe {
                order: Rc::clone(&order),
            }),
        );
        orchestrator.timers_mut().register_timeout(TimerHandle(1));
        let log = Rc::clone(&order);
        orchestrator.register_persistent_effect(
            Box::new(Sprite::default()),
            EffectOptions::new("beam").with_cleanup(move || {
                log.borrow_mut().push("effect");
                Ok(())
            }),
        );
        let log = Rc::clone(&order);
        orchestrator.register_cleanup_callback(move || {
            log.borrow_mut().push("callback");
            Ok(())
        });

        orchestrator.cleanup_wave_resources(&mut Managers::new());
        assert_eq!(*order.borrow(), vec!["cancel", "effect", "callback"]);
    }

    #[test]
    fn test_rejected_timer_triggers_forced_cleanup() {
        struct Jammed;

        impl TimerBackend for Jammed {
            fn cancel(&mut self, handle: TimerHandle, kind: TimerKind) -> Result<(), TimerError> {
                Err(TimerError::CancelRejected {
                    handle,
                    kind,
                    reason: "jammed".into(),
                })
            }
        }

        let mut orchestrator =
            LifecycleOrchestrator::new(LifecycleConfig::default(), TimerRegistry::new(Jammed));
        orchestrator.timers_mut().register_interval(TimerHandle(7));

        let report = orchestrator.cleanup_wave_resources(&mut Managers::new());

        assert_eq!(report.after.timers.intervals, 1);
        assert!(matches!(
            report.verification,
            Verification::RecoveredByForce { .. }
        ));
        assert_eq!(report.forced.map(|f| f.timers_dropped.intervals), Some(1));
        assert!(orchestrator.state().is_empty());
    }

    #[test]
    fn test_unregistered_effect_is_not_destroyed_at_cleanup() {
        let mut orchestrator = LifecycleOrchestrator::default();
        let calls = Rc::new(Cell::new(0));
        let id = orchestrator.register_persistent_effect(
            Box::new(Sprite {
                destroy_calls: Rc::clone(&calls),
                ..Sprite::default()
            }),
            EffectOptions::new("nova"),
        );

        assert!(orchestrator.unregister_persistent_effect(id).is_some());
        assert!(orchestrator.unregister_persistent_effect(id).is_none());
        orchestrator.cleanup_wave_resources(&mut Managers::new());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_expired_effects_uses_registration_clock() {
        let mut orchestrator = LifecycleOrchestrator::default();
        orchestrator.set_clock_ms(1_000);
        let short = orchestrator.register_persistent_effect(
            Box::new(Sprite::default()),
            EffectOptions::new("flash").with_duration(200),
        );
        orchestrator.register_persistent_effect(Box::new(Sprite::default()), EffectOptions::new("aura"));

        assert!(orchestrator.expired_effects(1_100).is_empty());
        assert_eq!(orchestrator.expired_effects(1_200), vec![short]);
        assert_eq!(
            orchestrator.effect_metadata(short).map(|m| m.created_at_ms),
            Some(1_000)
        );
    }

    #[test]
    fn test_unregistered_callback_never_runs() {
        let mut orchestrator = LifecycleOrchestrator::default();
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let id = orchestrator.register_cleanup_callback(move || {
            flag.set(true);
            Ok(())
        });

        assert!(orchestrator.unregister_cleanup_callback(id));
        let report = orchestrator.cleanup_wave_resources(&mut Managers::new());
        assert!(!ran.get());
        assert_eq!(report.callbacks_run, 0);
    }

    #[test]
    fn test_log_state_reports_counts() {
        let mut orchestrator = LifecycleOrchestrator::new(
            LifecycleConfig {
                effect_watch_threshold: 1,
                timer_watch_threshold: 0,
            },
            TimerRegistry::new(SimTimers::new()),
        );
        orchestrator.register_persistent_effect(Box::new(Sprite::default()), EffectOptions::new("a"));
        orchestrator.register_persistent_effect(Box::new(Sprite::default()), EffectOptions::new("b"));
        orchestrator.timers_mut().schedule_timeout(10);

        let state = orchestrator.log_state();
        assert_eq!(state.persistent_effects, 2);
        assert_eq!(state.timers.timeouts, 1);
    }

    #[test]
    fn test_leak_watch_flags_exceeded_thresholds() {
        let mut orchestrator = LifecycleOrchestrator::new(
            LifecycleConfig {
                effect_watch_threshold: 1,
                timer_watch_threshold: 1,
            },
            TimerRegistry::new(SimTimers::new()),
        );
        orchestrator.register_persistent_effect(Box::new(Sprite::default()), EffectOptions::new("a"));
        orchestrator.timers_mut().schedule_timeout(10);
        assert_eq!(orchestrator.leak_watch(), LeakWatch::default());

        orchestrator.register_persistent_effect(Box::new(Sprite::default()), EffectOptions::new("b"));
        let watch = orchestrator.leak_watch();
        assert!(watch.effects_over);
        assert!(!watch.timers_over);

        orchestrator.timers_mut().schedule_interval(50);
        assert!(orchestrator.leak_watch().timers_over);

        orchestrator.cleanup_wave_resources(&mut Managers::new());
        assert!(!orchestrator.leak_watch().any());
    }

    #[test]
    fn test_forced_pass_destroys_after_failed_detach() {
        let mut orchestrator = LifecycleOrchestrator::default();
        let destroyed = Rc::new(Cell::new(false));
        orchestrator.register_persistent_effect(
            Box::new(Sprite {
                destroyed: Rc::clone(&destroyed),
                parent: true,
                fail_detach: true,
                ..Sprite::default()
            }),
            EffectOptions::new("tether"),
        );

        let forced = orchestrator.force_cleanup();

        assert!(destroyed.get());
        assert_eq!(forced.effects_dropped, 1);
        assert!(orchestrator.state().is_empty());
    }
}
