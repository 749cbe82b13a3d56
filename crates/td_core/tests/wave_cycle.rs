//! End-to-end wave cycles: spawning, indexing, timers and teardown together.

use td_core::config::{CoreConfig, GridConfig, LifecycleConfig, SchedulerConfig, WaveDefinition, WaveTable};
use td_core::error::ManagerRole;
use td_core::lifecycle::{
    CleanupScope, CleanupTarget, EffectOptions, LifecycleOrchestrator, Managers, Verification,
};
use td_core::math::Fixed;
use td_core::spatial::SpatialIndex;
use td_core::spawning::{DifficultyCurve, QueueOrder, SpawnGroup, SpawnScheduler, Unscaled};
use td_core::timers::{SimTimers, TimerHandle, TimerRegistry};
use td_test_utils::fixtures::{
    call_log, pos, FailingTimerBackend, RecordingCombat, RecordingFactory, RecordingSink,
    RecordingZombies, SharedHandle, TestEntity,
};

#[test]
fn test_grid_scenario() {
    let mut index = SpatialIndex::new(GridConfig::default()).expect("default grid");
    index.insert(&TestEntity::at(7, 500, 400));

    assert_eq!(index.query_closest(pos(505, 405), Fixed::from_num(200), None), Some(7));
    assert_eq!(index.query_closest(pos(0, 0), Fixed::from_num(10), None), None);
}

#[test]
fn test_wave_cleanup_calls_each_manager_once() {
    let mut orchestrator = LifecycleOrchestrator::default();
    let mut probes = Vec::new();
    for kind in ["aura", "aura", "slow_field"] {
        let (handle, probe) = SharedHandle::new();
        orchestrator.register_persistent_effect(Box::new(handle.with_parent()), EffectOptions::new(kind));
        probes.push(probe);
    }
    orchestrator.timers_mut().schedule_interval(250);
    orchestrator.timers_mut().schedule_timeout(1_000);

    let mut projectiles = RecordingSink::default();
    let mut effects = RecordingSink::default();
    let mut zombies = RecordingZombies::default();
    let mut waves = RecordingSink::default();
    let report = {
        let mut managers = Managers::new()
            .with_projectiles(&mut projectiles)
            .with_effects(&mut effects)
            .with_zombies(&mut zombies)
            .with_waves(&mut waves);
        orchestrator.cleanup_wave_resources(&mut managers)
    };

    assert!(report.is_clean());
    assert!(orchestrator.state().is_empty());
    assert_eq!(orchestrator.timers().backend().pending_count(), 0);
    assert!(probes.iter().all(|p| p.is_destroyed() && p.was_detached()));
    assert_eq!(report.effects.by_kind.get("aura"), Some(&2));

    assert_eq!(projectiles.calls, 1);
    assert_eq!(effects.calls, 1);
    assert_eq!(zombies.blood.calls, 1);
    // Wave scope leaves zombies and wave progress alone.
    assert_eq!(zombies.calls, 0);
    assert_eq!(waves.calls, 0);
    assert_eq!(
        report.managers_cleared,
        vec![ManagerRole::Projectiles, ManagerRole::Effects, ManagerRole::BloodParticles]
    );
}

#[test]
fn test_game_cleanup_resets_every_manager() {
    let mut orchestrator = LifecycleOrchestrator::default();
    let log = call_log();

    let mut projectiles = RecordingSink::logging("projectiles", &log);
    let mut effects = RecordingSink::logging("effects", &log);
    let mut zombies = RecordingZombies::default();
    let mut placement = RecordingSink::logging("placement", &log);
    let mut combat = RecordingCombat::tracking(vec![1, 2], vec![3]);
    let mut waves = RecordingSink::logging("waves", &log);

    let report = {
        let mut managers = Managers::new()
            .with_projectiles(&mut projectiles)
            .with_effects(&mut effects)
            .with_zombies(&mut zombies)
            .with_placement(&mut placement)
            .with_combat(&mut combat)
            .with_waves(&mut waves);
        orchestrator.cleanup_game_resources(&mut managers)
    };

    assert_eq!(report.scope, CleanupScope::Game);
    assert!(report.is_clean());
    assert_eq!(zombies.calls, 1);
    assert_eq!(zombies.blood.calls, 1);
    assert!(combat.towers.is_empty() && combat.zombies.is_empty());
    assert_eq!((combat.tower_calls, combat.zombie_calls), (1, 1));
    assert_eq!(*log.borrow(), vec!["projectiles", "effects", "placement", "waves"]);
}

#[test]
fn test_cleanup_is_idempotent() {
    let mut orchestrator = LifecycleOrchestrator::default();
    let (handle, _probe) = SharedHandle::new();
    orchestrator.register_persistent_effect(Box::new(handle), EffectOptions::new("aura"));
    orchestrator.timers_mut().schedule_timeout(100);

    let first = orchestrator.cleanup_wave_resources(&mut Managers::new());
    let second = orchestrator.cleanup_wave_resources(&mut Managers::new());

    assert!(first.is_clean());
    assert!(second.is_clean());
    assert!(second.before.is_empty());
    assert_eq!(second.effects.cleaned, 0);
    assert_eq!(second.timers_cancelled.total(), 0);
    assert!(orchestrator.state().is_empty());
}

#[test]
fn test_already_destroyed_effect_is_not_destroyed_again() {
    let mut orchestrator = LifecycleOrchestrator::default();
    let (handle, probe) = SharedHandle::new();
    orchestrator.register_persistent_effect(Box::new(handle), EffectOptions::new("burn"));
    probe.mark_destroyed();

    let report = orchestrator.cleanup_wave_resources(&mut Managers::new());

    assert_eq!(probe.destroy_calls(), 0);
    assert_eq!(report.effects.cleaned, 1);
    assert_eq!(report.effects.already_destroyed, 1);
    assert_eq!(report.verification, Verification::Clean);
}

#[test]
fn test_failures_are_reported_and_cleanup_continues() {
    let mut orchestrator = LifecycleOrchestrator::default();
    let log = call_log();
    let (broken, broken_probe) = SharedHandle::new();
    let (healthy, healthy_probe) = SharedHandle::new();
    orchestrator.register_persistent_effect(
        Box::new(broken.failing_destroy().logging("broken", &log)),
        EffectOptions::new("aura"),
    );
    orchestrator.register_persistent_effect(
        Box::new(healthy.logging("healthy", &log)),
        EffectOptions::new("aura"),
    );

    let mut projectiles = RecordingSink::failing();
    let mut effects = RecordingSink::default();
    let report = {
        let mut managers = Managers::new()
            .with_projectiles(&mut projectiles)
            .with_effects(&mut effects);
        orchestrator.cleanup_wave_resources(&mut managers)
    };

    assert_eq!(*log.borrow(), vec!["destroy:broken", "destroy:healthy"]);
    assert!(!broken_probe.is_destroyed());
    assert!(healthy_probe.is_destroyed());
    assert_eq!(effects.calls, 1);
    assert_eq!(report.managers_cleared, vec![ManagerRole::Effects]);
    assert!(report
        .failures
        .iter()
        .any(|f| f.target == CleanupTarget::Manager(ManagerRole::Projectiles)));
    assert!(!report.is_clean());
    assert!(report.verification.is_success());
    assert!(orchestrator.state().is_empty());
}

#[test]
fn test_rejected_timers_recovered_by_forced_pass() {
    let backend = FailingTimerBackend::rejecting([TimerHandle(2)]);
    let mut orchestrator = LifecycleOrchestrator::new(LifecycleConfig::default(), TimerRegistry::new(backend));
    orchestrator.timers_mut().register_interval(TimerHandle(1));
    orchestrator.timers_mut().register_timeout(TimerHandle(2));

    let report = orchestrator.cleanup_wave_resources(&mut Managers::new());

    assert_eq!(report.timers_cancelled.intervals, 1);
    assert_eq!(report.after.timers.timeouts, 1);
    assert!(matches!(report.verification, Verification::RecoveredByForce { .. }));
    assert_eq!(report.forced.map(|f| f.timers_dropped.timeouts), Some(1));
    assert!(orchestrator.state().is_empty());
    assert_eq!(orchestrator.timers().backend().cancelled, vec![TimerHandle(1)]);
}

#[test]
fn test_every_cancel_rejected_still_empties_orchestrator() {
    let mut orchestrator =
        LifecycleOrchestrator::new(LifecycleConfig::default(), TimerRegistry::new(FailingTimerBackend::reject_all()));
    orchestrator.timers_mut().register_interval(TimerHandle(1));
    orchestrator.timers_mut().register_interval(TimerHandle(2));
    orchestrator.timers_mut().register_timeout(TimerHandle(3));
    let (aura, probe) = SharedHandle::new();
    orchestrator.register_persistent_effect(Box::new(aura), EffectOptions::new("aura"));

    let report = orchestrator.cleanup_game_resources(&mut Managers::new());

    assert_eq!(report.timers_cancelled.total(), 0);
    assert_eq!(report.after.timers.total(), 3);
    assert_eq!(report.effects.cleaned, 1);
    assert!(probe.is_destroyed());
    assert!(matches!(report.verification, Verification::RecoveredByForce { .. }));
    assert_eq!(report.forced.map(|f| f.timers_dropped.total()), Some(3));
    assert!(orchestrator.state().is_empty());
    assert!(orchestrator.timers().backend().cancelled.is_empty());
}

#[test]
fn test_declined_spawns_count_as_released() {
    let waves = WaveTable {
        waves: vec![WaveDefinition {
            groups: vec![SpawnGroup::new("Basic", 2, 500), SpawnGroup::new("Tank", 1, 0)],
        }],
    };
    let scheduler_config = SchedulerConfig {
        queue_order: QueueOrder::SortedByDue,
        ..SchedulerConfig::default()
    };
    let mut scheduler = SpawnScheduler::new(scheduler_config, waves).expect("scheduler");
    let mut factory = RecordingFactory::declining(["Tank"]);

    assert_eq!(scheduler.start_wave(1, &Unscaled).expect("wave"), 3);
    let tick = scheduler.tick(500, &mut factory);

    assert_eq!(tick.released.len(), 3);
    assert!(tick
        .released
        .iter()
        .any(|r| r.entity_type == "Tank" && r.entity.is_none()));
    let live: Vec<_> = tick.created().collect();
    assert_eq!(live.len(), 2);
    assert_eq!(factory.types(), vec!["Basic", "Basic"]);

    assert!(scheduler.is_fully_released());
    assert!(!scheduler.is_wave_complete(live.len()));
    assert!(scheduler.is_wave_complete(0));
}

#[test]
fn test_full_wave_cycle() {
    let config = CoreConfig {
        scheduler: SchedulerConfig {
            queue_order: QueueOrder::SortedByDue,
            ..SchedulerConfig::default()
        },
        waves: WaveTable {
            waves: vec![WaveDefinition {
                groups: vec![SpawnGroup::new("Basic", 3, 1000), SpawnGroup::new("Fast", 2, 400)],
            }],
        },
        ..CoreConfig::default()
    };
    config.validate().expect("valid config");

    let mut index = SpatialIndex::new(config.grid).expect("grid");
    let mut scheduler = SpawnScheduler::new(config.scheduler, config.waves.clone()).expect("scheduler");
    let mut orchestrator = LifecycleOrchestrator::new(config.lifecycle, TimerRegistry::new(SimTimers::new()));
    let mut factory = RecordingFactory::default();

    assert_eq!(scheduler.start_wave(1, &Unscaled).expect("wave"), 5);
    let mut live = Vec::new();
    for _ in 0..25 {
        let tick = scheduler.tick(100, &mut factory);
        for id in tick.created() {
            index.insert_at(id, config.scheduler.spawn_point);
            live.push(id);
        }
    }
    assert!(scheduler.is_fully_released());
    assert_eq!(factory.types(), vec!["Basic", "Fast", "Fast", "Basic", "Basic"]);
    assert!(factory.created.iter().all(|(_, spawn, wave)| *spawn == config.scheduler.spawn_point && *wave == 1));
    assert!(!scheduler.is_wave_complete(live.len()));

    for id in live.drain(..) {
        index.remove(id);
    }
    assert!(scheduler.is_wave_complete(live.len()));
    assert!(index.is_empty());

    let (aura, probe) = SharedHandle::new();
    orchestrator.register_persistent_effect(Box::new(aura), EffectOptions::new("aura"));
    let report = orchestrator.cleanup_wave_resources(&mut Managers::new());
    assert!(report.is_clean());
    assert!(probe.is_destroyed());

    let curve = DifficultyCurve::from(config.difficulty);
    assert!(scheduler.start_wave(2, &curve).expect("wave") >= 5);
}
