//! Headless host loop.
//!
//! Each tick runs, in order: spawn release, movement, tower targeting, then
//! timer and effect bookkeeping. Between waves the lifecycle orchestrator
//! tears down flashes, blood and the wave's aura; after the last wave it
//! resets everything.

use std::path::Path;

use td_core::config::CoreConfig;
use td_core::lifecycle::{EffectOptions, LifecycleOrchestrator, Managers, VisualHandle};
use td_core::spawning::{DifficultyCurve, SpawnScheduler};
use td_core::timers::{SimTimers, TimerHandle, TimerKind, TimerRegistry};

use crate::error::HeadlessError;
use crate::report::{CleanupSummary, RunReport, WaveReport};
use crate::world::{Aura, Combat, FlashEffects, Horde, Placement, WaveProgress};

/// How long a muzzle flash stays visible.
const FLASH_MS: u64 = 100;
/// Lifetime of the per-wave aura.
const AURA_MS: u64 = 3_000;
/// Period of the blood-particle decay timer.
const BLOOD_DECAY_MS: u64 = 250;

/// Loop parameters that are not part of the core config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    /// Waves to play.
    pub waves: u32,
    /// Fixed tick length.
    pub tick_ms: u64,
    /// A wave that has not completed after this long is abandoned.
    pub max_wave_ms: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            waves: 3,
            tick_ms: 50,
            max_wave_ms: 120_000,
        }
    }
}

impl RunSettings {
    /// Check the settings are usable.
    pub fn validate(&self) -> Result<(), HeadlessError> {
        if self.waves == 0 {
            return Err(HeadlessError::InvalidSettings("waves must be at least 1".into()));
        }
        if self.tick_ms == 0 {
            return Err(HeadlessError::InvalidSettings("tick_ms must be greater than 0".into()));
        }
        if self.max_wave_ms < self.tick_ms {
            return Err(HeadlessError::InvalidSettings(
                "max_wave_ms must cover at least one tick".into(),
            ));
        }
        Ok(())
    }
}

/// Load a config file, or the defaults when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<CoreConfig, HeadlessError> {
    let config = match path {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Owns one instance of every core component plus the host world.
#[derive(Debug)]
pub struct HeadlessRunner {
    config: CoreConfig,
    settings: RunSettings,
    scheduler: SpawnScheduler,
    curve: DifficultyCurve,
    orchestrator: LifecycleOrchestrator,
    horde: Horde,
    placement: Placement,
    combat: Combat,
    flashes: FlashEffects,
    progress: WaveProgress,
    now_ms: u64,
}

/// Counters for the wave in progress.
#[derive(Debug, Default)]
struct WaveTally {
    spawned: usize,
    killed: usize,
    leaked: usize,
    shots: usize,
    auras_expired: usize,
}

impl HeadlessRunner {
    /// Build every component from `config`.
    pub fn new(config: CoreConfig, settings: RunSettings) -> Result<Self, HeadlessError> {
        config.validate()?;
        settings.validate()?;

        let scheduler = SpawnScheduler::new(config.scheduler, config.waves.clone())?;
        let horde = Horde::new(config.grid)?;
        let placement = Placement::default_layout(&config.grid, config.scheduler.spawn_point.y);

        Ok(Self {
            curve: DifficultyCurve::from(config.difficulty),
            orchestrator: LifecycleOrchestrator::new(
                config.lifecycle,
                TimerRegistry::new(SimTimers::new()),
            ),
            flashes: FlashEffects::new(config.pools),
            combat: Combat::default(),
            progress: WaveProgress::default(),
            now_ms: 0,
            config,
            settings,
            scheduler,
            horde,
            placement,
        })
    }

    /// Play every wave, then tear the game down.
    pub fn run(mut self) -> Result<RunReport, HeadlessError> {
        tracing::info!(
            waves = self.settings.waves,
            tick_ms = self.settings.tick_ms,
            seed = self.config.scheduler.seed,
            "Starting headless run"
        );

        let mut waves = Vec::with_capacity(self.settings.waves as usize);
        for wave in 1..=self.settings.waves {
            waves.push(self.run_wave(wave)?);
        }

        let cleanup = {
            let mut managers = Managers::new()
                .with_effects(&mut self.flashes)
                .with_zombies(&mut self.horde)
                .with_placement(&mut self.placement)
                .with_combat(&mut self.combat)
                .with_waves(&mut self.progress);
            self.orchestrator.cleanup_game_resources(&mut managers)
        };

        let report = RunReport {
            seed: self.config.scheduler.seed,
            tick_ms: self.settings.tick_ms,
            queue_order: self.config.scheduler.queue_order,
            waves,
            game_cleanup: CleanupSummary::from(&cleanup),
            flash_pool: self.flashes.stats(),
            grid: self.horde.index().stats(),
        };
        tracing::info!(
            verified = report.all_cleanups_verified(),
            flashes = self.flashes.shown,
            "Headless run finished"
        );
        Ok(report)
    }

    fn run_wave(&mut self, wave: u32) -> Result<WaveReport, HeadlessError> {
        let queued = self.scheduler.start_wave(wave, &self.curve)?;
        self.progress.wave = wave;

        self.orchestrator.set_clock_ms(self.now_ms);
        let (aura, _) = Aura::attached();
        self.orchestrator.register_persistent_effect(
            Box::new(aura),
            EffectOptions::new("aura").with_duration(AURA_MS),
        );
        self.orchestrator.register_cleanup_callback(move || {
            tracing::debug!(wave, "Wave end hook");
            Ok(())
        });
        let decay = self.orchestrator.timers_mut().schedule_interval(BLOOD_DECAY_MS);

        let mut tally = WaveTally::default();
        while self.scheduler.clock_ms() < self.settings.max_wave_ms {
            self.step(decay, &mut tally);
            if self.scheduler.is_wave_complete(self.horde.len()) {
                break;
            }
        }

        let complete = self.scheduler.is_wave_complete(self.horde.len());
        if complete {
            self.progress.completed += 1;
        } else {
            tracing::warn!(
                wave,
                pending = self.scheduler.pending(),
                alive = self.horde.len(),
                "Wave hit the time limit"
            );
        }
        let remaining = self.horde.len();

        let cleanup = {
            let mut managers = Managers::new()
                .with_effects(&mut self.flashes)
                .with_zombies(&mut self.horde);
            self.orchestrator.cleanup_wave_resources(&mut managers)
        };

        tracing::info!(
            wave,
            spawned = tally.spawned,
            killed = tally.killed,
            leaked = tally.leaked,
            duration_ms = self.scheduler.clock_ms(),
            "Wave finished"
        );

        Ok(WaveReport {
            wave,
            queued,
            spawned: tally.spawned,
            killed: tally.killed,
            leaked: tally.leaked,
            remaining,
            shots: tally.shots,
            auras_expired: tally.auras_expired,
            duration_ms: self.scheduler.clock_ms(),
            complete,
            cleanup: CleanupSummary::from(&cleanup),
        })
    }

    fn step(&mut self, decay: TimerHandle, tally: &mut WaveTally) {
        self.now_ms += self.settings.tick_ms;

        let released = self.scheduler.tick(self.settings.tick_ms, &mut self.horde);
        tally.spawned += released.created().count();

        tally.leaked += self.horde.advance(self.settings.tick_ms);

        self.combat.track(self.placement.ids(), self.horde.ids());
        self.fire_towers(tally);

        for fired in self.orchestrator.timers_mut().advance_to(self.now_ms) {
            match fired.kind {
                TimerKind::Timeout => {
                    self.flashes.expire(fired.handle);
                }
                TimerKind::Interval if fired.handle == decay => self.horde.blood.decay(),
                TimerKind::Interval => {}
            }
        }

        self.orchestrator.set_clock_ms(self.now_ms);
        for id in self.orchestrator.expired_effects(self.now_ms) {
            if let Some(mut aura) = self.orchestrator.unregister_persistent_effect(id) {
                if let Err(error) = aura.destroy() {
                    tracing::warn!(?id, %error, "Expired aura failed to destroy");
                }
                tally.auras_expired += 1;
            }
        }
    }

    fn fire_towers(&mut self, tally: &mut WaveTally) {
        let combat = &self.combat;
        for tower in &mut self.placement.towers {
            if !combat.is_armed(tower.id) || self.now_ms < tower.ready_at_ms {
                continue;
            }
            let eligible: &mut dyn FnMut(u64) -> bool = &mut |id| combat.is_target(id);
            let target = self
                .horde
                .index()
                .query_closest(tower.position, tower.range, Some(eligible));
            let Some(target) = target else {
                continue;
            };

            tower.ready_at_ms = self.now_ms + tower.cooldown_ms;
            tally.shots += 1;
            if self.horde.hit(target, tower.damage) {
                tally.killed += 1;
            }
            let expiry = self.orchestrator.timers_mut().schedule_timeout(FLASH_MS);
            self.flashes.show(tower.id, tower.position, expiry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_validation() {
        assert!(RunSettings::default().validate().is_ok());
        assert!(RunSettings {
            waves: 0,
            ..RunSettings::default()
        }
        .validate()
        .is_err());
        assert!(RunSettings {
            tick_ms: 0,
            ..RunSettings::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_default_run_spawns_every_queued_entity() {
        let runner =
            HeadlessRunner::new(CoreConfig::default(), RunSettings::default()).expect("runner");
        let report = runner.run().expect("run");

        assert_eq!(report.waves.len(), 3);
        for wave in &report.waves {
            assert_eq!(wave.spawned, wave.queued);
            assert_eq!(wave.killed + wave.leaked + wave.remaining, wave.spawned);
            assert_eq!(wave.cleanup.timers_cancelled.intervals, 1);
        }
        assert!(report.all_cleanups_verified());
        assert_eq!(report.grid.entities, 0);
        assert_eq!(report.flash_pool.active, 0);
    }
}
