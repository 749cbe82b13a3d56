//! Timed wave spawning.
//!
//! At wave start the scheduler expands the wave's spawn groups into a queue
//! of `(entity_type, due_at_ms)` entries, orders it according to
//! [`QueueOrder`], then drains it from the front as the wave clock advances.
//!
//! Draining stops at the first entry that is not yet due. With a shuffled
//! queue a late entry at the head therefore holds back earlier-due entries
//! behind it; [`QueueOrder::SortedByDue`] avoids that.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::{DifficultyConfig, SchedulerConfig, WaveTable};
use crate::error::Result;
use crate::math::{Fixed, Vec2Fixed};
use crate::EntityId;

/// A batch of identical entities released at a fixed interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnGroup {
    /// Entity type passed to the factory.
    pub entity_type: String,
    /// Base number of entities.
    pub count: u32,
    /// Base delay between consecutive releases.
    pub spawn_interval_ms: u64,
}

impl SpawnGroup {
    /// Create a group.
    pub fn new(entity_type: impl Into<String>, count: u32, spawn_interval_ms: u64) -> Self {
        Self {
            entity_type: entity_type.into(),
            count,
            spawn_interval_ms,
        }
    }
}

/// One pending release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpawnEntry {
    /// Entity type passed to the factory.
    pub entity_type: String,
    /// Wave clock time at which the entry becomes due.
    pub due_at_ms: u64,
}

/// Ordering applied to a freshly built queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QueueOrder {
    /// Shuffle whole entries. Types arrive mixed but due times are no longer
    /// monotonic, so a late entry at the head delays everything behind it.
    #[default]
    ShuffleEntries,
    /// Shuffle which type goes in each slot while keeping due times ascending.
    ShuffleTypes,
    /// Stable sort by due time, no randomness.
    SortedByDue,
}

/// Turns a group's base numbers into the numbers used for a given wave.
pub trait DifficultyScaling {
    /// Scaled `(count, spawn_interval_ms)` for `group` in `wave_number`.
    fn scale(&self, wave_number: u32, group: &SpawnGroup) -> (u32, u64);
}

/// Uses group numbers as written.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unscaled;

impl DifficultyScaling for Unscaled {
    fn scale(&self, _wave_number: u32, group: &SpawnGroup) -> (u32, u64) {
        (group.count, group.spawn_interval_ms)
    }
}

/// Linear per-wave growth in count and decay in interval.
///
/// Wave 1 is unscaled. For wave `n`, the count is multiplied by
/// `1 + growth * (n - 1)` and the interval by `1 - decay * (n - 1)`. Both
/// round to the nearest integer. The interval never drops below
/// `min_interval_ms` unless the base interval already does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyCurve {
    count_growth_per_wave: Fixed,
    interval_decay_per_wave: Fixed,
    min_interval_ms: u64,
}

impl From<DifficultyConfig> for DifficultyCurve {
    fn from(config: DifficultyConfig) -> Self {
        Self {
            count_growth_per_wave: config.count_growth_per_wave,
            interval_decay_per_wave: config.interval_decay_per_wave,
            min_interval_ms: config.min_interval_ms,
        }
    }
}

impl DifficultyScaling for DifficultyCurve {
    fn scale(&self, wave_number: u32, group: &SpawnGroup) -> (u32, u64) {
        let steps = Fixed::saturating_from_num(wave_number.saturating_sub(1));

        let count_factor = Fixed::ONE.saturating_add(self.count_growth_per_wave.saturating_mul(steps));
        let count = Fixed::saturating_from_num(group.count)
            .saturating_mul(count_factor)
            .saturating_round()
            .saturating_to_num::<u32>();

        let interval_factor = Fixed::ONE
            .saturating_sub(self.interval_decay_per_wave.saturating_mul(steps))
            .max(Fixed::ZERO);
        let scaled = Fixed::saturating_from_num(group.spawn_interval_ms)
            .saturating_mul(interval_factor)
            .saturating_round()
            .saturating_to_num::<u64>();
        let floor = self.min_interval_ms.min(group.spawn_interval_ms);

        (count, scaled.max(floor))
    }
}

/// Expand spawn groups into queue entries, groups in declaration order.
///
/// A group scaled to `(count, interval)` contributes `count` entries due at
/// `0, interval, 2 * interval, ...`.
pub fn build_queue(
    wave_number: u32,
    groups: &[SpawnGroup],
    scaling: &dyn DifficultyScaling,
) -> Vec<SpawnEntry> {
    let mut queue = Vec::new();
    for group in groups {
        let (count, interval) = scaling.scale(wave_number, group);
        queue.extend((0..u64::from(count)).map(|i| SpawnEntry {
            entity_type: group.entity_type.clone(),
            due_at_ms: i.saturating_mul(interval),
        }));
    }
    queue
}

/// Reorder a built queue in place according to `order`.
pub fn apply_order(queue: &mut [SpawnEntry], order: QueueOrder, rng: &mut ChaCha8Rng) {
    match order {
        QueueOrder::ShuffleEntries => queue.shuffle(rng),
        QueueOrder::ShuffleTypes => {
            let mut types: Vec<String> = queue.iter().map(|e| e.entity_type.clone()).collect();
            types.shuffle(rng);
            queue.sort_by_key(|e| e.due_at_ms);
            for (entry, entity_type) in queue.iter_mut().zip(types) {
                entry.entity_type = entity_type;
            }
        }
        QueueOrder::SortedByDue => queue.sort_by_key(|e| e.due_at_ms),
    }
}

/// Creates entities on behalf of the scheduler.
pub trait EntityFactory {
    /// Create an entity of `entity_type` at `spawn` for `wave`.
    ///
    /// Returns `None` when the type is unknown or creation failed; the
    /// entry still counts as released.
    fn create(&mut self, entity_type: &str, spawn: Vec2Fixed, wave: u32) -> Option<EntityId>;
}

/// One entry released by [`SpawnScheduler::tick`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpawnRelease {
    /// Released entity type.
    pub entity_type: String,
    /// Entity returned by the factory.
    pub entity: Option<EntityId>,
}

/// Result of a scheduler tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpawnTick {
    /// Entries released this tick, in release order.
    pub released: Vec<SpawnRelease>,
}

impl SpawnTick {
    /// Entities actually created this tick.
    pub fn created(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.released.iter().filter_map(|r| r.entity)
    }
}

/// Per-wave spawn queue driven by a millisecond clock.
#[derive(Debug, Clone)]
pub struct SpawnScheduler {
    config: SchedulerConfig,
    waves: WaveTable,
    current_wave: u32,
    clock_ms: u64,
    queue: VecDeque<SpawnEntry>,
}

impl SpawnScheduler {
    /// Create a scheduler. Fails if the wave table is invalid.
    pub fn new(config: SchedulerConfig, waves: WaveTable) -> Result<Self> {
        waves.validate()?;
        Ok(Self {
            config,
            waves,
            current_wave: 0,
            clock_ms: 0,
            queue: VecDeque::new(),
        })
    }

    /// Begin `wave_number`: reset the clock and rebuild the queue.
    ///
    /// Returns the number of queued entries. Any entries left from the
    /// previous wave are discarded.
    pub fn start_wave(&mut self, wave_number: u32, scaling: &dyn DifficultyScaling) -> Result<usize> {
        let groups = self.waves.groups_for(wave_number)?;
        let mut entries = build_queue(wave_number, groups, scaling);

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed ^ u64::from(wave_number));
        apply_order(&mut entries, self.config.queue_order, &mut rng);

        if !self.queue.is_empty() {
            tracing::debug!(
                discarded = self.queue.len(),
                wave = self.current_wave,
                "Discarding unreleased entries from previous wave"
            );
        }

        self.current_wave = wave_number;
        self.clock_ms = 0;
        self.queue = entries.into();

        tracing::info!(
            wave = wave_number,
            entries = self.queue.len(),
            order = ?self.config.queue_order,
            "Wave started"
        );
        Ok(self.queue.len())
    }

    /// Advance the wave clock and release every due entry at the head.
    pub fn tick(&mut self, delta_ms: u64, factory: &mut dyn EntityFactory) -> SpawnTick {
        self.clock_ms = self.clock_ms.saturating_add(delta_ms);

        let mut tick = SpawnTick::default();
        while self
            .queue
            .front()
            .is_some_and(|entry| entry.due_at_ms <= self.clock_ms)
        {
            let Some(entry) = self.queue.pop_front() else {
                break;
            };
            let entity = factory.create(&entry.entity_type, self.config.spawn_point, self.current_wave);
            if entity.is_none() {
                tracing::warn!(entity_type = %entry.entity_type, wave = self.current_wave, "Factory declined to create entity");
            }
            tick.released.push(SpawnRelease {
                entity_type: entry.entity_type,
                entity,
            });
        }

        if !tick.released.is_empty() {
            tracing::debug!(
                clock_ms = self.clock_ms,
                released = tick.released.len(),
                pending = self.queue.len(),
                "Spawn tick"
            );
        }
        tick
    }

    /// Whether every queued entry has been released.
    #[must_use]
    pub fn is_fully_released(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether the wave is released and none of its entities remain.
    #[must_use]
    pub fn is_wave_complete(&self, live_entities: usize) -> bool {
        self.is_fully_released() && live_entities == 0
    }

    /// Entries still queued.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Milliseconds since the current wave started.
    #[must_use]
    pub const fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    /// Current wave number, 0 before the first wave.
    #[must_use]
    pub const fn current_wave(&self) -> u32 {
        self.current_wave
    }

    /// Queued entries in release order.
    pub fn queue(&self) -> impl Iterator<Item = &SpawnEntry> {
        self.queue.iter()
    }

    /// Scheduler settings.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}
