//! Configuration for the simulation core.
//!
//! Every section deserializes from RON and has a `Default`, so a config file
//! only needs to name the values it overrides.
//!
//! # Example RON
//!
//! ```ron
//! CoreConfig(
//!     grid: (world_width: 1024, world_height: 768, cell_size: 128),
//!     scheduler: (spawn_point: (x: 0.0, y: 384.0), queue_order: SortedByDue, seed: 7),
//!     waves: (waves: [
//!         (groups: [(entity_type: "Basic", count: 5, spawn_interval_ms: 1000)]),
//!     ]),
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::spawning::{QueueOrder, SpawnGroup};

/// Uniform grid dimensions, in world units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// World width.
    pub world_width: u32,
    /// World height.
    pub world_height: u32,
    /// Edge length of one square cell. Tune to the typical query radius.
    pub cell_size: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            world_width: 1024,
            world_height: 768,
            cell_size: 128,
        }
    }
}

impl GridConfig {
    /// Number of cell columns (at least 1).
    #[must_use]
    pub const fn cols(&self) -> u32 {
        if self.cell_size == 0 {
            return 1;
        }
        let cols = self.world_width.div_ceil(self.cell_size);
        if cols == 0 {
            1
        } else {
            cols
        }
    }

    /// Number of cell rows (at least 1).
    #[must_use]
    pub const fn rows(&self) -> u32 {
        if self.cell_size == 0 {
            return 1;
        }
        let rows = self.world_height.div_ceil(self.cell_size);
        if rows == 0 {
            1
        } else {
            rows
        }
    }

    /// Check the grid invariants.
    pub fn validate(&self) -> Result<()> {
        if self.cell_size == 0 {
            return Err(CoreError::InvalidConfig(
                "grid.cell_size must be greater than zero".into(),
            ));
        }
        if self.world_width == 0 || self.world_height == 0 {
            return Err(CoreError::InvalidConfig(format!(
                "grid world extent must be positive, got {}x{}",
                self.world_width, self.world_height
            )));
        }
        if i32::try_from(self.cell_size).is_err() {
            return Err(CoreError::InvalidConfig(format!(
                "grid.cell_size must be at most {}, got {}",
                i32::MAX,
                self.cell_size
            )));
        }
        let cells = u64::from(self.cols()) * u64::from(self.rows());
        if cells > u64::from(u32::MAX) {
            return Err(CoreError::InvalidConfig(format!(
                "grid has {cells} cells, more than the {} a cell index can address",
                u32::MAX
            )));
        }
        Ok(())
    }
}

/// Spawn scheduler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// World position handed to the entity factory for every release.
    pub spawn_point: Vec2Fixed,
    /// How the built queue is ordered before draining.
    pub queue_order: QueueOrder,
    /// Base seed for queue shuffling; mixed with the wave number.
    pub seed: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            spawn_point: Vec2Fixed::from_ints(0, 384),
            queue_order: QueueOrder::default(),
            seed: 0,
        }
    }
}

/// Leak watch thresholds for the lifecycle orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Warn when more persistent effects than this are registered.
    pub effect_watch_threshold: usize,
    /// Warn when more timers than this are registered.
    pub timer_watch_threshold: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            effect_watch_threshold: 50,
            timer_watch_threshold: 20,
        }
    }
}

/// Per-wave difficulty growth used by [`crate::spawning::DifficultyCurve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyConfig {
    /// Fractional count increase per wave after the first (0.1 = +10%).
    #[serde(with = "fixed_serde")]
    pub count_growth_per_wave: Fixed,
    /// Fractional interval decrease per wave after the first (0.05 = -5%).
    #[serde(with = "fixed_serde")]
    pub interval_decay_per_wave: Fixed,
    /// Intervals never shrink below this.
    pub min_interval_ms: u64,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            count_growth_per_wave: Fixed::from_num(0.1),
            interval_decay_per_wave: Fixed::from_num(0.05),
            min_interval_ms: 200,
        }
    }
}

/// Object pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum objects retained in the free list.
    pub max_size: usize,
    /// Objects created up front.
    pub prewarm: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 64,
            prewarm: 0,
        }
    }
}

/// Composition of a single wave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveDefinition {
    /// Spawn groups in declaration order.
    pub groups: Vec<SpawnGroup>,
}

/// Ordered list of wave definitions. Wave `n` (1-based) uses entry `n - 1`;
/// waves past the end reuse the last entry and rely on difficulty scaling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveTable {
    /// Wave definitions.
    pub waves: Vec<WaveDefinition>,
}

impl Default for WaveTable {
    fn default() -> Self {
        Self {
            waves: vec![
                WaveDefinition {
                    groups: vec![SpawnGroup::new("Basic", 5, 1000)],
                },
                WaveDefinition {
                    groups: vec![
                        SpawnGroup::new("Basic", 6, 900),
                        SpawnGroup::new("Fast", 3, 600),
                    ],
                },
                WaveDefinition {
                    groups: vec![
                        SpawnGroup::new("Basic", 8, 800),
                        SpawnGroup::new("Fast", 4, 500),
                        SpawnGroup::new("Tank", 1, 2000),
                    ],
                },
            ],
        }
    }
}

impl WaveTable {
    /// Groups for a 1-based wave number.
    ///
    /// Wave 0 is treated as wave 1.
    pub fn groups_for(&self, wave_number: u32) -> Result<&[SpawnGroup]> {
        let last = self
            .waves
            .len()
            .checked_sub(1)
            .ok_or(CoreError::UnknownWave(wave_number))?;
        let index = (wave_number.max(1) as usize - 1).min(last);
        Ok(&self.waves[index].groups)
    }

    /// Check the table invariants.
    pub fn validate(&self) -> Result<()> {
        if self.waves.is_empty() {
            return Err(CoreError::InvalidConfig(
                "wave table must contain at least one wave".into(),
            ));
        }
        for (index, wave) in self.waves.iter().enumerate() {
            for group in &wave.groups {
                if group.entity_type.is_empty() {
                    return Err(CoreError::InvalidConfig(format!(
                        "wave {} has a spawn group with an empty entity type",
                        index + 1
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Complete core configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Spatial grid.
    pub grid: GridConfig,
    /// Spawn scheduler.
    pub scheduler: SchedulerConfig,
    /// Lifecycle leak thresholds.
    pub lifecycle: LifecycleConfig,
    /// Difficulty curve.
    pub difficulty: DifficultyConfig,
    /// Wave composition.
    pub waves: WaveTable,
    /// Transient effect pool.
    pub pools: PoolConfig,
}

impl CoreConfig {
    /// Load and validate a config from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigLoad {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&contents, &path.display().to_string())
    }

    /// Parse and validate a config from a RON string.
    pub fn from_ron_str(contents: &str) -> Result<Self> {
        Self::parse(contents, "<inline>")
    }

    fn parse(contents: &str, origin: &str) -> Result<Self> {
        let config: Self = ron::from_str(contents).map_err(|source| CoreError::ConfigParse {
            path: origin.to_string(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(origin, waves = config.waves.waves.len(), "Loaded core config");
        Ok(config)
    }

    /// Check every section's invariants.
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        self.waves.validate()?;
        if self.difficulty.count_growth_per_wave < Fixed::ZERO {
            return Err(CoreError::InvalidConfig(
                "difficulty.count_growth_per_wave must not be negative".into(),
            ));
        }
        if self.difficulty.interval_decay_per_wave < Fixed::ZERO
            || self.difficulty.interval_decay_per_wave >= Fixed::ONE
        {
            return Err(CoreError::InvalidConfig(
                "difficulty.interval_decay_per_wave must be in [0, 1)".into(),
            ));
        }
        Ok(())
    }
}
