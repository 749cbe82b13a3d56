//! # TD Core
//!
//! Entity simulation core for a tower-defense game.
//!
//! This crate contains **only** host-independent logic:
//! - No rendering
//! - No IO beyond loading config files
//! - No system randomness (queue shuffles are seeded)
//! - No floating-point positions (uses fixed-point)
//!
//! The host owns every instance and drives them once per frame, so the same
//! core runs under a renderer, a headless runner or a test harness.
//!
//! ## Crate Structure
//!
//! - [`spatial`] - Uniform-grid spatial index for range queries
//! - [`pool`] - Capacity-bounded object recycling
//! - [`timers`] - Timer handle registry and simulated timer backend
//! - [`spawning`] - Per-wave spawn queue
//! - [`lifecycle`] - Ordered, verified teardown at wave and game boundaries
//! - [`config`] - RON-loaded configuration
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod math;
pub mod pool;
pub mod spatial;
pub mod spawning;
pub mod timers;

/// Identifier of a simulated entity, assigned by the host.
pub type EntityId = u64;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{CoreConfig, GridConfig, LifecycleConfig, SchedulerConfig, WaveTable};
    pub use crate::error::{CoreError, DestroyError, ManagerRole, Result, TimerError};
    pub use crate::lifecycle::{
        CleanupReport, CleanupScope, EffectId, EffectOptions, LifecycleOrchestrator, Managers,
        Verification, VisualHandle,
    };
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::pool::{ObjectPool, PoolStats, PooledKey};
    pub use crate::spatial::{SpatialEntity, SpatialIndex};
    pub use crate::spawning::{
        DifficultyCurve, DifficultyScaling, EntityFactory, QueueOrder, SpawnGroup, SpawnScheduler,
        SpawnTick, Unscaled,
    };
    pub use crate::timers::{SimTimers, TimerBackend, TimerHandle, TimerKind, TimerRegistry};
    pub use crate::EntityId;
}
