//! Error types for the simulation core.
//!
//! Only construction and configuration failures surface as [`CoreError`].
//! Runtime misuse (releasing an unknown pool key, querying with a negative
//! radius, unregistering a timer twice) is a logged no-op, and teardown
//! failures are collected into a [`crate::lifecycle::CleanupReport`] as
//! [`DestroyError`] values instead of being propagated.

use thiserror::Error;

use crate::timers::{TimerHandle, TimerKind};

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Top-level error type for construction and configuration failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A configuration value violates an invariant.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to read a configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ConfigLoad {
        /// Path to the file.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a RON configuration file.
    #[error("Failed to parse config file '{path}': {source}")]
    ConfigParse {
        /// Path to the file.
        path: String,
        /// Underlying parse error.
        #[source]
        source: ron::error::SpannedError,
    },

    /// Wave table lookup failed.
    #[error("No wave definition for wave {0}")]
    UnknownWave(u32),
}

/// Manager role, used to attribute teardown failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum ManagerRole {
    /// Projectile manager.
    Projectiles,
    /// Visual-effect manager.
    Effects,
    /// Zombie manager.
    Zombies,
    /// Blood-particle sub-manager owned by the zombie manager.
    BloodParticles,
    /// Tower placement manager.
    Placement,
    /// Tower combat manager.
    Combat,
    /// Wave manager.
    Waves,
}

impl std::fmt::Display for ManagerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Projectiles => "projectiles",
            Self::Effects => "effects",
            Self::Zombies => "zombies",
            Self::BloodParticles => "blood_particles",
            Self::Placement => "placement",
            Self::Combat => "combat",
            Self::Waves => "waves",
        };
        f.write_str(name)
    }
}

/// Failure of a single teardown step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DestroyError {
    /// The handle was already destroyed by its owner.
    #[error("handle already destroyed")]
    AlreadyDestroyed,

    /// Detaching the handle from its visual parent failed.
    #[error("detach from parent failed: {0}")]
    DetachFailed(String),

    /// Destroying the handle failed.
    #[error("destroy failed: {0}")]
    DestroyFailed(String),

    /// A cleanup callback reported a failure.
    #[error("cleanup callback failed: {0}")]
    CallbackFailed(String),

    /// A manager collaborator failed to clear or reset.
    #[error("manager '{role}' failed: {message}")]
    ManagerFailed {
        /// Which manager failed.
        role: ManagerRole,
        /// Failure description.
        message: String,
    },
}

/// Failure reported by a [`crate::timers::TimerBackend`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    /// The backend refused to cancel a timer it may still be running.
    #[error("backend rejected cancellation of {kind:?} {handle:?}: {reason}")]
    CancelRejected {
        /// Handle that could not be cancelled.
        handle: TimerHandle,
        /// Kind of the timer.
        kind: TimerKind,
        /// Backend-supplied reason.
        reason: String,
    },
}
