//! Test fixtures and helpers.
//!
//! Recording stand-ins for every collaborator the core talks to, so tests can
//! assert what was called, how often and in which order.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

use td_core::error::{DestroyError, TimerError};
use td_core::lifecycle::{
    CombatSink, EffectSink, ParticleSink, PlacementSink, ProjectileSink, VisualHandle, WaveSink,
    ZombieSink,
};
use td_core::math::Vec2Fixed;
use td_core::spatial::SpatialEntity;
use td_core::spawning::EntityFactory;
use td_core::timers::{TimerBackend, TimerHandle, TimerKind};
use td_core::EntityId;

/// Create an integer position.
#[must_use]
pub fn pos(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(x, y)
}

/// Minimal positioned entity for spatial index tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestEntity {
    /// Entity id.
    pub id: EntityId,
    /// World position.
    pub position: Vec2Fixed,
}

impl TestEntity {
    /// Entity `id` at integer coordinates.
    #[must_use]
    pub fn at(id: EntityId, x: i32, y: i32) -> Self {
        Self {
            id,
            position: pos(x, y),
        }
    }
}

impl SpatialEntity for TestEntity {
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Vec2Fixed {
        self.position
    }
}

/// Shared, ordered record of collaborator calls.
pub type CallLog = Rc<RefCell<Vec<String>>>;

/// Create an empty call log.
#[must_use]
pub fn call_log() -> CallLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Observer side of a [`SharedHandle`].
#[derive(Debug, Clone, Default)]
pub struct HandleProbe {
    destroyed: Rc<Cell<bool>>,
    detached: Rc<Cell<bool>>,
    destroy_calls: Rc<Cell<u32>>,
}

impl HandleProbe {
    /// Whether the handle is destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Whether `detach` was called.
    #[must_use]
    pub fn was_detached(&self) -> bool {
        self.detached.get()
    }

    /// Number of `destroy` calls, successful or not.
    #[must_use]
    pub fn destroy_calls(&self) -> u32 {
        self.destroy_calls.get()
    }

    /// Destroy the object from outside, as its owner would.
    pub fn mark_destroyed(&self) {
        self.destroyed.set(true);
    }
}

/// Visual handle whose state is observable after the orchestrator takes it.
#[derive(Debug, Default)]
pub struct SharedHandle {
    probe: HandleProbe,
    parent: bool,
    fail_destroy: bool,
    log: Option<(String, CallLog)>,
}

impl SharedHandle {
    /// A live, unparented handle and its probe.
    #[must_use]
    pub fn new() -> (Self, HandleProbe) {
        let handle = Self::default();
        let probe = handle.probe.clone();
        (handle, probe)
    }

    /// Attach to a visual parent.
    #[must_use]
    pub fn with_parent(mut self) -> Self {
        self.parent = true;
        self
    }

    /// Make every `destroy` call fail.
    #[must_use]
    pub fn failing_destroy(mut self) -> Self {
        self.fail_destroy = true;
        self
    }

    /// Append `"destroy:<label>"` to `log` on every destroy.
    #[must_use]
    pub fn logging(mut self, label: impl Into<String>, log: &CallLog) -> Self {
        self.log = Some((label.into(), Rc::clone(log)));
        self
    }
}

impl VisualHandle for SharedHandle {
    fn is_destroyed(&self) -> bool {
        self.probe.destroyed.get()
    }

    fn has_parent(&self) -> bool {
        self.parent
    }

    fn detach(&mut self) -> Result<(), DestroyError> {
        self.parent = false;
        self.probe.detached.set(true);
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), DestroyError> {
        self.probe.destroy_calls.set(self.probe.destroy_calls.get() + 1);
        if let Some((label, log)) = &self.log {
            log.borrow_mut().push(format!("destroy:{label}"));
        }
        if self.fail_destroy {
            return Err(DestroyError::DestroyFailed("handle refused destroy".into()));
        }
        self.probe.destroyed.set(true);
        Ok(())
    }
}

/// Manager stand-in that counts `clear`/`reset` calls.
#[derive(Debug, Default)]
pub struct RecordingSink {
    /// Calls received.
    pub calls: u32,
    /// Fail every call.
    pub fail: bool,
    log: Option<(String, CallLog)>,
}

impl RecordingSink {
    /// A sink that fails every call.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Append `"<label>"` to `log` on every call.
    #[must_use]
    pub fn logging(label: impl Into<String>, log: &CallLog) -> Self {
        Self {
            log: Some((label.into(), Rc::clone(log))),
            ..Self::default()
        }
    }

    fn record(&mut self) -> Result<(), DestroyError> {
        self.calls += 1;
        if let Some((label, log)) = &self.log {
            log.borrow_mut().push(label.clone());
        }
        if self.fail {
            return Err(DestroyError::CallbackFailed("sink refused".into()));
        }
        Ok(())
    }
}

impl ProjectileSink for RecordingSink {
    fn clear(&mut self) -> Result<(), DestroyError> {
        self.record()
    }
}

impl EffectSink for RecordingSink {
    fn clear(&mut self) -> Result<(), DestroyError> {
        self.record()
    }
}

impl ParticleSink for RecordingSink {
    fn clear(&mut self) -> Result<(), DestroyError> {
        self.record()
    }
}

impl PlacementSink for RecordingSink {
    fn clear(&mut self) -> Result<(), DestroyError> {
        self.record()
    }
}

impl WaveSink for RecordingSink {
    fn reset(&mut self) -> Result<(), DestroyError> {
        self.record()
    }
}

/// Zombie manager stand-in owning a blood-particle emitter.
#[derive(Debug, Default)]
pub struct RecordingZombies {
    /// `clear` calls received.
    pub calls: u32,
    /// Owned blood-particle emitter.
    pub blood: RecordingSink,
}

impl ZombieSink for RecordingZombies {
    fn clear(&mut self) -> Result<(), DestroyError> {
        self.calls += 1;
        Ok(())
    }

    fn blood_particles(&mut self) -> Option<&mut dyn ParticleSink> {
        Some(&mut self.blood)
    }
}

/// Combat manager stand-in tracking the lists it was given.
#[derive(Debug)]
pub struct RecordingCombat {
    /// Current tower list.
    pub towers: Vec<EntityId>,
    /// Current zombie list.
    pub zombies: Vec<EntityId>,
    /// `set_towers` calls received.
    pub tower_calls: u32,
    /// `set_zombies` calls received.
    pub zombie_calls: u32,
}

impl RecordingCombat {
    /// A combat manager already tracking some entities.
    #[must_use]
    pub fn tracking(towers: Vec<EntityId>, zombies: Vec<EntityId>) -> Self {
        Self {
            towers,
            zombies,
            tower_calls: 0,
            zombie_calls: 0,
        }
    }
}

impl CombatSink for RecordingCombat {
    fn set_towers(&mut self, towers: Vec<EntityId>) -> Result<(), DestroyError> {
        self.tower_calls += 1;
        self.towers = towers;
        Ok(())
    }

    fn set_zombies(&mut self, zombies: Vec<EntityId>) -> Result<(), DestroyError> {
        self.zombie_calls += 1;
        self.zombies = zombies;
        Ok(())
    }
}

/// Timer backend that refuses to cancel selected handles.
#[derive(Debug, Default)]
pub struct FailingTimerBackend {
    reject_all: bool,
    rejected: BTreeSet<TimerHandle>,
    /// Handles successfully cancelled, in call order.
    pub cancelled: Vec<TimerHandle>,
}

impl FailingTimerBackend {
    /// Reject every cancel.
    #[must_use]
    pub fn reject_all() -> Self {
        Self {
            reject_all: true,
            ..Self::default()
        }
    }

    /// Reject cancels for `handles` only.
    #[must_use]
    pub fn rejecting(handles: impl IntoIterator<Item = TimerHandle>) -> Self {
        Self {
            rejected: handles.into_iter().collect(),
            ..Self::default()
        }
    }
}

impl TimerBackend for FailingTimerBackend {
    fn cancel(&mut self, handle: TimerHandle, kind: TimerKind) -> Result<(), TimerError> {
        if self.reject_all || self.rejected.contains(&handle) {
            tracing::debug!(?handle, ?kind, "Test backend rejecting cancel");
            return Err(TimerError::CancelRejected {
                handle,
                kind,
                reason: "rejected by test backend".into(),
            });
        }
        self.cancelled.push(handle);
        Ok(())
    }
}

/// Entity factory that hands out sequential ids and records every call.
#[derive(Debug, Default)]
pub struct RecordingFactory {
    next_id: EntityId,
    unknown: BTreeSet<String>,
    /// `(entity_type, spawn, wave)` for every successful creation.
    pub created: Vec<(String, Vec2Fixed, u32)>,
}

impl RecordingFactory {
    /// A factory that declines the given entity types.
    #[must_use]
    pub fn declining<S: Into<String>>(types: impl IntoIterator<Item = S>) -> Self {
        Self {
            unknown: types.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Entity types created, in order.
    #[must_use]
    pub fn types(&self) -> Vec<&str> {
        self.created.iter().map(|(t, _, _)| t.as_str()).collect()
    }
}

impl EntityFactory for RecordingFactory {
    fn create(&mut self, entity_type: &str, spawn: Vec2Fixed, wave: u32) -> Option<EntityId> {
        if self.unknown.contains(entity_type) {
            return None;
        }
        self.next_id += 1;
        self.created.push((entity_type.to_string(), spawn, wave));
        Some(self.next_id)
    }
}
