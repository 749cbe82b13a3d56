//! Collaborator contracts used during teardown.
//!
//! Each manager role is its own trait so a host can supply any subset. The
//! orchestrator receives them bundled in [`Managers`], every field optional.

use crate::error::DestroyError;
use crate::EntityId;

/// A destroyable visual object owned by the rendering layer.
///
/// Implementations usually wrap shared scene-graph state, which means the
/// object can be destroyed by its owner while still registered as a
/// persistent effect. Cleanup checks [`Self::is_destroyed`] before calling
/// [`Self::destroy`].
pub trait VisualHandle {
    /// Whether the object has already been destroyed.
    fn is_destroyed(&self) -> bool;

    /// Whether the object is attached to a visual parent.
    fn has_parent(&self) -> bool {
        false
    }

    /// Remove the object from its visual parent.
    fn detach(&mut self) -> Result<(), DestroyError> {
        Ok(())
    }

    /// Release the object's resources.
    fn destroy(&mut self) -> Result<(), DestroyError>;
}

/// Owner of in-flight projectiles.
pub trait ProjectileSink {
    /// Remove every projectile.
    fn clear(&mut self) -> Result<(), DestroyError>;
}

/// Owner of transient visual effects.
pub trait EffectSink {
    /// Remove every effect.
    fn clear(&mut self) -> Result<(), DestroyError>;
}

/// Owner of particle emitters.
pub trait ParticleSink {
    /// Remove every particle.
    fn clear(&mut self) -> Result<(), DestroyError>;
}

/// Owner of live zombies.
pub trait ZombieSink {
    /// Remove every zombie.
    fn clear(&mut self) -> Result<(), DestroyError>;

    /// Blood-particle emitter owned by this manager, if any.
    fn blood_particles(&mut self) -> Option<&mut dyn ParticleSink> {
        None
    }
}

/// Owner of placed towers.
pub trait PlacementSink {
    /// Remove every placed tower.
    fn clear(&mut self) -> Result<(), DestroyError>;
}

/// Tower combat targeting state.
pub trait CombatSink {
    /// Replace the tracked tower list.
    fn set_towers(&mut self, towers: Vec<EntityId>) -> Result<(), DestroyError>;

    /// Replace the tracked zombie list.
    fn set_zombies(&mut self, zombies: Vec<EntityId>) -> Result<(), DestroyError>;
}

/// Wave progression state.
pub trait WaveSink {
    /// Return to the pre-game state.
    fn reset(&mut self) -> Result<(), DestroyError>;
}

/// Borrowed set of manager collaborators for one cleanup call.
#[derive(Default)]
pub struct Managers<'a> {
    /// Projectile manager.
    pub projectiles: Option<&'a mut dyn ProjectileSink>,
    /// Visual-effect manager.
    pub effects: Option<&'a mut dyn EffectSink>,
    /// Zombie manager.
    pub zombies: Option<&'a mut dyn ZombieSink>,
    /// Tower placement manager.
    pub placement: Option<&'a mut dyn PlacementSink>,
    /// Tower combat manager.
    pub combat: Option<&'a mut dyn CombatSink>,
    /// Wave manager.
    pub waves: Option<&'a mut dyn WaveSink>,
}

impl<'a> Managers<'a> {
    /// No collaborators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the projectile manager.
    pub fn with_projectiles(mut self, sink: &'a mut dyn ProjectileSink) -> Self {
        self.projectiles = Some(sink);
        self
    }

    /// Attach the visual-effect manager.
    pub fn with_effects(mut self, sink: &'a mut dyn EffectSink) -> Self {
        self.effects = Some(sink);
        self
    }

    /// Attach the zombie manager.
    pub fn with_zombies(mut self, sink: &'a mut dyn ZombieSink) -> Self {
        self.zombies = Some(sink);
        self
    }

    /// Attach the tower placement manager.
    pub fn with_placement(mut self, sink: &'a mut dyn PlacementSink) -> Self {
        self.placement = Some(sink);
        self
    }

    /// Attach the tower combat manager.
    pub fn with_combat(mut self, sink: &'a mut dyn CombatSink) -> Self {
        self.combat = Some(sink);
        self
    }

    /// Attach the wave manager.
    pub fn with_waves(mut self, sink: &'a mut dyn WaveSink) -> Self {
        self.waves = Some(sink);
        self
    }
}

impl std::fmt::Debug for Managers<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Managers")
            .field("projectiles", &self.projectiles.is_some())
            .field("effects", &self.effects.is_some())
            .field("zombies", &self.zombies.is_some())
            .field("placement", &self.placement.is_some())
            .field("combat", &self.combat.is_some())
            .field("waves", &self.waves.is_some())
            .finish()
    }
}
