//! Minimal host-side world: zombies, towers, muzzle flashes and auras.
//!
//! Each type implements the core collaborator trait for its role, so the
//! runner can hand them straight to the lifecycle orchestrator.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use td_core::config::{GridConfig, PoolConfig};
use td_core::error::{CoreError, DestroyError};
use td_core::lifecycle::{
    CombatSink, EffectSink, ParticleSink, PlacementSink, VisualHandle, WaveSink, ZombieSink,
};
use td_core::math::{Fixed, Vec2Fixed};
use td_core::pool::{ObjectPool, PoolStats, PooledKey};
use td_core::spatial::{SpatialEntity, SpatialIndex};
use td_core::spawning::EntityFactory;
use td_core::timers::TimerHandle;
use td_core::EntityId;

/// Blood particles emitted per kill.
const BLOOD_PER_KILL: usize = 4;

/// Movement speed (units per second) and health for a zombie type.
fn archetype(entity_type: &str) -> Option<(i32, u32)> {
    match entity_type {
        "Basic" => Some((40, 2)),
        "Fast" => Some((80, 1)),
        "Tank" => Some((20, 6)),
        _ => None,
    }
}

/// A walking zombie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zombie {
    /// Entity id.
    pub id: EntityId,
    /// Zombie type from the wave table.
    pub entity_type: String,
    /// World position.
    pub position: Vec2Fixed,
    /// Units per second.
    pub speed: Fixed,
    /// Remaining hit points.
    pub health: u32,
}

impl SpatialEntity for Zombie {
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Vec2Fixed {
        self.position
    }
}

/// Blood-particle emitter owned by the horde.
#[derive(Debug, Default)]
pub struct BloodParticles {
    /// Particles currently alive.
    pub live: usize,
    /// Particles emitted over the run.
    pub emitted: usize,
}

impl BloodParticles {
    /// Halve the live particle count.
    pub fn decay(&mut self) {
        self.live /= 2;
    }
}

impl ParticleSink for BloodParticles {
    fn clear(&mut self) -> Result<(), DestroyError> {
        self.live = 0;
        Ok(())
    }
}

/// All live zombies plus the spatial index that tracks them.
#[derive(Debug)]
pub struct Horde {
    zombies: BTreeMap<EntityId, Zombie>,
    index: SpatialIndex,
    goal_x: Fixed,
    next_id: EntityId,
    /// Kill splatter.
    pub blood: BloodParticles,
}

impl Horde {
    /// Empty horde walking towards the right edge of the world.
    pub fn new(grid: GridConfig) -> Result<Self, CoreError> {
        Ok(Self {
            zombies: BTreeMap::new(),
            index: SpatialIndex::new(grid)?,
            goal_x: Fixed::saturating_from_num(grid.world_width),
            next_id: 0,
            blood: BloodParticles::default(),
        })
    }

    /// Live zombie count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.zombies.len()
    }

    /// Whether no zombies are alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zombies.is_empty()
    }

    /// Spatial index over live zombies.
    #[must_use]
    pub const fn index(&self) -> &SpatialIndex {
        &self.index
    }

    /// Ids of live zombies in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.zombies.keys().copied().collect()
    }

    /// Move every zombie `dt_ms` along its lane. Returns how many reached
    /// the far edge; those are removed.
    pub fn advance(&mut self, dt_ms: u64) -> usize {
        let dt = Fixed::saturating_from_num(dt_ms) / Fixed::from_num(1000);
        let mut arrived = Vec::new();

        for zombie in self.zombies.values_mut() {
            let goal = Vec2Fixed::new(self.goal_x, zombie.position.y);
            zombie.position = zombie.position.step_towards(goal, zombie.speed.saturating_mul(dt));
            if zombie.position.x >= self.goal_x {
                arrived.push(zombie.id);
            } else {
                self.index.update(&*zombie);
            }
        }

        for id in &arrived {
            self.zombies.remove(id);
            self.index.remove(*id);
            tracing::debug!(id, "Zombie reached the edge");
        }
        arrived.len()
    }

    /// Apply `damage`. Returns `true` if the zombie died.
    pub fn hit(&mut self, id: EntityId, damage: u32) -> bool {
        let Some(zombie) = self.zombies.get_mut(&id) else {
            return false;
        };
        zombie.health = zombie.health.saturating_sub(damage);
        if zombie.health > 0 {
            return false;
        }
        self.zombies.remove(&id);
        self.index.remove(id);
        self.blood.live += BLOOD_PER_KILL;
        self.blood.emitted += BLOOD_PER_KILL;
        true
    }
}

impl EntityFactory for Horde {
    fn create(&mut self, entity_type: &str, spawn: Vec2Fixed, wave: u32) -> Option<EntityId> {
        let (speed, health) = archetype(entity_type)?;
        self.next_id += 1;
        let zombie = Zombie {
            id: self.next_id,
            entity_type: entity_type.to_string(),
            position: spawn,
            speed: Fixed::from_num(speed),
            health,
        };
        self.index.insert(&zombie);
        tracing::trace!(id = zombie.id, entity_type, wave, "Zombie spawned");
        self.zombies.insert(zombie.id, zombie);
        Some(self.next_id)
    }
}

impl ZombieSink for Horde {
    fn clear(&mut self) -> Result<(), DestroyError> {
        self.zombies.clear();
        self.index.clear();
        Ok(())
    }

    fn blood_particles(&mut self) -> Option<&mut dyn ParticleSink> {
        Some(&mut self.blood)
    }
}

/// A placed tower.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tower {
    /// Entity id.
    pub id: EntityId,
    /// World position.
    pub position: Vec2Fixed,
    /// Targeting radius.
    pub range: Fixed,
    /// Delay between shots.
    pub cooldown_ms: u64,
    /// Damage per shot.
    pub damage: u32,
    /// Clock time of the next allowed shot.
    pub ready_at_ms: u64,
}

/// Placed towers.
#[derive(Debug, Default)]
pub struct Placement {
    /// Towers in placement order.
    pub towers: Vec<Tower>,
}

impl Placement {
    /// Three towers flanking the spawn lane of `grid`.
    #[must_use]
    pub fn default_layout(grid: &GridConfig, lane_y: Fixed) -> Self {
        let quarter = Fixed::saturating_from_num(grid.world_width) / Fixed::from_num(4);
        let offset = Fixed::from_num(80);
        let towers = (1..=3_u64)
            .map(|i| {
                let y = if i % 2 == 0 {
                    lane_y.saturating_add(offset)
                } else {
                    lane_y.saturating_sub(offset)
                };
                Tower {
                    id: 10_000 + i,
                    position: Vec2Fixed::new(quarter * Fixed::from_num(i), y),
                    range: Fixed::from_num(160),
                    cooldown_ms: 400,
                    damage: 1,
                    ready_at_ms: 0,
                }
            })
            .collect();
        Self { towers }
    }

    /// Tower ids in placement order.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.towers.iter().map(|t| t.id).collect()
    }
}

impl PlacementSink for Placement {
    fn clear(&mut self) -> Result<(), DestroyError> {
        self.towers.clear();
        Ok(())
    }
}

/// Combat bookkeeping: which towers and zombies targeting considers.
#[derive(Debug, Default)]
pub struct Combat {
    /// Towers allowed to fire.
    pub towers: Vec<EntityId>,
    /// Zombies allowed as targets.
    pub zombies: Vec<EntityId>,
}

impl Combat {
    /// Whether `tower` may fire.
    #[must_use]
    pub fn is_armed(&self, tower: EntityId) -> bool {
        self.towers.contains(&tower)
    }

    /// Whether `zombie` may be targeted.
    #[must_use]
    pub fn is_target(&self, zombie: EntityId) -> bool {
        self.zombies.binary_search(&zombie).is_ok()
    }
}

impl Combat {
    /// Replace both tracked lists.
    pub fn track(&mut self, towers: Vec<EntityId>, mut zombies: Vec<EntityId>) {
        zombies.sort_unstable();
        self.towers = towers;
        self.zombies = zombies;
    }
}

impl CombatSink for Combat {
    fn set_towers(&mut self, towers: Vec<EntityId>) -> Result<(), DestroyError> {
        self.towers = towers;
        Ok(())
    }

    fn set_zombies(&mut self, mut zombies: Vec<EntityId>) -> Result<(), DestroyError> {
        zombies.sort_unstable();
        self.zombies = zombies;
        Ok(())
    }
}

/// Short-lived shot effect drawn from a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MuzzleFlash {
    /// Firing tower.
    pub tower: EntityId,
    /// Where it is drawn.
    pub position: Vec2Fixed,
    /// Whether it is on screen.
    pub visible: bool,
}

/// Pooled muzzle flashes keyed by their expiry timer.
#[derive(Debug)]
pub struct FlashEffects {
    pool: ObjectPool<MuzzleFlash>,
    live: BTreeMap<TimerHandle, PooledKey>,
    /// Flashes shown over the run.
    pub shown: usize,
}

impl FlashEffects {
    /// Pool sized by `config`.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        let mut pool = ObjectPool::new(
            MuzzleFlash::default,
            |flash: &mut MuzzleFlash| *flash = MuzzleFlash::default(),
            config.max_size,
        );
        pool.prewarm(config.prewarm);
        Self {
            pool,
            live: BTreeMap::new(),
            shown: 0,
        }
    }

    /// Show a flash until `expiry` fires.
    pub fn show(&mut self, tower: EntityId, position: Vec2Fixed, expiry: TimerHandle) {
        let key = self.pool.acquire_with(|flash| {
            flash.tower = tower;
            flash.position = position;
            flash.visible = true;
        });
        self.live.insert(expiry, key);
        self.shown += 1;
    }

    /// Hide the flash bound to `expiry`. Returns `false` for unknown timers.
    pub fn expire(&mut self, expiry: TimerHandle) -> bool {
        self.live
            .remove(&expiry)
            .is_some_and(|key| self.pool.release(key))
    }

    /// Flashes on screen.
    #[must_use]
    pub fn visible(&self) -> usize {
        self.live.len()
    }

    /// Pool accounting.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl EffectSink for FlashEffects {
    fn clear(&mut self) -> Result<(), DestroyError> {
        for (_, key) in std::mem::take(&mut self.live) {
            self.pool.release(key);
        }
        Ok(())
    }
}

/// Persistent area effect drawn under the tower line.
#[derive(Debug)]
pub struct Aura {
    destroyed: Rc<Cell<bool>>,
    attached: bool,
}

impl Aura {
    /// A freshly attached aura and a flag observing its destruction.
    #[must_use]
    pub fn attached() -> (Self, Rc<Cell<bool>>) {
        let destroyed = Rc::new(Cell::new(false));
        (
            Self {
                destroyed: Rc::clone(&destroyed),
                attached: true,
            },
            destroyed,
        )
    }
}

impl VisualHandle for Aura {
    fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    fn has_parent(&self) -> bool {
        self.attached
    }

    fn detach(&mut self) -> Result<(), DestroyError> {
        self.attached = false;
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), DestroyError> {
        if self.destroyed.replace(true) {
            return Err(DestroyError::AlreadyDestroyed);
        }
        Ok(())
    }
}

/// Wave progression as seen by the host.
#[derive(Debug, Default)]
pub struct WaveProgress {
    /// Current wave, 0 before the first.
    pub wave: u32,
    /// Waves finished.
    pub completed: u32,
}

impl WaveSink for WaveProgress {
    fn reset(&mut self) -> Result<(), DestroyError> {
        *self = Self::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn horde() -> Horde {
        Horde::new(GridConfig::default()).expect("default grid")
    }

    #[test]
    fn test_unknown_type_is_declined() {
        let mut horde = horde();
        assert_eq!(horde.create("Dragon", Vec2Fixed::ZERO, 1), None);
        assert!(horde.is_empty());
    }

    #[test]
    fn test_zombies_walk_to_the_edge() {
        let mut horde = horde();
        let id = horde
            .create("Fast", Vec2Fixed::from_ints(1000, 384), 1)
            .expect("known type");

        assert_eq!(horde.advance(100), 0);
        assert!(horde.index().contains(id));
        assert_eq!(horde.advance(1000), 1);
        assert!(horde.is_empty());
        assert!(horde.index().is_empty());
    }

    #[test]
    fn test_kill_emits_blood_and_unindexes() {
        let mut horde = horde();
        let id = horde
            .create("Basic", Vec2Fixed::from_ints(10, 10), 1)
            .expect("known type");

        assert!(!horde.hit(id, 1));
        assert!(horde.hit(id, 1));
        assert!(!horde.index().contains(id));
        assert_eq!(horde.blood.live, BLOOD_PER_KILL);
        assert!(!horde.hit(id, 1));
    }

    #[test]
    fn test_flash_expiry_returns_to_pool() {
        let mut flashes = FlashEffects::new(PoolConfig::default());
        flashes.show(1, Vec2Fixed::ZERO, TimerHandle(5));
        assert_eq!(flashes.visible(), 1);

        assert!(flashes.expire(TimerHandle(5)));
        assert!(!flashes.expire(TimerHandle(5)));
        assert_eq!(flashes.stats().available, 1);
    }

    #[test]
    fn test_aura_double_destroy_reports_error() {
        let (mut aura, destroyed) = Aura::attached();
        assert!(aura.destroy().is_ok());
        assert!(destroyed.get());
        assert_eq!(aura.destroy(), Err(DestroyError::AlreadyDestroyed));
    }
}
