//! Uniform-grid spatial index for proximity queries.
//!
//! The world is split into square cells of `cell_size` units. Each indexed
//! entity lives in exactly one cell, derived from its last reported position
//! and clamped to the grid bounds, so entities outside the world collect in
//! the edge cells instead of being dropped.
//!
//! Queries scan the span of cells overlapping the query circle's bounding
//! box. [`SpatialIndex::query_range`] returns that candidate superset as-is;
//! [`SpatialIndex::query_closest`] and [`SpatialIndex::query_within`] filter
//! it by exact squared distance.
//!
//! # Determinism
//!
//! Cells are scanned in row-major order and each cell stores its members in
//! a `BTreeSet`, so candidate order (and therefore tie-breaking in
//! [`SpatialIndex::query_closest`]) only depends on positions and ids.
//!
//! # Example
//!
//! ```
//! use td_core::config::GridConfig;
//! use td_core::math::{Fixed, Vec2Fixed};
//! use td_core::spatial::{SpatialIndex, SpatialEntity};
//! use td_core::EntityId;
//!
//! struct Zombie { id: EntityId, pos: Vec2Fixed }
//!
//! impl SpatialEntity for Zombie {
//!     fn entity_id(&self) -> EntityId { self.id }
//!     fn position(&self) -> Vec2Fixed { self.pos }
//! }
//!
//! let mut index = SpatialIndex::new(GridConfig::default()).unwrap();
//! let zombie = Zombie { id: 1, pos: Vec2Fixed::from_ints(500, 400) };
//! index.insert(&zombie);
//!
//! let hit = index.query_closest(Vec2Fixed::from_ints(505, 405), Fixed::from_num(200), None);
//! assert_eq!(hit, Some(1));
//! ```

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::config::GridConfig;
use crate::error::Result;
use crate::math::{Fixed, Vec2Fixed};
use crate::EntityId;

/// Anything with a stable id and a world position.
///
/// The index never owns entities; it records the id and the position seen at
/// the last [`SpatialIndex::insert`] or [`SpatialIndex::update`].
pub trait SpatialEntity {
    /// Stable identifier.
    fn entity_id(&self) -> EntityId;
    /// Current world position.
    fn position(&self) -> Vec2Fixed;
}

/// Flattened cell index (`row * cols + col`).
pub type CellIndex = u32;

#[derive(Debug, Clone, Copy)]
struct IndexedEntry {
    cell: CellIndex,
    position: Vec2Fixed,
}

/// Introspection counters for a [`SpatialIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridStats {
    /// Indexed entities.
    pub entities: usize,
    /// Cells holding at least one entity.
    pub active_cells: usize,
    /// Cells in the full grid.
    pub total_cells: usize,
    /// Mean entities per active cell (0 when empty).
    pub average_occupancy: f64,
    /// Cell edge length in world units.
    pub cell_size: u32,
}

/// Uniform-grid spatial partition over world-space entities.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    config: GridConfig,
    cell_size: Fixed,
    cols: u32,
    rows: u32,
    /// Lazily created cells; removed again once empty.
    cells: HashMap<CellIndex, BTreeSet<EntityId>>,
    entries: HashMap<EntityId, IndexedEntry>,
}

impl SpatialIndex {
    /// Create an empty index.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::InvalidConfig`] for a zero cell size,
    /// an empty world, or a grid too large for a [`CellIndex`].
    pub fn new(config: GridConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cell_size: Fixed::from_num(config.cell_size),
            cols: config.cols(),
            rows: config.rows(),
            config,
            cells: HashMap::new(),
            entries: HashMap::new(),
        })
    }

    /// Grid configuration this index was built with.
    #[must_use]
    pub const fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Column/row of a world coordinate pair, clamped to the grid.
    #[must_use]
    pub fn cell_coords(&self, position: Vec2Fixed) -> (u32, u32) {
        (
            Self::axis_cell(position.x, self.cell_size, self.cols),
            Self::axis_cell(position.y, self.cell_size, self.rows),
        )
    }

    /// Flattened cell index of a world position.
    #[must_use]
    pub fn cell_of(&self, position: Vec2Fixed) -> CellIndex {
        let (col, row) = self.cell_coords(position);
        row * self.cols + col
    }

    fn axis_cell(value: Fixed, cell_size: Fixed, count: u32) -> u32 {
        let raw: i64 = (value / cell_size).floor().to_num();
        raw.clamp(0, i64::from(count) - 1) as u32
    }

    /// Add an entity at its current position.
    ///
    /// Inserting an id that is already indexed moves it instead, so an id is
    /// never associated with two cells.
    pub fn insert<E: SpatialEntity + ?Sized>(&mut self, entity: &E) {
        self.insert_at(entity.entity_id(), entity.position());
    }

    /// Add an id at an explicit position.
    pub fn insert_at(&mut self, id: EntityId, position: Vec2Fixed) {
        if self.entries.contains_key(&id) {
            self.update_at(id, position);
            return;
        }
        let cell = self.cell_of(position);
        self.cells.entry(cell).or_default().insert(id);
        self.entries.insert(id, IndexedEntry { cell, position });
    }

    /// Remove an entity. Returns `false` (and does nothing) if it was not indexed.
    pub fn remove(&mut self, id: EntityId) -> bool {
        let Some(entry) = self.entries.remove(&id) else {
            return false;
        };
        if let Some(members) = self.cells.get_mut(&entry.cell) {
            members.remove(&id);
            if members.is_empty() {
                self.cells.remove(&entry.cell);
            }
        }
        true
    }

    /// Re-bucket an entity after its position changed.
    ///
    /// The index does not observe mutation; owners must call this whenever a
    /// tracked entity moves. Unindexed entities are inserted.
    pub fn update<E: SpatialEntity + ?Sized>(&mut self, entity: &E) {
        self.update_at(entity.entity_id(), entity.position());
    }

    /// Re-bucket an id at an explicit position.
    pub fn update_at(&mut self, id: EntityId, position: Vec2Fixed) {
        let cell = self.cell_of(position);
        match self.entries.get_mut(&id) {
            Some(entry) if entry.cell == cell => entry.position = position,
            Some(_) => {
                self.remove(id);
                self.insert_at(id, position);
            }
            None => self.insert_at(id, position),
        }
    }

    /// Candidate ids from every cell overlapping the circle's bounding box.
    ///
    /// This is a cheap superset: entities outside `radius` but inside an
    /// overlapping cell are included. Callers needing exact membership
    /// should use [`Self::query_within`]. A negative radius is a caller bug
    /// and yields no candidates.
    #[must_use]
    pub fn query_range(&self, center: Vec2Fixed, radius: Fixed) -> Vec<EntityId> {
        let mut found = Vec::new();
        self.for_each_candidate(center, radius, |id, _| found.push(id));
        found
    }

    /// Ids whose recorded position lies within `radius` of `center`.
    #[must_use]
    pub fn query_within(&self, center: Vec2Fixed, radius: Fixed) -> Vec<EntityId> {
        let radius_sq = radius.saturating_mul(radius);
        let mut found = Vec::new();
        self.for_each_candidate(center, radius, |id, position| {
            if position.distance_squared(center) <= radius_sq {
                found.push(id);
            }
        });
        found
    }

    /// Closest candidate passing `filter`, if it lies within `radius`.
    ///
    /// Ties keep the first candidate in scan order.
    pub fn query_closest(
        &self,
        center: Vec2Fixed,
        radius: Fixed,
        mut filter: Option<&mut dyn FnMut(EntityId) -> bool>,
    ) -> Option<EntityId> {
        let radius_sq = radius.saturating_mul(radius);
        let mut best: Option<(EntityId, Fixed)> = None;

        self.for_each_candidate(center, radius, |id, position| {
            if let Some(filter) = filter.as_deref_mut() {
                if !filter(id) {
                    return;
                }
            }
            let dist_sq = position.distance_squared(center);
            let closer = best.map_or(true, |(_, best_sq)| dist_sq < best_sq);
            if closer {
                best = Some((id, dist_sq));
            }
        });

        best.filter(|&(_, dist_sq)| dist_sq <= radius_sq)
            .map(|(id, _)| id)
    }

    fn for_each_candidate(
        &self,
        center: Vec2Fixed,
        radius: Fixed,
        mut visit: impl FnMut(EntityId, Vec2Fixed),
    ) {
        if radius < Fixed::ZERO {
            tracing::warn!(radius = %radius, "Spatial query with negative radius ignored");
            return;
        }
        if self.entries.is_empty() {
            return;
        }

        let min = Vec2Fixed::new(
            center.x.saturating_sub(radius),
            center.y.saturating_sub(radius),
        );
        let max = Vec2Fixed::new(
            center.x.saturating_add(radius),
            center.y.saturating_add(radius),
        );
        let (min_col, min_row) = self.cell_coords(min);
        let (max_col, max_row) = self.cell_coords(max);

        for row in min_row..=max_row {
            for col in min_col..=max_col {
                let Some(members) = self.cells.get(&(row * self.cols + col)) else {
                    continue;
                };
                for &id in members {
                    if let Some(entry) = self.entries.get(&id) {
                        visit(id, entry.position);
                    }
                }
            }
        }
    }

    /// Last recorded position of an indexed entity.
    #[must_use]
    pub fn position_of(&self, id: EntityId) -> Option<Vec2Fixed> {
        self.entries.get(&id).map(|entry| entry.position)
    }

    /// Whether an id is indexed.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Drop every entity and cell.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.entries.clear();
    }

    /// Number of indexed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All indexed ids, sorted.
    #[must_use]
    pub fn all_entities(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Occupancy counters.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> GridStats {
        let entities = self.entries.len();
        let active_cells = self.cells.len();
        GridStats {
            entities,
            active_cells,
            total_cells: (self.cols * self.rows) as usize,
            average_occupancy: if active_cells == 0 {
                0.0
            } else {
                entities as f64 / active_cells as f64
            },
            cell_size: self.config.cell_size,
        }
    }

    /// Check that the id→cell and cell→ids maps agree.
    #[cfg(any(test, feature = "debug-validation"))]
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let members: usize = self.cells.values().map(BTreeSet::len).sum();
        members == self.entries.len()
            && self.cells.values().all(|set| !set.is_empty())
            && self.entries.iter().all(|(id, entry)| {
                entry.cell == self.cell_of(entry.position)
                    && self
                        .cells
                        .get(&entry.cell)
                        .is_some_and(|set| set.contains(id))
            })
    }
}
