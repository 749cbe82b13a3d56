//! Proptest strategies for core types.

use proptest::prelude::*;
use td_core::math::{Fixed, Vec2Fixed};
use td_core::spawning::SpawnGroup;
use td_core::EntityId;

/// Default world width used by the strategies.
pub const WORLD_WIDTH: i32 = 1024;
/// Default world height used by the strategies.
pub const WORLD_HEIGHT: i32 = 768;

/// Generate a position inside the default world, with a fractional part.
pub fn arb_world_position() -> impl Strategy<Value = Vec2Fixed> {
    (0..WORLD_WIDTH * 4, 0..WORLD_HEIGHT * 4).prop_map(|(x, y)| {
        let four = Fixed::from_num(4);
        Vec2Fixed::new(Fixed::from_num(x) / four, Fixed::from_num(y) / four)
    })
}

/// Generate a position up to 256 units outside the default world.
pub fn arb_any_position() -> impl Strategy<Value = Vec2Fixed> {
    (-256..WORLD_WIDTH + 256, -256..WORLD_HEIGHT + 256)
        .prop_map(|(x, y)| Vec2Fixed::from_ints(x, y))
}

/// Generate a query radius (0-400).
pub fn arb_radius() -> impl Strategy<Value = Fixed> {
    (0i32..400i32).prop_map(Fixed::from_num)
}

/// Generate entities with unique ids inside the default world.
pub fn arb_entities(max: usize) -> impl Strategy<Value = Vec<(EntityId, Vec2Fixed)>> {
    proptest::collection::vec(arb_world_position(), 0..max).prop_map(|positions| {
        positions
            .into_iter()
            .enumerate()
            .map(|(i, p)| (i as EntityId + 1, p))
            .collect()
    })
}

/// Generate a spawn group with a small count.
pub fn arb_spawn_group() -> impl Strategy<Value = SpawnGroup> {
    (
        prop_oneof![Just("Basic"), Just("Fast"), Just("Tank")],
        0u32..12u32,
        0u64..2000u64,
    )
        .prop_map(|(entity_type, count, interval)| SpawnGroup::new(entity_type, count, interval))
}

/// Generate a wave's spawn groups.
pub fn arb_spawn_groups(max_groups: usize) -> impl Strategy<Value = Vec<SpawnGroup>> {
    proptest::collection::vec(arb_spawn_group(), 1..max_groups)
}
