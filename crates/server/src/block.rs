//! Classic block ids, the CustomBlocks range, and the legacy fallback table.
//!
//! Ids 0..=49 are understood by every client. Ids 50..=65 exist only for
//! clients that negotiated CustomBlocks support level 1; everyone else gets
//! the visually closest legacy block instead.

use classic_engine::world::block::BlockId;
use classic_engine::world::Appearance;

pub const AIR: BlockId = BlockId(0);
pub const STONE: BlockId = BlockId(1);
pub const GRASS: BlockId = BlockId(2);
pub const DIRT: BlockId = BlockId(3);
pub const COBBLESTONE: BlockId = BlockId(4);
pub const PLANKS: BlockId = BlockId(5);
pub const BEDROCK: BlockId = BlockId(7);
pub const ACTIVE_WATER: BlockId = BlockId(8);
pub const WATER: BlockId = BlockId(9);
pub const ACTIVE_LAVA: BlockId = BlockId(10);
pub const LAVA: BlockId = BlockId(11);
pub const SAND: BlockId = BlockId(12);
pub const GLASS: BlockId = BlockId(20);
pub const GREEN_WOOL: BlockId = BlockId(25);
pub const CYAN_WOOL: BlockId = BlockId(28);
pub const BLUE_WOOL: BlockId = BlockId(29);
pub const PINK_WOOL: BlockId = BlockId(33);
pub const WHITE_WOOL: BlockId = BlockId(36);
pub const BROWN_MUSHROOM: BlockId = BlockId(39);
pub const IRON_BLOCK: BlockId = BlockId(42);
pub const SLAB: BlockId = BlockId(44);
pub const OBSIDIAN: BlockId = BlockId(49);

// -- CustomBlocks level 1 --
pub const COBBLESTONE_SLAB: BlockId = BlockId(50);
pub const ROPE: BlockId = BlockId(51);
pub const SANDSTONE: BlockId = BlockId(52);
pub const SNOW: BlockId = BlockId(53);
pub const FIRE: BlockId = BlockId(54);
pub const LIGHT_PINK_WOOL: BlockId = BlockId(55);
pub const FOREST_GREEN_WOOL: BlockId = BlockId(56);
pub const BROWN_WOOL: BlockId = BlockId(57);
pub const DEEP_BLUE: BlockId = BlockId(58);
pub const TURQUOISE: BlockId = BlockId(59);
pub const ICE: BlockId = BlockId(60);
pub const CERAMIC_TILE: BlockId = BlockId(61);
pub const MAGMA: BlockId = BlockId(62);
pub const PILLAR: BlockId = BlockId(63);
pub const CRATE: BlockId = BlockId(64);
pub const STONE_BRICK: BlockId = BlockId(65);

/// Highest id every client understands.
pub const MAX_LEGACY: BlockId = OBSIDIAN;
/// Highest id at CustomBlocks support level 1.
pub const MAX_CUSTOM: BlockId = STONE_BRICK;

/// Custom block support level this server implements.
pub const CUSTOM_BLOCK_SUPPORT_LEVEL: u8 = 1;

/// Highest placeable id for a client at the given CustomBlocks level.
pub fn max_for_level(support_level: u8) -> BlockId {
    if support_level >= 1 { MAX_CUSTOM } else { MAX_LEGACY }
}

/// Visually closest legacy block for an extended id. Legacy ids map to themselves.
pub fn fallback(id: BlockId) -> BlockId {
    match id {
        COBBLESTONE_SLAB => SLAB,
        ROPE => BROWN_MUSHROOM,
        SANDSTONE => SAND,
        SNOW => AIR,
        FIRE => ACTIVE_LAVA,
        LIGHT_PINK_WOOL => PINK_WOOL,
        FOREST_GREEN_WOOL => GREEN_WOOL,
        BROWN_WOOL => DIRT,
        DEEP_BLUE => BLUE_WOOL,
        TURQUOISE => CYAN_WOOL,
        ICE => GLASS,
        CERAMIC_TILE => IRON_BLOCK,
        MAGMA => OBSIDIAN,
        PILLAR => WHITE_WOOL,
        CRATE => PLANKS,
        STONE_BRICK => STONE,
        other if other > MAX_CUSTOM => AIR,
        other => other,
    }
}

/// Blocks the default rank may not place.
pub fn is_place_restricted(id: BlockId) -> bool {
    matches!(id, BEDROCK | ACTIVE_WATER | WATER | ACTIVE_LAVA | LAVA)
}

/// Blocks the default rank may not break.
pub fn is_break_restricted(id: BlockId) -> bool {
    id == BEDROCK
}

/// Default environment for a freshly created level of the given height.
pub fn default_appearance(height: usize) -> Appearance {
    Appearance {
        texture_url: String::new(),
        side_block: BEDROCK,
        edge_block: ACTIVE_WATER,
        side_level: (height / 2) as i16,
        cloud_level: (height + 2) as i16,
        max_view_distance: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_ids_map_to_themselves() {
        for id in 0..=MAX_LEGACY.0 {
            assert_eq!(fallback(BlockId(id)), BlockId(id));
        }
    }

    #[test]
    fn custom_ids_map_into_legacy_range() {
        for id in COBBLESTONE_SLAB.0..=MAX_CUSTOM.0 {
            assert!(fallback(BlockId(id)) <= MAX_LEGACY, "id {} not remapped", id);
        }
        assert_eq!(fallback(ICE), GLASS);
        assert_eq!(fallback(BlockId(200)), AIR);
    }

    #[test]
    fn placement_limits_follow_support_level() {
        assert_eq!(max_for_level(0), OBSIDIAN);
        assert_eq!(max_for_level(1), STONE_BRICK);
    }
}
