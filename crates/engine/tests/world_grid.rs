//! Block grid tests. All block values are opaque `BlockId`s.

use classic_engine::world::block::BlockId;
use classic_engine::world::position::{BlockPos, Location};
use classic_engine::world::{Weather, World};

#[test]
fn new_world_is_air_and_clean() {
    let world = World::new("test", 8, 4, 6);
    assert_eq!(world.volume(), 8 * 4 * 6);
    assert_eq!(world.get_block(BlockPos::new(3, 2, 1)), BlockId::AIR);
    assert!(!world.is_dirty());
}

#[test]
fn set_and_get_round_trip() {
    let world = World::new("test", 8, 4, 6);
    let pos = BlockPos::new(7, 3, 5);
    assert_eq!(world.set_block(pos, BlockId(12)), Some(BlockId::AIR));
    assert_eq!(world.get_block(pos), BlockId(12));
    assert_eq!(world.set_block(pos, BlockId(1)), Some(BlockId(12)));
}

#[test]
fn out_of_bounds_reads_air_and_rejects_writes() {
    let world = World::new("test", 4, 4, 4);
    for pos in [
        BlockPos::new(-1, 0, 0),
        BlockPos::new(4, 0, 0),
        BlockPos::new(0, 4, 0),
        BlockPos::new(0, 0, 4),
    ] {
        assert!(!world.contains(pos));
        assert_eq!(world.get_block(pos), BlockId::AIR);
        assert_eq!(world.set_block(pos, BlockId(1)), None);
    }
    assert!(!world.is_dirty());
}

#[test]
fn dirty_flag_is_taken_once() {
    let world = World::new("test", 2, 2, 2);
    world.set_block(BlockPos::new(0, 0, 0), BlockId(3));
    assert!(world.take_dirty());
    assert!(!world.take_dirty());
}

#[test]
fn snapshot_uses_yzx_order_and_maps_blocks() {
    let world = World::new("test", 2, 2, 2);
    world.set_block(BlockPos::new(1, 0, 0), BlockId(5));
    world.set_block(BlockPos::new(0, 0, 1), BlockId(6));
    world.set_block(BlockPos::new(0, 1, 0), BlockId(60));

    let raw = world.snapshot(|b| b);
    assert_eq!(raw, vec![0, 5, 6, 0, 60, 0, 0, 0]);

    let mapped = world.snapshot(|b| if b.0 > 49 { BlockId(20) } else { b });
    assert_eq!(mapped[4], 20);
}

#[test]
fn from_blocks_validates_length() {
    assert!(World::from_blocks("bad", 2, 2, 2, vec![0; 7]).is_none());
    let world = World::from_blocks("ok", 2, 1, 1, vec![1, 2]).expect("valid dimensions");
    assert_eq!(world.get_block(BlockPos::new(1, 0, 0)), BlockId(2));
}

#[test]
fn environment_attributes() {
    let world = World::new("env", 16, 16, 16);
    assert_eq!(world.spawn(), Location::new(8.0, 16.0, 8.0, 0.0, 0.0));
    world.set_weather(Weather::Snowing);
    assert_eq!(world.weather(), Weather::Snowing);
    assert_eq!(Weather::from_u8(7), None);
}
