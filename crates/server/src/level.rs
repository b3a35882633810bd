//! A loaded level: the engine block grid plus the entities standing in it.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use classic_engine::world::block::BlockId;
use classic_engine::world::position::{BlockPos, Location};
use classic_engine::world::{Appearance, Weather, World};
use dashmap::DashMap;

use crate::block;
use crate::entity::Entity;
use crate::net::session::Session;

pub struct Level {
    world: World,
    entities: DashMap<u8, Arc<Entity>>,
    /// Stored rank requirements from the level file, kept for round-tripping.
    visit_permission: AtomicU8,
    build_permission: AtomicU8,
}

impl std::fmt::Debug for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Level").finish_non_exhaustive()
    }
}

impl Level {
    pub fn new(world: World) -> Self {
        Self {
            world,
            entities: DashMap::new(),
            visit_permission: AtomicU8::new(0),
            build_permission: AtomicU8::new(0),
        }
    }

    /// Flat level: bedrock floor, stone below the middle, grass at the middle.
    pub fn flat(name: impl Into<String>, width: usize, height: usize, depth: usize) -> Self {
        let world = World::new(name, width, height, depth);
        let surface = height / 2;
        for y in 0..=surface {
            let block = match y {
                0 => block::BEDROCK,
                y if y == surface => block::GRASS,
                y if y + 3 >= surface => block::DIRT,
                _ => block::STONE,
            };
            for z in 0..depth {
                for x in 0..width {
                    world.set_block(BlockPos::new(x as i32, y as i32, z as i32), block);
                }
            }
        }
        world.set_spawn(Location::new(
            width as f64 / 2.0,
            surface as f64 + 2.0,
            depth as f64 / 2.0,
            0.0,
            0.0,
        ));
        world.set_appearance(block::default_appearance(height));
        world.take_dirty();
        Self::new(world)
    }

    pub fn name(&self) -> &str {
        self.world.name()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn visit_permission(&self) -> u8 {
        self.visit_permission.load(Ordering::Relaxed)
    }

    pub fn build_permission(&self) -> u8 {
        self.build_permission.load(Ordering::Relaxed)
    }

    pub fn set_permissions(&self, visit: u8, build: u8) {
        self.visit_permission.store(visit, Ordering::Relaxed);
        self.build_permission.store(build, Ordering::Relaxed);
    }

    // ── Entities ─────────────────────────────────────────────────────────

    pub(crate) fn add_entity(&self, entity: &Arc<Entity>) {
        if let Some(id) = entity.id() {
            self.entities.insert(id, Arc::clone(entity));
        }
    }

    pub(crate) fn remove_entity(&self, entity: &Arc<Entity>) {
        if let Some(id) = entity.id() {
            self.entities
                .remove_if(&id, |_, present| Arc::ptr_eq(present, entity));
        }
    }

    pub fn entities(&self) -> Vec<Arc<Entity>> {
        self.entities
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Live sessions owning an entity in this level.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.entities
            .iter()
            .filter_map(|entry| entry.value().session())
            .collect()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Run movement synchronization for every entity present.
    pub fn update_entities(&self) {
        for entity in self.entities() {
            entity.update();
        }
    }

    // ── Blocks & environment ─────────────────────────────────────────────

    pub fn get_block(&self, pos: BlockPos) -> BlockId {
        self.world.get_block(pos)
    }

    /// Write a block; with `notify` every session in the level is sent the
    /// change. Returns `None` (and sends nothing) outside the grid.
    pub fn set_block(&self, pos: BlockPos, block: BlockId, notify: bool) -> Option<BlockId> {
        let previous = self.world.set_block(pos, block)?;
        if notify {
            for session in self.sessions() {
                session.send_block_change(pos, block);
            }
        }
        Some(previous)
    }

    pub fn set_spawn(&self, spawn: Location) {
        self.world.set_spawn(spawn);
    }

    pub fn set_appearance(&self, appearance: Appearance) {
        self.world.set_appearance(appearance.clone());
        for session in self.sessions() {
            session.send_appearance(&appearance);
        }
    }

    pub fn set_weather(&self, weather: Weather) {
        self.world.set_weather(weather);
        for session in self.sessions() {
            session.send_weather(weather);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_level_layers() {
        let level = Level::flat("flat", 8, 16, 8);
        assert_eq!(level.get_block(BlockPos::new(0, 0, 0)), block::BEDROCK);
        assert_eq!(level.get_block(BlockPos::new(3, 4, 3)), block::STONE);
        assert_eq!(level.get_block(BlockPos::new(3, 6, 3)), block::DIRT);
        assert_eq!(level.get_block(BlockPos::new(3, 8, 3)), block::GRASS);
        assert_eq!(level.get_block(BlockPos::new(3, 9, 3)), block::AIR);
        assert_eq!(level.world().spawn().y, 10.0);
        assert!(!level.world().is_dirty());
    }

    #[test]
    fn out_of_bounds_edits_are_dropped() {
        let level = Level::flat("flat", 4, 4, 4);
        assert_eq!(level.set_block(BlockPos::new(4, 0, 0), block::STONE, true), None);
        assert_eq!(level.set_block(BlockPos::new(0, -1, 0), block::STONE, true), None);
        assert!(!level.world().is_dirty());
    }
}
