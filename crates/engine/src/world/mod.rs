pub mod block;
pub mod position;

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use block::BlockId;
use position::{BlockPos, Location};
use rayon::prelude::*;

/// Environment appearance attributes sent to clients that understand them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Appearance {
    pub texture_url: String,
    pub side_block: BlockId,
    pub edge_block: BlockId,
    pub side_level: i16,
    pub cloud_level: i16,
    pub max_view_distance: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Weather {
    #[default]
    Sunny = 0,
    Raining = 1,
    Snowing = 2,
}

impl Weather {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Weather::Sunny),
            1 => Some(Weather::Raining),
            2 => Some(Weather::Snowing),
            _ => None,
        }
    }
}

/// A bounded block grid with a spawn pose and environment attributes.
///
/// Blocks are stored flat in Y-Z-X order (x varies fastest), which is also the
/// order used for bulk transfer and on-disk storage. Every cell is an
/// `AtomicU8`, so reads and writes go through `&self` without a grid-wide lock.
pub struct World {
    name: String,
    width: usize,
    height: usize,
    depth: usize,
    blocks: Box<[AtomicU8]>,
    spawn: RwLock<Location>,
    appearance: RwLock<Appearance>,
    weather: AtomicU8,
    /// Set on every mutation, cleared by `take_dirty`.
    dirty: AtomicBool,
}

impl World {
    /// Create an all-air world. Spawn defaults to the horizontal center, on top.
    pub fn new(name: impl Into<String>, width: usize, height: usize, depth: usize) -> Self {
        let volume = width * height * depth;
        let blocks = (0..volume).map(|_| AtomicU8::new(BlockId::AIR.0)).collect();
        Self::with_blocks(name.into(), width, height, depth, blocks)
    }

    /// Build a world from raw block bytes in Y-Z-X order.
    /// Returns `None` if the byte count does not match the dimensions.
    pub fn from_blocks(
        name: impl Into<String>,
        width: usize,
        height: usize,
        depth: usize,
        blocks: Vec<u8>,
    ) -> Option<Self> {
        if blocks.len() != width * height * depth {
            tracing::debug!(
                "Block count {} does not match {}x{}x{}",
                blocks.len(),
                width,
                height,
                depth
            );
            return None;
        }
        let blocks = blocks.into_iter().map(AtomicU8::new).collect();
        Some(Self::with_blocks(name.into(), width, height, depth, blocks))
    }

    fn with_blocks(
        name: String,
        width: usize,
        height: usize,
        depth: usize,
        blocks: Box<[AtomicU8]>,
    ) -> Self {
        let spawn = Location::new(width as f64 / 2.0, height as f64, depth as f64 / 2.0, 0.0, 0.0);
        Self {
            name,
            width,
            height,
            depth,
            blocks,
            spawn: RwLock::new(spawn),
            appearance: RwLock::new(Appearance::default()),
            weather: AtomicU8::new(Weather::Sunny as u8),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn volume(&self) -> usize {
        self.blocks.len()
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        self.index(pos).is_some()
    }

    #[inline]
    fn index(&self, pos: BlockPos) -> Option<usize> {
        if pos.x < 0 || pos.y < 0 || pos.z < 0 {
            return None;
        }
        let (x, y, z) = (pos.x as usize, pos.y as usize, pos.z as usize);
        if x >= self.width || y >= self.height || z >= self.depth {
            return None;
        }
        Some((y * self.depth + z) * self.width + x)
    }

    /// Read a block. Returns AIR outside the grid.
    pub fn get_block(&self, pos: BlockPos) -> BlockId {
        match self.index(pos) {
            Some(i) => BlockId(self.blocks[i].load(Ordering::Relaxed)),
            None => BlockId::AIR,
        }
    }

    /// Write a block and return the previous value, or `None` outside the grid.
    /// Marks the world dirty for persistence.
    pub fn set_block(&self, pos: BlockPos, block: BlockId) -> Option<BlockId> {
        let i = self.index(pos)?;
        let old = self.blocks[i].swap(block.0, Ordering::Relaxed);
        self.dirty.store(true, Ordering::Release);
        Some(BlockId(old))
    }

    /// Copy out the whole grid, mapping each block through `map`.
    ///
    /// Large grids are split across the rayon pool.
    pub fn snapshot<F>(&self, map: F) -> Vec<u8>
    where
        F: Fn(BlockId) -> BlockId + Sync,
    {
        self.blocks
            .par_iter()
            .map(|b| map(BlockId(b.load(Ordering::Relaxed))).0)
            .collect()
    }

    pub fn spawn(&self) -> Location {
        *self.spawn.read().expect("world spawn poisoned")
    }

    pub fn set_spawn(&self, spawn: Location) {
        *self.spawn.write().expect("world spawn poisoned") = spawn;
        self.dirty.store(true, Ordering::Release);
    }

    pub fn appearance(&self) -> Appearance {
        self.appearance.read().expect("world appearance poisoned").clone()
    }

    pub fn set_appearance(&self, appearance: Appearance) {
        *self.appearance.write().expect("world appearance poisoned") = appearance;
    }

    pub fn weather(&self) -> Weather {
        Weather::from_u8(self.weather.load(Ordering::Relaxed)).unwrap_or_default()
    }

    pub fn set_weather(&self, weather: Weather) {
        self.weather.store(weather as u8, Ordering::Relaxed);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Flag unsaved changes, e.g. after a failed save.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Clear the dirty flag, returning whether it was set.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }
}
