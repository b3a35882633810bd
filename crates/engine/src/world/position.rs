/// Absolute block (cell) position inside a world grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Pose of an entity: position in world units, yaw/pitch in degrees.
///
/// Plain value type; equality is exact field-wise comparison.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
    pub pitch: f64,
}

impl Location {
    pub const fn new(x: f64, y: f64, z: f64, yaw: f64, pitch: f64) -> Self {
        Self { x, y, z, yaw, pitch }
    }

    /// Euclidean distance from this position to the origin corner of a cell.
    pub fn distance_to(&self, pos: BlockPos) -> f64 {
        let dx = self.x - pos.x as f64;
        let dy = self.y - pos.y as f64;
        let dz = self.z - pos.z as f64;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn same_position(&self, other: &Location) -> bool {
        self.x == other.x && self.y == other.y && self.z == other.z
    }

    pub fn same_rotation(&self, other: &Location) -> bool {
        self.yaw == other.yaw && self.pitch == other.pitch
    }
}
