use cgmath::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::game::world::{CHUNK_SIZE, WORLD_HEIGHT};

/// Horizontal coordinate of a chunk column. Chunks span the full world height, so there is no `y`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the given world block position.
    pub fn from_world(world_pos: &Vector3<i32>) -> Self {
        Self::new(
            world_pos.x.div_euclid(CHUNK_SIZE as i32),
            world_pos.z.div_euclid(CHUNK_SIZE as i32),
        )
    }

    /// Chunk the viewer is standing in.
    pub fn from_point(point: &Point3<f32>) -> Self {
        Self::new(
            (point.x / CHUNK_SIZE as f32).floor() as i32,
            (point.z / CHUNK_SIZE as f32).floor() as i32,
        )
    }

    /// Wraps at the `i32` edges.
    pub const fn offset(&self, dx: i32, dz: i32) -> Self {
        Self::new(self.x.wrapping_add(dx), self.z.wrapping_add(dz))
    }

    /// World position of the chunk's `(0, 0, 0)` block.
    pub fn origin(&self) -> Vector3<i32> {
        Vector3::new(
            self.x.wrapping_mul(CHUNK_SIZE as i32),
            0,
            self.z.wrapping_mul(CHUNK_SIZE as i32),
        )
    }

    /// The four horizontally adjacent chunks, paired with the side they are on.
    pub fn neighbours(&self) -> [(Side, ChunkPos); 4] {
        [
            (Side::West, self.offset(-1, 0)),
            (Side::East, self.offset(1, 0)),
            (Side::North, self.offset(0, -1)),
            (Side::South, self.offset(0, 1)),
        ]
    }

    /// Squared distance in chunk units.
    pub fn distance_sq(&self, other: &ChunkPos) -> i64 {
        let (dx, dz) = (self.x as i64 - other.x as i64, self.z as i64 - other.z as i64);
        dx.saturating_mul(dx).saturating_add(dz.saturating_mul(dz))
    }

    /// Squared world-space distance from the chunk's centre column to `point`, ignoring height.
    pub fn centre_distance_sq(&self, point: &Point3<f32>) -> f32 {
        let centre_x = (self.x as f32 + 0.5) * CHUNK_SIZE as f32;
        let centre_z = (self.z as f32 + 0.5) * CHUNK_SIZE as f32;

        (centre_x - point.x).powi(2) + (centre_z - point.z).powi(2)
    }
}

/// Horizontal side of a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    West,
    East,
    North,
    South,
}

impl Side {
    pub const fn opposite(&self) -> Self {
        match self {
            Side::West => Side::East,
            Side::East => Side::West,
            Side::North => Side::South,
            Side::South => Side::North,
        }
    }
}

/// Whether a local block position lies inside a chunk (unpadded coordinates).
pub fn in_chunk_bounds(in_chunk_pos: &Vector3<i32>) -> bool {
    (0..CHUNK_SIZE as i32).contains(&in_chunk_pos.x)
        && (0..WORLD_HEIGHT as i32).contains(&in_chunk_pos.y)
        && (0..CHUNK_SIZE as i32).contains(&in_chunk_pos.z)
}

/// Splits a world block position into its chunk and the local position inside it.
pub fn split_world_pos(world_pos: &Vector3<i32>) -> (ChunkPos, Vector3<i32>) {
    let chunk_pos = ChunkPos::from_world(world_pos);
    (chunk_pos, world_pos - chunk_pos.origin())
}

/// Local (unpadded) position to padded grid position.
#[inline]
pub fn padded(in_chunk_pos: &Vector3<i32>) -> Vector3<i32> {
    Vector3::new(in_chunk_pos.x + 1, in_chunk_pos.y, in_chunk_pos.z + 1)
}
