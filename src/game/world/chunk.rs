use block_mesh::ndshape::ConstShape3u32;

use crate::engine::gpu::BufferHandle;

pub const CHUNK_SIZE: u32 = 16;
pub const CHUNK_SIZE_PADDED: u32 = CHUNK_SIZE + 2;
pub const WORLD_HEIGHT: u32 = 64;
pub const SEA_LEVEL: i32 = 26;

/// Padded chunk grid, `x` varies fastest.
pub type ChunkShape = ConstShape3u32<CHUNK_SIZE_PADDED, WORLD_HEIGHT, CHUNK_SIZE_PADDED>;

/// Where a chunk coordinate is in its lifecycle, as seen by the chunk manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkState {
    /// Nothing known about the coordinate.
    Unscheduled,
    TerrainPending,
    /// Voxels are loaded but no mesh job is running and no up to date mesh exists.
    Generated,
    MeshPending,
    /// The latest mesh has been applied. It may be empty.
    Renderable,
}

/// Uploaded mesh of a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkMesh {
    pub handle: BufferHandle,
    pub index_count: u32,
}

impl ChunkMesh {
    pub const fn new(handle: BufferHandle, index_count: u32) -> Self {
        Self { handle, index_count }
    }
}
