mod block;
mod chunk;
mod chunk_manager;
mod light;
mod mesh;
mod terrain_generator;
mod worker;

pub use block::{Block, BlockBuffer, TextureLayer};
pub use chunk::{ChunkMesh, ChunkShape, ChunkState, CHUNK_SIZE, CHUNK_SIZE_PADDED, SEA_LEVEL, WORLD_HEIGHT};
pub use chunk_manager::ChunkManager;
pub use light::{ao_factor, LightBuffer, LightChannel, LightVal, LightingEngine, MAX_LIGHT_VAL};
pub use mesh::{face_visible, visible_faces, BlockVertex, ChunkMeshRaw};
pub use terrain_generator::{generate_seed, Biome, ChunkGenerator, Column, TerrainGenerator};
pub use worker::{Job, JobError, JobId, JobKind, JobOutput, JobReturn, WorkerPool};
