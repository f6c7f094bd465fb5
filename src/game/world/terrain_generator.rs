use cgmath::Vector3;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use rand::prelude::*;

use crate::{
    game::world::{Block, BlockBuffer, CHUNK_SIZE, CHUNK_SIZE_PADDED, SEA_LEVEL, WORLD_HEIGHT},
    misc::pos::ChunkPos,
};

const BIOME_SCALE: f64 = 0.003;
const BIOME_THRESHOLD: f64 = 0.1;
const BASE_SCALE: f64 = 0.005;
const DETAIL_SCALE: f64 = 0.04;
const MAIN_OCTAVES: usize = 5;
const MAIN_AMPLITUDE: f64 = WORLD_HEIGHT as f64 * 0.6;
const FLAT_BASE_HEIGHT: f64 = 20.0;
const EXPONENT: f64 = 2.5;

const TREE_SCALE: f64 = 0.2;
const TREE_PROBABILITY: f64 = 0.2;
const CACTUS_SCALE: f64 = 0.5;
const CACTUS_PROBABILITY: f64 = 0.15;
const VEGETATION_MARGIN: i32 = 2;
const LOG_HEIGHT: i32 = 4;
const CROWN_RADIUS: i32 = 2;

/// Produces the voxel grid of a chunk from its coordinate alone.
pub trait ChunkGenerator: Send + Sync {
    fn generate(&self, chunk_pos: ChunkPos) -> BlockBuffer;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Biome {
    Temperate,
    Desert,
}

/// Surface description of one world column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Column {
    /// Number of solid cells, the surface block sits at `height - 1`.
    pub height: i32,
    pub biome: Biome,
}

impl Column {
    pub const fn is_beach(&self) -> bool {
        matches!(self.biome, Biome::Temperate) && self.height <= SEA_LEVEL + 2
    }

    /// Block at height `y` after the solid and water passes, before vegetation.
    pub fn block_at(&self, y: i32) -> Block {
        let height = self.height;

        if y < height {
            match self.biome {
                Biome::Desert if y >= height - 3 => Block::Sand,
                Biome::Desert => Block::Stone,
                Biome::Temperate if self.is_beach() => {
                    if y >= height - 2 {
                        Block::Sand
                    } else {
                        Block::Stone
                    }
                }
                Biome::Temperate if y == height - 1 => Block::Grass,
                Biome::Temperate if y >= height - 4 => Block::Dirt,
                Biome::Temperate => Block::Stone,
            }
        } else if y <= SEA_LEVEL {
            Block::Water
        } else {
            Block::Air
        }
    }
}

#[derive(Clone, Debug)]
pub struct TerrainGenerator {
    seed: u32,
    biome_noise: Fbm<Perlin>,
    base_noise: Fbm<Perlin>,
    detail_noise: Perlin,
    tree_noise: Perlin,
    cactus_noise: Perlin,
    cactus_height_noise: Perlin,
}

impl TerrainGenerator {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            biome_noise: Fbm::<Perlin>::new(seed.wrapping_add(777)).set_octaves(2),
            base_noise: Fbm::<Perlin>::new(seed.wrapping_add(111)).set_octaves(MAIN_OCTAVES),
            detail_noise: Perlin::new(seed.wrapping_add(222)),
            cactus_noise: Perlin::new(seed.wrapping_add(888)),
            tree_noise: Perlin::new(seed.wrapping_add(999)),
            cactus_height_noise: Perlin::new(seed.wrapping_add(333)),
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn column(&self, world_x: i32, world_z: i32) -> Column {
        self.column_at(world_x as f64, world_z as f64)
    }

    fn column_at(&self, wx: f64, wz: f64) -> Column {
        let biome = if self.biome_noise.get([wx * BIOME_SCALE, wz * BIOME_SCALE]) > BIOME_THRESHOLD {
            Biome::Desert
        } else {
            Biome::Temperate
        };

        let combined = self.base_noise.get([wx * BASE_SCALE, wz * BASE_SCALE]) * 0.7
            + self.detail_noise.get([wx * DETAIL_SCALE, wz * DETAIL_SCALE]) * 0.3;
        let normalized = ((combined + 1.0) * 0.5).clamp(0.0, 1.0);
        let final_height = normalized.powf(EXPONENT) * MAIN_AMPLITUDE + FLAT_BASE_HEIGHT;

        let height = final_height.clamp(1.0, WORLD_HEIGHT as f64 - 3.0) as i32 + 3;

        Column { height, biome }
    }

    pub fn generate_blocks(&self, chunk_pos: &ChunkPos) -> BlockBuffer {
        let mut blocks = BlockBuffer::new_empty();
        // Wide enough for any chunk coordinate.
        let base_x = chunk_pos.x as i64 * CHUNK_SIZE as i64 - 1;
        let base_z = chunk_pos.z as i64 * CHUNK_SIZE as i64 - 1;
        let mut columns = Vec::with_capacity((CHUNK_SIZE_PADDED * CHUNK_SIZE_PADDED) as usize);

        for x in 0..CHUNK_SIZE_PADDED as i32 {
            for z in 0..CHUNK_SIZE_PADDED as i32 {
                let column = self.column_at((base_x + x as i64) as f64, (base_z + z as i64) as f64);
                for y in 0..WORLD_HEIGHT as i32 {
                    let block = column.block_at(y);
                    if !block.is_empty() {
                        blocks.set(&Vector3::new(x, y, z), block)
                    }
                }
                columns.push(column)
            }
        }

        for x in VEGETATION_MARGIN..=CHUNK_SIZE as i32 + 1 - VEGETATION_MARGIN {
            for z in VEGETATION_MARGIN..=CHUNK_SIZE as i32 + 1 - VEGETATION_MARGIN {
                let column = columns[(x * CHUNK_SIZE_PADDED as i32 + z) as usize];
                let y_surface = column.height - 1;
                if y_surface < SEA_LEVEL {
                    continue;
                }

                let (wx, wz) = ((base_x + x as i64) as f64, (base_z + z as i64) as f64);
                let surface = blocks[&Vector3::new(x, y_surface, z)];

                match (column.biome, surface) {
                    (Biome::Desert, Block::Sand) => {
                        let chance = (self.cactus_noise.get([wx * CACTUS_SCALE, wz * CACTUS_SCALE]) + 1.0) * 0.5;
                        if chance < CACTUS_PROBABILITY {
                            let height = self.cactus_height(wx, wz);
                            place_cactus(&mut blocks, x, z, y_surface, height)
                        }
                    }
                    (Biome::Temperate, Block::Grass) => {
                        let chance = (self.tree_noise.get([wx * TREE_SCALE, wz * TREE_SCALE]) + 1.0) * 0.5;
                        if chance < TREE_PROBABILITY {
                            place_tree(&mut blocks, x, z, y_surface)
                        }
                    }
                    _ => (),
                }
            }
        }

        blocks
    }

    fn cactus_height(&self, wx: f64, wz: f64) -> i32 {
        let n = (self.cactus_height_noise.get([wx * 0.37, wz * 0.37]) + 1.0) * 0.5;
        1 + (n.clamp(0.0, 0.999) * 3.0) as i32
    }
}

impl ChunkGenerator for TerrainGenerator {
    fn generate(&self, chunk_pos: ChunkPos) -> BlockBuffer {
        self.generate_blocks(&chunk_pos)
    }
}

/// Random world seed, used when the settings do not pin one.
pub fn generate_seed() -> u32 {
    thread_rng().gen()
}

fn place_if_empty(blocks: &mut BlockBuffer, pos: Vector3<i32>, block: Block) {
    if pos.y < WORLD_HEIGHT as i32 && blocks[&pos].is_empty() {
        blocks.set(&pos, block)
    }
}

fn place_cactus(blocks: &mut BlockBuffer, x: i32, z: i32, y_surface: i32, height: i32) {
    for y in y_surface + 1..=y_surface + height {
        place_if_empty(blocks, Vector3::new(x, y, z), Block::Cactus)
    }
}

fn place_tree(blocks: &mut BlockBuffer, x: i32, z: i32, y_surface: i32) {
    let top_log_y = y_surface + 1 + LOG_HEIGHT;

    for y in y_surface + 1..top_log_y {
        place_if_empty(blocks, Vector3::new(x, y, z), Block::OakLog)
    }

    for cy in top_log_y - 1..=top_log_y + 1 {
        let radius = if cy <= top_log_y { CROWN_RADIUS } else { 1 };

        for cx in x - radius..=x + radius {
            for cz in z - radius..=z + radius {
                // Leaves stay inside the chunk, neighbours get them through padding.
                let is_trunk = cx == x && cz == z;
                if !is_trunk && (1..=CHUNK_SIZE as i32).contains(&cx) && (1..=CHUNK_SIZE as i32).contains(&cz) {
                    place_if_empty(blocks, Vector3::new(cx, cy, cz), Block::Leaves)
                }
            }
        }
    }
}
