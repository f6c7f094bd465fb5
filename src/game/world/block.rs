use std::{iter, ops::Index};

use block_mesh::ndshape::ConstShape;
use cgmath::Vector3;
use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

use crate::{
    engine::face::FaceDirection,
    game::world::{ChunkShape, CHUNK_SIZE_PADDED, WORLD_HEIGHT},
    misc::pos::Side,
};

/// Layer in the block texture array.
pub type TextureLayer = u32;

pub const GRASS_TOP: TextureLayer = 0;
pub const GRASS_SIDE: TextureLayer = 1;
pub const DIRT: TextureLayer = 2;
pub const STONE: TextureLayer = 3;
pub const LOG_SIDE: TextureLayer = 4;
pub const LOG_TOP: TextureLayer = 5;
pub const LEAVES: TextureLayer = 6;
pub const SAND: TextureLayer = 7;
pub const CACTUS_SIDE: TextureLayer = 8;
pub const CACTUS_TOP: TextureLayer = 9;
pub const WATER: TextureLayer = 11;

#[repr(i8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
pub enum Block {
    #[default]
    Air = -1,
    Grass = 0,
    Dirt = 1,
    Stone = 2,
    OakLog = 3,
    Leaves = 4,
    Sand = 5,
    Cactus = 6,
    Water = 7,
}

impl Block {
    pub const fn id(&self) -> i8 {
        *self as i8
    }

    pub fn from_id(id: i8) -> Option<Self> {
        match id {
            -1 => Some(Block::Air),
            0 => Some(Block::Grass),
            1 => Some(Block::Dirt),
            2 => Some(Block::Stone),
            3 => Some(Block::OakLog),
            4 => Some(Block::Leaves),
            5 => Some(Block::Sand),
            6 => Some(Block::Cactus),
            7 => Some(Block::Water),
            _ => None,
        }
    }

    pub const fn is_empty(&self) -> bool {
        matches!(self, Block::Air)
    }

    pub const fn is_leaf(&self) -> bool {
        matches!(self, Block::Leaves)
    }

    pub const fn is_water(&self) -> bool {
        matches!(self, Block::Water)
    }

    /// Neighbours that let an ordinary solid block show its face.
    pub const fn is_non_solid(&self) -> bool {
        matches!(self, Block::Air | Block::Leaves | Block::Water)
    }

    /// Cells light can enter. Water stops both channels.
    pub const fn is_light_passable(&self) -> bool {
        matches!(self, Block::Air | Block::Leaves)
    }

    /// Cells that darken a vertex for ambient occlusion.
    pub const fn is_occluder(&self) -> bool {
        !matches!(self, Block::Air | Block::Leaves)
    }

    /// Block-light level this block emits. Nothing glows yet.
    pub const fn light_emission(&self) -> u8 {
        0
    }

    /// Seconds needed to break the block by hand.
    pub const fn hardness(&self) -> f32 {
        match self {
            Block::Grass => 0.6,
            Block::Dirt => 0.5,
            Block::Stone => 1.5,
            Block::OakLog => 2.0,
            Block::Leaves => 0.2,
            Block::Sand => 0.5,
            Block::Cactus => 0.4,
            Block::Water | Block::Air => 0.0,
        }
    }

    /// Texture layer per face, indexed by `FaceDirection::as_index`. `None` for air.
    pub const fn texture_layers(&self) -> Option<[TextureLayer; 6]> {
        match self {
            Block::Air => None,
            Block::Grass => Some([GRASS_TOP, DIRT, GRASS_SIDE, GRASS_SIDE, GRASS_SIDE, GRASS_SIDE]),
            Block::OakLog => Some([LOG_TOP, LOG_TOP, LOG_SIDE, LOG_SIDE, LOG_SIDE, LOG_SIDE]),
            Block::Cactus => Some([CACTUS_TOP, CACTUS_TOP, CACTUS_SIDE, CACTUS_SIDE, CACTUS_SIDE, CACTUS_SIDE]),
            Block::Dirt => Some([DIRT; 6]),
            Block::Stone => Some([STONE; 6]),
            Block::Leaves => Some([LEAVES; 6]),
            Block::Sand => Some([SAND; 6]),
            Block::Water => Some([WATER; 6]),
        }
    }

    pub fn texture_layer(&self, face: FaceDirection) -> Option<TextureLayer> {
        self.texture_layers().map(|layers| layers[face.as_index()])
    }
}

/// Voxel grid of one chunk, including the one-cell padding ring mirrored from its neighbours.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockBuffer {
    blocks: Vec<Block>,
}

impl BlockBuffer {
    pub fn new(blocks: Vec<Block>) -> Self {
        debug_assert_eq!(blocks.len(), ChunkShape::SIZE as usize);

        Self { blocks }
    }

    pub fn new_empty() -> Self {
        Self::new(Vec::from_iter(iter::repeat(Block::Air).take(ChunkShape::SIZE as usize)))
    }

    pub fn in_bounds(pos: &Vector3<i32>) -> bool {
        (0..CHUNK_SIZE_PADDED as i32).contains(&pos.x)
            && (0..WORLD_HEIGHT as i32).contains(&pos.y)
            && (0..CHUNK_SIZE_PADDED as i32).contains(&pos.z)
    }

    pub fn get(&self, pos: &Vector3<i32>) -> Option<Block> {
        if Self::in_bounds(pos) {
            Some(self[pos])
        } else {
            None
        }
    }

    /// Writes a cell in padded coordinates. Positions outside the grid are ignored.
    pub fn set(&mut self, pos: &Vector3<i32>, block: Block) {
        if Self::in_bounds(pos) {
            self.blocks[linearize(pos)] = block
        } else {
            log::warn!("Tried to set block outside of chunk grid at {:?}", pos)
        }
    }

    /// Copies the outermost interior slice of `neighbour` facing this chunk into our padding slice on `side`.
    pub fn copy_padding_from(&mut self, side: Side, neighbour: &BlockBuffer) {
        for_each_padding_cell(side, |own, theirs| self.blocks[linearize(&own)] = neighbour[&theirs]);
    }

    pub fn count_non_empty_interior(&self) -> usize {
        let mut count = 0;
        for x in 1..=CHUNK_SIZE_PADDED as i32 - 2 {
            for y in 0..WORLD_HEIGHT as i32 {
                for z in 1..=CHUNK_SIZE_PADDED as i32 - 2 {
                    if !self[&Vector3::new(x, y, z)].is_empty() {
                        count += 1
                    }
                }
            }
        }
        count
    }
}

impl Index<&Vector3<i32>> for BlockBuffer {
    type Output = Block;

    fn index(&self, index: &Vector3<i32>) -> &Self::Output {
        &self.blocks[linearize(index)]
    }
}

#[inline]
pub(crate) fn linearize(pos: &Vector3<i32>) -> usize {
    ChunkShape::linearize([pos.x as u32, pos.y as u32, pos.z as u32]) as usize
}

/// Calls `f(own_padding_cell, neighbour_cell)` for every cell of the padding slice on `side`, corners included.
/// The neighbour cell is in the neighbour's padded coordinates.
pub(crate) fn for_each_padding_cell(side: Side, mut f: impl FnMut(Vector3<i32>, Vector3<i32>)) {
    let last = CHUNK_SIZE_PADDED as i32 - 1;

    for y in 0..WORLD_HEIGHT as i32 {
        for i in 0..=last {
            let (own, theirs) = match side {
                Side::West => (Vector3::new(0, y, i), Vector3::new(last - 1, y, i)),
                Side::East => (Vector3::new(last, y, i), Vector3::new(1, y, i)),
                Side::North => (Vector3::new(i, y, 0), Vector3::new(i, y, last - 1)),
                Side::South => (Vector3::new(i, y, last), Vector3::new(i, y, 1)),
            };
            f(own, theirs)
        }
    }
}
