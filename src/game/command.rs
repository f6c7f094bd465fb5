use cgmath::Vector3;

use crate::{
    game::world::Block,
    misc::pos::{split_world_pos, ChunkPos},
};

/// Edit queued from outside the tick and applied at the start of the next one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WorldCommand {
    SetBlock {
        chunk_pos: ChunkPos,
        in_chunk_pos: Vector3<i32>,
        block: Block,
    },
    Remesh {
        chunk_pos: ChunkPos,
    },
}

impl WorldCommand {
    /// Command placing `block` at a world block position.
    pub fn set_block_at(world_pos: &Vector3<i32>, block: Block) -> Self {
        let (chunk_pos, in_chunk_pos) = split_world_pos(world_pos);

        WorldCommand::SetBlock {
            chunk_pos,
            in_chunk_pos,
            block,
        }
    }

    pub fn chunk_pos(&self) -> ChunkPos {
        match self {
            WorldCommand::SetBlock { chunk_pos, .. } | WorldCommand::Remesh { chunk_pos } => *chunk_pos,
        }
    }
}
