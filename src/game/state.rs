use std::{collections::VecDeque, sync::Arc};

use cgmath::{Point3, Vector3};

use crate::{
    engine::gpu::{BufferHandle, ChunkUploader},
    game::{
        world::{Block, ChunkManager, ChunkState, JobError, LightVal, TerrainGenerator, WORLD_HEIGHT},
        WorldCommand,
    },
    misc::{
        pos::{split_world_pos, ChunkPos},
        Settings,
    },
};

/// Entry point for everything outside the world core. Edits may be queued at any time and are applied at the
/// start of the next `tick`, before any new work is scheduled.
pub struct World<U: ChunkUploader> {
    chunks: ChunkManager<U>,
    commands: VecDeque<WorldCommand>,
    seed: u32,
}

impl<U: ChunkUploader> World<U> {
    pub fn new(settings: &Settings, uploader: U) -> Result<Self, JobError> {
        let seed = settings.seed_or_random();
        log::info!("Creating world with seed {}", seed);

        Ok(Self {
            chunks: ChunkManager::new(settings, Arc::new(TerrainGenerator::new(seed)), uploader)?,
            commands: VecDeque::new(),
            seed,
        })
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn queue(&mut self, command: WorldCommand) {
        self.commands.push_back(command)
    }

    pub fn queued_commands(&self) -> usize {
        self.commands.len()
    }

    pub fn tick(&mut self, viewer: Point3<f32>) {
        while let Some(command) = self.commands.pop_front() {
            self.apply(command)
        }

        self.chunks.tick(viewer);
    }

    pub fn get_block(&self, chunk_pos: &ChunkPos, in_chunk_pos: &Vector3<i32>) -> Block {
        self.chunks.get_block(chunk_pos, in_chunk_pos)
    }

    pub fn set_block(&mut self, chunk_pos: &ChunkPos, in_chunk_pos: &Vector3<i32>, block: Block) -> bool {
        self.chunks.set_block(chunk_pos, in_chunk_pos, block)
    }

    pub fn block_at(&self, world_pos: &Vector3<i32>) -> Block {
        let (chunk_pos, in_chunk_pos) = split_world_pos(world_pos);
        self.chunks.get_block(&chunk_pos, &in_chunk_pos)
    }

    pub fn set_block_at(&mut self, world_pos: &Vector3<i32>, block: Block) -> bool {
        let (chunk_pos, in_chunk_pos) = split_world_pos(world_pos);
        self.chunks.set_block(&chunk_pos, &in_chunk_pos, block)
    }

    pub fn light_at(&self, world_pos: &Vector3<i32>) -> Option<LightVal> {
        let (chunk_pos, in_chunk_pos) = split_world_pos(world_pos);
        self.chunks.get_light(&chunk_pos, &in_chunk_pos)
    }

    /// Highest non-empty block of the column, if its chunk is loaded.
    pub fn surface_height(&self, world_x: i32, world_z: i32) -> Option<i32> {
        let (chunk_pos, _) = split_world_pos(&Vector3::new(world_x, 0, world_z));
        if !self.chunks.is_loaded(&chunk_pos) {
            return None;
        }

        (0..WORLD_HEIGHT as i32)
            .rev()
            .find(|y| !self.block_at(&Vector3::new(world_x, *y, world_z)).is_empty())
    }

    pub fn renderable_chunks(&self) -> Vec<(ChunkPos, BufferHandle, u32)> {
        self.chunks.renderable_chunks()
    }

    pub fn chunk_state(&self, chunk_pos: &ChunkPos) -> ChunkState {
        self.chunks.chunk_state(chunk_pos)
    }

    pub fn loaded_chunks(&self) -> usize {
        self.chunks.loaded_chunks()
    }

    pub fn loading_chunks(&self) -> usize {
        self.chunks.loading_chunks()
    }

    pub fn chunks(&self) -> &ChunkManager<U> {
        &self.chunks
    }

    /// Drops queued edits, joins the workers and releases every uploaded mesh.
    pub fn shutdown(&mut self) {
        if !self.commands.is_empty() {
            log::warn!("Dropping {} queued world commands", self.commands.len());
            self.commands.clear();
        }
        self.chunks.shutdown()
    }

    fn apply(&mut self, command: WorldCommand) {
        match command {
            WorldCommand::SetBlock {
                chunk_pos,
                in_chunk_pos,
                block,
            } => {
                self.chunks.set_block(&chunk_pos, &in_chunk_pos, block);
            }
            WorldCommand::Remesh { chunk_pos } => self.chunks.force_remesh(chunk_pos),
        }
    }
}
