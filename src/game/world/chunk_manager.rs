use std::sync::Arc;

use cgmath::{Point3, Vector3};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    engine::gpu::{BufferHandle, ChunkUploader},
    game::world::{
        worker::{Job, JobError, JobId, JobKind, JobOutput, JobReturn, WorkerPool},
        Block, BlockBuffer, ChunkGenerator, ChunkMesh, ChunkMeshRaw, ChunkState, LightVal, LightingEngine,
        CHUNK_SIZE,
    },
    misc::{
        pos::{in_chunk_bounds, padded, ChunkPos},
        Settings,
    },
};

const SURROUNDING: [(i32, i32); 8] = [(-1, 0), (1, 0), (0, -1), (0, 1), (-1, -1), (-1, 1), (1, -1), (1, 1)];

/// Owns the streamed window of chunks around the viewer: voxels, light, uploaded meshes and the background jobs
/// producing them. Everything here is touched only by the thread calling `tick`.
pub struct ChunkManager<U: ChunkUploader> {
    render_distance: i32,
    unload_distance: i32,
    max_chunks_per_tick: usize,
    max_meshes_per_tick: usize,

    blocks: FxHashMap<ChunkPos, Arc<BlockBuffer>>,
    lighting: LightingEngine,
    meshes: FxHashMap<ChunkPos, ChunkMesh>,
    mesh_ready: FxHashSet<ChunkPos>,

    terrain_jobs: FxHashMap<ChunkPos, JobId>,
    mesh_jobs: FxHashMap<ChunkPos, JobId>,
    finished_terrain: FxHashMap<ChunkPos, (JobId, BlockBuffer)>,
    finished_meshes: FxHashMap<ChunkPos, (JobId, ChunkMeshRaw)>,
    next_job_id: JobId,

    pool: WorkerPool,
    uploader: U,
    shut_down: bool,
}

impl<U: ChunkUploader> ChunkManager<U> {
    pub fn new(settings: &Settings, generator: Arc<dyn ChunkGenerator>, uploader: U) -> Result<Self, JobError> {
        Ok(Self {
            render_distance: settings.render_distance as i32,
            unload_distance: settings.unload_distance() as i32,
            max_chunks_per_tick: settings.max_chunks_per_tick.max(1),
            max_meshes_per_tick: settings.max_meshes_per_tick.max(1),
            blocks: FxHashMap::default(),
            lighting: LightingEngine::new(),
            meshes: FxHashMap::default(),
            mesh_ready: FxHashSet::default(),
            terrain_jobs: FxHashMap::default(),
            mesh_jobs: FxHashMap::default(),
            finished_terrain: FxHashMap::default(),
            finished_meshes: FxHashMap::default(),
            next_job_id: 0,
            pool: WorkerPool::new(settings.worker_count, generator)?,
            uploader,
            shut_down: false,
        })
    }

    /// Schedules missing work around `viewer`, evicts far chunks, then applies a bounded number of finished
    /// results, nearest first.
    pub fn tick(&mut self, viewer: Point3<f32>) {
        if self.shut_down {
            return;
        }

        let centre = ChunkPos::from_point(&viewer);
        self.schedule(centre);
        self.evict(centre);
        self.drain(viewer);
    }

    pub fn get_block(&self, chunk_pos: &ChunkPos, in_chunk_pos: &Vector3<i32>) -> Block {
        if !in_chunk_bounds(in_chunk_pos) {
            return Block::Air;
        }

        self.blocks
            .get(chunk_pos)
            .map(|blocks| blocks[&padded(in_chunk_pos)])
            .unwrap_or(Block::Air)
    }

    pub fn get_light(&self, chunk_pos: &ChunkPos, in_chunk_pos: &Vector3<i32>) -> Option<LightVal> {
        if !in_chunk_bounds(in_chunk_pos) {
            return None;
        }

        self.lighting.get(chunk_pos)?.get(&padded(in_chunk_pos))
    }

    /// Writes a block and queues every remesh the edit causes. Returns `false` without touching anything when
    /// the target is outside the chunk or the chunk is not loaded.
    pub fn set_block(&mut self, chunk_pos: &ChunkPos, in_chunk_pos: &Vector3<i32>, block: Block) -> bool {
        if self.shut_down {
            return false;
        }
        if !in_chunk_bounds(in_chunk_pos) {
            log::warn!("Trying to set block outside of chunk bounds at {:?}", in_chunk_pos);
            return false;
        }
        let Some(blocks) = self.blocks.get_mut(chunk_pos) else {
            log::warn!("Trying to set block in a nonexistent chunk {:?}", chunk_pos);
            return false;
        };

        let pos = padded(in_chunk_pos);
        let old = blocks[&pos];
        if old == block {
            return true;
        }

        Arc::make_mut(blocks).set(&pos, block);
        let blocks = blocks.clone();
        self.lighting.update_at(chunk_pos, &blocks, pos, old, block);

        let mut to_remesh = FxHashSet::default();
        to_remesh.insert(*chunk_pos);

        // Mirror into every neighbour whose padding covers this cell, diagonal ones included.
        for (dx, dz) in SURROUNDING {
            let neighbour_pos = chunk_pos.offset(dx, dz);
            let Some(neighbour) = self.blocks.get_mut(&neighbour_pos) else {
                continue;
            };

            let size = CHUNK_SIZE as i32;
            let neighbour_cell = padded(&(in_chunk_pos - Vector3::new(dx * size, 0, dz * size)));
            if BlockBuffer::in_bounds(&neighbour_cell) {
                Arc::make_mut(neighbour).set(&neighbour_cell, block);
                to_remesh.insert(neighbour_pos);
            }
        }

        // Cardinal neighbours first, diagonal ones take their corner padding from them.
        for (dx, dz) in SURROUNDING {
            let neighbour_pos = chunk_pos.offset(dx, dz);
            if self.lighting.sync_padding(&neighbour_pos) {
                to_remesh.insert(neighbour_pos);
            }
        }
        self.lighting.sync_padding(chunk_pos);

        for pos in to_remesh {
            self.force_remesh(pos)
        }

        true
    }

    /// Every chunk with an uploaded, non-empty mesh.
    pub fn renderable_chunks(&self) -> Vec<(ChunkPos, BufferHandle, u32)> {
        self.meshes
            .iter()
            .map(|(chunk_pos, mesh)| (*chunk_pos, mesh.handle, mesh.index_count))
            .collect()
    }

    pub fn chunk_mesh(&self, chunk_pos: &ChunkPos) -> Option<ChunkMesh> {
        self.meshes.get(chunk_pos).copied()
    }

    pub fn chunk_state(&self, chunk_pos: &ChunkPos) -> ChunkState {
        if self.terrain_jobs.contains_key(chunk_pos) {
            ChunkState::TerrainPending
        } else if !self.blocks.contains_key(chunk_pos) {
            ChunkState::Unscheduled
        } else if self.mesh_jobs.contains_key(chunk_pos) {
            ChunkState::MeshPending
        } else if self.mesh_ready.contains(chunk_pos) {
            ChunkState::Renderable
        } else {
            ChunkState::Generated
        }
    }

    pub fn is_mesh_pending(&self, chunk_pos: &ChunkPos) -> bool {
        self.mesh_jobs.contains_key(chunk_pos)
    }

    pub fn is_loaded(&self, chunk_pos: &ChunkPos) -> bool {
        self.blocks.contains_key(chunk_pos)
    }

    pub fn loaded_chunks(&self) -> usize {
        self.blocks.len()
    }

    /// Jobs submitted and not yet applied or discarded.
    pub fn loading_chunks(&self) -> usize {
        self.terrain_jobs.len() + self.mesh_jobs.len()
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Joins the worker pool and frees every uploaded mesh. Later ticks do nothing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        self.pool.shutdown();
        for (_, mesh) in self.meshes.drain() {
            self.uploader.release(mesh.handle)
        }

        self.blocks.clear();
        self.lighting.retain(|_| false);
        self.mesh_ready.clear();
        self.terrain_jobs.clear();
        self.mesh_jobs.clear();
        self.finished_terrain.clear();
        self.finished_meshes.clear();
    }

    fn schedule(&mut self, centre: ChunkPos) {
        let in_range = chunks_in_radius(centre, self.render_distance);

        for chunk_pos in in_range {
            if !self.blocks.contains_key(&chunk_pos) {
                if !self.terrain_jobs.contains_key(&chunk_pos) {
                    self.request_chunk_blocks(chunk_pos)
                }
            } else if !self.mesh_ready.contains(&chunk_pos) && !self.mesh_jobs.contains_key(&chunk_pos) {
                if !self.lighting.contains(&chunk_pos) {
                    if let Some(blocks) = self.blocks.get(&chunk_pos) {
                        self.lighting.init_chunk(chunk_pos, blocks);
                        self.lighting.sync_padding(&chunk_pos);
                    }
                }
                self.force_remesh(chunk_pos)
            }
        }
    }

    fn evict(&mut self, centre: ChunkPos) {
        let limit = (self.unload_distance as i64).pow(2);
        let keep = |chunk_pos: &ChunkPos| chunk_pos.distance_sq(&centre) <= limit;

        let before = self.blocks.len();

        let uploader = &mut self.uploader;
        self.meshes.retain(|chunk_pos, mesh| {
            if keep(chunk_pos) {
                true
            } else {
                uploader.release(mesh.handle);
                false
            }
        });
        self.blocks.retain(|chunk_pos, _| keep(chunk_pos));
        self.lighting.retain(keep);
        self.mesh_ready.retain(keep);
        self.terrain_jobs.retain(|chunk_pos, _| keep(chunk_pos));
        self.mesh_jobs.retain(|chunk_pos, _| keep(chunk_pos));
        self.finished_terrain.retain(|chunk_pos, _| keep(chunk_pos));
        self.finished_meshes.retain(|chunk_pos, _| keep(chunk_pos));

        let evicted = before - self.blocks.len();
        if evicted > 0 {
            log::info!("Evicted {} chunks", evicted)
        }
    }

    fn drain(&mut self, viewer: Point3<f32>) {
        for recieved in self.pool.collect_finished() {
            self.handle_recieved(recieved)
        }

        let mut ready_terrain = self.finished_terrain.keys().copied().collect::<Vec<_>>();
        ready_terrain.sort_by(|a, b| a.centre_distance_sq(&viewer).total_cmp(&b.centre_distance_sq(&viewer)));
        for chunk_pos in ready_terrain.into_iter().take(self.max_chunks_per_tick) {
            if let Some((id, blocks)) = self.finished_terrain.remove(&chunk_pos) {
                if self.terrain_jobs.get(&chunk_pos) == Some(&id) {
                    self.terrain_jobs.remove(&chunk_pos);
                    self.merge_chunk(chunk_pos, blocks);
                }
            }
        }

        let mut ready_meshes = self.finished_meshes.keys().copied().collect::<Vec<_>>();
        ready_meshes.sort_by(|a, b| a.centre_distance_sq(&viewer).total_cmp(&b.centre_distance_sq(&viewer)));
        for chunk_pos in ready_meshes.into_iter().take(self.max_meshes_per_tick) {
            if let Some((id, mesh)) = self.finished_meshes.remove(&chunk_pos) {
                if self.mesh_jobs.get(&chunk_pos) == Some(&id) {
                    self.mesh_jobs.remove(&chunk_pos);
                    self.apply_mesh(chunk_pos, mesh);
                } else {
                    log::debug!("Dropping superseded mesh for chunk {:?}", chunk_pos)
                }
            }
        }
    }

    fn handle_recieved(&mut self, recieved: JobReturn) {
        let JobReturn {
            chunk_pos,
            id,
            kind,
            result,
        } = recieved;

        let jobs = match kind {
            JobKind::Terrain => &mut self.terrain_jobs,
            JobKind::Mesh => &mut self.mesh_jobs,
        };
        if jobs.get(&chunk_pos) != Some(&id) {
            log::debug!("Discarding stale {:?} result for chunk {:?}", kind, chunk_pos);
            return;
        }

        match result {
            Ok(JobOutput::Terrain(blocks)) => {
                self.finished_terrain.insert(chunk_pos, (id, blocks));
            }
            Ok(JobOutput::Mesh(mesh)) => {
                self.finished_meshes.insert(chunk_pos, (id, mesh));
            }
            Err(e) => {
                // Forgetting the job lets the next scheduling sweep retry it.
                log::error!("{}", e);
                jobs.remove(&chunk_pos);

                if kind == JobKind::Mesh {
                    self.mesh_ready.remove(&chunk_pos);
                    if let Some(old) = self.meshes.remove(&chunk_pos) {
                        self.uploader.release(old.handle)
                    }
                }
            }
        }
    }

    fn merge_chunk(&mut self, chunk_pos: ChunkPos, mut blocks: BlockBuffer) {
        for (side, neighbour_pos) in chunk_pos.neighbours() {
            if let Some(neighbour) = self.blocks.get_mut(&neighbour_pos) {
                blocks.copy_padding_from(side, neighbour);
                Arc::make_mut(neighbour).copy_padding_from(side.opposite(), &blocks);
            }
        }

        let blocks = Arc::new(blocks);
        self.blocks.insert(chunk_pos, blocks.clone());
        self.lighting.init_chunk(chunk_pos, &blocks);
        self.lighting.sync_padding(&chunk_pos);

        for (_, neighbour_pos) in chunk_pos.neighbours() {
            if self.lighting.contains(&neighbour_pos) {
                self.lighting.sync_padding(&neighbour_pos);
                self.force_remesh(neighbour_pos);
            }
        }
        self.lighting.sync_padding(&chunk_pos);

        log::debug!("Merged chunk {:?}", chunk_pos);
    }

    fn apply_mesh(&mut self, chunk_pos: ChunkPos, mesh: ChunkMeshRaw) {
        if let Some(old) = self.meshes.remove(&chunk_pos) {
            self.uploader.release(old.handle)
        }

        if !mesh.is_empty() {
            let handle = self.uploader.upload(chunk_pos, &mesh);
            self.meshes
                .insert(chunk_pos, ChunkMesh::new(handle, mesh.indices.len() as u32));
        }
        self.mesh_ready.insert(chunk_pos);
    }

    fn request_chunk_blocks(&mut self, chunk_pos: ChunkPos) {
        let id = self.next_job_id();
        match self.pool.submit(Job::Terrain { chunk_pos, id }) {
            Ok(()) => {
                self.terrain_jobs.insert(chunk_pos, id);
            }
            Err(e) => log::error!("Failed to request chunk {:?} - {}", chunk_pos, e),
        }
    }

    /// Submits a fresh mesh job. Any result of an older job for the same chunk is dropped when it lands.
    pub fn force_remesh(&mut self, chunk_pos: ChunkPos) {
        let (Some(blocks), Some(lights)) = (self.blocks.get(&chunk_pos).cloned(), self.lighting.get(&chunk_pos)) else {
            return;
        };

        let id = self.next_job_id();
        match self.pool.submit(Job::Mesh {
            chunk_pos,
            id,
            blocks,
            lights,
        }) {
            Ok(()) => {
                self.mesh_jobs.insert(chunk_pos, id);
            }
            Err(e) => log::error!("Failed to request mesh for chunk {:?} - {}", chunk_pos, e),
        }
    }

    fn next_job_id(&mut self) -> JobId {
        self.next_job_id += 1;
        self.next_job_id
    }
}

/// Chunks within Euclidean chunk distance `radius` of `centre`, nearest first.
fn chunks_in_radius(centre: ChunkPos, radius: i32) -> Vec<ChunkPos> {
    let limit = radius as i64 * radius as i64;

    let mut in_range = Vec::new();
    for dx in -radius..=radius {
        for dz in -radius..=radius {
            let chunk_pos = centre.offset(dx, dz);
            if chunk_pos.distance_sq(&centre) <= limit {
                in_range.push(chunk_pos)
            }
        }
    }
    in_range.sort_by_key(|chunk_pos| chunk_pos.distance_sq(&centre));

    in_range
}

#[cfg(test)]
mod tests {
    use std::{
        thread,
        time::{Duration, Instant},
    };

    use super::*;
    use crate::{engine::gpu::MemoryUploader, game::world::TerrainGenerator};

    fn settings(render_distance: u32, unload_buffer: u32) -> Settings {
        Settings {
            seed: Some(17),
            render_distance,
            unload_buffer,
            worker_count: 2,
            max_chunks_per_tick: 4,
            max_meshes_per_tick: 8,
        }
    }

    fn manager(render_distance: u32, unload_buffer: u32) -> ChunkManager<MemoryUploader> {
        ChunkManager::new(
            &settings(render_distance, unload_buffer),
            Arc::new(TerrainGenerator::new(17)),
            MemoryUploader::new(),
        )
        .unwrap()
    }

    fn tick_until(
        manager: &mut ChunkManager<MemoryUploader>,
        viewer: Point3<f32>,
        mut done: impl FnMut(&ChunkManager<MemoryUploader>) -> bool,
    ) {
        let start = Instant::now();
        loop {
            manager.tick(viewer);
            if done(manager) {
                return;
            }
            assert!(start.elapsed() < Duration::from_secs(60), "world never settled");
            thread::sleep(Duration::from_millis(2));
        }
    }

    /// Ticks until every chunk in render distance is meshed and nothing is in flight.
    fn settle(manager: &mut ChunkManager<MemoryUploader>, viewer: Point3<f32>) {
        let centre = ChunkPos::from_point(&viewer);
        tick_until(manager, viewer, |m| {
            let all_meshed = chunks_in_radius(centre, m.render_distance)
                .iter()
                .all(|chunk_pos| m.mesh_ready.contains(chunk_pos));

            all_meshed && m.loading_chunks() == 0 && m.finished_terrain.is_empty() && m.finished_meshes.is_empty()
        });
    }

    const ORIGIN: Point3<f32> = Point3::new(8.0, 40.0, 8.0);

    #[test]
    fn radius_is_euclidean() {
        let in_range = chunks_in_radius(ChunkPos::new(0, 0), 2);

        assert_eq!(in_range.len(), 13);
        assert_eq!(in_range[0], ChunkPos::new(0, 0));
        assert!(in_range.contains(&ChunkPos::new(1, 1)));
        assert!(in_range.contains(&ChunkPos::new(0, -2)));
        assert!(!in_range.contains(&ChunkPos::new(2, 1)));
        assert_eq!(chunks_in_radius(ChunkPos::new(5, 5), 3).len(), 29);
    }

    #[test]
    fn loads_and_meshes_the_render_disc() {
        let mut manager = manager(2, 1);
        settle(&mut manager, ORIGIN);

        assert_eq!(manager.loaded_chunks(), 13);
        for chunk_pos in chunks_in_radius(ChunkPos::new(0, 0), 2) {
            assert_eq!(manager.chunk_state(&chunk_pos), ChunkState::Renderable);
        }
        assert_eq!(manager.chunk_state(&ChunkPos::new(2, 2)), ChunkState::Unscheduled);
        assert_eq!(manager.renderable_chunks().len(), 13);
        assert_eq!(manager.uploader().live_count(), 13);
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut manager = manager(1, 1);
        settle(&mut manager, ORIGIN);
        let chunk_pos = ChunkPos::new(0, 0);
        let local = Vector3::new(5, 60, 5);

        assert!(manager.set_block(&chunk_pos, &local, Block::Sand));
        assert_eq!(manager.get_block(&chunk_pos, &local), Block::Sand);

        assert!(manager.set_block(&chunk_pos, &local, Block::Air));
        assert_eq!(manager.get_block(&chunk_pos, &local), Block::Air);
    }

    #[test]
    fn invalid_edits_are_rejected() {
        let mut manager = manager(1, 1);
        settle(&mut manager, ORIGIN);

        assert!(!manager.set_block(&ChunkPos::new(0, 0), &Vector3::new(16, 5, 5), Block::Stone));
        assert!(!manager.set_block(&ChunkPos::new(0, 0), &Vector3::new(5, 64, 5), Block::Stone));
        assert!(!manager.set_block(&ChunkPos::new(50, 50), &Vector3::new(5, 5, 5), Block::Stone));
        assert_eq!(manager.get_block(&ChunkPos::new(50, 50), &Vector3::new(5, 5, 5)), Block::Air);
        assert_eq!(manager.get_block(&ChunkPos::new(0, 0), &Vector3::new(-1, 5, 5)), Block::Air);
        assert!(!manager.is_mesh_pending(&ChunkPos::new(0, 0)));
    }

    #[test]
    fn border_edits_reach_neighbour_padding() {
        let mut manager = manager(2, 1);
        settle(&mut manager, ORIGIN);
        let chunk_pos = ChunkPos::new(0, 0);

        assert!(manager.set_block(&chunk_pos, &Vector3::new(0, 60, 7), Block::Cactus));
        let west = &manager.blocks[&ChunkPos::new(-1, 0)];
        assert_eq!(west[&Vector3::new(17, 60, 8)], Block::Cactus);

        assert!(manager.set_block(&chunk_pos, &Vector3::new(15, 61, 15), Block::OakLog));
        assert_eq!(manager.blocks[&ChunkPos::new(1, 0)][&Vector3::new(0, 61, 16)], Block::OakLog);
        assert_eq!(manager.blocks[&ChunkPos::new(0, 1)][&Vector3::new(16, 61, 0)], Block::OakLog);
        assert_eq!(manager.blocks[&ChunkPos::new(1, 1)][&Vector3::new(0, 61, 0)], Block::OakLog);

        assert!(manager.is_mesh_pending(&ChunkPos::new(1, 0)));
        assert!(manager.is_mesh_pending(&ChunkPos::new(1, 1)));
    }

    #[test]
    fn merged_neighbours_share_padding() {
        let mut manager = manager(1, 1);
        settle(&mut manager, ORIGIN);

        let own = &manager.blocks[&ChunkPos::new(0, 0)];
        let east = &manager.blocks[&ChunkPos::new(1, 0)];
        // Corner columns belong to diagonal chunks and are only mirrored on edits.
        for y in 0..64 {
            for z in 1..17 {
                assert_eq!(own[&Vector3::new(17, y, z)], east[&Vector3::new(1, y, z)]);
                assert_eq!(east[&Vector3::new(0, y, z)], own[&Vector3::new(16, y, z)]);
            }
        }

        let own_light = manager.lighting.get(&ChunkPos::new(0, 0)).unwrap();
        let east_light = manager.lighting.get(&ChunkPos::new(1, 0)).unwrap();
        for y in 0..64 {
            for z in 1..17 {
                assert_eq!(own_light[&Vector3::new(17, y, z)], east_light[&Vector3::new(1, y, z)]);
            }
        }
    }

    #[test]
    fn edit_marks_renderable_chunk_mesh_pending() {
        let mut manager = manager(1, 1);
        settle(&mut manager, ORIGIN);
        let chunk_pos = ChunkPos::new(0, 0);
        assert_eq!(manager.chunk_state(&chunk_pos), ChunkState::Renderable);

        let local = Vector3::new(5, 10, 5);
        let replacement = if manager.get_block(&chunk_pos, &local) == Block::Stone {
            Block::Air
        } else {
            Block::Stone
        };
        assert!(manager.set_block(&chunk_pos, &local, replacement));
        assert!(manager.is_mesh_pending(&chunk_pos));
        assert_eq!(manager.chunk_state(&chunk_pos), ChunkState::MeshPending);

        // Staying put evicts nothing.
        manager.tick(ORIGIN);
        assert_eq!(manager.loaded_chunks(), 5);

        settle(&mut manager, ORIGIN);
        assert_eq!(manager.chunk_state(&chunk_pos), ChunkState::Renderable);
    }

    #[test]
    fn far_chunks_are_evicted_and_released() {
        let mut manager = manager(2, 1);
        settle(&mut manager, ORIGIN);
        let far = ChunkPos::new(-1, -1);
        let handle = manager.chunk_mesh(&far).map(|mesh| mesh.handle).unwrap();

        // Moving 3 chunks east puts (-1, -1) at distance > 3.
        let viewer = Point3::new(8.0 + 48.0, 40.0, 8.0);
        manager.tick(viewer);

        assert!(manager.renderable_chunks().iter().all(|(chunk_pos, _, _)| *chunk_pos != far));
        assert!(manager.uploader().is_released(&handle));
        assert_eq!(manager.chunk_state(&far), ChunkState::Unscheduled);
        assert_eq!(manager.get_block(&far, &Vector3::new(0, 0, 0)), Block::Air);
        assert!(!manager.lighting.contains(&far));
    }

    struct SlowGenerator(TerrainGenerator);

    impl ChunkGenerator for SlowGenerator {
        fn generate(&self, chunk_pos: ChunkPos) -> BlockBuffer {
            thread::sleep(Duration::from_millis(50));
            self.0.generate(chunk_pos)
        }
    }

    #[test]
    fn results_for_evicted_chunks_are_discarded() {
        let generator = SlowGenerator(TerrainGenerator::new(17));
        let mut manager = ChunkManager::new(&settings(1, 1), Arc::new(generator), MemoryUploader::new()).unwrap();
        manager.tick(ORIGIN);
        assert_eq!(manager.chunk_state(&ChunkPos::new(0, 0)), ChunkState::TerrainPending);

        // Jump far away before anything lands.
        let viewer = Point3::new(8.0 + 16.0 * 40.0, 40.0, 8.0);
        manager.tick(viewer);
        assert_eq!(manager.chunk_state(&ChunkPos::new(0, 0)), ChunkState::Unscheduled);

        settle(&mut manager, viewer);
        assert!(!manager.is_loaded(&ChunkPos::new(0, 0)));
        assert_eq!(manager.loaded_chunks(), 5);
    }

    #[test]
    fn superseded_mesh_results_are_dropped() {
        let mut manager = manager(0, 1);
        settle(&mut manager, ORIGIN);
        let chunk_pos = ChunkPos::new(0, 0);

        manager.force_remesh(chunk_pos);
        let first = manager.mesh_jobs[&chunk_pos];
        manager.force_remesh(chunk_pos);
        let second = manager.mesh_jobs[&chunk_pos];
        assert!(second > first);

        let uploads_before = manager.uploader().live_count() + manager.uploader().released_count();
        settle(&mut manager, ORIGIN);
        // Only the latest job got uploaded, replacing the previous mesh.
        let uploads_after = manager.uploader().live_count() + manager.uploader().released_count();
        assert_eq!(uploads_after, uploads_before + 1);
    }

    struct FlakyGenerator {
        inner: TerrainGenerator,
        failed: std::sync::Mutex<FxHashSet<ChunkPos>>,
    }

    impl ChunkGenerator for FlakyGenerator {
        fn generate(&self, chunk_pos: ChunkPos) -> BlockBuffer {
            let first_attempt = self
                .failed
                .lock()
                .map(|mut failed| failed.insert(chunk_pos))
                .unwrap_or(false);
            if first_attempt {
                panic!("first attempt at {chunk_pos:?} fails");
            }
            self.inner.generate(chunk_pos)
        }
    }

    #[test]
    fn failed_generation_is_retried() {
        let generator = FlakyGenerator {
            inner: TerrainGenerator::new(3),
            failed: Default::default(),
        };
        let mut manager = ChunkManager::new(&settings(1, 1), Arc::new(generator), MemoryUploader::new()).unwrap();

        settle(&mut manager, ORIGIN);
        assert_eq!(manager.loaded_chunks(), 5);
        assert_eq!(manager.renderable_chunks().len(), 5);
    }

    #[test]
    fn zero_unload_buffer_evicts_at_render_distance() {
        let mut manager = manager(3, 0);
        settle(&mut manager, ORIGIN);
        assert_eq!(manager.loaded_chunks(), 29);

        let viewer = Point3::new(8.0 + 16.0, 40.0, 8.0);
        let centre = ChunkPos::from_point(&viewer);
        manager.tick(viewer);

        assert!(manager
            .renderable_chunks()
            .iter()
            .all(|(chunk_pos, _, _)| chunk_pos.distance_sq(&centre) <= 9));
        assert!(manager.blocks.keys().all(|chunk_pos| chunk_pos.distance_sq(&centre) <= 9));
        assert_eq!(manager.chunk_state(&ChunkPos::new(-3, 0)), ChunkState::Unscheduled);

        // Nothing inside the radius is dropped as soon as it is requested.
        settle(&mut manager, viewer);
        assert_eq!(manager.loaded_chunks(), 29);
    }

    #[test]
    fn corner_edits_refresh_diagonal_light() {
        let mut manager = manager(2, 1);
        settle(&mut manager, ORIGIN);
        let chunk_pos = ChunkPos::new(0, 0);
        let diagonal = ChunkPos::new(1, 1);

        let surface = (0..64)
            .rev()
            .find(|y| !manager.get_block(&chunk_pos, &Vector3::new(15, *y, 15)).is_empty())
            .unwrap();
        assert!(manager.set_block(&chunk_pos, &Vector3::new(15, surface, 15), Block::Air));

        let own = manager.lighting.get(&chunk_pos).unwrap();
        let diagonal_light = manager.lighting.get(&diagonal).unwrap();
        assert!(own[&Vector3::new(16, surface, 16)].sun > 0);
        for y in 0..64 {
            assert_eq!(diagonal_light[&Vector3::new(0, y, 0)], own[&Vector3::new(16, y, 16)], "y = {y}");
        }
        assert!(manager.is_mesh_pending(&diagonal));
    }

    #[test]
    fn failed_remesh_is_retried() {
        let mut manager = manager(0, 1);
        settle(&mut manager, ORIGIN);
        let chunk_pos = ChunkPos::new(0, 0);
        let old_handle = manager.chunk_mesh(&chunk_pos).map(|mesh| mesh.handle).unwrap();

        manager.force_remesh(chunk_pos);
        let id = manager.mesh_jobs[&chunk_pos];
        manager.handle_recieved(JobReturn {
            chunk_pos,
            id,
            kind: JobKind::Mesh,
            result: Err(JobError::Panicked {
                kind: JobKind::Mesh,
                chunk_pos,
                message: "mesh build failed".to_string(),
            }),
        });

        assert_eq!(manager.chunk_state(&chunk_pos), ChunkState::Generated);
        assert!(manager.chunk_mesh(&chunk_pos).is_none());
        assert!(manager.uploader().is_released(&old_handle));

        // The worker's own result for the failed id is stale now, the next sweep schedules a fresh job.
        settle(&mut manager, ORIGIN);
        assert_eq!(manager.chunk_state(&chunk_pos), ChunkState::Renderable);
        assert!(manager.chunk_mesh(&chunk_pos).is_some());
    }

    #[test]
    fn extreme_viewer_positions_do_not_overflow() {
        let mut manager = manager(1, 0);

        manager.tick(Point3::new(f32::MAX, 40.0, f32::MIN));
        manager.tick(Point3::new(f32::MIN, 40.0, f32::MAX));
        assert!(manager.loading_chunks() > 0);

        manager.shutdown();
    }

    #[test]
    fn shutdown_releases_everything() {
        let mut manager = manager(1, 1);
        settle(&mut manager, ORIGIN);

        manager.shutdown();
        assert!(manager.is_shut_down());
        assert_eq!(manager.uploader().live_count(), 0);
        assert!(manager.renderable_chunks().is_empty());

        manager.tick(ORIGIN);
        assert_eq!(manager.loaded_chunks(), 0);
        assert!(!manager.set_block(&ChunkPos::new(0, 0), &Vector3::new(1, 1, 1), Block::Stone));
    }
}
