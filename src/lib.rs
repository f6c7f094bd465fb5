pub mod engine;
pub mod game;
pub mod misc;

use std::{sync::Arc, thread, time::Duration};

use cgmath::{Point3, Vector3};

use crate::{
    engine::gpu::{ChunkUploader, MemoryUploader, WgpuUploader},
    game::{world::Block, World, WorldCommand},
    misc::Settings,
};

pub use crate::{
    engine::gpu::BufferHandle,
    game::world::{ChunkState, JobError},
    misc::pos::ChunkPos,
};

pub const TITLE: &str = "voxel-world";
const TICK_INTERVAL: u64 = 16;
const TICKS_PER_STEP: u32 = 30;

/// Streams the world around a viewer walking east for `steps` chunks, digging and refilling a block every step.
pub async fn run(steps: u32) -> Result<(), JobError> {
    env_logger::init();

    let settings = Settings::load_from_file();

    match request_device().await {
        Some(device) => {
            log::info!("Uploading chunk meshes to the GPU");
            simulate(&settings, WgpuUploader::new(Arc::new(device)), steps)
        }
        None => {
            log::warn!("No usable GPU adapter, keeping chunk meshes in memory");
            simulate(&settings, MemoryUploader::new(), steps)
        }
    }
}

async fn request_device() -> Option<wgpu::Device> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await?;

    match adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: None,
                features: wgpu::Features::empty(),
                limits: wgpu::Limits::default(),
            },
            None,
        )
        .await
    {
        Ok((device, _queue)) => Some(device),
        Err(e) => {
            log::error!("Failed to request device - {}", e);
            None
        }
    }
}

fn simulate<U: ChunkUploader>(settings: &Settings, uploader: U, steps: u32) -> Result<(), JobError> {
    let mut world = World::new(settings, uploader)?;
    let mut viewer = Point3::new(8.0, 48.0, 8.0);

    for step in 0..steps {
        for _ in 0..TICKS_PER_STEP {
            world.tick(viewer);
            thread::sleep(Duration::from_millis(TICK_INTERVAL));
        }

        let (x, z) = (viewer.x as i32, viewer.z as i32);
        if let Some(y) = world.surface_height(x, z) {
            let surface = Vector3::new(x, y, z);
            let block = world.block_at(&surface);

            world.queue(WorldCommand::set_block_at(&surface, Block::Air));
            world.tick(viewer);
            world.queue(WorldCommand::set_block_at(&surface, block));
        }

        log::info!(
            "Step {}: viewer in chunk {:?}, {} chunks loaded, {} loading, {} renderable",
            step,
            ChunkPos::from_point(&viewer),
            world.loaded_chunks(),
            world.loading_chunks(),
            world.renderable_chunks().len()
        );

        viewer.x += game::world::CHUNK_SIZE as f32;
    }

    world.shutdown();
    Ok(())
}
