use std::{mem, sync::Arc};

use rustc_hash::{FxHashMap, FxHashSet};
use wgpu::{
    util::{BufferInitDescriptor, DeviceExt},
    Buffer, BufferUsages, Device, IndexFormat, RenderPass, VertexBufferLayout,
};

use crate::{game::world::ChunkMeshRaw, misc::pos::ChunkPos};

pub trait Vertex {
    fn desc<'a>() -> VertexBufferLayout<'a>;
}

/// Opaque reference to an uploaded chunk mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferHandle(u64);

impl BufferHandle {
    pub const fn id(&self) -> u64 {
        self.0
    }
}

/// Moves finished chunk meshes to wherever they are drawn from.
pub trait ChunkUploader {
    /// Uploads a non-empty mesh and hands back a handle to it.
    fn upload(&mut self, chunk_pos: ChunkPos, mesh: &ChunkMeshRaw) -> BufferHandle;

    /// Frees a mesh. Each handle is released at most once.
    fn release(&mut self, handle: BufferHandle);
}

pub struct GpuChunkMesh {
    pub chunk_pos: ChunkPos,
    pub vertex_buffer: Buffer,
    pub index_buffer: Buffer,
    pub num_elements: u32,
}

impl GpuChunkMesh {
    pub fn new(chunk_pos: ChunkPos, mesh_raw: &ChunkMeshRaw, device: &Device) -> Self {
        Self {
            chunk_pos,
            num_elements: mesh_raw.indices.len() as u32,
            vertex_buffer: device.create_buffer_init(&BufferInitDescriptor {
                label: Some(&format!("Chunk vertices {:?}", chunk_pos)),
                contents: bytemuck::cast_slice(&mesh_raw.vertices),
                usage: BufferUsages::VERTEX,
            }),
            index_buffer: device.create_buffer_init(&BufferInitDescriptor {
                label: Some(&format!("Chunk indices {:?}", chunk_pos)),
                contents: bytemuck::cast_slice(&mesh_raw.indices),
                usage: BufferUsages::INDEX,
            }),
        }
    }

    pub fn draw<'a>(&'a self, render_pass: &mut RenderPass<'a>) {
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.index_buffer.slice(..), IndexFormat::Uint32);
        render_pass.draw_indexed(0..self.num_elements, 0, 0..1);
    }
}

/// Uploads chunk meshes into wgpu vertex and index buffers.
pub struct WgpuUploader {
    device: Arc<Device>,
    meshes: FxHashMap<BufferHandle, GpuChunkMesh>,
    next_handle: u64,
}

impl WgpuUploader {
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            meshes: FxHashMap::default(),
            next_handle: 0,
        }
    }

    pub fn get(&self, handle: &BufferHandle) -> Option<&GpuChunkMesh> {
        self.meshes.get(handle)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

impl ChunkUploader for WgpuUploader {
    fn upload(&mut self, chunk_pos: ChunkPos, mesh: &ChunkMeshRaw) -> BufferHandle {
        let handle = BufferHandle(self.next_handle);
        self.next_handle += 1;

        self.meshes.insert(handle, GpuChunkMesh::new(chunk_pos, mesh, &self.device));
        handle
    }

    fn release(&mut self, handle: BufferHandle) {
        if let Some(mesh) = self.meshes.remove(&handle) {
            mesh.vertex_buffer.destroy();
            mesh.index_buffer.destroy();
        } else {
            log::warn!("Released unknown chunk buffer {:?}", handle)
        }
    }
}

/// Keeps meshes in main memory. Used when no GPU is available.
#[derive(Debug, Default)]
pub struct MemoryUploader {
    meshes: FxHashMap<BufferHandle, (ChunkPos, ChunkMeshRaw)>,
    released: FxHashSet<BufferHandle>,
    next_handle: u64,
}

impl MemoryUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handle: &BufferHandle) -> Option<&ChunkMeshRaw> {
        self.meshes.get(handle).map(|(_, mesh)| mesh)
    }

    pub fn is_released(&self, handle: &BufferHandle) -> bool {
        self.released.contains(handle)
    }

    pub fn live_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn released_count(&self) -> usize {
        self.released.len()
    }

    pub fn live_bytes(&self) -> usize {
        self.meshes
            .values()
            .map(|(_, mesh)| mem::size_of_val(mesh.vertices.as_slice()) + mem::size_of_val(mesh.indices.as_slice()))
            .sum()
    }
}

impl ChunkUploader for MemoryUploader {
    fn upload(&mut self, chunk_pos: ChunkPos, mesh: &ChunkMeshRaw) -> BufferHandle {
        let handle = BufferHandle(self.next_handle);
        self.next_handle += 1;

        self.meshes.insert(handle, (chunk_pos, mesh.clone()));
        handle
    }

    fn release(&mut self, handle: BufferHandle) {
        debug_assert!(!self.released.contains(&handle), "Chunk buffer {handle:?} released twice");

        if self.meshes.remove(&handle).is_some() {
            self.released.insert(handle);
        } else {
            log::warn!("Released unknown chunk buffer {:?}", handle)
        }
    }
}
