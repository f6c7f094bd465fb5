use std::mem;

use cgmath::Vector3;
use strum::IntoEnumIterator;
use wgpu::{vertex_attr_array, BufferAddress, VertexBufferLayout, VertexStepMode};

use crate::{
    engine::{face::FaceDirection, gpu::Vertex},
    game::world::{Block, BlockBuffer, LightBuffer, CHUNK_SIZE, WORLD_HEIGHT},
    misc::pos::ChunkPos,
};

const VERTICES_PER_FACE: usize = 4;
const INDICES_PER_FACE: usize = 6;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BlockVertex {
    pub pos: [f32; 3],
    pub uv: [f32; 2],
    pub texture_layer: u32,
    pub light: f32,
}

impl Vertex for BlockVertex {
    fn desc<'a>() -> VertexBufferLayout<'a> {
        use wgpu::VertexAttribute;

        static ATTRIBUTES: [VertexAttribute; 4] = vertex_attr_array![
            0 => Float32x3,
            1 => Float32x2,
            2 => Uint32,
            3 => Float32,
        ];

        VertexBufferLayout {
            array_stride: mem::size_of::<Self>() as BufferAddress,
            step_mode: VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// CPU side mesh of one chunk. Positions are in world space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkMeshRaw {
    pub vertices: Vec<BlockVertex>,
    pub indices: Vec<u32>,
    pub chunk_pos: ChunkPos,
}

impl ChunkMeshRaw {
    /// Face-culled mesh of the interior of a chunk. Reads padding for culling and lighting but never emits
    /// faces for padding cells.
    pub fn build(chunk_pos: ChunkPos, blocks: &BlockBuffer, lights: &LightBuffer) -> Self {
        let worst_case_faces = blocks.count_non_empty_interior() * 6;
        let mut vertices = Vec::with_capacity(worst_case_faces * VERTICES_PER_FACE);
        let mut indices = Vec::with_capacity(worst_case_faces * INDICES_PER_FACE);

        let origin = chunk_pos.origin();

        for x in 1..=CHUNK_SIZE as i32 {
            for y in 0..WORLD_HEIGHT as i32 {
                for z in 1..=CHUNK_SIZE as i32 {
                    let pos = Vector3::new(x, y, z);
                    let block = blocks[&pos];
                    let Some(texture_layers) = block.texture_layers() else {
                        continue;
                    };

                    for face in visible_faces(blocks, &pos) {
                        let base_index = vertices.len() as u32;
                        let texture_layer = texture_layers[face.as_index()];
                        let uvs = face.uvs();

                        for (corner_index, corner) in face.corners().iter().enumerate() {
                            vertices.push(BlockVertex {
                                pos: [
                                    (origin.x + x - 1) as f32 + corner[0] as f32,
                                    y as f32 + corner[1] as f32,
                                    (origin.z + z - 1) as f32 + corner[2] as f32,
                                ],
                                uv: uvs[corner_index],
                                texture_layer,
                                light: lights.combined_vertex_light(blocks, &pos, face, corner_index),
                            })
                        }

                        indices.extend_from_slice(&[
                            base_index,
                            base_index + 1,
                            base_index + 2,
                            base_index + 2,
                            base_index + 3,
                            base_index,
                        ]);
                    }
                }
            }
        }

        vertices.shrink_to_fit();
        indices.shrink_to_fit();

        Self {
            vertices,
            indices,
            chunk_pos,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn face_count(&self) -> usize {
        self.indices.len() / INDICES_PER_FACE
    }
}

/// Faces of the cell at `pos` (padded coordinates) that are not hidden by their neighbour.
pub fn visible_faces<'a>(blocks: &'a BlockBuffer, pos: &Vector3<i32>) -> impl Iterator<Item = FaceDirection> + 'a {
    let block = blocks[pos];
    let pos = *pos;

    FaceDirection::iter().filter(move |face| match blocks.get(&(pos + face.as_dir())) {
        Some(neighbour) => face_visible(block, neighbour),
        // Above the world top or below bedrock.
        None => !block.is_empty(),
    })
}

/// Whether `block` shows the face it shares with `neighbour`.
pub fn face_visible(block: Block, neighbour: Block) -> bool {
    match block {
        Block::Air => false,
        Block::Water => !neighbour.is_water(),
        Block::Leaves => neighbour.is_empty() || neighbour.is_leaf(),
        _ => neighbour.is_non_solid(),
    }
}
