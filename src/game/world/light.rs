use std::{collections::VecDeque, iter, ops::Index, sync::Arc};

use block_mesh::ndshape::ConstShape;
use cgmath::Vector3;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    engine::face::FaceDirection,
    game::world::{
        block::{for_each_padding_cell, linearize},
        Block, BlockBuffer, ChunkShape, CHUNK_SIZE, WORLD_HEIGHT,
    },
    misc::pos::{ChunkPos, Side},
};

pub const MAX_LIGHT_VAL: u8 = 15;

const LIGHT_DIRECTIONS: [Vector3<i32>; 6] = [
    Vector3::new(1, 0, 0),
    Vector3::new(-1, 0, 0),
    Vector3::new(0, 1, 0),
    Vector3::new(0, -1, 0),
    Vector3::new(0, 0, 1),
    Vector3::new(0, 0, -1),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightChannel {
    Sun,
    Block,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LightVal {
    pub sun: u8,
    pub block: u8,
}

impl LightVal {
    pub const fn new(sun: u8, block: u8) -> Self {
        Self { sun, block }
    }

    pub const fn get(&self, channel: LightChannel) -> u8 {
        match channel {
            LightChannel::Sun => self.sun,
            LightChannel::Block => self.block,
        }
    }

    pub fn set(&mut self, channel: LightChannel, val: u8) {
        debug_assert!(val <= MAX_LIGHT_VAL);

        match channel {
            LightChannel::Sun => self.sun = val,
            LightChannel::Block => self.block = val,
        }
    }
}

/// Light grid of one chunk, same padded shape as its `BlockBuffer`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LightBuffer {
    buffer: Vec<LightVal>,
}

impl LightBuffer {
    /// Computes initial lighting: a straight-down sunlight scan per interior column, then block light
    /// flood-filled out of every emitting cell.
    pub fn new(blocks: &BlockBuffer) -> Self {
        let mut lights = Self::new_unlit();

        for x in 1..=CHUNK_SIZE as i32 {
            for z in 1..=CHUNK_SIZE as i32 {
                let mut current_light = MAX_LIGHT_VAL;

                for y in (0..WORLD_HEIGHT as i32).rev() {
                    let pos = Vector3::new(x, y, z);
                    match blocks[&pos] {
                        Block::Air => (),
                        Block::Leaves => current_light = current_light.saturating_sub(1),
                        _ => current_light = 0,
                    }
                    lights.set(&pos, LightChannel::Sun, current_light);
                }
            }
        }

        for x in 1..=CHUNK_SIZE as i32 {
            for y in 0..WORLD_HEIGHT as i32 {
                for z in 1..=CHUNK_SIZE as i32 {
                    let pos = Vector3::new(x, y, z);
                    let emission = blocks[&pos].light_emission();
                    if emission > 0 {
                        lights.flood_fill(blocks, pos, emission, LightChannel::Block)
                    }
                }
            }
        }

        lights
    }

    pub fn new_unlit() -> Self {
        Self {
            buffer: Vec::from_iter(iter::repeat(LightVal::default()).take(ChunkShape::SIZE as usize)),
        }
    }

    pub fn get(&self, pos: &Vector3<i32>) -> Option<LightVal> {
        if BlockBuffer::in_bounds(pos) {
            Some(self[pos])
        } else {
            None
        }
    }

    pub fn set(&mut self, pos: &Vector3<i32>, channel: LightChannel, val: u8) {
        self.buffer[linearize(pos)].set(channel, val)
    }

    /// Breadth-first spread of `level` from `start`, losing one level per step. Only air and leaf cells
    /// are entered and no cell is ever darkened.
    pub fn flood_fill(&mut self, blocks: &BlockBuffer, start: Vector3<i32>, level: u8, channel: LightChannel) {
        let mut queue = VecDeque::from([(start, level)]);
        let mut processed = FxHashSet::default();

        while let Some((pos, current_light)) = queue.pop_front() {
            if !BlockBuffer::in_bounds(&pos) || !processed.insert(pos) {
                continue;
            }

            if self[&pos].get(channel) < current_light {
                self.set(&pos, channel, current_light);
            }

            if current_light == 0 {
                continue;
            }
            let next_light = current_light - 1;

            for dir in LIGHT_DIRECTIONS {
                let neighbour = pos + dir;
                if let Some(block) = blocks.get(&neighbour) {
                    if block.is_light_passable() && self[&neighbour].get(channel) < next_light {
                        queue.push_back((neighbour, next_light))
                    }
                }
            }
        }
    }

    /// Local fix-up after the block at `pos` changed from `old` to `new`.
    ///
    /// Removing a block pulls light in from the brightest interior neighbour. Placing one only zeroes the
    /// cell itself, so light that used to pass through it stays behind until the chunk is relit.
    pub fn repair(&mut self, blocks: &BlockBuffer, pos: Vector3<i32>, old: Block, new: Block) {
        if new.is_empty() && !old.is_empty() {
            for channel in [LightChannel::Sun, LightChannel::Block] {
                let max_neighbour = LIGHT_DIRECTIONS
                    .iter()
                    .map(|dir| pos + dir)
                    .filter(is_interior)
                    .map(|neighbour| self[&neighbour].get(channel))
                    .max()
                    .unwrap_or(0);

                if max_neighbour > 1 {
                    self.flood_fill(blocks, pos, max_neighbour - 1, channel)
                }
            }
        } else if old.is_empty() && !new.is_empty() {
            self.buffer[linearize(&pos)] = LightVal::default();
        }
    }

    /// Copies the facing interior slice of `neighbour` into the padding slice on `side`, corners included.
    /// Returns whether any padding value changed.
    pub fn sync_padding(&mut self, side: Side, neighbour: &LightBuffer) -> bool {
        let mut changed = false;
        for_each_padding_cell(side, |own, theirs| {
            let val = neighbour[&theirs];
            let cell = &mut self.buffer[linearize(&own)];
            if *cell != val {
                *cell = val;
                changed = true;
            }
        });
        changed
    }

    /// Light of one channel at a face corner of the cell at `pos`: the average of the four cells in front of
    /// the corner, darkened by ambient occlusion. Samples outside the grid count as fully lit.
    pub fn sample_vertex_light(
        &self,
        blocks: &BlockBuffer,
        pos: &Vector3<i32>,
        face: FaceDirection,
        corner: usize,
        channel: LightChannel,
    ) -> f32 {
        let base = pos + face.as_dir();
        let vertex = face.corners()[corner];
        let (tangent_axis, bitangent_axis) = face.tangent_axes();

        let mut tangent = Vector3::new(0, 0, 0);
        tangent[tangent_axis] = if vertex[tangent_axis] == 1 { 1 } else { -1 };
        let mut bitangent = Vector3::new(0, 0, 0);
        bitangent[bitangent_axis] = if vertex[bitangent_axis] == 1 { 1 } else { -1 };

        let mut light_sum = 0.0;
        let mut occluders = 0;
        for sample in [base + tangent + bitangent, base + tangent, base + bitangent, base] {
            match (self.get(&sample), blocks.get(&sample)) {
                (Some(light), Some(block)) => {
                    light_sum += light.get(channel) as f32;
                    if block.is_occluder() {
                        occluders += 1
                    }
                }
                _ => light_sum += MAX_LIGHT_VAL as f32,
            }
        }

        (light_sum / 4.0) * ao_factor(occluders)
    }

    /// Brighter of both channels at a corner, with the face's directional shading applied.
    pub fn combined_vertex_light(&self, blocks: &BlockBuffer, pos: &Vector3<i32>, face: FaceDirection, corner: usize) -> f32 {
        let sun = self.sample_vertex_light(blocks, pos, face, corner, LightChannel::Sun);
        let block = self.sample_vertex_light(blocks, pos, face, corner, LightChannel::Block);

        sun.max(block) * face.shading()
    }
}

impl Index<&Vector3<i32>> for LightBuffer {
    type Output = LightVal;

    fn index(&self, index: &Vector3<i32>) -> &Self::Output {
        &self.buffer[linearize(index)]
    }
}

pub fn ao_factor(occluders: u32) -> f32 {
    match occluders {
        0 => 1.0,
        1 => 0.9,
        2 => 0.75,
        _ => 0.6,
    }
}

fn is_interior(pos: &Vector3<i32>) -> bool {
    (1..=CHUNK_SIZE as i32).contains(&pos.x)
        && (0..WORLD_HEIGHT as i32).contains(&pos.y)
        && (1..=CHUNK_SIZE as i32).contains(&pos.z)
}

/// Light grids of every lit chunk.
#[derive(Debug, Default)]
pub struct LightingEngine {
    lights: FxHashMap<ChunkPos, Arc<LightBuffer>>,
}

impl LightingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init_chunk(&mut self, chunk_pos: ChunkPos, blocks: &BlockBuffer) -> Arc<LightBuffer> {
        let lights = Arc::new(LightBuffer::new(blocks));
        self.lights.insert(chunk_pos, lights.clone());
        lights
    }

    pub fn get(&self, chunk_pos: &ChunkPos) -> Option<Arc<LightBuffer>> {
        self.lights.get(chunk_pos).cloned()
    }

    pub fn contains(&self, chunk_pos: &ChunkPos) -> bool {
        self.lights.contains_key(chunk_pos)
    }

    pub fn remove(&mut self, chunk_pos: &ChunkPos) -> Option<Arc<LightBuffer>> {
        self.lights.remove(chunk_pos)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&ChunkPos) -> bool) {
        self.lights.retain(|chunk_pos, _| keep(chunk_pos))
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Repairs the light of `chunk_pos` after a block edit. No-op for unlit chunks.
    pub fn update_at(&mut self, chunk_pos: &ChunkPos, blocks: &BlockBuffer, pos: Vector3<i32>, old: Block, new: Block) {
        if let Some(lights) = self.lights.get_mut(chunk_pos) {
            Arc::make_mut(lights).repair(blocks, pos, old, new)
        }
    }

    /// Pulls padding from every lit neighbour. Returns whether the padding of `chunk_pos` changed.
    pub fn sync_padding(&mut self, chunk_pos: &ChunkPos) -> bool {
        if !self.lights.contains_key(chunk_pos) {
            return false;
        }

        let neighbours = chunk_pos
            .neighbours()
            .into_iter()
            .filter_map(|(side, neighbour_pos)| self.lights.get(&neighbour_pos).map(|n| (side, n.clone())))
            .collect::<Vec<_>>();

        let mut changed = false;
        if let Some(lights) = self.lights.get_mut(chunk_pos) {
            for (side, neighbour) in neighbours {
                // Skip the copy-on-write clone when nothing would change.
                if lights.padding_differs(side, &neighbour) {
                    changed |= Arc::make_mut(lights).sync_padding(side, &neighbour);
                }
            }
        }
        changed
    }
}

impl LightBuffer {
    fn padding_differs(&self, side: Side, neighbour: &LightBuffer) -> bool {
        let mut differs = false;
        for_each_padding_cell(side, |own, theirs| differs |= self[&own] != neighbour[&theirs]);
        differs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stone_floor(height: i32) -> BlockBuffer {
        let mut blocks = BlockBuffer::new_empty();
        for x in 0..18 {
            for z in 0..18 {
                for y in 0..height {
                    blocks.set(&Vector3::new(x, y, z), Block::Stone);
                }
            }
        }
        blocks
    }

    #[test]
    fn sunlight_stops_at_first_opaque_cell() {
        let blocks = stone_floor(10);
        let lights = LightBuffer::new(&blocks);

        assert_eq!(lights[&Vector3::new(5, 63, 5)].sun, MAX_LIGHT_VAL);
        assert_eq!(lights[&Vector3::new(5, 10, 5)].sun, MAX_LIGHT_VAL);
        assert_eq!(lights[&Vector3::new(5, 9, 5)].sun, 0);
        assert_eq!(lights[&Vector3::new(5, 0, 5)].sun, 0);
        // Padding is left for neighbours to fill in.
        assert_eq!(lights[&Vector3::new(0, 63, 5)].sun, 0);
    }

    #[test]
    fn leaves_attenuate_sunlight() {
        let mut blocks = stone_floor(10);
        blocks.set(&Vector3::new(4, 20, 4), Block::Leaves);
        blocks.set(&Vector3::new(4, 19, 4), Block::Leaves);
        let lights = LightBuffer::new(&blocks);

        assert_eq!(lights[&Vector3::new(4, 20, 4)].sun, 14);
        assert_eq!(lights[&Vector3::new(4, 19, 4)].sun, 13);
        assert_eq!(lights[&Vector3::new(4, 18, 4)].sun, 13);
    }

    #[test]
    fn water_blocks_sunlight() {
        let mut blocks = stone_floor(10);
        blocks.set(&Vector3::new(3, 12, 3), Block::Water);
        let lights = LightBuffer::new(&blocks);

        assert_eq!(lights[&Vector3::new(3, 12, 3)].sun, 0);
        assert_eq!(lights[&Vector3::new(3, 11, 3)].sun, 0);
    }

    #[test]
    fn flood_fill_respects_distance_bound() {
        let blocks = BlockBuffer::new_empty();
        let mut lights = LightBuffer::new_unlit();
        let start = Vector3::new(9, 30, 9);
        lights.flood_fill(&blocks, start, 10, LightChannel::Block);

        assert_eq!(lights[&start].block, 10);
        for x in 0..18i32 {
            for z in 0..18i32 {
                for y in 20..40i32 {
                    let pos = Vector3::new(x, y, z);
                    let distance = (x - 9).abs() + (y - 30).abs() + (z - 9).abs();
                    assert_eq!(lights[&pos].block as i32, (10 - distance).max(0), "{pos:?}");
                }
            }
        }
        assert!(lights.buffer.iter().all(|val| val.sun == 0));
    }

    #[test]
    fn flood_fill_does_not_enter_solid_cells() {
        let blocks = stone_floor(30);
        let mut lights = LightBuffer::new_unlit();
        lights.flood_fill(&blocks, Vector3::new(9, 30, 9), 10, LightChannel::Block);

        assert_eq!(lights[&Vector3::new(9, 29, 9)].block, 0);
        assert_eq!(lights[&Vector3::new(9, 31, 9)].block, 9);
    }

    #[test]
    fn digging_pulls_light_into_the_hole() {
        let mut blocks = stone_floor(10);
        let mut lights = LightBuffer::new(&blocks);
        let hole = Vector3::new(5, 9, 5);

        blocks.set(&hole, Block::Air);
        lights.repair(&blocks, hole, Block::Stone, Block::Air);

        assert_eq!(lights[&hole].sun, MAX_LIGHT_VAL - 1);
        // Neighbours are never darkened.
        assert_eq!(lights[&Vector3::new(5, 10, 5)].sun, MAX_LIGHT_VAL);
    }

    #[test]
    fn placing_zeroes_only_the_cell() {
        let mut blocks = stone_floor(10);
        let mut lights = LightBuffer::new(&blocks);
        let placed = Vector3::new(5, 10, 5);

        blocks.set(&placed, Block::Stone);
        lights.repair(&blocks, placed, Block::Air, Block::Stone);

        assert_eq!(lights[&placed], LightVal::new(0, 0));
        assert_eq!(lights[&Vector3::new(5, 11, 5)].sun, MAX_LIGHT_VAL);
        assert_eq!(lights[&Vector3::new(6, 10, 5)].sun, MAX_LIGHT_VAL);
    }

    #[test]
    fn padding_sync_copies_corners_and_reports_changes() {
        let mut neighbour = LightBuffer::new_unlit();
        neighbour.set(&Vector3::new(16, 3, 0), LightChannel::Sun, 7);
        neighbour.set(&Vector3::new(16, 3, 17), LightChannel::Block, 4);

        let mut own = LightBuffer::new_unlit();
        assert!(own.sync_padding(Side::West, &neighbour));
        assert_eq!(own[&Vector3::new(0, 3, 0)].sun, 7);
        assert_eq!(own[&Vector3::new(0, 3, 17)].block, 4);

        assert!(!own.sync_padding(Side::West, &neighbour));
    }

    #[test]
    fn ao_factors() {
        assert_eq!(ao_factor(0), 1.0);
        assert_eq!(ao_factor(1), 0.9);
        assert_eq!(ao_factor(2), 0.75);
        assert_eq!(ao_factor(3), 0.6);
        assert_eq!(ao_factor(4), 0.6);
    }

    #[test]
    fn vertex_light_counts_occluders_in_front_of_corner() {
        let mut blocks = stone_floor(10);
        // Wall on the -x side of the cell above (5, 9, 5).
        blocks.set(&Vector3::new(4, 10, 5), Block::Stone);
        blocks.set(&Vector3::new(4, 10, 4), Block::Stone);
        let lights = LightBuffer::new(&blocks);

        let pos = Vector3::new(5, 9, 5);
        // Corner 0 of the top face is (0, 1, 0): samples (4,10,4), (4,10,5), (5,10,4), (5,10,5).
        let light = lights.sample_vertex_light(&blocks, &pos, FaceDirection::Top, 0, LightChannel::Sun);
        assert_eq!(light, (0.0 + 0.0 + 15.0 + 15.0) / 4.0 * 0.75);

        // Corner 2 is (1, 1, 1) and sees only open sky.
        let light = lights.sample_vertex_light(&blocks, &pos, FaceDirection::Top, 2, LightChannel::Sun);
        assert_eq!(light, 15.0);
    }

    #[test]
    fn samples_outside_the_grid_count_as_full_light() {
        let blocks = BlockBuffer::new_empty();
        let lights = LightBuffer::new_unlit();

        let light = lights.sample_vertex_light(&blocks, &Vector3::new(5, 63, 5), FaceDirection::Top, 0, LightChannel::Sun);
        assert_eq!(light, 15.0);

        let light = lights.sample_vertex_light(&blocks, &Vector3::new(5, 63, 5), FaceDirection::North, 1, LightChannel::Sun);
        // Two samples above the grid, two inside and unlit.
        assert_eq!(light, 7.5);
    }

    #[test]
    fn engine_copy_on_write_keeps_snapshots() {
        let mut engine = LightingEngine::new();
        let blocks = stone_floor(10);
        let a = ChunkPos::new(0, 0);
        let snapshot = engine.init_chunk(a, &blocks);

        let mut dug = blocks.clone();
        dug.set(&Vector3::new(5, 9, 5), Block::Air);
        engine.update_at(&a, &dug, Vector3::new(5, 9, 5), Block::Stone, Block::Air);

        assert_eq!(snapshot[&Vector3::new(5, 9, 5)].sun, 0);
        assert_eq!(engine.get(&a).map(|l| l[&Vector3::new(5, 9, 5)].sun), Some(14));
    }

    #[test]
    fn engine_syncs_with_present_neighbours_only() {
        let mut engine = LightingEngine::new();
        let blocks = stone_floor(10);
        let a = ChunkPos::new(0, 0);
        engine.init_chunk(a, &blocks);
        assert!(!engine.sync_padding(&a));

        engine.init_chunk(a.offset(1, 0), &blocks);
        assert!(engine.sync_padding(&a));
        assert_eq!(engine.get(&a).map(|l| l[&Vector3::new(17, 20, 5)].sun), Some(MAX_LIGHT_VAL));
        assert!(!engine.sync_padding(&a));
    }
}
