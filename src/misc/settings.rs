use serde::{Deserialize, Serialize};

use crate::{game::world::generate_seed, TITLE};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// World seed. A random one is drawn when unset.
    pub seed: Option<u32>,
    /// Chunks are loaded within this Euclidean chunk distance around the viewer.
    pub render_distance: u32,
    /// Extra distance past `render_distance` before a chunk is unloaded.
    pub unload_buffer: u32,
    pub worker_count: usize,
    /// Terrain results merged per tick.
    pub max_chunks_per_tick: usize,
    /// Mesh results uploaded per tick.
    pub max_meshes_per_tick: usize,
}

impl Settings {
    pub fn load_from_file() -> Self {
        match confy::load(TITLE, Some(TITLE)) {
            Ok(settings) => settings,
            Err(e) => {
                log::error!("Failed to load config from file - {}", e);
                Settings::default()
            }
        }
    }

    pub fn reload(&mut self) {
        *self = Settings::load_from_file();
    }

    pub fn save(&self) {
        if let Err(e) = confy::store(TITLE, Some(TITLE), self.clone()) {
            log::error!("Failed to save config to file - {}", e)
        }
    }

    pub fn seed_or_random(&self) -> u32 {
        self.seed.unwrap_or_else(generate_seed)
    }

    /// Chunks farther than this, in chunk units, get evicted.
    pub fn unload_distance(&self) -> u32 {
        self.render_distance + self.unload_buffer
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: None,
            render_distance: if cfg!(debug_assertions) { 2 } else { 11 },
            unload_buffer: if cfg!(debug_assertions) { 1 } else { 10 },
            worker_count: if cfg!(debug_assertions) { 2 } else { 8 },
            max_chunks_per_tick: 1,
            max_meshes_per_tick: 3,
        }
    }
}
