use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;

use crate::{ChunkDims, ChunkLayout};

/// Tunables of the streaming core, read from TOML. Every field has a default
/// so an empty file is a valid configuration.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StreamConfig {
    #[serde(default)]
    pub chunk: ChunkSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub stream: StreamSection,
    #[serde(default)]
    pub queues: QueueSection,
    #[serde(default)]
    pub workers: WorkerSection,
    #[serde(default)]
    pub publish: PublishSection,
    #[serde(default)]
    pub terrain: TerrainSection,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChunkSection {
    #[serde(default = "default_cells")]
    pub cells_x: usize,
    #[serde(default = "default_cells")]
    pub cells_y: usize,
    #[serde(default = "default_cells")]
    pub cells_z: usize,
    #[serde(default = "default_cell_size")]
    pub cell_size: f32,
}
fn default_cells() -> usize {
    16
}
fn default_cell_size() -> f32 {
    1.0
}
impl Default for ChunkSection {
    fn default() -> Self {
        Self {
            cells_x: default_cells(),
            cells_y: default_cells(),
            cells_z: default_cells(),
            cell_size: default_cell_size(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}
fn default_cache_capacity() -> usize {
    100
}
impl Default for CacheSection {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct StreamSection {
    #[serde(default = "default_load_radius")]
    pub load_radius: i32,
    #[serde(default = "default_load_radius_y")]
    pub load_radius_y: i32,
}
fn default_load_radius() -> i32 {
    5
}
fn default_load_radius_y() -> i32 {
    1
}
impl Default for StreamSection {
    fn default() -> Self {
        Self {
            load_radius: default_load_radius(),
            load_radius_y: default_load_radius_y(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct QueueSection {
    #[serde(default = "default_queue_capacity")]
    pub load_capacity: usize,
    #[serde(default = "default_queue_capacity")]
    pub update_capacity: usize,
}
fn default_queue_capacity() -> usize {
    100
}
impl Default for QueueSection {
    fn default() -> Self {
        Self {
            load_capacity: default_queue_capacity(),
            update_capacity: default_queue_capacity(),
        }
    }
}

/// Pool sizes; 0 means "derive from available parallelism".
#[derive(Clone, Debug, Default, Deserialize)]
pub struct WorkerSection {
    #[serde(default)]
    pub load: usize,
    #[serde(default)]
    pub update: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PublishSection {
    #[serde(default = "default_publish_interval_ms")]
    pub interval_ms: u64,
}
fn default_publish_interval_ms() -> u64 {
    100
}
impl Default for PublishSection {
    fn default() -> Self {
        Self {
            interval_ms: default_publish_interval_ms(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TerrainKind {
    Noise,
    Flat,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TerrainSection {
    #[serde(default = "default_terrain_kind")]
    pub kind: TerrainKind,
    #[serde(default = "default_seed")]
    pub seed: i32,
    /// World-space cell row below which flat terrain is solid.
    #[serde(default)]
    pub flat_height: i32,
    #[serde(default = "default_water_level")]
    pub water_level: i32,
    #[serde(default = "default_amplitude")]
    pub amplitude: f32,
    #[serde(default = "default_frequency")]
    pub frequency: f32,
}
fn default_terrain_kind() -> TerrainKind {
    TerrainKind::Noise
}
fn default_seed() -> i32 {
    0x0dea_dbee
}
fn default_water_level() -> i32 {
    -4
}
fn default_amplitude() -> f32 {
    12.0
}
fn default_frequency() -> f32 {
    0.02
}
impl Default for TerrainSection {
    fn default() -> Self {
        Self {
            kind: default_terrain_kind(),
            seed: default_seed(),
            flat_height: 0,
            water_level: default_water_level(),
            amplitude: default_amplitude(),
            frequency: default_frequency(),
        }
    }
}

/// Hardware-derived split between load and update workers. Loads are biased
/// three to one over updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerSplit {
    pub load: usize,
    pub update: usize,
}

impl WorkerSplit {
    pub fn from_parallelism(cpus: usize) -> Self {
        let base = 1 + cpus / 3;
        Self {
            load: base * 3,
            update: base,
        }
    }
}

impl StreamConfig {
    /// Clamps degenerate values so every later consumer can assume non-zero
    /// sizes.
    pub fn sanitized(mut self) -> Self {
        fn at_least_one(v: &mut usize, what: &str) {
            if *v == 0 {
                log::warn!("config: {} must be positive; using 1", what);
                *v = 1;
            }
        }
        at_least_one(&mut self.chunk.cells_x, "chunk.cells_x");
        at_least_one(&mut self.chunk.cells_y, "chunk.cells_y");
        at_least_one(&mut self.chunk.cells_z, "chunk.cells_z");
        at_least_one(&mut self.cache.capacity, "cache.capacity");
        at_least_one(&mut self.queues.load_capacity, "queues.load_capacity");
        at_least_one(&mut self.queues.update_capacity, "queues.update_capacity");
        if !(self.chunk.cell_size > 0.0 && self.chunk.cell_size.is_finite()) {
            log::warn!(
                "config: chunk.cell_size {} is invalid; using 1.0",
                self.chunk.cell_size
            );
            self.chunk.cell_size = 1.0;
        }
        if self.stream.load_radius < 0 || self.stream.load_radius_y < 0 {
            log::warn!("config: negative load radius clamped to 0");
            self.stream.load_radius = self.stream.load_radius.max(0);
            self.stream.load_radius_y = self.stream.load_radius_y.max(0);
        }
        if self.publish.interval_ms == 0 {
            log::warn!("config: publish.interval_ms must be positive; using 1");
            self.publish.interval_ms = 1;
        }
        self
    }

    pub fn dims(&self) -> ChunkDims {
        ChunkDims::new(self.chunk.cells_x, self.chunk.cells_y, self.chunk.cells_z)
    }

    pub fn layout(&self) -> ChunkLayout {
        ChunkLayout::new(self.dims(), self.chunk.cell_size)
    }

    /// Worker counts with zero entries filled from `cpus`.
    pub fn worker_split(&self, cpus: usize) -> WorkerSplit {
        let derived = WorkerSplit::from_parallelism(cpus);
        WorkerSplit {
            load: if self.workers.load > 0 {
                self.workers.load
            } else {
                derived.load
            },
            update: if self.workers.update > 0 {
                self.workers.update
            } else {
                derived.update
            },
        }
    }
}

pub fn load_config_from_str(s: &str) -> Result<StreamConfig, Box<dyn Error>> {
    let cfg: StreamConfig = toml::from_str(s)?;
    Ok(cfg.sanitized())
}

pub fn load_config_from_path(path: &Path) -> Result<StreamConfig, Box<dyn Error>> {
    let s = fs::read_to_string(path)?;
    load_config_from_str(&s)
}
