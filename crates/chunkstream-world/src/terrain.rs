use std::error::Error;
use std::fmt;

use chunkstream_blocks::Cell;
use fastnoise_lite::{FastNoiseLite, NoiseType};

use crate::config::{TerrainKind, TerrainSection};
use crate::{ChunkKey, ChunkLayout};

#[derive(Debug)]
pub enum GenerateError {
    /// The generator does not produce content for this key.
    OutOfWorld(ChunkKey),
    Failed { key: ChunkKey, reason: String },
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::OutOfWorld(key) => write!(f, "chunk {key} lies outside the world"),
            GenerateError::Failed { key, reason } => {
                write!(f, "generating chunk {key} failed: {reason}")
            }
        }
    }
}

impl Error for GenerateError {}

/// Produces the initial cells of a chunk that storage has never seen.
/// Output is in `ChunkDims::idx` order and exactly `dims.volume()` long.
pub trait TerrainGenerator: Send + Sync {
    fn generate(&self, key: ChunkKey, layout: &ChunkLayout) -> Result<Vec<Cell>, GenerateError>;
}

fn fill_columns(
    key: ChunkKey,
    layout: &ChunkLayout,
    mut column: impl FnMut(i32, i32) -> i32,
    water_level: i32,
) -> Vec<Cell> {
    let d = layout.dims;
    let mut cells = vec![Cell::AIR; d.volume()];
    for z in 0..d.sz {
        for x in 0..d.sx {
            let (wx, _, wz) = layout.world_cell(key, x, 0, z);
            let h = column(wx, wz);
            for y in 0..d.sy {
                let (_, wy, _) = layout.world_cell(key, x, y, z);
                let cell = if wy <= h {
                    Cell::SOLID
                } else if wy <= water_level {
                    Cell::WATER
                } else {
                    continue;
                };
                cells[d.idx(x, y, z)] = cell;
            }
        }
    }
    cells
}

/// Solid up to a fixed world row, optionally flooded above it.
#[derive(Clone, Copy, Debug)]
pub struct FlatTerrain {
    pub height: i32,
    pub water_level: i32,
}

impl FlatTerrain {
    pub fn new(height: i32) -> Self {
        Self {
            height,
            water_level: i32::MIN,
        }
    }
}

impl TerrainGenerator for FlatTerrain {
    fn generate(&self, key: ChunkKey, layout: &ChunkLayout) -> Result<Vec<Cell>, GenerateError> {
        Ok(fill_columns(key, layout, |_, _| self.height, self.water_level))
    }
}

/// Rolling 2-D height field.
#[derive(Clone, Copy, Debug)]
pub struct NoiseTerrain {
    pub seed: i32,
    pub amplitude: f32,
    pub frequency: f32,
    pub water_level: i32,
}

impl NoiseTerrain {
    fn make_noise(&self) -> FastNoiseLite {
        let mut n = FastNoiseLite::with_seed(self.seed);
        n.set_noise_type(Some(NoiseType::OpenSimplex2));
        n.set_frequency(Some(self.frequency));
        n
    }
}

impl TerrainGenerator for NoiseTerrain {
    fn generate(&self, key: ChunkKey, layout: &ChunkLayout) -> Result<Vec<Cell>, GenerateError> {
        let noise = self.make_noise();
        let amplitude = self.amplitude;
        Ok(fill_columns(
            key,
            layout,
            |wx, wz| (noise.get_noise_2d(wx as f32, wz as f32) * amplitude).round() as i32,
            self.water_level,
        ))
    }
}

pub fn terrain_from_config(cfg: &TerrainSection) -> Box<dyn TerrainGenerator> {
    match cfg.kind {
        TerrainKind::Flat => Box::new(FlatTerrain {
            height: cfg.flat_height,
            water_level: cfg.water_level,
        }),
        TerrainKind::Noise => Box::new(NoiseTerrain {
            seed: cfg.seed,
            amplitude: cfg.amplitude,
            frequency: cfg.frequency,
            water_level: cfg.water_level,
        }),
    }
}
