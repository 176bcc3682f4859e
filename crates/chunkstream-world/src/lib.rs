//! Chunk addressing, world layout, stream configuration and terrain sources.
#![forbid(unsafe_code)]

mod chunk_key;
pub mod config;
mod layout;
pub mod terrain;

pub use chunk_key::ChunkKey;
pub use config::{StreamConfig, WorkerSplit, load_config_from_path, load_config_from_str};
pub use layout::{ChunkDims, ChunkLayout};
pub use terrain::{
    FlatTerrain, GenerateError, NoiseTerrain, TerrainGenerator, terrain_from_config,
};
