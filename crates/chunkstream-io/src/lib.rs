//! Chunk persistence: the storage seam and two implementations.
#![forbid(unsafe_code)]

mod dir;
mod error;
mod memory;

pub use dir::DirStorage;
pub use error::StorageError;
pub use memory::MemoryStorage;

use chunkstream_blocks::Cell;
use chunkstream_world::{ChunkDims, ChunkKey};

/// Persists chunk cells. Light and render state are derived and never
/// stored.
pub trait ChunkStorage: Send + Sync {
    /// `Ok(None)` when nothing was ever stored for `key`.
    fn load(&self, key: ChunkKey, dims: ChunkDims) -> Result<Option<Vec<Cell>>, StorageError>;

    fn save(&self, key: ChunkKey, dims: ChunkDims, cells: &[Cell]) -> Result<(), StorageError>;
}

impl<S: ChunkStorage + ?Sized> ChunkStorage for std::sync::Arc<S> {
    fn load(&self, key: ChunkKey, dims: ChunkDims) -> Result<Option<Vec<Cell>>, StorageError> {
        (**self).load(key, dims)
    }

    fn save(&self, key: ChunkKey, dims: ChunkDims, cells: &[Cell]) -> Result<(), StorageError> {
        (**self).save(key, dims, cells)
    }
}
