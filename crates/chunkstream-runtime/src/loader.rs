use std::sync::{Arc, Mutex, MutexGuard};

use chunkstream_blocks::Cell;
use chunkstream_chunk::{Chunk, ChunkData, Flag};
use chunkstream_io::ChunkStorage;
use chunkstream_world::{ChunkKey, ChunkLayout, TerrainGenerator};
use hashbrown::HashMap;

use crate::LoadError;

/// Produces chunk content from storage, falling back to terrain generation,
/// and writes chunks back.
///
/// Cells of retired chunks whose write-back failed are kept in memory until
/// a retry succeeds. A reload of such a key gets the kept copy, not the
/// stale stored one.
pub struct ChunkLoader {
    layout: ChunkLayout,
    storage: Arc<dyn ChunkStorage>,
    terrain: Arc<dyn TerrainGenerator>,
    unsaved: Mutex<HashMap<ChunkKey, Vec<Cell>>>,
}

impl ChunkLoader {
    pub fn new(
        layout: ChunkLayout,
        storage: Arc<dyn ChunkStorage>,
        terrain: Arc<dyn TerrainGenerator>,
    ) -> Self {
        Self {
            layout,
            storage,
            terrain,
            unsaved: Mutex::new(HashMap::new()),
        }
    }

    fn lock_unsaved(&self) -> MutexGuard<'_, HashMap<ChunkKey, Vec<Cell>>> {
        self.unsaved.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    fn generate(&self, key: ChunkKey) -> Result<Vec<Cell>, LoadError> {
        self.terrain.generate(key, &self.layout).map_err(|source| {
            log::error!("generation failed for {key}: {source}");
            LoadError::Generate { key, source }
        })
    }

    /// Builds a fresh chunk for `key`. Unreadable stored data is replaced by
    /// regenerated content; a failed write-back leaves the chunk marked
    /// changed so eviction retries the save.
    pub fn load<M>(&self, key: ChunkKey) -> Result<Chunk<M>, LoadError> {
        let dims = self.layout.dims;
        let mut kept = self.lock_unsaved();
        // The copy stays kept until a save lands, so a racing load of the
        // same key never falls back to stale storage.
        let (cells, saved) = if let Some(cells) = kept.get(&key).cloned() {
            log::debug!("reloading {key} from its unsaved copy");
            let saved = self.save_cells(key, &cells);
            if saved {
                kept.remove(&key);
            }
            drop(kept);
            (cells, saved)
        } else {
            drop(kept);
            self.read_or_generate(key)?
        };
        let chunk = Chunk::new(
            key,
            self.layout.chunk_bounds(key),
            ChunkData::from_cells(dims, cells),
        );
        if !saved {
            chunk.flags().set(Flag::ChangedSinceLoad);
        }
        Ok(chunk)
    }

    fn read_or_generate(&self, key: ChunkKey) -> Result<(Vec<Cell>, bool), LoadError> {
        let dims = self.layout.dims;
        Ok(match self.storage.load(key, dims) {
            Ok(Some(cells)) => (cells, true),
            Ok(None) => {
                let cells = self.generate(key)?;
                let saved = self.save_cells(key, &cells);
                (cells, saved)
            }
            Err(e) => {
                log::warn!("reading chunk {key} failed ({e}); regenerating");
                let cells = self.generate(key)?;
                let saved = self.save_cells(key, &cells);
                (cells, saved)
            }
        })
    }

    fn save_cells(&self, key: ChunkKey, cells: &[Cell]) -> bool {
        match self.storage.save(key, self.layout.dims, cells) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("writing chunk {key} failed: {e}");
                false
            }
        }
    }

    /// Writes a chunk's cells if it has unsaved changes. Returns whether the
    /// chunk is clean afterwards.
    pub fn persist<M>(&self, chunk: &Chunk<M>) -> bool {
        if !chunk.is_dirty() {
            return true;
        }
        let data = chunk.lock_data();
        if !self.save_cells(chunk.key(), data.cells()) {
            return false;
        }
        self.lock_unsaved().remove(&chunk.key());
        // Cleared under the lock so a concurrent edit re-dirties after us.
        chunk.flags().clear(Flag::ChangedSinceLoad);
        true
    }

    /// Saves if dirty, then disposes; returns the render state to release.
    /// A failed save keeps a copy of the cells for [`ChunkLoader::retry_unsaved`].
    pub fn retire<M>(&self, chunk: &Chunk<M>) -> Option<M> {
        let key = chunk.key();
        chunk.retire(|data| {
            let mut kept = self.lock_unsaved();
            if self.save_cells(key, data.cells()) {
                kept.remove(&key);
            } else {
                log::warn!("keeping unsaved cells of {key} for a later retry");
                kept.insert(key, data.cells().to_vec());
            }
            true
        })
    }

    /// Retries the write-back of every kept copy. Returns how many are
    /// still unsaved. Loads of kept keys wait for the retry to finish.
    ///
    /// A resident chunk loaded from a kept copy may hold newer edits than
    /// the copy, so callers persist resident chunks after this, not before.
    pub fn retry_unsaved(&self) -> usize {
        let mut kept = self.lock_unsaved();
        kept.retain(|key, cells| !self.save_cells(*key, cells));
        kept.len()
    }

    pub fn unsaved_len(&self) -> usize {
        self.lock_unsaved().len()
    }
}
