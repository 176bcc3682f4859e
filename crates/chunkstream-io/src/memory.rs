use std::collections::HashMap;
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chunkstream_blocks::Cell;
use chunkstream_world::{ChunkDims, ChunkKey};

use crate::{ChunkStorage, StorageError};

/// In-memory store with switchable failures.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    chunks: Mutex<HashMap<ChunkKey, Vec<Cell>>>,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `load` fail with an I/O error.
    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Makes every following `save` fail with an I/O error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn get(&self, key: ChunkKey) -> Option<Vec<Cell>> {
        self.lock().get(&key).cloned()
    }

    pub fn contains(&self, key: ChunkKey) -> bool {
        self.lock().contains_key(&key)
    }

    /// Stores cells directly, bypassing size checks and failure injection.
    pub fn insert_raw(&self, key: ChunkKey, cells: Vec<Cell>) {
        self.lock().insert(key, cells);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ChunkKey, Vec<Cell>>> {
        self.chunks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ChunkStorage for MemoryStorage {
    fn load(&self, key: ChunkKey, dims: ChunkDims) -> Result<Option<Vec<Cell>>, StorageError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(io::Error::other("injected load failure").into());
        }
        match self.lock().get(&key) {
            None => Ok(None),
            Some(cells) if cells.len() != dims.volume() => Err(StorageError::Corrupt {
                key,
                expected: dims.volume(),
                found: cells.len(),
            }),
            Some(cells) => Ok(Some(cells.clone())),
        }
    }

    fn save(&self, key: ChunkKey, dims: ChunkDims, cells: &[Cell]) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(io::Error::other("injected save failure").into());
        }
        if cells.len() != dims.volume() {
            return Err(StorageError::Corrupt {
                key,
                expected: dims.volume(),
                found: cells.len(),
            });
        }
        self.lock().insert(key, cells.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
