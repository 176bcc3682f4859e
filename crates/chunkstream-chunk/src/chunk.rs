use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chunkstream_blocks::Cell;
use chunkstream_geom::{Aabb, Ray};
use chunkstream_world::ChunkKey;

use crate::raycast::{CellHit, first_solid_cell};
use crate::{ChunkData, ChunkFlags, Flag};

/// One resident chunk. `M` is the render state produced by the mesh
/// builder; the chunk only stores and hands it back.
///
/// Lock order: the data lock may be held while taking the render lock, never
/// the other way round. Two chunks' data locks are never held together.
pub struct Chunk<M> {
    key: ChunkKey,
    bounds: Aabb,
    flags: ChunkFlags,
    access: AtomicU64,
    data: Mutex<ChunkData>,
    render: Mutex<Option<M>>,
}

impl<M> Chunk<M> {
    pub fn new(key: ChunkKey, bounds: Aabb, data: ChunkData) -> Self {
        let empty = !data.has_non_air();
        Self {
            key,
            bounds,
            flags: ChunkFlags::new_chunk(empty),
            access: AtomicU64::new(0),
            data: Mutex::new(data),
            render: Mutex::new(None),
        }
    }

    #[inline]
    pub fn key(&self) -> ChunkKey {
        self.key
    }

    #[inline]
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    #[inline]
    pub fn flags(&self) -> &ChunkFlags {
        &self.flags
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.flags.contains(Flag::Empty)
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.flags.is_disposed()
    }

    #[inline]
    pub fn needs_rebuild(&self) -> bool {
        self.flags.contains(Flag::RebuildRequired)
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.flags.contains(Flag::Visible)
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.flags.contains(Flag::ChangedSinceLoad)
    }

    /// Eviction score; larger is more recently used.
    #[inline]
    pub fn access_stamp(&self) -> u64 {
        self.access.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn stamp_access(&self, tick: u64) {
        self.access.fetch_max(tick, Ordering::Relaxed);
    }

    /// Locks the cell and light arrays. A poisoned lock is recovered; the
    /// arrays are plain data and stay consistent cell by cell.
    pub fn lock_data(&self) -> MutexGuard<'_, ChunkData> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_render(&self) -> MutexGuard<'_, Option<M>> {
        self.render.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn cell(&self, x: usize, y: usize, z: usize) -> Cell {
        self.lock_data().cell(x, y, z)
    }

    /// Writes one cell under the data lock and marks the chunk changed and
    /// in need of a rebuild. Returns the previous cell, or `None` when the
    /// coordinates lie outside the chunk or the chunk was disposed before
    /// the lock was acquired.
    pub fn write_cell(&self, x: usize, y: usize, z: usize, cell: Cell) -> Option<Cell> {
        let mut data = self.lock_data();
        if !data.dims.contains(x, y, z) {
            log::warn!("chunk {}: cell ({x},{y},{z}) outside {:?}; write ignored", self.key, data.dims);
            return None;
        }
        if self.is_disposed() {
            return None;
        }
        let prev = data.set_cell(x, y, z, cell);
        self.flags.set(Flag::ChangedSinceLoad);
        self.flags.mark_rebuild();
        Some(prev)
    }

    /// Replaces the render state, returning the previous one for disposal.
    /// Returns `Err(state)` untouched if the chunk has been disposed.
    pub fn install_render(&self, state: M) -> Result<Option<M>, M> {
        let mut slot = self.lock_render();
        if self.is_disposed() {
            return Err(state);
        }
        Ok(slot.replace(state))
    }

    pub fn has_render(&self) -> bool {
        self.lock_render().is_some()
    }

    /// Runs `f` against the current render state without taking it.
    pub fn with_render<R>(&self, f: impl FnOnce(Option<&M>) -> R) -> R {
        f(self.lock_render().as_ref())
    }

    /// Marks the chunk disposed under its data lock, so an update pass
    /// either finished before or sees the flag after locking. Returns the
    /// render state for release on the render context. A second call
    /// returns `None`.
    pub fn dispose(&self) -> Option<M> {
        self.retire(|_| true)
    }

    /// Like [`Chunk::dispose`], but first hands the cells to `persist` when
    /// the chunk has unsaved changes. Both happen under one data lock, so no
    /// edit can land between the write-back and disposal. `persist` returns
    /// whether the edits are safe; on `false` they are gone with the chunk,
    /// so a caller that wants to retry must keep its own copy first.
    pub fn retire(&self, persist: impl FnOnce(&ChunkData) -> bool) -> Option<M> {
        let data = self.lock_data();
        if self.is_disposed() {
            log::warn!("chunk {} disposed twice", self.key);
            return None;
        }
        if self.is_dirty() {
            if persist(&data) {
                self.flags.clear(Flag::ChangedSinceLoad);
            } else {
                log::error!("chunk {}: unsaved changes dropped on disposal", self.key);
            }
        }
        if !self.flags.mark_disposed() {
            return None;
        }
        drop(data);
        self.lock_render().take()
    }

    /// Nearest non-air cell of this chunk along `ray`.
    pub fn raycast(&self, ray: &Ray, cell_size: f32) -> Option<CellHit> {
        self.bounds.ray_entry(ray)?;
        first_solid_cell(&self.lock_data(), &self.bounds, cell_size, ray)
    }
}

impl<M> fmt::Debug for Chunk<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("key", &self.key)
            .field("flags", &self.flags)
            .field("access", &self.access_stamp())
            .finish()
    }
}
