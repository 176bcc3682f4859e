use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use chunkstream_chunk::Chunk;
use chunkstream_world::ChunkKey;
use hashbrown::{HashMap, HashSet};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChunkCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Loads that lost an insert race and were thrown away.
    pub discarded: u64,
    pub entries: usize,
}

/// Result of [`ChunkCache::get_or_load`]. Chunks in `evicted` and
/// `discarded` are out of the cache and must be retired by the caller.
pub struct CacheFetch<M> {
    pub chunk: Arc<Chunk<M>>,
    /// This call inserted `chunk`.
    pub inserted: bool,
    pub evicted: Vec<Arc<Chunk<M>>>,
    pub discarded: Option<Arc<Chunk<M>>>,
}

/// Chunks that must stay resident: the box of `radius_xz`/`radius_y` chunks
/// around the observer's chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeepRegion {
    pub center: ChunkKey,
    pub radius_xz: i32,
    pub radius_y: i32,
}

impl KeepRegion {
    #[inline]
    pub fn keeps(&self, key: ChunkKey) -> bool {
        self.center.within(key, self.radius_xz, self.radius_y)
    }
}

struct Inner<M> {
    map: HashMap<ChunkKey, Arc<Chunk<M>>>,
    order: Vec<Arc<Chunk<M>>>,
    keep: KeepRegion,
    /// Evicted keys whose write-back has not finished yet.
    retiring: HashSet<ChunkKey>,
}

/// Bounded key to chunk index. One coarse lock covers the map and the list;
/// it is never held across a load, a save or a mesh build.
pub struct ChunkCache<M> {
    inner: Mutex<Inner<M>>,
    retired: Condvar,
    capacity: usize,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    discarded: AtomicU64,
}

impl<M> ChunkCache<M> {
    pub fn new(capacity: usize, keep: KeepRegion) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                order: Vec::new(),
                keep,
                retiring: HashSet::new(),
            }),
            retired: Condvar::new(),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<M>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[inline]
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_keep_region(&self, keep: KeepRegion) {
        self.lock().keep = keep;
    }

    pub fn keep_region(&self) -> KeepRegion {
        self.lock().keep
    }

    /// Cache-only lookup; never loads.
    pub fn maybe_get(&self, key: ChunkKey) -> Option<Arc<Chunk<M>>> {
        let found = self.lock().map.get(&key).cloned();
        if let Some(c) = &found {
            c.stamp_access(self.tick());
        }
        found
    }

    pub fn contains(&self, key: ChunkKey) -> bool {
        self.lock().map.contains_key(&key)
    }

    /// Returns the resident chunk for `key`, or runs `load` without holding
    /// the cache lock and inserts the result. When another caller inserted
    /// the same key first, the fresh chunk comes back in `discarded` and the
    /// resident one is returned.
    pub fn get_or_load<E>(
        &self,
        key: ChunkKey,
        load: impl FnOnce() -> Result<Chunk<M>, E>,
    ) -> Result<CacheFetch<M>, E> {
        {
            let mut inner = self.lock();
            if let Some(c) = inner.map.get(&key) {
                let chunk = Arc::clone(c);
                drop(inner);
                self.hits.fetch_add(1, Ordering::Relaxed);
                chunk.stamp_access(self.tick());
                return Ok(CacheFetch {
                    chunk,
                    inserted: false,
                    evicted: Vec::new(),
                    discarded: None,
                });
            }
            // A previous instance may still be writing back its edits.
            while inner.retiring.contains(&key) {
                inner = self.retired.wait(inner).unwrap_or_else(|e| e.into_inner());
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let fresh = Arc::new(load()?);
        fresh.stamp_access(self.tick());

        let mut inner = self.lock();
        if let Some(winner) = inner.map.get(&key) {
            let winner = Arc::clone(winner);
            drop(inner);
            winner.stamp_access(self.tick());
            self.discarded.fetch_add(1, Ordering::Relaxed);
            log::debug!(target: "stream", "lost load race for {key}; discarding duplicate");
            return Ok(CacheFetch {
                chunk: winner,
                inserted: false,
                evicted: Vec::new(),
                discarded: Some(fresh),
            });
        }
        let evicted = self.make_room(&mut inner);
        inner.map.insert(key, Arc::clone(&fresh));
        inner.order.push(Arc::clone(&fresh));
        Ok(CacheFetch {
            chunk: fresh,
            inserted: true,
            evicted,
            discarded: None,
        })
    }

    /// Evicts until one more chunk fits. Only chunks outside the keep region
    /// are candidates, lowest access stamp first.
    fn make_room(&self, inner: &mut Inner<M>) -> Vec<Arc<Chunk<M>>> {
        let mut out = Vec::new();
        while inner.order.len() >= self.capacity {
            let keep = inner.keep;
            let victim = inner
                .order
                .iter()
                .enumerate()
                .filter(|(_, c)| !keep.keeps(c.key()))
                .min_by_key(|(_, c)| c.access_stamp())
                .map(|(i, _)| i);
            let Some(i) = victim else {
                log::warn!(
                    target: "stream",
                    "cache over capacity: {} resident, limit {}, nothing outside the load radius",
                    inner.order.len() + 1,
                    self.capacity
                );
                break;
            };
            let chunk = inner.order.swap_remove(i);
            inner.map.remove(&chunk.key());
            inner.retiring.insert(chunk.key());
            self.evictions.fetch_add(1, Ordering::Relaxed);
            log::debug!(target: "stream", "evicting {}", chunk.key());
            out.push(chunk);
        }
        out
    }

    /// Marks an evicted chunk's write-back as done, releasing loaders
    /// waiting on its key.
    pub fn finish_retire(&self, key: ChunkKey) {
        let removed = self.lock().retiring.remove(&key);
        if removed {
            self.retired.notify_all();
        }
    }

    /// Clones the access-ordered list; the cache lock is released before the
    /// caller walks it.
    pub fn snapshot(&self) -> Vec<Arc<Chunk<M>>> {
        self.lock().order.clone()
    }

    pub fn keys(&self) -> Vec<ChunkKey> {
        self.lock().map.keys().copied().collect()
    }

    /// Empties the cache, returning every chunk for retirement.
    pub fn drain(&self) -> Vec<Arc<Chunk<M>>> {
        let mut inner = self.lock();
        inner.map.clear();
        std::mem::take(&mut inner.order)
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> ChunkCacheStats {
        ChunkCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkstream_chunk::ChunkData;
    use chunkstream_world::ChunkLayout;
    use std::convert::Infallible;

    fn keep_origin(r: i32) -> KeepRegion {
        KeepRegion {
            center: ChunkKey::new(0, 0, 0),
            radius_xz: r,
            radius_y: 0,
        }
    }

    fn make(key: ChunkKey) -> Result<Chunk<()>, Infallible> {
        let l = ChunkLayout::new(chunkstream_world::ChunkDims::cubic(2), 1.0);
        Ok(Chunk::new(key, l.chunk_bounds(key), ChunkData::air(l.dims)))
    }

    #[test]
    fn hit_returns_same_instance() {
        let cache = ChunkCache::new(4, keep_origin(0));
        let k = ChunkKey::new(0, 0, 0);
        let a = cache.get_or_load(k, || make(k)).unwrap();
        assert!(a.inserted);
        let b = cache.get_or_load(k, || make(k)).unwrap();
        assert!(!b.inserted);
        assert!(Arc::ptr_eq(&a.chunk, &b.chunk));
        let s = cache.stats();
        assert_eq!((s.hits, s.misses, s.entries), (1, 1, 1));
    }

    #[test]
    fn maybe_get_never_loads() {
        let cache: ChunkCache<()> = ChunkCache::new(4, keep_origin(0));
        assert!(cache.maybe_get(ChunkKey::new(1, 1, 1)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn evicts_least_recently_used_outside_region() {
        let cache = ChunkCache::new(3, keep_origin(0));
        let far: Vec<_> = (1..=2).map(|x| ChunkKey::new(x * 10, 0, 0)).collect();
        let origin = ChunkKey::new(0, 0, 0);
        cache.get_or_load(origin, || make(origin)).unwrap();
        for &k in &far {
            cache.get_or_load(k, || make(k)).unwrap();
        }
        // Touch the first far chunk so the second becomes the oldest.
        cache.maybe_get(far[0]);
        let k = ChunkKey::new(99, 0, 0);
        let fetch = cache.get_or_load(k, || make(k)).unwrap();
        assert_eq!(fetch.evicted.len(), 1);
        assert_eq!(fetch.evicted[0].key(), far[1]);
        assert!(cache.contains(origin));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn exceeds_capacity_rather_than_evicting_kept_chunks() {
        let cache = ChunkCache::new(2, keep_origin(1));
        for k in ChunkKey::new(0, 0, 0).neighborhood(1, 0) {
            let f = cache.get_or_load(k, || make(k)).unwrap();
            assert!(f.evicted.is_empty());
        }
        assert_eq!(cache.len(), 9);
    }

    #[test]
    fn loader_waits_for_retiring_key() {
        let cache = Arc::new(ChunkCache::new(1, keep_origin(0)));
        let far = ChunkKey::new(5, 0, 0);
        cache.get_or_load(far, || make(far)).unwrap();
        let origin = ChunkKey::new(0, 0, 0);
        let f = cache.get_or_load(origin, || make(origin)).unwrap();
        assert_eq!(f.evicted[0].key(), far);

        let c2 = Arc::clone(&cache);
        let waiter = std::thread::spawn(move || c2.get_or_load(far, || make(far)).unwrap().inserted);
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(!waiter.is_finished());
        cache.finish_retire(far);
        assert!(waiter.join().unwrap());
    }
}
