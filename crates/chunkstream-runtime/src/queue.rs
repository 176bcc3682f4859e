use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use chunkstream_chunk::Chunk;
use chunkstream_world::ChunkKey;
use hashbrown::HashSet;

use crate::ShutdownError;

/// What makes two queue entries "the same request".
pub trait DedupKey {
    type Key: Eq + Hash + Clone;
    fn dedup_key(&self) -> Self::Key;
}

impl DedupKey for ChunkKey {
    type Key = ChunkKey;
    #[inline]
    fn dedup_key(&self) -> ChunkKey {
        *self
    }
}

/// Chunks dedup by identity: a reloaded chunk under the same key is a
/// different request.
impl<M> DedupKey for Arc<Chunk<M>> {
    type Key = usize;
    #[inline]
    fn dedup_key(&self) -> usize {
        Arc::as_ptr(self) as usize
    }
}

struct State<T: DedupKey> {
    items: VecDeque<T>,
    keys: HashSet<T::Key>,
    disposed: bool,
}

/// Bounded stack that ignores requests already pending. Newest entries are
/// taken first; when full, the oldest pending entry is dropped.
pub struct DedupLifoQueue<T: DedupKey> {
    name: &'static str,
    capacity: usize,
    state: Mutex<State<T>>,
    ready: Condvar,
    dropped: AtomicU64,
}

impl<T: DedupKey> DedupLifoQueue<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity.max(1)),
                keys: HashSet::new(),
                disposed: false,
            }),
            ready: Condvar::new(),
            dropped: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pushes `item` unless an equal request is pending. Never blocks.
    /// Returns whether the item was queued.
    pub fn insert(&self, item: T) -> bool {
        let key = item.dedup_key();
        let mut st = self.lock();
        if st.disposed || st.keys.contains(&key) {
            return false;
        }
        if st.items.len() >= self.capacity {
            if let Some(old) = st.items.pop_front() {
                st.keys.remove(&old.dedup_key());
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::trace!(target: "stream", "{} queue full; dropped oldest request", self.name);
            }
        }
        st.keys.insert(key);
        st.items.push_back(item);
        drop(st);
        self.ready.notify_one();
        true
    }

    fn pop(st: &mut State<T>) -> Option<T> {
        let item = st.items.pop_back()?;
        st.keys.remove(&item.dedup_key());
        Some(item)
    }

    /// Blocks until an entry is available and returns the newest one.
    pub fn take(&self) -> Result<T, ShutdownError> {
        let mut st = self.lock();
        loop {
            if st.disposed {
                return Err(ShutdownError);
            }
            if let Some(item) = Self::pop(&mut st) {
                return Ok(item);
            }
            st = self.ready.wait(st).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Like [`DedupLifoQueue::take`] but gives up after `timeout`.
    pub fn take_timeout(&self, timeout: Duration) -> Result<Option<T>, ShutdownError> {
        let st = self.lock();
        let (mut st, _) = self
            .ready
            .wait_timeout_while(st, timeout, |s| !s.disposed && s.items.is_empty())
            .unwrap_or_else(|e| e.into_inner());
        if st.disposed {
            return Err(ShutdownError);
        }
        Ok(Self::pop(&mut st))
    }

    pub fn try_take(&self) -> Option<T> {
        let mut st = self.lock();
        if st.disposed {
            return None;
        }
        Self::pop(&mut st)
    }

    /// Fails every blocked and future take. Pending entries are discarded.
    pub fn dispose(&self) {
        let mut st = self.lock();
        if st.disposed {
            return;
        }
        st.disposed = true;
        st.items.clear();
        st.keys.clear();
        drop(st);
        self.ready.notify_all();
        log::debug!("{} queue disposed", self.name);
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Requests dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
