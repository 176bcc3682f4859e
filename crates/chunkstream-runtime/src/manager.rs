use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use chunkstream_blocks::Cell;
use chunkstream_chunk::{Face, MeshBuilder};
use chunkstream_geom::{Vec3, VisibilityTest};
use chunkstream_io::ChunkStorage;
use chunkstream_world::{ChunkKey, ChunkLayout, StreamConfig, TerrainGenerator};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use rayon::ThreadPool;

use crate::cache::KeepRegion;
use crate::publisher::spawn_publisher;
use crate::stats::{Counters, StreamStats};
use crate::stream::{ChunkRef, Stream, View, VisibleSet};
use crate::workers::{spawn_load_workers, spawn_update_workers};
use crate::{LoadError, StartError};

const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the cache, both queues, the worker pools and the publisher, and
/// turns observer movement and cell edits into work for them.
pub struct ChunkManager<B: MeshBuilder> {
    stream: Arc<Stream<B>>,
    radius_xz: i32,
    radius_y: i32,
    observer: Mutex<Option<ChunkKey>>,
    _load_pool: ThreadPool,
    _update_pool: ThreadPool,
    publisher: Mutex<Option<JoinHandle<()>>>,
    stop_publisher: Mutex<Option<Sender<()>>>,
    workers_alive: Receiver<()>,
    shut_down: AtomicBool,
}

impl<B: MeshBuilder> ChunkManager<B> {
    pub fn new(
        cfg: &StreamConfig,
        storage: Arc<dyn ChunkStorage>,
        terrain: Arc<dyn TerrainGenerator>,
        builder: Arc<B>,
    ) -> Result<Self, StartError> {
        let cfg = cfg.clone().sanitized();
        let radius_xz = cfg.stream.load_radius;
        let radius_y = cfg.stream.load_radius_y;
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let split = cfg.worker_split(cpus);

        let stream = Arc::new(Stream::new(&cfg, storage, terrain, builder));

        let (alive_tx, workers_alive) = bounded::<()>(0);
        let load_pool = spawn_load_workers(&stream, split.load, &alive_tx)?;
        let update_pool = spawn_update_workers(&stream, split.update, &alive_tx)?;
        drop(alive_tx);

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let publisher = spawn_publisher(
            Arc::clone(&stream),
            Duration::from_millis(cfg.publish.interval_ms),
            stop_rx,
        )?;

        log::info!(
            "chunk manager started: {} load / {} update workers, cache {} chunks, radius {}x{}",
            split.load,
            split.update,
            cfg.cache.capacity,
            radius_xz,
            radius_y
        );

        Ok(Self {
            stream,
            radius_xz,
            radius_y,
            observer: Mutex::new(None),
            _load_pool: load_pool,
            _update_pool: update_pool,
            publisher: Mutex::new(Some(publisher)),
            stop_publisher: Mutex::new(Some(stop_tx)),
            workers_alive,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.stream.layout
    }

    pub fn builder(&self) -> &Arc<B> {
        &self.stream.builder
    }

    /// Chunk the observer was last seen in.
    pub fn observer_chunk(&self) -> Option<ChunkKey> {
        *self.observer.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replaces the visibility test used by the publisher and request
    /// ordering.
    pub fn set_view(&self, view: impl VisibilityTest + 'static) {
        let view: View = Box::new(view);
        self.stream.view.store(Arc::new(view));
    }

    /// Observer update. Within the same chunk only a republish is requested;
    /// on crossing into a new chunk the missing part of the surrounding
    /// region is queued for loading, chunks in view first, nearest first.
    pub fn observer_moved(&self, pos: Vec3, view: impl VisibilityTest + 'static) {
        self.set_view(view);
        let key = self.stream.layout.key_at(pos);
        let prev = self
            .observer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(key);
        if prev == Some(key) {
            self.stream.request_publish();
            return;
        }
        self.stream.cache.set_keep_region(KeepRegion {
            center: key,
            radius_xz: self.radius_xz,
            radius_y: self.radius_y,
        });
        let missing = self.missing_in_region(key);
        log::debug!(
            target: "stream",
            "observer entered {key}; requesting {} chunks",
            missing.len()
        );
        // The queue serves newest first, so push the most wanted key last.
        for k in missing.into_iter().rev() {
            self.stream.load_queue.insert(k);
        }
        self.stream.request_publish();
    }

    /// Keys of the region around `center` that are not resident, in request
    /// priority order.
    pub fn missing_in_region(&self, center: ChunkKey) -> Vec<ChunkKey> {
        let layout = &self.stream.layout;
        let mut missing: Vec<(bool, i64, ChunkKey)> = center
            .neighborhood(self.radius_xz, self.radius_y)
            .filter(|k| !self.stream.cache.contains(*k))
            .map(|k| {
                let hidden = !self.stream.in_view(&layout.chunk_bounds(k));
                (hidden, k.distance_sq(center), k)
            })
            .collect();
        missing.sort_by_key(|&(hidden, dist, _)| (hidden, dist));
        missing.into_iter().map(|(_, _, k)| k).collect()
    }

    /// Resident chunk or a synchronous load on the caller's thread.
    pub fn get_or_load(&self, key: ChunkKey) -> Result<ChunkRef<B::Mesh>, LoadError> {
        self.stream.get_or_load(key)
    }

    /// Cache-only lookup.
    pub fn maybe_get(&self, key: ChunkKey) -> Option<ChunkRef<B::Mesh>> {
        self.stream.cache.maybe_get(key)
    }

    /// Writes one cell, invalidates resident face neighbors when the cell is
    /// on the chunk boundary, and queues the chunk for update. Returns false,
    /// touching nothing, if the chunk had already been disposed or the
    /// coordinates lie outside it.
    pub fn set_cell(&self, chunk: &ChunkRef<B::Mesh>, x: usize, y: usize, z: usize, cell: Cell) -> bool {
        if chunk.write_cell(x, y, z, cell).is_none() {
            return false;
        }
        let dims = self.stream.layout.dims;
        for face in Face::touched_by(dims, x, y, z) {
            let (dx, dy, dz) = face.delta();
            if let Some(n) = self.stream.cache.maybe_get(chunk.key().offset(dx, dy, dz)) {
                n.flags().mark_rebuild();
            }
        }
        self.stream.update_queue.insert(Arc::clone(chunk));
        self.stream.request_publish();
        true
    }

    /// Retries write-backs that failed at eviction, then saves every
    /// resident chunk with unsaved edits, keeping it resident. Returns the
    /// failed resident saves plus the kept copies still waiting.
    pub fn flush(&self) -> usize {
        self.stream.loader.retry_unsaved();
        let mut failed = 0;
        for chunk in self.stream.cache.snapshot() {
            if !chunk.is_disposed() && !self.stream.loader.persist(chunk.as_ref()) {
                failed += 1;
            }
        }
        failed += self.stream.loader.unsaved_len();
        if failed > 0 {
            log::warn!(target: "stream", "flush left {failed} chunks unsaved");
        }
        failed
    }

    pub fn request_publish(&self) {
        self.stream.request_publish();
    }

    /// Runs a publish cycle on the calling thread. Returns whether a new
    /// list was installed.
    pub fn publish_now(&self) -> bool {
        self.stream.publish_cycle()
    }

    /// Current visible set. The returned list never changes; a later
    /// publish installs a new one.
    pub fn published(&self) -> VisibleSet<B::Mesh> {
        self.stream.published.load_full()
    }

    /// Releases render state handed off by workers. Call from the thread
    /// that owns the graphics context.
    pub fn run_render_tasks(&self) -> usize {
        self.stream.render.run(self.stream.builder.as_ref())
    }

    pub fn stats(&self) -> StreamStats {
        let s = &self.stream;
        StreamStats {
            load_queue: s.load_queue.len(),
            update_queue: s.update_queue.len(),
            loads_in_flight: s.counters.loads_in_flight.load(Ordering::Relaxed),
            updates_in_flight: s.counters.updates_in_flight.load(Ordering::Relaxed),
            loads_dropped: s.load_queue.dropped(),
            updates_dropped: s.update_queue.dropped(),
            loads_completed: Counters::get(&s.counters.loads_completed),
            load_failures: Counters::get(&s.counters.load_failures),
            updates_completed: Counters::get(&s.counters.updates_completed),
            publishes: Counters::get(&s.counters.publishes),
            published: s.published.load().len(),
            render_tasks_pending: s.render.pending(),
            unsaved: s.loader.unsaved_len(),
            cache: s.cache.stats(),
        }
    }

    /// Stops workers and the publisher, then saves every dirty resident
    /// chunk and queues all render state for release. In-flight loads and
    /// updates finish first. Safe to call more than once.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        log::info!("chunk manager shutting down");
        self.stream.load_queue.dispose();
        self.stream.update_queue.dispose();

        if let Some(tx) = self.stop_publisher.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.publisher.lock().unwrap_or_else(|e| e.into_inner()).take() {
            if handle.join().is_err() {
                log::error!("visibility publisher panicked");
            }
        }

        match self.workers_alive.recv_timeout(WORKER_DRAIN_TIMEOUT) {
            Err(RecvTimeoutError::Disconnected) => {}
            Ok(()) | Err(RecvTimeoutError::Timeout) => {
                log::warn!("workers still busy after {WORKER_DRAIN_TIMEOUT:?}; retiring chunks anyway");
            }
        }

        self.stream.published.store(Arc::new(Vec::new()));
        self.stream.loader.retry_unsaved();
        let resident = self.stream.cache.drain();
        let n = resident.len();
        for chunk in resident {
            self.stream.retire(&chunk);
        }
        log::info!("retired {n} resident chunks");
        let lost = self.stream.loader.unsaved_len();
        if lost > 0 {
            log::error!("{lost} chunks could not be saved; their edits are lost");
        }
    }
}

impl<B: MeshBuilder> Drop for ChunkManager<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
