use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use chunkstream_chunk::{Chunk, Face, MeshBuilder, NeighborFaces};
use chunkstream_geom::{Aabb, VisibilityTest};
use chunkstream_io::ChunkStorage;
use chunkstream_world::{ChunkKey, ChunkLayout, StreamConfig, TerrainGenerator};

use crate::cache::{CacheFetch, ChunkCache, KeepRegion};
use crate::loader::ChunkLoader;
use crate::queue::DedupLifoQueue;
use crate::render::RenderTasks;
use crate::stats::{Counters, InFlight};
use crate::LoadError;

pub type ChunkRef<M> = Arc<Chunk<M>>;
pub type VisibleSet<M> = Arc<Vec<ChunkRef<M>>>;

pub(crate) type View = Box<dyn VisibilityTest>;

pub(crate) fn see_everything() -> View {
    Box::new(|_: &Aabb| true)
}

/// State shared by the manager, both worker pools and the publisher.
pub(crate) struct Stream<B: MeshBuilder> {
    pub layout: ChunkLayout,
    pub cache: ChunkCache<B::Mesh>,
    pub loader: ChunkLoader,
    pub builder: Arc<B>,
    pub load_queue: DedupLifoQueue<ChunkKey>,
    pub update_queue: DedupLifoQueue<ChunkRef<B::Mesh>>,
    pub render: RenderTasks<B::Mesh>,
    pub view: ArcSwap<View>,
    pub published: ArcSwap<Vec<ChunkRef<B::Mesh>>>,
    pub publish_dirty: AtomicBool,
    pub counters: Counters,
}

impl<B: MeshBuilder> Stream<B> {
    /// Empty stream around chunk (0,0,0). `cfg` is expected sanitized.
    pub fn new(
        cfg: &StreamConfig,
        storage: Arc<dyn ChunkStorage>,
        terrain: Arc<dyn TerrainGenerator>,
        builder: Arc<B>,
    ) -> Self {
        let layout = cfg.layout();
        Self {
            layout,
            cache: ChunkCache::new(
                cfg.cache.capacity,
                KeepRegion {
                    center: ChunkKey::default(),
                    radius_xz: cfg.stream.load_radius,
                    radius_y: cfg.stream.load_radius_y,
                },
            ),
            loader: ChunkLoader::new(layout, storage, terrain),
            builder,
            load_queue: DedupLifoQueue::new("load", cfg.queues.load_capacity),
            update_queue: DedupLifoQueue::new("update", cfg.queues.update_capacity),
            render: RenderTasks::new(),
            view: ArcSwap::from_pointee(see_everything()),
            published: ArcSwap::from_pointee(Vec::new()),
            publish_dirty: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    #[inline]
    pub fn request_publish(&self) {
        self.publish_dirty.store(true, Ordering::Release);
    }

    #[inline]
    pub fn in_view(&self, bounds: &Aabb) -> bool {
        self.view.load().is_visible(bounds)
    }

    /// Saves if dirty, disposes, and queues the render state for release.
    pub fn retire(&self, chunk: &Chunk<B::Mesh>) {
        if let Some(mesh) = self.loader.retire(chunk) {
            self.render.dispose_later(chunk.key(), mesh);
        }
    }

    pub fn get_or_load(&self, key: ChunkKey) -> Result<ChunkRef<B::Mesh>, LoadError> {
        self.fetch(key).map(|f| f.chunk)
    }

    /// Cache lookup that loads on a miss, retiring whatever the insert
    /// pushed out and any race loser. New chunks in view are meshed before
    /// returning; the rest are queued. The returned evicted and discarded
    /// chunks are already disposed.
    pub fn fetch(&self, key: ChunkKey) -> Result<CacheFetch<B::Mesh>, LoadError> {
        let fetch = {
            let _g = InFlight::enter(&self.counters.loads_in_flight);
            self.cache.get_or_load(key, || self.loader.load(key))
        };
        let fetch = match fetch {
            Ok(f) => f,
            Err(e) => {
                Counters::bump(&self.counters.load_failures);
                return Err(e);
            }
        };
        for victim in &fetch.evicted {
            self.retire(victim);
            self.cache.finish_retire(victim.key());
        }
        // Never handed out, so never edited: nothing to write back.
        if let Some(loser) = &fetch.discarded {
            if let Some(mesh) = loser.dispose() {
                self.render.dispose_later(loser.key(), mesh);
            }
        }
        if fetch.inserted {
            Counters::bump(&self.counters.loads_completed);
            let chunk = &fetch.chunk;
            if !chunk.is_empty() && self.in_view(chunk.bounds()) {
                self.update(chunk);
            } else {
                self.update_queue.insert(Arc::clone(chunk));
            }
            self.request_publish();
        }
        Ok(fetch)
    }

    /// Worker-side load: skips keys that became resident while queued.
    pub fn process_load(&self, key: ChunkKey) {
        if self.cache.contains(key) {
            return;
        }
        if let Err(e) = self.get_or_load(key) {
            log::error!(target: "stream", "load of {key} failed: {e}");
        }
    }

    /// Boundary layers of resident face neighbors. Each neighbor is locked
    /// on its own, never together with `key`'s chunk.
    pub fn neighbor_faces(&self, key: ChunkKey) -> NeighborFaces {
        let mut faces = NeighborFaces::none();
        for face in Face::ALL {
            let (dx, dy, dz) = face.delta();
            if let Some(n) = self.cache.maybe_get(key.offset(dx, dy, dz)) {
                if n.is_disposed() {
                    continue;
                }
                let plane = n.lock_data().face_plane(face.opposite());
                faces.insert(face, plane);
            }
        }
        faces
    }

    /// Recomputes light and render state of one chunk and clears its
    /// rebuild flag unless a newer request arrived meanwhile.
    pub fn update(&self, chunk: &Chunk<B::Mesh>) {
        if chunk.is_disposed() {
            return;
        }
        let _g = InFlight::enter(&self.counters.updates_in_flight);
        let epoch = chunk.flags().rebuild_epoch();
        let neighbors = self.neighbor_faces(chunk.key());
        let mesh = {
            let mut data = chunk.lock_data();
            if chunk.is_disposed() {
                log::trace!(target: "stream", "skipping update of disposed {}", chunk.key());
                return;
            }
            // Top border left open: no light arrives from the chunk above.
            chunkstream_lighting::sweep(&mut data, None);
            self.builder
                .rebuild(chunk.key(), chunk.bounds(), &data, &neighbors)
        };
        match chunk.install_render(mesh) {
            Ok(Some(old)) => self.render.dispose_later(chunk.key(), old),
            Ok(None) => {}
            Err(mesh) => {
                self.render.dispose_later(chunk.key(), mesh);
                return;
            }
        }
        chunk.flags().finish_rebuild(epoch);
        Counters::bump(&self.counters.updates_completed);
        self.request_publish();
    }

    /// One publisher pass: re-evaluates visibility of every resident chunk
    /// and installs a fresh visible list. Chunks that need a rebuild are
    /// queued for update instead of published. Returns whether a new list
    /// was installed.
    pub fn publish_cycle(&self) -> bool {
        if !self.publish_dirty.swap(false, Ordering::AcqRel) {
            return false;
        }
        let view = self.view.load();
        let mut visible = Vec::new();
        for chunk in self.cache.snapshot() {
            if chunk.is_disposed() {
                continue;
            }
            let vis = !chunk.is_empty() && view.is_visible(chunk.bounds());
            chunk.flags().set_visible(vis);
            if !vis {
                continue;
            }
            if chunk.needs_rebuild() {
                self.update_queue.insert(chunk);
                continue;
            }
            visible.push(chunk);
        }
        log::trace!(target: "stream", "published {} visible chunks", visible.len());
        self.published.store(Arc::new(visible));
        Counters::bump(&self.counters.publishes);
        true
    }
}
