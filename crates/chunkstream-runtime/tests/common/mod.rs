#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use chunkstream_chunk::{ChunkData, MeshBuilder, NeighborFaces};
use chunkstream_geom::Aabb;
use chunkstream_io::{ChunkStorage, MemoryStorage};
use chunkstream_mesh_cpu::{ChunkMeshCPU, FaceCullMesher};
use chunkstream_runtime::ChunkManager;
use chunkstream_world::{ChunkKey, FlatTerrain, StreamConfig, TerrainGenerator};

/// Face-culling mesher whose rebuilds can be held at a gate.
pub struct GatedMesher {
    inner: FaceCullMesher,
    open: Mutex<bool>,
    cv: Condvar,
    pub rebuilds: AtomicUsize,
    pub disposals: AtomicUsize,
}

impl GatedMesher {
    pub fn new() -> Self {
        Self {
            inner: FaceCullMesher::new(1.0),
            open: Mutex::new(true),
            cv: Condvar::new(),
            rebuilds: AtomicUsize::new(0),
            disposals: AtomicUsize::new(0),
        }
    }

    pub fn close(&self) {
        *self.open.lock().unwrap() = false;
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }
}

impl MeshBuilder for GatedMesher {
    type Mesh = ChunkMeshCPU;

    fn rebuild(&self, key: ChunkKey, bounds: &Aabb, data: &ChunkData, neighbors: &NeighborFaces) -> ChunkMeshCPU {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cv.wait(open).unwrap();
        }
        drop(open);
        self.rebuilds.fetch_add(1, Ordering::SeqCst);
        self.inner.rebuild(key, bounds, data, neighbors)
    }

    fn dispose(&self, mesh: ChunkMeshCPU) {
        self.disposals.fetch_add(1, Ordering::SeqCst);
        self.inner.dispose(mesh);
    }
}

/// 4x4x4 chunks of unit cells, a one-chunk horizontal radius on a single
/// layer, fast publishing.
pub fn small_config() -> StreamConfig {
    let mut cfg = StreamConfig::default();
    cfg.chunk.cells_x = 4;
    cfg.chunk.cells_y = 4;
    cfg.chunk.cells_z = 4;
    cfg.chunk.cell_size = 1.0;
    cfg.cache.capacity = 64;
    cfg.stream.load_radius = 1;
    cfg.stream.load_radius_y = 0;
    cfg.workers.load = 2;
    cfg.workers.update = 2;
    cfg.publish.interval_ms = 5;
    cfg
}

pub struct Harness {
    pub manager: ChunkManager<GatedMesher>,
    pub storage: Arc<MemoryStorage>,
    pub mesher: Arc<GatedMesher>,
}

pub fn harness_with(cfg: StreamConfig, terrain: Arc<dyn TerrainGenerator>) -> Harness {
    let storage = Arc::new(MemoryStorage::new());
    let mesher = Arc::new(GatedMesher::new());
    let manager = ChunkManager::new(
        &cfg,
        Arc::clone(&storage) as Arc<dyn ChunkStorage>,
        terrain,
        Arc::clone(&mesher),
    )
    .unwrap();
    Harness {
        manager,
        storage,
        mesher,
    }
}

/// Ground fills world rows at and below 0; chunk layer 0 is non-empty.
pub fn harness() -> Harness {
    harness_with(small_config(), Arc::new(FlatTerrain::new(0)))
}

pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}
