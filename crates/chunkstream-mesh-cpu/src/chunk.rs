use std::collections::HashMap;

use chunkstream_blocks::Cell;
use chunkstream_geom::Aabb;
use chunkstream_world::ChunkKey;

use crate::mesh_build::MeshBuild;

/// CPU-side mesh of one chunk, split by cell type.
#[derive(Clone, Debug)]
pub struct ChunkMeshCPU {
    pub key: ChunkKey,
    pub bbox: Aabb,
    pub parts: HashMap<Cell, MeshBuild>,
}

impl ChunkMeshCPU {
    pub fn quad_count(&self) -> usize {
        self.parts.values().map(MeshBuild::quad_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.values().all(|p| p.idx.is_empty())
    }
}
