use chunkstream_geom::Aabb;
use chunkstream_world::ChunkKey;

use crate::{ChunkData, NeighborFaces};

/// Produces opaque render state from a chunk's cells and light.
///
/// `rebuild` is called from update workers. `dispose` is only ever called on
/// the thread that drains render tasks, which is the one owning any graphics
/// context.
pub trait MeshBuilder: Send + Sync + 'static {
    type Mesh: Send + Sync + 'static;

    fn rebuild(
        &self,
        key: ChunkKey,
        bounds: &Aabb,
        data: &ChunkData,
        neighbors: &NeighborFaces,
    ) -> Self::Mesh;

    fn dispose(&self, mesh: Self::Mesh);
}
