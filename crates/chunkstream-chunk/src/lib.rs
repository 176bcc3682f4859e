//! Chunk entity: cell and light storage, atomic lifecycle flags, neighbor
//! face snapshots and the mesh-builder seam.
#![forbid(unsafe_code)]

mod chunk;
mod data;
mod face;
pub mod flags;
mod mesh;
pub mod raycast;

pub use chunk::Chunk;
pub use data::{ChunkData, NeighborFaces};
pub use face::Face;
pub use flags::{ChunkFlags, Flag};
pub use mesh::MeshBuilder;
pub use raycast::CellHit;
