//! CPU meshing crate: face-culling mesher behind the `MeshBuilder` seam.
#![forbid(unsafe_code)]

mod build;
mod chunk;
mod constants;
mod mesh_build;

pub use build::{FaceCullMesher, build_chunk_faces};
pub use chunk::ChunkMeshCPU;
pub use mesh_build::MeshBuild;
