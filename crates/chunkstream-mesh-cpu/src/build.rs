use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use chunkstream_blocks::{Cell, MAX_LIGHT};
use chunkstream_chunk::{ChunkData, Face, MeshBuilder, NeighborFaces};
use chunkstream_geom::{Aabb, Vec3};
use chunkstream_world::ChunkKey;

use crate::chunk::ChunkMeshCPU;
use crate::constants::{OPAQUE_ALPHA, VISUAL_LIGHT_MIN, WATER_ALPHA};
use crate::mesh_build::MeshBuild;

fn base_color(cell: Cell) -> [u8; 4] {
    match cell {
        Cell::SOLID => [128, 116, 100, OPAQUE_ALPHA],
        Cell::WATER => [56, 92, 200, WATER_ALPHA],
        _ => [255, 0, 255, OPAQUE_ALPHA],
    }
}

#[inline]
fn shade(rgba: [u8; 4], light: u8) -> [u8; 4] {
    let l = u32::from(light.min(MAX_LIGHT));
    let floor = u32::from(VISUAL_LIGHT_MIN);
    let scale = floor + (255 - floor) * l / u32::from(MAX_LIGHT);
    let ch = |c: u8| ((u32::from(c) * scale) / 255) as u8;
    [ch(rgba[0]), ch(rgba[1]), ch(rgba[2]), rgba[3]]
}

/// Corners of the square on `face` of the cube `[min, min + s]`.
fn face_corners(face: Face, min: Vec3, s: f32) -> [Vec3; 4] {
    let (x0, y0, z0) = (min.x, min.y, min.z);
    let (x1, y1, z1) = (x0 + s, y0 + s, z0 + s);
    match face {
        Face::PosY => [
            Vec3::new(x0, y1, z0),
            Vec3::new(x1, y1, z0),
            Vec3::new(x1, y1, z1),
            Vec3::new(x0, y1, z1),
        ],
        Face::NegY => [
            Vec3::new(x0, y0, z0),
            Vec3::new(x1, y0, z0),
            Vec3::new(x1, y0, z1),
            Vec3::new(x0, y0, z1),
        ],
        Face::PosX => [
            Vec3::new(x1, y0, z0),
            Vec3::new(x1, y1, z0),
            Vec3::new(x1, y1, z1),
            Vec3::new(x1, y0, z1),
        ],
        Face::NegX => [
            Vec3::new(x0, y0, z0),
            Vec3::new(x0, y1, z0),
            Vec3::new(x0, y1, z1),
            Vec3::new(x0, y0, z1),
        ],
        Face::PosZ => [
            Vec3::new(x0, y0, z1),
            Vec3::new(x1, y0, z1),
            Vec3::new(x1, y1, z1),
            Vec3::new(x0, y1, z1),
        ],
        Face::NegZ => [
            Vec3::new(x0, y0, z0),
            Vec3::new(x1, y0, z0),
            Vec3::new(x1, y1, z0),
            Vec3::new(x0, y1, z0),
        ],
    }
}

/// Whether a face of `cell` next to `other` is seen. A neighbor that is not
/// resident leaves the face in place.
#[inline]
fn exposed(cell: Cell, other: Option<Cell>) -> bool {
    match other {
        None => true,
        Some(o) => o.is_translucent() && o != cell,
    }
}

/// Emits one quad per exposed face of every non-air cell.
pub fn build_chunk_faces(
    key: ChunkKey,
    bbox: &Aabb,
    cell_size: f32,
    data: &ChunkData,
    neighbors: &NeighborFaces,
) -> ChunkMeshCPU {
    let d = data.dims;
    let mut parts: HashMap<Cell, MeshBuild> = HashMap::new();
    for y in 0..d.sy {
        for z in 0..d.sz {
            for x in 0..d.sx {
                let cell = data.cell(x, y, z);
                if cell.is_air() {
                    continue;
                }
                let min = bbox.min + Vec3::new(x as f32, y as f32, z as f32) * cell_size;
                for face in Face::ALL {
                    let (other, light) = if face.touches(d, x, y, z) {
                        (neighbors.beyond(d, face, x, y, z), data.light(x, y, z))
                    } else {
                        let (dx, dy, dz) = face.delta();
                        let nx = (x as i32 + dx) as usize;
                        let ny = (y as i32 + dy) as usize;
                        let nz = (z as i32 + dz) as usize;
                        (Some(data.cell(nx, ny, nz)), data.light(nx, ny, nz))
                    };
                    if !exposed(cell, other) {
                        continue;
                    }
                    parts.entry(cell).or_default().add_quad(
                        face_corners(face, min, cell_size),
                        face.normal(),
                        shade(base_color(cell), light),
                    );
                }
            }
        }
    }
    ChunkMeshCPU {
        key,
        bbox: *bbox,
        parts,
    }
}

/// Face-culling mesher producing [`ChunkMeshCPU`] render state.
#[derive(Debug)]
pub struct FaceCullMesher {
    cell_size: f32,
    built: AtomicUsize,
    disposed: AtomicUsize,
}

impl FaceCullMesher {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            built: AtomicUsize::new(0),
            disposed: AtomicUsize::new(0),
        }
    }

    pub fn built_count(&self) -> usize {
        self.built.load(Ordering::Relaxed)
    }

    pub fn disposed_count(&self) -> usize {
        self.disposed.load(Ordering::Relaxed)
    }
}

impl MeshBuilder for FaceCullMesher {
    type Mesh = ChunkMeshCPU;

    fn rebuild(
        &self,
        key: ChunkKey,
        bounds: &Aabb,
        data: &ChunkData,
        neighbors: &NeighborFaces,
    ) -> ChunkMeshCPU {
        let mesh = build_chunk_faces(key, bounds, self.cell_size, data, neighbors);
        self.built.fetch_add(1, Ordering::Relaxed);
        log::trace!(target: "mesh", "built {key}: {} quads", mesh.quad_count());
        mesh
    }

    fn dispose(&self, mesh: ChunkMeshCPU) {
        log::trace!(target: "mesh", "released {}", mesh.key);
        self.disposed.fetch_add(1, Ordering::Relaxed);
    }
}
