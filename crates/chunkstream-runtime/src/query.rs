use std::fmt;
use std::sync::Arc;

use chunkstream_blocks::Cell;
use chunkstream_chunk::MeshBuilder;
use chunkstream_geom::{Aabb, Ray, Vec3};

use crate::manager::ChunkManager;
use crate::stream::ChunkRef;

/// A cell found by a query, with the chunk it belongs to.
pub struct Hit<M> {
    pub chunk: ChunkRef<M>,
    pub x: usize,
    pub y: usize,
    pub z: usize,
    pub cell: Cell,
    /// Ray entry point into the cell, or the queried point.
    pub point: Vec3,
    pub distance: f32,
}

impl<M> Clone for Hit<M> {
    fn clone(&self) -> Self {
        Self {
            chunk: Arc::clone(&self.chunk),
            x: self.x,
            y: self.y,
            z: self.z,
            cell: self.cell,
            point: self.point,
            distance: self.distance,
        }
    }
}

impl<M> fmt::Debug for Hit<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hit")
            .field("chunk", &self.chunk.key())
            .field("cell", &(self.x, self.y, self.z))
            .field("type", &self.cell)
            .field("point", &self.point)
            .field("distance", &self.distance)
            .finish()
    }
}

/// Queries only look at the published visible set.
impl<B: MeshBuilder> ChunkManager<B> {
    /// Calls `f` for each published chunk that is still live.
    pub fn visit_visible(&self, mut f: impl FnMut(&ChunkRef<B::Mesh>)) {
        for chunk in self.published().iter() {
            if !chunk.is_disposed() {
                f(chunk);
            }
        }
    }

    /// Nearest non-air cell hit by `ray`.
    pub fn closest_intersection(&self, ray: &Ray) -> Option<Hit<B::Mesh>> {
        let cell_size = self.layout().cell_size;
        let mut best: Option<Hit<B::Mesh>> = None;
        self.visit_visible(|chunk| {
            let Some(entry) = chunk.bounds().ray_entry(ray) else {
                return;
            };
            if best.as_ref().is_some_and(|b| entry > b.distance) {
                return;
            }
            if let Some(h) = chunk.raycast(ray, cell_size) {
                if best.as_ref().is_none_or(|b| h.t < b.distance) {
                    best = Some(Hit {
                        chunk: Arc::clone(chunk),
                        x: h.x,
                        y: h.y,
                        z: h.z,
                        cell: chunk.cell(h.x, h.y, h.z),
                        point: ray.at(h.t),
                        distance: h.t,
                    });
                }
            }
        });
        best
    }

    /// Cell containing `p`, if its chunk is published.
    pub fn containing_cell(&self, p: Vec3) -> Option<Hit<B::Mesh>> {
        let layout = *self.layout();
        let key = layout.key_at(p);
        let published = self.published();
        let chunk = published
            .iter()
            .find(|c| c.key() == key && !c.is_disposed())?;
        let (x, y, z) = layout.cell_at(key, p)?;
        Some(Hit {
            chunk: Arc::clone(chunk),
            x,
            y,
            z,
            cell: chunk.cell(x, y, z),
            point: p,
            distance: 0.0,
        })
    }

    /// Whether `bb` overlaps any non-air cell of a published chunk. Boxes
    /// that only touch a cell's face do not count.
    pub fn intersects_non_empty(&self, bb: &Aabb) -> bool {
        let cs = self.layout().cell_size;
        let mut found = false;
        self.visit_visible(|chunk| {
            if found || !chunk.bounds().intersects(bb) {
                return;
            }
            let origin = chunk.bounds().min;
            let data = chunk.lock_data();
            let d = data.dims;
            let size = [d.sx, d.sy, d.sz];
            let mut lo = [0usize; 3];
            let mut hi = [0usize; 3];
            for axis in 0..3 {
                let a = (bb.min.axis(axis) - origin.axis(axis)) / cs;
                let b = (bb.max.axis(axis) - origin.axis(axis)) / cs;
                let first = a.floor().max(0.0) as usize;
                let end = (b.ceil().max(0.0) as usize).min(size[axis]);
                if first >= end {
                    return;
                }
                lo[axis] = first;
                hi[axis] = end;
            }
            for y in lo[1]..hi[1] {
                for z in lo[2]..hi[2] {
                    for x in lo[0]..hi[0] {
                        if !data.cell(x, y, z).is_air() {
                            found = true;
                            return;
                        }
                    }
                }
            }
        });
        found
    }

    /// [`ChunkManager::set_cell`] at a query hit.
    pub fn set_cell_at(&self, hit: &Hit<B::Mesh>, cell: Cell) -> bool {
        self.set_cell(&hit.chunk, hit.x, hit.y, hit.z, cell)
    }
}
