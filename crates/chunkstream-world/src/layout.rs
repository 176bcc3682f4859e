use chunkstream_geom::{Aabb, Vec3};

use crate::ChunkKey;

/// Cells per axis of every chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkDims {
    pub sx: usize,
    pub sy: usize,
    pub sz: usize,
}

impl ChunkDims {
    #[inline]
    pub const fn new(sx: usize, sy: usize, sz: usize) -> Self {
        Self { sx, sy, sz }
    }

    #[inline]
    pub const fn cubic(n: usize) -> Self {
        Self::new(n, n, n)
    }

    #[inline]
    pub const fn volume(&self) -> usize {
        self.sx * self.sy * self.sz
    }

    #[inline]
    pub const fn idx(&self, x: usize, y: usize, z: usize) -> usize {
        (y * self.sz + z) * self.sx + x
    }

    #[inline]
    pub const fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        x < self.sx && y < self.sy && z < self.sz
    }

    /// Whether a local cell touches any face of the chunk.
    #[inline]
    pub const fn on_boundary(&self, x: usize, y: usize, z: usize) -> bool {
        x == 0 || y == 0 || z == 0 || x + 1 == self.sx || y + 1 == self.sy || z + 1 == self.sz
    }
}

impl Default for ChunkDims {
    fn default() -> Self {
        Self::cubic(16)
    }
}

/// Maps between chunk keys, local cells and world space. World origin sits
/// at the centre of chunk (0,0,0).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkLayout {
    pub dims: ChunkDims,
    pub cell_size: f32,
}

impl ChunkLayout {
    #[inline]
    pub const fn new(dims: ChunkDims, cell_size: f32) -> Self {
        Self { dims, cell_size }
    }

    #[inline]
    pub fn chunk_extent(&self) -> Vec3 {
        Vec3::new(
            self.dims.sx as f32 * self.cell_size,
            self.dims.sy as f32 * self.cell_size,
            self.dims.sz as f32 * self.cell_size,
        )
    }

    /// Chunk containing a world position.
    pub fn key_at(&self, p: Vec3) -> ChunkKey {
        let e = self.chunk_extent();
        let half = e / 2.0;
        ChunkKey::new(
            ((p.x + half.x) / e.x).floor() as i32,
            ((p.y + half.y) / e.y).floor() as i32,
            ((p.z + half.z) / e.z).floor() as i32,
        )
    }

    pub fn chunk_bounds(&self, key: ChunkKey) -> Aabb {
        let e = self.chunk_extent();
        let center = Vec3::new(
            key.cx as f32 * e.x,
            key.cy as f32 * e.y,
            key.cz as f32 * e.z,
        );
        Aabb::from_center(center, e / 2.0)
    }

    pub fn cell_bounds(&self, key: ChunkKey, x: usize, y: usize, z: usize) -> Aabb {
        let origin = self.chunk_bounds(key).min;
        let s = self.cell_size;
        let min = origin + Vec3::new(x as f32 * s, y as f32 * s, z as f32 * s);
        Aabb::new(min, min + Vec3::splat(s))
    }

    /// Integer world-grid position of a local cell, as seen by terrain
    /// generators.
    #[inline]
    pub fn world_cell(&self, key: ChunkKey, x: usize, y: usize, z: usize) -> (i32, i32, i32) {
        let d = self.dims;
        (
            key.cx * d.sx as i32 + x as i32 - (d.sx / 2) as i32,
            key.cy * d.sy as i32 + y as i32 - (d.sy / 2) as i32,
            key.cz * d.sz as i32 + z as i32 - (d.sz / 2) as i32,
        )
    }

    /// Local cell of `key` containing `p`, if the point lies inside that chunk.
    pub fn cell_at(&self, key: ChunkKey, p: Vec3) -> Option<(usize, usize, usize)> {
        let bounds = self.chunk_bounds(key);
        if !bounds.contains_point(p) {
            return None;
        }
        let local = (p - bounds.min) / self.cell_size;
        let x = (local.x.floor() as usize).min(self.dims.sx - 1);
        let y = (local.y.floor() as usize).min(self.dims.sy - 1);
        let z = (local.z.floor() as usize).min(self.dims.sz - 1);
        Some((x, y, z))
    }
}

impl Default for ChunkLayout {
    fn default() -> Self {
        Self::new(ChunkDims::default(), 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_is_centre_of_chunk_zero() {
        let l = ChunkLayout::new(ChunkDims::cubic(16), 2.0);
        let b = l.chunk_bounds(ChunkKey::new(0, 0, 0));
        assert_eq!(b.center(), Vec3::ZERO);
        assert_eq!(b.extent(), Vec3::splat(32.0));
        assert_eq!(l.key_at(Vec3::ZERO), ChunkKey::new(0, 0, 0));
        assert_eq!(l.key_at(Vec3::new(15.9, -15.9, 0.0)), ChunkKey::new(0, 0, 0));
        assert_eq!(l.key_at(Vec3::new(16.0, -16.1, 0.0)), ChunkKey::new(1, -1, 0));
    }

    #[test]
    fn key_at_agrees_with_chunk_bounds() {
        let l = ChunkLayout::new(ChunkDims::new(8, 4, 8), 1.5);
        for key in ChunkKey::new(-2, 1, 3).neighborhood(2, 2) {
            let b = l.chunk_bounds(key);
            assert_eq!(l.key_at(b.center()), key);
            assert_eq!(l.key_at(b.min), key);
        }
    }

    #[test]
    fn cell_at_inverts_cell_bounds() {
        let l = ChunkLayout::new(ChunkDims::new(4, 5, 6), 3.0);
        let key = ChunkKey::new(-1, 2, 0);
        for (x, y, z) in [(0, 0, 0), (3, 4, 5), (2, 1, 3)] {
            let c = l.cell_bounds(key, x, y, z).center();
            assert_eq!(l.cell_at(key, c), Some((x, y, z)));
        }
        let outside = l.chunk_bounds(key.offset(1, 0, 0)).center();
        assert_eq!(l.cell_at(key, outside), None);
    }

    #[test]
    fn boundary_detection() {
        let d = ChunkDims::cubic(4);
        assert!(d.on_boundary(0, 2, 2));
        assert!(d.on_boundary(2, 3, 2));
        assert!(!d.on_boundary(1, 2, 2));
    }
}
