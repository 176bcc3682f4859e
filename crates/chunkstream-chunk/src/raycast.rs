use chunkstream_geom::{Aabb, Ray};

use crate::ChunkData;

/// Cell hit inside one chunk. `t` is the world-space distance along the ray
/// to the entry point of the cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellHit {
    pub x: usize,
    pub y: usize,
    pub z: usize,
    pub t: f32,
}

#[inline]
fn inv_or_max(v: f32) -> f32 {
    if v.abs() < 1e-8 { f32::MAX } else { 1.0 / v.abs() }
}

/// Walks the cell grid of one chunk along `ray` (3-D DDA) and returns the
/// first non-air cell. `bounds` is the chunk's world box; `cell_size` the
/// edge of one cell.
pub fn first_solid_cell(data: &ChunkData, bounds: &Aabb, cell_size: f32, ray: &Ray) -> Option<CellHit> {
    let t_entry = bounds.ray_entry(ray)?;
    let d = data.dims;
    let dir = ray.dir;
    let local = (ray.at(t_entry) - bounds.min) / cell_size;

    let clamp = |v: f32, n: usize| (v.floor().max(0.0) as usize).min(n - 1) as i64;
    let mut v = [clamp(local.x, d.sx), clamp(local.y, d.sy), clamp(local.z, d.sz)];
    let size = [d.sx as i64, d.sy as i64, d.sz as i64];

    let mut step = [0i64; 3];
    let mut t_delta = [f32::MAX; 3];
    let mut t_max = [f32::MAX; 3];
    for axis in 0..3 {
        let di = dir.axis(axis);
        let li = local.axis(axis);
        let inv = inv_or_max(di);
        if di > 0.0 {
            step[axis] = 1;
            t_delta[axis] = inv;
            t_max[axis] = (v[axis] as f32 + 1.0 - li).max(0.0) * inv;
        } else if di < 0.0 {
            step[axis] = -1;
            t_delta[axis] = inv;
            t_max[axis] = (li - v[axis] as f32).max(0.0) * inv;
        }
    }

    // Local-grid distance travelled since the entry point.
    let mut t = 0.0f32;
    loop {
        let (x, y, z) = (v[0] as usize, v[1] as usize, v[2] as usize);
        if !data.cell(x, y, z).is_air() {
            return Some(CellHit {
                x,
                y,
                z,
                t: t_entry + t * cell_size,
            });
        }
        let axis = if t_max[0] < t_max[1] {
            if t_max[0] < t_max[2] { 0 } else { 2 }
        } else if t_max[1] < t_max[2] {
            1
        } else {
            2
        };
        if step[axis] == 0 {
            return None;
        }
        v[axis] += step[axis];
        if v[axis] < 0 || v[axis] >= size[axis] {
            return None;
        }
        t = t_max[axis];
        t_max[axis] += t_delta[axis];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkstream_blocks::Cell;
    use chunkstream_geom::Vec3;
    use chunkstream_world::ChunkDims;

    fn setup() -> (ChunkData, Aabb) {
        let data = ChunkData::air(ChunkDims::cubic(4));
        let bounds = Aabb::new(Vec3::ZERO, Vec3::splat(8.0));
        (data, bounds)
    }

    #[test]
    fn hits_cell_along_axis() {
        let (mut data, bounds) = setup();
        data.set_cell(2, 1, 1, Cell::SOLID);
        let ray = Ray::new(Vec3::new(-3.0, 3.0, 3.0), Vec3::new(1.0, 0.0, 0.0));
        let hit = first_solid_cell(&data, &bounds, 2.0, &ray).unwrap();
        assert_eq!((hit.x, hit.y, hit.z), (2, 1, 1));
        assert!((hit.t - 7.0).abs() < 1e-4, "t = {}", hit.t);
    }

    #[test]
    fn empty_chunk_has_no_hit() {
        let (data, bounds) = setup();
        let ray = Ray::new(Vec3::new(-1.0, 1.0, 1.0), Vec3::new(1.0, 0.7, 0.3));
        assert_eq!(first_solid_cell(&data, &bounds, 2.0, &ray), None);
    }

    #[test]
    fn ray_missing_box_has_no_hit() {
        let (mut data, bounds) = setup();
        data.set_cell(0, 0, 0, Cell::SOLID);
        let ray = Ray::new(Vec3::new(-1.0, 20.0, 1.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(first_solid_cell(&data, &bounds, 2.0, &ray), None);
    }

    #[test]
    fn diagonal_ray_finds_nearest_of_two() {
        let (mut data, bounds) = setup();
        data.set_cell(1, 1, 1, Cell::SOLID);
        data.set_cell(3, 3, 3, Cell::WATER);
        let ray = Ray::new(Vec3::new(0.5, 0.5, 0.5), Vec3::new(1.0, 1.0, 1.0));
        let hit = first_solid_cell(&data, &bounds, 2.0, &ray).unwrap();
        assert_eq!((hit.x, hit.y, hit.z), (1, 1, 1));
    }

    #[test]
    fn origin_inside_solid_cell_hits_immediately() {
        let (mut data, bounds) = setup();
        data.set_cell(0, 0, 0, Cell::SOLID);
        let ray = Ray::new(Vec3::new(1.0, 1.0, 1.0), Vec3::new(0.0, 1.0, 0.0));
        let hit = first_solid_cell(&data, &bounds, 2.0, &ray).unwrap();
        assert_eq!((hit.x, hit.y, hit.z, hit.t), (0, 0, 0, 0.0));
    }
}
