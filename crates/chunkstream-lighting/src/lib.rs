//! Vertical occlusion lighting for a single chunk.
//!
//! Each `(x,z)` column is swept once from the top cell down. Cells above the
//! first opaque cell, and that cell itself, receive the level entering the
//! top of the column; everything below it receives [`MIN_LIGHT`]. There is no
//! sideways propagation.
#![forbid(unsafe_code)]

use chunkstream_blocks::{Cell, MAX_LIGHT, MIN_LIGHT};
use chunkstream_chunk::ChunkData;
use chunkstream_world::ChunkDims;

/// Light entering the top face of a chunk, one level per column, indexed
/// `z * sx + x`. `None` in [`sweep`] means open sky ([`MAX_LIGHT`]) over
/// every column.
pub type TopBorder<'a> = Option<&'a [u8]>;

#[inline]
fn column_index(dims: ChunkDims, x: usize, z: usize) -> usize {
    z * dims.sx + x
}

/// Sweeps raw arrays in [`ChunkDims::idx`] order.
pub fn sweep_cells(dims: ChunkDims, cells: &[Cell], light: &mut [u8], top: TopBorder<'_>) {
    for z in 0..dims.sz {
        for x in 0..dims.sx {
            let mut level = top
                .and_then(|t| t.get(column_index(dims, x, z)).copied())
                .unwrap_or(MAX_LIGHT)
                .min(MAX_LIGHT);
            for y in (0..dims.sy).rev() {
                let i = dims.idx(x, y, z);
                light[i] = level;
                if cells[i].is_opaque() {
                    level = MIN_LIGHT;
                }
            }
        }
    }
}

/// Recomputes the light array of `data` in place.
pub fn sweep(data: &mut ChunkData, top: TopBorder<'_>) {
    let dims = data.dims;
    let (cells, light) = data.split_mut();
    sweep_cells(dims, cells, light, top);
}

/// Light leaving the bottom face of a swept chunk, in the layout
/// [`TopBorder`] expects. Feeding it to the chunk below chains columns
/// across vertically stacked chunks.
pub fn bottom_exit(data: &ChunkData) -> Vec<u8> {
    let d = data.dims;
    let mut out = vec![MIN_LIGHT; d.sx * d.sz];
    for z in 0..d.sz {
        for x in 0..d.sx {
            if data.cell(x, 0, z).is_translucent() {
                out[column_index(d, x, z)] = data.light(x, 0, z);
            }
        }
    }
    out
}
