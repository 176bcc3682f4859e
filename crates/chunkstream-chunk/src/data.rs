use chunkstream_blocks::{Cell, MAX_LIGHT};
use chunkstream_world::ChunkDims;

use crate::Face;

/// Cell and light arrays of one chunk, both in [`ChunkDims::idx`] order.
#[derive(Clone, Debug)]
pub struct ChunkData {
    pub dims: ChunkDims,
    cells: Box<[Cell]>,
    light: Box<[u8]>,
}

impl ChunkData {
    /// Wraps generated or loaded cells. A buffer of the wrong length is
    /// padded with air or truncated.
    pub fn from_cells(dims: ChunkDims, cells: Vec<Cell>) -> Self {
        let mut cells = cells;
        let expect = dims.volume();
        if cells.len() != expect {
            log::warn!(
                "cell buffer has {} entries, expected {expect}; resizing",
                cells.len()
            );
            cells.resize(expect, Cell::AIR);
        }
        Self {
            dims,
            cells: cells.into_boxed_slice(),
            light: vec![MAX_LIGHT; expect].into_boxed_slice(),
        }
    }

    pub fn air(dims: ChunkDims) -> Self {
        Self::from_cells(dims, vec![Cell::AIR; dims.volume()])
    }

    #[inline]
    pub fn cell(&self, x: usize, y: usize, z: usize) -> Cell {
        self.cells[self.dims.idx(x, y, z)]
    }

    /// Writes a cell and returns the previous value.
    #[inline]
    pub fn set_cell(&mut self, x: usize, y: usize, z: usize, cell: Cell) -> Cell {
        let i = self.dims.idx(x, y, z);
        std::mem::replace(&mut self.cells[i], cell)
    }

    #[inline]
    pub fn light(&self, x: usize, y: usize, z: usize) -> u8 {
        self.light[self.dims.idx(x, y, z)]
    }

    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[inline]
    pub fn light_levels(&self) -> &[u8] {
        &self.light
    }

    /// Both arrays at once, for passes that read cells and write light.
    #[inline]
    pub fn split_mut(&mut self) -> (&[Cell], &mut [u8]) {
        (&self.cells, &mut self.light)
    }

    #[inline]
    pub fn has_non_air(&self) -> bool {
        self.cells.iter().any(|c| !c.is_air())
    }

    /// Copies the layer of cells lying on `face`, indexed by
    /// [`Face::plane_index`].
    pub fn face_plane(&self, face: Face) -> Box<[Cell]> {
        let d = self.dims;
        let mut out = vec![Cell::AIR; face.plane_len(d)];
        let (xs, ys, zs) = match face {
            Face::PosX => (d.sx - 1..d.sx, 0..d.sy, 0..d.sz),
            Face::NegX => (0..1, 0..d.sy, 0..d.sz),
            Face::PosY => (0..d.sx, d.sy - 1..d.sy, 0..d.sz),
            Face::NegY => (0..d.sx, 0..1, 0..d.sz),
            Face::PosZ => (0..d.sx, 0..d.sy, d.sz - 1..d.sz),
            Face::NegZ => (0..d.sx, 0..d.sy, 0..1),
        };
        for y in ys {
            for z in zs.clone() {
                for x in xs.clone() {
                    out[face.plane_index(d, x, y, z)] = self.cell(x, y, z);
                }
            }
        }
        out.into_boxed_slice()
    }
}

/// Boundary layers of the six face-adjacent chunks, captured before the
/// chunk's own data lock is taken. A missing entry means the neighbor was not
/// resident.
#[derive(Clone, Debug, Default)]
pub struct NeighborFaces {
    planes: [Option<Box<[Cell]>>; 6],
}

impl NeighborFaces {
    pub fn none() -> Self {
        Self::default()
    }

    /// Stores the neighbor across `face`. `plane` is the neighbor's own
    /// layer on `face.opposite()`.
    pub fn insert(&mut self, face: Face, plane: Box<[Cell]>) {
        self.planes[face.index()] = Some(plane);
    }

    #[inline]
    pub fn is_loaded(&self, face: Face) -> bool {
        self.planes[face.index()].is_some()
    }

    /// Cell just across `face` from local boundary cell `(x,y,z)`, if that
    /// neighbor was resident.
    #[inline]
    pub fn beyond(&self, dims: ChunkDims, face: Face, x: usize, y: usize, z: usize) -> Option<Cell> {
        self.planes[face.index()]
            .as_ref()
            .and_then(|p| p.get(face.plane_index(dims, x, y, z)).copied())
    }
}
