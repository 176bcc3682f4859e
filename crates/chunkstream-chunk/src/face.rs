use chunkstream_geom::Vec3;
use chunkstream_world::ChunkDims;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Face {
    PosY = 0,
    NegY = 1,
    PosX = 2,
    NegX = 3,
    PosZ = 4,
    NegZ = 5,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::PosY,
        Face::NegY,
        Face::PosX,
        Face::NegX,
        Face::PosZ,
        Face::NegZ,
    ];

    /// Returns the `[0..6)` index of this face.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn opposite(self) -> Face {
        match self {
            Face::PosY => Face::NegY,
            Face::NegY => Face::PosY,
            Face::PosX => Face::NegX,
            Face::NegX => Face::PosX,
            Face::PosZ => Face::NegZ,
            Face::NegZ => Face::PosZ,
        }
    }

    /// Returns the integer grid delta `(dx,dy,dz)` when stepping out of this face.
    #[inline]
    pub fn delta(self) -> (i32, i32, i32) {
        match self {
            Face::PosY => (0, 1, 0),
            Face::NegY => (0, -1, 0),
            Face::PosX => (1, 0, 0),
            Face::NegX => (-1, 0, 0),
            Face::PosZ => (0, 0, 1),
            Face::NegZ => (0, 0, -1),
        }
    }

    #[inline]
    pub fn normal(self) -> Vec3 {
        let (x, y, z) = self.delta();
        Vec3::new(x as f32, y as f32, z as f32)
    }

    /// Whether local cell `(x,y,z)` lies on this face of a chunk.
    #[inline]
    pub fn touches(self, dims: ChunkDims, x: usize, y: usize, z: usize) -> bool {
        match self {
            Face::PosY => y + 1 == dims.sy,
            Face::NegY => y == 0,
            Face::PosX => x + 1 == dims.sx,
            Face::NegX => x == 0,
            Face::PosZ => z + 1 == dims.sz,
            Face::NegZ => z == 0,
        }
    }

    /// Faces of the chunk that local cell `(x,y,z)` touches; empty for
    /// interior cells.
    pub fn touched_by(dims: ChunkDims, x: usize, y: usize, z: usize) -> impl Iterator<Item = Face> {
        Face::ALL
            .into_iter()
            .filter(move |f| f.touches(dims, x, y, z))
    }

    /// Cells in a boundary plane perpendicular to this face.
    #[inline]
    pub fn plane_len(self, dims: ChunkDims) -> usize {
        match self {
            Face::PosX | Face::NegX => dims.sy * dims.sz,
            Face::PosY | Face::NegY => dims.sx * dims.sz,
            Face::PosZ | Face::NegZ => dims.sx * dims.sy,
        }
    }

    /// Index of `(x,y,z)` projected onto the plane perpendicular to this
    /// face. Opposite faces share the projection, so a cell and the cell
    /// across the boundary map to the same index.
    #[inline]
    pub fn plane_index(self, dims: ChunkDims, x: usize, y: usize, z: usize) -> usize {
        match self {
            Face::PosX | Face::NegX => y * dims.sz + z,
            Face::PosY | Face::NegY => z * dims.sx + x,
            Face::PosZ | Face::NegZ => y * dims.sx + x,
        }
    }
}
