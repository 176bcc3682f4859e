use std::fmt;

use serde::{Deserialize, Serialize};

/// Grid position of a chunk. Equality and hashing are all the cache needs;
/// no ordering is implied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    pub cx: i32,
    pub cy: i32,
    pub cz: i32,
}

impl ChunkKey {
    #[inline]
    pub const fn new(cx: i32, cy: i32, cz: i32) -> Self {
        Self { cx, cy, cz }
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            cx: self.cx + dx,
            cy: self.cy + dy,
            cz: self.cz + dz,
        }
    }

    #[inline]
    pub fn distance_sq(self, other: ChunkKey) -> i64 {
        let dx = i64::from(self.cx - other.cx);
        let dy = i64::from(self.cy - other.cy);
        let dz = i64::from(self.cz - other.cz);
        dx * dx + dy * dy + dz * dz
    }

    /// True when `other` lies inside the box of `radius_xz` chunks around
    /// `self` horizontally and `radius_y` chunks vertically.
    #[inline]
    pub fn within(self, other: ChunkKey, radius_xz: i32, radius_y: i32) -> bool {
        (self.cx - other.cx).abs() <= radius_xz
            && (self.cz - other.cz).abs() <= radius_xz
            && (self.cy - other.cy).abs() <= radius_y
    }

    /// All keys of the neighborhood box around `self`, `self` included.
    pub fn neighborhood(self, radius_xz: i32, radius_y: i32) -> impl Iterator<Item = ChunkKey> {
        let rxz = radius_xz.max(0);
        let ry = radius_y.max(0);
        (-ry..=ry).flat_map(move |dy| {
            (-rxz..=rxz)
                .flat_map(move |dz| (-rxz..=rxz).map(move |dx| self.offset(dx, dy, dz)))
        })
    }
}

impl From<(i32, i32, i32)> for ChunkKey {
    fn from(value: (i32, i32, i32)) -> Self {
        Self::new(value.0, value.1, value.2)
    }
}

impl From<ChunkKey> for (i32, i32, i32) {
    fn from(value: ChunkKey) -> Self {
        (value.cx, value.cy, value.cz)
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.cx, self.cy, self.cz)
    }
}
