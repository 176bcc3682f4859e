use std::fmt;

pub const MIN_LIGHT: u8 = 0;
pub const MAX_LIGHT: u8 = 15;

/// Type code of a single cell. Stored as one byte in chunk arrays and on disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Cell(pub u8);

impl Cell {
    pub const AIR: Cell = Cell(0);
    pub const SOLID: Cell = Cell(1);
    pub const WATER: Cell = Cell(2);

    /// Highest known code; anything above is treated as an opaque unknown.
    pub const MAX: Cell = Cell::WATER;

    #[inline]
    pub const fn is_air(self) -> bool {
        self.0 == Cell::AIR.0
    }

    /// Light and sight pass through air and water.
    #[inline]
    pub const fn is_translucent(self) -> bool {
        self.0 == Cell::AIR.0 || self.0 == Cell::WATER.0
    }

    #[inline]
    pub const fn is_opaque(self) -> bool {
        !self.is_translucent()
    }

    #[inline]
    pub const fn is_known(self) -> bool {
        self.0 <= Cell::MAX.0
    }
}

impl From<u8> for Cell {
    #[inline]
    fn from(v: u8) -> Self {
        Cell(v)
    }
}

impl From<Cell> for u8 {
    #[inline]
    fn from(c: Cell) -> Self {
        c.0
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Cell::AIR => f.write_str("air"),
            Cell::SOLID => f.write_str("solid"),
            Cell::WATER => f.write_str("water"),
            Cell(other) => write!(f, "unknown({other})"),
        }
    }
}
