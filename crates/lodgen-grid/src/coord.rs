use serde::{Deserialize, Serialize};

/// Columns per tile edge.
pub const TILE_SIZE: i32 = 16;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub z: i32,
}

impl TileCoord {
    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    #[inline]
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }

    #[inline]
    pub fn min_block_x(self) -> i32 {
        self.x * TILE_SIZE
    }

    #[inline]
    pub fn min_block_z(self) -> i32 {
        self.z * TILE_SIZE
    }

    #[inline]
    pub fn max_block_x(self) -> i32 {
        self.min_block_x() + TILE_SIZE - 1
    }

    #[inline]
    pub fn max_block_z(self) -> i32 {
        self.min_block_z() + TILE_SIZE - 1
    }

    /// Largest per-axis distance to `other`.
    #[inline]
    pub fn chebyshev(self, other: TileCoord) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }
}

impl From<(i32, i32)> for TileCoord {
    fn from(value: (i32, i32)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl From<TileCoord> for (i32, i32) {
    fn from(value: TileCoord) -> Self {
        (value.x, value.z)
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}
