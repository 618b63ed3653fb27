//! Tile coordinates and the square, center-addressed tile grid.
#![forbid(unsafe_code)]

mod coord;
mod grid;

pub use coord::{TILE_SIZE, TileCoord};
pub use grid::TileGrid;
