use lodgen_grid::{TileCoord, TileGrid};

use crate::stage::Stage;
use crate::tile::Tile;

/// Mutable window over the halo grid of one request.
///
/// `status_floor` is the lowest marker stage code may assume for readable
/// neighbours; it is advisory and only surfaced to generators through
/// [`RegionView::status_floor`]. `write_radius` bounds the tiles a stage may
/// modify: stage runners refuse targets for which [`Region::can_write`] is
/// false.
pub struct Region<'a> {
    tiles: &'a mut TileGrid<Tile>,
    center: TileCoord,
    status_floor: Stage,
    write_radius: u32,
}

impl<'a> Region<'a> {
    pub fn new(
        tiles: &'a mut TileGrid<Tile>,
        center: TileCoord,
        status_floor: Stage,
        write_radius: u32,
    ) -> Self {
        Self {
            tiles,
            center,
            status_floor,
            write_radius,
        }
    }

    #[inline]
    pub fn center(&self) -> TileCoord {
        self.center
    }

    #[inline]
    pub fn radius(&self) -> u32 {
        self.tiles.radius()
    }

    #[inline]
    pub fn status_floor(&self) -> Stage {
        self.status_floor
    }

    #[inline]
    pub fn write_radius(&self) -> u32 {
        self.write_radius
    }

    pub fn can_write(&self, pos: TileCoord) -> bool {
        pos.chebyshev(self.center) <= self.write_radius as i32
    }

    pub fn index_for(&self, pos: TileCoord) -> Option<usize> {
        index_for(&*self.tiles, self.center, pos)
    }

    pub fn tile(&self, pos: TileCoord) -> Option<&Tile> {
        self.index_for(pos).map(|i| self.tiles.at(i))
    }

    #[inline]
    pub fn tile_at(&self, index: usize) -> &Tile {
        self.tiles.at(index)
    }

    #[inline]
    pub fn tile_at_mut(&mut self, index: usize) -> &mut Tile {
        self.tiles.at_mut(index)
    }

    /// Moves a tile out, leaving a placeholder until [`Region::put`].
    pub fn take(&mut self, index: usize) -> Tile {
        let pos = self.tiles.at(index).pos();
        std::mem::replace(self.tiles.at_mut(index), Tile::placeholder(pos))
    }

    pub fn put(&mut self, index: usize, tile: Tile) {
        *self.tiles.at_mut(index) = tile;
    }

    /// Read-only view with `excluded` hidden (the tile currently taken out).
    pub fn view(&self, excluded: Option<TileCoord>) -> RegionView<'_> {
        RegionView {
            tiles: &*self.tiles,
            center: self.center,
            status_floor: self.status_floor,
            excluded,
        }
    }
}

#[derive(Clone, Copy)]
pub struct RegionView<'a> {
    tiles: &'a TileGrid<Tile>,
    center: TileCoord,
    status_floor: Stage,
    excluded: Option<TileCoord>,
}

impl<'a> RegionView<'a> {
    #[inline]
    pub fn center(&self) -> TileCoord {
        self.center
    }

    #[inline]
    pub fn status_floor(&self) -> Stage {
        self.status_floor
    }

    pub fn tile(&self, pos: TileCoord) -> Option<&'a Tile> {
        if self.excluded == Some(pos) {
            return None;
        }
        index_for(self.tiles, self.center, pos).map(|i| self.tiles.at(i))
    }

    /// Tile at `pos` only if it has reached `stage`.
    pub fn tile_at_least(&self, pos: TileCoord, stage: Stage) -> Option<&'a Tile> {
        self.tile(pos).filter(|t| t.is_or_after(stage))
    }

    /// Tiles within `radius` of `pos` that are present in the region.
    pub fn neighbors(&self, pos: TileCoord, radius: i32) -> impl Iterator<Item = &'a Tile> + '_ {
        (-radius..=radius).flat_map(move |dz| {
            (-radius..=radius).filter_map(move |dx| self.tile(pos.offset(dx, dz)))
        })
    }
}

fn index_for(tiles: &TileGrid<Tile>, center: TileCoord, pos: TileCoord) -> Option<usize> {
    let dx = pos.x - center.x;
    let dy = pos.z - center.z;
    if !tiles.contains_offset(dx, dy) {
        return None;
    }
    Some(tiles.index_of(tiles.center_index(), dx, dy))
}
