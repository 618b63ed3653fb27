use lodgen_grid::{TILE_SIZE, TileCoord};

use crate::stage::Stage;

pub type BiomeId = u16;

/// Columns per tile (16 x 16).
pub const COLUMNS: usize = (TILE_SIZE * TILE_SIZE) as usize;
/// Biome cells per tile (4 x 4 quarts).
pub const QUARTS: usize = 16;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SurfaceBlock {
    #[default]
    Air,
    Stone,
    Dirt,
    Grass,
    Sand,
    Snow,
    Gravel,
    Water,
}

/// Inclusive block-space rectangle on the XZ plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockBox {
    pub min_x: i32,
    pub min_z: i32,
    pub max_x: i32,
    pub max_z: i32,
}

impl BlockBox {
    pub const fn new(min_x: i32, min_z: i32, max_x: i32, max_z: i32) -> Self {
        Self {
            min_x,
            min_z,
            max_x,
            max_z,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_z <= self.max_z
    }

    #[inline]
    pub fn intersects(&self, min_x: i32, min_z: i32, max_x: i32, max_z: i32) -> bool {
        self.max_x >= min_x && self.min_x <= max_x && self.max_z >= min_z && self.min_z <= max_z
    }

    /// Block footprint of a whole tile.
    pub fn of_tile(pos: TileCoord) -> Self {
        Self::new(
            pos.min_block_x(),
            pos.min_block_z(),
            pos.max_block_x(),
            pos.max_block_z(),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructureStart {
    pub kind: u16,
    pub origin: TileCoord,
    pub bounds: BlockBox,
}

/// A tile's pointer back to a structure start that overlaps it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StructureRef {
    pub kind: u16,
    pub origin: TileCoord,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeaturePlacement {
    pub kind: u16,
    pub lx: u8,
    pub lz: u8,
    pub top_y: i32,
}

/// Partially generated terrain for one tile.
///
/// Payload vectors start empty and are sized by the stage that fills them.
#[derive(Clone, Debug)]
pub struct Tile {
    pos: TileCoord,
    stage: Stage,
    pub structure_starts: Vec<StructureStart>,
    pub structure_refs: Vec<StructureRef>,
    pub biomes: Vec<BiomeId>,
    pub heights: Vec<i32>,
    pub surface: Vec<SurfaceBlock>,
    pub carved: Vec<bool>,
    pub features: Vec<FeaturePlacement>,
    /// Primed after decoration: terrain height or the top of a feature.
    pub heightmap: Vec<i32>,
    /// Some stage failed for this tile and was skipped.
    pub incomplete: bool,
}

impl Tile {
    pub fn placeholder(pos: TileCoord) -> Self {
        Self {
            pos,
            stage: Stage::Empty,
            structure_starts: Vec::new(),
            structure_refs: Vec::new(),
            biomes: Vec::new(),
            heights: Vec::new(),
            surface: Vec::new(),
            carved: Vec::new(),
            features: Vec::new(),
            heightmap: Vec::new(),
            incomplete: false,
        }
    }

    #[inline]
    pub fn pos(&self) -> TileCoord {
        self.pos
    }

    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[inline]
    pub fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    #[inline]
    pub fn is_or_after(&self, stage: Stage) -> bool {
        self.stage.is_or_after(stage)
    }

    #[inline]
    pub fn column_index(lx: usize, lz: usize) -> usize {
        lz * TILE_SIZE as usize + lx
    }

    pub fn height_at(&self, lx: usize, lz: usize) -> Option<i32> {
        self.heights.get(Self::column_index(lx, lz)).copied()
    }

    pub fn biome_at(&self, qx: usize, qz: usize) -> Option<BiomeId> {
        self.biomes.get(qz * 4 + qx).copied()
    }

    pub fn add_reference(&mut self, r: StructureRef) {
        if !self.structure_refs.contains(&r) {
            self.structure_refs.push(r);
        }
    }

    /// Rebuilds `heightmap` from terrain heights and placed features.
    pub fn prime_heights(&mut self) {
        self.heightmap.clear();
        self.heightmap.extend_from_slice(&self.heights);
        if self.heightmap.len() != COLUMNS {
            return;
        }
        for f in &self.features {
            let i = Self::column_index(f.lx as usize, f.lz as usize);
            if f.top_y > self.heightmap[i] {
                self.heightmap[i] = f.top_y;
            }
        }
    }
}
