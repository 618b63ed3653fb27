use fastnoise_lite::{FastNoiseLite, NoiseType};
use lodgen_grid::TILE_SIZE;

use crate::config::NoiseConfig;
use crate::generator::{GeneratorKind, StageContext, StageError, StagedGenerator};
use crate::tile::{BlockBox, COLUMNS, FeaturePlacement, QUARTS, StructureStart, SurfaceBlock, Tile};

const TREE: u16 = 0;
const STRUCTURE_KINDS: u64 = 3;
const STRUCTURE_CHANCE: u64 = 48;

/// Heightfield backend built on fastnoise-lite; used by the CLI and benches.
pub struct NoiseGenerator {
    seed: u64,
    cfg: NoiseConfig,
    terrain: FastNoiseLite,
    temperature: FastNoiseLite,
    moisture: FastNoiseLite,
    caves: FastNoiseLite,
}

impl NoiseGenerator {
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, NoiseConfig::default())
    }

    pub fn with_config(seed: u64, cfg: NoiseConfig) -> Self {
        let s = seed as i32 ^ (seed >> 32) as i32;
        let mut terrain = FastNoiseLite::with_seed(s);
        terrain.set_noise_type(Some(NoiseType::OpenSimplex2));
        terrain.set_frequency(Some(cfg.height_frequency));
        let mut temperature = FastNoiseLite::with_seed(s ^ 0x1203_5F31);
        temperature.set_noise_type(Some(NoiseType::OpenSimplex2));
        temperature.set_frequency(Some(cfg.biome_frequency));
        let mut moisture = FastNoiseLite::with_seed(s ^ 0x12E3_A1B2);
        moisture.set_noise_type(Some(NoiseType::OpenSimplex2));
        moisture.set_frequency(Some(cfg.biome_frequency));
        let mut caves = FastNoiseLite::with_seed(s ^ 41_337);
        caves.set_noise_type(Some(NoiseType::OpenSimplex2));
        caves.set_frequency(Some(cfg.cave_frequency));
        Self {
            seed,
            cfg,
            terrain,
            temperature,
            moisture,
            caves,
        }
    }

    fn hash(&self, x: i32, z: i32, salt: u64) -> u64 {
        let mut h = self.seed ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        h ^= (x as u32 as u64) << 32 | z as u32 as u64;
        h = (h ^ (h >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        h = (h ^ (h >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        h ^ (h >> 31)
    }

    fn unit(n: f32) -> f32 {
        ((n + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    fn column_height(&self, wx: i32, wz: i32) -> i32 {
        let n = Self::unit(self.terrain.get_noise_2d(wx as f32, wz as f32));
        let span = (self.cfg.max_height - self.cfg.min_height) as f32;
        self.cfg.min_height + (n * span) as i32
    }
}

impl StagedGenerator for NoiseGenerator {
    fn name(&self) -> &str {
        "noise"
    }

    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Noise
    }

    fn structure_starts(&self, _cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        let pos = tile.pos();
        let h = self.hash(pos.x, pos.z, 1);
        if h % STRUCTURE_CHANCE != 0 {
            return Ok(());
        }
        let half = 8 + ((h >> 8) % 32) as i32;
        let cx = pos.min_block_x() + TILE_SIZE / 2;
        let cz = pos.min_block_z() + TILE_SIZE / 2;
        tile.structure_starts.push(StructureStart {
            kind: ((h >> 16) % STRUCTURE_KINDS) as u16,
            origin: pos,
            bounds: BlockBox::new(cx - half, cz - half, cx + half, cz + half),
        });
        Ok(())
    }

    fn biomes(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        if cx.biomes.is_empty() {
            return Err(cx.fail(tile, "biome registry is empty"));
        }
        let pos = tile.pos();
        tile.biomes.clear();
        for qz in 0..4 {
            for qx in 0..4 {
                let x = (pos.min_block_x() + qx * 4 + 2) as f32;
                let z = (pos.min_block_z() + qz * 4 + 2) as f32;
                let t = Self::unit(self.temperature.get_noise_2d(x, z)) * 2.0;
                let m = Self::unit(self.moisture.get_noise_2d(x, z));
                let id = cx
                    .biomes
                    .closest(t, m)
                    .ok_or_else(|| cx.fail(tile, "no biome matched"))?;
                tile.biomes.push(id);
            }
        }
        Ok(())
    }

    fn noise(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        if tile.biomes.len() != QUARTS {
            return Err(cx.fail(tile, "biomes missing"));
        }
        let pos = tile.pos();
        tile.heights.clear();
        for lz in 0..TILE_SIZE {
            for lx in 0..TILE_SIZE {
                tile.heights
                    .push(self.column_height(pos.min_block_x() + lx, pos.min_block_z() + lz));
            }
        }
        Ok(())
    }

    fn surface(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        if tile.heights.len() != COLUMNS {
            return Err(cx.fail(tile, "heights missing"));
        }
        tile.surface.clear();
        for lz in 0..TILE_SIZE as usize {
            for lx in 0..TILE_SIZE as usize {
                let h = tile.heights[Tile::column_index(lx, lz)];
                let top = match tile.biome_at(lx / 4, lz / 4).and_then(|b| cx.biomes.get(b)) {
                    _ if h < self.cfg.sea_level => SurfaceBlock::Water,
                    _ if h > self.cfg.max_height - 16 => SurfaceBlock::Snow,
                    Some(def) => def.top,
                    None => SurfaceBlock::Stone,
                };
                tile.surface.push(top);
            }
        }
        Ok(())
    }

    fn carvers(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        if tile.heights.len() != COLUMNS {
            return Err(cx.fail(tile, "heights missing"));
        }
        let pos = tile.pos();
        tile.carved.clear();
        for i in 0..COLUMNS {
            let wx = pos.min_block_x() + (i % TILE_SIZE as usize) as i32;
            let wz = pos.min_block_z() + (i / TILE_SIZE as usize) as i32;
            let h = tile.heights[i];
            let n = self.caves.get_noise_3d(wx as f32, (h - 2) as f32, wz as f32);
            let carved = h >= self.cfg.sea_level && n > 0.7;
            if carved {
                tile.heights[i] = h - 3;
            }
            tile.carved.push(carved);
        }
        Ok(())
    }

    fn features(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        if tile.surface.len() != COLUMNS || tile.heights.len() != COLUMNS {
            return Err(cx.fail(tile, "surface missing"));
        }
        let pos = tile.pos();
        let threshold = (self.cfg.tree_density.clamp(0.0, 1.0) * 1024.0) as u64;
        tile.features.clear();
        for i in 0..COLUMNS {
            let (lx, lz) = (i % TILE_SIZE as usize, i / TILE_SIZE as usize);
            if tile.surface[i] != SurfaceBlock::Grass || tile.carved.get(i).copied().unwrap_or(false) {
                continue;
            }
            let h = self.hash(pos.min_block_x() + lx as i32, pos.min_block_z() + lz as i32, 2);
            if h % 1024 < threshold {
                tile.features.push(FeaturePlacement {
                    kind: TREE,
                    lx: lx as u8,
                    lz: lz as u8,
                    top_y: tile.heights[i] + 4 + ((h >> 20) % 3) as i32,
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for NoiseGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseGenerator")
            .field("seed", &self.seed)
            .field("cfg", &self.cfg)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::BiomeRegistry;
    use crate::region::Region;
    use crate::stage::Stage;
    use lodgen_grid::{TileCoord, TileGrid};

    fn run_all(generator: &NoiseGenerator, pos: TileCoord) -> Tile {
        let biomes = BiomeRegistry::with_defaults();
        let mut grid = TileGrid::from_fn(0, |_, _| Tile::placeholder(pos));
        let mut region = Region::new(&mut grid, pos, Stage::StructureStart, 0);
        let mut tile = region.take(0);
        for stage in Stage::PIPELINE {
            let cx = StageContext {
                stage,
                seed: 1,
                biomes: &biomes,
                region: region.view(Some(pos)),
            };
            generator.run_stage(&cx, &mut tile).unwrap();
        }
        tile
    }

    #[test]
    fn fills_every_payload() {
        let tile = run_all(&NoiseGenerator::new(11), TileCoord::new(3, -2));
        assert_eq!(tile.biomes.len(), QUARTS);
        assert_eq!(tile.heights.len(), COLUMNS);
        assert_eq!(tile.surface.len(), COLUMNS);
        assert_eq!(tile.carved.len(), COLUMNS);
        let cfg = NoiseConfig::default();
        assert!(tile.heights.iter().all(|h| *h >= cfg.min_height - 3 && *h <= cfg.max_height));
    }

    #[test]
    fn same_seed_same_terrain() {
        let a = run_all(&NoiseGenerator::new(5), TileCoord::new(-7, 9));
        let b = run_all(&NoiseGenerator::new(5), TileCoord::new(-7, 9));
        assert_eq!(a.heights, b.heights);
        assert_eq!(a.features, b.features);
        assert_eq!(a.structure_starts, b.structure_starts);
    }

    #[test]
    fn noise_without_biomes_fails() {
        let generator = NoiseGenerator::new(1);
        let pos = TileCoord::new(0, 0);
        let biomes = BiomeRegistry::with_defaults();
        let mut grid = TileGrid::from_fn(0, |_, _| Tile::placeholder(pos));
        let region = Region::new(&mut grid, pos, Stage::StructureStart, 0);
        let cx = StageContext {
            stage: Stage::Noise,
            seed: 1,
            biomes: &biomes,
            region: region.view(None),
        };
        let mut tile = Tile::placeholder(pos);
        let err = generator.run_stage(&cx, &mut tile).unwrap_err();
        assert_eq!(err.stage, Stage::Noise);
        assert_eq!(err.tile, pos);
    }
}
