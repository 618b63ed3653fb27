use std::fmt;

use lodgen_grid::TileCoord;

use crate::params::BiomeRegistry;
use crate::region::RegionView;
use crate::stage::Stage;
use crate::tile::Tile;

/// Recoverable per-tile failure raised by a generator stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageError {
    pub stage: Stage,
    pub tile: TileCoord,
    pub reason: String,
}

impl StageError {
    pub fn new(stage: Stage, tile: TileCoord, reason: impl Into<String>) -> Self {
        Self {
            stage,
            tile,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed for tile {}: {}", self.stage, self.tile, self.reason)
    }
}

impl std::error::Error for StageError {}

/// What a stage implementation may read while filling one tile.
pub struct StageContext<'a> {
    pub stage: Stage,
    pub seed: u64,
    pub biomes: &'a BiomeRegistry,
    /// Halo around the request; the tile being filled is not visible here.
    pub region: RegionView<'a>,
}

impl StageContext<'_> {
    pub fn fail(&self, tile: &Tile, reason: impl Into<String>) -> StageError {
        StageError::new(self.stage, tile.pos(), reason)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratorKind {
    Noise,
    Flat,
    Debug,
    Unknown,
}

impl GeneratorKind {
    pub fn is_known(self) -> bool {
        !matches!(self, GeneratorKind::Unknown)
    }
}

/// Staged terrain backend. One method per pipeline stage; each fills the
/// payload of a single tile. The caller owns completion markers.
pub trait StagedGenerator: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Unknown
    }

    fn structure_starts(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError>;

    /// Cross-referencing is done by the runtime; backends may add extra data.
    fn structure_references(
        &self,
        _cx: &StageContext<'_>,
        _tile: &mut Tile,
    ) -> Result<(), StageError> {
        Ok(())
    }

    fn biomes(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError>;

    fn noise(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError>;

    fn surface(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError>;

    fn carvers(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError>;

    fn features(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError>;

    /// Dispatches to the method for `cx.stage`.
    fn run_stage(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        match cx.stage {
            Stage::Empty => Ok(()),
            Stage::StructureStart => self.structure_starts(cx, tile),
            Stage::StructureReference => self.structure_references(cx, tile),
            Stage::Biomes => self.biomes(cx, tile),
            Stage::Noise => self.noise(cx, tile),
            Stage::Surface => self.surface(cx, tile),
            Stage::Carvers => self.carvers(cx, tile),
            Stage::Features => self.features(cx, tile),
        }
    }
}
