use std::fmt;
use std::str::FromStr;

/// Completion marker of a tile. Ordered: a later variant implies every
/// earlier one has been applied.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Placeholder, nothing generated yet.
    #[default]
    Empty,
    StructureStart,
    StructureReference,
    Biomes,
    Noise,
    Surface,
    Carvers,
    Features,
}

impl Stage {
    /// Runnable stages in execution order.
    pub const PIPELINE: [Stage; 7] = [
        Stage::StructureStart,
        Stage::StructureReference,
        Stage::Biomes,
        Stage::Noise,
        Stage::Surface,
        Stage::Carvers,
        Stage::Features,
    ];

    pub const fn next(self) -> Option<Stage> {
        match self {
            Stage::Empty => Some(Stage::StructureStart),
            Stage::StructureStart => Some(Stage::StructureReference),
            Stage::StructureReference => Some(Stage::Biomes),
            Stage::Biomes => Some(Stage::Noise),
            Stage::Noise => Some(Stage::Surface),
            Stage::Surface => Some(Stage::Carvers),
            Stage::Carvers => Some(Stage::Features),
            Stage::Features => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Stage::Empty => "empty",
            Stage::StructureStart => "structure_start",
            Stage::StructureReference => "structure_reference",
            Stage::Biomes => "biomes",
            Stage::Noise => "noise",
            Stage::Surface => "surface",
            Stage::Carvers => "carvers",
            Stage::Features => "features",
        }
    }

    #[inline]
    pub fn is_or_after(self, other: Stage) -> bool {
        self >= other
    }

    /// Position in [`Stage::PIPELINE`], `None` for `Empty`.
    pub fn pipeline_index(self) -> Option<usize> {
        Stage::PIPELINE.iter().position(|s| *s == self)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseStageError(pub String);

impl fmt::Display for ParseStageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown stage: {}", self.0)
    }
}

impl std::error::Error for ParseStageError {}

impl FromStr for Stage {
    type Err = ParseStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace('-', "_");
        [Stage::Empty]
            .into_iter()
            .chain(Stage::PIPELINE)
            .find(|stage| stage.name() == norm)
            .ok_or_else(|| ParseStageError(s.to_string()))
    }
}

/// Detail handed to the LOD builder alongside a finished grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GenerationMode {
    None,
    BiomeOnlySimulateHeight,
    Surface,
    Features,
}

impl GenerationMode {
    /// Mode a grid generated up to `stage` supports. `Empty` yields nothing.
    pub fn for_stage(stage: Stage) -> Option<GenerationMode> {
        match stage {
            Stage::Empty => None,
            Stage::StructureStart | Stage::StructureReference => Some(GenerationMode::None),
            Stage::Biomes | Stage::Noise => Some(GenerationMode::BiomeOnlySimulateHeight),
            Stage::Surface | Stage::Carvers => Some(GenerationMode::Surface),
            Stage::Features => Some(GenerationMode::Features),
        }
    }

    /// Cheapest stage that satisfies this mode.
    pub fn target_stage(self) -> Stage {
        match self {
            GenerationMode::None => Stage::StructureReference,
            GenerationMode::BiomeOnlySimulateHeight => Stage::Biomes,
            GenerationMode::Surface => Stage::Surface,
            GenerationMode::Features => Stage::Features,
        }
    }
}
