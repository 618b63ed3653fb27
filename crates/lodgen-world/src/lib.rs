//! World-side types for staged LOD generation: stages, tiles, regions,
//! the generator capability and per-world parameters.
#![forbid(unsafe_code)]

pub mod config;
mod generator;
mod noise_gen;
mod params;
mod region;
mod stage;
mod structure;
mod tile;

pub use generator::{GeneratorKind, StageContext, StageError, StagedGenerator};
pub use noise_gen::NoiseGenerator;
pub use params::{BiomeDef, BiomeRegistry, FeatureFailurePolicy, SharedParameters, WorldId};
pub use region::{Region, RegionView};
pub use stage::{GenerationMode, ParseStageError, Stage};
pub use structure::{StructureIndex, StructureIndexStats, StructureSettings};
pub use tile::{
    BiomeId, BlockBox, COLUMNS, FeaturePlacement, QUARTS, StructureRef, StructureStart,
    SurfaceBlock, Tile,
};

pub use lodgen_grid::{TILE_SIZE, TileCoord, TileGrid};
