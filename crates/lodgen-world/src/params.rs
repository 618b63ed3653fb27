use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use serde::Deserialize;

use crate::generator::{StageContext, StagedGenerator};
use crate::region::RegionView;
use crate::stage::Stage;
use crate::structure::StructureSettings;
use crate::tile::{BiomeId, SurfaceBlock};

/// Identity of the world a generation activity targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorldId(pub u64);

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "world#{}", self.0)
    }
}

/// What the feature stage does when decoration of a tile fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFailurePolicy {
    /// Log, flag the tile incomplete, keep the marker.
    #[default]
    Skip,
    /// Re-run decoration up to this many extra times before skipping.
    Retry(u32),
}

impl FeatureFailurePolicy {
    /// Total decoration attempts per tile.
    pub fn attempts(self) -> u32 {
        match self {
            FeatureFailurePolicy::Skip => 1,
            FeatureFailurePolicy::Retry(n) => n.saturating_add(1),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BiomeDef {
    pub name: String,
    pub temperature: f32,
    pub downfall: f32,
    pub top: SurfaceBlock,
    pub under: SurfaceBlock,
}

#[derive(Clone, Debug)]
pub struct BiomeRegistry {
    defs: Vec<BiomeDef>,
    by_name: HashMap<String, BiomeId>,
}

impl BiomeRegistry {
    pub fn new(defs: Vec<BiomeDef>) -> Self {
        let by_name = defs
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.clone(), i as BiomeId))
            .collect();
        Self { defs, by_name }
    }

    pub fn with_defaults() -> Self {
        let def = |name: &str, temperature: f32, downfall: f32, top, under| BiomeDef {
            name: name.to_string(),
            temperature,
            downfall,
            top,
            under,
        };
        Self::new(vec![
            def("plains", 0.8, 0.4, SurfaceBlock::Grass, SurfaceBlock::Dirt),
            def("desert", 2.0, 0.0, SurfaceBlock::Sand, SurfaceBlock::Sand),
            def("forest", 0.7, 0.8, SurfaceBlock::Grass, SurfaceBlock::Dirt),
            def("snowy_plains", 0.0, 0.5, SurfaceBlock::Snow, SurfaceBlock::Dirt),
            def("stony_peaks", 1.0, 0.3, SurfaceBlock::Stone, SurfaceBlock::Stone),
            def("beach", 0.8, 0.4, SurfaceBlock::Sand, SurfaceBlock::Sand),
            def("ocean", 0.5, 0.5, SurfaceBlock::Gravel, SurfaceBlock::Gravel),
        ])
    }

    pub fn get(&self, id: BiomeId) -> Option<&BiomeDef> {
        self.defs.get(id as usize)
    }

    pub fn id_of(&self, name: &str) -> Option<BiomeId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Biome whose climate is nearest to `(temperature, downfall)`.
    pub fn closest(&self, temperature: f32, downfall: f32) -> Option<BiomeId> {
        self.defs
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let dt = d.temperature - temperature;
                let dd = d.downfall - downfall;
                (i, dt * dt + dd * dd)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i as BiomeId)
    }
}

impl Default for BiomeRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Read-only per-world generation inputs, shared by every request and
/// worker context for that world.
pub struct SharedParameters {
    world: WorldId,
    seed: u64,
    biomes: BiomeRegistry,
    generator: Arc<dyn StagedGenerator>,
    generate_structures: bool,
    structures: StructureSettings,
    feature_policy: FeatureFailurePolicy,
}

impl SharedParameters {
    pub fn new(world: WorldId, seed: u64, generator: Arc<dyn StagedGenerator>) -> Self {
        if !generator.kind().is_known() {
            log::warn!(
                "unknown generator '{}' for {}; distant generation may fail",
                generator.name(),
                world
            );
        }
        Self {
            world,
            seed,
            biomes: BiomeRegistry::with_defaults(),
            generator,
            generate_structures: true,
            structures: StructureSettings::default(),
            feature_policy: FeatureFailurePolicy::default(),
        }
    }

    pub fn with_biomes(mut self, biomes: BiomeRegistry) -> Self {
        self.biomes = biomes;
        self
    }

    pub fn with_generate_structures(mut self, enable: bool) -> Self {
        self.generate_structures = enable;
        self
    }

    pub fn with_structure_settings(mut self, settings: StructureSettings) -> Self {
        self.structures = settings;
        self
    }

    pub fn with_feature_policy(mut self, policy: FeatureFailurePolicy) -> Self {
        self.feature_policy = policy;
        self
    }

    #[inline]
    pub fn world_id(&self) -> WorldId {
        self.world
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[inline]
    pub fn biomes(&self) -> &BiomeRegistry {
        &self.biomes
    }

    #[inline]
    pub fn generator(&self) -> &dyn StagedGenerator {
        self.generator.as_ref()
    }

    #[inline]
    pub fn generate_structures(&self) -> bool {
        self.generate_structures
    }

    #[inline]
    pub fn structure_settings(&self) -> &StructureSettings {
        &self.structures
    }

    #[inline]
    pub fn feature_policy(&self) -> FeatureFailurePolicy {
        self.feature_policy
    }

    pub fn stage_context<'a>(&'a self, stage: Stage, region: RegionView<'a>) -> StageContext<'a> {
        StageContext {
            stage,
            seed: self.seed,
            biomes: &self.biomes,
            region,
        }
    }
}

impl fmt::Debug for SharedParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedParameters")
            .field("world", &self.world)
            .field("seed", &self.seed)
            .field("generator", &self.generator.name())
            .field("generate_structures", &self.generate_structures)
            .field("feature_policy", &self.feature_policy)
            .finish()
    }
}
