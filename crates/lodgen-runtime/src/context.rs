use std::sync::Arc;

use log::debug;
use lodgen_world::{SharedParameters, StructureIndex, WorldId};

use crate::perf::{DEFAULT_PERF_WINDOW, PerfCalculator};

/// Heavy per-worker state for one world.
///
/// Lives in a slot owned by the worker loop and is handed to every request
/// that worker runs. Rebuilt whenever a request targets a different world.
pub struct ThreadContext {
    world: WorldId,
    pub structures: StructureIndex,
    pub perf: PerfCalculator,
    rebuilds: u64,
}

impl ThreadContext {
    pub fn new(params: &SharedParameters, perf_window: usize) -> Self {
        Self {
            world: params.world_id(),
            structures: StructureIndex::new(params),
            perf: PerfCalculator::new(perf_window),
            rebuilds: 0,
        }
    }

    pub fn get_or_create<'a>(
        slot: &'a mut Option<ThreadContext>,
        params: &Arc<SharedParameters>,
    ) -> &'a mut ThreadContext {
        Self::get_or_create_with(slot, params, DEFAULT_PERF_WINDOW)
    }

    /// Reuses the slot's context when it belongs to `params`' world,
    /// otherwise replaces it. Perf history survives a rebuild.
    pub fn get_or_create_with<'a>(
        slot: &'a mut Option<ThreadContext>,
        params: &Arc<SharedParameters>,
        perf_window: usize,
    ) -> &'a mut ThreadContext {
        let world = params.world_id();
        let stale = slot.as_ref().is_none_or(|ctx| ctx.world != world);
        if stale {
            let mut fresh = Self::new(params, perf_window);
            if let Some(old) = slot.take() {
                debug!(
                    target: "lodgen::pool",
                    "rebuilding thread context {} -> {}", old.world, world
                );
                fresh.perf = old.perf;
                fresh.rebuilds = old.rebuilds + 1;
            }
            return slot.insert(fresh);
        }
        slot.get_or_insert_with(|| Self::new(params, perf_window))
    }

    #[inline]
    pub fn world(&self) -> WorldId {
        self.world
    }

    /// Times this worker's context was replaced for a new world.
    #[inline]
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodgen_world::{NoiseGenerator, StructureStart, TileCoord};

    fn params(world: u64) -> Arc<SharedParameters> {
        Arc::new(SharedParameters::new(
            WorldId(world),
            world,
            Arc::new(NoiseGenerator::new(world)),
        ))
    }

    #[test]
    fn same_world_reuses_cache() {
        let p = params(1);
        let mut slot = None;
        ThreadContext::get_or_create(&mut slot, &p)
            .structures
            .on_structure_load(TileCoord::new(3, 3), &[] as &[StructureStart]);
        let ctx = ThreadContext::get_or_create(&mut slot, &p);
        assert_eq!(ctx.structures.len(), 1);
        assert_eq!(ctx.rebuilds(), 0);
    }

    #[test]
    fn other_world_rebuilds() {
        let mut slot = None;
        ThreadContext::get_or_create(&mut slot, &params(1))
            .structures
            .on_structure_load(TileCoord::new(0, 0), &[]);
        let ctx = ThreadContext::get_or_create(&mut slot, &params(2));
        assert_eq!(ctx.world(), WorldId(2));
        assert!(ctx.structures.is_empty());
        assert_eq!(ctx.rebuilds(), 1);
    }
}
