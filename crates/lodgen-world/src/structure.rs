use std::collections::VecDeque;

use hashbrown::HashMap;
use lodgen_grid::TileCoord;

use crate::params::{SharedParameters, WorldId};
use crate::tile::StructureStart;

#[derive(Clone, Debug)]
pub struct StructureSettings {
    /// Tiles scanned on each axis when cross-referencing starts.
    pub reference_radius: i32,
    /// Tiles whose starts a worker remembers between requests.
    pub cache_capacity: usize,
}

impl Default for StructureSettings {
    fn default() -> Self {
        Self {
            reference_radius: 8,
            cache_capacity: 4096,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StructureIndexStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

/// Structure starts seen by one worker for one world, keyed by origin tile.
///
/// Lets cross-referencing see starts from tiles outside the current region
/// that an earlier request on the same worker produced. Oldest entries are
/// evicted first once `cache_capacity` is reached.
pub struct StructureIndex {
    world: WorldId,
    reference_radius: i32,
    known: HashMap<TileCoord, Vec<StructureStart>>,
    order: VecDeque<TileCoord>,
    capacity: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl StructureIndex {
    pub fn new(params: &SharedParameters) -> Self {
        let settings = params.structure_settings();
        Self {
            world: params.world_id(),
            reference_radius: settings.reference_radius,
            known: HashMap::with_capacity(settings.cache_capacity),
            order: VecDeque::with_capacity(settings.cache_capacity),
            capacity: settings.cache_capacity.max(1),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    #[inline]
    pub fn world(&self) -> WorldId {
        self.world
    }

    #[inline]
    pub fn reference_radius(&self) -> i32 {
        self.reference_radius
    }

    /// Records the starts generated for `pos`; an empty slice is remembered too.
    pub fn on_structure_load(&mut self, pos: TileCoord, starts: &[StructureStart]) {
        if self.known.insert(pos, starts.to_vec()).is_none() {
            self.order.push_back(pos);
        }
        while self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                if self.known.remove(&old).is_some() {
                    self.evictions += 1;
                }
            }
        }
    }

    pub fn starts_at(&mut self, pos: TileCoord) -> Option<&[StructureStart]> {
        match self.known.get(&pos) {
            Some(starts) => {
                self.hits += 1;
                Some(starts.as_slice())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    pub fn stats(&self) -> StructureIndexStats {
        StructureIndexStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            entries: self.known.len(),
        }
    }
}
