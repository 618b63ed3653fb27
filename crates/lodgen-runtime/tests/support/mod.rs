#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded};
use lodgen_runtime::Scheduler;
use lodgen_world::{
    COLUMNS, GeneratorKind, QUARTS, SharedParameters, Stage, StageContext, StageError,
    StagedGenerator, SurfaceBlock, Tile, WorldId,
};

/// Fills every payload with constants.
#[derive(Default)]
pub struct FlatGenerator;

impl StagedGenerator for FlatGenerator {
    fn name(&self) -> &str {
        "flat"
    }

    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Flat
    }

    fn structure_starts(&self, _cx: &StageContext<'_>, _tile: &mut Tile) -> Result<(), StageError> {
        Ok(())
    }

    fn biomes(&self, _cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        tile.biomes = vec![0; QUARTS];
        Ok(())
    }

    fn noise(&self, _cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        tile.heights = vec![64; COLUMNS];
        Ok(())
    }

    fn surface(&self, _cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        tile.surface = vec![SurfaceBlock::Grass; COLUMNS];
        Ok(())
    }

    fn carvers(&self, _cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        tile.carved = vec![false; COLUMNS];
        Ok(())
    }

    fn features(&self, _cx: &StageContext<'_>, _tile: &mut Tile) -> Result<(), StageError> {
        Ok(())
    }
}

/// Blocks in one stage until the gate's sender is dropped.
pub struct GatedGenerator {
    pub stage: Stage,
    gate: Receiver<()>,
}

impl GatedGenerator {
    pub fn new(stage: Stage) -> (Self, Sender<()>) {
        let (tx, rx) = bounded(0);
        (Self { stage, gate: rx }, tx)
    }

    fn wait(&self, cx: &StageContext<'_>) {
        if cx.stage == self.stage {
            let _ = self.gate.recv();
        }
    }
}

impl StagedGenerator for GatedGenerator {
    fn name(&self) -> &str {
        "gated"
    }

    fn structure_starts(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        self.wait(cx);
        FlatGenerator.structure_starts(cx, tile)
    }

    fn biomes(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        self.wait(cx);
        FlatGenerator.biomes(cx, tile)
    }

    fn noise(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        self.wait(cx);
        FlatGenerator.noise(cx, tile)
    }

    fn surface(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        self.wait(cx);
        FlatGenerator.surface(cx, tile)
    }

    fn carvers(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        self.wait(cx);
        FlatGenerator.carvers(cx, tile)
    }

    fn features(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        self.wait(cx);
        FlatGenerator.features(cx, tile)
    }
}

/// Counts calls per tile and fails `fail_stage` every time.
pub struct FailingGenerator {
    pub fail_stage: Stage,
    pub calls: AtomicUsize,
}

impl FailingGenerator {
    pub fn new(fail_stage: Stage) -> Self {
        Self {
            fail_stage,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn step(
        &self,
        cx: &StageContext<'_>,
        tile: &mut Tile,
        ok: impl FnOnce(&mut Tile) -> Result<(), StageError>,
    ) -> Result<(), StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if cx.stage == self.fail_stage {
            Err(cx.fail(tile, "induced failure"))
        } else {
            ok(tile)
        }
    }
}

impl StagedGenerator for FailingGenerator {
    fn name(&self) -> &str {
        "failing"
    }

    fn structure_starts(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        self.step(cx, tile, |t| FlatGenerator.structure_starts(cx, t))
    }

    fn biomes(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        self.step(cx, tile, |t| FlatGenerator.biomes(cx, t))
    }

    fn noise(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        self.step(cx, tile, |t| FlatGenerator.noise(cx, t))
    }

    fn surface(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        self.step(cx, tile, |t| FlatGenerator.surface(cx, t))
    }

    fn carvers(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        self.step(cx, tile, |t| FlatGenerator.carvers(cx, t))
    }

    fn features(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        self.step(cx, tile, |t| FlatGenerator.features(cx, t))
    }
}

/// Panics in biomes.
pub struct PanickingGenerator;

impl StagedGenerator for PanickingGenerator {
    fn name(&self) -> &str {
        "panicking"
    }

    fn structure_starts(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        FlatGenerator.structure_starts(cx, tile)
    }

    fn biomes(&self, _cx: &StageContext<'_>, _tile: &mut Tile) -> Result<(), StageError> {
        panic!("biome table exploded")
    }

    fn noise(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        FlatGenerator.noise(cx, tile)
    }

    fn surface(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        FlatGenerator.surface(cx, tile)
    }

    fn carvers(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        FlatGenerator.carvers(cx, tile)
    }

    fn features(&self, cx: &StageContext<'_>, tile: &mut Tile) -> Result<(), StageError> {
        FlatGenerator.features(cx, tile)
    }
}

pub fn params(generator: Arc<dyn StagedGenerator>) -> Arc<SharedParameters> {
    Arc::new(SharedParameters::new(WorldId(1), 42, generator))
}

/// Polls until nothing is in flight or `deadline` passes.
pub fn drain(scheduler: &mut Scheduler, deadline: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        scheduler.poll();
        if scheduler.in_flight() == 0 {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}
