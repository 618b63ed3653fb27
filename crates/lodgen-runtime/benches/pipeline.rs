use std::sync::Arc;
use std::time::Duration;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use lodgen_runtime::{CancelToken, Pipeline, ThreadContext, Watchdog};
use lodgen_world::config::PipelineConfig;
use lodgen_world::{NoiseGenerator, SharedParameters, Stage, TileCoord, WorldId};

fn bench_generate_direct(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_direct");
    let params = Arc::new(SharedParameters::new(
        WorldId(1),
        0xC0FFEE,
        Arc::new(NoiseGenerator::new(0xC0FFEE)),
    ));
    let pipeline = Pipeline::new(params.clone(), PipelineConfig::default());
    let mut ctx = ThreadContext::new(&params, 50);
    let cancel = CancelToken::new();
    let watchdog = Watchdog::new();

    for (name, radius, target) in [
        ("r0_biomes", 0, Stage::Biomes),
        ("r2_surface", 2, Stage::Surface),
        ("r4_features", 4, Stage::Features),
    ] {
        let mut x = 0;
        group.bench_function(name, |b| {
            b.iter(|| {
                x += 2 * radius as i32 + 1;
                let grid = pipeline
                    .generate_direct(
                        &mut ctx,
                        TileCoord::new(x, 0),
                        radius,
                        target,
                        &cancel,
                        &watchdog,
                    )
                    .unwrap();
                black_box(grid);
            })
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(5));
    targets = bench_generate_direct
}
criterion_main!(benches);
