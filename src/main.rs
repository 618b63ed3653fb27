//! `lodgen`: requests staged terrain for a square area of tiles, polls the
//! scheduler until everything is reclaimed and prints what came back.
#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use log::info;
use lodgen_runtime::{ChannelSink, Delivery, ReclaimReport, Scheduler};
use lodgen_world::config::{GenConfig, load_config_from_path};
use lodgen_world::{GenerationMode, NoiseGenerator, SharedParameters, Stage, WorldId};

#[derive(Parser, Debug)]
#[command(name = "lodgen", about = "Out-of-band staged terrain generation for distant LODs")]
struct Args {
    /// TOML config; defaults apply for anything missing.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides `[world].seed`.
    #[arg(long)]
    seed: Option<u64>,
    /// Tile radius of each request.
    #[arg(long, default_value_t = 1)]
    radius: u32,
    /// Stage to generate up to.
    #[arg(long, default_value = "features")]
    target: Stage,
    /// Half-extent, in tiles, of the square of points to request.
    #[arg(long, default_value_t = 8)]
    area: i32,
    #[arg(long, default_value_t = 20)]
    poll_ms: u64,
}

#[derive(Default)]
struct Summary {
    deliveries: usize,
    tiles: usize,
    incomplete: usize,
    height_sum: i64,
    height_samples: usize,
    features: usize,
    by_mode: [usize; 4],
}

impl Summary {
    fn add(&mut self, delivery: &Delivery) {
        self.deliveries += 1;
        self.by_mode[mode_slot(delivery.mode)] += 1;
        for tile in delivery.grid.iter() {
            self.tiles += 1;
            if tile.incomplete {
                self.incomplete += 1;
            }
            let heights = if tile.heightmap.is_empty() {
                &tile.heights
            } else {
                &tile.heightmap
            };
            self.height_sum += heights.iter().map(|h| *h as i64).sum::<i64>();
            self.height_samples += heights.len();
            self.features += tile.features.len();
        }
    }

    fn average_height(&self) -> Option<f64> {
        (self.height_samples > 0).then(|| self.height_sum as f64 / self.height_samples as f64)
    }
}

fn mode_slot(mode: GenerationMode) -> usize {
    match mode {
        GenerationMode::None => 0,
        GenerationMode::BiomeOnlySimulateHeight => 1,
        GenerationMode::Surface => 2,
        GenerationMode::Features => 3,
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config_from_path(path)?,
        None => GenConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.world.seed = seed;
    }

    let seed = config.world.seed;
    let generator = Arc::new(NoiseGenerator::with_config(seed, config.noise.clone()));
    let params = Arc::new(
        SharedParameters::new(WorldId(seed), seed, generator)
            .with_generate_structures(config.world.generate_structures)
            .with_feature_policy(config.features.failure_policy),
    );
    let (sink, deliveries) = ChannelSink::new();
    let mut scheduler = Scheduler::new(params, &config, Arc::new(sink));

    let step = (2 * args.radius + 1) as usize;
    let mut pending: VecDeque<(i32, i32)> = (-args.area..=args.area)
        .step_by(step)
        .flat_map(|z| {
            (-args.area..=args.area)
                .step_by(step)
                .map(move |x| (x, z))
        })
        .collect();
    info!(
        "requesting {} point(s) r={} up to {} (seed {seed})",
        pending.len(),
        args.radius,
        args.target
    );

    let started = Instant::now();
    let poll = Duration::from_millis(args.poll_ms);
    let mut reclaimed = ReclaimReport::default();
    let mut summary = Summary::default();
    let mut rejections = 0usize;
    while !pending.is_empty() || scheduler.in_flight() > 0 {
        let mut retry = VecDeque::new();
        while let Some((x, z)) = pending.pop_front() {
            if !scheduler.try_add_point(x, z, args.radius, args.target)? {
                rejections += 1;
                retry.push_back((x, z));
            }
        }
        pending = retry;

        let report = scheduler.poll();
        reclaimed.completed += report.completed;
        reclaimed.failed += report.failed;
        reclaimed.timed_out += report.timed_out;
        for delivery in deliveries.try_iter() {
            summary.add(&delivery);
        }
        thread::sleep(poll);
    }
    for delivery in deliveries.try_iter() {
        summary.add(&delivery);
    }

    println!(
        "done in {:.2?}: {} completed, {} failed, {} timed out, {} admission rejection(s)",
        started.elapsed(),
        reclaimed.completed,
        reclaimed.failed,
        reclaimed.timed_out,
        rejections
    );
    println!(
        "delivered {} grid(s), {} tile(s), {} incomplete, {} feature(s)",
        summary.deliveries, summary.tiles, summary.incomplete, summary.features
    );
    let [none, biome, surface, features] = summary.by_mode;
    println!("modes: none={none} biome_only={biome} surface={surface} features={features}");
    match summary.average_height() {
        Some(avg) => println!("average height: {avg:.1}"),
        None => println!("average height: n/a"),
    }
    if let Some(report) = scheduler.perf_report() {
        println!("perf: {report}");
    }
    scheduler.shutdown();
    Ok(())
}
