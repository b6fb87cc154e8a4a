//! Walks an observer across the world and logs streaming statistics.
//!
//! Usage: cargo run --release --bin walk_world -- [OPTIONS]
//!
//! Options:
//!   --config <PATH>    World config JSON (defaults for anything missing)
//!   --seed <SEED>      Noise seed (default: 12345)
//!   --radius <N>       Render distance in chunks (default: 4)
//!   --density <D>      Vegetation density multiplier (default: 1.0)
//!   --steps <N>        Number of ticks to simulate (default: 200)
//!   --deferred         Build chunks on the background queue

use std::process::ExitCode;
use std::time::{Duration, Instant};

use glam::Vec3;

use terrastream::core::logging;
use terrastream::generation::WorldConfig;
use terrastream::streaming::{ChunkStore, TrackingSink, CHUNK_SIZE};

/// World units the observer moves per tick
const STEP: f32 = 7.5;

fn main() -> ExitCode {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let mut config = match parse_str_arg(&args, "--config") {
        Some(path) => match WorldConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to load config {}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => WorldConfig::default(),
    };
    if let Some(seed) = parse_u64_arg(&args, "--seed") {
        config.seed = seed;
    }
    if let Some(radius) = parse_i32_arg(&args, "--radius") {
        config.streaming.render_distance = radius;
    }
    if let Some(density) = parse_f32_arg(&args, "--density") {
        config.streaming.vegetation_density = density;
    }
    let steps = parse_usize_arg(&args, "--steps").unwrap_or(200);
    let deferred = args.iter().any(|a| a == "--deferred");

    log::info!(
        "Walking {} steps: seed {}, radius {}, density {}, {}",
        steps,
        config.seed,
        config.streaming.render_distance,
        config.streaming.vegetation_density,
        if deferred { "background builds" } else { "synchronous builds" }
    );

    let mut store = ChunkStore::from_config(&config);
    if deferred {
        store = match store.with_build_queue(config.max_build_jobs) {
            Ok(store) => store,
            Err(e) => {
                log::error!("Failed to start build queue: {}", e);
                return ExitCode::FAILURE;
            }
        };
    }

    let mut sink = TrackingSink::new();
    let start = Instant::now();
    let mut created = 0;
    let mut destroyed = 0;
    let mut failed = 0;

    for step in 0..steps {
        let observer = observer_at(step);
        let report = if deferred {
            match store.reconcile_deferred(observer, config.streaming, &mut sink) {
                Ok(report) => report,
                Err(e) => {
                    log::error!("Streaming stopped at step {}: {}", step, e);
                    return ExitCode::FAILURE;
                }
            }
        } else {
            store.reconcile(observer, config.streaming, &mut sink)
        };
        created += report.created.len();
        destroyed += report.destroyed.len();
        failed += report.failed.len();

        if step % 25 == 0 {
            let stats = store.stats();
            log::info!(
                "step {:>4} at ({:>7.1}, {:>7.1}): {} loaded, {} with vegetation, {} pending",
                step,
                observer.x,
                observer.z,
                stats.loaded,
                stats.with_vegetation,
                stats.pending
            );
        }

        if deferred {
            store.wait_for_builds(Duration::from_millis(5));
        }
    }

    let elapsed = start.elapsed();
    let instances: usize = store
        .chunks()
        .filter_map(|c| c.vegetation.as_ref())
        .map(|v| v.instance_count())
        .sum();
    let (lowest, highest) = store
        .chunks()
        .map(|c| c.terrain.height_range())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), (l, h)| (lo.min(l), hi.max(h)));
    if lowest <= highest {
        log::info!("Loaded terrain spans elevation {:.1} to {:.1}", lowest, highest);
    }
    log::info!(
        "Done in {:.2}s: {} created, {} destroyed, {} failed, {} loaded, {} vegetation instances",
        elapsed.as_secs_f64(),
        created,
        destroyed,
        failed,
        store.len(),
        instances
    );

    store.clear(&mut sink);
    if sink.live_count() != 0 || sink.unbalanced() != 0 {
        log::error!(
            "Scene objects leaked: {} live, {} unbalanced releases",
            sink.live_count(),
            sink.unbalanced()
        );
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Slow spiral outward from the origin so every direction gets streamed.
fn observer_at(step: usize) -> Vec3 {
    let t = step as f32 * STEP;
    let angle = t / (CHUNK_SIZE * 4.0);
    let radius = t * 0.5;
    Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius)
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_i32_arg(args: &[String], flag: &str) -> Option<i32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u64_arg(args: &[String], flag: &str) -> Option<u64> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
