use criterion::{criterion_group, criterion_main, Criterion, black_box};

use terrastream::generation::{StreamingParams, WorldConfig, WorldGenerator};
use terrastream::streaming::{ChunkKey, ChunkStore, NullSink, CHUNK_SIZE};

use glam::Vec3;

fn bench_elevation(c: &mut Criterion) {
    let generator = WorldGenerator::new(&WorldConfig::default());
    let height = generator.height_field();

    c.bench_function("elevation_sample", |b| {
        let mut i = 0u32;
        b.iter(|| {
            i = i.wrapping_add(1);
            let x = (i % 1000) as f64 * 0.37;
            let z = (i / 1000) as f64 * 0.53;
            height.elevation(black_box(x), black_box(z))
        });
    });
}

fn bench_mesh_build(c: &mut Criterion) {
    let generator = WorldGenerator::new(&WorldConfig::default());

    c.bench_function("terrain_mesh_build", |b| {
        b.iter(|| generator.generate_terrain(black_box(ChunkKey::new(3, -2))));
    });
}

fn bench_scatter(c: &mut Criterion) {
    let generator = WorldGenerator::new(&WorldConfig::default());

    c.bench_function("vegetation_scatter_density_1", |b| {
        b.iter(|| generator.generate_vegetation(black_box(ChunkKey::new(3, -2)), 1.0));
    });
}

fn bench_initial_load(c: &mut Criterion) {
    let config = WorldConfig::default();
    let params = StreamingParams::new(2, 1.0);

    c.bench_function("reconcile_initial_radius_2", |b| {
        b.iter(|| {
            let mut store = ChunkStore::from_config(&config);
            store.reconcile(black_box(Vec3::ZERO), params, &mut NullSink)
        });
    });
}

fn bench_walk_one_chunk(c: &mut Criterion) {
    let config = WorldConfig::default();
    let params = StreamingParams::new(2, 1.0);
    let mut store = ChunkStore::from_config(&config);
    store.reconcile(Vec3::ZERO, params, &mut NullSink);

    // Each iteration crosses one chunk boundary: 5 chunks in, 5 out.
    c.bench_function("reconcile_walk_one_chunk", |b| {
        let mut cx = 0;
        b.iter(|| {
            cx += 1;
            let observer = Vec3::new(cx as f32 * CHUNK_SIZE + 1.0, 0.0, 0.0);
            store.reconcile(black_box(observer), params, &mut NullSink)
        });
    });
}

criterion_group!(
    benches,
    bench_elevation,
    bench_mesh_build,
    bench_scatter,
    bench_initial_load,
    bench_walk_one_chunk,
);
criterion_main!(benches);
