//! Chunk store: owns every loaded chunk and reconciles the loaded set
//! against the chunks required around the observer.
//!
//! After a synchronous [`ChunkStore::reconcile`] the loaded keys equal the
//! required keys, minus any key whose generation failed. Failed keys are
//! retried on the next call. Terrain is built once per key and never
//! rebuilt while the key stays loaded; only vegetation is regenerated.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec3;
use rayon::prelude::*;

use super::build_queue::{BuildKind, BuildOutput, BuildRequest, BuildResult, ChunkBuildQueue};
use super::chunk::{Chunk, ChunkKey};
use super::sink::{SceneObject, SceneSink};
use crate::core::{Error, Result};
use crate::generation::{GeneratedChunk, StreamingParams, WorldConfig, WorldGenerator};
use crate::vegetation::scatter::VegetationBatchSet;

/// Keys within `radius` (Chebyshev) of the chunk containing `observer`,
/// nearest first.
pub fn required_keys(observer: Vec3, radius: u32) -> Vec<ChunkKey> {
    let center = ChunkKey::from_world_pos(observer);
    let r = radius.min(i32::MAX as u32 / 2) as i32;
    let mut keys: Vec<ChunkKey> = (-r..=r)
        .flat_map(|dx| (-r..=r).map(move |dz| center.offset(dx, dz)))
        .collect();
    keys.sort_by_key(|k| {
        let dx = (k.cx - center.cx) as i64;
        let dz = (k.cz - center.cz) as i64;
        (k.chebyshev_distance(center), dx * dx + dz * dz, *k)
    });
    keys
}

/// Failed builds are retried on the next reconcile unless the error says otherwise.
fn log_failure(key: ChunkKey, what: &str, err: &Error) {
    if err.is_retryable() {
        log::warn!("{} build for chunk {} failed, retrying next reconcile: {}", what, key, err);
    } else {
        log::error!("{} build for chunk {} failed: {}", what, key, err);
    }
}

/// What one reconcile call changed
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub created: Vec<ChunkKey>,
    pub destroyed: Vec<ChunkKey>,
    /// Loaded chunks that received fresh vegetation
    pub revegetated: Vec<ChunkKey>,
    pub failed: Vec<(ChunkKey, Error)>,
    /// Builds newly handed to the background queue
    pub queued: usize,
    /// Background results dropped as stale or duplicate
    pub discarded: usize,
}

impl ReconcileReport {
    /// No chunk was created, destroyed or revegetated
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.destroyed.is_empty() && self.revegetated.is_empty()
    }
}

/// Snapshot taken at the end of each reconcile
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamingStats {
    pub loaded: usize,
    pub with_vegetation: usize,
    pub created: usize,
    pub destroyed: usize,
    pub revegetated: usize,
    pub failed: usize,
    /// Builds in flight on the background queue
    pub pending: usize,
}

pub struct ChunkStore {
    generator: Arc<WorldGenerator>,
    loaded: HashMap<ChunkKey, Chunk>,
    params: StreamingParams,
    /// Bumped on every vegetation invalidation
    vegetation_epoch: u64,
    stats: StreamingStats,
    queue: Option<ChunkBuildQueue>,
    /// Background results collected while waiting, applied on the next reconcile
    ready: Vec<BuildResult>,
}

impl ChunkStore {
    pub fn new(generator: Arc<WorldGenerator>, params: StreamingParams) -> Self {
        Self {
            generator,
            loaded: HashMap::new(),
            params: params.sanitized(),
            vegetation_epoch: 0,
            stats: StreamingStats::default(),
            queue: None,
            ready: Vec::new(),
        }
    }

    pub fn from_config(config: &WorldConfig) -> Self {
        Self::new(Arc::new(WorldGenerator::new(config)), config.streaming)
    }

    /// Attach a background build queue, enabling [`Self::reconcile_deferred`].
    pub fn with_build_queue(mut self, max_jobs: usize) -> Result<Self> {
        self.queue = Some(ChunkBuildQueue::new(Arc::clone(&self.generator), max_jobs)?);
        Ok(self)
    }

    pub fn generator(&self) -> &Arc<WorldGenerator> {
        &self.generator
    }

    /// Swap the generator used for future builds, e.g. after the template
    /// registry was completed. Loaded chunks are kept.
    ///
    /// A running build queue keeps building with the old generator until it
    /// is replaced through [`Self::with_build_queue`].
    pub fn set_generator(&mut self, generator: Arc<WorldGenerator>) {
        self.generator = generator;
    }

    pub fn params(&self) -> StreamingParams {
        self.params
    }

    pub fn stats(&self) -> StreamingStats {
        self.stats
    }

    pub fn vegetation_epoch(&self) -> u64 {
        self.vegetation_epoch
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    pub fn contains(&self, key: ChunkKey) -> bool {
        self.loaded.contains_key(&key)
    }

    pub fn get(&self, key: ChunkKey) -> Option<&Chunk> {
        self.loaded.get(&key)
    }

    pub fn loaded_keys(&self) -> HashSet<ChunkKey> {
        self.loaded.keys().copied().collect()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.loaded.values()
    }

    /// Builds in flight on the background queue
    pub fn pending_builds(&self) -> usize {
        self.queue.as_ref().map_or(0, ChunkBuildQueue::pending_count)
    }

    /// Bring the loaded set to exactly the keys required around `observer`,
    /// generating missing chunks in parallel before returning.
    pub fn reconcile(
        &mut self,
        observer: Vec3,
        params: StreamingParams,
        sink: &mut dyn SceneSink,
    ) -> ReconcileReport {
        let start = Instant::now();
        let params = self.apply_params(params, sink);
        let required = required_keys(observer, params.radius());
        let required_set: HashSet<ChunkKey> = required.iter().copied().collect();
        let density = params.vegetation_density;

        let missing: Vec<ChunkKey> = required
            .iter()
            .copied()
            .filter(|k| !self.loaded.contains_key(k))
            .collect();
        let bare: Vec<ChunkKey> = required
            .iter()
            .copied()
            .filter(|k| self.loaded.get(k).is_some_and(|c| !c.has_vegetation()))
            .collect();

        let generator = &self.generator;
        let built = generator.generate_chunks(&missing, density);
        let regrown: Vec<(ChunkKey, Result<VegetationBatchSet>)> = bare
            .par_iter()
            .map(|&key| (key, generator.generate_vegetation(key, density)))
            .collect();

        let mut report = ReconcileReport::default();
        self.release_outside(&required_set, sink, &mut report);

        for (key, result) in built {
            match result {
                Ok(chunk) => {
                    self.insert_generated(chunk, true, sink);
                    report.created.push(key);
                }
                Err(e) => {
                    log_failure(key, "chunk", &e);
                    report.failed.push((key, e));
                }
            }
        }

        for (key, result) in regrown {
            match result {
                Ok(vegetation) => {
                    self.attach_vegetation(key, vegetation, sink);
                    report.revegetated.push(key);
                }
                Err(e) => {
                    log_failure(key, "vegetation", &e);
                    report.failed.push((key, e));
                }
            }
        }

        self.finish(&report, start);
        report
    }

    /// Apply finished background builds, release chunks out of range, then
    /// queue builds for whatever is still missing.
    ///
    /// Loaded keys converge to the required keys once the queue drains.
    /// Fails only if no build queue is attached or its worker stopped.
    pub fn reconcile_deferred(
        &mut self,
        observer: Vec3,
        params: StreamingParams,
        sink: &mut dyn SceneSink,
    ) -> Result<ReconcileReport> {
        let start = Instant::now();
        let Some(queue) = self.queue.as_mut() else {
            return Err(Error::Streaming("no build queue attached".into()));
        };
        let mut results = std::mem::take(&mut self.ready);
        results.extend(queue.poll_results());

        let params = self.apply_params(params, sink);
        let required = required_keys(observer, params.radius());
        let required_set: HashSet<ChunkKey> = required.iter().copied().collect();
        let center = ChunkKey::from_world_pos(observer);

        let mut report = ReconcileReport::default();
        for result in results {
            self.apply_result(result, &required_set, &mut report, sink);
        }

        self.release_outside(&required_set, sink, &mut report);

        let epoch = self.vegetation_epoch;
        let density = params.vegetation_density;
        let Some(queue) = self.queue.as_mut() else {
            return Err(Error::Streaming("no build queue attached".into()));
        };
        for key in required {
            let kind = match self.loaded.get(&key) {
                None => BuildKind::Chunk,
                Some(chunk) if !chunk.has_vegetation() => BuildKind::Vegetation,
                Some(_) => continue,
            };
            let request = BuildRequest {
                key,
                kind,
                density,
                epoch,
                priority: key.chebyshev_distance(center),
            };
            if queue.request(request)? {
                report.queued += 1;
            }
        }

        self.finish(&report, start);
        Ok(report)
    }

    /// Block until a background build completes or `timeout` elapses.
    /// Results are applied by the next [`Self::reconcile_deferred`].
    ///
    /// Returns the number of results collected.
    pub fn wait_for_builds(&mut self, timeout: Duration) -> usize {
        let Some(queue) = self.queue.as_mut() else {
            return 0;
        };
        let results = queue.wait_for_results(timeout);
        let count = results.len();
        self.ready.extend(results);
        count
    }

    /// Release the vegetation of every loaded chunk. Terrain and ground caps
    /// stay. The next reconcile rebuilds vegetation for every required key.
    ///
    /// Returns how many chunks lost their vegetation.
    pub fn invalidate_vegetation(&mut self, sink: &mut dyn SceneSink) -> usize {
        self.vegetation_epoch += 1;
        let mut released = 0;
        for chunk in self.loaded.values_mut() {
            if let Some(vegetation) = chunk.vegetation.take() {
                sink.detach(chunk.key, SceneObject::Vegetation(vegetation));
                released += 1;
            }
        }
        log::debug!(
            "invalidated vegetation for {} chunks (epoch {})",
            released,
            self.vegetation_epoch
        );
        released
    }

    /// Release every loaded chunk.
    pub fn clear(&mut self, sink: &mut dyn SceneSink) {
        let keys: Vec<ChunkKey> = self.loaded.keys().copied().collect();
        for key in &keys {
            self.release(*key, sink);
        }
        self.ready.clear();
        self.stats = StreamingStats {
            destroyed: keys.len(),
            pending: self.pending_builds(),
            ..Default::default()
        };
        log::info!("cleared {} chunks", keys.len());
    }

    /// Sanitize and adopt new params, invalidating vegetation on a density change.
    fn apply_params(&mut self, params: StreamingParams, sink: &mut dyn SceneSink) -> StreamingParams {
        let params = params.sanitized();
        if params.vegetation_density != self.params.vegetation_density {
            log::info!(
                "vegetation density {} -> {}",
                self.params.vegetation_density,
                params.vegetation_density
            );
            self.params = params;
            self.invalidate_vegetation(sink);
        }
        self.params = params;
        params
    }

    fn apply_result(
        &mut self,
        result: BuildResult,
        required: &HashSet<ChunkKey>,
        report: &mut ReconcileReport,
        sink: &mut dyn SceneSink,
    ) {
        let BuildResult { key, kind, epoch, output } = result;
        if !required.contains(&key) {
            log::debug!("discarding {:?} build for out-of-range chunk {}", kind, key);
            report.discarded += 1;
            return;
        }

        let current = epoch == self.vegetation_epoch;
        match output {
            Ok(BuildOutput::Chunk(chunk)) => {
                if self.loaded.contains_key(&key) {
                    report.discarded += 1;
                    return;
                }
                self.insert_generated(chunk, current, sink);
                report.created.push(key);
            }
            Ok(BuildOutput::Vegetation(vegetation)) => {
                let bare = self.loaded.get(&key).is_some_and(|c| !c.has_vegetation());
                if !bare || !current {
                    report.discarded += 1;
                    return;
                }
                self.attach_vegetation(key, vegetation, sink);
                report.revegetated.push(key);
            }
            Err(e) => {
                log_failure(key, if kind == BuildKind::Chunk { "chunk" } else { "vegetation" }, &e);
                report.failed.push((key, e));
            }
        }
    }

    fn insert_generated(&mut self, generated: GeneratedChunk, with_vegetation: bool, sink: &mut dyn SceneSink) {
        let GeneratedChunk { key, terrain, ground_cap, vegetation } = generated;
        let terrain = Arc::new(terrain);
        let ground_cap = Arc::new(ground_cap);
        sink.attach(key, SceneObject::Terrain(Arc::clone(&terrain)));
        sink.attach(key, SceneObject::GroundCap(Arc::clone(&ground_cap)));

        let vegetation = with_vegetation.then(|| {
            let vegetation = Arc::new(vegetation);
            sink.attach(key, SceneObject::Vegetation(Arc::clone(&vegetation)));
            vegetation
        });

        log::debug!("created chunk {}", key);
        self.loaded.insert(key, Chunk { key, terrain, ground_cap, vegetation });
    }

    fn attach_vegetation(&mut self, key: ChunkKey, vegetation: VegetationBatchSet, sink: &mut dyn SceneSink) {
        let Some(chunk) = self.loaded.get_mut(&key) else {
            return;
        };
        let vegetation = Arc::new(vegetation);
        sink.attach(key, SceneObject::Vegetation(Arc::clone(&vegetation)));
        if let Some(old) = chunk.vegetation.replace(vegetation) {
            sink.detach(key, SceneObject::Vegetation(old));
        }
    }

    fn release_outside(
        &mut self,
        required: &HashSet<ChunkKey>,
        sink: &mut dyn SceneSink,
        report: &mut ReconcileReport,
    ) {
        let mut stale: Vec<ChunkKey> = self
            .loaded
            .keys()
            .copied()
            .filter(|k| !required.contains(k))
            .collect();
        stale.sort();
        for key in stale {
            self.release(key, sink);
            report.destroyed.push(key);
        }
    }

    fn release(&mut self, key: ChunkKey, sink: &mut dyn SceneSink) {
        let Some(chunk) = self.loaded.remove(&key) else {
            return;
        };
        if let Some(vegetation) = chunk.vegetation {
            sink.detach(key, SceneObject::Vegetation(vegetation));
        }
        sink.detach(key, SceneObject::GroundCap(chunk.ground_cap));
        sink.detach(key, SceneObject::Terrain(chunk.terrain));
        log::debug!("destroyed chunk {}", key);
    }

    fn finish(&mut self, report: &ReconcileReport, start: Instant) {
        self.stats = StreamingStats {
            loaded: self.loaded.len(),
            with_vegetation: self.loaded.values().filter(|c| c.has_vegetation()).count(),
            created: report.created.len(),
            destroyed: report.destroyed.len(),
            revegetated: report.revegetated.len(),
            failed: report.failed.len(),
            pending: self.pending_builds(),
        };
        if !report.is_noop() || !report.failed.is_empty() {
            log::info!(
                "reconcile: +{} -{} ~{} !{} ({} loaded, {} pending) in {:.1}ms",
                report.created.len(),
                report.destroyed.len(),
                report.revegetated.len(),
                report.failed.len(),
                self.stats.loaded,
                self.stats.pending,
                start.elapsed().as_secs_f64() * 1000.0
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::logging;
    use crate::streaming::chunk::CHUNK_SIZE;
    use crate::streaming::sink::{LiveObjects, NullSink, TrackingSink};
    use crate::vegetation::templates::TemplateRegistry;

    fn store(radius: i32) -> ChunkStore {
        ChunkStore::from_config(&WorldConfig {
            streaming: StreamingParams::new(radius, 1.0),
            ..Default::default()
        })
    }

    fn params(radius: i32) -> StreamingParams {
        StreamingParams::new(radius, 1.0)
    }

    fn keyset(keys: &[ChunkKey]) -> HashSet<ChunkKey> {
        keys.iter().copied().collect()
    }

    fn grid(x0: i32, x1: i32, z0: i32, z1: i32) -> HashSet<ChunkKey> {
        (x0..=x1).flat_map(|x| (z0..=z1).map(move |z| ChunkKey::new(x, z))).collect()
    }

    #[test]
    fn test_required_keys_nearest_first() {
        let keys = required_keys(Vec3::new(10.0, 0.0, 10.0), 2);
        assert_eq!(keys.len(), 25);
        assert_eq!(keys[0], ChunkKey::new(0, 0));
        let center = ChunkKey::new(0, 0);
        for pair in keys.windows(2) {
            assert!(pair[0].chebyshev_distance(center) <= pair[1].chebyshev_distance(center));
        }
        assert_eq!(required_keys(Vec3::ZERO, 0), vec![ChunkKey::new(0, 0)]);
    }

    #[test]
    fn test_required_keys_negative_observer() {
        let keys = keyset(&required_keys(Vec3::new(-1.0, 0.0, -CHUNK_SIZE - 1.0), 1));
        assert_eq!(keys, grid(-2, 0, -3, -1));
    }

    #[test]
    fn test_origin_radius_one_loads_nine() {
        logging::init_for_tests();
        let mut store = store(1);
        let mut sink = TrackingSink::new();
        let report = store.reconcile(Vec3::ZERO, params(1), &mut sink);

        assert_eq!(report.created.len(), 9);
        assert!(report.failed.is_empty());
        assert_eq!(store.loaded_keys(), grid(-1, 1, -1, 1));
        for chunk in store.chunks() {
            assert!(chunk.has_vegetation());
            assert_eq!(chunk.terrain.key, chunk.key);
            assert_eq!(sink.live(chunk.key), LiveObjects { terrain: 1, ground_cap: 1, vegetation: 1 });
        }
        let stats = store.stats();
        assert_eq!((stats.loaded, stats.with_vegetation, stats.created), (9, 9, 9));
    }

    #[test]
    fn test_reconcile_idempotent() {
        let mut store = store(1);
        let mut sink = TrackingSink::new();
        store.reconcile(Vec3::new(20.0, 5.0, 30.0), params(1), &mut sink);
        let attached = sink.attached();

        let report = store.reconcile(Vec3::new(20.0, 5.0, 30.0), params(1), &mut sink);
        assert!(report.is_noop());
        assert_eq!(sink.attached(), attached);
        assert_eq!(sink.detached(), 0);
        assert_eq!(store.stats().created, 0);
    }

    #[test]
    fn test_move_one_chunk_east() {
        let mut store = store(1);
        let mut sink = NullSink;
        store.reconcile(Vec3::ZERO, params(1), &mut sink);
        let before: HashMap<ChunkKey, Chunk> = store.chunks().map(|c| (c.key, c.clone())).collect();

        let report = store.reconcile(Vec3::new(CHUNK_SIZE * 1.5, 0.0, 0.0), params(1), &mut sink);
        assert_eq!(keyset(&report.destroyed), grid(-1, -1, -1, 1));
        assert_eq!(keyset(&report.created), grid(2, 2, -1, 1));
        assert_eq!(store.loaded_keys(), grid(0, 2, -1, 1));

        for key in grid(0, 1, -1, 1) {
            let old = &before[&key];
            let new = store.get(key).unwrap();
            assert!(Arc::ptr_eq(&old.terrain, &new.terrain));
            assert!(Arc::ptr_eq(&old.ground_cap, &new.ground_cap));
            assert!(Arc::ptr_eq(old.vegetation.as_ref().unwrap(), new.vegetation.as_ref().unwrap()));
        }
    }

    #[test]
    fn test_invalidate_then_reconcile() {
        let mut store = store(1);
        let mut sink = TrackingSink::new();
        store.reconcile(Vec3::ZERO, params(1), &mut sink);
        let before: HashMap<ChunkKey, Chunk> = store.chunks().map(|c| (c.key, c.clone())).collect();

        assert_eq!(store.invalidate_vegetation(&mut sink), 9);
        assert!(store.chunks().all(|c| !c.has_vegetation()));
        assert_eq!(store.len(), 9);
        assert_eq!(sink.live(ChunkKey::new(0, 0)).vegetation, 0);

        let report = store.reconcile(Vec3::ZERO, params(1), &mut sink);
        assert!(report.created.is_empty());
        assert!(report.destroyed.is_empty());
        assert_eq!(report.revegetated.len(), 9);

        for (key, old) in &before {
            let new = store.get(*key).unwrap();
            assert!(Arc::ptr_eq(&old.terrain, &new.terrain));
            let (old_veg, new_veg) = (old.vegetation.as_ref().unwrap(), new.vegetation.as_ref().unwrap());
            assert!(!Arc::ptr_eq(old_veg, new_veg));
            assert_eq!(**old_veg, **new_veg);
        }
        assert_eq!(sink.unbalanced(), 0);
    }

    #[test]
    fn test_density_change_regrows() {
        let mut store = store(1);
        let mut sink = TrackingSink::new();
        store.reconcile(Vec3::ZERO, params(1), &mut sink);
        let epoch = store.vegetation_epoch();

        let report = store.reconcile(Vec3::ZERO, StreamingParams::new(1, 0.5), &mut sink);
        assert_eq!(store.vegetation_epoch(), epoch + 1);
        assert_eq!(report.revegetated.len(), 9);
        assert!(report.created.is_empty());
        assert!(store.chunks().all(|c| c.vegetation.as_ref().unwrap().density == 0.5));
        assert_eq!(store.params().vegetation_density, 0.5);

        let again = store.reconcile(Vec3::ZERO, StreamingParams::new(1, 0.5), &mut sink);
        assert!(again.is_noop());
    }

    #[test]
    fn test_converges_over_walk() {
        let mut store = store(2);
        let mut sink = TrackingSink::new();
        let path = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(60.0, 0.0, 10.0),
            Vec3::new(60.0, 0.0, -80.0),
            Vec3::new(-400.0, 0.0, 220.0),
            Vec3::new(-399.0, 0.0, 221.0),
            Vec3::new(-350.0, 0.0, 300.0),
        ];
        for (i, &pos) in path.iter().enumerate() {
            let radius = if i == 4 { 1 } else { 2 };
            let report = store.reconcile(pos, params(radius), &mut sink);
            assert!(report.failed.is_empty());
            let required = keyset(&required_keys(pos, radius as u32));
            assert_eq!(store.loaded_keys(), required, "step {}", i);
            let live: HashSet<ChunkKey> = sink.live_keys().collect();
            assert_eq!(live, required, "scene objects leaked at step {}", i);
        }

        store.clear(&mut sink);
        assert!(store.is_empty());
        assert_eq!(sink.live_count(), 0);
        assert_eq!(sink.unbalanced(), 0);
    }

    #[test]
    fn test_negative_params_clamped() {
        let mut store = store(1);
        let mut sink = NullSink;
        let report = store.reconcile(Vec3::new(120.0, 0.0, 120.0), StreamingParams::new(-5, -1.0), &mut sink);
        assert!(report.failed.is_empty());
        assert_eq!(store.loaded_keys(), grid(2, 2, 2, 2));
        assert_eq!(store.params(), StreamingParams::new(0, 0.0));
        let chunk = store.get(ChunkKey::new(2, 2)).unwrap();
        assert!(chunk.vegetation.as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_precondition_failure_leaves_store_consistent() {
        logging::init_for_tests();
        let config = WorldConfig::default();
        let complete = Arc::new(WorldGenerator::new(&config));
        let broken = Arc::new(complete.replace_templates(Arc::new(TemplateRegistry::new())));

        let mut store = ChunkStore::new(broken, params(2));
        let mut sink = TrackingSink::new();
        let first = store.reconcile(Vec3::ZERO, params(2), &mut sink);

        assert!(!first.failed.is_empty(), "some chunk near the origin grows vegetation");
        for (key, err) in &first.failed {
            assert!(matches!(err, Error::GenerationPrecondition { .. }));
            assert!(!store.contains(*key));
            assert_eq!(sink.live(*key), LiveObjects::default());
        }
        assert_eq!(first.created.len() + first.failed.len(), 25);

        store.set_generator(complete);
        let second = store.reconcile(Vec3::ZERO, params(2), &mut sink);
        let failed: HashSet<ChunkKey> = first.failed.iter().map(|(k, _)| *k).collect();
        assert_eq!(keyset(&second.created), failed);
        assert!(second.failed.is_empty());
        assert_eq!(store.loaded_keys(), grid(-2, 2, -2, 2));
    }

    #[test]
    fn test_deferred_requires_queue() {
        let mut store = store(1);
        let result = store.reconcile_deferred(Vec3::ZERO, params(1), &mut NullSink);
        assert!(matches!(result, Err(Error::Streaming(_))));
    }

    fn settle(store: &mut ChunkStore, observer: Vec3, params: StreamingParams, sink: &mut dyn SceneSink) {
        for _ in 0..200 {
            let report = store.reconcile_deferred(observer, params, sink).unwrap();
            assert!(report.failed.is_empty());
            let required = keyset(&required_keys(observer, params.radius()));
            let all_grown = store.chunks().all(Chunk::has_vegetation);
            if store.loaded_keys() == required && all_grown && store.pending_builds() == 0 {
                return;
            }
            store.wait_for_builds(Duration::from_secs(5));
        }
        panic!("deferred reconcile did not converge");
    }

    #[test]
    fn test_deferred_converges() {
        logging::init_for_tests();
        let mut store = store(1).with_build_queue(2).unwrap();
        let mut sink = TrackingSink::new();

        let first = store.reconcile_deferred(Vec3::ZERO, params(1), &mut sink).unwrap();
        assert_eq!(first.queued, 9);
        let repeat = store.reconcile_deferred(Vec3::ZERO, params(1), &mut sink).unwrap();
        assert_eq!(repeat.queued, 0, "in-flight builds must not be queued twice");

        settle(&mut store, Vec3::ZERO, params(1), &mut sink);
        assert_eq!(store.loaded_keys(), grid(-1, 1, -1, 1));

        let direct = WorldGenerator::new(&WorldConfig::default());
        let chunk = store.get(ChunkKey::new(1, -1)).unwrap();
        assert_eq!(*chunk.terrain, direct.generate_terrain(ChunkKey::new(1, -1)).0);

        let far = Vec3::new(1000.0, 0.0, 0.0);
        settle(&mut store, far, params(1), &mut sink);
        let live: HashSet<ChunkKey> = sink.live_keys().collect();
        assert_eq!(live, store.loaded_keys());
        assert_eq!(sink.unbalanced(), 0);
    }

    #[test]
    fn test_deferred_density_change() {
        let mut store = store(1).with_build_queue(2).unwrap();
        let mut sink = TrackingSink::new();
        settle(&mut store, Vec3::ZERO, params(1), &mut sink);
        let terrain = Arc::clone(&store.get(ChunkKey::new(0, 0)).unwrap().terrain);

        let thin = StreamingParams::new(1, 0.25);
        settle(&mut store, Vec3::ZERO, thin, &mut sink);
        let chunk = store.get(ChunkKey::new(0, 0)).unwrap();
        assert!(Arc::ptr_eq(&terrain, &chunk.terrain));
        assert!(store.chunks().all(|c| c.vegetation.as_ref().unwrap().density == 0.25));
    }
}
