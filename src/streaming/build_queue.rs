//! Background chunk builder on a dedicated tokio runtime.
//!
//! Requests are queued over a channel, started nearest-first up to a
//! concurrency limit, and run on the blocking pool since generation is pure
//! CPU work. Completed results are drained with [`ChunkBuildQueue::poll_results`].
//! The queue never double-enqueues a (key, kind) pair that is still in flight.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::{self, JoinSet};

use super::chunk::ChunkKey;
use crate::core::{Error, Result};
use crate::generation::{GeneratedChunk, WorldGenerator};
use crate::vegetation::scatter::VegetationBatchSet;

/// What a request builds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuildKind {
    /// Terrain, ground cap and vegetation
    Chunk,
    /// Vegetation only, for a chunk whose terrain is already loaded
    Vegetation,
}

#[derive(Clone, Copy, Debug)]
pub struct BuildRequest {
    pub key: ChunkKey,
    pub kind: BuildKind,
    pub density: f32,
    /// Vegetation epoch the request was issued under
    pub epoch: u64,
    /// Chebyshev distance from the observer; lower starts sooner
    pub priority: u32,
}

#[derive(Debug)]
pub enum BuildOutput {
    Chunk(GeneratedChunk),
    Vegetation(VegetationBatchSet),
}

#[derive(Debug)]
pub struct BuildResult {
    pub key: ChunkKey,
    pub kind: BuildKind,
    pub epoch: u64,
    pub output: Result<BuildOutput>,
}

pub struct ChunkBuildQueue {
    request_tx: mpsc::UnboundedSender<BuildRequest>,
    result_rx: mpsc::UnboundedReceiver<BuildResult>,
    /// Requests sent but not yet returned
    pending: HashSet<(ChunkKey, BuildKind)>,
    runtime: Option<Runtime>,
}

/// Runs one request to completion on a blocking thread
type BuildFn = Arc<dyn Fn(&BuildRequest) -> Result<BuildOutput> + Send + Sync>;

impl ChunkBuildQueue {
    /// Start a queue with its own runtime.
    ///
    /// `max_concurrent` is clamped to at least one.
    pub fn new(generator: Arc<WorldGenerator>, max_concurrent: usize) -> Result<Self> {
        let build: BuildFn = Arc::new(move |request: &BuildRequest| match request.kind {
            BuildKind::Chunk => generator
                .generate_chunk(request.key, request.density)
                .map(BuildOutput::Chunk),
            BuildKind::Vegetation => generator
                .generate_vegetation(request.key, request.density)
                .map(BuildOutput::Vegetation),
        });
        Self::with_build_fn(build, max_concurrent)
    }

    fn with_build_fn(build: BuildFn, max_concurrent: usize) -> Result<Self> {
        let max_concurrent = max_concurrent.max(1);
        let (request_tx, request_rx) = mpsc::unbounded_channel::<BuildRequest>();
        let (result_tx, result_rx) = mpsc::unbounded_channel::<BuildResult>();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(max_concurrent)
            .thread_name("chunk-build")
            .enable_time()
            .build()?;

        runtime.spawn(Self::worker_loop(build, max_concurrent, request_rx, result_tx));
        log::debug!("chunk build queue started ({} concurrent builds)", max_concurrent);

        Ok(Self {
            request_tx,
            result_rx,
            pending: HashSet::new(),
            runtime: Some(runtime),
        })
    }

    async fn worker_loop(
        build: BuildFn,
        max_concurrent: usize,
        mut request_rx: mpsc::UnboundedReceiver<BuildRequest>,
        result_tx: mpsc::UnboundedSender<BuildResult>,
    ) {
        let mut active_tasks = JoinSet::new();
        // Requests of running tasks, so a task that fails to join still reports back
        let mut running: HashMap<task::Id, BuildRequest> = HashMap::new();
        let mut queued: Vec<BuildRequest> = Vec::new();

        loop {
            tokio::select! {
                Some(request) = request_rx.recv() => {
                    queued.push(request);
                }

                Some(joined) = active_tasks.join_next_with_id(), if !active_tasks.is_empty() => {
                    let result = match joined {
                        Ok((id, result)) => {
                            running.remove(&id);
                            result
                        }
                        Err(e) => {
                            log::error!("chunk build task failed to join: {}", e);
                            let Some(request) = running.remove(&e.id()) else {
                                continue;
                            };
                            let message = format!("build of chunk {} failed to join: {}", request.key, e);
                            Self::failed(&request, message)
                        }
                    };
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }

                else => {
                    if queued.is_empty() && active_tasks.is_empty() {
                        break;
                    }
                }
            }

            while active_tasks.len() < max_concurrent && !queued.is_empty() {
                queued.sort_by_key(|r| (r.priority, r.key));
                let request = queued.remove(0);
                let handle = active_tasks.spawn(Self::build_task(Arc::clone(&build), request));
                running.insert(handle.id(), request);
            }
        }

        log::debug!("chunk build worker stopped");
    }

    async fn build_task(build: BuildFn, request: BuildRequest) -> BuildResult {
        let built = task::spawn_blocking(move || build(&request)).await;
        match built {
            Ok(output) => BuildResult {
                key: request.key,
                kind: request.kind,
                epoch: request.epoch,
                output,
            },
            Err(e) => Self::failed(&request, format!("build of chunk {} aborted: {}", request.key, e)),
        }
    }

    fn failed(request: &BuildRequest, message: String) -> BuildResult {
        BuildResult {
            key: request.key,
            kind: request.kind,
            epoch: request.epoch,
            output: Err(Error::Streaming(message)),
        }
    }

    /// Queue a build.
    ///
    /// Returns `Ok(false)` if the same key and kind is already in flight.
    pub fn request(&mut self, request: BuildRequest) -> Result<bool> {
        let slot = (request.key, request.kind);
        if self.pending.contains(&slot) {
            return Ok(false);
        }

        self.request_tx
            .send(request)
            .map_err(|_| Error::Streaming("chunk build worker stopped".into()))?;
        self.pending.insert(slot);
        Ok(true)
    }

    /// Drain every completed result without blocking.
    pub fn poll_results(&mut self) -> Vec<BuildResult> {
        let mut results = Vec::new();
        while let Ok(result) = self.result_rx.try_recv() {
            self.pending.remove(&(result.key, result.kind));
            results.push(result);
        }
        results
    }

    /// Block until at least one result arrives or `timeout` elapses, then
    /// drain everything available.
    pub fn wait_for_results(&mut self, timeout: Duration) -> Vec<BuildResult> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        let Some(runtime) = self.runtime.as_ref() else {
            return Vec::new();
        };

        let rx = &mut self.result_rx;
        let first = runtime.block_on(async { tokio::time::timeout(timeout, rx.recv()).await });

        let mut results = Vec::new();
        if let Ok(Some(result)) = first {
            self.pending.remove(&(result.key, result.kind));
            results.push(result);
        }
        results.extend(self.poll_results());
        results
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, key: ChunkKey, kind: BuildKind) -> bool {
        self.pending.contains(&(key, kind))
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Drop for ChunkBuildQueue {
    fn drop(&mut self) {
        // Builds already running finish on the blocking pool and are discarded.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
