//! Chunk streaming around a moving observer

pub mod chunk;
pub mod sink;
pub mod build_queue;
pub mod store;

pub use chunk::{Chunk, ChunkKey, CHUNK_SIZE, RENDER_DISTANCE};
pub use sink::{LiveObjects, NullSink, SceneObject, SceneObjectKind, SceneSink, TrackingSink};
pub use build_queue::{BuildKind, BuildOutput, BuildRequest, BuildResult, ChunkBuildQueue};
pub use store::{required_keys, ChunkStore, ReconcileReport, StreamingStats};
