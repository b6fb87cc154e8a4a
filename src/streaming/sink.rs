//! Outbound interface to the scene graph.
//!
//! The store hands every renderable it creates to a [`SceneSink`] and hands
//! it back on release. Objects are `Arc`-shared so the sink can keep its own
//! reference while the store retains ownership of the chunk.

use std::collections::HashMap;
use std::sync::Arc;

use super::chunk::ChunkKey;
use crate::terrain::mesh::{GroundCap, TerrainGeometry};
use crate::vegetation::scatter::VegetationBatchSet;

#[derive(Clone, Debug)]
pub enum SceneObject {
    Terrain(Arc<TerrainGeometry>),
    GroundCap(Arc<GroundCap>),
    Vegetation(Arc<VegetationBatchSet>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SceneObjectKind {
    Terrain,
    GroundCap,
    Vegetation,
}

impl SceneObject {
    pub fn kind(&self) -> SceneObjectKind {
        match self {
            SceneObject::Terrain(_) => SceneObjectKind::Terrain,
            SceneObject::GroundCap(_) => SceneObjectKind::GroundCap,
            SceneObject::Vegetation(_) => SceneObjectKind::Vegetation,
        }
    }
}

/// Receives add/remove requests tagged with the owning chunk.
pub trait SceneSink {
    fn attach(&mut self, key: ChunkKey, object: SceneObject);

    /// Ownership passes to the sink for disposal.
    fn detach(&mut self, key: ChunkKey, object: SceneObject);
}

/// Discards everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl SceneSink for NullSink {
    fn attach(&mut self, _key: ChunkKey, _object: SceneObject) {}

    fn detach(&mut self, _key: ChunkKey, _object: SceneObject) {}
}

/// Live object counts for one chunk
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiveObjects {
    pub terrain: usize,
    pub ground_cap: usize,
    pub vegetation: usize,
}

impl LiveObjects {
    fn slot(&mut self, kind: SceneObjectKind) -> &mut usize {
        match kind {
            SceneObjectKind::Terrain => &mut self.terrain,
            SceneObjectKind::GroundCap => &mut self.ground_cap,
            SceneObjectKind::Vegetation => &mut self.vegetation,
        }
    }

    pub fn total(&self) -> usize {
        self.terrain + self.ground_cap + self.vegetation
    }
}

/// Counts attached objects per chunk to detect leaks and double releases.
#[derive(Debug, Default)]
pub struct TrackingSink {
    live: HashMap<ChunkKey, LiveObjects>,
    attached: usize,
    detached: usize,
    /// Detaches of objects that were never attached
    unbalanced: usize,
}

impl TrackingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live(&self, key: ChunkKey) -> LiveObjects {
        self.live.get(&key).copied().unwrap_or_default()
    }

    /// Keys with at least one live object
    pub fn live_keys(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        self.live.keys().copied()
    }

    pub fn live_count(&self) -> usize {
        self.live.values().map(LiveObjects::total).sum()
    }

    pub fn attached(&self) -> usize {
        self.attached
    }

    pub fn detached(&self) -> usize {
        self.detached
    }

    pub fn unbalanced(&self) -> usize {
        self.unbalanced
    }
}

impl SceneSink for TrackingSink {
    fn attach(&mut self, key: ChunkKey, object: SceneObject) {
        *self.live.entry(key).or_default().slot(object.kind()) += 1;
        self.attached += 1;
    }

    fn detach(&mut self, key: ChunkKey, object: SceneObject) {
        self.detached += 1;
        let kind = object.kind();
        let Some(entry) = self.live.get_mut(&key) else {
            log::warn!("detach of {:?} for chunk {} that has nothing attached", kind, key);
            self.unbalanced += 1;
            return;
        };
        let slot = entry.slot(kind);
        if *slot == 0 {
            log::warn!("detach of {:?} for chunk {} that was never attached", kind, key);
            self.unbalanced += 1;
            return;
        }
        *slot -= 1;
        if entry.total() == 0 {
            self.live.remove(&key);
        }
    }
}
