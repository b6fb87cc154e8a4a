//! Deterministic per-chunk vegetation placement

pub mod rng;
pub mod species;
pub mod templates;
pub mod scatter;

pub use rng::{scramble, ChunkRng};
pub use species::{select_placement, Placement, Species};
pub use templates::{SpeciesTemplate, TemplateHandle, TemplateRegistry};
pub use scatter::{Instance, InstanceBatch, Tint, VegetationBatchSet, VegetationScatterer};
