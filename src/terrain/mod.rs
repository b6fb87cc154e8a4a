//! Procedural terrain: noise, elevation, surface shading and chunk meshes

pub mod perlin;
pub use perlin::NoiseField;

pub mod height;
pub use height::{HeightField, OctaveLayer, TerrainParams};

pub mod surface;
pub use surface::{SurfaceBand, SurfaceClassifier};

pub mod mesh;
pub use mesh::{GroundCap, TerrainGeometry, TerrainMeshBuilder, TerrainVertex, MESH_RESOLUTION};
