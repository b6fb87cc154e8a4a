//! Terrastream - procedural terrain generation and chunk streaming

pub mod core;
pub mod terrain;
pub mod vegetation;
pub mod generation;
pub mod streaming;
