//! Scene data structures: assets, models, textures, scene graphs, and instances.
//!
//! - `asset` is the CPU-side model produced by the loader and edited by the binder
//! - `model` contains mesh and material definitions, GPU resources for 3D models
//! - `texture` contains the GPU texture wrapper and creation utilities
//! - `instance` holds per-node transformation data
//! - `scene_graph` enables hierarchical scene organization

pub mod asset;
pub mod instance;
pub mod model;
pub mod scene_graph;
pub mod texture;
