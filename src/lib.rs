//! room-portfolio
//!
//! A single 3D portfolio room rendered with wgpu, in a native window or on a
//! web canvas. On mount the scene loads a glTF model, swaps the materials of
//! meshes whose names contain a texture-map key, lights the room, attaches
//! damped orbit controls and renders continuously until it is unmounted.
//!
//! High-level modules
//! - `bootstrap`: scene mount, asset completion handling, render loop, teardown
//! - `binder`: texture lookup and name-based material binding
//! - `camera`: camera, projection, uniforms and orbit controls
//! - `config`: scene configuration with serde overrides
//! - `context`: wgpu device, surface and pipelines; the GPU [`bootstrap::Stage`]
//! - `data_structures`: CPU assets, GPU models, textures, instances, scene graph
//! - `flow`: winit event loop and the native/web entry points
//! - `pipelines`: lit and unlit render pipelines, light uniform
//! - `render`: render composition
//! - `resources`: model and texture loading
//! - `viewport`: viewport sizing and the resize handler
//!

pub mod binder;
pub mod bootstrap;
pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod viewport;

// Re-exports commonly used types for convenience in downstream code.
pub use bootstrap::{SceneBootstrapper, Stage};
pub use config::SceneConfig;
pub use winit::event::WindowEvent;
