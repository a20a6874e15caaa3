//! Render composition.
//!
//! Scene nodes describe what they want drawn as a [`Render`]. The context
//! flattens it into a list of [`Instanced`] draws and picks a pipeline
//! per mesh while recording the pass.

use crate::data_structures::{model::Model, scene_graph::SceneNode};

/// Data for instanced object rendering: a model and the buffer holding its instances.
pub struct Instanced<'a> {
    pub instance: &'a wgpu::Buffer,
    pub model: &'a Model,
    pub amount: usize,
}

/// Specifies how a scene object should be rendered.
///
/// - `Defaults(Vec<Instanced>)` renders a batch of instanced objects
/// - `Composed(Vec<Render>)` recursively renders a composition of renders
pub enum Render<'a> {
    Defaults(Vec<Instanced<'a>>),
    Composed(Vec<Render<'a>>),
}

impl<'a> Render<'a> {
    pub(crate) fn flatten(self, out: &mut Vec<Instanced<'a>>) {
        match self {
            Render::Defaults(mut vec) => out.append(&mut vec),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.flatten(out)),
        }
    }
}

impl<'a> From<&'a dyn SceneNode> for Render<'a> {
    fn from(sn: &'a dyn SceneNode) -> Self {
        Render::Defaults(sn.get_render())
    }
}
