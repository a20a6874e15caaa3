//! CPU-side model data.
//!
//! A [`ModelAsset`] is what the loader produces from a glTF file before anything
//! touches the GPU: a node hierarchy with named meshes and the materials embedded
//! in the file. Material binding runs on this representation, which keeps it free
//! of any device handles.

use crate::data_structures::{instance::Instance, model::ModelVertex};

/// Which material a mesh renders with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MaterialRef {
    /// A material that came with the asset, by index into [`ModelAsset::materials`].
    /// `None` means the file assigned no material and the engine default is used.
    Embedded(Option<usize>),
    /// The double-sided standard material bound to a texture-lookup key.
    Texture(String),
}

/// How a material responds to the scene lights.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shading {
    /// Lit by ambient and directional light.
    Standard,
    /// Flat colour, ignores lights.
    Unlit,
}

/// Which faces of a mesh are drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Front,
    Double,
}

#[derive(Clone, Debug)]
pub struct MaterialData {
    pub name: String,
    /// Linear RGBA multiplier. Already baked into `texture` when one is present.
    pub base_color: [f32; 4],
    pub texture: Option<image::RgbaImage>,
    pub shading: Shading,
    pub side: Side,
}

impl MaterialData {
    pub fn unlit(name: &str, rgba: [u8; 4]) -> Self {
        Self {
            name: name.to_string(),
            base_color: [1.0; 4],
            texture: Some(image::RgbaImage::from_pixel(1, 1, image::Rgba(rgba))),
            shading: Shading::Unlit,
            side: Side::Front,
        }
    }

    /// The texel used when the material has no texture of its own.
    pub fn base_color_rgba8(&self) -> [u8; 4] {
        self.base_color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
    }
}

#[derive(Clone, Debug)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub material: MaterialRef,
}

impl MeshData {
    /// An axis-aligned box centred on the origin, four vertices per face.
    pub fn cuboid(name: &str, size: [f32; 3], material: MaterialRef) -> Self {
        let [hx, hy, hz] = size.map(|s| s * 0.5);
        // (normal, u axis, v axis) per face
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ];
        let half = [hx, hy, hz];
        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u, v) in faces {
            let base = vertices.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let position = [0, 1, 2].map(|i| (normal[i] + u[i] * su + v[i] * sv) * half[i]);
                vertices.push(ModelVertex {
                    position,
                    tex_coords: [(su + 1.0) * 0.5, (1.0 - sv) * 0.5],
                    normal,
                });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Self {
            name: name.to_string(),
            vertices,
            indices,
            material,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AssetNode {
    pub name: String,
    pub transform: Instance,
    pub meshes: Vec<MeshData>,
    pub children: Vec<AssetNode>,
}

impl AssetNode {
    pub fn group(name: &str, children: Vec<AssetNode>) -> Self {
        Self {
            name: name.to_string(),
            children,
            ..Default::default()
        }
    }

    /// Visits every mesh depth-first, parents before children.
    pub fn for_each_mesh(&self, f: &mut dyn FnMut(&MeshData)) {
        self.meshes.iter().for_each(|mesh| f(mesh));
        for child in &self.children {
            child.for_each_mesh(f);
        }
    }

    pub fn for_each_mesh_mut(&mut self, f: &mut dyn FnMut(&mut MeshData)) {
        self.meshes.iter_mut().for_each(|mesh| f(mesh));
        for child in &mut self.children {
            child.for_each_mesh_mut(f);
        }
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.for_each_mesh(&mut |_| count += 1);
        count
    }

    pub fn find_mesh(&self, name: &str) -> Option<&MeshData> {
        self.meshes
            .iter()
            .find(|mesh| mesh.name == name)
            .or_else(|| self.children.iter().find_map(|child| child.find_mesh(name)))
    }
}

/// A loaded model: its node tree plus the materials the file embeds.
#[derive(Clone, Debug, Default)]
pub struct ModelAsset {
    pub root: AssetNode,
    pub materials: Vec<MaterialData>,
}
