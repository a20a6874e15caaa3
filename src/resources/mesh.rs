use std::collections::HashMap;

use crate::{
    data_structures::{
        asset::{AssetNode, MaterialRef, MeshData},
        instance::Instance,
        model::ModelVertex,
    },
    resources::draco::DecodedPrimitive,
};

/// Hands out object names the way three.js's `GLTFLoader` does: whitespace
/// becomes `_`, the characters `[ ] . : /` are dropped, and a repeated name gets
/// a `_1`, `_2`, ... suffix.
#[derive(Default)]
pub struct UniqueNames {
    used: HashMap<String, usize>,
}

impl UniqueNames {
    pub fn sanitize(name: &str) -> String {
        name.chars()
            .filter(|c| !matches!(c, '[' | ']' | '.' | ':' | '/'))
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect()
    }

    pub fn create(&mut self, name: &str) -> String {
        let name = Self::sanitize(name);
        match self.used.get_mut(&name) {
            Some(count) => {
                *count += 1;
                format!("{name}_{count}")
            }
            None => {
                self.used.insert(name.clone(), 0);
                name
            }
        }
    }
}

/**
 * Builds the CPU node tree for a document's nodes.
 *
 * Only triangle lists are kept. A missing normal attribute falls back to +y and
 * missing UVs to the origin, so a sparse export still renders.
 *
 * A mesh with one primitive takes its node's name. With several primitives the
 * node keeps its name and each primitive is named after the glTF mesh. Names go
 * through [`UniqueNames`], so texture keys written against the three.js names
 * of a file match here too.
 */
pub struct NodeLoader<'a> {
    buffer_data: &'a [Vec<u8>],
    decoded: &'a HashMap<(usize, usize), DecodedPrimitive>,
    names: UniqueNames,
}

impl<'a> NodeLoader<'a> {
    pub fn new(
        buffer_data: &'a [Vec<u8>],
        decoded: &'a HashMap<(usize, usize), DecodedPrimitive>,
    ) -> Self {
        Self {
            buffer_data,
            decoded,
            names: UniqueNames::default(),
        }
    }

    pub fn load_node(&mut self, node: gltf::Node) -> AssetNode {
        let node_name = node.name().map(|name| self.names.create(name));

        let (name, meshes) = match node.mesh() {
            Some(mesh) => {
                let mesh_name = mesh
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("mesh_{}", mesh.index()));
                let mut meshes = self.load_primitives(&mesh, &mesh_name);
                let name = match (node_name, meshes.as_mut_slice()) {
                    (Some(name), [single]) => {
                        single.name = name.clone();
                        name
                    }
                    (Some(name), _) => name,
                    (None, [single]) => single.name.clone(),
                    (None, _) => format!("node_{}", node.index()),
                };
                (name, meshes)
            }
            None => (
                node_name.unwrap_or_else(|| format!("node_{}", node.index())),
                Vec::new(),
            ),
        };

        AssetNode {
            transform: Instance::from(node.transform()),
            meshes,
            children: node.children().map(|child| self.load_node(child)).collect(),
            name,
        }
    }

    fn load_primitives(&mut self, mesh: &gltf::Mesh, mesh_name: &str) -> Vec<MeshData> {
        let mut meshes = Vec::new();
        for (n, primitive) in mesh.primitives().enumerate() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "Skipping primitive {n} of {mesh_name}: mode {:?} is not supported",
                    primitive.mode()
                );
                continue;
            }
            let geometry = match self.decoded.get(&(mesh.index(), n)) {
                Some(decoded) => Some(from_decoded(decoded)),
                None => self.read_primitive(&primitive),
            };
            let Some((vertices, indices)) = geometry else {
                log::warn!("Skipping primitive {n} of {mesh_name}: no positions");
                continue;
            };

            meshes.push(MeshData {
                name: self.names.create(mesh_name),
                vertices,
                indices,
                material: MaterialRef::Embedded(primitive.material().index()),
            });
        }
        meshes
    }

    fn read_primitive(&self, primitive: &gltf::Primitive) -> Option<(Vec<ModelVertex>, Vec<u32>)> {
        let buffer_data = self.buffer_data;
        let reader =
            primitive.reader(|buffer| buffer_data.get(buffer.index()).map(Vec::as_slice));
        let mut vertices: Vec<ModelVertex> = reader
            .read_positions()?
            .map(|position| ModelVertex {
                position,
                tex_coords: [0.0, 0.0],
                normal: [0.0, 1.0, 0.0],
            })
            .collect();
        if let Some(normals) = reader.read_normals() {
            vertices
                .iter_mut()
                .zip(normals)
                .for_each(|(v, normal)| v.normal = normal);
        }
        if let Some(tex_coords) = reader.read_tex_coords(0) {
            vertices
                .iter_mut()
                .zip(tex_coords.into_f32())
                .for_each(|(v, uv)| v.tex_coords = uv);
        }
        let indices = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..vertices.len() as u32).collect(),
        };
        Some((vertices, indices))
    }
}

fn from_decoded(decoded: &DecodedPrimitive) -> (Vec<ModelVertex>, Vec<u32>) {
    let vertices = decoded
        .positions
        .iter()
        .enumerate()
        .map(|(i, &position)| ModelVertex {
            position,
            tex_coords: decoded
                .tex_coords
                .as_ref()
                .and_then(|uvs| uvs.get(i).copied())
                .unwrap_or([0.0, 0.0]),
            normal: decoded
                .normals
                .as_ref()
                .and_then(|normals| normals.get(i).copied())
                .unwrap_or([0.0, 1.0, 0.0]),
        })
        .collect();
    let indices = if decoded.indices.is_empty() {
        (0..decoded.positions.len() as u32).collect()
    } else {
        decoded.indices.clone()
    };
    (vertices, indices)
}
