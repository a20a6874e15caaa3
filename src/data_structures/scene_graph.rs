//! Scene graph and hierarchical scene organization.
//!
//! Provides the [`SceneNode`] trait and the two node kinds the room needs:
//! [`ContainerNode`] for pure grouping and [`ModelNode`] for nodes that own
//! meshes. Each node keeps a local and a world transform; world transforms are
//! pushed down the tree by [`SceneNode::update_world_transform`].

use std::sync::Arc;

use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        asset::AssetNode,
        instance::{Instance, InstanceRaw},
        model::{self, Material},
    },
    render::Instanced,
};

/// Uploads an asset hierarchy. All model nodes share `materials`.
pub fn to_scene_node(
    node: &AssetNode,
    device: &wgpu::Device,
    materials: &Arc<Vec<Material>>,
) -> Box<dyn SceneNode> {
    let mut scene_node: Box<dyn SceneNode> = if node.meshes.is_empty() {
        Box::new(ContainerNode::new(&node.name))
    } else {
        let model = model::Model {
            meshes: node
                .meshes
                .iter()
                .map(|mesh| model::Mesh::from_data(device, mesh))
                .collect(),
            materials: Arc::clone(materials),
        };
        Box::new(ModelNode::from_model(&node.name, device, model))
    };
    scene_node.set_local_transform(node.transform.clone());
    for child in &node.children {
        scene_node.add_child(to_scene_node(child, device, materials));
    }
    scene_node
}

pub trait SceneNode {
    fn name(&self) -> &str;

    fn set_local_transform(&mut self, instance: Instance);

    /// Recomputes this node's world transform from its parent's and recurses.
    fn update_world_transform(&mut self, parent: &Instance);

    fn add_child(&mut self, child: Box<dyn SceneNode>);

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>>;

    fn write_to_buffers(&mut self, queue: &wgpu::Queue);

    fn get_render(&self) -> Vec<Instanced<'_>>;
}

pub struct ContainerNode {
    name: String,
    pub children: Vec<Box<dyn SceneNode>>,
    transform: (Instance, Instance),
}

impl ContainerNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            children: Vec::new(),
            transform: (Instance::default(), Instance::default()),
        }
    }

    pub fn clear(&mut self) {
        self.children.clear();
    }
}

impl SceneNode for ContainerNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_local_transform(&mut self, instance: Instance) {
        self.transform.0 = instance;
    }

    fn update_world_transform(&mut self, parent: &Instance) {
        let world = parent * &self.transform.0;
        for child in self.children.iter_mut() {
            child.update_world_transform(&world);
        }
        self.transform.1 = world;
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        self.children
            .iter_mut()
            .for_each(|child| child.write_to_buffers(queue));
    }

    fn get_render(&self) -> Vec<Instanced<'_>> {
        self.children
            .iter()
            .flat_map(|child| child.get_render())
            .collect()
    }
}

pub struct ModelNode {
    name: String,
    children: Vec<Box<dyn SceneNode>>,
    instance_buffer: wgpu::Buffer,
    transform: (Instance, Instance),
    model: model::Model,
}

impl ModelNode {
    pub fn from_model(name: &str, device: &wgpu::Device, model: model::Model) -> Self {
        let transform = (Instance::default(), Instance::default());
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Instance Buffer"),
            contents: bytemuck::cast_slice(&[transform.1.to_raw()]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            name: name.to_string(),
            children: Vec::new(),
            instance_buffer,
            transform,
            model,
        }
    }
}

impl SceneNode for ModelNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_local_transform(&mut self, instance: Instance) {
        self.transform.0 = instance;
    }

    fn update_world_transform(&mut self, parent: &Instance) {
        let world = parent * &self.transform.0;
        for child in self.children.iter_mut() {
            child.update_world_transform(&world);
        }
        self.transform.1 = world;
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        let raw: [InstanceRaw; 1] = [self.transform.1.to_raw()];
        queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&raw));
        self.children
            .iter_mut()
            .for_each(|child| child.write_to_buffers(queue));
    }

    fn get_render(&self) -> Vec<Instanced<'_>> {
        self.children
            .iter()
            .flat_map(|child| child.get_render())
            .chain([Instanced {
                instance: &self.instance_buffer,
                model: &self.model,
                amount: 1,
            }])
            .collect()
    }
}
