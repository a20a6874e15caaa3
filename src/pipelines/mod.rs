//! Render pipelines.
//!
//! Materials differ in shading model (lit or unlit) and in which faces are
//! drawn, so there is one pipeline per combination. All of them share the same
//! bind group layouts: material at 0, camera at 1, light at 2.

use crate::data_structures::asset::{Shading, Side};

pub mod basic;
pub mod light;
pub mod unlit;

pub struct Pipelines {
    standard_front: wgpu::RenderPipeline,
    standard_double: wgpu::RenderPipeline,
    unlit_front: wgpu::RenderPipeline,
    unlit_double: wgpu::RenderPipeline,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        sample_count: u32,
        material_layout: &wgpu::BindGroupLayout,
        camera_layout: &wgpu::BindGroupLayout,
        light_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let layouts = [material_layout, camera_layout, light_layout];
        let back = Some(wgpu::Face::Back);
        Self {
            standard_front: basic::mk_basic_pipeline(device, color_format, sample_count, back, &layouts),
            standard_double: basic::mk_basic_pipeline(device, color_format, sample_count, None, &layouts),
            unlit_front: unlit::mk_unlit_pipeline(device, color_format, sample_count, back, &layouts),
            unlit_double: unlit::mk_unlit_pipeline(device, color_format, sample_count, None, &layouts),
        }
    }

    pub fn select(&self, shading: Shading, side: Side) -> &wgpu::RenderPipeline {
        match (shading, side) {
            (Shading::Standard, Side::Front) => &self.standard_front,
            (Shading::Standard, Side::Double) => &self.standard_double,
            (Shading::Unlit, Side::Front) => &self.unlit_front,
            (Shading::Unlit, Side::Double) => &self.unlit_double,
        }
    }
}
