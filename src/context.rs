use std::{collections::HashMap, sync::Arc};

use anyhow::Context as _;
use winit::window::Window;

use crate::{
    binder::TextureEntry,
    bootstrap::{FrameState, Stage},
    camera::{Camera, CameraResources, Projection},
    config::{LightsConfig, SceneConfig},
    data_structures::{
        asset::{MaterialRef, ModelAsset, Shading, Side},
        instance::Instance,
        model::{DrawModel, Material},
        scene_graph::{ContainerNode, SceneNode, to_scene_node},
        texture::{self, TextureSettings},
    },
    pipelines::{
        Pipelines,
        light::{LightResources, LightUniform},
    },
    render::{Instanced, Render},
    resources::{self, texture::fit_within},
    viewport::SurfaceSize,
};

/// GPU state of one scene: device, surface, pipelines and everything drawn.
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub sample_count: u32,
    msaa_target: Option<wgpu::TextureView>,
    depth_texture: texture::Texture,
    pub camera: CameraResources,
    pub light: LightResources,
    material_layout: wgpu::BindGroupLayout,
    pipelines: Pipelines,
    root: ContainerNode,
    placeholder: Option<usize>,
    /// One double-sided standard material per texture-map key.
    texture_materials: HashMap<String, Material>,
    default_material: Material,
    pub clear_colour: wgpu::Color,
    disposed: bool,
}

impl Context {
    pub async fn new(window: Arc<Window>, scene: &SceneConfig) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create the render surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable GPU adapter")?;
        log::info!("device and queue");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    // Texture and surface sizes follow what the adapter reports
                    wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits())
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
                ..Default::default()
            })
            .await
            .context("Failed to request a GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Shaders output linear colour, so an sRGB surface does the encoding
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("Surface reports no formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let sample_count = if scene.antialias
            && adapter
                .get_texture_format_features(surface_format)
                .flags
                .sample_count_supported(4)
        {
            4
        } else {
            1
        };
        log::info!("Surface {surface_format:?}, {sample_count}x multisampling");

        // The real camera arrives with the first frame
        let camera = CameraResources::new(
            &device,
            &Camera::from_config(&scene.camera),
            &Projection::from_config(config.width, config.height, &scene.camera),
        );
        let light = LightResources::new(LightUniform::from_config(&scene.lights), &device);
        let material_layout = resources::texture::material_layout(&device);
        let pipelines = Pipelines::new(
            &device,
            config.format,
            sample_count,
            &material_layout,
            &camera.bind_group_layout,
            &light.bind_group_layout,
        );

        let default_material = Material::new(
            &device,
            "default material",
            texture::Texture::solid(&device, &queue, [255; 4], "default", &TextureSettings::default()),
            &material_layout,
            Shading::Standard,
            Side::Front,
        );

        let depth_texture = texture::Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            sample_count,
            "depth_texture",
        );
        let msaa_target = (sample_count > 1)
            .then(|| texture::Texture::create_msaa_target(&device, &config, sample_count));

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            sample_count,
            msaa_target,
            depth_texture,
            camera,
            light,
            material_layout,
            pipelines,
            root: ContainerNode::new("Scene"),
            placeholder: None,
            texture_materials: HashMap::new(),
            default_material,
            clear_colour: scene.clear_colour(),
            disposed: false,
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// Reconfigures the surface with its current size, after it was lost or outdated.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    fn resize_targets(&mut self) {
        self.depth_texture = texture::Texture::create_depth_texture(
            &self.device,
            [self.config.width, self.config.height],
            self.sample_count,
            "depth_texture",
        );
        if self.sample_count > 1 {
            self.msaa_target = Some(texture::Texture::create_msaa_target(
                &self.device,
                &self.config,
                self.sample_count,
            ));
        }
    }

    fn texture_material(&self, entry: &TextureEntry, texture: texture::Texture) -> Material {
        Material::new(
            &self.device,
            &entry.key,
            texture,
            &self.material_layout,
            Shading::Standard,
            Side::Double,
        )
    }

    fn resolve<'a>(&'a self, material: &MaterialRef, embedded: &'a [Material]) -> &'a Material {
        match material {
            MaterialRef::Texture(key) => self
                .texture_materials
                .get(key)
                .unwrap_or(&self.default_material),
            MaterialRef::Embedded(Some(index)) => {
                embedded.get(*index).unwrap_or(&self.default_material)
            }
            MaterialRef::Embedded(None) => &self.default_material,
        }
    }

    fn upload_materials(&self, asset: &ModelAsset) -> Vec<Material> {
        asset
            .materials
            .iter()
            .map(|data| {
                let settings = TextureSettings::default();
                let texture = match &data.texture {
                    Some(pixels) => texture::Texture::from_image(
                        &self.device,
                        &self.queue,
                        &fit_within(
                            image::DynamicImage::ImageRgba8(pixels.clone()),
                            self.device.limits().max_texture_dimension_2d,
                        ),
                        Some(data.name.as_str()),
                        &settings,
                    ),
                    None => texture::Texture::solid(
                        &self.device,
                        &self.queue,
                        data.base_color_rgba8(),
                        &data.name,
                        &settings,
                    ),
                };
                Material::new(
                    &self.device,
                    &data.name,
                    texture,
                    &self.material_layout,
                    data.shading,
                    data.side,
                )
            })
            .collect()
    }
}

impl Stage for Context {
    fn configure_surface(&mut self, size: SurfaceSize) {
        let (width, height) = size.physical();
        let max = self.device.limits().max_texture_dimension_2d;
        self.config.width = width.min(max);
        self.config.height = height.min(max);
        self.surface.configure(&self.device, &self.config);
        self.resize_targets();
    }

    fn set_lights(&mut self, lights: &LightsConfig) {
        self.light
            .write(&self.queue, LightUniform::from_config(lights));
    }

    fn register_texture(&mut self, entry: &TextureEntry) {
        let placeholder =
            texture::Texture::solid(&self.device, &self.queue, [255; 4], &entry.key, &entry.settings);
        let material = self.texture_material(entry, placeholder);
        self.texture_materials.insert(entry.key.clone(), material);
    }

    fn upload_texture(&mut self, entry: &TextureEntry, image: image::DynamicImage) -> anyhow::Result<()> {
        anyhow::ensure!(!self.disposed, "Scene is disposed");
        let image = fit_within(image, self.device.limits().max_texture_dimension_2d);
        let texture = texture::Texture::from_image(
            &self.device,
            &self.queue,
            &image,
            Some(entry.path.as_str()),
            &entry.settings,
        );
        let material = self.texture_material(entry, texture);
        self.texture_materials.insert(entry.key.clone(), material);
        Ok(())
    }

    fn add_placeholder(&mut self, placeholder: &ModelAsset) {
        let materials = Arc::new(self.upload_materials(placeholder));
        let node = to_scene_node(&placeholder.root, &self.device, &materials);
        self.placeholder = Some(self.root.children.len());
        self.root.add_child(node);
    }

    fn attach_model(&mut self, model: ModelAsset) -> anyhow::Result<()> {
        anyhow::ensure!(!self.disposed, "Scene is disposed");
        let materials = Arc::new(self.upload_materials(&model));
        let node = to_scene_node(&model.root, &self.device, &materials);
        log::info!("Attaching {} to the scene", node.name());
        self.root.add_child(node);
        Ok(())
    }

    fn draw(&mut self, frame: &FrameState) -> anyhow::Result<()> {
        if self.disposed {
            return Ok(());
        }

        if let Some(node) = self
            .placeholder
            .and_then(|index| self.root.children.get_mut(index))
        {
            node.set_local_transform(frame.placeholder.clone());
        }
        self.root.update_world_transform(&Instance::new());
        self.root.write_to_buffers(&self.queue);
        self.camera
            .write(&self.queue, frame.camera, frame.projection);

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let (target, resolve_target) = match &self.msaa_target {
                Some(msaa) => (msaa, Some(&view)),
                None => (&view, None),
            };
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                ..Default::default()
            });

            let mut instanced: Vec<Instanced> = Vec::new();
            // Placeholder first, then the room
            Render::Composed(
                self.root
                    .get_children()
                    .iter()
                    .map(|node| Render::from(node.as_ref()))
                    .collect(),
            )
            .flatten(&mut instanced);

            for draw in instanced {
                if draw.amount == 0 || draw.instance.size() == 0 {
                    log::warn!("Skipping a draw with zero instances");
                    continue;
                }
                render_pass.set_vertex_buffer(1, draw.instance.slice(..));
                for mesh in &draw.model.meshes {
                    let material = self.resolve(&mesh.material, &draw.model.materials);
                    render_pass.set_pipeline(self.pipelines.select(material.shading, material.side));
                    render_pass.draw_mesh_instanced(
                        mesh,
                        material,
                        0..draw.amount as u32,
                        &self.camera.bind_group,
                        &self.light.bind_group,
                    );
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.window.pre_present_notify();
        output.present();
        Ok(())
    }

    fn dispose(&mut self) {
        self.root.clear();
        self.placeholder = None;
        self.texture_materials.clear();
        self.disposed = true;
        log::info!("Released scene resources");
    }
}
