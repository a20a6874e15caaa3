//! Scene bootstrapping.
//!
//! [`SceneBootstrapper::mount`] sets up the camera, lights, controls and the
//! loading placeholder, registers the texture map and hands back the asset
//! requests the embedder has to fulfil. Completed loads come back through
//! [`SceneBootstrapper::handle_texture`] and [`SceneBootstrapper::handle_model`];
//! [`SceneBootstrapper::frame`] runs one iteration of the render loop.
//!
//! Rendering itself is delegated to a [`Stage`]. The wgpu
//! [`Context`](crate::context::Context) is the real one.

use std::{
    collections::HashMap,
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use cgmath::{Euler, Quaternion, Rad};
use winit::event::WindowEvent;

use crate::{
    binder::{self, TextureEntry, TextureLookup},
    camera::{Camera, OrbitControls, Projection},
    config::{self, LightsConfig, PlaceholderConfig, SceneConfig},
    data_structures::{
        asset::{AssetNode, MaterialData, MaterialRef, MeshData, ModelAsset},
        instance::Instance,
    },
    resources::AssetError,
    viewport::{ResizeHandler, SurfaceSize, Viewport},
};

/// The rendering side of a scene.
pub trait Stage {
    /// Resizes the render surface.
    fn configure_surface(&mut self, size: SurfaceSize);

    fn set_lights(&mut self, lights: &LightsConfig);

    /// Creates the material for a texture-map key. It samples a placeholder
    /// until [`Stage::upload_texture`] delivers the pixels.
    fn register_texture(&mut self, entry: &TextureEntry);

    fn upload_texture(&mut self, entry: &TextureEntry, image: image::DynamicImage) -> anyhow::Result<()>;

    fn add_placeholder(&mut self, placeholder: &ModelAsset);

    /// Adds a loaded model under the scene root.
    fn attach_model(&mut self, model: ModelAsset) -> anyhow::Result<()>;

    fn draw(&mut self, frame: &FrameState) -> anyhow::Result<()>;

    /// Releases every GPU resource the scene holds.
    fn dispose(&mut self);
}

/// Everything a stage needs to draw one frame.
#[derive(Clone, Debug)]
pub struct FrameState<'a> {
    pub camera: &'a Camera,
    pub projection: &'a Projection,
    pub placeholder: Instance,
}

static NEXT_MOUNT: AtomicU64 = AtomicU64::new(1);

/// Identifies one mount. Asset results carry the id of the mount that asked
/// for them so results arriving after a teardown can be recognised.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MountId(u64);

impl MountId {
    fn next() -> Self {
        Self(NEXT_MOUNT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for MountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An asset fetch the embedder has to run and report back.
#[derive(Clone, Debug, PartialEq)]
pub enum AssetRequest {
    Texture {
        mount: MountId,
        entry: TextureEntry,
    },
    Model {
        mount: MountId,
        path: String,
        decoder_path: String,
    },
}

impl AssetRequest {
    pub fn mount(&self) -> MountId {
        match self {
            AssetRequest::Texture { mount, .. } | AssetRequest::Model { mount, .. } => *mount,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            AssetRequest::Texture { entry, .. } => &entry.path,
            AssetRequest::Model { path, .. } => path,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelSlot {
    Pending,
    Attached { meshes: usize, bound: usize },
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextureStatus {
    Pending,
    Loaded,
    Failed(String),
}

/// The spinning box shown while the room loads.
#[derive(Clone, Debug)]
pub struct Placeholder {
    pub asset: ModelAsset,
    rotation: Euler<Rad<f32>>,
    spin: [f32; 2],
}

impl Placeholder {
    pub const NAME: &'static str = "Placeholder";

    pub fn new(config: &PlaceholderConfig) -> Self {
        let mesh = MeshData::cuboid(Self::NAME, config.size, MaterialRef::Embedded(Some(0)));
        let asset = ModelAsset {
            root: AssetNode {
                name: Self::NAME.to_string(),
                meshes: vec![mesh],
                ..Default::default()
            },
            materials: vec![MaterialData::unlit(Self::NAME, config::rgba8(config.color))],
        };
        Self {
            asset,
            rotation: Euler::new(Rad(0.0), Rad(0.0), Rad(0.0)),
            spin: config.spin,
        }
    }

    pub fn advance(&mut self) {
        self.rotation.x += Rad(self.spin[0]);
        self.rotation.y += Rad(self.spin[1]);
    }

    pub fn rotation(&self) -> Euler<Rad<f32>> {
        self.rotation
    }

    pub fn orientation(&self) -> Quaternion<f32> {
        Quaternion::from(self.rotation)
    }

    pub fn transform(&self) -> Instance {
        Instance {
            rotation: self.orientation(),
            ..Default::default()
        }
    }
}

pub struct SceneBootstrapper<S: Stage> {
    mount_id: MountId,
    stage: S,
    camera: Camera,
    projection: Projection,
    controls: OrbitControls,
    textures: TextureLookup,
    texture_status: HashMap<String, TextureStatus>,
    model_slot: ModelSlot,
    placeholder: Placeholder,
    resize: Option<ResizeHandler>,
    loop_state: LoopState,
    frames: u64,
}

impl<S: Stage> SceneBootstrapper<S> {
    /// Builds the scene and returns the asset requests to run, textures in
    /// map order followed by the model.
    pub fn mount(config: &SceneConfig, mut stage: S, viewport: Viewport) -> (Self, Vec<AssetRequest>) {
        let mount_id = MountId::next();
        log::info!("Mounting scene {mount_id} at {viewport:?}");

        // Environment
        let mut camera = Camera::from_config(&config.camera);
        let mut projection = Projection::from_config(viewport.width, viewport.height, &config.camera);
        stage.set_lights(&config.lights);
        let resize = ResizeHandler::new(config.max_pixel_ratio);
        let surface = resize.apply(viewport, &mut projection);
        if let Some(size) = surface {
            stage.configure_surface(size);
        }
        let placeholder = Placeholder::new(&config.placeholder);
        stage.add_placeholder(&placeholder.asset);

        // Interaction
        let mut controls = OrbitControls::new(&config.controls, camera.target, projection.fovy());
        if let Some(size) = surface {
            controls.set_viewport_height(size.physical().1);
        }
        controls.update(&mut camera);

        // Textures
        let textures = TextureLookup::register(&config.textures, config.texture_settings);
        let mut requests = Vec::with_capacity(textures.len() + 1);
        let mut texture_status = HashMap::new();
        for entry in textures.iter() {
            stage.register_texture(entry);
            texture_status.insert(entry.key.clone(), TextureStatus::Pending);
            requests.push(AssetRequest::Texture {
                mount: mount_id,
                entry: entry.clone(),
            });
        }

        // Model
        requests.push(AssetRequest::Model {
            mount: mount_id,
            path: config.model_path.clone(),
            decoder_path: config.decoder_path.clone(),
        });

        let bootstrapper = Self {
            mount_id,
            stage,
            camera,
            projection,
            controls,
            textures,
            texture_status,
            model_slot: ModelSlot::Pending,
            placeholder,
            resize: Some(resize),
            loop_state: LoopState::Running,
            frames: 0,
        };
        (bootstrapper, requests)
    }

    fn accepts(&self, mount: MountId, what: &str) -> bool {
        if mount != self.mount_id {
            log::debug!("Dropping {what} from mount {mount}, current mount is {}", self.mount_id);
            return false;
        }
        if self.loop_state == LoopState::Cancelled {
            log::debug!("Dropping {what} for mount {mount} after teardown");
            return false;
        }
        true
    }

    pub fn handle_texture(&mut self, mount: MountId, key: &str, result: anyhow::Result<image::DynamicImage>) {
        if !self.accepts(mount, "texture") {
            return;
        }
        let Some(entry) = self.textures.get(key).cloned() else {
            log::warn!("Received texture for unknown key {key:?}");
            return;
        };
        let status = match result.and_then(|image| self.stage.upload_texture(&entry, image)) {
            Ok(()) => {
                log::debug!("Texture {key} loaded from {}", entry.path);
                TextureStatus::Loaded
            }
            Err(e) => {
                log::warn!("Failed to load texture {key} from {}: {e:#}", entry.path);
                TextureStatus::Failed(format!("{e:#}"))
            }
        };
        self.texture_status.insert(entry.key, status);
    }

    pub fn handle_model(&mut self, mount: MountId, result: Result<ModelAsset, AssetError>) {
        if !self.accepts(mount, "model") {
            return;
        }
        let mut asset = match result {
            Ok(asset) => asset,
            Err(e) => {
                log::error!("An error happened loading the model: {e}");
                self.model_slot = ModelSlot::Failed(e.to_string());
                return;
            }
        };

        let summary = binder::bind_materials(&mut asset.root, &self.textures);
        let meshes = asset.root.mesh_count();
        log::info!(
            "Binding {} of {meshes} meshes to texture materials",
            summary.bound
        );
        self.model_slot = match self.stage.attach_model(asset) {
            Ok(()) => ModelSlot::Attached {
                meshes,
                bound: summary.bound,
            },
            Err(e) => {
                log::error!("An error happened loading the model: {e:#}");
                ModelSlot::Failed(format!("{e:#}"))
            }
        };
    }

    /// Applies a new viewport. Returns whether the surface was reconfigured.
    pub fn on_resize(&mut self, viewport: Viewport) -> bool {
        let Some(handler) = self.resize else {
            return false;
        };
        match handler.apply(viewport, &mut self.projection) {
            Some(size) => {
                self.stage.configure_surface(size);
                self.controls.set_viewport_height(size.physical().1);
                true
            }
            None => false,
        }
    }

    /// Forwards pointer input to the orbit controls.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        self.loop_state == LoopState::Running && self.controls.handle_window_event(event)
    }

    /// Runs one iteration of the render loop. `Ok(true)` asks for the next one.
    pub fn frame(&mut self) -> anyhow::Result<bool> {
        if self.loop_state == LoopState::Cancelled {
            return Ok(false);
        }
        self.controls.update(&mut self.camera);
        self.placeholder.advance();
        let frame = FrameState {
            camera: &self.camera,
            projection: &self.projection,
            placeholder: self.placeholder.transform(),
        };
        self.stage.draw(&frame)?;
        self.frames += 1;
        Ok(true)
    }

    /// Stops the loop, drops the resize handler and disposes the stage.
    /// Later calls do nothing.
    pub fn teardown(&mut self) {
        if self.loop_state == LoopState::Cancelled {
            return;
        }
        self.resize = None;
        self.loop_state = LoopState::Cancelled;
        self.stage.dispose();
        log::info!("Scene {} torn down after {} frames", self.mount_id, self.frames);
    }

    pub fn mount_id(&self) -> MountId {
        self.mount_id
    }

    pub fn stage(&self) -> &S {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut S {
        &mut self.stage
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn controls(&self) -> &OrbitControls {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut OrbitControls {
        &mut self.controls
    }

    pub fn textures(&self) -> &TextureLookup {
        &self.textures
    }

    pub fn texture_status(&self, key: &str) -> Option<&TextureStatus> {
        self.texture_status.get(key)
    }

    pub fn model_slot(&self) -> &ModelSlot {
        &self.model_slot
    }

    pub fn placeholder(&self) -> &Placeholder {
        &self.placeholder
    }

    pub fn loop_state(&self) -> LoopState {
        self.loop_state
    }

    pub fn is_resize_registered(&self) -> bool {
        self.resize.is_some()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}
