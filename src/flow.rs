//! Application event loop.
//!
//! Drives a [`SceneBootstrapper`] from winit. Asset requests run on a tokio
//! runtime natively and as browser tasks on the web; their results come back
//! to the loop as [`SceneEvent`]s, so the scene is only ever touched from the
//! event-loop thread.
//!
//! # Lifecycle
//!
//! 1. `resumed` creates the window (or binds the canvas) and the GPU context
//! 2. The scene is mounted and its asset requests are dispatched
//! 3. Every `RedrawRequested` runs one frame and schedules the next
//! 4. Close or unmount tears the scene down

use std::sync::Arc;

use instant::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    bootstrap::{AssetRequest, LoopState, MountId, SceneBootstrapper},
    config::SceneConfig,
    context::Context,
    data_structures::asset::ModelAsset,
    resources::{self, AssetError},
    viewport::Viewport,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub enum SceneEvent {
    /// The GPU context finished initialising on the web.
    #[cfg(target_arch = "wasm32")]
    Initialized { context: Context },
    TextureLoaded {
        mount: MountId,
        key: String,
        result: anyhow::Result<image::DynamicImage>,
    },
    ModelLoaded {
        mount: MountId,
        result: Result<ModelAsset, AssetError>,
    },
    /// Tear the scene down and leave the event loop.
    #[allow(dead_code)]
    Unmount,
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<SceneEvent>,
    config: SceneConfig,
    window: Option<Arc<Window>>,
    scene: Option<SceneBootstrapper<Context>>,
}

impl App {
    fn new(event_loop: &EventLoop<SceneEvent>, config: SceneConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            config,
            window: None,
            scene: None,
        })
    }

    fn start(&mut self, context: Context) {
        let window = context.window().clone();
        let viewport = Viewport::from_physical(window.inner_size(), window.scale_factor());
        let (scene, requests) = SceneBootstrapper::mount(&self.config, context, viewport);
        requests
            .into_iter()
            .for_each(|request| self.dispatch(request));
        self.scene = Some(scene);
        window.request_redraw();
    }

    /// Runs an asset request in the background and posts its result to the loop.
    fn dispatch(&self, request: AssetRequest) {
        let proxy = self.proxy.clone();
        let root = self.config.asset_root.clone();
        let fut = async move {
            let started = Instant::now();
            let path = request.path().to_string();
            let event = match request {
                AssetRequest::Texture { mount, entry } => {
                    let result = resources::texture::load_texture_image(&root, &entry).await;
                    SceneEvent::TextureLoaded {
                        mount,
                        key: entry.key,
                        result,
                    }
                }
                AssetRequest::Model {
                    mount,
                    path,
                    decoder_path,
                } => {
                    let result = resources::load_model_gltf(&root, &path, &decoder_path).await;
                    SceneEvent::ModelLoaded { mount, result }
                }
            };
            log::debug!("Fetched {path} in {:?}", started.elapsed());
            if proxy.send_event(event).is_err() {
                log::debug!("Event loop closed before {path} finished loading");
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            self.async_runtime.spawn(fut);
        }

        #[cfg(target_arch = "wasm32")]
        {
            wasm_bindgen_futures::spawn_local(fut);
        }
    }
}

impl ApplicationHandler<SceneEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title(&self.config.title);

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            let canvas = web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(&self.config.canvas_id));
            match canvas {
                Some(canvas) => {
                    window_attributes = window_attributes.with_canvas(Some(canvas.unchecked_into()));
                }
                None => {
                    log::warn!(
                        "No element with id {:?}, appending a new canvas",
                        self.config.canvas_id
                    );
                    window_attributes = window_attributes.with_append(true);
                }
            }
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Unable to create a window: {e}");
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self
                .async_runtime
                .block_on(Context::new(window, &self.config))
            {
                Ok(context) => self.start(context),
                Err(e) => {
                    log::error!("Cannot create the GPU context: {e:#}");
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            let config = self.config.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match Context::new(window, &config).await {
                    Ok(context) => {
                        if proxy
                            .send_event(SceneEvent::Initialized { context })
                            .is_err()
                        {
                            log::warn!("Scene was unmounted before the GPU was ready");
                        }
                    }
                    Err(e) => log::error!("Cannot create the GPU context: {e:#}"),
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: SceneEvent) {
        match event {
            #[cfg(target_arch = "wasm32")]
            SceneEvent::Initialized { context } => {
                // Unmounted while the GPU was still initialising
                if self.window.is_none() {
                    return;
                }
                self.start(context);
            }
            SceneEvent::TextureLoaded {
                mount,
                key,
                result,
            } => {
                if let Some(scene) = &mut self.scene {
                    scene.handle_texture(mount, &key, result);
                }
            }
            SceneEvent::ModelLoaded { mount, result } => {
                if let Some(scene) = &mut self.scene {
                    scene.handle_model(mount, result);
                }
            }
            SceneEvent::Unmount => {
                if let Some(scene) = &mut self.scene {
                    scene.teardown();
                }
                self.window = None;
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let (Some(scene), Some(window)) = (&mut self.scene, &self.window) else {
            if let WindowEvent::CloseRequested = event {
                event_loop.exit();
            }
            return;
        };

        scene.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                scene.teardown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                scene.on_resize(Viewport::from_physical(size, window.scale_factor()));
            }
            WindowEvent::RedrawRequested => match scene.frame() {
                Ok(true) => window.request_redraw(),
                Ok(false) => (),
                Err(e) => {
                    match e.downcast_ref::<wgpu::SurfaceError>() {
                        // Reconfigure the surface if it's lost or outdated
                        Some(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            scene.stage_mut().reconfigure();
                        }
                        _ => log::error!("Unable to render {e:#}"),
                    }
                    if scene.loop_state() == LoopState::Running {
                        window.request_redraw();
                    }
                }
            },
            _ => {}
        }
    }
}

/// Opens a window and runs the scene until it is closed.
#[cfg(not(target_arch = "wasm32"))]
pub fn run(config: SceneConfig) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let event_loop: EventLoop<SceneEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}

/// Unmounts the scene it was returned for.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub struct SceneHandle {
    proxy: EventLoopProxy<SceneEvent>,
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
impl SceneHandle {
    /// Stops the render loop, drops the resize listener and releases GPU resources.
    pub fn unmount(&self) {
        if self.proxy.send_event(SceneEvent::Unmount).is_err() {
            log::debug!("Scene is already unmounted");
        }
    }
}

/// Mounts the scene on its canvas and returns immediately.
#[cfg(target_arch = "wasm32")]
pub fn spawn(config: SceneConfig) -> anyhow::Result<SceneHandle> {
    use winit::platform::web::EventLoopExtWebSys;

    // A remount after unmount finds the logger already installed
    let _ = console_log::init_with_level(log::Level::Info);

    let event_loop: EventLoop<SceneEvent> = EventLoop::with_user_event().build()?;
    let app = App::new(&event_loop, config)?;
    let proxy = app.proxy.clone();
    event_loop.spawn_app(app);

    Ok(SceneHandle { proxy })
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn start() -> Result<SceneHandle, JsValue> {
    spawn(SceneConfig::default()).map_err(|e| JsValue::from_str(&format!("{e:#}")))
}

/// Like [`start`], with fields of the default configuration overridden from JSON.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn start_with_config(json: &str) -> Result<SceneHandle, JsValue> {
    SceneConfig::from_json(json)
        .and_then(spawn)
        .map_err(|e| JsValue::from_str(&format!("{e:#}")))
}
