//! Scene configuration.
//!
//! [`SceneConfig::default`] describes the portfolio room as it ships. Every field
//! can be overridden from JSON by an embedder; missing fields fall back to the
//! defaults.

use anyhow::Context;
use serde::Deserialize;

use crate::data_structures::texture::TextureSettings;

/// One named texture of the texture map, e.g. `First -> /textures/TextureSet1.webp`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TextureSource {
    pub key: String,
    pub path: String,
}

impl TextureSource {
    pub fn new(key: &str, path: &str) -> Self {
        Self {
            key: key.to_string(),
            path: path.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            position: [0.0, 20.0, 100.0],
            target: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
        }
    }
}

/// Colours are given as `0xRRGGBB` in sRGB, like CSS.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AmbientLight {
    pub color: u32,
    pub intensity: f32,
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self {
            color: 0xffffff,
            intensity: 0.7,
        }
    }
}

/// A directional light shining from `position` towards `target`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DirectionalLight {
    pub color: u32,
    pub intensity: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            color: 0xffffff,
            intensity: 0.8,
            position: [10.0, 20.0, 10.0],
            target: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LightsConfig {
    pub ambient: AmbientLight,
    pub directional: DirectionalLight,
}

/// The spinning box that is visible while the room is still loading.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlaceholderConfig {
    pub size: [f32; 3],
    pub color: u32,
    /// Radians added to the x and y rotation every frame.
    pub spin: [f32; 2],
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            size: [1.0, 1.0, 1.0],
            color: 0x00ff00,
            spin: [0.01, 0.01],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub title: String,
    /// Id of the `<canvas>` the scene binds to on the web.
    pub canvas_id: String,
    /// Directory (native) or URL prefix (web) all asset paths are resolved against.
    pub asset_root: String,
    /// Location of the mesh decoder tools for compressed geometry.
    pub decoder_path: String,
    pub model_path: String,
    /// Ordered texture map. The order decides which key wins when a mesh name contains several.
    pub textures: Vec<TextureSource>,
    pub texture_settings: TextureSettings,
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub lights: LightsConfig,
    pub placeholder: PlaceholderConfig,
    pub antialias: bool,
    pub max_pixel_ratio: f64,
    pub clear_colour: [f64; 4],
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            title: "Room Portfolio".to_string(),
            canvas_id: "experience-canvas".to_string(),
            asset_root: default_asset_root(),
            decoder_path: "/draco/".to_string(),
            model_path: "/models/RoomPortfolio.glb".to_string(),
            textures: vec![
                TextureSource::new("First", "/textures/TextureSet1.webp"),
                TextureSource::new("Second", "/textures/TextureSet2.webp"),
                TextureSource::new("Third", "/textures/TextureSet3.webp"),
            ],
            texture_settings: TextureSettings::default(),
            camera: CameraConfig::default(),
            controls: ControlsConfig::default(),
            lights: LightsConfig::default(),
            placeholder: PlaceholderConfig::default(),
            antialias: true,
            max_pixel_ratio: 2.0,
            clear_colour: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn default_asset_root() -> String {
    "public".to_string()
}

// On the web everything is fetched from the site root
#[cfg(target_arch = "wasm32")]
fn default_asset_root() -> String {
    String::new()
}

impl SceneConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json).context("Invalid scene configuration")?;
        config.validate().context("Invalid scene configuration")?;
        Ok(config)
    }

    /// Rejects values the camera and controls cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let camera = &self.camera;
        anyhow::ensure!(
            camera.fov_y_degrees > 0.0 && camera.fov_y_degrees < 180.0,
            "camera.fov_y_degrees must be between 0 and 180, got {}",
            camera.fov_y_degrees
        );
        anyhow::ensure!(camera.near > 0.0, "camera.near must be positive, got {}", camera.near);
        anyhow::ensure!(
            camera.far > camera.near,
            "camera.far ({}) must be beyond camera.near ({})",
            camera.far,
            camera.near
        );

        let controls = &self.controls;
        anyhow::ensure!(
            controls.damping_factor > 0.0 && controls.damping_factor <= 1.0,
            "controls.damping_factor must be in (0, 1], got {}",
            controls.damping_factor
        );
        // NaN fails every comparison below
        anyhow::ensure!(
            controls.min_distance >= 0.0,
            "controls.min_distance must not be negative, got {}",
            controls.min_distance
        );
        anyhow::ensure!(
            controls.max_distance >= controls.min_distance,
            "controls.max_distance ({}) is below controls.min_distance ({})",
            controls.max_distance,
            controls.min_distance
        );

        anyhow::ensure!(
            self.max_pixel_ratio > 0.0,
            "max_pixel_ratio must be positive, got {}",
            self.max_pixel_ratio
        );
        Ok(())
    }

    pub fn clear_colour(&self) -> wgpu::Color {
        let [r, g, b, a] = self.clear_colour;
        wgpu::Color { r, g, b, a }
    }
}

/// Converts a `0xRRGGBB` sRGB colour into linear RGB, which is what the shaders light with.
pub fn linear_rgb(hex: u32) -> [f32; 3] {
    let channel = |shift: u32| {
        let c = ((hex >> shift) & 0xff) as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    [channel(16), channel(8), channel(0)]
}

/// Converts a `0xRRGGBB` colour into opaque RGBA bytes.
pub fn rgba8(hex: u32) -> [u8; 4] {
    [(hex >> 16) as u8, (hex >> 8) as u8, hex as u8, 255]
}
