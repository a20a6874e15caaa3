use std::collections::HashMap;

use room_portfolio::{
    binder::TextureEntry,
    bootstrap::{FrameState, Stage},
    config::{LightsConfig, SceneConfig, TextureSource},
    data_structures::asset::{AssetNode, MaterialData, MaterialRef, MeshData, ModelAsset, Shading, Side},
    viewport::{SurfaceSize, Viewport},
};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    ConfigureSurface(SurfaceSize),
    SetLights,
    RegisterTexture(String),
    UploadTexture(String),
    AddPlaceholder,
    AttachModel,
    Draw,
    Dispose,
}

/// What a texture-map key currently samples.
#[derive(Clone, Debug, PartialEq)]
pub enum TextureSlot {
    /// The 1x1 white texture every key starts with
    Placeholder,
    Loaded { path: String, width: u32, height: u32 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct DrawRecord {
    pub camera_position: [f32; 3],
    pub aspect: f32,
    pub placeholder_rotation: cgmath::Quaternion<f32>,
}

/// A stage that remembers every call instead of touching a GPU.
#[derive(Default)]
pub struct RecordingStage {
    pub calls: Vec<Call>,
    pub textures: HashMap<String, TextureSlot>,
    pub lights: Option<LightsConfig>,
    pub surface: Option<SurfaceSize>,
    pub placeholder: Option<ModelAsset>,
    pub attached: Vec<ModelAsset>,
    pub draws: Vec<DrawRecord>,
    pub disposed: bool,
    pub fail_draws: bool,
}

impl RecordingStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_draws() -> Self {
        Self {
            fail_draws: true,
            ..Default::default()
        }
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    /// The texture a mesh of an attached model samples, following its material.
    pub fn texture_of(&self, mesh_name: &str) -> Option<&TextureSlot> {
        self.attached.iter().find_map(|asset| {
            let mesh = asset.root.find_mesh(mesh_name)?;
            match &mesh.material {
                MaterialRef::Texture(key) => self.textures.get(key),
                MaterialRef::Embedded(_) => None,
            }
        })
    }
}

impl Stage for RecordingStage {
    fn configure_surface(&mut self, size: SurfaceSize) {
        self.surface = Some(size);
        self.calls.push(Call::ConfigureSurface(size));
    }

    fn set_lights(&mut self, lights: &LightsConfig) {
        self.lights = Some(lights.clone());
        self.calls.push(Call::SetLights);
    }

    fn register_texture(&mut self, entry: &TextureEntry) {
        self.textures
            .insert(entry.key.clone(), TextureSlot::Placeholder);
        self.calls.push(Call::RegisterTexture(entry.key.clone()));
    }

    fn upload_texture(&mut self, entry: &TextureEntry, image: image::DynamicImage) -> anyhow::Result<()> {
        self.textures.insert(
            entry.key.clone(),
            TextureSlot::Loaded {
                path: entry.path.clone(),
                width: image.width(),
                height: image.height(),
            },
        );
        self.calls.push(Call::UploadTexture(entry.key.clone()));
        Ok(())
    }

    fn add_placeholder(&mut self, placeholder: &ModelAsset) {
        self.placeholder = Some(placeholder.clone());
        self.calls.push(Call::AddPlaceholder);
    }

    fn attach_model(&mut self, model: ModelAsset) -> anyhow::Result<()> {
        self.attached.push(model);
        self.calls.push(Call::AttachModel);
        Ok(())
    }

    fn draw(&mut self, frame: &FrameState) -> anyhow::Result<()> {
        anyhow::ensure!(!self.fail_draws, "surface lost");
        self.draws.push(DrawRecord {
            camera_position: frame.camera.position.into(),
            aspect: frame.projection.aspect(),
            placeholder_rotation: frame.placeholder.rotation,
        });
        self.calls.push(Call::Draw);
        Ok(())
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.calls.push(Call::Dispose);
    }
}

pub fn config_with_textures(textures: &[(&str, &str)]) -> SceneConfig {
    SceneConfig {
        textures: textures
            .iter()
            .map(|(key, path)| TextureSource::new(key, path))
            .collect(),
        ..Default::default()
    }
}

pub fn viewport(width: u32, height: u32) -> Viewport {
    Viewport::new(width, height, 1.0)
}

pub fn image(width: u32, height: u32) -> image::DynamicImage {
    image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        width,
        height,
        image::Rgba([200, 100, 50, 255]),
    ))
}

/// A model whose root holds one single-triangle mesh per name, all using one embedded material.
pub fn model_with_meshes(names: &[&str]) -> ModelAsset {
    let meshes = names
        .iter()
        .map(|name| MeshData {
            name: name.to_string(),
            vertices: vec![Default::default(); 3],
            indices: vec![0, 1, 2],
            material: MaterialRef::Embedded(Some(0)),
        })
        .collect();
    ModelAsset {
        root: AssetNode {
            name: "Room".to_string(),
            meshes,
            ..Default::default()
        },
        materials: vec![MaterialData {
            name: "Original".to_string(),
            base_color: [1.0; 4],
            texture: None,
            shading: Shading::Standard,
            side: Side::Front,
        }],
    }
}

/// Builds minimal glTF documents in memory: every node instances the same triangle.
pub struct GlbBuilder {
    nodes: Vec<(String, Vec<usize>)>,
    required: Vec<String>,
    base_color: [f32; 4],
    texture: Option<image::RgbaImage>,
    inline_image: bool,
    double_sided: bool,
    mesh_name: String,
    primitives: usize,
    draco: Option<Vec<u8>>,
}

impl GlbBuilder {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            required: Vec::new(),
            base_color: [1.0; 4],
            texture: None,
            inline_image: false,
            double_sided: false,
            mesh_name: "Triangle".to_string(),
            primitives: 1,
            draco: None,
        }
    }

    pub fn node(mut self, name: &str, children: &[usize]) -> Self {
        self.nodes.push((name.to_string(), children.to_vec()));
        self
    }

    pub fn require_extension(mut self, extension: &str) -> Self {
        self.required.push(extension.to_string());
        self
    }

    pub fn base_color(mut self, base_color: [f32; 4]) -> Self {
        self.base_color = base_color;
        self
    }

    pub fn texture(mut self, texture: image::RgbaImage) -> Self {
        self.texture = Some(texture);
        self
    }

    /// Stores the texture as a `data:` URI instead of a buffer view.
    pub fn inline_image(mut self) -> Self {
        self.inline_image = true;
        self
    }

    pub fn double_sided(mut self) -> Self {
        self.double_sided = true;
        self
    }

    /// Names the one mesh every node points at and gives it `primitives` copies
    /// of the triangle.
    pub fn mesh(mut self, name: &str, primitives: usize) -> Self {
        self.mesh_name = name.to_string();
        self.primitives = primitives;
        self
    }

    /// Marks the primitives as Draco-compressed with `compressed` as payload.
    pub fn draco(mut self, compressed: &[u8]) -> Self {
        self.draco = Some(compressed.to_vec());
        self.required.push("KHR_draco_mesh_compression".to_string());
        self
    }

    fn png(&self) -> Option<Vec<u8>> {
        let texture = self.texture.as_ref()?;
        let mut png = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(texture.clone())
            .write_to(&mut png, image::ImageFormat::Png)
            .unwrap();
        Some(png.into_inner())
    }

    fn binary(&self) -> (Vec<u8>, Vec<serde_json::Value>) {
        let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let indices: [u16; 3] = [0, 1, 2];
        let mut bin: Vec<u8> = Vec::new();
        bin.extend_from_slice(bytemuck::cast_slice(&positions));
        bin.extend_from_slice(bytemuck::cast_slice(&indices));
        pad(&mut bin, 0);
        let mut views = vec![
            serde_json::json!({ "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 }),
            serde_json::json!({ "buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963 }),
        ];
        let mut append = |bin: &mut Vec<u8>, bytes: &[u8]| {
            views.push(serde_json::json!({
                "buffer": 0,
                "byteOffset": bin.len(),
                "byteLength": bytes.len(),
            }));
            bin.extend_from_slice(bytes);
            pad(bin, 0);
        };
        if let Some(compressed) = &self.draco {
            append(&mut bin, compressed);
        }
        if let Some(png) = self.png().filter(|_| !self.inline_image) {
            append(&mut bin, &png);
        }
        (bin, views)
    }

    fn json(&self, buffer: serde_json::Value, views: Vec<serde_json::Value>) -> serde_json::Value {
        let children: Vec<usize> = self.nodes.iter().flat_map(|(_, c)| c.clone()).collect();
        let roots: Vec<usize> = (0..self.nodes.len())
            .filter(|i| !children.contains(i))
            .collect();
        let nodes: Vec<serde_json::Value> = self
            .nodes
            .iter()
            .map(|(name, children)| {
                let mut node = serde_json::json!({ "name": name, "mesh": 0 });
                if !children.is_empty() {
                    node["children"] = serde_json::json!(children);
                }
                node
            })
            .collect();
        let mut primitive =
            serde_json::json!({ "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 });
        if self.draco.is_some() {
            primitive["extensions"] = serde_json::json!({
                "KHR_draco_mesh_compression": {
                    "bufferView": 2,
                    "attributes": { "POSITION": 0, "NORMAL": 1 },
                }
            });
        }
        let primitives = vec![primitive; self.primitives];
        let mut pbr = serde_json::json!({ "baseColorFactor": self.base_color });
        let mut json = serde_json::json!({
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "name": "Room", "nodes": roots }],
            "nodes": nodes,
            "meshes": [{ "name": self.mesh_name, "primitives": primitives }],
            "buffers": [buffer],
            "accessors": [
                {
                    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                    "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0],
                },
                { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" },
            ],
        });
        if let Some(png) = self.png() {
            pbr["baseColorTexture"] = serde_json::json!({ "index": 0 });
            let image = if self.inline_image {
                serde_json::json!({
                    "uri": format!("data:image/png;base64,{}", base64::encode(&png)),
                })
            } else {
                serde_json::json!({ "bufferView": views.len() - 1, "mimeType": "image/png" })
            };
            json["images"] = serde_json::json!([image]);
            json["textures"] = serde_json::json!([{ "source": 0 }]);
        }
        json["bufferViews"] = serde_json::json!(views);
        json["materials"] = serde_json::json!([{
            "name": "Embedded",
            "pbrMetallicRoughness": pbr,
            "doubleSided": self.double_sided,
        }]);
        if !self.required.is_empty() {
            json["extensionsUsed"] = serde_json::json!(self.required);
            json["extensionsRequired"] = serde_json::json!(self.required);
        }
        json
    }

    /// A self-contained GLB file.
    pub fn build(self) -> Vec<u8> {
        let (bin, views) = self.binary();
        let json = self.json(serde_json::json!({ "byteLength": bin.len() }), views);
        let mut json = serde_json::to_vec(&json).unwrap();
        pad(&mut json, b' ');

        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut glb = Vec::with_capacity(total);
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(total as u32).to_le_bytes());
        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"JSON");
        glb.extend_from_slice(&json);
        glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"BIN\0");
        glb.extend_from_slice(&bin);
        glb
    }

    /// A `.gltf` JSON document plus the external buffer it references as `uri`.
    pub fn build_split(self, uri: &str) -> (Vec<u8>, Vec<u8>) {
        let (bin, views) = self.binary();
        let json = self.json(
            serde_json::json!({ "byteLength": bin.len(), "uri": uri }),
            views,
        );
        (serde_json::to_vec(&json).unwrap(), bin)
    }

    /// A `.gltf` JSON document with its buffer inlined as a base64 `data:` URI.
    pub fn build_embedded(self) -> Vec<u8> {
        let (bin, views) = self.binary();
        let uri = format!("data:application/octet-stream;base64,{}", base64::encode(&bin));
        let json = self.json(
            serde_json::json!({ "byteLength": bin.len(), "uri": uri }),
            views,
        );
        serde_json::to_vec(&json).unwrap()
    }
}

fn pad(bytes: &mut Vec<u8>, with: u8) {
    while bytes.len() % 4 != 0 {
        bytes.push(with);
    }
}
