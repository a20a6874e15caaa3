//! Loading of models and textures from the site root.
//!
//! Everything here is CPU-only: the loaders produce [`ModelAsset`]s and decoded
//! images which the stage uploads later. That split lets the same code run on a
//! tokio worker natively and inside a browser task on the web.

use std::{borrow::Cow, collections::HashMap};

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;

use crate::data_structures::asset::{AssetNode, MaterialData, ModelAsset, Shading, Side};

pub mod draco;
pub mod mesh;
pub mod texture;

pub use draco::{DecodedPrimitive, MeshDecoder};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

/// Ways a model load can fail.
#[derive(Error, Debug)]
pub enum AssetError {
    /// The file could not be read or downloaded
    #[error("Failed to fetch {path}: {source}")]
    Fetch { path: String, source: BoxError },

    /// The bytes are not a valid glTF/GLB document
    #[error("Failed to parse {path}: {source}")]
    Parse { path: String, source: BoxError },

    /// Geometry is compressed and no decoder is available
    #[error("{path} requires {DRACO_EXTENSION}, decoder expected at {decoder_path}")]
    UnsupportedCompression { path: String, decoder_path: String },

    /// Compressed geometry could not be decoded
    #[error("Failed to decode compressed geometry of {path}: {source}")]
    Decode { path: String, source: BoxError },

    /// A buffer referenced by the document is not available
    #[error("Buffer {index} of {path} is not available")]
    MissingBuffer { path: String, index: usize },

    /// An embedded image could not be decoded
    #[error("Failed to decode image {name} of {path}: {source}")]
    Image {
        path: String,
        name: String,
        source: BoxError,
    },
}

#[cfg(target_arch = "wasm32")]
fn format_url(root: &str, file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().context("No window")?;
    let origin = window
        .location()
        .origin()
        .map_err(|e| anyhow::anyhow!("No origin: {e:?}"))?;
    let root = root.trim_matches('/');
    let base = if root.is_empty() {
        format!("{origin}/")
    } else {
        format!("{origin}/{root}/")
    };
    let base = reqwest::Url::parse(&base)?;
    Ok(base.join(file_name.trim_start_matches('/'))?)
}

/// Reads `file_name` relative to `root`. Paths starting with `/` are still
/// treated as relative to the root.
pub async fn load_binary(root: &str, file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(root, file_name)?;
        reqwest::get(url)
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = std::path::Path::new(root).join(file_name.trim_start_matches('/'));
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?
    };

    Ok(data)
}

/// Fetches a glTF/GLB file plus any external buffers and images it references.
///
/// On the web, compressed geometry is decoded with the Draco decoder found under
/// `decoder_path`. Natively it fails with [`AssetError::UnsupportedCompression`].
pub async fn load_model_gltf(
    root: &str,
    path: &str,
    decoder_path: &str,
) -> Result<ModelAsset, AssetError> {
    let bytes = load_binary(root, path)
        .await
        .map_err(|e| AssetError::Fetch {
            path: path.to_string(),
            source: e.into(),
        })?;
    let document = read_document(&bytes, path)?;

    let fetches = external_uris(&document.gltf).into_iter().map(|uri| async move {
        let resolved = resolve_uri(path, &uri);
        match load_binary(root, &resolved).await {
            Ok(data) => Ok((uri, data)),
            Err(e) => Err(AssetError::Fetch {
                path: resolved,
                source: e.into(),
            }),
        }
    });
    let external: HashMap<String, Vec<u8>> = futures::future::try_join_all(fetches)
        .await?
        .into_iter()
        .collect();

    #[cfg(target_arch = "wasm32")]
    let decoder = if document.is_compressed() {
        let decoder = draco::JsDracoDecoder::load(root, decoder_path)
            .await
            .map_err(|e| AssetError::Decode {
                path: path.to_string(),
                source: e.into(),
            })?;
        Some(decoder)
    } else {
        None
    };
    #[cfg(target_arch = "wasm32")]
    let decoder = decoder.as_ref().map(|d| d as &dyn MeshDecoder);
    #[cfg(not(target_arch = "wasm32"))]
    let decoder: Option<&dyn MeshDecoder> = None;

    build_asset(&document, path, decoder_path, decoder, &external)
}

/// Parses an in-memory glTF/GLB. `external` maps the URIs the document
/// references to their contents; `data:` URIs are decoded in place.
pub fn parse_model(
    bytes: &[u8],
    path: &str,
    decoder_path: &str,
    external: &HashMap<String, Vec<u8>>,
) -> Result<ModelAsset, AssetError> {
    let document = read_document(bytes, path)?;
    build_asset(&document, path, decoder_path, None, external)
}

/// Like [`parse_model`], decoding compressed primitives with `decoder`.
pub fn parse_model_with_decoder(
    bytes: &[u8],
    path: &str,
    decoder: &dyn MeshDecoder,
    external: &HashMap<String, Vec<u8>>,
) -> Result<ModelAsset, AssetError> {
    let document = read_document(bytes, path)?;
    build_asset(&document, path, "", Some(decoder), external)
}

#[derive(Deserialize)]
struct RequiredExtensions {
    #[serde(default, rename = "extensionsRequired")]
    extensions_required: Vec<String>,
}

struct Document {
    gltf: gltf::Gltf,
    requires_draco: bool,
    compressed: draco::CompressedPrimitives,
}

impl Document {
    fn is_compressed(&self) -> bool {
        self.requires_draco || !self.compressed.is_empty()
    }
}

fn read_document(bytes: &[u8], path: &str) -> Result<Document, AssetError> {
    let parse_error = |source: BoxError| AssetError::Parse {
        path: path.to_string(),
        source,
    };
    let json = if bytes.starts_with(b"glTF") {
        gltf::Glb::from_slice(bytes)
            .map_err(|e| parse_error(e.into()))?
            .json
            .into_owned()
    } else {
        bytes.to_vec()
    };
    let required: RequiredExtensions =
        serde_json::from_slice(&json).map_err(|e| parse_error(e.into()))?;
    let requires_draco = required
        .extensions_required
        .iter()
        .any(|ext| ext == DRACO_EXTENSION);
    let compressed = draco::compressed_primitives(&json).map_err(|e| parse_error(e.into()))?;

    // Validation rejects required extensions it does not know about
    let gltf = if requires_draco {
        gltf::Gltf::from_slice_without_validation(bytes)
    } else {
        gltf::Gltf::from_slice(bytes)
    }
    .map_err(|e| parse_error(e.into()))?;

    Ok(Document {
        gltf,
        requires_draco,
        compressed,
    })
}

fn external_uris(gltf: &gltf::Gltf) -> Vec<String> {
    let buffers = gltf.buffers().filter_map(|buffer| match buffer.source() {
        gltf::buffer::Source::Uri(uri) => Some(uri.to_string()),
        gltf::buffer::Source::Bin => None,
    });
    let images = gltf.images().filter_map(|image| match image.source() {
        gltf::image::Source::Uri { uri, .. } => Some(uri.to_string()),
        gltf::image::Source::View { .. } => None,
    });
    let mut uris: Vec<String> = buffers
        .chain(images)
        .filter(|uri| !uri.starts_with("data:"))
        .collect();
    uris.sort_unstable();
    uris.dedup();
    uris
}

/// Resolves a URI from inside a document against the document's directory.
fn resolve_uri(model_path: &str, uri: &str) -> String {
    match model_path.rfind('/') {
        Some(idx) => format!("{}/{}", &model_path[..idx], uri),
        None => uri.to_string(),
    }
}

/// Contents of a `data:[<mime type>][;base64],<data>` URI, or `None` for any
/// other kind of URI.
fn data_uri(uri: &str) -> Option<Result<(Option<&str>, Vec<u8>), BoxError>> {
    let rest = uri.strip_prefix("data:")?;
    let Some((header, payload)) = rest.split_once(',') else {
        return Some(Err("data URI without a payload".into()));
    };
    let (header, encoded) = match header.strip_suffix(";base64") {
        Some(header) => (header, true),
        None => (header, false),
    };
    let mime_type = header.split(';').next().filter(|mt| !mt.is_empty());
    let bytes = if encoded {
        match base64::decode(payload) {
            Ok(bytes) => bytes,
            Err(e) => return Some(Err(e.into())),
        }
    } else {
        payload.as_bytes().to_vec()
    };
    Some(Ok((mime_type, bytes)))
}

fn build_asset(
    document: &Document,
    path: &str,
    decoder_path: &str,
    decoder: Option<&dyn MeshDecoder>,
    external: &HashMap<String, Vec<u8>>,
) -> Result<ModelAsset, AssetError> {
    let gltf = &document.gltf;
    if document.is_compressed() && decoder.is_none() {
        return Err(AssetError::UnsupportedCompression {
            path: path.to_string(),
            decoder_path: decoder_path.to_string(),
        });
    }

    // Load buffers
    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        let missing = || AssetError::MissingBuffer {
            path: path.to_string(),
            index: buffer.index(),
        };
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => gltf.blob.clone().ok_or_else(missing)?,
            gltf::buffer::Source::Uri(uri) => match data_uri(uri) {
                Some(decoded) => {
                    decoded
                        .map_err(|source| AssetError::Parse {
                            path: path.to_string(),
                            source,
                        })?
                        .1
                }
                None => external.get(uri).cloned().ok_or_else(missing)?,
            },
        };
        buffer_data.push(data);
    }

    let decoded = match decoder {
        Some(decoder) => decode_primitives(gltf, &document.compressed, &buffer_data, path, decoder)?,
        None => HashMap::new(),
    };

    // Load materials
    let mut materials = Vec::new();
    for material in gltf.materials() {
        materials.push(load_material(&material, &buffer_data, path, external)?);
    }

    let mut nodes = mesh::NodeLoader::new(&buffer_data, &decoded);
    let scene = gltf.default_scene().or_else(|| gltf.scenes().next());
    let root = match scene {
        Some(scene) => AssetNode::group(
            scene.name().unwrap_or("Scene"),
            scene.nodes().map(|node| nodes.load_node(node)).collect(),
        ),
        None => {
            log::warn!("{path} contains no scene");
            AssetNode::group("Scene", Vec::new())
        }
    };

    log::info!(
        "Loaded {path}: {} meshes, {} materials",
        root.mesh_count(),
        materials.len()
    );
    Ok(ModelAsset { root, materials })
}

fn decode_primitives(
    gltf: &gltf::Gltf,
    compressed: &draco::CompressedPrimitives,
    buffer_data: &[Vec<u8>],
    path: &str,
    decoder: &dyn MeshDecoder,
) -> Result<HashMap<(usize, usize), draco::DecodedPrimitive>, AssetError> {
    let mut decoded = HashMap::new();
    for (&(mesh, primitive), extension) in compressed {
        let decode_error = |source: BoxError| AssetError::Decode {
            path: path.to_string(),
            source: format!("mesh {mesh} primitive {primitive}: {source}").into(),
        };
        let view = gltf
            .views()
            .nth(extension.buffer_view)
            .ok_or_else(|| decode_error(format!("no buffer view {}", extension.buffer_view).into()))?;
        let bytes = buffer_data
            .get(view.buffer().index())
            .and_then(|buffer| buffer.get(view.offset()..view.offset() + view.length()))
            .ok_or_else(|| decode_error(format!("buffer view {} out of range", view.index()).into()))?;

        let primitive_data = decoder
            .decode(bytes, &extension.attributes)
            .and_then(|data| draco::check_decoded(&data).map(|_| data))
            .map_err(|e| decode_error(e.into()))?;
        decoded.insert((mesh, primitive), primitive_data);
    }
    if !decoded.is_empty() {
        log::debug!("Decoded {} compressed primitives of {path}", decoded.len());
    }
    Ok(decoded)
}

fn load_material(
    material: &gltf::Material,
    buffer_data: &[Vec<u8>],
    path: &str,
    external: &HashMap<String, Vec<u8>>,
) -> Result<MaterialData, AssetError> {
    let name = material
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("material_{}", material.index().unwrap_or_default()));
    let pbr = material.pbr_metallic_roughness();
    let base_color = pbr.base_color_factor();

    let texture = match pbr.base_color_texture() {
        Some(info) => {
            let image_error = |source: BoxError| AssetError::Image {
                path: path.to_string(),
                name: name.clone(),
                source,
            };
            let (bytes, mime_type) = match info.texture().source().source() {
                gltf::image::Source::View { view, mime_type } => {
                    let buffer = buffer_data.get(view.buffer().index()).ok_or_else(|| {
                        AssetError::MissingBuffer {
                            path: path.to_string(),
                            index: view.buffer().index(),
                        }
                    })?;
                    let end = view.offset() + view.length();
                    let bytes = buffer.get(view.offset()..end).ok_or_else(|| {
                        image_error(format!("buffer view {} out of range", view.index()).into())
                    })?;
                    (Cow::Borrowed(bytes), Some(mime_type))
                }
                gltf::image::Source::Uri { uri, mime_type } => match data_uri(uri) {
                    Some(decoded) => {
                        let (data_mime_type, bytes) = decoded.map_err(image_error)?;
                        (Cow::Owned(bytes), mime_type.or(data_mime_type))
                    }
                    None => {
                        let bytes = external.get(uri).ok_or_else(|| {
                            image_error(format!("image {uri} was not fetched").into())
                        })?;
                        (Cow::Borrowed(bytes.as_slice()), mime_type)
                    }
                },
            };
            let format = mime_type.and_then(|mt| mt.split('/').next_back());
            let img = texture::decode_image(&bytes, format).map_err(|e| image_error(e.into()))?;
            Some(tint(img.to_rgba8(), base_color))
        }
        None => None,
    };

    Ok(MaterialData {
        name,
        base_color,
        texture,
        shading: if material.unlit() {
            Shading::Unlit
        } else {
            Shading::Standard
        },
        side: if material.double_sided() {
            Side::Double
        } else {
            Side::Front
        },
    })
}

/// Multiplies every texel by the material's base colour factor.
fn tint(mut img: image::RgbaImage, factor: [f32; 4]) -> image::RgbaImage {
    if factor == [1.0; 4] {
        return img;
    }
    for pixel in img.pixels_mut() {
        for (channel, f) in pixel.0.iter_mut().zip(factor) {
            *channel = (*channel as f32 * f.clamp(0.0, 1.0)).round() as u8;
        }
    }
    img
}
