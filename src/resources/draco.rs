//! Geometry compressed with `KHR_draco_mesh_compression`.
//!
//! The document only says which buffer view holds a primitive's compressed
//! bytes and which Draco attribute id carries each vertex attribute. Decoding is
//! left to a [`MeshDecoder`]. On the web that is the Draco decoder module served
//! from the configured decoder path.

use std::collections::HashMap;

use serde::Deserialize;

pub const POSITION: &str = "POSITION";
pub const NORMAL: &str = "NORMAL";
pub const TEXCOORD_0: &str = "TEXCOORD_0";

/// Vertex data of one decoded primitive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedPrimitive {
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub tex_coords: Option<Vec<[f32; 2]>>,
    pub indices: Vec<u32>,
}

/// Decodes Draco-compressed primitives.
pub trait MeshDecoder {
    /// `attributes` maps glTF attribute semantics such as `POSITION` to the
    /// Draco unique attribute ids inside `compressed`.
    fn decode(
        &self,
        compressed: &[u8],
        attributes: &HashMap<String, u32>,
    ) -> anyhow::Result<DecodedPrimitive>;
}

/// The extension object of a compressed primitive.
#[derive(Clone, Debug, Deserialize)]
pub struct CompressedPrimitive {
    #[serde(rename = "bufferView")]
    pub buffer_view: usize,
    pub attributes: HashMap<String, u32>,
}

/// Compressed primitives keyed by mesh index and primitive index.
pub type CompressedPrimitives = HashMap<(usize, usize), CompressedPrimitive>;

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    meshes: Vec<Mesh>,
}

#[derive(Deserialize)]
struct Mesh {
    #[serde(default)]
    primitives: Vec<Primitive>,
}

#[derive(Deserialize)]
struct Primitive {
    #[serde(default)]
    extensions: Extensions,
}

#[derive(Default, Deserialize)]
struct Extensions {
    #[serde(rename = "KHR_draco_mesh_compression")]
    draco: Option<CompressedPrimitive>,
}

/// Finds every compressed primitive in a glTF JSON chunk.
pub fn compressed_primitives(json: &[u8]) -> serde_json::Result<CompressedPrimitives> {
    let document: Document = serde_json::from_slice(json)?;
    Ok(document
        .meshes
        .into_iter()
        .enumerate()
        .flat_map(|(mesh, m)| {
            m.primitives
                .into_iter()
                .enumerate()
                .filter_map(move |(primitive, p)| Some(((mesh, primitive), p.extensions.draco?)))
        })
        .collect())
}

/// Checks that a decoded primitive is usable before it becomes a mesh.
pub fn check_decoded(decoded: &DecodedPrimitive) -> anyhow::Result<()> {
    let count = decoded.positions.len();
    anyhow::ensure!(count > 0, "decoded primitive has no positions");
    if let Some(normals) = &decoded.normals {
        anyhow::ensure!(normals.len() == count, "{} normals for {count} positions", normals.len());
    }
    if let Some(tex_coords) = &decoded.tex_coords {
        anyhow::ensure!(
            tex_coords.len() == count,
            "{} texture coordinates for {count} positions",
            tex_coords.len()
        );
    }
    if let Some(index) = decoded.indices.iter().find(|&&i| i as usize >= count) {
        anyhow::bail!("index {index} out of range for {count} positions");
    }
    Ok(())
}

#[cfg(target_arch = "wasm32")]
pub use web::JsDracoDecoder;

#[cfg(target_arch = "wasm32")]
mod web {
    use std::collections::HashMap;

    use js_sys::{Array, Float32Array, Function, Object, Promise, Reflect, Uint32Array, Uint8Array};
    use wasm_bindgen::{JsCast, JsValue, closure::Closure};
    use wasm_bindgen_futures::JsFuture;

    use super::{DecodedPrimitive, MeshDecoder, NORMAL, POSITION, TEXCOORD_0};
    use crate::resources::load_binary;

    const WRAPPER: &str = "draco_wasm_wrapper.js";
    const BINARY: &str = "draco_decoder.wasm";

    fn js_error(e: JsValue) -> anyhow::Error {
        anyhow::anyhow!("{}", e.as_string().unwrap_or_else(|| format!("{e:?}")))
    }

    fn get(target: &JsValue, key: &str) -> anyhow::Result<JsValue> {
        Reflect::get(target, &JsValue::from_str(key)).map_err(js_error)
    }

    fn call(target: &JsValue, method: &str, args: &[JsValue]) -> anyhow::Result<JsValue> {
        let function: Function = get(target, method)?
            .dyn_into()
            .map_err(|_| anyhow::anyhow!("{method} is not a function"))?;
        Reflect::apply(&function, target, &args.iter().collect::<Array>()).map_err(js_error)
    }

    fn construct(module: &JsValue, class: &str, args: &[JsValue]) -> anyhow::Result<JsValue> {
        let constructor: Function = get(module, class)?
            .dyn_into()
            .map_err(|_| anyhow::anyhow!("{class} is not a constructor"))?;
        Reflect::construct(&constructor, &args.iter().collect::<Array>()).map_err(js_error)
    }

    fn number(value: JsValue) -> anyhow::Result<u32> {
        value
            .as_f64()
            .map(|n| n as u32)
            .ok_or_else(|| anyhow::anyhow!("expected a number, got {value:?}"))
    }

    /// The Emscripten Draco decoder, instantiated from `draco_wasm_wrapper.js`
    /// and `draco_decoder.wasm` under the decoder path.
    pub struct JsDracoDecoder {
        module: JsValue,
    }

    impl JsDracoDecoder {
        pub async fn load(root: &str, decoder_path: &str) -> anyhow::Result<Self> {
            let dir = decoder_path.trim_end_matches('/');
            let wrapper = load_binary(root, &format!("{dir}/{WRAPPER}")).await?;
            let binary = load_binary(root, &format!("{dir}/{BINARY}")).await?;
            let source = String::from_utf8(wrapper)?;

            let factory: Function = Function::new_no_args(&format!(
                "{source}\nreturn DracoDecoderModule;"
            ))
            .call0(&JsValue::UNDEFINED)
            .map_err(js_error)?
            .dyn_into()
            .map_err(|_| anyhow::anyhow!("{WRAPPER} does not define DracoDecoderModule"))?;

            let config = Object::new();
            Reflect::set(
                &config,
                &"wasmBinary".into(),
                &Uint8Array::from(binary.as_slice()),
            )
            .map_err(js_error)?;

            // The module object is a thenable that resolves to itself, so it is
            // handed over wrapped from the load callback
            let mut started = Ok(());
            let loaded = Promise::new(&mut |resolve, _reject| {
                let on_loaded = Closure::once_into_js(move |module: JsValue| {
                    let wrapped = Object::new();
                    let _ = Reflect::set(&wrapped, &"module".into(), &module);
                    let _ = resolve.call1(&JsValue::UNDEFINED, &wrapped);
                });
                started = Reflect::set(&config, &"onModuleLoaded".into(), &on_loaded)
                    .and_then(|_| factory.call1(&JsValue::UNDEFINED, &config))
                    .map(|_| ());
            });
            started.map_err(js_error)?;
            let module = get(&JsFuture::from(loaded).await.map_err(js_error)?, "module")?;
            log::info!("Draco decoder loaded from {dir}");
            Ok(Self { module })
        }

        fn read_floats(
            &self,
            decoder: &JsValue,
            mesh: &JsValue,
            id: u32,
        ) -> anyhow::Result<Vec<f32>> {
            let draco = &self.module;
            let attribute = call(decoder, "GetAttributeByUniqueId", &[mesh.clone(), id.into()])?;
            let components = number(call(&attribute, "num_components", &[])?)?;
            let points = number(call(mesh, "num_points", &[])?)?;
            let len = components * points;
            let bytes = len * 4;
            let ptr = call(draco, "_malloc", &[bytes.into()])?;
            let read = call(
                decoder,
                "GetAttributeDataArrayForAllPoints",
                &[
                    mesh.clone(),
                    attribute,
                    get(draco, "DT_FLOAT32")?,
                    bytes.into(),
                    ptr.clone(),
                ],
            )
            .and_then(|_| {
                let heap = get(&get(draco, "HEAPF32")?, "buffer")?;
                Ok(Float32Array::new_with_byte_offset_and_length(&heap, number(ptr.clone())?, len).to_vec())
            });
            call(draco, "_free", &[ptr])?;
            read
        }

        fn read_indices(&self, decoder: &JsValue, mesh: &JsValue) -> anyhow::Result<Vec<u32>> {
            let draco = &self.module;
            let len = number(call(mesh, "num_faces", &[])?)? * 3;
            let bytes = len * 4;
            let ptr = call(draco, "_malloc", &[bytes.into()])?;
            let read = call(
                decoder,
                "GetTrianglesUInt32Array",
                &[mesh.clone(), bytes.into(), ptr.clone()],
            )
            .and_then(|_| {
                let heap = get(&get(draco, "HEAPU32")?, "buffer")?;
                Ok(Uint32Array::new_with_byte_offset_and_length(&heap, number(ptr.clone())?, len).to_vec())
            });
            call(draco, "_free", &[ptr])?;
            read
        }

        fn decode_mesh(
            &self,
            decoder: &JsValue,
            mesh: &JsValue,
            attributes: &HashMap<String, u32>,
        ) -> anyhow::Result<DecodedPrimitive> {
            let Some(&position_id) = attributes.get(POSITION) else {
                anyhow::bail!("compressed primitive has no {POSITION} attribute");
            };
            let positions = self.read_floats(decoder, mesh, position_id)?;
            let normals = match attributes.get(NORMAL) {
                Some(&id) => Some(self.read_floats(decoder, mesh, id)?),
                None => None,
            };
            let tex_coords = match attributes.get(TEXCOORD_0) {
                Some(&id) => Some(self.read_floats(decoder, mesh, id)?),
                None => None,
            };
            Ok(DecodedPrimitive {
                positions: positions.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect(),
                normals: normals.map(|n| n.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()),
                tex_coords: tex_coords.map(|t| t.chunks_exact(2).map(|c| [c[0], c[1]]).collect()),
                indices: self.read_indices(decoder, mesh)?,
            })
        }
    }

    impl MeshDecoder for JsDracoDecoder {
        fn decode(
            &self,
            compressed: &[u8],
            attributes: &HashMap<String, u32>,
        ) -> anyhow::Result<DecodedPrimitive> {
            let draco = &self.module;
            let decoder = construct(draco, "Decoder", &[])?;
            let buffer = construct(draco, "DecoderBuffer", &[])?;
            let mesh = construct(draco, "Mesh", &[])?;

            let decoded = (|| {
                let data = js_sys::Int8Array::from(bytemuck::cast_slice::<u8, i8>(compressed));
                call(&buffer, "Init", &[data.into(), (compressed.len() as u32).into()])?;
                let status = call(&decoder, "DecodeBufferToMesh", &[buffer.clone(), mesh.clone()])?;
                if !call(&status, "ok", &[])?.is_truthy() || number(get(&mesh, "ptr")?)? == 0 {
                    let message = call(&status, "error_msg", &[])?;
                    anyhow::bail!("Draco decoding failed: {}", message.as_string().unwrap_or_default());
                }
                self.decode_mesh(&decoder, &mesh, attributes)
            })();

            for object in [mesh, buffer, decoder] {
                call(draco, "destroy", &[object])?;
            }
            decoded
        }
    }
}
