use anyhow::Context;

use crate::{binder::TextureEntry, resources::load_binary};

/// Layout shared by every material: one colour texture and its sampler.
pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("material_bind_group_layout"),
    })
}

/// Decodes image file contents. `format` is an extension or mime subtype hint
/// such as `"webp"`; without one the format is guessed from the bytes.
pub fn decode_image(bytes: &[u8], format: Option<&str>) -> anyhow::Result<image::DynamicImage> {
    let img = match format.and_then(image::ImageFormat::from_extension) {
        Some(format) => image::load_from_memory_with_format(bytes, format)?,
        None => image::load_from_memory(bytes)?,
    };
    Ok(img)
}

/// Fetches and decodes the texture behind a lookup entry, applying its settings.
pub async fn load_texture_image(
    root: &str,
    entry: &TextureEntry,
) -> anyhow::Result<image::DynamicImage> {
    let data = load_binary(root, &entry.path).await?;
    let format = entry.path.rsplit('.').next();
    let img = decode_image(&data, format)
        .with_context(|| format!("Failed to decode texture {}", entry.path))?;
    Ok(entry.settings.prepare(img))
}

/// Shrinks `img` so neither side exceeds `max_dimension`, keeping its aspect ratio.
/// WebGL2 devices commonly stop at 2048 or 4096 texels.
pub fn fit_within(img: image::DynamicImage, max_dimension: u32) -> image::DynamicImage {
    let (width, height) = (img.width(), img.height());
    if width <= max_dimension && height <= max_dimension {
        return img;
    }
    let scale = max_dimension as f64 / width.max(height) as f64;
    let new_width = ((width as f64 * scale).round() as u32).clamp(1, max_dimension);
    let new_height = ((height as f64 * scale).round() as u32).clamp(1, max_dimension);
    log::warn!(
        "Texture of {width}x{height} exceeds the device limit of {max_dimension}, downscaling to {new_width}x{new_height}"
    );
    img.resize_exact(new_width, new_height, image::imageops::FilterType::Triangle)
}
