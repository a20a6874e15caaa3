//! Display surface sizing.
//!
//! Keeps the camera aspect and the render surface in step with the window or
//! canvas it is drawn into.

use crate::camera::Projection;

/// Size of the display surface in logical pixels, plus the device pixel ratio.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub scale_factor: f64,
}

impl Viewport {
    pub fn new(width: u32, height: u32, scale_factor: f64) -> Self {
        Self {
            width,
            height,
            scale_factor,
        }
    }

    /// Builds a viewport from the physical size winit reports.
    pub fn from_physical(size: winit::dpi::PhysicalSize<u32>, scale_factor: f64) -> Self {
        let logical = size.to_logical::<f64>(scale_factor);
        Self::new(
            logical.width.round() as u32,
            logical.height.round() as u32,
            scale_factor,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// What the renderer surface should be configured to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f64,
}

impl SurfaceSize {
    /// Size of the backing buffer in device pixels.
    pub fn physical(&self) -> (u32, u32) {
        let scale = |v: u32| ((v as f64 * self.pixel_ratio).round() as u32).max(1);
        (scale(self.width), scale(self.height))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResizeHandler {
    pub max_pixel_ratio: f64,
}

impl ResizeHandler {
    pub fn new(max_pixel_ratio: f64) -> Self {
        Self { max_pixel_ratio }
    }

    pub fn pixel_ratio(&self, scale_factor: f64) -> f64 {
        scale_factor.min(self.max_pixel_ratio)
    }

    /// Sets the projection aspect to the viewport's and returns the surface size.
    ///
    /// Returns `None` for a zero-sized viewport, which happens while a window
    /// is minimised; nothing is touched in that case.
    pub fn apply(&self, viewport: Viewport, projection: &mut Projection) -> Option<SurfaceSize> {
        if viewport.is_empty() {
            log::debug!("Ignoring resize to an empty viewport {viewport:?}");
            return None;
        }
        projection.resize(viewport.width, viewport.height);
        Some(SurfaceSize {
            width: viewport.width,
            height: viewport.height,
            pixel_ratio: self.pixel_ratio(viewport.scale_factor),
        })
    }
}
