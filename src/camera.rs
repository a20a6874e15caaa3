//! Perspective camera, projection and orbit controls.
//!
//! [`Camera`] is an eye looking at a target. [`Projection`] holds everything
//! that depends on the surface (aspect) or the lens (fov, clip planes).
//! [`OrbitControls`] moves the camera on a sphere around its target from mouse
//! input and eases the motion out with damping.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Matrix4, Point3, Rad, Vector3};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

use crate::config::{CameraConfig, ControlsConfig};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const EPS: f32 = 1e-6;

#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>, T: Into<Point3<f32>>>(position: P, target: T) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
            up: Vector3::unit_y(),
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self::new(config.position, config.target)
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.target).magnitude()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn from_config(width: u32, height: u32, config: &CameraConfig) -> Self {
        Self::new(
            width,
            height,
            cgmath::Deg(config.fov_y_degrees),
            config.near,
            config.far,
        )
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fovy(&self) -> Rad<f32> {
        self.fovy
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: cgmath::Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct CameraResources {
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn new(device: &wgpu::Device, camera: &Camera, projection: &Projection) -> Self {
        use wgpu::util::DeviceExt;

        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(camera, projection);

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn write(&mut self, queue: &wgpu::Queue, camera: &Camera, projection: &Projection) {
        self.uniform.update_view_proj(camera, projection);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

/// Polar/azimuthal angles around the y axis plus a radius.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Spherical {
    pub radius: f32,
    /// Polar angle from +y.
    pub phi: f32,
    /// Azimuth around +y, measured from +z.
    pub theta: f32,
}

impl Spherical {
    pub fn from_vector(v: Vector3<f32>) -> Self {
        let radius = v.magnitude();
        if radius < EPS {
            return Self::default();
        }
        Self {
            radius,
            theta: v.x.atan2(v.z),
            phi: (v.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    pub fn to_vector(self) -> Vector3<f32> {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vector3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Drag {
    None,
    Rotate,
    Pan,
}

/// Mouse-driven orbit around a target point.
///
/// Input only accumulates deltas; [`OrbitControls::update`] applies them to a
/// camera. With damping on, each update applies a fraction of the pending
/// delta and decays the rest, so the motion keeps easing out for a few frames
/// after the input stops. `update` therefore has to run every frame.
#[derive(Clone, Debug)]
pub struct OrbitControls {
    pub target: Point3<f32>,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    fovy: Rad<f32>,
    viewport_height: f32,
    spherical_delta: Spherical,
    scale: f32,
    pan_offset: Vector3<f32>,
    pending_pan: (f32, f32),
    drag: Drag,
    cursor: Option<(f64, f64)>,
}

impl OrbitControls {
    pub fn new(config: &ControlsConfig, target: Point3<f32>, fovy: Rad<f32>) -> Self {
        Self {
            target,
            enable_damping: config.enable_damping,
            damping_factor: config.damping_factor,
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
            pan_speed: config.pan_speed,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            fovy,
            viewport_height: 1.0,
            spherical_delta: Spherical::default(),
            scale: 1.0,
            pan_offset: Vector3::new(0.0, 0.0, 0.0),
            pending_pan: (0.0, 0.0),
            drag: Drag::None,
            cursor: None,
        }
    }

    /// Mouse deltas are converted to angles relative to this height.
    pub fn set_viewport_height(&mut self, height: u32) {
        self.viewport_height = height.max(1) as f32;
    }

    /// Orbit by a pointer movement in physical pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        let full_turn = 2.0 * PI * self.rotate_speed / self.viewport_height;
        self.spherical_delta.theta -= dx * full_turn;
        self.spherical_delta.phi -= dy * full_turn;
    }

    /// Shift the target by a pointer movement in physical pixels.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.pending_pan.0 += dx * self.pan_speed;
        self.pending_pan.1 += dy * self.pan_speed;
    }

    /// Positive steps move towards the target, negative away from it.
    pub fn dolly(&mut self, steps: f32) {
        let zoom_scale = 0.95f32.powf(self.zoom_speed * steps.abs());
        if steps > 0.0 {
            self.scale *= zoom_scale;
        } else if steps < 0.0 {
            self.scale /= zoom_scale;
        }
    }

    /// Feeds a window event to the controls. Returns whether it was consumed.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                let drag = match button {
                    MouseButton::Left => Drag::Rotate,
                    MouseButton::Right | MouseButton::Middle => Drag::Pan,
                    _ => return false,
                };
                match state {
                    ElementState::Pressed => self.drag = drag,
                    ElementState::Released if self.drag == drag => self.drag = Drag::None,
                    ElementState::Released => (),
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                let current = (position.x, position.y);
                let previous = self.cursor.replace(current);
                let Some((px, py)) = previous else {
                    return false;
                };
                let (dx, dy) = ((current.0 - px) as f32, (current.1 - py) as f32);
                match self.drag {
                    Drag::Rotate => self.rotate(dx, dy),
                    Drag::Pan => self.pan(dx, dy),
                    Drag::None => return false,
                }
                true
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.drag = Drag::None;
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => (pos.y / 100.0) as f32,
                };
                self.dolly(steps);
                true
            }
            _ => false,
        }
    }

    /// Applies pending motion to `camera`. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let offset = camera.position - self.target;
        let mut spherical = Spherical::from_vector(offset);

        if self.pending_pan != (0.0, 0.0) {
            self.resolve_pan(camera, offset);
        }

        let factor = if self.enable_damping {
            self.damping_factor
        } else {
            1.0
        };
        spherical.theta += self.spherical_delta.theta * factor;
        spherical.phi += self.spherical_delta.phi * factor;
        spherical.phi = spherical
            .phi
            .clamp(self.min_polar_angle, self.max_polar_angle)
            .clamp(EPS, PI - EPS);
        spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        self.target += self.pan_offset * factor;

        let previous = camera.position;
        camera.position = self.target + spherical.to_vector();
        camera.target = self.target;

        if self.enable_damping {
            let decay = 1.0 - self.damping_factor;
            self.spherical_delta.theta *= decay;
            self.spherical_delta.phi *= decay;
            self.pan_offset *= decay;
        } else {
            self.spherical_delta = Spherical::default();
            self.pan_offset = Vector3::new(0.0, 0.0, 0.0);
        }
        self.scale = 1.0;

        (camera.position - previous).magnitude2() > EPS
    }

    fn resolve_pan(&mut self, camera: &Camera, offset: Vector3<f32>) {
        let (dx, dy) = std::mem::take(&mut self.pending_pan);
        // Moving the pointer across the full height moves the target by the visible height
        let target_distance = offset.magnitude() * (self.fovy.0 / 2.0).tan();
        let forward = -offset.normalize();
        let right = forward.cross(camera.up);
        if right.magnitude2() < EPS {
            return;
        }
        let right = right.normalize();
        let up = right.cross(forward);
        let scale = 2.0 * target_distance / self.viewport_height;
        self.pan_offset += right * (-dx * scale) + up * (dy * scale);
    }
}
