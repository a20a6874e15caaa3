use std::f32::consts::PI;

use cgmath::{Deg, EuclideanSpace, InnerSpace, Point3};
use room_portfolio::{
    camera::{Camera, OrbitControls, Spherical},
    config::ControlsConfig,
};

const TOLERANCE: f32 = 1e-3;

fn setup(enable_damping: bool) -> (OrbitControls, Camera) {
    let config = ControlsConfig {
        enable_damping,
        ..Default::default()
    };
    let camera = Camera::new((0.0f32, 0.0, 10.0), (0.0f32, 0.0, 0.0));
    let mut controls = OrbitControls::new(&config, Point3::origin(), Deg(75.0f32).into());
    // 25 pixels of horizontal drag are a quarter turn
    controls.set_viewport_height(100);
    (controls, camera)
}

fn theta(camera: &Camera) -> f32 {
    Spherical::from_vector(camera.position - camera.target).theta
}

#[test]
fn rotation_without_damping_applies_at_once() {
    let (mut controls, mut camera) = setup(false);
    controls.rotate(25.0, 0.0);

    assert!(controls.update(&mut camera));
    assert!((theta(&camera) + PI / 2.0).abs() < TOLERANCE);
    assert!((camera.position.x + 10.0).abs() < TOLERANCE);

    // Nothing is left over
    assert!(!controls.update(&mut camera));
}

#[test]
fn damping_applies_a_fraction_and_eases_out() {
    let (mut controls, mut camera) = setup(true);
    controls.rotate(25.0, 0.0);

    controls.update(&mut camera);
    let first = theta(&camera);
    assert!((first + PI / 2.0 * 0.05).abs() < TOLERANCE);

    controls.update(&mut camera);
    let second = theta(&camera) - first;
    assert!((second + PI / 2.0 * 0.05 * 0.95).abs() < TOLERANCE);

    // Keeps moving for a while without further input
    for _ in 0..20 {
        assert!(controls.update(&mut camera));
    }
    assert!(theta(&camera) > -PI / 2.0);
}

#[test]
fn dolly_changes_the_distance() {
    let (mut controls, mut camera) = setup(false);

    controls.dolly(1.0);
    controls.update(&mut camera);
    assert!((camera.distance() - 9.5).abs() < TOLERANCE);

    controls.dolly(-1.0);
    controls.update(&mut camera);
    assert!((camera.distance() - 10.0).abs() < TOLERANCE);
}

#[test]
fn distance_is_clamped() {
    let (mut controls, mut camera) = setup(false);
    controls.min_distance = 9.8;
    controls.max_distance = 10.2;

    controls.dolly(3.0);
    controls.update(&mut camera);
    assert!((camera.distance() - 9.8).abs() < TOLERANCE);

    controls.dolly(-10.0);
    controls.update(&mut camera);
    assert!((camera.distance() - 10.2).abs() < TOLERANCE);
}

#[test]
fn polar_angle_stops_short_of_the_poles() {
    let (mut controls, mut camera) = setup(false);
    controls.rotate(0.0, 1000.0);
    controls.update(&mut camera);

    assert!(camera.position.y > 9.99);
    assert!(camera.position.x.is_finite());
    assert!(camera.position.to_vec().magnitude().is_finite());
}

#[test]
fn pan_moves_target_and_camera_together() {
    let (mut controls, mut camera) = setup(false);
    controls.pan(10.0, 0.0);
    controls.update(&mut camera);

    assert!(controls.target.x < 0.0);
    assert!(controls.target.y.abs() < TOLERANCE);
    assert!(controls.target.z.abs() < TOLERANCE);
    assert_eq!(camera.target, controls.target);

    let offset = camera.position - camera.target;
    assert!(offset.x.abs() < TOLERANCE);
    assert!((offset.z - 10.0).abs() < TOLERANCE);
}

#[test]
fn spherical_coordinates_round_trip_the_default_camera() {
    let offset = cgmath::Vector3::new(0.0, 20.0, 100.0);
    let spherical = Spherical::from_vector(offset);
    assert!((spherical.radius - offset.magnitude()).abs() < TOLERANCE);
    assert!((spherical.to_vector() - offset).magnitude() < TOLERANCE);
}
