use cgmath::{Deg, Quaternion, Rotation3, Vector3};
use room_portfolio::{
    config::LightsConfig,
    data_structures::instance::Instance,
    pipelines::light::LightUniform,
};

fn close(a: Vector3<f32>, b: Vector3<f32>) -> bool {
    (a.x - b.x).abs() < 1e-5 && (a.y - b.y).abs() < 1e-5 && (a.z - b.z).abs() < 1e-5
}

#[test]
fn directional_light_points_from_position_to_target() {
    let uniform = LightUniform::from_config(&LightsConfig::default());
    let direction: Vector3<f32> = uniform.direction().into();
    let expected = Vector3::new(-10.0f32, -20.0, -10.0) / 600f32.sqrt();
    assert!(close(direction, expected));
}

#[test]
fn directional_light_without_offset_shines_down() {
    let mut lights = LightsConfig::default();
    lights.directional.position = [0.0; 3];
    let uniform = LightUniform::from_config(&lights);
    assert_eq!(uniform.direction(), [0.0, -1.0, 0.0]);
}

#[test]
fn child_transforms_compose_with_their_parent() {
    let parent = Instance {
        position: Vector3::new(1.0, 0.0, 0.0),
        rotation: Quaternion::from_angle_y(Deg(90.0)),
        scale: Vector3::new(2.0, 2.0, 2.0),
    };
    let child = Instance {
        position: Vector3::new(0.0, 0.0, 1.0),
        ..Default::default()
    };

    let world = &parent * &child;

    // Scaled to 2 along z, then rotated onto +x
    assert!(close(world.position, Vector3::new(3.0, 0.0, 0.0)));
    assert_eq!(world.scale, Vector3::new(2.0, 2.0, 2.0));
    assert_eq!(world.rotation, parent.rotation);
}

#[test]
fn identity_is_neutral() {
    let node = Instance {
        position: Vector3::new(4.0, 5.0, 6.0),
        ..Default::default()
    };
    assert_eq!(&Instance::new() * &node, node);
}
