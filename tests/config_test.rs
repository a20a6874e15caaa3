use room_portfolio::{
    SceneConfig,
    config::{TextureSource, linear_rgb, rgba8},
    data_structures::texture::{ColorSpace, Filter},
};

#[test]
fn defaults_describe_the_portfolio_room() {
    let config = SceneConfig::default();

    assert_eq!(config.model_path, "/models/RoomPortfolio.glb");
    assert_eq!(config.decoder_path, "/draco/");
    assert_eq!(
        config.textures,
        vec![
            TextureSource::new("First", "/textures/TextureSet1.webp"),
            TextureSource::new("Second", "/textures/TextureSet2.webp"),
            TextureSource::new("Third", "/textures/TextureSet3.webp"),
        ]
    );
    assert!(!config.texture_settings.flip_y);
    assert_eq!(config.texture_settings.color_space, ColorSpace::Srgb);
    assert_eq!(config.camera.position, [0.0, 20.0, 100.0]);
    assert_eq!(config.camera.fov_y_degrees, 75.0);
    assert!(config.antialias);
    assert_eq!(config.max_pixel_ratio, 2.0);
    assert_eq!(config.placeholder.spin, [0.01, 0.01]);
}

#[test]
fn json_overrides_only_what_it_names() {
    let config = SceneConfig::from_json(
        r#"{
            "model_path": "/models/Other.glb",
            "textures": [{ "key": "Wall", "path": "/textures/wall.png" }],
            "texture_settings": { "flip_y": true, "color_space": "linear", "mag_filter": "nearest" },
            "lights": { "ambient": { "intensity": 0.25 } },
            "controls": { "enable_damping": false }
        }"#,
    )
    .unwrap();

    assert_eq!(config.model_path, "/models/Other.glb");
    assert_eq!(config.textures, vec![TextureSource::new("Wall", "/textures/wall.png")]);
    assert!(config.texture_settings.flip_y);
    assert_eq!(config.texture_settings.color_space, ColorSpace::Linear);
    assert_eq!(config.texture_settings.mag_filter, Filter::Nearest);
    assert_eq!(config.texture_settings.min_filter, Filter::Linear);
    assert_eq!(config.lights.ambient.intensity, 0.25);
    assert_eq!(config.lights.ambient.color, 0xffffff);
    assert_eq!(config.lights.directional.intensity, 0.8);
    assert!(!config.controls.enable_damping);
    assert_eq!(config.controls.damping_factor, 0.05);
    assert_eq!(config.decoder_path, "/draco/");
}

#[test]
fn empty_json_is_the_default() {
    assert_eq!(SceneConfig::from_json("{}").unwrap(), SceneConfig::default());
}

#[test]
fn invalid_json_is_rejected() {
    assert!(SceneConfig::from_json("{ \"textures\": [{ \"key\": \"First\" }] }").is_err());
    assert!(SceneConfig::from_json("not json").is_err());
}

#[test]
fn colours_convert_from_hex() {
    assert_eq!(rgba8(0x00ff00), [0, 255, 0, 255]);
    assert_eq!(rgba8(0x123456), [0x12, 0x34, 0x56, 255]);

    assert_eq!(linear_rgb(0xffffff), [1.0, 1.0, 1.0]);
    assert_eq!(linear_rgb(0x000000), [0.0, 0.0, 0.0]);
    let [r, g, b] = linear_rgb(0x808080);
    assert!((r - 0.2158).abs() < 1e-3);
    assert_eq!(r, g);
    assert_eq!(g, b);
}

#[test]
fn out_of_range_values_are_rejected() {
    let inverted = SceneConfig::from_json(
        r#"{ "controls": { "min_distance": 50.0, "max_distance": 10.0 } }"#,
    );
    let message = format!("{:#}", inverted.unwrap_err());
    assert!(message.contains("max_distance"), "{message}");

    for json in [
        r#"{ "controls": { "min_distance": -1.0 } }"#,
        r#"{ "controls": { "damping_factor": 0.0 } }"#,
        r#"{ "controls": { "damping_factor": 1.5 } }"#,
        r#"{ "camera": { "near": 0.0 } }"#,
        r#"{ "camera": { "near": 10.0, "far": 5.0 } }"#,
        r#"{ "camera": { "fov_y_degrees": 180.0 } }"#,
        r#"{ "max_pixel_ratio": 0.0 }"#,
    ] {
        assert!(SceneConfig::from_json(json).is_err(), "accepted {json}");
    }
}

#[test]
fn distance_limits_that_meet_are_accepted() {
    let config = SceneConfig::from_json(
        r#"{ "controls": { "min_distance": 20.0, "max_distance": 20.0 } }"#,
    )
    .unwrap();
    assert_eq!(config.controls.min_distance, 20.0);
    assert!(SceneConfig::default().validate().is_ok());
}
