use room_portfolio::{
    binder::{TextureLookup, bind_materials, matching_key},
    config::TextureSource,
    data_structures::{
        asset::{AssetNode, MaterialRef},
        texture::TextureSettings,
    },
};

use crate::common::test_utils::model_with_meshes;
mod common;

fn portfolio_lookup() -> TextureLookup {
    TextureLookup::register(
        &[
            TextureSource::new("First", "/textures/TextureSet1.webp"),
            TextureSource::new("Second", "/textures/TextureSet2.webp"),
            TextureSource::new("Third", "/textures/TextureSet3.webp"),
        ],
        TextureSettings::default(),
    )
}

#[test]
fn lookup_keeps_registration_order_and_settings() {
    let lookup = portfolio_lookup();
    assert_eq!(lookup.keys().collect::<Vec<_>>(), ["First", "Second", "Third"]);
    assert_eq!(lookup.len(), 3);

    let first = lookup.get("First").unwrap();
    assert_eq!(first.path, "/textures/TextureSet1.webp");
    assert!(!first.settings.flip_y);
    assert_eq!(first.settings, TextureSettings::default());
    assert!(lookup.get("Fourth").is_none());
}

#[test]
fn lookup_registers_a_repeated_key_once() {
    let lookup = TextureLookup::register(
        &[
            TextureSource::new("First", "/a.webp"),
            TextureSource::new("Second", "/b.webp"),
            TextureSource::new("First", "/c.webp"),
        ],
        TextureSettings::default(),
    );
    assert_eq!(lookup.keys().collect::<Vec<_>>(), ["First", "Second"]);
    assert_eq!(lookup.get("First").unwrap().path, "/c.webp");
}

#[test]
fn matching_key_is_a_substring_match() {
    let lookup = portfolio_lookup();
    assert_eq!(matching_key("Desk_First", &lookup), Some("First"));
    assert_eq!(matching_key("SecondShelf", &lookup), Some("Second"));
    assert_eq!(matching_key("Lamp", &lookup), None);
    // Case matters
    assert_eq!(matching_key("desk_first", &lookup), None);
}

#[test]
fn later_keys_win_when_several_match() {
    let lookup = portfolio_lookup();
    assert_eq!(matching_key("Shelf_Second_Third", &lookup), Some("Third"));
    assert_eq!(matching_key("Third_First", &lookup), Some("Third"));

    let reversed = TextureLookup::register(
        &[
            TextureSource::new("Third", "/3.webp"),
            TextureSource::new("First", "/1.webp"),
        ],
        TextureSettings::default(),
    );
    assert_eq!(matching_key("Third_First", &reversed), Some("First"));
}

#[test]
fn binds_matching_meshes_and_leaves_the_rest() {
    let mut model = model_with_meshes(&["Desk_First", "Lamp", "Shelf_Second_Third"]);
    let summary = bind_materials(&mut model.root, &portfolio_lookup());

    assert_eq!(
        model.root.find_mesh("Desk_First").unwrap().material,
        MaterialRef::Texture("First".into())
    );
    assert_eq!(
        model.root.find_mesh("Lamp").unwrap().material,
        MaterialRef::Embedded(Some(0))
    );
    assert_eq!(
        model.root.find_mesh("Shelf_Second_Third").unwrap().material,
        MaterialRef::Texture("Third".into())
    );
    assert_eq!(summary.bound, 2);
    assert_eq!(summary.untouched, 1);
    assert_eq!(summary.overlapping, vec!["Shelf_Second_Third".to_string()]);
    // Embedded materials are not touched either
    assert_eq!(model.materials.len(), 1);
}

#[test]
fn visits_nested_meshes() {
    let inner = model_with_meshes(&["Chair_Second"]).root;
    let mut root = AssetNode::group(
        "Scene",
        vec![AssetNode::group("Furniture", vec![inner])],
    );
    let summary = bind_materials(&mut root, &portfolio_lookup());

    assert_eq!(summary.bound, 1);
    assert_eq!(
        root.find_mesh("Chair_Second").unwrap().material,
        MaterialRef::Texture("Second".into())
    );
}

#[test]
fn empty_lookup_binds_nothing() {
    let mut model = model_with_meshes(&["Desk_First"]);
    let summary = bind_materials(&mut model.root, &TextureLookup::default());
    assert_eq!(summary.bound, 0);
    assert_eq!(
        model.root.find_mesh("Desk_First").unwrap().material,
        MaterialRef::Embedded(Some(0))
    );
}
