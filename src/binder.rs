//! Name-based material binding.
//!
//! Meshes whose name contains one of the texture-map keys are switched to the
//! double-sided standard material of that key. Everything else keeps the
//! material it was exported with.

use crate::{
    config::TextureSource,
    data_structures::{
        asset::{AssetNode, MaterialRef},
        texture::TextureSettings,
    },
};

#[derive(Clone, Debug, PartialEq)]
pub struct TextureEntry {
    pub key: String,
    pub path: String,
    pub settings: TextureSettings,
}

/// Texture-map keys in registration order.
///
/// Filled once by [`TextureLookup::register`]; there is no way to add or
/// replace entries afterwards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextureLookup {
    entries: Vec<TextureEntry>,
}

impl TextureLookup {
    pub fn register(sources: &[TextureSource], settings: TextureSettings) -> Self {
        let mut entries: Vec<TextureEntry> = Vec::with_capacity(sources.len());
        for source in sources {
            if let Some(existing) = entries.iter_mut().find(|e| e.key == source.key) {
                log::warn!(
                    "Texture key {:?} is registered twice, using {}",
                    source.key,
                    source.path
                );
                existing.path = source.path.clone();
                continue;
            }
            entries.push(TextureEntry {
                key: source.key.clone(),
                path: source.path.clone(),
                settings,
            });
        }
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&TextureEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextureEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The key a mesh binds to: the last key in registration order that is a
/// substring of `name`.
pub fn matching_key<'a>(name: &str, lookup: &'a TextureLookup) -> Option<&'a str> {
    lookup.keys().filter(|key| name.contains(key)).last()
}

/// Counts from one [`bind_materials`] run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BindSummary {
    pub bound: usize,
    pub untouched: usize,
    /// Meshes whose name contains more than one key.
    pub overlapping: Vec<String>,
}

/// Rebinds the material of every mesh in `root` whose name contains a key.
pub fn bind_materials(root: &mut AssetNode, lookup: &TextureLookup) -> BindSummary {
    let mut summary = BindSummary::default();
    root.for_each_mesh_mut(&mut |mesh| {
        log::debug!("{}", mesh.name);
        let matches: Vec<&str> = lookup.keys().filter(|key| mesh.name.contains(key)).collect();
        let Some(key) = matches.last() else {
            summary.untouched += 1;
            return;
        };
        if matches.len() > 1 {
            log::warn!(
                "Mesh {:?} matches texture keys {:?}, binding {:?}",
                mesh.name,
                matches,
                key
            );
            summary.overlapping.push(mesh.name.clone());
        }
        mesh.material = MaterialRef::Texture(key.to_string());
        summary.bound += 1;
    });
    summary
}
