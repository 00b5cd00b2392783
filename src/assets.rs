//! Asset manifest: named image and sound handles.
//!
//! The core never loads pixel or sample data; it only needs names and
//! dimensions to lay the table out and emit draw/play calls. A backend
//! resolves the same names against real files.

use std::collections::HashMap;

use rapier2d::math::Real;

use crate::{EngineError, EngineResult};

/// A named image with its natural size in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHandle {
    pub name: String,
    pub width: Real,
    pub height: Real,
}

impl ImageHandle {
    pub fn new(name: impl Into<String>, width: Real, height: Real) -> Self {
        Self {
            name: name.into(),
            width,
            height,
        }
    }
}

/// A named sound. Tracks loop and are deduplicated; effects fire and forget.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundHandle {
    pub name: String,
    pub is_track: bool,
}

impl SoundHandle {
    pub fn effect(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_track: false,
        }
    }

    pub fn track(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_track: true,
        }
    }
}

/// Lookup table from asset name to handle.
#[derive(Debug, Default)]
pub struct AssetCatalog {
    images: HashMap<String, ImageHandle>,
    sounds: HashMap<String, SoundHandle>,
}

impl AssetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_image(&mut self, image: ImageHandle) {
        self.images.insert(image.name.clone(), image);
    }

    pub fn insert_sound(&mut self, sound: SoundHandle) {
        self.sounds.insert(sound.name.clone(), sound);
    }

    /// Look an image up by name. Missing assets are a hard error at table
    /// assembly time rather than a blank sprite at runtime.
    pub fn image(&self, name: &str) -> EngineResult<ImageHandle> {
        self.images
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::MissingImage { name: name.into() })
    }

    /// Look a sound up by name.
    pub fn sound(&self, name: &str) -> EngineResult<SoundHandle> {
        self.sounds
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::MissingSound { name: name.into() })
    }
}
