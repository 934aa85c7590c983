use std::collections::HashMap;
use std::path::Path;

use anyhow::Context as _;
use image::RgbaImage;
use image::imageops::FilterType;

use crate::error::{BattlematError, BattlematResult};
use crate::token::TokenId;

/// Decode a base map image.
///
/// Unlike sprites there is no placeholder here: a map without its base image
/// is unusable, so missing or undecodable files are hard errors.
pub fn load_base_image(path: &Path) -> BattlematResult<RgbaImage> {
    if !path.exists() {
        return Err(BattlematError::asset(format!(
            "base image '{}' not found",
            path.display()
        )));
    }
    let img = image::open(path)
        .with_context(|| format!("decode base image '{}'", path.display()))?;
    Ok(img.to_rgba8())
}

/// Solid red square used when a token's sprite cannot be loaded.
pub fn placeholder_sprite(size: u32) -> RgbaImage {
    RgbaImage::from_pixel(size.max(1), size.max(1), image::Rgba([200, 30, 30, 255]))
}

/// Decode a token sprite, falling back to a red placeholder.
///
/// Token art lives outside the campaign file and can go missing without
/// invalidating the map; the placeholder keeps the token visible and movable.
pub fn load_sprite(path: &Path, size: u32) -> RgbaImage {
    match image::open(path) {
        Ok(img) => img.to_rgba8(),
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                %error,
                "sprite unreadable; using placeholder"
            );
            placeholder_sprite(size)
        }
    }
}

/// Per-session cache of decoded, pre-scaled token sprites.
///
/// Keyed by [`TokenId`], never serialized; rebuilt from image paths on every
/// map load. Entries are stored at the token's current edge size so the
/// compositor can blit without rescaling per frame.
#[derive(Debug, Default)]
pub struct SpriteArena {
    sprites: HashMap<TokenId, RgbaImage>,
}

impl SpriteArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load (or reload) the sprite for a token, scaled to `size` pixels.
    pub fn install(&mut self, id: TokenId, image_path: &str, size: u32) {
        let sprite = if image_path.is_empty() {
            placeholder_sprite(size)
        } else {
            load_sprite(Path::new(image_path), size)
        };
        let scaled = scale_sprite(&sprite, size);
        self.sprites.insert(id, scaled);
    }

    /// Re-scale an existing sprite after a token resize.
    pub fn rescale(&mut self, id: TokenId, image_path: &str, size: u32) {
        // Rescaling from the original file avoids compounding resample blur.
        self.install(id, image_path, size);
    }

    pub fn get(&self, id: TokenId) -> Option<&RgbaImage> {
        self.sprites.get(&id)
    }

    pub fn remove(&mut self, id: TokenId) {
        self.sprites.remove(&id);
    }

    pub fn clear(&mut self) {
        self.sprites.clear();
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }
}

fn scale_sprite(sprite: &RgbaImage, size: u32) -> RgbaImage {
    let size = size.max(1);
    if sprite.dimensions() == (size, size) {
        sprite.clone()
    } else {
        image::imageops::resize(sprite, size, size, FilterType::Lanczos3)
    }
}
