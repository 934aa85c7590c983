use std::path::Path;

use anyhow::Context as _;
use kurbo::Point;

use crate::error::{BattlematError, BattlematResult};

/// Alpha value written for fogged pixels.
///
/// The GM surface shows this translucently; player-facing surfaces normalize
/// any nonzero alpha to fully opaque at composite time.
pub const FOG_ALPHA: u8 = 128;

/// Strokes kept for undo before the oldest is dropped.
const MAX_UNDO: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrushShape {
    Rectangle,
    Circle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaintMode {
    /// Cover pixels with fog (alpha = [`FOG_ALPHA`]).
    Add,
    /// Reveal pixels (alpha = 0).
    Remove,
}

/// Fog painting brush: shape plus edge size in world pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Brush {
    pub shape: BrushShape,
    pub size: u32,
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            shape: BrushShape::Rectangle,
            size: 32,
        }
    }
}

/// Alpha-only raster mask, always the exact size of the base image.
///
/// Painting writes alpha values directly (no blending), which makes strokes
/// idempotent: repainting covered pixels changes nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FogMask {
    width: u32,
    height: u32,
    alpha: Vec<u8>,
    history: Vec<Vec<u8>>,
}

impl FogMask {
    /// Fully fogged mask at the given dimensions.
    pub fn fogged(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            alpha: vec![FOG_ALPHA; (width as usize) * (height as usize)],
            history: Vec::new(),
        }
    }

    /// Fully revealed mask at the given dimensions.
    pub fn revealed(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            alpha: vec![0; (width as usize) * (height as usize)],
            history: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Alpha at `(x, y)`. Coordinates must be inside the mask bounds.
    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        debug_assert!(
            x < self.width && y < self.height,
            "fog sample ({x}, {y}) outside {}x{} mask",
            self.width,
            self.height
        );
        self.alpha[(y as usize) * (self.width as usize) + (x as usize)]
    }

    pub fn alpha(&self) -> &[u8] {
        &self.alpha
    }

    /// Rasterize one brush stamp centered on `center` (world space).
    ///
    /// Only alpha inside the mask bounds is written; coordinates off the base
    /// image are silently clipped.
    pub fn paint(&mut self, brush: Brush, center: Point, mode: PaintMode) {
        let value = match mode {
            PaintMode::Add => FOG_ALPHA,
            PaintMode::Remove => 0,
        };
        let size = i64::from(brush.size);
        if size == 0 {
            return;
        }
        let half = f64::from(brush.size) / 2.0;
        let left = (center.x - half).floor() as i64;
        let top = (center.y - half).floor() as i64;

        match brush.shape {
            BrushShape::Rectangle => {
                for y in top..top + size {
                    for x in left..left + size {
                        self.set_clipped(x, y, value);
                    }
                }
            }
            BrushShape::Circle => {
                let r2 = half * half;
                for y in top..top + size {
                    for x in left..left + size {
                        let dx = (x as f64 + 0.5) - center.x;
                        let dy = (y as f64 + 0.5) - center.y;
                        if dx * dx + dy * dy <= r2 {
                            self.set_clipped(x, y, value);
                        }
                    }
                }
            }
        }
    }

    /// Reveal the entire map (alpha 0 everywhere).
    pub fn clear(&mut self) {
        self.alpha.fill(0);
    }

    /// Re-fog the entire map (alpha [`FOG_ALPHA`] everywhere).
    pub fn reset(&mut self) {
        self.alpha.fill(FOG_ALPHA);
    }

    /// Snapshot the current alpha buffer onto the undo stack.
    ///
    /// Called once at stroke start, not per stamp.
    pub fn push_history(&mut self) {
        self.history.push(self.alpha.clone());
        if self.history.len() > MAX_UNDO {
            self.history.remove(0);
        }
    }

    /// Restore the most recent snapshot. Returns false when there is none.
    pub fn undo(&mut self) -> bool {
        match self.history.pop() {
            Some(prev) => {
                self.alpha = prev;
                true
            }
            None => false,
        }
    }

    fn set_clipped(&mut self, x: i64, y: i64, value: u8) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        self.alpha[(y as usize) * (self.width as usize) + (x as usize)] = value;
    }

    /// Render the mask as black-with-alpha RGBA, ready to composite.
    ///
    /// `opaque` normalizes any nonzero alpha to 255 (player-facing rule).
    pub fn to_image(&self, opaque: bool) -> image::RgbaImage {
        let mut img = image::RgbaImage::new(self.width, self.height);
        for (px, &a) in img.pixels_mut().zip(self.alpha.iter()) {
            let a = if opaque && a > 0 { 255 } else { a };
            *px = image::Rgba([0, 0, 0, a]);
        }
        img
    }

    /// Write the mask as a PNG preserving exact alpha values.
    pub fn save_png(&self, path: &Path) -> BattlematResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create mask dir '{}'", parent.display()))?;
        }
        self.to_image(false)
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("write fog mask '{}'", path.display()))?;
        Ok(())
    }

    /// Load a saved mask, taking only the alpha channel.
    ///
    /// Intermediate alpha values are tolerated on read; this engine only ever
    /// writes 0 or [`FOG_ALPHA`]. A mask whose dimensions disagree with the
    /// base image is rejected so the caller can synthesize a fresh one.
    pub fn load_png(path: &Path, width: u32, height: u32) -> BattlematResult<Self> {
        let img = image::open(path)
            .with_context(|| format!("read fog mask '{}'", path.display()))?
            .to_rgba8();
        if img.dimensions() != (width, height) {
            return Err(BattlematError::asset(format!(
                "fog mask '{}' is {}x{}, base image is {width}x{height}",
                path.display(),
                img.width(),
                img.height(),
            )));
        }
        let alpha = img.pixels().map(|p| p.0[3]).collect();
        Ok(Self {
            width,
            height,
            alpha,
            history: Vec::new(),
        })
    }

    /// Load a mask or fall back to fully fogged at the base dimensions.
    ///
    /// The fallback covers missing files, decode failures, and dimension
    /// mismatches; a map always opens with a usable mask.
    pub fn load_or_fogged(path: Option<&Path>, width: u32, height: u32) -> Self {
        let Some(path) = path else {
            return Self::fogged(width, height);
        };
        match Self::load_png(path, width, height) {
            Ok(mask) => mask,
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "fog mask unusable; starting fully fogged"
                );
                Self::fogged(width, height)
            }
        }
    }
}
