use std::path::Path;

use ab_glyph::{Font as _, FontArc, PxScale, ScaleFont as _, point};
use anyhow::Context as _;
use image::{Rgba, RgbaImage};

use crate::error::{BattlematError, BattlematResult};
use crate::render::draw::blend_pixel;

/// A loaded label font.
///
/// Labels and hp badges are optional: surfaces render without text when no
/// font was supplied, so headless tests and minimal installs still work.
#[derive(Clone)]
pub struct LabelFont {
    font: FontArc,
}

impl std::fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelFont").finish_non_exhaustive()
    }
}

impl LabelFont {
    pub fn from_bytes(bytes: Vec<u8>) -> BattlematResult<Self> {
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| BattlematError::asset(format!("invalid font data: {e}")))?;
        Ok(Self { font })
    }

    pub fn load(path: &Path) -> BattlematResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read font '{}'", path.display()))?;
        Self::from_bytes(bytes)
    }

    /// Pixel width and line height of `text` at the given size.
    pub fn measure(&self, text: &str, px: f32) -> (f32, f32) {
        let scaled = self.font.as_scaled(PxScale::from(px));
        let mut width = 0.0;
        let mut last = None;
        for ch in text.chars() {
            if ch.is_control() {
                continue;
            }
            let id = scaled.glyph_id(ch);
            if let Some(prev) = last {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            last = Some(id);
        }
        (width, scaled.height())
    }

    /// Rasterize `text` with its top-left corner at `(x, y)`.
    pub fn draw(&self, dst: &mut RgbaImage, text: &str, px: f32, x: f32, y: f32, color: Rgba<u8>) {
        let scale = PxScale::from(px);
        let scaled = self.font.as_scaled(scale);
        let baseline = y + scaled.ascent();
        let mut caret = x;
        let mut last = None;

        for ch in text.chars() {
            if ch.is_control() {
                continue;
            }
            let id = scaled.glyph_id(ch);
            if let Some(prev) = last {
                caret += scaled.kern(prev, id);
            }
            let glyph = id.with_scale_and_position(scale, point(caret, baseline));
            caret += scaled.h_advance(id);
            last = Some(id);

            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            let (dw, dh) = (i64::from(dst.width()), i64::from(dst.height()));
            outlined.draw(|gx, gy, coverage| {
                let px = i64::from(gx) + bounds.min.x as i64;
                let py = i64::from(gy) + bounds.min.y as i64;
                if px < 0 || py < 0 || px >= dw || py >= dh {
                    return;
                }
                let alpha = (coverage * f32::from(color.0[3])).round() as u8;
                blend_pixel(
                    dst.get_pixel_mut(px as u32, py as u32),
                    Rgba([color.0[0], color.0[1], color.0[2], alpha]),
                );
            });
        }
    }

    /// Rasterize `text` horizontally centered on `center_x`.
    pub fn draw_centered(
        &self,
        dst: &mut RgbaImage,
        text: &str,
        px: f32,
        center_x: f32,
        y: f32,
        color: Rgba<u8>,
    ) {
        let (width, _) = self.measure(text, px);
        self.draw(dst, text, px, center_x - width / 2.0, y, color);
    }
}
