use image::imageops::FilterType;
use image::{Rgba, RgbaImage};

use crate::assets::SpriteArena;
use crate::error::BattlematResult;
use crate::fog::FogMask;
use crate::render::draw;
use crate::render::text::LabelFont;
use crate::token::{Token, TokenKind, TokenRegistry};
use crate::viewport::Viewport;

const BACKDROP: Rgba<u8> = Rgba([24, 24, 24, 255]);
const HP_GREEN: Rgba<u8> = Rgba([0x33, 0xcc, 0x33, 255]);
const HP_RED: Rgba<u8> = Rgba([0xff, 0x33, 0x33, 255]);
const LABEL_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const LABEL_PX: f32 = 12.0;
const BADGE_PX: f32 = 11.0;
const BADGE_RADIUS: i64 = 10;
const BORDER_THICKNESS: i64 = 3;
const HANDLE_SIZE: i64 = 6;
const SELECTION_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// How fog alpha reaches the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FogStyle {
    /// Mask alpha as stored; fogged terrain stays legible underneath.
    Translucent,
    /// Any nonzero alpha becomes fully opaque black.
    Opaque,
}

/// Hp badge coloring. The badge turns red strictly below the critical ratio.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HpStyle {
    pub critical_ratio: f32,
}

impl Default for HpStyle {
    fn default() -> Self {
        Self {
            critical_ratio: 0.10,
        }
    }
}

impl HpStyle {
    pub fn badge_color(&self, ratio: f32) -> Rgba<u8> {
        if ratio < self.critical_ratio {
            HP_RED
        } else {
            HP_GREEN
        }
    }
}

/// Per-surface compositing options.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceOptions {
    /// Output canvas size in screen pixels.
    pub size: (u32, u32),
    pub fog: FogStyle,
    /// Draw a red cross over tokens at 0 hp.
    pub dead_cross: bool,
    /// Outline and corner handles on the selected token (editing surfaces).
    pub edit_handles: bool,
    /// Resampling for base image and sprites. Fog always uses Lanczos3.
    pub filter: FilterType,
    pub hp: HpStyle,
}

impl SurfaceOptions {
    /// The GM's editing surface: translucent fog, edit handles, no death
    /// markers.
    pub fn gm(size: (u32, u32)) -> Self {
        Self {
            size,
            fog: FogStyle::Translucent,
            dead_cross: false,
            edit_handles: true,
            filter: FilterType::Lanczos3,
            hp: HpStyle::default(),
        }
    }

    /// Player-facing surfaces: opaque fog, death markers on, no editing
    /// affordances.
    pub fn player(size: (u32, u32)) -> Self {
        Self {
            size,
            fog: FogStyle::Opaque,
            dead_cross: true,
            edit_handles: false,
            filter: FilterType::Lanczos3,
            hp: HpStyle::default(),
        }
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }
}

/// Composite one surface: base image, then tokens in z-order, then fog.
///
/// Fog is strictly last so nothing ever renders on top of it.
pub fn render_surface(
    base: &RgbaImage,
    registry: &TokenRegistry,
    arena: &SpriteArena,
    fog: &FogMask,
    viewport: &Viewport,
    font: Option<&LabelFont>,
    opts: &SurfaceOptions,
) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(opts.size.0, opts.size.1, BACKDROP);

    let scaled_w = ((f64::from(base.width()) * viewport.zoom).round() as u32).max(1);
    let scaled_h = ((f64::from(base.height()) * viewport.zoom).round() as u32).max(1);
    let pan = (viewport.pan.x.round() as i64, viewport.pan.y.round() as i64);

    let scaled_base = if (scaled_w, scaled_h) == base.dimensions() {
        base.clone()
    } else {
        image::imageops::resize(base, scaled_w, scaled_h, opts.filter)
    };
    draw::blit(&mut canvas, &scaled_base, pan.0, pan.1);

    let selected = registry.selected_id();
    for token in registry.iter() {
        let handles = opts.edit_handles && selected == Some(token.id);
        draw_token(&mut canvas, token, arena, viewport, font, opts, handles);
    }

    let fog_img = fog.to_image(opts.fog == FogStyle::Opaque);
    let scaled_fog = if (scaled_w, scaled_h) == fog_img.dimensions() {
        fog_img
    } else {
        image::imageops::resize(&fog_img, scaled_w, scaled_h, FilterType::Lanczos3)
    };
    draw::blit(&mut canvas, &scaled_fog, pan.0, pan.1);

    canvas
}

fn draw_token(
    canvas: &mut RgbaImage,
    token: &Token,
    arena: &SpriteArena,
    viewport: &Viewport,
    font: Option<&LabelFont>,
    opts: &SurfaceOptions,
    handles: bool,
) {
    let top_left = viewport.world_to_screen(token.pos);
    let (x, y) = (top_left.x.round() as i64, top_left.y.round() as i64);
    let edge = ((f64::from(token.size) * viewport.zoom).round() as i64).max(1);

    if token.kind != TokenKind::Shape {
        if let Some(sprite) = arena.get(token.id) {
            let scaled;
            let sprite = if i64::from(sprite.width()) == edge {
                sprite
            } else {
                scaled =
                    image::imageops::resize(sprite, edge as u32, edge as u32, opts.filter);
                &scaled
            };
            draw::blit(canvas, sprite, x, y);
        }
    }

    draw::stroke_rect(
        canvas,
        x,
        y,
        edge,
        edge,
        BORDER_THICKNESS,
        token.border.into(),
    );

    if token.kind != TokenKind::Shape {
        draw_hp_badge(canvas, token, (x, y, edge), font, opts);
        if let Some(font) = font {
            let name = token.display_name();
            if !name.is_empty() {
                font.draw_centered(
                    canvas,
                    name,
                    LABEL_PX,
                    (x + edge / 2) as f32,
                    (y + edge + 2) as f32,
                    LABEL_COLOR,
                );
            }
        }
    }

    if handles {
        draw::stroke_rect(canvas, x - 2, y - 2, edge + 4, edge + 4, 1, SELECTION_COLOR);
        for (hx, hy) in [
            (x, y),
            (x + edge, y),
            (x, y + edge),
            (x + edge, y + edge),
        ] {
            draw::fill_rect(
                canvas,
                hx - HANDLE_SIZE / 2,
                hy - HANDLE_SIZE / 2,
                HANDLE_SIZE,
                HANDLE_SIZE,
                SELECTION_COLOR,
            );
        }
    }

    if opts.dead_cross && token.is_dead() {
        let t = (edge / 16).max(2);
        draw::draw_line(canvas, (x, y), (x + edge - 1, y + edge - 1), t, HP_RED);
        draw::draw_line(canvas, (x + edge - 1, y), (x, y + edge - 1), t, HP_RED);
    }
}

fn draw_hp_badge(
    canvas: &mut RgbaImage,
    token: &Token,
    frame: (i64, i64, i64),
    font: Option<&LabelFont>,
    opts: &SurfaceOptions,
) {
    let (x, y, edge) = frame;
    let color = opts.hp.badge_color(token.hp_ratio());
    let (cx, cy) = (x + edge / 2, y - BADGE_RADIUS - 2);
    draw::fill_circle(canvas, cx, cy, BADGE_RADIUS, color);
    if let Some(font) = font {
        let text = format!("{}/{}", token.hp, token.max_hp);
        font.draw_centered(
            canvas,
            &text,
            BADGE_PX,
            cx as f32,
            (cy - BADGE_RADIUS / 2 - 1) as f32,
            Rgba([0, 0, 0, 255]),
        );
    }
}

/// Encode a rendered surface as PNG bytes (web snapshot payload).
pub fn encode_png(img: &RgbaImage) -> BattlematResult<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageFormat::Png,
    )
    .map_err(|e| crate::error::BattlematError::asset(format!("encode png: {e}")))?;
    Ok(bytes)
}
