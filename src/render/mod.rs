//! CPU compositor for map surfaces.
//!
//! [`draw`] holds the straight-alpha blend and shape primitives, [`text`] the
//! glyph rasterizer for labels and badges, and [`pipeline`] the per-surface
//! compositor that stacks base image, tokens and fog.

pub mod draw;
pub mod pipeline;
pub mod text;

pub use pipeline::{FogStyle, HpStyle, SurfaceOptions, encode_png, render_surface};
pub use text::LabelFont;
