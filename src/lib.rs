//! Map annotation and fog-of-war engine for tabletop sessions.
//!
//! The engine keeps one source of truth per open map (base image, fog mask,
//! and placed tokens, all in world-space coordinates) and composites it onto
//! any number of surfaces: the GM's editing view, player-facing mirrors, and
//! an HTTP snapshot endpoint for remote tables.
//!
//! Layering is strict on every surface: base image first, tokens in z-order,
//! fog last. The GM sees fog translucently; players see it opaque.
//!
//! ```no_run
//! use std::sync::Arc;
//! use battlemat::{JsonFileStore, MapSession};
//!
//! # fn main() -> battlemat::BattlematResult<()> {
//! let store = Arc::new(JsonFileStore::new("maps.json"));
//! let session = MapSession::open_by_name(
//!     store,
//!     "masks".into(),
//!     "Sunken Crypt",
//!     (1280, 720),
//! )?;
//! let frame = session.render_gm();
//! # let _ = frame;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod assets;
pub mod color;
pub mod document;
pub mod error;
pub mod fog;
pub mod persist;
pub mod render;
pub mod session;
pub mod token;
pub mod viewport;
pub mod web;

pub use color::Color;
pub use document::{
    EntityInfo, EntityLookup, JsonFileStore, MapRecord, ModelStore, NoLookup, TokenRecord,
};
pub use error::{BattlematError, BattlematResult};
pub use fog::{Brush, BrushShape, FOG_ALPHA, FogMask, PaintMode};
pub use persist::{SaveGateway, SaveJob};
pub use render::{FogStyle, HpStyle, LabelFont, SurfaceOptions, encode_png, render_surface};
pub use session::MapSession;
pub use token::{EntityRef, Token, TokenId, TokenKind, TokenRegistry};
pub use viewport::{MAX_ZOOM, MIN_ZOOM, Point, Vec2, Viewport, ZOOM_STEP};
