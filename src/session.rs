use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use image::imageops::FilterType;

use crate::assets::{SpriteArena, load_base_image};
use crate::document::{EntityInfo, EntityLookup, MapRecord, ModelStore, TokenRecord};
use crate::error::{BattlematError, BattlematResult};
use crate::fog::{Brush, BrushShape, FogMask, PaintMode};
use crate::persist::{SaveGateway, SaveJob, mask_path_for};
use crate::render::{LabelFont, SurfaceOptions, render_surface};
use crate::token::{ClipboardEntry, EntityRef, Token, TokenId, TokenKind, TokenRegistry};
use crate::viewport::{Point, Vec2, Viewport};

/// After the wheel goes quiet for this long, rendering switches from the fast
/// interactive resampler back to the high-quality one.
pub const ZOOM_SETTLE: Duration = Duration::from_millis(50);

/// One open map: base image, fog, tokens, view state, and the save gateway.
///
/// The session is the single mutation point for a map. Every editing
/// operation takes screen coordinates where a pointer is involved and
/// converts to world space internally; world space is what gets persisted.
pub struct MapSession {
    name: String,
    image_path: String,
    base: RgbaImage,
    fog: FogMask,
    registry: TokenRegistry,
    arena: SpriteArena,
    viewport: Viewport,
    brush: Brush,
    default_token_size: u32,
    surface_size: (u32, u32),
    font: Option<LabelFont>,
    clipboard: Option<ClipboardEntry>,
    last_zoom: Option<Instant>,
    masks_dir: PathBuf,
    gateway: SaveGateway,
}

impl MapSession {
    /// Open a map from its record. The base image is required; fog falls back
    /// to fully fogged, sprites to placeholders.
    pub fn open(
        store: Arc<dyn ModelStore>,
        masks_dir: PathBuf,
        record: &MapRecord,
        surface_size: (u32, u32),
    ) -> BattlematResult<Self> {
        let base = load_base_image(std::path::Path::new(&record.image_path))?;
        let fog = FogMask::load_or_fogged(
            record.fog_mask_path.as_deref().map(std::path::Path::new),
            base.width(),
            base.height(),
        );

        let mut registry = TokenRegistry::new();
        let mut arena = SpriteArena::new();
        for rec in &record.tokens {
            let token = token_from_record(rec);
            let size = token.size;
            let image_path = token.image_path.clone();
            let kind = token.kind;
            let id = registry.insert_full(token);
            if kind != TokenKind::Shape {
                arena.install(id, &image_path, size);
            }
        }

        let gateway = SaveGateway::spawn(store);
        tracing::info!(
            map = %record.name,
            tokens = registry.len(),
            "map session opened"
        );

        Ok(Self {
            name: record.name.clone(),
            image_path: record.image_path.clone(),
            base,
            fog,
            registry,
            arena,
            viewport: Viewport::new(record.zoom, record.pan_x, record.pan_y),
            brush: Brush {
                shape: BrushShape::Rectangle,
                size: record.brush_size.max(1),
            },
            default_token_size: record.token_size.max(1),
            surface_size,
            font: None,
            clipboard: None,
            last_zoom: None,
            masks_dir,
            gateway,
        })
    }

    /// Open a map by name from the store.
    pub fn open_by_name(
        store: Arc<dyn ModelStore>,
        masks_dir: PathBuf,
        name: &str,
        surface_size: (u32, u32),
    ) -> BattlematResult<Self> {
        let items = store.load_items()?;
        let record = items
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| BattlematError::validation(format!("no map named '{name}'")))?;
        Self::open(store.clone(), masks_dir, record, surface_size)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_size(&self) -> (u32, u32) {
        self.base.dimensions()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn set_font(&mut self, font: LabelFont) {
        self.font = Some(font);
    }

    // ----- view -----

    pub fn pan_by(&mut self, delta: Vec2) {
        self.viewport.pan_by(delta);
    }

    /// Wheel zoom anchored on the cursor. View changes alone never schedule a
    /// save; the viewport rides along with the next content edit.
    pub fn zoom_at(&mut self, cursor: Point, notches: f64) {
        self.viewport.zoom_about(cursor, notches);
        self.last_zoom = Some(Instant::now());
    }

    pub fn center_view_on(&mut self, world: Point) {
        self.viewport.center_on(world, self.surface_size);
    }

    fn base_filter(&self) -> FilterType {
        match self.last_zoom {
            Some(at) if at.elapsed() < ZOOM_SETTLE => FilterType::Triangle,
            _ => FilterType::Lanczos3,
        }
    }

    // ----- fog -----

    pub fn brush(&self) -> Brush {
        self.brush
    }

    pub fn set_brush(&mut self, shape: BrushShape, size: u32) {
        self.brush = Brush {
            shape,
            size: size.max(1),
        };
    }

    /// Start a fog stroke: snapshot the mask once for undo.
    pub fn begin_fog_stroke(&mut self) {
        self.fog.push_history();
    }

    /// Paint one brush stamp at a screen position (drag delivers many).
    pub fn paint_fog(&mut self, screen: Point, mode: PaintMode) {
        let world = self.viewport.screen_to_world(screen);
        self.fog.paint(self.brush, world, mode);
    }

    /// End a fog stroke; the new mask state heads for disk.
    pub fn end_fog_stroke(&mut self) {
        self.schedule_save();
    }

    pub fn undo_fog(&mut self) -> bool {
        let undone = self.fog.undo();
        if undone {
            self.schedule_save();
        }
        undone
    }

    pub fn clear_fog(&mut self) {
        self.fog.push_history();
        self.fog.clear();
        self.schedule_save();
    }

    pub fn reset_fog(&mut self) {
        self.fog.push_history();
        self.fog.reset();
        self.schedule_save();
    }

    pub fn fog(&self) -> &FogMask {
        &self.fog
    }

    // ----- tokens -----

    pub fn tokens(&self) -> &TokenRegistry {
        &self.registry
    }

    /// Place a new token at the center of the visible area.
    ///
    /// A named sprite asset that cannot be resolved is a hard error here.
    /// Tokens loaded from a record fall back to placeholders instead.
    pub fn add_token(
        &mut self,
        kind: TokenKind,
        entity: Option<EntityRef>,
        image_path: String,
    ) -> BattlematResult<TokenId> {
        if kind != TokenKind::Shape
            && !image_path.is_empty()
            && !std::path::Path::new(&image_path).exists()
        {
            return Err(BattlematError::asset(format!(
                "token sprite '{image_path}' not found"
            )));
        }
        let size = self.default_token_size;
        let pos = self.viewport.visible_center(self.surface_size);
        let id = self.registry.insert(kind, entity, image_path.clone(), pos, size);
        if kind != TokenKind::Shape {
            let applied = self.registry.get(id).map_or(size, |t| t.size);
            self.arena.install(id, &image_path, applied);
        }
        self.registry.select(Some(id));
        self.schedule_save();
        Ok(id)
    }

    /// Topmost token under a screen position.
    pub fn token_at(&self, screen: Point) -> Option<TokenId> {
        self.registry.hit_test(self.viewport.screen_to_world(screen))
    }

    /// Press handling: select whatever is under the cursor (or nothing).
    pub fn select_at(&mut self, screen: Point) -> Option<TokenId> {
        let hit = self.token_at(screen);
        self.registry.select(hit);
        hit
    }

    pub fn selected(&self) -> Option<&Token> {
        self.registry.selected()
    }

    /// Display record for a token's hover/info box, resolved through `lookup`.
    ///
    /// A lookup miss (or a token with no backing entity) falls back to a
    /// blank record carrying just the token's name; missing entity data
    /// never blocks rendering or editing.
    pub fn token_info(&self, id: TokenId, lookup: &dyn EntityLookup) -> Option<EntityInfo> {
        let token = self.registry.get(id)?;
        let info = token
            .entity
            .as_ref()
            .and_then(|e| lookup.lookup(e.kind, &e.name))
            .unwrap_or_else(|| EntityInfo {
                name: token.display_name().to_string(),
                portrait_path: None,
                details: String::new(),
            });
        Some(info)
    }

    /// Drag a token so its top-left lands at the given screen position.
    pub fn move_token(&mut self, id: TokenId, screen: Point) -> bool {
        let world = self.viewport.screen_to_world(screen);
        let moved = self.registry.move_to(id, world);
        if moved {
            self.schedule_save();
        }
        moved
    }

    pub fn resize_token(&mut self, id: TokenId, size: u32) -> Option<u32> {
        let applied = self.registry.resize(id, size)?;
        if let Some(token) = self.registry.get(id) {
            if token.kind != TokenKind::Shape {
                let path = token.image_path.clone();
                self.arena.rescale(id, &path, applied);
            }
        }
        self.schedule_save();
        Some(applied)
    }

    pub fn recolor_border(&mut self, id: TokenId, color: crate::color::Color) -> bool {
        let changed = self.registry.recolor_border(id, color);
        if changed {
            self.schedule_save();
        }
        changed
    }

    pub fn delete_token(&mut self, id: TokenId) -> bool {
        match self.registry.delete(id) {
            Some(_) => {
                self.arena.remove(id);
                self.schedule_save();
                true
            }
            None => false,
        }
    }

    pub fn copy_selected(&mut self) -> bool {
        match self.registry.selected_id().and_then(|id| self.registry.copy(id)) {
            Some(entry) => {
                self.clipboard = Some(entry);
                true
            }
            None => false,
        }
    }

    /// Paste the clipboard token at the center of the visible area.
    pub fn paste(&mut self) -> Option<TokenId> {
        let entry = self.clipboard.clone()?;
        let pos = self.viewport.visible_center(self.surface_size);
        let id = self.registry.paste(&entry, pos);
        if entry.kind != TokenKind::Shape {
            let size = self.registry.get(id).map_or(entry.size, |t| t.size);
            self.arena.install(id, &entry.image_path, size);
        }
        self.registry.select(Some(id));
        self.schedule_save();
        Some(id)
    }

    pub fn bring_to_front(&mut self, id: TokenId) -> bool {
        let changed = self.registry.bring_to_front(id);
        if changed {
            self.schedule_save();
        }
        changed
    }

    pub fn send_to_back(&mut self, id: TokenId) -> bool {
        let changed = self.registry.send_to_back(id);
        if changed {
            self.schedule_save();
        }
        changed
    }

    pub fn set_hp(&mut self, id: TokenId, hp: i32) -> bool {
        self.edit_token(id, |t| t.set_hp(hp))
    }

    pub fn apply_hp_delta(&mut self, id: TokenId, delta: i32) -> bool {
        self.edit_token(id, |t| t.apply_hp_delta(delta))
    }

    pub fn set_max_hp(&mut self, id: TokenId, max_hp: i32) -> bool {
        self.edit_token(id, |t| t.set_max_hp(max_hp))
    }

    fn edit_token(&mut self, id: TokenId, edit: impl FnOnce(&mut Token)) -> bool {
        match self.registry.get_mut(id) {
            Some(token) => {
                edit(token);
                self.schedule_save();
                true
            }
            None => false,
        }
    }

    pub fn set_default_token_size(&mut self, size: u32) {
        self.default_token_size = size.max(1);
    }

    // ----- rendering -----

    /// The GM's editing surface at the session's surface size.
    pub fn render_gm(&self) -> RgbaImage {
        let opts = SurfaceOptions::gm(self.surface_size).with_filter(self.base_filter());
        render_surface(
            &self.base,
            &self.registry,
            &self.arena,
            &self.fog,
            &self.viewport,
            self.font.as_ref(),
            &opts,
        )
    }

    /// A player-facing mirror at an arbitrary size, following this session's
    /// viewport. Fog is opaque and death markers are on.
    pub fn render_player(&self, size: (u32, u32)) -> RgbaImage {
        let opts = SurfaceOptions::player(size);
        render_surface(
            &self.base,
            &self.registry,
            &self.arena,
            &self.fog,
            &self.viewport,
            self.font.as_ref(),
            &opts,
        )
    }

    // ----- persistence -----

    /// Value snapshot of everything persistable, in canonical record form.
    pub fn snapshot_record(&self) -> MapRecord {
        MapRecord {
            name: self.name.clone(),
            image_path: self.image_path.clone(),
            fog_mask_path: Some(self.mask_path().to_string_lossy().into_owned()),
            tokens: self.registry.iter().map(record_from_token).collect(),
            token_size: self.default_token_size,
            brush_size: self.brush.size,
            zoom: self.viewport.zoom,
            pan_x: self.viewport.pan.x,
            pan_y: self.viewport.pan.y,
        }
    }

    fn mask_path(&self) -> PathBuf {
        mask_path_for(&self.masks_dir, &self.image_path)
    }

    fn save_job(&self) -> SaveJob {
        SaveJob {
            record: self.snapshot_record(),
            fog: self.fog.clone(),
            fog_path: self.mask_path(),
        }
    }

    /// Queue a debounced background save of the current state.
    pub fn schedule_save(&self) {
        self.gateway.schedule(self.save_job());
    }

    /// Synchronous save for the explicit "save now" action and session close.
    ///
    /// Goes through the gateway so a snapshot still sitting in the debounce
    /// window is superseded instead of landing on disk afterwards.
    pub fn save_now(&self) {
        self.gateway.save_now(self.save_job());
    }
}

impl crate::web::SnapshotSource for MapSession {
    fn snapshot_png(&mut self) -> BattlematResult<Vec<u8>> {
        crate::render::encode_png(&self.render_player(self.surface_size))
    }
}

impl std::fmt::Debug for MapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapSession")
            .field("name", &self.name)
            .field("base", &self.base.dimensions())
            .field("tokens", &self.registry.len())
            .field("zoom", &self.viewport.zoom)
            .finish_non_exhaustive()
    }
}

fn token_from_record(rec: &TokenRecord) -> Token {
    let entity = (!rec.entity_id.is_empty()).then(|| EntityRef {
        kind: rec.entity_type,
        name: rec.entity_id.clone(),
    });
    Token {
        id: TokenId(0), // re-keyed by the registry
        kind: rec.entity_type,
        entity,
        image_path: rec.image_path.clone(),
        pos: Point::new(rec.x, rec.y),
        size: rec.size,
        border: rec.border_color,
        hp: rec.hp,
        max_hp: rec.max_hp,
    }
}

fn record_from_token(token: &Token) -> TokenRecord {
    TokenRecord {
        entity_type: token.kind,
        entity_id: token.display_name().to_string(),
        image_path: token.image_path.clone(),
        x: token.pos.x,
        y: token.pos.y,
        size: token.size,
        border_color: token.border,
        hp: token.hp,
        max_hp: token.max_hp,
    }
}
