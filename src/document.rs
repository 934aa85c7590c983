use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::color::Color;
use crate::error::{BattlematError, BattlematResult};
use crate::fog::Brush;
use crate::token::{DEFAULT_BORDER, DEFAULT_HP, DEFAULT_TOKEN_SIZE, TokenKind};

/// Persisted form of one placed token.
///
/// This is the canonical wire shape; everything the engine writes uses these
/// field names. Historical shapes are handled in [`legacy`], read-only.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TokenRecord {
    pub entity_type: TokenKind,
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub image_path: String,
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_token_size")]
    pub size: u32,
    #[serde(default = "default_border")]
    pub border_color: Color,
    #[serde(default = "default_hp")]
    pub hp: i32,
    #[serde(default = "default_hp")]
    pub max_hp: i32,
}

fn default_token_size() -> u32 {
    DEFAULT_TOKEN_SIZE
}

fn default_border() -> Color {
    DEFAULT_BORDER
}

fn default_hp() -> i32 {
    DEFAULT_HP
}

/// Persisted form of one map document, as stored by the ModelStore.
///
/// Viewport and brush defaults ride along so the GM surface reopens where it
/// was left. Legacy capitalized keys are accepted on read only.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MapRecord {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Image")]
    pub image_path: String,
    #[serde(default, alias = "FogMaskPath")]
    pub fog_mask_path: Option<String>,
    #[serde(
        default,
        alias = "Tokens",
        deserialize_with = "legacy::tokens_field"
    )]
    pub tokens: Vec<TokenRecord>,
    #[serde(default = "default_token_size")]
    pub token_size: u32,
    #[serde(default = "default_brush_size")]
    pub brush_size: u32,
    #[serde(default = "default_zoom")]
    pub zoom: f64,
    #[serde(default)]
    pub pan_x: f64,
    #[serde(default)]
    pub pan_y: f64,
}

fn default_brush_size() -> u32 {
    Brush::default().size
}

fn default_zoom() -> f64 {
    1.0
}

impl MapRecord {
    pub fn new(name: impl Into<String>, image_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image_path: image_path.into(),
            fog_mask_path: None,
            tokens: Vec::new(),
            token_size: DEFAULT_TOKEN_SIZE,
            brush_size: Brush::default().size,
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

/// External datastore boundary: the campaign's map collection.
///
/// The generic entity editor owns the real implementation; the engine only
/// needs load/save of the full list.
pub trait ModelStore: Send + Sync {
    fn load_items(&self) -> BattlematResult<Vec<MapRecord>>;
    fn save_items(&self, items: &[MapRecord]) -> BattlematResult<()>;
}

/// Replace the record with the same name, or append it, then write through.
pub fn upsert_record(store: &dyn ModelStore, record: MapRecord) -> BattlematResult<()> {
    let mut items = store.load_items()?;
    match items.iter_mut().find(|r| r.name == record.name) {
        Some(existing) => *existing = record,
        None => items.push(record),
    }
    store.save_items(&items)
}

/// File-backed [`ModelStore`]: one JSON array of map records.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ModelStore for JsonFileStore {
    fn load_items(&self) -> BattlematResult<Vec<MapRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("read map store '{}'", self.path.display()))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            BattlematError::serde(format!("map store '{}': {e}", self.path.display()))
        })
    }

    fn save_items(&self, items: &[MapRecord]) -> BattlematResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create store dir '{}'", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(items)
            .map_err(|e| BattlematError::serde(e.to_string()))?;
        // Write-then-rename so a crash mid-write never truncates the store.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)
            .with_context(|| format!("write map store '{}'", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replace map store '{}'", self.path.display()))?;
        Ok(())
    }
}

/// Display record for a token's backing entity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityInfo {
    pub name: String,
    pub portrait_path: Option<String>,
    /// Free-text traits/stats shown in the hover info box.
    pub details: String,
}

/// External lookup boundary: entity kind + name to display record.
///
/// A missing record must never prevent a token from rendering; callers fall
/// back to blank info.
pub trait EntityLookup {
    fn lookup(&self, kind: TokenKind, name: &str) -> Option<EntityInfo>;
}

/// Lookup that knows nothing. Tokens render with blank info.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLookup;

impl EntityLookup for NoLookup {
    fn lookup(&self, _kind: TokenKind, _name: &str) -> Option<EntityInfo> {
        None
    }
}

/// Compatibility shim for historical token payloads.
///
/// Older campaign files stored the token list as an embedded JSON *string*,
/// used `position: [x, y]` instead of `x`/`y`, capitalized entity kinds, and
/// carried freestanding `rectangle`/`oval` shape entries. Everything here is
/// read-only best effort: entries that cannot be understood are logged and
/// dropped, and a payload that cannot be parsed at all yields an empty list
/// rather than a failed map load.
pub mod legacy {
    use serde::Deserialize as _;

    use super::TokenRecord;
    use crate::color::Color;
    use crate::token::TokenKind;

    pub(super) fn tokens_field<'de, D>(deserializer: D) -> Result<Vec<TokenRecord>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(parse_tokens_value(&value))
    }

    /// Parse a token payload in canonical or legacy form.
    pub fn parse_tokens_value(value: &serde_json::Value) -> Vec<TokenRecord> {
        let items = match value {
            serde_json::Value::Null => return Vec::new(),
            serde_json::Value::String(raw) => {
                let raw = raw.trim();
                if raw.is_empty() {
                    return Vec::new();
                }
                match serde_json::from_str::<serde_json::Value>(raw) {
                    Ok(serde_json::Value::Array(items)) => items,
                    Ok(_) => {
                        tracing::warn!("token payload string is not a list; ignoring");
                        return Vec::new();
                    }
                    Err(error) => {
                        tracing::warn!(%error, "token payload string failed to parse; ignoring");
                        return Vec::new();
                    }
                }
            }
            serde_json::Value::Array(items) => items.clone(),
            other => {
                tracing::warn!(kind = %value_kind(other), "unexpected token payload; ignoring");
                return Vec::new();
            }
        };

        let mut out = Vec::with_capacity(items.len());
        for item in &items {
            match token_from_value(item) {
                Some(rec) => out.push(rec),
                None => tracing::warn!("skipping unreadable token entry"),
            }
        }
        out
    }

    fn token_from_value(value: &serde_json::Value) -> Option<TokenRecord> {
        // Canonical records deserialize directly.
        if let Ok(rec) = TokenRecord::deserialize(value) {
            return Some(rec);
        }

        let obj = value.as_object()?;
        let (x, y) = position_of(obj)?;
        let kind = kind_of(obj)?;

        let str_of = |key: &str| obj.get(key).and_then(|v| v.as_str()).unwrap_or_default();
        let int_of = |key: &str, default: i64| {
            obj.get(key).and_then(serde_json::Value::as_i64).unwrap_or(default)
        };

        // Legacy shape entries carry width/height; fold into one edge size.
        let size = match kind {
            TokenKind::Shape => int_of("width", 50).max(int_of("height", 50)),
            _ => int_of("size", i64::from(super::DEFAULT_TOKEN_SIZE)),
        };
        let border = obj
            .get("border_color")
            .and_then(|v| v.as_str())
            .and_then(|s| Color::from_hex(s).ok())
            .unwrap_or(crate::token::DEFAULT_BORDER);

        Some(TokenRecord {
            entity_type: kind,
            entity_id: str_of("entity_id").to_string(),
            image_path: str_of("image_path").to_string(),
            x,
            y,
            size: size.clamp(1, i64::from(u32::MAX)) as u32,
            border_color: border,
            hp: int_of("hp", i64::from(super::DEFAULT_HP)) as i32,
            max_hp: int_of("max_hp", i64::from(super::DEFAULT_HP)) as i32,
        })
    }

    fn position_of(obj: &serde_json::Map<String, serde_json::Value>) -> Option<(f64, f64)> {
        if let Some(pos) = obj.get("position").and_then(|v| v.as_array()) {
            if pos.len() >= 2 {
                return Some((pos[0].as_f64()?, pos[1].as_f64()?));
            }
        }
        let x = obj.get("x").and_then(serde_json::Value::as_f64)?;
        let y = obj.get("y").and_then(serde_json::Value::as_f64)?;
        Some((x, y))
    }

    fn kind_of(obj: &serde_json::Map<String, serde_json::Value>) -> Option<TokenKind> {
        // Legacy entries tagged shapes through `type`; tokens through
        // `entity_type` with capitalized names.
        if let Some(t) = obj.get("type").and_then(|v| v.as_str()) {
            match t {
                "rectangle" | "oval" => return Some(TokenKind::Shape),
                "token" => {}
                other => {
                    tracing::warn!(kind = other, "unknown legacy item type");
                    return None;
                }
            }
        }
        let raw = obj.get("entity_type").and_then(|v| v.as_str())?;
        match raw.to_ascii_lowercase().as_str() {
            "npc" => Some(TokenKind::Npc),
            "creature" => Some(TokenKind::Creature),
            "pc" => Some(TokenKind::Pc),
            "shape" => Some(TokenKind::Shape),
            other => {
                tracing::warn!(kind = other, "unknown legacy entity type");
                None
            }
        }
    }

    fn value_kind(v: &serde_json::Value) -> &'static str {
        match v {
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "bool",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::String(_) => "string",
            serde_json::Value::Array(_) => "array",
            serde_json::Value::Object(_) => "object",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_record_roundtrip() {
        let rec = MapRecord {
            name: "Crypt".into(),
            image_path: "images/crypt.png".into(),
            fog_mask_path: Some("masks/crypt_mask.png".into()),
            tokens: vec![TokenRecord {
                entity_type: TokenKind::Creature,
                entity_id: "Goblin".into(),
                image_path: "portraits/goblin.png".into(),
                x: 100.0,
                y: 100.0,
                size: 48,
                border_color: Color::rgb(0, 0, 255),
                hp: 7,
                max_hp: 10,
            }],
            token_size: 48,
            brush_size: 32,
            zoom: 1.5,
            pan_x: -20.0,
            pan_y: 12.0,
        };
        let json = serde_json::to_string_pretty(&rec).unwrap();
        let back: MapRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn legacy_keys_are_accepted_on_read() {
        let json = r##"{
            "Name": "Keep",
            "Image": "images/keep.png",
            "FogMaskPath": "masks/keep_mask.png",
            "Tokens": "[{\"type\": \"token\", \"entity_type\": \"NPC\", \"entity_id\": \"Bram\", \"image_path\": \"p.png\", \"position\": [40.0, 60.0], \"size\": 64, \"hp\": 5, \"max_hp\": 12, \"border_color\": \"#ff0000\"}]",
            "token_size": 64
        }"##;
        let rec: MapRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.name, "Keep");
        assert_eq!(rec.tokens.len(), 1);
        let t = &rec.tokens[0];
        assert_eq!(t.entity_type, TokenKind::Npc);
        assert_eq!((t.x, t.y), (40.0, 60.0));
        assert_eq!(t.size, 64);
        assert_eq!(t.border_color, Color::rgb(255, 0, 0));
    }

    #[test]
    fn corrupt_token_payload_yields_empty_list() {
        let json = r#"{"name": "Bad", "image_path": "i.png", "tokens": "not json at all ["}"#;
        let rec: MapRecord = serde_json::from_str(json).unwrap();
        assert!(rec.tokens.is_empty());
    }

    #[test]
    fn legacy_shape_entries_become_shape_tokens() {
        let value: serde_json::Value = serde_json::from_str(
            r##"[{"type": "rectangle", "position": [10.0, 20.0], "width": 50, "height": 80, "border_color": "#000000"}]"##,
        )
        .unwrap();
        let tokens = legacy::parse_tokens_value(&value);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].entity_type, TokenKind::Shape);
        assert_eq!(tokens[0].size, 80);
        assert_eq!((tokens[0].x, tokens[0].y), (10.0, 20.0));
    }

    #[test]
    fn unreadable_entries_are_skipped_not_fatal() {
        let value: serde_json::Value = serde_json::from_str(
            r#"[{"entity_type": "dragonkin", "x": 1.0, "y": 2.0}, {"entity_type": "pc", "x": 3.0, "y": 4.0}]"#,
        )
        .unwrap();
        let tokens = legacy::parse_tokens_value(&value);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].entity_type, TokenKind::Pc);
    }

    #[test]
    fn no_lookup_always_misses() {
        assert_eq!(NoLookup.lookup(TokenKind::Npc, "Bram"), None);
    }

    #[test]
    fn json_store_roundtrip_and_upsert() {
        let dir = std::env::temp_dir().join(format!(
            "battlemat_store_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let store = JsonFileStore::new(dir.join("maps.json"));

        assert!(store.load_items().unwrap().is_empty());
        upsert_record(&store, MapRecord::new("A", "a.png")).unwrap();
        upsert_record(&store, MapRecord::new("B", "b.png")).unwrap();
        let mut updated = MapRecord::new("A", "a2.png");
        updated.token_size = 96;
        upsert_record(&store, updated).unwrap();

        let items = store.load_items().unwrap();
        assert_eq!(items.len(), 2);
        let a = items.iter().find(|r| r.name == "A").unwrap();
        assert_eq!(a.image_path, "a2.png");
        assert_eq!(a.token_size, 96);

        std::fs::remove_dir_all(&dir).ok();
    }
}
