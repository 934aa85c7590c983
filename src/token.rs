use kurbo::Point;

use crate::color::Color;

/// Token edge size clamp, in world pixels. Keeps resizes out of degenerate
/// raster territory.
pub const MIN_TOKEN_SIZE: u32 = 8;
pub const MAX_TOKEN_SIZE: u32 = 512;

pub const DEFAULT_TOKEN_SIZE: u32 = 48;
pub const DEFAULT_HP: i32 = 10;

/// Default border for newly placed tokens (blue, as the table expects).
pub const DEFAULT_BORDER: Color = Color::rgb(0x00, 0x00, 0xff);

/// Session-local token identity.
///
/// Never persisted; records are re-keyed on every load. Sprites, selection
/// and hit-testing all go through this id rather than list position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Npc,
    Creature,
    Pc,
    /// Plain annotation marker with no backing entity or sprite asset.
    Shape,
}

/// Link to an external entity record, resolved lazily through
/// [`crate::document::EntityLookup`] for display text.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EntityRef {
    pub kind: TokenKind,
    pub name: String,
}

/// A placed marker. Position is world space, never screen space, so it is
/// stable across zoom/pan changes on every surface.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub id: TokenId,
    pub kind: TokenKind,
    pub entity: Option<EntityRef>,
    pub image_path: String,
    pub pos: Point,
    pub size: u32,
    pub border: Color,
    pub hp: i32,
    pub max_hp: i32,
}

impl Token {
    /// Current hp clamped into `[0, max_hp]`.
    pub fn set_hp(&mut self, value: i32) {
        self.hp = value.clamp(0, self.max_hp);
    }

    /// Relative hp edit (the inline `+5` / `-3` entry), clamped the same way.
    pub fn apply_hp_delta(&mut self, delta: i32) {
        self.set_hp(self.hp.saturating_add(delta));
    }

    /// Max hp clamped to at least 1; current hp is re-clamped if the new max
    /// is below it. Raising the max never changes current hp.
    pub fn set_max_hp(&mut self, value: i32) {
        self.max_hp = value.max(1);
        self.hp = self.hp.clamp(0, self.max_hp);
    }

    pub fn hp_ratio(&self) -> f32 {
        if self.max_hp <= 0 {
            return 1.0;
        }
        self.hp as f32 / self.max_hp as f32
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0
    }

    pub fn display_name(&self) -> &str {
        self.entity.as_ref().map_or("", |e| e.name.as_str())
    }
}

/// Everything needed to recreate a token somewhere else. Position is
/// deliberately absent: paste always lands at the viewport's visible center.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipboardEntry {
    pub kind: TokenKind,
    pub entity: Option<EntityRef>,
    pub image_path: String,
    pub size: u32,
    pub border: Color,
    pub hp: i32,
    pub max_hp: i32,
}

/// Ordered collection of placed tokens plus the single-selection model.
///
/// Order is z-order: later entries draw on top.
#[derive(Clone, Debug, Default)]
pub struct TokenRegistry {
    tokens: Vec<Token>,
    next_id: u64,
    selected: Option<TokenId>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, id: TokenId) -> Option<&Token> {
        self.tokens.iter().find(|t| t.id == id)
    }

    pub fn get_mut(&mut self, id: TokenId) -> Option<&mut Token> {
        self.tokens.iter_mut().find(|t| t.id == id)
    }

    /// Place a token at `pos` and return its id. Callers resolve the sprite
    /// asset first; the registry itself never touches the filesystem.
    pub fn insert(
        &mut self,
        kind: TokenKind,
        entity: Option<EntityRef>,
        image_path: String,
        pos: Point,
        size: u32,
    ) -> TokenId {
        let id = TokenId(self.next_id);
        self.next_id += 1;
        self.tokens.push(Token {
            id,
            kind,
            entity,
            image_path,
            pos,
            size: size.clamp(MIN_TOKEN_SIZE, MAX_TOKEN_SIZE),
            border: DEFAULT_BORDER,
            hp: DEFAULT_HP,
            max_hp: DEFAULT_HP,
        });
        id
    }

    /// Re-add a fully specified token (load and paste paths).
    pub fn insert_full(&mut self, mut token: Token) -> TokenId {
        let id = TokenId(self.next_id);
        self.next_id += 1;
        token.id = id;
        token.size = token.size.clamp(MIN_TOKEN_SIZE, MAX_TOKEN_SIZE);
        token.max_hp = token.max_hp.max(1);
        token.hp = token.hp.clamp(0, token.max_hp);
        self.tokens.push(token);
        id
    }

    /// Move to a new world position. No bounds checking: tokens may be
    /// dragged off-canvas and remain addressable.
    pub fn move_to(&mut self, id: TokenId, pos: Point) -> bool {
        match self.get_mut(id) {
            Some(t) => {
                t.pos = pos;
                true
            }
            None => false,
        }
    }

    /// Resize, clamped to `[MIN_TOKEN_SIZE, MAX_TOKEN_SIZE]`. Returns the
    /// applied size so callers can re-derive the sprite.
    pub fn resize(&mut self, id: TokenId, size: u32) -> Option<u32> {
        let t = self.get_mut(id)?;
        t.size = size.clamp(MIN_TOKEN_SIZE, MAX_TOKEN_SIZE);
        Some(t.size)
    }

    pub fn recolor_border(&mut self, id: TokenId, color: Color) -> bool {
        match self.get_mut(id) {
            Some(t) => {
                t.border = color;
                true
            }
            None => false,
        }
    }

    pub fn delete(&mut self, id: TokenId) -> Option<Token> {
        let idx = self.tokens.iter().position(|t| t.id == id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Some(self.tokens.remove(idx))
    }

    /// Mark `id` as the selected token (most recent press wins). At most one
    /// token is selected at a time.
    pub fn select(&mut self, id: Option<TokenId>) {
        self.selected = id.filter(|id| self.get(*id).is_some());
    }

    pub fn selected(&self) -> Option<&Token> {
        self.selected.and_then(|id| self.get(id))
    }

    pub fn selected_id(&self) -> Option<TokenId> {
        self.selected
    }

    /// Snapshot the fields needed to recreate a token.
    pub fn copy(&self, id: TokenId) -> Option<ClipboardEntry> {
        let t = self.get(id)?;
        Some(ClipboardEntry {
            kind: t.kind,
            entity: t.entity.clone(),
            image_path: t.image_path.clone(),
            size: t.size,
            border: t.border,
            hp: t.hp,
            max_hp: t.max_hp,
        })
    }

    /// Materialize a clipboard entry at `pos` (the paste surface's visible
    /// center). The new token's position is independent of the original.
    pub fn paste(&mut self, entry: &ClipboardEntry, pos: Point) -> TokenId {
        self.insert_full(Token {
            id: TokenId(0), // replaced by insert_full
            kind: entry.kind,
            entity: entry.entity.clone(),
            image_path: entry.image_path.clone(),
            pos,
            size: entry.size,
            border: entry.border,
            hp: entry.hp,
            max_hp: entry.max_hp,
        })
    }

    pub fn bring_to_front(&mut self, id: TokenId) -> bool {
        let Some(idx) = self.tokens.iter().position(|t| t.id == id) else {
            return false;
        };
        let t = self.tokens.remove(idx);
        self.tokens.push(t);
        true
    }

    pub fn send_to_back(&mut self, id: TokenId) -> bool {
        let Some(idx) = self.tokens.iter().position(|t| t.id == id) else {
            return false;
        };
        let t = self.tokens.remove(idx);
        self.tokens.insert(0, t);
        true
    }

    /// Topmost token whose square footprint covers `world`, if any.
    pub fn hit_test(&self, world: Point) -> Option<TokenId> {
        self.tokens.iter().rev().find_map(|t| {
            let s = f64::from(t.size);
            let inside = world.x >= t.pos.x
                && world.x < t.pos.x + s
                && world.y >= t.pos.y
                && world.y < t.pos.y + s;
            inside.then_some(t.id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_one() -> (TokenRegistry, TokenId) {
        let mut reg = TokenRegistry::new();
        let id = reg.insert(
            TokenKind::Creature,
            Some(EntityRef {
                kind: TokenKind::Creature,
                name: "Goblin".into(),
            }),
            "goblin.png".into(),
            Point::new(100.0, 100.0),
            48,
        );
        (reg, id)
    }

    #[test]
    fn hp_clamps_both_directions() {
        let (mut reg, id) = registry_with_one();
        let t = reg.get_mut(id).unwrap();
        t.set_hp(99);
        assert_eq!(t.hp, 10);
        t.set_hp(-5);
        assert_eq!(t.hp, 0);
        t.set_hp(7);
        t.set_max_hp(20);
        assert_eq!(t.hp, 7, "raising max must not change current hp");
        t.set_max_hp(3);
        assert_eq!(t.hp, 3, "lowering max clamps current hp down");
        t.set_max_hp(0);
        assert_eq!(t.max_hp, 1);
    }

    #[test]
    fn hp_delta_applies_relative_edits() {
        let (mut reg, id) = registry_with_one();
        let t = reg.get_mut(id).unwrap();
        t.apply_hp_delta(-3);
        assert_eq!(t.hp, 7);
        t.apply_hp_delta(100);
        assert_eq!(t.hp, 10);
    }

    #[test]
    fn resize_clamps_to_sane_range() {
        let (mut reg, id) = registry_with_one();
        assert_eq!(reg.resize(id, 4), Some(MIN_TOKEN_SIZE));
        assert_eq!(reg.resize(id, 9999), Some(MAX_TOKEN_SIZE));
        assert_eq!(reg.resize(id, 64), Some(64));
    }

    #[test]
    fn copy_paste_clones_fields_but_not_position() {
        let (mut reg, id) = registry_with_one();
        {
            let t = reg.get_mut(id).unwrap();
            t.border = Color::rgb(255, 0, 0);
            t.set_hp(4);
        }
        let entry = reg.copy(id).unwrap();
        let pasted = reg.paste(&entry, Point::new(300.0, 300.0));
        let (a, b) = (reg.get(id).unwrap(), reg.get(pasted).unwrap());
        assert_ne!(a.id, b.id);
        assert_eq!(b.pos, Point::new(300.0, 300.0));
        assert_eq!(a.pos, Point::new(100.0, 100.0));
        assert_eq!(b.size, a.size);
        assert_eq!(b.border, a.border);
        assert_eq!(b.hp, a.hp);
        assert_eq!(b.max_hp, a.max_hp);
    }

    #[test]
    fn selection_is_single_and_cleared_on_delete() {
        let (mut reg, id) = registry_with_one();
        let other = reg.insert(
            TokenKind::Shape,
            None,
            String::new(),
            Point::new(0.0, 0.0),
            32,
        );
        reg.select(Some(id));
        reg.select(Some(other));
        assert_eq!(reg.selected_id(), Some(other));
        reg.delete(other);
        assert_eq!(reg.selected_id(), None);
    }

    #[test]
    fn z_order_ops_reorder_draw_list() {
        let (mut reg, first) = registry_with_one();
        let second = reg.insert(
            TokenKind::Pc,
            None,
            "pc.png".into(),
            Point::new(0.0, 0.0),
            48,
        );
        assert!(reg.bring_to_front(first));
        let order: Vec<TokenId> = reg.iter().map(|t| t.id).collect();
        assert_eq!(order, vec![second, first]);
        assert!(reg.send_to_back(first));
        let order: Vec<TokenId> = reg.iter().map(|t| t.id).collect();
        assert_eq!(order, vec![first, second]);
    }

    #[test]
    fn hit_test_prefers_topmost() {
        let (mut reg, bottom) = registry_with_one();
        let top = reg.insert(
            TokenKind::Npc,
            None,
            "npc.png".into(),
            Point::new(110.0, 110.0),
            48,
        );
        assert_eq!(reg.hit_test(Point::new(120.0, 120.0)), Some(top));
        assert_eq!(reg.hit_test(Point::new(101.0, 101.0)), Some(bottom));
        assert_eq!(reg.hit_test(Point::new(500.0, 500.0)), None);
    }

    #[test]
    fn move_allows_off_canvas_positions() {
        let (mut reg, id) = registry_with_one();
        assert!(reg.move_to(id, Point::new(-400.0, 9000.0)));
        assert_eq!(reg.get(id).unwrap().pos, Point::new(-400.0, 9000.0));
    }
}
