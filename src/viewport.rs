pub use kurbo::{Point, Vec2};

/// Zoom bounds and wheel step shared by every interactive surface.
pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 3.0;
pub const ZOOM_STEP: f64 = 0.1;

/// Per-surface view state: zoom factor plus pan offset in screen pixels.
///
/// World space is the base image's pixel grid; screen space is the rendered
/// surface. Token and fog coordinates are always stored in world space so
/// they survive any amount of pan/zoom.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub zoom: f64,
    pub pan: Vec2,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Vec2::ZERO,
        }
    }
}

impl Viewport {
    pub fn new(zoom: f64, pan_x: f64, pan_y: f64) -> Self {
        Self {
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            pan: Vec2::new(pan_x, pan_y),
        }
    }

    pub fn world_to_screen(&self, world: Point) -> Point {
        Point::new(
            world.x * self.zoom + self.pan.x,
            world.y * self.zoom + self.pan.y,
        )
    }

    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.pan.x) / self.zoom,
            (screen.y - self.pan.y) / self.zoom,
        )
    }

    /// Apply `notches` wheel steps of zoom anchored on `cursor` (screen space).
    ///
    /// The world point under the cursor is captured before the zoom change and
    /// the pan is recomputed afterwards so that point maps back to the same
    /// screen pixel. Zoom is clamped; pan is unconstrained.
    pub fn zoom_about(&mut self, cursor: Point, notches: f64) {
        let anchor = self.screen_to_world(cursor);
        let factor = 1.0 + ZOOM_STEP * notches;
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = Vec2::new(
            cursor.x - anchor.x * self.zoom,
            cursor.y - anchor.y * self.zoom,
        );
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Recenter so `world` sits in the middle of a surface of `size` pixels.
    pub fn center_on(&mut self, world: Point, size: (u32, u32)) {
        self.pan = Vec2::new(
            f64::from(size.0) / 2.0 - world.x * self.zoom,
            f64::from(size.1) / 2.0 - world.y * self.zoom,
        );
    }

    /// World point currently at the middle of a surface of `size` pixels.
    ///
    /// New and pasted tokens land here.
    pub fn visible_center(&self, size: (u32, u32)) -> Point {
        self.screen_to_world(Point::new(
            f64::from(size.0) / 2.0,
            f64::from(size.1) / 2.0,
        ))
    }
}
