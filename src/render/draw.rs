use image::{Rgba, RgbaImage};

#[inline]
fn mul_div255(a: u32, b: u32) -> u32 {
    (a * b + 127) / 255
}

/// Straight-alpha `over` blend of one source pixel onto the destination.
#[inline]
pub fn blend_pixel(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let sa = u32::from(src.0[3]);
    if sa == 0 {
        return;
    }
    if sa == 255 {
        *dst = src;
        return;
    }
    let inv = 255 - sa;
    for c in 0..3 {
        let s = u32::from(src.0[c]);
        let d = u32::from(dst.0[c]);
        dst.0[c] = (mul_div255(s, sa) + mul_div255(d, inv)) as u8;
    }
    let da = u32::from(dst.0[3]);
    dst.0[3] = (sa + mul_div255(da, inv)) as u8;
}

/// Blend `src` onto `dst` with its top-left corner at `(x, y)`.
///
/// Regions outside the destination are clipped; negative offsets are fine.
pub fn blit(dst: &mut RgbaImage, src: &RgbaImage, x: i64, y: i64) {
    let (dw, dh) = (i64::from(dst.width()), i64::from(dst.height()));
    let (sw, sh) = (i64::from(src.width()), i64::from(src.height()));

    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + sw).min(dw);
    let y1 = (y + sh).min(dh);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    for dy in y0..y1 {
        for dx in x0..x1 {
            let s = *src.get_pixel((dx - x) as u32, (dy - y) as u32);
            blend_pixel(dst.get_pixel_mut(dx as u32, dy as u32), s);
        }
    }
}

/// Fill an axis-aligned rectangle, clipped to the canvas.
pub fn fill_rect(dst: &mut RgbaImage, x: i64, y: i64, w: i64, h: i64, color: Rgba<u8>) {
    let (dw, dh) = (i64::from(dst.width()), i64::from(dst.height()));
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + w).min(dw);
    let y1 = (y + h).min(dh);
    for py in y0..y1 {
        for px in x0..x1 {
            blend_pixel(dst.get_pixel_mut(px as u32, py as u32), color);
        }
    }
}

/// Rectangle outline of the given stroke thickness, drawn inward.
pub fn stroke_rect(
    dst: &mut RgbaImage,
    x: i64,
    y: i64,
    w: i64,
    h: i64,
    thickness: i64,
    color: Rgba<u8>,
) {
    let t = thickness.min(w / 2 + 1).min(h / 2 + 1).max(1);
    fill_rect(dst, x, y, w, t, color);
    fill_rect(dst, x, y + h - t, w, t, color);
    fill_rect(dst, x, y + t, t, h - 2 * t, color);
    fill_rect(dst, x + w - t, y + t, t, h - 2 * t, color);
}

/// Filled circle, clipped to the canvas. Pixel centers inside the radius are
/// covered.
pub fn fill_circle(dst: &mut RgbaImage, cx: i64, cy: i64, radius: i64, color: Rgba<u8>) {
    let r2 = radius * radius;
    for py in (cy - radius)..=(cy + radius) {
        for px in (cx - radius)..=(cx + radius) {
            let (dx, dy) = (px - cx, py - cy);
            if dx * dx + dy * dy <= r2 {
                fill_rect(dst, px, py, 1, 1, color);
            }
        }
    }
}

/// Thick line between two points, used for the dead-token cross.
pub fn draw_line(
    dst: &mut RgbaImage,
    from: (i64, i64),
    to: (i64, i64),
    thickness: i64,
    color: Rgba<u8>,
) {
    let (mut x0, mut y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let half = thickness.max(1) / 2;
    loop {
        fill_rect(
            dst,
            x0 - half,
            y0 - half,
            thickness.max(1),
            thickness.max(1),
            color,
        );
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_source_replaces_destination() {
        let mut d = Rgba([10, 20, 30, 255]);
        blend_pixel(&mut d, Rgba([200, 100, 50, 255]));
        assert_eq!(d.0, [200, 100, 50, 255]);
    }

    #[test]
    fn transparent_source_is_a_noop() {
        let mut d = Rgba([10, 20, 30, 255]);
        blend_pixel(&mut d, Rgba([200, 100, 50, 0]));
        assert_eq!(d.0, [10, 20, 30, 255]);
    }

    #[test]
    fn half_alpha_blends_midway() {
        let mut d = Rgba([0, 0, 0, 255]);
        blend_pixel(&mut d, Rgba([255, 255, 255, 128]));
        assert!(d.0[0] >= 127 && d.0[0] <= 129);
        assert_eq!(d.0[3], 255);
    }

    #[test]
    fn blit_clips_negative_offsets() {
        let mut canvas = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]));
        let src = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        blit(&mut canvas, &src, -2, -2);
        assert_eq!(canvas.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(1, 1).0, [255, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(2, 2).0, [0, 0, 0, 255]);
    }

    #[test]
    fn stroke_rect_leaves_interior_untouched() {
        let mut canvas = RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 255]));
        stroke_rect(&mut canvas, 2, 2, 12, 12, 2, Rgba([0, 0, 255, 255]));
        assert_eq!(canvas.get_pixel(2, 2).0, [0, 0, 255, 255]);
        assert_eq!(canvas.get_pixel(8, 8).0, [0, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(13, 13).0, [0, 0, 255, 255]);
    }

    #[test]
    fn circle_covers_center_not_corners() {
        let mut canvas = RgbaImage::from_pixel(32, 32, Rgba([0, 0, 0, 255]));
        fill_circle(&mut canvas, 16, 16, 8, Rgba([0, 255, 0, 255]));
        assert_eq!(canvas.get_pixel(16, 16).0, [0, 255, 0, 255]);
        assert_eq!(canvas.get_pixel(16, 8).0, [0, 255, 0, 255]);
        assert_eq!(canvas.get_pixel(8, 8).0, [0, 0, 0, 255]);
    }

    #[test]
    fn line_reaches_both_endpoints() {
        let mut canvas = RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 255]));
        draw_line(&mut canvas, (1, 1), (14, 14), 1, Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(1, 1).0, [255, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(14, 14).0, [255, 0, 0, 255]);
    }
}
