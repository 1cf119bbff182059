use crate::*;

pub type Color = [u8; 3];

fn set_pixel(image: &mut Image, x: i64, y: i64, color: Color) {
    if x < 0 || y < 0 || x as usize >= image.width() || y as usize >= image.height() {
        return;
    }
    let idx = (y as usize * image.width() + x as usize) * 3;
    image.data[idx..idx + 3].copy_from_slice(&color);
}

/// Draw a line with Bresenham's algorithm; pixels outside the frame are skipped.
pub fn draw_line(image: &mut Image, x0: i32, y0: i32, x1: i32, y1: i32, color: Color) {
    if image.format != PixelFormat::Rgb8 {
        return;
    }
    let (w, h) = (image.width() as i64, image.height() as i64);
    let (x0, y0, x1, y1) = (x0 as i64, y0 as i64, x1 as i64, y1 as i64);
    // both ends past the same edge: nothing to draw
    if (x0 < 0 && x1 < 0) || (y0 < 0 && y1 < 0) || (x0 >= w && x1 >= w) || (y0 >= h && y1 >= h) {
        return;
    }
    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx - dy;
    let (mut x, mut y) = (x0, y0);

    loop {
        set_pixel(image, x, y, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }
}

/// Draw an axis-aligned rectangle outline, `thickness` pixels wide, growing inward.
///
/// Corners are clamped to the frame first, so a box reaching past an edge is
/// outlined along that edge. Boxes entirely outside the frame draw nothing.
pub fn draw_rect(image: &mut Image, x1: i32, y1: i32, x2: i32, y2: i32, thickness: i32, color: Color) {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let (left, right) = (x1.min(x2) as i64, x1.max(x2) as i64);
    let (top, bottom) = (y1.min(y2) as i64, y1.max(y2) as i64);
    if w == 0 || h == 0 || right < 0 || bottom < 0 || left >= w || top >= h {
        return;
    }
    let (left, right) = (left.max(0), right.min(w - 1));
    let (top, bottom) = (top.max(0), bottom.min(h - 1));
    for t in 0..thickness.max(1) as i64 {
        if left + t > right - t || top + t > bottom - t {
            break;
        }
        let (l, r, tp, b) = ((left + t) as i32, (right - t) as i32, (top + t) as i32, (bottom - t) as i32);
        draw_line(image, l, tp, r, tp, color);
        draw_line(image, l, b, r, b, color);
        draw_line(image, l, tp, l, b, color);
        draw_line(image, r, tp, r, b, color);
    }
}

/// Stable, well separated color for a track identifier.
pub fn track_color(id: u32) -> Color {
    const PALETTE: [Color; 8] = [
        [255, 64, 64],
        [64, 255, 64],
        [64, 128, 255],
        [255, 255, 0],
        [255, 0, 255],
        [0, 255, 255],
        [255, 160, 0],
        [160, 96, 255],
    ];
    PALETTE[id as usize % PALETTE.len()]
}
