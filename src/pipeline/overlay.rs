//! Draws tracking state onto an RGBA camera frame.
//!
//! All coordinates are frame pixels; points outside the frame are clipped
//! per pixel, so partially visible hands still draw.

use rayon::prelude::*;

use crate::{
    tracking::Trail,
    types::{Cursor, ScreenPoint},
};

/// Bone pairs of the 21-point hand topology.
pub const CONNECTIONS: &[(usize, usize)] = &[
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (0, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (0, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    (5, 9),
    (9, 13),
    (13, 17),
];

const SKELETON_LINE_THICKNESS: i32 = 3;
const JOINT_RADIUS: i32 = 4;

const SELECTED_LINE_COLOR: [u8; 4] = [56, 189, 248, 255];
const SELECTED_JOINT_COLOR: [u8; 4] = [248, 113, 113, 255];
const OTHER_LINE_COLOR: [u8; 4] = [148, 163, 184, 180];
const OTHER_JOINT_COLOR: [u8; 4] = [100, 116, 139, 180];
const TRAIL_COLOR: [u8; 3] = [250, 204, 21];
const CURSOR_FILL: [u8; 4] = [34, 197, 94, 170];
const CURSOR_RING: [u8; 4] = [240, 253, 244, 255];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlayOptions {
    pub skeleton: bool,
    pub trail: bool,
    pub cursor: bool,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            skeleton: true,
            trail: true,
            cursor: true,
        }
    }
}

/// Everything the overlay needs for one frame, already in frame pixels.
pub struct Overlay<'a> {
    pub hands: &'a [Vec<ScreenPoint>],
    pub selected: Option<usize>,
    pub trail: &'a Trail,
    pub cursor: Option<Cursor>,
}

impl Overlay<'_> {
    /// Skeletons go first, then the trail, then the cursor on top.
    pub fn draw(&self, buffer: &mut [u8], width: u32, height: u32, options: OverlayOptions) {
        let mut canvas = Canvas {
            buffer,
            width,
            height,
        };

        if options.skeleton {
            for (idx, points) in self.hands.iter().enumerate() {
                if Some(idx) != self.selected {
                    canvas.skeleton(points, OTHER_LINE_COLOR, OTHER_JOINT_COLOR);
                }
            }
            if let Some(points) = self.selected.and_then(|idx| self.hands.get(idx)) {
                canvas.skeleton(points, SELECTED_LINE_COLOR, SELECTED_JOINT_COLOR);
            }
        }

        if options.trail {
            for segment in self.trail.segments() {
                let [r, g, b] = TRAIL_COLOR;
                canvas.line(
                    segment.from,
                    segment.to,
                    [r, g, b, segment.alpha()],
                    segment.width.round() as i32,
                );
            }
        }

        if options.cursor {
            if let Some(cursor) = self.cursor {
                let radius = (cursor.depth_size / 2.0).round() as i32;
                canvas.disc(cursor.position, radius, CURSOR_FILL);
                canvas.ring(cursor.position, radius, CURSOR_RING);
            }
        }
    }
}

/// Flips an RGBA image horizontally in place.
pub fn mirror_rgba(buffer: &mut [u8], width: u32) {
    let row_len = width as usize * 4;
    if row_len == 0 {
        return;
    }
    buffer.par_chunks_exact_mut(row_len).for_each(|row| {
        let (mut left, mut right) = (0usize, width as usize - 1);
        while left < right {
            for c in 0..4 {
                row.swap(left * 4 + c, right * 4 + c);
            }
            left += 1;
            right -= 1;
        }
    });
}

struct Canvas<'a> {
    buffer: &'a mut [u8],
    width: u32,
    height: u32,
}

impl Canvas<'_> {
    fn skeleton(&mut self, points: &[ScreenPoint], line: [u8; 4], joint: [u8; 4]) {
        if points.len() < 2 {
            return;
        }
        for &(a, b) in CONNECTIONS {
            if let (Some(&pa), Some(&pb)) = (points.get(a), points.get(b)) {
                self.line(pa, pb, line, SKELETON_LINE_THICKNESS);
            }
        }
        for &p in points {
            self.disc(p, JOINT_RADIUS, joint);
        }
    }

    // Bresenham with a diamond brush; each pixel is blended once per step.
    fn line(&mut self, p0: ScreenPoint, p1: ScreenPoint, color: [u8; 4], thickness: i32) {
        let (mut x0, mut y0) = (p0.x as i32, p0.y as i32);
        let (x1, y1) = (p1.x as i32, p1.y as i32);
        let dx = (x1 - x0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let dy = -(y1 - y0).abs();
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let radius = (thickness.max(1) - 1) / 2;

        loop {
            for ox in -radius..=radius {
                for oy in -radius..=radius {
                    if ox.abs() + oy.abs() <= radius {
                        self.blend(x0 + ox, y0 + oy, color);
                    }
                }
            }
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

    fn disc(&mut self, center: ScreenPoint, radius: i32, color: [u8; 4]) {
        let (cx, cy) = (center.x.round() as i32, center.y.round() as i32);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.blend(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn ring(&mut self, center: ScreenPoint, radius: i32, color: [u8; 4]) {
        let (cx, cy) = (center.x.round() as i32, center.y.round() as i32);
        let inner = (radius - 2).max(0);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let d2 = dx * dx + dy * dy;
                if d2 <= radius * radius && d2 > inner * inner {
                    self.blend(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn blend(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if x < 0 || y < 0 {
            return;
        }
        let (ux, uy) = (x as u32, y as u32);
        if ux >= self.width || uy >= self.height {
            return;
        }
        let idx = ((uy * self.width + ux) as usize) * 4;
        let Some(px) = self.buffer.get_mut(idx..idx + 4) else {
            return;
        };
        let alpha = color[3] as u32;
        for c in 0..3 {
            let src = color[c] as u32;
            let dst = px[c] as u32;
            px[c] = ((src * alpha + dst * (255 - alpha) + 127) / 255) as u8;
        }
        px[3] = 255;
    }
}
