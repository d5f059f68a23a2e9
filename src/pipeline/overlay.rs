use rayon::prelude::*;

use crate::{
    keyboard::{FrameOutput, KeyRenderState, KeyboardLayout, session::Cursor},
    types::ScreenPoint,
};

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

const BACKGROUND: [u8; 4] = [15, 20, 25, 255];
const KEY_IDLE: [u8; 4] = [45, 55, 72, 255];
const KEY_HOVERED: [u8; 4] = [245, 158, 11, 255];
const KEY_GLOWING: [u8; 4] = [16, 185, 129, 255];
const KEY_BORDER: [u8; 4] = [100, 116, 139, 255];
const SKELETON_COLOR: [u8; 4] = [56, 189, 248, 255];
const SKELETON_INACTIVE: [u8; 4] = [71, 85, 105, 255];
const CURSOR_COLOR: [u8; 4] = [239, 68, 68, 255];
const CURSOR_POINTING: [u8; 4] = [250, 204, 21, 255];

const SKELETON_LINE_THICKNESS: i32 = 3;
const CURSOR_RADIUS: i32 = 8;

/// RGBA canvas the keyboard, skeletons and fingertip cursors are drawn on.
/// Canvas pixels are surface pixels, so layout rects draw as-is.
pub struct OverlayCanvas {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl OverlayCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        let mut canvas = Self {
            width,
            height,
            rgba: vec![0; (width as usize) * (height as usize) * 4],
        };
        canvas.clear();
        canvas
    }

    pub fn clear(&mut self) {
        self.rgba
            .par_chunks_exact_mut(4)
            .for_each(|px| px.copy_from_slice(&BACKGROUND));
    }

    /// Redraws everything for one frame. `output` may be `None` when no frame
    /// has been processed yet; keys are then drawn idle.
    pub fn render(&mut self, layout: &KeyboardLayout, output: Option<&FrameOutput>) {
        self.clear();

        for (idx, key) in layout.keys().iter().enumerate() {
            let state = output
                .and_then(|out| out.key_states.get(idx).copied())
                .unwrap_or_default();
            let fill = match state {
                KeyRenderState::None => KEY_IDLE,
                KeyRenderState::Hovered => KEY_HOVERED,
                KeyRenderState::Glowing => KEY_GLOWING,
            };
            let r = key.rect;
            self.fill_rect(r.x, r.y, r.x + r.width, r.y + r.height, fill);
            self.draw_rect(r.x, r.y, r.x + r.width, r.y + r.height, KEY_BORDER, 2);
        }

        if let Some(output) = output {
            for cursor in &output.cursors {
                self.draw_cursor(cursor);
            }
        }
    }

    fn draw_cursor(&mut self, cursor: &Cursor) {
        let line_color = if cursor.tracked {
            SKELETON_COLOR
        } else {
            SKELETON_INACTIVE
        };
        for &(a, b) in CONNECTIONS {
            if let (Some(pa), Some(pb)) = (cursor.skeleton.get(a), cursor.skeleton.get(b)) {
                self.draw_line(*pa, *pb, line_color, SKELETON_LINE_THICKNESS);
            }
        }

        let dot = if cursor.gesture.pointing {
            CURSOR_POINTING
        } else {
            CURSOR_COLOR
        };
        self.draw_circle(
            (cursor.point.x as i32, cursor.point.y as i32),
            CURSOR_RADIUS,
            dot,
        );
    }

    fn fill_rect(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: [u8; 4]) {
        let x_start = x1.max(0.0) as u32;
        let y_start = y1.max(0.0) as u32;
        let x_end = (x2.max(0.0) as u32).min(self.width);
        let y_end = (y2.max(0.0) as u32).min(self.height);
        let stride = self.width as usize * 4;
        for y in y_start..y_end {
            let row = y as usize * stride;
            for x in x_start..x_end {
                let idx = row + x as usize * 4;
                self.rgba[idx..idx + 4].copy_from_slice(&color);
            }
        }
    }

    fn draw_rect(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: [u8; 4], thickness: i32) {
        let corners = [
            ScreenPoint::new(x1, y1),
            ScreenPoint::new(x2, y1),
            ScreenPoint::new(x2, y2),
            ScreenPoint::new(x1, y2),
        ];
        for i in 0..corners.len() {
            let next = corners[(i + 1) % corners.len()];
            self.draw_line(corners[i], next, color, thickness);
        }
    }

    fn draw_line(&mut self, p0: ScreenPoint, p1: ScreenPoint, color: [u8; 4], thickness: i32) {
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
                        self.put_pixel(x0 + ox, y0 + oy, color);
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

    fn draw_circle(&mut self, center: (i32, i32), radius: i32, color: [u8; 4]) {
        let (cx, cy) = center;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.put_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn put_pixel(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if x < 0 || y < 0 {
            return;
        }
        let (ux, uy) = (x as u32, y as u32);
        if ux >= self.width || uy >= self.height {
            return;
        }
        let idx = ((uy * self.width + ux) as usize) * 4;
        if idx + 3 < self.rgba.len() {
            self.rgba[idx..idx + 4].copy_from_slice(&color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gesture::Gesture,
        keyboard::layout::{KeyLabel, KeyRect, KeyRegion},
        types::HandSlot,
    };

    impl OverlayCanvas {
        fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
            if x >= self.width || y >= self.height {
                return None;
            }
            let idx = ((y * self.width + x) as usize) * 4;
            self.rgba
                .get(idx..idx + 4)
                .map(|px| [px[0], px[1], px[2], px[3]])
        }
    }

    fn layout() -> KeyboardLayout {
        KeyboardLayout::new(vec![
            KeyRegion {
                label: KeyLabel::Char('A'),
                rect: KeyRect::new(10.0, 10.0, 30.0, 30.0),
            },
            KeyRegion {
                label: KeyLabel::Char('B'),
                rect: KeyRect::new(50.0, 10.0, 30.0, 30.0),
            },
        ])
    }

    #[test]
    fn idle_keys_without_output() {
        let mut canvas = OverlayCanvas::new(100, 60);
        canvas.render(&layout(), None);
        assert_eq!(canvas.pixel(25, 25), Some(KEY_IDLE));
        assert_eq!(canvas.pixel(45, 50), Some(BACKGROUND));
        assert_eq!(canvas.pixel(100, 0), None);
    }

    #[test]
    fn key_states_and_cursor_are_drawn() {
        let mut canvas = OverlayCanvas::new(100, 60);
        let output = FrameOutput {
            key_states: vec![KeyRenderState::Hovered, KeyRenderState::Glowing],
            cursors: vec![Cursor {
                slot: HandSlot::Left,
                point: ScreenPoint::new(50.0, 52.0),
                gesture: Gesture {
                    pointing: true,
                    open: false,
                },
                skeleton: Vec::new(),
                tracked: true,
            }],
            ..FrameOutput::default()
        };
        canvas.render(&layout(), Some(&output));
        assert_eq!(canvas.pixel(25, 25), Some(KEY_HOVERED));
        assert_eq!(canvas.pixel(65, 25), Some(KEY_GLOWING));
        assert_eq!(canvas.pixel(50, 52), Some(CURSOR_POINTING));
    }

    #[test]
    fn drawing_off_canvas_is_clipped() {
        let mut canvas = OverlayCanvas::new(20, 20);
        canvas.draw_line(
            ScreenPoint::new(-50.0, -50.0),
            ScreenPoint::new(70.0, 70.0),
            CURSOR_COLOR,
            3,
        );
        canvas.draw_circle((-5, 25), 10, CURSOR_COLOR);
        assert_eq!(canvas.pixel(10, 10), Some(CURSOR_COLOR));
    }
}
