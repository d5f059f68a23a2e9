use crate::types::{FrameSize, Landmark, ScreenPoint, Surface};

/// Aspect-fill ("cover") projection of the source frame onto the display
/// surface, mirrored horizontally for a selfie view.
///
/// Rebuilt every frame from that frame's surface box; nothing here survives
/// a resize.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoverMapping {
    surface: Surface,
    scaled_width: f32,
    scaled_height: f32,
    offset_x: f32,
    offset_y: f32,
}

impl CoverMapping {
    /// `None` while either size is still unknown.
    pub fn new(surface: Surface, frame: FrameSize) -> Option<Self> {
        if surface.is_empty() || frame.is_empty() {
            return None;
        }

        let frame_w = frame.width as f32;
        let frame_h = frame.height as f32;
        let scale = (surface.width / frame_w).max(surface.height / frame_h);
        let scaled_width = frame_w * scale;
        let scaled_height = frame_h * scale;

        Some(Self {
            surface,
            scaled_width,
            scaled_height,
            offset_x: (surface.width - scaled_width) / 2.0,
            offset_y: (surface.height - scaled_height) / 2.0,
        })
    }

    pub fn map_to_screen(&self, nx: f32, ny: f32) -> ScreenPoint {
        let x = self.surface.left
            + (self.surface.width - (self.offset_x + nx * self.scaled_width));
        let y = self.surface.top + self.offset_y + ny * self.scaled_height;
        ScreenPoint::new(x, y)
    }

    pub fn map_landmark(&self, landmark: Landmark) -> ScreenPoint {
        self.map_to_screen(landmark.x, landmark.y)
    }
}
