use std::time::Instant;

pub const NUM_LANDMARKS: usize = 21;

/// Landmark indices of the 21-point hand topology.
pub mod landmark {
    pub const INDEX_MCP: usize = 5;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_PIP: usize = 14;
    pub const RING_TIP: usize = 16;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_TIP: usize = 20;
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One detected hand. Always holds exactly [`NUM_LANDMARKS`] points,
/// normalized to the source frame.
#[derive(Clone, Debug, PartialEq)]
pub struct HandLandmarks {
    points: [Landmark; NUM_LANDMARKS],
}

impl HandLandmarks {
    /// Returns `None` unless the slice has exactly 21 points.
    pub fn from_points(points: &[Landmark]) -> Option<Self> {
        let points: [Landmark; NUM_LANDMARKS] = points.try_into().ok()?;
        Some(Self { points })
    }

    pub fn point(&self, index: usize) -> Landmark {
        self.points[index]
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    pub fn index_tip(&self) -> Landmark {
        self.points[landmark::INDEX_TIP]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandSlot {
    Left,
    Right,
}

impl HandSlot {
    pub const ALL: [HandSlot; 2] = [HandSlot::Left, HandSlot::Right];

    pub fn index(self) -> usize {
        match self {
            HandSlot::Left => 0,
            HandSlot::Right => 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HandSlot::Left => "left",
            HandSlot::Right => "right",
        }
    }
}

/// Native pixel size of the frame the landmarks were estimated on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// The rendered box of the display surface, in screen pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Surface {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Surface {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn sized(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Everything the landmark source reports for one video frame.
#[derive(Clone, Debug)]
pub struct LandmarkFrame {
    pub frame_size: Option<FrameSize>,
    pub hands: Vec<HandLandmarks>,
    pub timestamp: Instant,
}
