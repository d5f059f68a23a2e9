use std::fmt;

use crate::types::{ScreenPoint, Surface};

pub const DEFAULT_HIT_MARGIN: f32 = 5.0;

const KEY_GAP: f32 = 8.0;
const QWERTY_ROWS: &[&str] = &["1234567890", "QWERTYUIOP", "ASDFGHJKL", "ZXCVBNM"];
const SPACE_UNITS: f32 = 5.0;
const WIDE_KEY_UNITS: f32 = 1.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyLabel {
    Char(char),
    Space,
    Backspace,
    Enter,
}

impl fmt::Display for KeyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyLabel::Char(ch) => write!(f, "{ch}"),
            KeyLabel::Space => f.write_str("Space"),
            KeyLabel::Backspace => f.write_str("⌫"),
            KeyLabel::Enter => f.write_str("↵"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl KeyRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Inclusive on every edge, after growing the rect by `margin` per side.
    pub fn contains(&self, point: ScreenPoint, margin: f32) -> bool {
        point.x >= self.x - margin
            && point.x <= self.x + self.width + margin
            && point.y >= self.y - margin
            && point.y <= self.y + self.height + margin
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct KeyRegion {
    pub label: KeyLabel,
    pub rect: KeyRect,
}

/// The static set of key regions for a session, in layout order.
#[derive(Clone, Debug)]
pub struct KeyboardLayout {
    keys: Vec<KeyRegion>,
}

impl KeyboardLayout {
    pub fn new(keys: Vec<KeyRegion>) -> Self {
        Self { keys }
    }

    /// QWERTY rows with digits, backspace, space and enter, laid out over
    /// the upper two thirds of the surface.
    pub fn qwerty(surface: Surface) -> Self {
        let mut rows: Vec<Vec<(KeyLabel, f32)>> = QWERTY_ROWS
            .iter()
            .map(|row| row.chars().map(|ch| (KeyLabel::Char(ch), 1.0)).collect())
            .collect();
        if let Some(last) = rows.last_mut() {
            last.push((KeyLabel::Backspace, WIDE_KEY_UNITS));
        }
        rows.push(vec![
            (KeyLabel::Space, SPACE_UNITS),
            (KeyLabel::Enter, WIDE_KEY_UNITS),
        ]);

        let area = KeyRect::new(
            surface.left + surface.width * 0.05,
            surface.top + surface.height * 0.08,
            surface.width * 0.9,
            surface.height * 0.6,
        );
        Self::from_rows(&rows, area)
    }

    /// Lays out rows of `(label, width in key units)`, each row centered in
    /// `area`. Keys are square-ish and never overlap.
    pub fn from_rows(rows: &[Vec<(KeyLabel, f32)>], area: KeyRect) -> Self {
        let mut keys = Vec::new();
        if rows.is_empty() {
            return Self::new(keys);
        }

        let widest = rows
            .iter()
            .map(|row| row.iter().map(|(_, units)| units).sum::<f32>())
            .fold(0.0f32, f32::max)
            .max(1.0);
        let row_count = rows.len() as f32;
        let unit_w = (area.width - KEY_GAP * (widest - 1.0).max(0.0)) / widest;
        let unit_h = (area.height - KEY_GAP * (row_count - 1.0)) / row_count;
        let unit = unit_w.min(unit_h).max(1.0);

        let block_height = unit * row_count + KEY_GAP * (row_count - 1.0);
        let mut y = area.y + (area.height - block_height).max(0.0) / 2.0;

        for row in rows {
            let units: f32 = row.iter().map(|(_, units)| units).sum();
            let gaps = row.len().saturating_sub(1) as f32;
            let row_width = units * unit + (units - row.len() as f32) * KEY_GAP + gaps * KEY_GAP;
            let mut x = area.x + (area.width - row_width) / 2.0;
            for &(label, key_units) in row {
                let width = key_units * unit + (key_units - 1.0).max(0.0) * KEY_GAP;
                keys.push(KeyRegion {
                    label,
                    rect: KeyRect::new(x, y, width, unit),
                });
                x += width + KEY_GAP;
            }
            y += unit + KEY_GAP;
        }

        Self::new(keys)
    }

    /// First region in layout order whose rect, grown by `margin`, contains
    /// the point.
    pub fn hit_test(&self, point: ScreenPoint, margin: f32) -> Option<usize> {
        self.keys
            .iter()
            .position(|key| key.rect.contains(point, margin))
    }

    pub fn key(&self, index: usize) -> Option<&KeyRegion> {
        self.keys.get(index)
    }

    pub fn keys(&self) -> &[KeyRegion] {
        &self.keys
    }
}
