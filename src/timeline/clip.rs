// Clip - a positioned window into a timeline's source pool

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Stable clip identifier, never reused within a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClipId(pub u64);

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clip#{}", self.0)
    }
}

/// Monotonic clip id source
///
/// Lives outside undo snapshots so ids handed out before an undo are not
/// handed out again afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipIdAllocator {
    next: u64,
}

impl ClipIdAllocator {
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }

    pub fn next_id(&mut self) -> ClipId {
        let id = ClipId(self.next);
        self.next += 1;
        id
    }

    /// Value the next call to `next_id` will return
    pub fn peek(&self) -> u64 {
        self.next
    }
}

impl Default for ClipIdAllocator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

/// Offset + length into the source pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    pub offset: usize,
    pub length: usize,
}

impl SourceRange {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    pub fn as_range(&self) -> Range<usize> {
        self.offset..self.end()
    }
}

const GOLDEN_ANGLE: f32 = 137.508;

/// RGB clip color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipColor(pub [u8; 3]);

impl ClipColor {
    /// Visually distinct color for the `index`-th clip
    ///
    /// Golden-angle hue rotation; saturation and lightness alternate slightly
    /// so neighbours stay distinguishable on a dark background.
    pub fn distinct(index: u32) -> Self {
        let hue = (index as f32 * GOLDEN_ANGLE) % 360.0 / 360.0;
        let saturation = 0.65 + (index % 3) as f32 * 0.1;
        let lightness = 0.50 + (index % 2) as f32 * 0.08;
        let (r, g, b) = hls_to_rgb(hue, lightness, saturation);
        Self([to_byte(r), to_byte(g), to_byte(b)])
    }

    pub fn to_hex(self) -> String {
        let [r, g, b] = self.0;
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }
}

fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0) as u8
}

fn hls_to_rgb(h: f32, l: f32, s: f32) -> (f32, f32, f32) {
    if s == 0.0 {
        return (l, l, l);
    }
    let m2 = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let m1 = 2.0 * l - m2;
    (
        hue_channel(m1, m2, h + 1.0 / 3.0),
        hue_channel(m1, m2, h),
        hue_channel(m1, m2, h - 1.0 / 3.0),
    )
}

fn hue_channel(m1: f32, m2: f32, hue: f32) -> f32 {
    let hue = hue.rem_euclid(1.0);
    if hue < 1.0 / 6.0 {
        m1 + (m2 - m1) * hue * 6.0
    } else if hue < 0.5 {
        m2
    } else if hue < 2.0 / 3.0 {
        m1 + (m2 - m1) * (2.0 / 3.0 - hue) * 6.0
    } else {
        m1
    }
}

/// A named, positioned reference to contiguous audio in the source pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: ClipId,
    pub name: String,
    pub source: SourceRange,
    /// First timeline sample covered by this clip
    pub position: usize,
    pub color: ClipColor,
}

impl Clip {
    pub fn len(&self) -> usize {
        self.source.length
    }

    pub fn is_empty(&self) -> bool {
        self.source.length == 0
    }

    pub fn end_position(&self) -> usize {
        self.position + self.source.length
    }

    pub fn timeline_range(&self) -> Range<usize> {
        self.position..self.end_position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_monotonic() {
        let mut ids = ClipIdAllocator::default();
        let a = ids.next_id();
        let b = ids.next_id();
        assert!(b > a);
        assert_eq!(ids.peek(), 3);
    }

    #[test]
    fn test_distinct_colors_differ() {
        let colors: Vec<ClipColor> = (0..8).map(ClipColor::distinct).collect();
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_first_color_is_reddish() {
        // Hue 0 at index 0
        let [r, g, b] = ClipColor::distinct(0).0;
        assert!(r > g && r > b);
        assert_eq!(ClipColor::distinct(0).to_hex().len(), 7);
    }
}
