// src/landmarks.rs - 21-point hand skeleton in pixel space
use std::collections::HashMap;

/// MediaPipe hand landmark indices.
#[allow(dead_code)]
pub mod ids {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_FINGER_MCP: usize = 5;
    pub const INDEX_FINGER_PIP: usize = 6;
    pub const INDEX_FINGER_DIP: usize = 7;
    pub const INDEX_FINGER_TIP: usize = 8;
    pub const MIDDLE_FINGER_MCP: usize = 9;
    pub const MIDDLE_FINGER_PIP: usize = 10;
    pub const MIDDLE_FINGER_DIP: usize = 11;
    pub const MIDDLE_FINGER_TIP: usize = 12;
    pub const RING_FINGER_MCP: usize = 13;
    pub const RING_FINGER_PIP: usize = 14;
    pub const RING_FINGER_DIP: usize = 15;
    pub const RING_FINGER_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;
}

pub const LANDMARK_COUNT: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelPosition {
    pub x: i32,
    pub y: i32,
}

impl PixelPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for PixelPosition {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Landmark id to pixel position for one detected hand in one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkSet {
    positions: HashMap<usize, PixelPosition>,
}

impl LandmarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts normalized model output (x, y in 0..1 of the frame) to pixels.
    /// Coordinates are truncated toward zero, landmarks outside the frame are kept.
    pub fn from_normalized(points: &[[f64; 3]], width: u32, height: u32) -> Self {
        let positions = points
            .iter()
            .take(LANDMARK_COUNT)
            .enumerate()
            .map(|(id, p)| {
                let x = (width as f64 * p[0]) as i32;
                let y = (height as f64 * p[1]) as i32;
                (id, PixelPosition::new(x, y))
            })
            .collect();

        Self { positions }
    }

    pub fn insert(&mut self, id: usize, position: PixelPosition) {
        self.positions.insert(id, position);
    }

    pub fn get(&self, id: usize) -> Option<PixelPosition> {
        self.positions.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl FromIterator<(usize, PixelPosition)> for LandmarkSet {
    fn from_iter<I: IntoIterator<Item = (usize, PixelPosition)>>(iter: I) -> Self {
        Self {
            positions: iter.into_iter().collect(),
        }
    }
}

/// The five fingertips the classifier looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerTips {
    pub thumb: PixelPosition,
    pub index: PixelPosition,
    pub middle: PixelPosition,
    pub ring: PixelPosition,
    pub pinky: PixelPosition,
}

impl FingerTips {
    /// `None` when any of the five tips is missing from the set.
    pub fn from_landmarks(landmarks: &LandmarkSet) -> Option<Self> {
        Some(Self {
            thumb: landmarks.get(ids::THUMB_TIP)?,
            index: landmarks.get(ids::INDEX_FINGER_TIP)?,
            middle: landmarks.get(ids::MIDDLE_FINGER_TIP)?,
            ring: landmarks.get(ids::RING_FINGER_TIP)?,
            pinky: landmarks.get(ids::PINKY_TIP)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_hand() -> Vec<[f64; 3]> {
        (0..LANDMARK_COUNT)
            .map(|i| [i as f64 / 40.0, 0.5, 0.0])
            .collect()
    }

    #[test]
    fn normalized_points_scale_to_frame_pixels() {
        let set = LandmarkSet::from_normalized(&full_hand(), 1280, 720);

        assert_eq!(set.len(), LANDMARK_COUNT);
        assert_eq!(set.get(ids::WRIST), Some(PixelPosition::new(0, 360)));
        // 1280 * 4 / 40 = 128
        assert_eq!(set.get(ids::THUMB_TIP), Some(PixelPosition::new(128, 360)));
    }

    #[test]
    fn fractional_pixels_truncate() {
        let set = LandmarkSet::from_normalized(&[[0.3337, 0.9999, 0.0]], 640, 480);
        // 213.568 -> 213, 479.952 -> 479
        assert_eq!(set.get(0), Some(PixelPosition::new(213, 479)));
    }

    #[test]
    fn extra_points_beyond_skeleton_are_ignored() {
        let mut points = full_hand();
        points.push([0.9, 0.9, 0.0]);
        let set = LandmarkSet::from_normalized(&points, 100, 100);
        assert_eq!(set.len(), LANDMARK_COUNT);
        assert_eq!(set.get(LANDMARK_COUNT), None);
    }

    #[test]
    fn finger_tips_require_all_five() {
        let full = LandmarkSet::from_normalized(&full_hand(), 400, 400);
        let tips = FingerTips::from_landmarks(&full).expect("all tips present");
        assert_eq!(tips.pinky, PixelPosition::new(200, 200));

        let partial: LandmarkSet = [
            (ids::THUMB_TIP, PixelPosition::new(1, 1)),
            (ids::INDEX_FINGER_TIP, PixelPosition::new(2, 2)),
            (ids::MIDDLE_FINGER_TIP, PixelPosition::new(3, 3)),
            (ids::RING_FINGER_TIP, PixelPosition::new(4, 4)),
        ]
        .into_iter()
        .collect();
        assert!(FingerTips::from_landmarks(&partial).is_none());
    }
}
