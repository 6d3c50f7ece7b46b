// src/gesture.rs - Pure gesture classification from fingertip positions
//
// Nothing in here touches the camera, the audio API or input injection, so every
// decision can be checked with hand-written landmark positions.
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::landmarks::{FingerTips, LandmarkSet, PixelPosition};

/// Extra horizontal slack given to the pinky when checking the pinch-hold.
pub const DEFAULT_PINCH_MARGIN: i32 = 30;
pub const DEFAULT_SIGN_TOLERANCE: i32 = 100;
pub const DEFAULT_MUTE_TOLERANCE: i32 = 80;

/// Pixel thresholds read by [`classify`]. Values are expected to be non-negative;
/// use [`ToleranceConfig::clamped`] at any boundary that accepts outside input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    pub sign_tolerance: i32,
    pub mute_tolerance: i32,
    pub pinch_margin: i32,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            sign_tolerance: DEFAULT_SIGN_TOLERANCE,
            mute_tolerance: DEFAULT_MUTE_TOLERANCE,
            pinch_margin: DEFAULT_PINCH_MARGIN,
        }
    }
}

impl ToleranceConfig {
    pub fn clamped(self) -> Self {
        Self {
            sign_tolerance: self.sign_tolerance.max(0),
            mute_tolerance: self.mute_tolerance.max(0),
            pinch_margin: self.pinch_margin.max(0),
        }
    }

    pub fn has_negative(&self) -> bool {
        self.sign_tolerance < 0 || self.mute_tolerance < 0 || self.pinch_margin < 0
    }
}

/// The only state carried from one frame to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GestureState {
    pub toggled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpreadCategory {
    Muted,
    Active,
}

impl SpreadCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Muted => "muted",
            Self::Active => "active",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ToggleEvent {
    Activated,
    Deactivated,
}

impl ToggleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activated => "activated",
            Self::Deactivated => "deactivated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationResult {
    /// Thumb tip to index tip, in pixels.
    pub spread: f64,
    pub sign_held: bool,
    /// Only set while the sign is held.
    pub category: Option<SpreadCategory>,
    pub toggle: Option<ToggleEvent>,
}

impl ClassificationResult {
    fn idle(spread: f64) -> Self {
        Self {
            spread,
            sign_held: false,
            category: None,
            toggle: None,
        }
    }
}

/// True when the spread (max - min) of `positions` is within `tolerance`.
/// Fewer than two positions always pass.
pub fn within_tolerance(tolerance: i32, positions: &[i32]) -> bool {
    if positions.len() < 2 {
        return true;
    }

    let (min, max) = positions
        .iter()
        .fold((i32::MAX, i32::MIN), |(lo, hi), &p| (lo.min(p), hi.max(p)));

    // i64 so that extreme pixel values cannot overflow the subtraction
    (max as i64 - min as i64) <= tolerance as i64
}

pub fn euclidean_distance(a: PixelPosition, b: PixelPosition) -> f64 {
    let a = Point2::new(a.x as f64, a.y as f64);
    let b = Point2::new(b.x as f64, b.y as f64);
    nalgebra::distance(&a, &b)
}

/// Ring, thumb and middle tips bunched together on both axes.
pub fn sign_held(tips: &FingerTips, tolerance: i32) -> bool {
    within_tolerance(tolerance, &[tips.ring.x, tips.thumb.x, tips.middle.x])
        && within_tolerance(tolerance, &[tips.ring.y, tips.thumb.y, tips.middle.y])
}

/// Pinky brought over to the thumb. The x axis gets `pinch_margin` of extra room.
pub fn pinch_held(tips: &FingerTips, config: &ToleranceConfig) -> bool {
    let horizontal = config.sign_tolerance.saturating_add(config.pinch_margin);
    within_tolerance(horizontal, &[tips.pinky.x, tips.thumb.x])
        && within_tolerance(config.sign_tolerance, &[tips.pinky.y, tips.thumb.y])
}

/// Edge-triggers the toggle on the pinch predicate.
fn transition(pinching: bool, state: GestureState) -> (Option<ToggleEvent>, GestureState) {
    match (pinching, state.toggled) {
        (true, false) => (Some(ToggleEvent::Activated), GestureState { toggled: true }),
        (false, true) => (Some(ToggleEvent::Deactivated), GestureState { toggled: false }),
        _ => (None, state),
    }
}

/// Classifies one hand for one frame.
///
/// The pinch-hold only counts while the ring/thumb/middle sign is held: when the
/// sign is not held the state is returned unchanged and no event fires.
pub fn classify_tips(
    tips: &FingerTips,
    config: &ToleranceConfig,
    state: GestureState,
) -> (ClassificationResult, GestureState) {
    let spread = euclidean_distance(tips.thumb, tips.index);

    if !sign_held(tips, config.sign_tolerance) {
        return (ClassificationResult::idle(spread), state);
    }

    let category = if spread < config.mute_tolerance as f64 {
        SpreadCategory::Muted
    } else {
        SpreadCategory::Active
    };

    let (toggle, next) = transition(pinch_held(tips, config), state);

    let result = ClassificationResult {
        spread,
        sign_held: true,
        category: Some(category),
        toggle,
    };

    (result, next)
}

/// Same as [`classify_tips`], returning `None` when a fingertip is missing so
/// the caller can skip the hand.
pub fn classify(
    landmarks: &LandmarkSet,
    config: &ToleranceConfig,
    state: GestureState,
) -> Option<(ClassificationResult, GestureState)> {
    let tips = FingerTips::from_landmarks(landmarks)?;
    Some(classify_tips(&tips, config, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::ids;

    fn p(x: i32, y: i32) -> PixelPosition {
        PixelPosition::new(x, y)
    }

    /// Sign held (ring/thumb/middle together), pinky far away.
    fn sign_hand() -> FingerTips {
        FingerTips {
            thumb: p(420, 410),
            index: p(500, 410),
            middle: p(410, 405),
            ring: p(400, 400),
            pinky: p(700, 700),
        }
    }

    fn pinching(mut tips: FingerTips) -> FingerTips {
        tips.pinky = p(tips.thumb.x + 110, tips.thumb.y + 20);
        tips
    }

    #[test]
    fn fewer_than_two_positions_always_pass() {
        assert!(within_tolerance(0, &[]));
        assert!(within_tolerance(0, &[12345]));
        assert!(within_tolerance(-5, &[7]));
    }

    #[test]
    fn tolerance_compares_max_minus_min() {
        assert!(within_tolerance(100, &[50, 120]));
        assert!(!within_tolerance(60, &[50, 120]));
        assert!(within_tolerance(70, &[120, 50]));
        assert!(!within_tolerance(69, &[120, 50]));
        assert!(within_tolerance(20, &[400, 420, 410]));
        assert!(!within_tolerance(19, &[400, 420, 410, 405]));
    }

    #[test]
    fn tolerance_handles_extreme_values() {
        assert!(!within_tolerance(i32::MAX, &[i32::MIN, i32::MAX]));
        assert!(within_tolerance(0, &[i32::MIN, i32::MIN]));
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (p(0, 0), p(3, 4)),
            (p(-20, 15), p(640, 480)),
            (p(100, 100), p(100, 100)),
        ];
        for (a, b) in pairs {
            assert_eq!(euclidean_distance(a, b), euclidean_distance(b, a));
        }
        assert_eq!(euclidean_distance(p(0, 0), p(3, 4)), 5.0);
    }

    #[test]
    fn spread_category_follows_mute_tolerance() {
        let config = ToleranceConfig::default();
        let mut tips = FingerTips {
            thumb: p(100, 100),
            index: p(180, 100),
            middle: p(100, 100),
            ring: p(100, 100),
            pinky: p(900, 900),
        };

        let (result, _) = classify_tips(&tips, &config, GestureState::default());
        assert_eq!(result.spread, 80.0);
        assert_eq!(result.category, Some(SpreadCategory::Active));

        tips.index = p(170, 100);
        let (result, _) = classify_tips(&tips, &config, GestureState::default());
        assert_eq!(result.spread, 70.0);
        assert_eq!(result.category, Some(SpreadCategory::Muted));
    }

    #[test]
    fn sign_predicate_scenario() {
        assert!(sign_held(&sign_hand(), 100));
        // x-spread is 20, y-spread is 10
        assert!(sign_held(&sign_hand(), 20));
        assert!(!sign_held(&sign_hand(), 19));
    }

    #[test]
    fn pinch_gets_extra_room_on_x_only() {
        let config = ToleranceConfig::default();
        let mut tips = sign_hand();

        tips.pinky = p(tips.thumb.x + 130, tips.thumb.y);
        assert!(pinch_held(&tips, &config));

        tips.pinky = p(tips.thumb.x + 131, tips.thumb.y);
        assert!(!pinch_held(&tips, &config));

        tips.pinky = p(tips.thumb.x, tips.thumb.y - 101);
        assert!(!pinch_held(&tips, &config));
    }

    #[test]
    fn toggle_fires_on_edges_only() {
        let config = ToleranceConfig::default();
        let pattern = [false, true, true, true, false, false, true];
        let expected = [
            None,
            Some(ToggleEvent::Activated),
            None,
            None,
            Some(ToggleEvent::Deactivated),
            None,
            Some(ToggleEvent::Activated),
        ];

        let mut state = GestureState::default();
        let mut events = Vec::new();
        for pinch in pattern {
            let tips = if pinch { pinching(sign_hand()) } else { sign_hand() };
            let (result, next) = classify_tips(&tips, &config, state);
            assert!(result.sign_held);
            events.push(result.toggle);
            state = next;
        }

        assert_eq!(events, expected);
        assert!(state.toggled);
    }

    #[test]
    fn holding_the_pinch_keeps_state_without_events() {
        let config = ToleranceConfig::default();
        let tips = pinching(sign_hand());
        let mut state = GestureState { toggled: true };

        for _ in 0..5 {
            let (result, next) = classify_tips(&tips, &config, state);
            assert_eq!(result.toggle, None);
            assert_eq!(next, GestureState { toggled: true });
            state = next;
        }
    }

    #[test]
    fn no_sign_means_no_toggle_and_unchanged_state() {
        let config = ToleranceConfig::default();
        let mut tips = pinching(sign_hand());
        // middle finger far from ring and thumb breaks the sign
        tips.middle = p(900, 50);
        assert!(pinch_held(&tips, &config));

        for toggled in [false, true] {
            let state = GestureState { toggled };
            let (result, next) = classify_tips(&tips, &config, state);
            assert!(!result.sign_held);
            assert_eq!(result.category, None);
            assert_eq!(result.toggle, None);
            assert_eq!(next, state);
        }

        // releasing the pinch without the sign does not deactivate either
        tips.pinky = p(1200, 1200);
        let (result, next) = classify_tips(&tips, &config, GestureState { toggled: true });
        assert_eq!(result.toggle, None);
        assert!(next.toggled);
    }

    #[test]
    fn spread_is_reported_even_without_sign() {
        let mut tips = sign_hand();
        tips.middle = p(0, 0);
        let (result, _) = classify_tips(&tips, &ToleranceConfig::default(), GestureState::default());
        assert_eq!(result.spread, 80.0);
    }

    #[test]
    fn classify_skips_incomplete_landmarks() {
        let mut landmarks = LandmarkSet::new();
        landmarks.insert(ids::THUMB_TIP, p(1, 1));
        landmarks.insert(ids::INDEX_FINGER_TIP, p(2, 2));
        assert!(classify(&landmarks, &ToleranceConfig::default(), GestureState::default()).is_none());

        let tips = sign_hand();
        landmarks.insert(ids::THUMB_TIP, tips.thumb);
        landmarks.insert(ids::INDEX_FINGER_TIP, tips.index);
        landmarks.insert(ids::MIDDLE_FINGER_TIP, tips.middle);
        landmarks.insert(ids::RING_FINGER_TIP, tips.ring);
        landmarks.insert(ids::PINKY_TIP, tips.pinky);

        let (result, state) =
            classify(&landmarks, &ToleranceConfig::default(), GestureState::default())
                .expect("complete hand");
        assert!(result.sign_held);
        assert!(!state.toggled);
    }

    #[test]
    fn negative_tolerances_clamp_to_zero() {
        let config = ToleranceConfig {
            sign_tolerance: -10,
            mute_tolerance: 80,
            pinch_margin: -1,
        };
        assert!(config.has_negative());

        let clamped = config.clamped();
        assert!(!clamped.has_negative());
        assert_eq!(clamped.sign_tolerance, 0);
        assert_eq!(clamped.mute_tolerance, 80);
        assert_eq!(clamped.pinch_margin, 0);
    }
}
