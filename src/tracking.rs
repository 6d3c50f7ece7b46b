// src/tracking.rs - Hand detection front end: providers, filtering and frame metrics
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use crate::config::{DetectorBackend, DetectorSettings};
use crate::landmarks::{ids, LandmarkSet, PixelPosition};
use crate::mediapipe_bridge::{helper_command, MediaPipeWrapper};

/// One hand reported by a landmark provider, positions already in frame pixels.
/// Detection confidence is applied by the provider itself.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedHand {
    pub handedness: String,
    /// Certainty of the left/right label.
    pub handedness_score: f32,
    pub landmarks: LandmarkSet,
}

/// Anything that turns a frame into per-hand landmark sets.
pub trait LandmarkProvider {
    fn detect(&mut self, frame: &DynamicImage) -> Result<Vec<DetectedHand>>;
}

pub fn create_provider(settings: &DetectorSettings) -> Result<Box<dyn LandmarkProvider>> {
    match settings.backend {
        DetectorBackend::MediaPipe => {
            let bridge = MediaPipeWrapper::new(&helper_command(settings))
                .context("Failed to start the MediaPipe landmark helper")?;
            Ok(Box::new(bridge))
        }
        DetectorBackend::Simulated => {
            info!("Using simulated hand, no landmark model");
            Ok(Box::new(SimulatedHand::new()))
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrackingResult {
    pub hands: Vec<DetectedHand>,
    pub timestamp: f64,
}

#[derive(Debug, Clone)]
pub struct PerformanceMetrics {
    /// `None` until a frame has taken measurable time.
    pub avg_fps: Option<f32>,
    pub avg_processing_time: f32,
    frame_times: VecDeque<f32>,
}

const METRICS_WINDOW: usize = 30;

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            avg_fps: None,
            avg_processing_time: 0.0,
            frame_times: VecDeque::with_capacity(METRICS_WINDOW),
        }
    }

    pub fn record(&mut self, elapsed: Duration) {
        self.frame_times.push_front(elapsed.as_secs_f32());
        if self.frame_times.len() > METRICS_WINDOW {
            self.frame_times.pop_back();
        }

        self.avg_processing_time =
            self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;
        self.avg_fps = if self.avg_processing_time > 0.0 {
            Some(1.0 / self.avg_processing_time)
        } else {
            None
        };
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Instantaneous frame rate from the gap between consecutive ticks.
#[derive(Debug, Default)]
pub struct FrameClock {
    previous: Option<Instant>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self) -> Option<f64> {
        self.tick_at(Instant::now())
    }

    /// `None` on the first tick and when two ticks share a timestamp.
    pub fn tick_at(&mut self, now: Instant) -> Option<f64> {
        let previous = self.previous.replace(now)?;
        let elapsed = now.saturating_duration_since(previous).as_secs_f64();
        if elapsed > 0.0 {
            Some(1.0 / elapsed)
        } else {
            None
        }
    }
}

pub fn format_fps(fps: Option<f64>) -> String {
    match fps {
        Some(fps) => format!("FPS: {}", fps as i64),
        None => "FPS: N/A".to_string(),
    }
}

pub struct HandTracker {
    provider: Box<dyn LandmarkProvider>,
    max_num_hands: usize,
    metrics: PerformanceMetrics,
    started: Instant,
}

impl HandTracker {
    pub fn new(provider: Box<dyn LandmarkProvider>, settings: &DetectorSettings) -> Self {
        Self {
            provider,
            max_num_hands: settings.max_num_hands.max(1),
            metrics: PerformanceMetrics::new(),
            started: Instant::now(),
        }
    }

    /// Keeps at most `max_num_hands`, in the order the provider reported them.
    pub fn process_frame(&mut self, frame: &DynamicImage) -> Result<TrackingResult> {
        let mut hands = self.provider.detect(frame)?;
        if hands.len() > self.max_num_hands {
            debug!("Keeping {} of {} detected hands", self.max_num_hands, hands.len());
            hands.truncate(self.max_num_hands);
        }

        Ok(TrackingResult {
            hands,
            timestamp: self.started.elapsed().as_secs_f64(),
        })
    }

    pub fn process_frame_with_metrics(
        &mut self,
        frame: &DynamicImage,
    ) -> Result<(TrackingResult, PerformanceMetrics)> {
        let start = Instant::now();
        let result = self.process_frame(frame)?;
        self.metrics.record(start.elapsed());
        Ok((result, self.metrics.clone()))
    }
}

// Scripted demo hand. One cycle is:
//   sign held while the thumb-index spread sweeps up and down,
//   pinky brought to the thumb (pinch-hold),
//   pinky released,
//   middle finger lifted away so the sign is not held.
const SIM_SWEEP_FRAMES: u64 = 120;
const SIM_PINCH_FRAMES: u64 = 60;
const SIM_RELEASE_FRAMES: u64 = 30;
const SIM_OPEN_FRAMES: u64 = 30;
const SIM_CYCLE: u64 = SIM_SWEEP_FRAMES + SIM_PINCH_FRAMES + SIM_RELEASE_FRAMES + SIM_OPEN_FRAMES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimPhase {
    Sweep,
    Pinch,
    Release,
    Open,
}

impl SimPhase {
    pub fn at(frame: u64) -> Self {
        let t = frame % SIM_CYCLE;
        if t < SIM_SWEEP_FRAMES {
            SimPhase::Sweep
        } else if t < SIM_SWEEP_FRAMES + SIM_PINCH_FRAMES {
            SimPhase::Pinch
        } else if t < SIM_SWEEP_FRAMES + SIM_PINCH_FRAMES + SIM_RELEASE_FRAMES {
            SimPhase::Release
        } else {
            SimPhase::Open
        }
    }
}

pub struct SimulatedHand {
    frame_counter: u64,
}

impl SimulatedHand {
    pub fn new() -> Self {
        Self { frame_counter: 0 }
    }

    /// Landmarks for `frame` around the centre of a `width` x `height` image.
    pub fn landmarks_at(frame: u64, width: u32, height: u32) -> LandmarkSet {
        let cx = width as i32 / 2;
        let cy = height as i32 / 2;
        let phase = SimPhase::at(frame);

        let thumb = PixelPosition::new(cx, cy);
        let ring = PixelPosition::new(cx - 20, cy - 10);
        let middle = match phase {
            SimPhase::Open => PixelPosition::new(cx - 10, cy - 260),
            _ => PixelPosition::new(cx - 10, cy - 5),
        };

        // triangle wave 40 -> 280 -> 40 px over the sweep
        let t = (frame % SIM_CYCLE).min(SIM_SWEEP_FRAMES - 1) as i32;
        let half = SIM_SWEEP_FRAMES as i32 / 2;
        let ramp = if t < half { t } else { SIM_SWEEP_FRAMES as i32 - 1 - t };
        let spread = 40 + ramp * 240 / half;
        let index = PixelPosition::new(cx + spread, cy - spread / 4);

        let pinky = match phase {
            SimPhase::Pinch => PixelPosition::new(cx + 60, cy + 15),
            _ => PixelPosition::new(cx + 220, cy - 160),
        };

        let wrist = PixelPosition::new(cx + 40, cy + 220);
        let mut landmarks = LandmarkSet::new();
        landmarks.insert(ids::WRIST, wrist);

        let chains = [
            (ids::THUMB_CMC, thumb),
            (ids::INDEX_FINGER_MCP, index),
            (ids::MIDDLE_FINGER_MCP, middle),
            (ids::RING_FINGER_MCP, ring),
            (ids::PINKY_MCP, pinky),
        ];
        for (first, tip) in chains {
            for (step, id) in (first..first + 4).enumerate() {
                let f = (step as i32 + 1) * 25;
                landmarks.insert(
                    id,
                    PixelPosition::new(
                        wrist.x + (tip.x - wrist.x) * f / 100,
                        wrist.y + (tip.y - wrist.y) * f / 100,
                    ),
                );
            }
        }

        landmarks
    }
}

impl Default for SimulatedHand {
    fn default() -> Self {
        Self::new()
    }
}

impl LandmarkProvider for SimulatedHand {
    fn detect(&mut self, frame: &DynamicImage) -> Result<Vec<DetectedHand>> {
        let (width, height) = frame.dimensions();
        let landmarks = Self::landmarks_at(self.frame_counter, width, height);
        self.frame_counter += 1;

        Ok(vec![DetectedHand {
            handedness: "Right".to_string(),
            handedness_score: 1.0,
            landmarks,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::{classify, GestureState, ToggleEvent, ToleranceConfig};
    use crate::landmarks::LANDMARK_COUNT;

    struct FixedProvider(Vec<DetectedHand>);

    impl LandmarkProvider for FixedProvider {
        fn detect(&mut self, _frame: &DynamicImage) -> Result<Vec<DetectedHand>> {
            Ok(self.0.clone())
        }
    }

    fn hand(handedness_score: f32) -> DetectedHand {
        DetectedHand {
            handedness: "Left".to_string(),
            handedness_score,
            landmarks: LandmarkSet::new(),
        }
    }

    fn settings(max_hands: usize) -> DetectorSettings {
        DetectorSettings {
            backend: DetectorBackend::Simulated,
            max_num_hands: max_hands,
            ..DetectorSettings::default()
        }
    }

    #[test]
    fn tracker_caps_hands_in_provider_order() {
        let provider = FixedProvider(vec![hand(0.5), hand(0.9), hand(0.7), hand(0.95)]);
        let mut tracker = HandTracker::new(Box::new(provider), &settings(2));

        let frame = DynamicImage::new_rgb8(64, 48);
        let result = tracker.process_frame(&frame).expect("fixed provider");

        let scores: Vec<f32> = result.hands.iter().map(|h| h.handedness_score).collect();
        assert_eq!(scores, vec![0.5, 0.9]);
    }

    #[test]
    fn low_handedness_certainty_does_not_drop_a_hand() {
        let provider = FixedProvider(vec![hand(0.3)]);
        let mut tracker = HandTracker::new(Box::new(provider), &settings(2));

        let frame = DynamicImage::new_rgb8(64, 48);
        let result = tracker.process_frame(&frame).expect("fixed provider");
        assert_eq!(result.hands.len(), 1);
    }

    #[test]
    fn frame_clock_uses_sentinel_for_zero_interval() {
        let mut clock = FrameClock::new();
        let t0 = Instant::now();

        assert_eq!(clock.tick_at(t0), None);
        assert_eq!(clock.tick_at(t0), None);
        let fps = clock.tick_at(t0 + Duration::from_millis(40)).expect("positive interval");
        assert!((fps - 25.0).abs() < 1e-9);

        assert_eq!(format_fps(None), "FPS: N/A");
        assert_eq!(format_fps(Some(29.97)), "FPS: 29");
    }

    #[test]
    fn metrics_average_over_window() {
        let mut metrics = PerformanceMetrics::new();
        metrics.record(Duration::ZERO);
        assert_eq!(metrics.avg_fps, None);

        for _ in 0..40 {
            metrics.record(Duration::from_millis(50));
        }
        let fps = metrics.avg_fps.expect("non-zero average");
        assert!((fps - 20.0).abs() < 0.01);
    }

    #[test]
    fn simulated_hand_has_full_skeleton() {
        let landmarks = SimulatedHand::landmarks_at(0, 1280, 720);
        assert_eq!(landmarks.len(), LANDMARK_COUNT);
        assert_eq!(landmarks.get(ids::THUMB_TIP), Some(PixelPosition::new(640, 360)));
    }

    #[test]
    fn simulated_cycle_toggles_once_each_way() {
        let config = ToleranceConfig::default();
        let mut state = GestureState::default();
        let mut events = Vec::new();

        for frame in 0..SIM_CYCLE {
            let landmarks = SimulatedHand::landmarks_at(frame, 1280, 720);
            let (result, next) = classify(&landmarks, &config, state).expect("full skeleton");
            assert_eq!(result.sign_held, SimPhase::at(frame) != SimPhase::Open);
            if let Some(event) = result.toggle {
                events.push((frame, event));
            }
            state = next;
        }

        assert_eq!(
            events,
            vec![
                (SIM_SWEEP_FRAMES, ToggleEvent::Activated),
                (SIM_SWEEP_FRAMES + SIM_PINCH_FRAMES, ToggleEvent::Deactivated),
            ]
        );
    }
}
