// src/controller.rs - Frame loop: capture -> landmarks -> classify -> dispatch
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use image::RgbaImage;
use tracing::{debug, error, info, warn};

use crate::actions::ActionDispatcher;
use crate::config::{AppSettings, SharedTolerances};
use crate::data::SessionRecorder;
use crate::gesture::{classify, ClassificationResult, GestureState, ToleranceConfig};
use crate::tracking::{create_provider, FrameClock, HandTracker};
use crate::video::VideoSource;

#[derive(Debug, Clone)]
pub struct HandReport {
    pub handedness: String,
    pub handedness_score: f32,
    pub result: ClassificationResult,
}

/// What the control window shows for the most recent frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame_index: u64,
    pub preview: Option<Arc<RgbaImage>>,
    pub hands: Vec<HandReport>,
    pub toggled: bool,
    pub fps: Option<f64>,
    pub avg_processing_ms: f32,
    pub last_volume: Option<u8>,
    pub tolerances: ToleranceConfig,
}

#[derive(Debug, Default)]
struct SlotInner {
    latest: Option<FrameReport>,
    failure: Option<String>,
}

/// Latest-frame mailbox between the frame loop and the UI. Older reports are overwritten.
#[derive(Debug, Clone, Default)]
pub struct ReportSlot {
    inner: Arc<Mutex<SlotInner>>,
}

impl ReportSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, report: FrameReport) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.latest = Some(report);
        }
    }

    pub fn latest(&self) -> Option<FrameReport> {
        self.inner.lock().ok().and_then(|inner| inner.latest.clone())
    }

    pub fn fail(&self, message: String) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failure = Some(message);
        }
    }

    pub fn failure(&self) -> Option<String> {
        self.inner.lock().ok().and_then(|inner| inner.failure.clone())
    }
}

pub struct GestureController {
    video: VideoSource,
    tracker: HandTracker,
    dispatcher: ActionDispatcher,
    tolerances: SharedTolerances,
    reports: ReportSlot,
    recorder: Option<SessionRecorder>,
    state: GestureState,
    clock: FrameClock,
    frame_index: u64,
    last_volume: Option<u8>,
    publish_preview: bool,
}

impl GestureController {
    pub fn new(
        video: VideoSource,
        tracker: HandTracker,
        dispatcher: ActionDispatcher,
        tolerances: SharedTolerances,
        reports: ReportSlot,
    ) -> Self {
        Self {
            video,
            tracker,
            dispatcher,
            tolerances,
            reports,
            recorder: None,
            state: GestureState::default(),
            clock: FrameClock::new(),
            frame_index: 0,
            last_volume: None,
            publish_preview: false,
        }
    }

    pub fn from_settings(
        settings: &AppSettings,
        tolerances: SharedTolerances,
        reports: ReportSlot,
    ) -> Result<Self> {
        let video = VideoSource::from_settings(&settings.camera).context("Camera unavailable")?;
        let (width, height) = video.resolution();
        info!("Capturing {}x{} frames", width, height);
        let provider = create_provider(&settings.detector)?;
        let tracker = HandTracker::new(provider, &settings.detector);
        let dispatcher = ActionDispatcher::from_settings(&settings.actions)?;

        let mut controller = Self::new(video, tracker, dispatcher, tolerances, reports);
        if settings.record_session {
            let recorder = SessionRecorder::new(&settings.output_directory, None)
                .context("Failed to start the session log")?;
            info!("Recording session to {}", recorder.csv_path().display());
            controller.recorder = Some(recorder);
        }
        controller.publish_preview = !settings.headless;
        Ok(controller)
    }

    pub fn with_recorder(mut self, recorder: SessionRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_preview(mut self, publish_preview: bool) -> Self {
        self.publish_preview = publish_preview;
        self
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Processes exactly one frame. Hands are classified in detection order and
    /// all of them share the one toggle state.
    pub fn step(&mut self) -> Result<FrameReport> {
        let frame = self.video.read_frame()?;
        let fps = self.clock.tick();
        let (tracking, metrics) = self.tracker.process_frame_with_metrics(&frame)?;
        let config = self.tolerances.snapshot();

        let mut hands = Vec::with_capacity(tracking.hands.len());
        for (i, hand) in tracking.hands.iter().enumerate() {
            let Some((result, next)) = classify(&hand.landmarks, &config, self.state) else {
                debug!(
                    "Hand {} is missing fingertips ({} landmarks), skipping",
                    i,
                    hand.landmarks.len()
                );
                continue;
            };
            self.state = next;

            let outcome = self.dispatcher.dispatch(&result);
            if outcome.volume.is_some() {
                self.last_volume = outcome.volume;
            }

            if let Some(recorder) = self.recorder.as_mut() {
                if let Err(e) = recorder.add_hand(
                    self.frame_index,
                    tracking.timestamp,
                    i,
                    &hand.handedness,
                    &result,
                    self.state.toggled,
                ) {
                    warn!("Session log write failed: {:#}", e);
                }
            }

            hands.push(HandReport {
                handedness: hand.handedness.clone(),
                handedness_score: hand.handedness_score,
                result,
            });
        }

        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(e) = recorder.mark_frame() {
                warn!("Session log write failed: {:#}", e);
            }
        }

        let report = FrameReport {
            frame_index: self.frame_index,
            preview: self.publish_preview.then(|| Arc::new(frame.to_rgba8())),
            hands,
            toggled: self.state.toggled,
            fps,
            avg_processing_ms: metrics.avg_processing_time * 1000.0,
            last_volume: self.last_volume,
            tolerances: config,
        };

        self.reports.publish(report.clone());
        self.frame_index += 1;
        Ok(report)
    }

    pub fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        info!("Frame loop started");
        while !stop.load(Ordering::Relaxed) {
            if let Err(e) = self.step() {
                // failures after a stop request are part of shutdown
                if stop.load(Ordering::SeqCst) {
                    debug!("Frame error during shutdown ignored: {:#}", e);
                    break;
                }
                return Err(e);
            }
        }
        info!(
            "Frame loop stopped after {} frames ({} failed actions, toggled: {})",
            self.frame_index,
            self.dispatcher.failures(),
            self.state().toggled
        );
        Ok(())
    }

    /// Flushes the session log, if recording.
    pub fn finish(self) -> Result<Option<PathBuf>> {
        match self.recorder {
            Some(recorder) => Ok(Some(recorder.finish()?)),
            None => Ok(None),
        }
    }
}

/// Builds the controller on its own thread (the camera and keyboard handles stay
/// there) and runs it until `stop` is set. Returns once start-up has succeeded.
pub fn spawn_frame_loop(
    settings: AppSettings,
    tolerances: SharedTolerances,
    reports: ReportSlot,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<Result<()>>> {
    let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

    let handle = thread::Builder::new()
        .name("frame-loop".to_string())
        .spawn(move || -> Result<()> {
            let mut controller =
                match GestureController::from_settings(&settings, tolerances, reports.clone()) {
                    Ok(controller) => {
                        let _ = ready_tx.send(Ok(()));
                        controller
                    }
                    Err(e) => {
                        let message = format!("{:#}", e);
                        let _ = ready_tx.send(Err(e));
                        return Err(anyhow::anyhow!(message));
                    }
                };

            let outcome = controller.run(&stop);
            if let Err(e) = &outcome {
                error!("Frame loop failed: {:#}", e);
                reports.fail(format!("{:#}", e));
            }
            controller.finish()?;
            outcome
        })
        .context("Failed to spawn frame loop thread")?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        Err(_) => Err(anyhow::anyhow!("Frame loop exited during start-up")),
    }
}
