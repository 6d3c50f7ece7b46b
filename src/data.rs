// src/data.rs - Per-hand gesture log streamed to CSV
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use serde::Serialize;
use tracing::info;

use crate::gesture::{ClassificationResult, ToggleEvent};

#[derive(Debug, Clone, Serialize, PartialEq)]
struct GestureRecord<'a> {
    frame: u64,
    timestamp: f64,
    hand: usize,
    handedness: &'a str,
    spread: f64,
    sign_held: bool,
    category: Option<&'static str>,
    toggle: Option<&'static str>,
    toggled: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames: u64,
    pub hands: usize,
    pub activations: usize,
    pub deactivations: usize,
}

/// Rows are written as they arrive and flushed once per frame.
pub struct SessionRecorder {
    session_name: String,
    csv_path: PathBuf,
    writer: Writer<File>,
    summary: SessionSummary,
}

impl SessionRecorder {
    /// Creates `<output_dir>/<session_name>/gesture_log.csv`. The name defaults
    /// to `session_<YYYYmmdd_HHMMSS>`.
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Result<Self> {
        let session_name = session_name.unwrap_or_else(|| {
            format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        let session_dir = output_dir.as_ref().join(&session_name);
        std::fs::create_dir_all(&session_dir)
            .with_context(|| format!("Failed to create {}", session_dir.display()))?;

        let csv_path = session_dir.join("gesture_log.csv");
        let file = File::create(&csv_path)
            .with_context(|| format!("Failed to create {}", csv_path.display()))?;

        Ok(Self {
            session_name,
            csv_path,
            writer: Writer::from_writer(file),
            summary: SessionSummary::default(),
        })
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    /// Ends a frame and pushes its rows to disk.
    pub fn mark_frame(&mut self) -> Result<()> {
        self.summary.frames += 1;
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush {}", self.csv_path.display()))
    }

    pub fn add_hand(
        &mut self,
        frame: u64,
        timestamp: f64,
        hand: usize,
        handedness: &str,
        result: &ClassificationResult,
        toggled: bool,
    ) -> Result<()> {
        self.writer.serialize(GestureRecord {
            frame,
            timestamp,
            hand,
            handedness,
            spread: result.spread,
            sign_held: result.sign_held,
            category: result.category.map(|c| c.as_str()),
            toggle: result.toggle.map(|t| t.as_str()),
            toggled,
        })?;

        self.summary.hands += 1;
        match result.toggle {
            Some(ToggleEvent::Activated) => self.summary.activations += 1,
            Some(ToggleEvent::Deactivated) => self.summary.deactivations += 1,
            None => {}
        }
        Ok(())
    }

    pub fn summary(&self) -> SessionSummary {
        self.summary
    }

    /// Flushes the log and reports the session summary.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush {}", self.csv_path.display()))?;

        let summary = self.summary;
        info!(
            "Session {}: {} frames, {} hand rows, {} activations, {} deactivations -> {}",
            self.session_name,
            summary.frames,
            summary.hands,
            summary.activations,
            summary.deactivations,
            self.csv_path.display()
        );

        Ok(self.csv_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::SpreadCategory;

    fn result(spread: f64, toggle: Option<ToggleEvent>) -> ClassificationResult {
        ClassificationResult {
            spread,
            sign_held: true,
            category: Some(SpreadCategory::Active),
            toggle,
        }
    }

    #[test]
    fn csv_has_header_and_one_row_per_hand() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder =
            SessionRecorder::new(dir.path(), Some("test_session".to_string())).unwrap();

        recorder
            .add_hand(0, 0.0, 0, "Right", &result(90.0, Some(ToggleEvent::Activated)), true)
            .unwrap();
        recorder.mark_frame().unwrap();
        recorder.add_hand(1, 0.033, 0, "Right", &result(85.5, None), true).unwrap();
        recorder
            .add_hand(
                1,
                0.033,
                1,
                "Left",
                &ClassificationResult {
                    spread: 12.0,
                    sign_held: false,
                    category: None,
                    toggle: None,
                },
                true,
            )
            .unwrap();
        recorder.mark_frame().unwrap();

        let path = recorder.finish().unwrap();
        assert_eq!(path, dir.path().join("test_session").join("gesture_log.csv"));

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "frame,timestamp,hand,handedness,spread,sign_held,category,toggle,toggled"
        );
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "0,0.0,0,Right,90.0,true,active,activated,true");
        assert_eq!(lines[3], "1,0.033,1,Left,12.0,false,,,true");
    }

    #[test]
    fn rows_reach_disk_before_finish() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = SessionRecorder::new(dir.path(), Some("live".to_string())).unwrap();

        recorder.add_hand(0, 0.0, 0, "Right", &result(60.0, None), false).unwrap();
        recorder.mark_frame().unwrap();

        // recorder still open, as after a crash
        let text = std::fs::read_to_string(recorder.csv_path()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().nth(1).unwrap().starts_with("0,0.0,0,Right,60.0,"));
    }

    #[test]
    fn summary_counts_toggle_events() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = SessionRecorder::new(dir.path(), Some("s".to_string())).unwrap();
        for (i, toggle) in [
            Some(ToggleEvent::Activated),
            None,
            Some(ToggleEvent::Deactivated),
            Some(ToggleEvent::Activated),
        ]
        .into_iter()
        .enumerate()
        {
            recorder
                .add_hand(i as u64, 0.0, 0, "Right", &result(50.0, toggle), false)
                .unwrap();
            recorder.mark_frame().unwrap();
        }

        assert_eq!(
            recorder.summary(),
            SessionSummary {
                frames: 4,
                hands: 4,
                activations: 2,
                deactivations: 1,
            }
        );
    }
}
