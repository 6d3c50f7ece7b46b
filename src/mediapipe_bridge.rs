// src/mediapipe_bridge.rs - MediaPipe hand landmarker through a helper process
//
// Protocol, one request per frame:
//   helper prints `READY` once after start-up
//   -> u32 LE width, u32 LE height, u32 LE channels (3), then width*height*3 RGB8 bytes
//   <- one JSON line: {"hands":[{"handedness":"Left","score":0.9,"landmarks":[{"x":..,"y":..,"z":..}, ...]}],"error":null}
// Landmark x/y are normalized to the frame size. `score` is the handedness
// certainty; detection thresholds are passed to the helper as arguments:
//   --min-detection-confidence <f32> --max-num-hands <n>
use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use image::DynamicImage;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DetectorSettings;
use crate::landmarks::{LandmarkSet, LANDMARK_COUNT};
use crate::tracking::{DetectedHand, LandmarkProvider};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("landmark helper command is empty")]
    EmptyCommand,
    #[error("failed to start landmark helper `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("landmark helper did not signal ready, got {0:?}")]
    NotReady(String),
    #[error("landmark helper closed its output")]
    Closed,
    #[error("malformed landmark response")]
    Malformed(#[from] serde_json::Error),
    #[error("landmark helper pipe failed")]
    Io(#[from] io::Error),
}

#[derive(Deserialize, Debug)]
struct LandmarkJson {
    x: f64,
    y: f64,
    #[serde(default)]
    z: f64,
}

#[derive(Deserialize, Debug)]
struct HandJson {
    #[serde(default)]
    handedness: String,
    score: f32,
    landmarks: Vec<LandmarkJson>,
}

#[derive(Deserialize, Debug)]
struct DetectionResponse {
    #[serde(default)]
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

/// Parses one response line into pixel-space hands for a `width` x `height` frame.
/// Hands without a full 21-point skeleton are dropped; a helper-side error yields no hands.
pub fn parse_response(line: &str, width: u32, height: u32) -> Result<Vec<DetectedHand>, BridgeError> {
    let response: DetectionResponse = serde_json::from_str(line.trim())?;

    if let Some(error) = response.error {
        warn!("Landmark helper error: {}", error);
        return Ok(Vec::new());
    }

    let hands = response
        .hands
        .into_iter()
        .filter_map(|hand| {
            if hand.landmarks.len() != LANDMARK_COUNT {
                warn!("Expected {} landmarks, got {}", LANDMARK_COUNT, hand.landmarks.len());
                return None;
            }
            let points: Vec<[f64; 3]> = hand.landmarks.iter().map(|lm| [lm.x, lm.y, lm.z]).collect();
            Some(DetectedHand {
                handedness: hand.handedness,
                handedness_score: hand.score,
                landmarks: LandmarkSet::from_normalized(&points, width, height),
            })
        })
        .collect();

    Ok(hands)
}

/// Configured helper command with the detector thresholds appended.
pub fn helper_command(settings: &DetectorSettings) -> Vec<String> {
    let mut command = settings.command.clone();
    command.extend([
        "--min-detection-confidence".to_string(),
        settings.min_detection_confidence.clamp(0.0, 1.0).to_string(),
        "--max-num-hands".to_string(),
        settings.max_num_hands.max(1).to_string(),
    ]);
    command
}

pub struct MediaPipeWrapper {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl MediaPipeWrapper {
    /// Starts the helper and blocks until it reports `READY`.
    pub fn new(command: &[String]) -> Result<Self, BridgeError> {
        let (program, args) = command.split_first().ok_or(BridgeError::EmptyCommand)?;

        info!("Starting landmark helper: {}", command.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        // own process group, so a terminal Ctrl+C reaches only this process
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut process = cmd.spawn().map_err(|source| BridgeError::Spawn {
            command: command.join(" "),
            source,
        })?;

        let (stdin, stdout) = match (process.stdin.take(), process.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                stop_child(&mut process);
                return Err(BridgeError::Closed);
            }
        };
        let mut stdout = BufReader::new(stdout);

        let mut ready = String::new();
        if let Err(e) = stdout.read_line(&mut ready) {
            stop_child(&mut process);
            return Err(BridgeError::Io(e));
        }
        if ready.trim() != "READY" {
            stop_child(&mut process);
            return Err(BridgeError::NotReady(ready.trim().to_string()));
        }

        info!("Landmark helper ready");

        Ok(Self {
            process,
            stdin,
            stdout,
        })
    }

    pub fn process(&mut self, frame: &DynamicImage) -> Result<Vec<DetectedHand>, BridgeError> {
        let rgb = frame.to_rgb8();
        let (width, height) = rgb.dimensions();

        self.stdin.write_all(&width.to_le_bytes())?;
        self.stdin.write_all(&height.to_le_bytes())?;
        self.stdin.write_all(&3u32.to_le_bytes())?;
        self.stdin.write_all(rgb.as_raw())?;
        self.stdin.flush()?;

        let mut response = String::new();
        if self.stdout.read_line(&mut response)? == 0 {
            return Err(BridgeError::Closed);
        }

        let hands = parse_response(&response, width, height)?;
        debug!("Helper reported {} hand(s)", hands.len());
        Ok(hands)
    }
}

impl LandmarkProvider for MediaPipeWrapper {
    fn detect(&mut self, frame: &DynamicImage) -> anyhow::Result<Vec<DetectedHand>> {
        Ok(self.process(frame)?)
    }
}

fn stop_child(process: &mut Child) {
    let _ = process.kill();
    let _ = process.wait();
}

impl Drop for MediaPipeWrapper {
    fn drop(&mut self) {
        stop_child(&mut self.process);
    }
}
