// src/actions.rs - OS side effects driven by classification results
use std::process::{Command, ExitStatus};

use anyhow::{Context, Result};
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ActionSettings, KeyboardBackend, VolumeBackend};
use crate::gesture::{ClassificationResult, ToggleEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to run {program}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Status {
        program: &'static str,
        status: ExitStatus,
    },
    #[error("keyboard synthesis failed: {0}")]
    Keyboard(String),
}

pub trait VolumeControl {
    /// `percent` is already clamped to 0..=100.
    fn set_volume(&mut self, percent: u8) -> Result<(), DispatchError>;
}

pub trait KeyTap {
    /// One spacebar press followed by its release.
    fn tap_space(&mut self) -> Result<(), DispatchError>;
}

fn run(program: &'static str, command: &mut Command) -> Result<(), DispatchError> {
    let status = command
        .status()
        .map_err(|source| DispatchError::Spawn { program, source })?;
    if status.success() {
        Ok(())
    } else {
        Err(DispatchError::Status { program, status })
    }
}

pub struct Osascript;

impl VolumeControl for Osascript {
    fn set_volume(&mut self, percent: u8) -> Result<(), DispatchError> {
        run(
            "osascript",
            Command::new("osascript")
                .arg("-e")
                .arg(format!("set volume output volume {}", percent)),
        )
    }
}

pub struct Pactl;

impl VolumeControl for Pactl {
    fn set_volume(&mut self, percent: u8) -> Result<(), DispatchError> {
        run(
            "pactl",
            Command::new("pactl")
                .args(["set-sink-volume", "@DEFAULT_SINK@"])
                .arg(format!("{}%", percent)),
        )
    }
}

/// Logs instead of touching the system.
pub struct LogOnly;

impl VolumeControl for LogOnly {
    fn set_volume(&mut self, percent: u8) -> Result<(), DispatchError> {
        info!("volume -> {}%", percent);
        Ok(())
    }
}

impl KeyTap for LogOnly {
    fn tap_space(&mut self) -> Result<(), DispatchError> {
        info!("space tapped");
        Ok(())
    }
}

pub struct EnigoKeyboard {
    enigo: Enigo,
}

impl EnigoKeyboard {
    pub fn new() -> Result<Self, DispatchError> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| DispatchError::Keyboard(format!("{:?}", e)))?;
        Ok(Self { enigo })
    }
}

impl KeyTap for EnigoKeyboard {
    fn tap_space(&mut self) -> Result<(), DispatchError> {
        self.enigo
            .key(Key::Space, Direction::Press)
            .map_err(|e| DispatchError::Keyboard(format!("{:?}", e)))?;
        self.enigo
            .key(Key::Space, Direction::Release)
            .map_err(|e| DispatchError::Keyboard(format!("{:?}", e)))
    }
}

pub fn volume_percent(spread: f64, spread_per_percent: f64) -> u8 {
    (spread / spread_per_percent).round().clamp(0.0, 100.0) as u8
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Percentage sent to the volume backend this call, if any.
    pub volume: Option<u8>,
    pub taps: usize,
}

pub struct ActionDispatcher {
    volume: Box<dyn VolumeControl>,
    keys: Box<dyn KeyTap>,
    spread_per_percent: f64,
    last_percent: Option<u8>,
    failures: u64,
}

impl ActionDispatcher {
    pub fn new(
        volume: Box<dyn VolumeControl>,
        keys: Box<dyn KeyTap>,
        spread_per_percent: f64,
    ) -> Self {
        Self {
            volume,
            keys,
            spread_per_percent,
            last_percent: None,
            failures: 0,
        }
    }

    pub fn from_settings(settings: &ActionSettings) -> Result<Self> {
        let volume: Box<dyn VolumeControl> = match settings.volume {
            VolumeBackend::Osascript => Box::new(Osascript),
            VolumeBackend::Pactl => Box::new(Pactl),
            VolumeBackend::LogOnly => Box::new(LogOnly),
        };
        let keys: Box<dyn KeyTap> = match settings.keyboard {
            KeyboardBackend::Enigo => {
                Box::new(EnigoKeyboard::new().context("Failed to set up keyboard synthesis")?)
            }
            KeyboardBackend::LogOnly => Box::new(LogOnly),
        };
        info!(
            "Actions: volume via {:?}, keyboard via {:?}",
            settings.volume, settings.keyboard
        );
        Ok(Self::new(volume, keys, settings.spread_per_percent))
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Volume follows the spread only while the sign is held; every toggle
    /// event becomes exactly one spacebar tap. Failures are logged, not returned.
    pub fn dispatch(&mut self, result: &ClassificationResult) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        if result.sign_held {
            let percent = volume_percent(result.spread, self.spread_per_percent);
            if self.last_percent != Some(percent) {
                match self.volume.set_volume(percent) {
                    Ok(()) => {
                        debug!("Volume set to {}%", percent);
                        self.last_percent = Some(percent);
                        outcome.volume = Some(percent);
                    }
                    Err(e) => {
                        self.failures += 1;
                        warn!("Volume update failed: {:#}", anyhow::Error::new(e));
                    }
                }
            }
        }

        if let Some(event) = result.toggle {
            match self.keys.tap_space() {
                Ok(()) => {
                    outcome.taps += 1;
                    match event {
                        ToggleEvent::Activated => info!("Pinch held, space tapped"),
                        ToggleEvent::Deactivated => info!("Pinch released, space tapped"),
                    }
                }
                Err(e) => {
                    self.failures += 1;
                    warn!("Key tap for {} failed: {:#}", event.as_str(), anyhow::Error::new(e));
                }
            }
        }

        outcome
    }
}
