// src/config.rs - Settings file and the runtime-adjustable tolerance cell
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::gesture::ToleranceConfig;

pub const CONFIG_ENV_VAR: &str = "GESTURE_DIAL_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read settings file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot write settings file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot serialize settings for {path}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorBackend {
    #[serde(rename = "mediapipe")]
    MediaPipe,
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    pub backend: DetectorBackend,
    /// Helper program and arguments speaking the landmark bridge protocol.
    pub command: Vec<String>,
    pub min_detection_confidence: f32,
    pub max_num_hands: usize,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DetectorBackend::MediaPipe,
            command: vec!["python3".to_string(), "hand_landmarks.py".to_string()],
            min_detection_confidence: 0.7,
            max_num_hands: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoBackend {
    Camera,
    /// Blank frames, for running without a webcam.
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub backend: VideoBackend,
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Flip frames horizontally so the preview behaves like a mirror.
    pub mirror: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            backend: VideoBackend::Camera,
            index: 0,
            width: 1280,
            height: 720,
            fps: 30,
            mirror: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeBackend {
    /// `osascript`, macOS.
    Osascript,
    /// `pactl`, PulseAudio / PipeWire.
    Pactl,
    LogOnly,
}

impl Default for VolumeBackend {
    fn default() -> Self {
        if cfg!(target_os = "macos") {
            VolumeBackend::Osascript
        } else {
            VolumeBackend::Pactl
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyboardBackend {
    Enigo,
    LogOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionSettings {
    pub volume: VolumeBackend,
    pub keyboard: KeyboardBackend,
    /// Spread pixels per volume percent.
    pub spread_per_percent: f64,
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self {
            volume: VolumeBackend::default(),
            keyboard: KeyboardBackend::Enigo,
            spread_per_percent: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub tolerances: ToleranceConfig,
    pub camera: CameraSettings,
    pub detector: DetectorSettings,
    pub actions: ActionSettings,
    pub headless: bool,
    pub record_session: bool,
    pub output_directory: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            tolerances: ToleranceConfig::default(),
            camera: CameraSettings::default(),
            detector: DetectorSettings::default(),
            actions: ActionSettings::default(),
            headless: false,
            record_session: false,
            output_directory: directories::UserDirs::new()
                .and_then(|dirs| dirs.document_dir().map(|p| p.join("GestureDial")))
                .unwrap_or_else(|| PathBuf::from("./output")),
        }
    }
}

impl AppSettings {
    /// `$GESTURE_DIAL_CONFIG`, else `settings.json` in the platform config dir.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Some(PathBuf::from(path));
        }
        directories::ProjectDirs::from("com", "gesturedial", "gesture_dial")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Missing file means defaults. Negative tolerances are clamped to zero.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Loaded settings from {}", path.display());
        Ok(settings.sanitized())
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let text = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, text).map_err(write_err)
    }

    pub fn sanitized(mut self) -> Self {
        if self.tolerances.has_negative() {
            warn!(
                "Negative tolerance in settings ({:?}), clamping to zero",
                self.tolerances
            );
            self.tolerances = self.tolerances.clamped();
        }
        if self.actions.spread_per_percent <= 0.0 {
            warn!(
                "spread_per_percent must be positive, got {}; using 3",
                self.actions.spread_per_percent
            );
            self.actions.spread_per_percent = 3.0;
        }
        self.detector.max_num_hands = self.detector.max_num_hands.max(1);
        self
    }
}

/// Tolerances shared between the control window and the frame loop.
/// Each field is read independently; a frame may see a half-applied slider move.
#[derive(Debug, Clone)]
pub struct SharedTolerances {
    inner: Arc<TolerancesInner>,
}

#[derive(Debug)]
struct TolerancesInner {
    sign: AtomicI32,
    mute: AtomicI32,
    pinch_margin: AtomicI32,
}

impl SharedTolerances {
    pub fn new(config: ToleranceConfig) -> Self {
        let config = config.clamped();
        Self {
            inner: Arc::new(TolerancesInner {
                sign: AtomicI32::new(config.sign_tolerance),
                mute: AtomicI32::new(config.mute_tolerance),
                pinch_margin: AtomicI32::new(config.pinch_margin),
            }),
        }
    }

    pub fn snapshot(&self) -> ToleranceConfig {
        ToleranceConfig {
            sign_tolerance: self.inner.sign.load(Ordering::Relaxed),
            mute_tolerance: self.inner.mute.load(Ordering::Relaxed),
            pinch_margin: self.inner.pinch_margin.load(Ordering::Relaxed),
        }
    }

    pub fn set(&self, config: ToleranceConfig) {
        if config.has_negative() {
            warn!("Rejecting negative tolerance {:?}, clamping to zero", config);
        }
        let config = config.clamped();
        self.inner.sign.store(config.sign_tolerance, Ordering::Relaxed);
        self.inner.mute.store(config.mute_tolerance, Ordering::Relaxed);
        self.inner.pinch_margin.store(config.pinch_margin, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dial_constants() {
        let settings = AppSettings::default();
        assert_eq!(settings.tolerances.sign_tolerance, 100);
        assert_eq!(settings.tolerances.mute_tolerance, 80);
        assert_eq!(settings.tolerances.pinch_margin, 30);
        assert_eq!(settings.camera.width, 1280);
        assert_eq!(settings.camera.height, 720);
        assert_eq!(settings.detector.min_detection_confidence, 0.7);
        assert_eq!(settings.detector.max_num_hands, 2);
        assert_eq!(settings.actions.spread_per_percent, 3.0);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AppSettings::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn partial_file_fills_in_defaults_and_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{
                "tolerances": { "sign_tolerance": -5, "mute_tolerance": 60 },
                "detector": { "backend": "simulated", "max_num_hands": 0 },
                "camera": { "backend": "synthetic" },
                "actions": { "spread_per_percent": 0 }
            }"#,
        )
        .unwrap();

        let settings = AppSettings::load(&path).unwrap();
        assert_eq!(settings.tolerances.sign_tolerance, 0);
        assert_eq!(settings.tolerances.mute_tolerance, 60);
        assert_eq!(settings.tolerances.pinch_margin, 30);
        assert_eq!(settings.detector.backend, DetectorBackend::Simulated);
        assert_eq!(settings.detector.max_num_hands, 1);
        assert_eq!(settings.detector.min_detection_confidence, 0.7);
        assert_eq!(settings.camera.backend, VideoBackend::Synthetic);
        assert!(settings.camera.mirror);
        assert_eq!(settings.actions.spread_per_percent, 3.0);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AppSettings::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn save_then_load_keeps_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = AppSettings::default();
        settings.tolerances.sign_tolerance = 140;
        settings.record_session = true;
        settings.save(&path).unwrap();

        let loaded = AppSettings::load(&path).unwrap();
        assert_eq!(loaded.tolerances.sign_tolerance, 140);
        assert!(loaded.record_session);
    }

    #[test]
    fn shared_tolerances_clamp_on_write() {
        let shared = SharedTolerances::new(ToleranceConfig::default());
        let reader = shared.clone();

        shared.set(ToleranceConfig {
            sign_tolerance: 150,
            mute_tolerance: -1,
            pinch_margin: 10,
        });

        let seen = reader.snapshot();
        assert_eq!(seen.sign_tolerance, 150);
        assert_eq!(seen.mute_tolerance, 0);
        assert_eq!(seen.pinch_margin, 10);
    }

    #[cfg(unix)]
    #[test]
    fn unserializable_settings_are_not_reported_as_parse_errors() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = AppSettings {
            output_directory: PathBuf::from(OsStr::from_bytes(b"/tmp/\xff")),
            ..AppSettings::default()
        };

        assert!(matches!(
            settings.save(&path),
            Err(ConfigError::Serialize { .. })
        ));
        assert!(!path.exists());
    }
}
