// src/video.rs - Frame sources: webcam through nokhwa, or blank synthetic frames
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use image::DynamicImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;
use tracing::{debug, info, warn};

use crate::config::{CameraSettings, VideoBackend};

pub enum VideoSource {
    Camera { camera: Camera, mirror: bool },
    Synthetic(SyntheticFrames),
}

/// Black frames at a fixed rate, for running the pipeline without a webcam.
pub struct SyntheticFrames {
    width: u32,
    height: u32,
    frame_interval: Duration,
    last_frame: Option<Instant>,
}

impl SyntheticFrames {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            frame_interval: Duration::from_secs(1) / fps.max(1),
            last_frame: None,
        }
    }

    pub fn next_frame(&mut self) -> DynamicImage {
        if let Some(last) = self.last_frame {
            let elapsed = last.elapsed();
            if elapsed < self.frame_interval {
                thread::sleep(self.frame_interval - elapsed);
            }
        }
        self.last_frame = Some(Instant::now());
        DynamicImage::new_rgb8(self.width, self.height)
    }
}

impl VideoSource {
    pub fn from_settings(settings: &CameraSettings) -> Result<Self> {
        match settings.backend {
            VideoBackend::Camera => Self::new_camera(settings),
            VideoBackend::Synthetic => {
                info!(
                    "Using synthetic {}x{} frames at {} fps",
                    settings.width, settings.height, settings.fps
                );
                Ok(VideoSource::Synthetic(SyntheticFrames::new(
                    settings.width,
                    settings.height,
                    settings.fps,
                )))
            }
        }
    }

    pub fn new_camera(settings: &CameraSettings) -> Result<Self> {
        info!(
            "Opening camera {} at {}x{} @ {} fps",
            settings.index, settings.width, settings.height, settings.fps
        );

        let format = CameraFormat::new(
            Resolution::new(settings.width, settings.height),
            FrameFormat::MJPEG,
            settings.fps,
        );
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

        let mut camera = Camera::new(CameraIndex::Index(settings.index), requested)
            .map_err(|e| anyhow::anyhow!("Failed to open camera {}: {}", settings.index, e))?;
        camera
            .open_stream()
            .map_err(|e| anyhow::anyhow!("Failed to open camera stream: {}", e))?;

        let resolution = camera.resolution();
        if resolution.width() != settings.width || resolution.height() != settings.height {
            warn!(
                "Camera gave {}x{} instead of {}x{}",
                resolution.width(),
                resolution.height(),
                settings.width,
                settings.height
            );
        }

        Ok(VideoSource::Camera {
            camera,
            mirror: settings.mirror,
        })
    }

    pub fn read_frame(&mut self) -> Result<DynamicImage> {
        match self {
            VideoSource::Camera { camera, mirror } => {
                let frame = camera
                    .frame()
                    .map_err(|e| anyhow::anyhow!("Failed to capture frame: {}", e))?;
                let decoded = frame
                    .decode_image::<RgbFormat>()
                    .map_err(|e| anyhow::anyhow!("Failed to decode frame: {}", e))
                    .context("Camera returned an unreadable frame")?;

                let image = if *mirror {
                    image::imageops::flip_horizontal(&decoded)
                } else {
                    decoded
                };
                Ok(DynamicImage::ImageRgb8(image))
            }
            VideoSource::Synthetic(frames) => Ok(frames.next_frame()),
        }
    }

    pub fn resolution(&self) -> (u32, u32) {
        match self {
            VideoSource::Camera { camera, .. } => {
                let resolution = camera.resolution();
                (resolution.width(), resolution.height())
            }
            VideoSource::Synthetic(frames) => (frames.width, frames.height),
        }
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        if let VideoSource::Camera { camera, .. } = self {
            debug!("Stopping camera stream");
            let _ = camera.stop_stream();
        }
    }
}
