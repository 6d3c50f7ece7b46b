// src/main.rs
mod actions;
mod app;
mod config;
mod controller;
mod data;
mod gesture;
mod landmarks;
mod mediapipe_bridge;
mod tracking;
mod ui;
mod video;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;
use eframe::egui;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{AppSettings, DetectorBackend, SharedTolerances, VideoBackend};
use crate::controller::{spawn_frame_loop, ReportSlot};

/// Webcam hand-gesture volume dial
#[derive(Parser, Debug)]
#[command(name = "gesture_dial")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Run the frame loop without a window (Ctrl+C to stop)
    #[arg(long)]
    headless: bool,

    /// Settings file (defaults to $GESTURE_DIAL_CONFIG, then the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a per-hand CSV log of the session
    #[arg(long)]
    record: bool,

    /// Synthetic frames and a scripted hand instead of the camera and model
    #[arg(long)]
    simulate: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let settings_path = cli.config.clone().or_else(AppSettings::default_path);
    let mut settings = match &settings_path {
        Some(path) => AppSettings::load(path)?,
        None => AppSettings::default(),
    };
    if cli.headless {
        settings.headless = true;
    }
    if cli.record {
        settings.record_session = true;
    }
    if cli.simulate {
        settings.camera.backend = VideoBackend::Synthetic;
        settings.detector.backend = DetectorBackend::Simulated;
    }

    let tolerances = SharedTolerances::new(settings.tolerances);
    let reports = ReportSlot::new();
    let stop = Arc::new(AtomicBool::new(false));

    let stop_handler = stop.clone();
    ctrlc::set_handler(move || {
        stop_handler.store(true, Ordering::SeqCst);
    })?;

    // Fails here if the camera, landmark helper or keyboard cannot be opened
    let worker = spawn_frame_loop(
        settings.clone(),
        tolerances.clone(),
        reports.clone(),
        stop.clone(),
    )?;

    if settings.headless {
        info!("Running headless, press Ctrl+C to stop");
    } else {
        let window = run_window(settings, settings_path, tolerances, reports, stop.clone());
        stop.store(true, Ordering::SeqCst);
        window?;
    }

    let outcome = worker
        .join()
        .map_err(|_| anyhow!("Frame loop thread panicked"))?;
    info!("Shut down");
    outcome
}

fn run_window(
    settings: AppSettings,
    settings_path: Option<PathBuf>,
    tolerances: SharedTolerances,
    reports: ReportSlot,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 760.0])
            .with_min_inner_size([800.0, 520.0]),
        centered: true,
        ..Default::default()
    };

    eframe::run_native(
        "Gesture Dial",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(create_visuals());
            Box::new(app::GestureDialApp::new(
                settings,
                settings_path,
                tolerances,
                reports,
                stop,
            ))
        }),
    )
    .map_err(|e| anyhow!("Error running window: {}", e))
}

fn create_visuals() -> egui::Visuals {
    let mut visuals = egui::Visuals::dark();

    visuals.widgets.noninteractive.bg_fill = egui::Color32::from_rgb(30, 30, 35);
    visuals.widgets.inactive.bg_fill = egui::Color32::from_rgb(45, 45, 52);
    visuals.widgets.hovered.bg_fill = egui::Color32::from_rgb(55, 55, 65);
    visuals.widgets.active.bg_fill = egui::Color32::from_rgb(19, 118, 162);

    visuals.widgets.noninteractive.rounding = egui::Rounding::same(8.0);
    visuals.widgets.inactive.rounding = egui::Rounding::same(8.0);
    visuals.widgets.hovered.rounding = egui::Rounding::same(8.0);
    visuals.widgets.active.rounding = egui::Rounding::same(8.0);
    visuals.window_rounding = egui::Rounding::same(12.0);

    visuals
}
