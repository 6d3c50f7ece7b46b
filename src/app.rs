// src/app.rs - Control window: preview, readouts and tolerance sliders
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use tracing::{error, info};

use crate::config::{AppSettings, SharedTolerances};
use crate::controller::{FrameReport, ReportSlot};
use crate::gesture::ToleranceConfig;
use crate::tracking::format_fps;
use crate::ui::{self, Theme, VideoWidget};

pub struct GestureDialApp {
    reports: ReportSlot,
    stop: Arc<AtomicBool>,
    tolerances: SharedTolerances,
    sliders: ToleranceConfig,
    settings: AppSettings,
    settings_path: Option<PathBuf>,
    status: Option<String>,

    current: Option<FrameReport>,
    video: VideoWidget,
    theme: Theme,
}

impl GestureDialApp {
    pub fn new(
        settings: AppSettings,
        settings_path: Option<PathBuf>,
        tolerances: SharedTolerances,
        reports: ReportSlot,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            reports,
            stop,
            sliders: tolerances.snapshot(),
            tolerances,
            settings,
            settings_path,
            status: None,
            current: None,
            video: VideoWidget::new(),
            theme: Theme::default(),
        }
    }

    fn pull_report(&mut self, ctx: &egui::Context) {
        let Some(report) = self.reports.latest() else {
            return;
        };
        let is_new = self
            .current
            .as_ref()
            .map_or(true, |current| current.frame_index != report.frame_index);

        if is_new {
            if let Some(preview) = &report.preview {
                self.video.update_frame(ctx, preview);
            }
            self.current = Some(report);
        }
    }

    fn render_header(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                ui.heading("Gesture Dial");
                ui.separator();

                let fps = self.current.as_ref().and_then(|r| r.fps);
                ui.label(format_fps(fps));

                if let Some(report) = &self.current {
                    ui.separator();
                    ui.label(format!("Detect: {:.1} ms", report.avg_processing_ms));
                    ui.separator();
                    match report.last_volume {
                        Some(volume) => ui.label(format!("Volume: {}%", volume)),
                        None => ui.label("Volume: -"),
                    };
                }

                if self.settings.record_session {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.colored_label(self.theme.error, "REC");
                    });
                }
            });
            ui.add_space(6.0);
        });
    }

    fn render_readouts(&mut self, ui: &mut egui::Ui) {
        let Some(report) = &self.current else {
            ui.label("Waiting for frames...");
            return;
        };

        ui::draw_toggle_indicator(ui, &self.theme, report.toggled);
        ui.add_space(8.0);

        if report.hands.is_empty() {
            ui.colored_label(self.theme.idle, "No hand detected");
            return;
        }

        let full_scale = 100.0 * self.settings.actions.spread_per_percent;
        if let Some(first) = report.hands.first() {
            ui::draw_spread_gauge(
                ui,
                &self.theme,
                first.result.spread,
                first.result.category,
                report.tolerances.mute_tolerance,
                full_scale,
            );
        }

        for (i, hand) in report.hands.iter().enumerate() {
            ui.group(|ui| {
                ui.label(format!(
                    "Hand {} ({} {:.0}%)",
                    i + 1,
                    hand.handedness,
                    hand.handedness_score * 100.0
                ));
                ui.label(format!("Spread: {:.1} px", hand.result.spread));

                let color = self.theme.category_color(hand.result.category);
                match hand.result.category {
                    Some(category) => ui.colored_label(color, category.as_str()),
                    None => ui.colored_label(color, "sign not held"),
                };

                if let Some(event) = hand.result.toggle {
                    ui.colored_label(self.theme.accent, event.as_str());
                }
            });
        }
    }

    fn render_tolerances(&mut self, ui: &mut egui::Ui) {
        ui.heading("Tolerances");
        ui.add_space(4.0);

        let mut changed = false;
        changed |= ui
            .add(egui::Slider::new(&mut self.sliders.sign_tolerance, 0..=300).text("Sign"))
            .changed();
        changed |= ui
            .add(egui::Slider::new(&mut self.sliders.mute_tolerance, 0..=300).text("Mute"))
            .changed();
        changed |= ui
            .add(egui::Slider::new(&mut self.sliders.pinch_margin, 0..=100).text("Pinch margin"))
            .changed();

        if changed {
            self.tolerances.set(self.sliders);
        }

        if ui.button("Reset").clicked() {
            self.sliders = ToleranceConfig::default();
            self.tolerances.set(self.sliders);
        }

        if let Some(path) = self.settings_path.clone() {
            if ui.button("Save settings").clicked() {
                self.settings.tolerances = self.sliders;
                self.status = Some(match self.settings.save(&path) {
                    Ok(()) => {
                        info!("Saved settings to {}", path.display());
                        format!("Saved to {}", path.display())
                    }
                    Err(e) => {
                        error!("{:#}", anyhow::Error::new(e));
                        "Failed to save settings".to_string()
                    }
                });
            }
        }

        if let Some(status) = &self.status {
            ui.label(egui::RichText::new(status).color(self.theme.text_secondary).small());
        }
    }
}

impl eframe::App for GestureDialApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(message) = self.reports.failure() {
            error!("Closing window: {}", message);
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }
        if self.stop.load(Ordering::Relaxed) {
            info!("Stop requested, closing window");
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }

        self.pull_report(ctx);
        self.render_header(ctx);

        egui::SidePanel::right("readouts")
            .min_width(280.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.render_readouts(ui);
                    ui.separator();
                    self.render_tolerances(ui);
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.video.show(ui, &self.theme);
        });

        ctx.request_repaint_after(Duration::from_millis(15));
    }
}
