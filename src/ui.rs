// src/ui.rs - Theme, preview widget and the spread gauge
use eframe::egui::{self, Color32, Pos2, Rect, Stroke, Vec2};
use image::RgbaImage;

use crate::gesture::SpreadCategory;

#[derive(Debug, Clone)]
pub struct Theme {
    /// Thumb/index markers and the gauge needle.
    pub accent: Color32,
    pub active: Color32,
    pub muted: Color32,
    pub surface: Color32,
    pub idle: Color32,
    pub error: Color32,
    pub text_primary: Color32,
    pub text_secondary: Color32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: Color32::from_rgb(255, 0, 255),
            active: Color32::from_rgb(19, 118, 162),
            muted: Color32::from_rgb(19, 222, 162),
            surface: Color32::from_rgb(30, 30, 35),
            idle: Color32::from_rgb(100, 100, 100),
            error: Color32::from_rgb(244, 67, 54),
            text_primary: Color32::WHITE,
            text_secondary: Color32::from_rgb(200, 200, 200),
        }
    }
}

impl Theme {
    pub fn category_color(&self, category: Option<SpreadCategory>) -> Color32 {
        match category {
            Some(SpreadCategory::Active) => self.active,
            Some(SpreadCategory::Muted) => self.muted,
            None => self.idle,
        }
    }
}

/// Half-dial from left to right. Fill follows `spread / full_scale`; a tick
/// marks the mute threshold.
pub fn draw_spread_gauge(
    ui: &mut egui::Ui,
    theme: &Theme,
    spread: f64,
    category: Option<SpreadCategory>,
    mute_tolerance: i32,
    full_scale: f64,
) {
    let width = ui.available_width().min(260.0);
    let (rect, _) = ui.allocate_exact_size(Vec2::new(width, width * 0.6), egui::Sense::hover());
    let painter = ui.painter_at(rect);

    let center = Pos2::new(rect.center().x, rect.bottom() - 10.0);
    let radius = (width / 2.0 - 12.0).max(10.0);
    let start = std::f32::consts::PI;
    let sweep = std::f32::consts::PI;

    draw_arc(&painter, center, radius, start, start + sweep, theme.surface, 10.0);

    let fraction = if full_scale > 0.0 {
        (spread / full_scale).clamp(0.0, 1.0) as f32
    } else {
        0.0
    };
    if fraction > 0.0 {
        draw_arc(
            &painter,
            center,
            radius,
            start,
            start + sweep * fraction,
            theme.category_color(category),
            10.0,
        );
    }

    if full_scale > 0.0 {
        let mute = (mute_tolerance as f64 / full_scale).clamp(0.0, 1.0) as f32;
        let angle = start + sweep * mute;
        let dir = Vec2::new(angle.cos(), angle.sin());
        painter.line_segment(
            [center + dir * (radius - 14.0), center + dir * (radius + 8.0)],
            Stroke::new(2.0, theme.muted),
        );
    }

    painter.text(
        Pos2::new(center.x, center.y - radius * 0.35),
        egui::Align2::CENTER_CENTER,
        format!("{:.0} px", spread),
        egui::FontId::proportional(22.0),
        theme.text_primary,
    );
}

/// Filled dot when toggled, outline otherwise.
pub fn draw_toggle_indicator(ui: &mut egui::Ui, theme: &Theme, toggled: bool) {
    ui.horizontal(|ui| {
        let (rect, _) = ui.allocate_exact_size(Vec2::splat(18.0), egui::Sense::hover());
        let painter = ui.painter();
        if toggled {
            painter.circle_filled(rect.center(), 8.0, theme.accent);
        } else {
            painter.circle_stroke(rect.center(), 7.0, Stroke::new(2.0, theme.idle));
        }
        ui.label(if toggled { "Toggled on" } else { "Toggled off" });
    });
}

fn draw_arc(
    painter: &egui::Painter,
    center: Pos2,
    radius: f32,
    start_angle: f32,
    end_angle: f32,
    color: Color32,
    thickness: f32,
) {
    let points_count = (((end_angle - start_angle).abs() * 50.0) as usize).max(1);
    let points: Vec<Pos2> = (0..=points_count)
        .map(|i| {
            let t = i as f32 / points_count as f32;
            let angle = start_angle + (end_angle - start_angle) * t;
            Pos2::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            )
        })
        .collect();

    painter.add(egui::Shape::line(points, Stroke::new(thickness, color)));
}

pub fn to_color_image(frame: &RgbaImage) -> egui::ColorImage {
    let size = [frame.width() as usize, frame.height() as usize];
    egui::ColorImage::from_rgba_unmultiplied(size, frame.as_raw())
}

/// Camera preview. The texture is created once and updated in place.
pub struct VideoWidget {
    texture: Option<egui::TextureHandle>,
    aspect_ratio: f32,
}

impl VideoWidget {
    pub fn new() -> Self {
        Self {
            texture: None,
            aspect_ratio: 16.0 / 9.0,
        }
    }

    pub fn update_frame(&mut self, ctx: &egui::Context, frame: &RgbaImage) {
        if frame.height() > 0 {
            self.aspect_ratio = frame.width() as f32 / frame.height() as f32;
        }
        let image = to_color_image(frame);

        match self.texture.as_mut() {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.texture =
                    Some(ctx.load_texture("video_frame", image, egui::TextureOptions::LINEAR));
            }
        }
    }

    pub fn show(&self, ui: &mut egui::Ui, theme: &Theme) {
        let width = ui.available_width();
        let height = (width / self.aspect_ratio).min(ui.available_height().max(120.0));
        let (rect, _) = ui.allocate_exact_size(Vec2::new(width, height), egui::Sense::hover());

        if let Some(texture) = &self.texture {
            ui.painter().image(
                texture.id(),
                rect,
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
        } else {
            ui.painter()
                .rect_filled(rect, egui::Rounding::same(4.0), theme.surface);
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "No Video Signal",
                egui::FontId::proportional(16.0),
                theme.text_secondary,
            );
        }
    }
}

impl Default for VideoWidget {
    fn default() -> Self {
        Self::new()
    }
}
