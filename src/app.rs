//! Feedback window
//!
//! Polls the session on a fixed period, shows the recognised gesture's
//! picture, the live sensor values and the maximum opening per channel.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use eframe::egui;

use crate::gestures::{GestureImages, IMAGE_SIZE};
use crate::protocol::{GestureId, CHANNEL_COUNT, SENSOR_NAMES};
use crate::session::{BridgeStatus, Session};

pub const WINDOW_TITLE: &str = "5DT Glove Feedback - Neurorehabilitation";

const CAPTION_COLOR: egui::Color32 = egui::Color32::from_rgb(30, 80, 220);
const RECORDING_COLOR: egui::Color32 = egui::Color32::from_rgb(210, 40, 40);

/// Main application struct for egui
pub struct GloveFeedbackApp {
    session: Session,
    images: GestureImages,
    /// Uploaded gesture textures, keyed by the gesture they belong to
    textures: HashMap<GestureId, egui::TextureHandle>,
    poll_interval: Duration,
    last_poll: Option<Instant>,
}

impl GloveFeedbackApp {
    pub fn new(session: Session, images: GestureImages, poll_interval: Duration) -> Self {
        Self {
            session,
            images,
            textures: HashMap::new(),
            poll_interval,
            last_poll: None,
        }
    }

    /// Drain the bridge queue if a poll period has elapsed.
    fn tick(&mut self) {
        let due = self
            .last_poll
            .map(|at| at.elapsed() >= self.poll_interval)
            .unwrap_or(true);
        if !due {
            return;
        }
        self.last_poll = Some(Instant::now());

        let summary = self.session.poll();
        if summary.malformed > 0 {
            log::debug!("{} malformed lines dropped this tick", summary.malformed);
        }
    }

    fn reset_amplitude(&mut self) {
        self.session.reset_amplitude();
    }

    /// Shown under the reset button until the new session's first reading
    fn recording_banner(&self) -> Option<&'static str> {
        self.session
            .tracker()
            .is_collecting()
            .then_some("Recording new amplitude... Move your hand!")
    }

    fn gesture_texture(&mut self, ctx: &egui::Context, id: GestureId) -> Option<egui::TextureId> {
        let (owner, img) = self.images.image_for(id)?;
        let texture = self.textures.entry(owner).or_insert_with(|| {
            let size = [img.width() as usize, img.height() as usize];
            let image = egui::ColorImage::from_rgba_unmultiplied(size, img.as_raw());
            ctx.load_texture(
                format!("gesture_{}", owner),
                image,
                egui::TextureOptions::LINEAR,
            )
        });
        Some(texture.id())
    }

    fn draw_gesture(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let gesture = self.session.latest().map(|r| r.gesture);

        let (rect, _) = ui.allocate_exact_size(
            egui::vec2(IMAGE_SIZE as f32, IMAGE_SIZE as f32),
            egui::Sense::hover(),
        );
        if let Some(texture) = gesture.and_then(|g| self.gesture_texture(ctx, g)) {
            ui.painter().image(
                texture,
                rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }

        ui.add_space(10.0);
        let caption = match gesture {
            Some(g) => self.images.label_for(g),
            None => "Starting...".to_string(),
        };
        ui.label(
            egui::RichText::new(caption)
                .size(36.0)
                .strong()
                .color(CAPTION_COLOR),
        );
    }

    fn draw_sensors(&self, ui: &mut egui::Ui) {
        ui.heading("Sensor Values (0.0 to 1.0)");
        ui.add_space(5.0);

        let reading = self.session.latest().map(|r| &r.reading);
        egui::Grid::new("sensor_values").striped(true).show(ui, |ui| {
            for channel in 0..CHANNEL_COUNT {
                ui.label(SENSOR_NAMES[channel]);
                match reading {
                    Some(values) => ui.monospace(format!("{:.3}", values[channel])),
                    None => ui.monospace("-"),
                };
                ui.end_row();
            }
        });
    }

    fn draw_amplitude(&mut self, ui: &mut egui::Ui) {
        ui.heading("Maximum Opening Amplitude (reset each session)");
        ui.add_space(5.0);

        let tracker = self.session.tracker();
        egui::Grid::new("max_amplitude").striped(true).show(ui, |ui| {
            for channel in 0..CHANNEL_COUNT {
                ui.label(SENSOR_NAMES[channel]);
                match tracker.minimum(channel) {
                    Some(value) => ui.monospace(format!("{:.3}", value)),
                    None => ui.monospace("-"),
                };
                ui.end_row();
            }
        });

        ui.add_space(20.0);
        if ui.button("Start New Opening Session").clicked() {
            self.reset_amplitude();
        }

        if let Some(banner) = self.recording_banner() {
            ui.add_space(5.0);
            ui.colored_label(RECORDING_COLOR, egui::RichText::new(banner).size(14.0));
        }
    }

    fn draw_status(&self, ui: &mut egui::Ui) {
        let stats = self.session.stats();
        ui.horizontal(|ui| {
            match self.session.status() {
                BridgeStatus::Idle => ui.label("Bridge: idle"),
                BridgeStatus::Running => {
                    ui.colored_label(egui::Color32::DARK_GREEN, "Bridge: receiving")
                }
                BridgeStatus::Stopped => {
                    ui.colored_label(egui::Color32::GRAY, "Bridge: stopped (showing last values)")
                }
                BridgeStatus::Failed(reason) => {
                    ui.colored_label(RECORDING_COLOR, format!("Bridge: failed ({})", reason))
                }
            };
            ui.separator();
            ui.label(format!("Records: {}", stats.records));
            ui.separator();
            ui.label(format!("Malformed: {}", stats.malformed));
        });
    }
}

impl eframe::App for GloveFeedbackApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.tick();

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.draw_status(ui);
        });

        egui::SidePanel::left("gesture")
            .exact_width(260.0)
            .resizable(false)
            .show(ctx, |ui| {
                ui.add_space(20.0);
                ui.vertical_centered(|ui| {
                    self.draw_gesture(ctx, ui);
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(20.0);
            ui.columns(2, |columns| {
                self.draw_sensors(&mut columns[0]);
                self.draw_amplitude(&mut columns[1]);
            });
        });

        // Come back for the next poll even if nothing else happens
        ctx.request_repaint_after(self.poll_interval);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.session.shutdown();
    }
}

/// Open the feedback window and block until it is closed.
pub fn run(session: Session, images: GestureImages, poll_interval: Duration) -> anyhow::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 800.0])
            .with_resizable(false)
            .with_title(WINDOW_TITLE),
        ..Default::default()
    };

    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(move |_cc| Ok(Box::new(GloveFeedbackApp::new(session, images, poll_interval)))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run application: {}", e))?;

    Ok(())
}
