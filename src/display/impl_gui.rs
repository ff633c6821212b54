use crate::display::interface::{write_into, LineBuffer, StatusDisplay};
use std::error::Error;
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Clone)]
struct StatusWindow {
    shown: Arc<Mutex<LineBuffer>>,
}

impl eframe::App for StatusWindow {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let lines = match self.shown.lock() {
            Ok(shown) => shown.clone(),
            Err(_) => return,
        };

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(20.0);

                let rect = ui.available_rect_before_wrap();
                ui.painter()
                    .rect_filled(rect, 0.0, egui::Color32::from_rgb(200, 255, 200));
                ui.painter().rect_stroke(
                    rect,
                    0.0,
                    egui::Stroke::new(2.0, egui::Color32::from_rgb(100, 100, 100)),
                );

                for line in lines.iter() {
                    ui.label(
                        egui::RichText::new(line)
                            .monospace()
                            .color(egui::Color32::BLACK)
                            .size(20.0),
                    );
                }
            });
        });

        // training and prediction update the lines without any input events
        ctx.request_repaint_after(std::time::Duration::from_millis(100));
    }
}

/// Status window drawn by egui on its own thread.
pub struct StatusDisplayGui {
    buffer: LineBuffer,
    shown: Arc<Mutex<LineBuffer>>,
}

impl StatusDisplayGui {
    pub fn new() -> Self {
        Self {
            buffer: LineBuffer::default(),
            shown: Arc::new(Mutex::new(LineBuffer::default())),
        }
    }
}

impl Default for StatusDisplayGui {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusDisplay for StatusDisplayGui {
    fn init(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let shown = self.shown.clone();

        thread::spawn(move || {
            let options = eframe::NativeOptions {
                viewport: egui::ViewportBuilder::default()
                    .with_inner_size([480.0, 160.0])
                    .with_resizable(false),
                ..Default::default()
            };

            let window = StatusWindow { shown };

            // blocks this thread until the window is closed
            let _ = eframe::run_native(
                "Transfer Cam",
                options,
                Box::new(|_cc| Box::new(window)),
            );
        });

        Ok(())
    }

    fn clear(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.buffer = LineBuffer::default();
        Ok(())
    }

    fn write_line(&mut self, line: u8, text: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        let width = self.chars_per_line();
        write_into(&mut self.buffer, line, text, width)
    }

    fn flush(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        *self.shown.lock().map_err(|_| "display lock poisoned")? = self.buffer.clone();
        Ok(())
    }
}
