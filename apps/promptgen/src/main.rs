mod app;
mod error;
mod export;
mod generator;
mod memory;
mod ollama;
mod parser;
mod record;

use app::PromptGenApp;
use eframe::egui;

fn main() -> eframe::Result<()> {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1100.0, 900.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Ollama Prompt Generator",
        options,
        Box::new(|_cc| Box::new(PromptGenApp::default())),
    )
}
