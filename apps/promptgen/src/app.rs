//! 桌面界面
//!
//! 控制线程(UI)负责启动/停止与记忆管理, 每个模型一个工作线程,
//! 事件经 mpsc 送回, update 里用 try_recv 轮询

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Receiver},
    Arc,
};

use eframe::egui;

use crate::{
    export::SaveMode,
    generator::{run_generation, GenEvent, GenerationTask},
    memory::GenerationMemory,
    ollama::OllamaCli,
};

/// 单个模型的配置面板
struct ModelPanel {
    name: String,
    count_text: String,
    output_csv: String,
    reference: String,
    log: String,
    progress: f32,
}

impl ModelPanel {
    fn new(number: usize) -> Self {
        Self {
            name: "llama3".to_string(),
            count_text: "5".to_string(),
            output_csv: format!("prompts/unique_prompts{number}.csv"),
            reference: String::new(),
            log: String::new(),
            progress: 0.0,
        }
    }

    fn ui(&mut self, ui: &mut egui::Ui, slot: usize, auto_scroll: bool) {
        ui.group(|ui| {
            ui.strong(format!("Model #{} Configuration", slot + 1));

            ui.horizontal(|ui| {
                ui.label("Model Name:");
                ui.text_edit_singleline(&mut self.name);
            });
            ui.horizontal(|ui| {
                ui.label("Number of Prompts:");
                ui.add(egui::TextEdit::singleline(&mut self.count_text).desired_width(60.0));
            });
            ui.horizontal(|ui| {
                ui.label("Output CSV:");
                ui.text_edit_singleline(&mut self.output_csv);
                if ui.button("Browse...").clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("CSV files", &["csv"])
                        .save_file()
                    {
                        self.output_csv = path.display().to_string();
                    }
                }
            });

            ui.label(format!("Reference Prompt (Model #{})", slot + 1));
            ui.add(
                egui::TextEdit::multiline(&mut self.reference)
                    .desired_rows(3)
                    .desired_width(f32::INFINITY),
            );

            ui.add(egui::ProgressBar::new(self.progress).show_percentage());

            ui.horizontal(|ui| {
                ui.label(format!("Model #{} Log", slot + 1));
                if ui.button("Clear Log").clicked() {
                    self.log.clear();
                }
            });
            egui::ScrollArea::vertical()
                .id_source(format!("model-log-{slot}"))
                .max_height(240.0)
                .stick_to_bottom(auto_scroll)
                .show(ui, |ui| {
                    ui.monospace(self.log.as_str());
                });
        });
    }

    fn log_line(&mut self, message: &str) {
        self.log.push_str(message);
        self.log.push('\n');
    }
}

pub struct PromptGenApp {
    two_models: bool,
    panels: [ModelPanel; 2],

    use_memory: bool,
    save_mode: SaveMode,
    auto_save_every_text: String,
    auto_scroll: bool,

    memory: Arc<GenerationMemory>,
    stop_flag: Arc<AtomicBool>,
    events_rx: Option<Receiver<GenEvent>>,
    running: bool,
}

impl Default for PromptGenApp {
    fn default() -> Self {
        Self {
            two_models: false,
            panels: [ModelPanel::new(1), ModelPanel::new(2)],
            use_memory: true,
            save_mode: SaveMode::Append,
            auto_save_every_text: "50".to_string(),
            auto_scroll: true,
            memory: Arc::new(GenerationMemory::new()),
            stop_flag: Arc::new(AtomicBool::new(false)),
            events_rx: None,
            running: false,
        }
    }
}

impl PromptGenApp {
    /// 启动生成: 每个启用的模型一个工作线程, 控制线程等待全部汇合
    fn start(&mut self) {
        if self.running {
            return;
        }

        // 解析失败回退 50, 负数视为关闭周期落盘
        let flush_every = match self.auto_save_every_text.trim().parse::<i64>() {
            Ok(v) if v < 0 => 0,
            Ok(v) => v as usize,
            Err(_) => 50,
        };

        let panel_count = if self.two_models { 2 } else { 1 };
        let mut tasks = Vec::new();
        for (slot, panel) in self.panels.iter_mut().take(panel_count).enumerate() {
            panel.progress = 0.0;
            let target_count = match panel.count_text.trim().parse::<usize>() {
                Ok(v) if v >= 1 => v,
                _ => {
                    log::warn!("invalid prompt count '{}', using 5", panel.count_text);
                    5
                }
            };
            tasks.push(GenerationTask {
                slot,
                model_key: panel.name.trim().to_string(),
                target_count,
                output_csv: panel.output_csv.trim().to_string(),
                reference_text: panel.reference.trim().to_string(),
                use_memory: self.use_memory,
                save_mode: self.save_mode,
                flush_every,
            });
        }

        let (events_tx, events_rx) = mpsc::channel();
        self.events_rx = Some(events_rx);
        self.running = true;
        self.stop_flag.store(false, Ordering::SeqCst);

        let memory = self.memory.clone();
        let stop = self.stop_flag.clone();
        std::thread::spawn(move || {
            let mut handles = Vec::new();
            for task in tasks {
                let memory = memory.clone();
                let stop = stop.clone();
                let events = events_tx.clone();
                handles.push(std::thread::spawn(move || {
                    let model = OllamaCli::new(task.model_key.clone());
                    let _accepted = run_generation(&task, &model, &memory, &stop, &events);
                    let _ = events.send(GenEvent::Finished { slot: task.slot });
                }));
            }
            for handle in handles {
                let _ = handle.join();
            }
            let _ = events_tx.send(GenEvent::AllFinished);
        });
    }

    fn poll_events(&mut self) {
        let mut events = Vec::new();
        if let Some(events_rx) = &self.events_rx {
            while let Ok(event) = events_rx.try_recv() {
                events.push(event);
            }
        }

        for event in events {
            match event {
                GenEvent::Log { slot, message } => self.panels[slot].log_line(&message),
                GenEvent::Progress {
                    slot,
                    accepted,
                    target,
                } => {
                    self.panels[slot].progress = accepted as f32 / target.max(1) as f32;
                }
                GenEvent::Finished { slot } => {
                    self.panels[slot].log_line("[INFO] Generation process finished.");
                }
                GenEvent::AllFinished => {
                    self.running = false;
                    self.events_rx = None;
                }
            }
        }
    }

    /// 清空全部记忆 (两次运行之间的控制线程操作)
    fn reset_memory(&mut self) {
        self.memory.clear();
        for panel in &mut self.panels {
            panel.log_line("[INFO] All memory has been reset.");
        }
    }

    /// 把记忆内容打印到两个日志面板
    fn show_memory(&mut self) {
        let snapshot = self.memory.snapshot();
        let mut message = String::new();
        if snapshot.is_empty() {
            message.push_str("[INFO] No memory stored for any model.\n");
        } else {
            message.push_str("[INFO] Current stored memory:\n");
            for (model, records) in snapshot {
                message.push_str(&format!(" Model: {model}\n"));
                if records.is_empty() {
                    message.push_str("   (no prompts)\n");
                }
                for (idx, record) in records.iter().enumerate() {
                    message.push_str(&format!(
                        "   {}) Title:{}\n      Description:{}\n      Style:{}\n",
                        idx + 1,
                        record.title,
                        record.description,
                        record.style
                    ));
                }
            }
        }
        for panel in &mut self.panels {
            panel.log.push_str(&message);
        }
    }
}

impl eframe::App for PromptGenApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_events();
        if self.running {
            // 工作线程仍在跑, 保持轮询
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.heading("Ollama Prompt Generator");

                ui.horizontal(|ui| {
                    ui.label("Number of Models:");
                    ui.radio_value(&mut self.two_models, false, "One Model");
                    ui.radio_value(&mut self.two_models, true, "Two Models");
                });
                ui.separator();

                let panel_count = if self.two_models { 2 } else { 1 };
                let auto_scroll = self.auto_scroll;
                ui.columns(panel_count, |columns| {
                    for (slot, column) in columns.iter_mut().enumerate() {
                        self.panels[slot].ui(column, slot, auto_scroll);
                    }
                });

                ui.separator();
                ui.horizontal(|ui| {
                    ui.checkbox(
                        &mut self.use_memory,
                        "Use Memory (avoid repeats across old prompts)",
                    );
                    ui.label("Save Mode:");
                    ui.radio_value(&mut self.save_mode, SaveMode::Overwrite, "Overwrite");
                    ui.radio_value(&mut self.save_mode, SaveMode::Append, "Append");
                });
                ui.horizontal(|ui| {
                    ui.label("Auto Save Every:");
                    ui.add(
                        egui::TextEdit::singleline(&mut self.auto_save_every_text)
                            .desired_width(60.0),
                    );
                    ui.label("prompts");
                    ui.checkbox(&mut self.auto_scroll, "Auto-scroll to bottom");
                });

                ui.separator();
                ui.horizontal(|ui| {
                    if ui
                        .add_enabled(!self.running, egui::Button::new("Start Generation"))
                        .clicked()
                    {
                        self.start();
                    }
                    if ui.button("Stop").clicked() {
                        self.stop_flag.store(true, Ordering::SeqCst);
                    }
                    if ui.button("Reset Memory").clicked() {
                        self.reset_memory();
                    }
                    if ui.button("Show Memory").clicked() {
                        self.show_memory();
                    }
                });
            });
        });
    }
}
