//! 生成循环
//!
//! 有界重试: 尝试次数上限为 3 × 目标条数, 重复结果消耗一次尝试但不计入进度.
//! 停止标志每轮检查一次, 停止属于正常结束而不是错误

use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
    },
};

use crate::{
    export::{save_records, SaveMode},
    memory::GenerationMemory,
    ollama::PromptModel,
    parser,
    record::GenerationRecord,
};

/// 单个模型的一次生成任务
#[derive(Debug, Clone)]
pub struct GenerationTask {
    /// 界面侧的面板编号, 只用于事件路由
    pub slot: usize,
    /// 模型名, 同时是记忆分区键
    pub model_key: String,
    pub target_count: usize,
    pub output_csv: String,
    pub reference_text: String,
    pub use_memory: bool,
    pub save_mode: SaveMode,
    /// 每接受多少条落盘一次, 0 表示只在结束时落盘
    pub flush_every: usize,
}

/// 工作线程上报给界面的事件
#[derive(Debug)]
pub enum GenEvent {
    Log {
        slot: usize,
        message: String,
    },
    Progress {
        slot: usize,
        accepted: usize,
        target: usize,
    },
    /// 单个模型的循环结束
    Finished {
        slot: usize,
    },
    /// 两个循环都已汇合
    AllFinished,
}

/// 基础系统提示词
fn basic_system_prompt() -> String {
    "SYSTEM:\n\
     You are an AI specialized in creating random, photorealistic prompts.\n\
     Always produce unique results.\n\
     \n\
     Structure:\n\
     Title: (5 words max)\n\
     Description: (20 words max, photorealistic)\n\
     Style: (1-3 words, e.g. cinematic, macro, surreal)\n"
        .to_string()
}

/// 把已生成记录编号列出, 提示模型避开重复
///
/// 只是建议, 真正的去重在本地完成
fn system_prompt_with_memory(
    memory: &GenerationMemory,
    model_key: &str,
    basic_prompt: &str,
) -> String {
    let records = memory.records(model_key);
    if records.is_empty() {
        return basic_prompt.to_string();
    }

    let memory_text = records
        .iter()
        .enumerate()
        .map(|(idx, r)| format!("{}) {} | {} | {}", idx + 1, r.title, r.description, r.style))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "SYSTEM:\n\
         You are an AI specialized in creating random, photorealistic prompts.\n\
         Already generated for {model_key}:\n\
         {memory_text}\n\
         \n\
         Do NOT repeat those. Provide something brand-new and unique.\n\
         \n\
         {basic_prompt}\n"
    )
}

fn user_prompt(reference_text: &str) -> String {
    if reference_text.trim().is_empty() {
        "USER:\nGenerate 1 new random prompt.\nTitle:\nDescription:\nStyle:".to_string()
    } else {
        format!(
            "USER:\nIncorporate this reference: '{reference_text}'\n\
             Generate 1 new prompt.\nTitle:\nDescription:\nStyle:"
        )
    }
}

/// 运行一个模型的完整生成循环, 返回接受的条数
///
/// 外部调用失败只终止当前模型的循环, 已接受的记录照常落盘
pub fn run_generation(
    task: &GenerationTask,
    model: &dyn PromptModel,
    memory: &GenerationMemory,
    stop: &AtomicBool,
    events: &Sender<GenEvent>,
) -> usize {
    let log = |message: String| {
        let _ = events.send(GenEvent::Log {
            slot: task.slot,
            message,
        });
    };

    let base_prompt = basic_system_prompt();
    let mut run_buffer: Vec<GenerationRecord> = Vec::new();
    let mut accepted = 0usize;
    let mut attempts = 0usize;
    let max_attempts = task.target_count * 3;

    while accepted < task.target_count && attempts < max_attempts {
        if stop.load(Ordering::SeqCst) {
            log(format!(
                "[{}] generation stopped by user",
                task.model_key
            ));
            break;
        }
        attempts += 1;

        let system_part = if task.use_memory {
            system_prompt_with_memory(memory, &task.model_key, &base_prompt)
        } else {
            base_prompt.clone()
        };
        let final_prompt = format!("{system_part}\n\n{}\n", user_prompt(&task.reference_text));

        let response = match model.generate(&final_prompt) {
            Ok(response) => response,
            Err(e) => {
                log(format!("[{}] model call failed: {e}", task.model_key));
                break;
            }
        };

        let record = parser::parse_response(&response)
            .unwrap_or_else(|| parser::fallback_record(&response));

        // use_memory 时记忆是本轮缓冲的超集, 只查记忆即可
        let is_duplicate = if task.use_memory {
            memory.contains(&task.model_key, &record)
        } else {
            run_buffer.contains(&record)
        };
        if is_duplicate {
            log(format!(
                "[{}] attempt {attempts}: found duplicate, skipping",
                task.model_key
            ));
            continue;
        }

        accepted += 1;
        run_buffer.push(record.clone());
        if task.use_memory {
            memory.push(&task.model_key, record.clone());
        }

        log(format!(
            "[{}] prompt #{accepted}/{}\nTitle: {}\nDescription: {}\nStyle: {}\n",
            task.model_key, task.target_count, record.title, record.description, record.style
        ));
        let _ = events.send(GenEvent::Progress {
            slot: task.slot,
            accepted,
            target: task.target_count,
        });

        if task.flush_every > 0 && accepted % task.flush_every == 0 {
            flush(task, &mut run_buffer, &log);
        }
    }

    if run_buffer.is_empty() {
        log(format!("[{}] no new prompts left to save", task.model_key));
    } else {
        flush(task, &mut run_buffer, &log);
    }

    accepted
}

/// 把本轮缓冲写入 CSV 并清空
fn flush(task: &GenerationTask, buffer: &mut Vec<GenerationRecord>, log: &impl Fn(String)) {
    if buffer.is_empty() {
        return;
    }
    match save_records(Path::new(&task.output_csv), buffer, task.save_mode) {
        Ok(()) => log(format!(
            "[{}] auto-saved {} prompts to {}",
            task.model_key,
            buffer.len(),
            task.output_csv
        )),
        Err(e) => log(format!(
            "[{}] CSV write failed: {e}",
            task.model_key
        )),
    }
    buffer.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenError;
    use std::sync::{mpsc, Mutex};

    /// 按脚本逐次返回回复的假模型
    struct ScriptedModel {
        responses: Mutex<Vec<Result<String, GenError>>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<Result<String, GenError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    impl PromptModel for ScriptedModel {
        fn generate(&self, _prompt: &str) -> Result<String, GenError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(GenError::Invocation("script exhausted".to_string()));
            }
            responses.remove(0)
        }
    }

    fn response(n: usize) -> Result<String, GenError> {
        Ok(format!(
            "Title: Foo {n}\nDescription: Bar {n}\nStyle: Baz"
        ))
    }

    fn task(dir: &Path, target: usize, use_memory: bool, flush_every: usize) -> GenerationTask {
        GenerationTask {
            slot: 0,
            model_key: "test-model".to_string(),
            target_count: target,
            output_csv: dir.join("out.csv").display().to_string(),
            reference_text: String::new(),
            use_memory,
            save_mode: SaveMode::Append,
            flush_every,
        }
    }

    #[test]
    fn test_duplicates_consume_attempts_without_advancing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        // 第 1 和第 3 次回复完全相同, 3 次尝试后只接受 2 条
        let model = ScriptedModel::new(vec![response(1), response(2), response(1), response(3)]);
        let memory = GenerationMemory::new();
        let stop = AtomicBool::new(false);
        let (tx, _rx) = mpsc::channel();

        let accepted = run_generation(&task(dir.path(), 3, true, 0), &model, &memory, &stop, &tx);
        assert_eq!(accepted, 3);
        assert_eq!(memory.records("test-model").len(), 3);

        // 重复的那一次额外消耗了一次尝试
        let content = std::fs::read_to_string(dir.path().join("out.csv"))?;
        assert_eq!(content.lines().count(), 4);
        Ok(())
    }

    #[test]
    fn test_attempt_budget_bounds_the_loop() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        // 永远返回同一条: 1 条接受, 其余 5 次尝试全是重复
        let model = ScriptedModel::new((0..6).map(|_| response(1)).collect());
        let memory = GenerationMemory::new();
        let stop = AtomicBool::new(false);
        let (tx, _rx) = mpsc::channel();

        let accepted = run_generation(&task(dir.path(), 2, true, 0), &model, &memory, &stop, &tx);
        assert_eq!(accepted, 1);
        Ok(())
    }

    #[test]
    fn test_run_buffer_dedup_without_memory() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let model = ScriptedModel::new(vec![response(1), response(1), response(2)]);
        let memory = GenerationMemory::new();
        let stop = AtomicBool::new(false);
        let (tx, _rx) = mpsc::channel();

        let accepted = run_generation(&task(dir.path(), 2, false, 0), &model, &memory, &stop, &tx);
        assert_eq!(accepted, 2);
        // 记忆关闭时不写入会话记忆
        assert!(memory.records("test-model").is_empty());
        Ok(())
    }

    #[test]
    fn test_stop_flag_yields_partial_result() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let model = ScriptedModel::new(vec![response(1), response(2), response(3)]);
        let memory = GenerationMemory::new();
        let stop = AtomicBool::new(true);
        let (tx, _rx) = mpsc::channel();

        let accepted = run_generation(&task(dir.path(), 3, true, 0), &model, &memory, &stop, &tx);
        assert_eq!(accepted, 0);
        // 用户停止不是错误, 没有任何残留落盘
        assert!(!dir.path().join("out.csv").exists());
        Ok(())
    }

    #[test]
    fn test_invocation_failure_aborts_but_keeps_accepted() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let model = ScriptedModel::new(vec![
            response(1),
            Err(GenError::Invocation("boom".to_string())),
            response(2),
        ]);
        let memory = GenerationMemory::new();
        let stop = AtomicBool::new(false);
        let (tx, _rx) = mpsc::channel();

        let accepted = run_generation(&task(dir.path(), 3, true, 0), &model, &memory, &stop, &tx);
        assert_eq!(accepted, 1);

        let content = std::fs::read_to_string(dir.path().join("out.csv"))?;
        assert!(content.contains("Foo 1"));
        Ok(())
    }

    #[test]
    fn test_periodic_flush_writes_each_record_once() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let model = ScriptedModel::new((1..=4).map(response).collect());
        let memory = GenerationMemory::new();
        let stop = AtomicBool::new(false);
        let (tx, _rx) = mpsc::channel();

        let accepted = run_generation(&task(dir.path(), 4, true, 2), &model, &memory, &stop, &tx);
        assert_eq!(accepted, 4);

        // 表头 1 行 + 4 条记录, 周期落盘不会重写已写过的记录
        let content = std::fs::read_to_string(dir.path().join("out.csv"))?;
        assert_eq!(content.lines().count(), 5);
        assert_eq!(content.matches("Foo 2").count(), 1);
        Ok(())
    }

    #[test]
    fn test_unparsed_fallback_goes_through_dedup() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        // 两次无法解析的相同回复: 第二次按重复跳过
        let model = ScriptedModel::new(vec![
            Ok("chatter".to_string()),
            Ok("chatter".to_string()),
            response(1),
        ]);
        let memory = GenerationMemory::new();
        let stop = AtomicBool::new(false);
        let (tx, _rx) = mpsc::channel();

        let accepted = run_generation(&task(dir.path(), 2, true, 0), &model, &memory, &stop, &tx);
        assert_eq!(accepted, 2);

        let records = memory.records("test-model");
        assert_eq!(records[0].title, "UNPARSED");
        assert_eq!(records[0].description, "chatter");
        Ok(())
    }

    #[test]
    fn test_memory_listing_lands_in_prompt() {
        let memory = GenerationMemory::new();
        memory.push("m", GenerationRecord::new("Old Title", "old desc", "noir"));
        let prompt = system_prompt_with_memory(&memory, "m", &basic_system_prompt());
        assert!(prompt.contains("Already generated for m:"));
        assert!(prompt.contains("1) Old Title | old desc | noir"));
        assert!(prompt.contains("Do NOT repeat those."));
    }

    #[test]
    fn test_reference_text_lands_in_user_prompt() {
        let prompt = user_prompt("rainy streets");
        assert!(prompt.contains("Incorporate this reference: 'rainy streets'"));
        assert!(user_prompt("  ").contains("Generate 1 new random prompt."));
    }
}
