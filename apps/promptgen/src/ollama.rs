//! 外部生成协作方
//!
//! 通过子进程驱动本地模型: 完整提示词写入 stdin, 从 stdout 读回复

use std::{
    io::Write,
    process::{Command, Stdio},
};

use crate::error::GenError;

/// 外部文本生成协作方
pub trait PromptModel {
    /// 同步生成, 返回原始回复文本
    fn generate(&self, prompt: &str) -> Result<String, GenError>;
}

/// ollama 命令行
pub struct OllamaCli {
    model: String,
}

impl OllamaCli {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

impl PromptModel for OllamaCli {
    fn generate(&self, prompt: &str) -> Result<String, GenError> {
        let mut child = Command::new("ollama")
            .args(["run", &self.model])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GenError::Invocation(format!("failed to start ollama: {e}")))?;

        if let Some(stdin) = child.stdin.as_mut() {
            stdin
                .write_all(prompt.as_bytes())
                .map_err(|e| GenError::Invocation(format!("failed to write prompt: {e}")))?;
        }
        // stdin 关闭后模型才开始生成
        drop(child.stdin.take());

        let output = child
            .wait_with_output()
            .map_err(|e| GenError::Invocation(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GenError::Invocation(format!(
                "ollama failed (code {:?}): {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
