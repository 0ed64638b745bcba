//! 错误处理

#[derive(Debug, thiserror::Error)]
pub enum GenError {
    #[error("io error, {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error, {0}")]
    Csv(#[from] csv::Error),
    #[error("invocation failed, {0}")]
    Invocation(String),
}
