//! 错误处理

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // 标准库错误处理
    #[error("io error, {0}")]
    Io(std::io::Error),
    #[error("parse int error, {0}")]
    ParseIntError(std::num::ParseIntError),
    #[error("parse float error, {0}")]
    ParseFloatError(std::num::ParseFloatError),
    // std::sync::poison
    #[error("lock error, {0}")]
    LockError(String),

    // 数据源
    #[error("file not found, {0}")]
    NotFound(String),
    #[error("unsupported file type, {0}")]
    Unsupported(String),
    #[error("the source has no rows, {0}")]
    EmptySource(String),
    #[error("index out of range, {0}")]
    IndexOutOfRange(String),
    #[error("invalid parameter, {0}")]
    InvalidParameter(String),

    #[error("csv error, {0}")]
    Csv(#[from] csv::Error),
    #[error("workbook error, {0}")]
    Workbook(#[from] calamine::Error),

    #[error("encode error, {0}")]
    Encode(String),
    #[error("decode error, {0}")]
    Decode(String),
    #[error("strum error, {0}")]
    ParseEnumString(String),

    #[error("py error, {0}")]
    PyErr(#[from] pyo3::PyErr),
    #[error("py downcast error, {0}")]
    PyDowncastError(String),
    #[error("pythonize error, {0}")]
    PythonizeError(#[from] pythonize::PythonizeError),
    #[error("numpy error, {0}")]
    NotContiguousError(#[from] numpy::NotContiguousError),
    #[error("json error, {0}")]
    Json(#[from] serde_json::Error),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(e: std::num::ParseIntError) -> Self {
        Error::ParseIntError(e)
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(e: std::num::ParseFloatError) -> Self {
        Error::ParseFloatError(e)
    }
}
