//! 文本拼接
//!
//! 两段输入文本与可选的文件文本按模式拼接

use std::{fs, path::Path};

use chardet::{charset2encoding, detect};
use encoding::{label::encoding_from_whatwg_label, DecoderTrap};
use log::{error, warn};
use pyo3::{
    exceptions::PyRuntimeError,
    pyclass, pymethods,
    types::{PyAnyMethods, PyDict, PyType},
    Bound, Py, PyErr, PyResult, Python,
};
use strum_macros::{Display, EnumString};

use crate::{
    core::{
        category::CATEGORY_TEXT,
        types::{NODE_BOOLEAN, NODE_STRING},
        PromptServer,
    },
    error::Error,
};

/// 拼接模式
///
/// "append", "prepend", "join_with_space", "join_with_newline"
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConcatMode {
    /// 文件文本拼在末尾
    Append,
    /// 文件文本拼在开头
    Prepend,
    /// 非空段落用空格连接
    JoinWithSpace,
    /// 非空段落用换行连接
    JoinWithNewline,
}

/// 读取文件内容, 自动匹配文件编码
fn read_text_auto_encoding(path: &Path) -> Result<String, Error> {
    let bytes = fs::read(path)?;

    // 优先尝试 UTF-8 解码
    if let Ok(s) = std::str::from_utf8(&bytes) {
        return Ok(s.to_string());
    }

    // detect charset of the file
    let result = detect(&bytes);

    // 检测常见编码（GBK/ISO-8859-1）
    if let Some(coder) = encoding_from_whatwg_label(charset2encoding(&result.0)) {
        let utf8reader = coder.decode(&bytes, DecoderTrap::Replace).map_err(|e| {
            error!("decode error, {e}");
            Error::Decode(e.to_string())
        })?;

        return Ok(utf8reader);
    }

    Err(Error::Decode("file auto decode failed".to_string()))
}

/// 文本拼接
#[pyclass(subclass)]
pub struct ConcatenateText {}

impl PromptServer for ConcatenateText {}

#[pymethods]
impl ConcatenateText {
    #[new]
    fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_level(true)
            .with_file(true)
            .with_line_number(true)
            .try_init();
        Self {}
    }

    #[classattr]
    #[pyo3(name = "INPUT_IS_LIST")]
    fn input_is_list() -> bool {
        false
    }

    #[classattr]
    #[pyo3(name = "RETURN_TYPES")]
    fn return_types() -> (&'static str, &'static str, &'static str) {
        (NODE_STRING, NODE_STRING, NODE_STRING)
    }

    #[classattr]
    #[pyo3(name = "RETURN_NAMES")]
    fn return_names() -> (&'static str, &'static str, &'static str) {
        ("input_1_output", "input_2_output", "concatenated_text")
    }

    #[classattr]
    #[pyo3(name = "OUTPUT_IS_LIST")]
    fn output_is_list() -> (bool, bool, bool) {
        (false, false, false)
    }

    #[classattr]
    #[pyo3(name = "CATEGORY")]
    const CATEGORY: &'static str = CATEGORY_TEXT;

    #[classattr]
    #[pyo3(name = "DESCRIPTION")]
    fn description() -> &'static str {
        "Concatenate two texts and an optional text file."
    }

    #[classattr]
    #[pyo3(name = "FUNCTION")]
    const FUNCTION: &'static str = "execute";

    #[classmethod]
    #[pyo3(name = "INPUT_TYPES")]
    fn input_types(_cls: &Bound<'_, PyType>) -> PyResult<Py<PyDict>> {
        Python::with_gil(|py| {
            let dict = PyDict::new(py);
            dict.set_item("required", {
                let required = PyDict::new(py);
                required.set_item(
                    "input_text_1",
                    (NODE_STRING, {
                        let input_text_1 = PyDict::new(py);
                        input_text_1.set_item("default", "Enter your first text...")?;
                        input_text_1.set_item("multiline", true)?;
                        input_text_1
                    }),
                )?;
                required.set_item(
                    "input_text_2",
                    (NODE_STRING, {
                        let input_text_2 = PyDict::new(py);
                        input_text_2.set_item("default", "Enter your second text...")?;
                        input_text_2.set_item("multiline", true)?;
                        input_text_2
                    }),
                )?;
                required.set_item(
                    "concatenation_mode",
                    (
                        vec![
                            ConcatMode::Append.to_string(),
                            ConcatMode::Prepend.to_string(),
                            ConcatMode::JoinWithSpace.to_string(),
                            ConcatMode::JoinWithNewline.to_string(),
                        ],
                        {
                            let mode = PyDict::new(py);
                            mode.set_item("default", ConcatMode::Append.to_string())?;
                            mode
                        },
                    ),
                )?;
                required.set_item(
                    "prefix",
                    (NODE_STRING, {
                        let prefix = PyDict::new(py);
                        prefix.set_item("default", "")?;
                        prefix.set_item("multiline", false)?;
                        prefix
                    }),
                )?;
                required.set_item(
                    "suffix",
                    (NODE_STRING, {
                        let suffix = PyDict::new(py);
                        suffix.set_item("default", "")?;
                        suffix.set_item("multiline", false)?;
                        suffix
                    }),
                )?;
                required.set_item(
                    "load_from_file",
                    (NODE_BOOLEAN, {
                        let load_from_file = PyDict::new(py);
                        load_from_file.set_item("default", false)?;
                        load_from_file
                    }),
                )?;
                required.set_item(
                    "file_path",
                    (NODE_STRING, {
                        let file_path = PyDict::new(py);
                        file_path.set_item("default", "")?;
                        file_path.set_item("multiline", false)?;
                        file_path
                    }),
                )?;
                required
            })?;

            Ok(dict.into())
        })
    }

    #[allow(clippy::too_many_arguments)]
    #[pyo3(name = "execute")]
    fn execute(
        &mut self,
        py: Python,
        input_text_1: String,
        input_text_2: String,
        concatenation_mode: String,
        prefix: String,
        suffix: String,
        load_from_file: bool,
        file_path: String,
    ) -> PyResult<(String, String, String)> {
        let results = self.concatenate(
            &input_text_1,
            &input_text_2,
            &concatenation_mode,
            &prefix,
            &suffix,
            load_from_file,
            &file_path,
        );

        match results {
            Ok(v) => Ok(v),
            Err(e) => {
                error!("ConcatenateText error, {e}");
                if let Err(e) = self.send_error(py, "ConcatenateText".to_string(), e.to_string()) {
                    error!("send error failed, {e}");
                    return Err(PyErr::new::<PyRuntimeError, _>(e.to_string()));
                }
                Err(PyErr::new::<PyRuntimeError, _>(e.to_string()))
            }
        }
    }
}

impl ConcatenateText {
    /// 拼接文本
    #[allow(clippy::too_many_arguments)]
    fn concatenate(
        &self,
        input_text_1: &str,
        input_text_2: &str,
        concatenation_mode: &str,
        prefix: &str,
        suffix: &str,
        load_from_file: bool,
        file_path: &str,
    ) -> Result<(String, String, String), Error> {
        let mode = concatenation_mode
            .parse::<ConcatMode>()
            .map_err(|e| Error::ParseEnumString(e.to_string()))?;

        // 文件缺失只告警, 不影响其余拼接
        let file_text = if load_from_file && !file_path.trim().is_empty() {
            let path = Path::new(file_path);
            if path.is_file() {
                read_text_auto_encoding(path)?
            } else {
                warn!("file path '{file_path}' does not exist or is not a file");
                String::new()
            }
        } else {
            String::new()
        };

        let mut combined_text = match mode {
            ConcatMode::Append => format!("{input_text_1}{input_text_2}{file_text}"),
            ConcatMode::Prepend => format!("{file_text}{input_text_1}{input_text_2}"),
            ConcatMode::JoinWithSpace => join_non_empty([input_text_1, input_text_2, &file_text], " "),
            ConcatMode::JoinWithNewline => {
                join_non_empty([input_text_1, input_text_2, &file_text], "\n")
            }
        };

        if !prefix.is_empty() {
            combined_text = format!("{prefix}{combined_text}");
        }
        if !suffix.is_empty() {
            combined_text = format!("{combined_text}{suffix}");
        }

        Ok((
            input_text_1.to_string(),
            input_text_2.to_string(),
            combined_text,
        ))
    }
}

/// 过滤空白段落后用分隔符连接
fn join_non_empty(segments: [&str; 3], separator: &str) -> String {
    segments
        .iter()
        .filter(|segment| !segment.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_modes() -> anyhow::Result<()> {
        let node = ConcatenateText {};
        let (_, _, combined) = node.concatenate("a", "b", "append", "", "", false, "")?;
        assert_eq!(combined, "ab");

        let (_, _, combined) = node.concatenate("a", "b", "join_with_space", "", "", false, "")?;
        assert_eq!(combined, "a b");

        let (_, _, combined) = node.concatenate("a", "", "join_with_newline", "", "", false, "")?;
        assert_eq!(combined, "a");
        Ok(())
    }

    #[test]
    fn test_prefix_suffix() -> anyhow::Result<()> {
        let node = ConcatenateText {};
        let (_, _, combined) = node.concatenate("a", "b", "append", "<", ">", false, "")?;
        assert_eq!(combined, "<ab>");
        Ok(())
    }

    #[test]
    fn test_file_text_prepends() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("extra.txt");
        fs::write(&path, "from file ")?;
        let node = ConcatenateText {};
        let (_, _, combined) = node.concatenate(
            "a",
            "b",
            "prepend",
            "",
            "",
            true,
            path.to_str().unwrap(),
        )?;
        assert_eq!(combined, "from file ab");
        Ok(())
    }

    #[test]
    fn test_missing_file_is_ignored() -> anyhow::Result<()> {
        let node = ConcatenateText {};
        let (_, _, combined) =
            node.concatenate("a", "b", "append", "", "", true, "/no/such/file.txt")?;
        assert_eq!(combined, "ab");
        Ok(())
    }

    #[test]
    fn test_read_text_auto_encoding_utf8() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("utf8.txt");
        fs::write(&path, "héllo")?;
        assert_eq!(read_text_auto_encoding(&path)?, "héllo");
        Ok(())
    }
}
