//! 文本编写
//!
//! 大小写转换, 前后缀拼接

use log::error;
use pyo3::{
    exceptions::PyRuntimeError,
    pyclass, pymethods,
    types::{PyAnyMethods, PyDict, PyType},
    Bound, Py, PyErr, PyResult, Python,
};
use strum_macros::{Display, EnumString};

use crate::{
    core::{category::CATEGORY_TEXT, types::NODE_STRING, PromptServer},
    error::Error,
};

/// 文本格式化模式
///
/// "normal", "uppercase", "lowercase", "title"
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TextMode {
    Normal,
    Uppercase,
    Lowercase,
    Title,
}

/// 逐词首字母大写, 其余小写
fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                result.extend(c.to_uppercase());
            } else {
                result.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            result.push(c);
            at_word_start = true;
        }
    }
    result
}

/// 文本编写
#[pyclass(subclass)]
pub struct WriteText {}

impl PromptServer for WriteText {}

#[pymethods]
impl WriteText {
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
    fn return_types() -> (&'static str, &'static str, &'static str, &'static str) {
        (NODE_STRING, NODE_STRING, NODE_STRING, NODE_STRING)
    }

    #[classattr]
    #[pyo3(name = "RETURN_NAMES")]
    fn return_names() -> (&'static str, &'static str, &'static str, &'static str) {
        (
            "text_output",
            "formatted_text",
            "combined_text",
            "received_text",
        )
    }

    #[classattr]
    #[pyo3(name = "OUTPUT_IS_LIST")]
    fn output_is_list() -> (bool, bool, bool, bool) {
        (false, false, false, false)
    }

    #[classattr]
    #[pyo3(name = "CATEGORY")]
    const CATEGORY: &'static str = CATEGORY_TEXT;

    #[classattr]
    #[pyo3(name = "DESCRIPTION")]
    fn description() -> &'static str {
        "Format a text with case modes and prefix/suffix."
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
                    "input_text",
                    (NODE_STRING, {
                        let input_text = PyDict::new(py);
                        input_text.set_item("default", "Write your text here...")?;
                        input_text.set_item("multiline", true)?;
                        input_text
                    }),
                )?;
                required.set_item(
                    "text_mode",
                    (
                        vec![
                            TextMode::Normal.to_string(),
                            TextMode::Uppercase.to_string(),
                            TextMode::Lowercase.to_string(),
                            TextMode::Title.to_string(),
                        ],
                        {
                            let text_mode = PyDict::new(py);
                            text_mode.set_item("default", TextMode::Normal.to_string())?;
                            text_mode
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
                required
            })?;

            dict.set_item("optional", {
                let optional = PyDict::new(py);
                optional.set_item(
                    "received_text",
                    (NODE_STRING, {
                        let received_text = PyDict::new(py);
                        received_text.set_item("default", "")?;
                        received_text.set_item("multiline", true)?;
                        received_text
                    }),
                )?;
                optional
            })?;

            Ok(dict.into())
        })
    }

    #[pyo3(
        name = "execute",
        signature = (input_text, text_mode, prefix, suffix, received_text=None)
    )]
    fn execute(
        &mut self,
        py: Python,
        input_text: String,
        text_mode: String,
        prefix: String,
        suffix: String,
        received_text: Option<String>,
    ) -> PyResult<(String, String, String, String)> {
        let results = self.process_text(&input_text, &text_mode, &prefix, &suffix, received_text);

        match results {
            Ok(v) => Ok(v),
            Err(e) => {
                error!("WriteText error, {e}");
                if let Err(e) = self.send_error(py, "WriteText".to_string(), e.to_string()) {
                    error!("send error failed, {e}");
                    return Err(PyErr::new::<PyRuntimeError, _>(e.to_string()));
                }
                Err(PyErr::new::<PyRuntimeError, _>(e.to_string()))
            }
        }
    }
}

impl WriteText {
    /// 按模式格式化文本并拼接前后缀
    fn process_text(
        &self,
        input_text: &str,
        text_mode: &str,
        prefix: &str,
        suffix: &str,
        received_text: Option<String>,
    ) -> Result<(String, String, String, String), Error> {
        let mode = text_mode
            .parse::<TextMode>()
            .map_err(|e| Error::ParseEnumString(e.to_string()))?;

        let formatted_text = match mode {
            TextMode::Normal => input_text.to_string(),
            TextMode::Uppercase => input_text.to_uppercase(),
            TextMode::Lowercase => input_text.to_lowercase(),
            TextMode::Title => title_case(input_text),
        };

        let combined_text = if !prefix.is_empty() || !suffix.is_empty() {
            format!("{prefix}{formatted_text}{suffix}")
        } else {
            formatted_text.clone()
        };

        let received_output = match received_text {
            Some(text) if !text.is_empty() => format!("Received: {text}"),
            _ => "No text received".to_string(),
        };

        Ok((
            input_text.to_string(),
            formatted_text,
            combined_text,
            received_output,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("hello world"), "Hello World");
        assert_eq!(title_case("ALL CAPS"), "All Caps");
        assert_eq!(title_case("it's a test"), "It'S A Test");
    }

    #[test]
    fn test_process_text_modes() -> anyhow::Result<()> {
        let node = WriteText {};
        let (original, formatted, combined, received) =
            node.process_text("Hello", "uppercase", "[", "]", None)?;
        assert_eq!(original, "Hello");
        assert_eq!(formatted, "HELLO");
        assert_eq!(combined, "[HELLO]");
        assert_eq!(received, "No text received");
        Ok(())
    }

    #[test]
    fn test_unknown_mode_is_an_error() {
        let node = WriteText {};
        let result = node.process_text("x", "reversed", "", "", None);
        assert!(matches!(result, Err(Error::ParseEnumString(_))));
    }
}
