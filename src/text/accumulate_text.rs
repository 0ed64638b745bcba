//! 文本累积
//!
//! 在节点实例内逐次追加文本块, 可随时重置

use log::error;
use pyo3::{
    exceptions::PyRuntimeError,
    pyclass, pymethods,
    types::{PyAnyMethods, PyDict, PyType},
    Bound, Py, PyErr, PyResult, Python,
};

use crate::{
    core::{
        category::CATEGORY_TEXT,
        types::{NODE_BOOLEAN, NODE_STRING},
        PromptServer,
    },
    error::Error,
};

/// 把两段输入合成一个文本块, 空白段被跳过
pub(crate) fn merge_block(input_text_1: &str, input_text_2: &str) -> String {
    if !input_text_1.trim().is_empty() && !input_text_2.trim().is_empty() {
        format!(
            "{}\n{}",
            input_text_1.trim_end_matches('\n'),
            input_text_2.trim_start_matches('\n')
        )
    } else if !input_text_1.trim().is_empty() {
        input_text_1.to_string()
    } else {
        input_text_2.to_string()
    }
}

/// 文本累积
#[pyclass(subclass)]
pub struct AccumulateText {
    accumulated: String,
}

impl PromptServer for AccumulateText {}

#[pymethods]
impl AccumulateText {
    #[new]
    fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_level(true)
            .with_file(true)
            .with_line_number(true)
            .try_init();
        Self {
            accumulated: String::new(),
        }
    }

    #[classattr]
    #[pyo3(name = "INPUT_IS_LIST")]
    fn input_is_list() -> bool {
        false
    }

    #[classattr]
    #[pyo3(name = "RETURN_TYPES")]
    fn return_types() -> (&'static str,) {
        (NODE_STRING,)
    }

    #[classattr]
    #[pyo3(name = "RETURN_NAMES")]
    fn return_names() -> (&'static str,) {
        ("accumulated_string",)
    }

    #[classattr]
    #[pyo3(name = "OUTPUT_IS_LIST")]
    fn output_is_list() -> (bool,) {
        (false,)
    }

    #[classattr]
    #[pyo3(name = "CATEGORY")]
    const CATEGORY: &'static str = CATEGORY_TEXT;

    #[classattr]
    #[pyo3(name = "DESCRIPTION")]
    fn description() -> &'static str {
        "Accumulate text blocks across executions."
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
                        input_text_1.set_item("default", "Enter first multiline text...")?;
                        input_text_1.set_item("multiline", true)?;
                        input_text_1
                    }),
                )?;
                required.set_item(
                    "input_text_2",
                    (NODE_STRING, {
                        let input_text_2 = PyDict::new(py);
                        input_text_2.set_item("default", "")?;
                        input_text_2.set_item("multiline", true)?;
                        input_text_2
                    }),
                )?;
                required.set_item(
                    "separator",
                    (NODE_STRING, {
                        let separator = PyDict::new(py);
                        separator.set_item("default", "\n")?;
                        separator.set_item("multiline", false)?;
                        separator
                    }),
                )?;
                required.set_item(
                    "reset_accumulation",
                    (NODE_BOOLEAN, {
                        let reset = PyDict::new(py);
                        reset.set_item("default", false)?;
                        reset
                    }),
                )?;
                required
            })?;

            Ok(dict.into())
        })
    }

    #[pyo3(name = "execute")]
    fn execute(
        &mut self,
        py: Python,
        input_text_1: String,
        input_text_2: String,
        separator: String,
        reset_accumulation: bool,
    ) -> PyResult<(String,)> {
        let results =
            self.accumulate(&input_text_1, &input_text_2, &separator, reset_accumulation);

        match results {
            Ok(v) => Ok(v),
            Err(e) => {
                error!("AccumulateText error, {e}");
                if let Err(e) = self.send_error(py, "AccumulateText".to_string(), e.to_string()) {
                    error!("send error failed, {e}");
                    return Err(PyErr::new::<PyRuntimeError, _>(e.to_string()));
                }
                Err(PyErr::new::<PyRuntimeError, _>(e.to_string()))
            }
        }
    }
}

impl AccumulateText {
    /// 追加新的文本块
    fn accumulate(
        &mut self,
        input_text_1: &str,
        input_text_2: &str,
        separator: &str,
        reset_accumulation: bool,
    ) -> Result<(String,), Error> {
        if reset_accumulation {
            self.accumulated.clear();
        }

        let new_block = merge_block(input_text_1, input_text_2);

        if !self.accumulated.trim().is_empty() && !new_block.trim().is_empty() {
            self.accumulated.push_str(separator);
            self.accumulated.push_str(&new_block);
        } else if !new_block.trim().is_empty() {
            self.accumulated.push_str(&new_block);
        }

        Ok((self.accumulated.clone(),))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> AccumulateText {
        AccumulateText {
            accumulated: String::new(),
        }
    }

    #[test]
    fn test_accumulates_with_separator() -> anyhow::Result<()> {
        let mut node = node();
        assert_eq!(node.accumulate("one", "", " | ", false)?.0, "one");
        assert_eq!(node.accumulate("two", "", " | ", false)?.0, "one | two");
        Ok(())
    }

    #[test]
    fn test_blank_block_is_skipped() -> anyhow::Result<()> {
        let mut node = node();
        node.accumulate("one", "", "\n", false)?;
        assert_eq!(node.accumulate("  ", "", "\n", false)?.0, "one");
        Ok(())
    }

    #[test]
    fn test_reset_clears_buffer() -> anyhow::Result<()> {
        let mut node = node();
        node.accumulate("one", "", "\n", false)?;
        assert_eq!(node.accumulate("two", "", "\n", true)?.0, "two");
        Ok(())
    }

    #[test]
    fn test_merge_block_joins_both_inputs() {
        assert_eq!(merge_block("a\n", "\nb"), "a\nb");
        assert_eq!(merge_block("a", ""), "a");
        assert_eq!(merge_block("", "b"), "b");
    }
}
