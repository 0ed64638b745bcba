//! 带行号的文本累积
//!
//! 行号计数器跨执行持续递增, 空行保留但不编号

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
    text::accumulate_text::merge_block,
};

/// 带行号的文本累积
#[pyclass(subclass)]
pub struct AccumulateTextNumbered {
    accumulated: String,
    line_count: usize,
}

impl PromptServer for AccumulateTextNumbered {}

#[pymethods]
impl AccumulateTextNumbered {
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
            line_count: 1,
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
        "Accumulate text blocks with optional line numbering."
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
                required.set_item(
                    "line_numbering",
                    (NODE_BOOLEAN, {
                        let numbering = PyDict::new(py);
                        numbering.set_item("default", false)?;
                        numbering
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
        line_numbering: bool,
    ) -> PyResult<(String,)> {
        let results = self.accumulate(
            &input_text_1,
            &input_text_2,
            &separator,
            reset_accumulation,
            line_numbering,
        );

        match results {
            Ok(v) => Ok(v),
            Err(e) => {
                error!("AccumulateTextNumbered error, {e}");
                if let Err(e) =
                    self.send_error(py, "AccumulateTextNumbered".to_string(), e.to_string())
                {
                    error!("send error failed, {e}");
                    return Err(PyErr::new::<PyRuntimeError, _>(e.to_string()));
                }
                Err(PyErr::new::<PyRuntimeError, _>(e.to_string()))
            }
        }
    }
}

impl AccumulateTextNumbered {
    /// 追加新的文本块, 按需编号
    fn accumulate(
        &mut self,
        input_text_1: &str,
        input_text_2: &str,
        separator: &str,
        reset_accumulation: bool,
        line_numbering: bool,
    ) -> Result<(String,), Error> {
        if reset_accumulation {
            self.accumulated.clear();
            self.line_count = 1;
        }

        let new_block = merge_block(input_text_1, input_text_2);
        if new_block.trim().is_empty() {
            return Ok((self.accumulated.clone(),));
        }

        let formatted_block = if line_numbering {
            let mut formatted = Vec::new();
            for line in new_block.split('\n') {
                if line.trim().is_empty() {
                    // 空行不占用行号
                    formatted.push(line.to_string());
                } else {
                    formatted.push(format!("{}. {line}", self.line_count));
                    self.line_count += 1;
                }
            }
            formatted.join("\n")
        } else {
            new_block
        };

        if !self.accumulated.trim().is_empty() {
            self.accumulated.push_str(separator);
            self.accumulated.push_str(&formatted_block);
        } else {
            self.accumulated = formatted_block;
        }

        Ok((self.accumulated.clone(),))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> AccumulateTextNumbered {
        AccumulateTextNumbered {
            accumulated: String::new(),
            line_count: 1,
        }
    }

    #[test]
    fn test_numbering_continues_across_calls() -> anyhow::Result<()> {
        let mut node = node();
        assert_eq!(node.accumulate("a\nb", "", "\n", false, true)?.0, "1. a\n2. b");
        assert_eq!(
            node.accumulate("c", "", "\n", false, true)?.0,
            "1. a\n2. b\n3. c"
        );
        Ok(())
    }

    #[test]
    fn test_blank_lines_keep_their_place() -> anyhow::Result<()> {
        let mut node = node();
        assert_eq!(
            node.accumulate("a\n\nb", "", "\n", false, true)?.0,
            "1. a\n\n2. b"
        );
        Ok(())
    }

    #[test]
    fn test_reset_restarts_numbering() -> anyhow::Result<()> {
        let mut node = node();
        node.accumulate("a", "", "\n", false, true)?;
        assert_eq!(node.accumulate("b", "", "\n", true, true)?.0, "1. b");
        Ok(())
    }

    #[test]
    fn test_without_numbering_lines_pass_through() -> anyhow::Result<()> {
        let mut node = node();
        assert_eq!(node.accumulate("a\nb", "", "\n", false, false)?.0, "a\nb");
        Ok(())
    }
}
