//! Excel 单行读取
//!
//! 无状态: 每次执行读取指定行, 不做循环推进

use std::path::Path;

use log::error;
use pyo3::{
    pyclass, pymethods,
    types::{PyAnyMethods, PyDict, PyType},
    Bound, Py, PyResult, Python,
};

use crate::{
    core::{
        category::CATEGORY_TABLE,
        types::{NODE_INT, NODE_STRING},
        PromptServer,
    },
    error::Error,
    table::excel::load_excel_rows,
};

/// Excel 单行读取
#[pyclass(subclass)]
pub struct ExcelRowReader {}

impl PromptServer for ExcelRowReader {}

#[pymethods]
impl ExcelRowReader {
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
    fn return_types() -> (&'static str,) {
        (NODE_STRING,)
    }

    #[classattr]
    #[pyo3(name = "RETURN_NAMES")]
    fn return_names() -> (&'static str,) {
        ("row_text",)
    }

    #[classattr]
    #[pyo3(name = "OUTPUT_IS_LIST")]
    fn output_is_list() -> (bool,) {
        (false,)
    }

    #[classattr]
    #[pyo3(name = "CATEGORY")]
    const CATEGORY: &'static str = CATEGORY_TABLE;

    #[classattr]
    #[pyo3(name = "DESCRIPTION")]
    fn description() -> &'static str {
        "Read a single Excel row by index."
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
                    "file_path",
                    (NODE_STRING, {
                        let file_path = PyDict::new(py);
                        file_path.set_item("default", "path/to/your.xlsx")?;
                        file_path.set_item("multiline", false)?;
                        file_path.set_item("tooltip", "Excel file path")?;
                        file_path
                    }),
                )?;
                required.set_item(
                    "row_index",
                    (NODE_INT, {
                        let row_index = PyDict::new(py);
                        row_index.set_item("default", 0)?;
                        row_index.set_item("min", 0)?;
                        row_index.set_item("max", 100000)?;
                        row_index
                    }),
                )?;
                required.set_item(
                    "delimiter",
                    (NODE_STRING, {
                        let delimiter = PyDict::new(py);
                        delimiter.set_item("default", " ")?;
                        delimiter.set_item("multiline", false)?;
                        delimiter
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
        file_path: String,
        row_index: i64,
        delimiter: String,
    ) -> PyResult<(String,)> {
        let results = self.read_row(&file_path, row_index, &delimiter);

        // 读取失败时降级为空输出, 不向调用方抛异常
        match results {
            Ok(v) => Ok(v),
            Err(e) => {
                error!("ExcelRowReader error, {e}");
                if let Err(e) = self.send_error(py, "ExcelRowReader".to_string(), e.to_string()) {
                    error!("send error failed, {e}");
                }
                Ok((String::new(),))
            }
        }
    }
}

impl ExcelRowReader {
    /// 读取指定行并用分隔符拼接
    fn read_row(
        &self,
        file_path: &str,
        row_index: i64,
        delimiter: &str,
    ) -> Result<(String,), Error> {
        let rows = load_excel_rows(Path::new(file_path))?;

        if row_index < 0 || row_index as usize >= rows.len() {
            return Err(Error::IndexOutOfRange(format!(
                "row {row_index}, the file has {} rows",
                rows.len()
            )));
        }

        let row_text = rows[row_index as usize].join(delimiter);
        Ok((row_text,))
    }
}
