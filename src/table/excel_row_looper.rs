//! Excel 行循环读取

use std::{path::Path, sync::Mutex};

use lazy_static::lazy_static;
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
    table::{
        cache::RowCache,
        excel::load_excel_rows,
        row_cursor::{trim_quotes, LoopMode, RowCursor},
    },
};

lazy_static! {
    // Excel 节点独立的单槽行缓存
    static ref EXCEL_ROW_CACHE: Mutex<RowCache> = Mutex::new(RowCache::default());
}

/// Excel 行循环读取
#[pyclass(subclass)]
pub struct ExcelRowLooper {}

impl PromptServer for ExcelRowLooper {}

#[pymethods]
impl ExcelRowLooper {
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
    fn return_types() -> (&'static str, &'static str) {
        (NODE_STRING, NODE_STRING)
    }

    #[classattr]
    #[pyo3(name = "RETURN_NAMES")]
    fn return_names() -> (&'static str, &'static str) {
        ("row_text", "chosen_index_str")
    }

    #[classattr]
    #[pyo3(name = "OUTPUT_IS_LIST")]
    fn output_is_list() -> (bool, bool) {
        (false, false)
    }

    #[classattr]
    #[pyo3(name = "CATEGORY")]
    const CATEGORY: &'static str = CATEGORY_TABLE;

    #[classattr]
    #[pyo3(name = "DESCRIPTION")]
    fn description() -> &'static str {
        "Read one Excel row per execution, cycling through a configurable index range."
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
                    "loop_mode",
                    (LoopMode::choices(), {
                        let loop_mode = PyDict::new(py);
                        loop_mode.set_item("default", LoopMode::Disabled.to_string())?;
                        loop_mode.set_item("tooltip", "How the next row index is chosen")?;
                        loop_mode
                    }),
                )?;
                required.set_item(
                    "start_index",
                    (NODE_INT, {
                        let start_index = PyDict::new(py);
                        start_index.set_item("default", 0)?;
                        start_index.set_item("min", 0)?;
                        start_index.set_item("max", 100000)?;
                        start_index.set_item("step", 1)?;
                        start_index
                    }),
                )?;
                required.set_item(
                    "end_index",
                    (NODE_INT, {
                        let end_index = PyDict::new(py);
                        end_index.set_item("default", 10)?;
                        end_index.set_item("min", 0)?;
                        end_index.set_item("max", 100000)?;
                        end_index.set_item("step", 1)?;
                        end_index
                    }),
                )?;
                required.set_item(
                    "step_size",
                    (NODE_INT, {
                        let step_size = PyDict::new(py);
                        step_size.set_item("default", 1)?;
                        step_size.set_item("min", 1)?;
                        step_size.set_item("max", 1000)?;
                        step_size.set_item("step", 1)?;
                        step_size
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
        loop_mode: String,
        start_index: i64,
        end_index: i64,
        step_size: i64,
        delimiter: String,
    ) -> PyResult<(String, String)> {
        let results = self.read_row(
            &file_path,
            &loop_mode,
            start_index,
            end_index,
            step_size,
            &delimiter,
        );

        // 读取失败时降级为空输出, 不向调用方抛异常
        match results {
            Ok(v) => Ok(v),
            Err(e) => {
                error!("ExcelRowLooper error, {e}");
                if let Err(e) = self.send_error(py, "ExcelRowLooper".to_string(), e.to_string()) {
                    error!("send error failed, {e}");
                }
                Ok((String::new(), String::new()))
            }
        }
    }
}

impl ExcelRowLooper {
    /// 读取当前循环位置对应的行
    fn read_row(
        &self,
        file_path: &str,
        loop_mode: &str,
        start_index: i64,
        end_index: i64,
        step_size: i64,
        delimiter: &str,
    ) -> Result<(String, String), Error> {
        let path = Path::new(file_path);
        let rows = RowCache::get_or_load(&EXCEL_ROW_CACHE, path, load_excel_rows)?;

        let mode = loop_mode
            .parse::<LoopMode>()
            .map_err(|e| Error::ParseEnumString(e.to_string()))?;
        let cursor = RowCursor::new(path, mode, start_index, end_index, step_size, rows.len())?;
        let index = cursor.select()?;

        let row = rows.get(index).ok_or_else(|| {
            Error::IndexOutOfRange(format!("row {index}, the file has {} rows", rows.len()))
        })?;
        let row_text = row.join(delimiter);
        let chosen_index_str = format!("Current Row Index: {index}");

        Ok((trim_quotes(&row_text).to_string(), chosen_index_str))
    }
}
