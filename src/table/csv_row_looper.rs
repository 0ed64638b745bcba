//! CSV 行循环读取
//!
//! 按循环模式逐行读取 CSV 文件, increment 模式跨调用持久化位置

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
        row_cursor::{trim_quotes, LoopMode, RowCursor},
    },
};

lazy_static! {
    // CSV 节点独立的单槽行缓存
    static ref CSV_ROW_CACHE: Mutex<RowCache> = Mutex::new(RowCache::default());
}

/// 读取 CSV 文件并解析为行
///
/// 分隔符取输入字符串的首个字节, 空串时退回逗号
fn load_csv_rows(path: &Path, delimiter: &str) -> Result<Vec<Vec<String>>, Error> {
    if !path.is_file() {
        return Err(Error::NotFound(path.display().to_string()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    if ext != "csv" {
        return Err(Error::Unsupported(format!(
            "{ext}: only .csv is supported"
        )));
    }

    let delimiter = delimiter.as_bytes().first().copied().unwrap_or(b',');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

/// CSV 行循环读取
#[pyclass(subclass)]
pub struct CsvRowLooper {}

impl PromptServer for CsvRowLooper {}

#[pymethods]
impl CsvRowLooper {
    #[new]
    fn new() -> Self {
        // 初始化全局日志
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_level(true)
            .with_file(true)
            .with_line_number(true)
            .try_init();
        Self {}
    }

    // 输入列表, 可选
    #[classattr]
    #[pyo3(name = "INPUT_IS_LIST")]
    fn input_is_list() -> bool {
        false
    }

    // 返回参数类型
    #[classattr]
    #[pyo3(name = "RETURN_TYPES")]
    fn return_types() -> (&'static str,) {
        (NODE_STRING,)
    }

    // 返回参数名称
    #[classattr]
    #[pyo3(name = "RETURN_NAMES")]
    fn return_names() -> (&'static str,) {
        ("row_text",)
    }

    // 输出列表, 可选
    #[classattr]
    #[pyo3(name = "OUTPUT_IS_LIST")]
    fn output_is_list() -> (bool,) {
        (false,)
    }

    // 节点分类
    #[classattr]
    #[pyo3(name = "CATEGORY")]
    const CATEGORY: &'static str = CATEGORY_TABLE;

    // 节点描述, 可选
    #[classattr]
    #[pyo3(name = "DESCRIPTION")]
    fn description() -> &'static str {
        "Read one CSV row per execution, cycling through a configurable index range."
    }

    // 调用方法函数名称
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
                        file_path.set_item("default", "path/to/your_file.csv")?;
                        file_path.set_item("multiline", false)?;
                        file_path.set_item("tooltip", "CSV file path")?;
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
                        delimiter.set_item("default", ",")?;
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
    ) -> PyResult<(String,)> {
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
                error!("CsvRowLooper error, {e}");
                if let Err(e) = self.send_error(py, "CsvRowLooper".to_string(), e.to_string()) {
                    error!("send error failed, {e}");
                }
                Ok((String::new(),))
            }
        }
    }
}

impl CsvRowLooper {
    /// 读取当前循环位置对应的行
    fn read_row(
        &self,
        file_path: &str,
        loop_mode: &str,
        start_index: i64,
        end_index: i64,
        step_size: i64,
        delimiter: &str,
    ) -> Result<(String,), Error> {
        let path = Path::new(file_path);
        let rows = RowCache::get_or_load(&CSV_ROW_CACHE, path, |p| load_csv_rows(p, delimiter))?;

        let mode = loop_mode
            .parse::<LoopMode>()
            .map_err(|e| Error::ParseEnumString(e.to_string()))?;
        let cursor = RowCursor::new(path, mode, start_index, end_index, step_size, rows.len())?;
        let index = cursor.select()?;

        let row = rows.get(index).ok_or_else(|| {
            Error::IndexOutOfRange(format!("row {index}, the file has {} rows", rows.len()))
        })?;
        let row_text = row.join(delimiter);

        Ok((trim_quotes(&row_text).to_string(),))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_csv_rows() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_csv(dir.path(), "rows.csv", "a,b\nc,d\n");
        let rows = load_csv_rows(&path, ",")?;
        assert_eq!(rows, vec![vec!["a", "b"], vec!["c", "d"]]);
        Ok(())
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_csv_rows(&dir.path().join("missing.csv"), ",");
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_wrong_extension_is_unsupported() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_csv(dir.path(), "rows.tsv", "a\tb\n");
        let result = load_csv_rows(&path, "\t");
        assert!(matches!(result, Err(Error::Unsupported(_))));
        Ok(())
    }

    #[test]
    fn test_read_row_joins_and_trims_quotes() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_csv(dir.path(), "quoted.csv", "\"a portrait\",studio light\n");
        let node = CsvRowLooper {};
        let (row_text,) = node.read_row(
            path.to_str().unwrap(),
            "disabled",
            0,
            10,
            1,
            ",",
        )?;
        // 外层引号被剥掉, 内部分隔符保留
        assert_eq!(row_text, "a portrait,studio light");
        Ok(())
    }

    #[test]
    fn test_increment_sequence_end_to_end() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_csv(dir.path(), "five.csv", "r0\nr1\nr2\nr3\nr4\n");
        let node = CsvRowLooper {};
        let mut seen = Vec::new();
        for _ in 0..5 {
            let (row_text,) =
                node.read_row(path.to_str().unwrap(), "increment", 1, 3, 1, ",")?;
            seen.push(row_text);
        }
        assert_eq!(seen, vec!["r1", "r2", "r3", "r1", "r2"]);
        Ok(())
    }
}
