//! 文件夹路径
//!
//! 调用宿主的 folder_paths 模块

use std::path::PathBuf;

use pyo3::{
    types::{PyAnyMethods, PyModule},
    PyResult, Python,
};

/// 获取宿主配置的输出目录
pub fn get_output_directory(py: Python) -> PyResult<PathBuf> {
    let path = PyModule::import(py, "folder_paths")?
        .getattr("get_output_directory")?
        .call0()?
        .extract::<String>()?;
    Ok(PathBuf::from(path))
}
