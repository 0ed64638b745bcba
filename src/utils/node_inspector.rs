//! 节点检视
//!
//! 列出宿主已注册的节点, 或查看指定节点的源码

use log::error;
use pyo3::{
    pyclass, pymethods,
    types::{PyAnyMethods, PyDict, PyDictMethods, PyModule, PyType},
    Bound, Py, PyResult, Python,
};

use crate::{
    core::{category::CATEGORY_UTILS, types::NODE_STRING, PromptServer},
    error::Error,
};

const MODE_ALL: &str = "All Nodes";
const MODE_CUSTOM: &str = "Custom Nodes Only";
const MODE_BUILTIN: &str = "Built-in Nodes Only";

const VIEW_LIST: &str = "List Nodes";
const VIEW_SOURCE: &str = "View Source Code";

/// 节点检视
#[pyclass(subclass)]
pub struct NodeInspector {}

impl PromptServer for NodeInspector {}

#[pymethods]
impl NodeInspector {
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
    #[pyo3(name = "RETURN_TYPES")]
    fn return_types() -> (&'static str, &'static str) {
        (NODE_STRING, NODE_STRING)
    }

    #[classattr]
    #[pyo3(name = "RETURN_NAMES")]
    fn return_names() -> (&'static str, &'static str) {
        ("node_info", "node_source")
    }

    #[classattr]
    #[pyo3(name = "OUTPUT_IS_LIST")]
    fn output_is_list() -> (bool, bool) {
        (false, false)
    }

    #[classattr]
    #[pyo3(name = "CATEGORY")]
    const CATEGORY: &'static str = CATEGORY_UTILS;

    #[classattr]
    #[pyo3(name = "DESCRIPTION")]
    fn description() -> &'static str {
        "Browse registered nodes and read their source code."
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
                    "mode",
                    (vec![MODE_ALL, MODE_CUSTOM, MODE_BUILTIN], {
                        let mode = PyDict::new(py);
                        mode.set_item("default", MODE_ALL)?;
                        mode
                    }),
                )?;
                required.set_item(
                    "view_mode",
                    (vec![VIEW_LIST, VIEW_SOURCE], {
                        let view_mode = PyDict::new(py);
                        view_mode.set_item("default", VIEW_LIST)?;
                        view_mode
                    }),
                )?;
                required.set_item(
                    "selected_node",
                    (NODE_STRING, {
                        let selected_node = PyDict::new(py);
                        selected_node.set_item("default", "")?;
                        selected_node.set_item("multiline", false)?;
                        selected_node.set_item("tooltip", "Node class name for source view")?;
                        selected_node
                    }),
                )?;
                required.set_item(
                    "search",
                    (NODE_STRING, {
                        let search = PyDict::new(py);
                        search.set_item("default", "")?;
                        search.set_item("multiline", false)?;
                        search
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
        mode: String,
        view_mode: String,
        selected_node: String,
        search: String,
    ) -> PyResult<(String, String)> {
        let results = match view_mode.as_str() {
            VIEW_SOURCE => self.node_source(py, &selected_node),
            _ => self
                .list_nodes(py, &mode, &search)
                .map(|info| (info, String::new())),
        };

        // 检视失败不阻断工作流, 把错误文本放进输出
        match results {
            Ok(v) => Ok(v),
            Err(e) => {
                error!("NodeInspector error, {e}");
                Ok((format!("Error: {e}"), String::new()))
            }
        }
    }
}

impl NodeInspector {
    /// 列出注册节点
    fn list_nodes(&self, py: Python, mode: &str, search: &str) -> Result<String, Error> {
        let mappings_any = PyModule::import(py, "nodes")?.getattr("NODE_CLASS_MAPPINGS")?;
        let mappings = mappings_any
            .downcast::<PyDict>()
            .map_err(|e| Error::PyDowncastError(e.to_string()))?;
        let inspect = PyModule::import(py, "inspect")?;

        let search = search.trim().to_lowercase();
        let mut lines = Vec::new();

        for (name, class) in mappings.iter() {
            let name: String = name.extract()?;

            let category = class
                .getattr("CATEGORY")
                .and_then(|v| v.extract::<String>())
                .unwrap_or_else(|_| "Uncategorized".to_string());
            let module_path = inspect
                .call_method1("getfile", (&class,))
                .and_then(|v| v.extract::<String>())
                .unwrap_or_default();
            let is_custom = module_path.contains("custom_nodes");

            let wanted = match mode {
                MODE_CUSTOM => is_custom,
                MODE_BUILTIN => !is_custom,
                _ => true,
            };
            if !wanted {
                continue;
            }
            if !search.is_empty() && !name.to_lowercase().contains(&search) {
                continue;
            }

            let marker = if is_custom { "  (custom)" } else { "" };
            lines.push(format!("{name}  [{category}]{marker}"));
        }

        lines.sort();
        let mut info = format!("{} nodes\n", lines.len());
        info.push_str(&lines.join("\n"));
        Ok(info)
    }

    /// 查看节点源码
    fn node_source(&self, py: Python, selected_node: &str) -> Result<(String, String), Error> {
        let selected_node = selected_node.trim();
        if selected_node.is_empty() {
            return Ok((
                "No node selected".to_string(),
                "Enter a node class name to view its source code".to_string(),
            ));
        }

        let mappings_any = PyModule::import(py, "nodes")?.getattr("NODE_CLASS_MAPPINGS")?;
        let mappings = mappings_any
            .downcast::<PyDict>()
            .map_err(|e| Error::PyDowncastError(e.to_string()))?;

        let Some(class) = mappings.get_item(selected_node)? else {
            return Ok((
                format!("Node '{selected_node}' not found"),
                String::new(),
            ));
        };

        let inspect = PyModule::import(py, "inspect")?;
        let file = inspect
            .call_method1("getfile", (&class,))
            .and_then(|v| v.extract::<String>())
            .unwrap_or_default();
        let source: String = inspect.call_method1("getsource", (&class,))?.extract()?;

        let header = format!("Source Code for {selected_node}");
        let body = format!("=== Node: {selected_node} ===\nFile: {file}\n\n=== Source Code ===\n{source}");
        Ok((header, body))
    }
}
