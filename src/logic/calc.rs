//! 四则运算

use log::error;
use pyo3::{
    exceptions::PyRuntimeError,
    pyclass, pymethods,
    types::{PyAnyMethods, PyDict, PyType},
    Bound, Py, PyErr, PyResult, Python,
};

use crate::{
    core::{
        category::CATEGORY_LOGIC,
        types::{NODE_FLOAT, NODE_INT, NODE_STRING},
        PromptServer,
    },
    error::Error,
};

/// 四则运算
#[pyclass(subclass)]
pub struct Calc {}

impl PromptServer for Calc {}

#[pymethods]
impl Calc {
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
        (NODE_INT, NODE_FLOAT, NODE_STRING)
    }

    #[classattr]
    #[pyo3(name = "RETURN_NAMES")]
    fn return_names() -> (&'static str, &'static str, &'static str) {
        ("result_int", "result_float", "result_string")
    }

    #[classattr]
    #[pyo3(name = "OUTPUT_IS_LIST")]
    fn output_is_list() -> (bool, bool, bool) {
        (false, false, false)
    }

    #[classattr]
    #[pyo3(name = "OUTPUT_NODE")]
    fn output_node() -> bool {
        true
    }

    #[classattr]
    #[pyo3(name = "CATEGORY")]
    const CATEGORY: &'static str = CATEGORY_LOGIC;

    #[classattr]
    #[pyo3(name = "DESCRIPTION")]
    fn description() -> &'static str {
        "Basic arithmetic over two numbers."
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
                    "number1",
                    (NODE_FLOAT, {
                        let number1 = PyDict::new(py);
                        number1.set_item("default", 1.0)?;
                        number1
                    }),
                )?;
                required.set_item(
                    "operator",
                    (vec!["+", "-", "*", "/"], {
                        let operator = PyDict::new(py);
                        operator.set_item("default", "*")?;
                        operator
                    }),
                )?;
                required.set_item(
                    "number2",
                    (NODE_FLOAT, {
                        let number2 = PyDict::new(py);
                        number2.set_item("default", 1.0)?;
                        number2
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
        number1: f64,
        operator: String,
        number2: f64,
    ) -> PyResult<(i64, f64, String)> {
        let results = self.calculate(number1, &operator, number2);

        match results {
            Ok(v) => Ok(v),
            Err(e) => {
                error!("Calc error, {e}");
                if let Err(e) = self.send_error(py, "Calc".to_string(), e.to_string()) {
                    error!("send error failed, {e}");
                    return Err(PyErr::new::<PyRuntimeError, _>(e.to_string()));
                }
                Err(PyErr::new::<PyRuntimeError, _>(e.to_string()))
            }
        }
    }
}

impl Calc {
    /// 计算
    fn calculate(&self, number1: f64, operator: &str, number2: f64) -> Result<(i64, f64, String), Error> {
        let result_float = match operator {
            "+" => number1 + number2,
            "-" => number1 - number2,
            "*" => number1 * number2,
            "/" => {
                if number2 == 0.0 {
                    return Err(Error::InvalidParameter(
                        "division by zero is not allowed".to_string(),
                    ));
                }
                number1 / number2
            }
            other => {
                return Err(Error::InvalidParameter(format!(
                    "unsupported operator: {other}"
                )))
            }
        };

        Ok((result_float as i64, result_float, result_float.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operators() -> anyhow::Result<()> {
        let node = Calc {};
        assert_eq!(node.calculate(2.0, "+", 3.0)?, (5, 5.0, "5".to_string()));
        assert_eq!(node.calculate(2.0, "*", 3.5)?, (7, 7.0, "7".to_string()));
        assert_eq!(node.calculate(7.0, "/", 2.0)?.0, 3);
        Ok(())
    }

    #[test]
    fn test_division_by_zero_is_an_error() {
        let node = Calc {};
        assert!(matches!(
            node.calculate(1.0, "/", 0.0),
            Err(Error::InvalidParameter(_))
        ));
    }
}
