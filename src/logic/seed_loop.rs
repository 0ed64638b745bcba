//! 种子与数值循环
//!
//! 原样转发种子的多种类型表示, 同时在一个浮点区间内循环产出数值.
//! 位置计数保存在节点实例里, 在宿主进程生命周期内持续推进

use log::{error, warn};
use pyo3::{
    exceptions::PyRuntimeError,
    pyclass, pymethods,
    types::{PyAnyMethods, PyDict, PyType},
    Bound, Py, PyErr, PyResult, Python,
};
use rand::Rng;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use strum_macros::{Display, EnumString};

use crate::{
    core::{
        category::CATEGORY_LOGIC,
        types::{NODE_FLOAT, NODE_INT, NODE_INT_MAX, NODE_NUMBER, NODE_SEED, NODE_STRING},
        PromptServer,
    },
    error::Error,
};

/// 数值循环模式
///
/// "disabled", "random", "increment", "decrement", "fixed"
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SeedLoopMode {
    /// 固定返回起始值
    Disabled,
    /// 区间内均匀随机
    Random,
    /// 从起始值按步长向上走
    Increment,
    /// 从结束值按步长向下走
    Decrement,
    /// 循环自定义数值列表
    Fixed,
}

impl SeedLoopMode {
    pub fn choices() -> Vec<String> {
        vec![
            SeedLoopMode::Disabled.to_string(),
            SeedLoopMode::Random.to_string(),
            SeedLoopMode::Increment.to_string(),
            SeedLoopMode::Decrement.to_string(),
            SeedLoopMode::Fixed.to_string(),
        ]
    }
}

/// 四舍五入到指定小数位 (银行家舍入, 与宿主端格式化一致)
fn format_value(value: f64, decimal_places: u32) -> f64 {
    Decimal::from_f64_retain(value)
        .map(|d| d.round_dp(decimal_places).to_f64().unwrap_or(value))
        .unwrap_or(value)
}

/// 种子与数值循环
#[pyclass(subclass)]
pub struct SeedLoop {
    current_index: usize,
}

impl PromptServer for SeedLoop {}

#[pymethods]
impl SeedLoop {
    #[new]
    fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_level(true)
            .with_file(true)
            .with_line_number(true)
            .try_init();
        Self { current_index: 0 }
    }

    #[classattr]
    #[pyo3(name = "INPUT_IS_LIST")]
    fn input_is_list() -> bool {
        false
    }

    #[allow(clippy::type_complexity)]
    #[classattr]
    #[pyo3(name = "RETURN_TYPES")]
    fn return_types() -> (
        &'static str,
        &'static str,
        &'static str,
        &'static str,
        &'static str,
        &'static str,
        &'static str,
        &'static str,
    ) {
        (
            NODE_SEED,
            NODE_NUMBER,
            NODE_FLOAT,
            NODE_INT,
            NODE_STRING,
            NODE_FLOAT,
            NODE_INT,
            NODE_STRING,
        )
    }

    #[allow(clippy::type_complexity)]
    #[classattr]
    #[pyo3(name = "RETURN_NAMES")]
    fn return_names() -> (
        &'static str,
        &'static str,
        &'static str,
        &'static str,
        &'static str,
        &'static str,
        &'static str,
        &'static str,
    ) {
        (
            "seed",
            "number",
            "float",
            "int",
            "string",
            "loop_value",
            "loop_index",
            "loop_value_string",
        )
    }

    #[classattr]
    #[pyo3(name = "CATEGORY")]
    const CATEGORY: &'static str = CATEGORY_LOGIC;

    #[classattr]
    #[pyo3(name = "DESCRIPTION")]
    fn description() -> &'static str {
        "Pass a seed through in several typed forms while looping a value over a float range."
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
                    "seed",
                    (NODE_INT, {
                        let seed = PyDict::new(py);
                        seed.set_item("default", 0)?;
                        seed.set_item("min", 0)?;
                        seed.set_item("max", NODE_INT_MAX)?;
                        seed.set_item("step", 1)?;
                        seed.set_item("display", "number")?;
                        seed
                    }),
                )?;
                required.set_item(
                    "loop_mode",
                    (SeedLoopMode::choices(), {
                        let loop_mode = PyDict::new(py);
                        loop_mode.set_item("default", SeedLoopMode::Disabled.to_string())?;
                        loop_mode
                    }),
                )?;
                required.set_item(
                    "start_value",
                    (NODE_FLOAT, {
                        let start_value = PyDict::new(py);
                        start_value.set_item("default", 0.1)?;
                        start_value.set_item("min", 0.0)?;
                        start_value.set_item("max", 100.0)?;
                        start_value.set_item("step", 0.1)?;
                        start_value
                    }),
                )?;
                required.set_item(
                    "end_value",
                    (NODE_FLOAT, {
                        let end_value = PyDict::new(py);
                        end_value.set_item("default", 1.0)?;
                        end_value.set_item("min", 0.0)?;
                        end_value.set_item("max", 100.0)?;
                        end_value.set_item("step", 0.1)?;
                        end_value
                    }),
                )?;
                required.set_item(
                    "step_size",
                    (NODE_FLOAT, {
                        let step_size = PyDict::new(py);
                        step_size.set_item("default", 0.1)?;
                        step_size.set_item("min", 0.001)?;
                        step_size.set_item("max", 100.0)?;
                        step_size.set_item("step", 0.1)?;
                        step_size
                    }),
                )?;
                required.set_item(
                    "loop_count",
                    (NODE_INT, {
                        let loop_count = PyDict::new(py);
                        loop_count.set_item("default", 10)?;
                        loop_count.set_item("min", 1)?;
                        loop_count.set_item("max", 100)?;
                        loop_count.set_item("step", 1)?;
                        loop_count
                    }),
                )?;
                required.set_item(
                    "decimal_places",
                    (NODE_INT, {
                        let decimal_places = PyDict::new(py);
                        decimal_places.set_item("default", 2)?;
                        decimal_places.set_item("min", 1)?;
                        decimal_places.set_item("max", 6)?;
                        decimal_places.set_item("step", 1)?;
                        decimal_places
                    }),
                )?;
                required
            })?;

            dict.set_item("optional", {
                let optional = PyDict::new(py);
                optional.set_item(
                    "custom_values",
                    (NODE_STRING, {
                        let custom_values = PyDict::new(py);
                        custom_values.set_item("default", "0.1, 0.8, 1.6")?;
                        custom_values.set_item("multiline", true)?;
                        custom_values
                    }),
                )?;
                optional
            })?;

            Ok(dict.into())
        })
    }

    #[allow(clippy::too_many_arguments, clippy::type_complexity)]
    #[pyo3(
        name = "execute",
        signature = (seed, loop_mode, start_value, end_value, step_size, loop_count, decimal_places, custom_values=None)
    )]
    fn execute(
        &mut self,
        py: Python,
        seed: u64,
        loop_mode: String,
        start_value: f64,
        end_value: f64,
        step_size: f64,
        loop_count: i64,
        decimal_places: u32,
        custom_values: Option<String>,
    ) -> PyResult<(Py<PyDict>, f64, f64, u64, String, f64, usize, String)> {
        let results = self.next_loop_value(
            &loop_mode,
            start_value,
            end_value,
            step_size,
            loop_count,
            decimal_places,
            custom_values.as_deref(),
        );

        // 与行读取节点不同, 这里的错误直接抛给调用方
        let (loop_value, loop_index) = match results {
            Ok(v) => v,
            Err(e) => {
                error!("SeedLoop error, {e}");
                if let Err(e) = self.send_error(py, "SeedLoop".to_string(), e.to_string()) {
                    error!("send error failed, {e}");
                    return Err(PyErr::new::<PyRuntimeError, _>(e.to_string()));
                }
                return Err(PyErr::new::<PyRuntimeError, _>(e.to_string()));
            }
        };

        let seed_dict = PyDict::new(py);
        seed_dict.set_item("seed", seed)?;

        let loop_value_string = format!("{:.*}", decimal_places as usize, loop_value);

        Ok((
            seed_dict.into(),
            seed as f64,
            seed as f64,
            seed,
            seed.to_string(),
            loop_value,
            loop_index,
            loop_value_string,
        ))
    }
}

impl SeedLoop {
    /// 计算本次调用的循环数值与推进后的位置
    #[allow(clippy::too_many_arguments)]
    fn next_loop_value(
        &mut self,
        loop_mode: &str,
        start_value: f64,
        end_value: f64,
        step_size: f64,
        loop_count: i64,
        decimal_places: u32,
        custom_values: Option<&str>,
    ) -> Result<(f64, usize), Error> {
        let mode = loop_mode
            .parse::<SeedLoopMode>()
            .map_err(|e| Error::ParseEnumString(e.to_string()))?;

        // 起止倒置时交换
        let (start_value, end_value) = if start_value > end_value {
            (end_value, start_value)
        } else {
            (start_value, end_value)
        };

        let mut loop_value = start_value;

        if mode != SeedLoopMode::Disabled {
            match mode {
                SeedLoopMode::Fixed => {
                    if let Some(custom) = custom_values {
                        loop_value = match self.parse_custom_values(custom, decimal_places) {
                            Ok(values) => values[self.current_index % values.len()],
                            Err(e) => {
                                // 解析失败退回起始值
                                warn!("error parsing custom values, {e}");
                                start_value
                            }
                        };
                    }
                }
                SeedLoopMode::Random => {
                    loop_value = format_value(
                        rand::rng().random_range(start_value..=end_value),
                        decimal_places,
                    );
                }
                SeedLoopMode::Increment | SeedLoopMode::Decrement => {
                    if step_size <= 0.0 {
                        return Err(Error::InvalidParameter(format!(
                            "step_size must be > 0, got {step_size}"
                        )));
                    }
                    let total_range = end_value - start_value;
                    let n_steps = (total_range / step_size).round() as usize + 1;
                    let adjusted_index = self.current_index % n_steps;

                    loop_value = match mode {
                        SeedLoopMode::Increment => format_value(
                            start_value + adjusted_index as f64 * step_size,
                            decimal_places,
                        ),
                        _ => format_value(
                            end_value - adjusted_index as f64 * step_size,
                            decimal_places,
                        ),
                    };

                    self.current_index += 1;
                }
                SeedLoopMode::Disabled => {}
            }

            // 数值上限 100
            if loop_value > 100.0 {
                loop_value = 100.0;
            }

            // 到达循环次数上限后从头再来
            if self.current_index as i64 >= loop_count {
                self.current_index = 0;
            }
        }

        Ok((loop_value, self.current_index))
    }

    /// 解析逗号分隔的自定义数值列表
    fn parse_custom_values(
        &self,
        custom_values: &str,
        decimal_places: u32,
    ) -> Result<Vec<f64>, Error> {
        let values = custom_values
            .split(',')
            .map(|v| v.trim().parse::<f64>().map(|f| format_value(f, decimal_places)))
            .collect::<Result<Vec<f64>, _>>()?;
        if values.is_empty() {
            return Err(Error::InvalidParameter("custom_values is empty".to_string()));
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> SeedLoop {
        SeedLoop { current_index: 0 }
    }

    #[test]
    fn test_disabled_returns_start_value() -> anyhow::Result<()> {
        let mut node = node();
        for _ in 0..3 {
            let (value, index) = node.next_loop_value("disabled", 0.3, 1.0, 0.1, 10, 2, None)?;
            assert_eq!(value, 0.3);
            assert_eq!(index, 0);
        }
        Ok(())
    }

    #[test]
    fn test_increment_walks_the_grid() -> anyhow::Result<()> {
        let mut node = node();
        let mut values = Vec::new();
        for _ in 0..6 {
            let (value, _) = node.next_loop_value("increment", 0.0, 1.0, 0.25, 100, 2, None)?;
            values.push(value);
        }
        // n_steps = 5, 第六次回到网格起点
        assert_eq!(values, vec![0.0, 0.25, 0.5, 0.75, 1.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_decrement_walks_down_from_end() -> anyhow::Result<()> {
        let mut node = node();
        let (first, _) = node.next_loop_value("decrement", 0.0, 1.0, 0.5, 100, 2, None)?;
        let (second, _) = node.next_loop_value("decrement", 0.0, 1.0, 0.5, 100, 2, None)?;
        assert_eq!((first, second), (1.0, 0.5));
        Ok(())
    }

    #[test]
    fn test_inverted_range_is_swapped() -> anyhow::Result<()> {
        let mut node = node();
        let (value, _) = node.next_loop_value("increment", 1.0, 0.0, 0.5, 100, 2, None)?;
        assert_eq!(value, 0.0);
        Ok(())
    }

    #[test]
    fn test_loop_count_resets_index() -> anyhow::Result<()> {
        let mut node = node();
        node.next_loop_value("increment", 0.0, 1.0, 0.1, 2, 2, None)?;
        let (_, index) = node.next_loop_value("increment", 0.0, 1.0, 0.1, 2, 2, None)?;
        // 第二次推进到 2, 达到 loop_count 后归零
        assert_eq!(index, 0);
        Ok(())
    }

    #[test]
    fn test_fixed_uses_custom_values() -> anyhow::Result<()> {
        let mut node = node();
        let (value, _) =
            node.next_loop_value("fixed", 0.0, 1.0, 0.1, 10, 2, Some("0.1, 0.8, 1.6"))?;
        assert_eq!(value, 0.1);
        Ok(())
    }

    #[test]
    fn test_fixed_falls_back_on_parse_error() -> anyhow::Result<()> {
        let mut node = node();
        let (value, _) = node.next_loop_value("fixed", 0.3, 1.0, 0.1, 10, 2, Some("a, b"))?;
        assert_eq!(value, 0.3);
        Ok(())
    }

    #[test]
    fn test_random_stays_in_range() -> anyhow::Result<()> {
        let mut node = node();
        for _ in 0..20 {
            let (value, _) = node.next_loop_value("random", 0.2, 0.4, 0.1, 10, 3, None)?;
            assert!((0.2..=0.4).contains(&value));
        }
        Ok(())
    }

    #[test]
    fn test_format_value_rounds_half_to_even() {
        assert_eq!(format_value(0.125, 2), 0.12);
        assert_eq!(format_value(0.135, 2), 0.14);
        assert_eq!(format_value(1.0, 2), 1.0);
    }
}
