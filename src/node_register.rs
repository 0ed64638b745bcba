//! 节点注册

use pyo3::{PyResult, Python};

use crate::{
    core::node::NodeRegister,
    image::SaveImages,
    logic::{Calc, SeedLoop},
    table::{CsvRowLooper, ExcelRowLooper, ExcelRowReader},
    text::{AccumulateText, AccumulateTextNumbered, ConcatenateText, WriteText},
    utils::NodeInspector,
};

pub fn node_register(py: Python<'_>) -> PyResult<Vec<NodeRegister<'_>>> {
    let nodes: Vec<NodeRegister> = vec![
        // table
        NodeRegister(
            "CsvRowLooper",
            py.get_type::<CsvRowLooper>(),
            "Rf CSV Row Looper",
        ),
        NodeRegister(
            "ExcelRowLooper",
            py.get_type::<ExcelRowLooper>(),
            "Rf Excel Row Looper",
        ),
        NodeRegister(
            "ExcelRowReader",
            py.get_type::<ExcelRowReader>(),
            "Rf Excel Row Reader",
        ),
        // text
        NodeRegister("WriteText", py.get_type::<WriteText>(), "Rf Write Text"),
        NodeRegister(
            "ConcatenateText",
            py.get_type::<ConcatenateText>(),
            "Rf Concatenate Text",
        ),
        NodeRegister(
            "AccumulateText",
            py.get_type::<AccumulateText>(),
            "Rf Accumulate Text",
        ),
        NodeRegister(
            "AccumulateTextNumbered",
            py.get_type::<AccumulateTextNumbered>(),
            "Rf Accumulate Text Numbered",
        ),
        // logic
        NodeRegister("Calc", py.get_type::<Calc>(), "Rf Calc"),
        NodeRegister("SeedLoop", py.get_type::<SeedLoop>(), "Rf Seed Loop"),
        // image
        NodeRegister("SaveImages", py.get_type::<SaveImages>(), "Rf Save Images"),
        // utils
        NodeRegister(
            "NodeInspector",
            py.get_type::<NodeInspector>(),
            "Rf Node Inspector",
        ),
    ];
    Ok(nodes)
}
