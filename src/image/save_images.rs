//! 保存图片
//!
//! IMAGE 批次张量逐张编码为 PNG, 文件名在已有编号之后继续递增,
//! 工作流元数据以 tEXt 块写入

use std::{fs::File, io::BufWriter, path::Path};

use log::error;
use numpy::{ndarray::Axis, PyArrayDyn, PyArrayMethods};
use pyo3::{
    exceptions::PyRuntimeError,
    pyclass, pymethods,
    types::{PyAnyMethods, PyDict, PyList, PyListMethods, PyTuple, PyType},
    Bound, Py, PyAny, PyErr, PyResult, Python,
};
use walkdir::WalkDir;

use crate::{
    core::{
        category::CATEGORY_IMAGE,
        types::{NODE_BOOLEAN, NODE_IMAGE, NODE_STRING},
        PromptServer,
    },
    error::Error,
    wrapper::comfy::folder_paths::get_output_directory,
};

/// 扫描输出目录, 返回指定前缀的下一个可用编号
fn next_counter(output_dir: &Path, filename_prefix: &str) -> usize {
    let mut highest = 0;
    for entry in WalkDir::new(output_dir)
        .max_depth(1)
        .into_iter()
        .flatten()
    {
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(rest) = name.strip_prefix(filename_prefix) else {
            continue;
        };
        let Some(stem) = rest.strip_suffix(".png") else {
            continue;
        };
        if let Some(number) = stem.rsplit('_').next() {
            if let Ok(number) = number.parse::<usize>() {
                highest = highest.max(number);
            }
        }
    }
    highest + 1
}

/// 保存图片
#[pyclass(subclass)]
pub struct SaveImages {}

impl PromptServer for SaveImages {}

#[pymethods]
impl SaveImages {
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

    // 输出节点没有返回值, RETURN_TYPES 是空元组
    #[classattr]
    #[pyo3(name = "RETURN_TYPES")]
    fn return_types(py: Python) -> Py<PyTuple> {
        PyTuple::empty(py).into()
    }

    #[classattr]
    #[pyo3(name = "OUTPUT_NODE")]
    fn output_node() -> bool {
        true
    }

    #[classattr]
    #[pyo3(name = "CATEGORY")]
    const CATEGORY: &'static str = CATEGORY_IMAGE;

    #[classattr]
    #[pyo3(name = "DESCRIPTION")]
    fn description() -> &'static str {
        "Save an image batch as numbered PNG files with optional workflow metadata."
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
                required.set_item("images", (NODE_IMAGE,))?;
                required.set_item(
                    "filename_prefix",
                    (NODE_STRING, {
                        let filename_prefix = PyDict::new(py);
                        filename_prefix.set_item("default", "ComfyUI")?;
                        filename_prefix
                    }),
                )?;
                required.set_item(
                    "save_metadata",
                    (NODE_BOOLEAN, {
                        let save_metadata = PyDict::new(py);
                        save_metadata.set_item("default", true)?;
                        save_metadata
                    }),
                )?;
                required
            })?;

            dict.set_item("hidden", {
                let hidden = PyDict::new(py);
                hidden.set_item("prompt", "PROMPT")?;
                hidden.set_item("extra_pnginfo", "EXTRA_PNGINFO")?;
                hidden
            })?;

            Ok(dict.into())
        })
    }

    #[pyo3(
        name = "execute",
        signature = (images, filename_prefix, save_metadata, prompt=None, extra_pnginfo=None)
    )]
    fn execute(
        &mut self,
        py: Python,
        images: Bound<'_, PyAny>,
        filename_prefix: String,
        save_metadata: bool,
        prompt: Option<Bound<'_, PyAny>>,
        extra_pnginfo: Option<Bound<'_, PyAny>>,
    ) -> PyResult<Py<PyDict>> {
        let results = self.save_images(
            py,
            &images,
            &filename_prefix,
            save_metadata,
            prompt.as_ref(),
            extra_pnginfo.as_ref(),
        );

        match results {
            Ok(saved) => {
                let images = PyList::empty(py);
                for filename in saved {
                    let item = PyDict::new(py);
                    item.set_item("filename", filename)?;
                    item.set_item("subfolder", "")?;
                    item.set_item("type", "output")?;
                    images.append(item)?;
                }
                let ui = PyDict::new(py);
                ui.set_item("images", images)?;
                let dict = PyDict::new(py);
                dict.set_item("ui", ui)?;
                Ok(dict.into())
            }
            Err(e) => {
                error!("SaveImages error, {e}");
                if let Err(e) = self.send_error(py, "SaveImages".to_string(), e.to_string()) {
                    error!("send error failed, {e}");
                    return Err(PyErr::new::<PyRuntimeError, _>(e.to_string()));
                }
                Err(PyErr::new::<PyRuntimeError, _>(e.to_string()))
            }
        }
    }
}

impl SaveImages {
    /// 保存批次内的全部图片, 返回写出的文件名
    fn save_images(
        &self,
        py: Python,
        images: &Bound<'_, PyAny>,
        filename_prefix: &str,
        save_metadata: bool,
        prompt: Option<&Bound<'_, PyAny>>,
        extra_pnginfo: Option<&Bound<'_, PyAny>>,
    ) -> Result<Vec<String>, Error> {
        let output_dir = get_output_directory(py)?;
        let text_chunks = self.metadata_chunks(save_metadata, prompt, extra_pnginfo)?;

        // torch.Tensor -> numpy, [batch, height, width, channels], float 0..1
        let array = images.call_method0("cpu")?.call_method0("numpy")?;
        let array = array
            .downcast::<PyArrayDyn<f32>>()
            .map_err(|e| Error::PyDowncastError(e.to_string()))?
            .readonly();
        let view = array.as_array();

        let dims = view.shape().to_vec();
        if dims.len() != 4 {
            return Err(Error::InvalidParameter(format!(
                "expected a [batch, height, width, channels] image tensor, got {dims:?}"
            )));
        }
        let (height, width, channels) = (dims[1], dims[2], dims[3]);
        if channels != 3 && channels != 4 {
            return Err(Error::InvalidParameter(format!(
                "expected 3 or 4 channels, got {channels}"
            )));
        }

        let mut counter = next_counter(&output_dir, filename_prefix);
        let mut saved = Vec::with_capacity(dims[0]);

        for batch_index in 0..dims[0] {
            let frame = view.index_axis(Axis(0), batch_index);

            let mut pixels = Vec::with_capacity(height * width * channels);
            for y in 0..height {
                for x in 0..width {
                    for c in 0..channels {
                        let value = frame[[y, x, c]] * 255.0;
                        pixels.push(value.clamp(0.0, 255.0) as u8);
                    }
                }
            }

            let filename = format!("{filename_prefix}_{counter:05}.png");
            self.write_png(
                &output_dir.join(&filename),
                width as u32,
                height as u32,
                channels,
                &pixels,
                &text_chunks,
            )?;
            saved.push(filename);
            counter += 1;
        }

        Ok(saved)
    }

    /// 工作流元数据序列化为 tEXt 键值对
    fn metadata_chunks(
        &self,
        save_metadata: bool,
        prompt: Option<&Bound<'_, PyAny>>,
        extra_pnginfo: Option<&Bound<'_, PyAny>>,
    ) -> Result<Vec<(String, String)>, Error> {
        let mut chunks = Vec::new();
        if !save_metadata {
            return Ok(chunks);
        }

        if let Some(prompt) = prompt {
            let value: serde_json::Value = pythonize::depythonize(prompt)?;
            chunks.push(("prompt".to_string(), serde_json::to_string(&value)?));
        }
        if let Some(extra_pnginfo) = extra_pnginfo {
            let value: serde_json::Value = pythonize::depythonize(extra_pnginfo)?;
            if let serde_json::Value::Object(map) = value {
                for (key, value) in map {
                    chunks.push((key, serde_json::to_string(&value)?));
                }
            }
        }
        Ok(chunks)
    }

    fn write_png(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        channels: usize,
        pixels: &[u8],
        text_chunks: &[(String, String)],
    ) -> Result<(), Error> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);

        let mut encoder = png::Encoder::new(writer, width, height);
        encoder.set_color(if channels == 4 {
            png::ColorType::Rgba
        } else {
            png::ColorType::Rgb
        });
        encoder.set_depth(png::BitDepth::Eight);
        for (keyword, text) in text_chunks {
            encoder
                .add_text_chunk(keyword.clone(), text.clone())
                .map_err(|e| Error::Encode(e.to_string()))?;
        }

        let mut png_writer = encoder
            .write_header()
            .map_err(|e| Error::Encode(e.to_string()))?;
        png_writer
            .write_image_data(pixels)
            .map_err(|e| Error::Encode(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_counter_continues_after_existing_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("ComfyUI_00001.png"), b"")?;
        std::fs::write(dir.path().join("ComfyUI_00007.png"), b"")?;
        std::fs::write(dir.path().join("Other_00042.png"), b"")?;
        assert_eq!(next_counter(dir.path(), "ComfyUI"), 8);
        Ok(())
    }

    #[test]
    fn test_next_counter_starts_at_one() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        assert_eq!(next_counter(dir.path(), "ComfyUI"), 1);
        Ok(())
    }

    #[test]
    fn test_next_counter_skips_unparsable_names() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("ComfyUI_final.png"), b"")?;
        std::fs::write(dir.path().join("ComfyUI_00003.png"), b"")?;
        assert_eq!(next_counter(dir.path(), "ComfyUI"), 4);
        Ok(())
    }

    #[test]
    fn test_write_png_roundtrip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.png");
        let node = SaveImages {};
        // 2x2 纯色 RGB
        let pixels = vec![255u8; 2 * 2 * 3];
        node.write_png(
            &path,
            2,
            2,
            3,
            &pixels,
            &[("prompt".to_string(), "{}".to_string())],
        )?;

        let decoder = png::Decoder::new(File::open(&path)?);
        let reader = decoder.read_info()?;
        assert_eq!(reader.info().width, 2);
        assert_eq!(
            reader.info().uncompressed_latin1_text[0].keyword,
            "prompt"
        );
        Ok(())
    }
}
