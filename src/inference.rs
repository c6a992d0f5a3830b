//! Seam between the pipeline and the neural-network inference engine.
//!
//! The pipeline only ever hands a normalized NCHW tensor to a backend and
//! gets raw output tensors back; everything else (output layout, decoding,
//! thresholds) lives in [`crate::detection`]. Tests substitute scripted
//! backends through the [`InferenceBackend`] trait.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use ndarray::ArrayD;
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::Value,
};

/// Black-box inference engine for one model.
pub trait InferenceBackend: Send + Sync {
    /// Run the network on a normalized `[1, 3, H, W]` tensor and return its
    /// raw output tensors, in model output order.
    fn forward(&self, input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>>;
}

/// Detector model size. Resolution and file name per stage come from the
/// tables below instead of per-variant construction code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSize {
    Nano = 0,
    Small,
    Medium,
    Big,
    Large,
}

/// Resolution and model file for one detector stage at one size.
pub struct StageModel {
    pub resolution: u32,
    pub filename: &'static str,
}

const PLATE_MODELS: [StageModel; 5] = [
    StageModel { resolution: 256, filename: "256x256.onnx" },
    StageModel { resolution: 320, filename: "320x320.onnx" },
    StageModel { resolution: 384, filename: "384x384.onnx" },
    StageModel { resolution: 448, filename: "448x448.onnx" },
    StageModel { resolution: 640, filename: "640x640.onnx" },
];

// The two smallest sizes share one vehicle model.
const VEHICLE_MODELS: [StageModel; 5] = [
    StageModel { resolution: 256, filename: "256x256v.onnx" },
    StageModel { resolution: 256, filename: "256x256v.onnx" },
    StageModel { resolution: 320, filename: "320x320v.onnx" },
    StageModel { resolution: 384, filename: "384x384v.onnx" },
    StageModel { resolution: 416, filename: "416x416v.onnx" },
];

/// Character recognizer model file; its input is a fixed 576x128.
pub const RECOGNIZER_MODEL_FILE: &str = "ocr_uz.onnx";

impl ModelSize {
    pub fn plate_model(&self) -> &'static StageModel {
        &PLATE_MODELS[*self as usize]
    }

    pub fn vehicle_model(&self) -> &'static StageModel {
        &VEHICLE_MODELS[*self as usize]
    }
}

/// ONNX Runtime backed inference engine.
///
/// `Session::run` needs exclusive access, so a single pipeline instance
/// serializes concurrent `recognize` calls on the session mutex.
pub struct OrtBackend {
    session: Mutex<Session>,
    output_names: Vec<String>,
}

impl OrtBackend {
    pub fn from_file(model_path: &Path) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load model {}", model_path.display()))?;

        let output_names = session.outputs.iter().map(|o| o.name.clone()).collect();

        Ok(Self {
            session: Mutex::new(session),
            output_names,
        })
    }
}

impl InferenceBackend for OrtBackend {
    fn forward(&self, input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>> {
        let input_tensor = Value::from_array(input)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("inference session lock poisoned: {}", e))?;
        let outputs = session.run(ort::inputs![input_tensor])?;

        let mut tensors = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let value = outputs
                .get(name.as_str())
                .with_context(|| format!("model produced no output tensor named {}", name))?;
            let (shape, data) = value.try_extract_tensor::<f32>()?;
            let dims: Vec<usize> = shape.as_ref().iter().map(|&d| d as usize).collect();
            tensors.push(ArrayD::from_shape_vec(dims, data.to_vec())?);
        }

        Ok(tensors)
    }
}
