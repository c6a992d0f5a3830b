//! Vehicle detection stage.

use image::DynamicImage;
use log::{debug, warn};

use crate::detection::decoder::{self, CoordMap, DecodeParams, Scoring};
use crate::detection::letterbox;
use crate::inference::InferenceBackend;
use crate::models::{Vehicle, VehicleType};

const VEHICLE_CLASSES: usize = 5;
const SCORE_THRESHOLD: f32 = 0.8;
const NMS_THRESHOLD: f32 = 0.8;

/// Detects vehicles on the full input image.
pub struct VehicleDetector {
    backend: Box<dyn InferenceBackend>,
    resolution: u32,
}

impl VehicleDetector {
    pub fn new(backend: Box<dyn InferenceBackend>, resolution: u32) -> Self {
        Self {
            backend,
            resolution,
        }
    }

    /// Detect vehicles, returning boxes in the coordinates of `image`.
    ///
    /// Empty input, empty model output and backend failures all degrade to an
    /// empty list.
    pub fn detect(&self, image: &DynamicImage) -> Vec<Vehicle> {
        if image.width() == 0 || image.height() == 0 {
            return Vec::new();
        }

        let (padded, pre_params) = letterbox::letterbox(image, self.resolution);
        let input = letterbox::to_input_tensor(&padded);

        let outputs = match self.backend.forward(input) {
            Ok(outputs) => outputs,
            Err(e) => {
                warn!("vehicle inference failed: {e:#}");
                return Vec::new();
            }
        };
        let Some(output) = outputs.first() else {
            return Vec::new();
        };

        let params = DecodeParams {
            score_threshold: SCORE_THRESHOLD,
            iou_threshold: NMS_THRESHOLD,
            scoring: Scoring::ClassMax {
                classes: VEHICLE_CLASSES,
            },
            keypoints: 0,
        };
        let map = CoordMap::from_letterbox(&pre_params);

        let vehicles: Vec<Vehicle> = decoder::decode(output, &params, &map)
            .into_iter()
            .filter_map(|d| {
                Some(Vehicle {
                    vehicle_type: VehicleType::from_class_id(d.class_id)?,
                    confidence: d.score,
                    bounding_box: d.bounding_box,
                })
            })
            .collect();

        debug!("vehicle stage: {} detections", vehicles.len());
        vehicles
    }
}
