//! Character recognition on rectified plate images.

use image::DynamicImage;
use log::{debug, warn};

use crate::detection::decoder::{self, CoordMap, DecodeParams, Scoring};
use crate::detection::letterbox;
use crate::inference::InferenceBackend;
use crate::models::{Character, Country, License};
use crate::validation;

/// Fixed recognizer input size; plate crops are close to this aspect ratio,
/// so no letterboxing is needed.
pub const INPUT_WIDTH: u32 = 576;
pub const INPUT_HEIGHT: u32 = 128;

const NMS_THRESHOLD: f32 = 0.75;

/// Character classes in model class-id order; labels are reported uppercase.
const CLASSES: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Reads the characters off a rectified plate image and assembles a
/// grammar-validated license string.
pub struct PlateRecognizer {
    backend: Box<dyn InferenceBackend>,
    score_threshold: f32,
}

impl PlateRecognizer {
    pub fn new(backend: Box<dyn InferenceBackend>, score_threshold: f32) -> Self {
        Self {
            backend,
            score_threshold,
        }
    }

    /// Recognize the license string on a rectified plate image.
    ///
    /// Characters are ordered left to right before concatenation; the string
    /// must pass grammar validation or the whole license reverts to its
    /// empty default. Character boxes stay in plate-crop coordinates.
    pub fn recognize(&self, image: &DynamicImage) -> License {
        if image.width() == 0 || image.height() == 0 {
            return License::default();
        }

        let mut characters = self.run_inference(image);

        // Concatenation order determines the recognized string.
        characters.sort_by(|a, b| a.bounding_box.x.total_cmp(&b.bounding_box.x));

        if characters.is_empty() {
            return License::default();
        }

        let license: String = characters.iter().map(|c| c.label).collect();
        let total_confidence =
            characters.iter().map(|c| c.confidence).sum::<f32>() / characters.len() as f32;

        if !validation::is_valid_uz(&license) {
            debug!("discarding candidate {license:?}: failed grammar validation");
            return License::default();
        }

        License {
            country: Country::Uz,
            total_confidence,
            license,
            characters,
        }
    }

    fn run_inference(&self, image: &DynamicImage) -> Vec<Character> {
        let input = letterbox::to_resized_tensor(image, INPUT_WIDTH, INPUT_HEIGHT);

        let outputs = match self.backend.forward(input) {
            Ok(outputs) => outputs,
            Err(e) => {
                warn!("character inference failed: {e:#}");
                return Vec::new();
            }
        };
        let Some(output) = outputs.first() else {
            return Vec::new();
        };

        let params = DecodeParams {
            score_threshold: self.score_threshold,
            iou_threshold: NMS_THRESHOLD,
            scoring: Scoring::ClassMax {
                classes: CLASSES.len(),
            },
            keypoints: 0,
        };
        let map = CoordMap::plain(
            image.width() as f32,
            image.height() as f32,
            INPUT_WIDTH as f32,
            INPUT_HEIGHT as f32,
        );

        let characters: Vec<Character> = decoder::decode(output, &params, &map)
            .into_iter()
            .map(|d| Character {
                label: CLASSES[d.class_id].to_ascii_uppercase(),
                confidence: d.score,
                bounding_box: d.bounding_box,
            })
            .collect();

        debug!("character stage: {} detections", characters.len());
        characters
    }
}
