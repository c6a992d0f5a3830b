//! Pipeline orchestrator: vehicle detection, per-vehicle plate detection,
//! rectification, character recognition, coordinate rebasing and confidence
//! fusion.

use std::path::Path;

use anyhow::Result;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use log::{debug, info, warn};

use crate::detection::{self, PlateDetector, PlateRecognizer, VehicleDetector};
use crate::inference::{ModelSize, OrtBackend, RECOGNIZER_MODEL_FILE};
use crate::models::{BoundingBox, License, Plate, Recognition, Vehicle, VehicleType};
use crate::utils;

/// Per-stage confidence weights; the license string dominates.
const VEHICLE_WEIGHT: f32 = 0.05;
const PLATE_WEIGHT: f32 = 0.05;
const LICENSE_WEIGHT: f32 = 0.9;

/// Weighted combination of the three per-stage confidences into one
/// acceptance score.
pub fn fuse_confidence(vehicle: f32, plate: f32, license: f32) -> f32 {
    VEHICLE_WEIGHT * vehicle + PLATE_WEIGHT * plate + LICENSE_WEIGHT * license
}

/// The full recognition pipeline.
///
/// A `Falpr` instance is reusable across `recognize` calls; all per-call
/// state is local to the call.
pub struct Falpr {
    vehicle_detector: VehicleDetector,
    plate_detector: PlateDetector,
    plate_recognizer: PlateRecognizer,
    overall_confidence: f32,
}

impl Falpr {
    /// Assemble a pipeline from already constructed stages. This is the seam
    /// tests use to inject scripted inference backends.
    pub fn new(
        vehicle_detector: VehicleDetector,
        plate_detector: PlateDetector,
        plate_recognizer: PlateRecognizer,
        overall_confidence: f32,
    ) -> Self {
        Self {
            vehicle_detector,
            plate_detector,
            plate_recognizer,
            overall_confidence,
        }
    }

    /// Load all three stage models from `model_dir` using ONNX Runtime.
    pub fn from_model_dir(
        model_dir: &Path,
        model_size: ModelSize,
        char_confidence: f32,
        overall_confidence: f32,
    ) -> Result<Self> {
        let vehicle_model = model_size.vehicle_model();
        let plate_model = model_size.plate_model();

        let vehicle_detector = VehicleDetector::new(
            Box::new(OrtBackend::from_file(
                &model_dir.join(vehicle_model.filename),
            )?),
            vehicle_model.resolution,
        );
        let plate_detector = PlateDetector::new(
            Box::new(OrtBackend::from_file(&model_dir.join(plate_model.filename))?),
            plate_model.resolution,
        );
        let plate_recognizer = PlateRecognizer::new(
            Box::new(OrtBackend::from_file(
                &model_dir.join(RECOGNIZER_MODEL_FILE),
            )?),
            char_confidence,
        );

        Ok(Self::new(
            vehicle_detector,
            plate_detector,
            plate_recognizer,
            overall_confidence,
        ))
    }

    /// Run the full pipeline on one image.
    ///
    /// Always returns at least one result: when no chain passes the overall
    /// confidence threshold, the first detected vehicle is returned with
    /// empty plate and license data.
    pub fn recognize(&self, image: &DynamicImage) -> Vec<Recognition> {
        let mut vehicles = self.vehicle_detector.detect(image);
        if vehicles.is_empty() {
            // Keep plate detection alive over the whole frame.
            vehicles.push(Vehicle {
                vehicle_type: VehicleType::Car,
                confidence: 1.0,
                bounding_box: BoundingBox::new(0.0, 0.0, image.width() as f32, image.height() as f32),
            });
        }

        let mut results = Vec::new();
        for vehicle in &vehicles {
            let Some(vehicle_crop) = utils::crop_frame(image, &vehicle.bounding_box) else {
                continue;
            };

            for mut plate in self.plate_detector.detect(&vehicle_crop) {
                let Some(rectified) = detection::rectify_plate(&vehicle_crop, &plate) else {
                    warn!("skipping geometrically degenerate plate candidate");
                    continue;
                };

                let mut license = self.plate_recognizer.recognize(&rectified);

                // Plate keypoints: vehicle-crop frame -> original image.
                plate.rebase(vehicle.bounding_box.x, vehicle.bounding_box.y);

                // Character boxes: plate-crop frame -> original image, using
                // the first keypoint as an approximate origin. Rectification
                // is not undone, so these positions are approximate.
                let origin = plate.keypoints[0];
                for character in &mut license.characters {
                    character.rebase(origin.x, origin.y);
                }

                let fused = fuse_confidence(
                    vehicle.confidence,
                    plate.confidence,
                    license.total_confidence,
                );
                debug!(
                    "candidate {:?}: fused confidence {fused:.3}",
                    license.license
                );
                if fused >= self.overall_confidence {
                    results.push(Recognition {
                        vehicle: vehicle.clone(),
                        plate,
                        license,
                    });
                }
            }
        }

        if results.is_empty() {
            // No plate chain accepted: report the first vehicle on its own.
            results.push(Recognition {
                vehicle: vehicles[0].clone(),
                plate: Plate::default(),
                license: License::default(),
            });
        }

        info!("recognized {} result(s)", results.len());
        results
    }

    /// Draw one result onto a display buffer: vehicle box, plate quad,
    /// keypoints and character boxes, all in the given color. Textual details
    /// are logged instead of rasterized.
    pub fn draw_result(image: &mut RgbImage, result: &Recognition, color: Rgb<u8>) {
        let bb = &result.vehicle.bounding_box;
        if bb.width >= 1.0 && bb.height >= 1.0 {
            draw_hollow_rect_mut(
                image,
                Rect::at(bb.x as i32, bb.y as i32).of_size(bb.width as u32, bb.height as u32),
                color,
            );
        }
        info!(
            "{} ({:.0}%)",
            result.vehicle.vehicle_type.label(),
            result.vehicle.confidence * 100.0
        );

        if result.license.characters.is_empty() {
            return;
        }

        for i in 0..4 {
            let a = result.plate.keypoints[i];
            let b = result.plate.keypoints[(i + 1) % 4];
            draw_line_segment_mut(image, (a.x, a.y), (b.x, b.y), color);
            draw_filled_circle_mut(image, (a.x as i32, a.y as i32), 6, color);
        }

        for character in &result.license.characters {
            let cb = &character.bounding_box;
            if cb.width >= 1.0 && cb.height >= 1.0 {
                draw_hollow_rect_mut(
                    image,
                    Rect::at(cb.x as i32, cb.y as i32).of_size(cb.width as u32, cb.height as u32),
                    color,
                );
            }
        }

        info!(
            "LP: {} Conf: {:.2}%",
            result.license.license,
            result.license.total_confidence * 100.0
        );
    }
}
