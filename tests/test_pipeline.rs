//! End-to-end pipeline tests with scripted inference backends.

mod common;

use common::*;
use falpr::detection::{PlateDetector, PlateRecognizer, VehicleDetector};
use falpr::models::VehicleType;
use falpr::pipeline::fuse_confidence;
use falpr::Falpr;

const OVERALL_CONFIDENCE: f32 = 0.6;

/// Plate backend scripted with one plate: an axis-aligned 160x40 quad at
/// (100, 150) in a 384x384 frame, which letterboxes 1:1 into the 384 model.
fn scripted_plate_detector() -> PlateDetector {
    let kps = [(100.0, 150.0), (260.0, 150.0), (260.0, 190.0), (100.0, 190.0)];
    let row = plate_row(180.0, 170.0, 160.0, 40.0, 0.9, kps);
    let tensor = channel_major_tensor(&[row], 17, 32);
    PlateDetector::new(Box::new(FixedBackend::new(vec![tensor])), 384)
}

/// Recognizer backend scripted with the characters of `license`, laid out
/// left to right in the 576x128 model frame but delivered in shuffled row
/// order.
fn scripted_recognizer(license: &str) -> PlateRecognizer {
    let mut rows: Vec<Vec<f32>> = license
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let cx = 40.0 + 65.0 * i as f32;
            char_row(cx, 64.0, 50.0, 80.0, char_class_id(c), 0.9)
        })
        .collect();
    rows.reverse(); // detection order must not matter
    let tensor = channel_major_tensor(&rows, 40, 64);
    PlateRecognizer::new(Box::new(FixedBackend::new(vec![tensor])), 0.75)
}

#[test]
fn recognizes_grammar_valid_plate_end_to_end() {
    // no vehicles detected: the sentinel full-frame vehicle keeps the
    // pipeline alive
    let falpr = Falpr::new(
        VehicleDetector::new(Box::new(EmptyBackend), 320),
        scripted_plate_detector(),
        scripted_recognizer("01A123BC"),
        OVERALL_CONFIDENCE,
    );

    let image = gradient_image(384, 384);
    let results = falpr.recognize(&image);

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.license.license, "01A123BC");
    assert_eq!(result.license.characters.len(), 8);
    assert!((result.license.total_confidence - 0.9).abs() < 1e-4);

    let fused = fuse_confidence(
        result.vehicle.confidence,
        result.plate.confidence,
        result.license.total_confidence,
    );
    assert!(fused >= OVERALL_CONFIDENCE);

    // characters concatenate in ascending-x order
    let xs: Vec<f32> = result
        .license
        .characters
        .iter()
        .map(|c| c.bounding_box.x)
        .collect();
    assert!(xs.windows(2).all(|w| w[0] < w[1]));

    // plate keypoints rebased into original-image coordinates (sentinel
    // vehicle origin is 0,0 here)
    assert_eq!(result.plate.keypoints[0].x, 100.0);
    assert_eq!(result.plate.keypoints[0].y, 150.0);

    // character boxes rebased by the first plate keypoint
    assert!(result.license.characters[0].bounding_box.x >= 100.0);
    assert!(result.license.characters[0].bounding_box.y >= 150.0);
}

#[test]
fn grammar_invalid_string_reverts_to_empty_license() {
    let falpr = Falpr::new(
        VehicleDetector::new(Box::new(EmptyBackend), 320),
        scripted_plate_detector(),
        scripted_recognizer("0123456"), // wrong shape, fails validation
        OVERALL_CONFIDENCE,
    );

    let results = falpr.recognize(&gradient_image(384, 384));

    // the chain is rejected, leaving only the fallback result
    assert_eq!(results.len(), 1);
    assert!(results[0].license.characters.is_empty());
    assert!(results[0].license.license.is_empty());
}

#[test]
fn blank_image_returns_sentinel_vehicle() {
    let falpr = Falpr::new(
        VehicleDetector::new(Box::new(EmptyBackend), 320),
        PlateDetector::new(Box::new(EmptyBackend), 384),
        PlateRecognizer::new(Box::new(EmptyBackend), 0.75),
        OVERALL_CONFIDENCE,
    );

    let results = falpr.recognize(&gradient_image(200, 120));

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert!(result.license.characters.is_empty());
    assert_eq!(result.vehicle.vehicle_type, VehicleType::Car);
    assert_eq!(result.vehicle.confidence, 1.0);
    assert_eq!(result.vehicle.bounding_box.width, 200.0);
    assert_eq!(result.vehicle.bounding_box.height, 120.0);
}

#[test]
fn backend_failure_degrades_to_fallback_result() {
    let falpr = Falpr::new(
        VehicleDetector::new(Box::new(FailingBackend), 320),
        PlateDetector::new(Box::new(FailingBackend), 384),
        PlateRecognizer::new(Box::new(FailingBackend), 0.75),
        OVERALL_CONFIDENCE,
    );

    let results = falpr.recognize(&gradient_image(100, 100));
    assert_eq!(results.len(), 1);
    assert!(results[0].license.characters.is_empty());
}

#[test]
fn detected_vehicle_scopes_plate_search_to_its_crop() {
    // one car covering the right half of a 768x384 image; the plate backend
    // reports keypoints in vehicle-crop coordinates, which must be rebased
    // by the vehicle origin
    let vehicle_tensor = channel_major_tensor(
        &[vehicle_row(240.0, 160.0, 160.0, 160.0, 1, 0.95)],
        9,
        32,
    );
    let falpr = Falpr::new(
        VehicleDetector::new(Box::new(FixedBackend::new(vec![vehicle_tensor])), 320),
        scripted_plate_detector(),
        scripted_recognizer("01A123BC"),
        OVERALL_CONFIDENCE,
    );

    // 768x384 letterboxes into 320 with ratio 320/768 and 80px vertical
    // padding: the model-frame box above maps to (384, 0)..(768, 384)
    let results = falpr.recognize(&gradient_image(768, 384));

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.vehicle.vehicle_type, VehicleType::Car);
    assert_eq!(result.license.license, "01A123BC");

    // plate keypoints moved from crop frame into original-image frame
    assert_eq!(result.plate.keypoints[0].x, 384.0 + 100.0);
    assert_eq!(result.plate.keypoints[0].y, 150.0);
}

#[test]
fn confidence_fusion_weights_license_most() {
    let fused = fuse_confidence(1.0, 1.0, 0.9);
    assert!((fused - 0.91).abs() < 1e-6);
}
