//! Plate detection and rectification.

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::geometric_transformations::Projection;
use log::{debug, warn};

use crate::detection::decoder::{self, CoordMap, DecodeParams, Scoring};
use crate::detection::letterbox;
use crate::inference::InferenceBackend;
use crate::models::{Plate, Point};
use crate::utils;

const SCORE_THRESHOLD: f32 = 0.4;
const NMS_THRESHOLD: f32 = 0.5;

/// Outset applied to each corner before the perspective transform, so the
/// warp does not clip the plate border.
const CORNER_OUTSET: f32 = 3.0;

/// Brightness-normalization clip percent applied to the rectified plate.
const BRIGHTNESS_CLIP_PERCENT: f32 = 20.0;

/// Detects license plate keypoints inside a vehicle crop.
pub struct PlateDetector {
    backend: Box<dyn InferenceBackend>,
    resolution: u32,
}

impl PlateDetector {
    pub fn new(backend: Box<dyn InferenceBackend>, resolution: u32) -> Self {
        Self {
            backend,
            resolution,
        }
    }

    /// Detect plates, returning keypoints in the coordinates of `image`.
    ///
    /// Empty input, empty model output and backend failures all degrade to an
    /// empty list.
    pub fn detect(&self, image: &DynamicImage) -> Vec<Plate> {
        if image.width() == 0 || image.height() == 0 {
            return Vec::new();
        }

        let (padded, pre_params) = letterbox::letterbox(image, self.resolution);
        let input = letterbox::to_input_tensor(&padded);

        let outputs = match self.backend.forward(input) {
            Ok(outputs) => outputs,
            Err(e) => {
                warn!("plate inference failed: {e:#}");
                return Vec::new();
            }
        };
        let Some(output) = outputs.first() else {
            return Vec::new();
        };

        let params = DecodeParams {
            score_threshold: SCORE_THRESHOLD,
            iou_threshold: NMS_THRESHOLD,
            scoring: Scoring::Objectness,
            keypoints: 4,
        };
        let map = CoordMap::from_letterbox(&pre_params);

        let plates: Vec<Plate> = decoder::decode(output, &params, &map)
            .into_iter()
            .filter_map(|d| {
                let keypoints: [Point; 4] = d.keypoints.try_into().ok()?;
                Some(Plate {
                    confidence: d.score,
                    keypoints,
                })
            })
            .collect();

        debug!("plate stage: {} detections", plates.len());
        plates
    }
}

/// Crop a detected plate out of its vehicle crop and rectify it into a
/// frontal view ready for character recognition.
///
/// Returns `None` for geometrically degenerate candidates (empty keypoint
/// bounding box, zero-sized destination rectangle, non-invertible transform).
pub fn rectify_plate(image: &DynamicImage, plate: &Plate) -> Option<DynamicImage> {
    if image.width() == 0 || image.height() == 0 {
        return None;
    }

    // Keypoint order from the detector is not trusted.
    let quad = utils::order_quad(plate.keypoints);

    let (min_x, min_y) = utils::min_xy(&quad);
    let (max_x, max_y) = utils::max_xy(&quad);
    let crop = utils::crop_frame(
        image,
        &crate::models::BoundingBox::new(min_x, min_y, max_x - min_x, max_y - min_y),
    )?;

    // Rebase keypoints into crop-local coordinates. crop_frame clamps the
    // origin to the frame, so use the clamped origin here.
    let origin_x = min_x.max(0.0);
    let origin_y = min_y.max(0.0);
    let local: Vec<Point> = quad
        .iter()
        .map(|p| p.translate(-origin_x, -origin_y))
        .collect();

    // Destination size is the larger of the two parallel-edge estimates, so
    // perspective foreshortening never under-sizes the output.
    let sq = |a: &Point, b: &Point| (a.x - b.x).powi(2) + (a.y - b.y).powi(2);
    let width = sq(&quad[0], &quad[1]).max(sq(&quad[2], &quad[3])).sqrt() as u32;
    let height = sq(&quad[0], &quad[3]).max(sq(&quad[1], &quad[2])).sqrt() as u32;
    if width == 0 || height == 0 {
        return None;
    }

    let src = [
        (local[0].x - CORNER_OUTSET, local[0].y - CORNER_OUTSET),
        (local[1].x + CORNER_OUTSET, local[1].y - CORNER_OUTSET),
        (local[2].x + CORNER_OUTSET, local[2].y + CORNER_OUTSET),
        (local[3].x - CORNER_OUTSET, local[3].y + CORNER_OUTSET),
    ];
    let dst = [
        (0.0, 0.0),
        (width as f32, 0.0),
        (width as f32, height as f32),
        (0.0, height as f32),
    ];

    // Maps destination pixels back onto the source quad.
    let projection = Projection::from_control_points(dst, src)?;
    let warped = warp_replicate(&crop.to_rgb8(), &projection, width, height);

    Some(utils::auto_brightness(
        &DynamicImage::ImageRgb8(warped),
        BRIGHTNESS_CLIP_PERCENT,
    ))
}

/// Inverse-mapped perspective warp with bilinear sampling and edge-replicate
/// border handling, which `imageproc::geometric_transformations::warp` does
/// not offer.
fn warp_replicate(src: &RgbImage, dst_to_src: &Projection, width: u32, height: u32) -> RgbImage {
    let mut out = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let (sx, sy) = *dst_to_src * (x as f32, y as f32);
            out.put_pixel(x, y, sample_replicate(src, sx, sy));
        }
    }
    out
}

fn sample_replicate(src: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (w, h) = src.dimensions();
    let x = x.clamp(0.0, w as f32 - 1.0);
    let y = y.clamp(0.0, h as f32 - 1.0);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = src.get_pixel(x0, y0);
    let p10 = src.get_pixel(x1, y0);
    let p01 = src.get_pixel(x0, y1);
    let p11 = src.get_pixel(x1, y1);

    let mut blended = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        blended[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(blended)
}
