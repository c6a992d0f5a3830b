//! Layout-agnostic decoding of raw detector output tensors.
//!
//! A raw output encodes, per candidate row: 4 center-box parameters, either a
//! single objectness score or one score per class, and optionally a run of
//! keypoint triples. The decoder filters rows by score, maps coordinates back
//! into the source frame and runs greedy IoU suppression. It is a pure
//! function of the tensor and the preprocessing parameters.

use ndarray::ArrayD;

use crate::detection::letterbox::PreParams;
use crate::models::{BoundingBox, Point};
use crate::utils::clamp;

/// How a candidate row is scored.
#[derive(Debug, Clone, Copy)]
pub enum Scoring {
    /// One class-agnostic objectness score at field 4.
    Objectness,
    /// `classes` per-class scores starting at field 4; the row score is the
    /// maximum and the winning index becomes the class id.
    ClassMax { classes: usize },
}

/// Stage-specific decoding parameters.
#[derive(Debug, Clone, Copy)]
pub struct DecodeParams {
    pub score_threshold: f32,
    pub iou_threshold: f32,
    pub scoring: Scoring,
    /// Number of (x, y, score) keypoint triples following the score fields.
    pub keypoints: usize,
}

/// One decoded, suppression-surviving candidate.
#[derive(Debug, Clone)]
pub struct RawDetection {
    pub bounding_box: BoundingBox,
    pub score: f32,
    pub class_id: usize,
    pub keypoints: Vec<Point>,
}

/// Mapping from model-input coordinates back to the source frame.
#[derive(Debug, Clone, Copy)]
pub struct CoordMap {
    pub scale_x: f32,
    pub scale_y: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub width: f32,
    pub height: f32,
}

impl CoordMap {
    /// Undo letterbox preprocessing: subtract padding, scale by the inverse
    /// resize ratio.
    pub fn from_letterbox(pp: &PreParams) -> Self {
        Self {
            scale_x: pp.ratio,
            scale_y: pp.ratio,
            pad_x: pp.dw,
            pad_y: pp.dh,
            width: pp.width,
            height: pp.height,
        }
    }

    /// Undo a plain (possibly non-uniform) resize with no padding.
    pub fn plain(src_width: f32, src_height: f32, model_width: f32, model_height: f32) -> Self {
        Self {
            scale_x: src_width / model_width,
            scale_y: src_height / model_height,
            pad_x: 0.0,
            pad_y: 0.0,
            width: src_width,
            height: src_height,
        }
    }

    fn map_x(&self, x: f32) -> f32 {
        clamp((x - self.pad_x) * self.scale_x, 0.0, self.width)
    }

    fn map_y(&self, y: f32) -> f32 {
        clamp((y - self.pad_y) * self.scale_y, 0.0, self.height)
    }
}

/// Row-major view over a candidate tensor, transposing channel-major layouts.
///
/// After squeezing unit dimensions the tensor is `[rows, dims]` or
/// `[dims, rows]`; rows always outnumber the per-row dimensions, so the
/// larger axis is taken as the row axis.
struct RowView {
    data: Vec<f32>,
    rows: usize,
    dims: usize,
    transposed: bool,
}

impl RowView {
    fn new(output: &ArrayD<f32>) -> Option<Self> {
        let shape: Vec<usize> = output
            .shape()
            .iter()
            .copied()
            .filter(|&d| d != 1)
            .collect();
        if shape.len() != 2 {
            return None;
        }

        let (a, b) = (shape[0], shape[1]);
        let transposed = b > a;
        let (rows, dims) = if transposed { (b, a) } else { (a, b) };

        Some(Self {
            data: output.iter().copied().collect(),
            rows,
            dims,
            transposed,
        })
    }

    fn field(&self, row: usize, field: usize) -> f32 {
        if self.transposed {
            self.data[field * self.rows + row]
        } else {
            self.data[row * self.dims + field]
        }
    }
}

/// Decode one raw output tensor into suppression-filtered detections.
///
/// Empty or malformed tensors yield an empty list, never an error.
pub fn decode(output: &ArrayD<f32>, params: &DecodeParams, map: &CoordMap) -> Vec<RawDetection> {
    let Some(view) = RowView::new(output) else {
        return Vec::new();
    };

    let score_fields = match params.scoring {
        Scoring::Objectness => 1,
        Scoring::ClassMax { classes } => classes,
    };
    if view.dims < 4 + score_fields + 3 * params.keypoints {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    for row in 0..view.rows {
        let (score, class_id) = match params.scoring {
            Scoring::Objectness => (view.field(row, 4), 0),
            Scoring::ClassMax { classes } => {
                let mut best = f32::NEG_INFINITY;
                let mut best_id = 0;
                for c in 0..classes {
                    let s = view.field(row, 4 + c);
                    if s > best {
                        best = s;
                        best_id = c;
                    }
                }
                (best, best_id)
            }
        };

        if score <= params.score_threshold {
            continue;
        }

        let cx = view.field(row, 0);
        let cy = view.field(row, 1);
        let w = view.field(row, 2);
        let h = view.field(row, 3);

        let x0 = map.map_x(cx - 0.5 * w);
        let y0 = map.map_y(cy - 0.5 * h);
        let x1 = map.map_x(cx + 0.5 * w);
        let y1 = map.map_y(cy + 0.5 * h);

        let kp_base = 4 + score_fields;
        let keypoints = (0..params.keypoints)
            .map(|k| {
                Point::new(
                    map.map_x(view.field(row, kp_base + 3 * k)),
                    map.map_y(view.field(row, kp_base + 3 * k + 1)),
                )
            })
            .collect();

        candidates.push(RawDetection {
            bounding_box: BoundingBox::new(x0, y0, x1 - x0, y1 - y0),
            score,
            class_id,
            keypoints,
        });
    }

    nms(candidates, params.iou_threshold)
}

/// Greedy class-agnostic non-maximum suppression: sort by score descending,
/// keep a box only if its IoU with every kept box stays below the threshold.
pub fn nms(mut candidates: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<RawDetection> = Vec::new();
    for candidate in candidates {
        let overlaps = keep
            .iter()
            .any(|k| k.bounding_box.iou(&candidate.bounding_box) >= iou_threshold);
        if !overlaps {
            keep.push(candidate);
        }
    }
    keep
}
