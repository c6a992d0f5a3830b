//! Shared helpers for the integration tests: scripted inference backends and
//! raw output tensor builders.

#![allow(dead_code)]

use anyhow::{Result, bail};
use image::{DynamicImage, Rgb, RgbImage};
use ndarray::{ArrayD, IxDyn};

use falpr::InferenceBackend;

/// Backend that returns the same output tensors on every call.
pub struct FixedBackend {
    outputs: Vec<ArrayD<f32>>,
}

impl FixedBackend {
    pub fn new(outputs: Vec<ArrayD<f32>>) -> Self {
        Self { outputs }
    }
}

impl InferenceBackend for FixedBackend {
    fn forward(&self, _input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>> {
        Ok(self.outputs.clone())
    }
}

/// Backend that produces no output tensors at all.
pub struct EmptyBackend;

impl InferenceBackend for EmptyBackend {
    fn forward(&self, _input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>> {
        Ok(Vec::new())
    }
}

/// Backend whose inference always fails.
pub struct FailingBackend;

impl InferenceBackend for FailingBackend {
    fn forward(&self, _input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>> {
        bail!("scripted inference failure")
    }
}

/// Build a channel-major `[1, dims, rows]` output tensor from candidate
/// rows, zero-padding up to `total_rows` (zero rows score 0 and are
/// rejected by any positive threshold).
pub fn channel_major_tensor(rows: &[Vec<f32>], dims: usize, total_rows: usize) -> ArrayD<f32> {
    assert!(rows.len() <= total_rows);
    let mut data = vec![0.0f32; dims * total_rows];
    for (r, row) in rows.iter().enumerate() {
        assert_eq!(row.len(), dims);
        for (f, v) in row.iter().enumerate() {
            data[f * total_rows + r] = *v;
        }
    }
    ArrayD::from_shape_vec(IxDyn(&[1, dims, total_rows]), data).expect("tensor shape")
}

/// Build a row-major `[1, rows, dims]` output tensor from candidate rows,
/// zero-padding up to `total_rows`.
pub fn row_major_tensor(rows: &[Vec<f32>], dims: usize, total_rows: usize) -> ArrayD<f32> {
    assert!(rows.len() <= total_rows);
    let mut data = vec![0.0f32; dims * total_rows];
    for (r, row) in rows.iter().enumerate() {
        assert_eq!(row.len(), dims);
        data[r * dims..r * dims + dims].copy_from_slice(row);
    }
    ArrayD::from_shape_vec(IxDyn(&[1, total_rows, dims]), data).expect("tensor shape")
}

/// Plate-stage row: center box, objectness score, four keypoint triples.
pub fn plate_row(cx: f32, cy: f32, w: f32, h: f32, score: f32, kps: [(f32, f32); 4]) -> Vec<f32> {
    let mut row = vec![cx, cy, w, h, score];
    for (x, y) in kps {
        row.extend_from_slice(&[x, y, 1.0]);
    }
    row
}

/// Vehicle-stage row: center box plus five class scores.
pub fn vehicle_row(cx: f32, cy: f32, w: f32, h: f32, class_id: usize, score: f32) -> Vec<f32> {
    let mut row = vec![cx, cy, w, h, 0.0, 0.0, 0.0, 0.0, 0.0];
    row[4 + class_id] = score;
    row
}

/// Character-stage row: center box plus 36 class scores.
pub fn char_row(cx: f32, cy: f32, w: f32, h: f32, class_id: usize, score: f32) -> Vec<f32> {
    let mut row = vec![0.0f32; 4 + 36];
    row[0] = cx;
    row[1] = cy;
    row[2] = w;
    row[3] = h;
    row[4 + class_id] = score;
    row
}

/// Class id of a plate character in the recognizer's class list.
pub fn char_class_id(c: char) -> usize {
    match c {
        '0'..='9' => c as usize - '0' as usize,
        'A'..='Z' => 10 + c as usize - 'A' as usize,
        _ => panic!("not a plate character: {c}"),
    }
}

/// A horizontally graded test image, so brightness normalization has a
/// non-degenerate histogram to work with.
pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, _y| {
        let v = (x * 255 / width.max(1)) as u8;
        Rgb([v, v, v])
    });
    DynamicImage::ImageRgb8(img)
}
