//! Geometry and image utilities shared across the pipeline stages.

use image::{DynamicImage, GenericImageView};

use crate::models::{BoundingBox, Point};

/// Restrict `val` to the closed range `[min, max]`.
pub fn clamp(val: f32, min: f32, max: f32) -> f32 {
    if val > min {
        if val < max { val } else { max }
    } else {
        min
    }
}

/// Per-axis minimum of a point set. The minima may come from different points.
///
/// Panics on an empty point set; callers always pass plate keypoint sets.
pub fn min_xy(points: &[Point]) -> (f32, f32) {
    assert!(!points.is_empty(), "min_xy requires a non-empty point set");
    let min_x = points.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
    let min_y = points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    (min_x, min_y)
}

/// Per-axis maximum of a point set. The maxima may come from different points.
///
/// Panics on an empty point set; callers always pass plate keypoint sets.
pub fn max_xy(points: &[Point]) -> (f32, f32) {
    assert!(!points.is_empty(), "max_xy requires a non-empty point set");
    let max_x = points.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
    let max_y = points.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
    (max_x, max_y)
}

/// Arithmetic mean of a 4-point keypoint set.
pub fn center(points: &[Point; 4]) -> Point {
    let sum_x: f32 = points.iter().map(|p| p.x).sum();
    let sum_y: f32 = points.iter().map(|p| p.y).sum();
    Point::new(sum_x / 4.0, sum_y / 4.0)
}

/// Sort four quad corners into canonical top-left, top-right, bottom-right,
/// bottom-left order.
///
/// Detector keypoint order is not trusted: the top-left corner minimizes
/// x + y, the bottom-right maximizes it, and the top-right/bottom-left
/// corners minimize/maximize y - x.
pub fn order_quad(points: [Point; 4]) -> [Point; 4] {
    let by_sum = |p: &Point| p.x + p.y;
    let by_diff = |p: &Point| p.y - p.x;

    let tl = points
        .iter()
        .min_by(|a, b| by_sum(a).total_cmp(&by_sum(b)))
        .copied()
        .unwrap_or_default();
    let br = points
        .iter()
        .max_by(|a, b| by_sum(a).total_cmp(&by_sum(b)))
        .copied()
        .unwrap_or_default();
    let tr = points
        .iter()
        .min_by(|a, b| by_diff(a).total_cmp(&by_diff(b)))
        .copied()
        .unwrap_or_default();
    let bl = points
        .iter()
        .max_by(|a, b| by_diff(a).total_cmp(&by_diff(b)))
        .copied()
        .unwrap_or_default();

    [tl, tr, br, bl]
}

/// Crop `frame` to the intersection of `rect` and the frame bounds.
///
/// Out-of-bounds rects are clamped rather than rejected; `None` is returned
/// only when the intersection has no area.
pub fn crop_frame(frame: &DynamicImage, rect: &BoundingBox) -> Option<DynamicImage> {
    let (fw, fh) = frame.dimensions();

    let x0 = rect.x.max(0.0);
    let y0 = rect.y.max(0.0);
    let x1 = rect.right().min(fw as f32);
    let y1 = rect.bottom().min(fh as f32);

    if x1 - x0 < 1.0 || y1 - y0 < 1.0 {
        return None;
    }

    Some(frame.crop_imm(
        x0 as u32,
        y0 as u32,
        (x1 - x0) as u32,
        (y1 - y0) as u32,
    ))
}

/// Linear contrast stretch derived from the grayscale histogram.
///
/// With `clip_hist_percent == 0` the full min/max grayscale range is used;
/// otherwise that percentage of pixels is clipped off the histogram, half
/// from each tail, before computing the stretch. The alpha channel, if any,
/// is preserved. Run once on each rectified plate before recognition.
pub fn auto_brightness(src: &DynamicImage, clip_hist_percent: f32) -> DynamicImage {
    let gray = src.to_luma8();
    if gray.is_empty() {
        return src.clone();
    }

    let (min_gray, max_gray) = if clip_hist_percent as i32 == 0 {
        let mut min = 255u32;
        let mut max = 0u32;
        for p in gray.pixels() {
            min = min.min(p[0] as u32);
            max = max.max(p[0] as u32);
        }
        (min, max)
    } else {
        let mut hist = [0u64; 256];
        for p in gray.pixels() {
            hist[p[0] as usize] += 1;
        }
        let mut accumulator = [0u64; 256];
        let mut running = 0u64;
        for (i, count) in hist.iter().enumerate() {
            running += count;
            accumulator[i] = running;
        }

        let total = accumulator[255] as f32;
        // half of the clipped mass is removed from each tail
        let clip = total * clip_hist_percent / 100.0 / 2.0;

        let mut min = 0usize;
        while min < 255 && (accumulator[min] as f32) < clip {
            min += 1;
        }
        let mut max = 255usize;
        while max > 0 && accumulator[max] as f32 >= total - clip {
            max -= 1;
        }
        (min as u32, max as u32)
    };

    if max_gray <= min_gray {
        // solid-color input, nothing to stretch
        return src.clone();
    }

    let input_range = (max_gray - min_gray) as f32;
    let alpha = 255.0 / input_range;
    let beta = -(min_gray as f32) * alpha;
    let stretch = |v: u8| (v as f32 * alpha + beta).round().clamp(0.0, 255.0) as u8;

    match src {
        DynamicImage::ImageLuma8(img) => {
            let mut out = img.clone();
            for p in out.pixels_mut() {
                p[0] = stretch(p[0]);
            }
            DynamicImage::ImageLuma8(out)
        }
        src if src.color().has_alpha() => {
            let mut out = src.to_rgba8();
            for p in out.pixels_mut() {
                p[0] = stretch(p[0]);
                p[1] = stretch(p[1]);
                p[2] = stretch(p[2]);
            }
            DynamicImage::ImageRgba8(out)
        }
        src => {
            let mut out = src.to_rgb8();
            for p in out.pixels_mut() {
                p[0] = stretch(p[0]);
                p[1] = stretch(p[1]);
                p[2] = stretch(p[2]);
            }
            DynamicImage::ImageRgb8(out)
        }
    }
}
