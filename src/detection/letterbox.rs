//! Model input preprocessing: aspect-preserving letterbox for the detector
//! stages and plain fixed-aspect resize for the character stage.

use image::{DynamicImage, Rgb, RgbImage, imageops};
use ndarray::{Array, ArrayD, IxDyn};

/// Parameters recorded during preprocessing, needed to map model-frame
/// coordinates back into the source image.
#[derive(Debug, Clone, Copy)]
pub struct PreParams {
    /// Inverse of the resize ratio: multiplying a model-frame length by this
    /// yields a source-frame length.
    pub ratio: f32,
    /// Horizontal padding added on the left (fractional half of the total).
    pub dw: f32,
    /// Vertical padding added on the top (fractional half of the total).
    pub dh: f32,
    /// Source image height in pixels.
    pub height: f32,
    /// Source image width in pixels.
    pub width: f32,
}

/// Letterbox fill color.
const PAD_COLOR: Rgb<u8> = Rgb([114, 114, 114]);

/// Resize `image` into a `target` x `target` square, preserving aspect ratio
/// and padding the remainder with a constant border.
///
/// Padding is split per axis with a floor-biased left/top side and a
/// ceil-biased right/bottom side, so the total is exact for odd differences.
pub fn letterbox(image: &DynamicImage, target: u32) -> (DynamicImage, PreParams) {
    let width = image.width() as f32;
    let height = image.height() as f32;
    let inp = target as f32;

    let r = (inp / height).min(inp / width);
    let pad_w = (width * r).round() as u32;
    let pad_h = (height * r).round() as u32;

    let resized = if pad_w != image.width() || pad_h != image.height() {
        image.resize_exact(pad_w.max(1), pad_h.max(1), imageops::FilterType::Triangle)
    } else {
        image.clone()
    };

    let dw = (inp - pad_w as f32) / 2.0;
    let dh = (inp - pad_h as f32) / 2.0;
    let left = (dw - 0.1).round() as i64;
    let top = (dh - 0.1).round() as i64;

    let mut canvas = RgbImage::from_pixel(target, target, PAD_COLOR);
    imageops::overlay(&mut canvas, &resized.to_rgb8(), left, top);

    (
        DynamicImage::ImageRgb8(canvas),
        PreParams {
            ratio: 1.0 / r,
            dw,
            dh,
            height,
            width,
        },
    )
}

/// Convert an image to a normalized `[1, 3, H, W]` RGB tensor.
pub fn to_input_tensor(image: &DynamicImage) -> ArrayD<f32> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut input = Array::zeros(IxDyn(&[1, 3, height as usize, width as usize]));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
        input[[0, 1, y as usize, x as usize]] = pixel[1] as f32 / 255.0;
        input[[0, 2, y as usize, x as usize]] = pixel[2] as f32 / 255.0;
    }
    input
}

/// Resize to an exact model input size (no letterboxing) and convert to a
/// tensor. Used by the character stage, whose plate crops are already close
/// to the model aspect ratio.
pub fn to_resized_tensor(image: &DynamicImage, width: u32, height: u32) -> ArrayD<f32> {
    let resized = image.resize_exact(width, height, imageops::FilterType::Triangle);
    to_input_tensor(&resized)
}
