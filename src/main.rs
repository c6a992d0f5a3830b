use clap::Parser;
use image::{ImageReader, Rgb};
use std::path::PathBuf;

use falpr::{Falpr, ModelSize};

#[derive(Parser)]
#[command(name = "falpr")]
#[command(about = "Detect vehicles and read their license plates from images")]
struct Cli {
    /// Path to input image file
    #[arg(value_name = "IMAGE")]
    image_path: PathBuf,

    /// Directory containing the ONNX models
    #[arg(short, long, value_name = "DIR", default_value = "models")]
    model_dir: PathBuf,

    /// Detector model size: nano, small, medium, big or large
    #[arg(short, long, default_value = "medium")]
    size: String,

    /// Per-character score threshold
    #[arg(long, default_value_t = 0.75)]
    char_confidence: f32,

    /// Overall fused-confidence acceptance threshold
    #[arg(long, default_value_t = 0.6)]
    overall_confidence: f32,

    /// Where to save the annotated image
    #[arg(short, long, value_name = "FILE", default_value = "result.png")]
    output: PathBuf,
}

const PALETTE: [Rgb<u8>; 4] = [
    Rgb([0, 200, 0]),
    Rgb([220, 120, 0]),
    Rgb([0, 120, 220]),
    Rgb([200, 0, 120]),
];

fn parse_size(s: &str) -> anyhow::Result<ModelSize> {
    match s.to_ascii_lowercase().as_str() {
        "nano" => Ok(ModelSize::Nano),
        "small" => Ok(ModelSize::Small),
        "medium" => Ok(ModelSize::Medium),
        "big" => Ok(ModelSize::Big),
        "large" => Ok(ModelSize::Large),
        other => anyhow::bail!("unknown model size: {}", other),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::parse();

    let img = ImageReader::open(&args.image_path)?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;

    let falpr = Falpr::from_model_dir(
        &args.model_dir,
        parse_size(&args.size)?,
        args.char_confidence,
        args.overall_confidence,
    )?;

    let results = falpr.recognize(&img);

    let mut canvas = img.to_rgb8();
    for (i, result) in results.iter().enumerate() {
        if result.license.characters.is_empty() {
            println!(
                "{} ({:.0}%): no license plate",
                result.vehicle.vehicle_type.label(),
                result.vehicle.confidence * 100.0
            );
        } else {
            println!(
                "{} ({:.0}%): LP {} Conf: {:.2}%",
                result.vehicle.vehicle_type.label(),
                result.vehicle.confidence * 100.0,
                result.license.license,
                result.license.total_confidence * 100.0
            );
        }
        Falpr::draw_result(&mut canvas, result, PALETTE[i % PALETTE.len()]);
    }

    canvas
        .save(&args.output)
        .map_err(|e| anyhow::anyhow!("Failed to save annotated image: {}", e))?;
    println!("Annotated image saved to {:?}", args.output);

    Ok(())
}
