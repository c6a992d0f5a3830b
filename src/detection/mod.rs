//! Detection stages: vehicle boxes, plate keypoints and plate characters,
//! all decoded from raw model outputs by a shared decoder.

pub mod decoder;
pub mod letterbox;
pub mod plate;
pub mod recognizer;
pub mod vehicle;

pub use plate::{PlateDetector, rectify_plate};
pub use recognizer::PlateRecognizer;
pub use vehicle::VehicleDetector;
