pub mod detection;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod utils;
pub mod validation;

pub use detection::{PlateDetector, PlateRecognizer, VehicleDetector, rectify_plate};
pub use inference::{InferenceBackend, ModelSize, OrtBackend};
pub use models::{
    BoundingBox, Character, Country, License, Plate, Point, Recognition, Vehicle, VehicleType,
};
pub use pipeline::Falpr;
