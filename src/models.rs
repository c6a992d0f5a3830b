//! Core data model for the recognition pipeline.
//!
//! Coordinates are always pixel coordinates in *some* frame (model input,
//! vehicle crop, plate crop, or original image). Rebasing between frames is
//! done through the named `translate`/`rebase` operations below, never by
//! poking at fields from the outside.

/// 2D point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Move this point into another coordinate frame by adding the frame origin.
    pub fn translate(self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Axis-aligned rectangle in pixel coordinates of a caller-tracked frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Move this box into another coordinate frame by adding the frame origin.
    pub fn translate(self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    /// Intersection over union of two boxes. Zero when they do not overlap.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        let intersection = if x2 > x1 && y2 > y1 {
            (x2 - x1) * (y2 - y1)
        } else {
            0.0
        };

        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// Vehicle classes, in model class-id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleType {
    Bus = 0,
    Car,
    Motor,
    Truck,
    Van,
}

impl VehicleType {
    pub fn from_class_id(id: usize) -> Option<Self> {
        match id {
            0 => Some(Self::Bus),
            1 => Some(Self::Car),
            2 => Some(Self::Motor),
            3 => Some(Self::Truck),
            4 => Some(Self::Van),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Bus => "Bus",
            Self::Car => "Car",
            Self::Motor => "Motor",
            Self::Truck => "Truck",
            Self::Van => "Van",
        }
    }
}

/// One detected vehicle, with its bounding box in original-image coordinates.
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub vehicle_type: VehicleType,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}

/// One detected license plate.
///
/// Keypoints are ordered top-left, top-right, bottom-right, bottom-left. They
/// start out in vehicle-crop coordinates and are rebased to original-image
/// coordinates by the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct Plate {
    pub confidence: f32,
    pub keypoints: [Point; 4],
}

impl Plate {
    /// Rebase the keypoints by adding a frame origin offset.
    pub fn rebase(&mut self, dx: f32, dy: f32) {
        for kp in &mut self.keypoints {
            *kp = kp.translate(dx, dy);
        }
    }
}

/// A single recognized plate character.
#[derive(Debug, Clone)]
pub struct Character {
    pub label: char,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}

impl Character {
    /// Rebase the bounding box by adding a frame origin offset.
    pub fn rebase(&mut self, dx: f32, dy: f32) {
        self.bounding_box = self.bounding_box.translate(dx, dy);
    }
}

/// Plate grammar country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Country {
    #[default]
    Uz,
}

/// A recognized license string with its characters.
///
/// An empty `characters` sequence means nothing was recognized. When
/// `characters` is non-empty, `license` has already passed grammar validation.
#[derive(Debug, Clone, Default)]
pub struct License {
    pub country: Country,
    pub total_confidence: f32,
    pub license: String,
    pub characters: Vec<Character>,
}

/// One accepted detection chain: vehicle, plate and license.
#[derive(Debug, Clone)]
pub struct Recognition {
    pub vehicle: Vehicle,
    pub plate: Plate,
    pub license: License,
}
