#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from paperscan for tests
pub use paperscan::{
    BoundingBox, CornerSet, DetectedObject, DetectionConfig, DetectionError, DetectionResult,
};
