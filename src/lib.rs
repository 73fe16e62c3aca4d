pub mod config;
pub mod debug;
pub mod detection;
pub mod error;
pub mod models;
pub mod overlay;
pub mod runner;

pub use config::{DetectionConfig, ForegroundConfig, SegmentationConfig};
pub use detection::{detect, PaperDetector};
pub use error::{DetectionError, Result};
pub use models::{BoundingBox, CornerSet, DetectedObject, DetectionResult};
pub use overlay::{add_timestamp_label, render_overlay, OverlayStyle};
