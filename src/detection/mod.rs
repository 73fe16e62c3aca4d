pub mod preprocessing;
pub mod segmentation;
pub mod contours;
pub mod quad;
pub mod corners;
pub mod foreground;
pub mod dedup;

use image::RgbImage;
use imageproc::point::Point;
use tracing::{debug, info};

use crate::config::DetectionConfig;
use crate::models::DetectionResult;
use crate::Result;

/// Main detection pipeline orchestrator
#[derive(Debug, Clone, Default)]
pub struct PaperDetector {
    pub config: DetectionConfig,
}

impl PaperDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DetectionConfig) -> Self {
        Self { config }
    }

    /// Run the full detection pipeline on an image.
    ///
    /// Returns `Ok(None)` when no paper-like region qualifies; errors only
    /// for invalid configuration.
    pub fn detect(&self, img: &RgbImage) -> Result<Option<DetectionResult>> {
        self.config.validate()?;
        let config = &self.config;

        // Step 1: Work at a bounded resolution
        let (working, scale) = preprocessing::resize_for_processing(img, config.max_dimension);
        debug!(
            width = img.width(),
            height = img.height(),
            working_width = working.width(),
            working_height = working.height(),
            scale,
            "working image prepared"
        );

        // Step 2: Segment paper-coloured pixels
        let segmentation = segmentation::segment_paper(&working, &config.segmentation);

        // Step 3: Pick the paper quadrilateral
        let Some(quad) = quad::find_paper_quad(&segmentation.mask, config.min_area_ratio) else {
            info!("no paper-like region detected");
            return Ok(None);
        };

        // Step 4: Back to original coordinates, canonical order
        let scale = if scale > 0.0 { scale } else { 1.0 };
        let original: Vec<Point<f32>> = quad
            .corners
            .iter()
            .map(|p| Point::new(p.x / scale, p.y / scale))
            .collect();
        let corners = corners::order_corners(&original)?;

        // Step 5: Objects resting on the paper, at full resolution
        let objects = foreground::find_objects(img, &corners, &config.foreground);

        info!(
            corners = ?corners.points(),
            objects = objects.len(),
            "paper detected"
        );

        Ok(Some(DetectionResult {
            corners,
            mask: segmentation.mask,
            debug_images: segmentation.debug_images,
            objects,
        }))
    }
}

/// Detect the paper sheet and the objects on it with default thresholds.
pub fn detect(img: &RgbImage, max_dimension: u32, min_area_ratio: f64) -> Result<Option<DetectionResult>> {
    let config = DetectionConfig {
        max_dimension,
        min_area_ratio,
        ..DetectionConfig::default()
    };
    PaperDetector::with_config(config).detect(img)
}
