//! Detector parameters, loadable from JSON with missing fields defaulted.
//!
//! ```no_run
//! use paperscan::DetectionConfig;
//! use std::path::Path;
//!
//! let config = DetectionConfig::from_json_file(Path::new("paperscan.json"))?;
//! let defaults = DetectionConfig::default();
//! # Ok::<(), paperscan::DetectionError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{DetectionError, Result};

/// Complete detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Longest edge of the working image used for paper segmentation
    pub max_dimension: u32,

    /// Minimum paper contour area as a fraction of the working image area
    pub min_area_ratio: f64,

    /// Paper-colour segmentation parameters
    pub segmentation: SegmentationConfig,

    /// Foreground object extraction parameters
    pub foreground: ForegroundConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1200,
            min_area_ratio: 0.04,
            segmentation: SegmentationConfig::default(),
            foreground: ForegroundConfig::default(),
        }
    }
}

/// Paper-colour segmentation parameters.
///
/// Chroma bounds use the 8-bit HSV scale (saturation and value in `0..=255`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Highest saturation still considered paper
    pub saturation_max: u8,

    /// Lowest value (brightness) still considered paper
    pub value_min: u8,

    /// Gaussian sigma applied to the lightness channel before Otsu
    pub lightness_blur_sigma: f32,

    /// Closing kernel radius (4 = 9×9)
    pub close_radius: u8,
    pub close_iterations: u8,

    /// Boundary smoothing kernel radius (2 = 5×5)
    pub refine_radius: u8,
    pub refine_iterations: u8,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            saturation_max: 80,
            value_min: 150,
            lightness_blur_sigma: 1.1,
            close_radius: 4,
            close_iterations: 2,
            refine_radius: 2,
            refine_iterations: 1,
        }
    }
}

/// Foreground object extraction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForegroundConfig {
    /// Gaussian sigma applied to the grayscale image before Canny
    pub blur_sigma: f32,

    /// Erosion radius that pulls the inner mask away from the paper edge (5 = 11×11)
    pub shrink_radius: u8,

    /// Lower bound of the border margin in pixels
    pub min_border_margin: f32,

    /// Border margin as a fraction of the larger image dimension
    pub border_margin_ratio: f32,

    /// Colour distance from the paper estimate that marks a pixel as foreground
    pub color_threshold: f32,

    pub canny_low: f32,
    pub canny_high: f32,

    /// Dilation radius applied to Canny edges (1 = 3×3)
    pub edge_dilate_radius: u8,

    /// Elliptical closing radius and iterations for the fused mask
    pub close_radius: u8,
    pub close_iterations: u8,

    /// Elliptical opening radius and iterations for the fused mask
    pub open_radius: u8,
    pub open_iterations: u8,

    /// Absolute lower bound for object contour area in pixels
    pub min_object_area: f64,

    /// Lower bound for object contour area as a fraction of paper area
    pub min_object_area_ratio: f64,

    /// Upper bound for object contour area as a fraction of paper area
    pub max_object_area_ratio: f64,

    /// Minimum fraction of an object's bounding box lying on the paper
    pub min_paper_overlap: f64,

    /// Intersection over the smaller box's area above which two detections merge
    pub dedup_overlap_ratio: f64,
}

impl Default for ForegroundConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            shrink_radius: 5,
            min_border_margin: 10.0,
            border_margin_ratio: 0.01,
            color_threshold: 18.0,
            canny_low: 20.0,
            canny_high: 80.0,
            edge_dilate_radius: 1,
            close_radius: 4,
            close_iterations: 2,
            open_radius: 2,
            open_iterations: 1,
            min_object_area: 900.0,
            min_object_area_ratio: 0.004,
            max_object_area_ratio: 0.9,
            min_paper_overlap: 0.6,
            dedup_overlap_ratio: 0.6,
        }
    }
}

impl DetectionConfig {
    /// Load configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| DetectionError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| DetectionError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> String {
        // Plain data with string keys cannot fail to serialize.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Check that parameters are inside their meaningful ranges.
    pub fn validate(&self) -> Result<()> {
        if self.max_dimension == 0 {
            return Err(DetectionError::invalid_parameter("max_dimension", self.max_dimension));
        }
        if !(self.min_area_ratio > 0.0 && self.min_area_ratio < 1.0) {
            return Err(DetectionError::invalid_parameter("min_area_ratio", self.min_area_ratio));
        }
        if self.segmentation.lightness_blur_sigma <= 0.0 {
            return Err(DetectionError::invalid_parameter(
                "segmentation.lightness_blur_sigma",
                self.segmentation.lightness_blur_sigma,
            ));
        }

        let fg = &self.foreground;
        if fg.blur_sigma <= 0.0 {
            return Err(DetectionError::invalid_parameter("foreground.blur_sigma", fg.blur_sigma));
        }
        if fg.canny_low > fg.canny_high {
            return Err(DetectionError::invalid_parameter(
                "foreground.canny_low",
                format!("{} > canny_high {}", fg.canny_low, fg.canny_high),
            ));
        }
        if fg.min_object_area_ratio >= fg.max_object_area_ratio {
            return Err(DetectionError::invalid_parameter(
                "foreground.min_object_area_ratio",
                fg.min_object_area_ratio,
            ));
        }
        for (name, ratio) in [
            ("foreground.min_paper_overlap", fg.min_paper_overlap),
            ("foreground.dedup_overlap_ratio", fg.dedup_overlap_ratio),
            ("foreground.max_object_area_ratio", fg.max_object_area_ratio),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(DetectionError::invalid_parameter(name, ratio));
            }
        }
        Ok(())
    }
}
