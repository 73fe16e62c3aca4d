use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::{euclidean_squared_distance_transform, Norm};
use imageproc::geometry::convex_hull;
use imageproc::point::Point;
use tracing::{debug, warn};

use crate::config::ForegroundConfig;
use crate::detection::contours::{fill_polygon, fill_polygon_local, find_external_contours, polygon_area};
use crate::detection::dedup::dedup_objects;
use crate::detection::preprocessing::{
    apply_blur, close_mask, count_nonzero, detect_edges, dilate_mask, erode_mask, mask_and, mask_or,
    open_mask, to_grayscale,
};
use crate::models::{BoundingBox, CornerSet, DetectedObject};

/// Filled paper polygon at full resolution
pub fn paper_mask(width: u32, height: u32, corners: &CornerSet) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    fill_polygon(&mut mask, &corners.to_pixels());
    mask
}

/// Paper mask pulled away from its edge; falls back to the unshrunk mask if erosion empties it
pub fn inner_mask(paper: &GrayImage, shrink_radius: u8) -> GrayImage {
    let inner = erode_mask(paper, Norm::LInf, shrink_radius, 1);
    if count_nonzero(&inner) == 0 {
        warn!(shrink_radius, "erosion emptied the paper mask, using it unshrunk");
        return paper.clone();
    }
    inner
}

/// Squared Euclidean distance from each pixel to the nearest pixel outside a mask
pub struct BoundaryDistance {
    squared: Option<image::ImageBuffer<Luma<f64>, Vec<f64>>>,
}

impl BoundaryDistance {
    pub fn new(mask: &GrayImage) -> Self {
        let outside = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
            Luma([if mask.get_pixel(x, y)[0] == 0 { 255 } else { 0 }])
        });
        // A mask covering the whole frame has no boundary to measure against.
        let squared = (count_nonzero(&outside) > 0).then(|| euclidean_squared_distance_transform(&outside));
        Self { squared }
    }

    pub fn distance(&self, x: u32, y: u32) -> f64 {
        match &self.squared {
            Some(map) => map.get_pixel(x, y)[0].sqrt(),
            None => f64::INFINITY,
        }
    }

    /// Smallest distance over the filled polygon described by `local` at `bbox`
    fn min_over(&self, local: &GrayImage, bbox: &BoundingBox) -> Option<f64> {
        let map = self.squared.as_ref();
        let mut min: Option<f64> = None;
        for (lx, ly, p) in local.enumerate_pixels() {
            if p[0] == 0 {
                continue;
            }
            let (x, y) = (bbox.x + lx, bbox.y + ly);
            let d = match map {
                Some(map) if x < map.width() && y < map.height() => map.get_pixel(x, y)[0],
                Some(_) => continue,
                None => f64::INFINITY,
            };
            min = Some(min.map_or(d, |m: f64| m.min(d)));
        }
        min.map(f64::sqrt)
    }
}

/// Border margin: `max(min_margin, ratio × larger image dimension)`
pub fn border_margin(width: u32, height: u32, config: &ForegroundConfig) -> f64 {
    let larger = width.max(height) as f64;
    (config.min_border_margin as f64).max(config.border_margin_ratio as f64 * larger)
}

fn median(values: &mut [u8]) -> f32 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sort_unstable();
    if n % 2 == 1 {
        values[n / 2] as f32
    } else {
        (values[n / 2 - 1] as f32 + values[n / 2] as f32) / 2.0
    }
}

/// Per-channel median colour over the selected pixels of `mask`
pub fn estimate_paper_color(img: &RgbImage, mask: &GrayImage) -> [f32; 3] {
    let mut channels: [Vec<u8>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for (x, y, m) in mask.enumerate_pixels() {
        if m[0] == 0 {
            continue;
        }
        let p = img.get_pixel(x, y);
        for (c, values) in channels.iter_mut().enumerate() {
            values.push(p[c]);
        }
    }
    let [mut r, mut g, mut b] = channels;
    [median(&mut r), median(&mut g), median(&mut b)]
}

/// Pixels inside `region` whose colour is farther than `threshold` from `reference`
pub fn color_deviation_mask(img: &RgbImage, reference: [f32; 3], threshold: f32, region: &GrayImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if region.get_pixel(x, y)[0] == 0 {
            return Luma([0]);
        }
        let p = img.get_pixel(x, y);
        let dist_sq: f32 = (0..3)
            .map(|c| {
                let d = p[c] as f32 - reference[c];
                d * d
            })
            .sum();
        Luma([if dist_sq.sqrt() > threshold { 255 } else { 0 }])
    })
}

/// Dilated Canny edges of the blurred grayscale image, restricted to `region`
pub fn edge_mask(img: &RgbImage, region: &GrayImage, config: &ForegroundConfig) -> GrayImage {
    let blurred = apply_blur(&to_grayscale(img), config.blur_sigma);
    let edges = detect_edges(&blurred, config.canny_low, config.canny_high);
    let edges = dilate_mask(&edges, Norm::LInf, config.edge_dilate_radius, 1);
    mask_and(&edges, region)
}

/// Fraction of `bbox` covered by `mask`
fn mask_coverage(mask: &GrayImage, bbox: &BoundingBox) -> f64 {
    if bbox.area() == 0 {
        return 0.0;
    }
    let mut covered = 0u64;
    for y in bbox.y..bbox.bottom().min(mask.height()) {
        for x in bbox.x..bbox.right().min(mask.width()) {
            if mask.get_pixel(x, y)[0] > 0 {
                covered += 1;
            }
        }
    }
    covered as f64 / bbox.area() as f64
}

/// Find object-like regions on the paper: colour deviation from the paper's
/// median fused with dilated Canny edges, inside an eroded paper region.
///
/// `img` is the full-resolution original and `corners` are in its coordinates.
/// Returns detections sorted by bounding-box area, largest first, or an empty
/// list when the paper polygon covers no pixels.
pub fn find_objects(img: &RgbImage, corners: &CornerSet, config: &ForegroundConfig) -> Vec<DetectedObject> {
    let (width, height) = img.dimensions();
    let paper = paper_mask(width, height, corners);
    let paper_area = count_nonzero(&paper) as f64;
    if paper_area == 0.0 {
        debug!("paper polygon covers no pixels");
        return Vec::new();
    }

    let inner = inner_mask(&paper, config.shrink_radius);
    let distance = BoundaryDistance::new(&inner);
    let margin = border_margin(width, height, config);

    let reference = estimate_paper_color(img, &inner);
    debug!(?reference, margin, paper_area, "paper colour estimated");

    let colour = color_deviation_mask(img, reference, config.color_threshold, &inner);
    let edges = edge_mask(img, &inner, config);
    let fused = mask_or(&colour, &edges);
    let fused = close_mask(&fused, Norm::L2, config.close_radius, config.close_iterations);
    let fused = open_mask(&fused, Norm::L2, config.open_radius, config.open_iterations);

    let min_area = config.min_object_area.max(paper_area * config.min_object_area_ratio);
    let max_area = paper_area * config.max_object_area_ratio;

    let contours = find_external_contours(&fused);
    let mut candidates = Vec::new();
    for contour in &contours {
        let area = polygon_area(contour);
        if area < min_area || area > max_area {
            continue;
        }

        let Some(bbox) = BoundingBox::enclosing(contour) else {
            continue;
        };
        let overlap = mask_coverage(&paper, &bbox);
        if overlap < config.min_paper_overlap {
            debug!(?bbox, overlap, "rejected: mostly off the paper");
            continue;
        }

        let filled = fill_polygon_local(contour, &bbox);
        match distance.min_over(&filled, &bbox) {
            Some(d) if d >= margin => {}
            d => {
                debug!(?bbox, distance = ?d, margin, "rejected: touches the paper edge");
                continue;
            }
        }

        let hull: Vec<Point<i32>> = convex_hull(contour.as_slice());
        candidates.push(DetectedObject {
            contour: hull,
            bounding_box: bbox,
        });
    }

    let objects = dedup_objects(candidates, config.dedup_overlap_ratio);
    debug!(
        contours = contours.len(),
        objects = objects.len(),
        min_area,
        max_area,
        "foreground extraction finished"
    );
    objects
}
