use image::GrayImage;
use imageproc::geometry::min_area_rect;
use imageproc::point::Point;
use tracing::debug;

use crate::detection::contours::{find_external_contours, polygon_area};

/// Best paper candidate: the corners of a contour's minimum-area rotated rectangle
#[derive(Debug, Clone, PartialEq)]
pub struct QuadCandidate {
    /// Rotated rectangle corners in working-image coordinates, unordered
    pub corners: [Point<f32>; 4],
    /// Area of the rotated rectangle
    pub rect_area: f64,
    /// Area of the contour that produced it
    pub contour_area: f64,
    /// Position of the contour in extraction order
    pub index: usize,
}

impl QuadCandidate {
    /// Larger rotated rectangle wins, then larger contour; otherwise the earlier contour stays.
    fn beats(&self, other: &QuadCandidate) -> bool {
        if self.rect_area != other.rect_area {
            return self.rect_area > other.rect_area;
        }
        self.contour_area > other.contour_area
    }
}

fn rect_area(corners: &[Point<i32>; 4]) -> f64 {
    polygon_area(corners)
}

/// Pick the paper quadrilateral from a mask.
///
/// Only external contours with area of at least `min_area_ratio` of the mask
/// area are considered. Returns `None` when nothing qualifies.
pub fn find_paper_quad(mask: &GrayImage, min_area_ratio: f64) -> Option<QuadCandidate> {
    let contours = find_external_contours(mask);
    if contours.is_empty() {
        debug!("no contours in paper mask");
        return None;
    }

    let mask_area = mask.width() as f64 * mask.height() as f64;
    let min_area = mask_area * min_area_ratio;
    let mut best: Option<QuadCandidate> = None;

    for (index, contour) in contours.iter().enumerate() {
        let contour_area = polygon_area(contour);
        if contour_area < min_area || contour.len() < 3 {
            continue;
        }

        let rect = min_area_rect(contour);
        let candidate = QuadCandidate {
            corners: rect.map(|p| Point::new(p.x as f32, p.y as f32)),
            rect_area: rect_area(&rect),
            contour_area,
            index,
        };
        debug!(
            index,
            contour_area,
            rect_area = candidate.rect_area,
            "paper candidate"
        );

        if best.as_ref().is_none_or(|b| candidate.beats(b)) {
            best = Some(candidate);
        }
    }

    debug!(
        contours = contours.len(),
        min_area,
        found = best.is_some(),
        "paper quad selection"
    );
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn draw_rect(mask: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) {
        for y in y0..y1 {
            for x in x0..x1 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }

    #[test]
    fn empty_mask_has_no_quad() {
        assert!(find_paper_quad(&GrayImage::new(50, 50), 0.04).is_none());
    }

    #[test]
    fn small_regions_are_rejected() {
        let mut mask = GrayImage::new(100, 100);
        draw_rect(&mut mask, 10, 10, 20, 20);
        assert!(find_paper_quad(&mask, 0.04).is_none());
    }

    #[test]
    fn axis_aligned_rectangle_gives_its_corners() {
        let mut mask = GrayImage::new(200, 100);
        draw_rect(&mut mask, 40, 20, 160, 80);
        let quad = find_paper_quad(&mask, 0.04).unwrap();

        let xs: Vec<f32> = quad.corners.iter().map(|p| p.x).collect();
        let ys: Vec<f32> = quad.corners.iter().map(|p| p.y).collect();
        let min_x = xs.iter().cloned().fold(f32::MAX, f32::min);
        let max_x = xs.iter().cloned().fold(f32::MIN, f32::max);
        let min_y = ys.iter().cloned().fold(f32::MAX, f32::min);
        let max_y = ys.iter().cloned().fold(f32::MIN, f32::max);
        assert!((min_x - 40.0).abs() <= 1.0);
        assert!((max_x - 159.0).abs() <= 1.0);
        assert!((min_y - 20.0).abs() <= 1.0);
        assert!((max_y - 79.0).abs() <= 1.0);
    }

    #[test]
    fn full_mask_gives_the_frame() {
        let quad = find_paper_quad(&GrayImage::from_pixel(120, 80, Luma([255])), 0.04).unwrap();
        for (x, y) in [(0.0, 0.0), (119.0, 0.0), (119.0, 79.0), (0.0, 79.0)] {
            assert!(
                quad.corners.iter().any(|p| (p.x - x).abs() <= 1.0 && (p.y - y).abs() <= 1.0),
                "({x}, {y}) missing from {:?}",
                quad.corners
            );
        }
    }

    #[test]
    fn largest_rectangle_wins() {
        let mut mask = GrayImage::new(300, 200);
        draw_rect(&mut mask, 10, 10, 60, 60);
        draw_rect(&mut mask, 100, 50, 280, 190);
        let quad = find_paper_quad(&mask, 0.01).unwrap();
        assert_eq!(quad.index, 1);
        assert!(quad.rect_area > 20000.0);
    }

    #[test]
    fn equal_candidates_keep_first_in_scan_order() {
        let mut mask = GrayImage::new(300, 100);
        draw_rect(&mut mask, 10, 10, 60, 60);
        draw_rect(&mut mask, 100, 10, 150, 60);
        let quad = find_paper_quad(&mask, 0.01).unwrap();
        assert_eq!(quad.index, 0);
    }
}
