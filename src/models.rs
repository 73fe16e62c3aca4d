use image::GrayImage;
use imageproc::point::Point;
use std::collections::BTreeMap;

/// Axis-aligned rectangle in original-image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Smallest box enclosing every point (inclusive pixel extents).
    pub fn enclosing(points: &[Point<i32>]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let min_x = min_x.max(0);
        let min_y = min_y.max(0);
        if max_x < min_x || max_y < min_y {
            return None;
        }
        Some(Self {
            x: min_x as u32,
            y: min_y as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        })
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Area of the intersection with another box, zero when disjoint
    pub fn intersection_area(&self, other: &BoundingBox) -> u64 {
        let x_overlap = self.right().min(other.right()).saturating_sub(self.x.max(other.x));
        let y_overlap = self.bottom().min(other.bottom()).saturating_sub(self.y.max(other.y));
        x_overlap as u64 * y_overlap as u64
    }

    /// True when the intersection covers at least `ratio` of the smaller box
    pub fn significantly_overlaps(&self, other: &BoundingBox, ratio: f64) -> bool {
        let overlap = self.intersection_area(other);
        if overlap == 0 {
            return false;
        }
        overlap as f64 >= ratio * self.area().min(other.area()) as f64
    }
}

/// Four paper corners in original-image coordinates,
/// ordered top-left, top-right, bottom-right, bottom-left
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerSet {
    points: [Point<f32>; 4],
}

impl CornerSet {
    /// Wrap points that are already in canonical order.
    /// Use [`crate::detection::corners::order_corners`] for arbitrary input.
    pub(crate) fn from_ordered(points: [Point<f32>; 4]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point<f32>; 4] {
        &self.points
    }

    pub fn top_left(&self) -> Point<f32> {
        self.points[0]
    }

    pub fn top_right(&self) -> Point<f32> {
        self.points[1]
    }

    pub fn bottom_right(&self) -> Point<f32> {
        self.points[2]
    }

    pub fn bottom_left(&self) -> Point<f32> {
        self.points[3]
    }

    /// Edges as (start, end) pairs: top, right, bottom, left
    pub fn edges(&self) -> [(Point<f32>, Point<f32>); 4] {
        let p = &self.points;
        [(p[0], p[1]), (p[1], p[2]), (p[2], p[3]), (p[3], p[0])]
    }

    pub fn centroid(&self) -> Point<f32> {
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / 4.0, sy / 4.0)
    }

    /// Corners rounded to the nearest pixel
    pub fn to_pixels(&self) -> [Point<i32>; 4] {
        self.points
            .map(|p| Point::new(p.x.round() as i32, p.y.round() as i32))
    }

    /// Shoelace area of the quadrilateral
    pub fn area(&self) -> f64 {
        let p = &self.points;
        let mut twice = 0.0f64;
        for i in 0..4 {
            let a = p[i];
            let b = p[(i + 1) % 4];
            twice += a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
        }
        twice.abs() / 2.0
    }
}

/// One foreground item found on the paper
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedObject {
    /// Convex hull of the object's silhouette
    pub contour: Vec<Point<i32>>,
    pub bounding_box: BoundingBox,
}

/// Output of a single detection call
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub corners: CornerSet,
    /// Refined paper mask at working resolution
    pub mask: GrayImage,
    /// Diagnostic intermediates keyed by stage name, in stage order
    pub debug_images: BTreeMap<String, GrayImage>,
    /// Objects on the paper, largest bounding box first
    pub objects: Vec<DetectedObject>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: u32, y: u32, width: u32, height: u32) -> BoundingBox {
        BoundingBox { x, y, width, height }
    }

    #[test]
    fn enclosing_box_is_inclusive() {
        let points = [Point::new(3, 4), Point::new(10, 4), Point::new(10, 9), Point::new(3, 9)];
        assert_eq!(BoundingBox::enclosing(&points), Some(bbox(3, 4, 8, 6)));
        assert_eq!(BoundingBox::enclosing(&[]), None);
    }

    #[test]
    fn intersection_of_disjoint_boxes_is_zero() {
        assert_eq!(bbox(0, 0, 10, 10).intersection_area(&bbox(10, 0, 10, 10)), 0);
        assert_eq!(bbox(0, 0, 10, 10).intersection_area(&bbox(5, 5, 10, 10)), 25);
    }

    #[test]
    fn overlap_is_measured_against_smaller_box() {
        let big = bbox(0, 0, 100, 100);
        let nested = bbox(10, 10, 20, 20);
        assert!(big.significantly_overlaps(&nested, 0.6));
        assert!(nested.significantly_overlaps(&big, 0.6));

        // 10x20 of a 20x20 box = 50%
        let half = bbox(90, 10, 20, 20);
        assert!(!big.significantly_overlaps(&half, 0.6));
    }

    #[test]
    fn corner_set_geometry() {
        let corners = CornerSet::from_ordered([
            Point::new(0.0, 0.0),
            Point::new(40.0, 0.0),
            Point::new(40.0, 20.0),
            Point::new(0.0, 20.0),
        ]);
        assert_eq!(corners.area(), 800.0);
        assert_eq!(corners.centroid(), Point::new(20.0, 10.0));
        assert_eq!(corners.edges()[1], (Point::new(40.0, 0.0), Point::new(40.0, 20.0)));
    }
}
