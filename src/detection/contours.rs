use image::{imageops, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;

use crate::models::BoundingBox;

/// Outer borders of top-level regions in a binary mask (holes and nested
/// regions are skipped), in row-major scan order of their first pixel.
///
/// Regions touching the frame are included: the mask is traced inside a
/// one-pixel background border, so an edge-to-edge mask yields the frame itself.
pub fn find_external_contours(mask: &GrayImage) -> Vec<Vec<Point<i32>>> {
    let mut padded = GrayImage::new(mask.width() + 2, mask.height() + 2);
    imageops::replace(&mut padded, mask, 1, 1);

    find_contours::<i32>(&padded)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|c| c.points.into_iter().map(|p| Point::new(p.x - 1, p.y - 1)).collect())
        .collect()
}

/// Shoelace area of a closed polygon
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice: i64 = 0;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        twice += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
    }
    twice.abs() as f64 / 2.0
}

/// Drop consecutive duplicates and a closing point equal to the first,
/// which `draw_polygon_mut` rejects.
pub(crate) fn polygon_vertices(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let mut vertices: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for p in points {
        if vertices.last() != Some(p) {
            vertices.push(*p);
        }
    }
    while vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }
    vertices
}

/// Fill a polygon with 255 into `mask`. Degenerate polygons paint their points only.
pub fn fill_polygon(mask: &mut GrayImage, points: &[Point<i32>]) {
    let vertices = polygon_vertices(points);
    if vertices.len() >= 3 {
        draw_polygon_mut(mask, &vertices, Luma([255u8]));
        return;
    }
    for p in vertices {
        if p.x >= 0 && p.y >= 0 && (p.x as u32) < mask.width() && (p.y as u32) < mask.height() {
            mask.put_pixel(p.x as u32, p.y as u32, Luma([255u8]));
        }
    }
}

/// Rasterize a polygon into a mask of its own bounding box.
///
/// Pixel `(x, y)` of the returned mask is pixel `(bbox.x + x, bbox.y + y)` of
/// the full image, so callers avoid allocating a full-resolution raster per contour.
pub fn fill_polygon_local(points: &[Point<i32>], bbox: &BoundingBox) -> GrayImage {
    let mut local = GrayImage::new(bbox.width, bbox.height);
    let shifted: Vec<Point<i32>> = points
        .iter()
        .map(|p| Point::new(p.x - bbox.x as i32, p.y - bbox.y as i32))
        .collect();
    fill_polygon(&mut local, &shifted);
    local
}
