use image::{Rgb, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use std::path::{Path, PathBuf};

pub const BACKGROUND: Rgb<u8> = Rgb([30, 32, 35]);
pub const PAPER: Rgb<u8> = Rgb([245, 245, 240]);
pub const DARK_ITEM: Rgb<u8> = Rgb([40, 40, 45]);

/// Axis-aligned pixel rectangle, `x0..x1` by `y0..y1`
#[derive(Debug, Clone, Copy)]
pub struct Rect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Rect {
    pub const fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.x0..self.x1).contains(&x) && (self.y0..self.y1).contains(&y)
    }

    /// Inclusive corner pixels, top-left first, clockwise
    pub fn corners(&self) -> [(f32, f32); 4] {
        let (x0, y0) = (self.x0 as f32, self.y0 as f32);
        let (x1, y1) = ((self.x1 - 1) as f32, (self.y1 - 1) as f32);
        [(x0, y0), (x1, y0), (x1, y1), (x0, y1)]
    }
}

/// Near-white sheet on a dark table
pub fn paper_scene(width: u32, height: u32, paper: Rect) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| if paper.contains(x, y) { PAPER } else { BACKGROUND })
}

/// Sheet rotated by `degrees` about `center`, `size` = (width, height)
pub fn rotated_paper_scene(
    width: u32,
    height: u32,
    center: (f32, f32),
    size: (f32, f32),
    degrees: f32,
) -> (RgbImage, [(f32, f32); 4]) {
    let corners = rotated_corners(center, size, degrees);
    let mut img = RgbImage::from_pixel(width, height, BACKGROUND);
    let polygon: Vec<Point<i32>> = corners
        .iter()
        .map(|&(x, y)| Point::new(x.round() as i32, y.round() as i32))
        .collect();
    draw_polygon_mut(&mut img, &polygon, PAPER);
    (img, corners)
}

pub fn rotated_corners(center: (f32, f32), size: (f32, f32), degrees: f32) -> [(f32, f32); 4] {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (hw, hh) = (size.0 / 2.0, size.1 / 2.0);
    [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)]
        .map(|(dx, dy)| (center.0 + dx * cos - dy * sin, center.1 + dx * sin + dy * cos))
}

/// Paint a solid rectangle over `img`
pub fn with_patch(mut img: RgbImage, patch: Rect, color: Rgb<u8>) -> RgbImage {
    for y in patch.y0..patch.y1 {
        for x in patch.x0..patch.x1 {
            img.put_pixel(x, y, color);
        }
    }
    img
}

pub fn uniform(width: u32, height: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([value, value, value]))
}

/// Save as PNG under `dir` and return the path
pub fn save_png(img: &RgbImage, dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    img.save_with_format(&path, image::ImageFormat::Png)
        .expect("Failed to save test image");
    path
}

/// Assert two points agree within `tolerance` pixels on both axes
pub fn assert_near(actual: Point<f32>, expected: (f32, f32), tolerance: f32) {
    assert!(
        (actual.x - expected.0).abs() <= tolerance && (actual.y - expected.1).abs() <= tolerance,
        "expected ({}, {}) ± {tolerance}, got ({}, {})",
        expected.0,
        expected.1,
        actual.x,
        actual.y
    );
}
