use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{imageops, GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut, draw_polygon_mut,
    draw_text_mut, text_size,
};
use imageproc::point::Point;
use imageproc::rect::Rect;
use std::path::Path;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::detection::contours::{find_external_contours, polygon_area, polygon_vertices};
use crate::models::{BoundingBox, CornerSet, DetectedObject};
use crate::{DetectionError, Result};

/// Pixel height of one unit of label scale
const PX_PER_SCALE: f32 = 30.0;

const LONG_EDGE_LABEL: &str = "11 in";
const SHORT_EDGE_LABEL: &str = "8.5 in";
const OBJECT_LABEL_SCALE: f32 = 0.65;

const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Colours, stroke widths and font used by [`render_overlay`]
pub struct OverlayStyle {
    pub outline_color: Rgb<u8>,
    pub outline_thickness: f32,
    pub corner_color: Rgb<u8>,
    pub corner_radius: i32,
    pub object_color: Rgb<u8>,
    pub object_thickness: f32,
    pub precise_color: Rgb<u8>,
    pub precise_thickness: f32,
    /// The font to use for labels. If None, text rendering is skipped.
    pub font: Option<FontVec>,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            outline_color: Rgb([150, 255, 60]),
            outline_thickness: 5.0,
            corner_color: Rgb([130, 220, 50]),
            corner_radius: 8,
            object_color: Rgb([0, 0, 255]),
            object_thickness: 3.0,
            precise_color: Rgb([255, 0, 0]),
            precise_thickness: 4.0,
            font: None,
        }
    }
}

impl std::fmt::Debug for OverlayStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayStyle")
            .field("outline_color", &self.outline_color)
            .field("object_color", &self.object_color)
            .field("has_font", &self.font.is_some())
            .finish_non_exhaustive()
    }
}

impl OverlayStyle {
    /// Default style with a font loaded from `font_path`.
    pub fn with_font_path(font_path: &Path) -> Result<Self> {
        let font_data = std::fs::read(font_path)
            .map_err(|e| DetectionError::invalid_parameter("font", format!("{}: {e}", font_path.display())))?;
        let font = FontVec::try_from_vec(font_data).map_err(|_| {
            DetectionError::invalid_parameter("font", format!("{}: not a TrueType/OpenType font", font_path.display()))
        })?;
        Ok(Self {
            font: Some(font),
            ..Self::default()
        })
    }

    /// Default style with the first system font found in common locations;
    /// labels are skipped if none is available.
    pub fn with_system_font() -> Self {
        let font_paths = [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/usr/share/fonts/dejavu/DejaVuSans.ttf",
            "/System/Library/Fonts/Supplemental/Arial.ttf",
            "/Library/Fonts/Arial.ttf",
            "C:\\Windows\\Fonts\\arial.ttf",
        ];

        for path in &font_paths {
            if let Ok(font_data) = std::fs::read(path)
                && let Ok(font) = FontVec::try_from_vec(font_data)
            {
                info!("Loaded system font: {}", path);
                return Self {
                    font: Some(font),
                    ..Self::default()
                };
            }
        }

        warn!("No system font found, overlay labels will be skipped");
        Self::default()
    }
}

/// Size of a rendered label, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextMetrics {
    pub width: u32,
    /// Height above the baseline
    pub height: u32,
    /// Depth below the baseline
    pub baseline: u32,
}

/// Measure `text` at a label `scale`; without a font the size is estimated.
pub fn measure_text(font: Option<&FontVec>, text: &str, scale: f32) -> TextMetrics {
    let px = PxScale::from(scale * PX_PER_SCALE);
    match font {
        Some(font) => {
            let (width, _) = text_size(px, font, text);
            let scaled = font.as_scaled(px);
            TextMetrics {
                width,
                height: scaled.ascent().ceil().max(0.0) as u32,
                baseline: (-scaled.descent()).ceil().max(0.0) as u32,
            }
        }
        None => {
            let chars = text.chars().count() as f32;
            TextMetrics {
                width: (chars * px.x * 0.55).ceil() as u32,
                height: (px.y * 0.75).ceil() as u32,
                baseline: (px.y * 0.2).ceil() as u32,
            }
        }
    }
}

/// Distance between an edge and its label
pub fn edge_label_offset(width: u32, height: u32) -> f32 {
    let longest = width.max(height) as f32;
    (longest * 0.03).round().max(20.0)
}

/// Edge labels grow with the image
pub fn edge_label_scale(width: u32, height: u32) -> f32 {
    (width.max(height) as f32 / 1000.0).max(0.6)
}

/// A paper-edge caption and where its baseline starts
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeLabel {
    pub text: &'static str,
    pub origin: Point<f32>,
}

/// Place the size captions outside each paper edge.
///
/// The pair of opposite edges with the larger mean length is captioned
/// "11 in", the other pair "8.5 in". Each caption starts at the edge midpoint
/// pushed `edge_label_offset` along the edge normal that faces away from the
/// centroid. Zero-length edges get no caption.
pub fn edge_labels(corners: &CornerSet, width: u32, height: u32) -> Vec<EdgeLabel> {
    let edges = corners.edges();
    let lengths = edges.map(|(a, b)| ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt());
    let horizontal_mean = (lengths[0] + lengths[2]) / 2.0;
    let vertical_mean = (lengths[1] + lengths[3]) / 2.0;
    let (long, short) = if horizontal_mean >= vertical_mean {
        ([0, 2], [1, 3])
    } else {
        ([1, 3], [0, 2])
    };

    let center = corners.centroid();
    let offset = edge_label_offset(width, height);
    let captions = long
        .into_iter()
        .map(|i| (i, LONG_EDGE_LABEL))
        .chain(short.into_iter().map(|i| (i, SHORT_EDGE_LABEL)));

    let mut labels = Vec::with_capacity(4);
    for (i, text) in captions {
        let (a, b) = edges[i];
        if lengths[i] == 0.0 {
            continue;
        }
        let mid = Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
        let (mut nx, mut ny) = (-(b.y - a.y) / lengths[i], (b.x - a.x) / lengths[i]);
        if nx * (mid.x - center.x) + ny * (mid.y - center.y) < 0.0 {
            nx = -nx;
            ny = -ny;
        }
        labels.push(EdgeLabel {
            text,
            origin: Point::new((mid.x + nx * offset).round(), (mid.y + ny * offset).round()),
        });
    }
    labels
}

/// Baseline origin for an object's size label.
///
/// Sits 10 px above the box, flips below it when that would leave the top
/// of the canvas, and stays inside the canvas horizontally.
pub fn object_label_position(bbox: &BoundingBox, text: TextMetrics, width: u32, height: u32) -> (i32, i32) {
    let (tw, th, baseline) = (text.width as i32, text.height as i32, text.baseline as i32);
    let text_x = (bbox.x as i32).min(width as i32 - tw - 5).max(5);
    let minimum_y = th + 5;
    let mut text_y = bbox.y as i32 - 10;
    if text_y < minimum_y {
        text_y = bbox.y as i32 + bbox.height as i32 + th + 5;
    }
    text_y = text_y.min(height as i32 - baseline - 5);
    (text_x, text_y.max(minimum_y))
}

fn round_point(p: Point<f32>) -> (i32, i32) {
    (p.x.round() as i32, p.y.round() as i32)
}

/// Line segment with round caps, `thickness` pixels wide
fn draw_thick_segment(canvas: &mut RgbImage, a: Point<f32>, b: Point<f32>, thickness: f32, color: Rgb<u8>) {
    if thickness <= 1.0 {
        draw_line_segment_mut(canvas, (a.x, a.y), (b.x, b.y), color);
        return;
    }
    let radius = thickness / 2.0;
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let length = (dx * dx + dy * dy).sqrt();
    if length >= 1.0 {
        let (nx, ny) = (-dy / length * radius, dx / length * radius);
        let band = [
            Point::new(a.x + nx, a.y + ny),
            Point::new(b.x + nx, b.y + ny),
            Point::new(b.x - nx, b.y - ny),
            Point::new(a.x - nx, a.y - ny),
        ]
        .map(|p| {
            let (x, y) = round_point(p);
            Point::new(x, y)
        });
        let vertices = polygon_vertices(&band);
        if vertices.len() >= 3 {
            draw_polygon_mut(canvas, &vertices, color);
        }
    }
    let r = radius.round() as i32;
    draw_filled_circle_mut(canvas, round_point(a), r, color);
    draw_filled_circle_mut(canvas, round_point(b), r, color);
}

fn draw_closed_polyline(canvas: &mut RgbImage, points: &[Point<f32>], thickness: f32, color: Rgb<u8>) {
    if points.is_empty() {
        return;
    }
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        draw_thick_segment(canvas, *a, b, thickness, color);
    }
}

fn to_f32(points: &[Point<i32>]) -> Vec<Point<f32>> {
    points.iter().map(|p| Point::new(p.x as f32, p.y as f32)).collect()
}

/// Text with its baseline starting at `origin`
fn draw_label(canvas: &mut RgbImage, font: &FontVec, text: &str, origin: (i32, i32), scale: f32, color: Rgb<u8>) {
    let metrics = measure_text(Some(font), text, scale);
    let top = origin.1 - metrics.height as i32;
    draw_text_mut(canvas, color, origin.0, top, PxScale::from(scale * PX_PER_SCALE), font, text);
}

/// White text with a black outline
fn draw_outlined_label(canvas: &mut RgbImage, font: &FontVec, text: &str, origin: (i32, i32), scale: f32) {
    let spread = (scale * 2.0).round().max(1.0) as i32;
    for dy in -spread..=spread {
        for dx in -spread..=spread {
            if dx != 0 || dy != 0 {
                draw_label(canvas, font, text, (origin.0 + dx, origin.1 + dy), scale, BLACK);
            }
        }
    }
    draw_label(canvas, font, text, origin, scale, WHITE);
}

/// Outline of the largest region in the working-resolution mask, scaled to the overlay
fn draw_precise_contour(canvas: &mut RgbImage, mask: &GrayImage, style: &OverlayStyle) {
    if mask.width() == 0 || mask.height() == 0 {
        return;
    }
    let (width, height) = canvas.dimensions();
    let resized = if mask.dimensions() == (width, height) {
        mask.clone()
    } else {
        imageops::resize(mask, width, height, imageops::FilterType::Nearest)
    };
    let binary = GrayImage::from_fn(width, height, |x, y| {
        Luma([if resized.get_pixel(x, y)[0] > 0 { 255 } else { 0 }])
    });

    let contours = find_external_contours(&binary);
    let Some(largest) = contours
        .iter()
        .max_by(|a, b| polygon_area(a).total_cmp(&polygon_area(b)))
    else {
        return;
    };
    draw_closed_polyline(canvas, &to_f32(largest), style.precise_thickness, style.precise_color);
}

/// Render the detection onto a copy of `image`.
///
/// `corners` and `objects` are in `image` coordinates; `mask` may be at any
/// resolution and is scaled to fit.
pub fn render_overlay(
    image: &RgbImage,
    corners: &CornerSet,
    objects: &[DetectedObject],
    mask: Option<&GrayImage>,
    style: &OverlayStyle,
) -> RgbImage {
    let mut overlay = image.clone();
    let (width, height) = overlay.dimensions();

    if let Some(mask) = mask {
        draw_precise_contour(&mut overlay, mask, style);
    }

    draw_closed_polyline(&mut overlay, corners.points(), style.outline_thickness, style.outline_color);
    for p in corners.points() {
        draw_filled_circle_mut(&mut overlay, round_point(*p), style.corner_radius, style.corner_color);
    }

    if let Some(font) = &style.font {
        let scale = edge_label_scale(width, height);
        for label in edge_labels(corners, width, height) {
            draw_outlined_label(&mut overlay, font, label.text, round_point(label.origin), scale);
        }
    }

    for object in objects {
        draw_closed_polyline(&mut overlay, &to_f32(&object.contour), style.object_thickness, style.object_color);

        let Some(font) = &style.font else { continue };
        let bbox = &object.bounding_box;
        let text = format!("{}x{}px", bbox.width, bbox.height);
        let metrics = measure_text(Some(font), &text, OBJECT_LABEL_SCALE);
        let origin = object_label_position(bbox, metrics, width, height);
        draw_label(&mut overlay, font, &text, origin, OBJECT_LABEL_SCALE, style.object_color);
    }

    debug!(
        objects = objects.len(),
        labels = style.font.is_some(),
        "overlay rendered"
    );
    overlay
}

/// Current local time as `YYYY-MM-DD HH:MM:SS`, falling back to UTC when the offset is unknown
pub fn current_timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .unwrap_or_default()
}

/// Stamp `label` (or the current time) in a black box at the top-left corner.
///
/// Returns the label used. Without a font only the box is drawn.
pub fn add_timestamp_label(image: &mut RgbImage, label: Option<&str>, style: &OverlayStyle) -> String {
    let label = label.map(str::to_string).unwrap_or_else(current_timestamp);
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return label;
    }

    let scale = (width.max(height) as f32 / 900.0).max(0.5);
    let metrics = measure_text(style.font.as_ref(), &label, scale);
    let (x, y) = (15i32, 15 + metrics.height as i32);
    let padding = 8i32;

    let left = (x - padding).max(0);
    let top = (y - metrics.height as i32 - padding).max(0);
    let right = (x + metrics.width as i32 + padding).min(width as i32);
    let bottom = (y + metrics.baseline as i32 + padding).min(height as i32);
    if right > left && bottom > top {
        let rect = Rect::at(left, top).of_size((right - left) as u32, (bottom - top) as u32);
        draw_filled_rect_mut(image, rect, BLACK);
    }
    if let Some(font) = &style.font {
        draw_label(image, font, &label, (x, y), scale, WHITE);
    }
    label
}
