use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{dilate, erode};

/// Downsample so the longest edge is at most `max_dimension`.
///
/// Returns the working image and the factor relating working coordinates to
/// original ones (`working = original * scale`). Images that already fit are
/// returned as a copy with scale `1.0`.
pub fn resize_for_processing(img: &RgbImage, max_dimension: u32) -> (RgbImage, f32) {
    let (width, height) = img.dimensions();
    let longest_edge = width.max(height);
    if longest_edge <= max_dimension {
        return (img.clone(), 1.0);
    }

    let scale = max_dimension as f32 / longest_edge as f32;
    let new_width = ((width as f32 * scale).round() as u32).max(1);
    let new_height = ((height as f32 * scale).round() as u32).max(1);
    // Triangle widens its support by the downscale ratio, averaging over the source area.
    let resized = imageops::resize(img, new_width, new_height, FilterType::Triangle);
    (resized, scale)
}

/// Convert image to grayscale
pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    imageops::grayscale(img)
}

/// Apply Gaussian blur to reduce noise
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

/// Detect edges using Canny edge detector
pub fn detect_edges(img: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    canny(img, low_threshold, high_threshold)
}

/// Repeated application of a radius-`r` element equals one pass with radius `r * iterations`.
fn effective_radius(radius: u8, iterations: u8) -> u8 {
    (radius as u16 * iterations as u16).min(u8::MAX as u16) as u8
}

pub fn dilate_mask(mask: &GrayImage, norm: Norm, radius: u8, iterations: u8) -> GrayImage {
    let k = effective_radius(radius, iterations);
    if k == 0 {
        return mask.clone();
    }
    dilate(mask, norm, k)
}

pub fn erode_mask(mask: &GrayImage, norm: Norm, radius: u8, iterations: u8) -> GrayImage {
    let k = effective_radius(radius, iterations);
    if k == 0 {
        return mask.clone();
    }
    erode(mask, norm, k)
}

/// Dilate then erode: fills gaps narrower than the element
pub fn close_mask(mask: &GrayImage, norm: Norm, radius: u8, iterations: u8) -> GrayImage {
    let dilated = dilate_mask(mask, norm, radius, iterations);
    erode_mask(&dilated, norm, radius, iterations)
}

/// Erode then dilate: removes specks smaller than the element
pub fn open_mask(mask: &GrayImage, norm: Norm, radius: u8, iterations: u8) -> GrayImage {
    let eroded = erode_mask(mask, norm, radius, iterations);
    dilate_mask(&eroded, norm, radius, iterations)
}

/// Pixel-wise AND of two binary masks of equal size
pub fn mask_and(a: &GrayImage, b: &GrayImage) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        let on = a.get_pixel(x, y)[0] > 0 && b.get_pixel(x, y)[0] > 0;
        Luma([if on { 255 } else { 0 }])
    })
}

/// Pixel-wise OR of two binary masks of equal size
pub fn mask_or(a: &GrayImage, b: &GrayImage) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        let on = a.get_pixel(x, y)[0] > 0 || b.get_pixel(x, y)[0] > 0;
        Luma([if on { 255 } else { 0 }])
    })
}

pub fn count_nonzero(mask: &GrayImage) -> u64 {
    mask.pixels().filter(|p| p[0] > 0).count() as u64
}
