use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use palette::{FromColor, Hsv, Lab, Srgb};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::SegmentationConfig;
use crate::detection::preprocessing::{apply_blur, close_mask, count_nonzero, dilate_mask, erode_mask, mask_and};

pub const CHROMA_MASK: &str = "01_chroma_mask";
pub const LIGHTNESS_MASK: &str = "02_lightness_mask";
pub const COMBINED_MASK: &str = "03_combined_mask";
pub const REFINED_MASK: &str = "04_refined_mask";

/// Binary paper mask plus the named intermediates that produced it
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub mask: GrayImage,
    pub debug_images: BTreeMap<String, GrayImage>,
}

fn srgb(pixel: &image::Rgb<u8>) -> Srgb {
    Srgb::new(
        pixel[0] as f32 / 255.0,
        pixel[1] as f32 / 255.0,
        pixel[2] as f32 / 255.0,
    )
}

/// Low-saturation, high-value pixels (8-bit HSV scale)
pub fn chroma_mask(img: &RgbImage, saturation_max: u8, value_min: u8) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let hsv: Hsv = Hsv::from_color(srgb(img.get_pixel(x, y)));
        let saturation = (hsv.saturation * 255.0).round();
        let value = (hsv.value * 255.0).round();
        let on = saturation <= saturation_max as f32 && value >= value_min as f32;
        Luma([if on { 255 } else { 0 }])
    })
}

/// CIE L* rescaled to `0..=255`
pub fn lightness_channel(img: &RgbImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let lab: Lab = Lab::from_color(srgb(img.get_pixel(x, y)));
        Luma([(lab.l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8])
    })
}

/// Blurred lightness binarized at the Otsu level
pub fn lightness_mask(img: &RgbImage, blur_sigma: f32) -> GrayImage {
    let blurred = apply_blur(&lightness_channel(img), blur_sigma);
    let level = otsu_level(&blurred);
    debug!(level, "lightness Otsu level");
    GrayImage::from_fn(blurred.width(), blurred.height(), |x, y| {
        Luma([if blurred.get_pixel(x, y)[0] > level { 255 } else { 0 }])
    })
}

/// Build the paper mask for a working-resolution image: the AND of the chroma
/// and lightness tests, then closed and opened.
///
/// An all-dark image yields an empty mask and a uniformly bright neutral one a
/// full mask; both are valid outputs.
pub fn segment_paper(img: &RgbImage, config: &SegmentationConfig) -> Segmentation {
    let chroma = chroma_mask(img, config.saturation_max, config.value_min);
    let lightness = lightness_mask(img, config.lightness_blur_sigma);
    let combined = mask_and(&chroma, &lightness);

    let closed = close_mask(&combined, Norm::LInf, config.close_radius, config.close_iterations);
    let refined = erode_mask(&closed, Norm::LInf, config.refine_radius, config.refine_iterations);
    let refined = dilate_mask(&refined, Norm::LInf, config.refine_radius, config.refine_iterations);

    let total = (img.width() as u64 * img.height() as u64).max(1);
    debug!(
        chroma = count_nonzero(&chroma),
        lightness = count_nonzero(&lightness),
        coverage = count_nonzero(&refined) as f64 / total as f64,
        "paper mask built"
    );

    let mut debug_images = BTreeMap::new();
    debug_images.insert(CHROMA_MASK.to_string(), chroma);
    debug_images.insert(LIGHTNESS_MASK.to_string(), lightness);
    debug_images.insert(COMBINED_MASK.to_string(), combined);
    debug_images.insert(REFINED_MASK.to_string(), refined.clone());

    Segmentation {
        mask: refined,
        debug_images,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn paper_on_dark(w: u32, h: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
                Rgb([245, 245, 240])
            } else {
                Rgb([30, 35, 40])
            }
        })
    }

    #[test]
    fn chroma_rejects_saturated_and_dark_pixels() {
        let mut img = RgbImage::from_pixel(3, 1, Rgb([240, 240, 240]));
        img.put_pixel(1, 0, Rgb([240, 40, 40]));
        img.put_pixel(2, 0, Rgb([60, 60, 60]));
        let mask = chroma_mask(&img, 80, 150);
        assert_eq!(mask.get_pixel(0, 0)[0], 255);
        assert_eq!(mask.get_pixel(1, 0)[0], 0);
        assert_eq!(mask.get_pixel(2, 0)[0], 0);
    }

    #[test]
    fn lightness_of_white_is_full_scale() {
        let img = RgbImage::from_pixel(1, 1, Rgb([255, 255, 255]));
        assert_eq!(lightness_channel(&img).get_pixel(0, 0)[0], 255);
        let img = RgbImage::from_pixel(1, 1, Rgb([0, 0, 0]));
        assert_eq!(lightness_channel(&img).get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn bright_rectangle_is_segmented() {
        let img = paper_on_dark(200, 150, 50, 40, 150, 110);
        let seg = segment_paper(&img, &SegmentationConfig::default());

        assert_eq!(seg.mask.get_pixel(100, 75)[0], 255);
        assert_eq!(seg.mask.get_pixel(10, 10)[0], 0);
        let covered = count_nonzero(&seg.mask) as f64;
        assert!((covered - 7000.0).abs() < 400.0, "covered {covered}");
    }

    #[test]
    fn dark_image_gives_empty_mask() {
        let img = RgbImage::from_pixel(64, 64, Rgb([20, 20, 20]));
        let seg = segment_paper(&img, &SegmentationConfig::default());
        assert_eq!(count_nonzero(&seg.mask), 0);
    }

    #[test]
    fn bright_neutral_image_gives_full_mask() {
        let img = RgbImage::from_pixel(200, 150, Rgb([250, 250, 250]));
        let seg = segment_paper(&img, &SegmentationConfig::default());
        assert_eq!(count_nonzero(&seg.mask), 200 * 150);
    }

    #[test]
    fn all_stages_are_exposed_in_order() {
        let img = paper_on_dark(40, 40, 10, 10, 30, 30);
        let seg = segment_paper(&img, &SegmentationConfig::default());
        let names: Vec<&str> = seg.debug_images.keys().map(String::as_str).collect();
        assert_eq!(names, [CHROMA_MASK, LIGHTNESS_MASK, COMBINED_MASK, REFINED_MASK]);
    }
}
