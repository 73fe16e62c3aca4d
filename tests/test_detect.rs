mod common;

use common::*;
use paperscan::detection::corners::order_corners;
use paperscan::{detect, PaperDetector};
use imageproc::point::Point;

const PAPER_20_PERCENT: Rect = Rect::new(200, 180, 600, 420);

#[test]
fn uniform_gray_has_no_paper() -> anyhow::Result<()> {
    assert!(detect(&uniform(640, 480, 128), 1200, 0.04)?.is_none());
    assert!(detect(&uniform(640, 480, 15), 1200, 0.04)?.is_none());
    Ok(())
}

#[test]
fn bright_rectangle_gives_canonical_corners() -> anyhow::Result<()> {
    let img = paper_scene(800, 600, PAPER_20_PERCENT);
    let result = detect(&img, 1200, 0.04)?.expect("paper should be found");

    let [tl, tr, br, bl] = PAPER_20_PERCENT.corners();
    assert_near(result.corners.top_left(), tl, 2.0);
    assert_near(result.corners.top_right(), tr, 2.0);
    assert_near(result.corners.bottom_right(), br, 2.0);
    assert_near(result.corners.bottom_left(), bl, 2.0);

    let area = result.corners.area();
    approx::assert_relative_eq!(area, 400.0 * 240.0, max_relative = 0.02);
    Ok(())
}

#[test]
fn corners_survive_downscaling() -> anyhow::Result<()> {
    let paper = Rect::new(600, 450, 1800, 1350);
    let img = paper_scene(2400, 1800, paper);
    let result = detect(&img, 1200, 0.04)?.expect("paper should be found");

    assert_eq!(result.mask.dimensions(), (1200, 900));
    let [tl, _, br, _] = paper.corners();
    assert_near(result.corners.top_left(), tl, 4.0);
    assert_near(result.corners.bottom_right(), br, 4.0);
    Ok(())
}

#[test]
fn rotated_sheet_is_found() -> anyhow::Result<()> {
    let (img, expected) = rotated_paper_scene(800, 600, (400.0, 300.0), (360.0, 240.0), 10.0);
    let result = detect(&img, 1200, 0.04)?.expect("paper should be found");

    let expected = order_corners(&expected.map(|(x, y)| Point::new(x, y)))?;
    for (actual, wanted) in result.corners.points().iter().zip(expected.points()) {
        assert_near(*actual, (wanted.x, wanted.y), 4.0);
    }
    Ok(())
}

#[test]
fn sheet_touching_the_frame_is_found() -> anyhow::Result<()> {
    for paper in [Rect::new(0, 0, 480, 600), Rect::new(100, 0, 700, 300)] {
        let img = paper_scene(800, 600, paper);
        let result = detect(&img, 1200, 0.04)?.expect("paper should be found");

        let [tl, tr, br, bl] = paper.corners();
        assert_near(result.corners.top_left(), tl, 2.0);
        assert_near(result.corners.top_right(), tr, 2.0);
        assert_near(result.corners.bottom_right(), br, 2.0);
        assert_near(result.corners.bottom_left(), bl, 2.0);
    }
    Ok(())
}

#[test]
fn frame_filling_sheet_is_the_whole_image() -> anyhow::Result<()> {
    let result = detect(&uniform(200, 150, 250), 1200, 0.04)?.expect("paper should be found");

    assert!(result.mask.pixels().all(|p| p[0] > 0));
    let [tl, tr, br, bl] = Rect::new(0, 0, 200, 150).corners();
    assert_near(result.corners.top_left(), tl, 2.0);
    assert_near(result.corners.top_right(), tr, 2.0);
    assert_near(result.corners.bottom_right(), br, 2.0);
    assert_near(result.corners.bottom_left(), bl, 2.0);
    assert!(result.objects.is_empty(), "{:?}", result.objects);
    Ok(())
}

#[test]
fn small_bright_region_is_ignored() -> anyhow::Result<()> {
    // 2% of the frame, below the 4% floor
    let img = paper_scene(800, 600, Rect::new(100, 100, 220, 180));
    assert!(detect(&img, 1200, 0.04)?.is_none());
    assert!(detect(&img, 1200, 0.01)?.is_some());
    Ok(())
}

#[test]
fn dark_patch_on_paper_is_one_object() -> anyhow::Result<()> {
    let patch = Rect::new(370, 270, 430, 330);
    let img = with_patch(paper_scene(800, 600, PAPER_20_PERCENT), patch, DARK_ITEM);
    let result = detect(&img, 1200, 0.04)?.expect("paper should be found");

    assert_eq!(result.objects.len(), 1, "{:?}", result.objects);
    let bbox = result.objects[0].bounding_box;
    let tolerance = 5i64;
    assert!((bbox.x as i64 - 370).abs() <= tolerance, "{bbox:?}");
    assert!((bbox.y as i64 - 270).abs() <= tolerance, "{bbox:?}");
    assert!((bbox.width as i64 - 60).abs() <= 2 * tolerance, "{bbox:?}");
    assert!((bbox.height as i64 - 60).abs() <= 2 * tolerance, "{bbox:?}");
    assert!(result.objects[0].contour.len() >= 4);
    Ok(())
}

#[test]
fn blank_paper_has_no_objects() -> anyhow::Result<()> {
    let img = paper_scene(800, 600, PAPER_20_PERCENT);
    let result = detect(&img, 1200, 0.04)?.expect("paper should be found");
    assert!(result.objects.is_empty(), "{:?}", result.objects);
    Ok(())
}

#[test]
fn objects_are_sorted_largest_first() -> anyhow::Result<()> {
    let img = paper_scene(800, 600, PAPER_20_PERCENT);
    let img = with_patch(img, Rect::new(250, 230, 290, 270), DARK_ITEM);
    let img = with_patch(img, Rect::new(420, 250, 520, 350), DARK_ITEM);
    let result = detect(&img, 1200, 0.04)?.expect("paper should be found");

    assert_eq!(result.objects.len(), 2, "{:?}", result.objects);
    assert!(result.objects[0].bounding_box.area() > result.objects[1].bounding_box.area());
    assert!(result.objects[0].bounding_box.x >= 410);
    Ok(())
}

#[test]
fn debug_images_cover_every_stage() -> anyhow::Result<()> {
    let img = paper_scene(800, 600, PAPER_20_PERCENT);
    let result = detect(&img, 1200, 0.04)?.expect("paper should be found");
    let names: Vec<&str> = result.debug_images.keys().map(String::as_str).collect();
    assert_eq!(
        names,
        ["01_chroma_mask", "02_lightness_mask", "03_combined_mask", "04_refined_mask"]
    );
    Ok(())
}

#[test]
fn invalid_parameters_are_errors() {
    let img = uniform(64, 64, 128);
    for (max_dimension, ratio) in [(0, 0.04), (1200, 0.0), (1200, 1.0), (1200, -0.5)] {
        assert!(
            matches!(
                detect(&img, max_dimension, ratio),
                Err(DetectionError::InvalidParameter { .. })
            ),
            "max_dimension={max_dimension} ratio={ratio}"
        );
    }
}

#[test]
fn detector_uses_its_config() -> anyhow::Result<()> {
    let mut config = DetectionConfig::default();
    config.foreground.min_object_area = 5000.0;
    let patch = Rect::new(370, 270, 430, 330);
    let img = with_patch(paper_scene(800, 600, PAPER_20_PERCENT), patch, DARK_ITEM);

    let result = PaperDetector::with_config(config).detect(&img)?.expect("paper should be found");
    assert!(result.objects.is_empty());
    Ok(())
}
