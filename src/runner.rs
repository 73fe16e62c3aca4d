use std::path::{Path, PathBuf};
use std::process::Command;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::config::DetectionConfig;
use crate::debug::save_debug_images;
use crate::detection::PaperDetector;
use crate::models::{BoundingBox, CornerSet};
use crate::overlay::{add_timestamp_label, render_overlay, OverlayStyle};
use crate::{DetectionError, Result};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Settings shared by every image of a run
#[derive(Debug, Default)]
pub struct RunOptions {
    pub config: DetectionConfig,
    pub style: OverlayStyle,
    /// Write the segmentation masks next to the output
    pub debug: bool,
    /// Stamp the current time in the top-left corner
    pub timestamp: bool,
    /// Open the written PNG with the OS handler
    pub open: bool,
}

/// What was written for one input image
#[derive(Debug, Clone)]
pub struct ImageReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub corners: CornerSet,
    pub objects: Vec<BoundingBox>,
    pub debug_dir: Option<PathBuf>,
}

/// Totals for a batch run
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub processed: usize,
    pub failures: Vec<(PathBuf, DetectionError)>,
}

/// `<stem>_outlined.png` beside the input
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{stem}_outlined.png"))
}

pub fn downloads_dir() -> Option<PathBuf> {
    dirs::download_dir().or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
}

/// `_YYYYmmdd_HHMMSS` for the current local time
pub fn timestamp_suffix() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!("_[year][month][day]_[hour][minute][second]"))
        .unwrap_or_default()
}

/// Insert `suffix` before the extension when `output` lies inside `downloads`.
///
/// Paths are compared in absolute form without touching the filesystem, so
/// neither needs to exist yet.
pub fn with_downloads_timestamp(output: &Path, downloads: &Path, suffix: &str) -> PathBuf {
    let (Ok(output_abs), Ok(downloads_abs)) = (std::path::absolute(output), std::path::absolute(downloads)) else {
        return output.to_path_buf();
    };
    if !output_abs.starts_with(&downloads_abs) {
        return output.to_path_buf();
    }

    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    output.with_file_name(name)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// PNG/JPEG files directly inside `dir`, sorted by name
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| DetectionError::invalid_parameter("batch input directory", format!("{}: {e}", dir.display())))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && has_image_extension(path))
        .collect();
    files.sort();
    Ok(files)
}

/// Detect the paper in one image file and write the annotated result.
///
/// The output goes to `output`, or `<stem>_outlined.png` beside the input,
/// with a timestamp suffix when that lands in the Downloads directory.
pub fn process_image(input: &Path, output: Option<&Path>, options: &RunOptions) -> Result<ImageReport> {
    let image = image::open(input)
        .map_err(|source| DetectionError::InputUnreadable {
            path: input.to_path_buf(),
            source,
        })?
        .to_rgb8();
    debug!("Image loaded: {}x{}", image.width(), image.height());

    let detection = PaperDetector::with_config(options.config.clone())
        .detect(&image)?
        .ok_or(DetectionError::NoPaperDetected)?;

    let mut outlined = render_overlay(
        &image,
        &detection.corners,
        &detection.objects,
        Some(&detection.mask),
        &options.style,
    );
    if options.timestamp {
        add_timestamp_label(&mut outlined, None, &options.style);
    }

    let requested = output.map(Path::to_path_buf).unwrap_or_else(|| default_output_path(input));
    let output_path = match downloads_dir() {
        Some(downloads) => with_downloads_timestamp(&requested, &downloads, &timestamp_suffix()),
        None => requested,
    };

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DetectionError::output_write(parent, e))?;
    }
    outlined
        .save(&output_path)
        .map_err(|e| DetectionError::output_write(&output_path, e))?;
    debug!("Outlined image written to {}", output_path.display());

    let debug_dir = if options.debug {
        let dir = save_debug_images(&output_path, &detection.debug_images)?;
        debug!("Debug masks saved to {}", dir.display());
        Some(dir)
    } else {
        None
    };

    if options.open && output_path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("png")) {
        launch_file(&output_path);
    }

    Ok(ImageReport {
        input: input.to_path_buf(),
        output: output_path,
        corners: detection.corners,
        objects: detection.objects.iter().map(|o| o.bounding_box).collect(),
        debug_dir,
    })
}

/// Process every PNG/JPEG in `input_dir`, writing `<stem>_outlined.png` files into `output_dir`.
///
/// A failing image is recorded and the batch continues. Only a missing or
/// image-free input directory, or an uncreatable output directory, aborts the run.
pub fn run_batch(input_dir: &Path, output_dir: &Path, options: &RunOptions) -> Result<BatchSummary> {
    let files = list_images(input_dir)?;
    if files.is_empty() {
        return Err(DetectionError::invalid_parameter(
            "batch input directory",
            format!("no PNG/JPEG files in {}", input_dir.display()),
        ));
    }
    std::fs::create_dir_all(output_dir).map_err(|e| DetectionError::output_write(output_dir, e))?;

    let mut summary = BatchSummary::default();
    for input in files {
        info!("Processing {}...", input.display());
        let output = default_output_path(&input);
        let output = output_dir.join(output.file_name().unwrap_or_default());
        match process_image(&input, Some(&output), options) {
            Ok(_) => summary.processed += 1,
            Err(e) => {
                warn!("  {}", e);
                summary.failures.push((input, e));
            }
        }
    }
    Ok(summary)
}

/// Open a file with the default OS handler. Failures are logged, not returned.
pub fn launch_file(path: &Path) {
    let mut command = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else if cfg!(target_os = "macos") {
        Command::new("open")
    } else {
        Command::new("xdg-open")
    };
    if let Err(e) = command.arg(path).spawn() {
        warn!("Unable to open {}: {}", path.display(), e);
    }
}

/// Directory the file picker starts in: the input's parent, else Downloads, else the current directory
pub fn picker_start_dir(input: Option<&Path>) -> PathBuf {
    if let Some(parent) = input.and_then(Path::parent).filter(|p| p.is_dir()) {
        return parent.to_path_buf();
    }
    downloads_dir()
        .filter(|d| d.is_dir())
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Ask for an input image with a native file dialog. `None` when cancelled.
#[cfg(feature = "picker")]
pub fn pick_input_file(start_dir: &Path) -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Select a paper image")
        .set_directory(start_dir)
        .add_filter("Image files", &["png", "jpg", "jpeg", "bmp", "tif", "tiff"])
        .add_filter("All files", &["*"])
        .pick_file()
}
