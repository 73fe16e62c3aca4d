use image::GrayImage;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{DetectionError, Result};

/// Directory that receives the diagnostic masks for `output_path`: `<stem>_debug` beside it
pub fn debug_dir_for(output_path: &Path) -> PathBuf {
    let stem = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let parent = output_path.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("{stem}_debug"))
}

/// Save each named mask as `<name>.png` in the debug directory of `output_path`.
///
/// Existing files with the same names are overwritten. Returns the directory used.
pub fn save_debug_images(output_path: &Path, images: &BTreeMap<String, GrayImage>) -> Result<PathBuf> {
    let dir = debug_dir_for(output_path);
    std::fs::create_dir_all(&dir).map_err(|e| DetectionError::output_write(&dir, e))?;

    for (name, image) in images {
        let path = dir.join(format!("{name}.png"));
        image
            .save(&path)
            .map_err(|e| DetectionError::output_write(&path, e))?;
        debug!("Debug: saved {}", path.display());
    }

    Ok(dir)
}
