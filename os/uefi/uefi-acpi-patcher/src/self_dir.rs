//! Where this image was loaded from.

use crate::file_system::UefiDir;
use acpi_patcher::Directory;
use acpi_patcher::storage::parent_dir;
use alloc::string::{String, ToString};
use log::debug;
use uefi::boot;
use uefi::proto::device_path::text::{AllowShortcuts, DisplayOnly};
use uefi::proto::loaded_image::LoadedImage;

/// The directory holding the patcher image.
pub struct ImageLocation {
    /// Volume-relative path, `\`-separated, without a leading separator.
    pub path: String,
    pub dir: UefiDir,
}

/// Find the directory of the running image from its `LoadedImage` file
/// path. `None` if the image was not loaded from a file system.
pub fn image_location() -> Option<ImageLocation> {
    let path = image_path()?;
    let path = parent_dir(&path);

    let mut root = match UefiDir::image_volume() {
        Ok(root) => root,
        Err(e) => {
            debug!("Image volume not accessible: {e}");
            return None;
        }
    };
    let dir = if path.is_empty() {
        root
    } else {
        match root.open_dir(&path) {
            Ok(dir) => dir,
            Err(e) => {
                debug!("Image directory {path} not accessible: {e}");
                return None;
            }
        }
    };

    debug!("Patcher image directory: \\{path}");
    Some(ImageLocation { path, dir })
}

fn image_path() -> Option<String> {
    let loaded = match boot::open_protocol_exclusive::<LoadedImage>(boot::image_handle()) {
        Ok(loaded) => loaded,
        Err(e) => {
            debug!("LoadedImage protocol not available: {e}");
            return None;
        }
    };
    let text = loaded
        .file_path()?
        .to_string(DisplayOnly(true), AllowShortcuts(false))
        .ok()?;
    Some(text.to_string())
}
