use crate::pipeline::Colorization;
use crate::{ColorizeError, Result};
use image::{DynamicImage, ImageReader};
use std::path::Path;
use tracing::debug;

/// Open and decode an image, sniffing the format from its content.
pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage> {
    let path = path.as_ref();
    let load_err = |source| ColorizeError::Load {
        path: path.to_path_buf(),
        source,
    };

    let image = ImageReader::open(path)
        .map_err(|e| load_err(image::ImageError::IoError(e)))?
        .with_guessed_format()
        .map_err(|e| load_err(image::ImageError::IoError(e)))?
        .decode()
        .map_err(load_err)?;

    debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        color = ?image.color(),
        "loaded image"
    );
    Ok(image)
}

/// Write the pipeline result; the encoder follows the file extension.
///
/// Colorized results are written as RGB, pass-through results as 8-bit gray.
pub fn save_image(path: impl AsRef<Path>, outcome: &Colorization) -> Result<()> {
    let path = path.as_ref();
    let saved = match outcome {
        Colorization::Colorized { image, .. } => image.save(path),
        Colorization::InsufficientMatches { grayscale, .. } => grayscale.save(path),
    };
    saved.map_err(|source| ColorizeError::Save {
        path: path.to_path_buf(),
        source,
    })
}
