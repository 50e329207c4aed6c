//! Native image display.
//!
//! [`show_image`] opens one window per call and returns once the user presses
//! any key or closes the window.

use image::RgbImage;

#[cfg(not(target_arch = "wasm32"))]
pub mod native_viewer;

pub type Result<T> = std::result::Result<T, ViewerError>;

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("Window error: {0}")]
    Window(String),

    #[error("Cannot display an empty {0}x{1} image")]
    EmptyImage(u32, u32),
}

/// Show `image` in a window titled `title` and block until it is dismissed.
#[cfg(not(target_arch = "wasm32"))]
pub fn show_image(title: &str, image: &RgbImage) -> Result<()> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Err(ViewerError::EmptyImage(w, h));
    }
    native_viewer::run_image_viewer(title, image)
        .map_err(|e| ViewerError::Window(e.to_string()))
}
