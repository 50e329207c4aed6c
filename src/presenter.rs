//! Where intermediate and final images are shown.

use crate::Result;
use image::RgbImage;
use tracing::debug;

/// Receives images the pipeline wants a human to see.
pub trait Presenter {
    fn present(&mut self, title: &str, image: &RgbImage) -> Result<()>;
}

impl<P: Presenter + ?Sized> Presenter for &mut P {
    fn present(&mut self, title: &str, image: &RgbImage) -> Result<()> {
        (**self).present(title, image)
    }
}

impl<P: Presenter + ?Sized> Presenter for Box<P> {
    fn present(&mut self, title: &str, image: &RgbImage) -> Result<()> {
        (**self).present(title, image)
    }
}

/// Discards every image.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessPresenter;

impl Presenter for HeadlessPresenter {
    fn present(&mut self, title: &str, image: &RgbImage) -> Result<()> {
        debug!(title, width = image.width(), height = image.height(), "display skipped");
        Ok(())
    }
}

/// Opens a native window per image and waits for a key press or close.
#[cfg(feature = "viewer")]
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowPresenter;

#[cfg(feature = "viewer")]
impl Presenter for WindowPresenter {
    fn present(&mut self, title: &str, image: &RgbImage) -> Result<()> {
        debug!(title, "opening viewer window");
        cv_viewer::show_image(title, image)
            .map_err(|e| crate::ColorizeError::Display(e.to_string()))
    }
}
