//! Colorization of grayscale ACI frames from co-registered WATSON colour
//! images: BRISK features, LSH matching, RANSAC homography, warp, and an HSV
//! value-plane transplant.

pub mod config;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod presenter;

pub use config::ColorizeConfig;
pub use error::{ColorizeError, Result};
pub use io::{load_image, save_image};
pub use pipeline::{colorize, Colorization};
pub use presenter::*;

pub use cv_core as core;
pub use cv_features as features;
pub use cv_imgproc as imgproc;

/// Initialize a single global Rayon thread pool for all CPU-parallel routines.
///
/// Call this once at application startup; `None` uses one worker per logical
/// core. Repeated calls return the first initialization result.
pub fn init_thread_pool(num_threads: Option<usize>) -> cv_core::Result<()> {
    cv_core::init_global_thread_pool(num_threads)
}
