use cv_features::FeatureError;
use cv_imgproc::ImgprocError;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ColorizeError>;

#[derive(Debug, thiserror::Error)]
pub enum ColorizeError {
    #[error("cannot load image {}: {source}", path.display())]
    Load {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("cannot save image {}: {source}", path.display())]
    Save {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error(transparent)]
    Features(#[from] FeatureError),

    #[error(transparent)]
    Imgproc(#[from] ImgprocError),

    /// Enough matches, but no usable transform could be fitted to them.
    #[error("registration from {matches} matches failed: {source}")]
    Registration {
        matches: usize,
        source: FeatureError,
    },

    #[error("degenerate homography from {matches} matches: {reason}")]
    DegenerateHomography { matches: usize, reason: String },

    #[error("display error: {0}")]
    Display(String),
}

impl ColorizeError {
    /// Accepted match count when the failure happened after matching.
    pub fn match_count(&self) -> Option<usize> {
        match self {
            Self::Registration { matches, .. } | Self::DegenerateHomography { matches, .. } => {
                Some(*matches)
            }
            _ => None,
        }
    }
}
