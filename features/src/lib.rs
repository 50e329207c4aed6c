pub mod brisk;
pub mod descriptor;
pub mod fast;
pub mod flann;
pub mod matcher;
pub mod ransac;

pub use brisk::*;
pub use descriptor::*;
pub use fast::*;
pub use flann::*;
pub use matcher::*;
pub use ransac::*;

pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error("Detection error: {0}")]
    DetectionError(String),

    #[error("Descriptor error: {0}")]
    DescriptorError(String),

    #[error("Matching error: {0}")]
    MatchingError(String),

    #[error("Estimation error: {0}")]
    EstimationError(String),
}
