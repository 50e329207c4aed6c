pub mod color;
pub mod drawing;
pub mod geometry;
pub mod resize;

pub use color::*;
pub use drawing::*;
pub use geometry::*;
pub use resize::*;

pub type Result<T> = std::result::Result<T, ImgprocError>;

#[derive(Debug, thiserror::Error)]
pub enum ImgprocError {
    #[error("Algorithm error: {0}")]
    AlgorithmError(String),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
}
