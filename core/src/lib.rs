pub mod descriptor;
pub mod error;
pub mod keypoint;
pub mod robust;
pub mod runtime;

pub use descriptor::*;
pub use error::{Error, Result};
pub use keypoint::*;
pub use robust::{Ransac, RobustConfig, RobustModel, RobustResult};
pub use runtime::{current_cpu_threads, init_global_thread_pool};
