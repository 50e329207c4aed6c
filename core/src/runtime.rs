use crate::{Error, Result};
use rayon::ThreadPoolBuilder;
use std::sync::OnceLock;

static THREAD_POOL_INIT: OnceLock<std::result::Result<(), String>> = OnceLock::new();

/// Initialize the global Rayon thread pool used by CPU-parallel routines.
///
/// `None` keeps the Rayon default (one worker per logical core). Repeated
/// calls return the outcome of the first one.
pub fn init_global_thread_pool(num_threads: Option<usize>) -> Result<()> {
    let res = THREAD_POOL_INIT.get_or_init(|| {
        let mut builder = ThreadPoolBuilder::new();
        if let Some(n) = num_threads {
            validate_thread_count(n)?;
            builder = builder.num_threads(n);
        }
        builder.build_global().map_err(|e| e.to_string())
    });
    res.clone().map_err(Error::ThreadPool)
}

pub fn current_cpu_threads() -> usize {
    rayon::current_num_threads()
}

fn validate_thread_count(n: usize) -> std::result::Result<(), String> {
    if n == 0 {
        return Err("thread count must be >= 1".into());
    }
    Ok(())
}
