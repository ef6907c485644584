use std::time::{Duration, Instant};

use tracing::{debug, info};

/// Runs `f` and logs how long it took at info level.
pub fn timed<T>(label: &str, f: impl FnOnce() -> T) -> T {
    let (result, elapsed) = measure(f);
    info!("{label} finished in {:.2}s", elapsed.as_secs_f64());
    result
}

/// Same as [`timed`] but logs at debug level, for the per-phase steps.
pub fn timed_debug<T>(label: &str, f: impl FnOnce() -> T) -> T {
    let (result, elapsed) = measure(f);
    debug!("{label} finished in {:.2}s", elapsed.as_secs_f64());
    result
}

pub fn measure<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let result = f();
    (result, start.elapsed())
}
