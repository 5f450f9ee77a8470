//! Step timing for engine phases.

use std::time::Instant;

/// Runs `f` as a named engine step, recording its duration on a `debug` event.
pub fn profile_step<T>(step: &'static str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let result = f();
    tracing::debug!(
        target: "kiln::perf",
        step,
        ms = start.elapsed().as_secs_f64() * 1000.0,
        "step finished"
    );
    result
}
