//! Wall-clock timing of named operations.

use std::time::{Duration, Instant};

use tracing::info;

/// Measures how long a named operation takes and logs it when finished.
///
/// ```ignore
/// let timer = OperationTimer::start("Fetch Google Access Token");
/// let response = endpoint.exchange(&url, &body);
/// timer.finish();
/// ```
#[derive(Debug)]
pub struct OperationTimer {
    name: &'static str,
    started: Instant,
}

impl OperationTimer {
    /// Starts timing `name`.
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            started: Instant::now(),
        }
    }

    /// Time elapsed since [`OperationTimer::start`].
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Logs the elapsed time at info level and returns it.
    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        info!(
            operation = self.name,
            elapsed_ms = elapsed.as_millis() as u64,
            "{} took {}ms to execute",
            self.name,
            elapsed.as_millis()
        );
        elapsed
    }
}
