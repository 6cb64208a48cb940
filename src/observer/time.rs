use std::sync::OnceLock;
use std::time::Instant;

use serde::Serialize;

static ORIGIN: OnceLock<Instant> = OnceLock::new();

/// Milliseconds since the process's first clock read. Monotonic, so
/// timestamps taken in sequence never decrease.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
pub struct Timestamp {
    pub millis: f64,
}

impl Timestamp {
    pub fn now() -> Self {
        let origin = ORIGIN.get_or_init(Instant::now);
        Timestamp {
            millis: origin.elapsed().as_secs_f64() * 1000.0,
        }
    }
}
