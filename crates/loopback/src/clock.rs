//! Process-wide monotonic clock shared by the loopback transport and the mock device.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Clock value at the first read. Non-zero so that no valid timestamp is `<= 0`.
const BASE_US: i64 = 1_000_000;

/// Seconds on the shared clock.
pub fn now_s() -> f64 {
    now_us() as f64 / 1e6
}

/// Microseconds on the shared clock.
pub fn now_us() -> i64 {
    BASE_US + EPOCH.get_or_init(Instant::now).elapsed().as_micros() as i64
}
