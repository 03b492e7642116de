//! Wall-clock boundary.
//!
//! The core is clockless; real time is sampled here and handed in as an
//! `EpochDay`.

use rollcall_core::primitives::EpochDay;

const SECONDS_PER_DAY: u64 = 86_400;

/// The current day, at day granularity.
#[must_use]
pub fn today() -> EpochDay {
    let seconds = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    EpochDay(seconds / SECONDS_PER_DAY)
}
