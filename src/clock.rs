//! Response timestamps
//!
//! ISO-8601 local timestamps with microsecond precision. Values handed out by
//! one process never go backwards, even if the wall clock is stepped back.

use chrono::{DateTime, Local, SecondsFormat};
use std::sync::atomic::{AtomicI64, Ordering};

/// Highest timestamp issued so far, in microseconds since the Unix epoch
static LAST_ISSUED_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Current local time, clamped to be no earlier than any previous call
pub fn now() -> DateTime<Local> {
    let wall = Local::now();
    let micros = clamp_to_last_issued(wall.timestamp_micros());
    if micros == wall.timestamp_micros() {
        return wall;
    }
    DateTime::from_timestamp_micros(micros).map_or(wall, |utc| utc.with_timezone(&Local))
}

/// `now()` rendered as RFC 3339 (an ISO-8601 profile)
pub fn now_iso8601() -> String {
    now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

fn clamp_to_last_issued(candidate: i64) -> i64 {
    let previous = LAST_ISSUED_MICROS.fetch_max(candidate, Ordering::AcqRel);
    previous.max(candidate)
}
