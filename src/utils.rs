use r2r::builtin_interfaces::msg::{Duration, Time};

const BILLION: i64 = 1_000_000_000;

pub fn time_from_nanosec(t: i64) -> Time {
    Time {
        sec: t.div_euclid(BILLION) as i32,
        nanosec: t.rem_euclid(BILLION) as u32,
    }
}

pub fn time_as_ns_i64(t: &Time) -> i64 {
    t.sec as i64 * BILLION + t.nanosec as i64
}

pub fn duration_as_ns_i64(d: &Duration) -> i64 {
    d.sec as i64 * BILLION + d.nanosec as i64
}

/// Converts a wall-clock duration into a `builtin_interfaces/Duration`, saturating at
/// `i32::MAX` seconds.
pub fn duration_from_std(d: std::time::Duration) -> Duration {
    Duration {
        sec: i32::try_from(d.as_secs()).unwrap_or(i32::MAX),
        nanosec: d.subsec_nanos(),
    }
}

pub fn is_time_zero(t: &Time) -> bool {
    time_as_ns_i64(t) == 0
}
