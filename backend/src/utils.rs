use chrono::{Local, TimeZone};

/// Wall-clock time in fractional seconds since the epoch.
pub fn secs_since_epoch() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Local date and time followed by the raw epoch seconds, for log lines.
pub fn datetime_display(ts: i64) -> String {
    match Local.timestamp_opt(ts, 0).single() {
        Some(dt) => format!("{} ({})", dt.format("%Y-%m-%d %H:%M:%S %Z"), ts),
        None => format!("({})", ts),
    }
}
