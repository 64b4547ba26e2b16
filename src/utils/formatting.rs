use std::time::Duration;

/// Format a duration as `m:ss.mmm` for log lines
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();
    let minutes = total_ms / 60_000;
    let seconds = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;
    format!("{}:{:02}.{:03}", minutes, seconds, millis)
}
