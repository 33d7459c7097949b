//! Display formatting for log lines and result records.

/// Format a duration in seconds as a short human string.
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Similarity in `[0, 1]` as a two-decimal percentage, e.g. `"87.50%"`.
///
/// Values outside the unit interval are clamped.
pub fn format_percent(ratio: f64) -> String {
    let ratio = if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 0.0 };
    format!("{:.2}%", ratio * 100.0)
}

/// Distance in meters with two decimals.
pub fn format_meters(meters: f64) -> String {
    format!("{:.2} m", meters)
}
