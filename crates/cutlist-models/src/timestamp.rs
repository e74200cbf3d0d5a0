//! Timestamp conversion utilities for subtitle cues.
//!
//! Cues arrive in SRT notation (`HH:MM:SS,mmm`) and are burned in through an
//! ASS track, which expects `H:MM:SS.cc` (centisecond precision).

/// Parse an SRT timestamp (`HH:MM:SS,mmm`) to total seconds.
///
/// A `.` is accepted in place of the `,` separator. Malformed input yields
/// `0.0` instead of an error, so a single bad cue never aborts a render.
///
/// # Examples
/// ```
/// use cutlist_models::timestamp::srt_time_to_seconds;
/// assert_eq!(srt_time_to_seconds("00:01:30,500"), 90.5);
/// assert_eq!(srt_time_to_seconds("garbage"), 0.0);
/// ```
pub fn srt_time_to_seconds(ts: &str) -> f64 {
    match parse_srt_time(ts) {
        Some(seconds) => seconds,
        None => {
            tracing::debug!(timestamp = ts, "Malformed SRT timestamp, using 0.0");
            0.0
        }
    }
}

fn parse_srt_time(ts: &str) -> Option<f64> {
    let parts: Vec<&str> = ts.trim().split(':').collect();
    let [hours, minutes, seconds] = parts.as_slice() else {
        return None;
    };

    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;

    let (whole, fraction) = match seconds.split_once([',', '.']) {
        Some((whole, fraction)) => (whole, fraction),
        None => (*seconds, "0"),
    };
    let whole: u32 = whole.parse().ok()?;
    if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let fraction: f64 = format!("0.{fraction}").parse().ok()?;

    Some(f64::from(hours) * 3600.0 + f64::from(minutes) * 60.0 + f64::from(whole) + fraction)
}

/// Format seconds as an ASS track time (`H:MM:SS.cc`).
///
/// Sub-millisecond digits and milliseconds are truncated, never rounded:
/// `1.239s` becomes `0:00:01.23` and `1.9996s` becomes `0:00:01.99`. Negative values clamp to zero.
pub fn seconds_to_track_time(seconds: f64) -> String {
    // Epsilon absorbs binary error such as 1.239 * 1000 = 1238.999...
    let total_ms = (seconds.max(0.0) * 1000.0 + 1e-6).floor() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let centis = (total_ms % 1000) / 10;
    format!("{}:{:02}:{:02}.{:02}", hours, minutes, secs, centis)
}

/// Convert an SRT timestamp straight to ASS track time.
pub fn srt_to_track_time(ts: &str) -> String {
    seconds_to_track_time(srt_time_to_seconds(ts))
}
