//! Schedule string parsing
//!
//! Turns human-entered time expressions into publish timestamps for the
//! queue CLI.

use crate::{GramcastError, Result};
use chrono::{DateTime, Duration, Utc};

/// Parse a schedule string into a DateTime
///
/// Supports multiple formats:
/// - Relative durations: "1h", "30m", "2d"
/// - Natural language: "tomorrow", "next friday 9am"
///
/// # Errors
///
/// Returns an error if the time format is invalid or cannot be parsed.
pub fn parse_schedule(input: &str) -> Result<DateTime<Utc>> {
    if input.is_empty() {
        return Err(GramcastError::InvalidInput(
            "Schedule string cannot be empty".to_string(),
        ));
    }

    if let Ok(duration) = parse_duration(input) {
        return Ok(Utc::now() + duration);
    }

    if let Ok(dt) = parse_natural_language(input) {
        return Ok(dt);
    }

    Err(GramcastError::InvalidInput(format!(
        "Could not parse schedule string: {}",
        input
    )))
}

/// Parse a duration string into a chrono::Duration
fn parse_duration(input: &str) -> Result<Duration> {
    if let Ok(std_duration) = humantime::parse_duration(input) {
        let seconds = std_duration.as_secs() as i64;
        return Duration::try_seconds(seconds)
            .ok_or_else(|| GramcastError::InvalidInput("Duration out of range".to_string()));
    }

    Err(GramcastError::InvalidInput(format!(
        "Could not parse duration: {}",
        input
    )))
}

/// Parse natural language time expression
fn parse_natural_language(input: &str) -> Result<DateTime<Utc>> {
    chrono_english::parse_date_string(input, Utc::now(), chrono_english::Dialect::Us)
        .map_err(|e| GramcastError::InvalidInput(format!("Could not parse time: {}", e)))
}
