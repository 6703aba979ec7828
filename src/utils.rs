use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Collapse every whitespace run to a single space and trim the ends
pub fn format_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hours between `first` and `last`.
///
/// Uses the whole-day/second decomposition of the difference, so the
/// sub-second part is dropped and negative spans floor towards the past.
pub fn diff_hours(first: DateTime<Utc>, last: DateTime<Utc>) -> f64 {
    let diff = last - first;
    let total_seconds = match diff.num_microseconds() {
        Some(micros) => micros.div_euclid(1_000_000),
        None => diff.num_seconds(),
    };
    let days = total_seconds.div_euclid(86_400);
    let seconds = total_seconds.rem_euclid(86_400);

    (days as f64 * 24.0) + (seconds as f64 / 3600.0)
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a crawl timestamp.
///
/// Accepts RFC 3339, the older `+00:00Z` form, and naive timestamps
/// which are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    if let Some(stripped) = raw.strip_suffix('Z') {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(stripped) {
            return Some(parsed.with_timezone(&Utc));
        }
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}
