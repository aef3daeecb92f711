use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

/// Canonical text form of a parsed timestamp inside a dataset.
///
/// Nanosecond precision; a timestamp written with an offset keeps it as a
/// `+HHMM` suffix.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// A parsed timestamp: the wall-clock time it was written in and its UTC
/// offset, when the source carried one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    local: NaiveDateTime,
    offset: Option<FixedOffset>,
}

impl Timestamp {
    pub fn naive(local: NaiveDateTime) -> Self {
        Self {
            local,
            offset: None,
        }
    }

    pub fn zoned(dt: DateTime<FixedOffset>) -> Self {
        Self {
            local: dt.naive_local(),
            offset: Some(*dt.offset()),
        }
    }

    /// Wall-clock time as written; drives week assignment.
    pub fn local(&self) -> NaiveDateTime {
        self.local
    }

    pub fn offset(&self) -> Option<FixedOffset> {
        self.offset
    }

    /// The UTC instant. Timestamps without an offset are read as UTC.
    pub fn instant(&self) -> NaiveDateTime {
        match self.offset {
            Some(offset) => self.local - offset,
            None => self.local,
        }
    }

    /// Text in [`CANONICAL_FORMAT`], with the offset appended when known.
    pub fn to_canonical(&self) -> String {
        let mut text = format_timestamp(&self.local);
        if let Some(offset) = self.offset {
            text.push_str(&offset.to_string().replace(':', ""));
        }
        text
    }
}

/// Primary patterns carrying a UTC offset, tried first.
const OFFSET_PATTERN: &str = "%Y-%m-%d %H:%M:%S%.f%z";

/// Primary naive patterns, in the order they are attempted after the offset form.
const NAIVE_PATTERNS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

/// Browser `Date.toString()` form, e.g. `Sun Mar 10 2024 08:00:00 GMT+0200`.
const VERBOSE_PATTERN: &str = "%a %b %d %Y %H:%M:%S GMT%z";

const DATE_PATTERN: &str = "%Y-%m-%d";

/// Best-effort patterns used once every primary pattern failed.
const FALLBACK_OFFSET_PATTERNS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%d %b %Y %H:%M:%S %z"];

const FALLBACK_DATETIME_PATTERNS: [&str; 10] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d %b %Y %H:%M:%S",
    "%b %d %Y %H:%M:%S",
    "%a %b %d %H:%M:%S %Y",
];

const FALLBACK_DATE_PATTERNS: [&str; 7] = [
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%Y%m%d",
];

/// Parse a modification timestamp found in the extract.
///
/// Tries, in order: ISO with fractional seconds and offset, ISO with
/// fractional seconds, ISO without fractional seconds, the verbose
/// `weekday month day year time GMT±offset` form, and a plain date. If none
/// match, a list of common alternative layouts is tried.
///
/// Offsets are dropped: the result is the local wall-clock time the
/// timestamp was written in. Use [`parse_zoned`] to keep them.
///
/// # Returns
/// * `Some(NaiveDateTime)` on success
/// * `None` for blank input or when every attempt fails
///
/// # Example
/// ```
/// use veloverify::time::parse_timestamp;
///
/// let ts = parse_timestamp("2024-03-13 08:00:00.250+0200").unwrap();
/// assert_eq!(ts.to_string(), "2024-03-13 08:00:00.250");
/// assert!(parse_timestamp("not a date").is_none());
/// ```
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    parse_zoned(raw).map(|ts| ts.local())
}

/// Parse like [`parse_timestamp`], keeping the UTC offset when the source has one.
///
/// # Example
/// ```
/// use veloverify::time::parse_zoned;
///
/// let early = parse_zoned("2024-03-13 09:00:00+0200").unwrap();
/// let late = parse_zoned("2024-03-13 08:00:00+0000").unwrap();
/// assert!(early.local() > late.local());
/// assert!(early.instant() < late.instant());
/// ```
pub fn parse_zoned(raw: &str) -> Option<Timestamp> {
    let value = raw.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_str(value, OFFSET_PATTERN) {
        return Some(Timestamp::zoned(dt));
    }

    for pattern in NAIVE_PATTERNS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, pattern) {
            return Some(Timestamp::naive(dt));
        }
    }

    if let Ok(dt) = DateTime::parse_from_str(strip_zone_name(value), VERBOSE_PATTERN) {
        return Some(Timestamp::zoned(dt));
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, DATE_PATTERN) {
        return Some(Timestamp::naive(date.and_time(NaiveTime::MIN)));
    }

    parse_fallback(value)
}

/// Formats a timestamp in [`CANONICAL_FORMAT`].
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(CANONICAL_FORMAT).to_string()
}

fn parse_fallback(value: &str) -> Option<Timestamp> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(Timestamp::zoned(dt));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(Timestamp::zoned(dt));
    }

    for pattern in FALLBACK_OFFSET_PATTERNS {
        if let Ok(dt) = DateTime::parse_from_str(value, pattern) {
            return Some(Timestamp::zoned(dt));
        }
    }

    for pattern in FALLBACK_DATETIME_PATTERNS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, pattern) {
            return Some(Timestamp::naive(dt));
        }
    }

    FALLBACK_DATE_PATTERNS
        .iter()
        .find_map(|pattern| NaiveDate::parse_from_str(value, pattern).ok())
        .map(|date| Timestamp::naive(date.and_time(NaiveTime::MIN)))
}

/// Drops a trailing `(Zone Name)` that browsers append after the offset.
fn strip_zone_name(value: &str) -> &str {
    match value.rfind(" (") {
        Some(idx) if value.ends_with(')') => value[..idx].trim_end(),
        _ => value,
    }
}
