//! A single absolute point in time with an attached display zone.
//!
//! Scheduling is done on absolute time: two [`Instant`]s are equal when
//! they name the same moment, regardless of which zone each carries.
//! The zone exists so callers can render the instant the way it was
//! authored ("20:00 America/New_York" stays readable after a round
//! trip through UTC).

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::{OverlayError, Result};

/// An absolute point in time plus the IANA zone it should display in.
///
/// Comparison, ordering, and equality use the UTC moment only — the
/// zone never affects scheduling semantics. Sub-second precision is
/// truncated at construction, since recurrence enumeration is
/// second-granular.
#[derive(Debug, Clone, Copy)]
pub struct Instant {
    utc: DateTime<Utc>,
    zone: Tz,
}

impl Instant {
    /// Create an instant from a UTC moment and a display zone.
    pub fn new(utc: DateTime<Utc>, zone: Tz) -> Self {
        let utc = utc.with_nanosecond(0).unwrap_or(utc);
        Self { utc, zone }
    }

    /// Create an instant from a zoned datetime, keeping its zone for display.
    pub fn from_zoned(dt: DateTime<Tz>) -> Self {
        let zone = dt.timezone();
        Self::new(dt.with_timezone(&Utc), zone)
    }

    /// Parse an instant from text.
    ///
    /// # Accepted forms
    ///
    /// - RFC 3339: `"2024-01-01T20:00:00Z"`, `"2024-01-01T15:00:00-05:00"`
    ///   (display zone defaults to UTC)
    /// - RFC 3339 followed by an IANA zone name:
    ///   `"2024-01-01T20:00:00Z America/New_York"` (same moment, shown
    ///   in the named zone)
    /// - Naive ISO 8601 followed by an IANA zone name:
    ///   `"2024-01-01 20:00:00 Europe/London"` (wall-clock time in that
    ///   zone)
    /// - Bare naive ISO 8601: read as UTC
    ///
    /// # Errors
    ///
    /// [`OverlayError::InvalidDatetime`] when the datetime part cannot
    /// be parsed, or when a naive wall-clock time is ambiguous or
    /// nonexistent in the named zone (DST transitions). A trailing
    /// token that is not a valid zone name is treated as part of the
    /// datetime text, so a typoed zone surfaces as a datetime error.
    ///
    /// # Examples
    ///
    /// ```
    /// use rrule_overlay::Instant;
    ///
    /// let a = Instant::parse("2024-01-01T20:00:00Z").unwrap();
    /// let b = Instant::parse("2024-01-01T15:00:00-05:00 America/New_York").unwrap();
    /// assert_eq!(a, b); // same moment, different display zones
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Ok(Self::new(dt.with_timezone(&Utc), Tz::UTC));
        }

        if let Some((head, tail)) = text.rsplit_once(char::is_whitespace) {
            if let Ok(zone) = tail.parse::<Tz>() {
                let head = head.trim_end();
                if let Ok(dt) = DateTime::parse_from_rfc3339(head) {
                    return Ok(Self::new(dt.with_timezone(&Utc), zone));
                }
                let naive = parse_naive(head)
                    .ok_or_else(|| OverlayError::InvalidDatetime(format!("'{head}'")))?;
                return match zone.from_local_datetime(&naive) {
                    LocalResult::Single(dt) => Ok(Self::from_zoned(dt)),
                    LocalResult::Ambiguous(..) => Err(OverlayError::InvalidDatetime(format!(
                        "'{text}' is ambiguous in {zone} (clocks fall back)"
                    ))),
                    LocalResult::None => Err(OverlayError::InvalidDatetime(format!(
                        "'{text}' does not exist in {zone} (clocks spring forward)"
                    ))),
                };
            }
        }

        let naive =
            parse_naive(text).ok_or_else(|| OverlayError::InvalidDatetime(format!("'{text}'")))?;
        Ok(Self::new(Utc.from_utc_datetime(&naive), Tz::UTC))
    }

    /// The moment in UTC.
    pub fn utc(&self) -> DateTime<Utc> {
        self.utc
    }

    /// The attached display zone.
    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// The moment expressed in the attached zone.
    pub fn local(&self) -> DateTime<Tz> {
        self.utc.with_timezone(&self.zone)
    }

    /// The same moment with a different display zone.
    pub fn in_zone(&self, zone: Tz) -> Self {
        Self {
            utc: self.utc,
            zone,
        }
    }
}

impl PartialEq for Instant {
    fn eq(&self, other: &Self) -> bool {
        self.utc == other.utc
    }
}

impl Eq for Instant {}

impl PartialOrd for Instant {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Instant {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.utc.cmp(&other.utc)
    }
}

impl std::fmt::Display for Instant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}",
            self.local().format("%Y-%m-%d %H:%M:%S"),
            self.zone.name()
        )
    }
}

/// Parse the naive ISO 8601 forms accepted by [`Instant::parse`].
fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_defaults_to_utc_display() {
        let t = Instant::parse("2024-01-01T20:00:00Z").unwrap();
        assert_eq!(t.zone(), Tz::UTC);
        assert_eq!(t.to_string(), "2024-01-01 20:00:00 UTC");
    }

    #[test]
    fn offset_form_keeps_the_moment() {
        let a = Instant::parse("2024-01-01T20:00:00Z").unwrap();
        let b = Instant::parse("2024-01-01T15:00:00-05:00").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn naive_with_zone_is_wall_clock() {
        let t = Instant::parse("2024-07-01 09:00:00 America/New_York").unwrap();
        // EDT is UTC-4 in July
        assert_eq!(t.utc(), Utc.with_ymd_and_hms(2024, 7, 1, 13, 0, 0).unwrap());
        assert_eq!(t.zone(), Tz::America__New_York);
    }

    #[test]
    fn bare_naive_reads_as_utc() {
        let t = Instant::parse("2024-01-01 20:00").unwrap();
        assert_eq!(t.utc(), Utc.with_ymd_and_hms(2024, 1, 1, 20, 0, 0).unwrap());
    }

    #[test]
    fn equality_ignores_display_zone() {
        let a = Instant::parse("2024-01-01T20:00:00Z").unwrap();
        let b = a.in_zone(Tz::Europe__London);
        assert_eq!(a, b);
        assert_ne!(a.to_string(), b.to_string());
    }

    #[test]
    fn subseconds_are_truncated() {
        let with_nanos = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
            + chrono::Duration::nanoseconds(999);
        let t = Instant::new(with_nanos, Tz::UTC);
        assert_eq!(t.utc(), Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(Instant::parse("not a datetime").is_err());
        assert!(Instant::parse("2024-13-01T00:00:00Z").is_err());
    }

    #[test]
    fn nonexistent_wall_clock_is_rejected() {
        // 2024-03-10 02:30 does not exist in New York (spring forward)
        assert!(Instant::parse("2024-03-10 02:30:00 America/New_York").is_err());
    }

    #[test]
    fn ambiguous_wall_clock_is_rejected() {
        // 2024-11-03 01:30 happens twice in New York (fall back)
        assert!(Instant::parse("2024-11-03 01:30:00 America/New_York").is_err());
    }
}
