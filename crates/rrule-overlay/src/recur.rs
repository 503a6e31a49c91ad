//! Recurrence capability: membership tests and bounded enumeration.
//!
//! [`Recurrence`] wraps an [`rrule::RRuleSet`] and exposes exactly the
//! two operations the overlay engine needs — "does this rule produce
//! instant X" and "list every occurrence inside a window" — plus a
//! canonical text form for persistence. RFC 5545 expansion itself is
//! the `rrule` crate's job; nothing here re-derives occurrence sets
//! from first principles.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;

use crate::error::{OverlayError, Result};
use crate::instant::Instant;

/// Enumeration safety valve. A window query never yields more than this
/// many occurrences; a rule dense enough to hit it (a `SECONDLY` rule
/// over decades, say) is truncated rather than looping unbounded.
pub const MAX_OCCURRENCES: usize = 1 << 18;

/// How many occurrences to pull per `rrule` call. The crate caps a
/// single enumeration at `u16::MAX`; longer windows are walked in
/// chunks from the last date seen.
const ENUMERATION_CHUNK: u16 = u16::MAX;

/// A recurrence rule: an opaque generator of a possibly unbounded set
/// of [`Instant`]s.
///
/// The canonical text form (via [`Display`](std::fmt::Display)) is an
/// iCalendar `DTSTART`/`RRULE` block including the start zone, and
/// round-trips exactly through [`Recurrence::parse`].
#[derive(Debug, Clone)]
pub struct Recurrence {
    set: RRuleSet,
}

impl Recurrence {
    /// Parse a recurrence rule from iCalendar text.
    ///
    /// The text must carry a `DTSTART` line followed by an `RRULE`
    /// (and optionally `RDATE`/`EXDATE`/`EXRULE`) line, e.g.
    ///
    /// ```text
    /// DTSTART;TZID=America/New_York:20240101T200000
    /// RRULE:FREQ=WEEKLY;BYDAY=MO
    /// ```
    ///
    /// A literal `\n` two-character escape is accepted in place of a
    /// newline, since chat-entered rules arrive on a single line.
    ///
    /// # Errors
    ///
    /// [`OverlayError::InvalidRule`] when the text is not a valid rule.
    /// Rejecting malformed rules here is what lets the overlay engine
    /// assume every key it holds is well-formed.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.replace("\\n", "\n");
        let set = text
            .parse::<RRuleSet>()
            .map_err(|e| OverlayError::InvalidRule(e.to_string()))?;
        Ok(Self { set })
    }

    /// Whether `instant` is an occurrence of this rule.
    pub fn covers(&self, instant: Instant) -> bool {
        let at = instant.utc().with_timezone(&rrule::Tz::UTC);
        let hits = self.set.clone().after(at).before(at).all(1);
        !hits.dates.is_empty()
    }

    /// Every occurrence in `[start, end]`, inclusive on both ends,
    /// ascending and duplicate-free. Empty when `start > end`.
    ///
    /// Returned instants carry the rule's start zone for display.
    /// Enumeration is truncated at [`MAX_OCCURRENCES`].
    pub fn occurrences_between(&self, start: Instant, end: Instant) -> Vec<Instant> {
        if start > end {
            return Vec::new();
        }
        let zone = self.zone();
        let upper = end.utc().with_timezone(&rrule::Tz::UTC);
        let mut lower = start.utc();
        let mut out: Vec<Instant> = Vec::new();

        loop {
            let bounded = self
                .set
                .clone()
                .after(lower.with_timezone(&rrule::Tz::UTC))
                .before(upper);
            let chunk = bounded.all(ENUMERATION_CHUNK);
            let last: Option<DateTime<Utc>> =
                chunk.dates.last().map(|d| d.with_timezone(&Utc));
            out.extend(
                chunk
                    .dates
                    .into_iter()
                    .map(|d| Instant::new(d.with_timezone(&Utc), zone)),
            );
            if !chunk.limited || out.len() >= MAX_OCCURRENCES {
                out.truncate(MAX_OCCURRENCES);
                break;
            }
            // Both bounds are inclusive; restart one second past the
            // last date seen so the boundary occurrence is not repeated.
            match last {
                Some(d) => lower = d + Duration::seconds(1),
                None => break,
            }
        }
        out
    }

    /// The IANA zone of the rule's `DTSTART`, used as the display zone
    /// for generated occurrences. Rules built against the system-local
    /// zone fall back to UTC.
    pub fn zone(&self) -> Tz {
        match self.set.get_dt_start().timezone() {
            rrule::Tz::Tz(tz) => tz,
            rrule::Tz::Local(_) => Tz::UTC,
        }
    }

    /// The rule's start as an [`Instant`].
    pub fn dt_start(&self) -> Instant {
        let start = self.set.get_dt_start();
        Instant::new(start.with_timezone(&Utc), self.zone())
    }
}

impl std::fmt::Display for Recurrence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.set.fmt(f)
    }
}

impl PartialEq for Recurrence {
    fn eq(&self, other: &Self) -> bool {
        // RRuleSet carries no cheap structural equality; the canonical
        // text form is the identity that persistence relies on anyway.
        self.set.to_string() == other.set.to_string()
    }
}

impl Eq for Recurrence {}

impl std::str::FromStr for Recurrence {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn inst(s: &str) -> Instant {
        Instant::parse(s).unwrap()
    }

    #[test]
    fn daily_count_rule_enumerates_inclusively() {
        let r = Recurrence::parse("DTSTART:20240101T120000Z\nRRULE:FREQ=DAILY;COUNT=3").unwrap();
        let got = r.occurrences_between(inst("2024-01-01T12:00:00Z"), inst("2024-01-03T12:00:00Z"));
        let want: Vec<Instant> = (1..=3)
            .map(|d| Instant::new(Utc.with_ymd_and_hms(2024, 1, d, 12, 0, 0).unwrap(), Tz::UTC))
            .collect();
        assert_eq!(got, want);
    }

    #[test]
    fn window_clips_occurrences() {
        let r = Recurrence::parse("DTSTART:20240101T120000Z\nRRULE:FREQ=DAILY;COUNT=5").unwrap();
        let got = r.occurrences_between(inst("2024-01-02T00:00:00Z"), inst("2024-01-03T23:00:00Z"));
        assert_eq!(got.len(), 2);
        assert_eq!(got[0], inst("2024-01-02T12:00:00Z"));
        assert_eq!(got[1], inst("2024-01-03T12:00:00Z"));
    }

    #[test]
    fn inverted_window_is_empty() {
        let r = Recurrence::parse("DTSTART:20240101T120000Z\nRRULE:FREQ=DAILY").unwrap();
        assert!(r
            .occurrences_between(inst("2024-02-01T00:00:00Z"), inst("2024-01-01T00:00:00Z"))
            .is_empty());
    }

    #[test]
    fn covers_is_exact_membership() {
        let r = Recurrence::parse("DTSTART:20240101T200000Z\nRRULE:FREQ=WEEKLY").unwrap();
        assert!(r.covers(inst("2024-01-08T20:00:00Z")));
        assert!(!r.covers(inst("2024-01-08T20:00:01Z")));
        assert!(!r.covers(inst("2024-01-09T20:00:00Z")));
    }

    #[test]
    fn canonical_text_round_trips() {
        let r = Recurrence::parse(
            "DTSTART;TZID=America/New_York:20240101T200000\nRRULE:FREQ=WEEKLY;BYDAY=MO",
        )
        .unwrap();
        let again = Recurrence::parse(&r.to_string()).unwrap();
        assert_eq!(r, again);
        assert_eq!(again.zone(), Tz::America__New_York);
    }

    #[test]
    fn escaped_newline_is_accepted() {
        let r = Recurrence::parse("DTSTART:20240101T120000Z\\nRRULE:FREQ=DAILY;COUNT=2").unwrap();
        assert!(r.covers(inst("2024-01-02T12:00:00Z")));
    }

    #[test]
    fn malformed_text_is_rejected() {
        assert!(Recurrence::parse("RRULE:FREQ=SOMETIMES").is_err());
        assert!(Recurrence::parse("not a rule at all").is_err());
    }

    #[test]
    fn occurrences_carry_the_rule_zone() {
        let r = Recurrence::parse(
            "DTSTART;TZID=Europe/London:20240601T090000\nRRULE:FREQ=DAILY;COUNT=1",
        )
        .unwrap();
        let got = r.occurrences_between(inst("2024-06-01T00:00:00Z"), inst("2024-06-02T00:00:00Z"));
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].zone(), Tz::Europe__London);
        // BST is UTC+1 in June
        assert_eq!(got[0], inst("2024-06-01T08:00:00Z"));
    }
}
