//! # rrule-overlay
//!
//! Layered broadcast-schedule overrides over recurrence rules.
//!
//! A schedule is an ordered log of overrides: some entries are single
//! instants, others are recurrence rules generating unboundedly many
//! occurrences, and later-added entries win wherever occurrences
//! coincide. The engine answers "what is scheduled at instant X",
//! enumerates effective occurrences in a window, finds the next
//! occurrence matching a label, and compacts away entries that can no
//! longer win — all without ever materializing an infinite occurrence
//! set, by bounding every unbounded computation to an explicit finite
//! window (±100 years around a caller-supplied "now" by default).
//!
//! The engine performs no I/O and never reads the system clock; RFC
//! 5545 expansion is delegated to the [`rrule`] crate.
//!
//! ## Modules
//!
//! - [`overlay`] — the overlay log: precedence, range queries,
//!   compaction, next-occurrence search
//! - [`instant`] — an absolute moment with an attached display zone
//! - [`recur`] — recurrence capability over `rrule` (membership test,
//!   bounded enumeration, canonical text)
//! - [`persist`] — order-preserving serde records for a log
//! - [`labels`] — short-code → display-term catalog for callers
//! - [`error`] — error types
//!
//! ## Quick start
//!
//! ```
//! use rrule_overlay::{Instant, OverlayLog, Recurrence};
//!
//! let mut log: OverlayLog<String> = OverlayLog::new();
//!
//! // Weekly show, Mondays 20:00 UTC.
//! let weekly = Recurrence::parse("DTSTART:20240101T200000Z\nRRULE:FREQ=WEEKLY").unwrap();
//! log.add(weekly, Some("Movie Night".to_string()));
//!
//! // A later one-off override wins over the rule at that slot.
//! let special = Instant::parse("2024-01-08T20:00:00Z").unwrap();
//! log.add(special, Some("Anniversary".to_string()));
//!
//! let shows = log.between(
//!     Instant::parse("2024-01-01T00:00:00Z").unwrap(),
//!     Instant::parse("2024-01-15T23:59:59Z").unwrap(),
//! );
//! assert_eq!(shows.len(), 3);
//! assert_eq!(shows[1].1, "Anniversary");
//! ```

pub mod error;
pub mod instant;
pub mod labels;
pub mod overlay;
pub mod persist;
pub mod recur;

pub use error::{OverlayError, Result};
pub use instant::Instant;
pub use labels::LabelCatalog;
pub use overlay::{OverlayEntry, OverlayLog, TemporalKey, Window, HORIZON_YEARS};
pub use persist::{from_json, to_json, EntryRecord, KeyRecord};
pub use recur::{Recurrence, MAX_OCCURRENCES};
