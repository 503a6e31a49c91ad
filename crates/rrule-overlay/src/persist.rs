//! Persisted form of an overlay log.
//!
//! A log serializes to an ordered list of records, one per entry, in
//! insertion order. Order is semantically load-bearing — it *is* the
//! precedence rule — so the round trip preserves it exactly. Writing
//! the list to durable storage (and locking around it) is the caller's
//! concern; this module only produces and consumes the records.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{OverlayError, Result};
use crate::instant::Instant;
use crate::overlay::{OverlayEntry, OverlayLog, TemporalKey};
use crate::recur::Recurrence;

/// The persisted shape of a temporal key.
///
/// Instants store the moment as RFC 3339 in UTC plus the IANA display
/// zone; rules store their canonical iCalendar text, which already
/// carries the start zone in its `DTSTART;TZID=` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeyRecord {
    Instant { value: String, tz: String },
    Rule { value: String },
}

/// One persisted entry: a key record paired with its label. A `null`
/// label is the explicit mask marker and is always written out, never
/// skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord<V> {
    #[serde(flatten)]
    pub key: KeyRecord,
    pub label: Option<V>,
}

impl From<&TemporalKey> for KeyRecord {
    fn from(key: &TemporalKey) -> Self {
        match key {
            TemporalKey::At(t) => KeyRecord::Instant {
                value: t.utc().to_rfc3339(),
                tz: t.zone().name().to_string(),
            },
            TemporalKey::Repeat(r) => KeyRecord::Rule {
                value: r.to_string(),
            },
        }
    }
}

impl TryFrom<KeyRecord> for TemporalKey {
    type Error = OverlayError;

    fn try_from(record: KeyRecord) -> Result<Self> {
        match record {
            KeyRecord::Instant { value, tz } => {
                let utc: DateTime<Utc> = DateTime::parse_from_rfc3339(&value)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| OverlayError::InvalidDatetime(format!("'{value}': {e}")))?;
                let zone: Tz = tz
                    .parse()
                    .map_err(|_| OverlayError::InvalidTimezone(format!("'{tz}'")))?;
                Ok(TemporalKey::At(Instant::new(utc, zone)))
            }
            KeyRecord::Rule { value } => Ok(TemporalKey::Repeat(Recurrence::parse(&value)?)),
        }
    }
}

impl<V> OverlayLog<V> {
    /// Snapshot the log as persisted records, in insertion order.
    pub fn to_records(&self) -> Vec<EntryRecord<V>>
    where
        V: Clone,
    {
        self.entries()
            .iter()
            .map(|entry| EntryRecord {
                key: KeyRecord::from(&entry.key),
                label: entry.label.clone(),
            })
            .collect()
    }

    /// Rebuild a log from persisted records, keeping their order.
    ///
    /// # Errors
    ///
    /// [`OverlayError::InvalidDatetime`], [`OverlayError::InvalidTimezone`],
    /// or [`OverlayError::InvalidRule`] when a record's key no longer
    /// parses.
    pub fn from_records(records: Vec<EntryRecord<V>>) -> Result<Self> {
        let entries = records
            .into_iter()
            .map(|record| {
                Ok(OverlayEntry {
                    key: TemporalKey::try_from(record.key)?,
                    label: record.label,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(OverlayLog::from_entries(entries))
    }
}

/// Serialize a log to a JSON array of entry records.
pub fn to_json<V>(log: &OverlayLog<V>) -> Result<String>
where
    V: Serialize + Clone,
{
    serde_json::to_string(&log.to_records())
        .map_err(|e| OverlayError::InvalidRecord(e.to_string()))
}

/// Rebuild a log from the JSON produced by [`to_json`].
pub fn from_json<V>(text: &str) -> Result<OverlayLog<V>>
where
    V: DeserializeOwned,
{
    let records: Vec<EntryRecord<V>> =
        serde_json::from_str(text).map_err(|e| OverlayError::InvalidRecord(e.to_string()))?;
    OverlayLog::from_records(records)
}
