//! The overlay log: an ordered sequence of schedule overrides.
//!
//! A schedule is expressed as layers. Each entry pairs a temporal key
//! (a single instant or a recurrence rule) with a label, and later
//! entries win wherever their occurrences coincide with earlier ones.
//! A `None` label is a mask: it makes every instant the key covers
//! read as "nothing scheduled" against all earlier layers.
//!
//! Precedence is a reverse linear scan over the entry list — insertion
//! order is the sole precedence signal, and logs are small (tens of
//! entries), so no interval index is kept.
//!
//! Everything that must reason about a rule's unbounded occurrence set
//! does so inside an explicit finite [`Window`]; the default analysis
//! horizon is ±[`HORIZON_YEARS`] years around a caller-supplied "now".
//! The engine never reads the system clock.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::instant::Instant;
use crate::recur::Recurrence;

/// Radius of the default analysis window around "now". Coverage and
/// compaction reasoning is only valid inside it.
pub const HORIZON_YEARS: u32 = 100;

/// `t + HORIZON_YEARS`, saturating at the calendar's edge.
fn horizon_after(t: DateTime<Utc>) -> DateTime<Utc> {
    t.checked_add_months(Months::new(HORIZON_YEARS * 12))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// `t - HORIZON_YEARS`, saturating at the calendar's edge.
fn horizon_before(t: DateTime<Utc>) -> DateTime<Utc> {
    t.checked_sub_months(Months::new(HORIZON_YEARS * 12))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

// ── Temporal keys ───────────────────────────────────────────────────────────

/// What an overlay entry keys on: one instant, or a rule generating
/// many.
///
/// The two variants share nothing beyond coverage testing and bounded
/// enumeration, which is why this is a plain sum type rather than a
/// trait object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemporalKey {
    /// A single point in time.
    At(Instant),
    /// A recurrence rule's whole occurrence set.
    Repeat(Recurrence),
}

impl TemporalKey {
    /// Whether `t` is one of this key's occurrences.
    pub fn covers(&self, t: Instant) -> bool {
        match self {
            TemporalKey::At(a) => *a == t,
            TemporalKey::Repeat(r) => r.covers(t),
        }
    }
}

impl From<Instant> for TemporalKey {
    fn from(t: Instant) -> Self {
        TemporalKey::At(t)
    }
}

impl From<Recurrence> for TemporalKey {
    fn from(r: Recurrence) -> Self {
        TemporalKey::Repeat(r)
    }
}

impl std::fmt::Display for TemporalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemporalKey::At(t) => t.fmt(f),
            TemporalKey::Repeat(r) => r.fmt(f),
        }
    }
}

// ── Windows ─────────────────────────────────────────────────────────────────

/// A finite, inclusive analysis window.
///
/// Every computation that would otherwise range over a rule's
/// unbounded occurrence set is restricted to one of these. The struct
/// form (always exactly a start and an end) is what makes a malformed
/// bound unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    start: Instant,
    end: Instant,
}

impl Window {
    /// A window from `start` to `end`, inclusive. An inverted pair is
    /// allowed and simply contains nothing.
    pub fn new(start: Instant, end: Instant) -> Self {
        Self { start, end }
    }

    /// The default horizon: ±[`HORIZON_YEARS`] years around `now`.
    pub fn around(now: DateTime<Utc>) -> Self {
        Self {
            start: Instant::new(horizon_before(now), Tz::UTC),
            end: Instant::new(horizon_after(now), Tz::UTC),
        }
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn end(&self) -> Instant {
        self.end
    }

    pub fn contains(&self, t: Instant) -> bool {
        self.start <= t && t <= self.end
    }
}

// ── Entries and the log ─────────────────────────────────────────────────────

/// One layer of the schedule: a temporal key and the label it assigns.
/// `label: None` is a mask — the key's occurrences read as explicitly
/// absent against all earlier entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayEntry<V> {
    pub key: TemporalKey,
    pub label: Option<V>,
}

/// An ordered log of schedule overrides with last-writer-wins
/// precedence.
///
/// Entries are only ever appended ([`add`](OverlayLog::add)) or
/// physically deleted when provably irrelevant
/// ([`cull_covered`](OverlayLog::cull_covered)); they are never
/// mutated in place. The log owns no I/O and never consults a clock —
/// callers pass the "now" anchor where one is needed, and callers are
/// responsible for serializing access if they share a log across
/// threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayLog<V> {
    entries: Vec<OverlayEntry<V>>,
}

impl<V> Default for OverlayLog<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> OverlayLog<V> {
    /// An empty log.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// A log from an already-ordered entry list (e.g. one reloaded
    /// from persistence). Order is meaning; it is taken as given.
    pub fn from_entries(entries: Vec<OverlayEntry<V>>) -> Self {
        Self { entries }
    }

    /// The entries in insertion order.
    pub fn entries(&self) -> &[OverlayEntry<V>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an override. No validation and no dedup: adding the same
    /// pair twice leaves two entries with identical effect.
    pub fn add(&mut self, key: impl Into<TemporalKey>, label: Option<V>) {
        self.entries.push(OverlayEntry {
            key: key.into(),
            label,
        });
    }

    /// Mask every instant `key` covers, regardless of earlier entries.
    /// Sugar for [`add`](OverlayLog::add) with a `None` label.
    pub fn remove(&mut self, key: impl Into<TemporalKey>) {
        self.add(key, None);
    }

    /// The effective label at `t`: the label of the last entry whose
    /// key covers `t`. `None` when nothing covers `t` or the covering
    /// entry is a mask — the two cases are deliberately
    /// indistinguishable, both read as "nothing scheduled".
    pub fn effective_label_at(&self, t: Instant) -> Option<&V> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.key.covers(t))
            .and_then(|e| e.label.as_ref())
    }

    /// Whether anything (non-mask) is scheduled at `t`.
    pub fn contains(&self, t: Instant) -> bool {
        self.effective_label_at(t).is_some()
    }

    /// All effective, labeled occurrences in `[start, end]` inclusive,
    /// ascending, each instant at most once.
    ///
    /// Candidates are collected per entry restricted to the window —
    /// an instant entry contributes itself if in range, a rule entry
    /// its enumerated occurrences — then the last-inserted entry wins
    /// per candidate and masked candidates are dropped. Rules are
    /// never enumerated outside the window, so the query stays finite
    /// for unbounded rules. `start > end` yields an empty result.
    pub fn between(&self, start: Instant, end: Instant) -> Vec<(Instant, V)>
    where
        V: Clone,
    {
        if start > end {
            return Vec::new();
        }
        let mut hits: BTreeMap<Instant, Option<&V>> = BTreeMap::new();
        for entry in &self.entries {
            match &entry.key {
                TemporalKey::At(t) => {
                    if start <= *t && *t <= end {
                        hits.insert(*t, entry.label.as_ref());
                    }
                }
                TemporalKey::Repeat(r) => {
                    for t in r.occurrences_between(start, end) {
                        hits.insert(t, entry.label.as_ref());
                    }
                }
            }
        }
        hits.into_iter()
            .filter_map(|(t, label)| label.map(|v| (t, v.clone())))
            .collect()
    }

    /// Mask every effective occurrence on the given calendar day, in
    /// the given zone. Does nothing when the day is already empty.
    pub fn remove_date(&mut self, date: NaiveDate, zone: Tz)
    where
        V: Clone,
    {
        let Some(start) = zone
            .from_local_datetime(&date.and_time(NaiveTime::MIN))
            .earliest()
        else {
            return;
        };
        let Some(next) = date.succ_opt() else {
            return;
        };
        let end_naive = next.and_time(NaiveTime::MIN) - Duration::seconds(1);
        let Some(end) = zone.from_local_datetime(&end_naive).latest() else {
            return;
        };
        let doomed = self.between(Instant::from_zoned(start), Instant::from_zoned(end));
        for (t, _) in doomed {
            self.remove(t);
        }
    }

    /// The minimal instant at or after `from`, within
    /// `[from, from + HORIZON_YEARS]`, whose effective label is
    /// non-mask and (when `label` is given) equals `label`. `None`
    /// when no candidate survives inside the horizon.
    ///
    /// Each matching entry's uncovered occurrences are probed against
    /// `[from, best-so-far]`, so the search window shrinks as better
    /// candidates appear and later entries can only be enumerated over
    /// ranges already known to matter.
    pub fn get_next(&self, label: Option<&V>, from: Instant) -> Option<Instant>
    where
        V: PartialEq,
    {
        let mut limit = Instant::new(horizon_after(from.utc()), from.zone());
        let mut best: Option<Instant> = None;
        for (i, entry) in self.entries.iter().enumerate() {
            let Some(have) = entry.label.as_ref() else {
                continue; // masks schedule nothing
            };
            if let Some(want) = label {
                if have != want {
                    continue;
                }
            }
            let window = Window::new(from, limit);
            let survivors = uncovered(&entry.key, &self.entries[i + 1..], window);
            if let Some(t) = survivors.into_iter().next() {
                best = Some(t);
                limit = t;
            }
        }
        best
    }

    /// Compact the log: delete entries that can never win inside the
    /// default horizon around `now`, and replace a rule whose only
    /// uncovered occurrence is a single instant with that instant.
    ///
    /// Walks oldest-to-newest; an entry is deleted only when every
    /// occurrence it produces inside the horizon is also produced by
    /// some later entry. Queries inside the horizon are unaffected.
    ///
    /// This is a bounded-horizon heuristic, not a universally safe
    /// transformation: an unbounded rule whose occurrences are fully
    /// covered *inside* the horizon might still matter beyond it, and
    /// such an entry is dropped anyway. Callers accepting that
    /// trade-off should still treat compaction as a single atomic
    /// step — finish it before snapshotting the log for persistence.
    pub fn cull_covered(&mut self, now: DateTime<Utc>) {
        let window = Window::around(now);
        let mut doomed: Vec<usize> = Vec::new();
        let mut simplified: Vec<(usize, Instant)> = Vec::new();
        // The newest entry always wins somewhere or is the log's last
        // word; it is never examined.
        for i in 0..self.entries.len().saturating_sub(1) {
            let survivors = uncovered(&self.entries[i].key, &self.entries[i + 1..], window);
            if survivors.is_empty() {
                doomed.push(i);
            } else if matches!(self.entries[i].key, TemporalKey::Repeat(_)) && survivors.len() == 1
            {
                if let Some(t) = survivors.into_iter().next() {
                    simplified.push((i, t));
                }
            }
        }
        for (i, t) in simplified {
            self.entries[i].key = TemporalKey::At(t);
        }
        for i in doomed.into_iter().rev() {
            self.entries.remove(i);
        }
    }
}

impl<V: std::fmt::Display> std::fmt::Display for OverlayLog<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let key = entry.key.to_string().replace('\n', "\n\t");
            match &entry.label {
                Some(v) => write!(f, "{v}: {key}")?,
                None => write!(f, "masked: {key}")?,
            }
        }
        Ok(())
    }
}

// ── Coverage ────────────────────────────────────────────────────────────────

/// The occurrences of `target` inside `window` that no entry in
/// `later` also produces inside `window`.
///
/// This is the shared primitive behind compaction and next-occurrence
/// search: an empty result means `target` can never win against
/// `later` anywhere in `window`. The window must be finite, which is
/// what keeps the subtraction defined for unbounded rules.
fn uncovered<V>(
    target: &TemporalKey,
    later: &[OverlayEntry<V>],
    window: Window,
) -> BTreeSet<Instant> {
    let mut base: BTreeSet<Instant> = match target {
        TemporalKey::At(t) => {
            if window.contains(*t) {
                BTreeSet::from([*t])
            } else {
                return BTreeSet::new();
            }
        }
        TemporalKey::Repeat(r) => r
            .occurrences_between(window.start(), window.end())
            .into_iter()
            .collect(),
    };
    for entry in later {
        if base.is_empty() {
            break;
        }
        match &entry.key {
            TemporalKey::At(t) => {
                base.remove(t);
            }
            TemporalKey::Repeat(r) => {
                for t in r.occurrences_between(window.start(), window.end()) {
                    base.remove(&t);
                }
            }
        }
    }
    base
}
