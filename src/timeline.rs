//! Per-user activity timelines
//!
//! Each user's record is an ordered list of intervals. Intervals are
//! contiguous (`activities[i].end == activities[i + 1].start`) and only the
//! last one may be open. A new interval is appended only when the normalized
//! token changes, so one entry exists per detected change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::status::{LocationLookup, StatusNormalizer};
use crate::torn::Member;

/// User activity store, keyed by user id.
pub type UserDb = BTreeMap<u64, UserRecord>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

/// One canonical status held over `[start, end)`; `end` is `None` while open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub status: String,
    pub start: i64,
    pub end: Option<i64>,
}

impl Activity {
    pub fn open(status: impl Into<String>, start: i64) -> Self {
        Self {
            status: status.into(),
            start,
            end: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Whether the interval holds at instant `t`. Both bounds are inclusive,
    /// so at a change instant the earlier interval matches first.
    pub fn covers(&self, t: i64) -> bool {
        self.start <= t && self.end.map_or(true, |end| end >= t)
    }

    /// Whether the interval intersects `[from, to]`; open intervals are
    /// treated as ending at `to`.
    pub fn overlaps(&self, from: i64, to: i64) -> bool {
        self.end.unwrap_or(to) >= from && self.start <= to
    }
}

/// What applying one token did to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Created,
    Changed,
    Unchanged,
}

impl UserRecord {
    pub fn new(name: impl Into<String>, status: impl Into<String>, now: i64) -> Self {
        Self {
            name: name.into(),
            activities: vec![Activity::open(status, now)],
        }
    }

    pub fn current(&self) -> Option<&Activity> {
        self.activities.last()
    }

    /// Fold one observed token into the timeline at poll time `now`.
    pub fn apply(&mut self, status: &str, now: i64) -> Transition {
        match self.activities.last_mut() {
            None => {
                self.activities.push(Activity::open(status, now));
                Transition::Created
            }
            Some(last) if last.status == status => {
                last.end = None;
                Transition::Unchanged
            }
            Some(last) => {
                last.end = Some(now);
                self.activities.push(Activity::open(status, now));
                Transition::Changed
            }
        }
    }

    /// Check the contiguity invariant.
    pub fn is_contiguous(&self) -> bool {
        let Some((_, rest)) = self.activities.split_last() else {
            return true;
        };
        let linked = self
            .activities
            .windows(2)
            .all(|pair| pair[0].end == Some(pair[1].start));
        linked && rest.iter().all(|activity| !activity.is_open())
    }

    /// Intervals intersecting `[from, to]`, in order.
    pub fn window(&self, from: i64, to: i64) -> Vec<Activity> {
        self.activities
            .iter()
            .filter(|activity| activity.overlaps(from, to))
            .cloned()
            .collect()
    }
}

/// Counts from one timeline update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimelineSummary {
    pub created: usize,
    pub changed: usize,
    pub unchanged: usize,
}

/// Fold the polled member statuses into the user store.
///
/// Users missing from the poll keep their records untouched; their last
/// interval stays open.
pub fn update_activity<L: LocationLookup>(
    db: &mut UserDb,
    members: &[Member],
    normalizer: &StatusNormalizer<L>,
    now: i64,
) -> TimelineSummary {
    let mut summary = TimelineSummary::default();

    for member in members {
        let token = normalizer.normalize(&member.raw_status());
        match db.get_mut(&member.id) {
            None => {
                db.insert(member.id, UserRecord::new(member.name.clone(), token, now));
                summary.created += 1;
            }
            Some(record) => {
                if !member.name.is_empty() {
                    record.name.clone_from(&member.name);
                }
                match record.apply(&token, now) {
                    Transition::Created => summary.created += 1,
                    Transition::Changed => summary.changed += 1,
                    Transition::Unchanged => summary.unchanged += 1,
                }
            }
        }
    }

    summary
}
