//! Crime store updates
//!
//! Each run folds the polled crimes into the stored crime records. Only
//! crimes still forming (`planning`/`recruiting`) are tracked, plus the one
//! poll after a crime leaves `planning`, so the roster just before execution
//! is recorded at least once.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::roster::{diff_slots, ActionEntry, SlotMap, SlotSnapshot};
use crate::torn::{Crime, Member};

/// Crime store, keyed by crime id.
pub type CrimeDb = BTreeMap<u64, CrimeRecord>;

/// Fallback occupant name when a slot holder is not on the member roster.
pub const UNKNOWN_MEMBER: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrimeRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub ready_at: Option<i64>,
    #[serde(default)]
    pub executed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_crime_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_amount: Option<usize>,
    #[serde(default)]
    pub slots: SlotMap,
    #[serde(default)]
    pub action_log: Vec<ActionEntry>,
    /// Fields written by other tools, kept across merges
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CrimeRecord {
    pub fn is_planning(&self) -> bool {
        self.status.eq_ignore_ascii_case("planning")
    }

    /// Window end used for scoring: execution time, or `now` while pending.
    pub fn window_end(&self, now: i64) -> i64 {
        self.executed_at.unwrap_or(now)
    }
}

/// Whether a crime status means the crime is still forming.
pub fn is_forming(status: &str) -> bool {
    status.eq_ignore_ascii_case("planning") || status.eq_ignore_ascii_case("recruiting")
}

/// Whether an incoming crime should be folded into the store.
pub fn is_tracked(incoming: &Crime, stored: Option<&CrimeRecord>) -> bool {
    is_forming(&incoming.status) || stored.is_some_and(CrimeRecord::is_planning)
}

/// Occupied slots of an incoming crime, with occupant names resolved
/// against the member roster.
pub fn normalize_slots(crime: &Crime, members: &HashMap<u64, &Member>) -> SlotMap {
    crime
        .slots
        .iter()
        .filter_map(|slot| {
            let user = slot.user.as_ref()?;
            let user_name = members
                .get(&user.id)
                .map(|member| member.name.clone())
                .unwrap_or_else(|| UNKNOWN_MEMBER.to_string());
            let snapshot = SlotSnapshot {
                user_id: user.id,
                user_name,
                checkpoint_pass_rate: slot.checkpoint_pass_rate.clone(),
                position: slot.position.clone(),
                position_number: slot.position_number,
                item_available: slot
                    .item_requirement
                    .as_ref()
                    .and_then(|item| item.is_available),
            };
            Some((slot.position_id.clone(), snapshot))
        })
        .collect()
}

/// Merge a freshly observed crime into its stored record.
///
/// Timestamps and metadata prefer the fresh value and fall back to the
/// stored one; name, status and slots are always taken fresh; the action
/// log is carried forward with this poll's roster changes appended.
pub fn merge_crime(
    existing: Option<&CrimeRecord>,
    crime: &Crime,
    slots: SlotMap,
    now: i64,
) -> CrimeRecord {
    let empty = SlotMap::new();
    let prev_slots = existing.map_or(&empty, |record| &record.slots);

    let mut action_log = existing
        .map(|record| record.action_log.clone())
        .unwrap_or_default();
    action_log.extend(diff_slots(prev_slots, &slots, now));

    CrimeRecord {
        name: crime.name.clone(),
        status: crime.status.clone(),
        ready_at: crime.ready_at.or_else(|| existing.and_then(|r| r.ready_at)),
        executed_at: crime
            .executed_at
            .or_else(|| existing.and_then(|r| r.executed_at)),
        expired_at: crime.expired_at.or_else(|| existing.and_then(|r| r.expired_at)),
        difficulty: crime.difficulty.or_else(|| existing.and_then(|r| r.difficulty)),
        previous_crime_id: crime
            .previous_crime_id
            .or_else(|| existing.and_then(|r| r.previous_crime_id)),
        slot_amount: Some(crime.slots.len()),
        slots,
        action_log,
        extra: existing.map(|r| r.extra.clone()).unwrap_or_default(),
    }
}

/// Counts from one crime store update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrimeUpdateSummary {
    pub tracked: usize,
    pub skipped: usize,
    pub actions: usize,
}

/// Fold the polled crimes into the crime store.
pub fn update_crimes(
    db: &mut CrimeDb,
    crimes: &[Crime],
    members: &[Member],
    now: i64,
) -> CrimeUpdateSummary {
    let members_by_id: HashMap<u64, &Member> =
        members.iter().map(|member| (member.id, member)).collect();
    let mut summary = CrimeUpdateSummary::default();

    for crime in crimes {
        let Some(id) = crime.id else {
            debug!(name = %crime.name, "skipping crime without id");
            summary.skipped += 1;
            continue;
        };

        let stored = db.get(&id);
        if !is_tracked(crime, stored) {
            summary.skipped += 1;
            continue;
        }

        let slots = normalize_slots(crime, &members_by_id);
        let before = stored.map_or(0, |record| record.action_log.len());
        let record = merge_crime(stored, crime, slots, now);
        summary.actions += record.action_log.len() - before;
        summary.tracked += 1;
        db.insert(id, record);
    }

    summary
}
