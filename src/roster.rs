//! Crime roster diffing
//!
//! Compares a crime's previous slot occupancy with the newly observed one and
//! turns the difference into `joined`/`left` action log entries.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Occupied slots of one crime, keyed by position id.
pub type SlotMap = BTreeMap<String, SlotSnapshot>;

/// Stored view of one occupied slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    pub user_id: u64,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub checkpoint_pass_rate: Option<serde_json::Number>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub position_number: Option<u32>,
    #[serde(default)]
    pub item_available: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotAction {
    Joined,
    Left,
}

/// One roster change; the slot snapshot is flattened into the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEntry {
    pub timestamp: i64,
    pub action: SlotAction,
    pub slot: String,
    #[serde(flatten)]
    pub snapshot: SlotSnapshot,
}

impl ActionEntry {
    fn new(timestamp: i64, action: SlotAction, slot: &str, snapshot: &SlotSnapshot) -> Self {
        Self {
            timestamp,
            action,
            slot: slot.to_string(),
            snapshot: snapshot.clone(),
        }
    }
}

/// Diff two slot maps into action entries, visiting slot ids in order.
///
/// An occupant swap in one slot yields `left` (old) before `joined` (new).
/// Slots whose occupant kept the same user id emit nothing, whatever else
/// changed.
pub fn diff_slots(prev: &SlotMap, next: &SlotMap, timestamp: i64) -> Vec<ActionEntry> {
    let slots: BTreeSet<&String> = prev.keys().chain(next.keys()).collect();
    let mut entries = Vec::new();

    for slot in slots {
        match (prev.get(slot), next.get(slot)) {
            (None, Some(curr)) => {
                entries.push(ActionEntry::new(timestamp, SlotAction::Joined, slot, curr));
            }
            (Some(old), None) => {
                entries.push(ActionEntry::new(timestamp, SlotAction::Left, slot, old));
            }
            (Some(old), Some(curr)) if old.user_id != curr.user_id => {
                entries.push(ActionEntry::new(timestamp, SlotAction::Left, slot, old));
                entries.push(ActionEntry::new(timestamp, SlotAction::Joined, slot, curr));
            }
            _ => {}
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(user_id: u64, name: &str) -> SlotSnapshot {
        SlotSnapshot {
            user_id,
            user_name: name.to_string(),
            checkpoint_pass_rate: Some(70.into()),
            position: Some("Hacker".to_string()),
            position_number: Some(1),
            item_available: Some(true),
        }
    }

    #[test]
    fn new_slot_emits_joined() {
        let prev = SlotMap::new();
        let next = SlotMap::from([("P1".to_string(), slot(1, "alpha"))]);

        let entries = diff_slots(&prev, &next, 500);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, SlotAction::Joined);
        assert_eq!(entries[0].slot, "P1");
        assert_eq!(entries[0].timestamp, 500);
        assert_eq!(entries[0].snapshot.user_id, 1);
    }

    #[test]
    fn swapped_occupant_emits_left_then_joined() {
        let prev = SlotMap::from([("P1".to_string(), slot(1, "alpha"))]);
        let next = SlotMap::from([("P1".to_string(), slot(2, "beta"))]);

        let entries = diff_slots(&prev, &next, 900);
        let actions: Vec<_> = entries.iter().map(|e| (e.action, e.snapshot.user_id)).collect();
        assert_eq!(actions, vec![(SlotAction::Left, 1), (SlotAction::Joined, 2)]);
        assert!(entries.iter().all(|e| e.timestamp == 900));
    }

    #[test]
    fn same_occupant_with_new_fields_is_silent() {
        let prev = SlotMap::from([("P1".to_string(), slot(1, "alpha"))]);
        let mut changed = slot(1, "alpha-renamed");
        changed.checkpoint_pass_rate = Some(95.into());
        changed.item_available = Some(false);
        let next = SlotMap::from([("P1".to_string(), changed)]);

        assert!(diff_slots(&prev, &next, 10).is_empty());
    }

    #[test]
    fn entry_serializes_flat() {
        let entry = ActionEntry::new(42, SlotAction::Left, "P3", &slot(9, "gamma"));
        let value = serde_json::to_value(&entry).expect("serialize");
        assert_eq!(value["action"], "left");
        assert_eq!(value["slot"], "P3");
        assert_eq!(value["user_id"], 9);
        assert_eq!(value["user_name"], "gamma");
        assert_eq!(value["checkpoint_pass_rate"], 70);

        let back: ActionEntry = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, entry);
    }
}
