//! Crime compliance scanning
//!
//! Once a crime's pending window (`ready_at` until execution, or now) is long
//! enough, the participants' timelines are replayed over that window to find
//! who held the crime up. The result is appended to the naughty list for
//! human review; a crime is scored at most once.
//!
//! Classification:
//! - *slacker*: not available at `ready_at`.
//! - *suspicious*: went unavailable during the window, verdict pending.
//! - *promoted*: was suspicious, became available while every other
//!   participant already was, so this participant alone held up the group.
//! - *cleared*: was suspicious, became available while someone else was
//!   still unavailable.
//!
//! Flagged participants are slackers and promoted ones. Suspicious
//! participants who never recover are not flagged.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ScanConfig;
use crate::crimes::{CrimeDb, CrimeRecord};
use crate::roster::SlotMap;
use crate::status::AVAILABLE;
use crate::timeline::{Activity, UserDb};

/// Naughty list, keyed by detection time.
pub type NaughtyDb = BTreeMap<String, NaughtyEntry>;

/// Review status given to every newly flagged participant.
pub const PENDING: &str = "pending";

/// Reviewer annotations the scanner does not know about, kept on save.
pub type Extra = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaughtyEntry {
    pub crime_id: u64,
    pub crime_name: String,
    pub ready_at: i64,
    pub executed_at: i64,
    pub crime_participants: SlotMap,
    /// Flagged participants keyed by user id
    #[serde(default)]
    pub slackers: BTreeMap<String, Classification>,
    pub delay_time: i64,
    #[serde(flatten)]
    pub extra: Extra,
}

impl NaughtyEntry {
    /// Whether `user_id` was flagged on this entry.
    pub fn is_flagged(&self, user_id: u64) -> bool {
        self.slackers.contains_key(&user_id.to_string())
    }

    /// Flagged participants whose review is still pending.
    pub fn pending(&self) -> impl Iterator<Item = (&String, &Classification)> {
        self.slackers
            .iter()
            .filter(|(_, classification)| classification.status == PENDING)
    }
}

/// Human review record for one flagged participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub status: String,
    #[serde(default)]
    pub handled_by: Option<String>,
    #[serde(default)]
    pub notes: Vec<serde_json::Value>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Classification {
    pub fn pending() -> Self {
        Self {
            status: PENDING.to_string(),
            handled_by: None,
            notes: Vec::new(),
            extra: Extra::new(),
        }
    }
}

/// Working sets at the end of one window scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub slackers: BTreeSet<u64>,
    pub suspicious: BTreeSet<u64>,
    pub cleared: BTreeSet<u64>,
    pub promoted: BTreeSet<u64>,
}

impl ScanOutcome {
    /// Participants to flag: slackers and promoted.
    pub fn flagged(&self) -> BTreeSet<u64> {
        self.slackers.union(&self.promoted).copied().collect()
    }
}

fn is_available_at(timeline: &[Activity], t: i64) -> bool {
    timeline
        .iter()
        .find(|activity| activity.covers(t))
        .is_some_and(|activity| activity.status == AVAILABLE)
}

/// Replay participant timelines over `[ready_at, window_end]`.
///
/// A participant with no interval covering an instant counts as
/// unavailable at that instant. `step` must be positive.
pub fn scan_window(
    participants: &BTreeSet<u64>,
    users: &UserDb,
    ready_at: i64,
    window_end: i64,
    step: i64,
) -> ScanOutcome {
    let timelines: BTreeMap<u64, Vec<Activity>> = participants
        .iter()
        .map(|uid| {
            let timeline = users
                .get(uid)
                .map(|record| record.window(ready_at, window_end))
                .unwrap_or_default();
            (*uid, timeline)
        })
        .collect();

    let mut outcome = ScanOutcome::default();

    for (uid, timeline) in &timelines {
        let at_ready = timeline.iter().find(|activity| activity.covers(ready_at));
        if at_ready.is_some_and(|activity| activity.status != AVAILABLE) {
            outcome.slackers.insert(*uid);
        }
    }

    let step = step.max(1);
    let mut t = ready_at;
    while t <= window_end {
        let availability: BTreeMap<u64, bool> = timelines
            .iter()
            .map(|(uid, timeline)| (*uid, is_available_at(timeline, t)))
            .collect();

        for (uid, available) in &availability {
            if !available {
                if !outcome.slackers.contains(uid) && !outcome.cleared.contains(uid) {
                    outcome.suspicious.insert(*uid);
                }
            } else if outcome.suspicious.remove(uid) {
                let others_available = availability
                    .iter()
                    .filter(|(other, _)| *other != uid)
                    .all(|(_, other_available)| *other_available);
                if others_available {
                    outcome.promoted.insert(*uid);
                } else {
                    outcome.cleared.insert(*uid);
                }
            }
        }

        t += step;
    }

    outcome
}

fn participants(slots: &SlotMap) -> BTreeSet<u64> {
    slots.values().map(|slot| slot.user_id).collect()
}

/// Score one crime if it qualifies.
///
/// Qualifies when `ready_at` is a positive timestamp, the window is at least
/// `min_window_secs` long and the crime has participants.
pub fn score_crime(
    crime_id: u64,
    crime: &CrimeRecord,
    users: &UserDb,
    scan: &ScanConfig,
    now: i64,
) -> Option<NaughtyEntry> {
    let ready_at = crime.ready_at.filter(|ready_at| *ready_at > 0)?;
    let window_end = crime.window_end(now);
    if window_end - ready_at < scan.min_window_secs {
        return None;
    }

    let members = participants(&crime.slots);
    if members.is_empty() {
        return None;
    }

    let outcome = scan_window(&members, users, ready_at, window_end, scan.step_secs);
    debug!(
        crime_id,
        slackers = outcome.slackers.len(),
        promoted = outcome.promoted.len(),
        cleared = outcome.cleared.len(),
        suspicious = outcome.suspicious.len(),
        "scanned crime window"
    );

    let crime_name = if crime.name.is_empty() {
        format!("OC {crime_id}")
    } else {
        crime.name.clone()
    };

    Some(NaughtyEntry {
        crime_id,
        crime_name,
        ready_at,
        executed_at: window_end,
        crime_participants: crime.slots.clone(),
        slackers: outcome
            .flagged()
            .into_iter()
            .map(|uid| (uid.to_string(), Classification::pending()))
            .collect(),
        delay_time: window_end - ready_at,
        extra: Extra::new(),
    })
}

/// Key for a new entry: the detection time, suffixed with the crime id when
/// another entry from the same instant already took it.
fn entry_key(naughty: &NaughtyDb, now: i64, crime_id: u64) -> String {
    let key = now.to_string();
    if naughty.contains_key(&key) {
        format!("{now}-{crime_id}")
    } else {
        key
    }
}

/// Append entries for every qualifying crime not already on the list.
///
/// Returns the ids of the crimes scored in this pass. Existing entries are
/// never touched.
pub fn update_naughty_list(
    naughty: &mut NaughtyDb,
    crimes: &CrimeDb,
    users: &UserDb,
    scan: &ScanConfig,
    now: i64,
) -> Vec<u64> {
    let mut scored: HashSet<u64> = naughty.values().map(|entry| entry.crime_id).collect();
    let mut added = Vec::new();

    for (crime_id, crime) in crimes {
        if scored.contains(crime_id) {
            continue;
        }
        let Some(entry) = score_crime(*crime_id, crime, users, scan, now) else {
            continue;
        };

        info!(
            crime_id,
            flagged = entry.slackers.len(),
            delay = entry.delay_time,
            "crime added to naughty list"
        );
        let key = entry_key(naughty, now, *crime_id);
        naughty.insert(key, entry);
        scored.insert(*crime_id);
        added.push(*crime_id);
    }

    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::UserRecord;

    fn closed(status: &str, start: i64, end: i64) -> Activity {
        Activity {
            status: status.to_string(),
            start,
            end: Some(end),
        }
    }

    fn user(activities: Vec<Activity>) -> UserRecord {
        UserRecord {
            name: String::new(),
            activities,
        }
    }

    fn set(ids: &[u64]) -> BTreeSet<u64> {
        ids.iter().copied().collect()
    }

    #[test]
    fn unavailable_at_ready_is_slacker() {
        let users = UserDb::from([(1, user(vec![Activity::open("Jail", 0)]))]);
        let outcome = scan_window(&set(&[1]), &users, 1000, 1400, 60);
        assert_eq!(outcome.slackers, set(&[1]));
        assert!(outcome.suspicious.is_empty());
        assert_eq!(outcome.flagged(), set(&[1]));
    }

    #[test]
    fn lone_recovery_is_promoted() {
        let users = UserDb::from([(
            1,
            user(vec![
                closed(AVAILABLE, 0, 1100),
                closed("[Mexico] - Going", 1100, 1250),
                Activity::open(AVAILABLE, 1250),
            ]),
        )]);
        let outcome = scan_window(&set(&[1]), &users, 1000, 1400, 60);
        assert_eq!(outcome.promoted, set(&[1]));
        assert!(outcome.cleared.is_empty());
        assert!(outcome.slackers.is_empty());
    }

    #[test]
    fn recovery_while_others_away_is_cleared() {
        let users = UserDb::from([
            (
                1,
                user(vec![
                    closed(AVAILABLE, 0, 1100),
                    closed("Jail", 1100, 1200),
                    Activity::open(AVAILABLE, 1200),
                ]),
            ),
            (
                2,
                user(vec![
                    closed(AVAILABLE, 0, 1050),
                    closed("[Japan] - Idle", 1050, 1400),
                    Activity::open(AVAILABLE, 1400),
                ]),
            ),
        ]);
        let outcome = scan_window(&set(&[1, 2]), &users, 1000, 1500, 60);
        assert_eq!(outcome.cleared, set(&[1]));
        assert_eq!(outcome.promoted, set(&[2]));
        assert_eq!(outcome.flagged(), set(&[2]));
    }

    #[test]
    fn always_available_participant_is_in_no_set() {
        let users = UserDb::from([
            (1, user(vec![Activity::open(AVAILABLE, 0)])),
            (2, user(vec![Activity::open("Jail", 0)])),
        ]);
        let outcome = scan_window(&set(&[1, 2]), &users, 1000, 2000, 60);
        for working_set in [
            &outcome.slackers,
            &outcome.suspicious,
            &outcome.cleared,
            &outcome.promoted,
        ] {
            assert!(!working_set.contains(&1));
        }
    }

    #[test]
    fn missing_timeline_stays_suspicious_and_unflagged() {
        let users = UserDb::new();
        let outcome = scan_window(&set(&[5]), &users, 1000, 1400, 60);
        assert_eq!(outcome.suspicious, set(&[5]));
        assert!(outcome.flagged().is_empty());
    }

    #[test]
    fn entry_keys_do_not_collide() {
        let mut naughty = NaughtyDb::new();
        assert_eq!(entry_key(&naughty, 5000, 1), "5000");
        naughty.insert(
            "5000".to_string(),
            NaughtyEntry {
                crime_id: 1,
                crime_name: "OC 1".to_string(),
                ready_at: 0,
                executed_at: 400,
                crime_participants: SlotMap::new(),
                slackers: BTreeMap::new(),
                delay_time: 400,
                extra: Extra::new(),
            },
        );
        assert_eq!(entry_key(&naughty, 5000, 2), "5000-2");
    }

    #[test]
    fn reviewer_annotations_survive_reload() {
        let doc = serde_json::json!({
            "1700000000": {
                "crime_id": 9,
                "crime_name": "Blast from the Past",
                "ready_at": 1000,
                "executed_at": 1400,
                "crime_participants": {
                    "P1": {
                        "user_id": 7,
                        "user_name": "alpha",
                        "checkpoint_pass_rate": 71,
                        "position": "Muscle",
                        "position_number": 1,
                        "item_available": true
                    }
                },
                "slackers": {
                    "7": {
                        "status": "handled",
                        "handled_by": "boss",
                        "notes": ["talked to them"],
                        "outcome": "warned"
                    }
                },
                "delay_time": 400,
                "reviewed_at": 1700003600
            }
        });

        let naughty: NaughtyDb = serde_json::from_value(doc.clone()).unwrap();
        let entry = &naughty["1700000000"];
        assert!(entry.is_flagged(7));
        assert_eq!(entry.extra["reviewed_at"], 1700003600);
        assert_eq!(entry.slackers["7"].extra["outcome"], "warned");
        assert_eq!(serde_json::to_value(&naughty).unwrap(), doc);
    }

    #[test]
    fn flagged_participants_get_bare_review_records() {
        let classification = serde_json::to_value(Classification::pending()).unwrap();
        assert_eq!(
            classification,
            serde_json::json!({"status": "pending", "handled_by": null, "notes": []})
        );
    }
}
