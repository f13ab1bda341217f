//! ocwatch naughty command implementation
//!
//! Lists naughty list entries, newest first.

use super::{runtime, Context};
use crate::error::Result;
use crate::naughty::{NaughtyDb, NaughtyEntry};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::StoreKind;

/// Options for the naughty command
pub struct NaughtyOptions {
    pub(super) context: Context,
    pub pending: bool,
    pub limit: Option<usize>,
    pub output: OutputOptions,
}

#[derive(serde::Serialize)]
struct NaughtyReport<'a> {
    total: usize,
    entries: Vec<KeyedEntry<'a>>,
}

#[derive(serde::Serialize)]
struct KeyedEntry<'a> {
    key: &'a str,
    #[serde(flatten)]
    entry: &'a NaughtyEntry,
}

pub fn run(options: NaughtyOptions) -> Result<()> {
    let config = options.context.config()?;
    let mut store = options.context.store(&config)?;
    let naughty: NaughtyDb = runtime()?.block_on(store.load(StoreKind::Naughty))?;

    let entries = select(&naughty, options.pending, options.limit);
    let report = NaughtyReport {
        total: naughty.len(),
        entries: entries
            .iter()
            .map(|&(key, entry)| KeyedEntry { key, entry })
            .collect(),
    };

    let mut human = HumanOutput::new(format!(
        "ocwatch naughty: {} of {} entries",
        report.entries.len(),
        report.total
    ));
    for (_, entry) in &entries {
        human.push_detail(describe(entry));
    }
    if options.pending && entries.is_empty() {
        human.push_summary("nothing pending review", "");
    }

    emit_success(options.output, "naughty", &report, Some(&human))
}

/// Entries ordered by detection time, newest first.
fn select(naughty: &NaughtyDb, pending: bool, limit: Option<usize>) -> Vec<(&str, &NaughtyEntry)> {
    let mut entries: Vec<(&str, &NaughtyEntry)> = naughty
        .iter()
        .filter(|(_, entry)| !pending || entry.pending().next().is_some())
        .map(|(key, entry)| (key.as_str(), entry))
        .collect();
    entries.sort_by(|a, b| detection_time(b.0).cmp(&detection_time(a.0)).then(b.0.cmp(a.0)));
    if let Some(limit) = limit {
        entries.truncate(limit);
    }
    entries
}

fn detection_time(key: &str) -> i64 {
    key.split('-')
        .next()
        .and_then(|ts| ts.parse().ok())
        .unwrap_or_default()
}

fn describe(entry: &NaughtyEntry) -> String {
    let flagged: Vec<String> = entry
        .slackers
        .iter()
        .map(|(uid, classification)| {
            let name = entry
                .crime_participants
                .values()
                .find(|slot| slot.user_id.to_string() == *uid)
                .map(|slot| slot.user_name.as_str())
                .unwrap_or("?");
            format!("{name} [{uid}] flagged ({})", classification.status)
        })
        .collect();

    let flagged = if flagged.is_empty() {
        "nobody flagged".to_string()
    } else {
        flagged.join(", ")
    };
    format!(
        "{} [{}] delayed {}s: {flagged}",
        entry.crime_name, entry.crime_id, entry.delay_time
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naughty::Classification;
    use crate::roster::{SlotMap, SlotSnapshot};
    use std::collections::BTreeMap;

    fn entry(crime_id: u64, flagged: &[(u64, &str)]) -> NaughtyEntry {
        NaughtyEntry {
            crime_id,
            crime_name: format!("OC {crime_id}"),
            ready_at: 1000,
            executed_at: 1400,
            crime_participants: SlotMap::from([(
                "P1".to_string(),
                SlotSnapshot {
                    user_id: 7,
                    user_name: "alpha".to_string(),
                    checkpoint_pass_rate: None,
                    position: None,
                    position_number: None,
                    item_available: None,
                },
            )]),
            slackers: flagged
                .iter()
                .map(|(uid, status)| {
                    let mut classification = Classification::pending();
                    classification.status = status.to_string();
                    (uid.to_string(), classification)
                })
                .collect::<BTreeMap<_, _>>(),
            delay_time: 400,
            extra: Default::default(),
        }
    }

    #[test]
    fn newest_first_with_collision_keys() {
        let naughty = NaughtyDb::from([
            ("900".to_string(), entry(1, &[])),
            ("1000".to_string(), entry(2, &[])),
            ("1000-3".to_string(), entry(3, &[])),
        ]);
        let keys: Vec<&str> = select(&naughty, false, None)
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(keys, vec!["1000-3", "1000", "900"]);
    }

    #[test]
    fn pending_filter_and_limit() {
        let naughty = NaughtyDb::from([
            ("1".to_string(), entry(1, &[(7, "pending")])),
            ("2".to_string(), entry(2, &[(7, "handled")])),
            ("3".to_string(), entry(3, &[(7, "pending")])),
        ]);
        let pending = select(&naughty, true, None);
        assert_eq!(pending.len(), 2);
        assert_eq!(select(&naughty, true, Some(1))[0].1.crime_id, 3);
    }

    #[test]
    fn description_names_flagged_participants() {
        let line = describe(&entry(4, &[(7, "pending")]));
        assert_eq!(line, "OC 4 [4] delayed 400s: alpha [7] flagged (pending)");
        assert!(describe(&entry(5, &[])).ends_with("nobody flagged"));
    }
}
