use std::fs;

use ocwatch::config::{Config, ScanConfig};
use ocwatch::crimes::CrimeDb;
use ocwatch::diagnostics::ErrorLog;
use ocwatch::naughty::NaughtyDb;
use ocwatch::pipeline::Pipeline;
use ocwatch::roster::SlotAction;
use ocwatch::status::StatusNormalizer;
use ocwatch::storage::{DocumentStore, LocalStore, SaveOutcome, StoreKind};
use ocwatch::timeline::UserDb;
use ocwatch::torn::{Crime, FactionSnapshot, Member};
use serde_json::json;
use tempfile::TempDir;

fn member(id: u64, name: &str, description: &str, state: &str) -> Member {
    serde_json::from_value(json!({
        "id": id,
        "name": name,
        "revive_setting": "Everyone",
        "status": { "description": description, "details": null, "state": state }
    }))
    .expect("member")
}

fn crime(id: u64, status: &str, ready_at: i64, occupants: &[(&str, u64)]) -> Crime {
    let slots: Vec<_> = occupants
        .iter()
        .map(|(position_id, user)| {
            json!({
                "position_id": position_id,
                "position": "Muscle",
                "position_number": 1,
                "user": { "id": user },
                "checkpoint_pass_rate": 70,
                "item_requirement": { "is_available": true }
            })
        })
        .collect();
    serde_json::from_value(json!({
        "id": id,
        "name": "Snow Blind",
        "status": status,
        "ready_at": ready_at,
        "executed_at": null,
        "slots": slots
    }))
    .expect("crime")
}

fn local_store(dir: &TempDir) -> LocalStore {
    LocalStore::new(dir.path(), Config::default().store.local.files)
}

fn pipeline(dir: &TempDir) -> Pipeline {
    Pipeline::new(
        DocumentStore::Local(local_store(dir)),
        StatusNormalizer::standard().expect("rules"),
        ScanConfig::default(),
        ErrorLog::new(Some(dir.path().join("errors.txt"))),
    )
}

#[tokio::test]
async fn unavailable_participant_is_flagged_with_full_delay() {
    let dir = TempDir::new().unwrap();

    // First poll: the member is already in jail, no crime yet.
    let first = FactionSnapshot {
        members: vec![member(7, "alpha", "In jail for 10 mins", "Jail")],
        crimes: vec![],
    };
    pipeline(&dir).process(&first, 900).await.expect("first run");

    // Second poll: the crime became ready at 1000 and is still planning.
    let second = FactionSnapshot {
        members: vec![member(7, "alpha", "In jail for 2 mins", "Jail")],
        crimes: vec![crime(42, "Planning", 1000, &[("P1", 7)])],
    };
    let report = pipeline(&dir).process(&second, 1400).await.expect("second run");
    assert_eq!(report.flagged_crimes, vec![42]);
    assert!(report.failed_stores().is_empty());

    let mut store = local_store(&dir);
    let naughty: NaughtyDb = store.load(StoreKind::Naughty).unwrap();
    assert_eq!(naughty.len(), 1);
    let (key, entry) = naughty.iter().next().unwrap();
    assert_eq!(key, "1400");
    assert_eq!(entry.crime_id, 42);
    assert_eq!(entry.ready_at, 1000);
    assert_eq!(entry.executed_at, 1400);
    assert_eq!(entry.delay_time, 400);
    assert_eq!(entry.slackers.len(), 1);
    let classification = &entry.slackers["7"];
    assert_eq!(classification.status, "pending");
    assert_eq!(classification.handled_by, None);
    assert!(classification.notes.is_empty());

    let users: UserDb = store.load(StoreKind::Users).unwrap();
    let alpha = &users[&7];
    assert_eq!(alpha.activities.len(), 1);
    assert_eq!(alpha.activities[0].start, 900);
    assert!(alpha.activities[0].is_open());
}

#[tokio::test]
async fn crime_is_never_rescored() {
    let dir = TempDir::new().unwrap();
    let snapshot = FactionSnapshot {
        members: vec![member(7, "alpha", "Okay", "Okay")],
        crimes: vec![crime(42, "Planning", 1000, &[("P1", 7)])],
    };

    let first = pipeline(&dir).process(&snapshot, 1400).await.unwrap();
    assert_eq!(first.flagged_crimes, vec![42]);

    let second = pipeline(&dir).process(&snapshot, 2000).await.unwrap();
    assert!(second.flagged_crimes.is_empty());

    let naughty: NaughtyDb = local_store(&dir).load(StoreKind::Naughty).unwrap();
    assert_eq!(naughty.len(), 1);
    assert!(naughty.contains_key("1400"));
}

#[tokio::test]
async fn roster_changes_are_logged_across_runs() {
    let dir = TempDir::new().unwrap();
    let members = vec![
        member(1, "alpha", "Okay", "Okay"),
        member(2, "beta", "Okay", "Okay"),
    ];

    let first = FactionSnapshot {
        members: members.clone(),
        crimes: vec![crime(5, "Recruiting", 5000, &[("P1", 1)])],
    };
    pipeline(&dir).process(&first, 100).await.unwrap();

    let second = FactionSnapshot {
        members,
        crimes: vec![crime(5, "Recruiting", 5000, &[("P1", 2)])],
    };
    let report = pipeline(&dir).process(&second, 200).await.unwrap();
    assert_eq!(report.crimes.map(|c| c.actions), Some(2));

    let crimes: CrimeDb = local_store(&dir).load(StoreKind::Crimes).unwrap();
    let log: Vec<_> = crimes[&5]
        .action_log
        .iter()
        .map(|entry| (entry.timestamp, entry.action, entry.snapshot.user_id))
        .collect();
    assert_eq!(
        log,
        vec![
            (100, SlotAction::Joined, 1),
            (200, SlotAction::Left, 1),
            (200, SlotAction::Joined, 2),
        ]
    );
    assert_eq!(crimes[&5].slots["P1"].user_name, "beta");
}

#[tokio::test]
async fn unchanged_poll_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let snapshot = FactionSnapshot {
        members: vec![member(1, "alpha", "Okay", "Okay")],
        crimes: vec![],
    };
    pipeline(&dir).process(&snapshot, 100).await.unwrap();

    let report = pipeline(&dir).process(&snapshot, 160).await.unwrap();
    assert!(report
        .writes
        .iter()
        .all(|write| write.outcome == Some(SaveOutcome::Unchanged)));
}

#[tokio::test]
async fn fresh_crime_store_skips_crime_stages() {
    let dir = TempDir::new().unwrap();
    let snapshot = FactionSnapshot {
        members: vec![member(1, "alpha", "Okay", "Okay")],
        crimes: vec![crime(5, "Planning", 100, &[("P1", 1)])],
    };
    pipeline(&dir).process(&snapshot, 100).await.unwrap();

    let now = chrono::Utc::now().timestamp();
    let report = pipeline(&dir)
        .with_crime_refresh(3600)
        .process(&snapshot, now)
        .await
        .unwrap();
    assert!(report.crimes.is_none());
    assert_eq!(report.writes.len(), 1);
    assert_eq!(report.writes[0].store, "users");
}

#[tokio::test]
async fn corrupt_store_aborts_before_any_write() {
    let dir = TempDir::new().unwrap();
    let store = local_store(&dir);
    fs::write(store.path(StoreKind::Naughty), "{ broken").unwrap();

    let snapshot = FactionSnapshot {
        members: vec![member(1, "alpha", "Okay", "Okay")],
        crimes: vec![],
    };
    let result = pipeline(&dir).process(&snapshot, 100).await;
    assert!(result.is_err());
    assert!(!store.path(StoreKind::Users).exists());

    let log = fs::read_to_string(dir.path().join("errors.txt")).unwrap();
    assert!(log.contains("loading naughty store"));
}

#[tokio::test]
async fn failed_write_is_reported_and_later_stores_still_written() {
    let dir = TempDir::new().unwrap();
    let store = local_store(&dir);
    // Occupy the temp file the atomic write of the user store would create.
    let users_path = store.path(StoreKind::Users);
    let temp_path = users_path.with_extension(format!("json.tmp.{}", std::process::id()));
    fs::create_dir(&temp_path).unwrap();

    let snapshot = FactionSnapshot {
        members: vec![member(1, "alpha", "Okay", "Okay")],
        crimes: vec![crime(5, "Planning", 100, &[("P1", 1)])],
    };
    let report = pipeline(&dir).process(&snapshot, 1000).await.unwrap();
    assert_eq!(report.failed_stores(), vec!["users".to_string()]);
    assert!(!users_path.exists());
    assert!(store.path(StoreKind::Crimes).is_file());
    assert!(store.path(StoreKind::Naughty).is_file());

    let log = fs::read_to_string(dir.path().join("errors.txt")).unwrap();
    assert!(log.contains("saving users store"));
}

#[tokio::test]
async fn reviewer_edits_survive_a_run_that_appends() {
    let dir = TempDir::new().unwrap();
    let store = local_store(&dir);
    let reviewed = json!({
        "crime_id": 3,
        "crime_name": "Mob Mentality",
        "ready_at": 100,
        "executed_at": 500,
        "crime_participants": {},
        "slackers": {
            "7": {
                "status": "handled",
                "handled_by": "boss",
                "notes": [],
                "outcome": "warned"
            }
        },
        "delay_time": 400,
        "reviewed_at": 1700003600
    });
    fs::write(
        store.path(StoreKind::Naughty),
        serde_json::to_string(&json!({ "600": reviewed })).unwrap(),
    )
    .unwrap();

    let snapshot = FactionSnapshot {
        members: vec![member(7, "alpha", "In jail for 2 mins", "Jail")],
        crimes: vec![crime(42, "Planning", 1000, &[("P1", 7)])],
    };
    let report = pipeline(&dir).process(&snapshot, 1400).await.unwrap();
    assert_eq!(report.flagged_crimes, vec![42]);

    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(store.path(StoreKind::Naughty)).unwrap())
            .unwrap();
    assert_eq!(saved["600"], reviewed);
    assert_eq!(saved["1400"]["crime_id"], 42);
}
