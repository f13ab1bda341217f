//! ocwatch timeline command implementation
//!
//! Prints one member's activity intervals from the user store.

use chrono::{DateTime, Utc};

use super::{runtime, Context};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::StoreKind;
use crate::timeline::{Activity, UserDb};

/// Options for the timeline command
pub struct TimelineOptions {
    pub(super) context: Context,
    pub user_id: u64,
    pub since: Option<i64>,
    pub output: OutputOptions,
}

#[derive(serde::Serialize)]
struct TimelineReport {
    user_id: u64,
    name: String,
    activities: Vec<Activity>,
}

pub fn run(options: TimelineOptions) -> Result<()> {
    let config = options.context.config()?;
    let mut store = options.context.store(&config)?;
    let users: UserDb = runtime()?.block_on(store.load(StoreKind::Users))?;

    let record = users
        .get(&options.user_id)
        .ok_or_else(|| Error::UserNotFound(options.user_id.to_string()))?;

    let activities = match options.since {
        Some(since) => record.window(since, i64::MAX),
        None => record.activities.clone(),
    };

    let report = TimelineReport {
        user_id: options.user_id,
        name: record.name.clone(),
        activities,
    };

    let mut human = HumanOutput::new(format!(
        "ocwatch timeline: {} [{}]",
        report.name, report.user_id
    ));
    human.push_summary("intervals", report.activities.len().to_string());
    if let Some(current) = record.current() {
        human.push_summary("current", current.status.clone());
    }
    for activity in &report.activities {
        human.push_detail(format_activity(activity));
    }

    emit_success(options.output, "timeline", &report, Some(&human))
}

fn format_time(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn format_activity(activity: &Activity) -> String {
    let end = activity
        .end
        .map(format_time)
        .unwrap_or_else(|| "now".to_string());
    format!("{} .. {}  {}", format_time(activity.start), end, activity.status)
}
