//! ocwatch run command implementation
//!
//! One poll: fetch the faction snapshot, fold it into the stores, report.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, info};

use super::{runtime, Context};
use crate::diagnostics::ErrorLog;
use crate::error::{Error, Result};
use crate::lock::RunLock;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::pipeline::{Pipeline, RunReport};
use crate::status::StatusNormalizer;
use crate::storage::SaveOutcome;
use crate::torn::TornClient;

/// Options for the run command
pub struct RunOptions {
    pub(super) context: Context,
    pub api_key: Option<String>,
    pub no_delay: bool,
    pub output: OutputOptions,
}

pub fn run(options: RunOptions) -> Result<()> {
    let config = options.context.config()?;
    let diagnostics = ErrorLog::new(config.diagnostics.error_log.clone());

    let api_key = options
        .api_key
        .filter(|key| !key.trim().is_empty())
        .ok_or(Error::MissingCredential("API_KEY"))?;

    let _lock = match &config.run.lock_file {
        Some(path) => Some(RunLock::acquire(path)?),
        None => None,
    };

    let client = TornClient::new(&config.api, api_key)?;
    let store = options.context.store(&config)?;
    let store_name = store.describe();
    let normalizer = StatusNormalizer::standard()?;
    let mut pipeline = Pipeline::new(store, normalizer, config.scan, diagnostics.clone())
        .with_crime_refresh(config.run.crime_refresh_secs);

    let jitter_ms = if options.no_delay || config.run.startup_jitter_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..config.run.startup_jitter_ms)
    };

    let report = runtime()?.block_on(async {
        if jitter_ms > 0 {
            debug!(jitter_ms, "startup delay");
            tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
        }

        let snapshot = client
            .fetch_snapshot()
            .await
            .inspect_err(|err| diagnostics.record_error(err))?;
        let now = chrono::Utc::now().timestamp();
        info!(store = %store_name, now, "processing poll");
        pipeline.process(&snapshot, now).await
    })?;

    let failed = report.failed_stores();
    let human = human_report(&report, &store_name);
    emit_success(options.output, "run", &report, Some(&human))?;

    if failed.is_empty() {
        Ok(())
    } else {
        Err(Error::PartialPersist(failed))
    }
}

fn human_report(report: &RunReport, store_name: &str) -> HumanOutput {
    let header = if report.failed_stores().is_empty() {
        "ocwatch run: stores updated"
    } else {
        "ocwatch run: finished with failed writes"
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("store", store_name);
    human.push_summary("members", report.members.to_string());
    human.push_summary("crimes polled", report.crimes_polled.to_string());
    human.push_summary(
        "timelines",
        format!(
            "{} new, {} changed, {} unchanged",
            report.users.created, report.users.changed, report.users.unchanged
        ),
    );

    match &report.crimes {
        Some(crimes) => {
            human.push_summary(
                "crimes",
                format!(
                    "{} tracked, {} skipped, {} roster actions",
                    crimes.tracked, crimes.skipped, crimes.actions
                ),
            );
            human.push_summary("newly flagged", report.flagged_crimes.len().to_string());
        }
        None => human.push_warning("crime refresh not due; crimes and naughty list untouched"),
    }

    for write in &report.writes {
        let state = match (&write.outcome, &write.error) {
            (Some(SaveOutcome::Written), _) => "written".to_string(),
            (Some(SaveOutcome::Unchanged), _) => "unchanged".to_string(),
            (None, Some(err)) => format!("failed: {err}"),
            (None, None) => "skipped".to_string(),
        };
        human.push_detail(format!("{}: {state}", write.store));
    }

    for crime_id in &report.flagged_crimes {
        human.push_detail(format!("crime {crime_id} added to the naughty list"));
    }

    if !report.flagged_crimes.is_empty() {
        human.push_next_step("ocwatch naughty --pending");
    }

    human
}
